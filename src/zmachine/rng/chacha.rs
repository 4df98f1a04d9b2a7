use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::ZRng;

pub struct ChaChaRng {
    rng: ChaCha8Rng,
}

impl Default for ChaChaRng {
    fn default() -> Self {
        ChaChaRng::new()
    }
}

impl ChaChaRng {
    pub fn new() -> ChaChaRng {
        ChaChaRng {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl ZRng for ChaChaRng {
    fn type_name(&self) -> &str {
        "ChaChaRng"
    }

    fn randomize(&mut self) {
        self.rng = ChaCha8Rng::from_entropy();
    }

    fn seed(&mut self, seed: u16) {
        self.rng = ChaCha8Rng::seed_from_u64(seed as u64);
    }

    fn random(&mut self, range: u16) -> u16 {
        if range == 0 {
            0
        } else {
            self.rng.gen_range(1..=range)
        }
    }
}
