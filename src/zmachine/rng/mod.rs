//! Random number generation
use core::fmt;

pub mod chacha;

pub trait ZRng {
    /// RNG type name
    ///
    /// # Returns
    /// RNG type name string
    fn type_name(&self) -> &str;

    /// Re-seed the RNG from entropy
    fn randomize(&mut self);

    /// Seed the RNG deterministically.
    ///
    /// Two generators seeded with the same value produce the same sequence.
    ///
    /// # Arguments
    /// * `seed` - seed value
    fn seed(&mut self, seed: u16);

    /// Gets the next random number
    ///
    /// # Arguments
    /// * `range` - the upper limit of the result
    ///
    /// # Returns
    /// Random value in the range 1..=`range`, or 0 when `range` is 0
    fn random(&mut self, range: u16) -> u16;
}

impl fmt::Debug for dyn ZRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}
