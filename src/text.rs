//! ZSCII text encoding and decoding
use std::cmp::Ordering;

use crate::{
    error::*,
    fatal_error,
    zmachine::{header::HeaderField, ZMachine},
};

/// Alphabet rows for Z-characters 6-31, V2 and later
const ALPHABET: [[char; 26]; 3] = [
    [
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
        's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ],
    [
        'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
        'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    ],
    [
        ' ', '\r', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', ',', '!', '?', '_', '#',
        '\'', '"', '/', '\\', '-', ':', '(', ')',
    ],
];

/// V1 punctuation row: no newline entry, and `<` is present
const ALPHABET_P_V1: [char; 26] = [
    ' ', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', ',', '!', '?', '_', '#', '\'',
    '"', '/', '\\', '<', '-', ':', '(', ')',
];

/// Alphabet shift state: 0 lower, 1 upper, 2 punctuation
const A_L: usize = 0;
const A_U: usize = 1;
const A_P: usize = 2;

fn shift_up(alphabet: usize) -> usize {
    (alphabet + 1) % 3
}

fn shift_down(alphabet: usize) -> usize {
    (alphabet + 2) % 3
}

/// Look up a Z-character in an alphabet row.
///
/// V5+ stories may substitute their own 78-byte alphabet table via header
/// word 0x34.  Row 2 entries 6 and 7 remain the literal escape and newline
/// regardless of any custom table.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `alphabet` - Alphabet row
/// * `zchar` - Z-character, 6 - 31
///
/// # Returns
/// [Result] with the ZSCII value or a [RuntimeError]
fn alphabet_char(zmachine: &ZMachine, alphabet: usize, zchar: u8) -> Result<u16, RuntimeError> {
    if alphabet == A_P && zchar == 7 && zmachine.version() > 1 {
        return Ok(0x0d);
    }

    let table = if zmachine.version() >= 5 {
        zmachine.header_word(HeaderField::AlphabetTable)? as usize
    } else {
        0
    };

    if table > 0 {
        let address = table + (alphabet * 26) + (zchar as usize - 6);
        Ok(zmachine.read_byte(address)? as u16)
    } else if zmachine.version() == 1 && alphabet == A_P {
        Ok(ALPHABET_P_V1[zchar as usize - 6] as u16)
    } else {
        Ok(ALPHABET[alphabet][zchar as usize - 6] as u16)
    }
}

/// Decode an abbreviation to text
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `set` - Abbreviation set, 1 - 3
/// * `index` - Abbreviation index within the set
///
/// # Returns
/// [Result] containing the abbreviation text or a [RuntimeError]
fn abbreviation(zmachine: &ZMachine, set: u8, index: u8) -> Result<Vec<u16>, RuntimeError> {
    let table = zmachine.header_word(HeaderField::AbbreviationsTable)? as usize;
    let entry = (((set as usize - 1) * 32) + index as usize) * 2;
    let word_address = zmachine.read_word(table + entry)? as usize;
    as_text(zmachine, word_address * 2, true)
}

/// Read encoded ztext from an address and decode it
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `address` - Address of the text
/// * `is_abbreviation` - `true` when decoding an abbreviation
///
/// # Returns
/// [Result] containing the decoded ZSCII text or a [RuntimeError]
pub fn as_text(
    zmachine: &ZMachine,
    address: usize,
    is_abbreviation: bool,
) -> Result<Vec<u16>, RuntimeError> {
    decode(zmachine, &zmachine.string_literal(address)?, is_abbreviation)
}

/// Decode a vector of ztext words.
///
/// Decoding is stateful: a current and a locked alphabet.  Z-characters
/// 4 and 5 shift for the next character only in V3+ but lock in V1-2,
/// where 2 and 3 are the single-character shifts.  Abbreviations may not
/// nest.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `ztext` - Encoded ztext words
/// * `is_abbreviation` - `true` when decoding an abbreviation
///
/// # Returns
/// [Result] containing the decoded ZSCII text or a [RuntimeError]
pub fn decode(
    zmachine: &ZMachine,
    ztext: &[u16],
    is_abbreviation: bool,
) -> Result<Vec<u16>, RuntimeError> {
    let version = zmachine.version();
    let mut text = Vec::new();

    let mut current = A_L;
    let mut locked = A_L;
    let mut abbreviation_set = 0;
    let mut literal_pending = false;
    let mut literal_high: Option<u8> = None;

    let mut zchars = Vec::new();
    for w in ztext {
        zchars.push((w >> 10 & 0x1F) as u8);
        zchars.push((w >> 5 & 0x1F) as u8);
        zchars.push((w & 0x1F) as u8);
    }

    for z in zchars {
        if abbreviation_set > 0 {
            let mut expansion = abbreviation(zmachine, abbreviation_set, z)?;
            text.append(&mut expansion);
            abbreviation_set = 0;
        } else if literal_pending {
            literal_high = Some(z);
            literal_pending = false;
        } else if let Some(high) = literal_high {
            text.push((((high as u16) << 5) & 0x3E0) | z as u16);
            literal_high = None;
            current = locked;
        } else {
            match z {
                0 => {
                    text.push(0x20);
                    current = locked;
                }
                1 => {
                    if version == 1 {
                        text.push(0x0d);
                        current = locked;
                    } else if is_abbreviation {
                        return fatal_error!(
                            ErrorCode::InvalidAbbreviation,
                            "Abbreviations can't nest"
                        );
                    } else {
                        abbreviation_set = z;
                    }
                }
                2 | 3 => {
                    if version < 3 {
                        current = if z == 2 {
                            shift_up(current)
                        } else {
                            shift_down(current)
                        };
                    } else if is_abbreviation {
                        return fatal_error!(
                            ErrorCode::InvalidAbbreviation,
                            "Abbreviations can't nest"
                        );
                    } else {
                        abbreviation_set = z;
                    }
                }
                4 | 5 => {
                    current = if z == 4 {
                        shift_up(current)
                    } else {
                        shift_down(current)
                    };
                    // Shifts lock in V1-2
                    if version < 3 {
                        locked = current;
                    }
                }
                6 if current == A_P => literal_pending = true,
                _ => {
                    text.push(alphabet_char(zmachine, current, z)?);
                    current = locked;
                }
            }
        }
    }

    Ok(text)
}

/// Render decoded ZSCII as a string, mapping newline (13) to '\n'
///
/// # Arguments
/// * `text` - Decoded ZSCII text
///
/// # Returns
/// String rendering of the text
pub fn to_string(text: &[u16]) -> String {
    text.iter()
        .map(|c| match *c {
            0x0d => '\n',
            _ => char::from_u32(*c as u32).unwrap_or('?'),
        })
        .collect()
}

/// Find the Z-character sequence for a ZSCII value.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `zscii` - ZSCII value to encode
///
/// # Returns
/// [Result] with the Z-character sequence, including any required alphabet
/// shift, or a [RuntimeError].  Characters in no alphabet become a
/// shift + literal escape + two 5-bit halves.
fn find_char(zmachine: &ZMachine, zscii: u16) -> Result<Vec<u16>, RuntimeError> {
    let version = zmachine.version();
    let (up, down) = if version < 3 { (2, 3) } else { (4, 5) };

    if zscii == 0x20 {
        return Ok(vec![0]);
    }

    if zscii == 0x0d || zscii == 0x0a {
        if version == 1 {
            return Ok(vec![1]);
        }
        return Ok(vec![down, 7]);
    }

    for i in 6..32u16 {
        if alphabet_char(zmachine, A_L, i as u8)? == zscii {
            return Ok(vec![i]);
        }
    }
    for i in 6..32u16 {
        if alphabet_char(zmachine, A_U, i as u8)? == zscii {
            return Ok(vec![up, i]);
        }
    }
    // Skip the literal escape and (V2+) newline slots in the P row
    let skip = if version == 1 { 7 } else { 8 };
    for i in skip..32u16 {
        if alphabet_char(zmachine, A_P, i as u8)? == zscii {
            return Ok(vec![down, i]);
        }
    }

    Ok(vec![down, 6, (zscii >> 5) & 0x1F, zscii & 0x1F])
}

/// Encode text into ztext words.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `text` - ZSCII text to encode
/// * `words` - Number of encoded words to emit: 2 in V1-3, 3 in V4+
///
/// # Returns
/// [Result] with the encoded words, padded with Z-character 5, terminator
/// bit set on the final word, or a [RuntimeError]
pub fn encode_words(
    zmachine: &ZMachine,
    text: &[u16],
    words: usize,
) -> Result<Vec<u16>, RuntimeError> {
    let mut zchars = Vec::new();
    for c in text {
        zchars.append(&mut find_char(zmachine, *c)?);
        if zchars.len() >= words * 3 {
            break;
        }
    }
    zchars.resize(words * 3, 5);

    let mut zwords = Vec::new();
    for i in 0..words {
        let index = i * 3;
        let mut w = ((zchars[index] & 0x1F) << 10)
            | ((zchars[index + 1] & 0x1F) << 5)
            | (zchars[index + 2] & 0x1F);
        if i == words - 1 {
            w |= 0x8000;
        }
        zwords.push(w);
    }

    Ok(zwords)
}

/// Get the set of word separators from a dictionary
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `dictionary` - Address of the dictionary
///
/// # Returns
/// [Result] containing the word separator characters or a [RuntimeError]
fn separators(zmachine: &ZMachine, dictionary: usize) -> Result<Vec<char>, RuntimeError> {
    let count = zmachine.read_byte(dictionary)?;
    let mut separators = Vec::new();
    for i in 1..=count as usize {
        separators.push(zmachine.read_byte(dictionary + i)? as char);
    }

    Ok(separators)
}

/// Binary-search a sorted dictionary
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `address` - Address of the first entry
/// * `entry_count` - Number of entries
/// * `entry_size` - Entry size in bytes
/// * `word` - Encoded ztext of the word to find
///
/// # Returns
/// [Result] containing the address of the matching entry, 0 if not found,
/// or a [RuntimeError]
fn search_entry(
    zmachine: &ZMachine,
    address: usize,
    entry_count: usize,
    entry_size: usize,
    word: &[u16],
) -> Result<usize, RuntimeError> {
    let mut min = 0i32;
    let mut max = entry_count as i32 - 1;
    while min <= max {
        let pivot = min + ((max - min) / 2);
        let entry_address = address + (pivot as usize * entry_size);
        let mut ordering = Ordering::Equal;
        for (i, w) in word.iter().enumerate() {
            let e = zmachine.read_word(entry_address + (i * 2))?;
            match e.cmp(w) {
                Ordering::Equal => {}
                o => {
                    ordering = o;
                    break;
                }
            }
        }

        match ordering {
            Ordering::Equal => return Ok(entry_address),
            Ordering::Less => min = pivot + 1,
            Ordering::Greater => max = pivot - 1,
        }
    }

    Ok(0)
}

/// Scan an unsorted dictionary
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `address` - Address of the first entry
/// * `entry_count` - Number of entries
/// * `entry_size` - Entry size in bytes
/// * `word` - Encoded ztext of the word to find
///
/// # Returns
/// [Result] containing the address of the matching entry, 0 if not found,
/// or a [RuntimeError]
fn scan_entry(
    zmachine: &ZMachine,
    address: usize,
    entry_count: usize,
    entry_size: usize,
    word: &[u16],
) -> Result<usize, RuntimeError> {
    'outer: for i in 0..entry_count {
        let entry_address = address + (i * entry_size);
        for (j, w) in word.iter().enumerate() {
            if zmachine.read_word(entry_address + (j * 2))? != *w {
                continue 'outer;
            }
        }

        return Ok(entry_address);
    }

    Ok(0)
}

/// Find the dictionary entry for a word, if any.
///
/// A negative entry count marks the dictionary as unsorted, forcing a
/// linear scan in place of the binary search.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `dictionary` - Address of the dictionary
/// * `word` - Word to find
///
/// # Returns
/// [Result] containing the address of the matching entry, 0 if not found,
/// or a [RuntimeError]
fn from_dictionary(
    zmachine: &ZMachine,
    dictionary: usize,
    word: &[char],
) -> Result<usize, RuntimeError> {
    let separator_count = zmachine.read_byte(dictionary)? as usize;
    let entry_size = zmachine.read_byte(dictionary + separator_count + 1)? as usize;
    let entry_count = zmachine.read_word(dictionary + separator_count + 2)? as i16;
    let word_count = if zmachine.version() < 4 { 2 } else { 3 };
    let entry_address = dictionary + separator_count + 4;
    debug!(target: "app::state", "Dictionary @ {:04x}: {} separators, {} entries of size {}", dictionary, separator_count, entry_count, entry_size);

    let zscii = word.iter().map(|c| *c as u16).collect::<Vec<u16>>();
    let encoded = encode_words(zmachine, &zscii, word_count)?;

    if entry_count < 0 {
        scan_entry(
            zmachine,
            entry_address,
            entry_count.unsigned_abs() as usize,
            entry_size,
            &encoded,
        )
    } else {
        search_entry(
            zmachine,
            entry_address,
            entry_count as usize,
            entry_size,
            &encoded,
        )
    }
}

/// Tokenise a text buffer into a parse buffer.
///
/// Input splits on spaces and on the dictionary's separator characters;
/// separators are tokens themselves, spaces are not.  Each token gets a
/// 4-byte parse record: dictionary entry address (0 if absent), token
/// length, and position in the text buffer.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `text_buffer` - Input text buffer address
/// * `parse_buffer` - Parse buffer address
/// * `dictionary` - Dictionary address
/// * `flag` - If `true`, records for words not in the dictionary are left alone
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn parse_text(
    zmachine: &mut ZMachine,
    text_buffer: usize,
    parse_buffer: usize,
    dictionary: usize,
    flag: bool,
) -> Result<(), RuntimeError> {
    debug!(target: "app::state", "Tokenise text @ {:04x} into parse @ {:04x}, dictionary @ {:04x}, skip unknown: {}", text_buffer, parse_buffer, dictionary, flag);
    let separators = separators(zmachine, dictionary)?;
    // Parse records hold the position of each word with a version-specific
    // offset from the start of the text buffer
    let offset = if zmachine.version() < 5 { 1 } else { 2 };

    let mut data = Vec::new();
    if zmachine.version() < 5 {
        // Input is 0-terminated
        let mut i = 1;
        loop {
            let b = zmachine.read_byte(text_buffer + i)?;
            if b == 0 {
                break;
            }
            data.push(b);
            i += 1;
        }
    } else {
        // Input length is stored in the second byte
        let n = zmachine.read_byte(text_buffer + 1)? as usize;
        for i in 0..n {
            data.push(zmachine.read_byte(text_buffer + 2 + i)?);
        }
    }

    let max_words = zmachine.read_byte(parse_buffer)? as usize;

    let mut words: Vec<(Vec<char>, usize)> = Vec::new();
    let mut word = Vec::new();
    let mut start = 0;
    for (i, b) in data.iter().enumerate() {
        let c = (*b as char).to_ascii_lowercase();
        if c == ' ' {
            if !word.is_empty() {
                words.push((word.clone(), start));
                word.clear();
            }
        } else if separators.contains(&c) {
            if !word.is_empty() {
                words.push((word.clone(), start));
                word.clear();
            }
            words.push((vec![c], i));
        } else {
            if word.is_empty() {
                start = i;
            }
            word.push(c);
        }
    }
    if !word.is_empty() {
        words.push((word, start));
    }
    words.truncate(max_words);

    for (n, (w, position)) in words.iter().enumerate() {
        let entry = from_dictionary(zmachine, dictionary, w)?;
        let record = parse_buffer + 2 + (n * 4);
        debug!(target: "app::state", "Token {:?} @ {} => {:04x}", w, position, entry);
        if entry > 0 || !flag {
            zmachine.write_word(record, entry as u16)?;
            zmachine.write_byte(record + 2, w.len() as u8)?;
            zmachine.write_byte(record + 3, (position + offset) as u8)?;
        }
    }

    zmachine.write_byte(parse_buffer + 1, words.len() as u8)?;
    Ok(())
}
