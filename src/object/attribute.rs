//! Object attribute flags
//!
//! Attribute `a` lives in byte `a / 8` of the entry's attribute area,
//! bit `7 - (a % 8)`, MSB first.  There are 32 attributes in V1-3 and
//! 48 in V4+.
use crate::{error::*, recoverable_error, zmachine::ZMachine};

use super::object_address;

fn max_attributes(zmachine: &ZMachine) -> u16 {
    if zmachine.version() < 4 {
        32
    } else {
        48
    }
}

/// Tests an attribute on an object
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
/// * `attribute` - Attribute number
///
/// # Returns
/// [Result] with `true` when the attribute is set, `false` when clear, or a
/// [RuntimeError]
pub fn value(zmachine: &ZMachine, object: usize, attribute: u16) -> Result<bool, RuntimeError> {
    if attribute >= max_attributes(zmachine) {
        return recoverable_error!(
            ErrorCode::InvalidObjectAttribute,
            "Test of invalid attribute {} on object {}",
            attribute,
            object
        );
    }

    let address = object_address(zmachine, object)? + (attribute as usize / 8);
    let mask = 1 << (7 - (attribute % 8));
    let byte = zmachine.read_byte(address)?;
    Ok(byte & mask == mask)
}

/// Sets an attribute on an object
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object number
/// * `attribute` - Attribute number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn set(zmachine: &mut ZMachine, object: usize, attribute: u16) -> Result<(), RuntimeError> {
    if attribute >= max_attributes(zmachine) {
        return recoverable_error!(
            ErrorCode::InvalidObjectAttribute,
            "Set of invalid attribute {} on object {}",
            attribute,
            object
        );
    }

    let address = object_address(zmachine, object)? + (attribute as usize / 8);
    let mask = 1 << (7 - (attribute % 8));
    let byte = zmachine.read_byte(address)?;
    zmachine.write_byte(address, byte | mask)
}

/// Clears an attribute on an object
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object number
/// * `attribute` - Attribute number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn clear(zmachine: &mut ZMachine, object: usize, attribute: u16) -> Result<(), RuntimeError> {
    if attribute >= max_attributes(zmachine) {
        return recoverable_error!(
            ErrorCode::InvalidObjectAttribute,
            "Clear of invalid attribute {} on object {}",
            attribute,
            object
        );
    }

    let address = object_address(zmachine, object)? + (attribute as usize / 8);
    let mask: u8 = 1 << (7 - (attribute % 8));
    let byte = zmachine.read_byte(address)?;
    zmachine.write_byte(address, byte & !mask)
}
