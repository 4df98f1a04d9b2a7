//! Object property lists
//!
//! A property table begins with a text-length byte (in words) and the
//! object's encoded short name, followed by property blocks in descending
//! property-number order, terminated by a zero size byte.
use std::cmp::Ordering;

use crate::{
    error::*,
    fatal_error,
    zmachine::{header::HeaderField, ZMachine},
};

use super::object_address;

/// Gets the property table address for an object
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the byte address of the property table or a [RuntimeError]
fn property_table_address(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    let object_address = object_address(zmachine, object)?;
    let offset = if zmachine.version() < 4 { 7 } else { 12 };

    Ok(zmachine.read_word(object_address + offset)? as usize)
}

/// Gets the address of a property's size byte.
///
/// If the property does not exist for the object, 0 is returned.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
/// * `property` - Property number
///
/// # Returns
/// [Result] with the byte address of the property block, 0, or a [RuntimeError]
fn address(zmachine: &ZMachine, object: usize, property: u8) -> Result<usize, RuntimeError> {
    let property_table_address = property_table_address(zmachine, object)?;
    let header_size = zmachine.read_byte(property_table_address)? as usize;
    let mut property_address = property_table_address + 1 + (header_size * 2);
    let mut size_byte = zmachine.read_byte(property_address)?;
    while size_byte != 0 {
        let (prop_num, prop_data, prop_size) = if zmachine.version() < 4 {
            (size_byte & 0x1F, 1, (size_byte as usize >> 5) + 1)
        } else {
            let prop_num = size_byte & 0x3F;
            if size_byte & 0x80 == 0x80 {
                let size = zmachine.read_byte(property_address + 1)? as usize & 0x3F;
                (prop_num, 2, if size == 0 { 64 } else { size })
            } else if size_byte & 0x40 == 0x40 {
                (prop_num, 1, 2)
            } else {
                (prop_num, 1, 1)
            }
        };

        // Properties are in descending order, so stop as soon as the
        // number walks past the target
        match prop_num.cmp(&property) {
            Ordering::Equal => return Ok(property_address),
            Ordering::Less => return Ok(0),
            Ordering::Greater => {
                property_address = property_address + prop_data + prop_size;
                size_byte = zmachine.read_byte(property_address)?;
            }
        }
    }

    Ok(0)
}

/// Gets the data size of the property block at an address
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `property_address` - Byte address of the property block
///
/// # Returns
/// [Result] with the property size in bytes or a [RuntimeError]
fn size(zmachine: &ZMachine, property_address: usize) -> Result<usize, RuntimeError> {
    let size_byte = zmachine.read_byte(property_address)?;
    if zmachine.version() < 4 {
        Ok((size_byte as usize >> 5) + 1)
    } else if size_byte & 0x80 == 0x80 {
        let size = zmachine.read_byte(property_address + 1)? as usize & 0x3F;
        Ok(if size == 0 { 64 } else { size })
    } else if size_byte & 0x40 == 0x40 {
        Ok(2)
    } else {
        Ok(1)
    }
}

/// Gets the address of the property data within a block
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `property_address` - Byte address of the property block
///
/// # Returns
/// [Result] with the byte address of the property data or a [RuntimeError]
fn data_address(zmachine: &ZMachine, property_address: usize) -> Result<usize, RuntimeError> {
    if zmachine.version() < 4 {
        Ok(property_address + 1)
    } else {
        let b = zmachine.read_byte(property_address)?;
        if b & 0x80 == 0x80 {
            Ok(property_address + 2)
        } else {
            Ok(property_address + 1)
        }
    }
}

/// Gets the data address of an object's property.
///
/// If the property does not exist for the object, 0 is returned.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
/// * `property` - Property number
///
/// # Returns
/// [Result] with the byte address of the property data, 0, or a [RuntimeError]
pub fn property_data_address(
    zmachine: &ZMachine,
    object: usize,
    property: u8,
) -> Result<usize, RuntimeError> {
    let property_address = address(zmachine, object, property)?;
    if property_address == 0 {
        Ok(0)
    } else {
        data_address(zmachine, property_address)
    }
}

/// Gets the length of a property's data, given its data address.
///
/// If `property_data_address` is 0, 0 is returned.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `property_data_address` - Byte address of the property data
///
/// # Returns
/// [Result] with the length of the property data, 0, or a [RuntimeError]
pub fn property_length(
    zmachine: &ZMachine,
    property_data_address: usize,
) -> Result<usize, RuntimeError> {
    if property_data_address == 0 {
        return Ok(0);
    }

    let size_byte = zmachine.read_byte(property_data_address - 1)?;
    if zmachine.version() < 4 {
        size(zmachine, property_data_address - 1)
    } else if size_byte & 0x80 == 0x80 {
        size(zmachine, property_data_address - 2)
    } else {
        size(zmachine, property_data_address - 1)
    }
}

/// Gets the encoded ztext of an object's short name
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the ztext words of the short name or a [RuntimeError]
pub fn short_name(zmachine: &ZMachine, object: usize) -> Result<Vec<u16>, RuntimeError> {
    let property_table_address = property_table_address(zmachine, object)?;
    let word_count = zmachine.read_byte(property_table_address)? as usize;
    let mut ztext = Vec::new();
    for i in 0..word_count {
        ztext.push(zmachine.read_word(property_table_address + 1 + (i * 2))?);
    }

    Ok(ztext)
}

/// Gets the default value of a property from the defaults table
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `property` - Property number
///
/// # Returns
/// [Result] with the default word value or a [RuntimeError]
fn default_property(zmachine: &ZMachine, property: u8) -> Result<u16, RuntimeError> {
    let object_table = zmachine.header_word(HeaderField::ObjectTable)? as usize;
    zmachine.read_word(object_table + ((property as usize - 1) * 2))
}

/// Gets the value of a property for an object.
///
/// The property data must be a byte or a word.  If the property does not
/// exist on the object, the default value is returned.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
/// * `property` - Property number
///
/// # Returns
/// [Result] with the property value or a [RuntimeError]
pub fn property(zmachine: &ZMachine, object: usize, property: u8) -> Result<u16, RuntimeError> {
    let property_address = address(zmachine, object, property)?;
    if property_address == 0 {
        default_property(zmachine, property)
    } else {
        let property_size = size(zmachine, property_address)?;
        let property_data_address = data_address(zmachine, property_address)?;
        match property_size {
            1 => Ok(zmachine.read_byte(property_data_address)? as u16),
            2 => zmachine.read_word(property_data_address),
            _ => fatal_error!(
                ErrorCode::InvalidObjectProperty,
                "Read of property {} on object {} should have size 1 or 2, was {}",
                property,
                object,
                property_size
            ),
        }
    }
}

/// Gets the next property set on an object.
///
/// Properties are stored in descending number order.  A `property` of 0
/// yields the object's first property number; if there is no next
/// property, 0 is returned.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
/// * `property` - Property number, or 0 for the first
///
/// # Returns
/// [Result] with the next property number, 0, or a [RuntimeError]
pub fn next_property(
    zmachine: &ZMachine,
    object: usize,
    property: u8,
) -> Result<u8, RuntimeError> {
    let mask = if zmachine.version() < 4 { 0x1F } else { 0x3F };
    if property == 0 {
        let table = property_table_address(zmachine, object)?;
        let header_size = zmachine.read_byte(table)? as usize;
        let first = zmachine.read_byte(table + 1 + (header_size * 2))?;
        Ok(first & mask)
    } else {
        let property_address = address(zmachine, object, property)?;
        if property_address == 0 {
            Ok(0)
        } else {
            let length = size(zmachine, property_address)?;
            let next = zmachine
                .read_byte(property_data_address(zmachine, object, property)? + length)?;
            Ok(next & mask)
        }
    }
}

/// Sets the value of a property for an object.
///
/// If the property does not exist, this is a silent no-op.  The property
/// data must be a byte or a word; a byte property stores the low byte of
/// `value`.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object number
/// * `property` - Property number
/// * `value` - Value to set
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn set_property(
    zmachine: &mut ZMachine,
    object: usize,
    property: u8,
    value: u16,
) -> Result<(), RuntimeError> {
    let property_address = address(zmachine, object, property)?;
    if property_address == 0 {
        debug!(target: "app::object", "Object {} has no property {}, ignoring write", object, property);
        return Ok(());
    }

    let property_size = size(zmachine, property_address)?;
    let property_data = data_address(zmachine, property_address)?;
    match property_size {
        1 => zmachine.write_byte(property_data, value as u8),
        2 => zmachine.write_word(property_data, value),
        _ => fatal_error!(
            ErrorCode::InvalidObjectProperty,
            "Write of property {} on object {} should have size 1 or 2, was {}",
            property,
            object,
            property_size
        ),
    }
}
