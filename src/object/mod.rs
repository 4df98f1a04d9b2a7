//! Object tree operations
//!
//! Objects are numbered from 1; object 0 means "none" and is never
//! dereferenced.  V1-3 entries are 9 bytes with byte-sized relatives,
//! V4+ entries are 14 bytes with word-sized relatives.

use crate::{
    error::*,
    fatal_error,
    zmachine::{header::HeaderField, ZMachine},
};

pub mod attribute;
pub mod property;

/// Gets the byte address of an object's table entry
///
/// If `object` is 0, 0 is returned.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the byte address of the object table entry, 0, or a [RuntimeError]
fn object_address(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    if object == 0 {
        Ok(0)
    } else {
        let table = zmachine.header_word(HeaderField::ObjectTable)? as usize;
        let (defaults_size, entry_size) = if zmachine.version() < 4 {
            (62, 9)
        } else {
            (126, 14)
        };

        Ok(table + defaults_size + (entry_size * (object - 1)))
    }
}

/// Gets a relative (parent, sibling, or child) of an object
///
/// If `object` is 0, 0 is returned.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
/// * `offset` - Byte offset of the relative in the object's table entry
///
/// # Returns
/// [Result] with the relative object number, 0, or a [RuntimeError]
fn relative(zmachine: &ZMachine, object: usize, offset: usize) -> Result<usize, RuntimeError> {
    if object == 0 {
        Ok(0)
    } else {
        let object_address = object_address(zmachine, object)?;

        if zmachine.version() < 4 {
            Ok(zmachine.read_byte(object_address + offset)? as usize)
        } else {
            Ok(zmachine.read_word(object_address + offset)? as usize)
        }
    }
}

/// Sets a relative (parent, sibling, or child) of an object
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object number
/// * `offset` - Byte offset of the relative in the object's table entry
/// * `relative` - New relative object number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
fn set_relative(
    zmachine: &mut ZMachine,
    object: usize,
    offset: usize,
    relative: usize,
) -> Result<(), RuntimeError> {
    let object_address = object_address(zmachine, object)?;

    if zmachine.version() < 4 {
        zmachine.write_byte(object_address + offset, relative as u8)
    } else {
        zmachine.write_word(object_address + offset, relative as u16)
    }
}

fn parent_offset(zmachine: &ZMachine) -> usize {
    if zmachine.version() < 4 {
        4
    } else {
        6
    }
}

fn sibling_offset(zmachine: &ZMachine) -> usize {
    if zmachine.version() < 4 {
        5
    } else {
        8
    }
}

fn child_offset(zmachine: &ZMachine) -> usize {
    if zmachine.version() < 4 {
        6
    } else {
        10
    }
}

/// Gets an object's parent
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the parent object number, 0, or a [RuntimeError]
pub fn parent(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    relative(zmachine, object, parent_offset(zmachine))
}

/// Gets an object's sibling
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the sibling object number, 0, or a [RuntimeError]
pub fn sibling(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    relative(zmachine, object, sibling_offset(zmachine))
}

/// Gets an object's first child
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the child object number, 0, or a [RuntimeError]
pub fn child(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    relative(zmachine, object, child_offset(zmachine))
}

/// Sets an object's parent.
///
/// Only the table entry for `object` is updated; the tree is not
/// otherwise adjusted.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object number
/// * `parent` - New parent object number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn set_parent(
    zmachine: &mut ZMachine,
    object: usize,
    parent: usize,
) -> Result<(), RuntimeError> {
    set_relative(zmachine, object, parent_offset(zmachine), parent)
}

/// Sets an object's sibling.
///
/// Only the table entry for `object` is updated; the tree is not
/// otherwise adjusted.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object number
/// * `sibling` - New sibling object number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn set_sibling(
    zmachine: &mut ZMachine,
    object: usize,
    sibling: usize,
) -> Result<(), RuntimeError> {
    set_relative(zmachine, object, sibling_offset(zmachine), sibling)
}

/// Sets an object's first child.
///
/// Only the table entry for `object` is updated; the tree is not
/// otherwise adjusted.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object number
/// * `child` - New child object number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn set_child(
    zmachine: &mut ZMachine,
    object: usize,
    child: usize,
) -> Result<(), RuntimeError> {
    set_relative(zmachine, object, child_offset(zmachine), child)
}

/// Unlinks an object from its parent's child chain.
///
/// The object's parent and sibling are set to 0.  A `parent` of 0 is a
/// no-op.  If `parent`'s child chain does not contain `object`, the
/// object table is corrupt and the error is fatal.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `parent` - The object's parent
/// * `object` - Object number
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn remove_object(
    zmachine: &mut ZMachine,
    parent: usize,
    object: usize,
) -> Result<(), RuntimeError> {
    if parent == 0 {
        return Ok(());
    }

    debug!(target: "app::object", "Remove object {} from parent {}", object, parent);
    let first = child(zmachine, parent)?;
    if first == 0 {
        return fatal_error!(
            ErrorCode::CorruptObjectTable,
            "Object {} has no children, can't remove {}",
            parent,
            object
        );
    }

    if first == object {
        let next = sibling(zmachine, object)?;
        set_child(zmachine, parent, next)?;
    } else {
        // Walk the sibling chain to find the object and its predecessor
        let mut previous = first;
        let mut current = sibling(zmachine, previous)?;
        while current != object && current != 0 {
            previous = current;
            current = sibling(zmachine, previous)?;
        }

        if current == 0 {
            return fatal_error!(
                ErrorCode::CorruptObjectTable,
                "Object {} is not a child of object {}",
                object,
                parent
            );
        }

        let next = sibling(zmachine, current)?;
        set_sibling(zmachine, previous, next)?;
    }

    set_sibling(zmachine, object, 0)?;
    set_parent(zmachine, object, 0)
}

/// Inserts an object as the first child of another.
///
/// The object is first unlinked from its current parent, if any.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `object` - Object to insert
/// * `destination` - New parent object
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn insert_object(
    zmachine: &mut ZMachine,
    object: usize,
    destination: usize,
) -> Result<(), RuntimeError> {
    debug!(target: "app::object", "Insert object {} into {}", object, destination);
    let old_parent = parent(zmachine, object)?;
    if old_parent > 0 {
        remove_object(zmachine, old_parent, object)?;
    }

    let old_first = child(zmachine, destination)?;
    set_sibling(zmachine, object, old_first)?;
    set_child(zmachine, destination, object)?;
    set_parent(zmachine, object, destination)
}
