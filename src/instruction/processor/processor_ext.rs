//! EXT instructions (V5+)
use crate::instruction::{Instruction, NextPc, OperandType};
use crate::zmachine::{header::HeaderField, ZMachine};
use crate::error::*;

use super::{operand_values, restore_result, store_result};

/// Read a length-prefixed filename suggestion from memory
fn suggested_name(
    zmachine: &ZMachine,
    address: usize,
) -> Result<Option<String>, RuntimeError> {
    if address == 0 {
        return Ok(None);
    }

    let length = zmachine.read_byte(address)? as usize;
    if length == 0 {
        return Ok(None);
    }

    let mut name = String::new();
    for i in 1..=length {
        name.push(zmachine.read_byte(address + i)? as char);
    }
    Ok(Some(name))
}

pub fn save(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let result = if operands.is_empty() {
        zmachine.save(instruction.next_address())
    } else {
        // Auxiliary form: dump a memory region
        let address = operands[0] as usize;
        let length = operands[1] as usize;
        let suggested = if operands.len() > 2 {
            suggested_name(zmachine, operands[2] as usize)?
        } else {
            None
        };
        zmachine.save_aux(address, length, suggested)
    };

    match result {
        Ok(_) => store_result(zmachine, instruction, 1)?,
        Err(e) if e.is_recoverable() => {
            warn!(target: "app::state", "SAVE failed: {}", e);
            store_result(zmachine, instruction, 0)?;
        }
        Err(e) => return Err(e),
    }
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn restore(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    if operands.is_empty() {
        match zmachine.restore() {
            Ok(pc) => restore_result(zmachine, pc),
            Err(e) if e.is_recoverable() => {
                warn!(target: "app::state", "RESTORE failed: {}", e);
                store_result(zmachine, instruction, 0)?;
                Ok(NextPc::Address(instruction.next_address()))
            }
            Err(e) => Err(e),
        }
    } else {
        let address = operands[0] as usize;
        let length = operands[1] as usize;
        let suggested = if operands.len() > 2 {
            suggested_name(zmachine, operands[2] as usize)?
        } else {
            None
        };
        match zmachine.restore_aux(address, length, suggested) {
            Ok(bytes) => store_result(zmachine, instruction, bytes as u16)?,
            Err(e) if e.is_recoverable() => {
                warn!(target: "app::state", "RESTORE failed: {}", e);
                store_result(zmachine, instruction, 0)?;
            }
            Err(e) => return Err(e),
        }
        Ok(NextPc::Address(instruction.next_address()))
    }
}

pub fn log_shift(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = operands[0];
    let places = operands[1] as i16;

    // Logical shifts in both directions; anything 16 or more shifts out
    let result = if places <= -16 || places >= 16 {
        0
    } else if places < 0 {
        value >> -places
    } else {
        value << places
    };

    store_result(zmachine, instruction, result)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn art_shift(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = operands[0];
    let places = operands[1] as i16;

    let result = if places >= 0 {
        if places >= 16 {
            0
        } else {
            value << places
        }
    } else {
        // Right shifts preserve the sign bit at the operand's declared width
        let distance = u32::min(-places as u32, 15);
        match instruction.operands()[0].operand_type() {
            OperandType::SmallConstant if value & 0x80 == 0x80 => {
                (((value as u8 as i8) as i16) >> distance) as u16
            }
            OperandType::SmallConstant => value >> distance,
            _ if value & 0x8000 == 0x8000 => ((value as i16) >> distance) as u16,
            _ => value >> distance,
        }
    };

    store_result(zmachine, instruction, result)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn set_font(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let previous = zmachine.screen_mut().set_font(operands[0]);
    let (width, height) = zmachine.screen().font_size();
    zmachine.write_byte(HeaderField::FontWidth as usize, width)?;
    zmachine.write_byte(HeaderField::FontHeight as usize, height)?;
    store_result(zmachine, instruction, previous)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn save_undo(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    zmachine.save_undo(instruction.next_address())?;
    store_result(zmachine, instruction, 1)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn restore_undo(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    match zmachine.restore_undo() {
        Ok(pc) => restore_result(zmachine, pc),
        Err(e) if e.is_recoverable() => {
            warn!(target: "app::state", "RESTORE_UNDO failed: {}", e);
            store_result(zmachine, instruction, 0)?;
            Ok(NextPc::Address(instruction.next_address()))
        }
        Err(e) => Err(e),
    }
}
