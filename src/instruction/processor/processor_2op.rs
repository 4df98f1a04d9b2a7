//! 2OP instructions
use crate::instruction::{Instruction, NextPc};
use crate::zmachine::{frame::CallType, header::HeaderField, ZMachine};
use crate::{error::*, fatal_error, object};

use super::{branch, call_fn, operand_values, store_result};

pub fn je(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    if operands.len() < 2 {
        return fatal_error!(
            ErrorCode::InvalidInstruction,
            "JE requires at least 2 operands: {}",
            instruction
        );
    }

    let equal = operands[1..].iter().any(|o| *o == operands[0]);
    branch(zmachine, instruction, equal)
}

pub fn jl(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    branch(
        zmachine,
        instruction,
        (operands[0] as i16) < (operands[1] as i16),
    )
}

pub fn jg(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    branch(
        zmachine,
        instruction,
        (operands[0] as i16) > (operands[1] as i16),
    )
}

pub fn dec_chk(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let variable = operands[0] as u8;
    // Mutate in place, then compare signed
    let value = zmachine.variable(variable)?.wrapping_sub(1);
    zmachine.set_variable(variable, value)?;
    branch(
        zmachine,
        instruction,
        (value as i16) < (operands[1] as i16),
    )
}

pub fn inc_chk(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let variable = operands[0] as u8;
    let value = zmachine.variable(variable)?.wrapping_add(1);
    zmachine.set_variable(variable, value)?;
    branch(
        zmachine,
        instruction,
        (value as i16) > (operands[1] as i16),
    )
}

pub fn jin(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let parent = object::parent(zmachine, operands[0] as usize)?;
    branch(zmachine, instruction, parent as u16 == operands[1])
}

pub fn test(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    branch(
        zmachine,
        instruction,
        operands[0] & operands[1] == operands[1],
    )
}

pub fn or(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    store_result(zmachine, instruction, operands[0] | operands[1])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn and(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    store_result(zmachine, instruction, operands[0] & operands[1])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn test_attr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = object::attribute::value(zmachine, operands[0] as usize, operands[1])?;
    branch(zmachine, instruction, value)
}

pub fn set_attr(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    object::attribute::set(zmachine, operands[0] as usize, operands[1])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn clear_attr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    object::attribute::clear(zmachine, operands[0] as usize, operands[1])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn store(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    // Indirect variable reference: storing to the stack replaces the top
    zmachine.set_variable_indirect(operands[0] as u8, operands[1])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn insert_obj(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    object::insert_object(zmachine, operands[0] as usize, operands[1] as usize)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn loadw(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let address = operands[0] as usize + (2 * operands[1] as usize);
    let value = zmachine.read_word(address)?;
    store_result(zmachine, instruction, value)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn loadb(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let address = operands[0] as usize + operands[1] as usize;
    let value = zmachine.read_byte(address)?;
    store_result(zmachine, instruction, value as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn get_prop(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = object::property::property(zmachine, operands[0] as usize, operands[1] as u8)?;
    store_result(zmachine, instruction, value)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn get_prop_addr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let address =
        object::property::property_data_address(zmachine, operands[0] as usize, operands[1] as u8)?;
    store_result(zmachine, instruction, address as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn get_next_prop(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let next = object::property::next_property(zmachine, operands[0] as usize, operands[1] as u8)?;
    store_result(zmachine, instruction, next as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn add(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = (operands[0] as i16).wrapping_add(operands[1] as i16);
    store_result(zmachine, instruction, value as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn sub(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = (operands[0] as i16).wrapping_sub(operands[1] as i16);
    store_result(zmachine, instruction, value as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn mul(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = (operands[0] as i16).wrapping_mul(operands[1] as i16);
    store_result(zmachine, instruction, value as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn div(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    if operands[1] == 0 {
        return fatal_error!(ErrorCode::DivideByZero, "Divide by zero");
    }

    // Signed division truncates toward zero
    let value = (operands[0] as i16).wrapping_div(operands[1] as i16);
    store_result(zmachine, instruction, value as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn modulus(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    // A zero divisor yields the dividend
    if operands[1] == 0 {
        store_result(zmachine, instruction, operands[0])?;
        return Ok(NextPc::Address(instruction.next_address()));
    }

    // The remainder takes the sign of the dividend
    let value = (operands[0] as i16).wrapping_rem(operands[1] as i16);
    store_result(zmachine, instruction, value as u16)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn call_2s(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    call_fn(
        zmachine,
        operands[0],
        instruction,
        &operands[1..],
        CallType::Function,
    )
}

pub fn call_2n(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    call_fn(
        zmachine,
        operands[0],
        instruction,
        &operands[1..],
        CallType::Procedure,
    )
}

pub fn set_colour(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    // Colour 1 means the default
    let foreground = if operands[0] == 1 {
        zmachine.header_byte(HeaderField::DefaultForeground)? as u16
    } else {
        operands[0]
    };
    let background = if operands[1] == 1 {
        zmachine.header_byte(HeaderField::DefaultBackground)? as u16
    } else {
        operands[1]
    };

    zmachine.screen_mut().set_colour(foreground, background);
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn throw(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.throw(operands[1], operands[0])
}
