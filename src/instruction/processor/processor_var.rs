//! VAR instructions
use crate::instruction::{Instruction, NextPc, OperandType};
use crate::text;
use crate::zmachine::{frame::CallType, header::HeaderField, InterruptResult, ZMachine};
use crate::{error::*, object};

use super::{branch, call_fn, operand_values, store_result};

pub fn call_vs(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    call_fn(
        zmachine,
        operands[0],
        instruction,
        &operands[1..],
        CallType::Function,
    )
}

pub fn call_vs2(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    call_vs(zmachine, instruction)
}

pub fn storew(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let address = operands[0] as usize + (2 * operands[1] as usize);
    zmachine.write_word(address, operands[2])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn storeb(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let address = operands[0] as usize + operands[1] as usize;
    zmachine.write_byte(address, operands[2] as u8)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn put_prop(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    object::property::set_property(
        zmachine,
        operands[0] as usize,
        operands[1] as u8,
        operands[2],
    )?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn read(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let text_buffer = operands[0] as usize;
    let parse_buffer = if operands.len() > 1 {
        operands[1] as usize
    } else {
        0
    };
    let (time, routine) = if operands.len() > 3 {
        (operands[2], operands[3])
    } else {
        (0, 0)
    };

    // Reading implies a status line refresh in V1-3
    if zmachine.version() < 4 {
        zmachine.status_line()?;
    }

    let capacity = zmachine.read_byte(text_buffer)? as usize;
    let max = if zmachine.version() < 5 {
        capacity.saturating_sub(1)
    } else {
        capacity
    };

    // V5+ may pre-load input typed before a timed read was interrupted
    let mut input: Vec<u16> = Vec::new();
    if zmachine.version() >= 5 {
        let existing = zmachine.read_byte(text_buffer + 1)? as usize;
        for i in 0..existing {
            input.push(zmachine.read_byte(text_buffer + 2 + i)? as u16);
        }
    }

    let terminators = zmachine.input_terminators()?;
    let terminator = if time > 0 && routine > 0 {
        let address = zmachine.packed_routine_address(routine)?;
        loop {
            match zmachine.read_line(&mut input, max, &terminators, time) {
                Some(terminator) => break terminator,
                None => match zmachine.call_interrupt(address)? {
                    InterruptResult::Quit => return Ok(NextPc::Quit),
                    InterruptResult::Restart => {
                        return Ok(NextPc::Address(instruction.next_address()))
                    }
                    InterruptResult::Continue(0) => continue,
                    InterruptResult::Continue(_) => {
                        // A non-zero interrupt return aborts the read
                        input.clear();
                        break 0;
                    }
                },
            }
        }
    } else {
        zmachine
            .read_line(&mut input, max, &terminators, 0)
            .unwrap_or(0)
    };

    if zmachine.version() < 5 {
        let mut address = text_buffer + 1;
        for c in &input {
            zmachine.write_byte(address, (*c as u8).to_ascii_lowercase())?;
            address += 1;
        }
        zmachine.write_byte(address, 0)?;
    } else {
        zmachine.write_byte(text_buffer + 1, input.len() as u8)?;
        for (i, c) in input.iter().enumerate() {
            zmachine.write_byte(text_buffer + 2 + i, (*c as u8).to_ascii_lowercase())?;
        }
    }

    if parse_buffer > 0 {
        let dictionary = zmachine.header_word(HeaderField::Dictionary)? as usize;
        text::parse_text(zmachine, text_buffer, parse_buffer, dictionary, false)?;
    }

    if zmachine.version() >= 5 {
        store_result(zmachine, instruction, terminator)?;
    }

    Ok(NextPc::Address(instruction.next_address()))
}

pub fn print_char(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.print(&[operands[0]])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn print_num(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let text: Vec<u16> = format!("{}", operands[0] as i16)
        .bytes()
        .map(|b| b as u16)
        .collect();
    zmachine.print(&text)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn random(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let range = operands[0] as i16;
    if range > 0 {
        let value = zmachine.random(range as u16);
        store_result(zmachine, instruction, value)?;
    } else if range == 0 {
        // RANDOM 0 re-seeds from entropy
        zmachine.randomize();
        store_result(zmachine, instruction, 0)?;
    } else {
        // A negative range seeds deterministically
        zmachine.seed_random(range.unsigned_abs());
        store_result(zmachine, instruction, 0)?;
    }

    Ok(NextPc::Address(instruction.next_address()))
}

pub fn push(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.set_variable(0, operands[0])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn pull(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = zmachine.variable(0)?;
    // Indirect: pulling to the stack replaces the top value
    zmachine.set_variable_indirect(operands[0] as u8, value)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn split_window(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.screen_mut().split_screen(operands[0]);
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn set_window(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.screen_mut().set_window(operands[0]);
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn erase_window(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let window = operands[0] as i16;
    if window == -1 {
        // Erase the whole screen and remove the split
        zmachine.screen_mut().erase_window(0);
        zmachine.screen_mut().erase_window(1);
        zmachine.screen_mut().split_screen(0);
    } else {
        zmachine.screen_mut().erase_window(window);
    }
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn erase_line(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    operand_values(zmachine, instruction)?;
    zmachine.screen_mut().erase_line();
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn set_cursor(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.screen_mut().set_cursor(operands[0], operands[1]);
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn get_cursor(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let (row, column) = zmachine.screen_mut().cursor();
    zmachine.write_word(operands[0] as usize, row)?;
    zmachine.write_word(operands[0] as usize + 2, column)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn set_text_style(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.screen_mut().set_text_style(operands[0]);
    // A style change can change the font metrics
    if zmachine.version() >= 5 {
        let (width, height) = zmachine.screen().font_size();
        zmachine.write_byte(HeaderField::FontWidth as usize, width)?;
        zmachine.write_byte(HeaderField::FontHeight as usize, height)?;
    }
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn buffer_mode(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    // Output is unbuffered, so there is nothing to flush
    operand_values(zmachine, instruction)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn output_stream(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let stream = operands[0] as i16;
    let table = if operands.len() > 1 {
        Some(operands[1] as usize)
    } else {
        None
    };
    zmachine.output_stream(stream, table)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn input_stream(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    zmachine.input_stream(operands[0])?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn sound_effect(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    // No sound hardware: honor only the end-of-playback routine of a
    // "start" effect, invoked as a procedure
    if operands.len() > 3 && operands[1] == 2 && operands[3] != 0 {
        let address = zmachine.packed_routine_address(operands[3])?;
        return zmachine.call_routine(address, &[], CallType::Procedure, instruction);
    }

    Ok(NextPc::Address(instruction.next_address()))
}

pub fn read_char(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let (time, routine) = if operands.len() > 2 {
        (operands[1], operands[2])
    } else {
        (0, 0)
    };

    let key = if time > 0 && routine > 0 {
        let address = zmachine.packed_routine_address(routine)?;
        loop {
            match zmachine.read_key(time) {
                Some(key) => break key,
                None => match zmachine.call_interrupt(address)? {
                    InterruptResult::Quit => return Ok(NextPc::Quit),
                    InterruptResult::Restart => {
                        return Ok(NextPc::Address(instruction.next_address()))
                    }
                    InterruptResult::Continue(0) => continue,
                    InterruptResult::Continue(_) => break 0,
                },
            }
        }
    } else {
        zmachine.read_key(0).unwrap_or(0)
    };

    store_result(zmachine, instruction, key)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn scan_table(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = operands[0];
    let table = operands[1] as usize;
    let count = operands[2] as usize;
    let form = if operands.len() > 3 { operands[3] } else { 0x82 };
    let word_search = form & 0x80 == 0x80;
    let width = (form & 0x7F) as usize;

    for i in 0..count {
        let address = table + (i * width);
        let data = if word_search {
            zmachine.read_word(address)?
        } else {
            zmachine.read_byte(address)? as u16
        };
        if data == value {
            store_result(zmachine, instruction, address as u16)?;
            return branch(zmachine, instruction, true);
        }
    }

    store_result(zmachine, instruction, 0)?;
    branch(zmachine, instruction, false)
}

pub fn not(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = match instruction.operands()[0].operand_type() {
        OperandType::SmallConstant => !operands[0] & 0xFF,
        _ => !operands[0],
    };
    store_result(zmachine, instruction, value)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn call_vn(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    call_fn(
        zmachine,
        operands[0],
        instruction,
        &operands[1..],
        CallType::Procedure,
    )
}

pub fn call_vn2(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    call_vn(zmachine, instruction)
}

pub fn tokenise(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let text_buffer = operands[0] as usize;
    let parse_buffer = operands[1] as usize;
    let dictionary = if operands.len() > 2 && operands[2] != 0 {
        operands[2] as usize
    } else {
        zmachine.header_word(HeaderField::Dictionary)? as usize
    };
    let flag = operands.len() > 3 && operands[3] != 0;

    text::parse_text(zmachine, text_buffer, parse_buffer, dictionary, flag)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn encode_text(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let text_address = operands[0] as usize;
    let length = operands[1] as usize;
    let from = operands[2] as usize;
    let destination = operands[3] as usize;

    let mut zscii = Vec::new();
    for i in 0..length {
        zscii.push(zmachine.read_byte(text_address + from + i)? as u16);
    }

    let words = if zmachine.version() < 4 { 2 } else { 3 };
    let encoded = text::encode_words(zmachine, &zscii, words)?;
    for (i, w) in encoded.iter().enumerate() {
        zmachine.write_word(destination + (i * 2), *w)?;
    }

    Ok(NextPc::Address(instruction.next_address()))
}

pub fn copy_table(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let first = operands[0] as usize;
    let second = operands[1] as usize;
    let size = operands[2] as i16;

    if second == 0 {
        // Zero the source region
        for i in 0..size.unsigned_abs() as usize {
            zmachine.write_byte(first + i, 0)?;
        }
    } else if size < 0 {
        // Negative size forces a forward copy, overlap be damned
        for i in 0..size.unsigned_abs() as usize {
            let b = zmachine.read_byte(first + i)?;
            zmachine.write_byte(second + i, b)?;
        }
    } else {
        // Copy backwards so a forward overlap is safe
        for i in (0..size as usize).rev() {
            let b = zmachine.read_byte(first + i)?;
            zmachine.write_byte(second + i, b)?;
        }
    }

    Ok(NextPc::Address(instruction.next_address()))
}

pub fn print_table(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let table = operands[0] as usize;
    let width = operands[1] as usize;
    let height = if operands.len() > 2 { operands[2] } else { 1 };
    let skip = if operands.len() > 3 { operands[3] } else { 0 };

    if height == 0 {
        return Ok(NextPc::Address(instruction.next_address()));
    }

    let (row, column) = zmachine.screen_mut().cursor();
    let mut address = table;
    for line in 0..height {
        if line > 0 {
            zmachine.screen_mut().set_cursor(row + line, column);
        }
        let mut text = Vec::new();
        for i in 0..width {
            text.push(zmachine.read_byte(address + i)? as u16);
        }
        zmachine.print(&text)?;
        address += width + skip as usize;
    }

    Ok(NextPc::Address(instruction.next_address()))
}

pub fn check_arg_count(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let count = zmachine.argument_count()? as u16;
    branch(zmachine, instruction, count >= operands[0])
}
