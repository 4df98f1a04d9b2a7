//! 0OP instructions
use crate::instruction::{Instruction, NextPc};
use crate::text;
use crate::zmachine::{header::HeaderField, ZMachine};
use crate::{error::*, fatal_error};

use super::{branch, restore_result, store_result};

pub fn rtrue(zmachine: &mut ZMachine, _instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    zmachine.return_routine(1)
}

pub fn rfalse(zmachine: &mut ZMachine, _instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    zmachine.return_routine(0)
}

pub fn print(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let ztext = zmachine.string_literal(instruction.next_address())?;
    let text = text::decode(zmachine, &ztext, false)?;
    zmachine.print(&text)?;
    Ok(NextPc::Address(instruction.next_address() + (ztext.len() * 2)))
}

pub fn print_ret(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let ztext = zmachine.string_literal(instruction.next_address())?;
    let text = text::decode(zmachine, &ztext, false)?;
    zmachine.print(&text)?;
    zmachine.new_line()?;
    zmachine.return_routine(1)
}

pub fn nop(_zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn save(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    if zmachine.version() < 4 {
        // The state is captured with the pc at the branch descriptor, so
        // a later RESTORE can take this branch as on success
        let descriptor = match instruction.branch() {
            Some(b) => b.address(),
            None => {
                return fatal_error!(
                    ErrorCode::InvalidInstruction,
                    "V1-3 SAVE should have a branch descriptor"
                )
            }
        };
        match zmachine.save(descriptor) {
            Ok(_) => branch(zmachine, instruction, true),
            Err(e) if e.is_recoverable() => {
                warn!(target: "app::state", "SAVE failed: {}", e);
                branch(zmachine, instruction, false)
            }
            Err(e) => Err(e),
        }
    } else {
        // The pc is captured past the store byte; RESTORE stores 2
        // through the byte at pc - 1
        match zmachine.save(instruction.next_address()) {
            Ok(_) => {
                store_result(zmachine, instruction, 1)?;
                Ok(NextPc::Address(instruction.next_address()))
            }
            Err(e) if e.is_recoverable() => {
                warn!(target: "app::state", "SAVE failed: {}", e);
                store_result(zmachine, instruction, 0)?;
                Ok(NextPc::Address(instruction.next_address()))
            }
            Err(e) => Err(e),
        }
    }
}

pub fn restore(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    match zmachine.restore() {
        Ok(pc) => restore_result(zmachine, pc),
        Err(e) if e.is_recoverable() => {
            warn!(target: "app::state", "RESTORE failed: {}", e);
            if zmachine.version() < 4 {
                branch(zmachine, instruction, false)
            } else {
                store_result(zmachine, instruction, 0)?;
                Ok(NextPc::Address(instruction.next_address()))
            }
        }
        Err(e) => Err(e),
    }
}

pub fn restart(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    zmachine.request_restart();
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn ret_popped(
    zmachine: &mut ZMachine,
    _instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    let value = zmachine.variable(0)?;
    zmachine.return_routine(value)
}

pub fn pop(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    zmachine.variable(0)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn catch(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let frame_number = zmachine.catch()?;
    store_result(zmachine, instruction, frame_number)?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn quit(_zmachine: &mut ZMachine, _instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    Ok(NextPc::Quit)
}

pub fn new_line(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    zmachine.new_line()?;
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn show_status(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    // Known to appear spuriously in some V5 stories; a no-op past V3
    if zmachine.version() < 4 {
        zmachine.status_line()?;
    }
    Ok(NextPc::Address(instruction.next_address()))
}

pub fn verify(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    let expected = zmachine.header_word(HeaderField::Checksum)?;
    let checksum = zmachine.checksum()?;

    branch(zmachine, instruction, expected == checksum)
}

pub fn piracy(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<NextPc, RuntimeError> {
    branch(zmachine, instruction, true)
}

#[cfg(test)]
mod tests {
    use crate::{assert_ok_eq, test_util::*, zmachine::frame::CallType};

    use super::*;

    #[test]
    fn test_rtrue_rfalse() {
        let mut v = test_map(5);
        v[0x480] = 0x80;
        set_variable(&mut v, 0x80, 0xFF);
        let mut zmachine = mock_machine(v);
        mock_frame(&mut zmachine, 0x480, 0x500, CallType::Function);
        let i = mock_instruction_at(5, 0x500, 0x501);
        assert_ok_eq!(rtrue(&mut zmachine, &i), NextPc::Address(0x481));
        assert_eq!(zmachine.frame_count(), 1);
        assert_ok_eq!(zmachine.variable(0x80), 1);

        mock_frame(&mut zmachine, 0x480, 0x500, CallType::Function);
        assert_ok_eq!(rfalse(&mut zmachine, &i), NextPc::Address(0x481));
        assert_ok_eq!(zmachine.variable(0x80), 0);
    }

    #[test]
    fn test_print() {
        let mut v = test_map(3);
        // "hi": 0 00100 01101 01110 with terminator... h=0xD, i=0xE
        // 1 00101 01101 01110 -> pad 5 first? hi = 0xD,0xE,5: 1 01101 01110 00101
        v[0x501] = 0xB5;
        v[0x502] = 0xC5;
        let mut zmachine = mock_machine(v);
        let i = mock_instruction_at(3, 0x500, 0x501);
        assert_ok_eq!(print(&mut zmachine, &i), NextPc::Address(0x503));
        assert_eq!(print_output(), "hi");
    }

    #[test]
    fn test_print_ret() {
        let mut v = test_map(5);
        v[0x480] = 0x80;
        set_variable(&mut v, 0x80, 0xFF);
        // "hi" as above
        v[0x501] = 0xB5;
        v[0x502] = 0xC5;
        let mut zmachine = mock_machine(v);
        mock_frame(&mut zmachine, 0x480, 0x500, CallType::Function);
        let i = mock_instruction_at(5, 0x500, 0x501);
        assert_ok_eq!(print_ret(&mut zmachine, &i), NextPc::Address(0x481));
        assert_eq!(print_output(), "hi\n");
        assert_ok_eq!(zmachine.variable(0x80), 1);
    }

    #[test]
    fn test_ret_popped() {
        let mut v = test_map(5);
        v[0x480] = 0x80;
        set_variable(&mut v, 0x80, 0xFF);
        let mut zmachine = mock_machine(v);
        mock_frame(&mut zmachine, 0x480, 0x500, CallType::Function);
        zmachine.set_variable(0, 0x1234).unwrap();
        let i = mock_instruction_at(5, 0x500, 0x501);
        assert_ok_eq!(ret_popped(&mut zmachine, &i), NextPc::Address(0x481));
        assert_ok_eq!(zmachine.variable(0x80), 0x1234);
    }

    #[test]
    fn test_pop_and_catch() {
        let mut v = test_map(5);
        set_variable(&mut v, 0x80, 0xFF);
        let mut zmachine = mock_machine(v);
        zmachine.set_variable(0, 0x1234).unwrap();
        let i = mock_instruction_at(5, 0x480, 0x481);
        assert_ok_eq!(pop(&mut zmachine, &i), NextPc::Address(0x481));

        mock_frame(&mut zmachine, 0x481, 0x500, CallType::Procedure);
        let i = mock_store_instruction(5, Some(0x80), 0x502);
        assert_ok_eq!(catch(&mut zmachine, &i), NextPc::Address(0x502));
        assert_ok_eq!(zmachine.variable(0x80), 1);
    }

    #[test]
    fn test_quit() {
        let v = test_map(5);
        let mut zmachine = mock_machine(v);
        let i = mock_instruction_at(5, 0x480, 0x481);
        assert_ok_eq!(quit(&mut zmachine, &i), NextPc::Quit);
    }

    #[test]
    fn test_new_line() {
        let v = test_map(5);
        let mut zmachine = mock_machine(v);
        let i = mock_instruction_at(5, 0x480, 0x481);
        assert_ok_eq!(new_line(&mut zmachine, &i), NextPc::Address(0x481));
        assert_eq!(print_output(), "\n");
    }

    #[test]
    fn test_show_status_v3() {
        let mut v = test_map(3);
        mock_object_tree(&mut v, 3);
        // Location object 5 ("pet"), score 10, turns 20
        set_variable(&mut v, 16, 5);
        set_variable(&mut v, 17, 10);
        set_variable(&mut v, 18, 20);
        let mut zmachine = mock_machine(v);
        let i = mock_instruction_at(3, 0x480, 0x481);
        assert_ok_eq!(show_status(&mut zmachine, &i), NextPc::Address(0x481));
        assert_eq!(status(), ("pet".to_string(), 10, 20, false));
    }

    #[test]
    fn test_show_status_v5_is_noop() {
        let mut v = test_map(5);
        mock_object_tree(&mut v, 5);
        set_variable(&mut v, 16, 5);
        let mut zmachine = mock_machine(v);
        let i = mock_instruction_at(5, 0x480, 0x481);
        assert_ok_eq!(show_status(&mut zmachine, &i), NextPc::Address(0x481));
        assert_eq!(status().0, "");
    }

    #[test]
    fn test_verify() {
        let mut v = test_map(3);
        // File length 0x800 bytes in V3
        v[0x1A] = 0x4;
        v[0x1B] = 0;
        for (i, b) in (0x40..0x800).enumerate() {
            v[i + 0x40] = b as u8;
        }
        // Checksum of the constructed map
        v[0x1C] = 0xF4;
        v[0x1D] = 0x20;
        let mut zmachine = mock_machine(v);
        let i = mock_branch_instruction(3, true, 0x500, 0x482);
        assert_ok_eq!(verify(&mut zmachine, &i), NextPc::Address(0x500));
    }

    #[test]
    fn test_verify_bad_checksum() {
        let mut v = test_map(3);
        v[0x1A] = 0x4;
        v[0x1B] = 0;
        v[0x1C] = 0x12;
        v[0x1D] = 0x34;
        let mut zmachine = mock_machine(v);
        let i = mock_branch_instruction(3, true, 0x500, 0x482);
        assert_ok_eq!(verify(&mut zmachine, &i), NextPc::Address(0x482));
    }

    #[test]
    fn test_piracy() {
        let v = test_map(5);
        let mut zmachine = mock_machine(v);
        let i = mock_branch_instruction(5, true, 0x500, 0x482);
        assert_ok_eq!(piracy(&mut zmachine, &i), NextPc::Address(0x500));
    }

    #[test]
    fn test_restart_requests() {
        let v = test_map(5);
        let mut zmachine = mock_machine(v);
        let i = mock_instruction_at(5, 0x480, 0x481);
        assert!(!zmachine.restart_pending());
        assert_ok_eq!(restart(&mut zmachine, &i), NextPc::Address(0x481));
        assert!(zmachine.restart_pending());
    }

    #[test]
    fn test_save_restore_round_trip_v3() {
        let dir = tempfile::tempdir().unwrap();
        set_filename(Some(dir.path().join("game.zav")));

        let mut v = test_map(3);
        // SAVE with a branch descriptor at 0x480: branch on true to 0x490
        v[0x480] = 0xB5;
        v[0x481] = 0xC0 | 0x12;
        let mut zmachine = mock_machine(v);
        let i = crate::instruction::decoder::decode_instruction(&zmachine, 0x480).unwrap();
        // 0x482 + 0x12 - 2 = 0x492
        assert_ok_eq!(save(&mut zmachine, &i), NextPc::Address(0x492));

        // Mutate some dynamic memory, then restore
        zmachine.write_byte(0x300, 0xAA).unwrap();
        let r = mock_instruction_at(3, 0x4A0, 0x4A1);
        assert_ok_eq!(restore(&mut zmachine, &r), NextPc::Address(0x492));
        assert_ok_eq!(zmachine.read_byte(0x300), 0);
    }

    #[test]
    fn test_save_cancelled() {
        set_filename(None);
        let mut v = test_map(3);
        v[0x480] = 0xB5;
        v[0x481] = 0xC0 | 0x12;
        let mut zmachine = mock_machine(v);
        let i = crate::instruction::decoder::decode_instruction(&zmachine, 0x480).unwrap();
        // Branch not taken on failure
        assert_ok_eq!(save(&mut zmachine, &i), NextPc::Address(0x482));
    }

    #[test]
    fn test_restore_cancelled_v4_stores_zero() {
        set_filename(None);
        let mut v = test_map(4);
        set_variable(&mut v, 0x80, 0xFF);
        let mut zmachine = mock_machine(v);
        let i = mock_store_instruction(4, Some(0x80), 0x482);
        assert_ok_eq!(restore(&mut zmachine, &i), NextPc::Address(0x482));
        assert_ok_eq!(zmachine.variable(0x80), 0);
    }
}
