//! Instruction decoding
use super::*;
use crate::{error::*, zmachine::ZMachine};

fn operand_type(type_byte: u8, operand_index: u8) -> Option<OperandType> {
    // Types are packed two bits per operand: 00112233
    match (type_byte >> (6 - (operand_index * 2))) & 3 {
        0 => Some(OperandType::LargeConstant),
        1 => Some(OperandType::SmallConstant),
        2 => Some(OperandType::Variable),
        _ => None,
    }
}

fn long_operand_type(opcode: u8, index: u8) -> OperandType {
    if opcode >> (6 - index) & 1 == 1 {
        OperandType::Variable
    } else {
        OperandType::SmallConstant
    }
}

fn operand_types(
    zmachine: &ZMachine,
    opcode: &Opcode,
    mut address: usize,
) -> Result<(usize, Vec<OperandType>), RuntimeError> {
    let mut types = Vec::new();
    match opcode.form() {
        OpcodeForm::Short => {
            if let Some(t) = operand_type(opcode.opcode(), 1) {
                types.push(t);
            }
        }
        OpcodeForm::Long => {
            types.push(long_operand_type(opcode.opcode(), 0));
            types.push(long_operand_type(opcode.opcode(), 1));
        }
        OpcodeForm::Var | OpcodeForm::Ext => {
            let b = zmachine.read_byte(address)?;
            address += 1;
            for i in 0..4 {
                match operand_type(b, i) {
                    Some(t) => types.push(t),
                    None => break,
                }
            }
            // CALL_VS2 and CALL_VN2 have a second byte of operand types
            if opcode.form() == &OpcodeForm::Var
                && (opcode.opcode() == 0xEC || opcode.opcode() == 0xFA)
            {
                let b = zmachine.read_byte(address)?;
                address += 1;
                for i in 0..4 {
                    match operand_type(b, i) {
                        Some(t) => types.push(t),
                        None => break,
                    }
                }
            }
        }
    }

    Ok((address, types))
}

fn operands(
    zmachine: &ZMachine,
    operand_types: &[OperandType],
    mut address: usize,
) -> Result<(usize, Vec<Operand>), RuntimeError> {
    let mut operands = Vec::new();

    for optype in operand_types {
        match optype {
            OperandType::LargeConstant => {
                operands.push(Operand::new(*optype, zmachine.read_word(address)?));
                address += 2;
            }
            OperandType::SmallConstant | OperandType::Variable => {
                operands.push(Operand::new(*optype, zmachine.read_byte(address)? as u16));
                address += 1;
            }
        }
    }

    Ok((address, operands))
}

const STORE_INSTRUCTIONS: &[u8] = &[
    0x08, 0x28, 0x48, 0x68, 0xc8, 0x09, 0x29, 0x49, 0x69, 0xc9, 0x0F, 0x2F, 0x4F, 0x6F, 0xcf, 0x10,
    0x30, 0x50, 0x70, 0xd0, 0x11, 0x31, 0x51, 0x71, 0xd1, 0x12, 0x32, 0x52, 0x72, 0xd2, 0x13, 0x33,
    0x53, 0x73, 0xd3, 0x14, 0x34, 0x54, 0x74, 0xd4, 0x15, 0x35, 0x55, 0x75, 0xd5, 0x16, 0x36, 0x56,
    0x76, 0xd6, 0x17, 0x37, 0x57, 0x77, 0xd7, 0x18, 0x38, 0x58, 0x78, 0xd8, 0x19, 0x39, 0x59, 0x79,
    0xd9, 0x81, 0x91, 0xa1, 0x82, 0x92, 0xa2, 0x83, 0x93, 0xa3, 0x84, 0x94, 0xa4, 0x88, 0x98, 0xa8,
    0x8e, 0x9e, 0xae, 0xe0, 0xe7, 0xec, 0xf6, 0xf7, 0xf8,
];

const EXT_STORE_INSTRUCTIONS: &[u8] = &[0x00, 0x01, 0x02, 0x03, 0x04, 0x09, 0x0a];

fn is_store_instruction(opcode: &Opcode) -> bool {
    match opcode.form() {
        OpcodeForm::Ext => EXT_STORE_INSTRUCTIONS.contains(&opcode.opcode()),
        _ => {
            let mut v = STORE_INSTRUCTIONS.to_vec();
            if opcode.version() < 5 {
                // 1OP:0x0F is NOT in V1-4, CALL_1N in V5+
                v.push(0x8F);
                v.push(0x9F);
                v.push(0xAF);
            }
            if opcode.version() == 4 {
                // SAVE/RESTORE store in V4, branch in V1-3
                v.push(0xB5);
                v.push(0xB6);
            }
            if opcode.version() > 4 {
                // CATCH and AREAD
                v.push(0xB9);
                v.push(0xE4);
            }

            v.contains(&opcode.opcode())
        }
    }
}

fn result_variable(
    zmachine: &ZMachine,
    opcode: &Opcode,
    address: usize,
) -> Result<(usize, Option<StoreResult>), RuntimeError> {
    if is_store_instruction(opcode) {
        Ok((
            address + 1,
            Some(StoreResult::new(address, zmachine.read_byte(address)?)),
        ))
    } else {
        Ok((address, None))
    }
}

fn branch_address(address: usize, offset: i16) -> usize {
    match offset {
        0 => 0,
        1 => 1,
        _ => ((address as isize) + offset as isize) as usize,
    }
}

fn branch_descriptor(
    zmachine: &ZMachine,
    address: usize,
) -> Result<(usize, Branch), RuntimeError> {
    let b = zmachine.read_byte(address)?;
    let condition = b & 0x80 == 0x80;
    if b & 0x40 == 0x40 {
        // 1-byte branch: unsigned 6-bit offset.  The destination is the
        // address past the descriptor plus the offset, less 2
        let offset = b & 0x3f;
        Ok((
            address + 1,
            Branch::new(address, condition, branch_address(address - 1, offset as i16)),
        ))
    } else {
        // 2-byte branch: signed 14-bit offset
        let mut offset = ((b as u16 & 0x3f) << 8) | zmachine.read_byte(address + 1)? as u16;
        if offset & 0x2000 == 0x2000 {
            offset |= 0xC000;
        }
        Ok((
            address + 2,
            Branch::new(address, condition, branch_address(address, offset as i16)),
        ))
    }
}

fn branch(
    zmachine: &ZMachine,
    opcode: &Opcode,
    address: usize,
) -> Result<(usize, Option<Branch>), RuntimeError> {
    let is_branch = match opcode.form() {
        OpcodeForm::Ext => false,
        _ => match opcode.operand_count() {
            OperandCount::_0OP => match opcode.instruction() {
                0x0d | 0x0f => true,
                // SAVE and RESTORE branch in V1-3
                0x05 | 0x06 => opcode.version() < 4,
                _ => false,
            },
            OperandCount::_1OP => matches!(opcode.instruction(), 0x00 | 0x01 | 0x02),
            OperandCount::_2OP => matches!(
                opcode.instruction(),
                0x01 | 0x02 | 0x03 | 0x04 | 0x05 | 0x06 | 0x07 | 0x0a
            ),
            OperandCount::_VAR => matches!(opcode.instruction(), 0x17 | 0x1F),
        },
    };

    if is_branch {
        let (address, b) = branch_descriptor(zmachine, address)?;
        Ok((address, Some(b)))
    } else {
        Ok((address, None))
    }
}

fn opcode(zmachine: &ZMachine, address: usize) -> Result<(usize, Opcode), RuntimeError> {
    let mut opcode = zmachine.read_byte(address)?;
    let (address, form) = match opcode {
        0xBE => {
            opcode = zmachine.read_byte(address + 1)?;
            (address + 2, OpcodeForm::Ext)
        }
        _ => (
            address + 1,
            match (opcode >> 6) & 0x3 {
                3 => OpcodeForm::Var,
                2 => OpcodeForm::Short,
                _ => OpcodeForm::Long,
            },
        ),
    };

    let instruction = match form {
        OpcodeForm::Var | OpcodeForm::Long => opcode & 0x1F,
        OpcodeForm::Short => opcode & 0xF,
        OpcodeForm::Ext => opcode,
    };

    let operand_count = match form {
        OpcodeForm::Short => {
            if opcode & 0x30 == 0x30 {
                OperandCount::_0OP
            } else {
                OperandCount::_1OP
            }
        }
        OpcodeForm::Long => OperandCount::_2OP,
        OpcodeForm::Var => {
            // 0xC0..=0xDF decode a type byte but dispatch as 2OP; this
            // covers 0xC1, JE with up to 4 operands
            if opcode & 0x20 == 0x20 {
                OperandCount::_VAR
            } else {
                OperandCount::_2OP
            }
        }
        OpcodeForm::Ext => OperandCount::_VAR,
    };

    Ok((
        address,
        Opcode::new(zmachine.version(), opcode, instruction, form, operand_count),
    ))
}

/// Decode the instruction at an address.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `address` - Address of the instruction
///
/// # Returns
/// [Result] with the decoded [Instruction] or a [RuntimeError]
pub fn decode_instruction(
    zmachine: &ZMachine,
    address: usize,
) -> Result<Instruction, RuntimeError> {
    let (next, opcode) = opcode(zmachine, address)?;
    let (next, operand_types) = operand_types(zmachine, &opcode, next)?;
    let (next, operands) = operands(zmachine, &operand_types, next)?;
    let (next, store) = result_variable(zmachine, &opcode, next)?;
    let (next, branch) = branch(zmachine, &opcode, next)?;

    let instruction = Instruction::new(address, opcode, operands, store, branch, next);
    debug!(target: "app::instruction", "{}", instruction);
    Ok(instruction)
}

/// Decode a bare branch descriptor, as left behind by a V1-3 SAVE.
///
/// # Arguments
/// * `zmachine` - Reference to the machine
/// * `address` - Address of the descriptor
///
/// # Returns
/// [Result] with the [Branch] and the address following the descriptor or a
/// [RuntimeError]
pub fn decode_branch(
    zmachine: &ZMachine,
    address: usize,
) -> Result<(Branch, usize), RuntimeError> {
    let (next, branch) = branch_descriptor(zmachine, address)?;
    Ok((branch, next))
}

#[cfg(test)]
mod tests {
    use crate::{
        assert_ok, assert_some_eq,
        test_util::{mock_machine, test_map},
    };

    use super::*;

    #[test]
    fn test_operand_type() {
        let types = 0x1B;
        assert_some_eq!(operand_type(types, 0), OperandType::LargeConstant);
        assert_some_eq!(operand_type(types, 1), OperandType::SmallConstant);
        assert_some_eq!(operand_type(types, 2), OperandType::Variable);
        assert!(operand_type(types, 3).is_none());
    }

    #[test]
    fn test_long_operand_type() {
        assert_eq!(long_operand_type(0x00, 0), OperandType::SmallConstant);
        assert_eq!(long_operand_type(0x00, 1), OperandType::SmallConstant);
        assert_eq!(long_operand_type(0x40, 0), OperandType::Variable);
        assert_eq!(long_operand_type(0x20, 1), OperandType::Variable);
        assert_eq!(long_operand_type(0x60, 0), OperandType::Variable);
        assert_eq!(long_operand_type(0x60, 1), OperandType::Variable);
    }

    #[test]
    fn test_decode_long_2op() {
        // ADD L00 #05 -> (SP)
        let mut map = test_map(3);
        map[0x400] = 0x54;
        map[0x401] = 0x01;
        map[0x402] = 0x05;
        map[0x403] = 0x00;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert_eq!(i.opcode().form(), &OpcodeForm::Long);
        assert_eq!(i.opcode().operand_count(), &OperandCount::_2OP);
        assert_eq!(i.opcode().instruction(), 0x14);
        assert_eq!(i.operands().len(), 2);
        assert_eq!(i.operands()[0].operand_type(), OperandType::Variable);
        assert_eq!(i.operands()[0].value(), 1);
        assert_eq!(i.operands()[1].operand_type(), OperandType::SmallConstant);
        assert_eq!(i.operands()[1].value(), 5);
        assert_some_eq!(i.store(), &StoreResult::new(0x403, 0));
        assert!(i.branch().is_none());
        assert_eq!(i.next_address(), 0x404);
    }

    #[test]
    fn test_decode_short_1op() {
        // JZ #1234 [true] $0407
        let mut map = test_map(3);
        map[0x400] = 0x80;
        map[0x401] = 0x12;
        map[0x402] = 0x34;
        map[0x403] = 0x80 | 0x40 | 0x05;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert_eq!(i.opcode().form(), &OpcodeForm::Short);
        assert_eq!(i.opcode().operand_count(), &OperandCount::_1OP);
        assert_eq!(i.opcode().instruction(), 0x00);
        assert_eq!(i.operands()[0].operand_type(), OperandType::LargeConstant);
        assert_eq!(i.operands()[0].value(), 0x1234);
        let b = i.branch().unwrap();
        assert!(b.condition());
        // next address (0x404) + 5 - 2
        assert_eq!(b.branch_address(), 0x407);
        assert_eq!(i.next_address(), 0x404);
    }

    #[test]
    fn test_decode_branch_return() {
        // JZ L00 [false] RTRUE
        let mut map = test_map(3);
        map[0x400] = 0xA0;
        map[0x401] = 0x01;
        map[0x402] = 0x40 | 0x01;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        let b = i.branch().unwrap();
        assert!(!b.condition());
        assert_eq!(b.branch_address(), 1);
        assert_eq!(i.next_address(), 0x403);
    }

    #[test]
    fn test_decode_long_branch() {
        // JE #01 #02 [true] offset -4
        let mut map = test_map(3);
        map[0x400] = 0x01;
        map[0x401] = 0x01;
        map[0x402] = 0x02;
        // 14-bit -4: 0x3FFC
        map[0x403] = 0x80 | 0x3F;
        map[0x404] = 0xFC;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        let b = i.branch().unwrap();
        assert!(b.condition());
        // next address (0x405) - 4 - 2
        assert_eq!(b.branch_address(), 0x3FF);
    }

    #[test]
    fn test_decode_0op() {
        // NEW_LINE
        let mut map = test_map(3);
        map[0x400] = 0xBB;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert_eq!(i.opcode().operand_count(), &OperandCount::_0OP);
        assert_eq!(i.opcode().instruction(), 0x0B);
        assert!(i.operands().is_empty());
        assert_eq!(i.next_address(), 0x401);
    }

    #[test]
    fn test_decode_var_form() {
        // CALL_VS #0300 #01 L02 -> G00
        let mut map = test_map(5);
        map[0x400] = 0xE0;
        map[0x401] = 0b00_01_10_11;
        map[0x402] = 0x03;
        map[0x403] = 0x00;
        map[0x404] = 0x01;
        map[0x405] = 0x03;
        map[0x406] = 0x10;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert_eq!(i.opcode().form(), &OpcodeForm::Var);
        assert_eq!(i.opcode().operand_count(), &OperandCount::_VAR);
        assert_eq!(i.operands().len(), 3);
        assert_eq!(i.operands()[0].value(), 0x300);
        assert_eq!(i.operands()[1].value(), 0x01);
        assert_eq!(i.operands()[2].operand_type(), OperandType::Variable);
        assert_some_eq!(i.store(), &StoreResult::new(0x406, 0x10));
        assert_eq!(i.next_address(), 0x407);
    }

    #[test]
    fn test_decode_var_je() {
        // 0xC1 is JE in variable form with up to 4 operands
        let mut map = test_map(5);
        map[0x400] = 0xC1;
        map[0x401] = 0b01_01_01_11;
        map[0x402] = 0x01;
        map[0x403] = 0x02;
        map[0x404] = 0x03;
        map[0x405] = 0x80 | 0x40 | 0x0A;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert_eq!(i.opcode().operand_count(), &OperandCount::_2OP);
        assert_eq!(i.opcode().instruction(), 0x01);
        assert_eq!(i.operands().len(), 3);
        assert!(i.branch().is_some());
    }

    #[test]
    fn test_decode_double_var() {
        // CALL_VS2 with 8 operands
        let mut map = test_map(5);
        map[0x400] = 0xEC;
        map[0x401] = 0b01_01_01_01;
        map[0x402] = 0b01_01_01_01;
        for i in 0..8 {
            map[0x403 + i] = i as u8 + 1;
        }
        map[0x40B] = 0x00;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert_eq!(i.operands().len(), 8);
        for (n, o) in i.operands().iter().enumerate() {
            assert_eq!(o.value(), n as u16 + 1);
        }
        assert!(i.store().is_some());
        assert_eq!(i.next_address(), 0x40C);
    }

    #[test]
    fn test_decode_ext() {
        // SAVE_UNDO -> (SP)
        let mut map = test_map(5);
        map[0x400] = 0xBE;
        map[0x401] = 0x09;
        map[0x402] = 0xFF;
        map[0x403] = 0x00;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert_eq!(i.opcode().form(), &OpcodeForm::Ext);
        assert_eq!(i.opcode().instruction(), 0x09);
        assert!(i.operands().is_empty());
        assert_some_eq!(i.store(), &StoreResult::new(0x403, 0));
        assert_eq!(i.next_address(), 0x404);
    }

    #[test]
    fn test_store_not_v3_vs_v5() {
        // 1OP:0xF is NOT (store) in V1-4, CALL_1N (no store) in V5
        let mut map = test_map(3);
        map[0x400] = 0x8F;
        map[0x401] = 0x12;
        map[0x402] = 0x34;
        map[0x403] = 0x00;
        let zmachine = mock_machine(map.clone());
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert!(i.store().is_some());

        map[0] = 5;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert!(i.store().is_none());
    }

    #[test]
    fn test_save_v3_branches_v4_stores() {
        let mut map = test_map(3);
        map[0x400] = 0xB5;
        map[0x401] = 0xC0 | 0x05;
        let zmachine = mock_machine(map.clone());
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert!(i.branch().is_some());
        assert!(i.store().is_none());

        map[0] = 4;
        let zmachine = mock_machine(map);
        let i = assert_ok!(decode_instruction(&zmachine, 0x400));
        assert!(i.branch().is_none());
        assert!(i.store().is_some());
    }

    #[test]
    fn test_decode_past_end_of_memory() {
        let map = test_map(3);
        let size = map.len();
        let zmachine = mock_machine(map);
        assert!(decode_instruction(&zmachine, size).is_err());
    }

    #[test]
    fn test_decode_bare_branch() {
        let mut map = test_map(3);
        map[0x400] = 0xC0 | 0x08;
        let zmachine = mock_machine(map);
        let (b, next) = assert_ok!(decode_branch(&zmachine, 0x400));
        assert!(b.condition());
        // 0x401 + 8 - 2
        assert_eq!(b.branch_address(), 0x407);
        assert_eq!(next, 0x401);
    }
}
