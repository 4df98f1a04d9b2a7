//! Instruction dispatch
use crate::zmachine::frame::CallType;
use crate::zmachine::ZMachine;
use crate::{error::*, fatal_error};

use super::*;

mod processor_0op;
mod processor_1op;
mod processor_2op;
mod processor_ext;
mod processor_var;

fn operand_value(zmachine: &mut ZMachine, operand: &Operand) -> Result<u16, RuntimeError> {
    match operand.operand_type() {
        OperandType::SmallConstant | OperandType::LargeConstant => Ok(operand.value()),
        OperandType::Variable => zmachine.variable(operand.value() as u8),
    }
}

/// Resolve an instruction's operands to values.
///
/// Variable operands are resolved in order, so repeated stack operands pop
/// in operand order.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `instruction` - Instruction being executed
///
/// # Returns
/// [Result] with the operand values or a [RuntimeError]
pub fn operand_values(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<Vec<u16>, RuntimeError> {
    let mut values = Vec::new();
    for operand in instruction.operands() {
        values.push(operand_value(zmachine, operand)?)
    }
    Ok(values)
}

/// Continue past a branch descriptor.
///
/// When `condition` matches the branch sense, destinations 0 and 1 return
/// false/true from the current routine; any other destination is jumped to.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `branch` - Branch descriptor
/// * `next_address` - Address of the next instruction when not branching
/// * `condition` - Branch condition computed by the instruction
///
/// # Returns
/// [Result] with the next pc or a [RuntimeError]
pub fn branch_to(
    zmachine: &mut ZMachine,
    branch: &Branch,
    next_address: usize,
    condition: bool,
) -> Result<NextPc, RuntimeError> {
    if condition == branch.condition() {
        match branch.branch_address() {
            0 => zmachine.return_routine(0),
            1 => zmachine.return_routine(1),
            address => Ok(NextPc::Address(address)),
        }
    } else {
        Ok(NextPc::Address(next_address))
    }
}

pub fn branch(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
    condition: bool,
) -> Result<NextPc, RuntimeError> {
    match instruction.branch() {
        Some(b) => branch_to(zmachine, b, instruction.next_address(), condition),
        None => Ok(NextPc::Address(instruction.next_address())),
    }
}

fn store_result(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
    value: u16,
) -> Result<(), RuntimeError> {
    match instruction.store() {
        Some(s) => zmachine.set_variable(s.variable(), value),
        None => Ok(()),
    }
}

/// Complete a successful RESTORE or RESTORE_UNDO.
///
/// The restored pc sits past SAVE's store byte (V4+), where 2 is stored
/// through the byte at `pc - 1`, or at SAVE's branch descriptor (V1-3),
/// which is taken as though the save had returned 2.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `pc` - Restored program counter
///
/// # Returns
/// [Result] with the next pc or a [RuntimeError]
pub(crate) fn restore_result(
    zmachine: &mut ZMachine,
    pc: usize,
) -> Result<NextPc, RuntimeError> {
    if zmachine.version() < 4 {
        let (b, next_address) = decoder::decode_branch(zmachine, pc)?;
        branch_to(zmachine, &b, next_address, true)
    } else {
        let variable = zmachine.read_byte(pc - 1)?;
        zmachine.set_variable(variable, 2)?;
        Ok(NextPc::Address(pc))
    }
}

fn call_fn(
    zmachine: &mut ZMachine,
    packed_address: u16,
    instruction: &Instruction,
    arguments: &[u16],
    call_type: CallType,
) -> Result<NextPc, RuntimeError> {
    // Calling packed address 0 stores false without a call
    if packed_address == 0 {
        store_result(zmachine, instruction, 0)?;
        return Ok(NextPc::Address(instruction.next_address()));
    }

    let address = zmachine.packed_routine_address(packed_address)?;
    zmachine.call_routine(address, arguments, call_type, instruction)
}

/// Dispatch a decoded instruction.
///
/// Every byte value decodes to something; encodings with no defined
/// instruction for the story's version are fatal.
///
/// # Arguments
/// * `zmachine` - Mutable reference to the machine
/// * `instruction` - Instruction to execute
///
/// # Returns
/// [Result] with the next pc or a [RuntimeError]
pub fn dispatch(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextPc, RuntimeError> {
    debug!(target: "app::instruction", "dispatch: {}", instruction);
    let version = zmachine.version();
    match instruction.opcode().form() {
        OpcodeForm::Ext => match (version, instruction.opcode().instruction()) {
            (5.., 0x00) => processor_ext::save(zmachine, instruction),
            (5.., 0x01) => processor_ext::restore(zmachine, instruction),
            (5.., 0x02) => processor_ext::log_shift(zmachine, instruction),
            (5.., 0x03) => processor_ext::art_shift(zmachine, instruction),
            (5.., 0x04) => processor_ext::set_font(zmachine, instruction),
            (5.., 0x09) => processor_ext::save_undo(zmachine, instruction),
            (5.., 0x0a) => processor_ext::restore_undo(zmachine, instruction),
            (_, _) => fatal_error!(
                ErrorCode::UnsupportedInstruction,
                "Unsupported EXT instruction {:#02x}: {}",
                instruction.opcode().instruction(),
                instruction.opcode()
            ),
        },
        _ => match instruction.opcode().operand_count() {
            OperandCount::_0OP => match (version, instruction.opcode().instruction()) {
                (_, 0x0) => processor_0op::rtrue(zmachine, instruction),
                (_, 0x1) => processor_0op::rfalse(zmachine, instruction),
                (_, 0x2) => processor_0op::print(zmachine, instruction),
                (_, 0x3) => processor_0op::print_ret(zmachine, instruction),
                (_, 0x4) => processor_0op::nop(zmachine, instruction),
                (1..=4, 0x5) => processor_0op::save(zmachine, instruction),
                (1..=4, 0x6) => processor_0op::restore(zmachine, instruction),
                (_, 0x7) => processor_0op::restart(zmachine, instruction),
                (_, 0x8) => processor_0op::ret_popped(zmachine, instruction),
                (1..=4, 0x9) => processor_0op::pop(zmachine, instruction),
                (_, 0x9) => processor_0op::catch(zmachine, instruction),
                (_, 0xa) => processor_0op::quit(zmachine, instruction),
                (_, 0xb) => processor_0op::new_line(zmachine, instruction),
                (_, 0xc) => processor_0op::show_status(zmachine, instruction),
                (_, 0xd) => processor_0op::verify(zmachine, instruction),
                (5.., 0xf) => processor_0op::piracy(zmachine, instruction),
                (_, _) => fatal_error!(
                    ErrorCode::UnsupportedInstruction,
                    "Unsupported instruction {:#02x}: {}",
                    instruction.opcode().opcode(),
                    instruction.opcode()
                ),
            },
            OperandCount::_1OP => match (version, instruction.opcode().instruction()) {
                (_, 0x0) => processor_1op::jz(zmachine, instruction),
                (_, 0x1) => processor_1op::get_sibling(zmachine, instruction),
                (_, 0x2) => processor_1op::get_child(zmachine, instruction),
                (_, 0x3) => processor_1op::get_parent(zmachine, instruction),
                (_, 0x4) => processor_1op::get_prop_len(zmachine, instruction),
                (_, 0x5) => processor_1op::inc(zmachine, instruction),
                (_, 0x6) => processor_1op::dec(zmachine, instruction),
                (_, 0x7) => processor_1op::print_addr(zmachine, instruction),
                (4.., 0x8) => processor_1op::call_1s(zmachine, instruction),
                (_, 0x9) => processor_1op::remove_obj(zmachine, instruction),
                (_, 0xa) => processor_1op::print_obj(zmachine, instruction),
                (_, 0xb) => processor_1op::ret(zmachine, instruction),
                (_, 0xc) => processor_1op::jump(zmachine, instruction),
                (_, 0xd) => processor_1op::print_paddr(zmachine, instruction),
                (_, 0xe) => processor_1op::load(zmachine, instruction),
                (1..=4, 0xf) => processor_1op::not(zmachine, instruction),
                (_, 0xf) => processor_1op::call_1n(zmachine, instruction),
                (_, _) => fatal_error!(
                    ErrorCode::UnsupportedInstruction,
                    "Unsupported instruction {:#02x}: {}",
                    instruction.opcode().opcode(),
                    instruction.opcode()
                ),
            },
            OperandCount::_2OP => match (version, instruction.opcode().instruction()) {
                (_, 0x01) => processor_2op::je(zmachine, instruction),
                (_, 0x02) => processor_2op::jl(zmachine, instruction),
                (_, 0x03) => processor_2op::jg(zmachine, instruction),
                (_, 0x04) => processor_2op::dec_chk(zmachine, instruction),
                (_, 0x05) => processor_2op::inc_chk(zmachine, instruction),
                (_, 0x06) => processor_2op::jin(zmachine, instruction),
                (_, 0x07) => processor_2op::test(zmachine, instruction),
                (_, 0x08) => processor_2op::or(zmachine, instruction),
                (_, 0x09) => processor_2op::and(zmachine, instruction),
                (_, 0x0a) => processor_2op::test_attr(zmachine, instruction),
                (_, 0x0b) => processor_2op::set_attr(zmachine, instruction),
                (_, 0x0c) => processor_2op::clear_attr(zmachine, instruction),
                (_, 0x0d) => processor_2op::store(zmachine, instruction),
                (_, 0x0e) => processor_2op::insert_obj(zmachine, instruction),
                (_, 0x0f) => processor_2op::loadw(zmachine, instruction),
                (_, 0x10) => processor_2op::loadb(zmachine, instruction),
                (_, 0x11) => processor_2op::get_prop(zmachine, instruction),
                (_, 0x12) => processor_2op::get_prop_addr(zmachine, instruction),
                (_, 0x13) => processor_2op::get_next_prop(zmachine, instruction),
                (_, 0x14) => processor_2op::add(zmachine, instruction),
                (_, 0x15) => processor_2op::sub(zmachine, instruction),
                (_, 0x16) => processor_2op::mul(zmachine, instruction),
                (_, 0x17) => processor_2op::div(zmachine, instruction),
                (_, 0x18) => processor_2op::modulus(zmachine, instruction),
                (4.., 0x19) => processor_2op::call_2s(zmachine, instruction),
                (5.., 0x1a) => processor_2op::call_2n(zmachine, instruction),
                (5.., 0x1b) => processor_2op::set_colour(zmachine, instruction),
                (5.., 0x1c) => processor_2op::throw(zmachine, instruction),
                (_, _) => fatal_error!(
                    ErrorCode::UnsupportedInstruction,
                    "Unsupported instruction {:#02x}: {}",
                    instruction.opcode().opcode(),
                    instruction.opcode()
                ),
            },
            OperandCount::_VAR => match (version, instruction.opcode().instruction()) {
                (_, 0x00) => processor_var::call_vs(zmachine, instruction),
                (_, 0x01) => processor_var::storew(zmachine, instruction),
                (_, 0x02) => processor_var::storeb(zmachine, instruction),
                (_, 0x03) => processor_var::put_prop(zmachine, instruction),
                (_, 0x04) => processor_var::read(zmachine, instruction),
                (_, 0x05) => processor_var::print_char(zmachine, instruction),
                (_, 0x06) => processor_var::print_num(zmachine, instruction),
                (_, 0x07) => processor_var::random(zmachine, instruction),
                (_, 0x08) => processor_var::push(zmachine, instruction),
                (_, 0x09) => processor_var::pull(zmachine, instruction),
                (3.., 0x0a) => processor_var::split_window(zmachine, instruction),
                (3.., 0x0b) => processor_var::set_window(zmachine, instruction),
                (4.., 0x0c) => processor_var::call_vs2(zmachine, instruction),
                (4.., 0x0d) => processor_var::erase_window(zmachine, instruction),
                (4.., 0x0e) => processor_var::erase_line(zmachine, instruction),
                (4.., 0x0f) => processor_var::set_cursor(zmachine, instruction),
                (4.., 0x10) => processor_var::get_cursor(zmachine, instruction),
                (4.., 0x11) => processor_var::set_text_style(zmachine, instruction),
                (4.., 0x12) => processor_var::buffer_mode(zmachine, instruction),
                (3.., 0x13) => processor_var::output_stream(zmachine, instruction),
                (3.., 0x14) => processor_var::input_stream(zmachine, instruction),
                (3.., 0x15) => processor_var::sound_effect(zmachine, instruction),
                (4.., 0x16) => processor_var::read_char(zmachine, instruction),
                (4.., 0x17) => processor_var::scan_table(zmachine, instruction),
                (5.., 0x18) => processor_var::not(zmachine, instruction),
                (5.., 0x19) => processor_var::call_vn(zmachine, instruction),
                (5.., 0x1a) => processor_var::call_vn2(zmachine, instruction),
                (5.., 0x1b) => processor_var::tokenise(zmachine, instruction),
                (5.., 0x1c) => processor_var::encode_text(zmachine, instruction),
                (5.., 0x1d) => processor_var::copy_table(zmachine, instruction),
                (5.., 0x1e) => processor_var::print_table(zmachine, instruction),
                (5.., 0x1f) => processor_var::check_arg_count(zmachine, instruction),
                (_, _) => fatal_error!(
                    ErrorCode::UnsupportedInstruction,
                    "Unsupported instruction {:#02x}: {}",
                    instruction.opcode().opcode(),
                    instruction.opcode()
                ),
            },
        },
    }
}
