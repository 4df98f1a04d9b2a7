//! Shared test fixtures: a scripted capture screen, mock story maps, and
//! instruction builders.
use std::{cell::RefCell, collections::VecDeque, path::PathBuf};

use crate::{
    config::Config,
    instruction::{Branch, Instruction, Opcode, OpcodeForm, Operand, OperandCount, StoreResult},
    screen::Screen,
    zmachine::frame::{CallType, Frame},
    zmachine::ZMachine,
};

thread_local! {
    static PRINT: RefCell<String> = RefCell::new(String::new());
    static INPUT: RefCell<VecDeque<char>> = RefCell::new(VecDeque::new());
    static TIMEOUTS: RefCell<u32> = RefCell::new(0);
    static STATUS: RefCell<(String, i16, i16, bool)> = RefCell::new((String::new(), 0, 0, false));
    static FILENAME: RefCell<Option<PathBuf>> = RefCell::new(None);
    static QUIT: RefCell<bool> = RefCell::new(false);
    static RESTARTED: RefCell<bool> = RefCell::new(false);
    static SPLIT: RefCell<u16> = RefCell::new(0);
    static WINDOW: RefCell<u16> = RefCell::new(0);
    static STYLE: RefCell<u16> = RefCell::new(0);
    static COLOURS: RefCell<(u16, u16)> = RefCell::new((0, 0));
    static CURSOR: RefCell<(u16, u16)> = RefCell::new((1, 1));
    static FONT: RefCell<u16> = RefCell::new(1);
    static ERASED: RefCell<Vec<i16>> = RefCell::new(Vec::new());
    static TERMINATORS: RefCell<Vec<u16>> = RefCell::new(Vec::new());
}

/// Captured screen output
pub fn print_output() -> String {
    PRINT.with(|x| x.borrow().clone())
}

/// Queue keyboard input; '\n' terminates a read
pub fn input(text: &str) {
    INPUT.with(|x| {
        for c in text.chars() {
            x.borrow_mut().push_back(c);
        }
    });
}

/// Make the next `n` timed reads time out
pub fn set_timeouts(n: u32) {
    TIMEOUTS.with(|x| *x.borrow_mut() = n);
}

fn take_timeout() -> bool {
    TIMEOUTS.with(|x| {
        let mut t = x.borrow_mut();
        if *t > 0 {
            *t -= 1;
            true
        } else {
            false
        }
    })
}

/// The most recent status line
pub fn status() -> (String, i16, i16, bool) {
    STATUS.with(|x| x.borrow().clone())
}

/// Set the path returned by every file dialog; [None] cancels
pub fn set_filename(path: Option<PathBuf>) {
    FILENAME.with(|x| *x.borrow_mut() = path);
}

pub fn quit_called() -> bool {
    QUIT.with(|x| *x.borrow())
}

pub fn restart_called() -> bool {
    RESTARTED.with(|x| *x.borrow())
}

pub fn split() -> u16 {
    SPLIT.with(|x| *x.borrow())
}

pub fn erased_windows() -> Vec<i16> {
    ERASED.with(|x| x.borrow().clone())
}

/// A [Screen] that scripts input and captures output in thread locals
#[derive(Default)]
pub struct TestScreen {}

impl TestScreen {
    pub fn new() -> TestScreen {
        TestScreen {}
    }
}

impl Screen for TestScreen {
    fn initialize(&mut self, _version: u8) {}

    fn fatal(&mut self, message: &str) {
        PRINT.with(|x| x.borrow_mut().push_str(&format!("[FATAL: {}]", message)));
    }

    fn has_status_line(&self) -> bool {
        true
    }

    fn has_upper_window(&self) -> bool {
        true
    }

    fn has_colors(&self) -> bool {
        true
    }

    fn has_bold(&self) -> bool {
        true
    }

    fn has_italic(&self) -> bool {
        true
    }

    fn has_fixed_width(&self) -> bool {
        true
    }

    fn has_timed_input(&self) -> bool {
        true
    }

    fn default_font_proportional(&self) -> bool {
        false
    }

    fn default_background(&self) -> u8 {
        2
    }

    fn default_foreground(&self) -> u8 {
        9
    }

    fn screen_characters(&self) -> (u8, u8) {
        (24, 80)
    }

    fn screen_units(&self) -> (u16, u16) {
        (80, 24)
    }

    fn font_size(&self) -> (u8, u8) {
        (1, 1)
    }

    fn print(&mut self, text: &str) {
        PRINT.with(|x| x.borrow_mut().push_str(text));
    }

    fn new_line(&mut self) {
        PRINT.with(|x| x.borrow_mut().push('\n'));
    }

    fn show_status(&mut self, location: &str, a: i16, b: i16, time_game: bool) {
        STATUS.with(|x| *x.borrow_mut() = (location.to_string(), a, b, time_game));
    }

    fn erase_line(&mut self) {}

    fn erase_window(&mut self, window: i16) {
        ERASED.with(|x| x.borrow_mut().push(window));
    }

    fn split_screen(&mut self, lines: u16) {
        SPLIT.with(|x| *x.borrow_mut() = lines);
    }

    fn set_window(&mut self, window: u16) {
        WINDOW.with(|x| *x.borrow_mut() = window);
    }

    fn set_cursor(&mut self, row: u16, column: u16) {
        CURSOR.with(|x| *x.borrow_mut() = (row, column));
    }

    fn cursor(&mut self) -> (u16, u16) {
        CURSOR.with(|x| *x.borrow())
    }

    fn set_text_style(&mut self, style: u16) {
        STYLE.with(|x| *x.borrow_mut() = style);
    }

    fn set_colour(&mut self, foreground: u16, background: u16) {
        COLOURS.with(|x| *x.borrow_mut() = (foreground, background));
    }

    fn set_font(&mut self, font: u16) -> u16 {
        FONT.with(|x| {
            let previous = *x.borrow();
            if font > 0 {
                *x.borrow_mut() = font;
            }
            previous
        })
    }

    fn read_line(
        &mut self,
        input: &mut Vec<u16>,
        max: usize,
        terminators: &[u16],
        timeout: u16,
    ) -> Option<u16> {
        if timeout > 0 && take_timeout() {
            return None;
        }

        loop {
            let c = INPUT.with(|x| x.borrow_mut().pop_front());
            match c {
                Some(c) => {
                    let zchar = if c == '\n' { 0x0d } else { c as u16 };
                    if terminators.contains(&zchar) {
                        return Some(zchar);
                    }
                    if input.len() < max {
                        input.push(zchar);
                    }
                }
                None => return Some(0x0d),
            }
        }
    }

    fn read_char(&mut self, timeout: u16) -> Option<u16> {
        if timeout > 0 && take_timeout() {
            return None;
        }

        let c = INPUT.with(|x| x.borrow_mut().pop_front());
        match c {
            Some('\n') => Some(0x0d),
            Some(c) => Some(c as u16),
            None => Some(0x0d),
        }
    }

    fn set_terminating_characters(&mut self, characters: &[u16]) {
        TERMINATORS.with(|x| *x.borrow_mut() = characters.to_vec());
    }

    fn get_filename(
        &mut self,
        _title: &str,
        _suggested: Option<&str>,
        _save: bool,
    ) -> Option<PathBuf> {
        FILENAME.with(|x| x.borrow().clone())
    }

    fn quit(&mut self) {
        QUIT.with(|x| *x.borrow_mut() = true);
    }

    fn restart(&mut self) {
        RESTARTED.with(|x| *x.borrow_mut() = true);
    }
}

/// A boxed capture screen
pub fn test_screen() -> Box<dyn Screen> {
    Box::new(TestScreen::new())
}

/// A minimal story map: initial pc 0x400, object table 0x200, globals
/// 0x100, static memory from 0x400
pub fn test_map(version: u8) -> Vec<u8> {
    let mut v = vec![0; 0x800];
    v[0] = version;
    // Initial PC at 0x400
    v[0x06] = 0x04;
    // Object table at 0x200
    v[0x0A] = 0x02;
    // Global variables at 0x100
    v[0x0C] = 0x01;
    // Static mark at 0x400
    v[0x0E] = 0x04;

    v
}

/// Set a global variable directly in a story map
pub fn set_variable(map: &mut [u8], variable: u8, value: u16) {
    let address = 0x100 + ((variable as usize - 16) * 2);
    map[address] = (value >> 8) as u8;
    map[address + 1] = value as u8;
}

/// A machine over `map` with a [TestScreen] front end
pub fn mock_machine(map: Vec<u8>) -> ZMachine {
    let z = ZMachine::new(map, &Config::default(), test_screen(), "test");
    assert!(z.is_ok(), "{:?}", z.err());
    z.unwrap()
}

/// Suspend the current frame at `resume_pc` and push a new frame
/// executing at `pc`
pub fn mock_frame(zmachine: &mut ZMachine, resume_pc: usize, pc: usize, call_type: CallType) {
    zmachine.set_pc(resume_pc).unwrap();
    let frame_number = zmachine.frame_count() as u16;
    zmachine.push_frame(Frame::new(pc, &[], 0, call_type, frame_number));
}

pub fn mock_opcode(
    version: u8,
    opcode: u8,
    instruction: u8,
    form: OpcodeForm,
    operand_count: OperandCount,
) -> Opcode {
    Opcode::new(version, opcode, instruction, form, operand_count)
}

pub fn mock_instruction(
    address: usize,
    operands: Vec<Operand>,
    opcode: Opcode,
    next_address: usize,
) -> Instruction {
    Instruction::new(address, opcode, operands, None, None, next_address)
}

/// An operand-less instruction at `address`
pub fn mock_instruction_at(version: u8, address: usize, next_address: usize) -> Instruction {
    mock_instruction(
        address,
        vec![],
        mock_opcode(version, 0xB0, 0, OpcodeForm::Short, OperandCount::_0OP),
        next_address,
    )
}

pub fn mock_instruction_at_with_operands(
    version: u8,
    address: usize,
    operands: Vec<Operand>,
    next_address: usize,
) -> Instruction {
    mock_instruction(
        address,
        operands,
        mock_opcode(version, 0xE0, 0, OpcodeForm::Var, OperandCount::_VAR),
        next_address,
    )
}

pub fn mock_instruction_with_store(
    version: u8,
    operands: Vec<Operand>,
    store: Option<u8>,
    next_address: usize,
) -> Instruction {
    Instruction::new(
        next_address,
        mock_opcode(version, 0xE0, 0, OpcodeForm::Var, OperandCount::_VAR),
        operands,
        store.map(|v| StoreResult::new(next_address - 1, v)),
        None,
        next_address,
    )
}

pub fn mock_store_instruction(
    version: u8,
    store: Option<u8>,
    next_address: usize,
) -> Instruction {
    mock_instruction_with_store(version, vec![], store, next_address)
}

pub fn mock_branch_instruction(
    version: u8,
    condition: bool,
    branch_address: usize,
    next_address: usize,
) -> Instruction {
    mock_branch_instruction_with_operands(version, condition, branch_address, next_address, vec![])
}

pub fn mock_branch_instruction_with_operands(
    version: u8,
    condition: bool,
    branch_address: usize,
    next_address: usize,
    operands: Vec<Operand>,
) -> Instruction {
    Instruction::new(
        next_address,
        mock_opcode(version, 0x01, 0x01, OpcodeForm::Long, OperandCount::_2OP),
        operands,
        None,
        Some(Branch::new(next_address - 2, condition, branch_address)),
        next_address,
    )
}

pub fn mock_branch_store_instruction(
    version: u8,
    condition: bool,
    branch_address: usize,
    next_address: usize,
    operands: Vec<Operand>,
    store: Option<u8>,
) -> Instruction {
    Instruction::new(
        next_address,
        mock_opcode(version, 0x01, 0x01, OpcodeForm::Long, OperandCount::_2OP),
        operands,
        store.map(|v| StoreResult::new(next_address - 3, v)),
        Some(Branch::new(next_address - 2, condition, branch_address)),
        next_address,
    )
}

/// An object tree for tests: object 3 has children 7 -> 8 -> 9, object 5
/// is parentless with a short name ("pet") and properties 18 (word), 17
/// (byte), and 10 (4 bytes).  The property defaults table holds
/// `0x2200 | p` for property `p`.
pub fn mock_object_tree(map: &mut [u8], version: u8) {
    if version < 4 {
        // 31 default words
        for p in 1..=31usize {
            let address = 0x200 + ((p - 1) * 2);
            map[address] = 0x22;
            map[address + 1] = p as u8;
        }

        // 9-byte entries from 0x23E: attributes, parent, sibling, child,
        // property table pointer
        let entry = |n: usize| 0x23E + ((n - 1) * 9);
        map[entry(3) + 6] = 7;
        map[entry(3) + 7] = 0x03;
        map[entry(3) + 8] = 0x00;
        map[entry(5) + 7] = 0x03;
        map[entry(5) + 8] = 0x10;
        map[entry(7) + 4] = 3;
        map[entry(7) + 5] = 8;
        map[entry(7) + 7] = 0x03;
        map[entry(7) + 8] = 0x20;
        map[entry(8) + 4] = 3;
        map[entry(8) + 5] = 9;
        map[entry(8) + 7] = 0x03;
        map[entry(8) + 8] = 0x30;
        map[entry(9) + 4] = 3;
        map[entry(9) + 7] = 0x03;
        map[entry(9) + 8] = 0x40;

        // Property tables
        // Object 3: no name, no properties
        map[0x300] = 0;
        map[0x301] = 0;
        // Object 5: name "pet", properties 18 (word), 17 (byte), 10 (4 bytes)
        let table = [
            0x01, 0xD5, 0x59, 0x32, 0x12, 0x34, 0x11, 0x42, 0x6A, 0xDE, 0xAD, 0xBE, 0xEF, 0x00,
        ];
        map[0x310..0x310 + table.len()].copy_from_slice(&table);
        // Object 7: property 5 (word)
        let table = [0x00, 0x25, 0xCA, 0xFE, 0x00];
        map[0x320..0x320 + table.len()].copy_from_slice(&table);
        map[0x330] = 0;
        map[0x331] = 0;
        map[0x340] = 0;
        map[0x341] = 0;
    } else {
        // 63 default words
        for p in 1..=63usize {
            let address = 0x200 + ((p - 1) * 2);
            map[address] = 0x22;
            map[address + 1] = p as u8;
        }

        // 14-byte entries from 0x27E with word relatives
        let entry = |n: usize| 0x27E + ((n - 1) * 14);
        map[entry(3) + 11] = 7;
        map[entry(3) + 12] = 0x03;
        map[entry(3) + 13] = 0x50;
        map[entry(5) + 12] = 0x03;
        map[entry(5) + 13] = 0x60;
        map[entry(7) + 7] = 3;
        map[entry(7) + 9] = 8;
        map[entry(7) + 12] = 0x03;
        map[entry(7) + 13] = 0x74;
        map[entry(8) + 7] = 3;
        map[entry(8) + 9] = 9;
        map[entry(8) + 12] = 0x03;
        map[entry(8) + 13] = 0x80;
        map[entry(9) + 7] = 3;
        map[entry(9) + 12] = 0x03;
        map[entry(9) + 13] = 0x88;

        map[0x350] = 0;
        map[0x351] = 0;
        // Property 10 uses the two-byte size form
        let table = [
            0x01, 0xD5, 0x59, 0x52, 0x12, 0x34, 0x11, 0x42, 0x8A, 0x84, 0xDE, 0xAD, 0xBE, 0xEF,
            0x00,
        ];
        map[0x360..0x360 + table.len()].copy_from_slice(&table);
        let table = [0x00, 0x45, 0xCA, 0xFE, 0x00];
        map[0x374..0x374 + table.len()].copy_from_slice(&table);
        map[0x380] = 0;
        map[0x381] = 0;
        map[0x388] = 0;
        map[0x389] = 0;
    }
}

fn write_dictionary(map: &mut [u8], entry_size: u8, count: i16, entries: &[&[u8]]) {
    // 3 separators, then entry size, then the signed entry count
    map[0x300] = 3;
    map[0x301] = b',';
    map[0x302] = b'.';
    map[0x303] = b'"';
    map[0x304] = entry_size;
    map[0x305] = (count >> 8) as u8;
    map[0x306] = count as u8;
    for (i, entry) in entries.iter().enumerate() {
        let address = 0x307 + (i * entry_size as usize);
        map[address..address + entry.len()].copy_from_slice(entry);
    }
}

/// A sorted V4+ dictionary at 0x300 with 9-byte entries
pub fn mock_sorted_dictionary(map: &mut [u8]) {
    write_dictionary(
        map,
        9,
        8,
        &[
            &[0x1A, 0x69, 0x14, 0xA5, 0x94, 0xA5], // and
            &[0x1E, 0xFA, 0x67, 0x58, 0x94, 0xA5], // brutus
            &[0x35, 0x51, 0x46, 0x85, 0x94, 0xA5], // hello
            &[0x3A, 0x7B, 0x2A, 0x79, 0xD2, 0xFE], // inventory
            &[0x46, 0x94, 0x40, 0xA5, 0x94, 0xA5], // look
            &[0x56, 0x3A, 0x31, 0xA5, 0x94, 0xA5], // plugh
            &[0x60, 0xCE, 0x46, 0x97, 0x94, 0xA5], // sailor
            &[0x77, 0xDF, 0x7F, 0xC5, 0x94, 0xA5], // xyzzy
        ],
    );
}

/// An unsorted V4+ dictionary at 0x300, marked with a negative entry count
pub fn mock_unsorted_dictionary(map: &mut [u8]) {
    write_dictionary(
        map,
        9,
        -8,
        &[
            &[0x46, 0x94, 0x40, 0xA5, 0x94, 0xA5], // look
            &[0x1A, 0x69, 0x14, 0xA5, 0x94, 0xA5], // and
            &[0x3A, 0x7B, 0x2A, 0x79, 0xD2, 0xFE], // inventory
            &[0x1E, 0xFA, 0x67, 0x58, 0x94, 0xA5], // brutus
            &[0x77, 0xDF, 0x7F, 0xC5, 0x94, 0xA5], // xyzzy
            &[0x35, 0x51, 0x46, 0x85, 0x94, 0xA5], // hello
            &[0x60, 0xCE, 0x46, 0x97, 0x94, 0xA5], // sailor
            &[0x56, 0x3A, 0x31, 0xA5, 0x94, 0xA5], // plugh
        ],
    );
}

/// A sorted V1-3 dictionary at 0x300 with 7-byte entries
pub fn mock_dictionary_v3(map: &mut [u8]) {
    write_dictionary(
        map,
        7,
        8,
        &[
            &[0x1A, 0x69, 0x94, 0xA5], // and
            &[0x1E, 0xFA, 0xE7, 0x58], // brutus
            &[0x35, 0x51, 0xC6, 0x85], // hello
            &[0x3A, 0x7B, 0xAA, 0x79], // inventory
            &[0x46, 0x94, 0xC0, 0xA5], // look
            &[0x56, 0x3A, 0xB1, 0xA5], // plugh
            &[0x60, 0xCE, 0xC6, 0x97], // sailor
            &[0x77, 0xDF, 0xFF, 0xC5], // xyzzy
        ],
    );
}

#[macro_export]
macro_rules! assert_ok {
    ($e:expr) => {{
        let result = $e;
        assert!(result.is_ok(), "{:?}", result.err());
        result.unwrap()
    }};
}

#[macro_export]
macro_rules! assert_ok_eq {
    ($e:expr, $value:expr) => {{
        let result = $e;
        assert!(result.is_ok(), "{:?}", result.err());
        assert_eq!(result.unwrap(), $value)
    }};
}

#[macro_export]
macro_rules! assert_some_eq {
    ($e:expr, $value:expr) => {{
        let option = $e;
        assert!(option.is_some());
        assert_eq!(option.unwrap(), $value)
    }};
}
