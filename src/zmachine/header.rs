//! Header field offsets and flag accessors
use crate::error::RuntimeError;

use super::memory::Memory;

#[derive(Clone, Copy, Debug)]
pub enum HeaderField {
    Version = 0x00,
    Flags1 = 0x01,
    Release = 0x02,
    HighMark = 0x04,
    InitialPC = 0x06,
    Dictionary = 0x08,
    ObjectTable = 0x0A,
    GlobalTable = 0x0C,
    StaticMark = 0x0E,
    Flags2 = 0x10,
    Serial = 0x12,
    AbbreviationsTable = 0x18,
    FileLength = 0x1A,
    Checksum = 0x1C,
    InterpreterNumber = 0x1E,
    InterpreterVersion = 0x1F,
    ScreenLines = 0x20,
    ScreenColumns = 0x21,
    ScreenWidth = 0x22,
    ScreenHeight = 0x24,
    FontWidth = 0x26,
    FontHeight = 0x27,
    RoutinesOffset = 0x28,
    StringsOffset = 0x2A,
    DefaultBackground = 0x2C,
    DefaultForeground = 0x2D,
    TerminatorTable = 0x2E,
    Revision = 0x32,
    AlphabetTable = 0x34,
    ExtensionTable = 0x36,
}

pub enum Flags1v3 {
    StatusLineType = 0x02,         // bit 1
    Tandy = 0x08,                  // bit 3
    StatusLineNotAvailable = 0x10, // bit 4
    ScreenSplitAvailable = 0x20,   // bit 5
    VariablePitchDefault = 0x40,   // bit 6
}

pub enum Flags1v4 {
    ColoursAvailable = 0x01,    // bit 0
    BoldfaceAvailable = 0x04,   // bit 2
    ItalicAvailable = 0x08,     // bit 3
    FixedSpaceAvailable = 0x10, // bit 4
    TimedInputAvailable = 0x80, // bit 7
}

#[derive(Debug)]
pub enum Flags2 {
    Transcripting = 0x0001, // bit 0
}

pub fn field_byte(memory: &Memory, field: HeaderField) -> Result<u8, RuntimeError> {
    memory.read_byte(field as usize)
}

pub fn field_word(memory: &Memory, field: HeaderField) -> Result<u16, RuntimeError> {
    memory.read_word(field as usize)
}

pub fn set_byte(memory: &mut Memory, field: HeaderField, value: u8) -> Result<(), RuntimeError> {
    memory.write_byte(field as usize, value)
}

pub fn set_word(memory: &mut Memory, field: HeaderField, value: u16) -> Result<(), RuntimeError> {
    memory.write_word(field as usize, value)
}

pub fn flag1(memory: &Memory, flag: u8) -> Result<bool, RuntimeError> {
    let flags = field_byte(memory, HeaderField::Flags1)?;
    Ok(flags & flag == flag)
}

pub fn set_flag1(memory: &mut Memory, flag: u8) -> Result<(), RuntimeError> {
    let flags = field_byte(memory, HeaderField::Flags1)?;
    let new = flags | flag;
    debug!(target: "app::state", "Set FLAG1 {:08b}: {:08b} => {:08b}", flag, flags, new);
    memory.write_byte(HeaderField::Flags1 as usize, new)
}

pub fn clear_flag1(memory: &mut Memory, flag: u8) -> Result<(), RuntimeError> {
    let flags = field_byte(memory, HeaderField::Flags1)?;
    let new = flags & !flag;
    debug!(target: "app::state", "Clear FLAG1 {:08b}: {:08b} => {:08b}", flag, flags, new);
    memory.write_byte(HeaderField::Flags1 as usize, new)
}

pub fn flag2(memory: &Memory, flag: Flags2) -> Result<bool, RuntimeError> {
    let flags = field_word(memory, HeaderField::Flags2)?;
    Ok(flags & flag as u16 != 0)
}

pub fn set_flag2(memory: &mut Memory, flag: Flags2) -> Result<(), RuntimeError> {
    let flags = field_word(memory, HeaderField::Flags2)?;
    memory.write_word(HeaderField::Flags2 as usize, flags | flag as u16)
}

pub fn clear_flag2(memory: &mut Memory, flag: Flags2) -> Result<(), RuntimeError> {
    let flags = field_word(memory, HeaderField::Flags2)?;
    memory.write_word(HeaderField::Flags2 as usize, flags & !(flag as u16))
}

#[cfg(test)]
mod tests {
    use crate::assert_ok_eq;

    use super::*;

    fn test_memory() -> Memory {
        let mut map = vec![0; 0x800];
        for (i, b) in map.iter_mut().enumerate().take(0x40) {
            *b = i as u8 + 1;
        }
        map[0x0E] = 0x4;
        map[0x0F] = 0x0;
        Memory::new(map)
    }

    #[test]
    fn test_fields() {
        let memory = test_memory();
        assert_ok_eq!(field_byte(&memory, HeaderField::Version), 0x1);
        assert_ok_eq!(field_byte(&memory, HeaderField::Flags1), 0x2);
        assert_ok_eq!(field_word(&memory, HeaderField::Release), 0x304);
        assert_ok_eq!(field_word(&memory, HeaderField::HighMark), 0x506);
        assert_ok_eq!(field_word(&memory, HeaderField::InitialPC), 0x708);
        assert_ok_eq!(field_word(&memory, HeaderField::Dictionary), 0x90a);
        assert_ok_eq!(field_word(&memory, HeaderField::ObjectTable), 0xb0c);
        assert_ok_eq!(field_word(&memory, HeaderField::GlobalTable), 0xd0e);
        assert_ok_eq!(field_word(&memory, HeaderField::StaticMark), 0x400);
        assert_ok_eq!(field_word(&memory, HeaderField::Flags2), 0x1112);
        assert_ok_eq!(
            field_word(&memory, HeaderField::AbbreviationsTable),
            0x191a
        );
        assert_ok_eq!(field_word(&memory, HeaderField::FileLength), 0x1b1c);
        assert_ok_eq!(field_word(&memory, HeaderField::Checksum), 0x1d1e);
        assert_ok_eq!(field_word(&memory, HeaderField::RoutinesOffset), 0x292a);
        assert_ok_eq!(field_word(&memory, HeaderField::StringsOffset), 0x2b2c);
        assert_ok_eq!(field_byte(&memory, HeaderField::DefaultBackground), 0x2d);
        assert_ok_eq!(field_byte(&memory, HeaderField::DefaultForeground), 0x2e);
        assert_ok_eq!(field_word(&memory, HeaderField::TerminatorTable), 0x2f30);
        assert_ok_eq!(field_word(&memory, HeaderField::AlphabetTable), 0x3536);
    }

    #[test]
    fn test_flag1() {
        let mut memory = test_memory();
        assert!(set_byte(&mut memory, HeaderField::Flags1, 0).is_ok());
        assert_ok_eq!(flag1(&memory, Flags1v3::StatusLineType as u8), false);
        assert!(set_flag1(&mut memory, Flags1v3::StatusLineType as u8).is_ok());
        assert_ok_eq!(flag1(&memory, Flags1v3::StatusLineType as u8), true);
        assert!(clear_flag1(&mut memory, Flags1v3::StatusLineType as u8).is_ok());
        assert_ok_eq!(flag1(&memory, Flags1v3::StatusLineType as u8), false);
    }

    #[test]
    fn test_flag2() {
        let mut memory = test_memory();
        assert!(set_word(&mut memory, HeaderField::Flags2, 0).is_ok());
        assert_ok_eq!(flag2(&memory, Flags2::Transcripting), false);
        assert!(set_flag2(&mut memory, Flags2::Transcripting).is_ok());
        assert_ok_eq!(flag2(&memory, Flags2::Transcripting), true);
        assert!(clear_flag2(&mut memory, Flags2::Transcripting).is_ok());
        assert_ok_eq!(flag2(&memory, Flags2::Transcripting), false);
    }
}
