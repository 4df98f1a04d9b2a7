//! Machine-state serialization for SAVE, RESTORE, and undo
//!
//! The format is private to this interpreter: the current frame, a count of
//! suspended frames, the suspended frames oldest first, then the raw dynamic
//! memory region.  All integers are big-endian i32.
//!
//! ```text
//! state    := frame(current) ; i32 num_suspended ; frame[] (oldest first)
//! frame    := i32 pc ; i32 locals[15] ; i32 num_locals ; i32 call_type ;
//!             i32 arg_count ; i32 frame_number ; stack
//! stack    := i32 n ; i32 values[n]        (bottom to top)
//! memory   := bytes[dynamic_size]          (appended after state)
//! ```
use crate::zmachine::frame::CallType;
use crate::{error::*, recoverable_error};

/// A call frame as held in a saved state
#[derive(Debug, Eq, PartialEq)]
pub struct SavedFrame {
    /// Saved program counter
    pc: usize,
    /// All 15 local variable slots
    local_variables: [u16; 15],
    /// Number of declared local variables
    local_variable_count: u8,
    /// Call type
    call_type: CallType,
    /// Argument count
    argument_count: u8,
    /// Frame number
    frame_number: u16,
    /// Routine stack, bottom to top
    stack: Vec<u16>,
}

impl SavedFrame {
    /// Constructor
    ///
    /// # Arguments
    /// * `pc` - Saved program counter
    /// * `local_variables` - All 15 local variable slots
    /// * `local_variable_count` - Declared local variable count
    /// * `call_type` - Call type
    /// * `argument_count` - Argument count
    /// * `frame_number` - Frame number
    /// * `stack` - Routine stack, bottom to top
    pub fn new(
        pc: usize,
        local_variables: &[u16; 15],
        local_variable_count: u8,
        call_type: CallType,
        argument_count: u8,
        frame_number: u16,
        stack: &[u16],
    ) -> SavedFrame {
        SavedFrame {
            pc,
            local_variables: *local_variables,
            local_variable_count,
            call_type,
            argument_count,
            frame_number,
            stack: stack.to_vec(),
        }
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn local_variables(&self) -> &[u16; 15] {
        &self.local_variables
    }

    pub fn local_variable_count(&self) -> u8 {
        self.local_variable_count
    }

    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    pub fn argument_count(&self) -> u8 {
        self.argument_count
    }

    pub fn frame_number(&self) -> u16 {
        self.frame_number
    }

    pub fn stack(&self) -> &Vec<u16> {
        &self.stack
    }

    fn write_to(&self, data: &mut Vec<u8>) {
        push_i32(data, self.pc as i32);
        for v in self.local_variables {
            push_i32(data, v as i32);
        }
        push_i32(data, self.local_variable_count as i32);
        push_i32(data, i32::from(self.call_type));
        push_i32(data, self.argument_count as i32);
        push_i32(data, self.frame_number as i32);
        push_i32(data, self.stack.len() as i32);
        for v in &self.stack {
            push_i32(data, *v as i32);
        }
    }

    fn read_from(cursor: &mut Cursor) -> Result<SavedFrame, RuntimeError> {
        let pc = cursor.read_i32()? as usize;
        let mut local_variables = [0; 15];
        for v in local_variables.iter_mut() {
            *v = cursor.read_i32()? as u16;
        }
        let local_variable_count = cursor.read_i32()? as u8;
        let call_type = CallType::try_from(cursor.read_i32()?)?;
        let argument_count = cursor.read_i32()? as u8;
        let frame_number = cursor.read_i32()? as u16;
        let n = cursor.read_i32()?;
        if !(0..=0xFFFF).contains(&n) {
            return recoverable_error!(ErrorCode::Restore, "Invalid stack size: {}", n);
        }
        let mut stack = Vec::new();
        for _ in 0..n {
            stack.push(cursor.read_i32()? as u16);
        }

        Ok(SavedFrame {
            pc,
            local_variables,
            local_variable_count,
            call_type,
            argument_count,
            frame_number,
            stack,
        })
    }
}

fn push_i32(data: &mut Vec<u8>, value: i32) {
    data.extend_from_slice(&value.to_be_bytes());
}

struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Cursor<'a> {
        Cursor { data, position: 0 }
    }

    fn read_i32(&mut self) -> Result<i32, RuntimeError> {
        if self.position + 4 <= self.data.len() {
            let bytes = [
                self.data[self.position],
                self.data[self.position + 1],
                self.data[self.position + 2],
                self.data[self.position + 3],
            ];
            self.position += 4;
            Ok(i32::from_be_bytes(bytes))
        } else {
            recoverable_error!(ErrorCode::Restore, "Truncated save state")
        }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}

/// A captured machine state
#[derive(Debug, Eq, PartialEq)]
pub struct SaveState {
    /// The active frame
    current: SavedFrame,
    /// Suspended frames, oldest first
    suspended: Vec<SavedFrame>,
    /// Dynamic memory contents
    memory: Vec<u8>,
}

impl SaveState {
    /// Constructor
    ///
    /// # Arguments
    /// * `current` - The active frame
    /// * `suspended` - Suspended frames, oldest first
    /// * `memory` - Dynamic memory contents
    pub fn new(current: SavedFrame, suspended: Vec<SavedFrame>, memory: Vec<u8>) -> SaveState {
        SaveState {
            current,
            suspended,
            memory,
        }
    }

    pub fn current(&self) -> &SavedFrame {
        &self.current
    }

    pub fn suspended(&self) -> &Vec<SavedFrame> {
        &self.suspended
    }

    pub fn memory(&self) -> &Vec<u8> {
        &self.memory
    }

    /// Serialize the state
    ///
    /// # Returns
    /// Byte vector holding the serialized state
    pub fn to_vec(&self) -> Vec<u8> {
        let mut data = Vec::new();
        self.current.write_to(&mut data);
        push_i32(&mut data, self.suspended.len() as i32);
        for frame in &self.suspended {
            frame.write_to(&mut data);
        }
        data.extend_from_slice(&self.memory);
        data
    }

    /// Deserialize a state
    ///
    /// # Arguments
    /// * `data` - Serialized state
    /// * `dynamic_size` - Expected size of the dynamic memory region
    ///
    /// # Returns
    /// [Result] with the state or a [RuntimeError]
    pub fn from_bytes(data: &[u8], dynamic_size: usize) -> Result<SaveState, RuntimeError> {
        let mut cursor = Cursor::new(data);
        let current = SavedFrame::read_from(&mut cursor)?;
        let n = cursor.read_i32()?;
        if !(0..=0xFFFF).contains(&n) {
            return recoverable_error!(ErrorCode::Restore, "Invalid frame count: {}", n);
        }
        let mut suspended = Vec::new();
        for _ in 0..n {
            suspended.push(SavedFrame::read_from(&mut cursor)?);
        }

        let memory = cursor.remaining();
        if memory.len() != dynamic_size {
            return recoverable_error!(
                ErrorCode::Restore,
                "Saved dynamic memory is {:#06x} bytes, expected {:#06x}",
                memory.len(),
                dynamic_size
            );
        }

        debug!(target: "app::state", "Read save state: {} suspended frames, {:#06x} bytes of dynamic memory", n, memory.len());
        Ok(SaveState {
            current,
            suspended,
            memory: memory.to_vec(),
        })
    }
}
