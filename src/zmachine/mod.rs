//! The Z-Machine
//!
//! A [ZMachine] owns the story image, the call stack, the I/O card, and
//! the RNG, and drives the fetch/decode/dispatch loop.  The embedder
//! supplies a [Screen] for display and input and calls [ZMachine::run].
use std::collections::HashSet;
use std::fs;

use crate::{
    config::Config,
    error::{ErrorCode, RuntimeError},
    fatal_error, files,
    instruction::{decoder, processor, Instruction, NextPc},
    recoverable_error,
    screen::Screen,
    state::{SaveState, SavedFrame},
    text,
};

use self::{
    frame::{CallType, Frame},
    header::{Flags1v3, Flags1v4, Flags2, HeaderField},
    iocard::IoCard,
    memory::Memory,
    rng::{chacha::ChaChaRng, ZRng},
};

pub mod frame;
pub mod header;
pub mod iocard;
pub mod memory;
pub mod rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Error handling behavior for recoverable errors
pub enum ErrorHandling {
    /// Warn every time the error occurs and continue running
    ContinueWarnAlways,
    /// Warn once per error type and continue running
    ContinueWarnOnce,
    /// Ignore all recoverable errors
    Ignore,
    /// Treat recoverable errors as fatal errors
    Abort,
}

#[derive(Debug, Eq, PartialEq)]
/// Why the decode loop stopped
enum LoopExit {
    /// QUIT was executed
    Quit,
    /// RESTART was executed
    Restart,
    /// An interrupt routine returned the given value
    InterruptReturn(u16),
}

#[derive(Debug, Eq, PartialEq)]
/// Outcome of dispatching an input interrupt routine
pub enum InterruptResult {
    /// The routine returned the given value
    Continue(u16),
    /// The routine executed QUIT
    Quit,
    /// The routine executed RESTART
    Restart,
}

/// The Z-Machine
pub struct ZMachine {
    /// Base story filename, minus any extension
    name: String,
    /// ZCode version
    version: u8,
    /// Memory map
    memory: Memory,
    /// RNG
    rng: Box<dyn ZRng>,
    /// Frame stack; the active frame is the last element
    frames: Vec<Frame>,
    /// I/O card
    io: IoCard,
    /// Captured undo state
    undo_state: Option<Vec<u8>>,
    /// Return value of an interrupt routine, unwinding one decode loop
    interrupt_return: Option<u16>,
    /// RESTART has been requested
    restart_requested: bool,
    /// Recoverable error handling mode
    error_handling: ErrorHandling,
    /// Recoverable errors already warned about
    reported_errors: HashSet<ErrorCode>,
}

impl ZMachine {
    /// Constructor
    ///
    /// # Arguments
    /// * `zcode` - Story file image
    /// * `config` - Runtime configuration
    /// * `screen` - Front end supplied by the embedder
    /// * `name` - Base story filename
    ///
    /// # Returns
    /// [Result] with the machine or a [RuntimeError]
    pub fn new(
        zcode: Vec<u8>,
        config: &Config,
        screen: Box<dyn Screen>,
        name: &str,
    ) -> Result<ZMachine, RuntimeError> {
        if zcode.len() < 0x40 {
            return fatal_error!(
                ErrorCode::FileError,
                "Story file is too short: {} bytes",
                zcode.len()
            );
        }

        let version = zcode[0];
        if !matches!(version, 1..=5 | 7 | 8) {
            return fatal_error!(
                ErrorCode::UnsupportedVersion,
                "Unsupported story file version: {}",
                version
            );
        }

        let memory = Memory::new(zcode);
        let mut zmachine = ZMachine {
            name: name.to_string(),
            version,
            memory,
            rng: Box::new(ChaChaRng::new()),
            frames: Vec::new(),
            io: IoCard::new(screen),
            undo_state: None,
            interrupt_return: None,
            restart_requested: false,
            error_handling: config.error_handling(),
            reported_errors: HashSet::new(),
        };

        zmachine.initialize()?;
        Ok(zmachine)
    }

    /// Get the ZCode version
    ///
    /// # Returns
    /// ZCode version
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Get the base story filename
    ///
    /// # Returns
    /// Base name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a reference to the front end
    pub fn screen(&self) -> &dyn Screen {
        self.io.screen()
    }

    /// Get a mutable reference to the front end
    pub fn screen_mut(&mut self) -> &mut dyn Screen {
        self.io.screen_mut()
    }

    /// Stamp the interpreter's capabilities into the header and set up the
    /// initial frame.
    ///
    /// Called at construction and again on RESTART and RESTORE; the frame
    /// stack is left alone when it is not empty.
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    fn initialize(&mut self) -> Result<(), RuntimeError> {
        self.io.screen_mut().initialize(self.version);

        if self.version < 4 {
            header::clear_flag1(&mut self.memory, Flags1v3::Tandy as u8)?;
            if self.io.screen().has_status_line() {
                header::clear_flag1(&mut self.memory, Flags1v3::StatusLineNotAvailable as u8)?;
            } else {
                header::set_flag1(&mut self.memory, Flags1v3::StatusLineNotAvailable as u8)?;
            }
            if self.io.screen().has_upper_window() {
                header::set_flag1(&mut self.memory, Flags1v3::ScreenSplitAvailable as u8)?;
            } else {
                header::clear_flag1(&mut self.memory, Flags1v3::ScreenSplitAvailable as u8)?;
            }
            if self.io.screen().default_font_proportional() {
                header::set_flag1(&mut self.memory, Flags1v3::VariablePitchDefault as u8)?;
            } else {
                header::clear_flag1(&mut self.memory, Flags1v3::VariablePitchDefault as u8)?;
            }
        } else {
            if self.version >= 5 && self.io.screen().has_colors() {
                header::set_flag1(&mut self.memory, Flags1v4::ColoursAvailable as u8)?;
            }
            if self.io.screen().has_bold() {
                header::set_flag1(&mut self.memory, Flags1v4::BoldfaceAvailable as u8)?;
            }
            if self.io.screen().has_italic() {
                header::set_flag1(&mut self.memory, Flags1v4::ItalicAvailable as u8)?;
            }
            if self.io.screen().has_fixed_width() {
                header::set_flag1(&mut self.memory, Flags1v4::FixedSpaceAvailable as u8)?;
            }
            if self.io.screen().has_timed_input() {
                header::set_flag1(&mut self.memory, Flags1v4::TimedInputAvailable as u8)?;
            }

            header::set_byte(&mut self.memory, HeaderField::InterpreterNumber, 6)?;
            header::set_byte(&mut self.memory, HeaderField::InterpreterVersion, b'A')?;

            let (rows, columns) = self.io.screen().screen_characters();
            header::set_byte(&mut self.memory, HeaderField::ScreenLines, rows)?;
            header::set_byte(&mut self.memory, HeaderField::ScreenColumns, columns)?;

            if self.version >= 5 {
                let (width, height) = self.io.screen().screen_units();
                header::set_word(&mut self.memory, HeaderField::ScreenWidth, width)?;
                header::set_word(&mut self.memory, HeaderField::ScreenHeight, height)?;
                let (font_width, font_height) = self.io.screen().font_size();
                header::set_byte(&mut self.memory, HeaderField::FontWidth, font_width)?;
                header::set_byte(&mut self.memory, HeaderField::FontHeight, font_height)?;
                let background = self.io.screen().default_background();
                let foreground = self.io.screen().default_foreground();
                header::set_byte(&mut self.memory, HeaderField::DefaultBackground, background)?;
                header::set_byte(&mut self.memory, HeaderField::DefaultForeground, foreground)?;
            }
        }

        // Z-Machine standard compliance
        header::set_word(&mut self.memory, HeaderField::Revision, 0x0100)?;

        // Pass any story-supplied input terminators to the front end
        if self.version >= 5 {
            let table = header::field_word(&self.memory, HeaderField::TerminatorTable)? as usize;
            if table > 0 {
                let mut terminators = Vec::new();
                let mut i = 0;
                loop {
                    let b = self.memory.read_byte(table + i)?;
                    if b == 0 {
                        break;
                    }
                    terminators.push(b as u16);
                    i += 1;
                }
                self.io.screen_mut().set_terminating_characters(&terminators);
            }
        }

        // Initializing after a restore already has frames
        if self.frames.is_empty() {
            let pc = header::field_word(&self.memory, HeaderField::InitialPC)? as usize;
            self.frames.push(Frame::initial(pc));
        }

        Ok(())
    }

    // Memory access

    /// Read a byte from the memory map
    ///
    /// # Arguments
    /// * `address` - Address to read from
    ///
    /// # Returns
    /// [Result] containing the byte value or a [RuntimeError]
    pub fn read_byte(&self, address: usize) -> Result<u8, RuntimeError> {
        self.memory.read_byte(address)
    }

    /// Read a word from the memory map
    ///
    /// # Arguments
    /// * `address` - Address to read from
    ///
    /// # Returns
    /// [Result] containing the word value or a [RuntimeError]
    pub fn read_word(&self, address: usize) -> Result<u16, RuntimeError> {
        self.memory.read_word(address)
    }

    /// Write a byte to the memory map
    ///
    /// # Arguments
    /// * `address` - Address to write to
    /// * `value` - Byte value to write
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), RuntimeError> {
        self.memory.write_byte(address, value)
    }

    /// Write a word to the memory map
    ///
    /// # Arguments
    /// * `address` - Address to write to
    /// * `value` - Word value to write
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn write_word(&mut self, address: usize, value: u16) -> Result<(), RuntimeError> {
        self.memory.write_word(address, value)
    }

    /// Read an encoded ztext string: words up to and including the first
    /// with the terminator bit set
    ///
    /// # Arguments
    /// * `address` - Address of the string
    ///
    /// # Returns
    /// [Result] with the ztext words or a [RuntimeError]
    pub fn string_literal(&self, address: usize) -> Result<Vec<u16>, RuntimeError> {
        let mut d = Vec::new();
        loop {
            let w = self.memory.read_word(address + (d.len() * 2))?;
            d.push(w);
            if w & 0x8000 == 0x8000 {
                return Ok(d);
            }
        }
    }

    /// Calculate the checksum of the story file
    ///
    /// # Returns
    /// [Result] containing the checksum value or a [RuntimeError]
    pub fn checksum(&self) -> Result<u16, RuntimeError> {
        self.memory.checksum()
    }

    /// Reads a byte field from the header
    ///
    /// # Arguments
    /// * `field` - Field to read
    ///
    /// # Returns
    /// [Result] with the byte value or a [RuntimeError]
    pub fn header_byte(&self, field: HeaderField) -> Result<u8, RuntimeError> {
        header::field_byte(&self.memory, field)
    }

    /// Reads a word field from the header
    ///
    /// # Arguments
    /// * `field` - Field to read
    ///
    /// # Returns
    /// [Result] with the word value or a [RuntimeError]
    pub fn header_word(&self, field: HeaderField) -> Result<u16, RuntimeError> {
        header::field_word(&self.memory, field)
    }

    // Packed addresses

    /// Unpack a routine address
    ///
    /// # Arguments
    /// * `address` - Packed address
    ///
    /// # Returns
    /// [Result] with the byte address of the routine header or a [RuntimeError]
    pub fn packed_routine_address(&self, address: u16) -> Result<usize, RuntimeError> {
        match self.version {
            1..=3 => Ok(address as usize * 2),
            4 | 5 => Ok(address as usize * 4),
            7 => Ok((address as usize * 4)
                + (self.header_word(HeaderField::RoutinesOffset)? as usize * 8)),
            8 => Ok(address as usize * 8),
            _ => fatal_error!(
                ErrorCode::UnsupportedVersion,
                "Unsupported version: {}",
                self.version
            ),
        }
    }

    /// Unpack a string address
    ///
    /// # Arguments
    /// * `address` - Packed address
    ///
    /// # Returns
    /// [Result] with the byte address of the string or a [RuntimeError]
    pub fn packed_string_address(&self, address: u16) -> Result<usize, RuntimeError> {
        match self.version {
            1..=3 => Ok(address as usize * 2),
            4 | 5 => Ok(address as usize * 4),
            7 => Ok((address as usize * 4)
                + (self.header_word(HeaderField::StringsOffset)? as usize * 8)),
            8 => Ok(address as usize * 8),
            _ => fatal_error!(
                ErrorCode::UnsupportedVersion,
                "Unsupported version: {}",
                self.version
            ),
        }
    }

    // Frame stack

    /// Get the depth of the frame stack
    ///
    /// # Returns
    /// Number of frames, including the active one
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn current_frame(&self) -> Result<&Frame, RuntimeError> {
        if let Some(frame) = self.frames.last() {
            Ok(frame)
        } else {
            fatal_error!(ErrorCode::StackUnderflow, "No active frame")
        }
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        if let Some(frame) = self.frames.last_mut() {
            Ok(frame)
        } else {
            fatal_error!(ErrorCode::StackUnderflow, "No active frame")
        }
    }

    /// Get the program counter of the active frame
    ///
    /// # Returns
    /// [Result] with the pc or a [RuntimeError]
    pub fn pc(&self) -> Result<usize, RuntimeError> {
        Ok(self.current_frame()?.pc())
    }

    /// Set the program counter of the active frame
    ///
    /// # Arguments
    /// * `pc` - New program counter
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn set_pc(&mut self, pc: usize) -> Result<(), RuntimeError> {
        self.current_frame_mut()?.set_pc(pc);
        Ok(())
    }

    // Variables

    fn global_variable_address(&self, variable: u8) -> Result<usize, RuntimeError> {
        let table = header::field_word(&self.memory, HeaderField::GlobalTable)? as usize;
        Ok(table + ((variable as usize - 16) * 2))
    }

    /// Get the value of a variable.
    ///
    /// Variable 0 pops the routine stack; 1-15 are locals of the active
    /// frame; 16-255 are globals.
    ///
    /// # Arguments
    /// * `variable` - Variable number
    ///
    /// # Returns
    /// [Result] with the variable value or a [RuntimeError]
    pub fn variable(&mut self, variable: u8) -> Result<u16, RuntimeError> {
        if variable < 16 {
            self.current_frame_mut()?.local_variable(variable)
        } else {
            let address = self.global_variable_address(variable)?;
            self.read_word(address)
        }
    }

    /// Peek at the value of a variable without changing the stack
    ///
    /// # Arguments
    /// * `variable` - Variable number
    ///
    /// # Returns
    /// [Result] with the variable value or a [RuntimeError]
    pub fn peek_variable(&self, variable: u8) -> Result<u16, RuntimeError> {
        if variable < 16 {
            self.current_frame()?.peek_local_variable(variable)
        } else {
            let address = self.global_variable_address(variable)?;
            self.read_word(address)
        }
    }

    /// Set the value of a variable.
    ///
    /// Variable 0 pushes onto the routine stack.
    ///
    /// # Arguments
    /// * `variable` - Variable number
    /// * `value` - Value to set
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn set_variable(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        debug!(target: "app::state", "Set variable {:02x} to {:04x}", variable, value);
        if variable < 16 {
            self.current_frame_mut()?.set_local_variable(variable, value);
            Ok(())
        } else {
            let address = self.global_variable_address(variable)?;
            self.write_word(address, value)
        }
    }

    /// Set the value of a variable indirectly.
    ///
    /// Variable 0 replaces the top of the routine stack.
    ///
    /// # Arguments
    /// * `variable` - Variable number
    /// * `value` - Value to set
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn set_variable_indirect(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        if variable < 16 {
            self.current_frame_mut()?
                .set_local_variable_indirect(variable, value)
        } else {
            let address = self.global_variable_address(variable)?;
            self.write_word(address, value)
        }
    }

    // Routine calls

    fn routine_header(&self, address: usize) -> Result<(usize, Vec<u16>), RuntimeError> {
        let variable_count = self.memory.read_byte(address)? as usize;
        if variable_count > 15 {
            return fatal_error!(
                ErrorCode::InvalidRoutine,
                "Routines can have at most 15 local variables: {}",
                variable_count
            );
        }

        // Locals are seeded from the routine header in V1-4 and zeroed in V5+
        if self.version < 5 {
            let mut local_variables = Vec::new();
            for i in 0..variable_count {
                local_variables.push(self.memory.read_word(address + 1 + (i * 2))?);
            }
            Ok((address + 1 + (variable_count * 2), local_variables))
        } else {
            Ok((address + 1, vec![0; variable_count]))
        }
    }

    /// Call a routine.
    ///
    /// The caller's frame is suspended with its pc at the call's store
    /// descriptor for a [CallType::Function], or past the call for a
    /// [CallType::Procedure]; returning reads the store byte back from
    /// there.
    ///
    /// # Arguments
    /// * `address` - Unpacked routine header address, non-zero
    /// * `arguments` - Arguments to the routine
    /// * `call_type` - How the routine is being invoked
    /// * `instruction` - The call instruction
    ///
    /// # Returns
    /// [Result] with the address of the routine's first instruction or a
    /// [RuntimeError]
    pub fn call_routine(
        &mut self,
        address: usize,
        arguments: &[u16],
        call_type: CallType,
        instruction: &Instruction,
    ) -> Result<NextPc, RuntimeError> {
        let (initial_pc, mut local_variables) = self.routine_header(address)?;

        let resume = match call_type {
            CallType::Function => match instruction.store() {
                Some(r) => r.address(),
                None => {
                    return fatal_error!(
                        ErrorCode::InvalidInstruction,
                        "Function call without a store location: {}",
                        instruction
                    )
                }
            },
            _ => instruction.next_address(),
        };
        self.current_frame_mut()?.set_pc(resume);

        for (i, argument) in arguments.iter().enumerate() {
            if i < local_variables.len() {
                local_variables[i] = *argument;
            }
        }
        let argument_count = u8::min(arguments.len() as u8, local_variables.len() as u8);
        let frame_number = self.current_frame()?.frame_number() + 1;
        debug!(target: "app::state", "Call routine @ {:05x}, {} args, frame {}", address, argument_count, frame_number);

        self.frames.push(Frame::new(
            initial_pc,
            &local_variables,
            argument_count,
            call_type,
            frame_number,
        ));
        Ok(NextPc::Address(initial_pc))
    }

    /// Return from the active routine.
    ///
    /// What happens to `value` depends on the popped frame's call type:
    /// stored through the caller's store byte for a function, discarded
    /// for a procedure, or handed to the enclosing decode loop for an
    /// interrupt.
    ///
    /// # Arguments
    /// * `value` - Return value
    ///
    /// # Returns
    /// [Result] with the address to resume at or a [RuntimeError]
    pub fn return_routine(&mut self, value: u16) -> Result<NextPc, RuntimeError> {
        if self.frames.len() < 2 {
            return fatal_error!(ErrorCode::StackUnderflow, "Call stack underflow");
        }

        // Unwrap is safe, the stack holds at least 2 frames
        let frame = self.frames.pop().unwrap();
        debug!(target: "app::state", "Return {:04x} from frame {} ({:?})", value, frame.frame_number(), frame.call_type());
        match frame.call_type() {
            CallType::Procedure => Ok(NextPc::Address(self.pc()?)),
            CallType::Function => {
                let pc = self.pc()?;
                let variable = self.read_byte(pc)?;
                self.set_pc(pc + 1)?;
                self.set_variable(variable, value)?;
                Ok(NextPc::Address(pc + 1))
            }
            CallType::Interrupt => {
                self.interrupt_return = Some(value);
                Ok(NextPc::Address(self.pc()?))
            }
        }
    }

    /// Get the frame number of the active frame, for CATCH
    ///
    /// # Returns
    /// [Result] with the frame number or a [RuntimeError]
    pub fn catch(&self) -> Result<u16, RuntimeError> {
        Ok(self.current_frame()?.frame_number())
    }

    /// Unwind the stack to the frame with the given number, then return
    /// from it with `value`.
    ///
    /// # Arguments
    /// * `frame_number` - Frame number captured by CATCH
    /// * `value` - Return value
    ///
    /// # Returns
    /// [Result] with the address to resume at or a [RuntimeError]
    pub fn throw(&mut self, frame_number: u16, value: u16) -> Result<NextPc, RuntimeError> {
        while self.current_frame()?.frame_number() != frame_number {
            if self.frames.len() < 2 {
                return fatal_error!(ErrorCode::StackUnderflow, "THROW: call stack underflow");
            }
            self.frames.pop();
        }

        self.return_routine(value)
    }

    /// Gets the count of arguments passed to the executing routine
    ///
    /// # Returns
    /// [Result] with the argument count or a [RuntimeError]
    pub fn argument_count(&self) -> Result<u8, RuntimeError> {
        Ok(self.current_frame()?.argument_count())
    }

    /// Invoke an input-interrupt routine and run it to completion.
    ///
    /// An interrupt frame is pushed and the decode loop re-entered
    /// recursively; the nested loop exits when that frame returns.
    ///
    /// # Arguments
    /// * `address` - Unpacked routine header address
    ///
    /// # Returns
    /// [Result] with the routine's return value, or the quit/restart
    /// outcome, or a [RuntimeError]
    pub fn call_interrupt(&mut self, address: usize) -> Result<InterruptResult, RuntimeError> {
        if address == 0 {
            return Ok(InterruptResult::Continue(0));
        }

        let (initial_pc, local_variables) = self.routine_header(address)?;
        let frame_number = self.current_frame()?.frame_number() + 1;
        debug!(target: "app::state", "Interrupt routine @ {:05x}, frame {}", address, frame_number);
        self.frames.push(Frame::new(
            initial_pc,
            &local_variables,
            0,
            CallType::Interrupt,
            frame_number,
        ));

        match self.decode_loop()? {
            LoopExit::Quit => Ok(InterruptResult::Quit),
            LoopExit::Restart => Ok(InterruptResult::Restart),
            LoopExit::InterruptReturn(value) => Ok(InterruptResult::Continue(value)),
        }
    }

    // Runtime

    /// Run the story to completion.
    ///
    /// Fatal errors are reported through [Screen::fatal] before this
    /// function returns them.
    ///
    /// # Returns
    /// Empty [Result] on QUIT, or the fatal [RuntimeError]
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            match self.decode_loop() {
                Ok(LoopExit::Quit) => {
                    self.io.screen_mut().quit();
                    return Ok(());
                }
                Ok(LoopExit::Restart) => {
                    if let Err(e) = self.restart() {
                        self.io.screen_mut().fatal(e.message());
                        return Err(e);
                    }
                }
                Ok(LoopExit::InterruptReturn(_)) => {
                    let e = RuntimeError::fatal(
                        ErrorCode::StackUnderflow,
                        "Interrupt return with no read in progress".to_string(),
                    );
                    self.io.screen_mut().fatal(e.message());
                    return Err(e);
                }
                Err(e) => {
                    self.io.screen_mut().fatal(e.message());
                    return Err(e);
                }
            }
        }
    }

    /// The fetch/decode/dispatch loop.
    ///
    /// Runs until QUIT, a restart request, or - when entered recursively
    /// for an input interrupt - until the interrupt frame returns.
    fn decode_loop(&mut self) -> Result<LoopExit, RuntimeError> {
        loop {
            let pc = self.pc()?;
            let instruction = decoder::decode_instruction(self, pc)?;
            match processor::dispatch(self, &instruction) {
                Ok(NextPc::Quit) => return Ok(LoopExit::Quit),
                Ok(NextPc::Address(address)) => self.set_pc(address)?,
                Err(e) => {
                    if e.is_recoverable() && self.continue_after(&e) {
                        let resume = e.next_address().unwrap_or(instruction.next_address());
                        self.set_pc(resume)?;
                    } else {
                        return Err(e);
                    }
                }
            }

            if let Some(value) = self.interrupt_return.take() {
                return Ok(LoopExit::InterruptReturn(value));
            }
            if self.restart_requested {
                return Ok(LoopExit::Restart);
            }
        }
    }

    /// Should execution continue past a recoverable error?
    fn continue_after(&mut self, error: &RuntimeError) -> bool {
        match self.error_handling {
            ErrorHandling::Abort => false,
            ErrorHandling::Ignore => true,
            ErrorHandling::ContinueWarnAlways => {
                warn!(target: "app::state", "{}", error);
                true
            }
            ErrorHandling::ContinueWarnOnce => {
                if self.reported_errors.insert(error.code()) {
                    warn!(target: "app::state", "{}", error);
                }
                true
            }
        }
    }

    /// Request a RESTART; the decode loop exits at the end of the current
    /// instruction
    pub fn request_restart(&mut self) {
        self.restart_requested = true;
    }

    /// Has a RESTART been requested?
    pub fn restart_pending(&self) -> bool {
        self.restart_requested
    }

    /// Re-initialize for RESTART.
    ///
    /// Dynamic memory and the frame stack are reset; the transcript bit
    /// of Flags2 survives.
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    fn restart(&mut self) -> Result<(), RuntimeError> {
        debug!(target: "app::state", "Restart");
        self.restart_requested = false;
        let transcripting = header::flag2(&self.memory, Flags2::Transcripting)?;

        self.io.screen_mut().restart();
        self.memory.reset();
        self.frames.clear();
        self.io.reset();
        self.rng.randomize();
        self.initialize()?;

        if transcripting {
            header::set_flag2(&mut self.memory, Flags2::Transcripting)?;
        } else {
            header::clear_flag2(&mut self.memory, Flags2::Transcripting)?;
        }

        Ok(())
    }

    // Output

    /// Print decoded text to the enabled output streams.
    ///
    /// While a stream 3 table is open it swallows all other output.
    ///
    /// # Arguments
    /// * `text` - Decoded ZSCII text
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn print(&mut self, text: &[u16]) -> Result<(), RuntimeError> {
        if self.io.stream_3_active() {
            for c in text {
                self.io.stream_3_push(*c)?;
            }
        } else {
            self.io.print(&text::to_string(text));
        }
        Ok(())
    }

    /// Print a newline to the enabled output streams
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn new_line(&mut self) -> Result<(), RuntimeError> {
        if self.io.stream_3_active() {
            self.io.stream_3_push(0x0d)
        } else {
            self.io.new_line();
            Ok(())
        }
    }

    /// Draw the status line (V1-3).
    ///
    /// The left side is the short name of the object in global 16; the
    /// right side is score/turns or hours/minutes per Flags1 bit 1.
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn status_line(&mut self) -> Result<(), RuntimeError> {
        let object = self.variable(16)? as usize;
        let ztext = crate::object::property::short_name(self, object)?;
        let name = text::decode(self, &ztext, false)?;
        let location = text::to_string(&name);
        let a = self.variable(17)? as i16;
        let b = self.variable(18)? as i16;
        let time_game = header::flag1(&self.memory, Flags1v3::StatusLineType as u8)?;
        self.io
            .screen_mut()
            .show_status(&location, a, b, time_game);
        Ok(())
    }

    /// Enable or disable an output stream.
    ///
    /// A positive `stream` enables, negative disables.  Stream 2 keeps
    /// the transcript bit of Flags2 in sync; closing stream 3 writes the
    /// collected table back to memory.
    ///
    /// # Arguments
    /// * `stream` - Signed stream number
    /// * `table` - Table address, required when enabling stream 3
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn output_stream(
        &mut self,
        stream: i16,
        table: Option<usize>,
    ) -> Result<(), RuntimeError> {
        match stream {
            0 => Ok(()),
            1 => self.io.enable_output_stream(1, None),
            2 => {
                let path = if self.io.has_transcript() {
                    None
                } else {
                    let suggested = files::first_available(&self.name, "txt")?;
                    self.io
                        .screen_mut()
                        .get_filename("Transcript File", Some(suggested.as_str()), true)
                };
                self.io.enable_output_stream(2, path.as_deref())?;
                header::set_flag2(&mut self.memory, Flags2::Transcripting)
            }
            3 => match table {
                Some(address) => self.io.enable_stream_3(address),
                None => fatal_error!(
                    ErrorCode::Stream3Table,
                    "Stream 3 enabled without a table to write to"
                ),
            },
            4 => {
                let path = if self.io.has_command_record() {
                    None
                } else {
                    let suggested = files::first_available(&self.name, "cmd")?;
                    self.io
                        .screen_mut()
                        .get_filename("Command Record File", Some(suggested.as_str()), true)
                };
                self.io.enable_output_stream(4, path.as_deref())
            }
            -1 => self.io.disable_output_stream(1),
            -2 => {
                self.io.disable_output_stream(2)?;
                header::clear_flag2(&mut self.memory, Flags2::Transcripting)
            }
            -3 => {
                if let Some((address, buffer)) = self.io.disable_stream_3() {
                    self.write_word(address, buffer.len() as u16)?;
                    for (i, c) in buffer.iter().enumerate() {
                        self.write_byte(address + 2 + i, *c as u8)?;
                    }
                }
                Ok(())
            }
            -4 => self.io.disable_output_stream(4),
            _ => recoverable_error!(
                ErrorCode::InvalidOutputStream,
                "Output stream {} is not valid: [-4..4]",
                stream
            ),
        }
    }

    /// Select an input stream
    ///
    /// # Arguments
    /// * `stream` - 0 for the keyboard, 1 to replay a command file
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn input_stream(&mut self, stream: u16) -> Result<(), RuntimeError> {
        if stream == 1 {
            let suggested = files::last_existing(&self.name, "cmd")?;
            let path = self
                .io
                .screen_mut()
                .get_filename("Command Replay File", Some(suggested.as_str()), false);
            self.io.select_input_stream(1, path.as_deref())
        } else {
            self.io.select_input_stream(stream, None)
        }
    }

    // Input

    /// The set of input terminators: newline plus any story-supplied
    /// terminating characters (V5+).  An entry of 255 in the table means
    /// every function key terminates input.
    ///
    /// # Returns
    /// [Result] with the terminator list or a [RuntimeError]
    pub fn input_terminators(&self) -> Result<Vec<u16>, RuntimeError> {
        let mut terminators = vec![0x0d];
        if self.version >= 5 {
            let table = header::field_word(&self.memory, HeaderField::TerminatorTable)? as usize;
            if table > 0 {
                let mut i = 0;
                loop {
                    let b = self.memory.read_byte(table + i)?;
                    match b {
                        0 => break,
                        255 => {
                            for c in 129..=154 {
                                terminators.push(c);
                            }
                            for c in 252..=254 {
                                terminators.push(c);
                            }
                        }
                        _ => terminators.push(b as u16),
                    }
                    i += 1;
                }
            }
        }

        Ok(terminators)
    }

    /// Read a line of input through the I/O card
    ///
    /// # Arguments
    /// * `input` - Pre-typed input, appended to in place
    /// * `max` - Maximum input length
    /// * `terminators` - ZSCII codes that end input
    /// * `timeout` - Timeout in tenths of a second, 0 for none
    ///
    /// # Returns
    /// [Option] with the ZSCII terminator, or [None] on timeout
    pub fn read_line(
        &mut self,
        input: &mut Vec<u16>,
        max: usize,
        terminators: &[u16],
        timeout: u16,
    ) -> Option<u16> {
        self.io.read_line(input, max, terminators, timeout)
    }

    /// Read a single keypress through the I/O card
    ///
    /// # Arguments
    /// * `timeout` - Timeout in tenths of a second, 0 for none
    ///
    /// # Returns
    /// [Option] with the ZSCII code, or [None] on timeout
    pub fn read_key(&mut self, timeout: u16) -> Option<u16> {
        self.io.read_char(timeout)
    }

    // RNG

    /// Get a random number in 1..=`range`
    pub fn random(&mut self, range: u16) -> u16 {
        self.rng.random(range)
    }

    /// Seed the RNG deterministically
    pub fn seed_random(&mut self, seed: u16) {
        self.rng.seed(seed)
    }

    /// Re-seed the RNG from entropy
    pub fn randomize(&mut self) {
        self.rng.randomize()
    }

    // Save/restore

    /// Capture the machine state with the active frame's pc set to `pc`
    fn capture_state(&self, pc: usize) -> Result<SaveState, RuntimeError> {
        let mut current = self.current_frame()?.clone();
        current.set_pc(pc);
        let suspended = self.frames[..self.frames.len() - 1]
            .iter()
            .map(SavedFrame::from)
            .collect();
        let memory = self.memory.dump(0, self.memory.static_mark())?;
        Ok(SaveState::new(SavedFrame::from(&current), suspended, memory))
    }

    /// Replace the machine state from serialized data.
    ///
    /// The transcript bit of Flags2 survives the restore.
    ///
    /// # Arguments
    /// * `data` - Serialized state
    ///
    /// # Returns
    /// [Result] with the restored pc or a [RuntimeError]
    pub fn restore_state(&mut self, data: &[u8]) -> Result<usize, RuntimeError> {
        let state = SaveState::from_bytes(data, self.memory.static_mark())?;
        let transcripting = header::flag2(&self.memory, Flags2::Transcripting)?;

        self.memory.restore(state.memory())?;
        if transcripting {
            header::set_flag2(&mut self.memory, Flags2::Transcripting)?;
        } else {
            header::clear_flag2(&mut self.memory, Flags2::Transcripting)?;
        }

        self.frames = state.suspended().iter().map(Frame::from).collect();
        self.frames.push(Frame::from(state.current()));
        Ok(state.current().pc())
    }

    /// SAVE the machine state to a file chosen by the player.
    ///
    /// # Arguments
    /// * `pc` - pc to capture: past SAVE's store byte (V4+) or at its
    ///   branch descriptor (V1-3)
    ///
    /// # Returns
    /// Empty [Result], or a recoverable [RuntimeError] on cancel or I/O
    /// failure
    pub fn save(&mut self, pc: usize) -> Result<(), RuntimeError> {
        let data = self.capture_state(pc)?.to_vec();
        let suggested = files::first_available(&self.name, "zav")?;
        match self
            .io
            .screen_mut()
            .get_filename("Save Game", Some(suggested.as_str()), true)
        {
            Some(path) => match fs::write(&path, &data) {
                Ok(_) => Ok(()),
                Err(e) => {
                    recoverable_error!(ErrorCode::Save, "Error writing save file: {}", e)
                }
            },
            None => recoverable_error!(ErrorCode::UserCancel, "Save dialog cancelled"),
        }
    }

    /// RESTORE the machine state from a file chosen by the player.
    ///
    /// # Returns
    /// [Result] with the restored pc, or a recoverable [RuntimeError] on
    /// cancel or I/O failure
    pub fn restore(&mut self) -> Result<usize, RuntimeError> {
        let suggested = files::last_existing(&self.name, "zav")?;
        let path = match self
            .io
            .screen_mut()
            .get_filename("Restore Game", Some(suggested.as_str()), false)
        {
            Some(p) => p,
            None => return recoverable_error!(ErrorCode::UserCancel, "Restore dialog cancelled"),
        };
        let data = match fs::read(&path) {
            Ok(d) => d,
            Err(e) => {
                return recoverable_error!(ErrorCode::Restore, "Error reading save file: {}", e)
            }
        };

        self.restore_state(&data)
    }

    /// SAVE_UNDO: capture the machine state in memory
    ///
    /// # Arguments
    /// * `pc` - pc to capture, past SAVE_UNDO's store byte
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn save_undo(&mut self, pc: usize) -> Result<(), RuntimeError> {
        debug!(target: "app::state", "Capture undo state");
        self.undo_state = Some(self.capture_state(pc)?.to_vec());
        Ok(())
    }

    /// RESTORE_UNDO: restore the most recently captured undo state
    ///
    /// # Returns
    /// [Result] with the restored pc, or a recoverable [RuntimeError] when
    /// no undo state exists
    pub fn restore_undo(&mut self) -> Result<usize, RuntimeError> {
        match self.undo_state.clone() {
            Some(data) => self.restore_state(&data),
            None => recoverable_error!(ErrorCode::UndoNoState, "No undo state to restore"),
        }
    }

    /// EXT SAVE with a region: dump part of memory to an auxiliary file
    ///
    /// # Arguments
    /// * `address` - Region start
    /// * `length` - Region length
    /// * `suggested` - Story-supplied filename suggestion, if any
    ///
    /// # Returns
    /// Empty [Result], or a recoverable [RuntimeError] on cancel or I/O
    /// failure
    pub fn save_aux(
        &mut self,
        address: usize,
        length: usize,
        suggested: Option<String>,
    ) -> Result<(), RuntimeError> {
        let data = self.memory.dump(address, length)?;
        let suggested = match suggested {
            Some(s) => s,
            None => files::first_available(&self.name, "aux")?,
        };
        match self
            .io
            .screen_mut()
            .get_filename("Save Auxiliary File", Some(suggested.as_str()), true)
        {
            Some(path) => match fs::write(&path, &data) {
                Ok(_) => Ok(()),
                Err(e) => {
                    recoverable_error!(ErrorCode::Save, "Error writing auxiliary file: {}", e)
                }
            },
            None => recoverable_error!(ErrorCode::UserCancel, "Save dialog cancelled"),
        }
    }

    /// EXT RESTORE with a region: load an auxiliary file into memory
    ///
    /// # Arguments
    /// * `address` - Region start
    /// * `length` - Maximum bytes to load
    /// * `suggested` - Story-supplied filename suggestion, if any
    ///
    /// # Returns
    /// [Result] with the number of bytes loaded, or a recoverable
    /// [RuntimeError] on cancel or I/O failure
    pub fn restore_aux(
        &mut self,
        address: usize,
        length: usize,
        suggested: Option<String>,
    ) -> Result<usize, RuntimeError> {
        let suggested = match suggested {
            Some(s) => s,
            None => files::last_existing(&self.name, "aux")?,
        };
        let path = match self
            .io
            .screen_mut()
            .get_filename("Restore Auxiliary File", Some(suggested.as_str()), false)
        {
            Some(p) => p,
            None => return recoverable_error!(ErrorCode::UserCancel, "Restore dialog cancelled"),
        };
        let mut data = match fs::read(&path) {
            Ok(d) => d,
            Err(e) => {
                return recoverable_error!(
                    ErrorCode::Restore,
                    "Error reading auxiliary file: {}",
                    e
                )
            }
        };

        data.truncate(length);
        self.memory.load(address, &data)?;
        Ok(data.len())
    }
}

#[cfg(test)]
impl ZMachine {
    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_ok_eq, test_util::*};

    use super::*;

    #[test]
    fn test_new_rejects_unsupported_versions() {
        for version in [0, 6, 9, 0x20] {
            let mut map = test_map(3);
            map[0] = version;
            let z = ZMachine::new(map, &crate::config::Config::default(), test_screen(), "test");
            assert!(z.is_err());
        }
        assert!(ZMachine::new(
            vec![3; 0x10],
            &crate::config::Config::default(),
            test_screen(),
            "test"
        )
        .is_err());
    }

    #[test]
    fn test_initialize_stamps_header_v3() {
        let zmachine = mock_machine(test_map(3));
        // Status line available (bit clear), screen split available
        assert_ok_eq!(zmachine.header_byte(HeaderField::Flags1), 0x20);
        assert_ok_eq!(zmachine.header_word(HeaderField::Revision), 0x0100);
        assert_ok_eq!(zmachine.pc(), 0x400);
    }

    #[test]
    fn test_initialize_stamps_header_v5() {
        let zmachine = mock_machine(test_map(5));
        // Colours, bold, italic, fixed, timed input
        assert_ok_eq!(zmachine.header_byte(HeaderField::Flags1), 0x9D);
        assert_ok_eq!(zmachine.header_byte(HeaderField::InterpreterNumber), 6);
        assert_ok_eq!(zmachine.header_byte(HeaderField::ScreenLines), 24);
        assert_ok_eq!(zmachine.header_byte(HeaderField::ScreenColumns), 80);
        assert_ok_eq!(zmachine.header_word(HeaderField::ScreenWidth), 80);
        assert_ok_eq!(zmachine.header_word(HeaderField::ScreenHeight), 24);
        assert_ok_eq!(zmachine.header_byte(HeaderField::DefaultBackground), 2);
        assert_ok_eq!(zmachine.header_byte(HeaderField::DefaultForeground), 9);
    }

    #[test]
    fn test_packed_addresses() {
        for (version, multiplier) in [(1, 2), (2, 2), (3, 2), (4, 4), (5, 4), (8, 8)] {
            let mut map = test_map(3);
            map[0] = version;
            let zmachine = mock_machine(map);
            assert_ok_eq!(
                zmachine.packed_routine_address(0x100),
                0x100 * multiplier
            );
            assert_ok_eq!(zmachine.packed_string_address(0x100), 0x100 * multiplier);
        }
    }

    #[test]
    fn test_packed_addresses_v7() {
        let mut map = test_map(3);
        map[0] = 7;
        // Routine offset 2, string offset 4
        map[0x28] = 0;
        map[0x29] = 2;
        map[0x2A] = 0;
        map[0x2B] = 4;
        let zmachine = mock_machine(map);
        assert_ok_eq!(zmachine.packed_routine_address(0x100), 0x400 + 16);
        assert_ok_eq!(zmachine.packed_string_address(0x100), 0x400 + 32);
    }

    #[test]
    fn test_variables() {
        let mut map = test_map(5);
        set_variable(&mut map, 0x10, 0x1234);
        let mut zmachine = mock_machine(map);
        assert_ok_eq!(zmachine.variable(0x10), 0x1234);
        assert!(zmachine.set_variable(0xFF, 0x5678).is_ok());
        assert_ok_eq!(zmachine.variable(0xFF), 0x5678);
        // Variable 0 pushes and pops the routine stack
        assert!(zmachine.set_variable(0, 0x1111).is_ok());
        assert!(zmachine.set_variable(0, 0x2222).is_ok());
        assert_ok_eq!(zmachine.peek_variable(0), 0x2222);
        assert_ok_eq!(zmachine.variable(0), 0x2222);
        assert_ok_eq!(zmachine.variable(0), 0x1111);
        assert!(zmachine.variable(0).is_err());
    }

    #[test]
    fn test_string_literal() {
        let mut map = test_map(5);
        map[0x500] = 0x12;
        map[0x501] = 0x34;
        map[0x502] = 0x92;
        map[0x503] = 0x34;
        let zmachine = mock_machine(map);
        assert_ok_eq!(zmachine.string_literal(0x500), vec![0x1234, 0x9234]);
    }

    #[test]
    fn test_run_to_quit() {
        // NEW_LINE then QUIT
        let mut map = test_map(3);
        map[0x400] = 0xBB;
        map[0x401] = 0xBA;
        let mut zmachine = mock_machine(map);
        assert!(zmachine.run().is_ok());
        assert!(quit_called());
        assert_eq!(print_output(), "\n");
    }

    #[test]
    fn test_run_fatal_reports_to_screen() {
        // 2OP:0x00 is an unspecified instruction
        let mut map = test_map(3);
        map[0x400] = 0x00;
        let mut zmachine = mock_machine(map);
        assert!(zmachine.run().is_err());
        assert!(print_output().contains("[FATAL:"));
    }

    #[test]
    fn test_run_restart() {
        // READ_CHAR -> G00; JE G00 'r' -> RESTART; else QUIT
        let mut map = test_map(5);
        map[0x400] = 0xF6;
        map[0x401] = 0x7F;
        map[0x402] = 0x01;
        map[0x403] = 0x10;
        map[0x404] = 0x41;
        map[0x405] = 0x10;
        map[0x406] = b'r';
        map[0x407] = 0xC3;
        map[0x408] = 0xBA;
        map[0x409] = 0xB7;
        let mut zmachine = mock_machine(map);
        input("rq");
        assert!(zmachine.run().is_ok());
        assert!(restart_called());
        assert!(quit_called());
    }

    #[test]
    fn test_restart_preserves_transcript_bit() {
        let mut map = test_map(5);
        map[0x400] = 0xF6;
        map[0x401] = 0x7F;
        map[0x402] = 0x01;
        map[0x403] = 0x10;
        map[0x404] = 0x41;
        map[0x405] = 0x10;
        map[0x406] = b'r';
        map[0x407] = 0xC3;
        map[0x408] = 0xBA;
        map[0x409] = 0xB7;
        let mut zmachine = mock_machine(map);
        zmachine.write_word(0x10, 0x0001).unwrap();
        input("rq");
        assert!(zmachine.run().is_ok());
        // Dynamic memory was reset but the transcript bit survived
        assert_ok_eq!(zmachine.read_word(0x10), 0x0001);
    }

    #[test]
    fn test_sread_scenario() {
        // V3: SREAD text parse; QUIT.  Typing "look" tokenises into the
        // parse buffer.
        let mut map = test_map(3);
        mock_dictionary_v3(&mut map);
        mock_object_tree(&mut map, 3);
        set_variable(&mut map, 16, 5);
        map[0x250] = 32;
        map[0x270] = 4;
        map[0x400] = 0xE4;
        map[0x401] = 0x0F;
        map[0x402] = 0x02;
        map[0x403] = 0x50;
        map[0x404] = 0x02;
        map[0x405] = 0x70;
        map[0x406] = 0xBA;
        let mut zmachine = mock_machine(map);
        input("look\n");
        assert!(zmachine.run().is_ok());
        assert!(quit_called());
        // The status line was refreshed before reading
        assert_eq!(status().0, "pet");
        // Parse record: dictionary address of "look", length 4, position 1
        assert_ok_eq!(zmachine.read_byte(0x271), 1);
        assert_ok_eq!(zmachine.read_word(0x272), 0x323);
        assert_ok_eq!(zmachine.read_byte(0x274), 4);
        assert_ok_eq!(zmachine.read_byte(0x275), 1);
    }

    #[test]
    fn test_timed_read_interrupts() {
        // V5 AREAD with time 10 and an interrupt routine that counts
        // invocations in G00, returning 0 until the count exceeds 3.
        // The fourth dispatch aborts the read, which stores 0.
        let mut map = test_map(5);
        map[0x250] = 32;
        map[0x251] = 0;
        // AREAD 0x250 0 10 0x180 -> G70
        map[0x400] = 0xE4;
        map[0x401] = 0x14;
        map[0x402] = 0x02;
        map[0x403] = 0x50;
        map[0x404] = 0x00;
        map[0x405] = 0x0A;
        map[0x406] = 0x01;
        map[0x407] = 0x80;
        map[0x408] = 0x80;
        // QUIT
        map[0x409] = 0xBA;
        // Interrupt routine at 0x600 (packed 0x180): INC_CHK G00 3 [RTRUE]
        // then RFALSE
        map[0x600] = 0x00;
        map[0x601] = 0x05;
        map[0x602] = 0x10;
        map[0x603] = 0x03;
        map[0x604] = 0xC1;
        map[0x605] = 0xB1;
        set_variable(&mut map, 0x80, 0xFF);
        let mut zmachine = mock_machine(map);
        set_timeouts(10);
        assert!(zmachine.run().is_ok());
        assert!(quit_called());
        // Four interrupt dispatches: three returning 0, the fourth 1
        assert_ok_eq!(zmachine.variable(0x10), 4);
        // The aborted read stored terminator 0 and cleared the buffer
        assert_ok_eq!(zmachine.variable(0x80), 0);
        assert_ok_eq!(zmachine.read_byte(0x251), 0);
        assert_eq!(zmachine.frame_count(), 1);
    }

    #[test]
    fn test_save_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        set_filename(Some(dir.path().join("state.zav")));

        let mut map = test_map(5);
        set_variable(&mut map, 0x10, 0x1234);
        let mut zmachine = mock_machine(map);
        // Build up some call state
        mock_frame(&mut zmachine, 0x480, 0x500, frame::CallType::Procedure);
        zmachine.set_variable(0, 0xAAAA).unwrap();
        assert!(zmachine.save(0x502).is_ok());

        // Mutate dynamic memory and the stack, then restore
        zmachine.write_byte(0x300, 0xFF).unwrap();
        zmachine.set_variable(0x10, 0).unwrap();
        zmachine.set_variable(0, 0xBBBB).unwrap();
        // Turn transcripting on; the bit survives the restore
        header::set_flag2(&mut zmachine.memory, Flags2::Transcripting).unwrap();

        let pc = zmachine.restore().unwrap();
        assert_eq!(pc, 0x502);
        assert_eq!(zmachine.frame_count(), 2);
        assert_ok_eq!(zmachine.pc(), 0x502);
        assert_ok_eq!(zmachine.read_byte(0x300), 0);
        assert_ok_eq!(zmachine.variable(0x10), 0x1234);
        assert_ok_eq!(zmachine.variable(0), 0xAAAA);
        assert!(header::flag2(&zmachine.memory, Flags2::Transcripting).unwrap());
    }

    #[test]
    fn test_restore_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.zav");
        std::fs::write(&path, b"not a save file").unwrap();
        set_filename(Some(path));

        let map = test_map(5);
        let mut zmachine = mock_machine(map);
        let e = zmachine.restore();
        assert!(e.is_err());
        assert!(e.err().unwrap().is_recoverable());
        // The machine is untouched
        assert_eq!(zmachine.frame_count(), 1);
        assert_ok_eq!(zmachine.pc(), 0x400);
    }

    #[test]
    fn test_output_stream_3_redirects() {
        let mut map = test_map(5);
        map[0x500] = 0x12;
        map[0x501] = 0x34;
        let mut zmachine = mock_machine(map);
        assert!(zmachine.output_stream(3, Some(0x300)).is_ok());
        zmachine.print(&[b'a' as u16, b'b' as u16]).unwrap();
        zmachine.new_line().unwrap();
        // Nothing reaches the screen while the table is open
        assert_eq!(print_output(), "");
        assert!(zmachine.output_stream(-3, None).is_ok());
        assert_ok_eq!(zmachine.read_word(0x300), 3);
        assert_ok_eq!(zmachine.read_byte(0x302), b'a');
        assert_ok_eq!(zmachine.read_byte(0x303), b'b');
        assert_ok_eq!(zmachine.read_byte(0x304), 0x0d);
        zmachine.print(&[b'c' as u16]).unwrap();
        assert_eq!(print_output(), "c");
    }

    #[test]
    fn test_input_terminators() {
        let mut map = test_map(5);
        // Terminating characters table at 0x340: 129, 0
        map[0x2E] = 0x03;
        map[0x2F] = 0x40;
        map[0x340] = 129;
        let zmachine = mock_machine(map);
        assert_ok_eq!(zmachine.input_terminators(), vec![0x0d, 129]);
    }

    #[test]
    fn test_input_terminators_function_keys() {
        let mut map = test_map(5);
        map[0x2E] = 0x03;
        map[0x2F] = 0x40;
        map[0x340] = 255;
        let zmachine = mock_machine(map);
        let terminators = zmachine.input_terminators().unwrap();
        assert!(terminators.contains(&0x0d));
        assert!(terminators.contains(&129));
        assert!(terminators.contains(&154));
        assert!(terminators.contains(&254));
    }

    #[test]
    fn test_call_and_throw_frame_numbers() {
        let map = test_map(5);
        let mut zmachine = mock_machine(map);
        assert_ok_eq!(zmachine.catch(), 0);
        mock_frame(&mut zmachine, 0x480, 0x501, frame::CallType::Procedure);
        assert_ok_eq!(zmachine.catch(), 1);
        mock_frame(&mut zmachine, 0x501, 0x601, frame::CallType::Procedure);
        assert_ok_eq!(zmachine.catch(), 2);
        // Throw back to frame 1; the procedure result is discarded
        assert_ok_eq!(zmachine.throw(1, 42), NextPc::Address(0x480));
        assert_eq!(zmachine.frame_count(), 1);
        // Throwing to a dead frame underflows
        assert!(zmachine.throw(7, 0).is_err());
    }
}
