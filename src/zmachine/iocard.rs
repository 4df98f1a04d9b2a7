//! Output stream multiplexing and input stream selection
//!
//! Stream 1 is the screen, stream 2 a printer transcript file, stream 3 a
//! stackable in-memory table, and stream 4 a command script file.  Input
//! comes from the keyboard (stream 0) or replays a command file (stream 1).
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use crate::{
    error::*,
    fatal_error, recoverable_error,
    screen::Screen,
};

/// A stream 3 memory table being collected
#[derive(Debug)]
struct Stream3 {
    /// Table address to write to when the stream is closed
    address: usize,
    /// Buffered characters
    buffer: Vec<u16>,
}

impl Stream3 {
    fn new(address: usize) -> Stream3 {
        Stream3 {
            address,
            buffer: Vec::new(),
        }
    }
}

/// Output stream multiplexer and input stream selector
pub struct IoCard {
    /// The front end
    screen: Box<dyn Screen>,
    /// Output stream bitmask; bit 0 is stream 1
    output_streams: u8,
    /// Stream 3 stack
    stream_3: Vec<Stream3>,
    /// Stream 2 transcript file
    transcript: Option<File>,
    /// Stream 4 command record file
    command_record: Option<File>,
    /// Input stream 1 command replay file
    command_replay: Option<BufReader<File>>,
}

impl IoCard {
    /// Constructor
    ///
    /// # Arguments
    /// * `screen` - The front end supplied by the embedder
    pub fn new(screen: Box<dyn Screen>) -> IoCard {
        IoCard {
            screen,
            output_streams: 0x1,
            stream_3: Vec::new(),
            transcript: None,
            command_record: None,
            command_replay: None,
        }
    }

    /// Get a reference to the front end
    pub fn screen(&self) -> &dyn Screen {
        self.screen.as_ref()
    }

    /// Get a mutable reference to the front end
    pub fn screen_mut(&mut self) -> &mut dyn Screen {
        self.screen.as_mut()
    }

    /// Is an output stream enabled?
    ///
    /// # Arguments
    /// * `stream` - Stream number, 1 - 4
    ///
    /// # Returns
    /// `true` if the stream is enabled
    pub fn is_stream_enabled(&self, stream: u8) -> bool {
        let mask = (1 << (stream - 1)) & 0xF;
        self.output_streams & mask == mask
    }

    /// Reset stream state, as on RESTART.
    ///
    /// Any open stream 3 tables are discarded; the screen and transcript
    /// stream selections survive.
    pub fn reset(&mut self) {
        self.output_streams &= 0x3;
        self.stream_3.clear();
    }

    /// Is a stream 3 memory table collecting output?
    pub fn stream_3_active(&self) -> bool {
        !self.stream_3.is_empty()
    }

    /// Has a transcript file been opened?
    pub fn has_transcript(&self) -> bool {
        self.transcript.is_some()
    }

    /// Has a command record file been opened?
    pub fn has_command_record(&self) -> bool {
        self.command_record.is_some()
    }

    /// Append a character to the current stream 3 table
    ///
    /// Newline is recorded as ZSCII 13; null characters are dropped.
    ///
    /// # Arguments
    /// * `zchar` - ZSCII character
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn stream_3_push(&mut self, zchar: u16) -> Result<(), RuntimeError> {
        if let Some(s) = self.stream_3.last_mut() {
            match zchar {
                0 => {}
                0x0a => s.buffer.push(0x0d),
                _ => s.buffer.push(zchar),
            }
            Ok(())
        } else {
            fatal_error!(
                ErrorCode::Stream3Table,
                "Stream 3 enabled, but no table to write to"
            )
        }
    }

    /// Open a new stream 3 table.
    ///
    /// Tables stack up to 16 deep.
    ///
    /// # Arguments
    /// * `address` - Table address output will be written to on close
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn enable_stream_3(&mut self, address: usize) -> Result<(), RuntimeError> {
        if self.stream_3.len() >= 16 {
            return fatal_error!(
                ErrorCode::Stream3Table,
                "Stream 3 tables nest at most 16 deep"
            );
        }

        debug!(target: "app::stream", "Open stream 3 table @ {:04x}, depth {}", address, self.stream_3.len() + 1);
        self.output_streams |= 0x4;
        self.stream_3.push(Stream3::new(address));
        Ok(())
    }

    /// Close the current stream 3 table.
    ///
    /// # Returns
    /// [Option] with the table address and the buffered characters, or
    /// [None] when no table was open
    pub fn disable_stream_3(&mut self) -> Option<(usize, Vec<u16>)> {
        let s = self.stream_3.pop()?;
        if self.stream_3.is_empty() {
            self.output_streams &= !0x4;
        }
        debug!(target: "app::stream", "Close stream 3 table @ {:04x}, {} characters", s.address, s.buffer.len());
        Some((s.address, s.buffer))
    }

    /// Enable output stream 1, 2, or 4
    ///
    /// # Arguments
    /// * `stream` - Stream number
    /// * `path` - File path for streams 2 and 4, from the front end
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn enable_output_stream(
        &mut self,
        stream: u8,
        path: Option<&Path>,
    ) -> Result<(), RuntimeError> {
        debug!(target: "app::stream", "Enable output stream {}", stream);
        match stream {
            1 => {
                self.output_streams |= 0x1;
                Ok(())
            }
            2 => {
                if self.transcript.is_none() {
                    match path {
                        Some(p) => match File::options().create(true).append(true).open(p) {
                            Ok(f) => self.transcript = Some(f),
                            Err(e) => {
                                return recoverable_error!(
                                    ErrorCode::Transcript,
                                    "Error opening transcript file: {}",
                                    e
                                )
                            }
                        },
                        None => {
                            return recoverable_error!(
                                ErrorCode::UserCancel,
                                "Transcript file dialog cancelled"
                            )
                        }
                    }
                }
                self.output_streams |= 0x2;
                Ok(())
            }
            4 => {
                if self.command_record.is_none() {
                    match path {
                        Some(p) => match File::options().create(true).append(true).open(p) {
                            Ok(f) => self.command_record = Some(f),
                            Err(e) => {
                                return recoverable_error!(
                                    ErrorCode::FileError,
                                    "Error opening command file: {}",
                                    e
                                )
                            }
                        },
                        None => {
                            return recoverable_error!(
                                ErrorCode::UserCancel,
                                "Command file dialog cancelled"
                            )
                        }
                    }
                }
                self.output_streams |= 0x8;
                Ok(())
            }
            _ => fatal_error!(
                ErrorCode::InvalidOutputStream,
                "Stream {} is not a valid stream [1..4]",
                stream
            ),
        }
    }

    /// Disable output stream 1, 2, or 4
    ///
    /// # Arguments
    /// * `stream` - Stream number
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn disable_output_stream(&mut self, stream: u8) -> Result<(), RuntimeError> {
        debug!(target: "app::stream", "Disable output stream {}", stream);
        match stream {
            1 => {
                self.output_streams &= !0x1;
                Ok(())
            }
            2 => {
                self.output_streams &= !0x2;
                Ok(())
            }
            4 => {
                self.output_streams &= !0x8;
                Ok(())
            }
            _ => fatal_error!(
                ErrorCode::InvalidOutputStream,
                "Stream {} is not a valid stream [1..4]",
                stream
            ),
        }
    }

    /// Print text to the enabled streams.
    ///
    /// The caller is expected to divert output to stream 3 first; this
    /// function writes streams 1 and 2 only.
    ///
    /// # Arguments
    /// * `text` - Text to print
    pub fn print(&mut self, text: &str) {
        if self.is_stream_enabled(1) {
            self.screen.print(text);
        }
        if self.is_stream_enabled(2) {
            if let Some(f) = self.transcript.as_mut() {
                if let Err(e) = f.write_all(text.as_bytes()) {
                    warn!(target: "app::stream", "Error writing transcript: {}", e);
                }
            }
        }
    }

    /// Print a newline to the enabled streams
    pub fn new_line(&mut self) {
        if self.is_stream_enabled(1) {
            self.screen.new_line();
        }
        if self.is_stream_enabled(2) {
            if let Some(f) = self.transcript.as_mut() {
                if let Err(e) = f.write_all(b"\n") {
                    warn!(target: "app::stream", "Error writing transcript: {}", e);
                }
            }
        }
    }

    /// Select an input stream
    ///
    /// # Arguments
    /// * `stream` - 0 for the keyboard, 1 to replay a command file
    /// * `path` - Command file path when `stream` is 1, from the front end
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn select_input_stream(
        &mut self,
        stream: u16,
        path: Option<&Path>,
    ) -> Result<(), RuntimeError> {
        match stream {
            0 => {
                self.command_replay = None;
                Ok(())
            }
            1 => match path {
                Some(p) => match File::open(p) {
                    Ok(f) => {
                        self.command_replay = Some(BufReader::new(f));
                        Ok(())
                    }
                    Err(e) => recoverable_error!(
                        ErrorCode::FileError,
                        "Error opening command file: {}",
                        e
                    ),
                },
                None => recoverable_error!(
                    ErrorCode::UserCancel,
                    "Command file dialog cancelled"
                ),
            },
            _ => recoverable_error!(
                ErrorCode::InvalidOutputStream,
                "Input stream {} is not valid [0..1]",
                stream
            ),
        }
    }

    /// Read a line of input.
    ///
    /// When a command file is being replayed, the next line is consumed
    /// from it and echoed to the screen; end of file falls back to the
    /// keyboard.  Completed keyboard input is recorded to stream 4 if
    /// enabled.
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
        if let Some(line) = self.replay_line() {
            let text = line.trim_end_matches(['\r', '\n']).to_string();
            for c in text.chars().take(max) {
                input.push(c as u16);
            }
            self.print(&text);
            self.new_line();
            return Some(0x0d);
        }

        let terminator = self.screen.read_line(input, max, terminators, timeout);
        if terminator.is_some() {
            if let Some(f) = self.command_record.as_mut() {
                let line: String = input
                    .iter()
                    .map(|c| char::from_u32(*c as u32).unwrap_or('?'))
                    .collect();
                if let Err(e) = writeln!(f, "{}", line) {
                    warn!(target: "app::stream", "Error recording command: {}", e);
                }
            }
        }

        terminator
    }

    /// Read a single keypress
    ///
    /// # Arguments
    /// * `timeout` - Timeout in tenths of a second, 0 for none
    ///
    /// # Returns
    /// [Option] with the ZSCII code, or [None] on timeout
    pub fn read_char(&mut self, timeout: u16) -> Option<u16> {
        if let Some(line) = self.replay_line() {
            return match line.trim_end_matches(['\r', '\n']).chars().next() {
                Some(c) => Some(c as u16),
                None => Some(0x0d),
            };
        }

        self.screen.read_char(timeout)
    }

    /// Take the next line from the command replay file, dropping back to
    /// the keyboard at end of file
    fn replay_line(&mut self) -> Option<String> {
        let reader = self.command_replay.as_mut()?;
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(n) if n > 0 => Some(line),
            _ => {
                self.command_replay = None;
                None
            }
        }
    }
}
