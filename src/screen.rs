//! The user-interface collaborator contract
//!
//! The engine owns no display or keyboard code. A front end implements
//! [Screen] and hands it to the machine at construction; the engine calls
//! out for capability queries at startup, for output and input while
//! running, and for file dialogs around save and restore.
use std::path::PathBuf;

/// Display, input, and file-dialog operations supplied by the front end.
///
/// Input calls block until input is available or, for a non-zero `timeout`
/// (in tenths of a second), until the timeout elapses.
pub trait Screen {
    /// Prepare the display.  May be called again on RESTART.
    ///
    /// # Arguments
    /// * `version` - ZCode version of the story being run
    fn initialize(&mut self, version: u8);

    /// Display a fatal error message.
    ///
    /// Execution stops after this call returns.
    ///
    /// # Arguments
    /// * `message` - Error message
    fn fatal(&mut self, message: &str);

    // Capabilities, queried once when the header is stamped

    fn has_status_line(&self) -> bool;
    fn has_upper_window(&self) -> bool;
    fn has_colors(&self) -> bool;
    fn has_bold(&self) -> bool;
    fn has_italic(&self) -> bool;
    fn has_fixed_width(&self) -> bool;
    fn has_timed_input(&self) -> bool;
    fn default_font_proportional(&self) -> bool;
    fn default_background(&self) -> u8;
    fn default_foreground(&self) -> u8;
    /// Screen size as (rows, columns)
    fn screen_characters(&self) -> (u8, u8);
    /// Screen size in units as (width, height)
    fn screen_units(&self) -> (u16, u16);
    /// Font size in units as (width, height)
    fn font_size(&self) -> (u8, u8);

    // Output

    /// Display a string in the current window at the current cursor position
    fn print(&mut self, text: &str);

    /// Advance to the next line, scrolling as needed
    fn new_line(&mut self);

    /// Draw the status line (V1-3)
    ///
    /// # Arguments
    /// * `location` - Short name of the current location object
    /// * `a` - Score, or hours
    /// * `b` - Turn count, or minutes
    /// * `time_game` - `true` for an hours/minutes game, `false` for score/turns
    fn show_status(&mut self, location: &str, a: i16, b: i16, time_game: bool);

    /// Erase from the cursor to the end of the current line
    fn erase_line(&mut self);

    /// Erase a window
    fn erase_window(&mut self, window: i16);

    /// Split the upper window off, `lines` high (0 removes the split)
    fn split_screen(&mut self, lines: u16);

    /// Select the current window
    fn set_window(&mut self, window: u16);

    /// Move the cursor in the current window
    fn set_cursor(&mut self, row: u16, column: u16);

    /// Get the cursor position as (row, column)
    fn cursor(&mut self) -> (u16, u16);

    /// Set the text style bits (1 reverse, 2 bold, 4 italic, 8 fixed)
    fn set_text_style(&mut self, style: u16);

    /// Set foreground and background colours
    fn set_colour(&mut self, foreground: u16, background: u16);

    /// Select a font
    ///
    /// # Returns
    /// The previously selected font, or 0 if the font is unavailable
    fn set_font(&mut self, font: u16) -> u16;

    // Input

    /// Read a line of input.
    ///
    /// `input` holds any pre-typed characters and receives the finished
    /// line, excluding the terminator.
    ///
    /// # Arguments
    /// * `input` - Pre-typed input, appended to in place
    /// * `max` - Maximum input length, including the terminator
    /// * `terminators` - ZSCII codes that end input
    /// * `timeout` - Input timeout in tenths of a second, 0 for none
    ///
    /// # Returns
    /// [Option] with the ZSCII terminator, or [None] on timeout
    fn read_line(
        &mut self,
        input: &mut Vec<u16>,
        max: usize,
        terminators: &[u16],
        timeout: u16,
    ) -> Option<u16>;

    /// Read a single keypress.
    ///
    /// # Arguments
    /// * `timeout` - Input timeout in tenths of a second, 0 for none
    ///
    /// # Returns
    /// [Option] with the ZSCII code of the key, or [None] on timeout
    fn read_char(&mut self, timeout: u16) -> Option<u16>;

    /// Supply additional input terminators from the story file (V5+)
    fn set_terminating_characters(&mut self, characters: &[u16]);

    // Files and lifecycle

    /// Ask the player for a filename.
    ///
    /// # Arguments
    /// * `title` - Dialog title
    /// * `suggested` - Suggested filename, if any
    /// * `save` - `true` when saving, `false` when restoring
    ///
    /// # Returns
    /// [Option] with the chosen path, [None] if the dialog was cancelled
    fn get_filename(&mut self, title: &str, suggested: Option<&str>, save: bool)
        -> Option<PathBuf>;

    /// The story has quit
    fn quit(&mut self);

    /// The story is restarting
    fn restart(&mut self);
}
