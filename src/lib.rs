//! The Z-Machine as a library
//!
//! Loads an Infocom/Inform story file (versions 1-5, 7, 8) and executes it.
//! The embedding front end supplies a [screen::Screen] implementation for
//! display, input, and file dialogs; everything else - memory, objects,
//! text, the call stack, the decode loop, and save/restore - lives here.
#![crate_name = "frobnitz"]

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod files;
pub mod instruction;
pub mod object;
pub mod screen;
pub mod state;
pub mod text;
pub mod zmachine;

#[cfg(test)]
pub mod test_util;
