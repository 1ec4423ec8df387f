//! Focuser Command Protocol
//!
//! This crate defines the line-oriented text protocol spoken on every command
//! channel of the focuser (local serial, HTTP, raw TCP). The same parser and
//! reply formatter serve all three; the channels only differ in how bytes
//! reach [`LineBuffer::feed`].
//!
//! # Protocol Overview
//!
//! ```text
//! request:  [:] CODE(2 digits) [ARGUMENT] TERMINATOR
//!           :05 12000 #        move to 12000
//!           :00#               query position
//!
//! reply:    LETTER VALUE #
//!           P12000#
//! ```
//!
//! A terminator is `#`, CR or LF. Lines longer than [`MAX_COMMAND_LEN`] are
//! rejected as a whole, never split.

#![no_std]
#![deny(unsafe_code)]

pub mod command;
pub mod http;
pub mod line;
pub mod reply;

pub use command::{Command, ParseError};
pub use line::{FrameError, Line, LineBuffer, LineState, MAX_COMMAND_LEN};
pub use reply::{ErrorReply, Reply, REPLY_CAPACITY};
