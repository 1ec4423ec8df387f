//! Reply formatting
//!
//! Every reply is a single letter identifying the value, the value itself,
//! and the `#` terminator. Replies are short enough to live in a fixed
//! [`heapless::String`].

use core::fmt::{self, Write};

use heapless::String;

use crate::line::COMMAND_END;

/// Capacity of a formatted reply
pub const REPLY_CAPACITY: usize = 32;

/// A formatted reply, terminator included
pub type Reply = String<REPLY_CAPACITY>;

/// Reply codes
pub mod code {
    pub const POSITION: char = 'P';
    pub const MOVING: char = 'I';
    pub const STATUS: char = 'E';
    pub const FIRMWARE: char = 'F';
    pub const TEMPERATURE: char = 'Z';
    pub const MAX_STEP: char = 'M';
    pub const COIL_POWER: char = 'O';
    pub const REVERSE: char = 'R';
    pub const UNIT: char = 'b';
    pub const SETTLE_DELAY: char = 'D';
    pub const TEMP_COEFFICIENT: char = 'B';
    pub const TC_DIRECTION: char = 'w';
    pub const TC_ENABLED: char = 'a';
    pub const HALTED: char = 'H';
    pub const STEP_MODE: char = 'S';
    pub const STEP_SIZE_ENABLED: char = 'U';
    pub const STEP_SIZE: char = 'T';
    pub const UPDATE_WHILE_MOVING: char = 'L';
    pub const SPEED: char = 'C';
    pub const PROBE_PRESENT: char = 'A';
    pub const SPEED_THRESHOLD: char = 'Y';
    pub const BACKLASH_IN_ENABLED: char = '4';
    pub const BACKLASH_OUT_ENABLED: char = '5';
    pub const BACKLASH_STEPS_IN: char = '6';
    pub const BACKLASH_STEPS_OUT: char = '7';
}

/// Error replies sent back to the requesting channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorReply {
    /// Unknown or unparseable command
    Command,
    /// Argument outside the accepted range
    Range,
    /// Command line too long
    Length,
    /// Temperature requested but no probe is fitted
    Probe,
}

impl ErrorReply {
    /// Wire text for this error
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorReply::Command => "!CMD#",
            ErrorReply::Range => "!RANGE#",
            ErrorReply::Length => "!LEN#",
            ErrorReply::Probe => "!PROBE#",
        }
    }

    /// Error as a reply string
    pub fn to_reply(self) -> Reply {
        let mut reply = Reply::new();
        // Every error text is shorter than REPLY_CAPACITY
        let _ = reply.push_str(self.as_str());
        reply
    }
}

/// Format `<code><value>#`
///
/// Returns `fmt::Error` if the result does not fit [`REPLY_CAPACITY`].
pub fn format(code: char, value: fmt::Arguments<'_>) -> Result<Reply, fmt::Error> {
    let mut reply = Reply::new();
    reply.write_char(code)?;
    reply.write_fmt(value)?;
    reply.write_char(COMMAND_END as char)?;
    Ok(reply)
}

/// Format a boolean reply as `<code>0#` or `<code>1#`
pub fn flag(code: char, value: bool) -> Reply {
    let mut reply = Reply::new();
    let _ = reply.push(code);
    let _ = reply.push(if value { '1' } else { '0' });
    let _ = reply.push(COMMAND_END as char);
    reply
}

/// Write a fixed-point ×100 value as `[-]int.frac`
pub fn write_x100(out: &mut impl Write, value: i32) -> fmt::Result {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    write!(out, "{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Adapter so `write_x100` output can be embedded in `format_args!`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedX100(pub i32);

impl fmt::Display for FixedX100 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_x100(f, self.0)
    }
}
