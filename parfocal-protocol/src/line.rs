//! Command line assembly
//!
//! Bytes arrive one at a time from a channel. [`LineBuffer`] collects them
//! until a terminator, with a hard capacity:
//!
//! ```text
//! AWAITING_COMMAND ──byte──▶ ACCUMULATING ──terminator──▶ line returned
//!        ▲                        │                           │
//!        └────────────────────────┴───────────────────────────┘
//! ```
//!
//! A `:` always starts a fresh command, so a peer that lost sync recovers on
//! its next request.

use heapless::Vec;

/// Maximum command length in bytes, excluding the `:` prefix and terminator
pub const MAX_COMMAND_LEN: usize = 15;

/// Byte that opens a command
pub const COMMAND_START: u8 = b':';

/// Command terminator used by focuser clients
pub const COMMAND_END: u8 = b'#';

/// A complete command line, without prefix and terminator
pub type Line = Vec<u8, MAX_COMMAND_LEN>;

/// Errors raised while assembling a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// The line exceeded [`MAX_COMMAND_LEN`] and was discarded
    Overflow,
}

/// Line assembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineState {
    /// Idle between commands; whitespace and stray terminators are skipped
    AwaitingCommand,
    /// Collecting command bytes
    Accumulating,
}

fn is_terminator(byte: u8) -> bool {
    matches!(byte, COMMAND_END | b'\r' | b'\n')
}

/// Bounded per-channel command accumulator
#[derive(Debug, Clone)]
pub struct LineBuffer {
    state: LineState,
    buffer: Line,
    overflowed: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Create an empty line buffer
    pub const fn new() -> Self {
        Self {
            state: LineState::AwaitingCommand,
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Current assembly state
    pub fn state(&self) -> LineState {
        self.state
    }

    /// Drop any partial command
    pub fn reset(&mut self) {
        self.state = LineState::AwaitingCommand;
        self.buffer.clear();
        self.overflowed = false;
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(line))` when a terminator completes a command,
    /// `Ok(None)` while more bytes are needed, and `Err(Overflow)` at the
    /// terminator of a line that did not fit.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Line>, FrameError> {
        match self.state {
            LineState::AwaitingCommand => {
                if byte == COMMAND_START {
                    self.state = LineState::Accumulating;
                } else if !is_terminator(byte) && !byte.is_ascii_whitespace() {
                    self.state = LineState::Accumulating;
                    self.push(byte);
                }
                Ok(None)
            }
            LineState::Accumulating => {
                if byte == COMMAND_START {
                    // Resync: the previous command was never terminated
                    self.buffer.clear();
                    self.overflowed = false;
                    return Ok(None);
                }

                if !is_terminator(byte) {
                    self.push(byte);
                    return Ok(None);
                }

                let overflowed = self.overflowed;
                let line = core::mem::take(&mut self.buffer);
                self.reset();

                if overflowed {
                    Err(FrameError::Overflow)
                } else if line.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(line))
                }
            }
        }
    }

    /// Feed bytes until the first complete line
    ///
    /// Bytes after the completed line are not consumed; the returned count
    /// says how many were.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> (usize, Result<Option<Line>, FrameError>) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(None) => {}
                done => return (i + 1, done),
            }
        }
        (bytes.len(), Ok(None))
    }

    fn push(&mut self, byte: u8) {
        if self.buffer.push(byte).is_err() {
            self.overflowed = true;
        }
    }
}
