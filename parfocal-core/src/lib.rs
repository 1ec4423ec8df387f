//! Board-agnostic control core for the focuser firmware
//!
//! This crate contains all logic that does not depend on a specific board:
//!
//! - Hardware abstraction traits (stepper driver, temperature probe)
//! - Persisted settings record and its storage encoding
//! - Motion controller with backlash compensation
//! - Debounced persistence of settings
//! - Temperature compensation
//! - Command router shared by all transport channels
//! - The cooperative control loop tying them together
//!
//! Everything runs from one loop with no preemption. Waits are expressed as
//! "has T ms elapsed since X", checked again on the next pass.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod command;
pub mod config;
pub mod error;
pub mod focuser;
pub mod motion;
pub mod persistence;
pub mod temperature;
pub mod time;
pub mod traits;

pub use error::ErrorKind;
pub use focuser::Focuser;
