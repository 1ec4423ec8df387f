//! Temperature probe implementations

pub mod ntc;

pub use ntc::{AdcReader, NtcProbe};
