//! Error kinds surfaced by the core
//!
//! Each layer has its own error enum; this is the coarse classification the
//! rest of the firmware (and log output) works with.

use parfocal_hal::StorageError;
use parfocal_protocol::ParseError;

use crate::config::RecordError;
use crate::persistence::PersistError;
use crate::traits::{ProbeError, StepperError};

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Requested position or parameter outside configured limits
    OutOfRange,
    /// Unparseable or unknown command
    InvalidCommand,
    /// Stored settings record failed validation
    StorageInvalid,
    /// Storage refused a read or write
    StorageUnavailable,
    /// Temperature probe not fitted or not responding
    SensorUnavailable,
    /// Stepper driver rejected an output change
    DriverFault,
}

impl From<ParseError> for ErrorKind {
    fn from(e: ParseError) -> Self {
        if e.is_range_error() {
            ErrorKind::OutOfRange
        } else {
            ErrorKind::InvalidCommand
        }
    }
}

impl From<RecordError> for ErrorKind {
    fn from(_: RecordError) -> Self {
        ErrorKind::StorageInvalid
    }
}

impl From<StorageError> for ErrorKind {
    fn from(_: StorageError) -> Self {
        ErrorKind::StorageUnavailable
    }
}

impl From<PersistError> for ErrorKind {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::Storage(e) => e.into(),
            PersistError::Record(e) => e.into(),
        }
    }
}

impl From<ProbeError> for ErrorKind {
    fn from(_: ProbeError) -> Self {
        ErrorKind::SensorUnavailable
    }
}

impl From<StepperError> for ErrorKind {
    fn from(_: StepperError) -> Self {
        ErrorKind::DriverFault
    }
}
