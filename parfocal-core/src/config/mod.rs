//! Configuration
//!
//! Three layers:
//! - [`limits`]: compile-time constants shared by every board
//! - [`PersistedSettings`]: the calibration record kept in non-volatile storage
//! - [`FocuserConfig`]: runtime tuning handed to [`crate::Focuser::new`]

pub mod limits;
pub mod record;
pub mod settings;
pub mod tuning;

pub use limits::*;
pub use record::{RecordError, RECORD_ADDR, RECORD_SIZE};
pub use settings::{MoveDirection, PersistedSettings, SpeedClass, TemperatureUnit};
pub use tuning::FocuserConfig;
