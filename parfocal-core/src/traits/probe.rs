//! Temperature probe trait
//!
//! Probes convert asynchronously: a conversion is started, then polled on
//! later loop passes until the value is ready. Readings are fixed-point
//! degrees Celsius × 100, so 21.25°C is returned as 2125.

/// Errors that can occur with temperature sensing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeError {
    /// Conversion still in progress; poll again later
    NotReady,
    /// No probe fitted
    Absent,
    /// Probe stopped responding
    Disconnected,
    /// Reading outside the probe's physical range
    OutOfRange,
}

/// Trait for temperature probes
pub trait TemperatureProbe {
    /// Whether a probe is fitted at all
    fn is_present(&self) -> bool {
        true
    }

    /// Start a conversion
    fn request_conversion(&mut self) -> Result<(), ProbeError>;

    /// Fetch the result of the last conversion
    ///
    /// Returns `Err(ProbeError::NotReady)` until the conversion completes.
    fn read_celsius_x100(&mut self) -> Result<i32, ProbeError>;
}

/// Stand-in for boards without a temperature probe
///
/// Compensation built on this probe never produces a reading, so it never
/// moves the focuser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoProbe;

impl TemperatureProbe for NoProbe {
    fn is_present(&self) -> bool {
        false
    }

    fn request_conversion(&mut self) -> Result<(), ProbeError> {
        Err(ProbeError::Absent)
    }

    fn read_celsius_x100(&mut self) -> Result<i32, ProbeError> {
        Err(ProbeError::Absent)
    }
}

/// Convert Celsius × 100 to Fahrenheit × 100
pub fn celsius_to_fahrenheit_x100(celsius_x100: i32) -> i32 {
    celsius_x100 * 9 / 5 + 3200
}
