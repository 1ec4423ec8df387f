//! Stepper motor driver trait
//!
//! This trait abstracts over step/direction drivers (DRV8825, A4988, ...).
//! The motion controller decides when to pulse; the driver only drives pins.

/// Physical rotation direction of the motor shaft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Clockwise rotation
    Clockwise,
    /// Counter-clockwise rotation
    CounterClockwise,
}

impl Direction {
    /// Get the opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }
}

/// Driver microstep resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StepMode {
    Full = 1,
    Half = 2,
    #[default]
    Quarter = 4,
    Eighth = 8,
    Sixteenth = 16,
    ThirtySecond = 32,
}

impl StepMode {
    /// Every resolution, coarsest first
    pub const ALL: [StepMode; 6] = [
        StepMode::Full,
        StepMode::Half,
        StepMode::Quarter,
        StepMode::Eighth,
        StepMode::Sixteenth,
        StepMode::ThirtySecond,
    ];

    /// Microsteps per full step
    pub fn divisor(self) -> u8 {
        self as u8
    }

    /// Create a step mode from its divisor
    pub fn from_divisor(divisor: u8) -> Option<Self> {
        match divisor {
            1 => Some(StepMode::Full),
            2 => Some(StepMode::Half),
            4 => Some(StepMode::Quarter),
            8 => Some(StepMode::Eighth),
            16 => Some(StepMode::Sixteenth),
            32 => Some(StepMode::ThirtySecond),
            _ => None,
        }
    }
}

/// Errors that can occur with stepper operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperError {
    /// A control pin could not be driven
    Pin,
    /// Driver cannot produce the requested mode
    Unsupported,
}

/// Trait for step/direction stepper drivers
pub trait StepperDriver {
    /// Energise or release the motor coils
    ///
    /// When disabled the motor does not hold position.
    fn enable(&mut self, enabled: bool) -> Result<(), StepperError>;

    /// Check if the coils are energised
    fn is_enabled(&self) -> bool;

    /// Set the direction line
    ///
    /// Only called between pulses.
    fn set_direction(&mut self, dir: Direction) -> Result<(), StepperError>;

    /// Select the microstep resolution
    fn set_step_mode(&mut self, mode: StepMode) -> Result<(), StepperError>;

    /// Whether `set_step_mode(mode)` can succeed
    ///
    /// Drivers with jumpered mode pins produce a single resolution.
    fn supports(&self, mode: StepMode) -> bool {
        let _ = mode;
        true
    }

    /// Emit one step pulse
    fn pulse(&mut self) -> Result<(), StepperError>;
}
