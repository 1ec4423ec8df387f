//! Hardware abstraction traits
//!
//! These traits define the interface between the control logic and the
//! drivers in `parfocal-drivers` (or test doubles).

pub mod probe;
pub mod stepper;

pub use probe::{NoProbe, ProbeError, TemperatureProbe};
pub use stepper::{Direction, StepMode, StepperDriver, StepperError};
