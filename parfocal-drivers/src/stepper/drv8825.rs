//! DRV8825 stepper driver (step/direction mode)
//!
//! The DRV8825 takes one rising edge on STEP per microstep, latches DIR on
//! that edge and selects the microstep resolution from the M0..M2 pins.
//! nENBL is active low: driving it high releases the coils.
//!
//! # Mode pins
//!
//! | Mode | M2 | M1 | M0 |
//! |------|----|----|----|
//! | 1    | 0  | 0  | 0  |
//! | 1/2  | 0  | 0  | 1  |
//! | 1/4  | 0  | 1  | 0  |
//! | 1/8  | 0  | 1  | 1  |
//! | 1/16 | 1  | 0  | 0  |
//! | 1/32 | 1  | 0  | 1  |
//!
//! Boards with jumpered mode pins use [`Unconnected`] and report the
//! wired resolution through [`ModePins::HardWired`].

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin, PinState};
use parfocal_core::traits::{Direction, StepMode, StepperDriver, StepperError};

/// Pulse timing in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Drv8825Timing {
    /// STEP high time (datasheet minimum 1.9 µs)
    pub step_high_ns: u32,
    /// STEP low time (datasheet minimum 1.9 µs)
    pub step_low_ns: u32,
    /// DIR and mode setup before the next STEP edge (minimum 650 ns)
    pub setup_ns: u32,
    /// Wake-up time after nENBL is asserted
    pub enable_ns: u32,
}

impl Default for Drv8825Timing {
    fn default() -> Self {
        Self {
            step_high_ns: 2_000,
            step_low_ns: 2_000,
            setup_ns: 1_000,
            enable_ns: 1_000,
        }
    }
}

/// Placeholder for pins that are not routed to the MCU
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unconnected;

impl ErrorType for Unconnected {
    type Error = Infallible;
}

impl OutputPin for Unconnected {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// How the microstep resolution is selected
pub enum ModePins<M> {
    /// M0, M1, M2 driven by the MCU
    Driven([M; 3]),
    /// Resolution fixed by jumpers on the board
    HardWired(StepMode),
}

impl<M> ModePins<M> {
    /// Pin levels (M0, M1, M2) for a resolution
    pub fn levels(mode: StepMode) -> [bool; 3] {
        let code = match mode {
            StepMode::Full => 0b000,
            StepMode::Half => 0b001,
            StepMode::Quarter => 0b010,
            StepMode::Eighth => 0b011,
            StepMode::Sixteenth => 0b100,
            StepMode::ThirtySecond => 0b101,
        };
        [code & 0b001 != 0, code & 0b010 != 0, code & 0b100 != 0]
    }
}

/// DRV8825 driven through GPIO pins
pub struct Drv8825<STEP, DIR, EN, M, D> {
    step: STEP,
    dir: DIR,
    enable: EN,
    mode_pins: ModePins<M>,
    delay: D,
    timing: Drv8825Timing,
    /// Direction line level that means clockwise
    clockwise_high: bool,
    enabled: bool,
    direction: Option<Direction>,
    mode: Option<StepMode>,
}

impl<STEP, DIR, EN, M, D> Drv8825<STEP, DIR, EN, M, D>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    M: OutputPin,
    D: DelayNs,
{
    /// Create a new driver with the coils released
    ///
    /// # Arguments
    /// - `step`, `dir`: STEP and DIR inputs
    /// - `enable`: nENBL (active low)
    /// - `mode_pins`: M0..M2, or the jumpered resolution
    /// - `delay`: used for pulse and setup timing
    pub fn new(
        step: STEP,
        dir: DIR,
        enable: EN,
        mode_pins: ModePins<M>,
        delay: D,
    ) -> Result<Self, StepperError> {
        let mut driver = Self {
            step,
            dir,
            enable,
            mode_pins,
            delay,
            timing: Drv8825Timing::default(),
            clockwise_high: true,
            enabled: false,
            direction: None,
            mode: None,
        };
        driver.step.set_low().map_err(|_| StepperError::Pin)?;
        driver.enable(false)?;
        Ok(driver)
    }

    /// Override the pulse timing
    pub fn with_timing(mut self, timing: Drv8825Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Swap which DIR level means clockwise, for motors wired the other way
    pub fn with_inverted_direction(mut self) -> Self {
        self.clockwise_high = false;
        self.direction = None;
        self
    }

    /// Current resolution, if one has been selected
    pub fn step_mode(&self) -> Option<StepMode> {
        match self.mode_pins {
            ModePins::HardWired(mode) => Some(mode),
            ModePins::Driven(_) => self.mode,
        }
    }

    /// Release the pins and delay
    pub fn release(self) -> (STEP, DIR, EN, ModePins<M>, D) {
        (self.step, self.dir, self.enable, self.mode_pins, self.delay)
    }
}

impl<STEP, DIR, EN, M, D> StepperDriver for Drv8825<STEP, DIR, EN, M, D>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    M: OutputPin,
    D: DelayNs,
{
    fn enable(&mut self, enabled: bool) -> Result<(), StepperError> {
        let level = PinState::from(!enabled);
        self.enable
            .set_state(level)
            .map_err(|_| StepperError::Pin)?;
        if enabled && !self.enabled {
            self.delay.delay_ns(self.timing.enable_ns);
        }
        self.enabled = enabled;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_direction(&mut self, dir: Direction) -> Result<(), StepperError> {
        if self.direction == Some(dir) {
            return Ok(());
        }
        let high = (dir == Direction::Clockwise) == self.clockwise_high;
        self.dir
            .set_state(PinState::from(high))
            .map_err(|_| StepperError::Pin)?;
        self.delay.delay_ns(self.timing.setup_ns);
        self.direction = Some(dir);
        Ok(())
    }

    fn set_step_mode(&mut self, mode: StepMode) -> Result<(), StepperError> {
        match &mut self.mode_pins {
            ModePins::HardWired(wired) if *wired == mode => Ok(()),
            ModePins::HardWired(_) => Err(StepperError::Unsupported),
            ModePins::Driven(pins) => {
                if self.mode == Some(mode) {
                    return Ok(());
                }
                let levels = ModePins::<M>::levels(mode);
                for (pin, high) in pins.iter_mut().zip(levels) {
                    pin.set_state(PinState::from(high))
                        .map_err(|_| StepperError::Pin)?;
                }
                self.delay.delay_ns(self.timing.setup_ns);
                self.mode = Some(mode);
                Ok(())
            }
        }
    }

    fn supports(&self, mode: StepMode) -> bool {
        match self.mode_pins {
            ModePins::HardWired(wired) => wired == mode,
            ModePins::Driven(_) => true,
        }
    }

    fn pulse(&mut self) -> Result<(), StepperError> {
        self.step.set_high().map_err(|_| StepperError::Pin)?;
        self.delay.delay_ns(self.timing.step_high_ns);
        self.step.set_low().map_err(|_| StepperError::Pin)?;
        self.delay.delay_ns(self.timing.step_low_ns);
        Ok(())
    }
}
