//! Persisted focuser settings
//!
//! One flat record holding calibration and mode flags. It is serialized with
//! postcard; `validity` is the first field so that it lands in the first
//! byte of the stored record.

use serde::{Deserialize, Serialize};

use super::limits::*;
use crate::traits::Direction;

/// Logical focuser travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoveDirection {
    /// Towards lower positions
    #[default]
    In,
    /// Towards higher positions
    Out,
}

impl MoveDirection {
    /// Direction of travel from `from` to `to`
    pub fn between(from: i32, to: i32) -> Self {
        if to < from {
            MoveDirection::In
        } else {
            MoveDirection::Out
        }
    }

    /// Physical shaft direction, honouring the reverse flag
    pub fn to_physical(self, reversed: bool) -> Direction {
        let dir = match self {
            MoveDirection::Out => Direction::Clockwise,
            MoveDirection::In => Direction::CounterClockwise,
        };
        if reversed {
            dir.opposite()
        } else {
            dir
        }
    }

    /// Protocol encoding (0 = in, 1 = out)
    pub fn as_u8(self) -> u8 {
        match self {
            MoveDirection::In => 0,
            MoveDirection::Out => 1,
        }
    }

    pub fn from_flag(out: bool) -> Self {
        if out {
            MoveDirection::Out
        } else {
            MoveDirection::In
        }
    }
}

/// Step rate class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpeedClass {
    Slow,
    Medium,
    #[default]
    Fast,
}

impl SpeedClass {
    /// Minimum time between logical steps
    pub fn step_delay_ms(self) -> u32 {
        match self {
            SpeedClass::Slow => 8,
            SpeedClass::Medium => 4,
            SpeedClass::Fast => 2,
        }
    }

    /// Protocol encoding (0 = slow, 1 = medium, 2 = fast)
    pub fn as_u8(self) -> u8 {
        match self {
            SpeedClass::Slow => 0,
            SpeedClass::Medium => 1,
            SpeedClass::Fast => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SpeedClass::Slow),
            1 => Some(SpeedClass::Medium),
            2 => Some(SpeedClass::Fast),
            _ => None,
        }
    }
}

/// Unit used when reporting temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Protocol letter
    pub fn as_char(self) -> char {
        match self {
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
        }
    }
}

/// Settings record kept in non-volatile storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistedSettings {
    /// Must equal [`VALID_DATA_FLAG`]
    pub validity: u8,
    /// Position at the time of the last write
    pub last_position: i32,
    /// Highest reachable position
    pub max_step: i32,
    /// Distance per step in microns × 100
    pub step_size_x100: u16,
    /// Delay after arrival before follow-up work
    pub settle_delay_ms: u8,
    pub backlash_steps_in: u8,
    pub backlash_steps_out: u8,
    /// Compensation steps per °C
    pub temp_coefficient: u8,
    /// Keep the coils energised while idle
    pub coil_power_enabled: bool,
    /// Invert the physical direction line
    pub reverse_direction: bool,
    pub backlash_in_enabled: bool,
    pub backlash_out_enabled: bool,
    pub step_size_enabled: bool,
    pub temperature_unit: TemperatureUnit,
    /// Broadcast position while moving
    pub update_while_moving: bool,
    pub tc_enabled: bool,
    pub tc_direction: MoveDirection,
    /// Direction of the last physical pulse
    pub move_direction: MoveDirection,
    pub speed: SpeedClass,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PersistedSettings {
    /// Factory defaults
    pub const fn defaults() -> Self {
        Self {
            validity: VALID_DATA_FLAG,
            last_position: 5000,
            max_step: 10_000,
            step_size_x100: 1130,
            settle_delay_ms: 50,
            backlash_steps_in: 0,
            backlash_steps_out: 0,
            temp_coefficient: 0,
            coil_power_enabled: false,
            reverse_direction: false,
            backlash_in_enabled: false,
            backlash_out_enabled: false,
            step_size_enabled: false,
            temperature_unit: TemperatureUnit::Celsius,
            update_while_moving: true,
            tc_enabled: false,
            tc_direction: MoveDirection::In,
            move_direction: MoveDirection::In,
            speed: SpeedClass::Fast,
        }
    }

    /// Clamp a requested position into `[FOCUSER_LOWER_LIMIT, max_step]`
    pub fn clamp_position(&self, position: i32) -> i32 {
        position.clamp(FOCUSER_LOWER_LIMIT, self.max_step.max(FOCUSER_LOWER_LIMIT))
    }

    pub fn backlash_enabled(&self, dir: MoveDirection) -> bool {
        match dir {
            MoveDirection::In => self.backlash_in_enabled,
            MoveDirection::Out => self.backlash_out_enabled,
        }
    }

    /// Backlash pre-roll for a move in `dir`, zero when disabled
    pub fn backlash_steps(&self, dir: MoveDirection) -> u32 {
        if !self.backlash_enabled(dir) {
            return 0;
        }
        match dir {
            MoveDirection::In => self.backlash_steps_in as u32,
            MoveDirection::Out => self.backlash_steps_out as u32,
        }
    }

    /// Time to wait after arrival before settling
    pub fn settle_duration_ms(&self) -> u32 {
        self.settle_delay_ms as u32 + self.speed.step_delay_ms() * SETTLE_MULTIPLIER
    }

    /// Whether `max_step` is an acceptable limit
    pub fn is_valid_max_step(max_step: i32) -> bool {
        (MAX_STEP_FLOOR..=FOCUSER_UPPER_LIMIT).contains(&max_step)
    }

    /// Check the record carries the validity tag and sane limits
    pub fn is_consistent(&self) -> bool {
        self.validity == VALID_DATA_FLAG
            && Self::is_valid_max_step(self.max_step)
            && (FOCUSER_LOWER_LIMIT..=self.max_step).contains(&self.last_position)
            && self.step_size_x100 > 0
    }
}
