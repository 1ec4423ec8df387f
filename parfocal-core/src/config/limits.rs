//! Compile-time limits and timing constants

/// Validity tag a stored record must carry to be trusted
pub const VALID_DATA_FLAG: u8 = 99;

/// Lowest accepted target position
pub const FOCUSER_LOWER_LIMIT: i32 = 0;

/// Lowest value `max_step` may be set to
pub const MAX_STEP_FLOOR: i32 = 5760;

/// Highest value `max_step` may be set to
pub const FOCUSER_UPPER_LIMIT: i32 = 55_000;

/// Quiet window before a dirty record is written
pub const EEPROM_WRITE_INTERVAL_MS: u32 = 10_000;

/// Temperature sampling cadence
pub const TEMP_REFRESH_RATE_MS: u32 = 1_300;

/// Longest a probe conversion may stay pending before it is abandoned
pub const TEMP_CONVERSION_TIMEOUT_MS: u32 = 1_000;

/// Steps between position broadcasts while moving
pub const POSITION_UPDATE_STEP_COUNT: u32 = 15;

/// Distance to target below which the slow step delay is used
pub const MOTOR_SPEED_CHANGE_THRESHOLD: u32 = 200;

/// Step delays added to the settle delay after arrival
pub const SETTLE_MULTIPLIER: u32 = 5;

/// Size of the non-volatile storage area
pub const EEPROM_SIZE: usize = 512;

/// Smallest temperature change that triggers compensation (0.25°C)
pub const TEMP_RESOLUTION_X100: i32 = 25;

/// Firmware name reported by the name query
pub const FIRMWARE_NAME: &str = "Parfocal.DRV8825";

/// Firmware version reported by the version query
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
