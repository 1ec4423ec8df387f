//! Runtime tuning
//!
//! Board-level choices that are not part of the stored record: where the
//! record lives, whether a probe is fitted, and the loop cadences.

use super::limits::*;
use super::record::RECORD_ADDR;

/// Focuser runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FocuserConfig {
    /// Storage offset of the settings record
    pub record_addr: usize,
    /// Whether the board has a temperature probe fitted
    pub probe_fitted: bool,
    /// Quiet window before a dirty record is written
    pub write_interval_ms: u32,
    /// Temperature sampling cadence
    pub temp_refresh_ms: u32,
    /// Longest a probe conversion may stay pending
    pub conversion_timeout_ms: u32,
    /// Steps between position broadcasts while moving
    pub position_update_steps: u32,
    /// Distance to target below which the slow delay is used
    pub speed_change_threshold: u32,
}

impl Default for FocuserConfig {
    fn default() -> Self {
        Self {
            record_addr: RECORD_ADDR,
            probe_fitted: true,
            write_interval_ms: EEPROM_WRITE_INTERVAL_MS,
            temp_refresh_ms: TEMP_REFRESH_RATE_MS,
            conversion_timeout_ms: TEMP_CONVERSION_TIMEOUT_MS,
            position_update_steps: POSITION_UPDATE_STEP_COUNT,
            speed_change_threshold: MOTOR_SPEED_CHANGE_THRESHOLD,
        }
    }
}
