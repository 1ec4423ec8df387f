//! Debounced settings persistence
//!
//! EEPROM endurance is limited, so changes are not written as they happen.
//! Every change marks the record dirty; the record is written once the motor
//! has stopped and settled and no further change has arrived for a full
//! write interval.
//! If power fails inside that window the latest position is lost, which is
//! accepted.

use parfocal_hal::{check_bounds, NvStorage, StorageError};

use crate::config::record::{self, RecordError, RECORD_SIZE};
use crate::config::{FocuserConfig, PersistedSettings, VALID_DATA_FLAG};
use crate::motion::MotionController;
use crate::time::has_elapsed;

/// Errors writing the settings record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    /// Storage refused the write
    Storage(StorageError),
    /// Settings could not be encoded
    Record(RecordError),
}

impl From<StorageError> for PersistError {
    fn from(e: StorageError) -> Self {
        PersistError::Storage(e)
    }
}

impl From<RecordError> for PersistError {
    fn from(e: RecordError) -> Self {
        PersistError::Record(e)
    }
}

/// Where the startup settings came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadOrigin {
    /// Stored record was valid
    Stored,
    /// Stored record was rejected; defaults were written in its place
    Restored(RecordError),
    /// Storage could not be used; running on in-memory defaults
    Unavailable(StorageError),
}

/// Settings returned by [`load_or_default`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    pub settings: PersistedSettings,
    pub origin: LoadOrigin,
}

/// Read the settings record, falling back to defaults
///
/// A rejected record is overwritten with the defaults, validity tag included,
/// before returning. Never returns a partially valid record.
pub fn load_or_default<S: NvStorage>(storage: &mut S, addr: usize) -> Loaded {
    let stored = read(storage, addr);
    let reason = match stored {
        Ok(Ok(settings)) => {
            info!("settings loaded, position {}", settings.last_position);
            return Loaded {
                settings,
                origin: LoadOrigin::Stored,
            };
        }
        Ok(Err(e)) => e,
        Err(e) => {
            warn!("settings storage unreadable: {}", e);
            return Loaded {
                settings: PersistedSettings::defaults(),
                origin: LoadOrigin::Unavailable(e),
            };
        }
    };

    warn!("stored settings rejected ({}), restoring defaults", reason);
    let settings = PersistedSettings::defaults();
    let origin = match write(storage, addr, &settings) {
        Ok(()) => LoadOrigin::Restored(reason),
        Err(PersistError::Storage(e)) => LoadOrigin::Unavailable(e),
        // Defaults always encode
        Err(PersistError::Record(_)) => LoadOrigin::Restored(reason),
    };

    Loaded { settings, origin }
}

/// Outer error: storage failure. Inner error: record rejected.
fn read<S: NvStorage>(
    storage: &mut S,
    addr: usize,
) -> Result<Result<PersistedSettings, RecordError>, StorageError> {
    check_bounds(storage.capacity(), addr, RECORD_SIZE)?;
    let mut slot = [0u8; RECORD_SIZE];
    storage.read_record(addr, &mut slot)?;
    Ok(record::decode(&slot))
}

fn write<S: NvStorage>(
    storage: &mut S,
    addr: usize,
    settings: &PersistedSettings,
) -> Result<(), PersistError> {
    check_bounds(storage.capacity(), addr, RECORD_SIZE)?;
    let slot = record::encode(settings)?;
    storage.write_record(addr, &slot)?;
    Ok(())
}

/// Dirty flag and write timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistenceTimer {
    /// Time of the last write attempt
    pub last_write_ms: u32,
    pub dirty: bool,
    /// Time of the most recent change
    pub dirty_since_ms: u32,
}

/// Decides when the settings record is written
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    timer: PersistenceTimer,
    record_addr: usize,
    interval_ms: u32,
}

impl PersistenceManager {
    /// Create a manager; `now_ms` counts as the last write
    pub fn new(now_ms: u32, config: &FocuserConfig) -> Self {
        Self {
            timer: PersistenceTimer {
                last_write_ms: now_ms,
                dirty: false,
                dirty_since_ms: now_ms,
            },
            record_addr: config.record_addr,
            interval_ms: config.write_interval_ms,
        }
    }

    pub fn timer(&self) -> &PersistenceTimer {
        &self.timer
    }

    pub fn is_dirty(&self) -> bool {
        self.timer.dirty
    }

    /// Note a change; restarts the quiet window
    pub fn mark_dirty(&mut self, now_ms: u32) {
        self.timer.dirty = true;
        self.timer.dirty_since_ms = now_ms;
    }

    /// Whether a write is due now
    ///
    /// `motor_busy` covers the settle phase as well as stepping.
    pub fn is_due(&self, now_ms: u32, motor_busy: bool) -> bool {
        self.timer.dirty
            && !motor_busy
            && has_elapsed(now_ms, self.timer.dirty_since_ms, self.interval_ms)
            && has_elapsed(now_ms, self.timer.last_write_ms, self.interval_ms)
    }

    /// Write the record if due
    ///
    /// The current position is copied into `last_position` first. Returns
    /// whether a write happened. A failed write keeps the record dirty and is
    /// retried after another interval.
    pub fn maybe_flush<S: NvStorage>(
        &mut self,
        now_ms: u32,
        settings: &mut PersistedSettings,
        motion: &MotionController,
        storage: &mut S,
    ) -> Result<bool, PersistError> {
        if !self.is_due(now_ms, motion.is_busy()) {
            return Ok(false);
        }

        settings.last_position = motion.position();
        settings.validity = VALID_DATA_FLAG;
        self.timer.last_write_ms = now_ms;

        write(storage, self.record_addr, settings)?;
        self.timer.dirty = false;
        debug!("settings written, position {}", settings.last_position);
        Ok(true)
    }
}
