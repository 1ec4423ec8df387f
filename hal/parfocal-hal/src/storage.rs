//! Non-volatile storage abstractions
//!
//! The focuser keeps its settings in a small EEPROM (or flash emulating one).
//! Records are replaced whole: the core never patches individual fields in
//! place, so an implementation only has to guarantee that a single
//! `write_record` call either lands completely or leaves the previous bytes.

/// Errors from non-volatile storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Device did not respond or reported a fault on read
    Read,
    /// Device did not respond or reported a fault on write/commit
    Write,
    /// Requested range lies outside the device
    OutOfBounds,
}

/// Byte-addressed record storage
///
/// Calls are synchronous. Implementations backed by EEPROM emulation commit
/// the page inside `write_record`.
pub trait NvStorage {
    /// Total addressable size in bytes
    fn capacity(&self) -> usize;

    /// Read `buffer.len()` bytes starting at `addr`
    fn read_record(&mut self, addr: usize, buffer: &mut [u8]) -> Result<(), StorageError>;

    /// Replace `data.len()` bytes starting at `addr`
    fn write_record(&mut self, addr: usize, data: &[u8]) -> Result<(), StorageError>;
}

/// Check that `len` bytes at `addr` fit a device of `capacity` bytes
pub fn check_bounds(capacity: usize, addr: usize, len: usize) -> Result<(), StorageError> {
    match addr.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::OutOfBounds),
    }
}
