//! Stored record encoding
//!
//! Layout inside a fixed [`RECORD_SIZE`] slot:
//!
//! ```text
//! [ postcard(PersistedSettings) ][ crc32 LE ][ 0xFF padding ]
//! ```
//!
//! The first postcard byte is the validity tag. The record is always
//! written whole.

use super::limits::VALID_DATA_FLAG;
use super::settings::PersistedSettings;

/// Size of the record slot
pub const RECORD_SIZE: usize = 64;

/// Offset of the record slot in storage
pub const RECORD_ADDR: usize = 0;

const CRC_LEN: usize = 4;

/// Errors decoding or encoding a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// First byte is not the validity tag
    InvalidTag(u8),
    /// Record body does not deserialize
    Decode,
    /// Checksum mismatch
    Crc,
    /// Record does not fit in its slot
    Encode,
    /// Fields decoded but violate limits
    Inconsistent,
}

/// Encode settings into a full record slot
pub fn encode(settings: &PersistedSettings) -> Result<[u8; RECORD_SIZE], RecordError> {
    let mut slot = [0xFF; RECORD_SIZE];
    let body_len = postcard::to_slice(settings, &mut slot[..RECORD_SIZE - CRC_LEN])
        .map_err(|_| RecordError::Encode)?
        .len();

    let crc = crc32(&slot[..body_len]);
    slot[body_len..body_len + CRC_LEN].copy_from_slice(&crc.to_le_bytes());
    Ok(slot)
}

/// Decode and validate a record slot
pub fn decode(slot: &[u8]) -> Result<PersistedSettings, RecordError> {
    let tag = slot.first().copied().ok_or(RecordError::Decode)?;
    if tag != VALID_DATA_FLAG {
        return Err(RecordError::InvalidTag(tag));
    }

    let (settings, rest) = postcard::take_from_bytes::<PersistedSettings>(slot)
        .map_err(|_| RecordError::Decode)?;
    let body_len = slot.len() - rest.len();

    let stored = rest.get(..CRC_LEN).ok_or(RecordError::Decode)?;
    let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
    if stored != crc32(&slot[..body_len]) {
        return Err(RecordError::Crc);
    }

    if !settings.is_consistent() {
        return Err(RecordError::Inconsistent);
    }

    Ok(settings)
}

/// CRC32 (IEEE 802.3) over `data`
pub fn crc32(data: &[u8]) -> u32 {
    !crc32_update(0xFFFF_FFFF, data)
}

fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB88320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
