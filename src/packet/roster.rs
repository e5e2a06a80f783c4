//! Roster packets carrying driver display names.
//!
//! The primary roster (wire format 1) covers slots 0..16 and also names the
//! car, class, and track. When a session has more than 16 participants the
//! simulator follows up with additional-roster packets (wire format 2), each
//! carrying 16 more names starting at an explicit slot offset.

use super::cursor::FieldCursor;
use super::hash_bytes;
use crate::{ReplayError, Result};

const NAME_WIDTH: usize = 64;
const NAMES_PER_PACKET: usize = 16;

/// Primary roster packet (1347 bytes, type 1): slots 0..16.
#[derive(Debug, Clone)]
pub struct RosterPacket {
    pub data_hash: String,
    pub build_version: u16,
    pub car_name: String,
    pub car_class_name: String,
    pub track_location: String,
    pub track_variation: String,
    /// Driver display names ordered by slot index 0..15.
    pub names: Vec<String>,
}

impl RosterPacket {
    pub(crate) const WIRE_LENGTH: usize = 1347;
    pub(crate) const TYPE_TAG: u8 = 1;

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        let data_hash = hash_bytes(data);
        let mut cursor = FieldCursor::new(data, "roster packet");

        let build_version = cursor.u16()?;
        let tag = cursor.u8()? & 0b0000_0011;
        if tag != Self::TYPE_TAG {
            return Err(ReplayError::InvalidPacketType { expected: Self::TYPE_TAG, found: tag });
        }

        let car_name = cursor.name(NAME_WIDTH)?;
        let car_class_name = cursor.name(NAME_WIDTH)?;
        let track_location = cursor.name(NAME_WIDTH)?;
        let track_variation = cursor.name(NAME_WIDTH)?;

        let mut names = Vec::with_capacity(NAMES_PER_PACKET);
        for _ in 0..NAMES_PER_PACKET {
            names.push(cursor.name(NAME_WIDTH)?);
        }
        cursor.skip(NAME_WIDTH)?; // trailing pad block

        debug_assert_eq!(cursor.offset(), Self::WIRE_LENGTH);

        Ok(Self {
            data_hash,
            build_version,
            car_name,
            car_class_name,
            track_location,
            track_variation,
            names,
        })
    }
}

/// Additional roster packet (1028 bytes, type 2): slots offset..offset+16.
#[derive(Debug, Clone)]
pub struct AdditionalRosterPacket {
    pub data_hash: String,
    pub build_version: u16,
    /// First slot index this packet's names apply to.
    pub offset: u8,
    pub names: Vec<String>,
}

impl AdditionalRosterPacket {
    pub(crate) const WIRE_LENGTH: usize = 1028;
    pub(crate) const TYPE_TAG: u8 = 2;

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        let data_hash = hash_bytes(data);
        let mut cursor = FieldCursor::new(data, "additional roster packet");

        let build_version = cursor.u16()?;
        let tag = cursor.u8()? & 0b0000_0011;
        if tag != Self::TYPE_TAG {
            return Err(ReplayError::InvalidPacketType { expected: Self::TYPE_TAG, found: tag });
        }

        let offset = cursor.u8()?;
        let mut names = Vec::with_capacity(NAMES_PER_PACKET);
        for _ in 0..NAMES_PER_PACKET {
            names.push(cursor.name(NAME_WIDTH)?);
        }

        debug_assert_eq!(cursor.offset(), Self::WIRE_LENGTH);

        Ok(Self { data_hash, build_version, offset, names })
    }
}
