//! Telemetry-state packet (wire format 0, 1367 bytes).
//!
//! This is the packet the simulator broadcasts continuously while a session
//! runs. Most of its payload (car physics, tyres, weather) is irrelevant to
//! race reconstruction and is skipped positionally; the fields that matter
//! are the session/race state bits, the event clock, and the 56-slot
//! participant array.
//!
//! Field widths and order must match the capture format bit for bit, since
//! every downstream consumer indexes into the decoded arrays positionally.

use super::cursor::FieldCursor;
use super::{NO_SECTOR_TIME, PARTICIPANT_SLOTS, hash_bytes};
use crate::{ReplayError, Result};

/// One per-slot sample embedded in a telemetry packet.
///
/// Bit-packed fields keep their raw encoding; accessors extract the flag
/// bits and sub-unit position precision.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSample {
    world_x: i16,
    world_y: i16,
    world_z: i16,
    race_position_bits: u8,
    laps_completed_bits: u8,
    pub current_lap: u8,
    sector_bits: u8,
    pub last_sector_time: f32,
}

impl ParticipantSample {
    pub(crate) fn decode(cursor: &mut FieldCursor<'_>) -> Result<Self> {
        let world_x = cursor.i16()?;
        let world_y = cursor.i16()?;
        let world_z = cursor.i16()?;
        cursor.skip(2)?; // current lap distance
        let race_position_bits = cursor.u8()?;
        let laps_completed_bits = cursor.u8()?;
        let current_lap = cursor.u8()?;
        let sector_bits = cursor.u8()?;
        let last_sector_time = cursor.f32()?;
        Ok(Self {
            world_x,
            world_y,
            world_z,
            race_position_bits,
            laps_completed_bits,
            current_lap,
            sector_bits,
            last_sector_time,
        })
    }

    /// World position in metres. The x and z axes carry two extra bits of
    /// sub-unit precision packed into the sector byte (quarter-metre steps).
    pub fn world_position(&self) -> [f32; 3] {
        let mut position =
            [f32::from(self.world_x), f32::from(self.world_y), f32::from(self.world_z)];
        position[0] += f32::from((self.sector_bits & 0b0001_1000) >> 3) / 4.0;
        position[2] += f32::from((self.sector_bits & 0b0110_0000) >> 5) / 4.0;
        position
    }

    /// Raw integer world position, before precision bits are applied.
    /// Bit-identical samples here mean the car has not moved.
    pub fn raw_world_position(&self) -> [i16; 3] {
        [self.world_x, self.world_y, self.world_z]
    }

    /// High bit of the race position byte flags an occupied slot.
    pub fn is_active(&self) -> bool {
        self.race_position_bits & 0b1000_0000 != 0
    }

    pub fn race_position(&self) -> u8 {
        self.race_position_bits & 0b0111_1111
    }

    pub fn laps_completed(&self) -> u8 {
        self.laps_completed_bits & 0b0111_1111
    }

    /// Current sector, 1 through 3.
    pub fn sector(&self) -> u8 {
        self.sector_bits & 0b0000_0111
    }

    /// Whether the current lap is flagged invalid.
    ///
    /// The simulator flags the pre-race state (sitting in sector 3 before
    /// crossing the line to start the first lap proper) as invalid. That
    /// artifact is identifiable by sector == 3 with no previous sector time,
    /// and is reported here as a valid lap.
    pub fn invalid_lap(&self) -> bool {
        let flagged = self.laps_completed_bits & 0b1000_0000 != 0;
        if flagged && self.sector() == 3 && self.last_sector_time == NO_SECTOR_TIME {
            return false;
        }
        flagged
    }
}

/// Decoded telemetry-state packet.
#[derive(Debug, Clone)]
pub struct TelemetryPacket {
    /// Lowercase hex SHA-256 of the raw datagram, used for descriptor
    /// checkpoints.
    pub data_hash: String,
    pub build_version: u16,
    game_session_state: u8,
    pub viewed_participant_index: i8,
    pub num_participants: i8,
    race_state_flags: u8,
    pub laps_in_event: u8,
    /// Session clock. `-1.0` means the race has not started; the value also
    /// resets near zero at lap boundaries, so it is never used directly as
    /// an elapsed-race clock.
    pub current_time: f32,
    pub event_time_remaining: f32,
    pub participants: Vec<ParticipantSample>,
    pub track_length: f32,
}

impl TelemetryPacket {
    pub(crate) const WIRE_LENGTH: usize = 1367;
    pub(crate) const TYPE_TAG: u8 = 0;

    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        let data_hash = hash_bytes(data);
        let mut cursor = FieldCursor::new(data, "telemetry packet");

        let build_version = cursor.u16()?;
        let tag = cursor.u8()? & 0b0000_0011;
        if tag != Self::TYPE_TAG {
            return Err(ReplayError::InvalidPacketType { expected: Self::TYPE_TAG, found: tag });
        }

        let game_session_state = cursor.u8()?;
        let viewed_participant_index = cursor.i8()?;
        let num_participants = cursor.i8()?;
        cursor.skip(4)?; // unfiltered driver inputs
        let race_state_flags = cursor.u8()?;
        let laps_in_event = cursor.u8()?;
        cursor.skip(8)?; // best / last lap times
        let current_time = cursor.f32()?;
        cursor.skip(12)?; // split times
        let event_time_remaining = cursor.f32()?;
        cursor.skip(56)?; // fastest-lap and fastest-sector times
        cursor.skip(2)?; // joypad
        cursor.skip(1)?; // highest flag
        cursor.skip(1)?; // pit mode / schedule
        cursor.skip(32)?; // car state
        cursor.skip(88)?; // motion and orientation
        cursor.skip(228)?; // wheels and tyres
        cursor.skip(8)?; // engine extras
        cursor.skip(2)?; // car damage
        cursor.skip(6)?; // weather

        let mut participants = Vec::with_capacity(PARTICIPANT_SLOTS);
        for _ in 0..PARTICIPANT_SLOTS {
            participants.push(ParticipantSample::decode(&mut cursor)?);
        }

        let track_length = cursor.f32()?;
        cursor.skip(3)?; // wings, d-pad

        debug_assert_eq!(cursor.offset(), Self::WIRE_LENGTH);

        Ok(Self {
            data_hash,
            build_version,
            game_session_state,
            viewed_participant_index,
            num_participants,
            race_state_flags,
            laps_in_event,
            current_time,
            event_time_remaining,
            participants,
            track_length,
        })
    }

    /// Game state, low nibble of the packed state byte.
    pub fn game_state(&self) -> u8 {
        self.game_session_state & 0b0000_1111
    }

    /// Session state, high nibble of the packed state byte.
    pub fn session_state(&self) -> u8 {
        (self.game_session_state & 0b1111_0000) >> 4
    }

    /// Race state, low 3 bits of the race-state flag byte.
    pub fn race_state(&self) -> u8 {
        self.race_state_flags & 0b0000_0111
    }

    /// The first `num_participants` active slots, with their slot indices.
    /// Inactive slots do not count toward the quota: an empty slot below the
    /// participant count still lets later active slots through.
    pub fn active_samples(&self) -> impl Iterator<Item = (usize, &ParticipantSample)> {
        let count = self.num_participants.max(0) as usize;
        self.participants.iter().enumerate().filter(|(_, sample)| sample.is_active()).take(count)
    }

    /// True once any active slot reports a nonzero race position. The first
    /// packets of a capture often carry an unpopulated grid.
    pub fn has_populated_positions(&self) -> bool {
        self.active_samples().any(|(_, sample)| sample.race_position() != 0)
    }
}
