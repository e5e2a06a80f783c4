//! Builders for synthetic capture packets.
//!
//! Real capture directories are megabytes of opaque datagrams; unit tests
//! instead assemble packets byte by byte at the documented wire offsets.
//! Keeping the offsets here, independent of the cursor-based decoders,
//! means a decoder regression shows up as a test failure instead of being
//! silently mirrored into the fixtures.

use crate::packet::{AdditionalRosterPacket, RosterPacket, TelemetryPacket};

/// Per-slot participant fields for [`TelemetryPacketBuilder::participant`].
#[derive(Debug, Clone, Copy)]
pub struct SampleSpec {
    pub world: [i16; 3],
    pub position: u8,
    pub active: bool,
    pub laps: u8,
    pub invalid: bool,
    pub current_lap: u8,
    pub sector: u8,
    pub last_sector_time: f32,
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self {
            world: [0, 0, 0],
            position: 0,
            active: false,
            laps: 0,
            invalid: false,
            current_lap: 1,
            sector: 1,
            last_sector_time: 0.0,
        }
    }
}

/// Builds a wire-format telemetry packet (1367 bytes, type 0) with every
/// field zeroed unless set.
pub struct TelemetryPacketBuilder {
    data: Vec<u8>,
}

// Byte offsets in the telemetry layout.
const OFFSET_TYPE_TAG: usize = 2;
const OFFSET_GAME_SESSION_STATE: usize = 3;
const OFFSET_VIEWED: usize = 4;
const OFFSET_NUM_PARTICIPANTS: usize = 5;
const OFFSET_RACE_STATE: usize = 10;
const OFFSET_LAPS_IN_EVENT: usize = 11;
const OFFSET_CURRENT_TIME: usize = 20;
const OFFSET_EVENT_TIME_REMAINING: usize = 36;
const OFFSET_PARTICIPANTS: usize = 464;
const PARTICIPANT_STRIDE: usize = 16;
const OFFSET_TRACK_LENGTH: usize = 1360;

impl TelemetryPacketBuilder {
    pub fn new() -> Self {
        let mut data = vec![0u8; TelemetryPacket::WIRE_LENGTH];
        data[OFFSET_TYPE_TAG] = TelemetryPacket::TYPE_TAG;
        Self { data }
    }

    /// Packed state byte: session in the high nibble, game in the low.
    pub fn game_session_state(mut self, session: u8, game: u8) -> Self {
        self.data[OFFSET_GAME_SESSION_STATE] = (session << 4) | (game & 0x0F);
        self
    }

    pub fn race_state(mut self, state: u8) -> Self {
        self.data[OFFSET_RACE_STATE] = state;
        self
    }

    pub fn viewed(mut self, index: i8) -> Self {
        self.data[OFFSET_VIEWED] = index as u8;
        self
    }

    pub fn num_participants(mut self, count: i8) -> Self {
        self.data[OFFSET_NUM_PARTICIPANTS] = count as u8;
        self
    }

    pub fn laps_in_event(mut self, laps: u8) -> Self {
        self.data[OFFSET_LAPS_IN_EVENT] = laps;
        self
    }

    pub fn current_time(mut self, time: f32) -> Self {
        self.data[OFFSET_CURRENT_TIME..OFFSET_CURRENT_TIME + 4]
            .copy_from_slice(&time.to_le_bytes());
        self
    }

    pub fn event_time_remaining(mut self, time: f32) -> Self {
        self.data[OFFSET_EVENT_TIME_REMAINING..OFFSET_EVENT_TIME_REMAINING + 4]
            .copy_from_slice(&time.to_le_bytes());
        self
    }

    pub fn track_length(mut self, length: f32) -> Self {
        self.data[OFFSET_TRACK_LENGTH..OFFSET_TRACK_LENGTH + 4]
            .copy_from_slice(&length.to_le_bytes());
        self
    }

    pub fn participant(mut self, slot: usize, spec: SampleSpec) -> Self {
        let base = OFFSET_PARTICIPANTS + slot * PARTICIPANT_STRIDE;
        self.data[base..base + 2].copy_from_slice(&spec.world[0].to_le_bytes());
        self.data[base + 2..base + 4].copy_from_slice(&spec.world[1].to_le_bytes());
        self.data[base + 4..base + 6].copy_from_slice(&spec.world[2].to_le_bytes());
        // base + 6..8: current lap distance, unused here
        self.data[base + 8] = ((spec.active as u8) << 7) | (spec.position & 0x7F);
        self.data[base + 9] = ((spec.invalid as u8) << 7) | (spec.laps & 0x7F);
        self.data[base + 10] = spec.current_lap;
        self.data[base + 11] = spec.sector & 0x07;
        self.data[base + 12..base + 16].copy_from_slice(&spec.last_sector_time.to_le_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

impl Default for TelemetryPacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_name(data: &mut [u8], at: usize, name: &str) {
    let bytes = name.as_bytes();
    data[at..at + bytes.len()].copy_from_slice(bytes);
}

/// Primary roster packet (1347 bytes, type 1). `names` fills slots from 0;
/// remaining slots stay empty.
pub fn roster_packet(
    car: &str,
    class: &str,
    track: &str,
    variation: &str,
    names: &[&str],
) -> Vec<u8> {
    let mut data = vec![0u8; RosterPacket::WIRE_LENGTH];
    data[OFFSET_TYPE_TAG] = RosterPacket::TYPE_TAG;
    write_name(&mut data, 3, car);
    write_name(&mut data, 67, class);
    write_name(&mut data, 131, track);
    write_name(&mut data, 195, variation);
    for (i, name) in names.iter().enumerate() {
        write_name(&mut data, 259 + i * 64, name);
    }
    data
}

/// Additional roster packet (1028 bytes, type 2) naming slots from `offset`.
pub fn additional_roster_packet(offset: u8, names: &[&str]) -> Vec<u8> {
    let mut data = vec![0u8; AdditionalRosterPacket::WIRE_LENGTH];
    data[OFFSET_TYPE_TAG] = AdditionalRosterPacket::TYPE_TAG;
    data[3] = offset;
    for (i, name) in names.iter().enumerate() {
        write_name(&mut data, 4 + i * 64, name);
    }
    data
}
