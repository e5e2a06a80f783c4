//! Packet codec for the three capture wire formats.
//!
//! Every captured datagram is one of three fixed-length layouts, and the
//! lengths are distinct by construction, so [`Packet::decode`] dispatches
//! purely on byte count. A type tag embedded in every packet (low 2 bits of
//! the third byte) must agree with the length-selected variant; disagreement
//! is a hard decode error rather than a silent skip, because a mistyped
//! packet means the capture is corrupt or from an incompatible simulator
//! build.

mod cursor;
mod roster;
mod telemetry;

pub use roster::{AdditionalRosterPacket, RosterPacket};
pub use telemetry::{ParticipantSample, TelemetryPacket};

use crate::{ReplayError, Result};
use sha2::{Digest, Sha256};

/// Fixed per-packet participant array capacity.
pub const PARTICIPANT_SLOTS: usize = 56;

/// Sentinel last-sector-time meaning "no time recorded yet".
pub const NO_SECTOR_TIME: f32 = -123.0;

/// Sentinel session clock meaning "race not yet started".
pub const TIME_NOT_STARTED: f32 = -1.0;

/// Raw state values carried in the telemetry packet's packed state bytes.
pub mod states {
    /// Race state before the green flag.
    pub const RACE_NOT_STARTED: u8 = 1;
    /// Race state while the race is underway.
    pub const RACE_RACING: u8 = 2;
    /// Race state once the leader has finished.
    pub const RACE_FINISHED: u8 = 3;
    /// Session state for a race session.
    pub const SESSION_RACE: u8 = 5;
    /// Game state while in-game and playing.
    pub const GAME_INGAME_PLAYING: u8 = 2;
}

/// Lowercase hex SHA-256 of a raw datagram. Content hashes identify
/// specific packets in the descriptor cache without storing offsets.
pub(crate) fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A decoded capture datagram.
#[derive(Debug, Clone)]
pub enum Packet {
    Telemetry(TelemetryPacket),
    Roster(RosterPacket),
    AdditionalRoster(AdditionalRosterPacket),
}

impl Packet {
    /// Decode one raw datagram, dispatching on its total byte length.
    pub fn decode(data: &[u8]) -> Result<Self> {
        match data.len() {
            TelemetryPacket::WIRE_LENGTH => TelemetryPacket::decode(data).map(Packet::Telemetry),
            RosterPacket::WIRE_LENGTH => RosterPacket::decode(data).map(Packet::Roster),
            AdditionalRosterPacket::WIRE_LENGTH => {
                AdditionalRosterPacket::decode(data).map(Packet::AdditionalRoster)
            }
            length => Err(ReplayError::UnrecognizedPacketLength { length }),
        }
    }

    /// Content hash of the raw bytes this packet was decoded from.
    pub fn data_hash(&self) -> &str {
        match self {
            Packet::Telemetry(p) => &p.data_hash,
            Packet::Roster(p) => &p.data_hash,
            Packet::AdditionalRoster(p) => &p.data_hash,
        }
    }

    pub fn as_telemetry(&self) -> Option<&TelemetryPacket> {
        match self {
            Packet::Telemetry(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TelemetryPacketBuilder, additional_roster_packet, roster_packet};

    #[test]
    fn dispatches_on_length() {
        let telemetry = TelemetryPacketBuilder::new().build();
        assert!(matches!(Packet::decode(&telemetry).unwrap(), Packet::Telemetry(_)));

        let roster = roster_packet("Car", "Class", "Track", "GP", &["A B"]);
        assert!(matches!(Packet::decode(&roster).unwrap(), Packet::Roster(_)));

        let additional = additional_roster_packet(16, &["C D"]);
        assert!(matches!(Packet::decode(&additional).unwrap(), Packet::AdditionalRoster(_)));
    }

    #[test]
    fn unknown_length_is_fatal() {
        let blob = vec![0u8; 900];
        match Packet::decode(&blob) {
            Err(ReplayError::UnrecognizedPacketLength { length: 900 }) => {}
            other => panic!("expected UnrecognizedPacketLength, got {other:?}"),
        }
    }

    #[test]
    fn hash_is_stable_and_content_addressed() {
        let a = TelemetryPacketBuilder::new().current_time(1.0).build();
        let b = TelemetryPacketBuilder::new().current_time(2.0).build();
        let pa = Packet::decode(&a).unwrap();
        let pa2 = Packet::decode(&a).unwrap();
        let pb = Packet::decode(&b).unwrap();
        assert_eq!(pa.data_hash(), pa2.data_hash());
        assert_ne!(pa.data_hash(), pb.data_hash());
        assert_eq!(pa.data_hash().len(), 64);
    }
}
