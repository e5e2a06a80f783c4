//! Race state reconstruction for Project CARS telemetry captures.
//!
//! Trackside reads a directory of captured UDP datagrams (one file per
//! packet) and rebuilds a queryable model of the race: driver identities
//! across roster refreshes, validated sector and lap times, pit stops,
//! classification, and a monotonic elapsed-time clock that survives the
//! simulator's per-lap clock resets.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trackside::Trackside;
//!
//! fn main() -> trackside::Result<()> {
//!     let mut race = Trackside::open("/path/to/capture")?;
//!
//!     while let Some(packet) = race.get_data()? {
//!         let state = packet.race_state();
//!         println!("t={:.1}s state={state}", race.elapsed_time());
//!     }
//!
//!     for entry in race.all_driver_classification() {
//!         println!("P{} {}", entry.position, entry.driver.name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The first open of a capture performs one reverse scan to locate the race
//! boundaries and caches them as content hashes in a `descriptor.json`
//! beside the packets; later opens skip straight to the race start.

// Core types and error handling
mod error;
pub mod packet;
#[cfg(test)]
pub mod test_utils;
pub mod track;

// Reconstruction pipeline
pub mod archive;
pub mod race;

pub use error::{ReplayError, Result};

pub use archive::{Descriptor, PacketCursor, TelemetryArchive};
pub use packet::{
    AdditionalRosterPacket, Packet, ParticipantSample, RosterPacket, TelemetryPacket,
};
pub use race::{
    ClassificationEntry, Driver, DriverRegistry, RaceData, SectorTime, StartingGridEntry,
};
pub use track::Track;

/// Unified entry point for opening telemetry captures.
///
/// A thin factory over [`RaceData::from_directory`], kept as the stable
/// front door of the crate.
///
/// # Examples
///
/// ```rust,no_run
/// use trackside::Trackside;
///
/// fn main() -> trackside::Result<()> {
///     let mut race = Trackside::open("/path/to/capture")?;
///     let grid = race.starting_grid()?;
///     println!("{} cars on the grid", grid.len());
///     Ok(())
/// }
/// ```
pub struct Trackside;

impl Trackside {
    /// Open a capture directory for reconstruction.
    pub fn open(directory: impl AsRef<std::path::Path>) -> Result<RaceData> {
        RaceData::from_directory(directory)
    }
}
