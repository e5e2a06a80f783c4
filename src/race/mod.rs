//! Race state reconstruction.
//!
//! [`RaceData`] is the orchestrator: it pulls decoded packets from a capture
//! cursor, keeps the driver registry and per-driver accumulators current,
//! and answers the queries renderers ask (classification, bests, grid,
//! elapsed time). It is fully synchronous and single-pass; `get_data`
//! advances one telemetry packet at a time and returns `Ok(None)` when the
//! capture is exhausted, which every consumer loop treats as normal
//! termination.

mod driver;
mod registry;

pub use driver::{Driver, SectorTime};
pub use registry::DriverRegistry;

use crate::archive::{PacketCursor, TelemetryArchive};
use crate::packet::{Packet, TIME_NOT_STARTED, TelemetryPacket, states};
use crate::track::Track;
use crate::{ReplayError, Result};
use std::path::Path;
use tracing::{debug, trace};

/// One row of a classification table.
#[derive(Debug)]
pub struct ClassificationEntry<'a> {
    /// Rank, 1-based. Live race position for [`RaceData::classification`],
    /// recomputed standing for [`RaceData::all_driver_classification`].
    pub position: usize,
    pub driver: &'a Driver,
    pub viewed: bool,
}

/// One row of the starting grid.
#[derive(Debug, Clone, PartialEq)]
pub struct StartingGridEntry {
    pub position: u8,
    pub slot: usize,
    pub driver_name: Option<String>,
}

/// Reconstructs race state from a capture directory.
#[derive(Debug)]
pub struct RaceData {
    archive: TelemetryArchive,
    cursor: PacketCursor,
    registry: DriverRegistry,
    track: Option<Track>,
    current: Option<TelemetryPacket>,
    elapsed_time: f32,
    last_participant_count: Option<usize>,
    starting_grid: Option<Vec<StartingGridEntry>>,
    total_time: Option<Option<f32>>,
}

impl RaceData {
    /// Open a capture directory and position the packet cursor at the race
    /// start (building the descriptor cache if needed).
    pub fn from_directory(directory: impl AsRef<Path>) -> Result<Self> {
        let archive = TelemetryArchive::open(directory)?;
        let cursor = archive.packets();
        Ok(Self {
            archive,
            cursor,
            registry: DriverRegistry::new(),
            track: None,
            current: None,
            elapsed_time: 0.0,
            last_participant_count: None,
            starting_grid: None,
            total_time: None,
        })
    }

    /// Advance to the next telemetry packet and fold it into the race
    /// state. `Ok(None)` means the capture is exhausted.
    pub fn get_data(&mut self) -> Result<Option<&TelemetryPacket>> {
        let packet = loop {
            match self.cursor.next_packet()? {
                None => return Ok(None),
                Some(Packet::Telemetry(t)) => break t,
                // Roster packets are read through lookahead during
                // reconciliation; here they are already spent.
                Some(_) => continue,
            }
        };
        self.process(packet)?;
        Ok(self.current.as_ref())
    }

    /// Advance until the reconstructed elapsed time reaches `time`.
    pub fn get_data_at(&mut self, time: f32) -> Result<Option<&TelemetryPacket>> {
        loop {
            if self.get_data()?.is_none() {
                return Ok(None);
            }
            if self.elapsed_time >= time {
                break;
            }
        }
        Ok(self.current.as_ref())
    }

    fn process(&mut self, packet: TelemetryPacket) -> Result<()> {
        trace!(
            current_time = packet.current_time,
            race_state = packet.race_state(),
            "processing telemetry packet"
        );

        let count = packet.num_participants.max(0) as usize;
        if self.last_participant_count != Some(count) {
            debug!(participants = count, "participant count changed, reconciling roster");
            let names = collect_roster_names(&mut self.cursor, count)?;
            self.registry.reconcile(&names);
            self.last_participant_count = Some(count);
        }

        self.track = Track::lookup(packet.track_length);

        let racing = packet.race_state() == states::RACE_RACING;
        for (slot, sample) in packet.active_samples() {
            let Some(driver) = self.registry.driver_for_slot_mut(slot) else {
                continue;
            };
            driver.add_sector_time(sample.last_sector_time, sample.sector(), sample.invalid_lap());
            driver.record_position(sample.raw_world_position());

            if let Some(track) = &self.track {
                // The entry box only opens the sequence; the car may roll on
                // and halt at a stall well past the entry point. Whether it
                // is actually stopped is the stationary window's call, made
                // anywhere inside the open sequence.
                let position = sample.world_position();
                if racing && !driver.in_pit_lane() && track.at_pit_entry(position) {
                    debug!(driver = driver.name(), "entered pit lane");
                    driver.enter_pit();
                } else if driver.in_pit_lane() && track.at_pit_exit(position) {
                    debug!(driver = driver.name(), stops = driver.stops() + 1, "pit stop done");
                    driver.exit_pit();
                }
            }
        }

        if packet.current_time == TIME_NOT_STARTED {
            // Savestate restart or pre-green grid: the race clock starts
            // over, and any accumulated history belongs to the discarded
            // attempt.
            if self.elapsed_time != 0.0 {
                debug!("session clock reset, dropping accumulated race history");
            }
            self.elapsed_time = 0.0;
            self.registry.reset_history();
        } else {
            // The raw clock restarts near zero every lap, so the elapsed
            // race time is reconstructed additively from the viewed
            // driver's completed laps.
            let lap_sum: f32 = self
                .viewed_driver(&packet)
                .map(|d| d.lap_times().iter().sum())
                .unwrap_or_default();
            self.elapsed_time = lap_sum + packet.current_time;
        }

        self.current = Some(packet);
        Ok(())
    }

    fn viewed_driver(&self, packet: &TelemetryPacket) -> Option<&Driver> {
        let slot = usize::try_from(packet.viewed_participant_index).ok()?;
        self.registry.driver_for_slot(slot)
    }

    /// Reconstructed elapsed race time at the current packet.
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// The most recently processed telemetry packet.
    pub fn current_packet(&self) -> Option<&TelemetryPacket> {
        self.current.as_ref()
    }

    /// Race state of the current packet (see [`states`]).
    pub fn race_state(&self) -> Option<u8> {
        self.current.as_ref().map(TelemetryPacket::race_state)
    }

    /// Circuit matched from the current packet's track length.
    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    /// Live classification: active drivers in slot order with their
    /// broadcast race position and the viewed flag.
    pub fn classification(&self) -> Vec<ClassificationEntry<'_>> {
        let Some(packet) = &self.current else {
            return Vec::new();
        };
        let viewed = packet.viewed_participant_index;
        packet
            .active_samples()
            .filter_map(|(slot, sample)| {
                let driver = self.registry.driver_for_slot(slot)?;
                Some(ClassificationEntry {
                    position: usize::from(sample.race_position()),
                    driver,
                    viewed: i8::try_from(slot).is_ok_and(|s| s == viewed),
                })
            })
            .collect()
    }

    /// Full-field classification: active plus dropped drivers, re-ranked by
    /// laps completed (descending) then total race time (ascending).
    /// Drivers with equal laps and equal race time share a rank.
    pub fn all_driver_classification(&self) -> Vec<ClassificationEntry<'_>> {
        let viewed_slot = self.current.as_ref().map(|p| p.viewed_participant_index);

        let mut field: Vec<(&Driver, bool)> = self
            .registry
            .active_drivers()
            .into_iter()
            .map(|d| (d, i8::try_from(d.index()).ok() == viewed_slot))
            .collect();
        field.extend(self.registry.dropped_drivers().into_iter().map(|d| (d, false)));

        field.sort_by(|(a, _), (b, _)| {
            b.laps_complete()
                .cmp(&a.laps_complete())
                .then_with(|| a.race_time().total_cmp(&b.race_time()))
        });

        let mut entries = Vec::with_capacity(field.len());
        let mut rank = 0;
        let mut previous: Option<(usize, f32)> = None;
        for (index, (driver, viewed)) in field.into_iter().enumerate() {
            let key = (driver.laps_complete(), driver.race_time());
            if previous != Some(key) {
                rank = index + 1;
            }
            previous = Some(key);
            entries.push(ClassificationEntry { position: rank, driver, viewed });
        }
        entries
    }

    /// Fastest valid lap in the field, dropped drivers included.
    pub fn best_lap(&self) -> Option<f32> {
        self.field_best(Driver::best_lap)
    }

    pub fn best_sector_1(&self) -> Option<f32> {
        self.field_best(|d| d.best_sector(1))
    }

    pub fn best_sector_2(&self) -> Option<f32> {
        self.field_best(|d| d.best_sector(2))
    }

    pub fn best_sector_3(&self) -> Option<f32> {
        self.field_best(|d| d.best_sector(3))
    }

    fn field_best(&self, per_driver: impl Fn(&Driver) -> Option<f32>) -> Option<f32> {
        self.registry
            .active_drivers()
            .into_iter()
            .chain(self.registry.dropped_drivers())
            .filter_map(|d| per_driver(d))
            .min_by(f32::total_cmp)
    }

    /// Starting grid, computed once from an independent scan to the first
    /// position-populated telemetry packet and memoized.
    pub fn starting_grid(&mut self) -> Result<&[StartingGridEntry]> {
        if self.starting_grid.is_none() {
            let mut cursor = self.archive.packets();
            let packet = loop {
                match cursor.next_packet()? {
                    None => return Err(ReplayError::MissingRaceBoundary { state: "grid" }),
                    Some(Packet::Telemetry(t)) => break t,
                    Some(_) => continue,
                }
            };
            let count = packet.num_participants.max(0) as usize;
            let names = collect_roster_names(&mut cursor, count)?;

            let grid: Vec<StartingGridEntry> = packet
                .active_samples()
                .map(|(slot, sample)| StartingGridEntry {
                    position: sample.race_position(),
                    slot,
                    driver_name: names.get(slot).filter(|n| !n.is_empty()).cloned(),
                })
                .collect();
            debug!(entries = grid.len(), "starting grid resolved");
            self.starting_grid = Some(grid);
        }
        Ok(self.starting_grid.as_deref().unwrap_or(&[]))
    }

    /// Leader's current lap, clamped to the event lap count for lap-limited
    /// races.
    pub fn current_lap(&self) -> Option<u8> {
        let packet = self.current.as_ref()?;
        let leader =
            packet.active_samples().min_by_key(|(_, sample)| sample.race_position())?.1;
        let lap = leader.current_lap;
        if packet.laps_in_event > 0 { Some(lap.min(packet.laps_in_event)) } else { Some(lap) }
    }

    /// Event lap count from the current packet. Zero means the race is
    /// time-limited; see [`RaceData::total_time`].
    pub fn laps_in_event(&self) -> Option<u8> {
        self.current.as_ref().map(|p| p.laps_in_event)
    }

    /// Total duration of a time-limited race, from an independent memoized
    /// scan for the first positive `event_time_remaining`. `None` for
    /// lap-limited races, and until a first packet establishes the event
    /// lap count.
    pub fn total_time(&mut self) -> Result<Option<f32>> {
        if self.laps_in_event() != Some(0) {
            return Ok(None);
        }
        if let Some(total) = self.total_time {
            return Ok(total);
        }

        let mut cursor = self.archive.packets();
        let mut total = None;
        while let Some(packet) = cursor.next_packet()? {
            if let Some(t) = packet.as_telemetry() {
                if t.event_time_remaining > 0.0 {
                    total = Some(t.event_time_remaining);
                    break;
                }
            }
        }
        self.total_time = Some(total);
        Ok(total)
    }

    /// Refined world position of the sample in `slot`, from the current
    /// packet.
    pub fn driver_world_position(&self, slot: usize) -> Option<[f32; 3]> {
        let packet = self.current.as_ref()?;
        packet
            .active_samples()
            .find(|(s, _)| *s == slot)
            .map(|(_, sample)| sample.world_position())
    }

    /// The driver registry, for identity and history queries.
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }
}

/// Gather driver names for slots `0..count` by reading ahead through
/// upcoming roster packets without consuming them. The primary roster
/// covers slots 0..16; additional-roster fragments cover 16 slots from
/// their offset. Fatal when the stream ends, or the participant count
/// changes, before every slot is named.
fn collect_roster_names(cursor: &mut PacketCursor, count: usize) -> Result<Vec<String>> {
    let mut names = vec![String::new(); count];
    let mut covered = vec![false; count];
    let mut ahead = 0;

    while covered.iter().any(|c| !c) {
        let found = covered.iter().filter(|c| **c).count();
        let Some(packet) = cursor.peek(ahead)? else {
            return Err(ReplayError::RosterIncomplete { needed: count, found });
        };
        match packet {
            Packet::Roster(roster) => {
                for (slot, name) in roster.names.iter().enumerate().take(count) {
                    names[slot] = name.clone();
                    covered[slot] = true;
                }
            }
            Packet::AdditionalRoster(roster) => {
                let base = usize::from(roster.offset);
                for (i, name) in roster.names.iter().enumerate() {
                    if let Some(slot) = base.checked_add(i).filter(|s| *s < count) {
                        names[slot] = name.clone();
                        covered[slot] = true;
                    }
                }
            }
            Packet::Telemetry(t) => {
                if t.num_participants.max(0) as usize != count {
                    return Err(ReplayError::RosterIncomplete { needed: count, found });
                }
            }
        }
        ahead += 1;
    }
    Ok(names)
}
