//! Per-driver lap history: the sector/lap accumulator.
//!
//! Each driver owns an append-only list of sector times built from the raw
//! `last_sector_time` readings in telemetry samples. The stream re-sends the
//! same reading many times before new data arrives, may flip a reading's
//! invalid flag after the fact, and reports sector numbers one position out
//! of phase with the time they carry, so accumulation is where most of the
//! reconstruction subtlety lives.

use crate::packet::NO_SECTOR_TIME;
use std::collections::VecDeque;

/// Samples of identical raw world position required before a car counts as
/// stationary for pit-stop detection.
const PIT_WINDOW: usize = 5;

/// One recorded sector completion.
///
/// `sector` is the raw value broadcast with the reading (1, 2, or 3). The
/// time it carries belongs to the sector the car just left: a reading
/// broadcast in sector 1 closes out sector 3 of the previous lap, sector 2
/// closes sector 1, and sector 3 closes sector 2. Lap grouping accounts for
/// this rotation by realigning to the first sector-1 entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorTime {
    pub time: f32,
    pub sector: u8,
    pub invalid: bool,
}

/// A driver identity with its accumulated race history.
///
/// Identity is the canonical name; the slot index is transient and gets
/// reassigned whenever the roster is re-broadcast.
#[derive(Debug, Clone)]
pub struct Driver {
    name: String,
    index: usize,
    sector_times: Vec<SectorTime>,
    /// Entries still to be poisoned by an earlier invalidation.
    pending_invalidations: u8,
    stops: u32,
    in_pit_lane: bool,
    position_window: VecDeque<[i16; 3]>,
}

impl Driver {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            sector_times: Vec::new(),
            pending_invalidations: 0,
            stops: 0,
            in_pit_lane: false,
            position_window: VecDeque::with_capacity(PIT_WINDOW),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current slot index in the per-packet participant array.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Adopt a new canonical name after an identity merge re-keys it.
    pub(crate) fn rename(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn sector_times(&self) -> &[SectorTime] {
        &self.sector_times
    }

    /// Feed one raw sector reading into the history.
    ///
    /// The sentinel "no time yet" reading is dropped. A reading identical to
    /// the last recorded entry is a re-send and is ignored; one that differs
    /// only in the invalid flag is a late correction and replaces the last
    /// entry in place. A newly invalid entry poisons its lap-mates: the
    /// reading's raw sector number determines how far the invalidation
    /// bleeds backward over already-recorded entries and forward over
    /// entries still to come.
    pub fn add_sector_time(&mut self, time: f32, sector: u8, invalid: bool) {
        if time == NO_SECTOR_TIME {
            return;
        }

        if let Some(last) = self.sector_times.last_mut() {
            if last.time == time && last.sector == sector {
                // A re-send, or a late-arriving invalidation of the entry we
                // already recorded. Invalidity only ever tightens: a valid
                // re-send never clears a flag set by an earlier bleed.
                if invalid && !last.invalid {
                    last.invalid = true;
                    self.propagate_invalidation(self.sector_times.len() - 1, sector);
                }
                return;
            }
        }

        let poisoned = self.pending_invalidations > 0;
        if poisoned {
            self.pending_invalidations -= 1;
        }
        self.sector_times.push(SectorTime { time, sector, invalid: invalid || poisoned });

        if invalid {
            self.propagate_invalidation(self.sector_times.len() - 1, sector);
        }
    }

    /// Invalidity straddles the lap boundary the rotated numbering creates:
    /// sector 3 poisons the next three entries, sector 1 the previous one
    /// and next two, sector 2 the previous two and next one.
    fn propagate_invalidation(&mut self, at: usize, sector: u8) {
        let backward = match sector {
            1 => 1,
            2 => 2,
            _ => 0,
        };
        let forward = match sector {
            1 => 2,
            2 => 1,
            _ => 3,
        };
        for entry in &mut self.sector_times[at.saturating_sub(backward)..at] {
            entry.invalid = true;
        }
        self.pending_invalidations = self.pending_invalidations.max(forward);
    }

    /// Completed laps: three recorded sectors per lap.
    pub fn laps_complete(&self) -> usize {
        self.sector_times.len() / 3
    }

    /// Lap times: consecutive groups of three entries, realigned so each
    /// group starts at a sector-1 entry. Invalid laps still produce a time;
    /// they only lose lap *credit* in best-lap queries.
    pub fn lap_times(&self) -> Vec<f32> {
        self.aligned_laps().map(|lap| lap.iter().map(|s| s.time).sum()).collect()
    }

    /// Best lap over laps whose three entries are all valid.
    pub fn best_lap(&self) -> Option<f32> {
        self.aligned_laps()
            .filter(|lap| lap.iter().all(|s| !s.invalid))
            .map(|lap| lap.iter().map(|s| s.time).sum::<f32>())
            .min_by(f32::total_cmp)
    }

    /// Best valid entry recorded under the given raw sector number.
    pub fn best_sector(&self, sector: u8) -> Option<f32> {
        self.sector_times
            .iter()
            .filter(|s| s.sector == sector && !s.invalid)
            .map(|s| s.time)
            .min_by(f32::total_cmp)
    }

    /// Total elapsed race time: every recorded sector, valid or not.
    pub fn race_time(&self) -> f32 {
        self.sector_times.iter().map(|s| s.time).sum()
    }

    fn aligned_laps(&self) -> impl Iterator<Item = &[SectorTime]> {
        let start = self
            .sector_times
            .iter()
            .position(|s| s.sector == 1)
            .unwrap_or(self.sector_times.len());
        self.sector_times[start..].chunks_exact(3)
    }

    /// Record a raw world position sample for the stationary heuristic.
    pub(crate) fn record_position(&mut self, position: [i16; 3]) {
        if self.position_window.len() == PIT_WINDOW {
            self.position_window.pop_front();
        }
        self.position_window.push_back(position);
    }

    /// A full window of bit-identical raw positions means the car has not
    /// moved for several samples. Sampling-rate dependent, but kept as-is
    /// for parity with existing renders.
    pub(crate) fn is_stationary(&self) -> bool {
        self.position_window.len() == PIT_WINDOW
            && self.position_window.iter().all(|p| *p == self.position_window[0])
    }

    /// Open a pit sequence: the car crossed the pit-entry box under racing
    /// conditions. It stays open until the exit box is crossed, however far
    /// from the entry point the actual stall is.
    pub(crate) fn enter_pit(&mut self) {
        self.in_pit_lane = true;
    }

    /// Close the pit sequence and count the stop.
    pub(crate) fn exit_pit(&mut self) {
        self.stops += 1;
        self.in_pit_lane = false;
    }

    pub fn in_pit_lane(&self) -> bool {
        self.in_pit_lane
    }

    /// Stationary inside an open pit sequence. A car parked off-track
    /// elsewhere never reads as stopped.
    pub fn is_stopped(&self) -> bool {
        self.in_pit_lane && self.is_stationary()
    }

    /// Completed pit stops.
    pub fn stops(&self) -> u32 {
        self.stops
    }
}
