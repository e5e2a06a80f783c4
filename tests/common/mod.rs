//! Raw wire-format fixtures for integration tests.
//!
//! Packets are assembled at the documented byte offsets, independent of the
//! crate's decoders, and written out as `pdata<N>` capture files.

use std::path::Path;

pub const TELEMETRY_LENGTH: usize = 1367;
pub const ROSTER_LENGTH: usize = 1347;

pub const RACE_NOT_STARTED: u8 = 1;
pub const RACE_RACING: u8 = 2;
pub const RACE_FINISHED: u8 = 3;
pub const NO_SECTOR_TIME: f32 = -123.0;

/// Per-slot sample fields; slots not listed stay inactive.
pub struct Sample {
    pub slot: usize,
    pub position: u8,
    pub lap: u8,
    pub sector: u8,
    pub last_sector_time: f32,
    pub invalid: bool,
    pub world: [i16; 3],
}

impl Sample {
    pub fn new(slot: usize, sector: u8, last_sector_time: f32) -> Self {
        Self {
            slot,
            position: slot as u8 + 1,
            lap: 1,
            sector,
            last_sector_time,
            invalid: false,
            world: [0, 0, 0],
        }
    }
}

pub struct Telemetry<'a> {
    pub session: u8,
    pub game: u8,
    pub race_state: u8,
    pub participants: i8,
    pub laps_in_event: u8,
    pub current_time: f32,
    pub track_length: f32,
    pub samples: &'a [Sample],
}

pub fn telemetry(spec: &Telemetry<'_>) -> Vec<u8> {
    let mut data = vec![0u8; TELEMETRY_LENGTH];
    data[2] = 0; // type tag: telemetry
    data[3] = (spec.session << 4) | (spec.game & 0x0F);
    data[5] = spec.participants as u8;
    data[10] = spec.race_state;
    data[11] = spec.laps_in_event;
    data[20..24].copy_from_slice(&spec.current_time.to_le_bytes());
    data[1360..1364].copy_from_slice(&spec.track_length.to_le_bytes());
    for sample in spec.samples {
        let base = 464 + sample.slot * 16;
        data[base..base + 2].copy_from_slice(&sample.world[0].to_le_bytes());
        data[base + 2..base + 4].copy_from_slice(&sample.world[1].to_le_bytes());
        data[base + 4..base + 6].copy_from_slice(&sample.world[2].to_le_bytes());
        data[base + 8] = 0x80 | (sample.position & 0x7F);
        data[base + 9] = ((sample.invalid as u8) << 7) | sample.lap.saturating_sub(1);
        data[base + 10] = sample.lap;
        data[base + 11] = sample.sector & 0x07;
        data[base + 12..base + 16].copy_from_slice(&sample.last_sector_time.to_le_bytes());
    }
    data
}

pub fn roster(names: &[&str]) -> Vec<u8> {
    let mut data = vec![0u8; ROSTER_LENGTH];
    data[2] = 1; // type tag: primary roster
    for (i, name) in names.iter().enumerate() {
        let at = 259 + i * 64;
        data[at..at + name.len()].copy_from_slice(name.as_bytes());
    }
    data
}

pub fn write_capture(directory: &Path, packets: &[Vec<u8>]) -> std::io::Result<()> {
    for (i, data) in packets.iter().enumerate() {
        std::fs::write(directory.join(format!("pdata{}", i + 1)), data)?;
    }
    Ok(())
}
