//! Track geometry lookup for pit-stop inference.
//!
//! The telemetry stream never names the circuit; it only reports the track
//! length. A static catalog maps lengths to known circuits and, where the
//! data exists, to pit-lane entry/exit coordinates with a detection radius.
//! The catalog is embedded in the crate and parsed once per process.
//!
//! Pit checks are deliberately per-axis box tests, not Euclidean distance:
//! the coordinates were calibrated against that shape and changing it would
//! shift stop detection on every circuit.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

static CATALOG_JSON: &str = include_str!("track_data.json");

static CATALOG: OnceLock<Vec<TrackRecord>> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
struct TrackRecord {
    display_name: String,
    length: f32,
    #[serde(default)]
    pit_entry: Option<[f32; 2]>,
    #[serde(default)]
    pit_exit: Option<[f32; 2]>,
    #[serde(default)]
    pit_radius: Option<f32>,
}

fn catalog() -> &'static [TrackRecord] {
    CATALOG.get_or_init(|| {
        match serde_json::from_str::<HashMap<String, TrackRecord>>(CATALOG_JSON) {
            Ok(records) => records.into_values().collect(),
            Err(e) => {
                // Degrade to "no pit detection" rather than aborting the run.
                warn!("track catalog unreadable, pit detection disabled: {e}");
                Vec::new()
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PitGeometry {
    entry: [f32; 2],
    exit: [f32; 2],
    radius: f32,
}

/// A matched circuit, with pit-lane geometry when the catalog has it.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    display_name: String,
    length: f32,
    pit: Option<PitGeometry>,
}

impl Track {
    /// Match a reported track length against the catalog, picking the entry
    /// with the numerically closest length. Returns `None` only when the
    /// catalog itself is empty.
    pub fn lookup(reported_length: f32) -> Option<Track> {
        let record = catalog().iter().min_by(|a, b| {
            let da = (a.length - reported_length).abs();
            let db = (b.length - reported_length).abs();
            da.total_cmp(&db)
        })?;

        let pit = match (record.pit_entry, record.pit_exit, record.pit_radius) {
            (Some(entry), Some(exit), Some(radius)) => Some(PitGeometry { entry, exit, radius }),
            _ => None,
        };

        Some(Track { display_name: record.display_name.clone(), length: record.length, pit })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    /// True when the car's x and z offsets from the pit entry point are each
    /// within the detection radius. Always false without pit geometry.
    pub fn at_pit_entry(&self, position: [f32; 3]) -> bool {
        self.pit.is_some_and(|pit| Self::in_box(pit.entry, pit.radius, position))
    }

    /// Box test against the pit exit point. Always false without geometry.
    pub fn at_pit_exit(&self, position: [f32; 3]) -> bool {
        self.pit.is_some_and(|pit| Self::in_box(pit.exit, pit.radius, position))
    }

    fn in_box(point: [f32; 2], radius: f32, position: [f32; 3]) -> bool {
        (point[0] - position[0]).abs() < radius && (point[1] - position[2]).abs() < radius
    }

    #[cfg(test)]
    pub(crate) fn fixture(entry: [f32; 2], exit: [f32; 2], radius: f32) -> Track {
        Track {
            display_name: "Test Circuit".to_string(),
            length: 1000.0,
            pit: Some(PitGeometry { entry, exit, radius }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_picks_nearest_length() {
        // Reported lengths rarely match the catalog exactly.
        let track = Track::lookup(3905.5).unwrap();
        assert_eq!(track.display_name(), "Brands Hatch GP");

        let track = Track::lookup(13600.0).unwrap();
        assert_eq!(track.display_name(), "Le Mans Circuit de la Sarthe");
    }

    #[test]
    fn track_without_pit_data_never_detects() {
        let track = Track::lookup(1929.2).unwrap();
        assert_eq!(track.display_name(), "Brands Hatch Indy");
        assert!(!track.at_pit_entry([0.0, 0.0, 0.0]));
        assert!(!track.at_pit_exit([0.0, 0.0, 0.0]));
    }

    #[test]
    fn pit_check_is_a_box_not_a_circle() {
        let track = Track::fixture([100.0, 200.0], [300.0, 400.0], 10.0);

        // Inside on both axes.
        assert!(track.at_pit_entry([105.0, 0.0, 195.0]));
        // |dx| within radius but |dz| exceeding it must not register, even
        // though a Euclidean check with a generous radius might.
        assert!(!track.at_pit_entry([100.0, 0.0, 215.0]));
        // And the transpose.
        assert!(!track.at_pit_entry([115.0, 0.0, 200.0]));

        // Corner case a circular test would reject: both axes at 0.9r puts
        // the Euclidean distance at ~1.27r, but the box accepts it.
        assert!(track.at_pit_entry([109.0, 0.0, 209.0]));
    }

    #[test]
    fn entry_and_exit_are_independent_points() {
        let track = Track::fixture([0.0, 0.0], [500.0, 500.0], 5.0);
        assert!(track.at_pit_entry([1.0, 0.0, -1.0]));
        assert!(!track.at_pit_exit([1.0, 0.0, -1.0]));
        assert!(track.at_pit_exit([499.0, 12.0, 501.0]));
    }
}
