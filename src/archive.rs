//! Capture archive access and the descriptor cache.
//!
//! A capture is a directory of `pdata<N>` files, one UDP datagram per file,
//! ordered by the numeric suffix the capture tool assigns. Archives run to
//! millions of packets, so the race boundaries (start, finish, end) are
//! located once by a reverse scan and cached in a `descriptor.json` file of
//! content hashes. Every later forward pass uses the descriptor to skip
//! straight past the menus, restarts, and grid-forming packets that precede
//! the race proper.

use crate::packet::{Packet, hash_bytes, states};
use crate::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

const DESCRIPTOR_FILENAME: &str = "descriptor.json";
const PACKET_FILE_PREFIX: &str = "pdata";

/// Content-hash checkpoints for the three race boundaries.
///
/// `race_start` is the earliest packet of the final pre-green run (a
/// savestate restart produces several such runs; only the last one counts).
/// `race_finish` is the last packet with the race still underway and
/// `race_end` the last packet after the leader finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub race_start: String,
    pub race_finish: String,
    pub race_end: String,
}

/// A capture directory, opened with its descriptor loaded or built.
#[derive(Debug)]
pub struct TelemetryArchive {
    directory: PathBuf,
    files: Vec<PathBuf>,
    descriptor: Descriptor,
}

impl TelemetryArchive {
    /// Open a capture directory. Builds and persists the descriptor when no
    /// valid cached one exists, which costs one reverse scan of the archive.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        if !directory.is_dir() {
            return Err(ReplayError::NotADirectory { path: directory });
        }

        let files = packet_files(&directory)?;
        debug!(packets = files.len(), directory = %directory.display(), "opened capture");

        let descriptor_path = directory.join(DESCRIPTOR_FILENAME);
        let mut cached = load_descriptor(&descriptor_path);
        // A well-formed cache can still be stale: written by another tool,
        // or left behind after the capture files changed. A checkpoint that
        // matches no packet would make the forward pass skip the whole
        // archive, so verify it before trusting the cache.
        if let Some(descriptor) = &cached {
            if !checkpoint_exists(&files, &descriptor.race_start)? {
                warn!(
                    path = %descriptor_path.display(),
                    "cached race-start checkpoint matches no packet, rebuilding descriptor"
                );
                cached = None;
            }
        }
        let descriptor = match cached {
            Some(descriptor) => descriptor,
            None => {
                let descriptor = build_descriptor(&files)?;
                persist_descriptor(&descriptor_path, &descriptor)?;
                descriptor
            }
        };

        Ok(Self { directory, files, descriptor })
    }

    /// Number of packet files in the archive.
    pub fn packet_count(&self) -> usize {
        self.files.len()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// A fresh forward cursor over the race proper: packets before the
    /// descriptor's `race_start` checkpoint are skipped, as are leading
    /// telemetry packets whose grid positions are not yet populated.
    pub fn packets(&self) -> PacketCursor {
        PacketCursor {
            files: self.files.clone().into(),
            buffered: VecDeque::new(),
            phase: SkipPhase::SeekStart { hash: self.descriptor.race_start.clone() },
        }
    }
}

/// `pdata*` files ordered by their numeric sequence suffix. Plain
/// lexicographic order would put `pdata10` before `pdata2`.
fn packet_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(directory).map_err(|e| ReplayError::file_error(directory.into(), e))?;

    let mut files: Vec<(u64, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ReplayError::file_error(directory.into(), e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(suffix) = name.strip_prefix(PACKET_FILE_PREFIX) else {
            continue;
        };
        let Ok(sequence) = suffix.parse::<u64>() else {
            trace!(file = name, "skipping non-sequence packet file");
            continue;
        };
        files.push((sequence, path));
    }
    files.sort_by_key(|(sequence, _)| *sequence);
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn read_raw(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| ReplayError::file_error(path.into(), e))
}

fn load_descriptor(path: &Path) -> Option<Descriptor> {
    let text = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(descriptor) => {
            debug!(path = %path.display(), "loaded cached descriptor");
            Some(descriptor)
        }
        Err(e) => {
            warn!(path = %path.display(), "descriptor cache unreadable, rebuilding: {e}");
            None
        }
    }
}

/// Whether any packet file hashes to the given checkpoint.
fn checkpoint_exists(files: &[PathBuf], hash: &str) -> Result<bool> {
    for path in files {
        if hash_bytes(&read_raw(path)?) == hash {
            return Ok(true);
        }
    }
    Ok(false)
}

fn persist_descriptor(path: &Path, descriptor: &Descriptor) -> Result<()> {
    let json = serde_json::to_string(descriptor)
        .map_err(|e| ReplayError::descriptor_error(path.into(), e))?;
    fs::write(path, json).map_err(|e| ReplayError::descriptor_error(path.into(), e))?;
    debug!(path = %path.display(), "persisted descriptor");
    Ok(())
}

/// Reverse scan locating the three race boundaries.
///
/// Walking backward from the end: the first finished-state telemetry packet
/// is the race end, the first racing-state packet before it the race
/// finish. Continuing past the green flag, the scan runs while the session
/// stays in-race and in-game; the last packet of that run (the earliest in
/// forward order) is the race start. Restarted sessions are handled
/// naturally, since the scan stops at the first packet outside the final
/// run.
fn build_descriptor(files: &[PathBuf]) -> Result<Descriptor> {
    debug!(packets = files.len(), "building descriptor");
    let mut rev = files.iter().rev();

    let race_end = seek_telemetry_rev(&mut rev, |race, _, _| race == states::RACE_FINISHED)?
        .ok_or(ReplayError::MissingRaceBoundary { state: "race finished" })?;

    let race_finish = seek_telemetry_rev(&mut rev, |race, _, _| race == states::RACE_RACING)?
        .ok_or(ReplayError::MissingRaceBoundary { state: "racing" })?;

    let green_flag = seek_telemetry_rev(&mut rev, |race, _, _| race <= states::RACE_NOT_STARTED)?
        .ok_or(ReplayError::MissingRaceBoundary { state: "pre-green" })?;

    // Back up to the first packet of this pre-green run. Non-telemetry
    // packets inside the run can become the checkpoint; the forward pass
    // only matches raw bytes, so that is fine.
    let mut race_start = green_flag;
    for path in rev {
        let data = read_raw(path)?;
        let packet = Packet::decode(&data)?;
        if let Packet::Telemetry(t) = &packet {
            if t.session_state() != states::SESSION_RACE
                || t.game_state() != states::GAME_INGAME_PLAYING
            {
                break;
            }
        }
        race_start = packet.data_hash().to_string();
    }

    Ok(Descriptor { race_start, race_finish, race_end })
}

/// Advance a reverse file iterator to the next telemetry packet satisfying
/// the predicate over (race state, session state, game state); returns its
/// content hash.
fn seek_telemetry_rev<'a>(
    rev: &mut impl Iterator<Item = &'a PathBuf>,
    predicate: impl Fn(u8, u8, u8) -> bool,
) -> Result<Option<String>> {
    for path in rev {
        let data = read_raw(path)?;
        let packet = Packet::decode(&data)?;
        if let Packet::Telemetry(t) = &packet {
            if predicate(t.race_state(), t.session_state(), t.game_state()) {
                return Ok(Some(packet.data_hash().to_string()));
            }
        }
    }
    Ok(None)
}

#[derive(Debug)]
enum SkipPhase {
    /// Discard everything up to and including the race-start checkpoint.
    SeekStart { hash: String },
    /// Discard telemetry packets until grid positions are populated.
    /// Roster packets pass through.
    SeekPopulated,
    Pass,
}

/// Forward cursor over an archive's decoded packets.
///
/// The cursor is single-pass but supports bounded lookahead: [`peek`]
/// decodes ahead into an internal buffer that [`next_packet`] drains before
/// touching the file list again, so a peek never disturbs later reads.
///
/// [`peek`]: PacketCursor::peek
/// [`next_packet`]: PacketCursor::next_packet
#[derive(Debug)]
pub struct PacketCursor {
    files: VecDeque<PathBuf>,
    buffered: VecDeque<Packet>,
    phase: SkipPhase,
}

impl PacketCursor {
    /// Next decoded packet, or `Ok(None)` once the archive is exhausted.
    /// Exhaustion is the normal termination signal, not an error.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        if let Some(packet) = self.buffered.pop_front() {
            return Ok(Some(packet));
        }
        self.read_decoded()
    }

    /// Packet `n` positions ahead of the cursor without consuming anything.
    pub fn peek(&mut self, n: usize) -> Result<Option<&Packet>> {
        while self.buffered.len() <= n {
            match self.read_decoded()? {
                Some(packet) => self.buffered.push_back(packet),
                None => return Ok(None),
            }
        }
        Ok(self.buffered.get(n))
    }

    fn read_decoded(&mut self) -> Result<Option<Packet>> {
        loop {
            let Some(path) = self.files.pop_front() else {
                return Ok(None);
            };
            let data = read_raw(&path)?;

            match &self.phase {
                SkipPhase::SeekStart { hash } => {
                    if hash_bytes(&data) == *hash {
                        trace!(file = %path.display(), "reached race-start checkpoint");
                        self.phase = SkipPhase::SeekPopulated;
                    }
                }
                SkipPhase::SeekPopulated => {
                    let packet = Packet::decode(&data)?;
                    if let Packet::Telemetry(t) = &packet {
                        if !t.has_populated_positions() {
                            continue;
                        }
                        self.phase = SkipPhase::Pass;
                    }
                    return Ok(Some(packet));
                }
                SkipPhase::Pass => return Packet::decode(&data).map(Some),
            }
        }
    }
}
