//! Driver identity resolution across roster re-broadcasts.
//!
//! Slot indices are transient: a mid-race roster refresh may reorder them,
//! and the same driver's name can arrive padded, truncated, or extended
//! across capture sessions. The registry maps every observed spelling to one
//! canonical identity so sector/lap history survives reindexing.
//!
//! The merging heuristic is deliberately fuzzy (longest common word prefix)
//! and can conflate two short-named drivers sharing a first token. That is
//! the documented behavior of the data this was calibrated against, so it is
//! preserved rather than tightened.

use super::driver::Driver;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct DriverRegistry {
    /// Canonical key -> every spelling merged into that identity.
    identities: BTreeMap<String, BTreeSet<String>>,
    /// Inverted alias map: any observed spelling -> canonical key.
    alias_to_canonical: HashMap<String, String>,
    /// Live drivers, keyed by canonical name.
    drivers: HashMap<String, Driver>,
    /// Drivers omitted by a later roster refresh. Kept for classification.
    dropped: HashMap<String, Driver>,
    seeded: bool,
}

/// Longest run of equal leading whitespace-separated tokens, re-joined.
fn common_word_prefix(a: &str, b: &str) -> String {
    let tokens: Vec<&str> = a
        .split_whitespace()
        .zip(b.split_whitespace())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x)
        .collect();
    tokens.join(" ")
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one complete roster snapshot into the identity map.
    ///
    /// The first snapshot seeds every name as its own canonical identity.
    /// Later snapshots merge each unseen name into the existing identity
    /// sharing the longest word prefix, re-keying the identity to the
    /// shorter prefix when needed; names sharing nothing become new
    /// identities. Feeding an identical snapshot twice is a no-op.
    pub fn absorb_roster(&mut self, names: &[String]) {
        for name in names.iter().filter(|n| !n.is_empty()) {
            if self.alias_to_canonical.contains_key(name) {
                continue;
            }
            if !self.seeded {
                self.insert_identity(name);
                continue;
            }
            match self.best_prefix_match(name) {
                Some((canonical, prefix)) => self.merge_alias(&canonical, name, &prefix),
                None => self.insert_identity(name),
            }
        }
        self.seeded = true;
    }

    fn insert_identity(&mut self, name: &str) {
        trace!(driver = name, "new driver identity");
        self.identities.entry(name.to_string()).or_default().insert(name.to_string());
        self.alias_to_canonical.insert(name.to_string(), name.to_string());
    }

    /// Canonical name sharing the longest non-empty word prefix with `name`.
    /// Ties resolve to the lexicographically smallest key, which the ordered
    /// identity map gives us for free.
    fn best_prefix_match(&self, name: &str) -> Option<(String, String)> {
        let mut best: Option<(String, String)> = None;
        for canonical in self.identities.keys() {
            let prefix = common_word_prefix(name, canonical);
            if prefix.is_empty() {
                continue;
            }
            let better = match &best {
                Some((_, best_prefix)) => prefix.len() > best_prefix.len(),
                None => true,
            };
            if better {
                best = Some((canonical.clone(), prefix));
            }
        }
        best
    }

    fn merge_alias(&mut self, canonical: &str, alias: &str, prefix: &str) {
        debug!(alias, canonical, prefix, "merging roster name into existing identity");
        let mut aliases = self.identities.remove(canonical).unwrap_or_default();
        aliases.insert(alias.to_string());

        // Re-key under the shared prefix when it is shorter than the current
        // canonical key; the prefix is the best name for what both
        // spellings agree on.
        let key =
            if prefix.len() < canonical.len() { prefix.to_string() } else { canonical.to_string() };
        if key != canonical {
            aliases.insert(canonical.to_string());
            if let Some(mut driver) = self.drivers.remove(canonical) {
                driver.rename(&key);
                self.drivers.insert(key.clone(), driver);
            }
            if let Some(mut driver) = self.dropped.remove(canonical) {
                driver.rename(&key);
                self.dropped.insert(key.clone(), driver);
            }
        }
        aliases.insert(key.clone());

        for a in &aliases {
            self.alias_to_canonical.insert(a.clone(), key.clone());
        }
        self.identities.insert(key, aliases);
    }

    /// Canonical identity for an observed spelling, if known.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.alias_to_canonical.get(name).map(String::as_str)
    }

    /// Diff a freshly resolved roster against the known drivers.
    ///
    /// Called when the participant count changes: new canonical names create
    /// Driver records, absent ones move to the dropped set (their history is
    /// needed for final classification), and surviving drivers get their
    /// slot index updated. History is keyed by identity, never by slot, so
    /// reindexing is loss-free.
    pub fn reconcile(&mut self, names_by_slot: &[String]) {
        self.absorb_roster(names_by_slot);

        let mut present: HashMap<String, usize> = HashMap::new();
        for (slot, name) in names_by_slot.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            if let Some(canonical) = self.resolve(name) {
                present.insert(canonical.to_string(), slot);
            }
        }

        let absent: Vec<String> =
            self.drivers.keys().filter(|name| !present.contains_key(*name)).cloned().collect();
        for name in absent {
            debug!(driver = %name, "driver dropped from roster");
            if let Some(driver) = self.drivers.remove(&name) {
                self.dropped.insert(name, driver);
            }
        }

        for (canonical, slot) in present {
            if let Some(driver) = self.drivers.get_mut(&canonical) {
                driver.set_index(slot);
            } else if let Some(mut driver) = self.dropped.remove(&canonical) {
                // A dropped driver re-appearing keeps their history.
                debug!(driver = %canonical, slot, "driver rejoined roster");
                driver.set_index(slot);
                self.drivers.insert(canonical, driver);
            } else {
                debug!(driver = %canonical, slot, "driver joined race");
                self.drivers.insert(canonical.clone(), Driver::new(canonical, slot));
            }
        }
    }

    pub fn driver_for_slot(&self, slot: usize) -> Option<&Driver> {
        self.drivers.values().find(|d| d.index() == slot)
    }

    pub fn driver_for_slot_mut(&mut self, slot: usize) -> Option<&mut Driver> {
        self.drivers.values_mut().find(|d| d.index() == slot)
    }

    /// Live drivers, in slot order.
    pub fn active_drivers(&self) -> Vec<&Driver> {
        let mut drivers: Vec<&Driver> = self.drivers.values().collect();
        drivers.sort_by_key(|d| d.index());
        drivers
    }

    /// Drivers no longer on the roster, in name order.
    pub fn dropped_drivers(&self) -> Vec<&Driver> {
        let mut drivers: Vec<&Driver> = self.dropped.values().collect();
        drivers.sort_by_key(|d| d.name().to_string());
        drivers
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn alias_count(&self) -> usize {
        self.alias_to_canonical.len()
    }

    /// Clear accumulated race history while keeping resolved identities.
    /// Used when the session clock resets to the not-started sentinel.
    pub fn reset_history(&mut self) {
        for driver in self.drivers.values_mut() {
            let (name, index) = (driver.name().to_string(), driver.index());
            *driver = Driver::new(name, index);
        }
        self.dropped.clear();
    }
}
