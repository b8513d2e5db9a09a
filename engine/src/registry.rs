//! Source Registry - ordered, thread-safe store of damage sources and their countdowns
//!
//! Administrative threads may register and unregister sources while the tick
//! thread is scanning. A scan works on a snapshot taken under the lock, so it
//! sees each identifier at most once and may or may not observe concurrent
//! changes made after the snapshot.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::source::DamageSource;

/// Countdown returned by `ticks_remaining` for unknown identifiers
pub const ABSENT_TICKS: u64 = 1;

#[derive(Debug, Clone)]
struct RegistryEntry {
    source: Arc<DamageSource>,
    remaining_ticks: u64,
}

impl RegistryEntry {
    fn new(source: DamageSource) -> Self {
        let remaining_ticks = source.ticks_per_damage;
        Self {
            source: Arc::new(source),
            remaining_ticks,
        }
    }
}

/// One entry as seen by a tick scan
#[derive(Debug, Clone)]
pub(crate) struct ScanEntry {
    pub source: Arc<DamageSource>,
    pub remaining_ticks: u64,
}

/// Outcome of a bulk registration
#[derive(Debug, Default)]
pub struct RegisterAllReport {
    pub registered: usize,
    pub failed: Vec<(String, RegistryError)>,
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    entries: RwLock<BTreeMap<String, RegistryEntry>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single map operation; a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, RegistryEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, RegistryEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the entry for `source.identifier`, restarting its countdown
    pub fn register(&self, source: DamageSource) -> Result<(), RegistryError> {
        source.validate()?;
        let identifier = source.identifier.clone();
        let previous = self.write().insert(identifier.clone(), RegistryEntry::new(source));
        if previous.is_some() {
            debug!(source = %identifier, "replaced existing damage source");
        } else {
            debug!(source = %identifier, "registered damage source");
        }
        Ok(())
    }

    /// Register every source; an invalid one is reported and skipped
    pub fn register_all<I>(&self, sources: I) -> RegisterAllReport
    where
        I: IntoIterator<Item = DamageSource>,
    {
        let mut report = RegisterAllReport::default();
        for source in sources {
            let identifier = source.identifier.clone();
            match self.register(source) {
                Ok(()) => report.registered += 1,
                Err(e) => {
                    warn!(source = %identifier, error = %e, "skipping invalid damage source");
                    report.failed.push((identifier, e));
                }
            }
        }
        report
    }

    /// Remove the entry for `identifier`; returns whether one existed
    pub fn unregister(&self, identifier: &str) -> bool {
        let removed = self.write().remove(identifier).is_some();
        if removed {
            debug!(source = %identifier, "unregistered damage source");
        }
        removed
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn find(&self, identifier: &str) -> Option<Arc<DamageSource>> {
        self.read().get(identifier).map(|e| Arc::clone(&e.source))
    }

    /// Remaining countdown, or `ABSENT_TICKS` when the identifier is unknown.
    /// The sentinel says nothing about whether a source is due.
    pub fn ticks_remaining(&self, identifier: &str) -> u64 {
        self.read()
            .get(identifier)
            .map(|e| e.remaining_ticks)
            .unwrap_or(ABSENT_TICKS)
    }

    /// Count down by one tick. An entry already at zero is due and must be
    /// reset first; advancing it again is ignored.
    pub fn advance(&self, identifier: &str) {
        let mut entries = self.write();
        let Some(entry) = entries.get_mut(identifier) else {
            return;
        };
        if entry.remaining_ticks == 0 {
            debug!(source = %identifier, "advance on a due source ignored");
            return;
        }
        entry.remaining_ticks -= 1;
    }

    /// Restart the countdown at `ticks_per_damage`
    pub fn reset(&self, identifier: &str) {
        if let Some(entry) = self.write().get_mut(identifier) {
            entry.remaining_ticks = entry.source.ticks_per_damage;
        }
    }

    /// Toggle the enabled gate without touching the countdown
    pub fn set_enabled(&self, identifier: &str, enabled: bool) -> bool {
        let mut entries = self.write();
        let Some(entry) = entries.get_mut(identifier) else {
            return false;
        };
        if entry.source.enabled != enabled {
            let mut source = (*entry.source).clone();
            source.enabled = enabled;
            entry.source = Arc::new(source);
        }
        true
    }

    pub fn is_enabled(&self, identifier: &str) -> bool {
        self.read().get(identifier).is_some_and(|e| e.source.enabled)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered identifiers in scan order
    pub fn identifiers(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<ScanEntry> {
        self.read()
            .values()
            .map(|e| ScanEntry {
                source: Arc::clone(&e.source),
                remaining_ticks: e.remaining_ticks,
            })
            .collect()
    }
}
