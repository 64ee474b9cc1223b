//! Core types for the reactive store.

use crate::tree::InterestMask;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_secs() as i64)
    }

    /// A timestamp `secs` seconds from now.
    pub fn from_now(secs: u64) -> Self {
        Timestamp(Self::now().0 + secs as i64)
    }

    /// Whether this timestamp has already passed.
    pub fn is_past(&self) -> bool {
        *self < Self::now()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Which part of the state tree is persisted.
#[derive(Clone, Debug)]
pub enum PersistPolicy {
    /// Persistence is off.
    Disabled,
    /// Persist the full state tree.
    Everything,
    /// Persist only the paths marked in the mask.
    Masked(InterestMask),
}

impl PersistPolicy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, PersistPolicy::Disabled)
    }

    /// The mask snapshots are filtered through (`None` = no filtering).
    pub(crate) fn mask(&self) -> Option<&InterestMask> {
        match self {
            PersistPolicy::Masked(mask) => Some(mask),
            _ => None,
        }
    }
}

impl Default for PersistPolicy {
    fn default() -> Self {
        PersistPolicy::Disabled
    }
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Emit structured before/after diagnostics on every update.
    pub debug: bool,

    /// What to persist, if anything. Requires a backend to take effect.
    pub persist: PersistPolicy,

    /// Whether updates are recorded for undo/redo.
    pub undoable: bool,

    /// Max entries kept in each of the past and future stacks.
    pub max_undoable: usize,

    /// Snapshot time-to-live in seconds (`None` = no expiry).
    pub persist_ttl: Option<u64>,

    /// Debounce window for persistence writes.
    pub debounce: Duration,

    /// Storage key prefix for persisted records.
    pub persist_key: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            debug: false,
            persist: PersistPolicy::Disabled,
            undoable: false,
            max_undoable: 50,
            persist_ttl: None,
            debounce: Duration::from_millis(500),
            persist_key: "tidepool".to_string(),
        }
    }
}

/// Per-update options.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateOptions {
    /// The update replays a history snapshot (or a restored persistence
    /// record); it is not re-recorded into the past and does not clear
    /// the future.
    pub from_history: bool,

    /// Deliver notifications on the dispatcher thread after the calling
    /// stack unwinds instead of inline.
    pub defer: bool,
}

impl UpdateOptions {
    /// A history-tagged update.
    pub fn history() -> Self {
        Self {
            from_history: true,
            ..Default::default()
        }
    }

    /// An update with deferred notification delivery.
    pub fn deferred() -> Self {
        Self {
            defer: true,
            ..Default::default()
        }
    }
}

/// Store statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Undo entries currently held.
    pub past_entries: usize,
    /// Redo entries currently held.
    pub future_entries: usize,
    /// Active subscriptions.
    pub subscriptions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp(100);
        let later = Timestamp(200);
        assert!(earlier < later);
        assert!(earlier.is_past());
        assert!(!Timestamp::from_now(3600).is_past());
    }

    #[test]
    fn test_persist_policy_mask() {
        assert!(!PersistPolicy::Disabled.is_enabled());
        assert!(PersistPolicy::Everything.is_enabled());
        assert!(PersistPolicy::Everything.mask().is_none());

        let masked = PersistPolicy::Masked(InterestMask::fields(["text"]));
        assert!(masked.is_enabled());
        assert!(masked.mask().is_some());
    }
}
