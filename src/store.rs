//! The reactive store tying merge, subscriptions, history, and persistence
//! together.

use crate::history::History;
use crate::persist::{PersistenceAdapter, StorageBackend};
use crate::subscriptions::{Observer, SubscriptionId, SubscriptionManager};
use crate::tree::{merge, overlap, InterestMask};
use crate::types::{StoreOptions, StoreStats, UpdateOptions};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Everything a state transition touches atomically.
struct StoreCore {
    state: Arc<Value>,
    history: History,
    last_changes: Option<Arc<Value>>,
}

/// A reactive state store.
///
/// One live state tree, updated through partial patches. Observers
/// subscribe with interest masks and are notified only when a path they
/// care about changes. Updates are recorded into bounded undo/redo history
/// and, when configured with a backend, persisted through a debounced
/// storage writer.
///
/// State is immutable-by-replacement: every update produces a new tree and
/// swaps it in, so an [`Arc`] returned by [`Store::state`] is a stable
/// read-only snapshot no later update can touch.
pub struct Store {
    core: Mutex<StoreCore>,
    subscriptions: SubscriptionManager,
    persistence: Option<PersistenceAdapter>,
    debug: bool,
}

impl Store {
    /// Create a store with no storage backend.
    ///
    /// A persistence policy in `options` is inert without a backend; use
    /// [`Store::with_backend`] to persist.
    pub fn new(initial_state: Value, options: StoreOptions) -> Self {
        Self::build(initial_state, options, None)
    }

    /// Create a store backed by durable storage.
    ///
    /// When the options enable persistence and the backend holds a valid,
    /// unexpired snapshot, the masked snapshot is merged into the initial
    /// state through the normal update pipeline before this returns. The
    /// restoration precedes any user action, so it is exempt from history
    /// recording.
    pub fn with_backend(
        initial_state: Value,
        options: StoreOptions,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self::build(initial_state, options, Some(backend))
    }

    fn build(
        initial_state: Value,
        options: StoreOptions,
        backend: Option<Arc<dyn StorageBackend>>,
    ) -> Self {
        let persistence = match backend {
            Some(backend) if options.persist.is_enabled() => Some(PersistenceAdapter::new(
                options.persist.clone(),
                options.persist_ttl,
                options.debounce,
                &options.persist_key,
                backend,
            )),
            _ => None,
        };

        let store = Self {
            core: Mutex::new(StoreCore {
                state: Arc::new(initial_state),
                history: History::new(options.undoable, options.max_undoable),
                last_changes: None,
            }),
            subscriptions: SubscriptionManager::new(),
            persistence,
            debug: options.debug,
        };

        if let Some(stored) = store.persistence.as_ref().and_then(|p| p.load()) {
            store.set_state_with(stored, UpdateOptions::history());
        }

        store
    }

    // --- Updates ---

    /// Apply a patch with default options: recorded into history, delivered
    /// synchronously.
    pub fn set_state(&self, changes: Value) {
        self.set_state_with(changes, UpdateOptions::default());
    }

    /// Apply a patch.
    ///
    /// The patch is deep-merged onto the current state (arrays replace
    /// wholesale, shape conflicts overwrite), the prior state is recorded
    /// for undo unless the update is history-tagged, matching listeners are
    /// notified, and the new state is scheduled for persistence. Never
    /// fails.
    pub fn set_state_with(&self, changes: Value, options: UpdateOptions) {
        let (changes, new_state) = {
            let mut core = self.core.lock();
            self.apply_locked(&mut core, changes, options.from_history)
        };
        self.after_update(&changes, &new_state, options.defer);
    }

    /// The state transition proper; runs under the core lock.
    fn apply_locked(
        &self,
        core: &mut StoreCore,
        changes: Value,
        from_history: bool,
    ) -> (Arc<Value>, Arc<Value>) {
        let old_state = Arc::clone(&core.state);

        let mut next = (*old_state).clone();
        merge(&mut next, &changes);
        let new_state = Arc::new(next);

        if !from_history {
            core.history.record(Arc::clone(&old_state));
        }

        core.state = Arc::clone(&new_state);
        let changes = Arc::new(changes);
        core.last_changes = Some(Arc::clone(&changes));

        if self.debug {
            tracing::debug!(
                target: "tidepool::store",
                old = %old_state,
                changes = %changes,
                new = %new_state,
                "state change"
            );
        }

        (changes, new_state)
    }

    /// Persistence scheduling and notification; runs with the core lock
    /// released so observers can re-enter the store.
    fn after_update(&self, changes: &Value, state: &Arc<Value>, defer: bool) {
        if let Some(persistence) = &self.persistence {
            persistence.schedule(state);
        }
        self.subscriptions.notify(changes, state, defer);
    }

    // --- History ---

    /// Revert to the previous state. No-op when there is nothing to undo.
    pub fn undo(&self) {
        self.time_travel(|history, current| history.start_undo(current));
    }

    /// Reapply the most recently undone state. No-op when there is nothing
    /// to redo.
    pub fn redo(&self) {
        self.time_travel(|history, current| history.start_redo(current));
    }

    /// Shared undo/redo path: pop the snapshot to restore, then replay it
    /// as a history-tagged update through the full pipeline.
    fn time_travel<F>(&self, pop: F)
    where
        F: FnOnce(&mut History, Arc<Value>) -> Option<Arc<Value>>,
    {
        let applied = {
            let mut core = self.core.lock();
            let current = Arc::clone(&core.state);
            let restored = pop(&mut core.history, current);
            restored.map(|snapshot| self.apply_locked(&mut core, (*snapshot).clone(), true))
        };

        if let Some((changes, new_state)) = applied {
            self.after_update(&changes, &new_state, false);
        }
    }

    // --- Reads ---

    /// Current state snapshot. Stable: later updates never mutate it.
    pub fn state(&self) -> Arc<Value> {
        Arc::clone(&self.core.lock().state)
    }

    /// The most recently applied patch, if any update has happened.
    pub fn last_changes(&self) -> Option<Arc<Value>> {
        self.core.lock().last_changes.clone()
    }

    /// The portion of the most recent patch that a mask cares about.
    pub fn last_changes_for(&self, mask: &InterestMask) -> Option<Value> {
        let changes = self.last_changes()?;
        Some(overlap(&changes, Some(mask)))
    }

    // --- Subscriptions ---

    /// Register an observer with an optional interest mask (`None` = every
    /// change). Never notifies synchronously on subscribe.
    pub fn subscribe(
        &self,
        mask: Option<InterestMask>,
        observer: impl Observer + 'static,
    ) -> SubscriptionId {
        self.subscriptions.subscribe(mask, Arc::new(observer))
    }

    /// Remove a subscription. Safe to call repeatedly or with an unknown
    /// id.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    // --- Persistence ---

    /// Write any pending persistence snapshot now and wait for it.
    pub fn flush(&self) {
        if let Some(persistence) = &self.persistence {
            persistence.flush();
        }
    }

    // --- Introspection ---

    /// Store statistics.
    pub fn stats(&self) -> StoreStats {
        let core = self.core.lock();
        StoreStats {
            past_entries: core.history.past_len(),
            future_entries: core.history.future_len(),
            subscriptions: self.subscriptions.subscription_count(),
        }
    }
}
