//! The undo/redo state machine.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded past/future stacks of state snapshots.
///
/// The store calls [`History::record`] with the pre-update state on every
/// regular update, and [`History::start_undo`] / [`History::start_redo`]
/// to pop the snapshot an undo/redo should restore. Neither stack ever
/// exceeds `max_entries` once an operation completes.
pub struct History {
    past: VecDeque<Arc<Value>>,
    future: VecDeque<Arc<Value>>,
    enabled: bool,
    max_entries: usize,
}

impl History {
    pub fn new(enabled: bool, max_entries: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            enabled,
            max_entries,
        }
    }

    /// Whether history is recorded at all. Disabled or zero-bounded history
    /// makes undo/redo permanent no-ops.
    fn recording(&self) -> bool {
        self.enabled && self.max_entries > 0
    }

    /// Record the pre-update state of a regular update.
    ///
    /// Starts a new timeline branch: any redo history is invalidated.
    pub fn record(&mut self, prior: Arc<Value>) {
        if !self.recording() {
            return;
        }
        self.past.push_back(prior);
        self.future.clear();
        self.enforce_bounds();
    }

    /// Begin an undo: pops the snapshot to restore and files the current
    /// state for redo. Returns `None` when there is nothing to undo.
    pub fn start_undo(&mut self, current: Arc<Value>) -> Option<Arc<Value>> {
        if !self.recording() {
            return None;
        }
        let restored = self.past.pop_back()?;
        self.future.push_front(current);
        self.enforce_bounds();
        Some(restored)
    }

    /// Begin a redo: pops the snapshot to restore and files the current
    /// state back into the past. Returns `None` when there is nothing to
    /// redo.
    pub fn start_redo(&mut self, current: Arc<Value>) -> Option<Arc<Value>> {
        if !self.recording() {
            return None;
        }
        let restored = self.future.pop_front()?;
        self.past.push_back(current);
        self.enforce_bounds();
        Some(restored)
    }

    /// Runs after every history mutation: trim the past from the front
    /// (oldest entries) and the future from the back.
    fn enforce_bounds(&mut self) {
        while self.past.len() > self.max_entries {
            self.past.pop_front();
        }
        while self.future.len() > self.max_entries {
            self.future.pop_back();
        }
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }
}
