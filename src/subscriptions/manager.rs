//! Subscription registry and notification dispatch.

use crate::tree::{should_update, InterestMask};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::types::{Observer, SubscriptionId};

/// A registered listener.
struct Listener {
    id: SubscriptionId,
    mask: Option<InterestMask>,
    observer: Arc<dyn Observer>,
}

/// A batch of deferred notifications: the observers that matched one update
/// and the state they should see.
struct Batch {
    targets: Vec<Arc<dyn Observer>>,
    state: Arc<Value>,
}

/// Maintains the set of active listeners and dispatches change
/// notifications.
///
/// Listeners are held in registration order and notified in that order.
/// Deferred batches are handed to a dispatcher thread, which delivers them
/// after the triggering call stack has unwound.
pub struct SubscriptionManager {
    /// Registration-order listener table.
    listeners: RwLock<Vec<Listener>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Channel into the dispatcher thread; `None` after shutdown begins.
    dispatch_tx: Option<Sender<Batch>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        let (dispatch_tx, dispatch_rx) = unbounded::<Batch>();
        let dispatcher = std::thread::spawn(move || {
            for batch in dispatch_rx {
                for observer in batch.targets {
                    observer.notify(Arc::clone(&batch.state));
                }
            }
        });

        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            dispatch_tx: Some(dispatch_tx),
            dispatcher: Some(dispatcher),
        }
    }

    /// Register a listener. Never notifies synchronously on subscribe.
    pub fn subscribe(
        &self,
        mask: Option<InterestMask>,
        observer: Arc<dyn Observer>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push(Listener { id, mask, observer });
        id
    }

    /// Remove a listener. Unknown or already-removed ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.write().retain(|listener| listener.id != id);
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Notify every listener whose mask overlaps `changes`, in registration
    /// order.
    ///
    /// The table is snapshotted before delivery and all locks are released
    /// while observers run, so observers may subscribe, unsubscribe, or
    /// update the store re-entrantly. A listener removed by an earlier
    /// observer in the same pass may still be invoked once in that pass.
    pub fn notify(&self, changes: &Value, state: &Arc<Value>, defer: bool) {
        let targets: Vec<Arc<dyn Observer>> = {
            let listeners = self.listeners.read();
            listeners
                .iter()
                .filter(|listener| should_update(listener.mask.as_ref(), changes))
                .map(|listener| Arc::clone(&listener.observer))
                .collect()
        };

        if targets.is_empty() {
            return;
        }

        if defer {
            if let Some(tx) = &self.dispatch_tx {
                let _ = tx.send(Batch {
                    targets,
                    state: Arc::clone(state),
                });
            }
        } else {
            for observer in targets {
                observer.notify(Arc::clone(state));
            }
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        // Disconnect, then let the dispatcher drain pending batches.
        self.dispatch_tx.take();
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
