//! Subscription types.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Capability interface for change notification.
///
/// The UI-binding layer (or any other consumer) implements this and handles
/// its own subscription lifecycle; closures get a blanket implementation.
/// Observers must be shareable across threads because deferred delivery
/// runs on the dispatcher thread.
pub trait Observer: Send + Sync {
    /// Called with the post-update state when a subscribed path changed.
    fn notify(&self, state: Arc<Value>);
}

impl<F> Observer for F
where
    F: Fn(Arc<Value>) + Send + Sync,
{
    fn notify(&self, state: Arc<Value>) {
        self(state)
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}
