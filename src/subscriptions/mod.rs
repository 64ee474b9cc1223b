//! Subscription system for selective change notification.
//!
//! Listeners register an interest mask and an observer; on every update the
//! registry intersects each mask with the applied patch and notifies only
//! the listeners whose paths were actually touched. Delivery is synchronous
//! by default, or deferred to a dispatcher thread when the update asks for
//! it.
//!
//! # Example
//!
//! ```
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//! use tidepool::subscriptions::SubscriptionManager;
//! use tidepool::tree::InterestMask;
//!
//! let manager = SubscriptionManager::new();
//! let id = manager.subscribe(
//!     Some(InterestMask::fields(["text"])),
//!     Arc::new(|state: Arc<Value>| println!("text changed: {}", state["text"])),
//! );
//!
//! let state = Arc::new(json!({"text": "new"}));
//! manager.notify(&json!({"text": "new"}), &state, false);
//! manager.unsubscribe(id);
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{Observer, SubscriptionId};
