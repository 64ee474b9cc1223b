//! # tidepool
//!
//! A reactive state store: one mutable state tree shared across many
//! independent observers, updated through partial patches, with selective
//! change notification, bounded undo/redo history, and debounced
//! persistence with expiry.
//!
//! ## Core Concepts
//!
//! - **Patches**: sparse partial updates, deep-merged onto the state tree
//! - **Interest masks**: boolean trees selecting the paths an observer (or
//!   the persistence policy) cares about
//! - **History**: bounded past/future stacks enabling undo/redo
//! - **Persistence**: debounced, expiry-aware snapshots behind an abstract
//!   key-value backend
//!
//! ## Example
//!
//! ```
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//! use tidepool::{InterestMask, Store, StoreOptions};
//!
//! let store = Store::new(
//!     json!({"text": "ABC", "data": "Useless"}),
//!     StoreOptions { undoable: true, ..Default::default() },
//! );
//!
//! let id = store.subscribe(
//!     Some(InterestMask::fields(["text"])),
//!     |state: Arc<Value>| println!("text is now {}", state["text"]),
//! );
//!
//! store.set_state(json!({"text": "New"}));
//! assert_eq!(store.state()["text"], "New");
//!
//! store.undo();
//! assert_eq!(store.state()["text"], "ABC");
//!
//! store.unsubscribe(id);
//! ```

pub mod error;
pub mod history;
pub mod persist;
pub mod store;
pub mod subscriptions;
pub mod tree;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use history::History;
pub use persist::{FileBackend, MemoryBackend, PersistenceAdapter, StorageBackend};
pub use store::Store;
pub use subscriptions::{Observer, SubscriptionId, SubscriptionManager};
pub use tree::{merge, overlap, should_update, InterestMask};
pub use types::*;
