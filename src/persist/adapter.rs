//! The debounced snapshot writer and startup restoration.

use crate::tree::overlap;
use crate::types::{PersistPolicy, Timestamp};
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use serde_json::Value;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::backend::StorageBackend;

/// Suffix for the snapshot record key.
const STATE_SUFFIX: &str = "__state";

/// Suffix for the expiry record key.
const EXPIRY_SUFFIX: &str = "__expiry";

/// A snapshot queued for writing.
struct Snapshot {
    state: Value,
    expires: Option<Timestamp>,
}

enum Command {
    /// Replace the pending snapshot; the debounce window restarts.
    Write(Snapshot),
    /// Write any pending snapshot now and acknowledge.
    Flush(Sender<()>),
}

/// Debounced, expiry-aware writer of masked state snapshots.
///
/// Scheduling never blocks on storage: snapshots go to a writer thread that
/// coalesces a burst of updates into one write of the latest snapshot,
/// fired one debounce window after the last update in the burst. Dropping
/// the adapter flushes whatever is still pending.
pub struct PersistenceAdapter {
    policy: PersistPolicy,
    ttl: Option<u64>,
    state_key: String,
    expiry_key: String,
    backend: Arc<dyn StorageBackend>,
    tx: Option<Sender<Command>>,
    writer: Option<JoinHandle<()>>,
}

impl PersistenceAdapter {
    /// Spawn the writer thread. The policy must be enabled; a store without
    /// persistence simply never constructs an adapter.
    pub fn new(
        policy: PersistPolicy,
        ttl: Option<u64>,
        debounce: Duration,
        key_prefix: &str,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        let state_key = format!("{}{}", key_prefix, STATE_SUFFIX);
        let expiry_key = format!("{}{}", key_prefix, EXPIRY_SUFFIX);

        let (tx, rx) = unbounded::<Command>();
        let writer = {
            let backend = Arc::clone(&backend);
            let state_key = state_key.clone();
            let expiry_key = expiry_key.clone();

            std::thread::spawn(move || {
                let mut pending: Option<Snapshot> = None;
                loop {
                    let command = if pending.is_some() {
                        match rx.recv_timeout(debounce) {
                            Ok(command) => command,
                            Err(RecvTimeoutError::Timeout) => {
                                if let Some(snapshot) = pending.take() {
                                    write_snapshot(&*backend, &state_key, &expiry_key, &snapshot);
                                }
                                continue;
                            }
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    } else {
                        match rx.recv() {
                            Ok(command) => command,
                            Err(_) => break,
                        }
                    };

                    match command {
                        Command::Write(snapshot) => pending = Some(snapshot),
                        Command::Flush(ack) => {
                            if let Some(snapshot) = pending.take() {
                                write_snapshot(&*backend, &state_key, &expiry_key, &snapshot);
                            }
                            let _ = ack.send(());
                        }
                    }
                }

                // Shutdown: write whatever is still pending.
                if let Some(snapshot) = pending.take() {
                    write_snapshot(&*backend, &state_key, &expiry_key, &snapshot);
                }
            })
        };

        Self {
            policy,
            ttl,
            state_key,
            expiry_key,
            backend,
            tx: Some(tx),
            writer: Some(writer),
        }
    }

    /// Filter the new state through the persistence mask and schedule a
    /// debounced write. A snapshot scheduled while one is pending
    /// supersedes it.
    pub fn schedule(&self, state: &Value) {
        let snapshot = Snapshot {
            state: overlap(state, self.policy.mask()),
            expires: self.ttl.map(Timestamp::from_now),
        };
        if let Some(tx) = &self.tx {
            let _ = tx.send(Command::Write(snapshot));
        }
    }

    /// Write any pending snapshot now and wait for the writer to finish it.
    pub fn flush(&self) {
        if let Some(tx) = &self.tx {
            let (ack_tx, ack_rx) = bounded(1);
            if tx.send(Command::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
        }
    }

    /// Read the stored snapshot, masked, if present, parseable, and
    /// unexpired. Every failure path returns `None`: restoration falls back
    /// to the in-memory initial state silently.
    pub fn load(&self) -> Option<Value> {
        let raw = match self.backend.get(&self.state_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted state");
                return None;
            }
        };

        if let Some(expiry) = self.read_expiry() {
            if expiry.is_past() {
                tracing::debug!("persisted state expired, keeping initial state");
                return None;
            }
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(stored) => Some(overlap(&stored, self.policy.mask())),
            Err(e) => {
                tracing::warn!(error = %e, "persisted state is corrupt, keeping initial state");
                None
            }
        }
    }

    fn read_expiry(&self) -> Option<Timestamp> {
        let raw = self.backend.get(&self.expiry_key).ok()??;
        raw.trim().parse::<i64>().ok().map(Timestamp)
    }
}

impl Drop for PersistenceAdapter {
    fn drop(&mut self) {
        // Disconnect; the writer flushes any pending snapshot and exits.
        self.tx.take();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

fn write_snapshot(
    backend: &dyn StorageBackend,
    state_key: &str,
    expiry_key: &str,
    snapshot: &Snapshot,
) {
    let serialized = match serde_json::to_string(&snapshot.state) {
        Ok(serialized) => serialized,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize state snapshot");
            return;
        }
    };

    if let Err(e) = backend.set(state_key, &serialized) {
        tracing::warn!(error = %e, "failed to persist state snapshot");
        return;
    }

    if let Some(expires) = snapshot.expires {
        if let Err(e) = backend.set(expiry_key, &expires.0.to_string()) {
            tracing::warn!(error = %e, "failed to persist expiry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryBackend;
    use crate::tree::InterestMask;
    use serde_json::json;

    fn adapter(
        policy: PersistPolicy,
        ttl: Option<u64>,
        debounce_ms: u64,
        backend: &Arc<MemoryBackend>,
    ) -> PersistenceAdapter {
        PersistenceAdapter::new(
            policy,
            ttl,
            Duration::from_millis(debounce_ms),
            "tidepool",
            Arc::clone(backend) as Arc<dyn StorageBackend>,
        )
    }

    #[test]
    fn test_masked_write_and_load() {
        let backend = Arc::new(MemoryBackend::new());
        let mask = InterestMask::fields(["text"]);
        let writer = adapter(PersistPolicy::Masked(mask), None, 10, &backend);

        writer.schedule(&json!({"text": "A", "data": "B"}));
        writer.flush();

        let raw = backend.get("tidepool__state").unwrap().unwrap();
        let stored: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, json!({"text": "A"}));

        assert_eq!(writer.load(), Some(json!({"text": "A"})));
        // No TTL configured, so no expiry record.
        assert_eq!(backend.get("tidepool__expiry").unwrap(), None);
    }

    #[test]
    fn test_burst_collapses_into_one_write() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = adapter(PersistPolicy::Everything, None, 100, &backend);

        for i in 0..5 {
            writer.schedule(&json!({ "n": i }));
        }
        std::thread::sleep(Duration::from_millis(400));

        assert_eq!(backend.write_count(), 1);
        let raw = backend.get("tidepool__state").unwrap().unwrap();
        assert_eq!(serde_json::from_str::<Value>(&raw).unwrap(), json!({"n": 4}));
    }

    #[test]
    fn test_ttl_writes_expiry() {
        let backend = Arc::new(MemoryBackend::new());
        let writer = adapter(PersistPolicy::Everything, Some(3600), 10, &backend);

        writer.schedule(&json!({"a": 1}));
        writer.flush();

        let expiry: i64 = backend
            .get("tidepool__expiry")
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert!(expiry > Timestamp::now().0);
        assert_eq!(writer.load(), Some(json!({"a": 1})));
    }

    #[test]
    fn test_expired_record_is_ignored() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("tidepool__state", "{\"a\":1}").unwrap();
        backend
            .set("tidepool__expiry", &(Timestamp::now().0 - 100).to_string())
            .unwrap();

        let writer = adapter(PersistPolicy::Everything, Some(60), 10, &backend);
        assert_eq!(writer.load(), None);
    }

    #[test]
    fn test_corrupt_record_is_ignored() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("tidepool__state", "not json {{{").unwrap();

        let writer = adapter(PersistPolicy::Everything, None, 10, &backend);
        assert_eq!(writer.load(), None);
    }

    #[test]
    fn test_drop_flushes_pending() {
        let backend = Arc::new(MemoryBackend::new());
        {
            let writer = adapter(PersistPolicy::Everything, None, 60_000, &backend);
            writer.schedule(&json!({"final": true}));
            // Dropped with a pending snapshot and a debounce window far in
            // the future.
        }
        assert_eq!(backend.write_count(), 1);
        let raw = backend.get("tidepool__state").unwrap().unwrap();
        assert_eq!(serde_json::from_str::<Value>(&raw).unwrap(), json!({"final": true}));
    }
}
