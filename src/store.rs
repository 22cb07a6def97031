use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch::{channel, Receiver, Sender};
use tracing::debug;

use crate::error::LoadError;

/// Load status of a single key.
///
/// Exactly one of the `loading` phase, the `loaded` phase, or the error
/// phase holds at a time; `result` is present only while `loaded` is
/// true.  Every transition replaces the whole record, so an observer
/// never sees a half-applied update.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct KeyState {
    pub loading: bool,
    pub loaded: bool,
    pub error: Option<LoadError>,
    pub result: Option<Value>,
}

struct StoreState {
    loaded: bool,
    load_state: HashMap<String, KeyState>,
    version: u64,
}

struct StoreInner {
    state: RwLock<StoreState>,
    notify: Sender<u64>,
}

/// Observable store tracking the load status of every declared key,
/// plus a global `loaded` flag covering whole batches.
///
/// One store is shared per active rendering subtree: every transition
/// guard and every batch run writes into the same instance.  Mutation
/// is synchronous; after each full-record replacement the store's
/// version is bumped and broadcast over a watch channel, so readers
/// subscribe for change notification rather than polling.
///
/// The key set is append-only.  [`clear_key`](Self::clear_key) resets a
/// record to its initial state but never removes it.
#[derive(Clone)]
pub struct LoadStateStore {
    inner: Arc<StoreInner>,
}

impl Default for LoadStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStateStore {
    /// Create a fresh store with the global flag unset and no keys.
    pub fn new() -> Self {
        let (notify, _) = channel(0);
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState {
                    loaded: false,
                    load_state: HashMap::new(),
                    version: 0,
                }),
                notify,
            }),
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut StoreState)) {
        let version = {
            let mut state = self.inner.state.write().unwrap();
            f(&mut state);
            state.version += 1;
            state.version
        };
        // No receivers is fine; subscribers may come and go.
        let _ = self.inner.notify.send(version);
    }

    /// Mark the start of a batch; the global flag drops until a batch
    /// settles again.
    pub fn begin_global_load(&self) {
        self.mutate(|state| state.loaded = false);
    }

    /// Mark a batch as settled.
    ///
    /// Callers invoke this for every settled batch, stale or not, so
    /// under overlapping triggers the flag reflects the most recently
    /// settled batch rather than the most recently triggered one.
    pub fn end_global_load(&self) {
        self.mutate(|state| state.loaded = true);
    }

    /// Put `key` into the loading phase, discarding any prior error or
    /// result.
    pub fn load(&self, key: &str) {
        self.mutate(|state| {
            state.load_state.insert(
                key.to_owned(),
                KeyState {
                    loading: true,
                    ..KeyState::default()
                },
            );
        });
    }

    /// Record a settled value for `key`.
    pub fn load_success(&self, key: &str, value: Value) {
        self.mutate(|state| {
            state.load_state.insert(
                key.to_owned(),
                KeyState {
                    loaded: true,
                    result: Some(value),
                    ..KeyState::default()
                },
            );
        });
    }

    /// Record a failure for `key`, dropping any previously stored value.
    pub fn load_fail(&self, key: &str, error: LoadError) {
        debug!(key, %error, "recording load failure");
        self.mutate(|state| {
            state.load_state.insert(
                key.to_owned(),
                KeyState {
                    error: Some(error),
                    ..KeyState::default()
                },
            );
        });
    }

    /// Reset `key` to its initial record, dropping any stored value.
    pub fn clear_key(&self, key: &str) {
        self.mutate(|state| {
            state.load_state.insert(key.to_owned(), KeyState::default());
        });
    }

    /// Current value of the global flag.
    pub fn loaded(&self) -> bool {
        self.inner.state.read().unwrap().loaded
    }

    /// Status record for `key`, if the key has ever been touched.
    pub fn key_state(&self, key: &str) -> Option<KeyState> {
        self.inner.state.read().unwrap().load_state.get(key).cloned()
    }

    /// The stored value for `key`, present only while the key is in the
    /// loaded phase.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.inner
            .state
            .read()
            .unwrap()
            .load_state
            .get(key)
            .and_then(|record| record.result.clone())
    }

    /// Number of mutations applied so far.  Strictly increasing; each
    /// store operation bumps it exactly once.
    pub fn version(&self) -> u64 {
        self.inner.state.read().unwrap().version
    }

    /// Subscribe to change notification.  The receiver observes the
    /// store version as of the latest mutation.
    pub fn subscribe(&self) -> Receiver<u64> {
        self.inner.notify.subscribe()
    }

    /// Plain-data view of the whole store, suitable for embedding in a
    /// server-rendered page after [`load_on_server`](crate::load_on_server).
    pub fn snapshot(&self) -> Value {
        let state = self.inner.state.read().unwrap();
        json!({
            "loaded": state.loaded,
            "load_state": serde_json::to_value(&state.load_state)
                .expect("key states are plain data"),
        })
    }
}
