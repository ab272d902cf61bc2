//! Native call bridge
//!
//! The only channel between this layer and the native engine. Outbound, it
//! forwards commands. Inbound, it keeps a reference-counted listener table:
//! any number of local listeners may share one listener key, and the native
//! side sees exactly one registration per distinct key (registered on the
//! 0 -> 1 transition, removed on 1 -> 0).

mod engine;
mod fake;

pub use engine::{NativeEngine, NativeResponse, TransportError};
pub use fake::{FakeEngine, RecordedCall};

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::listener_key::ListenerKey;

/// Callback invoked with the raw payload of a native event
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle for one `add_listener` registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    key: String,
    id: u64,
}

impl ListenerHandle {
    /// Encoded listener key this handle is registered under
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

struct ListenerEntry {
    id: u64,
    callback: EventCallback,
}

/// Bridge between in-process listeners/commands and the native engine
pub struct CallBridge {
    engine: Arc<dyn NativeEngine>,

    /// Encoded listener key -> local listeners, in registration order
    listeners: Mutex<HashMap<String, Vec<ListenerEntry>>>,

    next_listener_id: AtomicU64,
}

impl CallBridge {
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self {
            engine,
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for events addressed to `key`.
    ///
    /// Every registration receives every matching event. The native engine
    /// is only told about the key when it gains its first local listener.
    pub fn add_listener<F>(&self, key: &ListenerKey, callback: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let encoded = key.encode();
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);

        let count = {
            let mut listeners = self.listeners.lock();
            let entries = listeners.entry(encoded.clone()).or_default();
            entries.push(ListenerEntry {
                id,
                callback: Arc::new(callback),
            });
            entries.len()
        };

        // The engine may deliver the current value from inside registration
        if count == 1 {
            self.engine.add_native_listener(&encoded);
            debug!(key = %encoded, "Registered native listener");
        }

        trace!(key = %encoded, listener_id = id, count, "Listener added");

        ListenerHandle { key: encoded, id }
    }

    /// Remove the registration behind `handle`.
    ///
    /// Other listeners on the same key keep receiving events. Returns `false`
    /// if the handle was already removed.
    pub fn remove_listener(&self, handle: &ListenerHandle) -> bool {
        let now_empty = {
            let mut listeners = self.listeners.lock();
            let Some(entries) = listeners.get_mut(&handle.key) else {
                return false;
            };

            let before = entries.len();
            entries.retain(|entry| entry.id != handle.id);
            if entries.len() == before {
                return false;
            }

            let now_empty = entries.is_empty();
            if now_empty {
                listeners.remove(&handle.key);
            }
            now_empty
        };

        if now_empty {
            self.engine.remove_native_listener(&handle.key);
            debug!(key = %handle.key, "Removed native listener");
        }

        true
    }

    /// Remove every local listener registered under `key`.
    ///
    /// Returns how many were removed.
    pub fn remove_all(&self, key: &ListenerKey) -> usize {
        let encoded = key.encode();
        let removed = self.listeners.lock().remove(&encoded).map_or(0, |entries| entries.len());

        if removed > 0 {
            self.engine.remove_native_listener(&encoded);
            debug!(key = %encoded, removed, "Removed all listeners for key");
        }

        removed
    }

    /// Deliver a native event to every listener registered under `key`.
    ///
    /// Listeners are collected before delivery, so a callback may add or
    /// remove listeners (including itself) while the event is in flight. A
    /// panicking callback is logged and does not stop delivery to the rest.
    pub fn dispatch(&self, key: &str, payload: &Value) -> usize {
        let callbacks: Vec<EventCallback> = {
            let listeners = self.listeners.lock();
            match listeners.get(key) {
                Some(entries) => entries.iter().map(|entry| Arc::clone(&entry.callback)).collect(),
                None => {
                    debug!(key = %key, "Dropping event for key without listeners");
                    return 0;
                }
            }
        };

        let mut delivered = 0;
        for callback in &callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(key = %key, "Event listener panicked"),
            }
        }

        delivered
    }

    /// [`CallBridge::dispatch`] addressed by structured key
    pub fn dispatch_to(&self, key: &ListenerKey, payload: &Value) -> usize {
        self.dispatch(&key.encode(), payload)
    }

    /// Invoke a native command.
    ///
    /// `Ok` carries the engine's result object, including remote failures;
    /// `Err` means the call itself did not complete.
    pub async fn invoke(&self, command: &str, params: Value) -> Result<NativeResponse, TransportError> {
        debug!(command = %command, "Invoking native command");

        let result = self.engine.call(command, params).await;
        match &result {
            Ok(response) if !response.success => debug!(
                command = %command,
                code = ?response.code,
                error = ?response.error,
                "Native command reported failure"
            ),
            Ok(_) => trace!(command = %command, "Native command succeeded"),
            Err(err) => warn!(command = %command, error = %err, "Native command transport failure"),
        }

        result
    }

    /// Number of local listeners for `key`
    #[must_use]
    pub fn listener_count(&self, key: &ListenerKey) -> usize {
        self.listeners
            .lock()
            .get(&key.encode())
            .map_or(0, Vec::len)
    }

    /// Encoded keys with at least one local listener
    #[must_use]
    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.listeners.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for CallBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallBridge")
            .field("keys", &self.listeners.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn bridge() -> (Arc<FakeEngine>, CallBridge) {
        let engine = Arc::new(FakeEngine::new());
        let bridge = CallBridge::new(engine.clone());
        (engine, bridge)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Value) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &Value| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fan_out_with_single_native_registration() {
        let (engine, bridge) = bridge();
        let key = ListenerKey::state("CoGuestStore", "connected");

        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        bridge.add_listener(&key, first_cb);
        bridge.add_listener(&key, second_cb);

        assert_eq!(engine.registration_count(&key.encode()), 1);
        assert_eq!(bridge.dispatch_to(&key, &json!({})), 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_one_keeps_the_other() {
        let (engine, bridge) = bridge();
        let key = ListenerKey::state("CoHostStore", "coHostStatus");
        let encoded = key.encode();

        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        let first_handle = bridge.add_listener(&key, first_cb);
        let second_handle = bridge.add_listener(&key, second_cb);

        assert!(bridge.remove_listener(&first_handle));
        assert!(engine.is_registered(&encoded));

        bridge.dispatch(&encoded, &json!({}));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        assert!(bridge.remove_listener(&second_handle));
        assert!(!engine.is_registered(&encoded));
        assert_eq!(engine.unregistration_count(&encoded), 1);
    }

    #[test]
    fn test_remove_listener_twice() {
        let (engine, bridge) = bridge();
        let key = ListenerKey::state("LikeStore", "totalLikeCount");
        let handle = bridge.add_listener(&key, |_| {});

        assert!(bridge.remove_listener(&handle));
        assert!(!bridge.remove_listener(&handle));
        assert_eq!(engine.unregistration_count(&key.encode()), 1);
    }

    #[test]
    fn test_remove_all() {
        let (engine, bridge) = bridge();
        let key = ListenerKey::state("GiftStore", "usableGifts");
        bridge.add_listener(&key, |_| {});
        bridge.add_listener(&key, |_| {});

        assert_eq!(bridge.remove_all(&key), 2);
        assert_eq!(bridge.listener_count(&key), 0);
        assert!(!engine.is_registered(&key.encode()));
        assert_eq!(bridge.remove_all(&key), 0);
        assert_eq!(engine.unregistration_count(&key.encode()), 1);
    }

    #[test]
    fn test_reregistration_after_last_removal() {
        let (engine, bridge) = bridge();
        let key = ListenerKey::state("SeatStore", "seatList");

        let handle = bridge.add_listener(&key, |_| {});
        bridge.remove_listener(&handle);
        bridge.add_listener(&key, |_| {});

        assert_eq!(engine.registration_count(&key.encode()), 2);
        assert!(engine.is_registered(&key.encode()));
    }

    #[test]
    fn test_dispatch_unknown_key() {
        let (_engine, bridge) = bridge();
        assert_eq!(bridge.dispatch("{}", &json!(null)), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let (_engine, bridge) = bridge();
        let key = ListenerKey::state("BarrageStore", "messageList");
        let (count, cb) = counter();

        bridge.add_listener(&key, |_| panic!("listener bug"));
        bridge.add_listener(&key, cb);

        assert_eq!(bridge.dispatch_to(&key, &json!([])), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_remove_itself_during_dispatch() {
        let (_engine, bridge) = bridge();
        let bridge = Arc::new(bridge);
        let key = ListenerKey::state("DeviceStore", "cameraStatus");

        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));
        let handle = {
            let bridge = Arc::clone(&bridge);
            let slot = Arc::clone(&slot);
            bridge.clone().add_listener(&key, move |_| {
                if let Some(handle) = slot.lock().take() {
                    bridge.remove_listener(&handle);
                }
            })
        };
        *slot.lock() = Some(handle);

        assert_eq!(bridge.dispatch_to(&key, &json!(1)), 1);
        assert_eq!(bridge.listener_count(&key), 0);
    }

    /// Engine that pushes the current value as soon as a key is registered
    struct EchoingEngine {
        bridge: Mutex<std::sync::Weak<CallBridge>>,
        removed: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl NativeEngine for EchoingEngine {
        fn add_native_listener(&self, key: &str) {
            let bridge = self.bridge.lock().upgrade();
            if let Some(bridge) = bridge {
                bridge.dispatch(key, &json!("initial"));
            }
        }

        fn remove_native_listener(&self, key: &str) {
            self.removed.lock().push(key.to_string());
            let bridge = self.bridge.lock().upgrade();
            if let Some(bridge) = bridge {
                assert_eq!(bridge.dispatch(key, &json!("late")), 0);
            }
        }

        async fn call(&self, _command: &str, _params: Value) -> Result<NativeResponse, TransportError> {
            Ok(NativeResponse::ok())
        }
    }

    #[test]
    fn test_engine_may_dispatch_during_registration() {
        let engine = Arc::new(EchoingEngine {
            bridge: Mutex::new(std::sync::Weak::new()),
            removed: Mutex::new(Vec::new()),
        });
        let bridge = Arc::new(CallBridge::new(engine.clone()));
        *engine.bridge.lock() = Arc::downgrade(&bridge);

        let key = ListenerKey::state("DeviceStore", "cameraStatus");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = bridge.add_listener(&key, move |payload| sink.lock().push(payload.clone()));

        assert_eq!(*seen.lock(), vec![json!("initial")]);

        assert!(bridge.remove_listener(&handle));
        assert_eq!(*engine.removed.lock(), vec![key.encode()]);
    }

    #[tokio::test]
    async fn test_invoke_passes_through_results() {
        let (engine, bridge) = bridge();
        engine.respond_with("exitHostConnection", NativeResponse::failure("not linked", Some(7)));

        let response = bridge.invoke("exitHostConnection", json!({})).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.code, Some(7));

        engine.set_transport_down(true);
        assert!(bridge.invoke("exitHostConnection", json!({})).await.is_err());
    }
}
