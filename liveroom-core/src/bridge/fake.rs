// In-memory engine for tests and offline tooling

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

use super::engine::{NativeEngine, NativeResponse, TransportError};

/// A native command as the engine received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: String,
    pub params: Value,
}

#[derive(Debug, Default)]
struct FakeState {
    /// Encoded key -> number of currently active native registrations
    active: HashMap<String, usize>,
    /// Encoded key -> total `add_native_listener` calls
    registrations: HashMap<String, usize>,
    /// Encoded key -> total `remove_native_listener` calls
    unregistrations: HashMap<String, usize>,
    calls: Vec<RecordedCall>,
    /// Scripted responses per command, consumed in order
    scripted: HashMap<String, VecDeque<Result<NativeResponse, TransportError>>>,
    transport_down: bool,
}

/// Engine double that records everything and answers from a script.
///
/// Unscripted commands succeed.
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next call to `command`
    pub fn respond_with(&self, command: &str, response: NativeResponse) {
        self.state
            .lock()
            .scripted
            .entry(command.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    /// Queue a transport failure for the next call to `command`
    pub fn fail_transport(&self, command: &str, message: &str) {
        self.state
            .lock()
            .scripted
            .entry(command.to_string())
            .or_default()
            .push_back(Err(TransportError::Failed {
                command: command.to_string(),
                message: message.to_string(),
            }));
    }

    /// Make every call fail with [`TransportError::Unavailable`]
    pub fn set_transport_down(&self, down: bool) {
        self.state.lock().transport_down = down;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Parameters of every call made to `command`, oldest first
    #[must_use]
    pub fn calls_to(&self, command: &str) -> Vec<Value> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.command == command)
            .map(|call| call.params.clone())
            .collect()
    }

    #[must_use]
    pub fn is_registered(&self, key: &str) -> bool {
        self.state.lock().active.get(key).copied().unwrap_or(0) > 0
    }

    #[must_use]
    pub fn registration_count(&self, key: &str) -> usize {
        self.state.lock().registrations.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn unregistration_count(&self, key: &str) -> usize {
        self.state.lock().unregistrations.get(key).copied().unwrap_or(0)
    }

    /// Keys with an active native registration
    #[must_use]
    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state
            .lock()
            .active
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl NativeEngine for FakeEngine {
    fn add_native_listener(&self, key: &str) {
        let mut state = self.state.lock();
        *state.active.entry(key.to_string()).or_insert(0) += 1;
        *state.registrations.entry(key.to_string()).or_insert(0) += 1;
    }

    fn remove_native_listener(&self, key: &str) {
        let mut state = self.state.lock();
        if let Some(count) = state.active.get_mut(key) {
            *count = count.saturating_sub(1);
        }
        *state.unregistrations.entry(key.to_string()).or_insert(0) += 1;
    }

    async fn call(&self, command: &str, params: Value) -> Result<NativeResponse, TransportError> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            command: command.to_string(),
            params,
        });

        if state.transport_down {
            return Err(TransportError::Unavailable);
        }

        state
            .scripted
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(NativeResponse::ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unscripted_calls_succeed() {
        let engine = FakeEngine::new();
        let response = engine.call("switchCamera", json!({ "isFront": true })).await;

        assert_eq!(response, Ok(NativeResponse::ok()));
        assert_eq!(engine.calls_to("switchCamera"), vec![json!({ "isFront": true })]);
    }

    #[tokio::test]
    async fn test_scripted_responses_are_consumed_in_order() {
        let engine = FakeEngine::new();
        engine.respond_with("applyForSeat", NativeResponse::failure("BUSY", Some(2)));

        let first = engine.call("applyForSeat", json!({})).await.unwrap();
        let second = engine.call("applyForSeat", json!({})).await.unwrap();

        assert!(!first.success);
        assert_eq!(first.code, Some(2));
        assert!(second.success);
    }

    #[tokio::test]
    async fn test_transport_down() {
        let engine = FakeEngine::new();
        engine.set_transport_down(true);

        let result = engine.call("logout", json!({})).await;
        assert_eq!(result, Err(TransportError::Unavailable));
        assert_eq!(engine.call_count(), 1);
    }

    #[test]
    fn test_registration_bookkeeping() {
        let engine = FakeEngine::new();
        engine.add_native_listener("k");
        assert!(engine.is_registered("k"));

        engine.remove_native_listener("k");
        assert!(!engine.is_registered("k"));
        assert_eq!(engine.registration_count("k"), 1);
        assert_eq!(engine.unregistration_count("k"), 1);
    }
}
