//! Command gateway
//!
//! Every user action goes out through [`CommandGateway`]: params are
//! serialized, required fields are checked, the native call is made, and the
//! outcome lands in exactly one of the caller's callbacks. Nothing the
//! gateway does raises into the caller.

use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

use liveroom_core::CallBridge;

/// Failure surfaced to a command's `on_error`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A required parameter was missing; no native call was made
    #[error("{command}: missing required parameter `{field}`")]
    Validation {
        command: &'static str,
        field: &'static str,
    },

    /// The native call itself did not complete
    #[error("{command}: {message}")]
    Transport {
        command: &'static str,
        message: String,
    },

    /// The native layer answered `success: false`
    #[error("{message}")]
    Remote {
        command: &'static str,
        message: String,
        code: Option<i64>,
    },
}

impl CommandError {
    /// Native error code, when the failure carried one
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Remote { code, .. } => *code,
            _ => None,
        }
    }

    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::Validation { command, .. }
            | Self::Transport { command, .. }
            | Self::Remote { command, .. } => command,
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Native command name plus the params it cannot run without
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    name: &'static str,
    required: &'static [&'static str],
}

impl CommandSpec {
    pub const fn new(name: &'static str) -> Self {
        Self { name, required: &[] }
    }

    pub const fn require(self, fields: &'static [&'static str]) -> Self {
        Self {
            name: self.name,
            required: fields,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn required(&self) -> &'static [&'static str] {
        self.required
    }

    /// Each required field must be present, non-null and not an empty string
    pub fn validate(&self, params: &Map<String, Value>) -> Result<(), CommandError> {
        for &field in self.required {
            let usable = match params.get(field) {
                None | Some(Value::Null) => false,
                Some(Value::String(text)) => !text.is_empty(),
                Some(_) => true,
            };

            if !usable {
                return Err(CommandError::Validation {
                    command: self.name,
                    field,
                });
            }
        }

        Ok(())
    }
}

type SuccessCallback = Box<dyn FnOnce() + Send>;
type ErrorCallback = Box<dyn FnOnce(CommandError) + Send>;

/// Caller's completion callbacks; at most one of them runs, at most once
#[derive(Default)]
pub struct Callbacks {
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_error(mut self, callback: impl FnOnce(CommandError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Route `result` to the matching callback
    pub fn finish(self, result: Result<(), CommandError>) {
        match result {
            Ok(()) => {
                if let Some(on_success) = self.on_success {
                    on_success();
                }
            }
            Err(err) => {
                if let Some(on_error) = self.on_error {
                    on_error(err);
                }
            }
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Uniform wrapper turning an action into a native call
#[derive(Debug, Clone)]
pub struct CommandGateway {
    bridge: Arc<CallBridge>,
}

impl CommandGateway {
    pub fn new(bridge: Arc<CallBridge>) -> Self {
        Self { bridge }
    }

    /// Serialize and validate params without calling out
    pub fn prepare<P: Serialize + ?Sized>(
        &self,
        spec: &CommandSpec,
        params: &P,
    ) -> Result<Map<String, Value>, CommandError> {
        let params = match serde_json::to_value(params) {
            Ok(Value::Object(params)) => params,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                return Err(CommandError::Transport {
                    command: spec.name(),
                    message: format!("params must be an object, got {other}"),
                })
            }
            Err(err) => {
                return Err(CommandError::Transport {
                    command: spec.name(),
                    message: format!("failed to serialize params: {err}"),
                })
            }
        };

        if let Err(err) = spec.validate(&params) {
            debug!(command = spec.name(), error = %err, "Command rejected before native call");
            return Err(err);
        }

        Ok(params)
    }

    /// Make the native call for already prepared params
    pub async fn call(&self, spec: &CommandSpec, params: Map<String, Value>) -> Result<(), CommandError> {
        let command = spec.name();
        let call = self.bridge.invoke(command, Value::Object(params));

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(response)) if response.success => Ok(()),
            Ok(Ok(response)) => Err(CommandError::Remote {
                command,
                message: response
                    .error
                    .unwrap_or_else(|| format!("{command} failed")),
                code: response.code,
            }),
            Ok(Err(err)) => Err(CommandError::Transport {
                command,
                message: err.to_string(),
            }),
            Err(_) => {
                warn!(command = %command, "Native call panicked");
                Err(CommandError::Transport {
                    command,
                    message: "native call panicked".to_string(),
                })
            }
        }
    }

    /// Validate and call, returning the outcome
    pub async fn execute<P: Serialize + ?Sized>(
        &self,
        spec: &CommandSpec,
        params: &P,
    ) -> Result<(), CommandError> {
        let params = self.prepare(spec, params)?;
        self.call(spec, params).await
    }

    /// Validate and call, routing the outcome to `callbacks`
    pub async fn dispatch<P: Serialize + ?Sized>(&self, spec: &CommandSpec, params: &P, callbacks: Callbacks) {
        callbacks.finish(self.execute(spec, params).await);
    }

    #[must_use]
    pub fn bridge(&self) -> &Arc<CallBridge> {
        &self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveroom_core::{FakeEngine, NativeResponse};
    use parking_lot::Mutex;
    use serde_json::json;

    const ACCEPT: CommandSpec = CommandSpec::new("acceptInvitation").require(&["liveID", "inviterID"]);

    fn gateway() -> (Arc<FakeEngine>, CommandGateway) {
        let engine = Arc::new(FakeEngine::new());
        let gateway = CommandGateway::new(Arc::new(CallBridge::new(engine.clone())));
        (engine, gateway)
    }

    fn recorder() -> (Arc<Mutex<Vec<Result<(), CommandError>>>>, Callbacks) {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let ok = Arc::clone(&outcomes);
        let failed = Arc::clone(&outcomes);
        let callbacks = Callbacks::new()
            .on_success(move || ok.lock().push(Ok(())))
            .on_error(move |err| failed.lock().push(Err(err)));
        (outcomes, callbacks)
    }

    #[test]
    fn test_validate_rejects_missing_null_and_empty() {
        let params = |value: Value| value.as_object().cloned().unwrap();

        assert!(ACCEPT.validate(&params(json!({ "liveID": "r1", "inviterID": "u1" }))).is_ok());
        for bad in [
            json!({ "liveID": "r1" }),
            json!({ "liveID": "r1", "inviterID": null }),
            json!({ "liveID": "r1", "inviterID": "" }),
        ] {
            assert_eq!(
                ACCEPT.validate(&params(bad)),
                Err(CommandError::Validation {
                    command: "acceptInvitation",
                    field: "inviterID"
                })
            );
        }
    }

    #[tokio::test]
    async fn test_validation_failure_skips_native_call() {
        let (engine, gateway) = gateway();
        let (outcomes, callbacks) = recorder();

        gateway.dispatch(&ACCEPT, &json!({ "liveID": "r1" }), callbacks).await;

        assert_eq!(engine.call_count(), 0);
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Err(err) if err.is_validation()));
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_message_and_code() {
        let (engine, gateway) = gateway();
        engine.respond_with("acceptInvitation", NativeResponse::failure("BUSY", Some(2)));

        let err = gateway
            .execute(&ACCEPT, &json!({ "liveID": "r1", "inviterID": "u1" }))
            .await
            .unwrap_err();

        assert_eq!(err.message(), "BUSY");
        assert_eq!(err.code(), Some(2));
        assert_eq!(err.to_string(), "BUSY");
    }

    #[tokio::test]
    async fn test_transport_failure_goes_to_on_error() {
        let (engine, gateway) = gateway();
        engine.set_transport_down(true);
        let (outcomes, callbacks) = recorder();

        gateway
            .dispatch(&ACCEPT, &json!({ "liveID": "r1", "inviterID": "u1" }), callbacks)
            .await;

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Err(err) if err.is_transport() && err.code().is_none()));
    }

    #[tokio::test]
    async fn test_success_passes_params_through() {
        let (engine, gateway) = gateway();
        let (outcomes, callbacks) = recorder();

        gateway
            .dispatch(&ACCEPT, &json!({ "liveID": "r1", "inviterID": "u1" }), callbacks)
            .await;

        assert_eq!(*outcomes.lock(), vec![Ok(())]);
        assert_eq!(
            engine.calls_to("acceptInvitation"),
            vec![json!({ "liveID": "r1", "inviterID": "u1" })]
        );
    }

    #[tokio::test]
    async fn test_unit_params_are_an_empty_object() {
        let (engine, gateway) = gateway();
        gateway.execute(&CommandSpec::new("logout"), &()).await.unwrap();
        assert_eq!(engine.calls_to("logout"), vec![json!({})]);
    }

    #[tokio::test]
    async fn test_non_object_params_are_rejected() {
        let (engine, gateway) = gateway();
        let err = gateway.execute(&CommandSpec::new("logout"), &json!([1])).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(engine.call_count(), 0);
    }
}
