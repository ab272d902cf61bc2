// Native engine boundary
//
// The audio/video engine lives outside this crate. It is reached only through
// this trait: listener (de)registration keyed by encoded listener keys, and an
// asynchronous command call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result object of a native command.
///
/// A remote failure is reported here (`success: false`), not as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl NativeResponse {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
            code: None,
        }
    }

    pub fn failure(error: impl Into<String>, code: Option<i64>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code,
        }
    }
}

/// The call into the native layer did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("native call `{command}` failed: {message}")]
    Failed { command: String, message: String },

    #[error("native engine unavailable")]
    Unavailable,
}

/// Native audio/video engine
#[async_trait]
pub trait NativeEngine: Send + Sync {
    /// Start dispatching events for `key` (an encoded listener key)
    fn add_native_listener(&self, key: &str);

    /// Stop dispatching events for `key`
    fn remove_native_listener(&self, key: &str);

    /// Invoke a native command
    async fn call(&self, command: &str, params: Value) -> Result<NativeResponse, TransportError>;
}
