//! Event log replay
//!
//! Each line of an event log is one native event:
//! `{"key": <listener key>, "payload": <any>}`. The key may be the encoded
//! string the engine would deliver, or the same key written as an object.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use liveroom_core::ListenerKey;
use liveroom_state::StateRegistry;

#[derive(Debug, Deserialize)]
struct ReplayEvent {
    key: Value,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Lines that reached the bridge
    pub dispatched: usize,
    /// Listener invocations across all dispatched lines
    pub delivered: usize,
    /// Lines that could not be parsed
    pub skipped: usize,
}

/// Resolve a line's key to what the registry's own bindings listen on.
///
/// Keys without a `listenerID` are attributed to the state listener.
fn resolve_key(key: &Value, state_listener_id: &str) -> Result<ListenerKey> {
    let text = match key {
        Value::String(text) => text.clone(),
        Value::Object(_) => key.to_string(),
        other => anyhow::bail!("listener key must be a string or an object, got {other}"),
    };

    let key = ListenerKey::decode(&text)?;
    if key.listener_id().is_some() {
        Ok(key)
    } else {
        Ok(key.with_listener(state_listener_id))
    }
}

/// Feed every line of `reader` into `registry`.
///
/// With `auto_enter`, rooms named by event keys are entered on first sight.
pub async fn replay<R>(registry: &StateRegistry, reader: R, auto_enter: bool) -> Result<ReplayReport>
where
    R: AsyncBufRead + Unpin,
{
    let state_listener_id = registry.config().bridge.state_listener_id.clone();
    let mut report = ReplayReport::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("failed to read event log")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = serde_json::from_str::<ReplayEvent>(line)
            .map_err(anyhow::Error::from)
            .and_then(|event| Ok((resolve_key(&event.key, &state_listener_id)?, event.payload)));

        let (key, payload) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(line = line_no, error = %err, "Skipping malformed event line");
                report.skipped += 1;
                continue;
            }
        };

        if auto_enter {
            if let Some(room_id) = key.room_id() {
                registry.enter_room(room_id);
            }
        }

        let delivered = registry.dispatch(&key.encode(), &payload);
        debug!(line = line_no, key = %key, delivered, "Replayed event");
        report.dispatched += 1;
        report.delivered += delivered;
    }

    Ok(report)
}
