//! Event normalization
//!
//! Native events arrive as untrusted JSON: sometimes an object of fields,
//! sometimes the bare value of the field named after the event, sometimes
//! either of those encoded as JSON text. [`normalize`] turns one event into at
//! most one patch and never fails; anything it cannot use is logged and
//! dropped so the dispatch loop keeps running.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use liveroom_core::WireCode;

use crate::domain::{PatchOf, StoreDomain};
use crate::registry::DomainStores;
use crate::store::StoreKey;

/// Result of normalizing one event
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<P> {
    Update(P),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Payload was text that is not valid JSON
    Undecodable,
    /// Nothing in the payload belongs to the domain
    NoRecognizedFields,
    /// Recognized fields were present but every one was dropped
    NothingApplied,
}

/// What happened to a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Applied,
    Dropped,
    Unrecognized,
}

/// Store `value` into a patch slot; `None` means the field was dropped
pub fn assign<T>(slot: &mut Option<T>, value: Option<T>) -> FieldOutcome {
    match value {
        Some(value) => {
            *slot = Some(value);
            FieldOutcome::Applied
        }
        None => FieldOutcome::Dropped,
    }
}

/// Turn one raw event into a patch for domain `D`
pub fn normalize<D: StoreDomain>(event: &str, payload: &Value) -> Normalized<PatchOf<D>> {
    let decoded;
    let value = match payload {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                decoded = value;
                &decoded
            }
            Err(err) => {
                warn!(
                    store = %D::STORE,
                    event = %event,
                    error = %err,
                    "Discarding undecodable event payload"
                );
                return Normalized::Ignored(IgnoreReason::Undecodable);
            }
        },
        other => other,
    };

    let mut patch = PatchOf::<D>::default();
    let mut recognized = 0usize;
    let mut applied = 0usize;

    let mut apply = |field: &str, value: &Value| match D::normalize_field(field, value, &mut patch) {
        FieldOutcome::Applied => {
            recognized += 1;
            applied += 1;
        }
        FieldOutcome::Dropped => recognized += 1,
        FieldOutcome::Unrecognized => {
            trace!(store = %D::STORE, field = %field, "Ignoring unrecognized field");
        }
    };

    match value {
        Value::Object(fields) if fields.keys().any(|field| D::recognizes(field)) => {
            for (field, value) in fields {
                if D::recognizes(field) {
                    apply(field, value);
                }
            }
        }
        bare if D::recognizes(event) => apply(event, bare),
        _ => {}
    }

    if recognized == 0 {
        debug!(store = %D::STORE, event = %event, "Event carries no known fields");
        return Normalized::Ignored(IgnoreReason::NoRecognizedFields);
    }

    if applied == 0 {
        return Normalized::Ignored(IgnoreReason::NothingApplied);
    }

    Normalized::Update(patch)
}

/// Normalize `payload` and apply it to the domain's store under `key` with
/// exactly one `set_state`. Returns whether the store changed.
pub fn apply_event<D: StoreDomain>(
    stores: &DomainStores,
    key: &StoreKey,
    event: &str,
    payload: &Value,
) -> bool {
    match normalize::<D>(event, payload) {
        Normalized::Update(patch) => {
            D::before_apply(stores, key, &patch);
            D::store(stores).set_state(key, patch);
            true
        }
        Normalized::Ignored(reason) => {
            debug!(
                store = %D::STORE,
                key = %key,
                event = %event,
                reason = ?reason,
                "Event ignored"
            );
            false
        }
    }
}

// Field converters. Each returns `None` when the value cannot be used, which
// callers turn into a dropped field via `assign`.

/// Code field through its forward table; unknown codes are logged
pub fn code<C: WireCode>(field: &str, value: &Value) -> Option<C> {
    let mapped = C::from_value(value);
    if mapped.is_none() {
        warn!(
            field = %field,
            table = C::TABLE,
            value = %value,
            "Dropping field with unknown code"
        );
    }
    mapped
}

/// List field from an array or JSON text; anything unusable is an empty list
pub fn list<T: DeserializeOwned>(field: &str, value: &Value) -> Vec<T> {
    let parsed = match value {
        Value::Null => return Vec::new(),
        Value::String(text) => serde_json::from_str::<Vec<T>>(text),
        other => serde_json::from_value::<Vec<T>>(other.clone()),
    };

    parsed.unwrap_or_else(|err| {
        warn!(field = %field, error = %err, "Malformed list, using empty list");
        Vec::new()
    })
}

/// Object field from an object or JSON text; anything unusable is the default
pub fn object<T: DeserializeOwned + Default>(field: &str, value: &Value) -> T {
    optional_object(field, value).unwrap_or_default()
}

/// Nullable object field; `null` and unusable values are `None`
pub fn optional_object<T: DeserializeOwned>(field: &str, value: &Value) -> Option<T> {
    let parsed = match value {
        Value::Null => return None,
        Value::String(text) => serde_json::from_str::<T>(text),
        other => serde_json::from_value::<T>(other.clone()),
    };

    match parsed {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(field = %field, error = %err, "Malformed object, using default");
            None
        }
    }
}

pub fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|n| n.fract() == 0.0).map(|n| n as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub fn unsigned(value: &Value) -> Option<u64> {
    integer(value).and_then(|n| u64::try_from(n).ok())
}

pub fn string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
