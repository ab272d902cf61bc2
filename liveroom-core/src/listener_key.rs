//! Listener key codec
//!
//! Every native event is routed by a structured address
//! `{type, store, name, roomID, listenerID}`. The bridge keys its listener
//! table and the native registrations by the encoded text of that address,
//! so encoding must be deterministic and injective:
//!
//! - fields are always written in the same order
//! - values use JSON string escaping, so no separator can be forged
//! - absent `roomID`/`listenerID` are written as `null`, distinct from `""`

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::RoomId;
use crate::{Error, Result};

/// The only key type this layer produces
pub const STATE_KEY_TYPE: &str = "state";

/// Store domains known to the native layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreName {
    Seat,
    CoGuest,
    CoHost,
    Gift,
    Barrage,
    Device,
    AudioEffect,
    LiveSummary,
    Like,
    Login,
}

impl StoreName {
    pub const ALL: [Self; 10] = [
        Self::Seat,
        Self::CoGuest,
        Self::CoHost,
        Self::Gift,
        Self::Barrage,
        Self::Device,
        Self::AudioEffect,
        Self::LiveSummary,
        Self::Like,
        Self::Login,
    ];

    /// Wire name of the store
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seat => "SeatStore",
            Self::CoGuest => "CoGuestStore",
            Self::CoHost => "CoHostStore",
            Self::Gift => "GiftStore",
            Self::Barrage => "BarrageStore",
            Self::Device => "DeviceStore",
            Self::AudioEffect => "AudioEffectStore",
            Self::LiveSummary => "LiveSummaryStore",
            Self::Like => "LikeStore",
            Self::Login => "LoginStore",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|store| store.as_str() == name)
    }
}

impl std::fmt::Display for StoreName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical address of a native event stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    store: String,
    name: String,
    room_id: Option<RoomId>,
    listener_id: Option<String>,
}

/// Wire shape used only for decoding
#[derive(Deserialize)]
struct WireKey {
    #[serde(rename = "type")]
    kind: String,
    store: String,
    name: String,
    #[serde(rename = "roomID")]
    room_id: Option<String>,
    #[serde(rename = "listenerID")]
    listener_id: Option<String>,
}

impl ListenerKey {
    /// State key for `name` on `store`, not bound to a room or listener
    pub fn state(store: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            name: name.into(),
            room_id: None,
            listener_id: None,
        }
    }

    /// State key on one of the built-in stores
    pub fn for_store(store: StoreName, name: impl Into<String>) -> Self {
        Self::state(store.as_str(), name)
    }

    #[must_use]
    pub fn in_room(mut self, room_id: &RoomId) -> Self {
        self.room_id = Some(room_id.clone());
        self
    }

    #[must_use]
    pub fn in_optional_room(mut self, room_id: Option<&RoomId>) -> Self {
        self.room_id = room_id.cloned();
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener_id: impl Into<String>) -> Self {
        self.listener_id = Some(listener_id.into());
        self
    }

    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    #[must_use]
    pub fn listener_id(&self) -> Option<&str> {
        self.listener_id.as_deref()
    }

    /// Canonical text form, used as the bridge registration key
    #[must_use]
    pub fn encode(&self) -> String {
        let optional = |value: Option<&str>| value.map_or(Value::Null, Value::from);

        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::from(STATE_KEY_TYPE));
        fields.insert("store".to_string(), Value::from(self.store.as_str()));
        fields.insert("name".to_string(), Value::from(self.name.as_str()));
        fields.insert(
            "roomID".to_string(),
            optional(self.room_id.as_ref().map(RoomId::as_str)),
        );
        fields.insert("listenerID".to_string(), optional(self.listener_id.as_deref()));

        Value::Object(fields).to_string()
    }

    /// Parse a key produced by [`ListenerKey::encode`]
    pub fn decode(text: &str) -> Result<Self> {
        let wire: WireKey = serde_json::from_str(text)
            .map_err(|err| Error::InvalidListenerKey(format!("{text}: {err}")))?;

        if wire.kind != STATE_KEY_TYPE {
            return Err(Error::InvalidListenerKey(format!(
                "unsupported key type `{}`",
                wire.kind
            )));
        }

        Ok(Self {
            store: wire.store,
            name: wire.name,
            room_id: wire.room_id.map(RoomId::from),
            listener_id: wire.listener_id,
        })
    }
}

impl std::fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}
