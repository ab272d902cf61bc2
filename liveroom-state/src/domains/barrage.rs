//! Barrage (live chat)

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use liveroom_core::codes::{self, BarrageType};
use liveroom_core::models::LiveUserInfo;
use liveroom_core::{RoomId, StoreName};

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore, StoreKey};

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Barrage {
    #[serde(rename = "liveID", default)]
    pub live_id: Option<RoomId>,
    pub sender: LiveUserInfo,
    #[serde(default)]
    pub sequence: i64,
    #[serde(default)]
    pub timestamp_in_second: i64,
    #[serde(default, deserialize_with = "codes::lenient")]
    pub message_type: Option<BarrageType>,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub extension_info: BTreeMap<String, String>,
    #[serde(rename = "businessID", default)]
    pub business_id: String,
    #[serde(default)]
    pub data: String,
    /// Inserted locally, never sent by native
    #[serde(skip)]
    pub is_local_tip: bool,
}

impl Barrage {
    /// Text tip shown only on this client
    pub fn local_tip(live_id: &RoomId, text: impl Into<String>) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());

        Self {
            live_id: Some(live_id.clone()),
            sender: LiveUserInfo::new(""),
            sequence: 0,
            timestamp_in_second: i64::try_from(now).unwrap_or(i64::MAX),
            message_type: Some(BarrageType::Text),
            text_content: text.into(),
            extension_info: BTreeMap::new(),
            business_id: String::new(),
            data: String::new(),
            is_local_tip: true,
        }
    }
}

store_state! {
    pub struct BarrageState / BarragePatch {
        message_list: Vec<Barrage> = Vec::new(),
        allow_send_message: bool = true,
    }
}

pub struct BarrageDomain;

impl StoreDomain for BarrageDomain {
    const STORE: StoreName = StoreName::Barrage;
    const SCOPE: StoreScope = StoreScope::Room;
    const FIELDS: &'static [&'static str] = &["messageList", "allowSendMessage"];

    type State = BarrageState;

    fn normalize_field(field: &str, value: &Value, patch: &mut BarragePatch) -> FieldOutcome {
        match field {
            "messageList" => assign(&mut patch.message_list, Some(normalize::list(field, value))),
            "allowSendMessage" => assign(&mut patch.allow_send_message, normalize::boolean(value)),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<BarrageState> {
        &stores.barrage
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextMessageParams {
    #[serde(rename = "liveID")]
    pub live_id: Option<RoomId>,
    pub text: Option<String>,
    pub extension_info: Option<BTreeMap<String, String>>,
}

const SEND_TEXT_MESSAGE: CommandSpec = CommandSpec::new("sendTextMessage").require(&["liveID", "text"]);
const SEND_CUSTOM_MESSAGE: CommandSpec =
    CommandSpec::new("sendCustomMessage").require(&["liveID", "businessID", "data"]);

#[derive(Clone)]
pub struct BarrageCommands {
    gateway: CommandGateway,
    store: RoomStore<BarrageState>,
}

impl BarrageCommands {
    pub fn new(gateway: CommandGateway, store: RoomStore<BarrageState>) -> Self {
        Self { gateway, store }
    }

    pub async fn send_text_message(&self, params: SendTextMessageParams, callbacks: Callbacks) {
        self.gateway.dispatch(&SEND_TEXT_MESSAGE, &params, callbacks).await;
    }

    pub async fn send_custom_message(&self, live_id: &RoomId, business_id: &str, data: &str, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "businessID": business_id, "data": data });
        self.gateway.dispatch(&SEND_CUSTOM_MESSAGE, &params, callbacks).await;
    }

    /// Append a tip to the room's message list without telling native
    pub fn append_local_tip(&self, live_id: &RoomId, text: impl Into<String>) {
        let key = StoreKey::Room(live_id.clone());
        let mut messages = self.store.get_state(&key).message_list.clone();
        messages.push(Barrage::local_tip(live_id, text));
        self.store.set_state(&key, BarragePatch::default().message_list(messages));
    }
}
