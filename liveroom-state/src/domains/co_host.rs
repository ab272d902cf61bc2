//! Co-host (host to host link) state and actions

use serde::Serialize;
use serde_json::{json, Value};

use liveroom_core::codes::CoHostStatus;
use liveroom_core::models::SeatUserInfo;
use liveroom_core::{RoomId, StoreName};

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

store_state! {
    pub struct CoHostState / CoHostPatch {
        connected: Vec<SeatUserInfo> = Vec::new(),
        invitees: Vec<SeatUserInfo> = Vec::new(),
        applicant: Option<SeatUserInfo> = None,
        candidates: Vec<SeatUserInfo> = Vec::new(),
        co_host_status: CoHostStatus = CoHostStatus::Disconnected,
    }
}

/// Link status as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoHostUiStatus {
    Disconnected,
    Requesting,
    Connected,
}

impl CoHostState {
    /// Connected needs both the native status and at least one linked host;
    /// otherwise any pending request in either direction reads as requesting.
    pub fn ui_status(&self) -> CoHostUiStatus {
        if self.co_host_status == CoHostStatus::Connected && !self.connected.is_empty() {
            CoHostUiStatus::Connected
        } else if !self.invitees.is_empty() || self.applicant.is_some() {
            CoHostUiStatus::Requesting
        } else {
            CoHostUiStatus::Disconnected
        }
    }
}

pub struct CoHostDomain;

impl StoreDomain for CoHostDomain {
    const STORE: StoreName = StoreName::CoHost;
    const SCOPE: StoreScope = StoreScope::Room;
    const FIELDS: &'static [&'static str] =
        &["connected", "invitees", "applicant", "candidates", "coHostStatus"];

    type State = CoHostState;

    fn normalize_field(field: &str, value: &Value, patch: &mut CoHostPatch) -> FieldOutcome {
        match field {
            "connected" => assign(&mut patch.connected, Some(normalize::list(field, value))),
            "invitees" => assign(&mut patch.invitees, Some(normalize::list(field, value))),
            "applicant" => assign(&mut patch.applicant, Some(normalize::optional_object(field, value))),
            "candidates" => assign(&mut patch.candidates, Some(normalize::list(field, value))),
            "coHostStatus" => assign(&mut patch.co_host_status, normalize::code(field, value)),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<CoHostState> {
        &stores.co_host
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHostConnectionParams {
    #[serde(rename = "liveID")]
    pub live_id: Option<RoomId>,
    #[serde(rename = "targetHostLiveID")]
    pub target_host_live_id: Option<RoomId>,
    pub layout_template: Option<i64>,
    /// Seconds
    pub timeout: Option<u64>,
    pub extension_info: Option<String>,
}

const REQUEST_HOST_CONNECTION: CommandSpec =
    CommandSpec::new("requestHostConnection").require(&["liveID", "targetHostLiveID"]);
const CANCEL_HOST_CONNECTION: CommandSpec =
    CommandSpec::new("cancelHostConnection").require(&["liveID", "toHostLiveID"]);
const ACCEPT_HOST_CONNECTION: CommandSpec =
    CommandSpec::new("acceptHostConnection").require(&["liveID", "fromHostLiveID"]);
const REJECT_HOST_CONNECTION: CommandSpec =
    CommandSpec::new("rejectHostConnection").require(&["liveID", "fromHostLiveID"]);
const EXIT_HOST_CONNECTION: CommandSpec =
    CommandSpec::new("exitHostConnection").require(&["liveID"]);

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Co-host actions
#[derive(Debug, Clone)]
pub struct CoHostCommands {
    gateway: CommandGateway,
}

impl CoHostCommands {
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    pub async fn request_host_connection(&self, params: RequestHostConnectionParams, callbacks: Callbacks) {
        let params = RequestHostConnectionParams {
            timeout: Some(params.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)),
            ..params
        };
        self.gateway.dispatch(&REQUEST_HOST_CONNECTION, &params, callbacks).await;
    }

    pub async fn cancel_host_connection(&self, live_id: &RoomId, to_host: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "toHostLiveID": to_host });
        self.gateway.dispatch(&CANCEL_HOST_CONNECTION, &params, callbacks).await;
    }

    pub async fn accept_host_connection(&self, live_id: &RoomId, from_host: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "fromHostLiveID": from_host });
        self.gateway.dispatch(&ACCEPT_HOST_CONNECTION, &params, callbacks).await;
    }

    pub async fn reject_host_connection(&self, live_id: &RoomId, from_host: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "fromHostLiveID": from_host });
        self.gateway.dispatch(&REJECT_HOST_CONNECTION, &params, callbacks).await;
    }

    pub async fn exit_host_connection(&self, live_id: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id });
        self.gateway.dispatch(&EXIT_HOST_CONNECTION, &params, callbacks).await;
    }
}
