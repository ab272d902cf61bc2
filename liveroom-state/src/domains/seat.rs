use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use liveroom_core::codes::MoveSeatPolicy;
use liveroom_core::{RoomId, StoreName, UserId};
use liveroom_core::models::SeatUserInfo;

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

/// One seat position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeatInfo {
    pub index: i64,
    pub is_locked: bool,
    pub user_info: Option<SeatUserInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingUser {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(default)]
    pub volume: i64,
}

store_state! {
    /// Seat layout of one room
    pub struct SeatState / SeatPatch {
        seat_list: Vec<SeatInfo> = Vec::new(),
        speaking_users: Vec<SpeakingUser> = Vec::new(),
    }
}

impl SeatState {
    /// Seat currently held by `user_id`
    pub fn seat_of(&self, user_id: &UserId) -> Option<&SeatInfo> {
        self.seat_list.iter().find(|seat| {
            seat.user_info
                .as_ref()
                .is_some_and(|user| &user.user_id == user_id)
        })
    }

    pub fn occupied_count(&self) -> usize {
        self.seat_list.iter().filter(|seat| seat.user_info.is_some()).count()
    }
}

pub struct SeatDomain;

impl StoreDomain for SeatDomain {
    const STORE: StoreName = StoreName::Seat;
    const SCOPE: StoreScope = StoreScope::Room;
    const FIELDS: &'static [&'static str] = &["seatList", "speakingUsers"];

    type State = SeatState;

    fn normalize_field(field: &str, value: &Value, patch: &mut SeatPatch) -> FieldOutcome {
        match field {
            "seatList" => assign(&mut patch.seat_list, Some(normalize::list(field, value))),
            "speakingUsers" => assign(&mut patch.speaking_users, Some(speaking_users(value))),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<SeatState> {
        &stores.seat
    }
}

/// Speaking users arrive either as a list of records or as a
/// `userID -> volume` map
fn speaking_users(value: &Value) -> Vec<SpeakingUser> {
    let map = match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(text) => serde_json::from_str::<serde_json::Map<String, Value>>(text).ok(),
        _ => None,
    };

    match map {
        Some(map) => map
            .into_iter()
            .filter_map(|(user_id, volume)| {
                Some(SpeakingUser {
                    user_id: UserId::new(user_id),
                    volume: normalize::integer(&volume)?,
                })
            })
            .collect(),
        None => normalize::list("speakingUsers", value),
    }
}

/// Which parts of a seat to lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLockParams {
    pub lock_seat: bool,
    pub lock_video: bool,
    pub lock_audio: bool,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSeatParams {
    #[serde(rename = "liveID")]
    pub live_id: Option<RoomId>,
    pub seat_index: Option<i64>,
    pub lock_params: Option<SeatLockParams>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveUserToSeatParams {
    #[serde(rename = "liveID")]
    pub live_id: Option<RoomId>,
    #[serde(rename = "userID")]
    pub user_id: Option<UserId>,
    pub target_index: Option<i64>,
    pub policy: Option<MoveSeatPolicy>,
}

const LOCK_SEAT: CommandSpec = CommandSpec::new("lockSeat").require(&["liveID", "seatIndex"]);
const UNLOCK_SEAT: CommandSpec = CommandSpec::new("unlockSeat").require(&["liveID", "seatIndex"]);
const KICK_USER_OUT_OF_SEAT: CommandSpec =
    CommandSpec::new("kickUserOutOfSeat").require(&["liveID", "userID"]);
const MOVE_USER_TO_SEAT: CommandSpec =
    CommandSpec::new("moveUserToSeat").require(&["liveID", "userID", "targetIndex"]);
const MUTE_MICROPHONE: CommandSpec = CommandSpec::new("muteMicrophone").require(&["liveID"]);
const UNMUTE_MICROPHONE: CommandSpec = CommandSpec::new("unmuteMicrophone").require(&["liveID"]);

/// Seat actions
#[derive(Debug, Clone)]
pub struct SeatCommands {
    gateway: CommandGateway,
}

impl SeatCommands {
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    pub async fn lock_seat(&self, params: LockSeatParams, callbacks: Callbacks) {
        let params = LockSeatParams {
            lock_params: Some(params.lock_params.unwrap_or_default()),
            ..params
        };
        self.gateway.dispatch(&LOCK_SEAT, &params, callbacks).await;
    }

    pub async fn unlock_seat(&self, live_id: &RoomId, seat_index: i64, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "seatIndex": seat_index });
        self.gateway.dispatch(&UNLOCK_SEAT, &params, callbacks).await;
    }

    pub async fn kick_user_out_of_seat(&self, live_id: &RoomId, user_id: &UserId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "userID": user_id });
        self.gateway.dispatch(&KICK_USER_OUT_OF_SEAT, &params, callbacks).await;
    }

    /// Missing `policy` means abort when the target seat is taken
    pub async fn move_user_to_seat(&self, params: MoveUserToSeatParams, callbacks: Callbacks) {
        let params = MoveUserToSeatParams {
            policy: Some(params.policy.unwrap_or_default()),
            ..params
        };
        self.gateway.dispatch(&MOVE_USER_TO_SEAT, &params, callbacks).await;
    }

    pub async fn mute_microphone(&self, live_id: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id });
        self.gateway.dispatch(&MUTE_MICROPHONE, &params, callbacks).await;
    }

    pub async fn unmute_microphone(&self, live_id: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id });
        self.gateway.dispatch(&UNMUTE_MICROPHONE, &params, callbacks).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, Normalized};
    use liveroom_core::{CallBridge, FakeEngine};
    use std::sync::Arc;

    #[test]
    fn test_seat_list_from_text() {
        let payload = json!(r#"[{"index":0,"isLocked":false,"userInfo":{"userID":"host"}},{"index":1,"isLocked":true}]"#);
        let Normalized::Update(patch) = normalize::<SeatDomain>("seatList", &payload) else {
            panic!("seat list ignored");
        };

        let mut state = SeatState::default();
        crate::store::StoreState::merge(&mut state, patch);
        assert_eq!(state.seat_list.len(), 2);
        assert!(state.seat_list[1].is_locked);
        assert_eq!(state.occupied_count(), 1);
        assert_eq!(state.seat_of(&UserId::from("host")).map(|seat| seat.index), Some(0));
    }

    #[test]
    fn test_speaking_users_as_map() {
        let users = speaking_users(&json!({ "u1": 40 }));
        assert_eq!(
            users,
            vec![SpeakingUser {
                user_id: UserId::from("u1"),
                volume: 40
            }]
        );

        let users = speaking_users(&json!([{ "userID": "u2", "volume": 5 }]));
        assert_eq!(users[0].user_id, UserId::from("u2"));
    }

    #[tokio::test]
    async fn test_move_user_defaults_policy_and_encodes_code() {
        let engine = Arc::new(FakeEngine::new());
        let commands = SeatCommands::new(CommandGateway::new(Arc::new(CallBridge::new(engine.clone()))));

        commands
            .move_user_to_seat(
                MoveUserToSeatParams {
                    live_id: Some(RoomId::from("r1")),
                    user_id: Some(UserId::from("u1")),
                    target_index: Some(3),
                    policy: Some(MoveSeatPolicy::SwapPosition),
                },
                Callbacks::new(),
            )
            .await;

        commands
            .lock_seat(
                LockSeatParams {
                    live_id: Some(RoomId::from("r1")),
                    seat_index: Some(2),
                    lock_params: None,
                },
                Callbacks::new(),
            )
            .await;

        assert_eq!(
            engine.calls_to("moveUserToSeat"),
            vec![json!({ "liveID": "r1", "userID": "u1", "targetIndex": 3, "policy": 2 })]
        );
        assert_eq!(
            engine.calls_to("lockSeat")[0]["lockParams"],
            json!({ "lockSeat": false, "lockVideo": false, "lockAudio": false })
        );
    }
}
