use serde_json::{json, Value};

use liveroom_core::{RoomId, StoreName};

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

store_state! {
    pub struct LikeState / LikePatch {
        total_like_count: u64 = 0,
    }
}

pub struct LikeDomain;

impl StoreDomain for LikeDomain {
    const STORE: StoreName = StoreName::Like;
    const SCOPE: StoreScope = StoreScope::Room;
    const FIELDS: &'static [&'static str] = &["totalLikeCount"];

    type State = LikeState;

    fn normalize_field(field: &str, value: &Value, patch: &mut LikePatch) -> FieldOutcome {
        match field {
            "totalLikeCount" => assign(&mut patch.total_like_count, normalize::unsigned(value)),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<LikeState> {
        &stores.like
    }
}

const SEND_LIKE: CommandSpec = CommandSpec::new("sendLike").require(&["liveID", "count"]);

#[derive(Debug, Clone)]
pub struct LikeCommands {
    gateway: CommandGateway,
}

impl LikeCommands {
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    pub async fn send_like(&self, live_id: &RoomId, count: u32, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "count": count.max(1) });
        self.gateway.dispatch(&SEND_LIKE, &params, callbacks).await;
    }
}
