use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use liveroom_core::{RoomId, StoreName};

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Gift {
    #[serde(rename = "giftID")]
    pub gift_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "iconURL")]
    pub icon_url: String,
    #[serde(rename = "resourceURL")]
    pub resource_url: String,
    pub level: i64,
    pub coins: i64,
}

/// A tab of the gift panel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GiftCategory {
    #[serde(rename = "categoryID")]
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub gift_list: Vec<Gift>,
}

store_state! {
    pub struct GiftState / GiftPatch {
        gift_list: Vec<Gift> = Vec::new(),
        usable_gifts: Vec<GiftCategory> = Vec::new(),
    }
}

impl GiftState {
    /// Look a gift up in the flat list first, then in every category
    pub fn find_gift(&self, gift_id: &str) -> Option<&Gift> {
        self.gift_list
            .iter()
            .chain(self.usable_gifts.iter().flat_map(|category| category.gift_list.iter()))
            .find(|gift| gift.gift_id == gift_id)
    }
}

pub struct GiftDomain;

impl StoreDomain for GiftDomain {
    const STORE: StoreName = StoreName::Gift;
    const SCOPE: StoreScope = StoreScope::Room;
    const FIELDS: &'static [&'static str] = &["giftList", "usableGifts"];

    type State = GiftState;

    fn normalize_field(field: &str, value: &Value, patch: &mut GiftPatch) -> FieldOutcome {
        match field {
            "giftList" => assign(&mut patch.gift_list, Some(normalize::list(field, value))),
            "usableGifts" => assign(&mut patch.usable_gifts, Some(normalize::list(field, value))),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<GiftState> {
        &stores.gift
    }
}

const SEND_GIFT: CommandSpec = CommandSpec::new("sendGift").require(&["liveID", "giftID", "count"]);
const REFRESH_USABLE_GIFTS: CommandSpec = CommandSpec::new("refreshUsableGifts").require(&["liveID"]);

#[derive(Debug, Clone)]
pub struct GiftCommands {
    gateway: CommandGateway,
}

impl GiftCommands {
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    pub async fn send_gift(&self, live_id: &RoomId, gift_id: &str, count: u32, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "giftID": gift_id, "count": count });
        self.gateway.dispatch(&SEND_GIFT, &params, callbacks).await;
    }

    /// Ask native to push a fresh `usableGifts`
    pub async fn refresh_usable_gifts(&self, live_id: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id });
        self.gateway.dispatch(&REFRESH_USABLE_GIFTS, &params, callbacks).await;
    }
}
