use serde::{Deserialize, Serialize};
use serde_json::Value;

use liveroom_core::StoreName;

use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

/// End-of-broadcast statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveSummary {
    /// Milliseconds
    pub total_duration: u64,
    pub total_viewers: u64,
    pub total_gifts_sent: u64,
    pub total_gift_unique_senders: u64,
    pub total_gift_coins: u64,
    pub total_likes_received: u64,
    pub total_message_sent: u64,
}

store_state! {
    pub struct LiveSummaryState / LiveSummaryPatch {
        summary_data: LiveSummary = LiveSummary::default(),
    }
}

pub struct LiveSummaryDomain;

impl StoreDomain for LiveSummaryDomain {
    const STORE: StoreName = StoreName::LiveSummary;
    const SCOPE: StoreScope = StoreScope::Room;
    const FIELDS: &'static [&'static str] = &["summaryData"];

    type State = LiveSummaryState;

    fn normalize_field(field: &str, value: &Value, patch: &mut LiveSummaryPatch) -> FieldOutcome {
        match field {
            "summaryData" => assign(&mut patch.summary_data, Some(normalize::object(field, value))),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<LiveSummaryState> {
        &stores.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, Normalized};
    use serde_json::json;

    #[test]
    fn test_partial_summary_fills_defaults() {
        let Normalized::Update(patch) = normalize::<LiveSummaryDomain>(
            "summaryData",
            &json!(r#"{"totalViewers": 12, "totalGiftCoins": 300}"#),
        ) else {
            panic!("ignored");
        };

        let summary = patch.summary_data.unwrap_or_default();
        assert_eq!(summary.total_viewers, 12);
        assert_eq!(summary.total_gift_coins, 300);
        assert_eq!(summary.total_duration, 0);
    }
}
