use serde::Serialize;
use serde_json::Value;

use liveroom_core::codes::LoginStatus;
use liveroom_core::models::UserProfile;
use liveroom_core::{StoreName, UserId};

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

store_state! {
    pub struct LoginState / LoginPatch {
        login_user_info: Option<UserProfile> = None,
        login_status: LoginStatus = LoginStatus::Unlogin,
    }
}

impl LoginState {
    pub fn is_logged_in(&self) -> bool {
        self.login_status == LoginStatus::Logined
    }
}

pub struct LoginDomain;

impl StoreDomain for LoginDomain {
    const STORE: StoreName = StoreName::Login;
    const SCOPE: StoreScope = StoreScope::Global;
    const FIELDS: &'static [&'static str] = &["loginUserInfo", "loginStatus"];

    type State = LoginState;

    fn normalize_field(field: &str, value: &Value, patch: &mut LoginPatch) -> FieldOutcome {
        match field {
            "loginUserInfo" => assign(
                &mut patch.login_user_info,
                Some(normalize::optional_object(field, value)),
            ),
            "loginStatus" => assign(&mut patch.login_status, normalize::code(field, value)),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<LoginState> {
        &stores.login
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginParams {
    #[serde(rename = "sdkAppID")]
    pub sdk_app_id: Option<u64>,
    #[serde(rename = "userID")]
    pub user_id: Option<UserId>,
    #[serde(rename = "userSig")]
    pub user_sig: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelfInfoParams {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    #[serde(rename = "avatarURL")]
    pub avatar_url: Option<String>,
}

const LOGIN: CommandSpec = CommandSpec::new("login").require(&["sdkAppID", "userID", "userSig"]);
const LOGOUT: CommandSpec = CommandSpec::new("logout");
const SET_SELF_INFO: CommandSpec = CommandSpec::new("setSelfInfo");

#[derive(Debug, Clone)]
pub struct LoginCommands {
    gateway: CommandGateway,
}

impl LoginCommands {
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    /// `user_sig` is produced outside this layer
    pub async fn login(&self, params: LoginParams, callbacks: Callbacks) {
        self.gateway.dispatch(&LOGIN, &params, callbacks).await;
    }

    pub async fn logout(&self, callbacks: Callbacks) {
        self.gateway.dispatch(&LOGOUT, &(), callbacks).await;
    }

    /// Only the fields that are set are sent
    pub async fn set_self_info(&self, params: SelfInfoParams, callbacks: Callbacks) {
        self.gateway.dispatch(&SET_SELF_INFO, &params, callbacks).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveroom_core::{CallBridge, FakeEngine};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_login_requires_signature() {
        let engine = Arc::new(FakeEngine::new());
        let commands = LoginCommands::new(CommandGateway::new(Arc::new(CallBridge::new(engine.clone()))));

        let params = LoginParams {
            sdk_app_id: Some(1400000001),
            user_id: Some(UserId::from("u1")),
            user_sig: None,
        };
        commands.login(params, Callbacks::new()).await;
        assert_eq!(engine.call_count(), 0);

        commands
            .set_self_info(
                SelfInfoParams {
                    user_name: Some("Alice".to_string()),
                    avatar_url: None,
                },
                Callbacks::new(),
            )
            .await;
        assert_eq!(engine.calls_to("setSelfInfo"), vec![json!({ "userName": "Alice" })]);
    }

    #[test]
    fn test_login_status_and_profile() {
        use crate::normalize::{normalize, Normalized};
        use crate::store::StoreState;

        let mut state = LoginState::default();
        let Normalized::Update(patch) = normalize::<LoginDomain>(
            "loginUserInfo",
            &json!({ "loginUserInfo": { "userID": "u1", "userName": "Alice" }, "loginStatus": 1 }),
        ) else {
            panic!("ignored");
        };
        state.merge(patch);

        assert!(state.is_logged_in());
        assert_eq!(
            state.login_user_info.as_ref().map(|user| user.user_name.as_str()),
            Some("Alice")
        );
    }
}
