//! Co-guest (audience on seat) state and actions
//!
//! `isApplying` is the one field this layer writes on its own: the optimistic
//! application flow sets it before the native call and takes it back when the
//! call fails or the application times out. A native `isApplying` event
//! always wins: it settles the pending application, so no later revert
//! touches the flag.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use liveroom_core::models::{LiveUserInfo, SeatUserInfo};
use liveroom_core::{RoomId, StoreName, UserId};

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore, StoreKey};

store_state! {
    pub struct CoGuestState / CoGuestPatch {
        connected: Vec<SeatUserInfo> = Vec::new(),
        invitees: Vec<LiveUserInfo> = Vec::new(),
        applicants: Vec<LiveUserInfo> = Vec::new(),
        candidates: Vec<LiveUserInfo> = Vec::new(),
        is_applying: bool = false,
    }
}

impl CoGuestState {
    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.connected.iter().any(|user| &user.user_id == user_id)
    }
}

pub struct CoGuestDomain;

impl StoreDomain for CoGuestDomain {
    const STORE: StoreName = StoreName::CoGuest;
    const SCOPE: StoreScope = StoreScope::Room;
    const FIELDS: &'static [&'static str] =
        &["connected", "invitees", "applicants", "candidates", "isApplying"];

    type State = CoGuestState;

    fn normalize_field(field: &str, value: &Value, patch: &mut CoGuestPatch) -> FieldOutcome {
        match field {
            "connected" => assign(&mut patch.connected, Some(normalize::list(field, value))),
            "invitees" => assign(&mut patch.invitees, Some(normalize::list(field, value))),
            "applicants" => assign(&mut patch.applicants, Some(normalize::list(field, value))),
            "candidates" => assign(&mut patch.candidates, Some(normalize::list(field, value))),
            "isApplying" => assign(&mut patch.is_applying, normalize::boolean(value)),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<CoGuestState> {
        &stores.co_guest
    }

    fn before_apply(stores: &DomainStores, key: &StoreKey, patch: &CoGuestPatch) {
        if patch.is_applying.is_some() && stores.co_guest_applications.invalidate(key) {
            debug!(key = %key, "Native isApplying settled the pending application");
        }
    }
}

/// Optimistic seat applications still waiting for their revert timer.
///
/// Generations come from one counter that is never reset, so a timer armed
/// before a room was left can never match an application made after it was
/// entered again.
#[derive(Debug, Clone, Default)]
pub struct PendingApplications {
    inner: Arc<PendingInner>,
}

#[derive(Debug, Default)]
struct PendingInner {
    last_generation: AtomicU64,
    pending: DashMap<StoreKey, u64>,
}

impl PendingApplications {
    /// Start a new application for `key`, superseding any pending one
    fn begin(&self, key: &StoreKey) -> u64 {
        let generation = self.inner.last_generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.pending.insert(key.clone(), generation);
        generation
    }

    /// Take the pending application if it is still `generation`
    fn settle(&self, key: &StoreKey, generation: u64) -> bool {
        self.inner
            .pending
            .remove_if(key, |_, pending| *pending == generation)
            .is_some()
    }

    /// Forget whatever is pending for `key`. Returns whether anything was.
    pub fn invalidate(&self, key: &StoreKey) -> bool {
        self.inner.pending.remove(key).is_some()
    }

    pub fn is_pending(&self, key: &StoreKey) -> bool {
        self.inner.pending.contains_key(key)
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyForSeatParams {
    #[serde(rename = "liveID")]
    pub live_id: Option<RoomId>,
    /// `-1` lets the host pick the seat
    pub seat_index: Option<i64>,
    /// Seconds; the configured default applies when unset
    pub timeout: Option<u64>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteToSeatParams {
    #[serde(rename = "liveID")]
    pub live_id: Option<RoomId>,
    #[serde(rename = "inviteeID")]
    pub invitee_id: Option<UserId>,
    pub seat_index: Option<i64>,
    pub timeout: Option<u64>,
}

/// Params of `acceptInvitation` / `rejectInvitation`
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvitationReplyParams {
    #[serde(rename = "liveID")]
    pub live_id: Option<RoomId>,
    #[serde(rename = "inviterID")]
    pub inviter_id: Option<UserId>,
}

impl InvitationReplyParams {
    pub fn new(live_id: impl Into<RoomId>, inviter_id: impl Into<UserId>) -> Self {
        Self {
            live_id: Some(live_id.into()),
            inviter_id: Some(inviter_id.into()),
        }
    }
}

const APPLY_FOR_SEAT: CommandSpec = CommandSpec::new("applyForSeat").require(&["liveID"]);
const CANCEL_APPLICATION: CommandSpec = CommandSpec::new("cancelApplication").require(&["liveID"]);
const ACCEPT_APPLICATION: CommandSpec =
    CommandSpec::new("acceptApplication").require(&["liveID", "userID"]);
const REJECT_APPLICATION: CommandSpec =
    CommandSpec::new("rejectApplication").require(&["liveID", "userID"]);
const INVITE_TO_SEAT: CommandSpec =
    CommandSpec::new("inviteToSeat").require(&["liveID", "inviteeID"]);
const CANCEL_INVITATION: CommandSpec =
    CommandSpec::new("cancelInvitation").require(&["liveID", "inviteeID"]);
const ACCEPT_INVITATION: CommandSpec =
    CommandSpec::new("acceptInvitation").require(&["liveID", "inviterID"]);
const REJECT_INVITATION: CommandSpec =
    CommandSpec::new("rejectInvitation").require(&["liveID", "inviterID"]);
const DISCONNECT: CommandSpec = CommandSpec::new("disconnect").require(&["liveID"]);

/// Co-guest actions
#[derive(Clone)]
pub struct CoGuestCommands {
    gateway: CommandGateway,
    store: RoomStore<CoGuestState>,
    applications: PendingApplications,
    default_timeout: Duration,
}

impl CoGuestCommands {
    pub fn new(
        gateway: CommandGateway,
        store: RoomStore<CoGuestState>,
        applications: PendingApplications,
        default_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            store,
            applications,
            default_timeout,
        }
    }

    fn with_timeout(&self, params: ApplyForSeatParams) -> ApplyForSeatParams {
        ApplyForSeatParams {
            seat_index: Some(params.seat_index.unwrap_or(-1)),
            timeout: Some(params.timeout.unwrap_or(self.default_timeout.as_secs())),
            ..params
        }
    }

    /// Ask the host for a seat. Leaves the store untouched.
    pub async fn apply_for_seat(&self, params: ApplyForSeatParams, callbacks: Callbacks) {
        let params = self.with_timeout(params);
        self.gateway.dispatch(&APPLY_FOR_SEAT, &params, callbacks).await;
    }

    /// Ask the host for a seat in `live_id` and show `isApplying` right away.
    ///
    /// The flag is cleared again if the call fails, or once the application
    /// timeout passes with neither a newer application nor a native
    /// `isApplying` event in between.
    pub async fn apply_for_seat_optimistic(
        &self,
        live_id: &RoomId,
        seat_index: Option<i64>,
        timeout: Option<u64>,
        callbacks: Callbacks,
    ) {
        let params = self.with_timeout(ApplyForSeatParams {
            live_id: Some(live_id.clone()),
            seat_index,
            timeout,
        });
        let prepared = match self.gateway.prepare(&APPLY_FOR_SEAT, &params) {
            Ok(prepared) => prepared,
            Err(err) => return callbacks.finish(Err(err)),
        };

        let key = StoreKey::Room(live_id.clone());
        let timeout = Duration::from_secs(timeout.unwrap_or(self.default_timeout.as_secs()));

        let generation = self.applications.begin(&key);
        self.store.set_state(&key, CoGuestPatch::default().is_applying(true));

        let result = self.gateway.call(&APPLY_FOR_SEAT, prepared).await;
        match &result {
            Ok(()) => self.schedule_revert(key, generation, timeout),
            Err(err) => {
                debug!(key = %key, error = %err, "Seat application failed, reverting");
                revert_application(&self.store, &self.applications, &key, generation);
            }
        }

        callbacks.finish(result);
    }

    fn schedule_revert(&self, key: StoreKey, generation: u64, timeout: Duration) {
        let store = self.store.clone();
        let applications = self.applications.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if revert_application(&store, &applications, &key, generation) {
                debug!(key = %key, "Seat application timed out");
            }
        });
    }

    /// Withdraw the local user's application; success clears `isApplying`
    pub async fn cancel_application(&self, live_id: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id });
        let result = self.gateway.execute(&CANCEL_APPLICATION, &params).await;
        if result.is_ok() {
            let key = StoreKey::Room(live_id.clone());
            self.applications.invalidate(&key);
            self.store.set_state(&key, CoGuestPatch::default().is_applying(false));
        }
        callbacks.finish(result);
    }

    pub async fn accept_application(&self, live_id: &RoomId, user_id: &UserId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "userID": user_id });
        self.gateway.dispatch(&ACCEPT_APPLICATION, &params, callbacks).await;
    }

    pub async fn reject_application(&self, live_id: &RoomId, user_id: &UserId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "userID": user_id });
        self.gateway.dispatch(&REJECT_APPLICATION, &params, callbacks).await;
    }

    pub async fn invite_to_seat(&self, params: InviteToSeatParams, callbacks: Callbacks) {
        let params = InviteToSeatParams {
            seat_index: Some(params.seat_index.unwrap_or(-1)),
            timeout: Some(params.timeout.unwrap_or(self.default_timeout.as_secs())),
            ..params
        };
        self.gateway.dispatch(&INVITE_TO_SEAT, &params, callbacks).await;
    }

    pub async fn cancel_invitation(&self, live_id: &RoomId, invitee_id: &UserId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id, "inviteeID": invitee_id });
        self.gateway.dispatch(&CANCEL_INVITATION, &params, callbacks).await;
    }

    pub async fn accept_invitation(&self, params: InvitationReplyParams, callbacks: Callbacks) {
        self.gateway.dispatch(&ACCEPT_INVITATION, &params, callbacks).await;
    }

    pub async fn reject_invitation(&self, params: InvitationReplyParams, callbacks: Callbacks) {
        self.gateway.dispatch(&REJECT_INVITATION, &params, callbacks).await;
    }

    /// Leave the seat
    pub async fn disconnect(&self, live_id: &RoomId, callbacks: Callbacks) {
        let params = json!({ "liveID": live_id });
        self.gateway.dispatch(&DISCONNECT, &params, callbacks).await;
    }
}

/// Clear `isApplying` if application `generation` is still the pending one.
///
/// Returns whether the flag was cleared.
fn revert_application(
    store: &RoomStore<CoGuestState>,
    applications: &PendingApplications,
    key: &StoreKey,
    generation: u64,
) -> bool {
    if !applications.settle(key, generation) {
        return false;
    }

    match store.peek_state(key) {
        Some(state) if state.is_applying => {
            store.set_state(key, CoGuestPatch::default().is_applying(false));
            true
        }
        _ => false,
    }
}
