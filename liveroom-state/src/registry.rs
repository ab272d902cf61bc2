//! State registry
//!
//! Owns the single store of every domain and wires them to the bridge. Global
//! domains (device, audio effect, login) are bound once at construction;
//! room domains are bound per room between `enter_room` and `leave_room`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use liveroom_core::{CallBridge, Config, ListenerHandle, ListenerKey, NativeEngine, RoomId};

use crate::command::CommandGateway;
use crate::domain::{StoreDomain, StoreScope};
use crate::domains::{
    AudioEffectCommands, AudioEffectDomain, AudioEffectState, BarrageCommands, BarrageDomain,
    BarrageState, CoGuestCommands, CoGuestDomain, CoGuestState, CoHostCommands, CoHostDomain,
    CoHostState, DeviceCommands, DeviceDomain, DeviceState, GiftCommands, GiftDomain, GiftState,
    LikeCommands, LikeDomain, LikeState, LiveSummaryDomain, LiveSummaryState, LoginCommands,
    LoginDomain, LoginState, PendingApplications, SeatCommands, SeatDomain, SeatState,
};
use crate::normalize::apply_event;
use crate::store::{RoomStore, StoreKey};
use crate::view::RoomView;

/// The one store of every domain
#[derive(Clone)]
pub struct DomainStores {
    pub seat: RoomStore<SeatState>,
    pub co_guest: RoomStore<CoGuestState>,
    /// Pending optimistic seat applications; survives room teardown
    pub co_guest_applications: PendingApplications,
    pub co_host: RoomStore<CoHostState>,
    pub gift: RoomStore<GiftState>,
    pub barrage: RoomStore<BarrageState>,
    pub device: RoomStore<DeviceState>,
    pub audio_effect: RoomStore<AudioEffectState>,
    pub summary: RoomStore<LiveSummaryState>,
    pub like: RoomStore<LikeState>,
    pub login: RoomStore<LoginState>,
}

impl DomainStores {
    pub fn new() -> Self {
        Self {
            seat: RoomStore::new(SeatDomain::STORE.as_str()),
            co_guest: RoomStore::new(CoGuestDomain::STORE.as_str()),
            co_guest_applications: PendingApplications::default(),
            co_host: RoomStore::new(CoHostDomain::STORE.as_str()),
            gift: RoomStore::new(GiftDomain::STORE.as_str()),
            barrage: RoomStore::new(BarrageDomain::STORE.as_str()),
            device: RoomStore::new(DeviceDomain::STORE.as_str()),
            audio_effect: RoomStore::new(AudioEffectDomain::STORE.as_str()),
            summary: RoomStore::new(LiveSummaryDomain::STORE.as_str()),
            like: RoomStore::new(LikeDomain::STORE.as_str()),
            login: RoomStore::new(LoginDomain::STORE.as_str()),
        }
    }

    /// Drop every room-scoped snapshot of `room_id`
    fn clear_room(&self, room_id: &RoomId) {
        let key = StoreKey::Room(room_id.clone());
        self.seat.clear_state(&key);
        self.co_guest.clear_state(&key);
        self.co_guest_applications.invalidate(&key);
        self.co_host.clear_state(&key);
        self.gift.clear_state(&key);
        self.barrage.clear_state(&key);
        self.summary.clear_state(&key);
        self.like.clear_state(&key);
    }
}

impl Default for DomainStores {
    fn default() -> Self {
        Self::new()
    }
}

/// Stores, bridge bindings and command gateways for one client
pub struct StateRegistry {
    config: Config,
    bridge: Arc<CallBridge>,
    gateway: CommandGateway,
    stores: DomainStores,

    /// room_id -> bridge listeners feeding that room's stores
    room_bindings: DashMap<RoomId, Vec<ListenerHandle>>,

    global_bindings: Mutex<Vec<ListenerHandle>>,
}

impl StateRegistry {
    pub fn new(engine: Arc<dyn NativeEngine>, config: Config) -> Arc<Self> {
        let bridge = Arc::new(CallBridge::new(engine));
        let registry = Self {
            config,
            gateway: CommandGateway::new(Arc::clone(&bridge)),
            bridge,
            stores: DomainStores::new(),
            room_bindings: DashMap::new(),
            global_bindings: Mutex::new(Vec::new()),
        };

        let mut global = Vec::new();
        global.extend(registry.bind::<DeviceDomain>(&StoreKey::Global));
        global.extend(registry.bind::<AudioEffectDomain>(&StoreKey::Global));
        global.extend(registry.bind::<LoginDomain>(&StoreKey::Global));
        debug!(listeners = global.len(), "Bound global stores");
        *registry.global_bindings.lock() = global;

        Arc::new(registry)
    }

    /// Route every event of domain `D` addressed to `key` into its store
    fn bind<D: StoreDomain>(&self, key: &StoreKey) -> Vec<ListenerHandle> {
        D::FIELDS
            .iter()
            .map(|&event| {
                let listener_key = ListenerKey::for_store(D::STORE, event)
                    .in_optional_room(key.room_id())
                    .with_listener(self.config.bridge.state_listener_id.as_str());

                let stores = self.stores.clone();
                let key = key.clone();
                self.bridge.add_listener(&listener_key, move |payload| {
                    apply_event::<D>(&stores, &key, event, payload);
                })
            })
            .collect()
    }

    /// Start mirroring native state for `room_id`.
    ///
    /// Returns `false` if the room was already entered.
    pub fn enter_room(&self, room_id: &RoomId) -> bool {
        match self.room_bindings.entry(room_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                let key = StoreKey::Room(room_id.clone());
                let mut handles = Vec::new();
                handles.extend(self.bind::<SeatDomain>(&key));
                handles.extend(self.bind::<CoGuestDomain>(&key));
                handles.extend(self.bind::<CoHostDomain>(&key));
                handles.extend(self.bind::<GiftDomain>(&key));
                handles.extend(self.bind::<BarrageDomain>(&key));
                handles.extend(self.bind::<LiveSummaryDomain>(&key));
                handles.extend(self.bind::<LikeDomain>(&key));

                info!(room_id = %room_id, listeners = handles.len(), "Entered room");
                vacant.insert(handles);
                true
            }
        }
    }

    /// Stop mirroring `room_id` and drop its snapshots.
    ///
    /// Returns `false` if the room was not entered.
    pub fn leave_room(&self, room_id: &RoomId) -> bool {
        let Some((_, handles)) = self.room_bindings.remove(room_id) else {
            return false;
        };

        for handle in &handles {
            self.bridge.remove_listener(handle);
        }
        self.stores.clear_room(room_id);

        info!(room_id = %room_id, "Left room");
        true
    }

    /// Rooms currently entered, sorted
    pub fn rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self.room_bindings.iter().map(|entry| entry.key().clone()).collect();
        rooms.sort();
        rooms
    }

    pub fn is_in_room(&self, room_id: &RoomId) -> bool {
        self.room_bindings.contains_key(room_id)
    }

    /// Entry point for native events
    pub fn dispatch(&self, encoded_key: &str, payload: &Value) -> usize {
        self.bridge.dispatch(encoded_key, payload)
    }

    pub fn store<D: StoreDomain>(&self) -> &RoomStore<D::State> {
        D::store(&self.stores)
    }

    pub fn stores(&self) -> &DomainStores {
        &self.stores
    }

    /// New, inactive view over domain `D`
    pub fn view<D: StoreDomain>(&self) -> RoomView<D> {
        RoomView::new(D::store(&self.stores).clone(), Arc::clone(&self.bridge))
    }

    /// Snapshot of one room-scoped domain, or of a global one for `Global`
    pub fn snapshot<D: StoreDomain>(&self, key: &StoreKey) -> Value
    where
        D::State: serde::Serialize,
    {
        let key = match D::SCOPE {
            StoreScope::Room => key.clone(),
            StoreScope::Global => StoreKey::Global,
        };
        serde_json::to_value(&*self.store::<D>().get_state(&key)).unwrap_or(Value::Null)
    }

    /// Every room-scoped domain of `room_id`, keyed by store name
    pub fn room_snapshot(&self, room_id: &RoomId) -> Value {
        let key = StoreKey::Room(room_id.clone());
        let mut snapshot = Map::new();
        snapshot.insert(SeatDomain::STORE.to_string(), self.snapshot::<SeatDomain>(&key));
        snapshot.insert(CoGuestDomain::STORE.to_string(), self.snapshot::<CoGuestDomain>(&key));
        snapshot.insert(CoHostDomain::STORE.to_string(), self.snapshot::<CoHostDomain>(&key));
        snapshot.insert(GiftDomain::STORE.to_string(), self.snapshot::<GiftDomain>(&key));
        snapshot.insert(BarrageDomain::STORE.to_string(), self.snapshot::<BarrageDomain>(&key));
        snapshot.insert(
            LiveSummaryDomain::STORE.to_string(),
            self.snapshot::<LiveSummaryDomain>(&key),
        );
        snapshot.insert(LikeDomain::STORE.to_string(), self.snapshot::<LikeDomain>(&key));
        Value::Object(snapshot)
    }

    /// Every global domain, keyed by store name
    pub fn global_snapshot(&self) -> Value {
        let key = StoreKey::Global;
        let mut snapshot = Map::new();
        snapshot.insert(DeviceDomain::STORE.to_string(), self.snapshot::<DeviceDomain>(&key));
        snapshot.insert(
            AudioEffectDomain::STORE.to_string(),
            self.snapshot::<AudioEffectDomain>(&key),
        );
        snapshot.insert(LoginDomain::STORE.to_string(), self.snapshot::<LoginDomain>(&key));
        Value::Object(snapshot)
    }

    pub fn seat_commands(&self) -> SeatCommands {
        SeatCommands::new(self.gateway.clone())
    }

    pub fn co_guest_commands(&self) -> CoGuestCommands {
        CoGuestCommands::new(
            self.gateway.clone(),
            self.stores.co_guest.clone(),
            self.stores.co_guest_applications.clone(),
            Duration::from_secs(self.config.commands.default_apply_timeout_secs),
        )
    }

    pub fn co_host_commands(&self) -> CoHostCommands {
        CoHostCommands::new(self.gateway.clone())
    }

    pub fn gift_commands(&self) -> GiftCommands {
        GiftCommands::new(self.gateway.clone())
    }

    pub fn barrage_commands(&self) -> BarrageCommands {
        BarrageCommands::new(self.gateway.clone(), self.stores.barrage.clone())
    }

    pub fn device_commands(&self) -> DeviceCommands {
        DeviceCommands::new(self.gateway.clone())
    }

    pub fn audio_effect_commands(&self) -> AudioEffectCommands {
        AudioEffectCommands::new(self.gateway.clone())
    }

    pub fn like_commands(&self) -> LikeCommands {
        LikeCommands::new(self.gateway.clone())
    }

    pub fn login_commands(&self) -> LoginCommands {
        LoginCommands::new(self.gateway.clone())
    }

    pub fn bridge(&self) -> &Arc<CallBridge> {
        &self.bridge
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Leave every room and unbind the global stores
    pub fn shutdown(&self) {
        for room_id in self.rooms() {
            self.leave_room(&room_id);
        }

        for handle in self.global_bindings.lock().drain(..) {
            self.bridge.remove_listener(&handle);
        }

        info!("State registry shut down");
    }
}

impl std::fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRegistry")
            .field("rooms", &self.room_bindings.len())
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

static GLOBAL: RwLock<Option<Arc<StateRegistry>>> = RwLock::new(None);

/// Make `registry` the process-wide instance, returning the previous one
pub fn install(registry: Arc<StateRegistry>) -> Option<Arc<StateRegistry>> {
    GLOBAL.write().replace(registry)
}

/// The process-wide instance, if one is installed
pub fn global() -> Option<Arc<StateRegistry>> {
    GLOBAL.read().clone()
}

pub fn uninstall() -> Option<Arc<StateRegistry>> {
    GLOBAL.write().take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveroom_core::{FakeEngine, StoreName};
    use serde_json::json;

    fn registry() -> (Arc<FakeEngine>, Arc<StateRegistry>) {
        let engine = Arc::new(FakeEngine::new());
        let registry = StateRegistry::new(engine.clone(), Config::default());
        (engine, registry)
    }

    fn state_key(store: StoreName, name: &str, room: Option<&RoomId>) -> String {
        ListenerKey::for_store(store, name)
            .in_optional_room(room)
            .with_listener("liveroom-state")
            .encode()
    }

    #[test]
    fn test_global_domains_bound_at_construction() {
        let (engine, registry) = registry();
        assert!(engine.is_registered(&state_key(StoreName::Device, "cameraStatus", None)));
        assert!(engine.is_registered(&state_key(StoreName::Login, "loginStatus", None)));

        registry.dispatch(&state_key(StoreName::Device, "cameraStatus", None), &json!(1));
        assert_eq!(
            registry.store::<DeviceDomain>().get_state(&StoreKey::Global).camera_status,
            liveroom_core::codes::DeviceStatus::On
        );
    }

    #[test]
    fn test_enter_and_leave_room() {
        let (engine, registry) = registry();
        let room = RoomId::from("r1");
        let seat_key = state_key(StoreName::Seat, "seatList", Some(&room));

        assert!(registry.enter_room(&room));
        assert!(!registry.enter_room(&room));
        assert!(engine.is_registered(&seat_key));
        assert_eq!(engine.registration_count(&seat_key), 1);

        registry.dispatch(&state_key(StoreName::Like, "totalLikeCount", Some(&room)), &json!(7));
        assert_eq!(
            registry.store::<LikeDomain>().get_state(&StoreKey::Room(room.clone())).total_like_count,
            7
        );

        assert!(registry.leave_room(&room));
        assert!(!registry.leave_room(&room));
        assert!(!engine.is_registered(&seat_key));
        assert_eq!(registry.stores().like.key_count(), 0);
    }

    #[test]
    fn test_room_snapshot_lists_every_room_domain() {
        let (_engine, registry) = registry();
        let snapshot = registry.room_snapshot(&RoomId::from("r1"));

        for store in ["SeatStore", "CoGuestStore", "CoHostStore", "GiftStore", "BarrageStore", "LiveSummaryStore", "LikeStore"] {
            assert!(snapshot.get(store).is_some(), "{store} missing");
        }
        assert_eq!(snapshot["CoHostStore"]["coHostStatus"], json!(0));
        assert_eq!(registry.global_snapshot()["DeviceStore"]["isFrontCamera"], json!(true));
    }

    #[test]
    fn test_shutdown_unbinds_everything() {
        let (engine, registry) = registry();
        registry.enter_room(&RoomId::from("r1"));
        registry.enter_room(&RoomId::from("r2"));

        registry.shutdown();
        assert!(registry.rooms().is_empty());
        assert!(engine.registered_keys().is_empty());
    }

    #[test]
    fn test_global_slot() {
        let (_engine, registry) = registry();
        install(Arc::clone(&registry));
        assert!(global().is_some_and(|installed| Arc::ptr_eq(&installed, &registry)));
        assert!(uninstall().is_some());
        assert!(global().is_none());
    }
}
