//! Room-scoped view accessor
//!
//! A `RoomView` is what a screen holds: the latest snapshot of one domain for
//! the room it is showing, delivered through a `watch` channel, plus direct
//! bridge listeners for one-shot notifications that never reach the store.

use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use liveroom_core::models::generate_id;
use liveroom_core::{CallBridge, ListenerHandle, ListenerKey};

use crate::domain::StoreDomain;
use crate::store::{RoomStore, StoreKey, Subscription};

pub struct RoomView<D: StoreDomain> {
    store: RoomStore<D::State>,
    bridge: Arc<CallBridge>,
    listener_id: String,
    key: Option<StoreKey>,
    subscription: Option<Subscription>,
    listeners: Vec<ListenerHandle>,
    state_tx: Arc<watch::Sender<Arc<D::State>>>,
    _domain: PhantomData<fn() -> D>,
}

impl<D: StoreDomain> RoomView<D> {
    pub fn new(store: RoomStore<D::State>, bridge: Arc<CallBridge>) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(D::State::default()));
        Self {
            store,
            bridge,
            listener_id: format!("view-{}", generate_id()),
            key: None,
            subscription: None,
            listeners: Vec::new(),
            state_tx: Arc::new(state_tx),
            _domain: PhantomData,
        }
    }

    /// Start following `key`, replacing whatever the view followed before.
    ///
    /// Local state is always reseeded from the store, never from what this
    /// view saw during an earlier activation.
    pub fn activate(&mut self, key: impl Into<StoreKey>) {
        self.deactivate();

        let key = key.into();
        self.state_tx.send_replace(self.store.get_state(&key));

        let tx = Arc::clone(&self.state_tx);
        self.subscription = Some(self.store.subscribe(&key, move |state| {
            tx.send_replace(Arc::clone(state));
        }));

        debug!(store = %D::STORE, key = %key, view = %self.listener_id, "View activated");
        self.key = Some(key);
    }

    /// Stop following the current key and drop pass-through listeners
    pub fn deactivate(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }

        for handle in self.listeners.drain(..) {
            self.bridge.remove_listener(&handle);
        }

        if let Some(key) = self.key.take() {
            debug!(store = %D::STORE, key = %key, view = %self.listener_id, "View deactivated");
        }
    }

    /// Latest snapshot seen by this view
    pub fn state(&self) -> Arc<D::State> {
        Arc::clone(&self.state_tx.borrow())
    }

    /// Receiver that observes every snapshot this view is given
    pub fn watch(&self) -> watch::Receiver<Arc<D::State>> {
        self.state_tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.key.is_some()
    }

    pub fn key(&self) -> Option<&StoreKey> {
        self.key.as_ref()
    }

    /// `listenerID` this view registers its pass-through listeners under
    pub fn listener_id(&self) -> &str {
        &self.listener_id
    }

    /// Listen for `event` on this view's domain and room.
    ///
    /// Returns `None` while the view is inactive.
    pub fn add_listener<F>(&mut self, event: &str, callback: F) -> Option<ListenerHandle>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let key = self.key.as_ref()?;
        let listener_key = ListenerKey::for_store(D::STORE, event)
            .in_optional_room(key.room_id())
            .with_listener(self.listener_id.as_str());

        let handle = self.bridge.add_listener(&listener_key, callback);
        self.listeners.push(handle.clone());
        Some(handle)
    }

    /// Remove a listener this view added. Handles from elsewhere are left alone.
    pub fn remove_listener(&mut self, handle: &ListenerHandle) -> bool {
        let Some(position) = self.listeners.iter().position(|kept| kept == handle) else {
            return false;
        };
        self.listeners.swap_remove(position);
        self.bridge.remove_listener(handle)
    }
}

impl<D: StoreDomain> Drop for RoomView<D> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl<D: StoreDomain> std::fmt::Debug for RoomView<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomView")
            .field("store", &D::STORE)
            .field("listener_id", &self.listener_id)
            .field("key", &self.key)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::co_guest::{CoGuestDomain, CoGuestPatch, CoGuestState};
    use liveroom_core::models::SeatUserInfo;
    use liveroom_core::{FakeEngine, RoomId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<FakeEngine>, Arc<CallBridge>, RoomStore<CoGuestState>) {
        let engine = Arc::new(FakeEngine::new());
        let bridge = Arc::new(CallBridge::new(engine.clone()));
        (engine, bridge, RoomStore::new("CoGuestStore"))
    }

    fn room(id: &str) -> StoreKey {
        StoreKey::Room(RoomId::from(id))
    }

    #[test]
    fn test_activation_seeds_and_follows() {
        let (_engine, bridge, store) = setup();
        store.set_state(&room("r1"), CoGuestPatch::default().is_applying(true));

        let mut view = RoomView::<CoGuestDomain>::new(store.clone(), bridge);
        assert!(!view.state().is_applying);

        view.activate(RoomId::from("r1"));
        assert!(view.state().is_applying);

        let receiver = view.watch();
        store.set_state(&room("r1"), CoGuestPatch::default().is_applying(false));
        assert!(!receiver.borrow().is_applying);
        assert_eq!(store.subscriber_count(&room("r1")), 1);
    }

    #[test]
    fn test_reactivation_reseeds_from_store() {
        let (_engine, bridge, store) = setup();
        let mut view = RoomView::<CoGuestDomain>::new(store.clone(), bridge);

        view.activate(RoomId::from("r1"));
        view.deactivate();
        assert_eq!(store.subscriber_count(&room("r1")), 0);

        store.set_state(
            &room("r1"),
            CoGuestPatch::default().connected(vec![SeatUserInfo::new("u1")]),
        );
        assert!(view.state().connected.is_empty());

        view.activate(RoomId::from("r1"));
        assert_eq!(view.state().connected.len(), 1);
    }

    #[test]
    fn test_switching_rooms_moves_subscription() {
        let (_engine, bridge, store) = setup();
        let mut view = RoomView::<CoGuestDomain>::new(store.clone(), bridge);

        view.activate(RoomId::from("r1"));
        view.activate(RoomId::from("r2"));

        assert_eq!(store.subscriber_count(&room("r1")), 0);
        assert_eq!(store.subscriber_count(&room("r2")), 1);
        assert_eq!(view.key(), Some(&room("r2")));
    }

    #[test]
    fn test_pass_through_listeners_follow_lifecycle() {
        let (engine, bridge, store) = setup();
        let mut view = RoomView::<CoGuestDomain>::new(store, Arc::clone(&bridge));
        assert!(view.add_listener("onKickedOffSeat", |_| {}).is_none());

        view.activate(RoomId::from("r1"));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handle = view
            .add_listener("onKickedOffSeat", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let key = ListenerKey::for_store(liveroom_core::StoreName::CoGuest, "onKickedOffSeat")
            .in_room(&RoomId::from("r1"))
            .with_listener(view.listener_id());
        assert_eq!(handle.key(), key.encode());
        bridge.dispatch_to(&key, &json!({ "reason": 1 }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(view);
        assert!(!engine.is_registered(&key.encode()));
    }

    #[test]
    fn test_foreign_handles_are_not_removed() {
        let (engine, bridge, store) = setup();
        let mut view = RoomView::<CoGuestDomain>::new(store, Arc::clone(&bridge));
        view.activate(RoomId::from("r1"));

        let other_key = ListenerKey::for_store(liveroom_core::StoreName::CoGuest, "onKickedOffSeat")
            .in_room(&RoomId::from("r1"))
            .with_listener("elsewhere");
        let foreign = bridge.add_listener(&other_key, |_| {});

        assert!(!view.remove_listener(&foreign));
        assert!(engine.is_registered(&other_key.encode()));
        assert_eq!(bridge.listener_count(&other_key), 1);

        let own = view.add_listener("onKickedOffSeat", |_| {}).unwrap();
        assert!(view.remove_listener(&own));
        assert!(!view.remove_listener(&own));
    }
}
