//! Generic room store
//!
//! One `RoomStore` per domain holds exactly one snapshot per [`StoreKey`].
//! Snapshots are immutable `Arc`s: `set_state` merges a patch into a copy
//! and swaps the reference, so observers holding an older snapshot never see
//! it change underneath them.
//!
//! Subscribers are notified synchronously, over the subscriber list captured
//! when the update was applied, with no internal lock held. A callback may
//! therefore subscribe, unsubscribe or update the store re-entrantly.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use liveroom_core::RoomId;

/// Domain snapshot that can absorb partial updates
pub trait StoreState: Clone + Default + Send + Sync + 'static {
    /// Partial update; unset fields keep their current value
    type Patch: Default + Send + 'static;

    /// Shallow merge of `patch` into `self`
    fn merge(&mut self, patch: Self::Patch);

    fn is_empty_patch(patch: &Self::Patch) -> bool;
}

/// Key under which a store keeps a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Process-wide state (device, audio effects, login)
    Global,
    Room(RoomId),
}

impl StoreKey {
    #[must_use]
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::Global => None,
            Self::Room(room_id) => Some(room_id),
        }
    }
}

impl From<RoomId> for StoreKey {
    fn from(room_id: RoomId) -> Self {
        Self::Room(room_id)
    }
}

impl From<&RoomId> for StoreKey {
    fn from(room_id: &RoomId) -> Self {
        Self::Room(room_id.clone())
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("<global>"),
            Self::Room(room_id) => write!(f, "{room_id}"),
        }
    }
}

/// Snapshot observer
pub type Subscriber<S> = Arc<dyn Fn(&Arc<S>) + Send + Sync>;

struct Entry<S> {
    snapshot: Arc<S>,
    subscribers: Vec<(u64, Subscriber<S>)>,
}

impl<S: StoreState> Entry<S> {
    fn new() -> Self {
        Self {
            snapshot: Arc::new(S::default()),
            subscribers: Vec::new(),
        }
    }
}

struct StoreInner<S> {
    name: &'static str,
    entries: DashMap<StoreKey, Entry<S>>,
    next_subscriber_id: AtomicU64,
}

impl<S> StoreInner<S> {
    fn remove_subscriber(&self, key: &StoreKey, id: u64) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.subscribers.retain(|(subscriber_id, _)| *subscriber_id != id);
        }
    }
}

/// Keyed singleton state engine shared by every consumer of one domain
pub struct RoomStore<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for RoomStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StoreState> RoomStore<S> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                name,
                entries: DashMap::new(),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Current snapshot for `key`, created with defaults on first access
    pub fn get_state(&self, key: &StoreKey) -> Arc<S> {
        if let Some(entry) = self.inner.entries.get(key) {
            return Arc::clone(&entry.snapshot);
        }

        let entry = self.inner.entries.entry(key.clone()).or_insert_with(Entry::new);
        Arc::clone(&entry.snapshot)
    }

    /// Current snapshot for `key` without creating one
    pub fn peek_state(&self, key: &StoreKey) -> Option<Arc<S>> {
        self.inner
            .entries
            .get(key)
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    /// Merge `patch` into the snapshot for `key` and notify subscribers.
    ///
    /// An empty patch changes nothing and notifies no one.
    pub fn set_state(&self, key: &StoreKey, patch: S::Patch) {
        if S::is_empty_patch(&patch) {
            trace!(store = self.inner.name, key = %key, "Skipping empty patch");
            return;
        }

        let (snapshot, subscribers) = {
            let mut entry = self.inner.entries.entry(key.clone()).or_insert_with(Entry::new);

            let mut next = S::clone(&entry.snapshot);
            next.merge(patch);
            let next = Arc::new(next);
            entry.snapshot = Arc::clone(&next);

            let subscribers: Vec<Subscriber<S>> = entry
                .subscribers
                .iter()
                .map(|(_, subscriber)| Arc::clone(subscriber))
                .collect();

            (next, subscribers)
        };

        trace!(
            store = self.inner.name,
            key = %key,
            subscribers = subscribers.len(),
            "State updated"
        );

        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    /// Observe `key`. The callback receives the current snapshot before
    /// this returns, then every later snapshot until unsubscribed.
    pub fn subscribe<F>(&self, key: &StoreKey, callback: F) -> Subscription
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let callback: Subscriber<S> = Arc::new(callback);

        let snapshot = {
            let mut entry = self.inner.entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.subscribers.push((id, Arc::clone(&callback)));
            Arc::clone(&entry.snapshot)
        };

        callback(&snapshot);

        let store: Weak<StoreInner<S>> = Arc::downgrade(&self.inner);
        let key = key.clone();
        Subscription::new(move || {
            if let Some(store) = store.upgrade() {
                store.remove_subscriber(&key, id);
            }
        })
    }

    /// Drop the snapshot and every subscriber for `key`.
    ///
    /// Outstanding [`Subscription`]s become no-ops; the next `get_state`
    /// starts again from defaults.
    pub fn clear_state(&self, key: &StoreKey) {
        if let Some((_, entry)) = self.inner.entries.remove(key) {
            debug!(
                store = self.inner.name,
                key = %key,
                dropped_subscribers = entry.subscribers.len(),
                "State cleared"
            );
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, key: &StoreKey) -> usize {
        self.inner
            .entries
            .get(key)
            .map_or(0, |entry| entry.subscribers.len())
    }

    /// Number of keys with a live snapshot
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.entries.len()
    }
}

/// Handle returned by [`RoomStore::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    remove: Box<dyn Fn() + Send + Sync>,
    active: AtomicBool,
}

impl Subscription {
    fn new(remove: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            remove: Box::new(remove),
            active: AtomicBool::new(true),
        }
    }

    /// Remove the subscriber. Only the first call has an effect.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            (self.remove)();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Declare a domain snapshot together with its patch type.
///
/// Generates the state struct (camelCase `Serialize`), its `Default`, a patch
/// struct with one optional field and one builder method per state field,
/// and the [`StoreState`] impl.
macro_rules! store_state {
    (
        $(#[$meta:meta])*
        pub struct $state:ident / $patch:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $state {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl Default for $state {
            fn default() -> Self {
                Self {
                    $( $field: $default, )*
                }
            }
        }

        #[doc = concat!("Partial update of [`", stringify!($state), "`]")]
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $patch {
            $( pub $field: Option<$ty>, )*
        }

        impl $patch {
            $(
                #[must_use]
                pub fn $field(mut self, value: $ty) -> Self {
                    self.$field = Some(value);
                    self
                }
            )*
        }

        impl $crate::store::StoreState for $state {
            type Patch = $patch;

            fn merge(&mut self, patch: $patch) {
                $(
                    if let Some(value) = patch.$field {
                        self.$field = value;
                    }
                )*
            }

            fn is_empty_patch(patch: &$patch) -> bool {
                true $( && patch.$field.is_none() )*
            }
        }
    };
}

pub(crate) use store_state;
