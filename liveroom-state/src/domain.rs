use serde_json::Value;

use liveroom_core::StoreName;

use crate::normalize::FieldOutcome;
use crate::registry::DomainStores;
use crate::store::{RoomStore, StoreKey, StoreState};

/// Whether a domain keeps one snapshot per room or a single process-wide one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Room,
    Global,
}

/// Patch type of a domain's snapshot
pub type PatchOf<D> = <<D as StoreDomain>::State as StoreState>::Patch;

/// A store domain: its snapshot shape, its events and how raw event values
/// become typed fields.
///
/// Persistent fields share their name with the event that carries them, so
/// `FIELDS` is also the list of events the registry binds for the domain.
pub trait StoreDomain: Send + Sync + 'static {
    const STORE: StoreName;
    const SCOPE: StoreScope;
    const FIELDS: &'static [&'static str];

    type State: StoreState;

    /// Convert one raw field value into `patch`
    fn normalize_field(field: &str, value: &Value, patch: &mut PatchOf<Self>) -> FieldOutcome;

    /// This domain's store inside the registry
    fn store(stores: &DomainStores) -> &RoomStore<Self::State>;

    /// Runs for every native patch right before it reaches the store
    fn before_apply(_stores: &DomainStores, _key: &StoreKey, _patch: &PatchOf<Self>) {}

    fn recognizes(field: &str) -> bool {
        Self::FIELDS.contains(&field)
    }
}
