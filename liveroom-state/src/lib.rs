//! Room state synchronization
//!
//! Turns the native engine's event stream into one observable snapshot per
//! (domain, room) and turns user actions into validated native commands.

pub mod command;
pub mod domain;
pub mod domains;
pub mod normalize;
pub mod registry;
pub mod store;
pub mod view;

pub use command::{Callbacks, CommandError, CommandGateway, CommandSpec};
pub use domain::{PatchOf, StoreDomain, StoreScope};
pub use normalize::{apply_event, normalize, IgnoreReason, Normalized};
pub use registry::{DomainStores, StateRegistry};
pub use store::{RoomStore, StoreKey, StoreState, Subscription};
pub use view::RoomView;
