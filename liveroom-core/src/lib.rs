pub mod bridge;
pub mod codes;
pub mod config;
pub mod error;
pub mod listener_key;
pub mod logging;
pub mod models;

pub use bridge::{
    CallBridge, EventCallback, FakeEngine, ListenerHandle, NativeEngine, NativeResponse,
    TransportError,
};
pub use codes::WireCode;
pub use config::Config;
pub use error::{Error, Result};
pub use listener_key::{ListenerKey, StoreName};
pub use models::{RoomId, UserId};
