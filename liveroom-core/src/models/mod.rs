pub mod id;
pub mod user;

pub use id::{generate_id, RoomId, UserId};
pub use user::{LiveUserInfo, SeatUserInfo, UserProfile};
