//! Store domains
//!
//! Each module owns one domain: its snapshot, how native events map onto it,
//! and the commands that act on it.

pub mod audio_effect;
pub mod barrage;
pub mod co_guest;
pub mod co_host;
pub mod device;
pub mod gift;
pub mod like;
pub mod login;
pub mod seat;
pub mod summary;

pub use audio_effect::{AudioEffectCommands, AudioEffectDomain, AudioEffectState};
pub use barrage::{BarrageCommands, BarrageDomain, BarrageState};
pub use co_guest::{CoGuestCommands, CoGuestDomain, CoGuestState, PendingApplications};
pub use co_host::{CoHostCommands, CoHostDomain, CoHostState, CoHostUiStatus};
pub use device::{DeviceCommands, DeviceDomain, DeviceState};
pub use gift::{GiftCommands, GiftDomain, GiftState};
pub use like::{LikeCommands, LikeDomain, LikeState};
pub use login::{LoginCommands, LoginDomain, LoginState};
pub use seat::{SeatCommands, SeatDomain, SeatState};
pub use summary::{LiveSummaryDomain, LiveSummaryState};
