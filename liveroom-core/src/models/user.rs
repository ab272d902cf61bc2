use serde::{Deserialize, Serialize};

use super::id::{RoomId, UserId};
use crate::codes::{self, DeviceStatus};

/// Basic profile of a user taking part in a live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUserInfo {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(rename = "avatarURL", default)]
    pub avatar_url: String,
}

impl LiveUserInfo {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: String::new(),
            avatar_url: String::new(),
        }
    }
}

/// A user occupying a seat, with the state of their devices.
///
/// `live_id` is the user's own room; it differs from the current room when
/// the seat is held by a connected co-host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatUserInfo {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(rename = "avatarURL", default)]
    pub avatar_url: String,
    #[serde(rename = "liveID", default, skip_serializing_if = "Option::is_none")]
    pub live_id: Option<RoomId>,
    #[serde(default, deserialize_with = "codes::lenient")]
    pub microphone_status: Option<DeviceStatus>,
    #[serde(default, deserialize_with = "codes::lenient")]
    pub camera_status: Option<DeviceStatus>,
}

impl SeatUserInfo {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: String::new(),
            avatar_url: String::new(),
            live_id: None,
            microphone_status: None,
            camera_status: None,
        }
    }

    #[must_use]
    pub fn is_microphone_on(&self) -> bool {
        self.microphone_status == Some(DeviceStatus::On)
    }

    #[must_use]
    pub fn is_camera_on(&self) -> bool {
        self.camera_status == Some(DeviceStatus::On)
    }
}

/// The logged-in user's own profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(rename = "avatarURL", default)]
    pub avatar_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seat_user_info_wire_names() {
        let user: SeatUserInfo = serde_json::from_value(json!({
            "userID": "u1",
            "userName": "Alice",
            "avatarURL": "https://example.com/a.png",
            "liveID": "room_7",
            "microphoneStatus": 1,
            "cameraStatus": 0,
        }))
        .unwrap();

        assert_eq!(user.user_id.as_str(), "u1");
        assert_eq!(user.live_id, Some(RoomId::from("room_7")));
        assert!(user.is_microphone_on());
        assert!(!user.is_camera_on());
    }

    #[test]
    fn test_unknown_device_code_inside_record_is_tolerated() {
        let user: SeatUserInfo = serde_json::from_value(json!({
            "userID": "u2",
            "microphoneStatus": 99,
        }))
        .unwrap();

        assert_eq!(user.microphone_status, None);
        assert_eq!(user.user_name, "");
    }

    #[test]
    fn test_missing_user_id_is_rejected() {
        let result = serde_json::from_value::<LiveUserInfo>(json!({ "userName": "nobody" }));
        assert!(result.is_err());
    }
}
