//! Local media devices
//!
//! Process-wide: camera and microphone state outlives any single room.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use liveroom_core::codes::{
    self, AudioRoute, DeviceError, DeviceStatus, MirrorType, NetworkQuality, VideoQuality,
};
use liveroom_core::{StoreName, UserId};

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

/// Link quality of the local user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInfo {
    #[serde(rename = "userID")]
    pub user_id: Option<UserId>,
    #[serde(deserialize_with = "codes::lenient")]
    pub quality: Option<NetworkQuality>,
    pub up_loss: i64,
    pub down_loss: i64,
    pub delay: i64,
}

store_state! {
    pub struct DeviceState / DevicePatch {
        microphone_status: DeviceStatus = DeviceStatus::Off,
        microphone_last_error: DeviceError = DeviceError::NoError,
        capture_volume: i64 = 100,
        output_volume: i64 = 100,
        current_mic_volume: i64 = 0,
        camera_status: DeviceStatus = DeviceStatus::Off,
        camera_last_error: DeviceError = DeviceError::NoError,
        is_front_camera: bool = true,
        local_mirror_type: MirrorType = MirrorType::Auto,
        local_video_quality: VideoQuality = VideoQuality::Quality720P,
        current_audio_route: AudioRoute = AudioRoute::Speakerphone,
        screen_status: DeviceStatus = DeviceStatus::Off,
        network_info: NetworkInfo = NetworkInfo::default(),
    }
}

pub struct DeviceDomain;

impl StoreDomain for DeviceDomain {
    const STORE: StoreName = StoreName::Device;
    const SCOPE: StoreScope = StoreScope::Global;
    const FIELDS: &'static [&'static str] = &[
        "microphoneStatus",
        "microphoneLastError",
        "captureVolume",
        "outputVolume",
        "currentMicVolume",
        "cameraStatus",
        "cameraLastError",
        "isFrontCamera",
        "localMirrorType",
        "localVideoQuality",
        "currentAudioRoute",
        "screenStatus",
        "networkInfo",
    ];

    type State = DeviceState;

    fn normalize_field(field: &str, value: &Value, patch: &mut DevicePatch) -> FieldOutcome {
        match field {
            "microphoneStatus" => assign(&mut patch.microphone_status, normalize::code(field, value)),
            "microphoneLastError" => {
                assign(&mut patch.microphone_last_error, normalize::code(field, value))
            }
            "captureVolume" => assign(&mut patch.capture_volume, normalize::integer(value)),
            "outputVolume" => assign(&mut patch.output_volume, normalize::integer(value)),
            "currentMicVolume" => assign(&mut patch.current_mic_volume, normalize::integer(value)),
            "cameraStatus" => assign(&mut patch.camera_status, normalize::code(field, value)),
            "cameraLastError" => assign(&mut patch.camera_last_error, normalize::code(field, value)),
            "isFrontCamera" => assign(&mut patch.is_front_camera, normalize::boolean(value)),
            "localMirrorType" => assign(&mut patch.local_mirror_type, normalize::code(field, value)),
            "localVideoQuality" => {
                assign(&mut patch.local_video_quality, normalize::code(field, value))
            }
            "currentAudioRoute" => {
                assign(&mut patch.current_audio_route, normalize::code(field, value))
            }
            "screenStatus" => assign(&mut patch.screen_status, normalize::code(field, value)),
            "networkInfo" => assign(&mut patch.network_info, Some(normalize::object(field, value))),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<DeviceState> {
        &stores.device
    }
}

const OPEN_LOCAL_CAMERA: CommandSpec = CommandSpec::new("openLocalCamera").require(&["isFront"]);
const CLOSE_LOCAL_CAMERA: CommandSpec = CommandSpec::new("closeLocalCamera");
const SWITCH_CAMERA: CommandSpec = CommandSpec::new("switchCamera").require(&["isFront"]);
const SWITCH_MIRROR: CommandSpec = CommandSpec::new("switchMirror").require(&["mirrorType"]);
const UPDATE_VIDEO_QUALITY: CommandSpec = CommandSpec::new("updateVideoQuality").require(&["quality"]);
const OPEN_LOCAL_MICROPHONE: CommandSpec = CommandSpec::new("openLocalMicrophone");
const CLOSE_LOCAL_MICROPHONE: CommandSpec = CommandSpec::new("closeLocalMicrophone");
const SET_CAPTURE_VOLUME: CommandSpec = CommandSpec::new("setCaptureVolume").require(&["volume"]);
const SET_OUTPUT_VOLUME: CommandSpec = CommandSpec::new("setOutputVolume").require(&["volume"]);
const SET_AUDIO_ROUTE: CommandSpec = CommandSpec::new("setAudioRoute").require(&["route"]);
const START_SCREEN_SHARE: CommandSpec = CommandSpec::new("startScreenShare");
const STOP_SCREEN_SHARE: CommandSpec = CommandSpec::new("stopScreenShare");

/// Device actions. State changes arrive back as device events.
#[derive(Debug, Clone)]
pub struct DeviceCommands {
    gateway: CommandGateway,
}

impl DeviceCommands {
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    pub async fn open_local_camera(&self, is_front: bool, callbacks: Callbacks) {
        let params = json!({ "isFront": is_front });
        self.gateway.dispatch(&OPEN_LOCAL_CAMERA, &params, callbacks).await;
    }

    pub async fn close_local_camera(&self, callbacks: Callbacks) {
        self.gateway.dispatch(&CLOSE_LOCAL_CAMERA, &(), callbacks).await;
    }

    pub async fn switch_camera(&self, is_front: bool, callbacks: Callbacks) {
        let params = json!({ "isFront": is_front });
        self.gateway.dispatch(&SWITCH_CAMERA, &params, callbacks).await;
    }

    pub async fn switch_mirror(&self, mirror_type: MirrorType, callbacks: Callbacks) {
        let params = json!({ "mirrorType": mirror_type });
        self.gateway.dispatch(&SWITCH_MIRROR, &params, callbacks).await;
    }

    pub async fn update_video_quality(&self, quality: VideoQuality, callbacks: Callbacks) {
        let params = json!({ "quality": quality });
        self.gateway.dispatch(&UPDATE_VIDEO_QUALITY, &params, callbacks).await;
    }

    pub async fn open_local_microphone(&self, callbacks: Callbacks) {
        self.gateway.dispatch(&OPEN_LOCAL_MICROPHONE, &(), callbacks).await;
    }

    pub async fn close_local_microphone(&self, callbacks: Callbacks) {
        self.gateway.dispatch(&CLOSE_LOCAL_MICROPHONE, &(), callbacks).await;
    }

    /// `volume` in 0..=100
    pub async fn set_capture_volume(&self, volume: u8, callbacks: Callbacks) {
        let params = json!({ "volume": volume.min(100) });
        self.gateway.dispatch(&SET_CAPTURE_VOLUME, &params, callbacks).await;
    }

    /// `volume` in 0..=100
    pub async fn set_output_volume(&self, volume: u8, callbacks: Callbacks) {
        let params = json!({ "volume": volume.min(100) });
        self.gateway.dispatch(&SET_OUTPUT_VOLUME, &params, callbacks).await;
    }

    pub async fn set_audio_route(&self, route: AudioRoute, callbacks: Callbacks) {
        let params = json!({ "route": route });
        self.gateway.dispatch(&SET_AUDIO_ROUTE, &params, callbacks).await;
    }

    pub async fn start_screen_share(&self, callbacks: Callbacks) {
        self.gateway.dispatch(&START_SCREEN_SHARE, &(), callbacks).await;
    }

    pub async fn stop_screen_share(&self, callbacks: Callbacks) {
        self.gateway.dispatch(&STOP_SCREEN_SHARE, &(), callbacks).await;
    }
}
