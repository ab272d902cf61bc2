use serde_json::{json, Value};

use liveroom_core::codes::{AudioChangerType, AudioReverbType};
use liveroom_core::StoreName;

use crate::command::{Callbacks, CommandGateway, CommandSpec};
use crate::domain::{StoreDomain, StoreScope};
use crate::normalize::{self, assign, FieldOutcome};
use crate::registry::DomainStores;
use crate::store::{store_state, RoomStore};

store_state! {
    /// Voice effects applied to the local microphone
    pub struct AudioEffectState / AudioEffectPatch {
        is_ear_monitor_opened: bool = false,
        ear_monitor_volume: i64 = 100,
        audio_changer_type: AudioChangerType = AudioChangerType::None,
        audio_reverb_type: AudioReverbType = AudioReverbType::None,
    }
}

pub struct AudioEffectDomain;

impl StoreDomain for AudioEffectDomain {
    const STORE: StoreName = StoreName::AudioEffect;
    const SCOPE: StoreScope = StoreScope::Global;
    const FIELDS: &'static [&'static str] = &[
        "isEarMonitorOpened",
        "earMonitorVolume",
        "audioChangerType",
        "audioReverbType",
    ];

    type State = AudioEffectState;

    fn normalize_field(field: &str, value: &Value, patch: &mut AudioEffectPatch) -> FieldOutcome {
        match field {
            "isEarMonitorOpened" => assign(&mut patch.is_ear_monitor_opened, normalize::boolean(value)),
            "earMonitorVolume" => assign(&mut patch.ear_monitor_volume, normalize::integer(value)),
            "audioChangerType" => assign(&mut patch.audio_changer_type, normalize::code(field, value)),
            "audioReverbType" => assign(&mut patch.audio_reverb_type, normalize::code(field, value)),
            _ => FieldOutcome::Unrecognized,
        }
    }

    fn store(stores: &DomainStores) -> &RoomStore<AudioEffectState> {
        &stores.audio_effect
    }
}

const SET_AUDIO_CHANGER_TYPE: CommandSpec =
    CommandSpec::new("setAudioChangerType").require(&["changerType"]);
const SET_AUDIO_REVERB_TYPE: CommandSpec =
    CommandSpec::new("setAudioReverbType").require(&["reverbType"]);
const SET_VOICE_EAR_MONITOR_ENABLE: CommandSpec =
    CommandSpec::new("setVoiceEarMonitorEnable").require(&["enable"]);
const SET_VOICE_EAR_MONITOR_VOLUME: CommandSpec =
    CommandSpec::new("setVoiceEarMonitorVolume").require(&["volume"]);

#[derive(Debug, Clone)]
pub struct AudioEffectCommands {
    gateway: CommandGateway,
}

impl AudioEffectCommands {
    pub fn new(gateway: CommandGateway) -> Self {
        Self { gateway }
    }

    pub async fn set_audio_changer_type(&self, changer_type: AudioChangerType, callbacks: Callbacks) {
        let params = json!({ "changerType": changer_type });
        self.gateway.dispatch(&SET_AUDIO_CHANGER_TYPE, &params, callbacks).await;
    }

    pub async fn set_audio_reverb_type(&self, reverb_type: AudioReverbType, callbacks: Callbacks) {
        let params = json!({ "reverbType": reverb_type });
        self.gateway.dispatch(&SET_AUDIO_REVERB_TYPE, &params, callbacks).await;
    }

    pub async fn set_voice_ear_monitor_enable(&self, enable: bool, callbacks: Callbacks) {
        let params = json!({ "enable": enable });
        self.gateway.dispatch(&SET_VOICE_EAR_MONITOR_ENABLE, &params, callbacks).await;
    }

    pub async fn set_voice_ear_monitor_volume(&self, volume: u8, callbacks: Callbacks) {
        let params = json!({ "volume": volume.min(100) });
        self.gateway.dispatch(&SET_VOICE_EAR_MONITOR_VOLUME, &params, callbacks).await;
    }
}
