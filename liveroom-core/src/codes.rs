//! Wire code tables
//!
//! The native engine reports enumerations as small integers (and, on some
//! platforms, as their symbolic names). Every table here maps in both
//! directions: `from_code`/`from_label` for inbound events, `code` for
//! outbound command parameters. Unknown codes map to `None`; callers decide
//! whether to drop the field, never guess a variant.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Bidirectional mapping between a semantic variant and its wire code
pub trait WireCode: Sized + Copy + Send + Sync + 'static {
    /// Table name used in diagnostics
    const TABLE: &'static str;

    /// Every variant, in code order
    const ALL: &'static [Self];

    fn from_code(code: i64) -> Option<Self>;

    fn code(self) -> i64;

    /// Symbolic name as the native layer spells it (e.g. `"DISCONNECTED"`)
    fn label(self) -> &'static str;

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|variant| variant.label().eq_ignore_ascii_case(label))
    }

    /// Accepts a JSON number, a numeric string, or a symbolic name
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().and_then(Self::from_code),
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .ok()
                .map_or_else(|| Self::from_label(text.trim()), Self::from_code),
            _ => None,
        }
    }
}

/// Lenient deserializer for optional code fields nested inside larger records.
///
/// An unknown code yields `None` instead of failing the whole record, so one
/// bad seat entry does not wipe the seat list it arrived in.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: WireCode,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(T::from_value))
}

macro_rules! wire_codes {
    ($(
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal ),+ $(,)?
        }
    )+) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl WireCode for $name {
            const TABLE: &'static str = stringify!($name);
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn from_code(code: i64) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }

            fn code(self) -> i64 {
                match self {
                    $( Self::$variant => $code, )+
                }
            }

            fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i64(self.code())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = Value::deserialize(deserializer)?;
                <Self as WireCode>::from_value(&value).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} code: {value}",
                        <Self as WireCode>::TABLE
                    ))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    )+};
}

wire_codes! {
    /// Camera / microphone / screen-share switch state
    #[derive(Default)]
    pub enum DeviceStatus {
        #[default]
        Off = 0 => "OFF",
        On = 1 => "ON",
    }

    /// Last device failure reported by the engine
    #[derive(Default)]
    pub enum DeviceError {
        #[default]
        NoError = 0 => "NO_ERROR",
        NoDeviceDetected = 1 => "NO_DEVICE_DETECTED",
        NoSystemPermission = 2 => "NO_SYSTEM_PERMISSION",
        NotSupportCapture = 3 => "NOT_SUPPORT_CAPTURE",
        OccupiedError = 4 => "OCCUPIED_ERROR",
        UnknownError = 5 => "UNKNOWN_ERROR",
    }

    #[derive(Default)]
    pub enum MirrorType {
        #[default]
        Auto = 0 => "AUTO",
        Enable = 1 => "ENABLE",
        Disable = 2 => "DISABLE",
    }

    #[derive(Default)]
    pub enum VideoQuality {
        Quality360P = 1 => "QUALITY_360P",
        Quality540P = 2 => "QUALITY_540P",
        #[default]
        Quality720P = 3 => "QUALITY_720P",
        Quality1080P = 4 => "QUALITY_1080P",
    }

    #[derive(Default)]
    pub enum AudioRoute {
        #[default]
        Speakerphone = 0 => "SPEAKERPHONE",
        Earpiece = 1 => "EARPIECE",
    }

    #[derive(Default)]
    pub enum NetworkQuality {
        #[default]
        Unknown = 0 => "UNKNOWN",
        Excellent = 1 => "EXCELLENT",
        Good = 2 => "GOOD",
        Poor = 3 => "POOR",
        Bad = 4 => "BAD",
        VeryBad = 5 => "VERY_BAD",
        Down = 6 => "DOWN",
    }

    /// Voice changer presets
    #[derive(Default)]
    pub enum AudioChangerType {
        #[default]
        None = 0 => "NONE",
        Child = 1 => "CHILD",
        LittleGirl = 2 => "LITTLE_GIRL",
        Man = 3 => "MAN",
        HeavyMetal = 4 => "HEAVY_METAL",
        Cold = 5 => "COLD",
        Foreigner = 6 => "FOREIGNER",
        TrappedBeast = 7 => "TRAPPED_BEAST",
        Fatso = 8 => "FATSO",
        StrongCurrent = 9 => "STRONG_CURRENT",
        HeavyMachinery = 10 => "HEAVY_MACHINERY",
        Ethereal = 11 => "ETHEREAL",
    }

    /// Reverb presets
    #[derive(Default)]
    pub enum AudioReverbType {
        #[default]
        None = 0 => "NONE",
        Ktv = 1 => "KTV",
        SmallRoom = 2 => "SMALL_ROOM",
        Auditorium = 3 => "AUDITORIUM",
        Deep = 4 => "DEEP",
        Loud = 5 => "LOUD",
        Metallic = 6 => "METALLIC",
        Magnetic = 7 => "MAGNETIC",
    }

    /// Co-host link state as the engine reports it
    #[derive(Default)]
    pub enum CoHostStatus {
        #[default]
        Disconnected = 0 => "DISCONNECTED",
        Connected = 1 => "CONNECTED",
    }

    #[derive(Default)]
    pub enum LoginStatus {
        #[default]
        Unlogin = 0 => "UNLOGIN",
        Logined = 1 => "LOGINED",
    }

    /// What `moveUserToSeat` does when the target seat is taken
    #[derive(Default)]
    pub enum MoveSeatPolicy {
        #[default]
        AbortWhenOccupied = 0 => "ABORT_WHEN_OCCUPIED",
        ForceReplace = 1 => "FORCE_REPLACE",
        SwapPosition = 2 => "SWAP_POSITION",
    }

    #[derive(Default)]
    pub enum BarrageType {
        #[default]
        Text = 0 => "TEXT",
        Custom = 1 => "CUSTOM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_forward_and_reverse_agree() {
        for variant in AudioReverbType::ALL {
            assert_eq!(AudioReverbType::from_code(variant.code()), Some(*variant));
            assert_eq!(AudioReverbType::from_label(variant.label()), Some(*variant));
        }
        assert_eq!(AudioChangerType::ALL.len(), 12);
    }

    #[test]
    fn test_unknown_code_is_none() {
        assert_eq!(DeviceStatus::from_code(99), None);
        assert_eq!(DeviceStatus::from_value(&json!(99)), None);
        assert_eq!(DeviceStatus::from_value(&json!(true)), None);
    }

    #[test]
    fn test_from_value_accepts_text_forms() {
        assert_eq!(DeviceStatus::from_value(&json!(1)), Some(DeviceStatus::On));
        assert_eq!(DeviceStatus::from_value(&json!("1")), Some(DeviceStatus::On));
        assert_eq!(
            CoHostStatus::from_value(&json!("connected")),
            Some(CoHostStatus::Connected)
        );
    }

    #[test]
    fn test_serializes_as_code() {
        let value = serde_json::to_value(AudioReverbType::Ktv).unwrap();
        assert_eq!(value, json!(1));

        let parsed: AudioChangerType = serde_json::from_value(json!("LITTLE_GIRL")).unwrap();
        assert_eq!(parsed, AudioChangerType::LittleGirl);

        assert!(serde_json::from_value::<AudioChangerType>(json!(42)).is_err());
    }

    #[test]
    fn test_lenient_drops_unknown_codes() {
        #[derive(Deserialize)]
        struct Sample {
            #[serde(default, deserialize_with = "lenient")]
            status: Option<DeviceStatus>,
        }

        let sample: Sample = serde_json::from_value(json!({ "status": 7 })).unwrap();
        assert_eq!(sample.status, None);

        let sample: Sample = serde_json::from_value(json!({ "status": 1 })).unwrap();
        assert_eq!(sample.status, Some(DeviceStatus::On));

        let sample: Sample = serde_json::from_value(json!({})).unwrap();
        assert_eq!(sample.status, None);
    }
}
