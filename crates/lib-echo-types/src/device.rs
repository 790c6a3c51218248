//! Device, channel and session descriptions.

use crate::params::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which product line is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Aio,
    Ats,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aio => write!(f, "Echo AIO"),
            Self::Ats => write!(f, "Echo ATS"),
        }
    }
}

/// Module type reported for a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleType {
    Unknown,
    None,
    /// AIO-A, analog microphone.
    A,
    /// AIO-S, speaker monitor.
    S,
    /// AIO-L, line.
    L,
    /// AIO-C, combo.
    C,
    /// AIO-H, headphone.
    H,
    /// AIO-T, TDM.
    T,
    /// AIO-B, Bluetooth.
    B,
    /// ATS analog.
    AtsA,
    /// ATS digital.
    AtsD,
}

impl ModuleType {
    /// Decode the driver's module type value; unrecognized values map to `Unknown`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::A,
            2 => Self::S,
            3 => Self::L,
            4 => Self::C,
            5 => Self::H,
            6 => Self::T,
            7 => Self::B,
            8 => Self::AtsA,
            9 => Self::AtsD,
            _ => Self::Unknown,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::Unknown => -1,
            Self::None => 0,
            Self::A => 1,
            Self::S => 2,
            Self::L => 3,
            Self::C => 4,
            Self::H => 5,
            Self::T => 6,
            Self::B => 7,
            Self::AtsA => 8,
            Self::AtsD => 9,
        }
    }
}

/// Input gain multiplier accepted by `AIO_setInputGain`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputGain {
    X1,
    X10,
    X100,
}

impl InputGain {
    pub const ALL: [InputGain; 3] = [InputGain::X1, InputGain::X10, InputGain::X100];

    pub fn multiplier(self) -> i32 {
        match self {
            Self::X1 => 1,
            Self::X10 => 10,
            Self::X100 => 100,
        }
    }
}

impl TryFrom<i32> for InputGain {
    type Error = ValueError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::X1),
            10 => Ok(Self::X10),
            100 => Ok(Self::X100),
            other => Err(ValueError::InputGain(other.into())),
        }
    }
}

impl fmt::Display for InputGain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

/// Gain multipliers the ATS accepts through the direct gain call.
pub const ATS_GAIN_MULTIPLIERS: [i32; 5] = [1, 3, 10, 31, 100];

/// Output gain value for the 1x console setting (deprecated control).
pub const OUTPUT_GAIN_1X: u8 = 26;
/// Output gain value for the 10x console setting (deprecated control).
pub const OUTPUT_GAIN_10X: u8 = 255;

/// Clock source, stored in device parameter `0xd000`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ClockSource {
    Internal = 0,
    Usb = 1,
    CenterModule = 2,
    OuterModule = 3,
}

impl TryFrom<i32> for ClockSource {
    type Error = ValueError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Internal),
            1 => Ok(Self::Usb),
            2 => Ok(Self::CenterModule),
            3 => Ok(Self::OuterModule),
            other => Err(ValueError::OutOfRange {
                kind: "clock source",
                value: other.into(),
            }),
        }
    }
}

/// ATS digital I/O connector mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DigitalIoMode {
    Spdif = 0,
    WordClock = 1,
}

impl TryFrom<u8> for DigitalIoMode {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Spdif),
            1 => Ok(Self::WordClock),
            other => Err(ValueError::OutOfRange {
                kind: "digital I/O mode",
                value: other.into(),
            }),
        }
    }
}

/// ATS analog input routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum AnalogInputMode {
    /// Output looped back to the input.
    Loopback = 0,
    /// External connector.
    Analog = 1,
}

impl TryFrom<i32> for AnalogInputMode {
    type Error = ValueError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Loopback),
            1 => Ok(Self::Analog),
            other => Err(ValueError::OutOfRange {
                kind: "analog input mode",
                value: other.into(),
            }),
        }
    }
}

/// ATS analog output stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum AnalogOutputMode {
    Line = 0,
    Amplifier = 1,
    Headphone = 2,
}

impl TryFrom<i32> for AnalogOutputMode {
    type Error = ValueError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Line),
            1 => Ok(Self::Amplifier),
            2 => Ok(Self::Headphone),
            other => Err(ValueError::OutOfRange {
                kind: "analog output mode",
                value: other.into(),
            }),
        }
    }
}

/// Binding lifecycle state.
///
/// ```text
/// Unloaded -> Loaded -> Bound -> Ready -> Shutdown -> Unloaded
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No module loaded.
    Unloaded,
    /// Module loaded, a required symbol is missing.
    Loaded,
    /// Module loaded and all required symbols resolved.
    Bound,
    /// `AIO_initialize` has been called.
    Ready,
    /// `AIO_shutdown` has been called, module not yet released.
    Shutdown,
}

/// Snapshot of the connected device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub library_version: String,
    pub device: Option<DeviceKind>,
    pub is_aio_connected: bool,
    pub is_ats_connected: bool,
    pub num_inputs: i32,
    pub num_outputs: i32,
    /// Module type per slot, `None` when the driver does not report module types.
    pub modules: [Option<ModuleType>; crate::NUM_MODULE_SLOTS],
}

/// Capabilities and current settings of one input channel.
///
/// Values are `None` when the channel lacks the control or the read failed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel: u32,
    pub has_gain_control: bool,
    pub gain: Option<i32>,
    pub has_ccp_control: bool,
    pub ccp_enabled: Option<bool>,
    pub has_teds: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_type_roundtrip() {
        for raw in -1..=9 {
            assert_eq!(ModuleType::from_raw(raw).raw(), raw);
        }
        assert_eq!(ModuleType::from_raw(42), ModuleType::Unknown);
    }

    #[test]
    fn test_input_gain_values() {
        let gains: Vec<i32> = InputGain::ALL.iter().map(|g| g.multiplier()).collect();
        assert_eq!(gains, vec![1, 10, 100]);
        assert_eq!(InputGain::try_from(10), Ok(InputGain::X10));
        assert_eq!(InputGain::try_from(3), Err(ValueError::InputGain(3)));
        assert_eq!(InputGain::X100.to_string(), "100x");
    }

    #[test]
    fn test_mode_conversions() {
        assert_eq!(ClockSource::try_from(2), Ok(ClockSource::CenterModule));
        assert!(ClockSource::try_from(4).is_err());
        assert_eq!(DigitalIoMode::try_from(1u8), Ok(DigitalIoMode::WordClock));
        assert_eq!(AnalogOutputMode::try_from(2), Ok(AnalogOutputMode::Headphone));
        assert!(AnalogInputMode::try_from(-1).is_err());
    }

    #[test]
    fn test_device_info_serializes() {
        let info = DeviceInfo {
            library_version: "1.2.3".to_string(),
            device: Some(DeviceKind::Aio),
            is_aio_connected: true,
            is_ats_connected: false,
            num_inputs: 4,
            num_outputs: 2,
            modules: [Some(ModuleType::C), None],
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["device"], "Aio");
        assert_eq!(json["num_inputs"], 4);
        assert_eq!(json["modules"][0], "C");
        assert!(json["modules"][1].is_null());
    }
}
