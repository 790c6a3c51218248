//! Module slots and parameter identifiers.
//!
//! Module parameters are addressed by a slot and a numeric identifier. The
//! identifier ranges are disjoint per module family: AIO-C parameters start at
//! `0xc0000`, AIO-T parameters at `0xd000` and AIO-H parameters at `0xe0000`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors converting raw values into typed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("Invalid module slot {0}, expected 0 (center) or 1 (outer)")]
    ModuleSlot(i64),

    #[error("Invalid input gain {0}x, expected 1, 10 or 100")]
    InputGain(i64),

    #[error("Invalid {kind} value {value}")]
    OutOfRange { kind: &'static str, value: i64 },
}

/// Audio module slot on the AIO chassis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleSlot {
    /// Center audio module slot (index 0).
    Center,
    /// Outer audio module slot (index 1).
    Outer,
}

impl ModuleSlot {
    pub const ALL: [ModuleSlot; crate::NUM_MODULE_SLOTS] = [ModuleSlot::Center, ModuleSlot::Outer];

    pub fn index(self) -> i32 {
        match self {
            Self::Center => 0,
            Self::Outer => 1,
        }
    }
}

impl TryFrom<i32> for ModuleSlot {
    type Error = ValueError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Center),
            1 => Ok(Self::Outer),
            other => Err(ValueError::ModuleSlot(other.into())),
        }
    }
}

impl fmt::Display for ModuleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Center => write!(f, "center (0)"),
            Self::Outer => write!(f, "outer (1)"),
        }
    }
}

/// Raw module or device parameter identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterId(pub i32);

impl ParameterId {
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<i32> for ParameterId {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

/// Declares a parameter family as consecutive identifiers from a base value.
macro_rules! parameter_family {
    (
        $(#[$meta:meta])*
        $name:ident = $base:literal {
            $( $(#[$vmeta:meta])* $variant:ident ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(i32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),*
        }

        impl $name {
            pub const BASE: i32 = $base;

            pub const ALL: &'static [$name] = &[$( $name::$variant ),*];

            pub fn id(self) -> ParameterId {
                ParameterId(Self::BASE + self as i32)
            }

            pub fn from_id(id: ParameterId) -> Option<Self> {
                Self::ALL.iter().copied().find(|p| p.id() == id)
            }
        }

        impl From<$name> for ParameterId {
            fn from(param: $name) -> Self {
                param.id()
            }
        }
    };
}

parameter_family! {
    /// AIO-C (combo) module parameters.
    ComboParameter = 0xc0000 {
        /// Read-only firmware version; reads -1 on error.
        FirmwareVersion,
        /// Read-only serial number; reads -1 on error.
        SerialNumber,
        /// AUX OUT pin mask, bits 0-7.
        AuxOut,
        /// Read-only AUX IN pin mask, bits 0-7.
        AuxIn,
        /// 5 VDC supply enable (0/1).
        Enable5Vdc,
        /// Variable DC supply enable (0/1).
        VariableDcPowerEnable,
        /// Variable DC supply target, 600-5000 mV.
        VariableDcPowerTargetMillivolts,
        /// Read-only measured variable DC voltage in mV.
        VariableDcPowerMeasuredMillivolts,
        /// Read-only measured current in amperes (double parameter).
        VariableDcPowerMeasuredCurrent,
        /// One of [`CurrentMeasurementRange`].
        MeasuredCurrentRange,
        /// Over current threshold in amperes (double parameter).
        OverCurrentThreshold,
        /// Nonzero when an over current condition was detected; write 0 to clear.
        OverCurrentCondition,
    }
}

parameter_family! {
    /// AIO-T (TDM) module parameters.
    ///
    /// Call `update_tdm` on the slot after changing these.
    TModuleParameter = 0xd000 {
        FirmwareVersion,
        BitsPerWord,
        BitsPerFrame,
        FsyncPhaseDelay,
        InvertSclk,
        ShiftEnabled,
        /// See [`TdmClockMode`].
        ClockSink,
        /// 7 max; 0 is treated as 1.
        AudioDataShiftBits,
        LogicLevel,
        FsyncPosition,
        FsyncWidth,
    }
}

parameter_family! {
    /// AIO-H (headphone) module parameters.
    HeadphoneParameter = 0xe0000 {
        /// Selects the channel whose impedance is measured.
        ImpedanceSelect,
    }
}

impl ComboParameter {
    /// Whether this parameter is read and written as a double.
    pub fn is_double(self) -> bool {
        matches!(
            self,
            Self::VariableDcPowerMeasuredCurrent | Self::OverCurrentThreshold
        )
    }

    /// Whether the driver rejects writes to this parameter.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::FirmwareVersion
                | Self::SerialNumber
                | Self::AuxIn
                | Self::VariableDcPowerMeasuredMillivolts
                | Self::VariableDcPowerMeasuredCurrent
        )
    }
}

/// Variable DC supply target limits for the AIO-C module, in millivolts.
pub const VARIABLE_DC_MIN_MILLIVOLTS: i32 = 600;
pub const VARIABLE_DC_MAX_MILLIVOLTS: i32 = 5000;

/// AIO-C variable supply current measurement range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum CurrentMeasurementRange {
    /// 0 to 256 µA.
    Microamps250 = 0,
    /// 0 to 1280 µA.
    Microamps1250 = 1,
    /// 0 to 256 mA.
    Milliamps250 = 2,
    /// 0 to 1280 mA.
    Milliamps1250 = 3,
}

impl CurrentMeasurementRange {
    /// Full-scale current of the range in amperes.
    pub fn full_scale_amperes(self) -> f64 {
        match self {
            Self::Microamps250 => 256e-6,
            Self::Microamps1250 => 1280e-6,
            Self::Milliamps250 => 256e-3,
            Self::Milliamps1250 => 1280e-3,
        }
    }
}

impl TryFrom<i32> for CurrentMeasurementRange {
    type Error = ValueError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Microamps250),
            1 => Ok(Self::Microamps1250),
            2 => Ok(Self::Milliamps250),
            3 => Ok(Self::Milliamps1250),
            other => Err(ValueError::OutOfRange {
                kind: "current measurement range",
                value: other.into(),
            }),
        }
    }
}

/// AIO-T clock mode, written through [`TModuleParameter::ClockSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum TdmClockMode {
    Source = 0,
    Sink = 1,
}

/// AIO-H impedance measurement channel, written through
/// [`HeadphoneParameter::ImpedanceSelect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum HeadphoneImpedanceChannel {
    Left = 1,
    Right = 2,
}

/// Device-wide integer parameters.
pub mod device_parameter {
    use super::ParameterId;

    /// Clock source selection, see [`crate::ClockSource`].
    pub const CLOCK_SOURCE: ParameterId = ParameterId(0xd000);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combo_ids_are_consecutive() {
        assert_eq!(ComboParameter::FirmwareVersion.id(), ParameterId(0xc0000));
        assert_eq!(ComboParameter::AuxOut.id(), ParameterId(0xc0002));
        assert_eq!(ComboParameter::OverCurrentCondition.id(), ParameterId(0xc000b));
    }

    #[test]
    fn test_t_module_ids() {
        assert_eq!(TModuleParameter::FirmwareVersion.id(), ParameterId(0xd000));
        assert_eq!(TModuleParameter::ClockSink.id(), ParameterId(0xd006));
        assert_eq!(TModuleParameter::FsyncWidth.id(), ParameterId(0xd00a));
        assert_eq!(HeadphoneParameter::ImpedanceSelect.id(), ParameterId(0xe0000));
    }

    #[test]
    fn test_from_id_lookup() {
        assert_eq!(
            ComboParameter::from_id(ParameterId(0xc0008)),
            Some(ComboParameter::VariableDcPowerMeasuredCurrent)
        );
        assert_eq!(TModuleParameter::from_id(ParameterId(0xc0000)), None);
        assert!(ComboParameter::VariableDcPowerMeasuredCurrent.is_double());
        assert!(!ComboParameter::AuxOut.is_double());
    }

    #[test]
    fn test_module_slot_conversion() {
        assert_eq!(ModuleSlot::try_from(0), Ok(ModuleSlot::Center));
        assert_eq!(ModuleSlot::try_from(1), Ok(ModuleSlot::Outer));
        assert_eq!(ModuleSlot::try_from(2), Err(ValueError::ModuleSlot(2)));
        assert_eq!(ModuleSlot::Outer.index(), 1);
    }

    #[test]
    fn test_current_range() {
        assert_eq!(
            CurrentMeasurementRange::try_from(2),
            Ok(CurrentMeasurementRange::Milliamps250)
        );
        assert!(CurrentMeasurementRange::try_from(4).is_err());
        assert!((CurrentMeasurementRange::Microamps1250.full_scale_amperes() - 1.28e-3).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_id_display_is_hex() {
        assert_eq!(ComboParameter::AuxIn.id().to_string(), "0xc0003");
    }
}
