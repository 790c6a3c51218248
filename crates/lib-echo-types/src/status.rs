//! Driver status codes.
//!
//! Every driver call that can fail returns one of these as a plain `int`.
//! The values are fixed by the driver's C interface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code returned by a driver operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// The call succeeded.
    Ok,
    /// `AIO_initialize` has not been called.
    NotInitialized,
    /// Input channel index out of range.
    InvalidInputChannel,
    /// Output channel index out of range.
    InvalidOutputChannel,
    /// Parameter identifier not recognized.
    InvalidParameter,
    /// TEDS data has an unexpected size.
    InvalidTedsSize,
    /// Requested item was not found.
    NotFound,
    /// USB transfer to the device failed.
    UsbCommandFailed,
    /// Module slot index out of range or slot empty.
    InvalidModuleSlot,
    /// Caller supplied buffer cannot hold the result.
    BufferTooSmall,
    /// Feature not supported by this device or channel.
    NotSupported,
    /// No TEDS device attached to the channel.
    TedsDeviceNotFound,
    /// Value out of range for the parameter.
    InvalidValue,
    /// Raw value outside the documented range.
    ///
    /// Older driver builds report negative codes.
    Unknown(i32),
}

impl StatusCode {
    /// Decode a raw status returned by the driver.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Ok,
            1 => Self::NotInitialized,
            2 => Self::InvalidInputChannel,
            3 => Self::InvalidOutputChannel,
            4 => Self::InvalidParameter,
            5 => Self::InvalidTedsSize,
            6 => Self::NotFound,
            7 => Self::UsbCommandFailed,
            8 => Self::InvalidModuleSlot,
            9 => Self::BufferTooSmall,
            10 => Self::NotSupported,
            11 => Self::TedsDeviceNotFound,
            12 => Self::InvalidValue,
            other => Self::Unknown(other),
        }
    }

    /// Raw integer value as the driver reports it.
    pub fn raw(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::NotInitialized => 1,
            Self::InvalidInputChannel => 2,
            Self::InvalidOutputChannel => 3,
            Self::InvalidParameter => 4,
            Self::InvalidTedsSize => 5,
            Self::NotFound => 6,
            Self::UsbCommandFailed => 7,
            Self::InvalidModuleSlot => 8,
            Self::BufferTooSmall => 9,
            Self::NotSupported => 10,
            Self::TedsDeviceNotFound => 11,
            Self::InvalidValue => 12,
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Ok
    }

    /// Convert a raw status into a `Result`, keeping the failure code.
    pub fn check(raw: i32) -> Result<(), StatusCode> {
        match Self::from_raw(raw) {
            Self::Ok => Ok(()),
            failure => Err(failure),
        }
    }

    /// Short human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "success",
            Self::NotInitialized => "library not initialized",
            Self::InvalidInputChannel => "invalid input channel",
            Self::InvalidOutputChannel => "invalid output channel",
            Self::InvalidParameter => "invalid parameter",
            Self::InvalidTedsSize => "invalid TEDS size",
            Self::NotFound => "not found",
            Self::UsbCommandFailed => "USB command failed",
            Self::InvalidModuleSlot => "invalid module slot",
            Self::BufferTooSmall => "buffer too small",
            Self::NotSupported => "not supported",
            Self::TedsDeviceNotFound => "TEDS device not found",
            Self::InvalidValue => "invalid value",
            Self::Unknown(_) => "unknown status",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description(), self.raw())
    }
}

impl std::error::Error for StatusCode {}

impl From<i32> for StatusCode {
    fn from(raw: i32) -> Self {
        Self::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_codes_decode() {
        assert_eq!(StatusCode::from_raw(0), StatusCode::Ok);
        assert_eq!(StatusCode::from_raw(2), StatusCode::InvalidInputChannel);
        assert_eq!(StatusCode::from_raw(9), StatusCode::BufferTooSmall);
        assert_eq!(StatusCode::from_raw(12), StatusCode::InvalidValue);

        for raw in 0..=12 {
            assert_eq!(StatusCode::from_raw(raw).raw(), raw);
        }
    }

    #[test]
    fn test_undocumented_codes_are_kept() {
        assert_eq!(StatusCode::from_raw(13), StatusCode::Unknown(13));
        assert_eq!(StatusCode::from_raw(-2), StatusCode::Unknown(-2));
        assert_eq!(StatusCode::Unknown(-2).raw(), -2);
    }

    #[test]
    fn test_check() {
        assert!(StatusCode::check(0).is_ok());
        assert_eq!(StatusCode::check(10), Err(StatusCode::NotSupported));
    }

    #[test]
    fn test_display_includes_code() {
        let text = StatusCode::InvalidModuleSlot.to_string();
        assert!(text.contains("invalid module slot"));
        assert!(text.contains("code 8"));
    }
}
