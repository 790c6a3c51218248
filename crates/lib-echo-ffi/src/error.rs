//! Error types for driver binding and driver calls.
//!
//! Binding-time failures ([`EchoError`]) end the attempt to establish a
//! session. Call-time failures ([`CallError`]) are reported per call and
//! leave the session usable.

use lib_echo_types::StatusCode;
use thiserror::Error;

/// Errors that can occur while establishing a driver session.
#[derive(Debug, Error)]
pub enum EchoError {
    /// Failed to load the driver library.
    #[error("Unable to load Echo API library at '{path}': {source}. {hint}")]
    ModuleNotFound {
        path: String,
        hint: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// Required symbol not found in library.
    #[error("Symbol '{symbol}' not found in Echo API library '{library}'")]
    SymbolNotFound { symbol: String, library: String },

    /// Another session is live in this process.
    #[error("An Echo API session is already active in this process")]
    SessionActive,
}

impl EchoError {
    /// Create a load error with the platform's install hint.
    pub fn module_not_found(path: impl Into<String>, source: libloading::Error) -> Self {
        Self::ModuleNotFound {
            path: path.into(),
            hint: crate::loader::install_hint(),
            source,
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(symbol: impl Into<String>, library: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.into(),
            library: library.into(),
        }
    }

    /// Whether retrying with the same configuration is pointless.
    ///
    /// A wrong path or a driver build without the required exports will not
    /// fix itself; an active session goes away once its owner drops it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModuleNotFound { .. } | Self::SymbolNotFound { .. })
    }
}

/// Errors returned by individual driver calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallError {
    /// The export did not resolve in this driver build.
    #[error("Function '{symbol}' is not available in this Echo API library")]
    Unavailable { symbol: &'static str },

    /// The driver reported a non-success status.
    #[error("Echo API call failed: {0}")]
    Status(StatusCode),

    /// The driver returned a value outside its documented range.
    #[error("'{symbol}' returned unexpected value {value}")]
    UnexpectedValue { symbol: &'static str, value: i64 },
}

impl CallError {
    /// Status reported by the device, if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<StatusCode> for CallError {
    fn from(code: StatusCode) -> Self {
        Self::Status(code)
    }
}

/// Result type for session establishment.
pub type EchoResult<T> = Result<T, EchoError>;

/// Result type for driver calls.
pub type CallResult<T> = Result<T, CallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_status() {
        let err = CallError::from(StatusCode::InvalidInputChannel);
        assert_eq!(err.status(), Some(StatusCode::InvalidInputChannel));
        assert!(!err.is_unavailable());

        let err = CallError::Unavailable { symbol: "AIO_getSampleRate" };
        assert_eq!(err.status(), None);
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("AIO_getSampleRate"));
    }

    #[test]
    fn test_symbol_not_found_names_symbol() {
        let err = EchoError::symbol_not_found("AIO_initialize", "/opt/echo/libEchoAPI.so");
        assert!(err.is_fatal());
        let text = err.to_string();
        assert!(text.contains("AIO_initialize"));
        assert!(text.contains("/opt/echo/libEchoAPI.so"));
        assert!(!EchoError::SessionActive.is_fatal());
    }
}
