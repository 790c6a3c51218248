//! Session configuration.

use crate::loader::default_library_path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to locate and bind the driver.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Override the default module location.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Exports that must resolve in addition to initialize/shutdown.
    #[serde(default)]
    pub required_symbols: Vec<String>,
}

impl SessionConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Configured path, or the platform default.
    pub fn library_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_library_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_platform_path() {
        assert_eq!(SessionConfig::default().library_path(), default_library_path());
    }

    #[test]
    fn test_override_path() {
        let config = SessionConfig::with_path("/opt/echo/libEchoAPI.so");
        assert_eq!(config.library_path(), PathBuf::from("/opt/echo/libEchoAPI.so"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "required_symbols": ["AIO_getInputGain"] }"#).unwrap();
        assert_eq!(config.path, None);
        assert_eq!(config.required_symbols, vec!["AIO_getInputGain".to_string()]);
    }
}
