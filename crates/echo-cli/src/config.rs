//! Configuration file loading and validation.

use anyhow::{Context, Result};
use lib_echo_ffi::{EntryPoints, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level tool configuration.
///
/// ```toml
/// [library]
/// path = "/opt/echo/libEchoAPI.so"
/// required_symbols = ["AIO_getInputGain", "AIO_setInputGain"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Driver location and binding requirements.
    #[serde(default)]
    pub library: SessionConfig,
}

/// Load configuration from a file.
pub fn load_config(path: &Path) -> Result<CliConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: CliConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)
            .with_context(|| "Failed to parse config as JSON")?
    } else {
        // Assume TOML
        toml::from_str(&content)
            .with_context(|| "Failed to parse config as TOML")?
    };

    validate_config(&config)?;

    Ok(config)
}

/// Validate configuration.
fn validate_config(config: &CliConfig) -> Result<()> {
    if let Some(path) = &config.library.path {
        if path.as_os_str().is_empty() {
            anyhow::bail!("Library path must not be empty");
        }
    }

    // A name outside the catalog never resolves, so no session could start
    for symbol in &config.library.required_symbols {
        if !EntryPoints::CATALOG.contains(&symbol.as_str()) {
            anyhow::bail!("Unknown Echo API symbol in required_symbols: {}", symbol);
        }
    }

    Ok(())
}

/// Session settings from the config file (if any) and the `--path` flag.
///
/// The flag, which clap also fills from `ECHO_API_PATH`, overrides the file;
/// without either the platform default applies.
pub fn session_config(config_path: Option<&Path>, path_override: Option<PathBuf>) -> Result<SessionConfig> {
    let mut session = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from {:?}", path);
            load_config(path)?.library
        }
        None => SessionConfig::default(),
    };

    if let Some(path) = path_override {
        session.path = Some(path);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml() {
        let file = write_temp(
            ".toml",
            r#"
            [library]
            path = "/opt/echo/libEchoAPI.so"
            required_symbols = ["AIO_getInputGain"]
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.library.path, Some(PathBuf::from("/opt/echo/libEchoAPI.so")));
        assert_eq!(config.library.required_symbols, vec!["AIO_getInputGain".to_string()]);
    }

    #[test]
    fn test_load_json() {
        let file = write_temp(".json", r#"{ "library": { "path": "EchoAPI.dll" } }"#);

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.library.path, Some(PathBuf::from("EchoAPI.dll")));
        assert!(config.library.required_symbols.is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_temp(".toml", "");
        assert_eq!(load_config(file.path()).unwrap(), CliConfig::default());
    }

    #[test]
    fn test_unknown_symbol_rejected() {
        let file = write_temp(".toml", "[library]\nrequired_symbols = [\"AIO_makeCoffee\"]\n");

        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("AIO_makeCoffee"));
    }

    #[test]
    fn test_flag_overrides_file() {
        let file = write_temp(".toml", "[library]\npath = \"/from/file.so\"\n");

        let session = session_config(Some(file.path()), Some(PathBuf::from("/from/flag.so"))).unwrap();
        assert_eq!(session.path, Some(PathBuf::from("/from/flag.so")));

        let session = session_config(Some(file.path()), None).unwrap();
        assert_eq!(session.path, Some(PathBuf::from("/from/file.so")));

        let session = session_config(None, None).unwrap();
        assert_eq!(session.library_path(), lib_echo_ffi::default_library_path());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/echo-aio.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("echo-aio.toml"));
    }
}
