//! Dynamic library loading for the Echo API driver.
//!
//! This module handles loading the vendor-supplied shared library and
//! resolving the catalog of driver exports.

use crate::error::{EchoError, EchoResult};
use crate::session::EchoSession;
use crate::symbols::{EntryPoints, SymbolSource, REQUIRED_SYMBOLS};
use lib_echo_types::SessionState;
use libloading::Library;
use std::path::{Path, PathBuf};

/// Default driver location for the current platform.
///
/// Windows installs the DLL with the Echo Control Panel; on macOS the dylib is
/// copied from the Control Panel DMG next to the application.
pub fn default_library_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        PathBuf::from("C:/Program Files/Echo Test Interfaces/EchoAPI.dll")
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("./libEchoAPI.dylib")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        PathBuf::from("./libEchoAPI.so")
    }
}

/// What to tell the user when the driver cannot be loaded.
pub(crate) fn install_hint() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "Install the Echo Control Panel, or set the library path to the location of EchoAPI.dll"
    }
    #[cfg(target_os = "macos")]
    {
        "Copy libEchoAPI.dylib from the Echo Control Panel DMG to your project directory, or set the library path"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "Set the library path to the location of the Echo API shared library"
    }
}

/// Loaded driver library with resolved entry points.
///
/// This is the `Loaded`/`Bound` stage of the lifecycle. Nothing has been
/// called in the driver yet; [`EchoLibrary::initialize`] moves it into a
/// ready [`EchoSession`].
pub struct EchoLibrary {
    /// The underlying dynamic library handle; `None` for in-process tables.
    module: Option<Library>,

    /// Where the entry points came from, for diagnostics.
    origin: String,

    entries: EntryPoints,

    /// Symbols the caller needs on top of [`REQUIRED_SYMBOLS`].
    required: Vec<String>,
}

impl EchoLibrary {
    /// Load the driver from a shared library file.
    ///
    /// Absent exports are not an error here; they are reported by
    /// [`EchoLibrary::missing_symbols`] and surface as
    /// [`CallError::Unavailable`](crate::CallError::Unavailable) when called.
    pub fn load<P: AsRef<Path>>(path: P) -> EchoResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let format = LibraryFormat::from_path(path);
        if format != LibraryFormat::Unknown && format != LibraryFormat::native() {
            tracing::warn!(
                path = %path_str,
                ?format,
                native = ?LibraryFormat::native(),
                "Library extension does not match this platform"
            );
        }

        // SAFETY: loading runs the library's initializers; the Echo API has
        // no load-time side effects beyond its own setup.
        let library = unsafe { Library::new(path) }
            .map_err(|e| EchoError::module_not_found(&path_str, e))?;

        let entries = EntryPoints::resolve(&library);
        let missing = entries.missing();

        tracing::info!(
            path = %path_str,
            resolved = entries.present_count(),
            missing = missing.len(),
            "Loaded Echo API library"
        );
        if !missing.is_empty() {
            tracing::debug!(?missing, "Echo API exports not present in this build");
        }

        Ok(Self {
            module: Some(library),
            origin: path_str,
            entries,
            required: Vec::new(),
        })
    }

    /// Bind against symbols that are already in the process.
    pub fn from_symbols<S: SymbolSource>(source: &S, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        let entries = EntryPoints::resolve(source);
        tracing::debug!(
            origin = %origin,
            resolved = entries.present_count(),
            "Bound Echo API entry points"
        );
        Self {
            module: None,
            origin,
            entries,
            required: Vec::new(),
        }
    }

    /// Add symbols that must resolve before a session can start.
    pub fn require<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// `Bound` when every required symbol resolved, `Loaded` otherwise.
    pub fn state(&self) -> SessionState {
        if self.first_missing_required().is_none() {
            SessionState::Bound
        } else {
            SessionState::Loaded
        }
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entries
    }

    pub fn is_present(&self, symbol: &str) -> bool {
        self.entries.is_present(symbol)
    }

    /// Catalog symbols that did not resolve.
    pub fn missing_symbols(&self) -> Vec<&'static str> {
        self.entries.missing()
    }

    /// Path or label the library was bound from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// First required symbol that did not resolve, in check order.
    pub(crate) fn first_missing_required(&self) -> Option<&str> {
        REQUIRED_SYMBOLS
            .iter()
            .copied()
            .chain(self.required.iter().map(String::as_str))
            .find(|symbol| !self.entries.is_present(symbol))
    }

    /// Call `AIO_initialize` and hand back the live session.
    ///
    /// Fails without calling into the driver if a required symbol is missing
    /// or another session is live in this process.
    pub fn initialize(self) -> EchoResult<EchoSession> {
        EchoSession::initialize(self)
    }

    pub(crate) fn into_parts(self) -> (Option<Library>, EntryPoints, String) {
        (self.module, self.entries, self.origin)
    }
}

/// Platform-specific library format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LibraryFormat {
    /// Windows DLL.
    Dll,
    /// Linux/Unix shared object.
    So,
    /// macOS dynamic library.
    Dylib,
    /// Unknown format.
    Unknown,
}

impl LibraryFormat {
    /// Detect format from file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("dll") | Some("DLL") => Self::Dll,
            Some("so") => Self::So,
            Some("dylib") => Self::Dylib,
            _ => Self::Unknown,
        }
    }

    #[cfg(target_os = "windows")]
    pub fn native() -> Self {
        Self::Dll
    }

    #[cfg(target_os = "macos")]
    pub fn native() -> Self {
        Self::Dylib
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    pub fn native() -> Self {
        Self::So
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    #[test]
    fn test_library_format_detection() {
        assert_eq!(LibraryFormat::from_path("EchoAPI.dll"), LibraryFormat::Dll);
        assert_eq!(LibraryFormat::from_path("libEchoAPI.so"), LibraryFormat::So);
        assert_eq!(
            LibraryFormat::from_path("libEchoAPI.dylib"),
            LibraryFormat::Dylib
        );
        assert_eq!(LibraryFormat::from_path("EchoAPI.txt"), LibraryFormat::Unknown);
    }

    #[test]
    fn test_default_path_matches_native_format() {
        assert_eq!(
            LibraryFormat::from_path(default_library_path()),
            LibraryFormat::native()
        );
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let path = std::env::temp_dir().join("echo-aio-does-not-exist").join("libEchoAPI.so");
        let err = match EchoLibrary::load(&path) {
            Ok(_) => panic!("loading a nonexistent library succeeded"),
            Err(e) => e,
        };

        assert!(matches!(err, EchoError::ModuleNotFound { .. }));
        assert!(err.is_fatal());
        let text = err.to_string();
        assert!(text.contains(&path.display().to_string()));
        assert!(text.contains(install_hint()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_foreign_library_resolves_nothing() {
        let library = EchoLibrary::load("libc.so.6").unwrap();
        assert_eq!(library.state(), SessionState::Loaded);
        assert_eq!(library.entry_points().present_count(), 0);
        assert_eq!(library.missing_symbols().len(), EntryPoints::CATALOG.len());

        match library.initialize() {
            Err(EchoError::SymbolNotFound { symbol, library }) => {
                assert_eq!(symbol, "AIO_initialize");
                assert_eq!(library, "libc.so.6");
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("session started against libc"),
        }
    }

    #[test]
    fn test_empty_table_is_loaded_not_bound() {
        let library = EchoLibrary::from_symbols(&SymbolTable::new(), "empty");
        assert_eq!(library.state(), SessionState::Loaded);
        assert_eq!(library.first_missing_required(), Some("AIO_initialize"));
        assert_eq!(library.origin(), "empty");
    }
}
