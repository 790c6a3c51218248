//! # lib-echo-ffi
//!
//! Safe runtime binding for the Echo AIO/ATS driver library.
//!
//! This crate loads the vendor-supplied driver (`EchoAPI.dll`,
//! `libEchoAPI.dylib` or `libEchoAPI.so`) at runtime and exposes a typed,
//! lifecycle-safe call surface over its exports. It handles:
//!
//! - Dynamic library loading with `libloading`
//! - Symbol resolution against a fixed catalog, reporting absent exports
//! - Driver lifecycle management (initialize/shutdown/unload)
//! - Typed wrappers that separate "not exported" from "device said no"
//!
//! All device logic lives in the driver; this crate caches nothing.
//!
//! # Lifecycle
//!
//! ```text
//! EchoLibrary::load ──> Loaded/Bound ──initialize()──> EchoSession (Ready)
//!                                                          │ drop
//!                                          AIO_shutdown, unload, Unloaded
//! ```
//!
//! 1. **One session per process**: the driver's state is global, so a second
//!    concurrent session is refused
//! 2. **Scoped shutdown**: dropping the session shuts the driver down exactly
//!    once, on every exit path, before the library is released
//! 3. **Serialized calls**: a shared session funnels every call through one
//!    mutex

pub mod ats;
pub mod channels;
pub mod config;
pub mod error;
pub mod loader;
pub mod modules;
pub mod session;
pub mod symbols;

#[cfg(any(test, feature = "fake-driver"))]
pub mod fake;

pub use ats::I2cRegister;
pub use channels::TedsProperties;
pub use config::SessionConfig;
pub use error::{CallError, CallResult, EchoError, EchoResult};
pub use loader::{default_library_path, EchoLibrary, LibraryFormat};
pub use session::EchoSession;
pub use symbols::{EntryPoints, SymbolSource, SymbolTable, REQUIRED_SYMBOLS};
