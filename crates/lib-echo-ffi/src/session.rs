//! Driver session lifecycle management.
//!
//! An [`EchoSession`] exists exactly between `AIO_initialize` and
//! `AIO_shutdown`:
//! - Acquiring one loads the library, resolves the catalog and initializes
//!   the driver
//! - Dropping one shuts the driver down, then releases the library
//!
//! The driver keeps its device state process-wide, so at most one session is
//! live per process. All calls into the driver go through a single mutex.

use crate::config::SessionConfig;
use crate::error::{CallError, CallResult, EchoError, EchoResult};
use crate::loader::EchoLibrary;
use crate::symbols::{EntryPoints, TextFn};
use lib_echo_types::{
    DeviceInfo, DeviceKind, ModuleSlot, ModuleType, SessionState, StatusCode,
};
use libloading::Library;
use std::borrow::Cow;
use std::ffi::{c_char, c_int};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Set while a session is live in this process.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Starting buffer size for the version string.
const VERSION_BUFFER_BYTES: usize = 256;

/// Starting buffer size for the error string.
const ERROR_BUFFER_BYTES: usize = 1024;

/// Upper bound when growing text buffers.
const MAX_TEXT_BUFFER_BYTES: usize = 64 * 1024;

/// Fill byte for text buffers, so an unterminated write is detectable.
const UNWRITTEN: u8 = 0xff;

/// Helper trait to recover from poisoned mutexes.
///
/// A caller that panicked while holding the call gate must not lock everyone
/// else out of the device; the gate guards no data of its own.
pub(crate) trait RecoverMutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T>;
}

impl<T> RecoverMutex<T> for Mutex<T> {
    fn lock_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Mutex was poisoned, recovering data");
            poisoned.into_inner()
        })
    }
}

/// A live, initialized driver session.
///
/// Not `Clone`: there is one session per process. It is `Send + Sync`, so it
/// can be shared through an `Arc`; calls from several threads are serialized
/// on an internal mutex. The library stays loaded until the last reference
/// is dropped, so no call can be in flight when it is released.
///
/// ```no_run
/// use lib_echo_ffi::{EchoSession, SessionConfig};
///
/// let session = EchoSession::open(&SessionConfig::default())?;
/// println!("Echo API version: {}", session.library_version()?);
/// // AIO_shutdown and unload happen here, on every exit path
/// drop(session);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EchoSession {
    entries: EntryPoints,

    /// Serializes every call into the driver.
    gate: Mutex<()>,

    /// Path or label the library was bound from.
    origin: String,

    /// Dynamic library handle, released after shutdown.
    module: Option<Library>,
}

impl EchoSession {
    /// Load, bind and initialize the driver described by `config`.
    pub fn open(config: &SessionConfig) -> EchoResult<Self> {
        EchoLibrary::load(config.library_path())?
            .require(config.required_symbols.iter().cloned())
            .initialize()
    }

    pub(crate) fn initialize(library: EchoLibrary) -> EchoResult<Self> {
        if let Some(symbol) = library.first_missing_required() {
            let err = EchoError::symbol_not_found(symbol, library.origin());
            tracing::error!(error = %err, "Cannot bind Echo API");
            return Err(err);
        }

        let (module, entries, origin) = library.into_parts();
        let initialize = entries
            .initialize()
            .map_err(|_| EchoError::symbol_not_found("AIO_initialize", &origin))?;

        if SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(origin = %origin, "Echo API session already active");
            return Err(EchoError::SessionActive);
        }

        // SAFETY: resolved with the catalog signature; first call into the driver
        unsafe { initialize() };

        tracing::info!(origin = %origin, state = ?SessionState::Ready, "Echo API initialized");

        Ok(Self {
            entries,
            gate: Mutex::new(()),
            origin,
            module,
        })
    }

    /// Shut the driver down and release the library now.
    pub fn close(self) {
        drop(self);
    }

    /// Whether a session is live anywhere in this process.
    pub fn is_active() -> bool {
        SESSION_ACTIVE.load(Ordering::SeqCst)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entries
    }

    /// Run `f` while holding the call gate.
    pub(crate) fn call<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.gate.lock_recover();
        f()
    }

    /// Run a status-returning call and decode its status.
    pub(crate) fn call_status(&self, f: impl FnOnce() -> c_int) -> CallResult<()> {
        StatusCode::check(self.call(f)).map_err(CallError::Status)
    }

    /// Read driver text into `buf`.
    ///
    /// The text must be terminated with at least one byte to spare; a
    /// terminator in the last byte cannot be told apart from truncation and
    /// is reported as `BufferTooSmall`.
    fn read_text_into<'a>(&self, f: TextFn, buf: &'a mut [u8]) -> CallResult<Cow<'a, str>> {
        if buf.is_empty() {
            return Err(StatusCode::BufferTooSmall.into());
        }

        buf.fill(UNWRITTEN);
        let len = buf.len();
        let ptr = buf.as_mut_ptr().cast::<c_char>();
        // SAFETY: ptr is valid for len bytes for the duration of the call
        self.call(|| unsafe { f(ptr, len) });

        match buf.iter().position(|&b| b == 0) {
            Some(end) if end + 1 < len => Ok(String::from_utf8_lossy(&buf[..end])),
            _ => Err(StatusCode::BufferTooSmall.into()),
        }
    }

    /// Read driver text, doubling the buffer until it fits.
    fn read_text(&self, f: TextFn, initial: usize) -> CallResult<String> {
        let mut size = initial;
        loop {
            let mut buf = vec![0u8; size];
            match self.read_text_into(f, &mut buf) {
                Ok(text) => return Ok(text.into_owned()),
                Err(CallError::Status(StatusCode::BufferTooSmall)) if size < MAX_TEXT_BUFFER_BYTES => {
                    size *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Driver library version.
    pub fn library_version(&self) -> CallResult<String> {
        let f = self.entries.get_library_version()?;
        self.read_text(f, VERSION_BUFFER_BYTES)
    }

    /// Driver library version, read into a caller-provided buffer.
    ///
    /// Never writes past `buf`. Fails with `BufferTooSmall` when the version
    /// and its terminator do not fit with a byte to spare.
    ///
    /// ```no_run
    /// # use lib_echo_ffi::{EchoSession, SessionConfig};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = EchoSession::open(&SessionConfig::default())?;
    ///
    /// // "2.4.1" and its NUL fill six bytes, which reads as truncated
    /// let mut buf = [0u8; 7];
    /// println!("{}", session.library_version_into(&mut buf)?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn library_version_into<'a>(&self, buf: &'a mut [u8]) -> CallResult<Cow<'a, str>> {
        let f = self.entries.get_library_version()?;
        self.read_text_into(f, buf)
    }

    /// Driver's description of the most recent error.
    pub fn error_string(&self) -> CallResult<String> {
        let f = self.entries.get_error_string()?;
        self.read_text(f, ERROR_BUFFER_BYTES)
    }

    pub fn is_aio_connected(&self) -> CallResult<bool> {
        let f = self.entries.is_aio_connected()?;
        Ok(self.call(|| unsafe { f() }) != 0)
    }

    pub fn is_ats_connected(&self) -> CallResult<bool> {
        let f = self.entries.is_ats_connected()?;
        Ok(self.call(|| unsafe { f() }) != 0)
    }

    /// Total number of input channels.
    pub fn num_input_channels(&self) -> CallResult<i32> {
        let f = self.entries.get_num_input_channels()?;
        Ok(self.call(|| unsafe { f() }))
    }

    /// Total number of output channels.
    pub fn num_output_channels(&self) -> CallResult<i32> {
        let f = self.entries.get_num_output_channels()?;
        Ok(self.call(|| unsafe { f() }))
    }

    /// Whether an AIO-C module sits in `slot`.
    pub fn has_combo_module(&self, slot: ModuleSlot) -> CallResult<bool> {
        let f = self.entries.has_combo_module()?;
        Ok(self.call(|| unsafe { f(slot.index()) }) != 0)
    }

    /// Whether an AIO-T module sits in `slot`.
    pub fn has_t_module(&self, slot: ModuleSlot) -> CallResult<bool> {
        let f = self.entries.has_t_module()?;
        Ok(self.call(|| unsafe { f(slot.index()) }) != 0)
    }

    /// Whether an AIO-B module sits in `slot`.
    pub fn has_bluetooth_module(&self, slot: ModuleSlot) -> CallResult<bool> {
        let f = self.entries.has_bluetooth_module()?;
        Ok(self.call(|| unsafe { f(slot.index()) }) != 0)
    }

    pub fn module_type(&self, slot: ModuleSlot) -> CallResult<ModuleType> {
        let f = self.entries.get_module_type()?;
        Ok(ModuleType::from_raw(self.call(|| unsafe { f(slot.index()) })))
    }

    /// Which device is attached; an ATS takes precedence over an AIO.
    ///
    /// Driver builds without `AIO_isATSConnected` only detect AIO devices.
    pub fn connected_device(&self) -> CallResult<Option<DeviceKind>> {
        match self.is_ats_connected() {
            Ok(true) => return Ok(Some(DeviceKind::Ats)),
            Ok(false) | Err(CallError::Unavailable { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(self.is_aio_connected()?.then_some(DeviceKind::Aio))
    }

    /// Snapshot of the connected device.
    pub fn device_info(&self) -> CallResult<DeviceInfo> {
        let library_version = self.library_version()?;
        let is_ats_connected = self.is_ats_connected().or_else(absent_as_false)?;
        let is_aio_connected = self.is_aio_connected()?;
        let device = if is_ats_connected {
            Some(DeviceKind::Ats)
        } else if is_aio_connected {
            Some(DeviceKind::Aio)
        } else {
            None
        };

        Ok(DeviceInfo {
            library_version,
            device,
            is_aio_connected,
            is_ats_connected,
            num_inputs: self.num_input_channels()?,
            num_outputs: self.num_output_channels()?,
            modules: ModuleSlot::ALL.map(|slot| self.module_type(slot).ok()),
        })
    }
}

impl Drop for EchoSession {
    fn drop(&mut self) {
        match self.entries.shutdown() {
            Ok(shutdown) => {
                // SAFETY: last call into the driver; &mut self rules out calls in flight
                self.call(|| unsafe { shutdown() });
                tracing::debug!(state = ?SessionState::Shutdown, "Echo API shut down");
            }
            Err(e) => tracing::error!(error = %e, "Echo API session had no shutdown entry point"),
        }

        if let Some(module) = self.module.take() {
            if let Err(e) = module.close() {
                tracing::warn!(origin = %self.origin, error = %e, "Error unloading Echo API library");
            }
        }

        SESSION_ACTIVE.store(false, Ordering::SeqCst);
        tracing::info!(origin = %self.origin, state = ?SessionState::Unloaded, "Echo API session closed");
    }
}

/// Treat a missing optional query as a `false` answer.
pub(crate) fn absent_as_false(err: CallError) -> CallResult<bool> {
    match err {
        CallError::Unavailable { .. } => Ok(false),
        other => Err(other),
    }
}

/// Convert an input channel index for the driver.
///
/// Indices that do not fit a C `int` are out of range for any device.
pub(crate) fn input_index(channel: u32) -> CallResult<c_int> {
    c_int::try_from(channel).map_err(|_| StatusCode::InvalidInputChannel.into())
}

/// Convert an output channel index for the driver.
pub(crate) fn output_index(channel: u32) -> CallResult<c_int> {
    c_int::try_from(channel).map_err(|_| StatusCode::InvalidOutputChannel.into())
}
