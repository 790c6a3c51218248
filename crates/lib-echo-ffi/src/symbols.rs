//! Driver symbol catalog.
//!
//! Every export the binding knows about is declared once in the
//! `entry_points!` invocation below, together with its C signature. Symbols
//! are looked up by exact name; an export that is missing from a given driver
//! build simply stays `None` in the table.

use crate::error::CallError;
use libloading::Library;
use std::collections::HashMap;
use std::ffi::{c_char, c_double, c_int};
use std::fmt;

/// ```c
/// void fn(void);
/// ```
pub type VoidFn = unsafe extern "C" fn();

/// ```c
/// void fn(char* const text, size_t textBufferBytes);
/// ```
pub type TextFn = unsafe extern "C" fn(text: *mut c_char, text_buffer_bytes: usize);

/// ```c
/// int fn(void);
/// ```
pub type QueryFn = unsafe extern "C" fn() -> c_int;

/// ```c
/// int fn(int index);
/// ```
pub type IndexFn = unsafe extern "C" fn(index: c_int) -> c_int;

/// ```c
/// int fn(int index, int* const value);
/// ```
pub type GetIntFn = unsafe extern "C" fn(index: c_int, value: *mut c_int) -> c_int;

/// ```c
/// int fn(int index, int value);
/// ```
pub type SetIntFn = unsafe extern "C" fn(index: c_int, value: c_int) -> c_int;

/// ```c
/// int fn(int index, double* const value);
/// ```
pub type GetDoubleFn = unsafe extern "C" fn(index: c_int, value: *mut c_double) -> c_int;

/// ```c
/// int fn(int index, double value);
/// ```
pub type SetDoubleFn = unsafe extern "C" fn(index: c_int, value: c_double) -> c_int;

/// ```c
/// int AIO_getTEDSProperties(
///     int     inputChannel,
///     char*   jsonText,
///     size_t  jsonBufferBytes,
///     size_t* jsonBytesRequired
/// );
/// ```
pub type TedsFn = unsafe extern "C" fn(
    input_channel: c_int,
    json_text: *mut c_char,
    json_buffer_bytes: usize,
    json_bytes_required: *mut usize,
) -> c_int;

/// ```c
/// int fn(int moduleSlot, int parameter, int* const value);
/// ```
pub type GetModuleIntFn =
    unsafe extern "C" fn(module_slot: c_int, parameter: c_int, value: *mut c_int) -> c_int;

/// ```c
/// int fn(int moduleSlot, int parameter, int value);
/// ```
pub type SetModuleIntFn =
    unsafe extern "C" fn(module_slot: c_int, parameter: c_int, value: c_int) -> c_int;

/// ```c
/// int fn(int moduleSlot, int parameter, double* const value);
/// ```
pub type GetModuleDoubleFn =
    unsafe extern "C" fn(module_slot: c_int, parameter: c_int, value: *mut c_double) -> c_int;

/// ```c
/// int fn(int moduleSlot, int parameter, double value);
/// ```
pub type SetModuleDoubleFn =
    unsafe extern "C" fn(module_slot: c_int, parameter: c_int, value: c_double) -> c_int;

/// ```c
/// int fn(int* value);
/// ```
pub type GetFlagFn = unsafe extern "C" fn(value: *mut c_int) -> c_int;

/// ```c
/// int fn(uint32_t* value);
/// ```
pub type GetU32Fn = unsafe extern "C" fn(value: *mut u32) -> c_int;

/// ```c
/// int fn(uint8_t* value);
/// ```
pub type GetU8Fn = unsafe extern "C" fn(value: *mut u8) -> c_int;

/// ```c
/// int fn(uint8_t value);
/// ```
pub type SetU8Fn = unsafe extern "C" fn(value: u8) -> c_int;

/// ```c
/// int fn(int sdaSelect, int i2cAddress, int registerAddress, int registerLength, uint8_t* data);
/// ```
pub type I2cFn = unsafe extern "C" fn(
    sda_select: c_int,
    i2c_address: c_int,
    register_address: c_int,
    register_length: c_int,
    data: *mut u8,
) -> c_int;

/// Symbols without which no session can be established.
pub const REQUIRED_SYMBOLS: &[&str] = &["AIO_initialize", "AIO_shutdown"];

/// Something symbols can be looked up in.
pub trait SymbolSource {
    /// Look up `symbol` and reinterpret it as `T`.
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer type matching the export's real
    /// signature.
    unsafe fn lookup<T: Copy>(&self, symbol: &str) -> Option<T>;
}

impl SymbolSource for Library {
    unsafe fn lookup<T: Copy>(&self, symbol: &str) -> Option<T> {
        // SAFETY: caller guarantees T matches the export
        match unsafe { self.get::<T>(symbol.as_bytes()) } {
            Ok(sym) => Some(*sym),
            Err(e) => {
                tracing::debug!(symbol, error = %e, "Symbol not exported");
                None
            }
        }
    }
}

/// In-process symbol table.
///
/// Lets a driver that is linked into the process (or a stand-in used by
/// tests) be bound through the same path as a dynamically loaded one.
/// Addresses are stored as `usize` so the table stays `Send`.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address` under `symbol`, replacing any previous entry.
    ///
    /// # Safety
    ///
    /// `address` must point to an `extern "C"` function whose signature is
    /// the one the catalog declares for `symbol`.
    pub unsafe fn insert(&mut self, symbol: impl Into<String>, address: *const ()) {
        self.entries.insert(symbol.into(), address as usize);
    }

    /// Remove `symbol`; returns whether it was present.
    pub fn remove(&mut self, symbol: &str) -> bool {
        self.entries.remove(symbol).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SymbolSource for SymbolTable {
    unsafe fn lookup<T: Copy>(&self, symbol: &str) -> Option<T> {
        let address = *self.entries.get(symbol)?;
        if address == 0 || std::mem::size_of::<T>() != std::mem::size_of::<usize>() {
            return None;
        }
        // SAFETY: size checked above, caller guarantees T matches the export
        Some(unsafe { std::mem::transmute_copy::<usize, T>(&address) })
    }
}

macro_rules! entry_points {
    ($( $(#[$meta:meta])* $field:ident => $symbol:literal : $ty:ty ),* $(,)?) => {
        /// Entry point table resolved from the driver.
        ///
        /// Populated once by [`EntryPoints::resolve`] and immutable afterward.
        #[derive(Clone, Copy, Default)]
        pub struct EntryPoints {
            $( $(#[$meta])* $field: Option<$ty>, )*
        }

        impl EntryPoints {
            /// Every symbol name in the catalog, in declaration order.
            pub const CATALOG: &'static [&'static str] = &[$( $symbol ),*];

            /// Resolve every catalog symbol from `source`.
            pub fn resolve<S: SymbolSource>(source: &S) -> Self {
                Self {
                    // SAFETY: each type is the one declared for the symbol
                    $( $field: unsafe { source.lookup::<$ty>($symbol) }, )*
                }
            }

            /// Whether `symbol` resolved. Names outside the catalog are never present.
            pub fn is_present(&self, symbol: &str) -> bool {
                match symbol {
                    $( $symbol => self.$field.is_some(), )*
                    _ => false,
                }
            }

            $(
                pub(crate) fn $field(&self) -> Result<$ty, CallError> {
                    self.$field.ok_or(CallError::Unavailable { symbol: $symbol })
                }
            )*
        }
    };
}

entry_points! {
    // Lifecycle
    initialize => "AIO_initialize": VoidFn,
    shutdown => "AIO_shutdown": VoidFn,

    // Inquiry
    get_library_version => "AIO_getLibraryVersion": TextFn,
    get_error_string => "AIO_getErrorString": TextFn,
    is_aio_connected => "AIO_isAIOConnected": QueryFn,
    is_ats_connected => "AIO_isATSConnected": QueryFn,
    get_num_input_channels => "AIO_getNumInputChannels": QueryFn,
    get_num_output_channels => "AIO_getNumOutputChannels": QueryFn,
    has_combo_module => "AIO_hasComboModule": IndexFn,
    has_t_module => "AIO_hasTModule": IndexFn,
    has_bluetooth_module => "AIO_hasBluetoothModule": IndexFn,
    get_module_type => "AIO_getModuleType": IndexFn,

    // IEPE microphone inputs
    has_input_gain_control => "AIO_hasInputGainControl": IndexFn,
    get_input_gain => "AIO_getInputGain": GetIntFn,
    set_input_gain => "AIO_setInputGain": SetIntFn,
    set_input_gain_direct => "AIO_setInputGainDirect": SetIntFn,
    has_constant_current_control => "AIO_hasConstantCurrentControl": IndexFn,
    get_constant_current_state => "AIO_getConstantCurrentState": GetIntFn,
    set_constant_current_state => "AIO_setConstantCurrentState": SetIntFn,
    has_teds => "AIO_hasTEDS": IndexFn,
    get_teds_properties => "AIO_getTEDSProperties": TedsFn,

    // AMP outputs
    has_output_gain_control => "AIO_hasOutputGainControl": IndexFn,
    get_output_gain => "AIO_getOutputGain": GetIntFn,
    set_output_gain => "AIO_setOutputGain": SetIntFn,
    has_output_limit_control => "AIO_hasOutputLimitControl": IndexFn,
    get_output_limit_volts => "AIO_getOutputLimitVolts": GetDoubleFn,
    set_output_limit_volts => "AIO_setOutputLimitVolts": SetDoubleFn,

    // Windows audio driver; absent from macOS builds
    get_asio_preferred_buffer_size => "AIO_getASIOPreferredBufferSize": QueryFn,
    set_asio_preferred_buffer_size => "AIO_setASIOPreferredBufferSize": IndexFn,
    get_sample_rate => "AIO_getSampleRate": QueryFn,
    set_sample_rate => "AIO_setSampleRate": IndexFn,
    is_wasapi_enabled => "AIO_isWASAPIEnabled": QueryFn,
    set_wasapi_enabled => "AIO_setWASAPIEnabled": IndexFn,

    // Module and device parameters
    get_module_int_parameter => "AIO_getModuleIntParameter": GetModuleIntFn,
    set_module_int_parameter => "AIO_setModuleIntParameter": SetModuleIntFn,
    get_module_double_parameter => "AIO_getModuleDoubleParameter": GetModuleDoubleFn,
    set_module_double_parameter => "AIO_setModuleDoubleParameter": SetModuleDoubleFn,
    update_tdm => "AIO_updateTDM": IndexFn,
    get_device_int_parameter => "AIO_getDeviceIntParameter": GetIntFn,
    set_device_int_parameter => "AIO_setDeviceIntParameter": SetIntFn,

    // ATS only
    ats_get_serial_number => "ATS_getSerialNumber": GetU32Fn,
    ats_get_aux_out => "ATS_getAuxOut": GetU8Fn,
    ats_set_aux_out => "ATS_setAuxOut": SetU8Fn,
    ats_get_aux_in => "ATS_getAuxIn": GetU8Fn,
    ats_get_digital_io_mode => "ATS_getDigitalIOMode": GetU8Fn,
    ats_set_digital_io_mode => "ATS_setDigitalIOMode": SetU8Fn,
    ats_get_word_clock_terminated => "ATS_getWordClockTerminated": GetFlagFn,
    ats_set_word_clock_terminated => "ATS_setWordClockTerminated": IndexFn,
    ats_get_impedance_mode => "ATS_getImpedanceMode": GetFlagFn,
    ats_set_impedance_mode => "ATS_setImpedanceMode": IndexFn,
    ats_get_analog_input_mode => "ATS_getAnalogInputMode": GetIntFn,
    ats_set_analog_input_mode => "ATS_setAnalogInputMode": SetIntFn,
    ats_get_analog_output_mode => "ATS_getAnalogOutputMode": GetIntFn,
    ats_set_analog_output_mode => "ATS_setAnalogOutputMode": SetIntFn,
    ats_write_i2c => "ATS_writeI2C": I2cFn,
    ats_read_i2c => "ATS_readI2C": I2cFn,
}

impl EntryPoints {
    /// Catalog symbols that did not resolve.
    pub fn missing(&self) -> Vec<&'static str> {
        Self::CATALOG
            .iter()
            .copied()
            .filter(|symbol| !self.is_present(symbol))
            .collect()
    }

    /// Number of catalog symbols that resolved.
    pub fn present_count(&self) -> usize {
        Self::CATALOG.len() - self.missing().len()
    }
}

impl fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoints")
            .field("present", &self.present_count())
            .field("missing", &self.missing())
            .finish()
    }
}
