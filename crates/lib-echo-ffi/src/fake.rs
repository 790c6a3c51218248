//! In-process stand-in for the Echo API driver.
//!
//! Exports every catalog symbol as an `extern "C"` function over a simulated
//! device, so the binding can be exercised without hardware or the vendor
//! library. The device is process-global like the real driver's, so
//! [`FakeDriver::install`] serializes its users: hold the returned driver for
//! as long as the device is in use.
//!
//! ```ignore
//! use lib_echo_ffi::fake::{FakeDevice, FakeDriver};
//!
//! let driver = FakeDriver::install(FakeDevice::aio());
//! let session = driver.library().initialize()?;
//! assert_eq!(session.num_input_channels()?, 4);
//! drop(session);
//! assert_eq!(driver.device().count("AIO_shutdown"), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::loader::EchoLibrary;
use crate::session::RecoverMutex;
use crate::symbols::*;
use lib_echo_types::{
    device_parameter, ComboParameter, HeadphoneParameter, ModuleType, ParameterId, StatusCode,
    TModuleParameter, ATS_GAIN_MULTIPLIERS,
};
use std::collections::BTreeMap;
use std::ffi::{c_char, c_double, c_int};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Origin label of libraries bound to the fake driver.
pub const FAKE_ORIGIN: &str = "fake driver";

static DEVICE: OnceLock<Mutex<FakeDevice>> = OnceLock::new();
static INSTALLED: Mutex<()> = Mutex::new(());
static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

/// Simulated device state.
#[derive(Clone, Debug)]
pub struct FakeDevice {
    pub version: String,
    pub error: String,
    pub aio_connected: bool,
    pub ats_connected: bool,
    pub modules: [ModuleType; 2],

    pub input_gain: Vec<i32>,
    pub constant_current: Vec<bool>,
    /// TEDS JSON per input channel, `None` when no TEDS microphone is attached.
    pub teds: Vec<Option<String>>,
    pub output_gain: Vec<i32>,
    pub output_limit_volts: Vec<f64>,

    pub module_int: BTreeMap<(c_int, c_int), c_int>,
    pub module_double: BTreeMap<(c_int, c_int), f64>,
    pub clock_source: c_int,
    pub asio_buffer_size: c_int,
    pub sample_rate: c_int,
    pub wasapi_enabled: bool,

    pub serial_number: u32,
    pub aux_out: u8,
    pub aux_in: u8,
    pub digital_io_mode: u8,
    pub word_clock_terminated: bool,
    pub impedance_mode: bool,
    pub analog_input_mode: Vec<c_int>,
    pub analog_output_mode: Vec<c_int>,
    pub i2c: BTreeMap<(c_int, c_int, c_int), u8>,

    /// Between `AIO_initialize` and `AIO_shutdown`.
    pub initialized: bool,
    /// Every export called, in order.
    pub calls: Vec<&'static str>,
    /// Most exports observed running at the same time.
    pub max_concurrent_calls: usize,
}

impl FakeDevice {
    /// AIO with an AIO-C module in the center slot and an AIO-T in the outer.
    pub fn aio() -> Self {
        let inputs = 4;
        let outputs = 2;
        let mut teds = vec![None; inputs];
        teds[0] = Some(
            r#"{"manufacturer":"PCB Piezotronics","model":"130F20","serial":4711,"sensitivity":0.045}"#
                .to_string(),
        );
        Self {
            version: "2.4.1".to_string(),
            aio_connected: true,
            modules: [ModuleType::C, ModuleType::T],
            input_gain: vec![1; inputs],
            constant_current: vec![false; inputs],
            teds,
            output_gain: vec![0; outputs],
            output_limit_volts: vec![10.0; outputs],
            analog_input_mode: vec![1; inputs],
            analog_output_mode: vec![0; outputs],
            ..Self::base()
        }
    }

    /// ATS with analog and digital boards.
    pub fn ats() -> Self {
        let inputs = 2;
        let outputs = 2;
        Self {
            version: "2.4.1".to_string(),
            ats_connected: true,
            modules: [ModuleType::AtsA, ModuleType::AtsD],
            input_gain: vec![1; inputs],
            constant_current: vec![false; inputs],
            teds: vec![None; inputs],
            output_gain: vec![0; outputs],
            output_limit_volts: vec![10.0; outputs],
            serial_number: 0x0005_1234,
            aux_in: 0x03,
            analog_input_mode: vec![1; inputs],
            analog_output_mode: vec![0; outputs],
            ..Self::base()
        }
    }

    /// Driver present, no hardware attached.
    pub fn disconnected() -> Self {
        Self {
            version: "2.4.1".to_string(),
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            version: String::new(),
            error: String::new(),
            aio_connected: false,
            ats_connected: false,
            modules: [ModuleType::None, ModuleType::None],
            input_gain: Vec::new(),
            constant_current: Vec::new(),
            teds: Vec::new(),
            output_gain: Vec::new(),
            output_limit_volts: Vec::new(),
            module_int: BTreeMap::new(),
            module_double: BTreeMap::new(),
            clock_source: 0,
            asio_buffer_size: 512,
            sample_rate: 48000,
            wasapi_enabled: false,
            serial_number: 0,
            aux_out: 0,
            aux_in: 0,
            digital_io_mode: 0,
            word_clock_terminated: false,
            impedance_mode: false,
            analog_input_mode: Vec::new(),
            analog_output_mode: Vec::new(),
            i2c: BTreeMap::new(),
            initialized: false,
            calls: Vec::new(),
            max_concurrent_calls: 0,
        }
    }

    /// Number of times `symbol` was called.
    pub fn count(&self, symbol: &str) -> usize {
        self.calls.iter().filter(|&&called| called == symbol).count()
    }

    fn num_inputs(&self) -> c_int {
        if self.aio_connected || self.ats_connected {
            self.input_gain.len() as c_int
        } else {
            0
        }
    }

    fn num_outputs(&self) -> c_int {
        if self.aio_connected || self.ats_connected {
            self.output_gain.len() as c_int
        } else {
            0
        }
    }

    fn input(&self, channel: c_int) -> Result<usize, c_int> {
        if !self.initialized {
            return Err(StatusCode::NotInitialized.raw());
        }
        if (0..self.num_inputs()).contains(&channel) {
            Ok(channel as usize)
        } else {
            Err(StatusCode::InvalidInputChannel.raw())
        }
    }

    fn output(&self, channel: c_int) -> Result<usize, c_int> {
        if !self.initialized {
            return Err(StatusCode::NotInitialized.raw());
        }
        if (0..self.num_outputs()).contains(&channel) {
            Ok(channel as usize)
        } else {
            Err(StatusCode::InvalidOutputChannel.raw())
        }
    }

    fn require_ats(&self) -> Result<(), c_int> {
        if !self.initialized {
            Err(StatusCode::NotInitialized.raw())
        } else if !self.ats_connected {
            Err(StatusCode::NotSupported.raw())
        } else {
            Ok(())
        }
    }

    fn module(&self, slot: c_int) -> Result<ModuleType, c_int> {
        if !self.initialized {
            return Err(StatusCode::NotInitialized.raw());
        }
        usize::try_from(slot)
            .ok()
            .and_then(|slot| self.modules.get(slot).copied())
            .ok_or(StatusCode::InvalidModuleSlot.raw())
    }

    fn module_parameter(&self, slot: c_int, parameter: c_int) -> Result<(), c_int> {
        let id = ParameterId(parameter);
        let known = match self.module(slot)? {
            ModuleType::C => ComboParameter::from_id(id).is_some(),
            ModuleType::T => TModuleParameter::from_id(id).is_some(),
            ModuleType::H => HeadphoneParameter::from_id(id).is_some(),
            _ => false,
        };
        if known {
            Ok(())
        } else {
            Err(StatusCode::InvalidParameter.raw())
        }
    }
}

/// Exclusive handle on the fake driver.
pub struct FakeDriver {
    _installed: MutexGuard<'static, ()>,
}

impl FakeDriver {
    /// Replace the simulated device and take exclusive use of the driver.
    ///
    /// Blocks while another `FakeDriver` is alive.
    pub fn install(device: FakeDevice) -> Self {
        let installed = INSTALLED.lock_recover();
        IN_FLIGHT.store(0, Ordering::SeqCst);
        *lock_device() = device;
        Self {
            _installed: installed,
        }
    }

    /// Every catalog export, keyed by its C name.
    pub fn symbols(&self) -> SymbolTable {
        let mut table = SymbolTable::new();
        for (symbol, address) in exports() {
            // SAFETY: exports() casts each function through its catalog type
            unsafe { table.insert(symbol, address) };
        }
        table
    }

    /// A library bound to every export.
    pub fn library(&self) -> EchoLibrary {
        EchoLibrary::from_symbols(&self.symbols(), FAKE_ORIGIN)
    }

    /// A library bound to every export except `absent`.
    pub fn library_without(&self, absent: &[&str]) -> EchoLibrary {
        let mut table = self.symbols();
        for symbol in absent {
            table.remove(symbol);
        }
        EchoLibrary::from_symbols(&table, FAKE_ORIGIN)
    }

    /// Inspect or modify the simulated device.
    pub fn device(&self) -> MutexGuard<'static, FakeDevice> {
        lock_device()
    }
}

fn lock_device() -> MutexGuard<'static, FakeDevice> {
    DEVICE
        .get_or_init(|| Mutex::new(FakeDevice::disconnected()))
        .lock_recover()
}

/// Record the call and run `f` against the device.
fn enter<R>(symbol: &'static str, f: impl FnOnce(&mut FakeDevice) -> R) -> R {
    let depth = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
    std::thread::yield_now();
    let result = {
        let mut device = lock_device();
        device.max_concurrent_calls = device.max_concurrent_calls.max(depth);
        device.calls.push(symbol);
        f(&mut device)
    };
    IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
    result
}

/// Status-returning variant of [`enter`].
fn status(symbol: &'static str, f: impl FnOnce(&mut FakeDevice) -> Result<(), c_int>) -> c_int {
    enter(symbol, f).err().unwrap_or(0)
}

fn query(symbol: &'static str, f: impl FnOnce(&FakeDevice) -> bool) -> c_int {
    enter(symbol, |device| c_int::from(device.initialized && f(device)))
}

/// Store through an out-pointer, rejecting null.
unsafe fn store<T>(out: *mut T, value: T) -> Result<(), c_int> {
    if out.is_null() {
        return Err(StatusCode::InvalidParameter.raw());
    }
    unsafe { out.write(value) };
    Ok(())
}

/// `snprintf`-style copy: truncates to fit and always terminates.
unsafe fn write_text(text: &str, out: *mut c_char, len: usize) {
    if out.is_null() || len == 0 {
        return;
    }
    let n = text.len().min(len - 1);
    unsafe {
        std::ptr::copy_nonoverlapping(text.as_ptr(), out.cast::<u8>(), n);
        out.add(n).write(0);
    }
}

fn valid_flag(value: c_int) -> Result<bool, c_int> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(StatusCode::InvalidValue.raw()),
    }
}

// Lifecycle

unsafe extern "C" fn aio_initialize() {
    enter("AIO_initialize", |device| device.initialized = true);
}

unsafe extern "C" fn aio_shutdown() {
    enter("AIO_shutdown", |device| device.initialized = false);
}

// Inquiry

unsafe extern "C" fn aio_get_library_version(text: *mut c_char, len: usize) {
    enter("AIO_getLibraryVersion", |device| unsafe {
        write_text(&device.version, text, len)
    });
}

unsafe extern "C" fn aio_get_error_string(text: *mut c_char, len: usize) {
    enter("AIO_getErrorString", |device| unsafe { write_text(&device.error, text, len) });
}

unsafe extern "C" fn aio_is_aio_connected() -> c_int {
    query("AIO_isAIOConnected", |device| device.aio_connected)
}

unsafe extern "C" fn aio_is_ats_connected() -> c_int {
    query("AIO_isATSConnected", |device| device.ats_connected)
}

unsafe extern "C" fn aio_get_num_input_channels() -> c_int {
    enter("AIO_getNumInputChannels", |device| device.num_inputs())
}

unsafe extern "C" fn aio_get_num_output_channels() -> c_int {
    enter("AIO_getNumOutputChannels", |device| device.num_outputs())
}

unsafe extern "C" fn aio_has_combo_module(slot: c_int) -> c_int {
    query("AIO_hasComboModule", |device| device.module(slot) == Ok(ModuleType::C))
}

unsafe extern "C" fn aio_has_t_module(slot: c_int) -> c_int {
    query("AIO_hasTModule", |device| device.module(slot) == Ok(ModuleType::T))
}

unsafe extern "C" fn aio_has_bluetooth_module(slot: c_int) -> c_int {
    query("AIO_hasBluetoothModule", |device| device.module(slot) == Ok(ModuleType::B))
}

unsafe extern "C" fn aio_get_module_type(slot: c_int) -> c_int {
    enter("AIO_getModuleType", |device| {
        device.module(slot).unwrap_or(ModuleType::Unknown).raw()
    })
}

// IEPE microphone inputs

unsafe extern "C" fn aio_has_input_gain_control(channel: c_int) -> c_int {
    query("AIO_hasInputGainControl", |device| device.input(channel).is_ok())
}

unsafe extern "C" fn aio_get_input_gain(channel: c_int, gain: *mut c_int) -> c_int {
    status("AIO_getInputGain", |device| {
        let ch = device.input(channel)?;
        unsafe { store(gain, device.input_gain[ch]) }
    })
}

unsafe extern "C" fn aio_set_input_gain(channel: c_int, gain: c_int) -> c_int {
    status("AIO_setInputGain", |device| {
        let ch = device.input(channel)?;
        if ![1, 10, 100].contains(&gain) {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.input_gain[ch] = gain;
        Ok(())
    })
}

unsafe extern "C" fn aio_set_input_gain_direct(channel: c_int, gain: c_int) -> c_int {
    status("AIO_setInputGainDirect", |device| {
        let ch = device.input(channel)?;
        if !ATS_GAIN_MULTIPLIERS.contains(&gain) {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.input_gain[ch] = gain;
        Ok(())
    })
}

unsafe extern "C" fn aio_has_constant_current_control(channel: c_int) -> c_int {
    query("AIO_hasConstantCurrentControl", |device| device.input(channel).is_ok())
}

unsafe extern "C" fn aio_get_constant_current_state(channel: c_int, state: *mut c_int) -> c_int {
    status("AIO_getConstantCurrentState", |device| {
        let ch = device.input(channel)?;
        unsafe { store(state, c_int::from(device.constant_current[ch])) }
    })
}

unsafe extern "C" fn aio_set_constant_current_state(channel: c_int, state: c_int) -> c_int {
    status("AIO_setConstantCurrentState", |device| {
        let ch = device.input(channel)?;
        device.constant_current[ch] = valid_flag(state)?;
        Ok(())
    })
}

unsafe extern "C" fn aio_has_teds(channel: c_int) -> c_int {
    query("AIO_hasTEDS", |device| device.input(channel).is_ok())
}

unsafe extern "C" fn aio_get_teds_properties(
    channel: c_int,
    json: *mut c_char,
    json_bytes: usize,
    required: *mut usize,
) -> c_int {
    status("AIO_getTEDSProperties", |device| {
        let ch = device.input(channel)?;
        let text = device.teds[ch].as_deref().unwrap_or("");
        let needed = if text.is_empty() { 0 } else { text.len() + 1 };
        if !required.is_null() {
            unsafe { required.write(needed) };
        }
        if json.is_null() {
            return Ok(());
        }
        if json_bytes < needed {
            return Err(StatusCode::BufferTooSmall.raw());
        }
        unsafe { write_text(text, json, json_bytes) };
        Ok(())
    })
}

// AMP outputs

unsafe extern "C" fn aio_has_output_gain_control(channel: c_int) -> c_int {
    query("AIO_hasOutputGainControl", |device| device.output(channel).is_ok())
}

unsafe extern "C" fn aio_get_output_gain(channel: c_int, gain: *mut c_int) -> c_int {
    status("AIO_getOutputGain", |device| {
        let ch = device.output(channel)?;
        unsafe { store(gain, device.output_gain[ch]) }
    })
}

unsafe extern "C" fn aio_set_output_gain(channel: c_int, gain: c_int) -> c_int {
    status("AIO_setOutputGain", |device| {
        let ch = device.output(channel)?;
        if !(0..=255).contains(&gain) {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.output_gain[ch] = gain;
        Ok(())
    })
}

unsafe extern "C" fn aio_has_output_limit_control(channel: c_int) -> c_int {
    query("AIO_hasOutputLimitControl", |device| device.output(channel).is_ok())
}

unsafe extern "C" fn aio_get_output_limit_volts(channel: c_int, volts: *mut c_double) -> c_int {
    status("AIO_getOutputLimitVolts", |device| {
        let ch = device.output(channel)?;
        unsafe { store(volts, device.output_limit_volts[ch]) }
    })
}

unsafe extern "C" fn aio_set_output_limit_volts(channel: c_int, volts: c_double) -> c_int {
    status("AIO_setOutputLimitVolts", |device| {
        let ch = device.output(channel)?;
        device.output_limit_volts[ch] = volts;
        Ok(())
    })
}

// Windows audio driver

unsafe extern "C" fn aio_get_asio_preferred_buffer_size() -> c_int {
    enter("AIO_getASIOPreferredBufferSize", |device| device.asio_buffer_size)
}

unsafe extern "C" fn aio_set_asio_preferred_buffer_size(samples: c_int) -> c_int {
    status("AIO_setASIOPreferredBufferSize", |device| {
        if samples <= 0 {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.asio_buffer_size = samples;
        Ok(())
    })
}

unsafe extern "C" fn aio_get_sample_rate() -> c_int {
    enter("AIO_getSampleRate", |device| device.sample_rate)
}

unsafe extern "C" fn aio_set_sample_rate(hz: c_int) -> c_int {
    status("AIO_setSampleRate", |device| {
        if hz <= 0 {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.sample_rate = hz;
        Ok(())
    })
}

unsafe extern "C" fn aio_is_wasapi_enabled() -> c_int {
    enter("AIO_isWASAPIEnabled", |device| c_int::from(device.wasapi_enabled))
}

unsafe extern "C" fn aio_set_wasapi_enabled(enabled: c_int) -> c_int {
    status("AIO_setWASAPIEnabled", |device| {
        device.wasapi_enabled = valid_flag(enabled)?;
        Ok(())
    })
}

// Module and device parameters

unsafe extern "C" fn aio_get_module_int_parameter(
    slot: c_int,
    parameter: c_int,
    value: *mut c_int,
) -> c_int {
    status("AIO_getModuleIntParameter", |device| {
        device.module_parameter(slot, parameter)?;
        let current = device.module_int.get(&(slot, parameter)).copied().unwrap_or(0);
        unsafe { store(value, current) }
    })
}

unsafe extern "C" fn aio_set_module_int_parameter(slot: c_int, parameter: c_int, value: c_int) -> c_int {
    status("AIO_setModuleIntParameter", |device| {
        device.module_parameter(slot, parameter)?;
        device.module_int.insert((slot, parameter), value);
        Ok(())
    })
}

unsafe extern "C" fn aio_get_module_double_parameter(
    slot: c_int,
    parameter: c_int,
    value: *mut c_double,
) -> c_int {
    status("AIO_getModuleDoubleParameter", |device| {
        device.module_parameter(slot, parameter)?;
        let current = device.module_double.get(&(slot, parameter)).copied().unwrap_or(0.0);
        unsafe { store(value, current) }
    })
}

unsafe extern "C" fn aio_set_module_double_parameter(
    slot: c_int,
    parameter: c_int,
    value: c_double,
) -> c_int {
    status("AIO_setModuleDoubleParameter", |device| {
        device.module_parameter(slot, parameter)?;
        device.module_double.insert((slot, parameter), value);
        Ok(())
    })
}

unsafe extern "C" fn aio_update_tdm(slot: c_int) -> c_int {
    status("AIO_updateTDM", |device| match device.module(slot)? {
        ModuleType::T => Ok(()),
        _ => Err(StatusCode::InvalidModuleSlot.raw()),
    })
}

unsafe extern "C" fn aio_get_device_int_parameter(parameter: c_int, value: *mut c_int) -> c_int {
    status("AIO_getDeviceIntParameter", |device| {
        if !device.initialized {
            return Err(StatusCode::NotInitialized.raw());
        }
        if ParameterId(parameter) != device_parameter::CLOCK_SOURCE {
            return Err(StatusCode::InvalidParameter.raw());
        }
        unsafe { store(value, device.clock_source) }
    })
}

unsafe extern "C" fn aio_set_device_int_parameter(parameter: c_int, value: c_int) -> c_int {
    status("AIO_setDeviceIntParameter", |device| {
        if !device.initialized {
            return Err(StatusCode::NotInitialized.raw());
        }
        if ParameterId(parameter) != device_parameter::CLOCK_SOURCE {
            return Err(StatusCode::InvalidParameter.raw());
        }
        if !(0..=3).contains(&value) {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.clock_source = value;
        Ok(())
    })
}

// ATS only

unsafe extern "C" fn ats_get_serial_number(serial: *mut u32) -> c_int {
    status("ATS_getSerialNumber", |device| {
        device.require_ats()?;
        unsafe { store(serial, device.serial_number) }
    })
}

unsafe extern "C" fn ats_get_aux_out(bits: *mut u8) -> c_int {
    status("ATS_getAuxOut", |device| {
        device.require_ats()?;
        unsafe { store(bits, device.aux_out) }
    })
}

unsafe extern "C" fn ats_set_aux_out(bits: u8) -> c_int {
    status("ATS_setAuxOut", |device| {
        device.require_ats()?;
        device.aux_out = bits & 0x0f;
        Ok(())
    })
}

unsafe extern "C" fn ats_get_aux_in(bits: *mut u8) -> c_int {
    status("ATS_getAuxIn", |device| {
        device.require_ats()?;
        unsafe { store(bits, device.aux_in) }
    })
}

unsafe extern "C" fn ats_get_digital_io_mode(mode: *mut u8) -> c_int {
    status("ATS_getDigitalIOMode", |device| {
        device.require_ats()?;
        unsafe { store(mode, device.digital_io_mode) }
    })
}

unsafe extern "C" fn ats_set_digital_io_mode(mode: u8) -> c_int {
    status("ATS_setDigitalIOMode", |device| {
        device.require_ats()?;
        if mode > 1 {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.digital_io_mode = mode;
        Ok(())
    })
}

unsafe extern "C" fn ats_get_word_clock_terminated(terminated: *mut c_int) -> c_int {
    status("ATS_getWordClockTerminated", |device| {
        device.require_ats()?;
        unsafe { store(terminated, c_int::from(device.word_clock_terminated)) }
    })
}

unsafe extern "C" fn ats_set_word_clock_terminated(terminated: c_int) -> c_int {
    status("ATS_setWordClockTerminated", |device| {
        device.require_ats()?;
        device.word_clock_terminated = valid_flag(terminated)?;
        Ok(())
    })
}

unsafe extern "C" fn ats_get_impedance_mode(enabled: *mut c_int) -> c_int {
    status("ATS_getImpedanceMode", |device| {
        device.require_ats()?;
        unsafe { store(enabled, c_int::from(device.impedance_mode)) }
    })
}

unsafe extern "C" fn ats_set_impedance_mode(enabled: c_int) -> c_int {
    status("ATS_setImpedanceMode", |device| {
        device.require_ats()?;
        device.impedance_mode = valid_flag(enabled)?;
        Ok(())
    })
}

unsafe extern "C" fn ats_get_analog_input_mode(channel: c_int, mode: *mut c_int) -> c_int {
    status("ATS_getAnalogInputMode", |device| {
        device.require_ats()?;
        let ch = device.input(channel)?;
        unsafe { store(mode, device.analog_input_mode[ch]) }
    })
}

unsafe extern "C" fn ats_set_analog_input_mode(channel: c_int, mode: c_int) -> c_int {
    status("ATS_setAnalogInputMode", |device| {
        device.require_ats()?;
        let ch = device.input(channel)?;
        if !(0..=1).contains(&mode) {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.analog_input_mode[ch] = mode;
        Ok(())
    })
}

unsafe extern "C" fn ats_get_analog_output_mode(channel: c_int, mode: *mut c_int) -> c_int {
    status("ATS_getAnalogOutputMode", |device| {
        device.require_ats()?;
        let ch = device.output(channel)?;
        unsafe { store(mode, device.analog_output_mode[ch]) }
    })
}

unsafe extern "C" fn ats_set_analog_output_mode(channel: c_int, mode: c_int) -> c_int {
    status("ATS_setAnalogOutputMode", |device| {
        device.require_ats()?;
        let ch = device.output(channel)?;
        if !(0..=2).contains(&mode) {
            return Err(StatusCode::InvalidValue.raw());
        }
        device.analog_output_mode[ch] = mode;
        Ok(())
    })
}

unsafe extern "C" fn ats_write_i2c(
    sda_select: c_int,
    address: c_int,
    register: c_int,
    _register_length: c_int,
    data: *mut u8,
) -> c_int {
    status("ATS_writeI2C", |device| {
        device.require_ats()?;
        if data.is_null() {
            return Err(StatusCode::InvalidParameter.raw());
        }
        let value = unsafe { data.read() };
        device.i2c.insert((sda_select, address, register), value);
        Ok(())
    })
}

unsafe extern "C" fn ats_read_i2c(
    sda_select: c_int,
    address: c_int,
    register: c_int,
    _register_length: c_int,
    data: *mut u8,
) -> c_int {
    status("ATS_readI2C", |device| {
        device.require_ats()?;
        let value = device.i2c.get(&(sda_select, address, register)).copied().unwrap_or(0);
        unsafe { store(data, value) }
    })
}

macro_rules! exports {
    ($( $symbol:literal => $func:ident as $ty:ty ),* $(,)?) => {
        /// Export table; the casts pin each function to its catalog signature.
        fn exports() -> Vec<(&'static str, *const ())> {
            vec![$( ($symbol, $func as $ty as *const ()) ),*]
        }
    };
}

exports! {
    "AIO_initialize" => aio_initialize as VoidFn,
    "AIO_shutdown" => aio_shutdown as VoidFn,
    "AIO_getLibraryVersion" => aio_get_library_version as TextFn,
    "AIO_getErrorString" => aio_get_error_string as TextFn,
    "AIO_isAIOConnected" => aio_is_aio_connected as QueryFn,
    "AIO_isATSConnected" => aio_is_ats_connected as QueryFn,
    "AIO_getNumInputChannels" => aio_get_num_input_channels as QueryFn,
    "AIO_getNumOutputChannels" => aio_get_num_output_channels as QueryFn,
    "AIO_hasComboModule" => aio_has_combo_module as IndexFn,
    "AIO_hasTModule" => aio_has_t_module as IndexFn,
    "AIO_hasBluetoothModule" => aio_has_bluetooth_module as IndexFn,
    "AIO_getModuleType" => aio_get_module_type as IndexFn,
    "AIO_hasInputGainControl" => aio_has_input_gain_control as IndexFn,
    "AIO_getInputGain" => aio_get_input_gain as GetIntFn,
    "AIO_setInputGain" => aio_set_input_gain as SetIntFn,
    "AIO_setInputGainDirect" => aio_set_input_gain_direct as SetIntFn,
    "AIO_hasConstantCurrentControl" => aio_has_constant_current_control as IndexFn,
    "AIO_getConstantCurrentState" => aio_get_constant_current_state as GetIntFn,
    "AIO_setConstantCurrentState" => aio_set_constant_current_state as SetIntFn,
    "AIO_hasTEDS" => aio_has_teds as IndexFn,
    "AIO_getTEDSProperties" => aio_get_teds_properties as TedsFn,
    "AIO_hasOutputGainControl" => aio_has_output_gain_control as IndexFn,
    "AIO_getOutputGain" => aio_get_output_gain as GetIntFn,
    "AIO_setOutputGain" => aio_set_output_gain as SetIntFn,
    "AIO_hasOutputLimitControl" => aio_has_output_limit_control as IndexFn,
    "AIO_getOutputLimitVolts" => aio_get_output_limit_volts as GetDoubleFn,
    "AIO_setOutputLimitVolts" => aio_set_output_limit_volts as SetDoubleFn,
    "AIO_getASIOPreferredBufferSize" => aio_get_asio_preferred_buffer_size as QueryFn,
    "AIO_setASIOPreferredBufferSize" => aio_set_asio_preferred_buffer_size as IndexFn,
    "AIO_getSampleRate" => aio_get_sample_rate as QueryFn,
    "AIO_setSampleRate" => aio_set_sample_rate as IndexFn,
    "AIO_isWASAPIEnabled" => aio_is_wasapi_enabled as QueryFn,
    "AIO_setWASAPIEnabled" => aio_set_wasapi_enabled as IndexFn,
    "AIO_getModuleIntParameter" => aio_get_module_int_parameter as GetModuleIntFn,
    "AIO_setModuleIntParameter" => aio_set_module_int_parameter as SetModuleIntFn,
    "AIO_getModuleDoubleParameter" => aio_get_module_double_parameter as GetModuleDoubleFn,
    "AIO_setModuleDoubleParameter" => aio_set_module_double_parameter as SetModuleDoubleFn,
    "AIO_updateTDM" => aio_update_tdm as IndexFn,
    "AIO_getDeviceIntParameter" => aio_get_device_int_parameter as GetIntFn,
    "AIO_setDeviceIntParameter" => aio_set_device_int_parameter as SetIntFn,
    "ATS_getSerialNumber" => ats_get_serial_number as GetU32Fn,
    "ATS_getAuxOut" => ats_get_aux_out as GetU8Fn,
    "ATS_setAuxOut" => ats_set_aux_out as SetU8Fn,
    "ATS_getAuxIn" => ats_get_aux_in as GetU8Fn,
    "ATS_getDigitalIOMode" => ats_get_digital_io_mode as GetU8Fn,
    "ATS_setDigitalIOMode" => ats_set_digital_io_mode as SetU8Fn,
    "ATS_getWordClockTerminated" => ats_get_word_clock_terminated as GetFlagFn,
    "ATS_setWordClockTerminated" => ats_set_word_clock_terminated as IndexFn,
    "ATS_getImpedanceMode" => ats_get_impedance_mode as GetFlagFn,
    "ATS_setImpedanceMode" => ats_set_impedance_mode as IndexFn,
    "ATS_getAnalogInputMode" => ats_get_analog_input_mode as GetIntFn,
    "ATS_setAnalogInputMode" => ats_set_analog_input_mode as SetIntFn,
    "ATS_getAnalogOutputMode" => ats_get_analog_output_mode as GetIntFn,
    "ATS_setAnalogOutputMode" => ats_set_analog_output_mode as SetIntFn,
    "ATS_writeI2C" => ats_write_i2c as I2cFn,
    "ATS_readI2C" => ats_read_i2c as I2cFn,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_echo_types::SessionState;

    #[test]
    fn test_exports_cover_catalog() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let symbols = driver.symbols();
        assert_eq!(symbols.len(), EntryPoints::CATALOG.len());

        let library = driver.library();
        assert!(library.missing_symbols().is_empty());
        assert_eq!(library.state(), SessionState::Bound);
        assert_eq!(library.origin(), FAKE_ORIGIN);
    }

    #[test]
    fn test_calls_before_initialize_rejected() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let entries = *driver.library().entry_points();

        let get_gain = entries.get_input_gain().unwrap();
        let mut gain = 0;
        assert_eq!(unsafe { get_gain(0, &mut gain) }, StatusCode::NotInitialized.raw());
        assert_eq!(unsafe { get_gain(0, std::ptr::null_mut()) }, StatusCode::NotInitialized.raw());
    }

    #[test]
    fn test_ats_exports_need_initialized_ats() {
        let driver = FakeDriver::install(FakeDevice::ats());
        let entries = *driver.library().entry_points();
        let get_serial = entries.ats_get_serial_number().unwrap();
        let mut serial = 0u32;
        assert_eq!(unsafe { get_serial(&mut serial) }, StatusCode::NotInitialized.raw());

        let session = driver.library().initialize().unwrap();
        assert_eq!(session.call(|| unsafe { get_serial(&mut serial) }), StatusCode::Ok.raw());
        assert_eq!(serial, 0x0005_1234);
        drop(session);
        drop(driver);

        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();
        assert_eq!(
            session.call(|| unsafe { get_serial(&mut serial) }),
            StatusCode::NotSupported.raw()
        );
    }

    #[test]
    fn test_null_out_pointer_rejected() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        let get_gain = session.entry_points().get_input_gain().unwrap();
        let status = session.call(|| unsafe { get_gain(0, std::ptr::null_mut()) });
        assert_eq!(status, StatusCode::InvalidParameter.raw());
    }
}
