//! Input and output channel controls.
//!
//! Input channels are the IEPE microphone inputs (gain, constant current
//! power, TEDS). Output channels are the AMP outputs (deprecated gain
//! control, output voltage limit).

use crate::error::{CallError, CallResult};
use crate::session::{absent_as_false, input_index, output_index, EchoSession};
use crate::symbols::IndexFn;
use lib_echo_types::{ChannelConfig, InputGain, StatusCode, ATS_GAIN_MULTIPLIERS};
use serde::Serialize;
use std::ffi::{c_char, c_double, c_int};

/// TEDS properties read from a microphone, as the driver's JSON text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TedsProperties {
    pub channel: u32,
    pub json: String,
}

impl TedsProperties {
    /// Parse the JSON text.
    pub fn parse(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.json)
    }
}

impl EchoSession {
    fn input_query(&self, f: IndexFn, channel: u32) -> bool {
        match input_index(channel) {
            Ok(index) => self.call(|| unsafe { f(index) }) != 0,
            Err(_) => false,
        }
    }

    fn output_query(&self, f: IndexFn, channel: u32) -> bool {
        match output_index(channel) {
            Ok(index) => self.call(|| unsafe { f(index) }) != 0,
            Err(_) => false,
        }
    }

    pub fn has_input_gain_control(&self, channel: u32) -> CallResult<bool> {
        let f = self.entry_points().has_input_gain_control()?;
        Ok(self.input_query(f, channel))
    }

    /// Current gain multiplier of an input channel, as the driver reports it.
    pub fn input_gain(&self, channel: u32) -> CallResult<i32> {
        let f = self.entry_points().get_input_gain()?;
        let index = input_index(channel)?;
        let mut gain: c_int = 0;
        self.call_status(|| unsafe { f(index, &mut gain) })?;
        Ok(gain)
    }

    pub fn set_input_gain(&self, channel: u32, gain: InputGain) -> CallResult<()> {
        let f = self.entry_points().set_input_gain()?;
        let index = input_index(channel)?;
        self.call_status(|| unsafe { f(index, gain.multiplier()) })?;
        tracing::debug!(channel, %gain, "Set input gain");
        Ok(())
    }

    /// Set a raw gain multiplier, including the ATS-only 3x and 31x steps.
    ///
    /// Multipliers the driver does not know are rejected with
    /// `InvalidValue` without calling it.
    pub fn set_input_gain_direct(&self, channel: u32, multiplier: i32) -> CallResult<()> {
        let f = self.entry_points().set_input_gain_direct()?;
        let index = input_index(channel)?;
        if !ATS_GAIN_MULTIPLIERS.contains(&multiplier) {
            return Err(StatusCode::InvalidValue.into());
        }
        self.call_status(|| unsafe { f(index, multiplier) })
    }

    pub fn has_constant_current_control(&self, channel: u32) -> CallResult<bool> {
        let f = self.entry_points().has_constant_current_control()?;
        Ok(self.input_query(f, channel))
    }

    /// Whether constant current power is on for an input channel.
    pub fn constant_current_enabled(&self, channel: u32) -> CallResult<bool> {
        let f = self.entry_points().get_constant_current_state()?;
        let index = input_index(channel)?;
        let mut state: c_int = 0;
        self.call_status(|| unsafe { f(index, &mut state) })?;
        Ok(state != 0)
    }

    pub fn set_constant_current_enabled(&self, channel: u32, enabled: bool) -> CallResult<()> {
        let f = self.entry_points().set_constant_current_state()?;
        let index = input_index(channel)?;
        self.call_status(|| unsafe { f(index, c_int::from(enabled)) })
    }

    pub fn has_teds(&self, channel: u32) -> CallResult<bool> {
        let f = self.entry_points().has_teds()?;
        Ok(self.input_query(f, channel))
    }

    /// Read TEDS properties from the microphone on an input channel.
    ///
    /// Asks the driver for the required length first, then reads into a
    /// buffer of that size. A required length of zero yields `{}`.
    pub fn teds_properties(&self, channel: u32) -> CallResult<TedsProperties> {
        let f = self.entry_points().get_teds_properties()?;
        let index = input_index(channel)?;

        let mut required: usize = 0;
        let status = self.call(|| unsafe { f(index, std::ptr::null_mut(), 0, &mut required) });
        match StatusCode::check(status) {
            Ok(()) | Err(StatusCode::BufferTooSmall) => {}
            Err(code) => return Err(code.into()),
        }

        if required == 0 {
            return Ok(TedsProperties {
                channel,
                json: "{}".to_string(),
            });
        }

        let mut buf = vec![0u8; required + 1];
        let len = buf.len();
        let ptr = buf.as_mut_ptr().cast::<c_char>();
        self.call_status(|| unsafe { f(index, ptr, len, &mut required) })?;

        let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(TedsProperties {
            channel,
            json: String::from_utf8_lossy(&buf[..end]).into_owned(),
        })
    }

    /// Capabilities and current settings of an input channel.
    ///
    /// A value that cannot be read is left empty rather than failing the
    /// whole record; calls the driver build does not export count as
    /// "no such control".
    pub fn channel_config(&self, channel: u32) -> CallResult<ChannelConfig> {
        let has_gain_control = self.has_input_gain_control(channel).or_else(absent_as_false)?;
        let has_ccp_control = self
            .has_constant_current_control(channel)
            .or_else(absent_as_false)?;
        let has_teds = self.has_teds(channel).or_else(absent_as_false)?;

        let gain = has_gain_control
            .then(|| self.input_gain(channel))
            .and_then(|read| {
                read.map_err(|e| tracing::debug!(channel, error = %e, "Input gain unreadable"))
                    .ok()
            });
        let ccp_enabled = has_ccp_control
            .then(|| self.constant_current_enabled(channel))
            .and_then(|read| {
                read.map_err(|e| tracing::debug!(channel, error = %e, "CCP state unreadable"))
                    .ok()
            });

        Ok(ChannelConfig {
            channel,
            has_gain_control,
            gain,
            has_ccp_control,
            ccp_enabled,
            has_teds,
        })
    }

    /// Whether an output channel has the deprecated gain control.
    pub fn has_output_gain_control(&self, channel: u32) -> CallResult<bool> {
        let f = self.entry_points().has_output_gain_control()?;
        Ok(self.output_query(f, channel))
    }

    /// Deprecated output gain, 0 through 255.
    pub fn output_gain(&self, channel: u32) -> CallResult<u8> {
        let f = self.entry_points().get_output_gain()?;
        let index = output_index(channel)?;
        let mut gain: c_int = 0;
        self.call_status(|| unsafe { f(index, &mut gain) })?;
        u8::try_from(gain).map_err(|_| CallError::UnexpectedValue {
            symbol: "AIO_getOutputGain",
            value: gain.into(),
        })
    }

    pub fn set_output_gain(&self, channel: u32, gain: u8) -> CallResult<()> {
        let f = self.entry_points().set_output_gain()?;
        let index = output_index(channel)?;
        self.call_status(|| unsafe { f(index, c_int::from(gain)) })
    }

    pub fn has_output_limit_control(&self, channel: u32) -> CallResult<bool> {
        let f = self.entry_points().has_output_limit_control()?;
        Ok(self.output_query(f, channel))
    }

    /// Output voltage limit in volts.
    pub fn output_limit_volts(&self, channel: u32) -> CallResult<f64> {
        let f = self.entry_points().get_output_limit_volts()?;
        let index = output_index(channel)?;
        let mut volts: c_double = 0.0;
        self.call_status(|| unsafe { f(index, &mut volts) })?;
        Ok(volts)
    }

    pub fn set_output_limit_volts(&self, channel: u32, volts: f64) -> CallResult<()> {
        let f = self.entry_points().set_output_limit_volts()?;
        let index = output_index(channel)?;
        if !volts.is_finite() {
            return Err(StatusCode::InvalidValue.into());
        }
        self.call_status(|| unsafe { f(index, volts) })
    }
}
