//! ATS-only controls.
//!
//! These exports exist only in driver builds with ATS support. With an AIO
//! attached the driver reports a failed status.

use crate::error::{CallError, CallResult};
use crate::session::{input_index, output_index, EchoSession};
use lib_echo_types::{AnalogInputMode, AnalogOutputMode, DigitalIoMode, StatusCode};
use serde::{Deserialize, Serialize};
use std::ffi::c_int;

/// Aux output lines, one bit each.
pub const AUX_OUT_MASK: u8 = 0x0f;

/// Register location on one of the ATS I2C buses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cRegister {
    /// Which SDA line the device hangs off.
    pub sda_select: i32,
    /// 7-bit device address.
    pub address: i32,
    pub register: i32,
    /// Width of the register address in bytes.
    pub register_length: i32,
}

impl EchoSession {
    pub fn ats_serial_number(&self) -> CallResult<u32> {
        let f = self.entry_points().ats_get_serial_number()?;
        let mut serial: u32 = 0;
        self.call_status(|| unsafe { f(&mut serial) })?;
        Ok(serial)
    }

    /// Aux output bits, low nibble.
    pub fn ats_aux_out(&self) -> CallResult<u8> {
        let f = self.entry_points().ats_get_aux_out()?;
        let mut bits: u8 = 0;
        self.call_status(|| unsafe { f(&mut bits) })?;
        Ok(bits & AUX_OUT_MASK)
    }

    /// Drive the aux outputs; bits above the low nibble are ignored.
    pub fn set_ats_aux_out(&self, bits: u8) -> CallResult<()> {
        let f = self.entry_points().ats_set_aux_out()?;
        self.call_status(|| unsafe { f(bits & AUX_OUT_MASK) })
    }

    pub fn ats_aux_in(&self) -> CallResult<u8> {
        let f = self.entry_points().ats_get_aux_in()?;
        let mut bits: u8 = 0;
        self.call_status(|| unsafe { f(&mut bits) })?;
        Ok(bits)
    }

    pub fn ats_digital_io_mode(&self) -> CallResult<DigitalIoMode> {
        let f = self.entry_points().ats_get_digital_io_mode()?;
        let mut mode: u8 = 0;
        self.call_status(|| unsafe { f(&mut mode) })?;
        DigitalIoMode::try_from(mode).map_err(|_| CallError::UnexpectedValue {
            symbol: "ATS_getDigitalIOMode",
            value: mode.into(),
        })
    }

    pub fn set_ats_digital_io_mode(&self, mode: DigitalIoMode) -> CallResult<()> {
        let f = self.entry_points().ats_set_digital_io_mode()?;
        self.call_status(|| unsafe { f(mode as u8) })
    }

    pub fn ats_word_clock_terminated(&self) -> CallResult<bool> {
        let f = self.entry_points().ats_get_word_clock_terminated()?;
        let mut terminated: c_int = 0;
        self.call_status(|| unsafe { f(&mut terminated) })?;
        Ok(terminated != 0)
    }

    pub fn set_ats_word_clock_terminated(&self, terminated: bool) -> CallResult<()> {
        let f = self.entry_points().ats_set_word_clock_terminated()?;
        self.call_status(|| unsafe { f(c_int::from(terminated)) })
    }

    /// Whether input impedance measurement mode is on.
    pub fn ats_impedance_mode(&self) -> CallResult<bool> {
        let f = self.entry_points().ats_get_impedance_mode()?;
        let mut enabled: c_int = 0;
        self.call_status(|| unsafe { f(&mut enabled) })?;
        Ok(enabled != 0)
    }

    pub fn set_ats_impedance_mode(&self, enabled: bool) -> CallResult<()> {
        let f = self.entry_points().ats_set_impedance_mode()?;
        self.call_status(|| unsafe { f(c_int::from(enabled)) })
    }

    pub fn ats_analog_input_mode(&self, channel: u32) -> CallResult<AnalogInputMode> {
        let f = self.entry_points().ats_get_analog_input_mode()?;
        let index = input_index(channel)?;
        let mut mode: c_int = 0;
        self.call_status(|| unsafe { f(index, &mut mode) })?;
        AnalogInputMode::try_from(mode).map_err(|_| CallError::UnexpectedValue {
            symbol: "ATS_getAnalogInputMode",
            value: mode.into(),
        })
    }

    pub fn set_ats_analog_input_mode(&self, channel: u32, mode: AnalogInputMode) -> CallResult<()> {
        let f = self.entry_points().ats_set_analog_input_mode()?;
        let index = input_index(channel)?;
        self.call_status(|| unsafe { f(index, mode as c_int) })
    }

    pub fn ats_analog_output_mode(&self, channel: u32) -> CallResult<AnalogOutputMode> {
        let f = self.entry_points().ats_get_analog_output_mode()?;
        let index = output_index(channel)?;
        let mut mode: c_int = 0;
        self.call_status(|| unsafe { f(index, &mut mode) })?;
        AnalogOutputMode::try_from(mode).map_err(|_| CallError::UnexpectedValue {
            symbol: "ATS_getAnalogOutputMode",
            value: mode.into(),
        })
    }

    pub fn set_ats_analog_output_mode(
        &self,
        channel: u32,
        mode: AnalogOutputMode,
    ) -> CallResult<()> {
        let f = self.entry_points().ats_set_analog_output_mode()?;
        let index = output_index(channel)?;
        self.call_status(|| unsafe { f(index, mode as c_int) })
    }

    /// Write one byte to an I2C register.
    pub fn ats_write_i2c(&self, register: I2cRegister, value: u8) -> CallResult<()> {
        let f = self.entry_points().ats_write_i2c()?;
        check_register(&register)?;
        let mut data = value;
        self.call_status(|| unsafe {
            f(
                register.sda_select,
                register.address,
                register.register,
                register.register_length,
                &mut data,
            )
        })
    }

    /// Read one byte from an I2C register.
    pub fn ats_read_i2c(&self, register: I2cRegister) -> CallResult<u8> {
        let f = self.entry_points().ats_read_i2c()?;
        check_register(&register)?;
        let mut data: u8 = 0;
        self.call_status(|| unsafe {
            f(
                register.sda_select,
                register.address,
                register.register,
                register.register_length,
                &mut data,
            )
        })?;
        Ok(data)
    }
}

fn check_register(register: &I2cRegister) -> CallResult<()> {
    if !(0..=0x7f).contains(&register.address) || register.register_length < 0 {
        return Err(StatusCode::InvalidParameter.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeDevice, FakeDriver};

    #[test]
    fn test_serial_and_aux_lines() {
        let driver = FakeDriver::install(FakeDevice::ats());
        let session = driver.library().initialize().unwrap();

        assert_eq!(session.ats_serial_number(), Ok(0x0005_1234));
        session.set_ats_aux_out(0xf5).unwrap();
        assert_eq!(session.ats_aux_out(), Ok(0x05));
        assert_eq!(driver.device().aux_out, 0x05);
        assert_eq!(session.ats_aux_in(), Ok(0x03));
    }

    #[test]
    fn test_ats_calls_fail_on_aio() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        assert_eq!(
            session.ats_serial_number(),
            Err(CallError::Status(StatusCode::NotSupported))
        );
    }

    #[test]
    fn test_modes() {
        let driver = FakeDriver::install(FakeDevice::ats());
        let session = driver.library().initialize().unwrap();

        session.set_ats_digital_io_mode(DigitalIoMode::WordClock).unwrap();
        assert_eq!(session.ats_digital_io_mode(), Ok(DigitalIoMode::WordClock));

        session.set_ats_word_clock_terminated(true).unwrap();
        assert_eq!(session.ats_word_clock_terminated(), Ok(true));

        session.set_ats_impedance_mode(true).unwrap();
        assert_eq!(session.ats_impedance_mode(), Ok(true));

        session.set_ats_analog_input_mode(1, AnalogInputMode::Loopback).unwrap();
        assert_eq!(session.ats_analog_input_mode(1), Ok(AnalogInputMode::Loopback));
        assert_eq!(session.ats_analog_input_mode(0), Ok(AnalogInputMode::Analog));

        session
            .set_ats_analog_output_mode(0, AnalogOutputMode::Headphone)
            .unwrap();
        assert_eq!(session.ats_analog_output_mode(0), Ok(AnalogOutputMode::Headphone));
        assert_eq!(
            session.ats_analog_output_mode(5),
            Err(CallError::Status(StatusCode::InvalidOutputChannel))
        );
    }

    #[test]
    fn test_i2c_roundtrip() {
        let driver = FakeDriver::install(FakeDevice::ats());
        let session = driver.library().initialize().unwrap();
        let register = I2cRegister {
            sda_select: 0,
            address: 0x48,
            register: 0x01,
            register_length: 1,
        };

        session.ats_write_i2c(register, 0x5a).unwrap();
        assert_eq!(session.ats_read_i2c(register), Ok(0x5a));

        let bad = I2cRegister { address: 0x80, ..register };
        assert_eq!(
            session.ats_read_i2c(bad),
            Err(CallError::Status(StatusCode::InvalidParameter))
        );
        assert_eq!(driver.device().count("ATS_readI2C"), 1);
    }
}
