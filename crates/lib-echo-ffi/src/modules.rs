//! Module parameters, device parameters and Windows audio driver settings.

use crate::error::{CallError, CallResult};
use crate::session::EchoSession;
use lib_echo_types::{device_parameter, ClockSource, ModuleSlot, ParameterId};
use std::ffi::{c_double, c_int};

impl EchoSession {
    /// Read an integer parameter from the module in `slot`.
    pub fn module_int_parameter(
        &self,
        slot: ModuleSlot,
        parameter: impl Into<ParameterId>,
    ) -> CallResult<i32> {
        let f = self.entry_points().get_module_int_parameter()?;
        let id = parameter.into();
        let mut value: c_int = 0;
        self.call_status(|| unsafe { f(slot.index(), id.raw(), &mut value) })?;
        Ok(value)
    }

    /// Write an integer parameter to the module in `slot`.
    ///
    /// AIO-T parameters take effect after [`EchoSession::update_tdm`].
    pub fn set_module_int_parameter(
        &self,
        slot: ModuleSlot,
        parameter: impl Into<ParameterId>,
        value: i32,
    ) -> CallResult<()> {
        let f = self.entry_points().set_module_int_parameter()?;
        let id = parameter.into();
        self.call_status(|| unsafe { f(slot.index(), id.raw(), value) })?;
        tracing::debug!(%slot, parameter = %id, value, "Set module parameter");
        Ok(())
    }

    pub fn module_double_parameter(
        &self,
        slot: ModuleSlot,
        parameter: impl Into<ParameterId>,
    ) -> CallResult<f64> {
        let f = self.entry_points().get_module_double_parameter()?;
        let id = parameter.into();
        let mut value: c_double = 0.0;
        self.call_status(|| unsafe { f(slot.index(), id.raw(), &mut value) })?;
        Ok(value)
    }

    pub fn set_module_double_parameter(
        &self,
        slot: ModuleSlot,
        parameter: impl Into<ParameterId>,
        value: f64,
    ) -> CallResult<()> {
        let f = self.entry_points().set_module_double_parameter()?;
        let id = parameter.into();
        self.call_status(|| unsafe { f(slot.index(), id.raw(), value) })?;
        tracing::debug!(%slot, parameter = %id, value, "Set module parameter");
        Ok(())
    }

    /// Push pending AIO-T settings to the hardware.
    pub fn update_tdm(&self, slot: ModuleSlot) -> CallResult<()> {
        let f = self.entry_points().update_tdm()?;
        self.call_status(|| unsafe { f(slot.index()) })
    }

    pub fn device_int_parameter(&self, parameter: impl Into<ParameterId>) -> CallResult<i32> {
        let f = self.entry_points().get_device_int_parameter()?;
        let id = parameter.into();
        let mut value: c_int = 0;
        self.call_status(|| unsafe { f(id.raw(), &mut value) })?;
        Ok(value)
    }

    pub fn set_device_int_parameter(
        &self,
        parameter: impl Into<ParameterId>,
        value: i32,
    ) -> CallResult<()> {
        let f = self.entry_points().set_device_int_parameter()?;
        let id = parameter.into();
        self.call_status(|| unsafe { f(id.raw(), value) })
    }

    pub fn clock_source(&self) -> CallResult<ClockSource> {
        let raw = self.device_int_parameter(device_parameter::CLOCK_SOURCE)?;
        ClockSource::try_from(raw).map_err(|_| CallError::UnexpectedValue {
            symbol: "AIO_getDeviceIntParameter",
            value: raw.into(),
        })
    }

    pub fn set_clock_source(&self, source: ClockSource) -> CallResult<()> {
        self.set_device_int_parameter(device_parameter::CLOCK_SOURCE, source as i32)
    }

    /// ASIO preferred buffer size in samples (Windows driver builds).
    pub fn asio_preferred_buffer_size(&self) -> CallResult<i32> {
        let f = self.entry_points().get_asio_preferred_buffer_size()?;
        Ok(self.call(|| unsafe { f() }))
    }

    pub fn set_asio_preferred_buffer_size(&self, samples: i32) -> CallResult<()> {
        let f = self.entry_points().set_asio_preferred_buffer_size()?;
        self.call_status(|| unsafe { f(samples) })
    }

    /// Current sample rate in Hz (Windows driver builds).
    pub fn sample_rate(&self) -> CallResult<i32> {
        let f = self.entry_points().get_sample_rate()?;
        Ok(self.call(|| unsafe { f() }))
    }

    pub fn set_sample_rate(&self, hz: i32) -> CallResult<()> {
        let f = self.entry_points().set_sample_rate()?;
        self.call_status(|| unsafe { f(hz) })
    }

    pub fn is_wasapi_enabled(&self) -> CallResult<bool> {
        let f = self.entry_points().is_wasapi_enabled()?;
        Ok(self.call(|| unsafe { f() }) != 0)
    }

    pub fn set_wasapi_enabled(&self, enabled: bool) -> CallResult<()> {
        let f = self.entry_points().set_wasapi_enabled()?;
        self.call_status(|| unsafe { f(c_int::from(enabled)) })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CallError;
    use crate::fake::{FakeDevice, FakeDriver};
    use lib_echo_types::{
        ClockSource, ComboParameter, ModuleSlot, ParameterId, StatusCode, TModuleParameter,
    };

    #[test]
    fn test_combo_parameters() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        session
            .set_module_int_parameter(
                ModuleSlot::Center,
                ComboParameter::VariableDcPowerTargetMillivolts,
                3300,
            )
            .unwrap();
        assert_eq!(
            session.module_int_parameter(
                ModuleSlot::Center,
                ComboParameter::VariableDcPowerTargetMillivolts
            ),
            Ok(3300)
        );

        session
            .set_module_double_parameter(ModuleSlot::Center, ComboParameter::OverCurrentThreshold, 0.1)
            .unwrap();
        assert_eq!(
            session.module_double_parameter(ModuleSlot::Center, ComboParameter::OverCurrentThreshold),
            Ok(0.1)
        );
    }

    #[test]
    fn test_parameter_on_wrong_module_rejected() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        // Outer slot holds the AIO-T module
        assert_eq!(
            session.module_int_parameter(ModuleSlot::Outer, ComboParameter::AuxOut),
            Err(CallError::Status(StatusCode::InvalidParameter))
        );
        assert_eq!(
            session.module_int_parameter(ModuleSlot::Center, ParameterId(0x1234)),
            Err(CallError::Status(StatusCode::InvalidParameter))
        );
    }

    #[test]
    fn test_tdm_update() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        session
            .set_module_int_parameter(ModuleSlot::Outer, TModuleParameter::BitsPerWord, 24)
            .unwrap();
        session.update_tdm(ModuleSlot::Outer).unwrap();
        assert_eq!(
            session.module_int_parameter(ModuleSlot::Outer, TModuleParameter::BitsPerWord),
            Ok(24)
        );
        assert_eq!(
            session.update_tdm(ModuleSlot::Center),
            Err(CallError::Status(StatusCode::InvalidModuleSlot))
        );
    }

    #[test]
    fn test_clock_source() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        assert_eq!(session.clock_source(), Ok(ClockSource::Internal));
        session.set_clock_source(ClockSource::OuterModule).unwrap();
        assert_eq!(session.clock_source(), Ok(ClockSource::OuterModule));

        driver.device().clock_source = 9;
        assert_eq!(
            session.clock_source(),
            Err(CallError::UnexpectedValue {
                symbol: "AIO_getDeviceIntParameter",
                value: 9
            })
        );
    }

    #[test]
    fn test_windows_audio_settings_optional() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver
            .library_without(&["AIO_getSampleRate", "AIO_setSampleRate"])
            .initialize()
            .unwrap();

        assert_eq!(
            session.sample_rate(),
            Err(CallError::Unavailable { symbol: "AIO_getSampleRate" })
        );
        session.set_asio_preferred_buffer_size(256).unwrap();
        assert_eq!(session.asio_preferred_buffer_size(), Ok(256));
        session.set_wasapi_enabled(true).unwrap();
        assert_eq!(session.is_wasapi_enabled(), Ok(true));
    }
}
