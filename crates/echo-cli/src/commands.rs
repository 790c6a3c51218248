//! Subcommand implementations.
//!
//! Each command runs against an open session and returns a serializable
//! report; printing is left to [`crate::output`].

use anyhow::{Context, Result};
use lib_echo_ffi::{CallError, EchoLibrary, EchoSession, EntryPoints, TedsProperties};
use lib_echo_types::{
    ChannelConfig, DeviceInfo, InputGain, ModuleSlot, ParameterId, SessionState, StatusCode,
};
use serde::Serialize;
use std::fmt::Display;

/// Presence of every catalog export in a loaded library.
#[derive(Clone, Debug, Serialize)]
pub struct SymbolReport {
    pub origin: String,
    pub state: SessionState,
    pub symbols: Vec<SymbolStatus>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SymbolStatus {
    pub name: &'static str,
    pub present: bool,
}

impl SymbolReport {
    pub fn missing(&self) -> impl Iterator<Item = &SymbolStatus> {
        self.symbols.iter().filter(|s| !s.present)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GainReport {
    pub channel: u32,
    pub requested: i32,
    pub gain: i32,
}

/// A module parameter value as read or written.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i32),
    Double(f64),
}

#[derive(Clone, Debug, Serialize)]
pub struct ParameterReport {
    pub slot: ModuleSlot,
    pub parameter: ParameterId,
    pub value: ParameterValue,
    pub written: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TdmReport {
    pub slot: ModuleSlot,
}

/// Attach the driver's own error text to a failed call.
fn call_failed(session: &EchoSession, err: CallError, action: impl Display) -> anyhow::Error {
    let detail = err
        .status()
        .and_then(|_| session.error_string().ok())
        .filter(|text| !text.is_empty());
    let context = match detail {
        Some(text) => format!("{action} (driver: {text})"),
        None => action.to_string(),
    };
    anyhow::Error::new(err).context(context)
}

/// Reject input channels the device does not have.
fn ensure_input(session: &EchoSession, channel: u32) -> Result<()> {
    let count = session
        .num_input_channels()
        .map_err(|e| call_failed(session, e, "Failed to read input channel count"))?;
    if i64::from(channel) >= i64::from(count) {
        return Err(anyhow::Error::new(CallError::from(StatusCode::InvalidInputChannel))
            .context(format!("Input channel {channel} does not exist ({count} inputs)")));
    }
    Ok(())
}

pub fn symbols(library: &EchoLibrary) -> SymbolReport {
    let entries = library.entry_points();
    SymbolReport {
        origin: library.origin().to_string(),
        state: library.state(),
        symbols: EntryPoints::CATALOG
            .iter()
            .map(|&name| SymbolStatus {
                name,
                present: entries.is_present(name),
            })
            .collect(),
    }
}

pub fn info(session: &EchoSession) -> Result<DeviceInfo> {
    session
        .device_info()
        .map_err(|e| call_failed(session, e, "Failed to read device info"))
}

pub fn channel(session: &EchoSession, channel: u32) -> Result<ChannelConfig> {
    ensure_input(session, channel)?;
    session
        .channel_config(channel)
        .map_err(|e| call_failed(session, e, format!("Failed to read channel {channel}")))
}

pub fn set_gain(session: &EchoSession, channel: u32, gain: InputGain) -> Result<GainReport> {
    session
        .set_input_gain(channel, gain)
        .map_err(|e| call_failed(session, e, format!("Failed to set channel {channel} gain to {gain}")))?;
    let readback = session
        .input_gain(channel)
        .map_err(|e| call_failed(session, e, format!("Failed to read channel {channel} gain")))?;

    if readback != gain.multiplier() {
        tracing::warn!(channel, requested = gain.multiplier(), readback, "Gain readback differs");
    }

    Ok(GainReport {
        channel,
        requested: gain.multiplier(),
        gain: readback,
    })
}

pub fn teds(session: &EchoSession, channel: u32) -> Result<TedsProperties> {
    let teds = session
        .teds_properties(channel)
        .map_err(|e| call_failed(session, e, format!("Failed to read TEDS on channel {channel}")))?;
    if let Err(e) = teds.parse() {
        tracing::warn!(channel, error = %e, "Driver returned TEDS text that is not valid JSON");
    }
    Ok(teds)
}

pub fn module_get(
    session: &EchoSession,
    slot: ModuleSlot,
    parameter: ParameterId,
    double: bool,
) -> Result<ParameterReport> {
    let action = || format!("Failed to read parameter {parameter} from {slot} module");
    let value = if double {
        ParameterValue::Double(
            session
                .module_double_parameter(slot, parameter)
                .map_err(|e| call_failed(session, e, action()))?,
        )
    } else {
        ParameterValue::Int(
            session
                .module_int_parameter(slot, parameter)
                .map_err(|e| call_failed(session, e, action()))?,
        )
    };

    Ok(ParameterReport {
        slot,
        parameter,
        value,
        written: false,
    })
}

pub fn module_set(
    session: &EchoSession,
    slot: ModuleSlot,
    parameter: ParameterId,
    value: &str,
    double: bool,
) -> Result<ParameterReport> {
    let action = || format!("Failed to write parameter {parameter} on {slot} module");
    let value = if double {
        let value: f64 = value
            .parse()
            .with_context(|| format!("'{value}' is not a number"))?;
        session
            .set_module_double_parameter(slot, parameter, value)
            .map_err(|e| call_failed(session, e, action()))?;
        ParameterValue::Double(value)
    } else {
        let value: i32 = value
            .parse()
            .with_context(|| format!("'{value}' is not an integer"))?;
        session
            .set_module_int_parameter(slot, parameter, value)
            .map_err(|e| call_failed(session, e, action()))?;
        ParameterValue::Int(value)
    };

    Ok(ParameterReport {
        slot,
        parameter,
        value,
        written: true,
    })
}

pub fn update_tdm(session: &EchoSession, slot: ModuleSlot) -> Result<TdmReport> {
    session
        .update_tdm(slot)
        .map_err(|e| call_failed(session, e, format!("Failed to update TDM on {slot} module")))?;
    Ok(TdmReport { slot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_echo_ffi::fake::{FakeDevice, FakeDriver};
    use lib_echo_types::ComboParameter;

    #[test]
    fn test_symbols_report_missing() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let library = driver.library_without(&["AIO_getSampleRate"]);

        let report = symbols(&library);
        assert_eq!(report.state, SessionState::Bound);
        assert_eq!(report.symbols.len(), EntryPoints::CATALOG.len());
        let missing: Vec<_> = report.missing().map(|s| s.name).collect();
        assert_eq!(missing, vec!["AIO_getSampleRate"]);
        assert!(driver.device().calls.is_empty());
    }

    #[test]
    fn test_set_gain_reads_back() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        let report = set_gain(&session, 2, InputGain::X100).unwrap();
        assert_eq!(report.gain, 100);
        assert_eq!(report.requested, 100);
    }

    #[test]
    fn test_failed_status_includes_driver_text() {
        let mut device = FakeDevice::aio();
        device.error = "channel 7 is not present".to_string();
        let driver = FakeDriver::install(device);
        let session = driver.library().initialize().unwrap();

        let err = set_gain(&session, 7, InputGain::X10).unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("channel 7 is not present"));
        assert!(text.contains("code 2"));
        assert_eq!(
            err.downcast_ref::<CallError>(),
            Some(&CallError::Status(StatusCode::InvalidInputChannel))
        );
    }

    #[test]
    fn test_channel_rejects_missing_input() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        assert!(channel(&session, 4).is_err());
        let config = channel(&session, 0).unwrap();
        assert!(config.has_gain_control);
    }

    #[test]
    fn test_module_set_then_get() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();
        let parameter = ComboParameter::VariableDcPowerTargetMillivolts.id();

        let report = module_set(&session, ModuleSlot::Center, parameter, "4200", false).unwrap();
        assert!(report.written);
        let report = module_get(&session, ModuleSlot::Center, parameter, false).unwrap();
        assert_eq!(report.value, ParameterValue::Int(4200));

        assert!(module_set(&session, ModuleSlot::Center, parameter, "lots", false).is_err());
    }

    #[test]
    fn test_update_tdm_on_wrong_slot() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        assert!(update_tdm(&session, ModuleSlot::Outer).is_ok());
        let err = update_tdm(&session, ModuleSlot::Center).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CallError>().and_then(CallError::status),
            Some(StatusCode::InvalidModuleSlot)
        );
    }

    #[test]
    fn test_teds_json() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        let properties = teds(&session, 0).unwrap();
        assert_eq!(properties.parse().unwrap()["model"], "130F20");
    }
}
