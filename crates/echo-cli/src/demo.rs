//! End-to-end driver walkthrough.
//!
//! Reads the library version, identifies the attached device, then (only when
//! a device is attached) reads the channel counts and exercises the gain
//! control on input channel 0.

use anyhow::{Context, Result};
use lib_echo_ffi::EchoSession;
use lib_echo_types::{DeviceKind, InputGain};
use serde::Serialize;

/// Input channel the demo reads and adjusts.
pub const DEMO_CHANNEL: u32 = 0;

/// Gain the demo switches the channel to.
pub const DEMO_GAIN: InputGain = InputGain::X10;

/// What the demo observed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DemoReport {
    pub library_version: String,
    pub device: Option<DeviceKind>,
    pub num_inputs: Option<i32>,
    pub num_outputs: Option<i32>,
    pub gain: Option<GainReadout>,
}

/// Gain control results for [`DEMO_CHANNEL`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GainReadout {
    pub channel: u32,
    pub has_control: bool,
    /// Gain before the demo changed it.
    pub initial: Option<i32>,
    /// Gain read back after setting [`DEMO_GAIN`].
    pub updated: Option<i32>,
    /// Failure reading or setting the gain; does not fail the demo.
    pub error: Option<String>,
}

/// Run the walkthrough against an open session.
pub fn run_demo(session: &EchoSession) -> Result<DemoReport> {
    let library_version = session
        .library_version()
        .context("Failed to read library version")?;
    tracing::info!("Echo API version: {}", library_version);

    let device = session
        .connected_device()
        .context("Failed to detect connected device")?;

    let Some(kind) = device else {
        tracing::info!("No device connected");
        return Ok(DemoReport {
            library_version,
            device: None,
            num_inputs: None,
            num_outputs: None,
            gain: None,
        });
    };
    tracing::info!("Device: {}", kind);

    let num_inputs = session
        .num_input_channels()
        .context("Failed to read input channel count")?;
    let num_outputs = session
        .num_output_channels()
        .context("Failed to read output channel count")?;

    Ok(DemoReport {
        library_version,
        device,
        num_inputs: Some(num_inputs),
        num_outputs: Some(num_outputs),
        gain: Some(gain_readout(session)),
    })
}

fn gain_readout(session: &EchoSession) -> GainReadout {
    let mut readout = GainReadout {
        channel: DEMO_CHANNEL,
        has_control: false,
        initial: None,
        updated: None,
        error: None,
    };

    match session.has_input_gain_control(DEMO_CHANNEL) {
        Ok(true) => readout.has_control = true,
        Ok(false) => return readout,
        Err(e) => {
            readout.error = Some(e.to_string());
            return readout;
        }
    }

    let result = session.input_gain(DEMO_CHANNEL).and_then(|gain| {
        readout.initial = Some(gain);
        session.set_input_gain(DEMO_CHANNEL, DEMO_GAIN)?;
        session.input_gain(DEMO_CHANNEL)
    });

    match result {
        Ok(gain) => readout.updated = Some(gain),
        Err(e) => {
            tracing::warn!(channel = DEMO_CHANNEL, error = %e, "Gain demo failed");
            readout.error = Some(e.to_string());
        }
    }
    readout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Render;
    use lib_echo_ffi::fake::{FakeDevice, FakeDriver};

    fn render(report: &DemoReport) -> String {
        let mut out = Vec::new();
        report.write_text(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_demo_with_aio() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver.library().initialize().unwrap();

        let report = run_demo(&session).unwrap();
        drop(session);

        assert_eq!(report.library_version, "2.4.1");
        assert_eq!(report.device, Some(DeviceKind::Aio));
        assert_eq!(report.num_inputs, Some(4));
        assert_eq!(report.num_outputs, Some(2));
        let gain = report.gain.as_ref().unwrap();
        assert_eq!(gain.initial, Some(1));
        assert_eq!(gain.updated, Some(10));

        assert_eq!(
            render(&report),
            "Echo API version: 2.4.1\n\
             Device: Echo AIO\n\
             Input channels: 4\n\
             Output channels: 2\n\
             Channel 0 gain: 1x\n\
             Set channel 0 gain to: 10x\n"
        );
        assert_eq!(driver.device().input_gain[0], 10);
    }

    #[test]
    fn test_demo_with_ats() {
        let driver = FakeDriver::install(FakeDevice::ats());
        let session = driver.library().initialize().unwrap();

        let report = run_demo(&session).unwrap();
        assert_eq!(report.device, Some(DeviceKind::Ats));
        assert!(render(&report).contains("Device: Echo ATS\n"));
    }

    #[test]
    fn test_demo_without_device_skips_channel_queries() {
        let driver = FakeDriver::install(FakeDevice::disconnected());
        let session = driver.library().initialize().unwrap();

        let report = run_demo(&session).unwrap();
        drop(session);

        assert_eq!(report.device, None);
        assert_eq!(render(&report), "Echo API version: 2.4.1\nNo device connected\n");

        let device = driver.device();
        assert_eq!(
            device.calls,
            vec![
                "AIO_initialize",
                "AIO_getLibraryVersion",
                "AIO_isATSConnected",
                "AIO_isAIOConnected",
                "AIO_shutdown",
            ]
        );
    }

    #[test]
    fn test_demo_without_gain_control_symbol() {
        let driver = FakeDriver::install(FakeDevice::aio());
        let session = driver
            .library_without(&["AIO_hasInputGainControl"])
            .initialize()
            .unwrap();

        let report = run_demo(&session).unwrap();
        let gain = report.gain.as_ref().unwrap();
        assert!(!gain.has_control);
        assert!(gain.error.as_deref().unwrap().contains("AIO_hasInputGainControl"));
        assert_eq!(driver.device().count("AIO_getInputGain"), 0);
    }
}
