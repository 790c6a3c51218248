//! Report formatting.

use crate::commands::{GainReport, ParameterReport, ParameterValue, SymbolReport, TdmReport};
use crate::demo::DemoReport;
use crate::OutputFormat;
use anyhow::Result;
use lib_echo_ffi::TedsProperties;
use lib_echo_types::{ChannelConfig, DeviceInfo, ModuleSlot};
use serde::Serialize;
use std::io::{self, Write};

/// Human-readable rendering of a report.
pub trait Render {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()>;
}

/// Write a report in the requested format.
pub fn write_report<T, W>(report: &T, format: OutputFormat, out: &mut W) -> Result<()>
where
    T: Serialize + Render,
    W: Write,
{
    match format {
        OutputFormat::Text => report.write_text(out)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(report)?)?,
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

impl Render for DemoReport {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Echo API version: {}", self.library_version)?;

        let Some(device) = self.device else {
            return writeln!(out, "No device connected");
        };
        writeln!(out, "Device: {}", device)?;

        if let Some(inputs) = self.num_inputs {
            writeln!(out, "Input channels: {}", inputs)?;
        }
        if let Some(outputs) = self.num_outputs {
            writeln!(out, "Output channels: {}", outputs)?;
        }

        if let Some(gain) = &self.gain {
            let channel = gain.channel;
            if !gain.has_control {
                match &gain.error {
                    Some(e) => writeln!(out, "Unable to query channel {} gain control; {}", channel, e)?,
                    None => writeln!(out, "Channel {} does not have gain control", channel)?,
                }
                return Ok(());
            }
            match gain.initial {
                Some(initial) => writeln!(out, "Channel {} gain: {}x", channel, initial)?,
                None => {
                    let error = gain.error.as_deref().unwrap_or("unknown error");
                    return writeln!(out, "Unable to read input gain; {}", error);
                }
            }
            match (gain.updated, &gain.error) {
                (Some(updated), _) => writeln!(out, "Set channel {} gain to: {}x", channel, updated)?,
                (None, Some(e)) => writeln!(out, "Unable to set input gain; {}", e)?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

impl Render for SymbolReport {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Echo API library: {}", self.origin)?;
        writeln!(out, "State: {:?}", self.state)?;
        writeln!(out)?;
        for symbol in &self.symbols {
            let mark = if symbol.present { "present" } else { "absent" };
            writeln!(out, "  {:<32} {}", symbol.name, mark)?;
        }
        let missing = self.missing().count();
        writeln!(out)?;
        writeln!(
            out,
            "{} of {} symbols resolved",
            self.symbols.len() - missing,
            self.symbols.len()
        )
    }
}

impl Render for DeviceInfo {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Echo API version: {}", self.library_version)?;
        match self.device {
            Some(device) => writeln!(out, "Device:           {}", device)?,
            None => return writeln!(out, "No device connected"),
        }
        writeln!(out, "Input channels:   {}", self.num_inputs)?;
        writeln!(out, "Output channels:  {}", self.num_outputs)?;
        for (slot, module) in ModuleSlot::ALL.iter().zip(self.modules.iter()) {
            match module {
                Some(module) => writeln!(out, "Slot {}:  {:?}", slot, module)?,
                None => writeln!(out, "Slot {}:  not reported", slot)?,
            }
        }
        Ok(())
    }
}

impl Render for ChannelConfig {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Input channel {}", self.channel)?;
        writeln!(out, "  Gain control: {}", yes_no(self.has_gain_control))?;
        if let Some(gain) = self.gain {
            writeln!(out, "  Gain:         {}x", gain)?;
        }
        writeln!(out, "  CCP control:  {}", yes_no(self.has_ccp_control))?;
        if let Some(enabled) = self.ccp_enabled {
            writeln!(out, "  CCP enabled:  {}", yes_no(enabled))?;
        }
        writeln!(out, "  TEDS:         {}", yes_no(self.has_teds))
    }
}

impl Render for TedsProperties {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "TEDS properties for input channel {}:", self.channel)?;
        match self.parse() {
            Ok(value) => {
                let pretty = serde_json::to_string_pretty(&value).map_err(io::Error::from)?;
                writeln!(out, "{}", pretty)
            }
            Err(_) => writeln!(out, "{}", self.json),
        }
    }
}

impl Render for GainReport {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Set channel {} gain to: {}x", self.channel, self.gain)
    }
}

impl Render for ParameterReport {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let verb = if self.written { "Set" } else { "Read" };
        match self.value {
            ParameterValue::Int(value) => writeln!(
                out,
                "{} {} module parameter {}: {}",
                verb, self.slot, self.parameter, value
            ),
            ParameterValue::Double(value) => writeln!(
                out,
                "{} {} module parameter {}: {:.6}",
                verb, self.slot, self.parameter, value
            ),
        }
    }
}

impl Render for TdmReport {
    fn write_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Updated TDM settings on {} module", self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::GainReadout;
    use lib_echo_types::{DeviceKind, ModuleType, ParameterId};

    fn text<T: Render>(report: &T) -> String {
        let mut out = Vec::new();
        report.write_text(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_demo_gain_without_control() {
        let report = DemoReport {
            library_version: "2.4.1".to_string(),
            device: Some(DeviceKind::Ats),
            num_inputs: Some(2),
            num_outputs: Some(2),
            gain: Some(GainReadout {
                channel: 0,
                has_control: false,
                initial: None,
                updated: None,
                error: None,
            }),
        };
        assert!(text(&report).ends_with("Channel 0 does not have gain control\n"));
    }

    #[test]
    fn test_demo_gain_read_failure() {
        let report = DemoReport {
            library_version: "2.4.1".to_string(),
            device: Some(DeviceKind::Aio),
            num_inputs: Some(4),
            num_outputs: Some(2),
            gain: Some(GainReadout {
                channel: 0,
                has_control: true,
                initial: None,
                updated: None,
                error: Some("USB command failed (code 7)".to_string()),
            }),
        };
        assert!(text(&report).ends_with("Unable to read input gain; USB command failed (code 7)\n"));
    }

    #[test]
    fn test_device_info_text() {
        let info = DeviceInfo {
            library_version: "2.4.1".to_string(),
            device: Some(DeviceKind::Aio),
            is_aio_connected: true,
            is_ats_connected: false,
            num_inputs: 4,
            num_outputs: 2,
            modules: [Some(ModuleType::C), None],
        };
        let out = text(&info);
        assert!(out.contains("Device:           Echo AIO\n"));
        assert!(out.contains("Slot center (0):  C\n"));
        assert!(out.contains("Slot outer (1):  not reported\n"));
    }

    #[test]
    fn test_json_output() {
        let report = ParameterReport {
            slot: ModuleSlot::Outer,
            parameter: ParameterId(0xd001),
            value: ParameterValue::Int(24),
            written: false,
        };
        let mut out = Vec::new();
        write_report(&report, OutputFormat::Json, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["slot"], "outer");
        assert_eq!(value["parameter"], 0xd001);
        assert_eq!(value["value"], 24);
        assert_eq!(
            text(&report),
            "Read outer (1) module parameter 0xd001: 24\n"
        );
    }
}
