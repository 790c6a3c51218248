//! echo-aio: command-line access to Echo AIO and ATS devices.
//!
//! This is the main entry point for the Echo driver tool.

mod commands;
mod config;
mod demo;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lib_echo_ffi::{EchoLibrary, EchoSession, SessionConfig};
use lib_echo_types::{InputGain, ModuleSlot, ParameterId};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "echo-aio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the Echo API library
    #[arg(short, long, env = "ECHO_API_PATH")]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, attached device, channel counts and channel 0 gain
    Demo,

    /// Report which driver exports are present, without initializing
    Symbols,

    /// Show the connected device and its modules
    Info,

    /// Show capabilities and settings of an input channel
    Channel {
        /// Input channel, starting at 0
        channel: u32,
    },

    /// Set the gain of an input channel
    SetGain {
        /// Input channel, starting at 0
        channel: u32,

        /// Gain multiplier (1, 10 or 100)
        #[arg(value_parser = parse_gain)]
        gain: InputGain,
    },

    /// Read TEDS properties from the microphone on an input channel
    Teds {
        /// Input channel, starting at 0
        channel: u32,
    },

    /// Read or write a module parameter
    Module {
        #[command(subcommand)]
        action: ModuleAction,
    },

    /// Apply pending AIO-T settings
    UpdateTdm {
        /// Module slot (0/center or 1/outer)
        #[arg(value_parser = parse_slot)]
        slot: ModuleSlot,
    },
}

#[derive(Subcommand)]
enum ModuleAction {
    /// Read a parameter
    Get {
        /// Module slot (0/center or 1/outer)
        #[arg(value_parser = parse_slot)]
        slot: ModuleSlot,

        /// Parameter id, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_parameter)]
        parameter: ParameterId,

        /// Read as a double instead of an integer
        #[arg(long)]
        double: bool,
    },

    /// Write a parameter
    Set {
        /// Module slot (0/center or 1/outer)
        #[arg(value_parser = parse_slot)]
        slot: ModuleSlot,

        /// Parameter id, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_parameter)]
        parameter: ParameterId,

        /// New value
        #[arg(allow_negative_numbers = true)]
        value: String,

        /// Write as a double instead of an integer
        #[arg(long)]
        double: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let session_config = config::session_config(cli.config.as_deref(), cli.path)?;
    let format = cli.format;

    match cli.command {
        Commands::Symbols => {
            let library_path = session_config.library_path();
            let library = EchoLibrary::load(&library_path)
                .with_context(|| format!("Failed to load {:?}", library_path))?
                .require(session_config.required_symbols.iter().cloned());
            let report = commands::symbols(&library);
            output::write_report(&report, format, &mut std::io::stdout().lock())
        }
        Commands::Demo => with_session(&session_config, format, demo::run_demo),
        Commands::Info => with_session(&session_config, format, commands::info),
        Commands::Channel { channel } => {
            with_session(&session_config, format, |s| commands::channel(s, channel))
        }
        Commands::SetGain { channel, gain } => {
            with_session(&session_config, format, |s| commands::set_gain(s, channel, gain))
        }
        Commands::Teds { channel } => {
            with_session(&session_config, format, |s| commands::teds(s, channel))
        }
        Commands::Module {
            action: ModuleAction::Get { slot, parameter, double },
        } => with_session(&session_config, format, |s| {
            commands::module_get(s, slot, parameter, double)
        }),
        Commands::Module {
            action: ModuleAction::Set { slot, parameter, value, double },
        } => with_session(&session_config, format, |s| {
            commands::module_set(s, slot, parameter, &value, double)
        }),
        Commands::UpdateTdm { slot } => {
            with_session(&session_config, format, |s| commands::update_tdm(s, slot))
        }
    }
}

/// Open a session, run one command against it and print the result.
///
/// The session is shut down before returning, whether or not the command
/// succeeded.
fn with_session<T, F>(config: &SessionConfig, format: OutputFormat, command: F) -> Result<()>
where
    T: Serialize + output::Render,
    F: FnOnce(&EchoSession) -> Result<T>,
{
    let library_path = config.library_path();
    tracing::info!("Opening Echo API session from {:?}", library_path);

    let session = EchoSession::open(config)
        .with_context(|| format!("Failed to start Echo API session from {:?}", library_path))?;
    let report = command(&session)?;
    session.close();

    output::write_report(&report, format, &mut std::io::stdout().lock())
}

fn parse_gain(s: &str) -> Result<InputGain, String> {
    let multiplier: i32 = s
        .trim_end_matches(['x', 'X'])
        .parse()
        .map_err(|_| format!("'{s}' is not a gain multiplier"))?;
    InputGain::try_from(multiplier).map_err(|e| e.to_string())
}

fn parse_slot(s: &str) -> Result<ModuleSlot, String> {
    match s.to_ascii_lowercase().as_str() {
        "0" | "center" => Ok(ModuleSlot::Center),
        "1" | "outer" => Ok(ModuleSlot::Outer),
        other => Err(format!("'{other}' is not a module slot, expected 0/center or 1/outer")),
    }
}

fn parse_parameter(s: &str) -> Result<ParameterId, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed
        .map(ParameterId)
        .map_err(|_| format!("'{s}' is not a parameter id"))
}
