use crate::clock::{Ppqn, SourceMode};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Select};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// List available MIDI devices
    #[arg(long)]
    pub device_list: bool,

    /// MIDI port acting as the USB MIDI transport
    #[arg(long)]
    pub usb_device: Option<String>,

    /// MIDI port acting as the DIN MIDI transport
    #[arg(long)]
    pub din_device: Option<String>,

    /// Analog sync rate in pulses per quarter note (1, 2, 3, 4, 6, 8, 12 or 24)
    #[arg(long, value_parser = parse_ppqn)]
    pub ppqn: Option<Ppqn>,

    /// Restrict which MIDI source may drive the clock
    #[arg(long, value_enum)]
    pub clock_source: Option<SourceMode>,

    /// TOML settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Feed SYNC_IN from a simulated analog clock at this tempo
    #[arg(long, value_name = "BPM")]
    pub simulate_sync_in: Option<u16>,

    /// Pick devices interactively
    #[arg(long)]
    pub select_devices: bool,

    /// Log to stderr (honours RUST_LOG) instead of the log file
    #[arg(long)]
    pub log_stderr: bool,
}

fn parse_ppqn(value: &str) -> Result<Ppqn, String> {
    let raw: u8 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    Ppqn::new(raw).map_err(|e| e.to_string())
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}

/// Prompts for one of `devices`. `None` when skipped or nothing to pick.
pub fn select_device(prompt: &str, devices: &[String]) -> Option<String> {
    if devices.is_empty() {
        return None;
    }
    let mut items: Vec<&str> = devices.iter().map(String::as_str).collect();
    items.push("(none)");

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(0)
        .interact_opt()
        .ok()
        .flatten()?;
    devices.get(choice).cloned()
}
