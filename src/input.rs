//! Line-based console control, standing in for the front-panel buttons and
//! settings menu.

use crate::clock::{Ppqn, SourceMode};
use crate::config::Settings;
use crate::event_loop::EngineMessage;
use crate::transport::Button;
use clap::ValueEnum;
use crossbeam::channel::Sender;
use log::{info, warn};
use std::io::{self, BufRead};

/// Turns console lines into engine messages, tracking the settings so that
/// a change to one field keeps the rest.
pub struct InputMapper {
    settings: Settings,
}

impl InputMapper {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn map_line(&mut self, line: &str) -> Option<EngineMessage> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("p");
        match (command.to_ascii_lowercase().as_str(), words.next()) {
            ("p" | "play", None) => Some(EngineMessage::Button(Button::PlayPause)),
            ("s" | "stop", None) => Some(EngineMessage::Button(Button::Stop)),
            ("q" | "quit", None) => Some(EngineMessage::Shutdown),
            ("ppqn", Some(value)) => {
                let ppqn = value.parse::<u8>().ok().and_then(|v| Ppqn::new(v).ok())?;
                self.settings.ppqn = ppqn;
                Some(EngineMessage::Reconfigure(self.settings))
            }
            ("source", Some(value)) => {
                self.settings.source_mode = SourceMode::from_str(value, true).ok()?;
                Some(EngineMessage::Reconfigure(self.settings))
            }
            _ => None,
        }
    }
}

/// Reads stdin until EOF, forwarding mapped commands. Stops after `q`.
pub fn run_console_input(settings: Settings, commands: Sender<EngineMessage>) {
    let mut mapper = InputMapper::new(settings);
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        match mapper.map_line(&line) {
            Some(message) => {
                let shutdown = matches!(message, EngineMessage::Shutdown);
                if commands.send(message).is_err() || shutdown {
                    break;
                }
            }
            None => warn!("Unknown command: {:?}", line.trim()),
        }
    }
    info!("Console input closed");
}
