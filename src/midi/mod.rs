//! MIDI functionality for ClockSync
//!
//! This module provides the MIDI transports the clock core listens to:
//! - Real-time message types ([`RealTimeMessage`])
//! - DIN serial framing with running status ([`DinParser`], [`DinTransport`])
//! - USB-MIDI event packets ([`UsbMidiPacket`], [`UsbTransport`])
//! - Host MIDI ports via midir ([`MidirLink`])
//! - An in-memory link for testing ([`MockLink`])
//!
mod din;
mod engine;
mod message;
pub mod midir_engine;
pub mod mock_engine;
mod usb;

pub use din::{DinParser, DinTransport};
pub use engine::{ByteLink, MidiEngine, MidiError, PacketLink, Result};
pub use message::{is_real_time, RealTimeMessage};
pub use midir_engine::{list_devices, MidirLink};
pub use mock_engine::MockLink;
pub use usb::{payload_len, UsbMidiPacket, UsbTransport, CIN_SINGLE_BYTE};
