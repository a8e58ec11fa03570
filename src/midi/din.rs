//! DIN MIDI: a serial byte stream with running status.
//!
//! Only real-time bytes matter to the clock. Everything else is parsed just
//! far enough to keep data bytes from being mistaken for anything.

use super::engine::{ByteLink, MidiEngine, Result};
use super::message::{is_real_time, RealTimeMessage};
use crate::clock::ClockSource;
use log::trace;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// Data bytes following a status byte.
fn data_len(status: u8) -> u8 {
    match status {
        0xC0..=0xDF => 1,
        0x80..=0xEF => 2,
        0xF1 | 0xF3 => 1,
        0xF2 => 2,
        _ => 0,
    }
}

/// Streaming parser that extracts real-time messages from a DIN byte stream.
#[derive(Debug, Clone, Default)]
pub struct DinParser {
    remaining: u8,
    in_sysex: bool,
    running: Option<u8>,
    discarded: u64,
}

impl DinParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte, returning a real-time message when one completes.
    pub fn feed(&mut self, byte: u8) -> Option<RealTimeMessage> {
        if is_real_time(byte) {
            // Real-time bytes interleave anywhere and leave parser state alone.
            return RealTimeMessage::from_status(byte);
        }

        if byte & 0x80 != 0 {
            self.on_status(byte);
            return None;
        }

        if self.in_sysex {
            return None;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
        } else if let Some(status) = self.running {
            self.remaining = data_len(status).saturating_sub(1);
        } else {
            self.discarded += 1;
            trace!("Discarded stray data byte 0x{:02X}", byte);
        }
        None
    }

    /// Stray data bytes seen with no status to attach them to.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn on_status(&mut self, status: u8) {
        match status {
            SYSEX_START => {
                self.in_sysex = true;
                self.running = None;
                self.remaining = 0;
            }
            SYSEX_END => {
                self.in_sysex = false;
            }
            0xF1..=0xF6 => {
                // System common cancels running status.
                self.in_sysex = false;
                self.running = None;
                self.remaining = data_len(status);
            }
            _ => {
                self.in_sysex = false;
                self.running = Some(status);
                self.remaining = data_len(status);
            }
        }
    }
}

/// DIN MIDI transport over any serial [`ByteLink`].
pub struct DinTransport<L: ByteLink> {
    link: L,
    parser: DinParser,
}

impl<L: ByteLink> DinTransport<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            parser: DinParser::new(),
        }
    }

    pub fn parser(&self) -> &DinParser {
        &self.parser
    }
}

impl<L: ByteLink> MidiEngine for DinTransport<L> {
    fn source(&self) -> ClockSource {
        ClockSource::Din
    }

    fn poll(&mut self) -> Option<RealTimeMessage> {
        while let Some(byte) = self.link.read_byte() {
            if let Some(message) = self.parser.feed(byte) {
                return Some(message);
            }
        }
        None
    }

    fn send(&mut self, message: RealTimeMessage) -> Result<()> {
        self.link.write(&[message.status()])
    }
}
