//! USB-MIDI event packets.
//!
//! Every event is four bytes: a header holding the cable number (high
//! nibble) and code index number (low nibble), then up to three MIDI bytes.

use super::engine::{MidiEngine, PacketLink, Result};
use super::message::{is_real_time, RealTimeMessage};
use crate::clock::ClockSource;

/// Code index number for a single-byte message (real-time traffic).
pub const CIN_SINGLE_BYTE: u8 = 0x0F;

/// Bytes of MIDI payload carried for a code index number.
pub fn payload_len(code_index: u8) -> usize {
    match code_index & 0x0F {
        0x5 | 0xF => 1,
        0x2 | 0x6 | 0xC | 0xD => 2,
        0x3 | 0x4 | 0x7 | 0x8..=0xB | 0xE => 3,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbMidiPacket {
    pub header: u8,
    pub data: [u8; 3],
}

impl UsbMidiPacket {
    pub fn real_time(message: RealTimeMessage, cable: u8) -> Self {
        Self {
            header: (cable << 4) | CIN_SINGLE_BYTE,
            data: [message.status(), 0, 0],
        }
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            header: bytes[0],
            data: [bytes[1], bytes[2], bytes[3]],
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.header, self.data[0], self.data[1], self.data[2]]
    }

    /// Packs one complete, non-sysex MIDI message. Returns `None` for
    /// anything that does not fit a single event packet.
    pub fn from_midi_bytes(cable: u8, bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let code_index = match status {
            s if is_real_time(s) => CIN_SINGLE_BYTE,
            0x80..=0xEF => status >> 4,
            0xF1 | 0xF3 => 0x2,
            0xF2 => 0x3,
            0xF6 => 0x5,
            _ => return None,
        };
        let len = payload_len(code_index);
        if bytes.len() < len {
            return None;
        }
        let mut data = [0u8; 3];
        data[..len].copy_from_slice(&bytes[..len]);
        Some(Self {
            header: (cable << 4) | code_index,
            data,
        })
    }

    pub fn code_index(self) -> u8 {
        self.header & 0x0F
    }

    pub fn cable(self) -> u8 {
        self.header >> 4
    }

    /// The MIDI bytes this packet carries.
    pub fn midi_bytes(&self) -> &[u8] {
        &self.data[..payload_len(self.code_index())]
    }

    pub fn real_time_message(self) -> Option<RealTimeMessage> {
        if self.code_index() != CIN_SINGLE_BYTE {
            return None;
        }
        RealTimeMessage::from_status(self.data[0])
    }
}

/// USB MIDI transport over any [`PacketLink`].
pub struct UsbTransport<L: PacketLink> {
    link: L,
    cable: u8,
}

impl<L: PacketLink> UsbTransport<L> {
    pub fn new(link: L) -> Self {
        Self { link, cable: 0 }
    }
}

impl<L: PacketLink> MidiEngine for UsbTransport<L> {
    fn source(&self) -> ClockSource {
        ClockSource::Usb
    }

    fn poll(&mut self) -> Option<RealTimeMessage> {
        while let Some(bytes) = self.link.read_packet() {
            if let Some(message) = UsbMidiPacket::from_bytes(bytes).real_time_message() {
                return Some(message);
            }
        }
        None
    }

    fn send(&mut self, message: RealTimeMessage) -> Result<()> {
        self.link
            .write_packet(UsbMidiPacket::real_time(message, self.cable).to_bytes())
    }

    fn flush(&mut self) -> Result<()> {
        self.link.flush()
    }
}
