use super::engine::{ByteLink, MidiError, PacketLink, Result};
use super::usb::UsbMidiPacket;
use crossbeam::channel::{unbounded, Receiver};
use log::{debug, info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::collections::VecDeque;

const CLIENT_NAME: &str = "clocksyncrs";

/// A host MIDI port pair opened through midir.
///
/// Serves as either link kind: incoming messages are re-framed as bytes for
/// a DIN transport or as event packets for a USB transport.
pub struct MidirLink {
    device: String,
    _input: Option<MidiInputConnection<()>>,
    output: Option<MidiOutputConnection>,
    rx: Option<Receiver<Vec<u8>>>,
    pending: VecDeque<u8>,
}

impl MidirLink {
    /// Opens the first input and output ports whose names contain `device_name`.
    pub fn connect(device_name: &str) -> Result<Self> {
        let mut midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME))?;
        midi_in.ignore(Ignore::None);
        let in_port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).unwrap_or_default().contains(device_name));

        let (input, rx) = match in_port {
            Some(port) => {
                let (tx, rx) = unbounded();
                let connection = midi_in.connect(
                    &port,
                    &format!("{}-input", CLIENT_NAME),
                    move |_stamp, message, _| {
                        // The loop may have shut down; nothing to do then.
                        let _ = tx.send(message.to_vec());
                    },
                    (),
                )?;
                (Some(connection), Some(rx))
            }
            None => (None, None),
        };

        let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME))?;
        let out_port = midi_out
            .ports()
            .into_iter()
            .find(|p| midi_out.port_name(p).unwrap_or_default().contains(device_name));
        let output = match out_port {
            Some(port) => Some(midi_out.connect(&port, &format!("{}-output", CLIENT_NAME))?),
            None => None,
        };

        if input.is_none() && output.is_none() {
            return Err(MidiError::DeviceNotFound(device_name.to_string()));
        }
        if output.is_none() {
            warn!("{} has no output port; forwarding disabled", device_name);
        }
        info!(
            "Connected to {} (input: {}, output: {})",
            device_name,
            input.is_some(),
            output.is_some()
        );

        Ok(Self {
            device: device_name.to_string(),
            _input: input,
            output,
            rx,
            pending: VecDeque::new(),
        })
    }

    fn next_message(&mut self) -> Option<Vec<u8>> {
        self.rx.as_ref()?.try_recv().ok()
    }

    fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(output) = &mut self.output {
            output.send(bytes)?;
        }
        Ok(())
    }
}

impl ByteLink for MidirLink {
    fn read_byte(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            let message = self.next_message()?;
            self.pending.extend(message);
        }
        self.pending.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.send_raw(bytes)
    }
}

impl PacketLink for MidirLink {
    fn read_packet(&mut self) -> Option<[u8; 4]> {
        loop {
            let message = self.next_message()?;
            match UsbMidiPacket::from_midi_bytes(0, &message) {
                Some(packet) => return Some(packet.to_bytes()),
                None => debug!("Skipping {} byte message from {}", message.len(), self.device),
            }
        }
    }

    fn write_packet(&mut self, packet: [u8; 4]) -> Result<()> {
        let packet = UsbMidiPacket::from_bytes(packet);
        self.send_raw(packet.midi_bytes())
    }
}

/// Names of every MIDI input port on the host.
pub fn list_devices() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(&format!("{}-list", CLIENT_NAME))?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}
