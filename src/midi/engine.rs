use crate::clock::ClockSource;
use crate::midi::RealTimeMessage;
use thiserror::Error;

/// Custom error type for MIDI operations
#[derive(Debug, Error)]
pub enum MidiError {
    /// Error when sending a MIDI message
    #[error("MIDI send error: {0}")]
    SendError(String),
    /// Error when connecting to a MIDI device
    #[error("MIDI connection error: {0}")]
    ConnectionError(String),
    #[error("MIDI device not found: {0}")]
    DeviceNotFound(String),
}

impl From<midir::InitError> for MidiError {
    fn from(err: midir::InitError) -> Self {
        MidiError::ConnectionError(err.to_string())
    }
}

impl From<midir::PortInfoError> for MidiError {
    fn from(err: midir::PortInfoError) -> Self {
        MidiError::ConnectionError(err.to_string())
    }
}

impl<T> From<midir::ConnectError<T>> for MidiError {
    fn from(err: midir::ConnectError<T>) -> Self {
        MidiError::ConnectionError(err.to_string())
    }
}

impl From<midir::SendError> for MidiError {
    fn from(err: midir::SendError) -> Self {
        MidiError::SendError(err.to_string())
    }
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// A MIDI transport feeding the clock core, seen from the event loop.
///
/// `poll` never blocks; it returns `None` once the transport has nothing
/// more to deliver in this iteration.
pub trait MidiEngine: Send {
    /// Which clock source this transport's messages count as.
    fn source(&self) -> ClockSource;

    /// Returns the next real-time message received, if any.
    fn poll(&mut self) -> Option<RealTimeMessage>;

    /// Queues a real-time message for output.
    fn send(&mut self, message: RealTimeMessage) -> Result<()>;

    /// Pushes queued output to the wire.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Raw serial byte stream, as used by DIN MIDI.
pub trait ByteLink: Send {
    fn read_byte(&mut self) -> Option<u8>;
    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

/// 4-byte USB-MIDI event packet stream.
pub trait PacketLink: Send {
    fn read_packet(&mut self) -> Option<[u8; 4]>;
    fn write_packet(&mut self, packet: [u8; 4]) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
