use std::fmt;

pub const CLOCK: u8 = 0xF8;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;
pub const ACTIVE_SENSING: u8 = 0xFE;
pub const SYSTEM_RESET: u8 = 0xFF;

/// MIDI system real-time messages, the only traffic the clock core consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealTimeMessage {
    Clock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    SystemReset,
}

impl RealTimeMessage {
    /// Decodes a status byte. Undefined real-time bytes (0xF9, 0xFD) and
    /// anything below 0xF8 yield `None`.
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            CLOCK => Some(RealTimeMessage::Clock),
            START => Some(RealTimeMessage::Start),
            CONTINUE => Some(RealTimeMessage::Continue),
            STOP => Some(RealTimeMessage::Stop),
            ACTIVE_SENSING => Some(RealTimeMessage::ActiveSensing),
            SYSTEM_RESET => Some(RealTimeMessage::SystemReset),
            _ => None,
        }
    }

    pub fn status(self) -> u8 {
        match self {
            RealTimeMessage::Clock => CLOCK,
            RealTimeMessage::Start => START,
            RealTimeMessage::Continue => CONTINUE,
            RealTimeMessage::Stop => STOP,
            RealTimeMessage::ActiveSensing => ACTIVE_SENSING,
            RealTimeMessage::SystemReset => SYSTEM_RESET,
        }
    }
}

/// True for bytes in the system real-time range, which may interleave
/// anywhere in a MIDI stream.
pub fn is_real_time(byte: u8) -> bool {
    byte >= 0xF8
}

impl fmt::Display for RealTimeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02X})", self, self.status())
    }
}
