//! Transport functionality
//!
//! Play/pause/stop state for the clock core and for the device's own
//! transport buttons. Transitions are driven only by protocol messages and
//! button presses; clock ticks never move the transport.
//!
//! Each transition reports the MIDI real-time message that expresses it on
//! the wire, so callers can forward it without re-deriving the semantics.

mod control;

pub use control::{Button, TransportControl};

use crate::midi::RealTimeMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Play from the top: resets tick phase and the BPM window.
    Start,
    /// Resume from the current position.
    Continue,
    /// Halt, keeping the position so a later Continue resumes.
    Pause,
    Stop,
}

#[derive(Debug, Clone, Default)]
pub struct Transport {
    state: TransportState,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Applies `event`, returning the wire message for the transition or
    /// `None` when the event does not change anything.
    pub fn apply(&mut self, event: TransportEvent) -> Option<RealTimeMessage> {
        use TransportState::*;

        let (next, message) = match (self.state, event) {
            (_, TransportEvent::Start) => (Playing, RealTimeMessage::Start),
            (Stopped | Paused, TransportEvent::Continue) => (Playing, RealTimeMessage::Continue),
            (Playing, TransportEvent::Pause) => (Paused, RealTimeMessage::Stop),
            (Playing | Paused, TransportEvent::Stop) => (Stopped, RealTimeMessage::Stop),
            _ => return None,
        };
        log::debug!("Transport {:?} -> {:?} on {:?}", self.state, next, event);
        self.state = next;
        Some(message)
    }

    pub fn reset(&mut self) {
        self.state = TransportState::Stopped;
    }
}
