use super::{Transport, TransportEvent, TransportState};
use crate::midi::RealTimeMessage;
use log::info;

/// The device's transport buttons, already debounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    PlayPause,
    Stop,
}

/// Local transport driven by the front-panel buttons.
///
/// Play toggles between playing and paused (starting from the top when
/// stopped); Stop always sends a Stop so downstream gear can be silenced.
#[derive(Debug, Clone, Default)]
pub struct TransportControl {
    transport: Transport,
}

impl TransportControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn press(&mut self, button: Button) -> Option<RealTimeMessage> {
        let message = match button {
            Button::PlayPause => {
                let event = match self.transport.state() {
                    TransportState::Stopped => TransportEvent::Start,
                    TransportState::Playing => TransportEvent::Pause,
                    TransportState::Paused => TransportEvent::Continue,
                };
                self.transport.apply(event)
            }
            Button::Stop => self
                .transport
                .apply(TransportEvent::Stop)
                .or(Some(RealTimeMessage::Stop)),
        };
        info!(
            "{:?} pressed, local transport now {:?}",
            button,
            self.transport.state()
        );
        message
    }
}
