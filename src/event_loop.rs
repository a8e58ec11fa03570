// event_loop.rs

use crate::clock::{ClockCore, ClockListener, ClockSource, Effect, MonotonicClock, OutputLine};
use crate::config::Settings;
use crate::hal::PulseOutputs;
use crate::midi::{MidiEngine, RealTimeMessage};
use crate::sync_in::SyncInPort;
use crate::transport::{Button, TransportControl};
use crossbeam::channel::Receiver;
use log::{debug, info, trace, warn};
use std::thread;
use std::time::Duration;

/// Upper bound on messages taken from one transport per iteration, so a
/// flooded input cannot starve the timers.
pub const MAX_MESSAGES_PER_POLL: usize = 32;

/// Sleep between loop iterations.
pub const POLL_INTERVAL: Duration = Duration::from_micros(250);

/// Requests from other threads (UI, input handling) to the loop.
#[derive(Debug, Clone)]
pub enum EngineMessage {
    Button(Button),
    Reconfigure(Settings),
    Shutdown,
}

/// The cooperative main loop. Owns the core and every piece of I/O; nothing
/// else touches clock state.
pub struct EventLoop<C: MonotonicClock> {
    clock: C,
    core: ClockCore,
    transports: Vec<Box<dyn MidiEngine>>,
    sync_in: Option<SyncInPort>,
    outputs: PulseOutputs,
    control: TransportControl,
    commands: Option<Receiver<EngineMessage>>,
}

impl<C: MonotonicClock> EventLoop<C> {
    pub fn new(clock: C, settings: &Settings, outputs: PulseOutputs) -> Self {
        EventLoop {
            clock,
            core: ClockCore::new(settings),
            transports: Vec::new(),
            sync_in: None,
            outputs,
            control: TransportControl::new(),
            commands: None,
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn MidiEngine>) -> Self {
        info!("Attached {} transport", transport.source());
        self.transports.push(transport);
        self
    }

    pub fn with_sync_in(mut self, port: SyncInPort) -> Self {
        self.sync_in = Some(port);
        self
    }

    pub fn with_commands(mut self, commands: Receiver<EngineMessage>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn ClockListener>) {
        self.core.add_listener(listener);
    }

    pub fn core(&self) -> &ClockCore {
        &self.core
    }

    /// Runs until a shutdown request arrives.
    pub fn run(&mut self) {
        info!("Event loop running");
        while self.poll_once() {
            thread::sleep(POLL_INTERVAL);
        }
        self.shutdown();
    }

    /// One pass over every input, then timers, then outputs. Returns `false`
    /// once shutdown was requested.
    pub fn poll_once(&mut self) -> bool {
        let now = self.clock.now();

        if let Some(port) = self.sync_in.as_mut() {
            let present = port.cable_present();
            self.core.sync_in_cable(present);
            if let Some(at) = port.take_pending() {
                if present {
                    self.core.on_sync_in_pulse(at);
                } else {
                    trace!("SYNC_IN edge without cable ignored");
                }
            }
        }

        if !self.handle_commands() {
            return false;
        }

        for transport in self.transports.iter_mut() {
            let source = transport.source();
            for _ in 0..MAX_MESSAGES_PER_POLL {
                let Some(message) = transport.poll() else {
                    break;
                };
                if !self.core.process_message(source, message, now) {
                    trace!("{} from {} not accepted", message, source);
                }
            }
        }

        self.core.poll_timers(now);
        self.dispatch_effects();
        self.flush_transports();
        true
    }

    /// Drives every output low.
    pub fn shutdown(&mut self) {
        info!("Event loop stopping");
        for line in OutputLine::ALL {
            self.outputs.drive(line, false);
        }
        self.flush_transports();
    }

    fn handle_commands(&mut self) -> bool {
        let pending: Vec<EngineMessage> = match &self.commands {
            Some(commands) => commands.try_iter().collect(),
            None => return true,
        };
        for message in pending {
            debug!("Engine message: {:?}", message);
            match message {
                EngineMessage::Button(button) => {
                    if let Some(message) = self.control.press(button) {
                        broadcast(&mut self.transports, message, ClockSource::None);
                    }
                }
                EngineMessage::Reconfigure(settings) => self.core.apply_settings(&settings),
                EngineMessage::Shutdown => return false,
            }
        }
        true
    }

    fn dispatch_effects(&mut self) {
        for effect in self.core.drain_effects() {
            match effect {
                Effect::Line { line, high } => self.outputs.drive(line, high),
                Effect::Send { message, origin } => {
                    broadcast(&mut self.transports, message, origin)
                }
            }
        }
    }

    fn flush_transports(&mut self) {
        for transport in self.transports.iter_mut() {
            if let Err(e) = transport.flush() {
                warn!("Failed to flush {} output: {}", transport.source(), e);
            }
        }
    }
}

/// Sends `message` to every transport other than the one it came from.
/// Output failures drop the message; the clock keeps running.
fn broadcast(
    transports: &mut [Box<dyn MidiEngine>],
    message: RealTimeMessage,
    origin: ClockSource,
) {
    for transport in transports.iter_mut() {
        if transport.source() == origin {
            continue;
        }
        if let Err(e) = transport.send(message) {
            warn!("Dropped {} to {}: {}", message, transport.source(), e);
        }
    }
}
