use super::arbiter::{Arbiter, StopVerdict, TickVerdict, Verdict};
use super::bpm::BpmCounter;
use super::pulse::{LineSet, OutputLine, PulseScheduler};
use super::rate::Ppqn;
use super::source::ClockSource;
use super::time::Timestamp;
use super::{ClockListener, StopReason};
use crate::config::Settings;
use crate::midi::RealTimeMessage;
use crate::transport::{Transport, TransportEvent, TransportState};
use log::{info, trace};

/// Side effects produced by the core for the event loop to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drive an output line.
    Line { line: OutputLine, high: bool },
    /// Send a real-time message to every MIDI transport except `origin`.
    Send {
        message: RealTimeMessage,
        origin: ClockSource,
    },
}

/// Handles arbitration, pulse scheduling, tempo and transport in a unified way.
///
/// The core never performs I/O. Every accepted event queues [`Effect`]s that
/// the caller drains with [`ClockCore::drain_effects`].
pub struct ClockCore {
    arbiter: Arbiter,
    pulses: PulseScheduler,
    bpm: BpmCounter,
    transport: Transport,
    ppqn: Ppqn,
    effects: Vec<Effect>,
    listeners: Vec<Box<dyn ClockListener>>,
}

impl ClockCore {
    pub fn new(settings: &Settings) -> Self {
        info!(
            "Clock core: {}, source mode {:?}, sources {:?}",
            settings.ppqn, settings.source_mode, settings.enabled
        );
        Self {
            arbiter: Arbiter::new(settings.source_mode, settings.enabled),
            pulses: PulseScheduler::new(settings.ppqn),
            bpm: BpmCounter::new(),
            transport: Transport::new(),
            ppqn: settings.ppqn,
            effects: Vec::with_capacity(64),
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn ClockListener>) {
        self.listeners.push(listener);
    }

    /// Routes a real-time message from `source`. Returns whether it was accepted.
    pub fn process_message(
        &mut self,
        source: ClockSource,
        message: RealTimeMessage,
        now: Timestamp,
    ) -> bool {
        match message {
            RealTimeMessage::Clock => self.on_tick(source, now),
            RealTimeMessage::Start => self.on_start(source, now),
            RealTimeMessage::Continue => self.on_continue(source, now),
            RealTimeMessage::Stop => self.on_stop(source),
            RealTimeMessage::SystemReset => self.on_reset(source),
            RealTimeMessage::ActiveSensing => self.on_active_sensing(source),
        }
    }

    /// Keepalive passes straight through; arbitration and timers never see it.
    pub fn on_active_sensing(&mut self, source: ClockSource) -> bool {
        trace!("Active sensing from {}", source);
        self.send(RealTimeMessage::ActiveSensing, source);
        true
    }

    pub fn on_tick(&mut self, source: ClockSource, now: Timestamp) -> bool {
        let (phase, took_over) = match self.arbiter.accept_tick(source, now) {
            TickVerdict::Rejected => return false,
            TickVerdict::Accepted { phase, took_over } => (phase, took_over),
        };

        if let Some(previous) = took_over {
            self.bpm.reset_window();
            self.hand_over(source, previous);
            if source == ClockSource::SyncIn {
                // Analog sync has no transport messages of its own.
                if let Some(message) = self.apply_transport(TransportEvent::Start) {
                    self.send(message, source);
                }
            }
        }

        self.handle_canonical_tick(phase, now);
        self.send(RealTimeMessage::Clock, source);
        true
    }

    /// Expands one SYNC_IN pulse into a burst of canonical ticks.
    pub fn on_sync_in_pulse(&mut self, at: Timestamp) -> bool {
        let mut accepted = false;
        for _ in 0..self.ppqn.multiplier() {
            if !self.on_tick(ClockSource::SyncIn, at) {
                break;
            }
            accepted = true;
        }
        accepted
    }

    pub fn on_start(&mut self, source: ClockSource, now: Timestamp) -> bool {
        let took_over = match self.arbiter.accept_start(source, now) {
            Verdict::Rejected => return false,
            Verdict::Accepted { took_over } => took_over,
        };
        self.bpm.reset_window();
        self.apply_transport(TransportEvent::Start);
        match took_over {
            Some(previous) => self.hand_over(source, previous),
            None => info!("{} restarted", source),
        }
        self.send(RealTimeMessage::Start, source);
        true
    }

    pub fn on_continue(&mut self, source: ClockSource, now: Timestamp) -> bool {
        let took_over = match self.arbiter.accept_continue(source, now) {
            Verdict::Rejected => return false,
            Verdict::Accepted { took_over } => took_over,
        };
        // Elapsed time while paused must not leak into the next estimate.
        self.bpm.reset_window();
        self.apply_transport(TransportEvent::Continue);
        if let Some(previous) = took_over {
            self.hand_over(source, previous);
        }
        self.send(RealTimeMessage::Continue, source);
        true
    }

    pub fn on_stop(&mut self, source: ClockSource) -> bool {
        if self.arbiter.accept_stop(source) == StopVerdict::Ignored {
            return false;
        }
        self.halt(source, StopReason::Message);
        self.apply_transport(TransportEvent::Stop);
        self.send(RealTimeMessage::Stop, source);
        true
    }

    /// Full reset: stop, outputs low, transport stopped and tempo forgotten.
    pub fn on_reset(&mut self, source: ClockSource) -> bool {
        let previous = self.arbiter.active_source();
        if !self.arbiter.accept_reset(source) {
            return false;
        }
        let lowered = self.pulses.force_all_low();
        self.push_lines(lowered, false);
        self.bpm.clear();
        if self.transport.state() != TransportState::Stopped {
            self.transport.reset();
            self.notify(|l| l.on_transport(TransportState::Stopped));
        }
        if previous != ClockSource::None {
            self.notify(|l| l.on_clock_stop(previous, StopReason::Reset));
        }
        info!("System reset from {}", source);
        self.send(RealTimeMessage::SystemReset, source);
        true
    }

    /// Reacts to the SYNC_IN cable-detect line.
    pub fn sync_in_cable(&mut self, present: bool) {
        if !present && self.arbiter.active_source() == ClockSource::SyncIn {
            self.arbiter.release();
            self.drop_source(ClockSource::SyncIn, StopReason::CableRemoved);
        }
    }

    /// Per-iteration housekeeping: source timeout and pulse-width timers.
    pub fn poll_timers(&mut self, now: Timestamp) {
        if let Some(source) = self.arbiter.periodic_timeout_check(now) {
            self.drop_source(source, StopReason::Timeout);
        }
        let lowered = self.pulses.tick_timer_update(now);
        self.push_lines(lowered, false);
    }

    /// Applies changed settings; a source no longer permitted loses the clock.
    pub fn apply_settings(&mut self, settings: &Settings) {
        info!(
            "Applying settings: {}, source mode {:?}",
            settings.ppqn, settings.source_mode
        );
        self.ppqn = settings.ppqn;
        self.pulses.set_rate(settings.ppqn);
        self.arbiter.set_mode(settings.source_mode);
        self.arbiter.set_enabled(settings.enabled);

        let active = self.arbiter.active_source();
        if active != ClockSource::None && !self.arbiter.may_drive(active) {
            self.arbiter.release();
            self.drop_source(active, StopReason::Reconfigured);
        }
    }

    pub fn drain_effects(&mut self) -> std::vec::Drain<'_, Effect> {
        self.effects.drain(..)
    }

    pub fn active_source(&self) -> ClockSource {
        self.arbiter.active_source()
    }

    pub fn ticks_since_quarter_note(&self) -> u8 {
        self.arbiter.ticks_since_quarter_note()
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn bpm(&self) -> u16 {
        self.bpm.bpm()
    }

    pub fn ppqn(&self) -> Ppqn {
        self.ppqn
    }

    pub fn is_line_high(&self, line: OutputLine) -> bool {
        self.pulses.is_high(line)
    }

    fn handle_canonical_tick(&mut self, phase: u8, now: Timestamp) {
        let raised = self.pulses.on_canonical_tick(phase, now);
        self.push_lines(raised, true);
        if phase == 0 {
            let beat_position = self.bpm.beat_position();
            self.notify(|l| l.on_beat(beat_position));
            if let Some(bpm) = self.bpm.on_beat(now) {
                trace!("Measure complete at {} BPM", bpm);
                self.notify(|l| l.on_bpm(bpm));
            }
        }
    }

    fn hand_over(&mut self, source: ClockSource, previous: ClockSource) {
        if previous != ClockSource::None {
            info!("{} preempted by {}", previous, source);
            self.notify(|l| l.on_clock_stop(previous, StopReason::Preempted));
        }
        self.notify(|l| l.on_clock_start(source));
    }

    /// Silences the outputs after `source` lost the clock.
    fn halt(&mut self, source: ClockSource, reason: StopReason) {
        let lowered = self.pulses.force_all_low();
        self.push_lines(lowered, false);
        info!("{} clock stopped ({:?})", source, reason);
        self.notify(|l| l.on_clock_stop(source, reason));
    }

    /// Implicit stop for a source that was already released by the arbiter.
    fn drop_source(&mut self, source: ClockSource, reason: StopReason) {
        self.halt(source, reason);
        let message = self.apply_transport(TransportEvent::Stop);
        // Only SYNC_IN synthesises transport; MIDI sources speak for themselves.
        if source == ClockSource::SyncIn {
            if let Some(message) = message {
                self.send(message, source);
            }
        }
    }

    fn apply_transport(&mut self, event: TransportEvent) -> Option<RealTimeMessage> {
        let before = self.transport.state();
        let message = self.transport.apply(event);
        let after = self.transport.state();
        if before != after {
            self.notify(|l| l.on_transport(after));
        }
        message
    }

    fn send(&mut self, message: RealTimeMessage, origin: ClockSource) {
        self.effects.push(Effect::Send { message, origin });
    }

    fn push_lines(&mut self, lines: LineSet, high: bool) {
        for line in lines.iter() {
            self.effects.push(Effect::Line { line, high });
        }
    }

    fn notify(&mut self, mut hook: impl FnMut(&mut dyn ClockListener)) {
        for listener in self.listeners.iter_mut() {
            hook(listener.as_mut());
        }
    }
}
