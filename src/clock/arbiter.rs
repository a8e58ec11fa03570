//! Priority arbitration between clock sources.
//!
//! One source at a time owns the arbitration slot. A source may take the slot
//! when it is idle or held by a lower-priority source; ticks, starts and stops
//! from anything outranked by the current owner are dropped without touching
//! state. Ownership is released by an explicit stop from the owner or by the
//! owner going silent for [`SOURCE_TIMEOUT`].

use super::rate::MIDI_CLOCKS_PER_QUARTER;
use super::source::{ClockSource, EnabledSources, SourceMode};
use super::time::Timestamp;
use log::{debug, info};
use std::time::Duration;

/// Silence after which the active source is treated as stopped.
///
/// Flat threshold, independent of tempo.
pub const SOURCE_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStatus {
    pub is_running: bool,
    pub last_tick: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    Rejected,
    Accepted {
        /// Position within the quarter note this tick lands on.
        phase: u8,
        /// Set when this tick put the source in charge; holds the previous owner.
        took_over: Option<ClockSource>,
    },
}

impl TickVerdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, TickVerdict::Accepted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Rejected,
    Accepted {
        /// Previous owner when the slot changed hands.
        took_over: Option<ClockSource>,
    },
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopVerdict {
    Ignored,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Arbiter {
    active: ClockSource,
    sources: [SourceStatus; 3],
    ticks_since_quarter_note: u8,
    mode: SourceMode,
    enabled: EnabledSources,
}

impl Arbiter {
    pub fn new(mode: SourceMode, enabled: EnabledSources) -> Self {
        Self {
            active: ClockSource::None,
            sources: [SourceStatus::default(); 3],
            ticks_since_quarter_note: 0,
            mode,
            enabled,
        }
    }

    pub fn active_source(&self) -> ClockSource {
        self.active
    }

    pub fn ticks_since_quarter_note(&self) -> u8 {
        self.ticks_since_quarter_note
    }

    pub fn status(&self, source: ClockSource) -> SourceStatus {
        source
            .slot()
            .map(|slot| self.sources[slot])
            .unwrap_or_default()
    }

    pub fn is_running(&self, source: ClockSource) -> bool {
        self.status(source).is_running
    }

    pub fn set_mode(&mut self, mode: SourceMode) {
        self.mode = mode;
    }

    pub fn set_enabled(&mut self, enabled: EnabledSources) {
        self.enabled = enabled;
    }

    /// True when `source` is allowed to own the slot right now.
    pub fn may_drive(&self, source: ClockSource) -> bool {
        source.slot().is_some()
            && self.enabled.contains(source)
            && self.mode.permits(source)
            && !self.active.outranks(source)
    }

    pub fn accept_tick(&mut self, source: ClockSource, now: Timestamp) -> TickVerdict {
        if !self.may_drive(source) {
            debug!("Rejected tick from {} while {} is active", source, self.active);
            return TickVerdict::Rejected;
        }

        let took_over = if self.active != source || !self.is_running(source) {
            let previous = self.take_slot(source);
            self.ticks_since_quarter_note = 0;
            info!("{} clock running (previous source: {})", source, previous);
            Some(previous)
        } else {
            None
        };

        self.touch(source, now);
        let phase = self.ticks_since_quarter_note;
        self.ticks_since_quarter_note = (phase + 1) % MIDI_CLOCKS_PER_QUARTER;
        TickVerdict::Accepted { phase, took_over }
    }

    pub fn accept_start(&mut self, source: ClockSource, now: Timestamp) -> Verdict {
        if !self.may_drive(source) {
            debug!("Ignored start from {} while {} is active", source, self.active);
            return Verdict::Rejected;
        }
        let previous = self.take_slot(source);
        self.ticks_since_quarter_note = 0;
        self.touch(source, now);
        Verdict::Accepted {
            took_over: (previous != source).then_some(previous),
        }
    }

    /// Like a start, but keeps the tick phase unless another source is displaced.
    pub fn accept_continue(&mut self, source: ClockSource, now: Timestamp) -> Verdict {
        if !self.may_drive(source) {
            debug!("Ignored continue from {} while {} is active", source, self.active);
            return Verdict::Rejected;
        }
        let previous = self.take_slot(source);
        if previous != source && previous != ClockSource::None {
            self.ticks_since_quarter_note = 0;
        }
        self.touch(source, now);
        Verdict::Accepted {
            took_over: (previous != source).then_some(previous),
        }
    }

    pub fn accept_stop(&mut self, source: ClockSource) -> StopVerdict {
        if self.active == ClockSource::None || source != self.active {
            debug!("Ignored stop from {} while {} is active", source, self.active);
            return StopVerdict::Ignored;
        }
        self.release();
        StopVerdict::Stopped
    }

    /// System reset is honoured from the owner, or from anyone while idle.
    pub fn accept_reset(&mut self, source: ClockSource) -> bool {
        let allowed = if self.active == ClockSource::None {
            self.may_drive(source)
        } else {
            source == self.active
        };
        if allowed {
            self.release();
            self.ticks_since_quarter_note = 0;
        }
        allowed
    }

    /// Releases the owner if it has been silent for longer than [`SOURCE_TIMEOUT`].
    pub fn periodic_timeout_check(&mut self, now: Timestamp) -> Option<ClockSource> {
        let source = self.active;
        let slot = source.slot()?;
        let silent_for = now.saturating_since(self.sources[slot].last_tick);
        if silent_for > SOURCE_TIMEOUT {
            info!("{} clock timed out after {:?} of silence", source, silent_for);
            self.release();
            return Some(source);
        }
        None
    }

    /// Unconditionally frees the slot, e.g. after a configuration change.
    pub fn release(&mut self) -> ClockSource {
        let previous = self.active;
        for status in self.sources.iter_mut() {
            status.is_running = false;
        }
        self.active = ClockSource::None;
        previous
    }

    fn take_slot(&mut self, source: ClockSource) -> ClockSource {
        let previous = self.release();
        if let Some(slot) = source.slot() {
            self.sources[slot].is_running = true;
        }
        self.active = source;
        previous
    }

    fn touch(&mut self, source: ClockSource, now: Timestamp) {
        if let Some(slot) = source.slot() {
            self.sources[slot].last_tick = now;
        }
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new(SourceMode::Auto, EnabledSources::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn test_first_tick_claims_idle_slot() {
        let mut arbiter = Arbiter::default();
        let verdict = arbiter.accept_tick(ClockSource::Din, at(0));
        assert_eq!(
            verdict,
            TickVerdict::Accepted {
                phase: 0,
                took_over: Some(ClockSource::None)
            }
        );
        assert_eq!(arbiter.active_source(), ClockSource::Din);
        assert!(arbiter.is_running(ClockSource::Din));
        assert_eq!(arbiter.ticks_since_quarter_note(), 1);
    }

    #[test]
    fn test_phase_wraps_at_quarter_note() {
        let mut arbiter = Arbiter::default();
        for expected in 0..24u8 {
            match arbiter.accept_tick(ClockSource::Usb, at(u64::from(expected))) {
                TickVerdict::Accepted { phase, .. } => assert_eq!(phase, expected),
                TickVerdict::Rejected => panic!("tick {} rejected", expected),
            }
        }
        assert_eq!(arbiter.ticks_since_quarter_note(), 0);
    }

    #[test]
    fn test_priority_chain() {
        let mut arbiter = Arbiter::default();
        assert!(arbiter.accept_tick(ClockSource::Din, at(0)).is_accepted());
        assert!(arbiter.accept_tick(ClockSource::Usb, at(1)).is_accepted());
        assert_eq!(arbiter.active_source(), ClockSource::Usb);
        assert!(!arbiter.is_running(ClockSource::Din));

        assert!(arbiter.accept_tick(ClockSource::SyncIn, at(2)).is_accepted());
        assert!(!arbiter.accept_tick(ClockSource::Usb, at(3)).is_accepted());
        assert!(!arbiter.accept_tick(ClockSource::Din, at(3)).is_accepted());
        assert!(!arbiter.accept_start(ClockSource::Usb, at(3)).is_accepted());
        assert_eq!(arbiter.active_source(), ClockSource::SyncIn);
    }

    #[test]
    fn test_preemption_resets_phase() {
        let mut arbiter = Arbiter::default();
        for tick in 0..7 {
            arbiter.accept_tick(ClockSource::Din, at(tick));
        }
        assert_eq!(arbiter.ticks_since_quarter_note(), 7);
        let verdict = arbiter.accept_tick(ClockSource::Usb, at(8));
        assert_eq!(
            verdict,
            TickVerdict::Accepted {
                phase: 0,
                took_over: Some(ClockSource::Din)
            }
        );
    }

    #[test]
    fn test_stop_from_lower_priority_is_ignored() {
        let mut arbiter = Arbiter::default();
        arbiter.accept_start(ClockSource::Usb, at(0));
        assert_eq!(arbiter.accept_stop(ClockSource::Din), StopVerdict::Ignored);
        assert_eq!(arbiter.active_source(), ClockSource::Usb);
        assert_eq!(arbiter.accept_stop(ClockSource::Usb), StopVerdict::Stopped);
        assert_eq!(arbiter.active_source(), ClockSource::None);
        assert_eq!(arbiter.accept_stop(ClockSource::Usb), StopVerdict::Ignored);
    }

    #[test]
    fn test_continue_keeps_phase() {
        let mut arbiter = Arbiter::default();
        arbiter.accept_start(ClockSource::Din, at(0));
        for tick in 0..5 {
            arbiter.accept_tick(ClockSource::Din, at(tick));
        }
        arbiter.accept_stop(ClockSource::Din);
        assert!(arbiter
            .accept_continue(ClockSource::Din, at(100))
            .is_accepted());
        assert_eq!(arbiter.ticks_since_quarter_note(), 5);
        match arbiter.accept_tick(ClockSource::Din, at(101)) {
            TickVerdict::Accepted { phase, took_over } => {
                assert_eq!(phase, 5);
                assert_eq!(took_over, None);
            }
            TickVerdict::Rejected => panic!("tick after continue rejected"),
        }
    }

    #[test]
    fn test_timeout_is_strictly_greater_than_threshold() {
        let mut arbiter = Arbiter::default();
        arbiter.accept_tick(ClockSource::Usb, at(1000));
        assert_eq!(arbiter.periodic_timeout_check(at(4000)), None);
        assert_eq!(
            arbiter.periodic_timeout_check(at(4001)),
            Some(ClockSource::Usb)
        );
        assert_eq!(arbiter.active_source(), ClockSource::None);
        assert_eq!(arbiter.periodic_timeout_check(at(9000)), None);
    }

    #[test]
    fn test_forced_mode_rejects_other_sources() {
        let mut arbiter = Arbiter::new(SourceMode::ForceDin, EnabledSources::default());
        assert!(!arbiter.accept_tick(ClockSource::SyncIn, at(0)).is_accepted());
        assert!(!arbiter.accept_start(ClockSource::Usb, at(0)).is_accepted());
        assert!(arbiter.accept_tick(ClockSource::Din, at(0)).is_accepted());
    }

    #[test]
    fn test_disabled_source_never_drives() {
        let enabled = EnabledSources {
            sync_in: false,
            ..EnabledSources::default()
        };
        let mut arbiter = Arbiter::new(SourceMode::Auto, enabled);
        assert!(!arbiter.accept_tick(ClockSource::SyncIn, at(0)).is_accepted());
        assert_eq!(arbiter.active_source(), ClockSource::None);
    }

    #[test]
    fn test_reset_only_from_owner() {
        let mut arbiter = Arbiter::default();
        arbiter.accept_tick(ClockSource::Usb, at(0));
        assert!(!arbiter.accept_reset(ClockSource::Din));
        assert!(arbiter.accept_reset(ClockSource::Usb));
        assert_eq!(arbiter.active_source(), ClockSource::None);
        assert!(arbiter.accept_reset(ClockSource::Din));
    }
}
