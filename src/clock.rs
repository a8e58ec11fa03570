//! Clock arbitration and PPQN conversion.
//!
//! - [`arbiter`] decides which source owns the clock at any instant
//! - [`rate`] maps a PPQN setting onto the 24-tick MIDI clock grid
//! - [`pulse`] turns accepted ticks into timed output pulses
//! - [`bpm`] estimates tempo once per measure
//! - [`core`] wires them together behind a single message entry point

pub mod arbiter;
pub mod bpm;
pub mod core;
pub mod pulse;
pub mod rate;
pub mod source;
pub mod time;

pub use self::core::{ClockCore, Effect};
pub use arbiter::{Arbiter, StopVerdict, TickVerdict, Verdict, SOURCE_TIMEOUT};
pub use bpm::{compute_bpm, BpmCounter, BEATS_PER_MEASURE};
pub use pulse::{LineSet, OutputLine, PulseScheduler};
pub use rate::{divisor_for, multiplier_for, Ppqn, RateError, MIDI_CLOCKS_PER_QUARTER};
pub use source::{ClockSource, EnabledSources, SourceMode};
pub use time::{ManualClock, MonotonicClock, SystemClock, Timestamp};

use crate::transport::TransportState;

/// Why a source lost the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit Stop from the owning source.
    Message,
    /// No ticks for longer than [`SOURCE_TIMEOUT`].
    Timeout,
    /// The SYNC_IN cable was unplugged.
    CableRemoved,
    /// A higher-priority source took over.
    Preempted,
    /// System Reset from the owning source.
    Reset,
    /// Settings changed so the source may no longer drive the clock.
    Reconfigured,
}

/// Observer for clock core state changes. Every hook defaults to a no-op.
pub trait ClockListener {
    fn on_clock_start(&mut self, _source: ClockSource) {}
    fn on_clock_stop(&mut self, _source: ClockSource, _reason: StopReason) {}
    fn on_beat(&mut self, _beat_position: u8) {}
    fn on_bpm(&mut self, _bpm: u16) {}
    fn on_transport(&mut self, _state: TransportState) {}
}
