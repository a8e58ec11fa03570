use super::rate::Ppqn;
use super::time::Timestamp;
use log::trace;
use std::time::Duration;

/// SYNC_OUT pulse width; short enough for vintage analog sync receivers.
pub const SYNC_PULSE_WIDTH: Duration = Duration::from_millis(5);
/// Once-per-beat display clock pulse width.
pub const DISPLAY_CLOCK_WIDTH: Duration = Duration::from_millis(5);
/// Pulse indicator LED on-time, long enough to be seen at 400 BPM.
pub const LED_PULSE_WIDTH: Duration = Duration::from_millis(50);

/// The digital output lines driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputLine {
    SyncOut,
    DisplayClock,
    PulseLed,
}

impl OutputLine {
    pub const ALL: [OutputLine; 3] = [
        OutputLine::SyncOut,
        OutputLine::DisplayClock,
        OutputLine::PulseLed,
    ];

    pub fn pulse_width(self) -> Duration {
        match self {
            OutputLine::SyncOut => SYNC_PULSE_WIDTH,
            OutputLine::DisplayClock => DISPLAY_CLOCK_WIDTH,
            OutputLine::PulseLed => LED_PULSE_WIDTH,
        }
    }

    fn index(self) -> usize {
        match self {
            OutputLine::SyncOut => 0,
            OutputLine::DisplayClock => 1,
            OutputLine::PulseLed => 2,
        }
    }
}

/// A small set of output lines, used to report edges without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSet(u8);

impl LineSet {
    pub fn insert(&mut self, line: OutputLine) {
        self.0 |= 1 << line.index();
    }

    pub fn contains(self, line: OutputLine) -> bool {
        self.0 & (1 << line.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = OutputLine> {
        OutputLine::ALL
            .into_iter()
            .filter(move |line| self.contains(*line))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseOutputState {
    pub is_high: bool,
    pub rising_edge: Timestamp,
}

/// Turns accepted canonical ticks into timed pulse edges.
#[derive(Debug, Clone)]
pub struct PulseScheduler {
    lines: [PulseOutputState; 3],
    divisor: u8,
}

impl PulseScheduler {
    pub fn new(ppqn: Ppqn) -> Self {
        Self {
            lines: [PulseOutputState::default(); 3],
            divisor: ppqn.divisor(),
        }
    }

    pub fn set_rate(&mut self, ppqn: Ppqn) {
        self.divisor = ppqn.divisor();
    }

    pub fn divisor(&self) -> u8 {
        self.divisor
    }

    /// Raises the lines due at `phase` (position in the 24-tick quarter note).
    pub fn on_canonical_tick(&mut self, phase: u8, now: Timestamp) -> LineSet {
        let mut raised = LineSet::default();
        if phase == 0 {
            self.raise(OutputLine::DisplayClock, now, &mut raised);
        }
        if phase % self.divisor == 0 {
            self.raise(OutputLine::SyncOut, now, &mut raised);
            // The LED keeps its own window so fast pulse trains do not retrigger it.
            if !self.state(OutputLine::PulseLed).is_high {
                self.raise(OutputLine::PulseLed, now, &mut raised);
            }
        }
        raised
    }

    /// Lowers every line whose pulse width has elapsed.
    pub fn tick_timer_update(&mut self, now: Timestamp) -> LineSet {
        let mut lowered = LineSet::default();
        for line in OutputLine::ALL {
            let state = &mut self.lines[line.index()];
            if state.is_high && now.saturating_since(state.rising_edge) >= line.pulse_width() {
                state.is_high = false;
                lowered.insert(line);
                trace!("{:?} low at {} us", line, now.as_micros());
            }
        }
        lowered
    }

    /// Drops every line immediately, cancelling pending pulse timers.
    pub fn force_all_low(&mut self) -> LineSet {
        let mut lowered = LineSet::default();
        for line in OutputLine::ALL {
            let state = &mut self.lines[line.index()];
            if state.is_high {
                state.is_high = false;
                lowered.insert(line);
            }
        }
        lowered
    }

    pub fn state(&self, line: OutputLine) -> PulseOutputState {
        self.lines[line.index()]
    }

    pub fn is_high(&self, line: OutputLine) -> bool {
        self.state(line).is_high
    }

    fn raise(&mut self, line: OutputLine, now: Timestamp, raised: &mut LineSet) {
        self.lines[line.index()] = PulseOutputState {
            is_high: true,
            rising_edge: now,
        };
        raised.insert(line);
        trace!("{:?} high at {} us", line, now.as_micros());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(ppqn: u8) -> PulseScheduler {
        PulseScheduler::new(Ppqn::new(ppqn).unwrap())
    }

    #[test]
    fn test_beat_and_sync_on_phase_zero() {
        let mut pulses = scheduler(4);
        let raised = pulses.on_canonical_tick(0, Timestamp::ZERO);
        assert!(raised.contains(OutputLine::DisplayClock));
        assert!(raised.contains(OutputLine::SyncOut));
        assert!(raised.contains(OutputLine::PulseLed));
    }

    #[test]
    fn test_sync_out_follows_divisor() {
        let mut pulses = scheduler(4);
        let sync_phases: Vec<u8> = (0..24)
            .filter(|phase| {
                pulses
                    .on_canonical_tick(*phase, Timestamp::ZERO)
                    .contains(OutputLine::SyncOut)
            })
            .collect();
        assert_eq!(sync_phases, vec![0, 6, 12, 18]);
    }

    #[test]
    fn test_lines_drop_after_their_width() {
        let mut pulses = scheduler(24);
        let start = Timestamp::from_millis(100);
        pulses.on_canonical_tick(0, start);

        let lowered = pulses.tick_timer_update(start + Duration::from_micros(4_999));
        assert!(lowered.is_empty());

        let lowered = pulses.tick_timer_update(start + SYNC_PULSE_WIDTH);
        assert!(lowered.contains(OutputLine::SyncOut));
        assert!(lowered.contains(OutputLine::DisplayClock));
        assert!(pulses.is_high(OutputLine::PulseLed));

        let lowered = pulses.tick_timer_update(start + LED_PULSE_WIDTH);
        assert!(lowered.contains(OutputLine::PulseLed));
        assert!(pulses.tick_timer_update(start + LED_PULSE_WIDTH * 4).is_empty());
    }

    #[test]
    fn test_led_not_retriggered_inside_its_window() {
        let mut pulses = scheduler(24);
        let start = Timestamp::from_millis(0);
        pulses.on_canonical_tick(0, start);
        let led_edge = pulses.state(OutputLine::PulseLed).rising_edge;

        let raised = pulses.on_canonical_tick(1, start + Duration::from_millis(20));
        assert!(raised.contains(OutputLine::SyncOut));
        assert!(!raised.contains(OutputLine::PulseLed));
        assert_eq!(pulses.state(OutputLine::PulseLed).rising_edge, led_edge);
    }

    #[test]
    fn test_force_all_low_reports_only_high_lines() {
        let mut pulses = scheduler(2);
        pulses.on_canonical_tick(12, Timestamp::ZERO);
        let lowered = pulses.force_all_low();
        assert!(lowered.contains(OutputLine::SyncOut));
        assert!(lowered.contains(OutputLine::PulseLed));
        assert!(!lowered.contains(OutputLine::DisplayClock));
        assert!(pulses.force_all_low().is_empty());
    }
}
