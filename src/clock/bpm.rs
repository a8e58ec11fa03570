use super::time::Timestamp;
use log::debug;

/// Beats in one BPM measurement window.
pub const BEATS_PER_MEASURE: u8 = 4;

/// Tempo of a measure lasting `interval_ms`, truncated toward zero.
///
/// A zero interval yields 0 rather than dividing by zero.
pub fn compute_bpm(interval_ms: u64) -> u16 {
    if interval_ms == 0 {
        return 0;
    }
    let per_minute = 60_000 * u64::from(BEATS_PER_MEASURE);
    u16::try_from(per_minute / interval_ms).unwrap_or(u16::MAX)
}

/// Estimates tempo once per 4-beat measure from beat timestamps.
#[derive(Debug, Clone, Default)]
pub struct BpmCounter {
    bpm: u16,
    last_measure: Option<Timestamp>,
    beat_position: u8,
}

impl BpmCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a beat. Returns the new estimate when a measure completes.
    pub fn on_beat(&mut self, now: Timestamp) -> Option<u16> {
        let mut estimate = None;
        if self.beat_position == 0 {
            if let Some(started) = self.last_measure {
                let interval_ms = now.saturating_since(started).as_millis();
                let bpm = compute_bpm(u64::try_from(interval_ms).unwrap_or(u64::MAX));
                debug!("{} ms measure = {} BPM", interval_ms, bpm);
                self.bpm = bpm;
                estimate = Some(bpm);
            }
            self.last_measure = Some(now);
        }
        self.beat_position = (self.beat_position + 1) % BEATS_PER_MEASURE;
        estimate
    }

    /// Restarts the measurement window, keeping the last estimate.
    pub fn reset_window(&mut self) {
        self.beat_position = 0;
        self.last_measure = None;
    }

    /// Full reset, forgetting the estimate as well.
    pub fn clear(&mut self) {
        self.reset_window();
        self.bpm = 0;
    }

    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    /// Position of the next beat within the measure, in `0..4`.
    pub fn beat_position(&self) -> u8 {
        self.beat_position
    }
}
