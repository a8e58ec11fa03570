// ui.rs

use crate::clock::{ClockListener, ClockSource, StopReason, BEATS_PER_MEASURE};
use crate::transport::TransportState;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Snapshot of what the front panel would show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub source: ClockSource,
    pub transport: TransportState,
    pub bpm: u16,
    pub beat: u8,
}

pub type SharedStatus = Arc<Mutex<Status>>;

fn lock(status: &SharedStatus) -> MutexGuard<'_, Status> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mirrors clock core notifications into a [`SharedStatus`].
pub struct StatusListener {
    status: SharedStatus,
}

impl StatusListener {
    pub fn new(status: SharedStatus) -> Self {
        Self { status }
    }
}

impl ClockListener for StatusListener {
    fn on_clock_start(&mut self, source: ClockSource) {
        lock(&self.status).source = source;
    }

    fn on_clock_stop(&mut self, source: ClockSource, _reason: StopReason) {
        let mut status = lock(&self.status);
        if status.source == source {
            status.source = ClockSource::None;
        }
    }

    fn on_beat(&mut self, beat_position: u8) {
        lock(&self.status).beat = beat_position;
    }

    fn on_bpm(&mut self, bpm: u16) {
        lock(&self.status).bpm = bpm;
    }

    fn on_transport(&mut self, state: TransportState) {
        lock(&self.status).transport = state;
    }
}

/// One-line summary used by the spinner.
pub fn format_status(status: &Status) -> String {
    let bpm = if status.bpm == 0 {
        "---".to_string()
    } else {
        status.bpm.to_string()
    };
    format!(
        "source: {:<7} | {:<7} | {} BPM",
        status.source.to_string(),
        format!("{:?}", status.transport),
        bpm
    )
}

fn create_beat_progress(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(u64::from(BEATS_PER_MEASURE)));
    let style = ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:20.cyan}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("⣿⣷ ");
    pb.set_style(style);
    pb.set_prefix("Beat");
    pb
}

fn create_status_spinner(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new_spinner());
    let style = ProgressStyle::default_spinner()
        .template("{prefix:.bold.dim} {spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_prefix("Clock");
    pb
}

/// Redraws the status on stderr until `done` fires or disconnects.
pub fn run_status_display(status: SharedStatus, done: Receiver<()>) {
    let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
    let beat_pb = create_beat_progress(&multi_progress);
    let status_pb = create_status_spinner(&multi_progress);

    loop {
        match done.recv_timeout(REFRESH_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        let snapshot = *lock(&status);
        let playing = snapshot.transport == TransportState::Playing;
        beat_pb.set_position(if playing {
            u64::from(snapshot.beat) + 1
        } else {
            0
        });
        status_pb.set_message(format_status(&snapshot));
        if snapshot.source != ClockSource::None {
            status_pb.tick();
        }
    }

    beat_pb.finish_and_clear();
    status_pb.finish_and_clear();
}
