//! Hardware abstraction for the digital lines.
//!
//! The clock logic only sees these traits. The `Sim*` types stand in for GPIO
//! when running on a host or under test.

use crate::clock::{OutputLine, Ppqn};
use crate::sync_in::{CableDetect, EdgeHandler, EdgeInput};
use crossbeam::channel::{bounded, tick, Sender};
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub trait OutputPin: Send {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// The three pulse outputs the scheduler drives.
pub struct PulseOutputs {
    pub sync_out: Box<dyn OutputPin>,
    pub display_clock: Box<dyn OutputPin>,
    pub pulse_led: Box<dyn OutputPin>,
}

impl PulseOutputs {
    pub fn drive(&mut self, line: OutputLine, high: bool) {
        let pin = match line {
            OutputLine::SyncOut => &mut self.sync_out,
            OutputLine::DisplayClock => &mut self.display_clock,
            OutputLine::PulseLed => &mut self.pulse_led,
        };
        trace!("{:?} -> {}", line, if high { "high" } else { "low" });
        if high {
            pin.set_high();
        } else {
            pin.set_low();
        }
    }

    /// Simulated outputs plus handles for observing them.
    pub fn simulated() -> (Self, SimOutputs) {
        let handles = SimOutputs::default();
        let outputs = Self {
            sync_out: Box::new(handles.sync_out.clone()),
            display_clock: Box::new(handles.display_clock.clone()),
            pulse_led: Box::new(handles.pulse_led.clone()),
        };
        (outputs, handles)
    }
}

#[derive(Debug, Default)]
struct PinState {
    high: AtomicBool,
    rises: AtomicUsize,
}

/// A pin that just remembers its level. Clones observe the same pin.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    state: Arc<PinState>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.state.high.load(Ordering::Acquire)
    }

    /// Low-to-high transitions seen so far.
    pub fn rising_edges(&self) -> usize {
        self.state.rises.load(Ordering::Acquire)
    }
}

impl OutputPin for SimPin {
    fn set_high(&mut self) {
        if !self.state.high.swap(true, Ordering::AcqRel) {
            self.state.rises.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn set_low(&mut self) {
        self.state.high.store(false, Ordering::Release);
    }
}

/// Observer handles for [`PulseOutputs::simulated`].
#[derive(Debug, Clone, Default)]
pub struct SimOutputs {
    pub sync_out: SimPin,
    pub display_clock: SimPin,
    pub pulse_led: SimPin,
}

impl SimOutputs {
    pub fn pin(&self, line: OutputLine) -> &SimPin {
        match line {
            OutputLine::SyncOut => &self.sync_out,
            OutputLine::DisplayClock => &self.display_clock,
            OutputLine::PulseLed => &self.pulse_led,
        }
    }
}

/// Cable-detect switch that tests can flip.
#[derive(Debug, Clone)]
pub struct SimCableDetect {
    present: Arc<AtomicBool>,
}

impl SimCableDetect {
    pub fn new(present: bool) -> Self {
        Self {
            present: Arc::new(AtomicBool::new(present)),
        }
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::Release);
    }
}

impl CableDetect for SimCableDetect {
    fn is_present(&self) -> bool {
        self.present.load(Ordering::Acquire)
    }
}

/// Edge input driven by a timer thread, emulating an analog clock source.
pub struct SimPulseInput {
    period: Duration,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl SimPulseInput {
    pub fn new(bpm: u16, ppqn: Ppqn) -> Self {
        Self {
            period: Self::period_for(bpm, ppqn),
            stop: None,
            worker: None,
        }
    }

    /// Time between pulses at `bpm` with `ppqn` pulses per quarter note.
    pub fn period_for(bpm: u16, ppqn: Ppqn) -> Duration {
        let pulses_per_minute = u64::from(bpm.max(1)) * u64::from(ppqn.get());
        Duration::from_micros(60_000_000 / pulses_per_minute)
    }
}

impl EdgeInput for SimPulseInput {
    fn attach(&mut self, mut handler: EdgeHandler) {
        self.detach();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(self.period);
        debug!("Simulated SYNC_IN pulses every {:?}", self.period);
        self.worker = Some(thread::spawn(move || loop {
            crossbeam::channel::select! {
                recv(ticker) -> _ => handler(),
                recv(stop_rx) -> _ => break,
            }
        }));
        self.stop = Some(stop_tx);
    }

    fn detach(&mut self) {
        // Dropping the sender wakes the worker.
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SimPulseInput {
    fn drop(&mut self) {
        self.detach();
    }
}
