//! SYNC_IN analog pulse capture.
//!
//! The edge handler runs in interrupt (or callback thread) context, so it
//! only stamps the time into a single atomic. The event loop collects it
//! with [`SyncInPort::take_pending`] and does all real work there.

use crate::clock::{MonotonicClock, Timestamp};
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback installed on the SYNC_IN rising edge.
pub type EdgeHandler = Box<dyn FnMut() + Send>;

/// A rising-edge interrupt source.
pub trait EdgeInput: Send {
    fn attach(&mut self, handler: EdgeHandler);
    fn detach(&mut self);
}

/// The jack-switch line telling whether a SYNC_IN cable is plugged in.
pub trait CableDetect: Send {
    fn is_present(&self) -> bool;
}

/// Single-slot edge latch shared between the handler and the loop.
///
/// Holds `micros + 1` so that zero can mean "nothing pending". Edges that
/// arrive before the loop collects the previous one overwrite it.
#[derive(Debug, Clone, Default)]
pub struct SyncInCapture {
    pending: Arc<AtomicU64>,
}

impl SyncInCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the handler to attach to the edge input.
    pub fn edge_handler<C>(&self, clock: C) -> EdgeHandler
    where
        C: MonotonicClock + Send + 'static,
    {
        let capture = self.clone();
        Box::new(move || capture.record(clock.now()))
    }

    pub fn record(&self, at: Timestamp) {
        let encoded = at.as_micros().saturating_add(1);
        self.pending.store(encoded, Ordering::Release);
    }

    /// Reads and clears the latched edge in one step.
    pub fn take_pending(&self) -> Option<Timestamp> {
        match self.pending.swap(0, Ordering::AcqRel) {
            0 => None,
            encoded => Some(Timestamp::from_micros(encoded - 1)),
        }
    }
}

/// The SYNC_IN jack: edge input, cable detect and the capture latch.
pub struct SyncInPort {
    capture: SyncInCapture,
    input: Box<dyn EdgeInput>,
    cable: Box<dyn CableDetect>,
    cable_present: bool,
}

impl SyncInPort {
    /// Attaches the edge handler, stamping edges with `clock`.
    pub fn new<C>(mut input: Box<dyn EdgeInput>, cable: Box<dyn CableDetect>, clock: C) -> Self
    where
        C: MonotonicClock + Send + 'static,
    {
        let capture = SyncInCapture::new();
        input.attach(capture.edge_handler(clock));
        let cable_present = cable.is_present();
        info!("SYNC_IN attached, cable present: {}", cable_present);
        Self {
            capture,
            input,
            cable,
            cable_present,
        }
    }

    /// Samples the cable-detect line, logging changes.
    pub fn cable_present(&mut self) -> bool {
        let present = self.cable.is_present();
        if present != self.cable_present {
            info!(
                "SYNC_IN cable {}",
                if present { "inserted" } else { "removed" }
            );
            self.cable_present = present;
        }
        present
    }

    pub fn take_pending(&self) -> Option<Timestamp> {
        self.capture.take_pending()
    }
}

impl Drop for SyncInPort {
    fn drop(&mut self) {
        self.input.detach();
    }
}
