//! PPQN rate conversion against the canonical 24-tick MIDI clock grid.
//!
//! Both directions pivot on the same grid: an incoming SYNC_IN pulse expands
//! into `multiplier` MIDI clocks, and a SYNC_OUT pulse is emitted once every
//! `divisor` MIDI clocks. For a given PPQN the two factors are equal.

use std::fmt;
use thiserror::Error;

/// MIDI clock resolution (pulses per quarter note).
pub const MIDI_CLOCKS_PER_QUARTER: u8 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("PPQN must be greater than zero")]
    Zero,
    #[error("{0} PPQN does not evenly divide the 24-tick MIDI clock grid")]
    NotDivisor(u8),
}

pub type Result<T> = std::result::Result<T, RateError>;

/// A pulses-per-quarter-note setting that evenly divides 24.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ppqn(u8);

impl Ppqn {
    /// Every setting accepted by the converter.
    pub const SUPPORTED: [u8; 8] = [1, 2, 3, 4, 6, 8, 12, 24];

    pub fn new(ppqn: u8) -> Result<Self> {
        if ppqn == 0 {
            return Err(RateError::Zero);
        }
        if MIDI_CLOCKS_PER_QUARTER % ppqn != 0 {
            return Err(RateError::NotDivisor(ppqn));
        }
        Ok(Ppqn(ppqn))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// MIDI clocks generated per incoming SYNC_IN pulse.
    pub fn multiplier(self) -> u8 {
        multiplier_for(self)
    }

    /// MIDI clocks consumed per outgoing SYNC_OUT pulse.
    pub fn divisor(self) -> u8 {
        divisor_for(self)
    }
}

impl Default for Ppqn {
    fn default() -> Self {
        Ppqn(2)
    }
}

impl TryFrom<u8> for Ppqn {
    type Error = RateError;

    fn try_from(value: u8) -> Result<Self> {
        Ppqn::new(value)
    }
}

impl fmt::Display for Ppqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} PPQN", self.0)
    }
}

pub fn multiplier_for(ppqn: Ppqn) -> u8 {
    MIDI_CLOCKS_PER_QUARTER / ppqn.0
}

pub fn divisor_for(ppqn: Ppqn) -> u8 {
    MIDI_CLOCKS_PER_QUARTER / ppqn.0
}
