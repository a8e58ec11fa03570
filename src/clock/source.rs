use serde::Deserialize;
use std::fmt;

/// Where a clock tick or transport message came from.
///
/// Variant order is arbitration priority: `SyncIn` outranks `Usb`, which
/// outranks `Din`. `None` marks an idle arbitration slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ClockSource {
    #[default]
    None,
    Din,
    Usb,
    SyncIn,
}

impl ClockSource {
    /// True when `self` strictly outranks `other`.
    pub fn outranks(self, other: ClockSource) -> bool {
        self > other
    }

    pub(crate) fn slot(self) -> Option<usize> {
        match self {
            ClockSource::None => None,
            ClockSource::Din => Some(0),
            ClockSource::Usb => Some(1),
            ClockSource::SyncIn => Some(2),
        }
    }
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClockSource::None => "none",
            ClockSource::Din => "DIN",
            ClockSource::Usb => "USB",
            ClockSource::SyncIn => "SYNC_IN",
        };
        f.write_str(name)
    }
}

/// User override for source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Priority arbitration between every enabled source.
    #[default]
    Auto,
    /// Only USB may drive the clock.
    #[serde(alias = "usb")]
    #[value(name = "usb", alias = "force-usb")]
    ForceUsb,
    /// Only DIN may drive the clock.
    #[serde(alias = "din")]
    #[value(name = "din", alias = "force-din")]
    ForceDin,
}

impl SourceMode {
    pub fn permits(self, source: ClockSource) -> bool {
        match self {
            SourceMode::Auto => source != ClockSource::None,
            SourceMode::ForceUsb => source == ClockSource::Usb,
            SourceMode::ForceDin => source == ClockSource::Din,
        }
    }
}

/// Which physical sources this hardware variant provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnabledSources {
    pub usb: bool,
    pub din: bool,
    pub sync_in: bool,
}

impl EnabledSources {
    pub fn contains(self, source: ClockSource) -> bool {
        match source {
            ClockSource::None => false,
            ClockSource::Din => self.din,
            ClockSource::Usb => self.usb,
            ClockSource::SyncIn => self.sync_in,
        }
    }
}

impl Default for EnabledSources {
    fn default() -> Self {
        Self {
            usb: true,
            din: true,
            sync_in: true,
        }
    }
}
