pub mod cli;
pub mod clock;
pub mod config;
pub mod event_loop;
pub mod hal;
pub mod input;
pub mod logging;
pub mod midi;
pub mod sync_in;
pub mod transport;
pub mod ui;

pub use cli::{validate_device, Args};
pub use clock::{ClockCore, ClockSource, Ppqn, SourceMode};
pub use config::Settings;
pub use event_loop::{EngineMessage, EventLoop};
