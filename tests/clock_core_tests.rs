use clocksyncrs::clock::{
    ClockCore, ClockListener, ClockSource, Effect, OutputLine, Ppqn, SourceMode, Timestamp,
};
use clocksyncrs::config::Settings;
use clocksyncrs::midi::RealTimeMessage;
use clocksyncrs::transport::TransportState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 120 BPM: one MIDI clock every 20.833 ms.
const TICK_120_US: u64 = 20_833;

fn us(micros: u64) -> Timestamp {
    Timestamp::from_micros(micros)
}

fn ms(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

fn settings_with_ppqn(ppqn: u8) -> Settings {
    Settings {
        ppqn: Ppqn::new(ppqn).unwrap(),
        ..Settings::default()
    }
}

fn raised(effects: &[Effect], line: OutputLine) -> usize {
    effects
        .iter()
        .filter(|e| **e == Effect::Line { line, high: true })
        .count()
}

fn sent(effects: &[Effect], message: RealTimeMessage) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::Send { message: m, .. } if *m == message))
        .count()
}

#[derive(Clone, Default)]
struct BeatCounter {
    beats: Arc<AtomicUsize>,
}

impl ClockListener for BeatCounter {
    fn on_beat(&mut self, _beat_position: u8) {
        self.beats.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn usb_start_preempts_running_din() {
    let mut core = ClockCore::new(&Settings::default());
    assert!(core.process_message(ClockSource::Din, RealTimeMessage::Start, us(0)));
    for tick in 0..7 {
        assert!(core.on_tick(ClockSource::Din, us(tick * TICK_120_US)));
    }
    assert_eq!(core.ticks_since_quarter_note(), 7);

    let takeover = us(7 * TICK_120_US);
    assert!(core.process_message(ClockSource::Usb, RealTimeMessage::Start, takeover));
    assert_eq!(core.active_source(), ClockSource::Usb);
    assert_eq!(core.ticks_since_quarter_note(), 0);
    core.drain_effects().for_each(drop);

    // DIN keeps sending but nothing it says is accepted or forwarded.
    assert!(!core.on_tick(ClockSource::Din, takeover + Duration::from_millis(1)));
    assert!(!core.process_message(ClockSource::Din, RealTimeMessage::Stop, takeover));
    assert!(!core.process_message(ClockSource::Din, RealTimeMessage::Start, takeover));
    assert_eq!(core.drain_effects().count(), 0);
    assert_eq!(core.active_source(), ClockSource::Usb);

    // 3000 ms of USB silence is tolerated; one more millisecond is not.
    core.poll_timers(takeover + Duration::from_millis(3000));
    assert_eq!(core.active_source(), ClockSource::Usb);
    core.poll_timers(takeover + Duration::from_millis(3001));
    assert_eq!(core.active_source(), ClockSource::None);

    assert!(core.on_tick(ClockSource::Din, ms(4000)));
    assert_eq!(core.active_source(), ClockSource::Din);
}

#[test]
fn usb_timeout_is_not_announced_downstream() {
    let mut core = ClockCore::new(&Settings::default());
    core.on_tick(ClockSource::Usb, ms(0));
    core.drain_effects().for_each(drop);
    core.poll_timers(ms(3001));
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(sent(&effects, RealTimeMessage::Stop), 0);
    assert_eq!(core.active_source(), ClockSource::None);
}

#[test]
fn sync_in_pulse_expands_to_burst() {
    let mut core = ClockCore::new(&settings_with_ppqn(2));
    let counter = BeatCounter::default();
    let beats = counter.beats.clone();
    core.add_listener(Box::new(counter));

    assert!(core.on_sync_in_pulse(ms(0)));
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(core.active_source(), ClockSource::SyncIn);
    assert_eq!(sent(&effects, RealTimeMessage::Clock), 12);
    assert_eq!(
        effects.first(),
        Some(&Effect::Send {
            message: RealTimeMessage::Start,
            origin: ClockSource::SyncIn
        })
    );
    assert_eq!(raised(&effects, OutputLine::SyncOut), 1);
    assert_eq!(raised(&effects, OutputLine::DisplayClock), 1);
    assert_eq!(beats.load(Ordering::SeqCst), 1);
    assert_eq!(core.ticks_since_quarter_note(), 12);
    assert_eq!(core.transport_state(), TransportState::Playing);

    core.poll_timers(ms(5));
    assert!(!core.is_line_high(OutputLine::SyncOut));

    // Second pulse lands on ticks 12..24: sync-out again, no new beat.
    assert!(core.on_sync_in_pulse(ms(250)));
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(sent(&effects, RealTimeMessage::Start), 0);
    assert_eq!(raised(&effects, OutputLine::SyncOut), 1);
    assert_eq!(raised(&effects, OutputLine::DisplayClock), 0);
    assert_eq!(beats.load(Ordering::SeqCst), 1);
    assert_eq!(core.ticks_since_quarter_note(), 0);
}

#[test]
fn sync_in_outranks_midi() {
    let mut core = ClockCore::new(&Settings::default());
    core.on_tick(ClockSource::Usb, ms(0));
    assert!(core.on_sync_in_pulse(ms(1)));
    assert!(!core.on_tick(ClockSource::Usb, ms(2)));
    assert!(!core.on_tick(ClockSource::Din, ms(2)));
    assert!(!core.on_start(ClockSource::Usb, ms(2)));

    // Losing the cable stops SYNC_IN and tells downstream gear.
    core.drain_effects().for_each(drop);
    core.sync_in_cable(false);
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(core.active_source(), ClockSource::None);
    assert_eq!(core.transport_state(), TransportState::Stopped);
    assert!(effects.contains(&Effect::Send {
        message: RealTimeMessage::Stop,
        origin: ClockSource::SyncIn
    }));
    assert!(core.on_tick(ClockSource::Usb, ms(3)));
}

#[test]
fn stop_from_active_source_allows_fallback() {
    let mut core = ClockCore::new(&Settings::default());
    core.on_start(ClockSource::Usb, ms(0));
    core.on_tick(ClockSource::Usb, ms(1));
    assert!(!core.on_stop(ClockSource::Din));
    assert_eq!(core.transport_state(), TransportState::Playing);

    assert!(core.on_stop(ClockSource::Usb));
    assert_eq!(core.active_source(), ClockSource::None);
    assert_eq!(core.transport_state(), TransportState::Stopped);
    assert!(core.on_tick(ClockSource::Din, ms(2)));
}

#[test]
fn pulse_widths_and_no_retrigger() {
    let mut core = ClockCore::new(&settings_with_ppqn(24));
    core.on_tick(ClockSource::Din, ms(0));
    core.poll_timers(us(4_999));
    assert!(core.is_line_high(OutputLine::SyncOut));
    core.poll_timers(ms(5));
    assert!(!core.is_line_high(OutputLine::SyncOut));
    assert!(!core.is_line_high(OutputLine::DisplayClock));
    assert!(core.is_line_high(OutputLine::PulseLed));
    core.drain_effects().for_each(drop);

    // At 24 PPQN every tick pulses sync-out, but the LED holds its window.
    core.on_tick(ClockSource::Din, ms(20));
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(raised(&effects, OutputLine::SyncOut), 1);
    assert_eq!(raised(&effects, OutputLine::PulseLed), 0);

    core.poll_timers(ms(50));
    assert!(!core.is_line_high(OutputLine::PulseLed));
    for later in [60, 100, 1000] {
        core.poll_timers(ms(later));
    }
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert!(effects
        .iter()
        .all(|e| !matches!(e, Effect::Line { high: true, .. })));
}

#[test]
fn bpm_measured_over_one_measure() {
    let mut core = ClockCore::new(&Settings::default());
    core.on_start(ClockSource::Din, ms(0));
    // 60 BPM: 1000 ms per beat, 41.666 ms per tick.
    for tick in 0..=96u64 {
        core.on_tick(ClockSource::Din, us(tick * 1_000_000 / 24));
    }
    assert_eq!(core.bpm(), 60);

    core.on_stop(ClockSource::Din);
    assert_eq!(core.bpm(), 60);
}

#[test]
fn forced_mode_releases_disallowed_source() {
    let mut core = ClockCore::new(&Settings::default());
    core.on_tick(ClockSource::Usb, ms(0));
    let forced = Settings {
        source_mode: SourceMode::ForceDin,
        ..Settings::default()
    };
    core.apply_settings(&forced);
    assert_eq!(core.active_source(), ClockSource::None);
    assert!(!core.on_tick(ClockSource::Usb, ms(1)));
    assert!(!core.on_sync_in_pulse(ms(1)));
    assert!(core.on_tick(ClockSource::Din, ms(1)));
}

#[test]
fn active_sensing_passes_through_without_arbitration() {
    let mut core = ClockCore::new(&Settings::default());
    core.on_start(ClockSource::Usb, ms(0));
    core.drain_effects().for_each(drop);

    // Even a lower-priority source gets its keepalive forwarded.
    assert!(core.process_message(ClockSource::Din, RealTimeMessage::ActiveSensing, ms(1)));
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(
        effects,
        vec![Effect::Send {
            message: RealTimeMessage::ActiveSensing,
            origin: ClockSource::Din
        }]
    );
    assert_eq!(core.active_source(), ClockSource::Usb);

    // It does not count as clock activity for the timeout.
    core.process_message(ClockSource::Usb, RealTimeMessage::ActiveSensing, ms(2500));
    core.poll_timers(ms(3001));
    assert_eq!(core.active_source(), ClockSource::None);
}

#[test]
fn continue_resumes_at_the_paused_phase() {
    let mut core = ClockCore::new(&Settings::default());
    assert!(core.process_message(ClockSource::Usb, RealTimeMessage::Start, ms(0)));
    for tick in 0..5 {
        core.process_message(ClockSource::Usb, RealTimeMessage::Clock, us(tick * TICK_120_US));
    }
    assert!(core.process_message(ClockSource::Usb, RealTimeMessage::Stop, ms(110)));
    assert_eq!(core.transport_state(), TransportState::Stopped);
    core.drain_effects().for_each(drop);

    let resumed = ms(10_000);
    assert!(core.process_message(ClockSource::Usb, RealTimeMessage::Continue, resumed));
    assert_eq!(core.ticks_since_quarter_note(), 5);
    assert_eq!(core.active_source(), ClockSource::Usb);
    assert_eq!(core.transport_state(), TransportState::Playing);
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(
        effects,
        vec![Effect::Send {
            message: RealTimeMessage::Continue,
            origin: ClockSource::Usb
        }]
    );

    // The next clock lands on phase 5, so no beat-aligned pulse fires.
    assert!(core.on_tick(ClockSource::Usb, resumed));
    assert_eq!(core.ticks_since_quarter_note(), 6);
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(raised(&effects, OutputLine::SyncOut), 0);
    assert_eq!(raised(&effects, OutputLine::DisplayClock), 0);

    // The pause is not part of the next measure: 120 BPM, not a crawl.
    for tick in 1..=115u64 {
        core.on_tick(ClockSource::Usb, resumed + Duration::from_micros(tick * TICK_120_US));
    }
    assert_eq!(core.bpm(), 120);
}

#[test]
fn usb_continue_displaces_din_and_realigns() {
    let mut core = ClockCore::new(&Settings::default());
    core.on_start(ClockSource::Din, ms(0));
    for tick in 0..5 {
        core.on_tick(ClockSource::Din, us(tick * TICK_120_US));
    }
    assert_eq!(core.ticks_since_quarter_note(), 5);
    core.poll_timers(ms(100));
    core.drain_effects().for_each(drop);

    assert!(core.process_message(ClockSource::Usb, RealTimeMessage::Continue, ms(110)));
    assert_eq!(core.active_source(), ClockSource::Usb);
    assert_eq!(core.ticks_since_quarter_note(), 0);
    assert_eq!(core.transport_state(), TransportState::Playing);
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(sent(&effects, RealTimeMessage::Continue), 1);
    assert_eq!(sent(&effects, RealTimeMessage::Start), 0);

    assert!(!core.on_tick(ClockSource::Din, ms(120)));
    assert!(core.on_tick(ClockSource::Usb, ms(120)));
    let effects: Vec<Effect> = core.drain_effects().collect();
    assert_eq!(raised(&effects, OutputLine::DisplayClock), 1);
}
