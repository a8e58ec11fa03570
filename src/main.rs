use clap::Parser;
use clocksyncrs::{
    cli::{select_device, validate_device, Args},
    clock::SystemClock,
    config::Settings,
    event_loop::{EngineMessage, EventLoop},
    hal::{PulseOutputs, SimCableDetect, SimPulseInput},
    input::run_console_input,
    logging,
    midi::{self, DinTransport, MidirLink, UsbTransport},
    sync_in::SyncInPort,
    ui::{run_status_display, SharedStatus, StatusListener},
};
use crossbeam::channel::{bounded, unbounded};
use std::thread;

fn main() {
    let args = Args::parse();
    initialize_logging(args.log_stderr);

    let devices = get_available_devices();
    if args.device_list {
        list_available_devices(&devices);
        return;
    }

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings.with_overrides(args.ppqn, args.clock_source),
        Err(e) => exit_with_error(&format!("Error loading settings: {}", e)),
    };
    log::info!("Settings: {:?}", settings);

    let (usb_device, din_device) = choose_devices(&args, &devices);
    for device_name in usb_device.iter().chain(din_device.iter()) {
        if let Err(error_msg) = validate_device(device_name, &devices) {
            exit_with_error(&error_msg);
        }
    }

    let clock = SystemClock::new();
    // No GPIO on a host: outputs are observed through the status display only.
    let (outputs, _pins) = PulseOutputs::simulated();
    let mut event_loop = EventLoop::new(clock, &settings, outputs);

    if let Some(name) = usb_device {
        let link = connect(&name);
        event_loop = event_loop.with_transport(Box::new(UsbTransport::new(link)));
    }
    if let Some(name) = din_device {
        let link = connect(&name);
        event_loop = event_loop.with_transport(Box::new(DinTransport::new(link)));
    }
    if let Some(bpm) = args.simulate_sync_in {
        println!("Simulating SYNC_IN at {} BPM, {}", bpm, settings.ppqn);
        let input = SimPulseInput::new(bpm, settings.ppqn);
        let cable = SimCableDetect::new(true);
        let port = SyncInPort::new(Box::new(input), Box::new(cable), clock);
        event_loop = event_loop.with_sync_in(port);
    }

    let status = SharedStatus::default();
    event_loop.add_listener(Box::new(StatusListener::new(status.clone())));

    let (command_tx, command_rx) = unbounded::<EngineMessage>();
    let mut event_loop = event_loop.with_commands(command_rx);

    let (done_tx, done_rx) = bounded::<()>(1);
    let display = thread::spawn(move || run_status_display(status, done_rx));
    thread::spawn(move || run_console_input(settings, command_tx));

    println!("Enter: play/pause, s: stop, ppqn <n>, source <auto|usb|din>, q: quit");
    event_loop.run();

    drop(done_tx);
    let _ = display.join();
    log::info!("Application exiting");
}

fn initialize_logging(log_stderr: bool) {
    let result = if log_stderr {
        logging::init_stderr_logger()
    } else {
        logging::init_logger()
    };
    if let Err(e) = result {
        eprintln!("Logger initialization failed: {}", e);
    }
    log::info!("Application starting");
}

fn get_available_devices() -> Vec<String> {
    midi::list_devices().unwrap_or_else(|e| {
        log::warn!("Could not enumerate MIDI devices: {}", e);
        Vec::new()
    })
}

fn list_available_devices(devices: &[String]) {
    println!("Available MIDI devices:");
    for device in devices {
        println!("  - {}", device);
    }
}

fn choose_devices(args: &Args, devices: &[String]) -> (Option<String>, Option<String>) {
    if !args.select_devices {
        return (args.usb_device.clone(), args.din_device.clone());
    }
    let usb = args
        .usb_device
        .clone()
        .or_else(|| select_device("USB MIDI device", devices));
    let din = args
        .din_device
        .clone()
        .or_else(|| select_device("DIN MIDI device", devices));
    (usb, din)
}

fn connect(device_name: &str) -> MidirLink {
    match MidirLink::connect(device_name) {
        Ok(link) => {
            println!("Successfully connected to MIDI device: {}", device_name);
            link
        }
        Err(e) => exit_with_error(&format!("Error connecting to MIDI device: {}", e)),
    }
}

fn exit_with_error(error_msg: &str) -> ! {
    log::error!("{}", error_msg);
    eprintln!("{}", error_msg);
    std::process::exit(1);
}
