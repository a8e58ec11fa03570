use simplelog::*;
use std::fs::{self, File, OpenOptions};
use std::io::{Error, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

static INIT: Once = Once::new();
static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// `$HOME/.local/share/clocksyncrs/logs`
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("clocksyncrs")
        .join("logs"))
}

/// Installs the file logger. Later calls, or calls after
/// [`init_stderr_logger`], leave the log file untouched.
pub fn init_logger() -> Result<(), Error> {
    let mut outcome = Ok(());
    INIT.call_once(|| {
        outcome = open_log_file().and_then(|log_file| {
            WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)
                .map_err(|e| Error::new(ErrorKind::Other, e))
        });
        if outcome.is_ok() {
            LOGGER_INITIALIZED.store(true, Ordering::Release);
        }
    });
    outcome?;

    if LOGGER_INITIALIZED.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::Other, "Logger initialization failed"))
    }
}

fn open_log_file() -> Result<File, Error> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let mut log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("app.log"))?;
    write_session_header(&mut log_file)?;
    Ok(log_file)
}

/// Logs to stderr through `env_logger`, filtered by `RUST_LOG`.
pub fn init_stderr_logger() -> Result<(), Error> {
    INIT.call_once(|| {
        let result = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();
        if result.is_ok() {
            LOGGER_INITIALIZED.store(true, Ordering::Release);
        }
    });

    if LOGGER_INITIALIZED.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::Other, "Logger initialization failed"))
    }
}

fn write_session_header(file: &mut File) -> Result<(), Error> {
    let started = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "---- clocksyncrs session started {} ----", started)
}
