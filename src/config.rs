// config.rs

use crate::clock::{EnabledSources, Ppqn, RateError, SourceMode};
use config::{Config, Environment, File, FileFormat};
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Prefix for environment overrides, e.g. `CLOCKSYNC_PPQN=4` or
/// `CLOCKSYNC_SOURCES__SYNC_IN=false`.
pub const ENV_PREFIX: &str = "CLOCKSYNC";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid sync rate: {0}")]
    Rate(#[from] RateError),
}

/// Settings as they appear in the file and environment, before validation.
#[derive(Debug, Deserialize)]
struct RawSettings {
    ppqn: u8,
    source_mode: SourceMode,
    #[serde(default)]
    sources: EnabledSources,
}

/// Validated runtime settings. The core only reads them; changes go through
/// `ClockCore::apply_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    pub ppqn: Ppqn,
    pub source_mode: SourceMode,
    pub enabled: EnabledSources,
}

impl Settings {
    /// Loads defaults, then the optional TOML file, then `CLOCKSYNC_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::build(path, Some(env))
    }

    /// Like [`Settings::load`] but ignores the environment.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        Self::build(Some(path), None)
    }

    fn build(path: Option<&Path>, env: Option<Environment>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("ppqn", i64::from(defaults.ppqn.get()))?
            .set_default("source_mode", "auto")?;

        if let Some(path) = path {
            info!("Loading settings from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        debug!("Raw settings: {:?}", raw);
        raw.validate()
    }

    /// Applies command-line overrides on top of loaded values.
    pub fn with_overrides(mut self, ppqn: Option<Ppqn>, source_mode: Option<SourceMode>) -> Self {
        if let Some(ppqn) = ppqn {
            self.ppqn = ppqn;
        }
        if let Some(source_mode) = source_mode {
            self.source_mode = source_mode;
        }
        self
    }
}

impl RawSettings {
    fn validate(self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            ppqn: Ppqn::new(self.ppqn)?,
            source_mode: self.source_mode,
            enabled: self.sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "clocksyncrs-{}-{}.toml",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::build(None, None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.ppqn.get(), 2);
        assert_eq!(settings.source_mode, SourceMode::Auto);
    }

    #[test]
    fn test_file_values() {
        let path = write_temp(
            "values",
            "ppqn = 4\nsource_mode = \"din\"\n\n[sources]\nsync_in = false\n",
        );
        let settings = Settings::load_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.ppqn.get(), 4);
        assert_eq!(settings.source_mode, SourceMode::ForceDin);
        assert!(!settings.enabled.sync_in);
        assert!(settings.enabled.usb);
    }

    #[test]
    fn test_unsupported_ppqn_is_rejected() {
        let path = write_temp("bad-ppqn", "ppqn = 5\n");
        let result = Settings::load_file(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(
            result,
            Err(ConfigError::Rate(RateError::NotDivisor(5)))
        ));
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings::default().with_overrides(
            Some(Ppqn::new(24).unwrap()),
            Some(SourceMode::ForceUsb),
        );
        assert_eq!(settings.ppqn.get(), 24);
        assert_eq!(settings.source_mode, SourceMode::ForceUsb);
        assert_eq!(Settings::default().with_overrides(None, None), Settings::default());
    }
}
