use config::{Config, ConfigError, File as ConfigFile, FileFormat};
use serde_derive::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

use crate::errors::AppError;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HistorySettings {
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BleSettings {
    pub saved_name: String,
    pub saved_address: String,
    // 0 means subscribe to notifications instead of polling
    pub poll_interval_ms: u64,
    pub scan_timeout_secs: u64,
    pub no_packet_timeout_secs: u64,
}

impl BleSettings {
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_ms > 0).then(|| Duration::from_millis(self.poll_interval_ms))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DummySettings {
    // When enabled, BLE is disabled
    pub enabled: bool,
    pub low_bpm: u16,
    pub high_bpm: u16,
    pub bpm_speed: f32,
    pub loops_before_dc: u16,
    pub malformed_every: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MiscSettings {
    log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    pub history: HistorySettings,
    pub ble: BleSettings,
    pub dummy: DummySettings,
    pub misc: MiscSettings,
}

impl Settings {
    /// Merges the TOML file at `config_path` (if any) over the defaults.
    pub fn load(config_path: &Path, required: bool) -> Result<Self, AppError> {
        let default_log_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        let s = Config::builder()
            .add_source(
                ConfigFile::from(config_path)
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .set_default("history.capacity", 30)?
            .set_default("ble.saved_name", "")?
            .set_default("ble.saved_address", "")?
            .set_default("ble.poll_interval_ms", 0)?
            .set_default("ble.scan_timeout_secs", 15)?
            .set_default("ble.no_packet_timeout_secs", 30)?
            .set_default("dummy.enabled", false)?
            .set_default("dummy.low_bpm", 50)?
            .set_default("dummy.high_bpm", 120)?
            .set_default("dummy.bpm_speed", 1.5)?
            .set_default("dummy.loops_before_dc", 2)?
            .set_default("dummy.malformed_every", 0)?
            .set_default("misc.log_level", default_log_level)?
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.history.capacity == 0 {
            return Err(AppError::HistoryCapacity);
        }
        if self.dummy.bpm_speed <= 0.0 || self.dummy.low_bpm >= self.dummy.high_bpm {
            return Err(AppError::Config(ConfigError::Message(format!(
                "dummy needs low_bpm < high_bpm and a positive bpm_speed (got {}..{} @ {})",
                self.dummy.low_bpm, self.dummy.high_bpm, self.dummy.bpm_speed
            ))));
        }
        Ok(())
    }

    pub fn save(&self, config_path: &Path) -> Result<(), AppError> {
        let toml_string = toml::to_string(self)?;

        let mut file = File::create(config_path).map_err(|e| AppError::CreateFile {
            path: config_path.to_owned(),
            source: e,
        })?;
        file.write_all(toml_string.as_bytes())?;

        Ok(())
    }

    pub fn history_capacity(&self) -> NonZeroUsize {
        // Zero is rejected during load
        NonZeroUsize::new(self.history.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.misc.log_level.to_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("missing.toml"), false).unwrap();
        assert_eq!(settings.history_capacity().get(), 30);
        assert_eq!(settings.ble.poll_interval(), None);
        assert!(!settings.dummy.enabled);
    }

    #[test]
    fn missing_required_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(&dir.path().join("missing.toml"), true).is_err());
    }

    #[test]
    fn overrides_from_file() {
        let file = write_config(
            "[history]\ncapacity = 5\n[ble]\npoll_interval_ms = 1000\n[misc]\nlog_level = \"WARN\"\n",
        );
        let settings = Settings::load(file.path(), true).unwrap();
        assert_eq!(settings.history_capacity().get(), 5);
        assert_eq!(settings.ble.poll_interval(), Some(Duration::from_secs(1)));
        assert_eq!(settings.get_log_level(), LevelFilter::WARN);
    }

    #[test]
    fn zero_capacity_rejected() {
        let file = write_config("[history]\ncapacity = 0\n");
        assert!(matches!(
            Settings::load(file.path(), true),
            Err(AppError::HistoryCapacity)
        ));
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut settings = Settings::load(&path, false).unwrap();
        settings.history.capacity = 12;
        settings.ble.saved_name = "Polar H10".into();
        settings.save(&path).unwrap();

        let reloaded = Settings::load(&path, true).unwrap();
        assert_eq!(reloaded.history.capacity, 12);
        assert_eq!(reloaded.ble.saved_name, "Polar H10");
    }
}
