use std::path::PathBuf;

use thiserror::Error;

/// Represents all possible errors that can occur outside of the decoder
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create directory \"{path}\": {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to create file \"{path}\": {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing config: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Bluetooth Error: {0}")]
    Bt(#[from] btleplug::Error),
    #[error("TOML Serialization Error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Failed to set up logging: {0}")]
    Logging(String),
    // My errors
    #[error("Failed to get working directory")]
    WorkDir,
    #[error("History capacity must be at least 1")]
    HistoryCapacity,
    #[error("No Bluetooth adapters found! Make sure it's plugged in and enabled.")]
    NoAdapter,
    #[error("Device is missing the Heart Rate Measurement characteristic")]
    MissingCharacteristic,
}
