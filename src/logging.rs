use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{self, LevelFilter};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{prelude::*, reload};

use crate::errors::AppError;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

type SetLevel = Box<dyn Fn(LevelFilter) -> Result<(), AppError> + Send + Sync>;

/// Keeps the file writer alive and lets the level be changed once settings are loaded.
pub struct LogHandle {
    _guard: WorkerGuard,
    set_level: SetLevel,
}

impl LogHandle {
    pub fn set_level(&self, level: LevelFilter) -> Result<(), AppError> {
        (self.set_level)(level)
    }
}

/// Logs to `<exe name>.log` in the current directory and to stderr.
/// Starts at DEBUG until told otherwise.
pub fn init_logging() -> Result<LogHandle, AppError> {
    let log_name = std::env::current_exe()?
        .with_extension("log")
        .file_name()
        .ok_or(AppError::WorkDir)?
        .to_owned();
    let file_appender = BasicRollingFileAppender::new(
        log_name,
        RollingConditionBasic::new().max_size(1024 * 1024 * 5),
        2,
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_file(false)
        .with_ansi(false)
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_owned()))
        .with_line_number(true)
        .with_filter(filter::LevelFilter::DEBUG);
    let (file_layer, file_handle) = reload::Layer::new(file_layer);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_owned()))
        .with_filter(filter::LevelFilter::DEBUG);
    let (stderr_layer, stderr_handle) = reload::Layer::new(stderr_layer);

    // Allow everything through but keep the BLE stack quieter
    let env_filter = filter::EnvFilter::new("trace,btleplug=info,bluez_async=info");
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    let set_level: SetLevel = Box::new(move |level| {
        file_handle
            .modify(|layer| *layer.filter_mut() = level)
            .and_then(|_| stderr_handle.modify(|layer| *layer.filter_mut() = level))
            .map_err(|e| AppError::Logging(e.to_string()))
    });

    Ok(LogHandle {
        _guard: guard,
        set_level,
    })
}
