#![deny(unused_must_use)]

use args::TopLevelCmd;
use errors::AppError;
use std::path::PathBuf;
use tokio::fs::create_dir;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::App;
use crate::reporter::reporter_thread;

#[cfg(not(any(debug_assertions, feature = "portable")))]
use directories::BaseDirs;

pub mod app;
pub mod args;
pub mod errors;
pub mod heart_rate;
pub mod logging;
mod macros;
pub mod reporter;
pub mod settings;

/// Sets up the working directory and logging, then runs until `parent_token` is cancelled.
pub async fn run_headless(
    mut arg_config: TopLevelCmd,
    parent_token: CancellationToken,
) -> Result<(), AppError> {
    let working_directory = determine_working_directory().ok_or(AppError::WorkDir)?;
    // Resolve before we change directories
    if let Some(config_override) = arg_config.config_override.take() {
        arg_config.config_override = Some(std::path::absolute(config_override)?);
    }
    if !working_directory.exists() {
        create_dir(&working_directory)
            .await
            .map_err(|e| AppError::CreateDir {
                path: working_directory.clone(),
                source: e,
            })?;
    }
    std::env::set_current_dir(&working_directory)?;

    let log_handle = logging::init_logging()?;

    let config_path = match &arg_config.config_override {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut app = App::build(&arg_config, config_path, Some(parent_token))?;

    // Starting off at DEBUG, and setting to whatever user has defined
    log_handle.set_level(app.settings.get_log_level())?;

    info!("Loaded config from: {}", app.config_path.display());
    info!("Starting app... v{}", env!("CARGO_PKG_VERSION"));

    let reporter = tokio::spawn(reporter_thread(app.subscribe(), app.cancel_app.clone()));

    app.run().await?;

    app.cancel_app.cancel();
    let _ = reporter.await;

    info!("Shutting down gracefully...");

    Ok(())
}

/// `<exe name>.toml`, relative to the working directory.
fn default_config_path() -> Result<PathBuf, AppError> {
    let exe_path = std::env::current_exe()?;
    let file_name = exe_path
        .with_extension("toml")
        .file_name()
        .ok_or(AppError::WorkDir)?
        .to_owned();
    Ok(PathBuf::from(file_name))
}

/// Returns the directory that logs, config, and other files should be placed in by default.
// The rules for how it determines the directory is as follows:
// If the app is built with the portable feature, it will just return it's parent directory.
// If there is a config file present adjacent to the executable, the executable's parent path is returned.
// Otherwise, it will return the `directories` `config_dir` output.
//
// Debug builds are always portable. Release builds can optionally have the "portable" feature enabled.
fn determine_working_directory() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_parent = exe_path.parent()?.to_path_buf();
    let config_path = exe_path.with_extension("toml");

    if is_portable() || config_path.exists() {
        Some(exe_parent)
    } else {
        get_user_dir()
    }
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn is_portable() -> bool {
    true
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn is_portable() -> bool {
    false
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn get_user_dir() -> Option<PathBuf> {
    None
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn get_user_dir() -> Option<PathBuf> {
    let base_dirs = BaseDirs::new()?;
    let mut config_dir = base_dirs.config_dir().to_owned();
    config_dir.push(env!("CARGO_PKG_NAME"));
    Some(config_dir)
}
