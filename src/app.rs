use std::path::PathBuf;

use tokio::sync::broadcast::{self, Receiver as BReceiver, Sender as BSender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::args::{SubCommands, TopLevelCmd};
use crate::broadcast;
use crate::errors::AppError;
use crate::heart_rate::ble::ble_thread;
use crate::heart_rate::dummy::dummy_thread;
use crate::heart_rate::{HeartRateMonitor, HeartRateUpdate, SourceEvent};
use crate::settings::Settings;

const SOURCE_CHANNEL_SIZE: usize = 64;
const BROADCAST_CHANNEL_SIZE: usize = 64;

/// What presentation layers are told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppUpdate {
    Connected(String),
    HeartRate(HeartRateUpdate),
    Disconnected,
}

impl From<HeartRateUpdate> for AppUpdate {
    fn from(update: HeartRateUpdate) -> Self {
        AppUpdate::HeartRate(update)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Ble,
    Dummy,
}

pub struct App {
    pub settings: Settings,
    pub config_path: PathBuf,
    pub source_kind: SourceKind,
    monitor: HeartRateMonitor,
    broadcast_tx: BSender<AppUpdate>,
    pub cancel_app: CancellationToken,
    source_handle: Option<JoinHandle<()>>,
}

impl App {
    pub fn build(
        arg_config: &TopLevelCmd,
        config_path: PathBuf,
        parent_token: Option<CancellationToken>,
    ) -> Result<Self, AppError> {
        let mut settings = Settings::load(&config_path, arg_config.config_required)?;

        if !arg_config.no_save {
            settings.save(&config_path)?;
        }

        let source_kind = match &arg_config.subcommands {
            Some(SubCommands::Ble(ble_cmd)) => {
                if let Some(poll_ms) = ble_cmd.poll_ms {
                    settings.ble.poll_interval_ms = poll_ms;
                }
                SourceKind::Ble
            }
            Some(SubCommands::Dummy(_)) => SourceKind::Dummy,
            None if settings.dummy.enabled => SourceKind::Dummy,
            None => SourceKind::Ble,
        };

        let monitor = HeartRateMonitor::new(settings.history_capacity());
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CHANNEL_SIZE);
        let cancel_app = parent_token.unwrap_or_default();

        Ok(Self {
            settings,
            config_path,
            source_kind,
            monitor,
            broadcast_tx,
            cancel_app,
            source_handle: None,
        })
    }

    /// For anything that wants to show the current BPM and history.
    pub fn subscribe(&self) -> BReceiver<AppUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub fn monitor(&self) -> &HeartRateMonitor {
        &self.monitor
    }

    /// Runs until the app token is cancelled or the source hangs up.
    pub async fn run(&mut self) -> Result<(), AppError> {
        let (source_tx, mut source_rx) = mpsc::channel(SOURCE_CHANNEL_SIZE);
        let source_token = self.cancel_app.child_token();

        info!(
            "Starting {:?} source, keeping {} readings of history",
            self.source_kind,
            self.monitor.history().capacity()
        );
        let handle = match self.source_kind {
            SourceKind::Ble => tokio::spawn(ble_thread(
                source_tx,
                self.settings.ble.clone(),
                source_token.clone(),
            )),
            SourceKind::Dummy => tokio::spawn(dummy_thread(
                source_tx,
                self.settings.dummy.clone(),
                source_token.clone(),
            )),
        };
        self.source_handle = Some(handle);

        loop {
            tokio::select! {
                event = source_rx.recv() => {
                    match event {
                        Some(event) => {
                            if let Some(update) = self.handle_source_event(event) {
                                broadcast!(self.broadcast_tx, update);
                            }
                        }
                        None => {
                            warn!("HR source closed its channel");
                            break;
                        }
                    }
                }
                _ = self.cancel_app.cancelled() => {
                    break;
                }
            }
        }

        source_token.cancel();
        self.join_threads().await;
        Ok(())
    }

    pub fn handle_source_event(&mut self, event: SourceEvent) -> Option<AppUpdate> {
        match event {
            SourceEvent::Sample(bytes) => self.monitor.on_sample(&bytes).map(AppUpdate::from),
            SourceEvent::Connected(name) => {
                info!("Heart Rate Monitor connected: {name}");
                Some(AppUpdate::Connected(name))
            }
            SourceEvent::Disconnected => {
                info!("Heart Rate Monitor disconnected, clearing history");
                self.monitor.on_disconnect();
                Some(AppUpdate::Disconnected)
            }
        }
    }

    pub async fn join_threads(&mut self) {
        if let Some(handle) = self.source_handle.take() {
            debug!("Joining source thread");
            if let Err(e) = handle.await {
                error!("Source thread panicked: {e}");
            }
        }
        info!(
            "Dropped {} malformed samples this session",
            self.monitor.dropped_samples()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{BleCmd, DummyCmd};

    fn build(arg_config: TopLevelCmd) -> App {
        let dir = tempfile::tempdir().unwrap();
        App::build(&arg_config, dir.path().join("heart-trail.toml"), None).unwrap()
    }

    #[test]
    fn picks_source_from_subcommand() {
        let app = build(TopLevelCmd {
            no_save: true,
            subcommands: Some(SubCommands::Dummy(DummyCmd {})),
            ..Default::default()
        });
        assert_eq!(app.source_kind, SourceKind::Dummy);

        let app = build(TopLevelCmd {
            no_save: true,
            subcommands: Some(SubCommands::Ble(BleCmd { poll_ms: Some(250) })),
            ..Default::default()
        });
        assert_eq!(app.source_kind, SourceKind::Ble);
        assert_eq!(app.settings.ble.poll_interval_ms, 250);
    }

    #[test]
    fn saves_config_unless_told_not_to() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("heart-trail.toml");
        App::build(&TopLevelCmd::default(), config_path.clone(), None).unwrap();
        assert!(config_path.exists());

        let untouched = dir.path().join("untouched.toml");
        let arg_config = TopLevelCmd {
            no_save: true,
            ..Default::default()
        };
        App::build(&arg_config, untouched.clone(), None).unwrap();
        assert!(!untouched.exists());
    }

    #[test]
    fn routes_source_events() {
        let mut app = build(TopLevelCmd {
            no_save: true,
            ..Default::default()
        });

        assert_eq!(
            app.handle_source_event(SourceEvent::Connected("Strap".into())),
            Some(AppUpdate::Connected("Strap".into()))
        );

        let Some(AppUpdate::HeartRate(update)) =
            app.handle_source_event(SourceEvent::Sample(vec![0x00, 72]))
        else {
            panic!("Expected a heart rate update");
        };
        assert_eq!(update.bpm, 72);
        assert_eq!(update.history, vec![72]);

        // Malformed payloads are dropped without an update
        assert_eq!(
            app.handle_source_event(SourceEvent::Sample(vec![0x01, 72])),
            None
        );
        assert_eq!(app.monitor().latest(), Some(72));

        assert_eq!(
            app.handle_source_event(SourceEvent::Disconnected),
            Some(AppUpdate::Disconnected)
        );
        assert!(app.monitor().history().is_empty());
    }
}
