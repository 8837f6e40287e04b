use super::{SourceEvent, HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID, HEART_RATE_SERVICE_UUID};
use crate::errors::AppError;
use crate::settings::BleSettings;

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Forwards raw 0x2A37 payloads from a BLE heart rate monitor.
/// Never decodes anything itself.
struct BleSourceActor {
    ble_settings: BleSettings,
    source_tx: Sender<SourceEvent>,
    cancel_token: CancellationToken,
    no_packet_timeout: Duration,
    scan_timeout: Duration,
}

impl BleSourceActor {
    /// Sends to the app, cancelling ourselves if nobody's listening anymore.
    async fn emit(&self, event: SourceEvent) {
        if self.source_tx.send(event).await.is_err() {
            warn!("Source receiver closed, stopping BLE source");
            self.cancel_token.cancel();
        }
    }

    async fn get_central(&self) -> Result<Adapter, AppError> {
        let manager = Manager::new().await?;
        manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::NoAdapter)
    }

    async fn find_device(&self, central: &Adapter) -> Result<Option<Peripheral>, AppError> {
        central
            .start_scan(ScanFilter {
                services: vec![HEART_RATE_SERVICE_UUID],
            })
            .await?;
        debug!("Scanning for Heart Rate Monitors");

        let deadline = Instant::now() + self.scan_timeout;
        let mut found = None;
        'scan: while Instant::now() < deadline && !self.cancel_token.is_cancelled() {
            for peripheral in central.peripherals().await? {
                let Ok(Some(properties)) = peripheral.properties().await else {
                    continue;
                };
                let address = properties.address.to_string();
                let advertises_hr = properties.services.contains(&HEART_RATE_SERVICE_UUID);
                if advertises_hr
                    && matches_saved(
                        &self.ble_settings,
                        properties.local_name.as_deref(),
                        &address,
                    )
                {
                    info!(
                        "Found Heart Rate Monitor! Name: {:?} | Address: {}",
                        properties.local_name, address
                    );
                    found = Some(peripheral);
                    break 'scan;
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                _ = self.cancel_token.cancelled() => {}
            }
        }

        if let Err(e) = central.stop_scan().await {
            warn!("Failed to stop scan: {e}");
        }
        Ok(found)
    }

    async fn connect(&self) -> Result<(), AppError> {
        let central = self.get_central().await?;
        'connection: loop {
            if self.cancel_token.is_cancelled() {
                break 'connection;
            }
            let device = match self.find_device(&central).await? {
                Some(device) => device,
                None => {
                    warn!(
                        "No matching Heart Rate Monitor found in {}s, retrying",
                        self.scan_timeout.as_secs()
                    );
                    continue 'connection;
                }
            };
            let name = device
                .properties()
                .await
                .ok()
                .flatten()
                .and_then(|p| p.local_name)
                .unwrap_or_else(|| device.id().to_string());

            tokio::select! {
                conn_result = device.connect() => {
                    if let Err(e) = conn_result {
                        error!("BLE Connection error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue 'connection;
                    }
                }
                _ = self.cancel_token.cancelled() => {
                    break 'connection;
                }
                _ = tokio::time::sleep(self.no_packet_timeout) => {
                    error!("Connection timed out");
                    continue 'connection;
                }
            }

            if let Err(e) = device.discover_services().await {
                error!("Couldn't read services from connected device: {}", e);
                device.disconnect().await?;
                continue 'connection;
            }
            let characteristics = device.characteristics();
            debug!("Found {} characteristics", characteristics.len());
            let Some(characteristic) = characteristics
                .into_iter()
                .find(|c| c.uuid == HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID)
            else {
                error!("{}", AppError::MissingCharacteristic);
                device.disconnect().await?;
                continue 'connection;
            };

            self.emit(SourceEvent::Connected(name)).await;

            let result = match self.ble_settings.poll_interval() {
                Some(poll_interval) => {
                    info!("Polling HR characteristic every {:?}", poll_interval);
                    self.poll_loop(&device, &characteristic, poll_interval)
                        .await
                }
                None => match self.subscribe(&device, &characteristic).await {
                    Ok(stream) => self.notification_loop(stream).await,
                    Err(e) => Err(e),
                },
            };
            if let Err(e) = result {
                error!("HR stream error: {e}");
            }

            info!("Heart Rate Monitor stream closed!");
            self.emit(SourceEvent::Disconnected).await;
            if device.is_connected().await.unwrap_or(false) {
                device.disconnect().await?;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        device: &Peripheral,
        characteristic: &Characteristic,
    ) -> Result<Pin<Box<dyn Stream<Item = ValueNotification> + Send>>, AppError> {
        device.subscribe(characteristic).await?;
        Ok(device.notifications().await?)
    }

    async fn notification_loop(
        &self,
        mut notification_stream: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
    ) -> Result<(), AppError> {
        loop {
            tokio::select! {
                data = notification_stream.next() => {
                    match data {
                        Some(data) if data.uuid == HEART_RATE_MEASUREMENT_CHARACTERISTIC_UUID => {
                            self.emit(SourceEvent::Sample(data.value)).await;
                        }
                        Some(_) => {}
                        None => return Ok(()),
                    }
                }
                _ = tokio::time::sleep(self.no_packet_timeout) => {
                    error!("No HR data received in {} seconds!", self.no_packet_timeout.as_secs());
                    return Ok(());
                }
                _ = self.cancel_token.cancelled() => {
                    info!("Shutting down HR Notification thread!");
                    return Ok(());
                }
            }
        }
    }

    async fn poll_loop(
        &self,
        device: &Peripheral,
        characteristic: &Characteristic,
        poll_interval: Duration,
    ) -> Result<(), AppError> {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let value = tokio::time::timeout(self.no_packet_timeout, device.read(characteristic))
                        .await
                        .map_err(|_| btleplug::Error::TimedOut(self.no_packet_timeout))??;
                    self.emit(SourceEvent::Sample(value)).await;
                }
                _ = self.cancel_token.cancelled() => {
                    info!("Shutting down HR polling thread!");
                    return Ok(());
                }
            }
        }
    }
}

/// Empty saved name and address means "take the first one we see".
fn matches_saved(ble_settings: &BleSettings, local_name: Option<&str>, address: &str) -> bool {
    let saved_name = ble_settings.saved_name.trim();
    let saved_address = ble_settings.saved_address.trim();
    if saved_name.is_empty() && saved_address.is_empty() {
        return true;
    }
    let name_matches = !saved_name.is_empty() && local_name.is_some_and(|n| n == saved_name);
    let address_matches = !saved_address.is_empty() && address.eq_ignore_ascii_case(saved_address);
    name_matches || address_matches
}

pub async fn ble_thread(
    source_tx: Sender<SourceEvent>,
    ble_settings: BleSettings,
    cancel_token: CancellationToken,
) {
    let no_packet_timeout = Duration::from_secs(ble_settings.no_packet_timeout_secs.max(1));
    let scan_timeout = Duration::from_secs(ble_settings.scan_timeout_secs.max(1));
    let ble_source = BleSourceActor {
        ble_settings,
        source_tx,
        cancel_token,
        no_packet_timeout,
        scan_timeout,
    };

    while !ble_source.cancel_token.is_cancelled() {
        match ble_source.connect().await {
            Ok(()) => break,
            Err(e) => {
                error!("BLE Error: {e}");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(3)) => {}
                    _ = ble_source.cancel_token.cancelled() => {}
                }
            }
        }
    }
    info!("BLE source stopped");
}
