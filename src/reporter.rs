use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver as BReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::AppUpdate;
use crate::heart_rate::HeartRateValue;

/// Stand-in display for headless runs: logs every update.
pub async fn reporter_thread(mut broadcast_rx: BReceiver<AppUpdate>, cancel_token: CancellationToken) {
    loop {
        tokio::select! {
            update = broadcast_rx.recv() => {
                match update {
                    Ok(AppUpdate::HeartRate(update)) => {
                        info!("{} BPM | {}", update.bpm, format_history(&update.history));
                    }
                    Ok(AppUpdate::Connected(name)) => info!("Connected to {name}"),
                    Ok(AppUpdate::Disconnected) => warn!("Disconnected, history cleared"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Reporter fell behind, skipped {skipped} updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }
}

fn format_history(history: &[HeartRateValue]) -> String {
    let values: Vec<String> = history.iter().map(|bpm| bpm.to_string()).collect();
    format!("[{}]", values.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_formatting() {
        assert_eq!(format_history(&[]), "[]");
        assert_eq!(format_history(&[70, 75, 80]), "[70 75 80]");
    }
}
