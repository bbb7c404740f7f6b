pub mod bad_dog;
pub mod config_source;
pub mod subscriber;

use std::time::Duration;
use tokio::sync::watch::Receiver;

/// Sleeps for `period`; returns true if shutdown was signalled first.
pub(crate) async fn sleep_or_shutdown(period: Duration, shutdown_rx: &mut Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => false,
        _ = shutdown_rx.changed() => true,
    }
}
