use std::time::Duration;
use cfgbroker::{BrokerError, ConfigBroker, SealedToken, SharedBroker};
use tokio::sync::watch::Receiver;
use tracing::{info, warn};

use crate::compartments::sleep_or_shutdown;

pub const BAD_PAYLOAD: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

/// Sends a payload that fits the capability but is not a config record.
pub async fn gen_bad_config(broker: &ConfigBroker, item: &str, capability: &SealedToken) -> Result<(), BrokerError> {
    warn!(item, "sending bad data");
    broker.publish(capability, &BAD_PAYLOAD, BAD_PAYLOAD.len()).await
}

pub async fn run(
    broker: SharedBroker,
    item: String,
    capability: SealedToken,
    period: Duration,
    mut shutdown_rx: Receiver<()>,
) {
    info!(item = %item, "bad dog started");
    loop {
        if sleep_or_shutdown(period, &mut shutdown_rx).await {
            info!("bad dog stopping");
            return;
        }
        if let Err(e) = gen_bad_config(&broker, &item, &capability).await {
            warn!(item = %item, error = %e, "bad data was refused");
        }
    }
}
