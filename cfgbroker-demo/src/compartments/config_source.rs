use std::time::Duration;
use cfgbroker::{BrokerError, ConfigBroker, SealedToken, SharedBroker};
use cfgbroker_protocol::ConfigRecord;
use tokio::sync::watch::Receiver;
use tracing::{debug, info, warn};

use crate::compartments::sleep_or_shutdown;

/// One item the source keeps publishing, with the write capability for it.
#[derive(Debug, Clone)]
pub struct Feed {
    pub item: String,
    pub token_text: String,
    pub capability: SealedToken,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceTiming {
    pub publish_interval: Duration,
    pub settle_interval: Duration,
}

/// Publishes one record, then scribbles over the local buffer: the broker
/// keeps its own copy, so subscribers never see the scribble.
pub async fn gen_config(broker: &ConfigBroker, feed: &Feed, count: i32) -> Result<(), BrokerError> {
    let mut data = ConfigRecord::new(count, &feed.token_text).serialize().to_vec();
    let size = data.len();

    debug!(item = %feed.item, count, "set config");
    let result = broker.publish(&feed.capability, &data, size).await;
    if let Err(e) = &result {
        warn!(item = %feed.item, error = %e, "failed to set value");
    }

    let meep = b"MeepMeep!";
    let n = meep.len().min(data.len());
    data[..n].copy_from_slice(&meep[..n]);
    drop(data);

    result
}

pub async fn run(broker: SharedBroker, feeds: Vec<Feed>, timing: SourceTiming, mut shutdown_rx: Receiver<()>) {
    info!(feeds = feeds.len(), "config source started");
    for feed in &feeds {
        let _ = gen_config(&broker, feed, 0).await;
    }

    let mut count: i32 = 1;
    loop {
        for feed in &feeds {
            if sleep_or_shutdown(timing.publish_interval, &mut shutdown_rx).await {
                info!("config source stopping");
                return;
            }
            let _ = gen_config(&broker, feed, count).await;
            count = count.wrapping_add(1);
        }

        // give subscribers a chance to show their values
        if sleep_or_shutdown(timing.settle_interval, &mut shutdown_rx).await {
            info!("config source stopping");
            return;
        }
    }
}
