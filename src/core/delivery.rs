/*
Delivery loop.

Publishers only bump the pending counter and notify. This task sleeps until
the counter is non-zero, resets it, and calls the subscribers of every item
that changed since the last pass, on the blocking pool. These races are
expected and harmless:

- a subscriber registering during a pass is also called directly by
  `subscribe`, so it may see the same value twice;
- a pass may call a subscriber with a newer value while `subscribe` is still
  handing it an older one. `subscribe` then marks the item dirty again, so
  the newer value is delivered last;
- a publish during a pass either lands before its item is picked up (this
  pass sends the newer value) or re-marks the item and bumps the counter (the
  next pass sends it). The final value is always delivered.
*/
use tokio::sync::watch::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::core::broker::SharedBroker;

pub fn spawn(broker: SharedBroker, shutdown_rx: Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(run(broker, shutdown_rx))
}

pub async fn run(broker: SharedBroker, mut shutdown_rx: Receiver<()>) {
    info!("delivery loop started");
    loop {
        while broker.pending_updates() == 0 {
            tokio::select! {
                _ = broker.notified() => {}
                _ = shutdown_rx.changed() => {
                    info!("shutdown signal received, delivery loop stopping");
                    return;
                }
            }
        }

        let updates = broker.take_pending();
        let batch = broker.take_dirty().await;
        debug!(updates, items = batch.len(), "processing updates");

        if batch.is_empty() {
            continue;
        }
        // callbacks are synchronous and may block
        let outcome = tokio::task::spawn_blocking(move || {
            for delivery in batch {
                delivery.run();
            }
        })
        .await;
        if let Err(e) = outcome {
            error!("delivery pass failed: {:?}", e);
        }
    }
}
