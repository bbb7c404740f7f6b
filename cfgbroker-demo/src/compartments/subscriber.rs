use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use chrono::{DateTime, Utc};
use cfgbroker::{ClaimSlot, ConfigBroker, ConfigValue, SealedToken, SharedBroker, Validator};
use cfgbroker_protocol::{is_valid_record, ConfigRecord, ConfigRecordView};
use tokio::sync::watch::Receiver;
use tracing::{info, warn};

use crate::compartments::sleep_or_shutdown;

#[derive(Default)]
struct Held {
    slot: ClaimSlot,
    accepted_at: DateTime<Utc>,
}

struct Inner {
    name: String,
    validator: Validator,
    held: Mutex<HashMap<String, Held>>,
    accepted: AtomicUsize,
    rejected: AtomicUsize,
}

/// A compartment that consumes config items. Every delivery is checked in
/// the isolated validator; accepted values are claimed so they stay readable
/// between deliveries.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<Inner>,
}

impl Subscriber {
    pub fn new(name: impl Into<String>, validator: Validator) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                validator,
                held: Mutex::new(HashMap::new()),
                accepted: AtomicUsize::new(0),
                rejected: AtomicUsize::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub async fn register(&self, broker: &ConfigBroker, capability: &SealedToken) {
        info!(subscriber = %self.inner.name, "register for config updates");
        let me = self.clone();
        broker
            .subscribe(capability, move |item, value| me.on_update(item, value))
            .await;
    }

    pub fn on_update(&self, item: &str, value: &ConfigValue) {
        let verdict = self.inner.validator.validate(value, is_valid_record);
        if !verdict.is_accepted() {
            self.inner.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(subscriber = %self.inner.name, item, ?verdict, ?value, "validation failed");
            return;
        }

        {
            let mut held = self.held();
            let entry = held.entry(item.to_string()).or_default();
            if entry.slot.adopt(value) {
                entry.accepted_at = Utc::now();
            }
        }
        self.inner.accepted.fetch_add(1, Ordering::Relaxed);
        self.print_config("Update", item);
    }

    /// Decodes the value currently claimed for `item`.
    pub fn current(&self, item: &str) -> Option<ConfigRecord> {
        let held = self.held();
        let claim = held.get(item)?.slot.current()?;
        ConfigRecord::deserialize(claim).ok()
    }

    pub fn accepted(&self) -> usize {
        self.inner.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> usize {
        self.inner.rejected.load(Ordering::Relaxed)
    }

    pub fn print_config(&self, label: &str, item: &str) {
        let held = self.held();
        let Some(entry) = held.get(item) else {
            info!(subscriber = %self.inner.name, "{label} {item}: no value");
            return;
        };
        let Some(claim) = entry.slot.current() else {
            info!(subscriber = %self.inner.name, "{label} {item}: no value");
            return;
        };
        match ConfigRecordView::parse(claim) {
            Ok(view) => info!(
                subscriber = %self.inner.name,
                accepted_at = %entry.accepted_at.format("%H:%M:%S%.3f"),
                "{label} {item} -> count: {} token: {}",
                view.count,
                view.token
            ),
            Err(e) => warn!(subscriber = %self.inner.name, item, error = %e, "held value no longer decodes"),
        }
    }

    fn items(&self) -> Vec<String> {
        let mut items: Vec<String> = self.held().keys().cloned().collect();
        items.sort();
        items
    }

    fn held(&self) -> MutexGuard<'_, HashMap<String, Held>> {
        self.inner.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub async fn run(
    subscriber: Subscriber,
    broker: SharedBroker,
    capabilities: Vec<SealedToken>,
    display_interval: Duration,
    mut shutdown_rx: Receiver<()>,
) {
    for capability in &capabilities {
        subscriber.register(&broker, capability).await;
    }

    // loop printing our config values occasionally
    loop {
        if sleep_or_shutdown(display_interval, &mut shutdown_rx).await {
            info!(
                subscriber = %subscriber.name(),
                accepted = subscriber.accepted(),
                rejected = subscriber.rejected(),
                "subscriber stopping"
            );
            return;
        }
        for item in subscriber.items() {
            subscriber.print_config("Timer ", &item);
        }
    }
}
