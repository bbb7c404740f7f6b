#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cfgbroker::core::delivery;
use cfgbroker::{
    BrokerConfig, CapabilityDecl, ConfigBroker, ConfigValue, SealedToken, SharedBroker, TokenAuthority,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const SETTLE: Duration = Duration::from_millis(100);
pub const WAIT: Duration = Duration::from_secs(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// A broker plus tokens issued from its authority, built the same way a
/// manifest would, one declaration per token.
pub fn broker_with(config: BrokerConfig, decls: &[CapabilityDecl]) -> (SharedBroker, Vec<SealedToken>) {
    init_tracing();
    let authority = TokenAuthority::new();
    let tokens = decls
        .iter()
        .map(|decl| authority.issue(decl).expect("declaration is valid"))
        .collect();
    (Arc::new(ConfigBroker::new(config, authority)), tokens)
}

pub fn broker(decls: &[CapabilityDecl]) -> (SharedBroker, Vec<SealedToken>) {
    broker_with(BrokerConfig::default(), decls)
}

pub struct Loop {
    pub shutdown_tx: watch::Sender<()>,
    pub handle: JoinHandle<()>,
}

pub fn start_delivery(broker: &SharedBroker) -> Loop {
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = delivery::spawn(broker.clone(), shutdown_rx);
    Loop { shutdown_tx, handle }
}

impl Loop {
    pub async fn stop(self) {
        self.shutdown_tx.send(()).expect("delivery loop still listening");
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("delivery loop stopped in time")
            .expect("delivery loop did not panic");
    }
}

/// Callback that forwards every call as `(item, bytes)`.
pub fn recorder() -> (
    impl Fn(&str, &ConfigValue) + Send + Sync + 'static,
    UnboundedReceiver<(String, Vec<u8>)>,
) {
    let (tx, rx) = unbounded_channel();
    let callback = move |item: &str, value: &ConfigValue| {
        let _ = tx.send((item.to_string(), value.as_bytes().to_vec()));
    };
    (callback, rx)
}

/// Callback that only counts calls.
pub fn counter() -> (impl Fn(&str, &ConfigValue) + Send + Sync + 'static, Arc<Mutex<usize>>) {
    let calls = Arc::new(Mutex::new(0usize));
    let seen = Arc::clone(&calls);
    let callback = move |_: &str, _: &ConfigValue| {
        *seen.lock().unwrap() += 1;
    };
    (callback, calls)
}

pub async fn next_call(rx: &mut UnboundedReceiver<(String, Vec<u8>)>) -> (String, Vec<u8>) {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("callback arrived in time")
        .expect("channel open")
}

/// Waits a moment and asserts nothing else came in.
pub async fn assert_quiet(rx: &mut UnboundedReceiver<(String, Vec<u8>)>) {
    tokio::time::sleep(SETTLE).await;
    assert!(rx.try_recv().is_err(), "unexpected extra callback");
}

/// Polls `cond` until it holds or [`WAIT`] runs out.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached in time");
}
