#![allow(dead_code)]

use std::time::Duration;

use cfgbroker::{BrokerConfig, CapabilityManifest, CompartmentTokens, ConfigBroker, SharedBroker};

pub const WAIT: Duration = Duration::from_secs(2);

pub const MANIFEST: &str = r#"
[[capability]]
compartment = "config_source"
direction = "write"
item = "config1"
max_size = 43

[[capability]]
compartment = "config_source"
direction = "write"
item = "config2"
max_size = 43

[[capability]]
compartment = "subscriber1"
direction = "read"
item = "config1"

[[capability]]
compartment = "subscriber1"
direction = "read"
item = "config2"

[[capability]]
compartment = "subscriber2"
direction = "read"
item = "config2"
"#;

pub fn boot() -> (SharedBroker, CompartmentTokens) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
    let manifest = CapabilityManifest::from_toml_str(MANIFEST).expect("manifest parses");
    ConfigBroker::boot(BrokerConfig::default(), &manifest).expect("capabilities issue")
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
