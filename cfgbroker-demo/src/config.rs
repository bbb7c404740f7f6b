use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use cfgbroker::BrokerConfig;

/// Everything the demo reads from its TOML file: `[broker]` and `[demo]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub item: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Compartment whose write capabilities drive the feeds. Every other
    /// compartment in the manifest runs as a subscriber.
    pub source_compartment: String,

    pub feeds: Vec<FeedConfig>,

    /// Item the misbehaving publisher sends garbage to. `None` = disabled.
    pub bad_dog_item: Option<String>,

    pub publish_interval_ms: u64,
    pub settle_interval_ms: u64,
    pub display_interval_ms: u64,
    pub bad_publish_interval_ms: u64,

    /// Stop after this long. `None` = run until Ctrl-C.
    pub run_for_secs: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            source_compartment: "config_source".to_string(),
            feeds: vec![
                FeedConfig {
                    item: "config1".to_string(),
                    token: "Wile-E".to_string(),
                },
                FeedConfig {
                    item: "config2".to_string(),
                    token: "Coyote".to_string(),
                },
            ],
            bad_dog_item: Some("config1".to_string()),
            publish_interval_ms: 1500,
            settle_interval_ms: 3000,
            display_interval_ms: 4700,
            bad_publish_interval_ms: 12000,
            run_for_secs: None,
        }
    }
}

impl DemoConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    pub fn bad_publish_interval(&self) -> Duration {
        Duration::from_millis(self.bad_publish_interval_ms)
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::read_from_file(p),
            None => Ok(Self::default()),
        }
    }

    fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading {:?}", path.as_ref()))?;
        let cfg: AppConfig = toml::from_str(&raw)
            .with_context(|| "parsing demo config TOML")?;
        Ok(cfg)
    }
}
