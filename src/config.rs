use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::core::error::BrokerError;

/// Broker-wide knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Upper bound on the bytes held as latest values across all items.
    /// `None` = limited only by the allocator.
    pub storage_quota_bytes: Option<usize>,

    /// Stack given to each isolated validation thread.
    pub validator_stack_bytes: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            storage_quota_bytes: None,
            validator_stack_bytes: 64 * 1024, // 64 KiB
        }
    }
}

impl BrokerConfig {
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, BrokerError> {
        match path {
            Some(p) => Self::read_from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, BrokerError> {
        toml::from_str(raw).map_err(|e| BrokerError::Config(format!("parsing broker config TOML: {e}")))
    }

    fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, BrokerError> {
        let raw = fs::read_to_string(&path)?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg = BrokerConfig::from_toml_str("storage_quota_bytes = 4096").unwrap();
        assert_eq!(cfg.storage_quota_bytes, Some(4096));
        assert_eq!(cfg.validator_stack_bytes, BrokerConfig::default().validator_stack_bytes);
    }

    #[test]
    fn no_path_means_defaults() {
        let cfg = BrokerConfig::load_or_default(None::<&Path>).unwrap();
        assert_eq!(cfg, BrokerConfig::default());
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storage_quota_bytes = 512\nvalidator_stack_bytes = 32768").unwrap();

        let cfg = BrokerConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(cfg.storage_quota_bytes, Some(512));
        assert_eq!(cfg.validator_stack_bytes, 32 * 1024);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = BrokerConfig::load_or_default(Some("/nonexistent/broker.toml")).unwrap_err();
        assert!(matches!(err, BrokerError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = BrokerConfig::from_toml_str("storage_quota_bytes = \"lots\"").unwrap_err();
        assert!(matches!(err, BrokerError::Config(_)));
    }
}
