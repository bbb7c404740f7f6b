/*
Isolated validation of untrusted config content.

Each check runs on a fresh OS thread with its own small stack. The check is
a plain `fn` pointer, so it cannot capture anything from the caller, and the
only thing it can see is a read-only handle to the value being checked. A
fault inside the check, such as a panic from an out-of-bounds index, ends
that thread, is picked up when the thread is joined, and comes back as
`Verdict::Trapped` instead of unwinding into the caller.
*/
use std::thread;
use tracing::{debug, error, warn};

use crate::config::BrokerConfig;
use crate::core::value::ConfigValue;

/// A content check run inside the validator.
pub type ContentCheck = fn(&[u8]) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
    Trapped,
}

impl Verdict {
    /// Invalid and trapped content are handled the same way: discard it.
    pub fn is_accepted(self) -> bool {
        self == Verdict::Valid
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    stack_bytes: usize,
}

impl Validator {
    pub fn new(stack_bytes: usize) -> Self {
        Self { stack_bytes }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(config.validator_stack_bytes)
    }

    pub fn validate(&self, value: &ConfigValue, check: ContentCheck) -> Verdict {
        let view = value.share();
        let spawned = thread::Builder::new()
            .name("validator".into())
            .stack_size(self.stack_bytes)
            .spawn(move || check(view.as_bytes()));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "could not start validator thread");
                return Verdict::Trapped;
            }
        };

        match handle.join() {
            Ok(true) => {
                debug!(len = value.len(), "validation passed");
                Verdict::Valid
            }
            Ok(false) => {
                debug!(len = value.len(), "validation failed");
                Verdict::Invalid
            }
            Err(_) => {
                warn!(len = value.len(), "validation trapped");
                Verdict::Trapped
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::from_config(&BrokerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn value(bytes: &[u8]) -> ConfigValue {
        ConfigValue::new(Bytes::copy_from_slice(bytes))
    }

    fn starts_with_magic(data: &[u8]) -> bool {
        data.starts_with(b"CFG")
    }

    // trusts the first byte as a length and indexes without checking
    fn naive_length_prefixed(data: &[u8]) -> bool {
        let len = data[0] as usize;
        data[len] != 0
    }

    #[test]
    fn valid_and_invalid_content() {
        let validator = Validator::default();
        assert_eq!(validator.validate(&value(b"CFG1"), starts_with_magic), Verdict::Valid);
        assert_eq!(validator.validate(&value(b"XYZ"), starts_with_magic), Verdict::Invalid);
    }

    #[test]
    fn out_of_bounds_access_is_trapped() {
        let validator = Validator::default();
        let verdict = validator.validate(&value(&[200, 1, 2]), naive_length_prefixed);
        assert_eq!(verdict, Verdict::Trapped);
        assert!(!verdict.is_accepted());

        // the validator keeps working after a trap
        let verdict = validator.validate(&value(&[1, 1]), naive_length_prefixed);
        assert_eq!(verdict, Verdict::Valid);
    }

    #[test]
    fn empty_input_is_trapped_not_fatal() {
        let validator = Validator::new(16 * 1024);
        assert_eq!(validator.validate(&value(&[]), naive_length_prefixed), Verdict::Trapped);
    }
}
