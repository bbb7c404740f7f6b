use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::claim::Claim;

/// A published configuration value.
///
/// The buffer is the broker's private copy of what the publisher sent and is
/// read-only. Subscribers only ever see it by reference inside a callback;
/// keeping it beyond that needs an explicit [`ConfigValue::claim`].
///
/// Every value gets its own serial, so two publishes are never the same
/// object even when their buffers compare equal or are both empty.
pub struct ConfigValue {
    bytes: Bytes,
    serial: u64,
}

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

impl ConfigValue {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Another handle to the same object, for broker-internal bookkeeping.
    pub(crate) fn share(&self) -> ConfigValue {
        ConfigValue {
            bytes: self.bytes.clone(),
            serial: self.serial,
        }
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when both handles refer to the same published object, not just
    /// equal contents.
    pub fn same_object(&self, other: &ConfigValue) -> bool {
        self.serial == other.serial
    }

    pub fn claim(&self) -> Claim {
        Claim::new(self.bytes.clone(), self.serial)
    }
}

impl AsRef<[u8]> for ConfigValue {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigValue")
            .field("serial", &self.serial)
            .field("len", &self.bytes.len())
            .finish()
    }
}
