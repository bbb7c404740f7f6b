use bytes::Bytes;
use std::fmt;
use std::ops::Deref;
use tracing::debug;

use crate::core::value::ConfigValue;

/// Keeps a received value alive after the callback that delivered it has
/// returned. Dropping the claim releases it.
pub struct Claim {
    bytes: Bytes,
    serial: u64,
}

impl Claim {
    pub(crate) fn new(bytes: Bytes, serial: u64) -> Self {
        Self { bytes, serial }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_claim_of(&self, value: &ConfigValue) -> bool {
        self.serial == value.serial()
    }
}

impl Deref for Claim {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim")
            .field("serial", &self.serial)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Holds at most one claimed value for one config item.
#[derive(Debug, Default)]
pub struct ClaimSlot {
    current: Option<Claim>,
}

impl ClaimSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `value`, releasing whatever the slot held before. Returns
    /// false when the slot already holds this exact object.
    pub fn adopt(&mut self, value: &ConfigValue) -> bool {
        if let Some(held) = &self.current {
            if held.is_claim_of(value) {
                return false;
            }
        }
        // release the old claim before taking the new one
        if self.current.take().is_some() {
            debug!("released previous claim");
        }
        self.current = Some(value.claim());
        true
    }

    pub fn current(&self) -> Option<&Claim> {
        self.current.as_ref()
    }

    pub fn release(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}
