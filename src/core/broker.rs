use bytes::Bytes;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::config::BrokerConfig;
use crate::core::authority::TokenAuthority;
use crate::core::claim::Claim;
use crate::core::error::BrokerError;
use crate::core::manifest::{CapabilityManifest, CompartmentTokens};
use crate::core::registry::{ConfigCallback, Delivery, ItemRegistry};
use crate::core::token::{Direction, SealedToken};
use crate::core::value::ConfigValue;

pub type SharedBroker = Arc<ConfigBroker>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    pub items: usize,
    pub subscriptions: usize,
    pub retained_bytes: usize,
    pub pending_updates: u32,
}

/// Owns every config item and is the only place tokens are checked.
///
/// Tokens must be issued before the authority is handed to the broker;
/// once the broker owns it, nothing can mint new ones.
pub struct ConfigBroker {
    authority: TokenAuthority,
    registry: Mutex<ItemRegistry>,
    pending: AtomicU32, // un-delivered updates
    wake: Notify,
    config: BrokerConfig,
}

impl ConfigBroker {
    pub fn new(config: BrokerConfig, authority: TokenAuthority) -> Self {
        Self {
            authority,
            registry: Mutex::new(ItemRegistry::new()),
            pending: AtomicU32::new(0),
            wake: Notify::new(),
            config,
        }
    }

    /// Issues every capability in `manifest` with a fresh authority and
    /// hands that authority to a new broker.
    pub fn boot(
        config: BrokerConfig,
        manifest: &CapabilityManifest,
    ) -> Result<(SharedBroker, CompartmentTokens), BrokerError> {
        let authority = TokenAuthority::new();
        let tokens = manifest.issue_all(&authority)?;
        Ok((Arc::new(Self::new(config, authority)), tokens))
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Stores a copy of the first `size` bytes of `data` as the new value
    /// of the item named by the write capability `token`, then wakes the
    /// delivery loop. Never waits for subscribers.
    pub async fn publish(
        &self,
        token: &SealedToken,
        data: &[u8],
        size: usize,
    ) -> Result<(), BrokerError> {
        let auth = self.authority.authorize(token).ok_or_else(|| {
            warn!(?token, "invalid capability for publish");
            BrokerError::InvalidToken
        })?;

        if auth.direction != Direction::Write {
            warn!(item = %auth.item, ?token, "not a write capability");
            return Err(BrokerError::WrongDirection {
                item: auth.item.to_string(),
                expected: Direction::Write,
            });
        }

        if size > auth.max_size {
            warn!(item = %auth.item, size, max_size = auth.max_size, "invalid size for capability");
            return Err(BrokerError::SizeExceedsCapability {
                item: auth.item.to_string(),
                size,
                max_size: auth.max_size,
            });
        }

        if size > data.len() {
            warn!(item = %auth.item, size, extent = data.len(), "size exceeds supplied buffer");
            return Err(BrokerError::SizeExceedsBuffer {
                size,
                extent: data.len(),
            });
        }

        let value = copy_value(&auth.item, &data[..size])?;

        {
            let mut registry = self.registry.lock().await;
            if let Some(quota) = self.config.storage_quota_bytes {
                let available = registry.available_for(&auth.item, quota);
                if size > available {
                    warn!(item = %auth.item, size, available, "storage quota exceeded");
                    return Err(BrokerError::QuotaExceeded {
                        requested: size,
                        available,
                    });
                }
            }
            // subscribers that still need the old value hold their own claim
            let previous = registry.store(&auth.item, value);
            drop(previous);
        }

        let pending = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        self.wake.notify_one();
        debug!(item = %auth.item, size, identity = auth.identity, pending, "published config");
        Ok(())
    }

    /// Registers `callback` for the item named by the read capability
    /// `token`. A second subscribe with the same token replaces the earlier
    /// callback. If the item already has a value the callback gets it
    /// before this returns.
    pub async fn subscribe<F>(&self, token: &SealedToken, callback: F)
    where
        F: Fn(&str, &ConfigValue) + Send + Sync + 'static,
    {
        let Some(auth) = self.authority.authorize(token) else {
            warn!(?token, "invalid capability for subscribe");
            return;
        };

        if auth.direction != Direction::Read {
            warn!(item = %auth.item, ?token, "not a read capability");
            return;
        }

        let callback: ConfigCallback = Arc::new(callback);
        let immediate = {
            let mut registry = self.registry.lock().await;
            let item = registry.find_or_create(&auth.item);
            let replaced = item.add_callback(auth.identity, Arc::clone(&callback));
            debug!(item = %auth.item, identity = auth.identity, replaced, "subscribed");
            item.latest()
                .map(|value| Delivery::single(Arc::clone(&auth.item), value.share(), callback))
        };

        let Some(delivery) = immediate else {
            return;
        };
        let delivered = delivery.serial();
        delivery.run();

        // a newer value may have reached this callback through the loop
        // while the older one was still being handled; send it again
        let superseded = self.registry.lock().await.mark_superseded(&auth.item, delivered);
        if superseded {
            self.pending.fetch_add(1, Ordering::AcqRel);
            self.wake.notify_one();
            debug!(item = %auth.item, identity = auth.identity, "value changed during subscribe, redelivering");
        }
    }

    /// A claim on the current value of `name`, if it has one.
    pub async fn peek(&self, name: &str) -> Option<Claim> {
        let registry = self.registry.lock().await;
        registry.get(name).and_then(|item| item.latest()).map(ConfigValue::claim)
    }

    pub async fn subscriber_count(&self, name: &str) -> usize {
        let registry = self.registry.lock().await;
        registry.get(name).map_or(0, |item| item.subscriber_count())
    }

    pub async fn stats(&self) -> BrokerStats {
        let registry = self.registry.lock().await;
        BrokerStats {
            items: registry.len(),
            subscriptions: registry.subscription_count(),
            retained_bytes: registry.retained_bytes(),
            pending_updates: self.pending_updates(),
        }
    }

    pub fn pending_updates(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn take_pending(&self) -> u32 {
        self.pending.swap(0, Ordering::AcqRel)
    }

    pub(crate) fn notified(&self) -> Notified<'_> {
        self.wake.notified()
    }

    pub(crate) async fn take_dirty(&self) -> Vec<Delivery> {
        self.registry.lock().await.take_dirty()
    }
}

fn copy_value(item: &str, src: &[u8]) -> Result<ConfigValue, BrokerError> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(src.len()).is_err() {
        warn!(item = %item, size = src.len(), "failed to allocate space for config");
        return Err(BrokerError::AllocationFailed {
            item: item.to_string(),
            size: src.len(),
        });
    }
    buf.extend_from_slice(src);
    // read-only from here on
    Ok(ConfigValue::new(Bytes::from(buf)))
}
