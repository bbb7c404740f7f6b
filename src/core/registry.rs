use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

use crate::core::value::ConfigValue;

/// Subscriber callback: `(item name, value)`.
pub type ConfigCallback = Arc<dyn Fn(&str, &ConfigValue) + Send + Sync>;

pub struct Subscription {
    pub(crate) identity: u16,
    pub(crate) callback: ConfigCallback,
}

pub struct Item {
    name: Arc<str>,
    latest: Option<ConfigValue>,
    dirty: bool,
    subscribers: Vec<Subscription>,
}

impl Item {
    fn new(name: Arc<str>) -> Self {
        Self {
            name,
            latest: None,
            dirty: false,
            subscribers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latest(&self) -> Option<&ConfigValue> {
        self.latest.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Registers `callback` for `identity`, replacing the callback already
    /// registered under that identity. Returns true on replacement.
    pub fn add_callback(&mut self, identity: u16, callback: ConfigCallback) -> bool {
        if let Some(existing) = self.subscribers.iter_mut().find(|s| s.identity == identity) {
            existing.callback = callback;
            return true;
        }
        self.subscribers.push(Subscription { identity, callback });
        false
    }

    /// Swaps in a new value and marks the item dirty. The superseded value
    /// is handed back so the caller decides when it is released.
    fn replace_value(&mut self, value: ConfigValue) -> Option<ConfigValue> {
        self.dirty = true;
        self.latest.replace(value)
    }

    /// Everything needed to call every subscriber with the current value,
    /// detached from the registry.
    pub(crate) fn delivery(&self) -> Option<Delivery> {
        let value = self.latest.as_ref()?;
        Some(Delivery {
            name: Arc::clone(&self.name),
            value: value.share(),
            callbacks: self.subscribers.iter().map(|s| Arc::clone(&s.callback)).collect(),
        })
    }
}

pub(crate) struct Delivery {
    name: Arc<str>,
    value: ConfigValue,
    callbacks: Vec<ConfigCallback>,
}

impl Delivery {
    pub(crate) fn single(name: Arc<str>, value: ConfigValue, callback: ConfigCallback) -> Self {
        Self {
            name,
            value,
            callbacks: vec![callback],
        }
    }

    pub(crate) fn serial(&self) -> u64 {
        self.value.serial()
    }

    /// Calls each callback in registration order. A panicking callback is
    /// logged and skipped.
    pub(crate) fn run(self) {
        for (idx, callback) in self.callbacks.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(&self.name, &self.value)));
            if outcome.is_err() {
                error!(item = %self.name, callback = idx, "subscriber callback panicked");
            }
        }
    }
}

#[derive(Default)]
pub struct ItemRegistry {
    items: HashMap<Arc<str>, Item>,
    retained_bytes: usize,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_or_create(&mut self, name: &str) -> &mut Item {
        self.items
            .entry(Arc::from(name))
            .or_insert_with_key(|key| {
                debug!(item = %key, "created config item");
                Item::new(Arc::clone(key))
            })
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bytes held as latest values across all items.
    pub fn retained_bytes(&self) -> usize {
        self.retained_bytes
    }

    pub fn subscription_count(&self) -> usize {
        self.items.values().map(Item::subscriber_count).sum()
    }

    /// Bytes that could be retained for `name` under `quota`, counting the
    /// space its current value would give back.
    pub fn available_for(&self, name: &str, quota: usize) -> usize {
        let current = self
            .items
            .get(name)
            .and_then(Item::latest)
            .map_or(0, ConfigValue::len);
        quota.saturating_sub(self.retained_bytes - current)
    }

    pub fn store(&mut self, name: &str, value: ConfigValue) -> Option<ConfigValue> {
        let incoming = value.len();
        let previous = self.find_or_create(name).replace_value(value);
        let outgoing = previous.as_ref().map_or(0, ConfigValue::len);
        self.retained_bytes = self.retained_bytes - outgoing + incoming;
        previous
    }

    /// Marks `name` dirty again if its value is no longer the object with
    /// serial `delivered`. Returns true when it did.
    pub(crate) fn mark_superseded(&mut self, name: &str, delivered: u64) -> bool {
        let Some(item) = self.items.get_mut(name) else {
            return false;
        };
        match &item.latest {
            Some(latest) if latest.serial() != delivered => {
                item.dirty = true;
                true
            }
            _ => false,
        }
    }

    /// Clears every dirty flag and returns what has to be delivered.
    pub(crate) fn take_dirty(&mut self) -> Vec<Delivery> {
        let mut batch = Vec::new();
        for item in self.items.values_mut() {
            if !item.dirty {
                continue;
            }
            item.dirty = false;
            if item.subscribers.is_empty() {
                continue;
            }
            if let Some(delivery) = item.delivery() {
                batch.push(delivery);
            }
        }
        batch
    }
}
