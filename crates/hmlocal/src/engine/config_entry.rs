use std::sync::Mutex;
use std::sync::PoisonError;

use crate::Subscription;

/// One configured hub connection.
///
/// Collects the subscriptions made while setting up its platforms and cancels
/// them all when the entry is unloaded.
#[derive(Debug)]
pub struct ConfigEntry {
    entry_id: String,
    on_unload: Mutex<Vec<Subscription>>,
}

impl ConfigEntry {
    pub fn new(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            on_unload: Mutex::new(Vec::new()),
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn on_unload(&self, subscription: Subscription) {
        self.on_unload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }

    /// Cancel every registered subscription. Returns how many there were.
    pub fn unload(&self) -> usize {
        let subscriptions =
            std::mem::take(&mut *self.on_unload.lock().unwrap_or_else(PoisonError::into_inner));
        let count = subscriptions.len();
        for subscription in subscriptions {
            subscription.cancel();
        }
        count
    }
}
