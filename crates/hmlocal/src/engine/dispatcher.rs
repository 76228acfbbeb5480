use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::Subscription;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;

/// "New data points" signal of one config entry and category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signal {
    pub entry_id: String,
    pub category: DataPointCategory,
}

impl Signal {
    pub fn new_data_point(entry_id: impl Into<String>, category: DataPointCategory) -> Self {
        Self {
            entry_id: entry_id.into(),
            category,
        }
    }
}

pub type SignalCallback = Arc<dyn Fn(Vec<DataPointHandle>) + Send + Sync>;

#[derive(Default)]
struct Targets {
    next_id: u64,
    targets: HashMap<Signal, Vec<(u64, SignalCallback)>>,
}

/// Signal bus between the control unit and the platforms.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<Mutex<Targets>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `callback` to `signal` until the returned subscription is cancelled.
    pub fn connect(&self, signal: Signal, callback: SignalCallback) -> Subscription {
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .targets
                .entry(signal.clone())
                .or_default()
                .push((id, callback));
            id
        };

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(callbacks) = inner.targets.get_mut(&signal) {
                callbacks.retain(|(cb_id, _)| *cb_id != id);
                if callbacks.is_empty() {
                    inner.targets.remove(&signal);
                }
            }
        })
    }

    /// Deliver a batch to every callback connected to `signal`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn send(&self, signal: &Signal, data_points: Vec<DataPointHandle>) -> usize {
        // Callbacks run outside the lock so they may connect or cancel.
        let callbacks: Vec<SignalCallback> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .targets
                .get(signal)
                .map(|cbs| cbs.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default()
        };

        for callback in &callbacks {
            callback(data_points.clone());
        }
        callbacks.len()
    }

    pub fn connected(&self, signal: &Signal) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.targets.get(signal).map_or(0, Vec::len)
    }
}
