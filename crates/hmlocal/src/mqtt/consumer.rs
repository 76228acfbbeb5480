use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::sync::PoisonError;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;

use super::client::MqttClient;
use super::client::MqttMessage;
use crate::hub::ControlUnit;

/// Status topic below the optional prefix.
pub const STATUS_TOPIC: &str = "device/status/#";

/// How long `run` waits for a message before releasing the client.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Forwards device status messages from the broker to every registered
/// control unit.
///
/// The consumer is subscribed exactly while at least one control unit is
/// registered.
pub struct MqttConsumer<C: MqttClient> {
    client: Arc<Mutex<C>>,
    prefix: Option<String>,
    topic: String,
    units: std::sync::Mutex<HashMap<String, Arc<dyn ControlUnit>>>,
}

impl<C: MqttClient> MqttConsumer<C> {
    pub fn new(client: C, prefix: Option<&str>) -> Self {
        let prefix = prefix
            .map(|prefix| prefix.trim_matches('/').to_string())
            .filter(|prefix| !prefix.is_empty());
        let topic = match &prefix {
            Some(prefix) => format!("{}/{}", prefix, STATUS_TOPIC),
            None => STATUS_TOPIC.to_string(),
        };
        Self {
            client: Arc::new(Mutex::new(client)),
            prefix,
            topic,
            units: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The wildcard topic the consumer subscribes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn registered(&self) -> usize {
        self.units.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.registered() > 0
    }

    /// Register a control unit under its entry id. The first registration
    /// subscribes; a unit with the same entry id is replaced.
    pub async fn register(&self, unit: Arc<dyn ControlUnit>) -> Result<(), Box<dyn Error + Send>> {
        let entry_id = unit.entry_id().to_string();
        // Held across the (un)subscribe so transitions cannot interleave.
        let mut client = self.client.lock().await;
        let first = {
            let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
            let first = units.is_empty();
            units.insert(entry_id.clone(), unit);
            first
        };
        if first {
            if let Err(e) = client.subscribe(&self.topic).await {
                self.units
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&entry_id);
                return Err(e);
            }
            info!("Subscribed to {}", self.topic);
        }
        debug!("Registered control unit {} for MQTT", entry_id);
        Ok(())
    }

    /// Unregister a control unit. Removing the last one unsubscribes; if
    /// that fails the unit stays registered.
    ///
    /// Returns whether the entry id was registered.
    pub async fn unregister(&self, entry_id: &str) -> Result<bool, Box<dyn Error + Send>> {
        let mut client = self.client.lock().await;
        let (removed, last) = {
            let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
            let removed = units.remove(entry_id);
            let last = removed.is_some() && units.is_empty();
            (removed, last)
        };
        let Some(unit) = removed else {
            return Ok(false);
        };
        if last {
            if let Err(e) = client.unsubscribe(&self.topic).await {
                self.units
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(entry_id.to_string(), unit);
                return Err(e);
            }
            info!("Unsubscribed from {}", self.topic);
        }
        Ok(true)
    }

    /// Topic with the configured prefix stripped.
    fn state_path<'a>(&self, topic: &'a str) -> &'a str {
        self.prefix
            .as_deref()
            .and_then(|prefix| topic.strip_prefix(prefix))
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(topic)
    }

    /// Forward the `v` field of a status message. Returns the number of
    /// control units it was forwarded to.
    pub fn handle_message(&self, msg: &MqttMessage) -> usize {
        let payload: Value = match serde_json::from_slice(&msg.payload) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Dropping non-JSON payload on {}: {}", msg.topic, e);
                return 0;
            }
        };
        let value = match payload.get("v") {
            Some(value) if !value.is_null() => value,
            _ => return 0,
        };

        let state_path = self.state_path(&msg.topic);
        let units: Vec<Arc<dyn ControlUnit>> = self
            .units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for unit in &units {
            unit.data_point_path_event(state_path, value.clone());
        }
        units.len()
    }

    /// Pump messages from the client until it closes.
    pub async fn run(&self) {
        loop {
            // Short lock hold so register/unregister are not starved
            let polled = {
                let mut client = self.client.lock().await;
                tokio::time::timeout(POLL_INTERVAL, client.poll_message()).await
            };

            match polled {
                Ok(Some(msg)) => {
                    let forwarded = self.handle_message(&msg);
                    debug!(
                        "Message on {} (retained: {}) forwarded to {} units",
                        msg.topic, msg.retain, forwarded
                    );
                }
                Ok(None) => break,
                Err(_) => tokio::task::yield_now().await,
            }
        }
        info!("MQTT consumer stopped");
    }
}
