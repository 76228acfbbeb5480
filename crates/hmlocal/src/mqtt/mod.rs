//! MQTT status consumer
//!
//! The CCU can publish parameter changes as `device/status/...` messages.
//! The consumer hands their values to the control units, which feed them
//! into the library's event pipeline.

mod client;
mod consumer;

use anyhow::Context;
pub use client::MqttClient;
pub use client::MqttMessage;
pub use client::RumqttcClient;
pub use consumer::MqttConsumer;
pub use consumer::STATUS_TOPIC;

use crate::config::MqttConfig;

/// Create a consumer connected to the configured broker.
pub async fn connect(config: &MqttConfig) -> anyhow::Result<MqttConsumer<RumqttcClient>> {
    let mut client = RumqttcClient::new(config).context("Failed to create MQTT client")?;
    client
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Failed to connect to MQTT broker {}", config.broker))?;
    Ok(MqttConsumer::new(client, config.prefix()))
}
