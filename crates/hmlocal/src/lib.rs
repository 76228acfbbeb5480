//! Homematic(IP) Local adapter.
//!
//! Binds the data points of an external device library (owned by a
//! [`hub::ControlUnit`]) to host-side [`engine::Entity`] objects, one
//! platform module per entity category, and forwards MQTT status messages
//! into the library's event pipeline.

pub mod config;
pub mod engine;
pub mod hub;
pub mod logging;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod platforms;
mod subscription;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::Engine;
pub use subscription::Subscription;
