//! Entity abstraction for hmlocal
//!
//! Every platform wrapper implements the Entity trait. The shared part
//! (identity, availability, callbacks) lives behind `EntityCore` so the
//! platform types only add their state mapping and commands.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use super::device::DeviceInfo;
use super::message::Command;
use super::message::EngineSender;
use super::restore::RestoredState;
use super::translations::Translations;
use crate::hub::LibraryError;

/// State attributes of an entity.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Entity platform, matching the host's platform names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Button,
    Cover,
    Event,
    Lock,
    Number,
    Select,
    Sensor,
    Siren,
    Switch,
    Text,
    Update,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("{platform} entity does not support {command}")]
    Unsupported {
        platform: Platform,
        command: &'static str,
    },

    #[error("no entity with unique id {0}")]
    NotFound(String),
}

impl EntityError {
    pub fn unsupported(platform: Platform, command: &Command) -> Self {
        Self::Unsupported {
            platform,
            command: command.into(),
        }
    }
}

/// Handed to an entity when the engine adds it.
#[derive(Clone)]
pub struct EntityContext {
    /// Channel back to the engine for refresh and removal requests
    pub sender: EngineSender,

    /// Registry enabled flag; the engine flips it when the entity is toggled
    pub enabled: Arc<AtomicBool>,

    /// Last state persisted for this unique id, if any
    pub restored: Option<RestoredState>,

    pub translations: Translations,
}

/// Identity, lifecycle and availability shared by all entities.
#[async_trait]
pub trait EntityCore: Send + Sync {
    fn unique_id(&self) -> &str;

    fn name(&self) -> Option<String>;

    fn available(&self) -> bool;

    fn device_info(&self) -> Option<DeviceInfo>;

    fn enabled_default(&self) -> bool;

    fn extra_state_attributes(&self) -> Attributes;

    /// Register callbacks with the data point and load the initial value.
    async fn added(&self, ctx: EntityContext) -> Result<(), EntityError>;

    /// Cancel every callback registered in `added`.
    async fn will_remove(&self);

    async fn update(&self) -> Result<(), EntityError>;
}

/// Base trait that all entities must implement
#[async_trait]
pub trait Entity: Send + Sync {
    fn core(&self) -> &dyn EntityCore;

    /// Return the platform of this entity
    fn platform(&self) -> Platform;

    /// Current state as JSON; `null` means unknown
    fn state_json(&self) -> serde_json::Value;

    fn unique_id(&self) -> &str {
        self.core().unique_id()
    }

    fn name(&self) -> Option<String> {
        self.core().name()
    }

    fn available(&self) -> bool {
        self.core().available()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        self.core().device_info()
    }

    fn enabled_default(&self) -> bool {
        self.core().enabled_default()
    }

    fn extra_state_attributes(&self) -> Attributes {
        self.core().extra_state_attributes()
    }

    /// Attributes left out of restore snapshots.
    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Native value kept alongside the state for restore (sensors, numbers).
    fn extra_restore_data(&self) -> Option<serde_json::Value> {
        None
    }

    async fn added(&self, ctx: EntityContext) -> Result<(), EntityError> {
        self.core().added(ctx).await
    }

    async fn will_remove(&self) {
        self.core().will_remove().await
    }

    async fn update(&self) -> Result<(), EntityError> {
        self.core().update().await
    }

    /// Execute a command issued by the host or an entity service.
    async fn handle_command(&self, command: Command) -> Result<(), EntityError>;
}

/// Map an optional flag to the host's `on`/`off` state.
pub fn on_off(value: Option<bool>) -> serde_json::Value {
    match value {
        Some(true) => "on".into(),
        Some(false) => "off".into(),
        None => serde_json::Value::Null,
    }
}
