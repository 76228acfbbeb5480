use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;

use super::PLATFORMS;
use super::PlatformContext;
use super::PlatformRegistration;
use super::generic_entity::RestoreEntity;
use super::generic_entity::UNRECORDED_ATTRIBUTES;
use super::unexpected;
use crate::engine::Attributes;
use crate::engine::Command;
use crate::engine::Entity;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::Platform;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::LockDataPoint;

pub const ATTR_SUPPORTED_FEATURES: &str = "supported_features";

#[distributed_slice(PLATFORMS)]
static LOCK: PlatformRegistration = PlatformRegistration {
    platform: Platform::Lock,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Lock, |_, data_point| match data_point {
        DataPointHandle::Lock(dp) => Some(Arc::new(Lock::new(dp)) as _),
        other => unexpected(Platform::Lock, other),
    });
}

pub struct Lock {
    entity: RestoreEntity<dyn LockDataPoint>,
}

impl Lock {
    pub fn new(data_point: Arc<dyn LockDataPoint>) -> Self {
        Self {
            entity: RestoreEntity::new(data_point, Platform::Lock),
        }
    }

    pub fn is_locked(&self) -> Option<bool> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return data_point.is_locked();
        }
        self.entity.restored_state().map(|state| state == "locked")
    }

    pub fn supports_open(&self) -> bool {
        self.entity.data_point().supports_open()
    }
}

#[async_trait]
impl Entity for Lock {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Lock
    }

    fn state_json(&self) -> Value {
        let data_point = self.entity.data_point();
        let state = if data_point.is_jammed() == Some(true) {
            "jammed"
        } else if data_point.is_locking() == Some(true) {
            "locking"
        } else if data_point.is_unlocking() == Some(true) {
            "unlocking"
        } else {
            match self.is_locked() {
                Some(true) => "locked",
                Some(false) => "unlocked",
                None => return Value::Null,
            }
        };
        state.into()
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        let features: Vec<&str> = if self.supports_open() {
            vec!["open"]
        } else {
            Vec::new()
        };
        attributes.insert(ATTR_SUPPORTED_FEATURES.into(), features.into());
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        let data_point = self.entity.data_point();
        match command {
            Command::Lock => data_point.lock().await?,
            Command::Unlock => data_point.unlock().await?,
            Command::Open if self.supports_open() => data_point.open().await?,
            other => return Err(EntityError::unsupported(Platform::Lock, &other)),
        }
        Ok(())
    }
}
