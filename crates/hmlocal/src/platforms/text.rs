use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;

use super::PLATFORMS;
use super::PlatformContext;
use super::PlatformRegistration;
use super::generic_entity::HUB_UNRECORDED_ATTRIBUTES;
use super::generic_entity::HubEntity;
use super::generic_entity::RestoreEntity;
use super::generic_entity::UNRECORDED_ATTRIBUTES;
use super::unexpected;
use crate::engine::Command;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::Platform;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::SysvarDataPoint;
use crate::hub::TextDataPoint;

#[distributed_slice(PLATFORMS)]
static TEXT: PlatformRegistration = PlatformRegistration {
    platform: Platform::Text,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Text, |_, data_point| match data_point {
        DataPointHandle::Text(dp) => Some(Arc::new(Text::new(dp)) as _),
        other => unexpected(Platform::Text, other),
    });
    ctx.add_data_points(DataPointCategory::HubText, |cu, data_point| {
        match data_point {
            DataPointHandle::HubText(dp) => {
                Some(Arc::new(SysvarText::new(dp, cu.device_info())) as _)
            }
            other => unexpected(Platform::Text, other),
        }
    });
}

pub struct Text {
    entity: RestoreEntity<dyn TextDataPoint>,
}

impl Text {
    pub fn new(data_point: Arc<dyn TextDataPoint>) -> Self {
        Self {
            entity: RestoreEntity::new(data_point, Platform::Text),
        }
    }

    pub fn value(&self) -> Option<String> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return data_point.value();
        }
        self.entity.restored_state()
    }
}

#[async_trait]
impl Entity for Text {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Text
    }

    fn state_json(&self) -> Value {
        self.value().map_or(Value::Null, Value::from)
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::SetValue(value) => Ok(self.entity.data_point().send_value(value).await?),
            other => Err(EntityError::unsupported(Platform::Text, &other)),
        }
    }
}

/// String system variable.
pub struct SysvarText {
    entity: HubEntity<dyn SysvarDataPoint>,
}

impl SysvarText {
    pub fn new(data_point: Arc<dyn SysvarDataPoint>, central: DeviceInfo) -> Self {
        Self {
            entity: HubEntity::sysvar(data_point, central),
        }
    }
}

#[async_trait]
impl Entity for SysvarText {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Text
    }

    fn state_json(&self) -> Value {
        match self.entity.data_point().value() {
            Some(Value::String(text)) => text.into(),
            Some(Value::Null) | None => Value::Null,
            Some(other) => other.to_string().into(),
        }
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        HUB_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::SetValue(value) => Ok(self
                .entity
                .data_point()
                .send_variable(value.into())
                .await?),
            other => Err(EntityError::unsupported(Platform::Text, &other)),
        }
    }
}
