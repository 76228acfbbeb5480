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
use crate::engine::on_off;
use crate::hub::BinarySensorDataPoint;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::SysvarDataPoint;

#[distributed_slice(PLATFORMS)]
static BINARY_SENSOR: PlatformRegistration = PlatformRegistration {
    platform: Platform::BinarySensor,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::BinarySensor, |_, data_point| {
        match data_point {
            DataPointHandle::BinarySensor(dp) => Some(Arc::new(BinarySensor::new(dp)) as _),
            other => unexpected(Platform::BinarySensor, other),
        }
    });
    ctx.add_data_points(DataPointCategory::HubBinarySensor, |cu, data_point| {
        match data_point {
            DataPointHandle::HubBinarySensor(dp) => {
                Some(Arc::new(SysvarBinarySensor::new(dp, cu.device_info())) as _)
            }
            other => unexpected(Platform::BinarySensor, other),
        }
    });
}

pub struct BinarySensor {
    entity: RestoreEntity<dyn BinarySensorDataPoint>,
}

impl BinarySensor {
    pub fn new(data_point: Arc<dyn BinarySensorDataPoint>) -> Self {
        Self {
            entity: RestoreEntity::new(data_point, Platform::BinarySensor),
        }
    }

    /// Live value, else the restored state, else the parameter default.
    pub fn is_on(&self) -> Option<bool> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return data_point.value();
        }
        if let Some(state) = self.entity.restored_state() {
            return Some(state == "on");
        }
        data_point.default_value()
    }
}

#[async_trait]
impl Entity for BinarySensor {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::BinarySensor
    }

    fn state_json(&self) -> Value {
        on_off(self.is_on())
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        Err(EntityError::unsupported(Platform::BinarySensor, &command))
    }
}

/// Alarm and logic system variables.
pub struct SysvarBinarySensor {
    entity: HubEntity<dyn SysvarDataPoint>,
}

impl SysvarBinarySensor {
    pub fn new(data_point: Arc<dyn SysvarDataPoint>, central: DeviceInfo) -> Self {
        Self {
            entity: HubEntity::sysvar(data_point, central),
        }
    }

    pub fn is_on(&self) -> bool {
        truthy(self.entity.data_point().value().as_ref())
    }
}

/// Truthiness of a system variable value.
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[async_trait]
impl Entity for SysvarBinarySensor {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::BinarySensor
    }

    fn state_json(&self) -> Value {
        on_off(Some(self.is_on()))
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        HUB_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        Err(EntityError::unsupported(Platform::BinarySensor, &command))
    }
}
