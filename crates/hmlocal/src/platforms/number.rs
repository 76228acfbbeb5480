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
use super::generic_entity::RestoreKind;
use super::generic_entity::UNRECORDED_ATTRIBUTES;
use super::unexpected;
use crate::engine::Attributes;
use crate::engine::Command;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::Platform;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::NumberDataPoint;
use crate::hub::ParameterType;
use crate::hub::SysvarDataPoint;
use crate::hub::SysvarType;

pub const ATTR_MIN: &str = "min";
pub const ATTR_MAX: &str = "max";
pub const ATTR_STEP: &str = "step";
pub const ATTR_UNIT: &str = "unit_of_measurement";

#[distributed_slice(PLATFORMS)]
static NUMBER: PlatformRegistration = PlatformRegistration {
    platform: Platform::Number,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Number, |_, data_point| match data_point {
        DataPointHandle::Number(dp) => Some(Arc::new(Number::new(dp)) as _),
        other => unexpected(Platform::Number, other),
    });
    ctx.add_data_points(DataPointCategory::HubNumber, |cu, data_point| {
        match data_point {
            DataPointHandle::HubNumber(dp) => {
                Some(Arc::new(SysvarNumber::new(dp, cu.device_info())) as _)
            }
            other => unexpected(Platform::Number, other),
        }
    });
}

/// Numeric device parameter, shown in host units (value × multiplier).
pub struct Number {
    entity: RestoreEntity<dyn NumberDataPoint>,
    multiplier: f64,
    min: f64,
    max: f64,
    step: f64,
    unit: Option<String>,
}

impl Number {
    pub fn new(data_point: Arc<dyn NumberDataPoint>) -> Self {
        let multiplier = data_point.multiplier();
        let step = if data_point.parameter_type() == ParameterType::Integer {
            1.0
        } else {
            0.01 * multiplier
        };
        Self {
            min: data_point.min() * multiplier,
            max: data_point.max() * multiplier,
            step,
            unit: data_point.unit(),
            multiplier,
            entity: RestoreEntity::with_kind(data_point, Platform::Number, RestoreKind::NativeValue),
        }
    }

    pub fn native_value(&self) -> Option<f64> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            if let Some(value) = data_point.value() {
                return Some(value * self.multiplier);
            }
        }
        self.entity
            .restored_native_value()
            .and_then(|value| value.as_f64())
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

#[async_trait]
impl Entity for Number {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Number
    }

    fn state_json(&self) -> Value {
        self.native_value().map_or(Value::Null, Value::from)
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        attributes.insert(ATTR_MIN.into(), self.min.into());
        attributes.insert(ATTR_MAX.into(), self.max.into());
        attributes.insert(ATTR_STEP.into(), self.step.into());
        if let Some(unit) = &self.unit {
            attributes.insert(ATTR_UNIT.into(), unit.clone().into());
        }
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    fn extra_restore_data(&self) -> Option<Value> {
        self.native_value().map(Value::from)
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::SetNativeValue(value) => Ok(self
                .entity
                .data_point()
                .send_value(value / self.multiplier)
                .await?),
            other => Err(EntityError::unsupported(Platform::Number, &other)),
        }
    }
}

/// Float or integer system variable.
pub struct SysvarNumber {
    entity: HubEntity<dyn SysvarDataPoint>,
}

impl SysvarNumber {
    pub fn new(data_point: Arc<dyn SysvarDataPoint>, central: DeviceInfo) -> Self {
        Self {
            entity: HubEntity::sysvar(data_point, central),
        }
    }

    pub fn native_value(&self) -> Option<f64> {
        self.entity.data_point().value()?.as_f64()
    }
}

#[async_trait]
impl Entity for SysvarNumber {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Number
    }

    fn state_json(&self) -> Value {
        self.native_value().map_or(Value::Null, Value::from)
    }

    fn extra_state_attributes(&self) -> Attributes {
        let data_point = self.entity.data_point();
        let mut attributes = self.entity.extra_state_attributes();
        // Zero bounds count as unset.
        if let Some(min) = data_point.min().filter(|min| *min != 0.0) {
            attributes.insert(ATTR_MIN.into(), min.into());
        }
        if let Some(max) = data_point.max().filter(|max| *max != 0.0) {
            attributes.insert(ATTR_MAX.into(), max.into());
        }
        let unit = match data_point.unit() {
            Some(unit) => Some(unit),
            None if matches!(
                data_point.data_type(),
                SysvarType::Float | SysvarType::Integer
            ) =>
            {
                Some(" ".to_string())
            }
            None => None,
        };
        if let Some(unit) = unit {
            attributes.insert(ATTR_UNIT.into(), unit.into());
        }
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        HUB_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::SetNativeValue(value) => Ok(self
                .entity
                .data_point()
                .send_variable(value.into())
                .await?),
            other => Err(EntityError::unsupported(Platform::Number, &other)),
        }
    }
}
