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
use crate::hub::Origin;
use crate::hub::ParameterType;
use crate::hub::SensorDataPoint;
use crate::hub::SysvarDataPoint;
use crate::hub::SysvarType;

pub const ATTR_DEVICE_CLASS: &str = "device_class";
pub const ATTR_OPTIONS: &str = "options";
pub const ATTR_STATE_CLASS: &str = "state_class";
pub const ATTR_UNIT: &str = "unit_of_measurement";

/// Counter variables that only ever grow.
pub const TOTAL_SYSVAR: &[&str] = &[
    "svEnergyCounter_",
    "svHmIPRainCounter_",
    "svHmIPSunshineCounter_",
];

#[distributed_slice(PLATFORMS)]
static SENSOR: PlatformRegistration = PlatformRegistration {
    platform: Platform::Sensor,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Sensor, |_, data_point| match data_point {
        DataPointHandle::Sensor(dp) => Some(Arc::new(Sensor::new(dp)) as _),
        other => unexpected(Platform::Sensor, other),
    });
    ctx.add_data_points(DataPointCategory::HubSensor, |cu, data_point| {
        match data_point {
            DataPointHandle::HubSensor(dp) => {
                Some(Arc::new(SysvarSensor::new(dp, cu.device_info())) as _)
            }
            other => unexpected(Platform::Sensor, other),
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

pub struct Sensor {
    entity: RestoreEntity<dyn SensorDataPoint>,
    multiplier: f64,
    /// Lowercased value list; only set for enum parameters
    options: Option<Vec<String>>,
    unit: Option<String>,
}

impl Sensor {
    pub fn new(data_point: Arc<dyn SensorDataPoint>) -> Self {
        let options = (data_point.parameter_type() == ParameterType::Enum).then(|| {
            data_point
                .values()
                .iter()
                .map(|option| option.to_lowercase())
                .collect()
        });
        Self {
            multiplier: data_point.multiplier(),
            options,
            unit: data_point.unit(),
            entity: RestoreEntity::with_kind(data_point, Platform::Sensor, RestoreKind::NativeValue),
        }
    }

    pub fn native_value(&self) -> Option<Value> {
        let data_point = self.entity.data_point();
        if !data_point.is_valid() {
            return self.entity.restored_native_value();
        }
        let value = data_point.value()?;
        let parameter_type = data_point.parameter_type();
        if parameter_type.is_numeric() && self.multiplier != 1.0 {
            if let Some(number) = value.as_f64() {
                return Some((number * self.multiplier).into());
            }
        }
        // Translatable text is lowercased; parameter-backed data points
        // always carry a translation key.
        let translatable = matches!(data_point.origin(), Origin::Generic { .. })
            || parameter_type == ParameterType::Enum;
        if parameter_type.is_textual() && translatable {
            if let Value::String(text) = &value {
                return Some(text.to_lowercase().into());
            }
        }
        Some(value)
    }

    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }
}

#[async_trait]
impl Entity for Sensor {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn state_json(&self) -> Value {
        self.native_value().unwrap_or(Value::Null)
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        if let Some(options) = &self.options {
            attributes.insert(ATTR_DEVICE_CLASS.into(), "enum".into());
            attributes.insert(ATTR_OPTIONS.into(), options.clone().into());
        }
        if let Some(unit) = &self.unit {
            attributes.insert(ATTR_UNIT.into(), unit.clone().into());
        }
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    fn extra_restore_data(&self) -> Option<Value> {
        self.native_value()
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        Err(EntityError::unsupported(Platform::Sensor, &command))
    }
}

/// Read-only system variable.
pub struct SysvarSensor {
    entity: HubEntity<dyn SysvarDataPoint>,
    options: Option<Vec<String>>,
    state_class: Option<StateClass>,
}

impl SysvarSensor {
    pub fn new(data_point: Arc<dyn SysvarDataPoint>, central: DeviceInfo) -> Self {
        let (options, state_class) = match data_point.data_type() {
            SysvarType::List => (Some(data_point.values()), None),
            SysvarType::Float | SysvarType::Integer => {
                (None, Some(state_class(&data_point.ccu_name())))
            }
            _ => (None, None),
        };
        Self {
            entity: HubEntity::sysvar(data_point, central),
            options,
            state_class,
        }
    }

    pub fn state_class(&self) -> Option<StateClass> {
        self.state_class
    }
}

fn state_class(ccu_name: &str) -> StateClass {
    if TOTAL_SYSVAR.iter().any(|prefix| ccu_name.starts_with(prefix)) {
        StateClass::TotalIncreasing
    } else {
        StateClass::Measurement
    }
}

#[async_trait]
impl Entity for SysvarSensor {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn state_json(&self) -> Value {
        self.entity.data_point().value().unwrap_or(Value::Null)
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        if let Some(options) = &self.options {
            attributes.insert(ATTR_DEVICE_CLASS.into(), "enum".into());
            attributes.insert(ATTR_OPTIONS.into(), options.clone().into());
        } else if let Some(unit) = self.entity.data_point().unit() {
            attributes.insert(ATTR_UNIT.into(), unit.into());
        }
        if let Some(state_class) = self.state_class {
            attributes.insert(ATTR_STATE_CLASS.into(), state_class.to_string().into());
        }
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        HUB_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        Err(EntityError::unsupported(Platform::Sensor, &command))
    }
}
