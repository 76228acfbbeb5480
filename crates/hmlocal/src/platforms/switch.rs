use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;

use super::PLATFORMS;
use super::PlatformContext;
use super::PlatformRegistration;
use super::binary_sensor::truthy;
use super::generic_entity::HUB_UNRECORDED_ATTRIBUTES;
use super::generic_entity::HubEntity;
use super::generic_entity::RestoreEntity;
use super::generic_entity::UNRECORDED_ATTRIBUTES;
use super::unexpected;
use crate::engine::Attributes;
use crate::engine::Command;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::EntityService;
use crate::engine::Platform;
use crate::engine::ServiceSchema;
use crate::engine::Validator;
use crate::engine::on_off;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::Origin;
use crate::hub::SwitchDataPoint;
use crate::hub::SysvarDataPoint;

pub const SERVICE_SWITCH_SET_ON_TIME: &str = "switch_set_on_time";

pub const ATTR_CHANNEL_STATE: &str = "channel_state";

/// Longest on time the devices accept, in seconds.
pub const MAX_ON_TIME: i64 = 8_580_000;

#[distributed_slice(PLATFORMS)]
static SWITCH: PlatformRegistration = PlatformRegistration {
    platform: Platform::Switch,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Switch, |_, data_point| match data_point {
        DataPointHandle::Switch(dp) => Some(Arc::new(Switch::new(dp)) as _),
        other => unexpected(Platform::Switch, other),
    });
    ctx.add_data_points(DataPointCategory::HubSwitch, |cu, data_point| {
        match data_point {
            DataPointHandle::HubSwitch(dp) => {
                Some(Arc::new(SysvarSwitch::new(dp, cu.device_info())) as _)
            }
            other => unexpected(Platform::Switch, other),
        }
    });

    ctx.register_entity_service(
        SERVICE_SWITCH_SET_ON_TIME,
        EntityService {
            platform: Platform::Switch,
            schema: ServiceSchema::new().required(
                "on_time",
                Validator::IntRange {
                    min: 0,
                    max: MAX_ON_TIME,
                },
            ),
            build: |data| Command::SetOnTime(data.int("on_time").unwrap_or_default() as f64),
        },
    );
}

pub struct Switch {
    entity: RestoreEntity<dyn SwitchDataPoint>,
}

impl Switch {
    pub fn new(data_point: Arc<dyn SwitchDataPoint>) -> Self {
        Self {
            entity: RestoreEntity::new(data_point, Platform::Switch),
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return Some(data_point.value() == Some(true));
        }
        self.entity.restored_state().map(|state| state == "on")
    }

    /// State of the underlying channel when a composed switch is on there
    /// but shows a different value.
    pub fn channel_state(&self) -> Option<bool> {
        let data_point = self.entity.data_point();
        if !matches!(data_point.origin(), Origin::Custom { .. }) {
            return None;
        }
        let channel_value = data_point.channel_value();
        (channel_value == Some(true) && data_point.value() != channel_value)
            .then_some(true)
    }
}

#[async_trait]
impl Entity for Switch {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn state_json(&self) -> Value {
        on_off(self.is_on())
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        if let Some(channel_state) = self.channel_state() {
            attributes.insert(ATTR_CHANNEL_STATE.into(), channel_state.into());
        }
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        let data_point = self.entity.data_point();
        match command {
            Command::TurnOn => data_point.turn_on().await?,
            Command::TurnOff => data_point.turn_off().await?,
            Command::SetOnTime(on_time) => data_point.set_on_time(on_time).await?,
            other => return Err(EntityError::unsupported(Platform::Switch, &other)),
        }
        Ok(())
    }
}

/// Logic system variable.
pub struct SysvarSwitch {
    entity: HubEntity<dyn SysvarDataPoint>,
}

impl SysvarSwitch {
    pub fn new(data_point: Arc<dyn SysvarDataPoint>, central: DeviceInfo) -> Self {
        Self {
            entity: HubEntity::sysvar(data_point, central),
        }
    }

    pub fn is_on(&self) -> bool {
        truthy(self.entity.data_point().value().as_ref())
    }
}

#[async_trait]
impl Entity for SysvarSwitch {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn state_json(&self) -> Value {
        on_off(Some(self.is_on()))
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        HUB_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        let data_point = self.entity.data_point();
        match command {
            Command::TurnOn => data_point.send_variable(true.into()).await?,
            Command::TurnOff => data_point.send_variable(false.into()).await?,
            other => return Err(EntityError::unsupported(Platform::Switch, &other)),
        }
        Ok(())
    }
}
