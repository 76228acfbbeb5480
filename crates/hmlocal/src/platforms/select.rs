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
use crate::engine::Attributes;
use crate::engine::Command;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::Platform;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::SelectDataPoint;
use crate::hub::SysvarDataPoint;

pub const ATTR_OPTIONS: &str = "options";

#[distributed_slice(PLATFORMS)]
static SELECT: PlatformRegistration = PlatformRegistration {
    platform: Platform::Select,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Select, |_, data_point| match data_point {
        DataPointHandle::Select(dp) => Some(Arc::new(Select::new(dp)) as _),
        other => unexpected(Platform::Select, other),
    });
    ctx.add_data_points(DataPointCategory::HubSelect, |cu, data_point| {
        match data_point {
            DataPointHandle::HubSelect(dp) => {
                Some(Arc::new(SysvarSelect::new(dp, cu.device_info())) as _)
            }
            other => unexpected(Platform::Select, other),
        }
    });
}

/// Enum parameter. The host sees lowercase options, the device uppercase values.
pub struct Select {
    entity: RestoreEntity<dyn SelectDataPoint>,
}

impl Select {
    pub fn new(data_point: Arc<dyn SelectDataPoint>) -> Self {
        Self {
            entity: RestoreEntity::new(data_point, Platform::Select),
        }
    }

    pub fn options(&self) -> Vec<String> {
        self.entity
            .data_point()
            .values()
            .iter()
            .map(|option| option.to_lowercase())
            .collect()
    }

    pub fn current_option(&self) -> Option<String> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return data_point.value().map(|value| value.to_lowercase());
        }
        self.entity.restored_state()
    }
}

#[async_trait]
impl Entity for Select {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Select
    }

    fn state_json(&self) -> Value {
        self.current_option().map_or(Value::Null, Value::from)
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        attributes.insert(ATTR_OPTIONS.into(), self.options().into());
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::SelectOption(option) => Ok(self
                .entity
                .data_point()
                .send_value(option.to_uppercase())
                .await?),
            other => Err(EntityError::unsupported(Platform::Select, &other)),
        }
    }
}

/// List system variable; options are passed through unchanged.
pub struct SysvarSelect {
    entity: HubEntity<dyn SysvarDataPoint>,
}

impl SysvarSelect {
    pub fn new(data_point: Arc<dyn SysvarDataPoint>, central: DeviceInfo) -> Self {
        Self {
            entity: HubEntity::sysvar(data_point, central),
        }
    }
}

#[async_trait]
impl Entity for SysvarSelect {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Select
    }

    fn state_json(&self) -> Value {
        self.entity.data_point().value().unwrap_or(Value::Null)
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        attributes.insert(
            ATTR_OPTIONS.into(),
            self.entity.data_point().values().into(),
        );
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        HUB_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::SelectOption(option) => Ok(self
                .entity
                .data_point()
                .send_variable(option.into())
                .await?),
            other => Err(EntityError::unsupported(Platform::Select, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::RestoredState;
    use crate::platforms::test_support::Harness;
    use crate::testing::MockDataPoint;

    const UID: &str = "homematicip_local_vcu0000004_1_channel_operation_mode";

    fn mode() -> Arc<MockDataPoint> {
        let dp = MockDataPoint::generic("VCU0000004:1", "CHANNEL_OPERATION_MODE");
        dp.set(|s| s.values = vec!["KEY_BEHAVIOR".into(), "SWITCH_BEHAVIOR".into()]);
        dp
    }

    #[tokio::test]
    async fn test_options_are_lowercased_and_sent_uppercase() {
        let harness = Harness::new();
        let dp = mode();
        dp.set(|s| {
            s.valid = true;
            s.text = Some("KEY_BEHAVIOR".into());
        });
        harness.control_unit.push(DataPointHandle::Select(dp.clone()));
        harness.setup(setup_entry).await;

        assert_eq!(harness.state(UID), json!("key_behavior"));
        assert_eq!(
            harness.attribute(UID, "options"),
            Some(json!(["key_behavior", "switch_behavior"]))
        );

        harness
            .engine
            .send_command(UID, Command::SelectOption("switch_behavior".into()))
            .await
            .unwrap();
        assert_eq!(
            dp.calls().last().map(String::as_str),
            Some("send_value(SWITCH_BEHAVIOR)")
        );
    }

    #[tokio::test]
    async fn test_restored_option() {
        let harness = Harness::new();
        harness
            .engine
            .restore_cache()
            .insert(UID, RestoredState::new("switch_behavior"));
        harness.control_unit.push(DataPointHandle::Select(mode()));
        harness.setup(setup_entry).await;

        assert_eq!(harness.state(UID), json!("switch_behavior"));
    }

    #[tokio::test]
    async fn test_unknown_restored_state_is_ignored() {
        let harness = Harness::new();
        harness
            .engine
            .restore_cache()
            .insert(UID, RestoredState::new("unavailable"));
        harness.control_unit.push(DataPointHandle::Select(mode()));
        harness.setup(setup_entry).await;

        assert_eq!(harness.state(UID), Value::Null);
    }

    #[tokio::test]
    async fn test_hub_select_keeps_options() {
        let harness = Harness::new();
        let dp = MockDataPoint::sysvar("presence", "svPresence");
        dp.set(|s| {
            s.values = vec!["Home".into(), "Away".into()];
            s.json = Some(json!("Away"));
        });
        harness.control_unit.push(DataPointHandle::HubSelect(dp.clone()));
        harness.setup(setup_entry).await;

        let uid = "homematicip_local_ccu-dev_presence";
        harness.engine.set_entity_enabled(uid, true);
        assert_eq!(harness.state(uid), json!("Away"));
        assert_eq!(harness.attribute(uid, "options"), Some(json!(["Home", "Away"])));

        harness
            .engine
            .send_command(uid, Command::SelectOption("Home".into()))
            .await
            .unwrap();
        assert_eq!(dp.calls(), vec![r#"send_variable("Home")"#]);
    }
}
