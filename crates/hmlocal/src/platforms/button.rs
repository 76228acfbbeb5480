use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;

use super::PLATFORMS;
use super::PlatformContext;
use super::PlatformRegistration;
use super::generic_entity::GenericEntity;
use super::generic_entity::HUB_UNRECORDED_ATTRIBUTES;
use super::generic_entity::HubEntity;
use super::generic_entity::UNRECORDED_ATTRIBUTES;
use super::unexpected;
use crate::engine::Command;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::Platform;
use crate::hub::ButtonDataPoint;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::ProgramDataPoint;

#[distributed_slice(PLATFORMS)]
static BUTTON: PlatformRegistration = PlatformRegistration {
    platform: Platform::Button,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Button, |_, data_point| match data_point {
        DataPointHandle::Button(dp) => Some(Arc::new(Button::new(dp)) as _),
        other => unexpected(Platform::Button, other),
    });
    ctx.add_data_points(DataPointCategory::HubButton, |cu, data_point| {
        match data_point {
            DataPointHandle::HubButton(dp) => {
                Some(Arc::new(ProgramButton::new(dp, cu.device_info())) as _)
            }
            other => unexpected(Platform::Button, other),
        }
    });
}

/// Buttons are stateless; the state is unknown until the host records a press.
pub struct Button {
    entity: GenericEntity<dyn ButtonDataPoint>,
}

impl Button {
    pub fn new(data_point: Arc<dyn ButtonDataPoint>) -> Self {
        Self {
            entity: GenericEntity::new(data_point, Platform::Button),
        }
    }
}

#[async_trait]
impl Entity for Button {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Button
    }

    fn state_json(&self) -> Value {
        Value::Null
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::Press => Ok(self.entity.data_point().press().await?),
            other => Err(EntityError::unsupported(Platform::Button, &other)),
        }
    }
}

/// Runs a CCU program.
pub struct ProgramButton {
    entity: HubEntity<dyn ProgramDataPoint>,
}

impl ProgramButton {
    pub fn new(data_point: Arc<dyn ProgramDataPoint>, central: DeviceInfo) -> Self {
        Self {
            entity: HubEntity::program(data_point, central),
        }
    }
}

#[async_trait]
impl Entity for ProgramButton {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Button
    }

    fn state_json(&self) -> Value {
        Value::Null
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        HUB_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            Command::Press => Ok(self.entity.data_point().press().await?),
            other => Err(EntityError::unsupported(Platform::Button, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::hub::LibraryError;
    use crate::platforms::test_support::Harness;
    use crate::testing::MockDataPoint;

    #[tokio::test]
    async fn test_press_forwards_to_data_point() {
        let harness = Harness::new();
        let dp = MockDataPoint::generic("VCU0000001:1", "PRESS_SHORT");
        harness.control_unit.push(DataPointHandle::Button(dp.clone()));
        harness.setup(setup_entry).await;

        let uid = "homematicip_local_vcu0000001_1_press_short";
        harness.engine.send_command(uid, Command::Press).await.unwrap();
        assert_eq!(dp.calls().last().map(String::as_str), Some("press"));

        assert!(matches!(
            harness.engine.send_command(uid, Command::TurnOn).await,
            Err(EntityError::Unsupported { command: "turn_on", .. })
        ));
    }

    #[tokio::test]
    async fn test_press_failure_propagates_unchanged() {
        let harness = Harness::new();
        let dp = MockDataPoint::generic("VCU0000001:1", "PRESS_LONG");
        harness.control_unit.push(DataPointHandle::Button(dp.clone()));
        harness.setup(setup_entry).await;
        dp.fail_with(LibraryError::Rejected("busy".into()));

        let err = harness
            .engine
            .send_command("homematicip_local_vcu0000001_1_press_long", Command::Press)
            .await
            .unwrap_err();
        assert_eq!(err, EntityError::Library(LibraryError::Rejected("busy".into())));
    }

    #[tokio::test]
    async fn test_program_button() {
        let harness = Harness::new();
        let dp = MockDataPoint::sysvar("prg_1", "Evening");
        harness.control_unit.push(DataPointHandle::HubButton(dp.clone()));
        harness.setup(setup_entry).await;

        let uid = "homematicip_local_ccu-dev_prg_1";
        harness.engine.set_entity_enabled(uid, true);
        assert_eq!(harness.attribute(uid, "name"), Some(json!("Evening")));
        assert_eq!(harness.attribute(uid, "value_state"), None);

        harness.engine.send_command(uid, Command::Press).await.unwrap();
        assert_eq!(dp.calls(), vec!["press"]);
        let device = harness.engine.entity(uid).unwrap().device_info().unwrap();
        assert_eq!(device.name.as_deref(), Some("ccu-dev"));
    }
}
