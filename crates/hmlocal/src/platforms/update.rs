//! Device firmware.

use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use super::DOMAIN;
use super::PLATFORMS;
use super::PlatformContext;
use super::PlatformRegistration;
use super::generic_entity::Notifier;
use super::generic_entity::Subscriptions;
use super::generic_entity::unique_id;
use super::unexpected;
use crate::engine::Attributes;
use crate::engine::Command;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityContext;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::Platform;
use crate::engine::RemovalScope;
use crate::engine::on_off;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::RemovedCallback;
use crate::hub::UpdateDataPoint;
use crate::hub::UpdatedCallback;

pub const ATTR_FIRMWARE_UPDATE_STATE: &str = "firmware_update_state";
pub const ATTR_INSTALLED_VERSION: &str = "installed_version";
pub const ATTR_LATEST_VERSION: &str = "latest_version";
pub const ATTR_IN_PROGRESS: &str = "in_progress";

/// Seconds after an install at which the firmware state is read again.
pub const REFRESH_AFTER_INSTALL: [u64; 2] = [10, 60];

const UPDATE_UNRECORDED_ATTRIBUTES: &[&str] = &[ATTR_FIRMWARE_UPDATE_STATE];

#[distributed_slice(PLATFORMS)]
static UPDATE: PlatformRegistration = PlatformRegistration {
    platform: Platform::Update,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Update, |_, data_point| match data_point {
        DataPointHandle::Update(dp) => Some(Arc::new(FirmwareUpdate::new(dp)) as _),
        other => unexpected(Platform::Update, other),
    });
}

pub struct FirmwareUpdate {
    data_point: Arc<dyn UpdateDataPoint>,
    unique_id: String,
    device_identifier: String,
    subscriptions: Subscriptions,
}

impl FirmwareUpdate {
    pub fn new(data_point: Arc<dyn UpdateDataPoint>) -> Self {
        debug!("Setting up firmware update of {}", data_point.full_name());
        Self {
            unique_id: unique_id(&data_point.unique_id()),
            device_identifier: data_point.device().identifier,
            data_point,
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn installed_version(&self) -> Option<String> {
        self.data_point.firmware()
    }

    pub fn latest_version(&self) -> Option<String> {
        self.data_point.latest_firmware()
    }

    pub fn update_available(&self) -> Option<bool> {
        let latest = self.latest_version()?;
        let installed = self.installed_version()?;
        Some(installed != latest)
    }
}

#[async_trait]
impl EntityCore for FirmwareUpdate {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> Option<String> {
        self.data_point.name()
    }

    fn available(&self) -> bool {
        self.data_point.available()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(DeviceInfo::linked(DOMAIN, &self.device_identifier))
    }

    fn enabled_default(&self) -> bool {
        true
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(ATTR_INSTALLED_VERSION.into(), self.installed_version().into());
        attributes.insert(ATTR_LATEST_VERSION.into(), self.latest_version().into());
        attributes.insert(ATTR_IN_PROGRESS.into(), self.data_point.in_progress().into());
        attributes.insert(
            ATTR_FIRMWARE_UPDATE_STATE.into(),
            self.data_point.firmware_update_state().into(),
        );
        attributes
    }

    async fn added(&self, ctx: EntityContext) -> Result<(), EntityError> {
        let notifier = Notifier::new(&ctx, &self.unique_id);
        let on_update = notifier.clone();
        let name = self.data_point.full_name();
        let updated: UpdatedCallback = Arc::new(move |_| {
            if on_update.refresh() {
                debug!("Firmware state of {} changed", name);
            } else {
                debug!("Skipping firmware state of {}, entity is disabled", name);
            }
        });
        let removed: RemovedCallback = Arc::new(move || notifier.remove(RemovalScope::Device));

        self.subscriptions
            .push(self.data_point.subscribe_updated(updated));
        self.subscriptions
            .push(self.data_point.subscribe_device_removed(removed));
        Ok(())
    }

    async fn will_remove(&self) {
        self.subscriptions.cancel_all();
    }

    async fn update(&self) -> Result<(), EntityError> {
        self.data_point.refresh_firmware_data().await?;
        Ok(())
    }
}

#[async_trait]
impl Entity for FirmwareUpdate {
    fn core(&self) -> &dyn EntityCore {
        self
    }

    fn platform(&self) -> Platform {
        Platform::Update
    }

    fn state_json(&self) -> Value {
        on_off(self.update_available())
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UPDATE_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        match command {
            // The library always installs the latest firmware.
            Command::Install { .. } => {
                let started = self
                    .data_point
                    .update_firmware(&REFRESH_AFTER_INSTALL)
                    .await?;
                info!(
                    "Firmware update of {} {}",
                    self.data_point.full_name(),
                    if started { "started" } else { "not started" }
                );
                Ok(())
            }
            other => Err(EntityError::unsupported(Platform::Update, &other)),
        }
    }
}
