use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;
use tracing::debug;

use super::DOMAIN;
use super::PLATFORMS;
use super::PlatformContext;
use super::PlatformRegistration;
use super::generic_entity::ATTR_ADDRESS;
use super::generic_entity::ATTR_INTERFACE_ID;
use super::generic_entity::ATTR_MODEL;
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
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::EventDataPoint;
use crate::hub::RemovedCallback;
use crate::hub::UpdatedCallback;

pub const ATTR_EVENT_TYPES: &str = "event_types";

const EVENT_UNRECORDED_ATTRIBUTES: &[&str] = &[ATTR_ADDRESS, ATTR_INTERFACE_ID, ATTR_MODEL];

#[distributed_slice(PLATFORMS)]
static EVENT: PlatformRegistration = PlatformRegistration {
    platform: Platform::Event,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Event, |_, data_point| match data_point {
        DataPointHandle::Event(events) => match ChannelEvent::new(events) {
            Some(entity) => Some(Arc::new(entity) as _),
            None => {
                debug!("Skipping channel without events");
                None
            }
        },
        other => unexpected(Platform::Event, other),
    });
}

/// All events of one device channel.
pub struct ChannelEvent {
    events: Vec<Arc<dyn EventDataPoint>>,
    unique_id: String,
    event_types: Vec<String>,
    attributes: Attributes,
    device_identifier: String,
    last_event: Arc<Mutex<Option<String>>>,
    subscriptions: Subscriptions,
}

impl ChannelEvent {
    /// `None` for an empty group.
    pub fn new(events: Vec<Arc<dyn EventDataPoint>>) -> Option<Self> {
        let primary = events.first()?.clone();
        let device = primary.device();

        let mut attributes = Attributes::new();
        attributes.insert(ATTR_INTERFACE_ID.into(), device.interface_id.clone().into());
        attributes.insert(ATTR_ADDRESS.into(), primary.channel_address().into());
        attributes.insert(ATTR_MODEL.into(), device.model.clone().into());

        debug!(
            "Setting up events of {} {}",
            device.name,
            primary.channel_name().unwrap_or_default()
        );
        Some(Self {
            unique_id: unique_id(&primary.channel_unique_id()),
            event_types: events
                .iter()
                .map(|event| event.parameter().to_lowercase())
                .collect(),
            events,
            attributes,
            device_identifier: device.identifier,
            last_event: Arc::default(),
            subscriptions: Subscriptions::default(),
        })
    }

    fn primary(&self) -> &Arc<dyn EventDataPoint> {
        &self.events[0]
    }

    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    /// Library event type of the channel, e.g. `homematic_keypress`.
    pub fn translation_key(&self) -> String {
        self.primary().event_type().replace('.', "_")
    }

    pub fn last_event(&self) -> Option<String> {
        self.last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EntityCore for ChannelEvent {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> Option<String> {
        self.primary().channel_name()
    }

    fn available(&self) -> bool {
        self.primary().device_available()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(DeviceInfo::linked(DOMAIN, &self.device_identifier))
    }

    fn enabled_default(&self) -> bool {
        true
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.attributes.clone();
        attributes.insert(ATTR_EVENT_TYPES.into(), self.event_types.clone().into());
        attributes
    }

    async fn added(&self, ctx: EntityContext) -> Result<(), EntityError> {
        let notifier = Notifier::new(&ctx, &self.unique_id);
        for event in &self.events {
            let parameter = event.parameter().to_lowercase();
            let on_update = notifier.clone();
            let last_event = self.last_event.clone();
            let updated: UpdatedCallback = Arc::new(move |update| {
                if !on_update.is_enabled() {
                    debug!("Event {} not fired, entity is disabled", parameter);
                    return;
                }
                let fired = update
                    .parameter
                    .as_deref()
                    .map_or_else(|| parameter.clone(), str::to_lowercase);
                debug!("Event {} fired", fired);
                *last_event.lock().unwrap_or_else(PoisonError::into_inner) = Some(fired);
                on_update.refresh();
            });
            let on_remove = notifier.clone();
            let removed: RemovedCallback = Arc::new(move || on_remove.remove(RemovalScope::Device));

            self.subscriptions.push(event.subscribe_updated(updated));
            self.subscriptions
                .push(event.subscribe_device_removed(removed));
        }
        Ok(())
    }

    async fn will_remove(&self) {
        self.subscriptions.cancel_all();
    }

    async fn update(&self) -> Result<(), EntityError> {
        Ok(())
    }
}

#[async_trait]
impl Entity for ChannelEvent {
    fn core(&self) -> &dyn EntityCore {
        self
    }

    fn platform(&self) -> Platform {
        Platform::Event
    }

    fn state_json(&self) -> Value {
        self.last_event().map_or(Value::Null, Value::from)
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        EVENT_UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        Err(EntityError::unsupported(Platform::Event, &command))
    }
}
