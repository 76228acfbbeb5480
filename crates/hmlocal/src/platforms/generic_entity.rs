//! Entity adapters shared by all platforms
//!
//! [`GenericEntity`] wraps a channel data point, [`RestoreEntity`] adds the
//! restore fallback on top of it and [`HubEntity`] wraps system variables and
//! programs of the central.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::DOMAIN;
use crate::Subscription;
use crate::engine::Attributes;
use crate::engine::DeviceInfo;
use crate::engine::EngineMessage;
use crate::engine::EngineSender;
use crate::engine::EntityContext;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::Platform;
use crate::engine::RemovalScope;
use crate::engine::RestoredState;
use crate::engine::Translations;
use crate::hub::CallSource;
use crate::hub::ChannelDataPoint;
use crate::hub::DataPoint;
use crate::hub::DeviceDescription;
use crate::hub::HubDataPoint;
use crate::hub::Origin;
use crate::hub::RemovedCallback;
use crate::hub::UpdatedCallback;

pub const ATTR_ADDRESS: &str = "address";
pub const ATTR_FUNCTION: &str = "function";
pub const ATTR_INTERFACE_ID: &str = "interface_id";
pub const ATTR_MODEL: &str = "model";
pub const ATTR_NAME: &str = "name";
pub const ATTR_PARAMETER: &str = "parameter";
pub const ATTR_VALUE_STATE: &str = "value_state";

/// Attributes of channel entities that are never written to restore snapshots.
pub const UNRECORDED_ATTRIBUTES: &[&str] = &[
    ATTR_ADDRESS,
    ATTR_FUNCTION,
    ATTR_INTERFACE_ID,
    ATTR_MODEL,
    ATTR_PARAMETER,
    ATTR_VALUE_STATE,
];

pub const HUB_UNRECORDED_ATTRIBUTES: &[&str] = &[ATTR_NAME];

/// Quality of the value an entity shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ValueState {
    Valid,
    Uncertain,
    #[strum(serialize = "not valid")]
    NotValid,
    Restored,
}

impl ValueState {
    fn of<D: DataPoint + ?Sized>(data_point: &D) -> Self {
        match (data_point.is_valid(), data_point.state_uncertain()) {
            (true, true) => ValueState::Uncertain,
            (true, false) => ValueState::Valid,
            (false, _) => ValueState::NotValid,
        }
    }
}

impl From<ValueState> for Value {
    fn from(state: ValueState) -> Self {
        Value::String(state.to_string())
    }
}

/// Entity unique id for a library unique id.
pub fn unique_id(library_id: &str) -> String {
    format!("{}_{}", DOMAIN, library_id)
}

/// `ACTUAL_TEMPERATURE` -> `Actual Temperature`
pub fn title_case(parameter: &str) -> String {
    parameter
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full device info of a library device, attached to the central.
pub fn device_info(device: &DeviceDescription) -> DeviceInfo {
    DeviceInfo {
        identifiers: vec![(DOMAIN.to_string(), device.identifier.clone())],
        manufacturer: Some(device.manufacturer.clone()),
        model: Some(device.model.clone()),
        name: Some(device.name.clone()),
        serial_number: Some(device.address.clone()),
        sw_version: device.firmware.clone(),
        suggested_area: device.room.clone(),
        via_device: Some((DOMAIN.to_string(), device.central_name.clone())),
    }
}

/// Sends refresh and removal requests for one entity to the engine.
#[derive(Clone)]
pub struct Notifier {
    sender: EngineSender,
    enabled: Arc<AtomicBool>,
    unique_id: String,
}

impl Notifier {
    pub fn new(ctx: &EntityContext, unique_id: &str) -> Self {
        Self {
            sender: ctx.sender.clone(),
            enabled: ctx.enabled.clone(),
            unique_id: unique_id.to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Schedule a state write. Disabled entities are skipped; returns whether
    /// a write was scheduled.
    pub fn refresh(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.send(EngineMessage::StateChanged {
            unique_id: self.unique_id.clone(),
        });
        true
    }

    pub fn remove(&self, scope: RemovalScope) {
        self.send(EngineMessage::Remove {
            unique_id: self.unique_id.clone(),
            scope,
        });
    }

    fn send(&self, msg: EngineMessage) {
        if self.sender.send(msg).is_err() {
            debug!("Engine is gone, dropping message for {}", self.unique_id);
        }
    }
}

/// Data point subscriptions held by an entity while it is added.
#[derive(Debug, Default)]
pub struct Subscriptions(Mutex<Vec<Subscription>>);

impl Subscriptions {
    pub fn push(&self, subscription: Subscription) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }

    pub fn cancel_all(&self) {
        let subscriptions =
            std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner));
        for subscription in subscriptions {
            subscription.cancel();
        }
    }
}

/// Entity wrapping a channel data point.
pub struct GenericEntity<P: ?Sized> {
    data_point: Arc<P>,
    platform: Platform,
    unique_id: String,
    static_attributes: Attributes,
    translations: OnceLock<Translations>,
    subscriptions: Subscriptions,
    /// Set once the data point reported a valid value, enabled or not.
    seen_valid: Arc<AtomicBool>,
}

impl<P: ChannelDataPoint + ?Sized + 'static> GenericEntity<P> {
    pub fn new(data_point: Arc<P>, platform: Platform) -> Self {
        let device = data_point.device();
        let mut static_attributes = Attributes::new();
        static_attributes.insert(ATTR_INTERFACE_ID.into(), device.interface_id.into());
        static_attributes.insert(ATTR_ADDRESS.into(), data_point.channel_address().into());
        static_attributes.insert(ATTR_MODEL.into(), device.model.into());
        if let Origin::Generic {
            parameter,
            function,
            ..
        } = data_point.origin()
        {
            static_attributes.insert(ATTR_PARAMETER.into(), parameter.into());
            static_attributes.insert(ATTR_FUNCTION.into(), function.into());
        }

        debug!("Wrapping {}", data_point.full_name());
        Self {
            unique_id: unique_id(&data_point.unique_id()),
            data_point,
            platform,
            static_attributes,
            translations: OnceLock::new(),
            subscriptions: Subscriptions::default(),
            seen_valid: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn data_point(&self) -> &Arc<P> {
        &self.data_point
    }

    /// Whether the data point has been valid since the entity was added.
    pub fn has_been_valid(&self) -> bool {
        if self.data_point.is_valid() {
            self.seen_valid.store(true, Ordering::SeqCst);
        }
        self.seen_valid.load(Ordering::SeqCst)
    }

    /// Parameter whose title-cased form may be replaced by a translation.
    fn name_parameter(&self) -> Option<String> {
        match self.data_point.origin() {
            Origin::Generic { parameter, .. } => Some(parameter),
            Origin::Custom { parameter_name } => parameter_name,
        }
    }

    /// Only readable parameters and composed data points report a value state.
    fn value_state(&self) -> Option<ValueState> {
        match self.data_point.origin() {
            Origin::Generic {
                readable: false, ..
            } => None,
            _ => Some(ValueState::of(self.data_point.as_ref())),
        }
    }

    fn attributes(&self) -> Attributes {
        let mut attributes = self.static_attributes.clone();
        if let Some(state) = self.value_state() {
            attributes.insert(ATTR_VALUE_STATE.into(), state.into());
        }
        attributes
    }

    fn translated_name(&self) -> Option<String> {
        let mut name = self.data_point.name()?;
        if let Some(parameter) = self.name_parameter() {
            let translated = self
                .translations
                .get()
                .and_then(|translations| translations.name(self.platform, &parameter));
            if let Some(translated) = translated {
                name = name.replace(&title_case(&parameter), &translated);
            }
        }
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    async fn register(&self, ctx: &EntityContext) -> Result<(), EntityError> {
        let _ = self.translations.set(ctx.translations.clone());
        let notifier = Notifier::new(ctx, &self.unique_id);

        let data_point = Arc::downgrade(&self.data_point);
        let on_update = notifier.clone();
        let seen_valid = self.seen_valid.clone();
        let updated: UpdatedCallback = Arc::new(move |_| {
            let Some(data_point) = data_point.upgrade() else {
                return;
            };
            if data_point.is_valid() {
                seen_valid.store(true, Ordering::SeqCst);
            }
            let kind = if data_point.refreshed_at() == data_point.modified_at() {
                "updated"
            } else {
                "refreshed"
            };
            if on_update.refresh() {
                debug!("Data point {} {}", data_point.full_name(), kind);
            } else {
                debug!(
                    "Skipping {} event of {}, entity is disabled",
                    kind,
                    data_point.full_name()
                );
            }
        });
        let removed: RemovedCallback = Arc::new(move || notifier.remove(RemovalScope::Device));

        self.subscriptions
            .push(self.data_point.subscribe_updated(updated));
        self.subscriptions
            .push(self.data_point.subscribe_device_removed(removed));

        self.data_point.load_value(CallSource::HostInit).await?;
        if !self.has_been_valid() && self.value_state().is_some() {
            debug!(
                "Hub did not provide initial value for {}",
                self.data_point.full_name()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl<P: ChannelDataPoint + ?Sized + 'static> EntityCore for GenericEntity<P> {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> Option<String> {
        self.translated_name()
    }

    fn available(&self) -> bool {
        self.data_point.available()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(device_info(&self.data_point.device()))
    }

    fn enabled_default(&self) -> bool {
        self.data_point.enabled_default()
    }

    fn extra_state_attributes(&self) -> Attributes {
        self.attributes()
    }

    async fn added(&self, ctx: EntityContext) -> Result<(), EntityError> {
        self.register(&ctx).await
    }

    async fn will_remove(&self) {
        self.subscriptions.cancel_all();
    }

    async fn update(&self) -> Result<(), EntityError> {
        self.data_point
            .load_value(CallSource::ManualOrScheduled)
            .await?;
        Ok(())
    }
}

/// What a restore entity falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreKind {
    /// The host state string
    State,
    /// The native value (sensors, numbers)
    NativeValue,
}

/// Generic entity that shows the last known state while its data point has
/// no valid value.
pub struct RestoreEntity<P: ?Sized> {
    inner: GenericEntity<P>,
    kind: RestoreKind,
    restored: Mutex<Option<RestoredState>>,
}

impl<P: ChannelDataPoint + ?Sized + 'static> RestoreEntity<P> {
    pub fn new(data_point: Arc<P>, platform: Platform) -> Self {
        Self::with_kind(data_point, platform, RestoreKind::State)
    }

    pub fn with_kind(data_point: Arc<P>, platform: Platform, kind: RestoreKind) -> Self {
        Self {
            inner: GenericEntity::new(data_point, platform),
            kind,
            restored: Mutex::new(None),
        }
    }

    /// The restored state while the data point is invalid. Dropped for good
    /// as soon as the data point reports a valid value.
    pub fn restored(&self) -> Option<RestoredState> {
        let mut restored = self.restored.lock().unwrap_or_else(PoisonError::into_inner);
        if self.inner.has_been_valid() {
            *restored = None;
            return None;
        }
        restored.clone()
    }

    /// Restored host state, unless it was unknown or unavailable.
    pub fn restored_state(&self) -> Option<String> {
        self.restored()?.known_state().map(str::to_string)
    }

    pub fn restored_native_value(&self) -> Option<Value> {
        self.restored()?.native_value.filter(|value| !value.is_null())
    }

    pub fn restored_attribute(&self, key: &str) -> Option<Value> {
        self.restored()?.attribute(key).cloned()
    }

    pub fn is_restored(&self) -> bool {
        match self.kind {
            RestoreKind::State => self.restored().is_some(),
            RestoreKind::NativeValue => self.restored_native_value().is_some(),
        }
    }
}

impl<P: ?Sized> Deref for RestoreEntity<P> {
    type Target = GenericEntity<P>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[async_trait]
impl<P: ChannelDataPoint + ?Sized + 'static> EntityCore for RestoreEntity<P> {
    fn unique_id(&self) -> &str {
        self.inner.unique_id()
    }

    fn name(&self) -> Option<String> {
        self.inner.name()
    }

    fn available(&self) -> bool {
        self.inner.available()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        self.inner.device_info()
    }

    fn enabled_default(&self) -> bool {
        self.inner.enabled_default()
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.inner.attributes();
        if self.is_restored() {
            attributes.insert(ATTR_VALUE_STATE.into(), ValueState::Restored.into());
        }
        attributes
    }

    async fn added(&self, ctx: EntityContext) -> Result<(), EntityError> {
        let restored = ctx.restored.clone();
        let result = self.inner.register(&ctx).await;
        *self.restored.lock().unwrap_or_else(PoisonError::into_inner) = restored;
        result
    }

    async fn will_remove(&self) {
        self.inner.will_remove().await
    }

    async fn update(&self) -> Result<(), EntityError> {
        self.inner.update().await
    }
}

/// Entity wrapping a system variable or program of the central.
pub struct HubEntity<P: ?Sized> {
    data_point: Arc<P>,
    unique_id: String,
    device_info: DeviceInfo,
    value_state: bool,
    subscriptions: Subscriptions,
}

impl<P: HubDataPoint + ?Sized + 'static> HubEntity<P> {
    /// Programs only expose their CCU name.
    pub fn program(data_point: Arc<P>, central: DeviceInfo) -> Self {
        Self::new(data_point, central, false)
    }

    /// System variables also expose their value state.
    pub fn sysvar(data_point: Arc<P>, central: DeviceInfo) -> Self {
        Self::new(data_point, central, true)
    }

    fn new(data_point: Arc<P>, central: DeviceInfo, value_state: bool) -> Self {
        debug!(
            "Wrapping hub data point {}",
            data_point.name().unwrap_or_default()
        );
        Self {
            unique_id: unique_id(&data_point.unique_id()),
            data_point,
            device_info: central,
            value_state,
            subscriptions: Subscriptions::default(),
        }
    }

    pub fn data_point(&self) -> &Arc<P> {
        &self.data_point
    }
}

#[async_trait]
impl<P: HubDataPoint + ?Sized + 'static> EntityCore for HubEntity<P> {
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
        Some(self.device_info.clone())
    }

    fn enabled_default(&self) -> bool {
        false
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(ATTR_NAME.into(), self.data_point.ccu_name().into());
        if self.value_state {
            attributes.insert(
                ATTR_VALUE_STATE.into(),
                ValueState::of(self.data_point.as_ref()).into(),
            );
        }
        attributes
    }

    async fn added(&self, ctx: EntityContext) -> Result<(), EntityError> {
        let notifier = Notifier::new(&ctx, &self.unique_id);

        let data_point = Arc::downgrade(&self.data_point);
        let on_update = notifier.clone();
        let updated: UpdatedCallback = Arc::new(move |_| {
            let name = data_point
                .upgrade()
                .and_then(|dp| dp.name())
                .unwrap_or_default();
            if on_update.refresh() {
                debug!("Hub data point {} changed", name);
            } else {
                debug!("Skipping change of hub data point {}, entity is disabled", name);
            }
        });
        let removed: RemovedCallback = Arc::new(move || notifier.remove(RemovalScope::Entity));

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
        Ok(())
    }
}
