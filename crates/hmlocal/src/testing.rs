//! Test doubles for the device library.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;

use async_trait::async_trait;
use serde_json::Value;

use crate::Subscription;
use crate::engine::DeviceInfo;
use crate::engine::Engine;
use crate::engine::EntityContext;
use crate::hub::BinarySensorDataPoint;
use crate::hub::ButtonDataPoint;
use crate::hub::CallCollector;
use crate::hub::CallSource;
use crate::hub::ChannelDataPoint;
use crate::hub::ControlUnit;
use crate::hub::CoverDataPoint;
use crate::hub::CoverType;
use crate::hub::DataPoint;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::DataPointUpdate;
use crate::hub::DeviceDescription;
use crate::hub::EventDataPoint;
use crate::hub::HubDataPoint;
use crate::hub::LibraryError;
use crate::hub::LockDataPoint;
use crate::hub::NumberDataPoint;
use crate::hub::Origin;
use crate::hub::ParameterType;
use crate::hub::ProgramDataPoint;
use crate::hub::RemovedCallback;
use crate::hub::SelectDataPoint;
use crate::hub::SensorDataPoint;
use crate::hub::SirenDataPoint;
use crate::hub::SirenOnArgs;
use crate::hub::SwitchDataPoint;
use crate::hub::SysvarDataPoint;
use crate::hub::SysvarType;
use crate::hub::TextDataPoint;
use crate::hub::UpdateDataPoint;
use crate::hub::UpdatedCallback;
use crate::platforms::DOMAIN;
use crate::platforms::generic_entity::title_case;

pub const CENTRAL_NAME: &str = "ccu-dev";

/// Context for adding an entity by hand, restoring the state cached under `restore_key`.
pub fn context(engine: &Engine, restore_key: &str) -> EntityContext {
    EntityContext {
        sender: engine.sender(),
        enabled: Arc::new(AtomicBool::new(true)),
        restored: engine.restore_cache().get(restore_key),
        translations: engine.translations().clone(),
    }
}

/// Everything a mock data point reports. Tests change it through [`MockDataPoint::set`].
#[derive(Debug, Clone)]
pub struct MockState {
    pub name: Option<String>,
    pub available: bool,
    pub valid: bool,
    pub uncertain: bool,
    pub enabled_default: bool,
    /// `None` makes the data point a composed (custom) one
    pub parameter: Option<String>,
    pub parameter_name: Option<String>,
    pub function: Option<String>,
    pub readable: bool,
    pub modified_at: Option<SystemTime>,
    pub refreshed_at: Option<SystemTime>,

    pub flag: Option<bool>,
    pub default_flag: Option<bool>,
    pub channel_flag: Option<bool>,
    pub number: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub multiplier: f64,
    pub parameter_type: ParameterType,
    pub unit: Option<String>,
    pub text: Option<String>,
    pub json: Option<Value>,
    pub values: Vec<String>,

    pub cover_type: CoverType,
    pub position: Option<u8>,
    pub tilt_position: Option<u8>,
    pub closed: Option<bool>,
    pub opening: Option<bool>,
    pub closing: Option<bool>,

    pub locked: Option<bool>,
    pub locking: Option<bool>,
    pub unlocking: Option<bool>,
    pub jammed: Option<bool>,
    pub supports_open: bool,

    pub supports_tones: bool,
    pub supports_duration: bool,
    pub tones: Option<Vec<String>>,
    pub lights: Option<Vec<String>>,

    pub firmware: Option<String>,
    pub latest_firmware: Option<String>,
    pub in_progress: bool,
    pub firmware_update_state: String,

    pub sysvar_type: SysvarType,
    pub ccu_name: String,
    pub sysvar_min: Option<f64>,
    pub sysvar_max: Option<f64>,

    pub event_type: String,
    pub channel_name: Option<String>,
    pub device_available: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            name: None,
            available: true,
            valid: false,
            uncertain: false,
            enabled_default: true,
            parameter: None,
            parameter_name: None,
            function: None,
            readable: true,
            modified_at: None,
            refreshed_at: None,
            flag: None,
            default_flag: None,
            channel_flag: None,
            number: None,
            min: 0.0,
            max: 100.0,
            multiplier: 1.0,
            parameter_type: ParameterType::Float,
            unit: None,
            text: None,
            json: None,
            values: Vec::new(),
            cover_type: CoverType::Shutter,
            position: None,
            tilt_position: None,
            closed: None,
            opening: None,
            closing: None,
            locked: None,
            locking: None,
            unlocking: None,
            jammed: None,
            supports_open: false,
            supports_tones: false,
            supports_duration: false,
            tones: None,
            lights: None,
            firmware: None,
            latest_firmware: None,
            in_progress: false,
            firmware_update_state: "UP_TO_DATE".to_string(),
            sysvar_type: SysvarType::Logic,
            ccu_name: String::new(),
            sysvar_min: None,
            sysvar_max: None,
            event_type: "homematic.keypress".to_string(),
            channel_name: None,
            device_available: true,
        }
    }
}

type Callbacks<C> = Arc<Mutex<Vec<(u64, C)>>>;

/// A data point that implements every capability, records the calls made on
/// it and lets tests fire library callbacks.
pub struct MockDataPoint {
    unique_id: String,
    channel_address: String,
    device: DeviceDescription,
    state: Mutex<MockState>,
    calls: Arc<Mutex<Vec<String>>>,
    failure: Mutex<Option<LibraryError>>,
    next_id: AtomicU64,
    updated: Callbacks<UpdatedCallback>,
    removed: Callbacks<RemovedCallback>,
}

impl MockDataPoint {
    fn new(unique_id: String, channel_address: &str, state: MockState) -> Arc<Self> {
        let device_address = channel_address
            .split(':')
            .next()
            .unwrap_or(channel_address)
            .to_string();
        Arc::new(Self {
            unique_id,
            channel_address: channel_address.to_string(),
            device: DeviceDescription {
                identifier: device_address.clone(),
                address: device_address.clone(),
                interface_id: "hmip-rf".to_string(),
                manufacturer: "eQ-3".to_string(),
                model: "HmIP-TEST".to_string(),
                name: format!("Device {}", device_address),
                firmware: Some("1.0.0".to_string()),
                room: Some("Living Room".to_string()),
                central_name: CENTRAL_NAME.to_string(),
            },
            state: Mutex::new(state),
            calls: Arc::new(Mutex::new(Vec::new())),
            failure: Mutex::new(None),
            next_id: AtomicU64::new(0),
            updated: Arc::default(),
            removed: Arc::default(),
        })
    }

    fn channel_id(channel_address: &str) -> String {
        channel_address.to_lowercase().replace(':', "_")
    }

    /// Data point backed by a single parameter.
    pub fn generic(channel_address: &str, parameter: &str) -> Arc<Self> {
        let state = MockState {
            name: Some(title_case(parameter)),
            parameter: Some(parameter.to_string()),
            ..MockState::default()
        };
        Self::new(
            format!(
                "{}_{}",
                Self::channel_id(channel_address),
                parameter.to_lowercase()
            ),
            channel_address,
            state,
        )
    }

    /// Composed data point, e.g. a cover or a lock.
    pub fn custom(channel_address: &str, kind: &str) -> Arc<Self> {
        let state = MockState {
            name: Some(format!("Device {}", kind)),
            ..MockState::default()
        };
        Self::new(
            format!("{}_{}", Self::channel_id(channel_address), kind),
            channel_address,
            state,
        )
    }

    pub fn sysvar(id: &str, ccu_name: &str) -> Arc<Self> {
        let state = MockState {
            name: Some(ccu_name.to_string()),
            ccu_name: ccu_name.to_string(),
            ..MockState::default()
        };
        Self::new(format!("{}_{}", CENTRAL_NAME, id), CENTRAL_NAME, state)
    }

    pub fn event(channel_address: &str, parameter: &str) -> Arc<Self> {
        let state = MockState {
            parameter: Some(parameter.to_string()),
            channel_name: Some(format!("Channel {}", channel_address)),
            ..MockState::default()
        };
        Self::new(
            format!(
                "{}_{}",
                Self::channel_id(channel_address),
                parameter.to_lowercase()
            ),
            channel_address,
            state,
        )
    }

    pub fn set(&self, change: impl FnOnce(&mut MockState)) {
        change(&mut self.state.lock().unwrap());
    }

    fn get<T>(&self, read: impl FnOnce(&MockState) -> T) -> T {
        read(&self.state.lock().unwrap())
    }

    /// Every following call fails with `error`.
    pub fn fail_with(&self, error: LibraryError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of registered (updated, removed) callbacks.
    pub fn subscriber_count(&self) -> (usize, usize) {
        (
            self.updated.lock().unwrap().len(),
            self.removed.lock().unwrap().len(),
        )
    }

    pub fn fire_updated(&self, parameter: Option<&str>) {
        let update = DataPointUpdate {
            parameter: parameter.map(str::to_string),
        };
        let callbacks: Vec<UpdatedCallback> = self
            .updated
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(&update);
        }
    }

    pub fn fire_removed(&self) {
        let callbacks: Vec<RemovedCallback> = self
            .removed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    fn call(&self, call: String) -> Result<(), LibraryError> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn subscribe<C: Send + 'static>(&self, callbacks: &Callbacks<C>, callback: C) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        callbacks.lock().unwrap().push((id, callback));
        let callbacks = callbacks.clone();
        Subscription::new(move || callbacks.lock().unwrap().retain(|(cb_id, _)| *cb_id != id))
    }
}

impl DataPoint for MockDataPoint {
    fn unique_id(&self) -> String {
        self.unique_id.clone()
    }

    fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.device.name,
            self.get(|s| s.name.clone()).unwrap_or_default()
        )
    }

    fn name(&self) -> Option<String> {
        self.get(|s| s.name.clone())
    }

    fn available(&self) -> bool {
        self.get(|s| s.available)
    }

    fn is_valid(&self) -> bool {
        self.get(|s| s.valid)
    }

    fn state_uncertain(&self) -> bool {
        self.get(|s| s.uncertain)
    }

    fn enabled_default(&self) -> bool {
        self.get(|s| s.enabled_default)
    }

    fn modified_at(&self) -> Option<SystemTime> {
        self.get(|s| s.modified_at)
    }

    fn refreshed_at(&self) -> Option<SystemTime> {
        self.get(|s| s.refreshed_at)
    }

    fn subscribe_updated(&self, callback: UpdatedCallback) -> Subscription {
        self.subscribe(&self.updated, callback)
    }

    fn subscribe_device_removed(&self, callback: RemovedCallback) -> Subscription {
        self.subscribe(&self.removed, callback)
    }
}

#[async_trait]
impl ChannelDataPoint for MockDataPoint {
    fn device(&self) -> DeviceDescription {
        self.device.clone()
    }

    fn channel_address(&self) -> String {
        self.channel_address.clone()
    }

    fn origin(&self) -> Origin {
        self.get(|s| match &s.parameter {
            Some(parameter) => Origin::Generic {
                parameter: parameter.clone(),
                function: s.function.clone(),
                readable: s.readable,
            },
            None => Origin::Custom {
                parameter_name: s.parameter_name.clone(),
            },
        })
    }

    async fn load_value(&self, source: CallSource) -> Result<(), LibraryError> {
        self.call(format!("load_value({:?})", source))
    }
}

impl HubDataPoint for MockDataPoint {
    fn ccu_name(&self) -> String {
        self.get(|s| s.ccu_name.clone())
    }
}

impl BinarySensorDataPoint for MockDataPoint {
    fn value(&self) -> Option<bool> {
        self.get(|s| s.flag)
    }

    fn default_value(&self) -> Option<bool> {
        self.get(|s| s.default_flag)
    }
}

#[async_trait]
impl ButtonDataPoint for MockDataPoint {
    async fn press(&self) -> Result<(), LibraryError> {
        self.call("press".to_string())
    }
}

/// Collector that records its send on the data point's call log.
pub struct MockCollector {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CallCollector for MockCollector {
    async fn send_data(&self, wait_for_callback: Option<u32>) -> Result<(), LibraryError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("send_data({:?})", wait_for_callback));
        Ok(())
    }
}

#[async_trait]
impl CoverDataPoint for MockDataPoint {
    fn cover_type(&self) -> CoverType {
        self.get(|s| s.cover_type.clone())
    }

    fn current_position(&self) -> Option<u8> {
        self.get(|s| s.position)
    }

    fn current_tilt_position(&self) -> Option<u8> {
        self.get(|s| s.tilt_position)
    }

    fn is_closed(&self) -> Option<bool> {
        self.get(|s| s.closed)
    }

    fn is_opening(&self) -> Option<bool> {
        self.get(|s| s.opening)
    }

    fn is_closing(&self) -> Option<bool> {
        self.get(|s| s.closing)
    }

    fn call_collector(&self) -> Box<dyn CallCollector> {
        Box::new(MockCollector {
            calls: self.calls.clone(),
        })
    }

    async fn set_position(
        &self,
        position: Option<u8>,
        tilt_position: Option<u8>,
        collector: Option<&dyn CallCollector>,
    ) -> Result<(), LibraryError> {
        self.call(format!(
            "set_position({:?}, {:?}, collected={})",
            position,
            tilt_position,
            collector.is_some()
        ))
    }

    async fn open(&self) -> Result<(), LibraryError> {
        self.call("open".to_string())
    }

    async fn close(&self) -> Result<(), LibraryError> {
        self.call("close".to_string())
    }

    async fn stop(&self) -> Result<(), LibraryError> {
        self.call("stop".to_string())
    }

    async fn open_tilt(&self) -> Result<(), LibraryError> {
        self.call("open_tilt".to_string())
    }

    async fn close_tilt(&self) -> Result<(), LibraryError> {
        self.call("close_tilt".to_string())
    }

    async fn stop_tilt(&self) -> Result<(), LibraryError> {
        self.call("stop_tilt".to_string())
    }
}

impl EventDataPoint for MockDataPoint {
    fn device(&self) -> DeviceDescription {
        self.device.clone()
    }

    fn device_available(&self) -> bool {
        self.get(|s| s.device_available)
    }

    fn channel_address(&self) -> String {
        self.channel_address.clone()
    }

    fn channel_unique_id(&self) -> String {
        Self::channel_id(&self.channel_address)
    }

    fn channel_name(&self) -> Option<String> {
        self.get(|s| s.channel_name.clone())
    }

    fn parameter(&self) -> String {
        self.get(|s| s.parameter.clone()).unwrap_or_default()
    }

    fn event_type(&self) -> String {
        self.get(|s| s.event_type.clone())
    }
}

#[async_trait]
impl LockDataPoint for MockDataPoint {
    fn is_locked(&self) -> Option<bool> {
        self.get(|s| s.locked)
    }

    fn is_locking(&self) -> Option<bool> {
        self.get(|s| s.locking)
    }

    fn is_unlocking(&self) -> Option<bool> {
        self.get(|s| s.unlocking)
    }

    fn is_jammed(&self) -> Option<bool> {
        self.get(|s| s.jammed)
    }

    fn supports_open(&self) -> bool {
        self.get(|s| s.supports_open)
    }

    async fn lock(&self) -> Result<(), LibraryError> {
        self.call("lock".to_string())
    }

    async fn unlock(&self) -> Result<(), LibraryError> {
        self.call("unlock".to_string())
    }

    async fn open(&self) -> Result<(), LibraryError> {
        self.call("open".to_string())
    }
}

#[async_trait]
impl NumberDataPoint for MockDataPoint {
    fn value(&self) -> Option<f64> {
        self.get(|s| s.number)
    }

    fn min(&self) -> f64 {
        self.get(|s| s.min)
    }

    fn max(&self) -> f64 {
        self.get(|s| s.max)
    }

    fn multiplier(&self) -> f64 {
        self.get(|s| s.multiplier)
    }

    fn parameter_type(&self) -> ParameterType {
        self.get(|s| s.parameter_type)
    }

    fn unit(&self) -> Option<String> {
        self.get(|s| s.unit.clone())
    }

    async fn send_value(&self, value: f64) -> Result<(), LibraryError> {
        self.call(format!("send_value({})", value))
    }
}

#[async_trait]
impl SelectDataPoint for MockDataPoint {
    fn value(&self) -> Option<String> {
        self.get(|s| s.text.clone())
    }

    fn values(&self) -> Vec<String> {
        self.get(|s| s.values.clone())
    }

    async fn send_value(&self, value: String) -> Result<(), LibraryError> {
        self.call(format!("send_value({})", value))
    }
}

impl SensorDataPoint for MockDataPoint {
    fn value(&self) -> Option<Value> {
        self.get(|s| s.json.clone())
    }

    fn parameter_type(&self) -> ParameterType {
        self.get(|s| s.parameter_type)
    }

    fn multiplier(&self) -> f64 {
        self.get(|s| s.multiplier)
    }

    fn unit(&self) -> Option<String> {
        self.get(|s| s.unit.clone())
    }

    fn values(&self) -> Vec<String> {
        self.get(|s| s.values.clone())
    }
}

#[async_trait]
impl SirenDataPoint for MockDataPoint {
    fn is_on(&self) -> Option<bool> {
        self.get(|s| s.flag)
    }

    fn supports_tones(&self) -> bool {
        self.get(|s| s.supports_tones)
    }

    fn supports_duration(&self) -> bool {
        self.get(|s| s.supports_duration)
    }

    fn available_tones(&self) -> Option<Vec<String>> {
        self.get(|s| s.tones.clone())
    }

    fn available_lights(&self) -> Option<Vec<String>> {
        self.get(|s| s.lights.clone())
    }

    async fn turn_on(&self, args: SirenOnArgs) -> Result<(), LibraryError> {
        self.call(format!(
            "turn_on({:?}, {:?}, {:?})",
            args.acoustic_alarm, args.optical_alarm, args.duration
        ))
    }

    async fn turn_off(&self) -> Result<(), LibraryError> {
        self.call("turn_off".to_string())
    }
}

#[async_trait]
impl SwitchDataPoint for MockDataPoint {
    fn value(&self) -> Option<bool> {
        self.get(|s| s.flag)
    }

    fn channel_value(&self) -> Option<bool> {
        self.get(|s| s.channel_flag)
    }

    async fn turn_on(&self) -> Result<(), LibraryError> {
        self.call("turn_on".to_string())
    }

    async fn turn_off(&self) -> Result<(), LibraryError> {
        self.call("turn_off".to_string())
    }

    async fn set_on_time(&self, on_time: f64) -> Result<(), LibraryError> {
        self.call(format!("set_on_time({})", on_time))
    }
}

#[async_trait]
impl TextDataPoint for MockDataPoint {
    fn value(&self) -> Option<String> {
        self.get(|s| s.text.clone())
    }

    async fn send_value(&self, value: String) -> Result<(), LibraryError> {
        self.call(format!("send_value({})", value))
    }
}

#[async_trait]
impl UpdateDataPoint for MockDataPoint {
    fn device(&self) -> DeviceDescription {
        self.device.clone()
    }

    fn firmware(&self) -> Option<String> {
        self.get(|s| s.firmware.clone())
    }

    fn latest_firmware(&self) -> Option<String> {
        self.get(|s| s.latest_firmware.clone())
    }

    fn in_progress(&self) -> bool {
        self.get(|s| s.in_progress)
    }

    fn firmware_update_state(&self) -> String {
        self.get(|s| s.firmware_update_state.clone())
    }

    async fn update_firmware(&self, refresh_after: &[u64]) -> Result<bool, LibraryError> {
        self.call(format!("update_firmware({:?})", refresh_after))?;
        Ok(true)
    }

    async fn refresh_firmware_data(&self) -> Result<(), LibraryError> {
        self.call("refresh_firmware_data".to_string())
    }
}

#[async_trait]
impl SysvarDataPoint for MockDataPoint {
    fn value(&self) -> Option<Value> {
        self.get(|s| s.json.clone())
    }

    fn data_type(&self) -> SysvarType {
        self.get(|s| s.sysvar_type)
    }

    fn values(&self) -> Vec<String> {
        self.get(|s| s.values.clone())
    }

    fn unit(&self) -> Option<String> {
        self.get(|s| s.unit.clone())
    }

    fn min(&self) -> Option<f64> {
        self.get(|s| s.sysvar_min)
    }

    fn max(&self) -> Option<f64> {
        self.get(|s| s.sysvar_max)
    }

    async fn send_variable(&self, value: Value) -> Result<(), LibraryError> {
        self.call(format!("send_variable({})", value))
    }
}

#[async_trait]
impl ProgramDataPoint for MockDataPoint {
    async fn press(&self) -> Result<(), LibraryError> {
        self.call("press".to_string())
    }
}

/// Control unit that hands out whatever tests queued and records path events.
pub struct MockControlUnit {
    entry_id: String,
    pending: Mutex<HashMap<DataPointCategory, Vec<DataPointHandle>>>,
    path_events: Mutex<Vec<(String, Value)>>,
}

impl MockControlUnit {
    pub fn new(entry_id: &str) -> Arc<Self> {
        Arc::new(Self {
            entry_id: entry_id.to_string(),
            pending: Mutex::new(HashMap::new()),
            path_events: Mutex::new(Vec::new()),
        })
    }

    /// Queue a data point for the next drain of its category.
    pub fn push(&self, handle: DataPointHandle) {
        self.pending
            .lock()
            .unwrap()
            .entry(handle.category())
            .or_default()
            .push(handle);
    }

    pub fn path_events(&self) -> Vec<(String, Value)> {
        self.path_events.lock().unwrap().clone()
    }

    fn take(&self, category: DataPointCategory) -> Vec<DataPointHandle> {
        self.pending
            .lock()
            .unwrap()
            .remove(&category)
            .unwrap_or_default()
    }
}

impl ControlUnit for MockControlUnit {
    fn entry_id(&self) -> &str {
        &self.entry_id
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: vec![(DOMAIN.to_string(), CENTRAL_NAME.to_string())],
            manufacturer: Some("eQ-3".to_string()),
            model: Some("CCU".to_string()),
            name: Some(CENTRAL_NAME.to_string()),
            ..DeviceInfo::default()
        }
    }

    fn new_data_points(&self, category: DataPointCategory) -> Vec<DataPointHandle> {
        if category.is_hub() {
            return Vec::new();
        }
        self.take(category)
    }

    fn new_hub_data_points(&self, category: DataPointCategory) -> Vec<DataPointHandle> {
        if !category.is_hub() {
            return Vec::new();
        }
        self.take(category)
    }

    fn data_point_path_event(&self, state_path: &str, value: Value) {
        self.path_events
            .lock()
            .unwrap()
            .push((state_path.to_string(), value));
    }
}
