//! One trait per data point category.

use async_trait::async_trait;

use super::data_point::ChannelDataPoint;
use super::data_point::DataPoint;
use super::data_point::DeviceDescription;
use super::data_point::HubDataPoint;
use super::data_point::LibraryError;
use super::data_point::ParameterType;

pub trait BinarySensorDataPoint: ChannelDataPoint {
    fn value(&self) -> Option<bool>;

    /// Value the parameter description declares as default.
    fn default_value(&self) -> Option<bool>;
}

#[async_trait]
pub trait ButtonDataPoint: ChannelDataPoint {
    async fn press(&self) -> Result<(), LibraryError>;
}

/// Cover family as reported by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverType {
    Shutter,
    Blind,
    /// HmIP blind actuator; behaves as a shutter in `SHUTTER` operation mode.
    IpBlind {
        operation_mode: Option<String>,
    },
    Garage,
}

/// Collects parameter writes so they reach the hub in a single call.
#[async_trait]
pub trait CallCollector: Send + Sync {
    async fn send_data(&self, wait_for_callback: Option<u32>) -> Result<(), LibraryError>;
}

#[async_trait]
pub trait CoverDataPoint: ChannelDataPoint {
    fn cover_type(&self) -> CoverType;

    fn current_position(&self) -> Option<u8>;

    fn current_tilt_position(&self) -> Option<u8>;

    fn is_closed(&self) -> Option<bool>;

    fn is_opening(&self) -> Option<bool>;

    fn is_closing(&self) -> Option<bool>;

    fn call_collector(&self) -> Box<dyn CallCollector>;

    /// Without a collector the write is sent immediately.
    async fn set_position(
        &self,
        position: Option<u8>,
        tilt_position: Option<u8>,
        collector: Option<&dyn CallCollector>,
    ) -> Result<(), LibraryError>;

    async fn open(&self) -> Result<(), LibraryError>;

    async fn close(&self) -> Result<(), LibraryError>;

    async fn stop(&self) -> Result<(), LibraryError>;

    async fn open_tilt(&self) -> Result<(), LibraryError>;

    async fn close_tilt(&self) -> Result<(), LibraryError>;

    async fn stop_tilt(&self) -> Result<(), LibraryError>;
}

/// A single event parameter of a device channel (key press, motion, ...).
pub trait EventDataPoint: DataPoint {
    fn device(&self) -> DeviceDescription;

    fn device_available(&self) -> bool;

    fn channel_address(&self) -> String;

    fn channel_unique_id(&self) -> String;

    fn channel_name(&self) -> Option<String>;

    fn parameter(&self) -> String;

    /// Library event type, e.g. `homematic.keypress`.
    fn event_type(&self) -> String;
}

#[async_trait]
pub trait LockDataPoint: ChannelDataPoint {
    fn is_locked(&self) -> Option<bool>;

    fn is_locking(&self) -> Option<bool>;

    fn is_unlocking(&self) -> Option<bool>;

    fn is_jammed(&self) -> Option<bool>;

    fn supports_open(&self) -> bool;

    async fn lock(&self) -> Result<(), LibraryError>;

    async fn unlock(&self) -> Result<(), LibraryError>;

    async fn open(&self) -> Result<(), LibraryError>;
}

#[async_trait]
pub trait NumberDataPoint: ChannelDataPoint {
    fn value(&self) -> Option<f64>;

    fn min(&self) -> f64;

    fn max(&self) -> f64;

    fn multiplier(&self) -> f64;

    fn parameter_type(&self) -> ParameterType;

    fn unit(&self) -> Option<String>;

    async fn send_value(&self, value: f64) -> Result<(), LibraryError>;
}

#[async_trait]
pub trait SelectDataPoint: ChannelDataPoint {
    fn value(&self) -> Option<String>;

    fn values(&self) -> Vec<String>;

    async fn send_value(&self, value: String) -> Result<(), LibraryError>;
}

pub trait SensorDataPoint: ChannelDataPoint {
    fn value(&self) -> Option<serde_json::Value>;

    fn parameter_type(&self) -> ParameterType;

    fn multiplier(&self) -> f64;

    fn unit(&self) -> Option<String>;

    /// Value list of enum parameters.
    fn values(&self) -> Vec<String>;
}

/// Arguments of a siren activation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SirenOnArgs {
    pub acoustic_alarm: Option<String>,
    pub optical_alarm: Option<String>,
    pub duration: Option<u32>,
}

#[async_trait]
pub trait SirenDataPoint: ChannelDataPoint {
    fn is_on(&self) -> Option<bool>;

    fn supports_tones(&self) -> bool;

    fn supports_duration(&self) -> bool;

    fn available_tones(&self) -> Option<Vec<String>>;

    fn available_lights(&self) -> Option<Vec<String>>;

    async fn turn_on(&self, args: SirenOnArgs) -> Result<(), LibraryError>;

    async fn turn_off(&self) -> Result<(), LibraryError>;
}

#[async_trait]
pub trait SwitchDataPoint: ChannelDataPoint {
    fn value(&self) -> Option<bool>;

    /// State of the underlying channel, only known for composed switches.
    fn channel_value(&self) -> Option<bool>;

    async fn turn_on(&self) -> Result<(), LibraryError>;

    async fn turn_off(&self) -> Result<(), LibraryError>;

    async fn set_on_time(&self, on_time: f64) -> Result<(), LibraryError>;
}

#[async_trait]
pub trait TextDataPoint: ChannelDataPoint {
    fn value(&self) -> Option<String>;

    async fn send_value(&self, value: String) -> Result<(), LibraryError>;
}

/// Firmware state of a device.
#[async_trait]
pub trait UpdateDataPoint: DataPoint {
    fn device(&self) -> DeviceDescription;

    fn firmware(&self) -> Option<String>;

    fn latest_firmware(&self) -> Option<String>;

    fn in_progress(&self) -> bool;

    fn firmware_update_state(&self) -> String;

    /// Seconds after which the library re-reads the firmware state.
    async fn update_firmware(&self, refresh_after: &[u64]) -> Result<bool, LibraryError>;

    async fn refresh_firmware_data(&self) -> Result<(), LibraryError>;
}

/// Data type of a CCU system variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SysvarType {
    Alarm,
    Float,
    Integer,
    List,
    #[default]
    Logic,
    String,
}

#[async_trait]
pub trait SysvarDataPoint: HubDataPoint {
    fn value(&self) -> Option<serde_json::Value>;

    fn data_type(&self) -> SysvarType;

    fn values(&self) -> Vec<String>;

    fn unit(&self) -> Option<String>;

    fn min(&self) -> Option<f64>;

    fn max(&self) -> Option<f64>;

    async fn send_variable(&self, value: serde_json::Value) -> Result<(), LibraryError>;
}

#[async_trait]
pub trait ProgramDataPoint: HubDataPoint {
    async fn press(&self) -> Result<(), LibraryError>;
}
