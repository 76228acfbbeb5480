use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::Subscription;

/// Called whenever the library refreshes or modifies a data point.
pub type UpdatedCallback = Arc<dyn Fn(&DataPointUpdate) + Send + Sync>;

/// Called once when the device owning a data point is removed from the hub.
pub type RemovedCallback = Arc<dyn Fn() + Send + Sync>;

/// Details passed along with an update notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPointUpdate {
    /// Parameter that triggered the update, set for channel events.
    pub parameter: Option<String>,
}

/// Who asked the library to load a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSource {
    HostInit,
    ManualOrScheduled,
}

/// Failure reported by the device library. Passed through unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LibraryError {
    #[error("device {0} is not available")]
    Unavailable(String),

    #[error("hub rejected the call: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

/// Device metadata as reported by the library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceDescription {
    pub identifier: String,
    pub address: String,
    pub interface_id: String,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub firmware: Option<String>,
    pub room: Option<String>,
    /// Name of the central unit the device is attached to
    pub central_name: String,
}

/// Type of the parameter backing a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterType {
    Action,
    Bool,
    Enum,
    #[default]
    Float,
    Integer,
    String,
}

impl ParameterType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ParameterType::Float | ParameterType::Integer)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, ParameterType::Enum | ParameterType::String)
    }
}

/// How a channel data point was derived.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    /// Backed directly by a single device parameter.
    Generic {
        parameter: String,
        function: Option<String>,
        readable: bool,
    },
    /// Composed from several parameters by the library.
    Custom { parameter_name: Option<String> },
}

/// Base contract shared by every data point.
pub trait DataPoint: Send + Sync {
    fn unique_id(&self) -> String;

    /// Name including device and channel, used for logging.
    fn full_name(&self) -> String;

    fn name(&self) -> Option<String>;

    fn available(&self) -> bool;

    /// Whether the current value was received from the hub.
    fn is_valid(&self) -> bool;

    fn state_uncertain(&self) -> bool;

    fn enabled_default(&self) -> bool {
        true
    }

    fn modified_at(&self) -> Option<SystemTime>;

    fn refreshed_at(&self) -> Option<SystemTime>;

    fn subscribe_updated(&self, callback: UpdatedCallback) -> Subscription;

    fn subscribe_device_removed(&self, callback: RemovedCallback) -> Subscription;
}

/// A data point bound to a device channel.
#[async_trait]
pub trait ChannelDataPoint: DataPoint {
    fn device(&self) -> DeviceDescription;

    fn channel_address(&self) -> String;

    fn origin(&self) -> Origin;

    /// Ask the library to (re)load the value from the hub.
    async fn load_value(&self, source: CallSource) -> Result<(), LibraryError>;
}

/// A hub-wide data point (system variable or program).
pub trait HubDataPoint: DataPoint {
    /// Name of the variable or program on the CCU.
    fn ccu_name(&self) -> String;
}
