use std::fmt;
use std::sync::Arc;

use super::capability::BinarySensorDataPoint;
use super::capability::ButtonDataPoint;
use super::capability::CoverDataPoint;
use super::capability::EventDataPoint;
use super::capability::LockDataPoint;
use super::capability::NumberDataPoint;
use super::capability::ProgramDataPoint;
use super::capability::SelectDataPoint;
use super::capability::SensorDataPoint;
use super::capability::SirenDataPoint;
use super::capability::SwitchDataPoint;
use super::capability::SysvarDataPoint;
use super::capability::TextDataPoint;
use super::capability::UpdateDataPoint;
use crate::engine::Platform;

/// Category under which the library announces new data points.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum DataPointCategory {
    BinarySensor,
    Button,
    Cover,
    Event,
    Lock,
    Number,
    Select,
    Sensor,
    Siren,
    Switch,
    Text,
    Update,
    HubBinarySensor,
    HubButton,
    HubNumber,
    HubSelect,
    HubSensor,
    HubSwitch,
    HubText,
}

impl DataPointCategory {
    /// Whether data points of this category are hub-wide rather than bound to a device.
    pub fn is_hub(self) -> bool {
        matches!(
            self,
            Self::HubBinarySensor
                | Self::HubButton
                | Self::HubNumber
                | Self::HubSelect
                | Self::HubSensor
                | Self::HubSwitch
                | Self::HubText
        )
    }

    /// Entity platform that wraps data points of this category.
    pub fn platform(self) -> Platform {
        match self {
            Self::BinarySensor | Self::HubBinarySensor => Platform::BinarySensor,
            Self::Button | Self::HubButton => Platform::Button,
            Self::Cover => Platform::Cover,
            Self::Event => Platform::Event,
            Self::Lock => Platform::Lock,
            Self::Number | Self::HubNumber => Platform::Number,
            Self::Select | Self::HubSelect => Platform::Select,
            Self::Sensor | Self::HubSensor => Platform::Sensor,
            Self::Siren => Platform::Siren,
            Self::Switch | Self::HubSwitch => Platform::Switch,
            Self::Text | Self::HubText => Platform::Text,
            Self::Update => Platform::Update,
        }
    }
}

/// A newly announced data point, tagged with its capability.
#[derive(Clone)]
pub enum DataPointHandle {
    BinarySensor(Arc<dyn BinarySensorDataPoint>),
    Button(Arc<dyn ButtonDataPoint>),
    Cover(Arc<dyn CoverDataPoint>),
    /// All event parameters of one channel.
    Event(Vec<Arc<dyn EventDataPoint>>),
    Lock(Arc<dyn LockDataPoint>),
    Number(Arc<dyn NumberDataPoint>),
    Select(Arc<dyn SelectDataPoint>),
    Sensor(Arc<dyn SensorDataPoint>),
    Siren(Arc<dyn SirenDataPoint>),
    Switch(Arc<dyn SwitchDataPoint>),
    Text(Arc<dyn TextDataPoint>),
    Update(Arc<dyn UpdateDataPoint>),
    HubBinarySensor(Arc<dyn SysvarDataPoint>),
    HubButton(Arc<dyn ProgramDataPoint>),
    HubNumber(Arc<dyn SysvarDataPoint>),
    HubSelect(Arc<dyn SysvarDataPoint>),
    HubSensor(Arc<dyn SysvarDataPoint>),
    HubSwitch(Arc<dyn SysvarDataPoint>),
    HubText(Arc<dyn SysvarDataPoint>),
}

impl DataPointHandle {
    pub fn category(&self) -> DataPointCategory {
        match self {
            Self::BinarySensor(_) => DataPointCategory::BinarySensor,
            Self::Button(_) => DataPointCategory::Button,
            Self::Cover(_) => DataPointCategory::Cover,
            Self::Event(_) => DataPointCategory::Event,
            Self::Lock(_) => DataPointCategory::Lock,
            Self::Number(_) => DataPointCategory::Number,
            Self::Select(_) => DataPointCategory::Select,
            Self::Sensor(_) => DataPointCategory::Sensor,
            Self::Siren(_) => DataPointCategory::Siren,
            Self::Switch(_) => DataPointCategory::Switch,
            Self::Text(_) => DataPointCategory::Text,
            Self::Update(_) => DataPointCategory::Update,
            Self::HubBinarySensor(_) => DataPointCategory::HubBinarySensor,
            Self::HubButton(_) => DataPointCategory::HubButton,
            Self::HubNumber(_) => DataPointCategory::HubNumber,
            Self::HubSelect(_) => DataPointCategory::HubSelect,
            Self::HubSensor(_) => DataPointCategory::HubSensor,
            Self::HubSwitch(_) => DataPointCategory::HubSwitch,
            Self::HubText(_) => DataPointCategory::HubText,
        }
    }

    fn unique_ids(&self) -> Vec<String> {
        match self {
            Self::BinarySensor(dp) => vec![dp.unique_id()],
            Self::Button(dp) => vec![dp.unique_id()],
            Self::Cover(dp) => vec![dp.unique_id()],
            Self::Event(events) => events.iter().map(|e| e.unique_id()).collect(),
            Self::Lock(dp) => vec![dp.unique_id()],
            Self::Number(dp) => vec![dp.unique_id()],
            Self::Select(dp) => vec![dp.unique_id()],
            Self::Sensor(dp) => vec![dp.unique_id()],
            Self::Siren(dp) => vec![dp.unique_id()],
            Self::Switch(dp) => vec![dp.unique_id()],
            Self::Text(dp) => vec![dp.unique_id()],
            Self::Update(dp) => vec![dp.unique_id()],
            Self::HubButton(dp) => vec![dp.unique_id()],
            Self::HubBinarySensor(dp)
            | Self::HubNumber(dp)
            | Self::HubSelect(dp)
            | Self::HubSensor(dp)
            | Self::HubSwitch(dp)
            | Self::HubText(dp) => vec![dp.unique_id()],
        }
    }
}

impl fmt::Debug for DataPointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPointHandle")
            .field("category", &self.category())
            .field("unique_ids", &self.unique_ids())
            .finish()
    }
}
