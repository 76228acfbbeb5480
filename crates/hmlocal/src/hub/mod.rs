//! Contracts of the external device library.
//!
//! The library owns the hub session, device discovery and the data point
//! object graph. This module only describes the surface the adapter talks
//! to: a [`ControlUnit`] that announces data points, the [`DataPoint`] base
//! trait and one capability trait per category.

mod capability;
mod category;
mod control_unit;
mod data_point;

pub use capability::BinarySensorDataPoint;
pub use capability::ButtonDataPoint;
pub use capability::CallCollector;
pub use capability::CoverDataPoint;
pub use capability::CoverType;
pub use capability::EventDataPoint;
pub use capability::LockDataPoint;
pub use capability::NumberDataPoint;
pub use capability::ProgramDataPoint;
pub use capability::SelectDataPoint;
pub use capability::SensorDataPoint;
pub use capability::SirenDataPoint;
pub use capability::SirenOnArgs;
pub use capability::SwitchDataPoint;
pub use capability::SysvarDataPoint;
pub use capability::SysvarType;
pub use capability::TextDataPoint;
pub use capability::UpdateDataPoint;
pub use category::DataPointCategory;
pub use category::DataPointHandle;
pub use control_unit::ControlUnit;
pub use data_point::CallSource;
pub use data_point::ChannelDataPoint;
pub use data_point::DataPoint;
pub use data_point::DataPointUpdate;
pub use data_point::DeviceDescription;
pub use data_point::HubDataPoint;
pub use data_point::LibraryError;
pub use data_point::Origin;
pub use data_point::ParameterType;
pub use data_point::RemovedCallback;
pub use data_point::UpdatedCallback;
