use super::category::DataPointCategory;
use super::category::DataPointHandle;
use crate::engine::DeviceInfo;

/// Session object of the device library for one hub connection.
///
/// Each config entry owns exactly one control unit. The control unit keeps
/// track of which data points it already announced, so `new_data_points`
/// only ever returns data points that no platform has wrapped yet.
pub trait ControlUnit: Send + Sync {
    /// Config entry this control unit belongs to.
    fn entry_id(&self) -> &str;

    /// Device info of the central itself; hub entities attach to it.
    fn device_info(&self) -> DeviceInfo;

    /// Device data points of `category` not yet handed out.
    fn new_data_points(&self, category: DataPointCategory) -> Vec<DataPointHandle>;

    /// Hub data points (system variables, programs) of `category` not yet handed out.
    fn new_hub_data_points(&self, category: DataPointCategory) -> Vec<DataPointHandle>;

    /// Feed a value received for `state_path` into the library's event pipeline.
    fn data_point_path_event(&self, state_path: &str, value: serde_json::Value);
}
