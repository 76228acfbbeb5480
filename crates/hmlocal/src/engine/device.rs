use std::collections::HashMap;

use serde::Serialize;

/// Device description an entity links itself to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(String, String)>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub sw_version: Option<String>,
    pub suggested_area: Option<String>,
    /// Parent device, e.g. the central a device is attached to
    pub via_device: Option<(String, String)>,
}

impl DeviceInfo {
    /// Info carrying nothing but an identifier; links to an existing device.
    pub fn linked(domain: &str, identifier: &str) -> Self {
        Self {
            identifiers: vec![(domain.to_string(), identifier.to_string())],
            ..Self::default()
        }
    }

    /// Registry id derived from the first identifier.
    pub fn device_id(&self) -> Option<String> {
        self.identifiers
            .first()
            .map(|(domain, identifier)| format!("{}:{}", domain, identifier))
    }

    fn merge(&mut self, other: DeviceInfo) {
        for identifier in other.identifiers {
            if !self.identifiers.contains(&identifier) {
                self.identifiers.push(identifier);
            }
        }
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            manufacturer,
            model,
            name,
            serial_number,
            sw_version,
            suggested_area,
            via_device
        );
    }
}

/// A device in the registry.
///
/// A device represents a physical device (or the central) that contains one
/// or more entities.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEntry {
    pub id: String,
    pub info: DeviceInfo,
    pub entity_ids: Vec<String>,
}

impl DeviceEntry {
    fn new(id: String, info: DeviceInfo) -> Self {
        Self {
            id,
            info,
            entity_ids: Vec::new(),
        }
    }

    fn add_entity(&mut self, entity_id: &str) {
        if !self.entity_ids.iter().any(|e| e == entity_id) {
            self.entity_ids.push(entity_id.to_string());
        }
    }
}

/// Device registry.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceEntry>,
}

impl DeviceRegistry {
    /// Create or update the device described by `info` and link `entity_id` to it.
    ///
    /// Returns the device id, or `None` when the info carries no identifier.
    pub fn link_entity(&mut self, info: DeviceInfo, entity_id: &str) -> Option<String> {
        let id = info.device_id()?;
        let entry = self
            .devices
            .entry(id.clone())
            .or_insert_with(|| DeviceEntry::new(id.clone(), DeviceInfo::default()));
        entry.info.merge(info);
        entry.add_entity(entity_id);
        Some(id)
    }

    pub fn unlink_entity(&mut self, device_id: &str, entity_id: &str) {
        if let Some(entry) = self.devices.get_mut(device_id) {
            entry.entity_ids.retain(|e| e != entity_id);
        }
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceEntry> {
        self.devices.get(device_id)
    }

    /// Remove a device. `None` means it was already gone.
    pub fn remove_device(&mut self, device_id: &str) -> Option<DeviceEntry> {
        self.devices.remove(device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
