use bacwire_core::types::{DeviceInstance, Segmentation};
use bacwire_datalink::Address;

/// Descriptive Device-object properties cached after a
/// [`get_device_info`](crate::BacnetClient::get_device_info).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProperties {
    pub object_name: Option<String>,
    pub vendor_name: Option<String>,
    pub model_name: Option<String>,
    pub description: Option<String>,
}

/// Snapshot of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredDevice {
    pub instance: DeviceInstance,
    pub address: Address,
    pub vendor_id: Option<u16>,
    pub max_apdu: Option<u32>,
    pub segmentation: Option<Segmentation>,
    pub properties: DeviceProperties,
}

/// Identity of a device as read from its Device object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    pub instance: DeviceInstance,
    pub address: Address,
    pub object_name: String,
    pub vendor_name: String,
    pub model_name: String,
    pub description: Option<String>,
}

impl From<&DeviceInfo> for DeviceProperties {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            object_name: Some(info.object_name.clone()),
            vendor_name: Some(info.vendor_name.clone()),
            model_name: Some(info.model_name.clone()),
            description: info.description.clone(),
        }
    }
}
