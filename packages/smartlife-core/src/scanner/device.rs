//! Device records in the shape the controller widget stores them.

use super::classify::DeviceType;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

pub const DEFAULT_BRIGHTNESS: u8 = 100;
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// A host the fingerprinter recognised, before ids and runtime fields exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub ip_address: Ipv4Addr,
    pub device_type: DeviceType,
}

impl Identity {
    pub fn new(name: impl Into<String>, ip_address: Ipv4Addr, device_type: DeviceType) -> Self {
        Self {
            name: name.into(),
            ip_address,
            device_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    /// 1-based, unique within one scan result
    pub id: u32,
    pub name: String,
    pub ip_address: Ipv4Addr,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub state: bool,
    /// 0-100, only meaningful for lights
    pub brightness: u8,
    /// Hex colour, only meaningful for lights
    pub color: String,
    pub timer_on: Option<String>,
    pub timer_off: Option<String>,
}

impl DiscoveredDevice {
    /// Build a record with the widget's default runtime fields.
    pub fn new(id: u32, identity: Identity) -> Self {
        Self {
            id,
            name: identity.name,
            ip_address: identity.ip_address,
            device_type: identity.device_type,
            state: false,
            brightness: DEFAULT_BRIGHTNESS,
            color: DEFAULT_COLOR.to_string(),
            timer_on: None,
            timer_off: None,
        }
    }
}

/// Assign sequential ids starting at 1 in the order identities are received.
pub fn assemble<I>(identities: I) -> Vec<DiscoveredDevice>
where
    I: IntoIterator<Item = Identity>,
{
    identities
        .into_iter()
        .zip(1u32..)
        .map(|(identity, id)| DiscoveredDevice::new(id, identity))
        .collect()
}

/// Synthetic name for a host without a usable hostname, e.g. `ESP-42`.
pub fn synthetic_name(kind: &str, ip: Ipv4Addr) -> String {
    format!("{}-{}", kind, ip.octets()[3])
}
