//! Writing scan results where the controller widget picks them up.

use anyhow::{Context, Result};
use serde::Serialize;
use smartlife_core::scanner::{DeviceType, DiscoveredDevice, Identity, SubnetPrefix};
use std::path::{Path, PathBuf};

const WIDGET_ID: &str = "org.kde.plasma.smartlifecontroller";
const DEVICE_CONFIG_FILE: &str = "device-config.json";
const RELOAD_FLAG_FILE: &str = "reload_config";

/// Device list file inside the installed widget package
pub fn widget_config_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .context("Could not find data directory")?;

    Ok(data_dir
        .join("plasma")
        .join("plasmoids")
        .join(WIDGET_ID)
        .join("contents")
        .join("code")
        .join(DEVICE_CONFIG_FILE))
}

/// Placeholder devices at .100 and .101 so the widget has something to show.
pub fn sample_devices(subnet: SubnetPrefix) -> Vec<DiscoveredDevice> {
    let mut light = DiscoveredDevice::new(
        1,
        Identity::new("Sample Light", subnet.host(100), DeviceType::Light),
    );
    light.brightness = 80;

    let outlet = DiscoveredDevice::new(
        2,
        Identity::new("Sample Outlet", subnet.host(101), DeviceType::Outlet),
    );

    vec![light, outlet]
}

/// Save the device list as JSON, creating parent directories as needed
pub fn save_device_config(devices: &[DiscoveredDevice], path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let content = to_widget_json(devices).context("Failed to serialize device list")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::debug!("Saved {} devices to {:?}", devices.len(), path);
    Ok(())
}

/// Drop the flag file the widget polls to reload its device list
pub fn request_widget_reload(config_path: &Path) -> Result<()> {
    let flag = config_path
        .parent()
        .map(|dir| dir.join(RELOAD_FLAG_FILE))
        .context("Device config path has no parent directory")?;

    std::fs::write(&flag, "1").with_context(|| format!("Failed to write {}", flag.display()))?;
    tracing::info!("Created reload flag file: {}", flag.display());
    Ok(())
}

// Four-space indentation, matching files the widget writes itself
fn to_widget_json(devices: &[DiscoveredDevice]) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    devices.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("smartlife-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_sample_devices() {
        let devices = sample_devices(SubnetPrefix::new(10, 0, 0));
        assert_eq!(devices.len(), 2);

        assert_eq!(devices[0].id, 1);
        assert_eq!(devices[0].name, "Sample Light");
        assert_eq!(devices[0].ip_address.to_string(), "10.0.0.100");
        assert_eq!(devices[0].brightness, 80);

        assert_eq!(devices[1].id, 2);
        assert_eq!(devices[1].device_type, DeviceType::Outlet);
        assert_eq!(devices[1].ip_address.to_string(), "10.0.0.101");
        assert!(!devices[1].state);
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = scratch_dir("save");
        let path = dir.join("nested").join(DEVICE_CONFIG_FILE);
        let devices = sample_devices(SubnetPrefix::new(192, 168, 1));

        save_device_config(&devices, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    {\n        \"id\": 1,"));
        let parsed: Vec<DiscoveredDevice> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, devices);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_empty_list() {
        let dir = scratch_dir("empty");
        let path = dir.join(DEVICE_CONFIG_FILE);

        save_device_config(&[], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_reload_flag_next_to_config() {
        let dir = scratch_dir("reload");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(DEVICE_CONFIG_FILE);

        request_widget_reload(&path).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join(RELOAD_FLAG_FILE)).unwrap(), "1");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_widget_path_layout() {
        if let Ok(path) = widget_config_path() {
            assert!(path.ends_with("plasmoids/org.kde.plasma.smartlifecontroller/contents/code/device-config.json"));
        }
    }
}
