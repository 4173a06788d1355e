//! Device type classification from hostname text and open ports.
//!
//! Everything here is pure: the same signal always maps to the same
//! [`DeviceType`].

use serde::{Deserialize, Serialize};

/// The device families the controller widget knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Light,
    Outlet,
    Switch,
    Thermostat,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Light => write!(f, "light"),
            DeviceType::Outlet => write!(f, "outlet"),
            DeviceType::Switch => write!(f, "switch"),
            DeviceType::Thermostat => write!(f, "thermostat"),
        }
    }
}

/// A single piece of evidence about what a host is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal<'a> {
    Hostname(&'a str),
    Port(u16),
}

/// Hostname keywords, checked top to bottom. First matching row wins.
const HOSTNAME_RULES: &[(&[&str], DeviceType)] = &[
    (&["LIGHT", "BULB", "LED"], DeviceType::Light),
    (&["PLUG", "SOCKET", "OUTLET"], DeviceType::Outlet),
    (&["SWITCH"], DeviceType::Switch),
    (&["THERMO", "TEMP"], DeviceType::Thermostat),
];

/// Map one signal to a device type, defaulting to [`DeviceType::Light`].
pub fn classify(signal: Signal<'_>) -> DeviceType {
    match signal {
        Signal::Hostname(hostname) => hostname_keyword_type(hostname).unwrap_or_default(),
        Signal::Port(port) => port_type(port),
    }
}

/// Classify a host for which both a hostname and a matched port may be known.
///
/// A hostname carrying one of the classifier keywords wins over the port.
/// A hostname without any keyword carries no type information, so the port
/// decides in that case.
pub fn classify_host(hostname: Option<&str>, port: Option<u16>) -> DeviceType {
    if let Some(device_type) = hostname.and_then(hostname_keyword_type) {
        return device_type;
    }

    match (hostname, port) {
        (_, Some(port)) => classify(Signal::Port(port)),
        (Some(hostname), None) => classify(Signal::Hostname(hostname)),
        (None, None) => DeviceType::default(),
    }
}

/// Returns the type implied by an explicit hostname keyword, if any.
pub fn hostname_keyword_type(hostname: &str) -> Option<DeviceType> {
    let upper = hostname.to_uppercase();
    HOSTNAME_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| upper.contains(k)))
        .map(|(_, device_type)| *device_type)
}

fn port_type(port: u16) -> DeviceType {
    match port {
        // Tuya local protocol, mostly bulbs
        6668..=6670 => DeviceType::Light,
        // ESP8266 OTA
        8266 => DeviceType::Light,
        // MQTT brokers are usually smart plugs
        1883 | 8883 => DeviceType::Outlet,
        _ => DeviceType::Light,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_hostname() {
        assert_eq!(classify(Signal::Hostname("esp-kitchen-light")), DeviceType::Light);
        assert_eq!(classify(Signal::Hostname("Hallway-BULB-2")), DeviceType::Light);
        assert_eq!(classify(Signal::Hostname("desk-led")), DeviceType::Light);
        assert_eq!(classify(Signal::Hostname("tuya-plug-01")), DeviceType::Outlet);
        assert_eq!(classify(Signal::Hostname("garage-socket")), DeviceType::Outlet);
        assert_eq!(classify(Signal::Hostname("smart-outlet")), DeviceType::Outlet);
        assert_eq!(classify(Signal::Hostname("iot-switch")), DeviceType::Switch);
        assert_eq!(classify(Signal::Hostname("thermostat")), DeviceType::Thermostat);
        assert_eq!(classify(Signal::Hostname("esp-temp-sensor")), DeviceType::Thermostat);
        assert_eq!(classify(Signal::Hostname("esp32-abcdef")), DeviceType::Light);
    }

    #[test]
    fn test_hostname_rule_order() {
        // LIGHT is checked before SWITCH
        assert_eq!(classify(Signal::Hostname("light-switch")), DeviceType::Light);
        assert_eq!(classify(Signal::Hostname("plug-switch")), DeviceType::Outlet);
    }

    #[test]
    fn test_classify_port() {
        assert_eq!(classify(Signal::Port(6668)), DeviceType::Light);
        assert_eq!(classify(Signal::Port(6669)), DeviceType::Light);
        assert_eq!(classify(Signal::Port(6670)), DeviceType::Light);
        assert_eq!(classify(Signal::Port(8266)), DeviceType::Light);
        assert_eq!(classify(Signal::Port(1883)), DeviceType::Outlet);
        assert_eq!(classify(Signal::Port(8883)), DeviceType::Outlet);
        assert_eq!(classify(Signal::Port(80)), DeviceType::Light);
        assert_eq!(classify(Signal::Port(8081)), DeviceType::Light);
    }

    #[test]
    fn test_classify_is_stable() {
        for _ in 0..3 {
            assert_eq!(classify(Signal::Hostname("smart-plug")), DeviceType::Outlet);
            assert_eq!(classify(Signal::Port(1883)), DeviceType::Outlet);
        }
    }

    #[test]
    fn test_classify_host_prefers_hostname_keyword() {
        assert_eq!(
            classify_host(Some("porch-thermo"), Some(1883)),
            DeviceType::Thermostat
        );
        assert_eq!(classify_host(Some("nas"), Some(1883)), DeviceType::Outlet);
        assert_eq!(classify_host(None, Some(1883)), DeviceType::Outlet);
        assert_eq!(classify_host(Some("smart-plug"), None), DeviceType::Outlet);
        assert_eq!(classify_host(None, None), DeviceType::Light);
    }

    #[test]
    fn test_device_type_serializes_lowercase() {
        let json = serde_json::to_string(&DeviceType::Thermostat).unwrap();
        assert_eq!(json, "\"thermostat\"");
        assert_eq!(DeviceType::Outlet.to_string(), "outlet");
    }
}
