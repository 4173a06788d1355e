//! Identity and type inference for a live host.
//!
//! Each [`ScanMode`] is described by one row of rules ([`ModeRules`]). The
//! decisions are pure functions of those rules; the async [`fingerprint`]
//! only gathers the signals they need, in priority order:
//!
//! 1. Reverse hostname lookup. A name matching the mode's accept list is
//!    final and skips port probing. A name that does not match drops the
//!    host in esp/tuya mode but falls through to port probing in all mode.
//! 2. The mode's ports, in order, stopping at the first open one.
//! 3. No signal: the host is left out of the result.

use super::ScanMode;
use super::classify::{DeviceType, Signal, classify, classify_host};
use super::device::{Identity, synthetic_name};
use super::probe::{HostProbe, ProbeResult, Prober};
use std::net::Ipv4Addr;

pub const ESP_PORTS: &[u16] = &[80, 81, 8080, 8081, 8266];
pub const TUYA_PORTS: &[u16] = &[6668, 6669, 6670];
pub const SMART_DEVICE_PORTS: &[u16] = &[80, 81, 8080, 8081, 6668, 6669, 6670, 8266, 1883, 8883];

/// What happens to a resolved hostname that matches none of the accept list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameMiss {
    Drop,
    ProbePorts,
}

/// How an accepted device gets its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Typing {
    Fixed(DeviceType),
    Classified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeRules {
    /// Case-insensitive hostname substrings that identify a device
    pub accept: &'static [&'static str],
    pub on_hostname_miss: HostnameMiss,
    /// Ports probed in priority order
    pub ports: &'static [u16],
    /// Prefix of synthetic names, `<kind>-<last octet>`
    pub kind: &'static str,
    pub typing: Typing,
}

pub const ESP_RULES: ModeRules = ModeRules {
    accept: &["ESP"],
    on_hostname_miss: HostnameMiss::Drop,
    ports: ESP_PORTS,
    kind: "ESP",
    typing: Typing::Fixed(DeviceType::Light),
};

pub const TUYA_RULES: ModeRules = ModeRules {
    accept: &["TUYA", "SMARTLIFE"],
    on_hostname_miss: HostnameMiss::Drop,
    ports: TUYA_PORTS,
    kind: "Tuya",
    typing: Typing::Fixed(DeviceType::Light),
};

pub const ALL_RULES: ModeRules = ModeRules {
    accept: &["ESP", "TUYA", "SMART", "IOT", "PLUG", "LIGHT", "BULB", "SWITCH"],
    on_hostname_miss: HostnameMiss::ProbePorts,
    ports: SMART_DEVICE_PORTS,
    kind: "SmartDevice",
    typing: Typing::Classified,
};

/// Outcome of looking at a resolved hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameVerdict {
    Accept(DeviceType),
    Reject,
    ProbePorts,
}

pub fn judge_hostname(mode: ScanMode, hostname: &str) -> HostnameVerdict {
    let rules = mode.rules();
    let upper = hostname.to_uppercase();

    if rules.accept.iter().any(|pattern| upper.contains(pattern)) {
        let device_type = match rules.typing {
            Typing::Fixed(device_type) => device_type,
            Typing::Classified => classify(Signal::Hostname(hostname)),
        };
        return HostnameVerdict::Accept(device_type);
    }

    match rules.on_hostname_miss {
        HostnameMiss::Drop => HostnameVerdict::Reject,
        HostnameMiss::ProbePorts => HostnameVerdict::ProbePorts,
    }
}

/// Identity of a host found through an open port. A resolved hostname that
/// fell through keeps serving as the device name.
pub fn identify_by_port(
    mode: ScanMode,
    addr: Ipv4Addr,
    hostname: Option<&str>,
    port: u16,
) -> Identity {
    let rules = mode.rules();
    let device_type = match rules.typing {
        Typing::Fixed(device_type) => device_type,
        Typing::Classified => classify_host(hostname, Some(port)),
    };
    let name = hostname
        .map(str::to_string)
        .unwrap_or_else(|| synthetic_name(rules.kind, addr));

    Identity::new(name, addr, device_type)
}

/// Resolve a reachable host to an identity, or `None` when nothing about it
/// matches the mode. Signals gathered along the way are recorded in `probed`.
pub async fn fingerprint<P: HostProbe + ?Sized>(
    prober: &Prober<'_, P>,
    probed: &mut ProbeResult,
    mode: ScanMode,
) -> Option<Identity> {
    let addr = probed.address;
    probed.hostname = prober.reverse_lookup(addr).await;

    if let Some(hostname) = probed.hostname.as_deref() {
        match judge_hostname(mode, hostname) {
            HostnameVerdict::Accept(device_type) => {
                tracing::debug!("Found {} device by hostname: {} ({})", mode, hostname, addr);
                return Some(Identity::new(hostname, addr, device_type));
            }
            HostnameVerdict::Reject => {
                tracing::trace!("{} ({}) does not look like a {} device", hostname, addr, mode);
                return None;
            }
            HostnameVerdict::ProbePorts => {}
        }
    }

    // A port found by the reachability fallback already answers this step.
    let port = match probed.open_ports.first() {
        Some(&port) => port,
        None => prober.first_open_port(addr, mode.rules().ports).await?,
    };
    probed.open_ports.insert(port);

    let identity = identify_by_port(mode, addr, probed.hostname.as_deref(), port);
    tracing::debug!(
        "Found {} device by port {}: {} ({})",
        mode,
        port,
        identity.name,
        addr
    );
    Some(identity)
}
