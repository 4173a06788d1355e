//! Network scanning module.
//!
//! Sweeps every host of a /24 with bounded parallelism and turns the hosts
//! that look like smart home devices into widget device records:
//! - reachability check (system ping, TCP connect fallback)
//! - reverse hostname lookup
//! - mode-specific port fingerprinting
//! - hostname/port based type classification

pub mod classify;
pub mod device;
pub mod fingerprint;
pub mod network;
mod ping;
pub mod probe;

pub use classify::{DeviceType, Signal, classify, classify_host};
pub use device::{DiscoveredDevice, Identity, assemble};
pub use fingerprint::{ModeRules, fingerprint};
pub use network::{DEFAULT_SUBNET, SubnetPrefix, detect_local_subnet};
pub use ping::SystemProbe;
pub use probe::{HostProbe, ProbeResult, Prober};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Scanner errors. Only input problems are fatal; per-host failures just
/// mean "no device at this address".
#[derive(Debug, Error)]
pub enum ScanError {
    /// Subnet prefix is not three dotted octets (or a /24 CIDR)
    #[error("Invalid subnet: {0:?}")]
    InvalidSubnet(String),

    /// Scan mode is not one of esp, tuya, all
    #[error("Invalid scan mode: {0:?}")]
    InvalidMode(String),
}

impl ScanError {
    /// Get user-friendly description and instructions
    pub fn user_message(&self) -> String {
        match self {
            ScanError::InvalidSubnet(input) => format!(
                "'{}' is not a valid subnet.\n\nUse the first three octets of your network, e.g. 192.168.1 (or 192.168.1.0/24).",
                input
            ),
            ScanError::InvalidMode(input) => format!(
                "'{}' is not a valid scan mode.\n\nChoose one of: esp, tuya, all.",
                input
            ),
        }
    }
}

/// Which device families a scan accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// ESP8266/ESP32 based devices
    Esp,
    /// Tuya / SmartLife devices
    Tuya,
    /// Any recognisable smart device
    #[default]
    All,
}

impl ScanMode {
    pub fn rules(self) -> &'static ModeRules {
        match self {
            ScanMode::Esp => &fingerprint::ESP_RULES,
            ScanMode::Tuya => &fingerprint::TUYA_RULES,
            ScanMode::All => &fingerprint::ALL_RULES,
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Esp => write!(f, "esp"),
            ScanMode::Tuya => write!(f, "tuya"),
            ScanMode::All => write!(f, "all"),
        }
    }
}

impl FromStr for ScanMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "esp" => Ok(ScanMode::Esp),
            "tuya" | "smartlife" => Ok(ScanMode::Tuya),
            "all" => Ok(ScanMode::All),
            _ => Err(ScanError::InvalidMode(s.to_string())),
        }
    }
}

/// Pool size and per-probe deadlines for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Hosts probed at the same time
    pub concurrency: usize,
    pub ping_timeout: Duration,
    /// Deadline for each TCP connect
    pub port_timeout: Duration,
    pub lookup_timeout: Duration,
    /// Check the mode's ports (one concurrent round) when a host does not
    /// answer ping
    pub tcp_fallback: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 50,
            ping_timeout: Duration::from_secs(1),
            port_timeout: Duration::from_millis(300),
            lookup_timeout: Duration::from_secs(1),
            tcp_fallback: false,
        }
    }
}

/// Progress updates during network scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub stage: ScanStage,
    pub message: String,
    pub percent: Option<u8>,
    pub devices_found: Option<usize>,
    pub elapsed_secs: f64,
}

/// Stages of the network scan process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ScanStage {
    Starting,
    Sweeping,
    Assembling,
    Complete,
}

/// Callback type for scan progress updates
pub type ProgressCallback = Box<dyn Fn(ScanProgress) + Send + Sync>;

/// How many completed hosts between two sweep progress updates.
const PROGRESS_EVERY: usize = 50;

/// Scan coordinator: fans the 254 hosts of a subnet out over a bounded pool
/// and waits for all of them before assembling the device list.
pub struct Scanner<P> {
    net: P,
    options: ScanOptions,
}

impl<P: HostProbe> Scanner<P> {
    pub fn new(net: P, options: ScanOptions) -> Self {
        Self { net, options }
    }

    pub async fn scan(&self, subnet: SubnetPrefix, mode: ScanMode) -> Vec<DiscoveredDevice> {
        self.scan_with_progress(subnet, mode, None).await
    }

    /// Scan `subnet` with progress callbacks. Devices are returned in
    /// ascending address order with ids 1..=N.
    pub async fn scan_with_progress(
        &self,
        subnet: SubnetPrefix,
        mode: ScanMode,
        on_progress: Option<ProgressCallback>,
    ) -> Vec<DiscoveredDevice> {
        let scan_start = Instant::now();

        let emit_progress =
            |stage: ScanStage, message: &str, percent: Option<u8>, devices: Option<usize>| {
                let progress = ScanProgress {
                    stage,
                    message: message.to_string(),
                    percent,
                    devices_found: devices,
                    elapsed_secs: scan_start.elapsed().as_secs_f64(),
                };
                tracing::debug!("[Scan] {}", message);
                if let Some(ref callback) = on_progress {
                    callback(progress);
                }
            };

        let concurrency = self.options.concurrency.max(1);
        let total_hosts = subnet.targets().count();

        tracing::info!(
            "Scanning {} hosts in {}.0/24 for {} devices ({} at a time)",
            total_hosts,
            subnet,
            mode,
            concurrency
        );
        emit_progress(
            ScanStage::Starting,
            &format!("Scanning subnet {}.* for {} devices...", subnet, mode),
            Some(0),
            None,
        );

        let prober = Prober::new(&self.net, &self.options);
        let prober = &prober;
        let mut sweep = stream::iter(subnet.targets())
            .map(move |addr| identify_host(prober, addr, mode))
            .buffer_unordered(concurrency);

        let mut identities = Vec::new();
        let mut completed = 0;

        while let Some(found) = sweep.next().await {
            completed += 1;
            if let Some(identity) = found {
                identities.push(identity);
            }

            if completed % PROGRESS_EVERY == 0 || completed == total_hosts {
                emit_progress(
                    ScanStage::Sweeping,
                    &format!(
                        "{}/{} hosts checked, {} devices found",
                        completed,
                        total_hosts,
                        identities.len()
                    ),
                    Some(percent_of(completed, total_hosts)),
                    Some(identities.len()),
                );
            }
        }

        emit_progress(
            ScanStage::Assembling,
            "Building device list...",
            Some(95),
            Some(identities.len()),
        );
        identities.sort_by_key(|identity| identity.ip_address);
        let devices = assemble(identities);

        let total_duration = scan_start.elapsed();
        tracing::info!(
            "Scan complete: {} devices found in {:.1}s",
            devices.len(),
            total_duration.as_secs_f64()
        );
        emit_progress(
            ScanStage::Complete,
            &format!(
                "Scan complete: {} devices found in {:.1}s",
                devices.len(),
                total_duration.as_secs_f64()
            ),
            Some(100),
            Some(devices.len()),
        );

        devices
    }
}

/// Probe, then fingerprint, one address.
async fn identify_host<P: HostProbe + ?Sized>(
    prober: &Prober<'_, P>,
    addr: Ipv4Addr,
    mode: ScanMode,
) -> Option<Identity> {
    let mut probed = prober.probe(addr, mode).await;
    if !probed.reachable {
        return None;
    }
    fingerprint(prober, &mut probed, mode).await
}

fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    // sweep covers 0-90%, assembly the rest
    ((done * 90) / total) as u8
}

/// Resolve the subnet to scan: the given prefix, or the local one.
pub async fn resolve_subnet(subnet: Option<&str>) -> Result<SubnetPrefix, ScanError> {
    match subnet {
        Some(prefix) => prefix.parse(),
        None => Ok(detect_local_subnet().await),
    }
}

/// Scan a subnet (the local one when `subnet` is `None`) using the system
/// network tools.
pub async fn scan_network(
    subnet: Option<&str>,
    mode: ScanMode,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>, ScanError> {
    scan_network_with_progress(subnet, mode, options, None).await
}

/// Scan a subnet with progress callbacks.
pub async fn scan_network_with_progress(
    subnet: Option<&str>,
    mode: ScanMode,
    options: ScanOptions,
    on_progress: Option<ProgressCallback>,
) -> Result<Vec<DiscoveredDevice>, ScanError> {
    // Validate before any probing starts
    let subnet = resolve_subnet(subnet).await?;

    let probe = SystemProbe::new(options.ping_timeout, options.port_timeout);
    let scanner = Scanner::new(probe, options);
    Ok(scanner.scan_with_progress(subnet, mode, on_progress).await)
}
