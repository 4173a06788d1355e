//! SmartLife Core Library
//!
//! Local network discovery for the SmartLife controller widget:
//! - Ping sweep of a /24 with bounded parallelism (TCP connect fallback)
//! - Reverse hostname lookup and port fingerprinting per scan mode
//! - Device type classification (light, outlet, switch, thermostat)
//! - Device records in the widget's JSON shape
//!
//! # Example
//!
//! ```no_run
//! use smartlife_core::{config, scanner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = config::load_scan_settings();
//!
//!     // Scan the local subnet for ESP devices
//!     let devices = scanner::scan_network(
//!         settings.subnet.as_deref(),
//!         scanner::ScanMode::Esp,
//!         settings.scan_options(),
//!     )
//!     .await?;
//!
//!     println!("{}", serde_json::to_string_pretty(&devices)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod scanner;

// Re-export commonly used types
pub use config::{ConfigSource, ScanSettings};
pub use scanner::{
    DeviceType, DiscoveredDevice, HostProbe, ScanError, ScanMode, ScanOptions, ScanProgress,
    ScanStage, Scanner, SubnetPrefix,
};
