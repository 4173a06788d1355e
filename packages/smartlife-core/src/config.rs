use crate::scanner::{ScanMode, ScanOptions};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the subnet to scan
const ENV_SUBNET: &str = "SMARTLIFE_SUBNET";

/// Environment variable overriding the scan mode
const ENV_SCAN_MODE: &str = "SMARTLIFE_SCAN_MODE";

const DEFAULT_CONCURRENCY: usize = 50;
const DEFAULT_PING_TIMEOUT_MS: u64 = 1000;
const DEFAULT_PORT_TIMEOUT_MS: u64 = 300;
const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 1000;

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    scan: Option<ScanSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ScanSection {
    /// Subnet prefix (e.g., "192.168.1"); detected when absent
    subnet: Option<String>,
    /// "esp", "tuya" or "all"
    mode: Option<String>,
    concurrency: Option<usize>,
    ping_timeout_ms: Option<u64>,
    port_timeout_ms: Option<u64>,
    lookup_timeout_ms: Option<u64>,
    tcp_fallback: Option<bool>,
}

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// At least one value from an environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Runtime scan configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    /// Subnet prefix to scan; `None` means detect the local one
    pub subnet: Option<String>,
    pub mode: ScanMode,
    pub concurrency: usize,
    pub ping_timeout_ms: u64,
    pub port_timeout_ms: u64,
    pub lookup_timeout_ms: u64,
    pub tcp_fallback: bool,
    /// Source of the configuration (for logging)
    pub source: ConfigSource,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            subnet: None,
            mode: ScanMode::default(),
            concurrency: DEFAULT_CONCURRENCY,
            ping_timeout_ms: DEFAULT_PING_TIMEOUT_MS,
            port_timeout_ms: DEFAULT_PORT_TIMEOUT_MS,
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            tcp_fallback: false,
            source: ConfigSource::Default,
        }
    }
}

impl ScanSettings {
    /// Pool size and deadlines for the scan coordinator.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            concurrency: self.concurrency.max(1),
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            port_timeout: Duration::from_millis(self.port_timeout_ms),
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
            tcp_fallback: self.tcp_fallback,
        }
    }

    fn apply_section(&mut self, section: ScanSection) {
        if let Some(subnet) = section.subnet.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            self.subnet = Some(subnet);
        }
        if let Some(mode) = section.mode {
            match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(e) => tracing::warn!("Ignoring scan mode from config file: {}", e),
            }
        }
        if let Some(concurrency) = section.concurrency {
            self.concurrency = concurrency.max(1);
        }
        if let Some(ms) = section.ping_timeout_ms {
            self.ping_timeout_ms = ms;
        }
        if let Some(ms) = section.port_timeout_ms {
            self.port_timeout_ms = ms;
        }
        if let Some(ms) = section.lookup_timeout_ms {
            self.lookup_timeout_ms = ms;
        }
        if let Some(enabled) = section.tcp_fallback {
            self.tcp_fallback = enabled;
        }
    }

    /// Apply `SMARTLIFE_*` overrides. Returns whether any were used.
    fn apply_env<F>(&mut self, get: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = false;

        if let Some(subnet) = get(ENV_SUBNET).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            tracing::info!("Using subnet from environment variable: {}", subnet);
            self.subnet = Some(subnet);
            applied = true;
        }

        if let Some(mode) = get(ENV_SCAN_MODE) {
            match mode.parse() {
                Ok(mode) => {
                    tracing::info!("Using scan mode from environment variable: {}", mode);
                    self.mode = mode;
                    applied = true;
                }
                Err(e) => tracing::warn!("Ignoring {}: {}", ENV_SCAN_MODE, e),
            }
        }

        applied
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("smartlife").join("config.toml"))
}

/// Parse configuration file content
fn parse_config(content: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

/// Load configuration from a config file
fn load_config_file(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

/// Load scan settings with priority:
/// 1. Environment variables (SMARTLIFE_SUBNET, SMARTLIFE_SCAN_MODE)
/// 2. Config file (~/.config/smartlife/config.toml)
/// 3. Default values
pub fn load_scan_settings() -> ScanSettings {
    let config = get_config_file_path().and_then(|path| load_config_file(&path));
    resolve_settings(config, |key| std::env::var(key).ok())
}

fn resolve_settings<F>(config: Option<ConfigFile>, env: F) -> ScanSettings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = ScanSettings::default();

    if let Some(section) = config.and_then(|c| c.scan) {
        settings.apply_section(section);
        settings.source = ConfigSource::ConfigFile;
    }

    if settings.apply_env(env) {
        settings.source = ConfigSource::Environment;
    }

    if settings.source == ConfigSource::Default {
        tracing::debug!("Using default scan settings");
    }

    settings
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/smartlife/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# SmartLife Scanner Configuration
# Place this file at: ~/.config/smartlife/config.toml

[scan]
# Subnet prefix to scan (first three octets). Detected automatically if unset.
# subnet = "192.168.1"

# Device families to look for: "esp", "tuya" or "all"
# mode = "all"

# Hosts probed in parallel
# concurrency = 50

# Per-probe deadlines in milliseconds
# ping_timeout_ms = 1000
# port_timeout_ms = 300
# lookup_timeout_ms = 1000

# Check device ports when a host does not answer ping
# tcp_fallback = false
"#
    .to_string()
}
