//! SmartLife CLI - find smart home devices on the local network
//!
//! This binary wraps the discovery engine in `smartlife-core`:
//! - Scan a subnet for ESP, Tuya/SmartLife or any smart devices
//! - Print the device list as text or widget JSON
//! - Save the device list where the controller widget reads it

mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use smartlife_core::config::{self, ScanSettings};
use smartlife_core::scanner::{self, DiscoveredDevice, ScanMode, SubnetPrefix};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smartlife")]
#[command(version)]
#[command(about = "Discover smart home devices on the local network")]
#[command(long_about = "
Scans every host of a /24 subnet, recognises ESP and Tuya/SmartLife devices
by hostname or open ports, and writes a device list for the SmartLife
controller widget.

Quick start:
  1. Look around:           smartlife scan
  2. Only ESP devices:      smartlife scan --mode esp
  3. Update the widget:     smartlife scan --install
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// ESP devices only (ESP in hostname, ESP web/OTA ports)
    Esp,
    /// Tuya/SmartLife devices only
    Tuya,
    /// All potential smart devices
    All,
}

impl From<ModeArg> for ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Esp => ScanMode::Esp,
            ModeArg::Tuya => ScanMode::Tuya,
            ModeArg::All => ScanMode::All,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the network for smart devices
    Scan {
        /// Subnet prefix to scan, e.g. 192.168.1 (default: detected)
        #[arg(short, long)]
        subnet: Option<String>,

        /// Device families to look for
        #[arg(short, long)]
        mode: Option<ModeArg>,

        /// Write the device list to this file
        #[arg(short, long, conflicts_with = "install")]
        output: Option<PathBuf>,

        /// Write the device list into the installed widget
        #[arg(long)]
        install: bool,

        /// Use sample devices when nothing is found
        #[arg(long)]
        samples: bool,

        /// Hosts probed in parallel
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Check device ports when a host does not answer ping
        #[arg(long)]
        tcp_fallback: bool,
    },

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("smartlife={},smartlife_core={}", log_level, log_level).into()
            }),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan {
            ref subnet,
            mode,
            ref output,
            install,
            samples,
            concurrency,
            tcp_fallback,
        } => {
            let mut settings = config::load_scan_settings();
            if let Some(subnet) = subnet {
                settings.subnet = Some(subnet.clone());
            }
            if let Some(mode) = mode {
                settings.mode = mode.into();
            }
            if let Some(concurrency) = concurrency {
                settings.concurrency = concurrency.max(1);
            }
            if tcp_fallback {
                settings.tcp_fallback = true;
            }

            let target = match (output, install) {
                (Some(path), _) => Some(path.clone()),
                (None, true) => Some(output::widget_config_path()?),
                (None, false) => None,
            };

            cmd_scan(&cli, &settings, target, install, samples).await
        }
        Commands::Config => cmd_config(&cli),
    }
}

async fn cmd_scan(
    cli: &Cli,
    settings: &ScanSettings,
    target: Option<PathBuf>,
    install: bool,
    samples: bool,
) -> Result<()> {
    let subnet = target_subnet(settings).await?;

    match cli.format {
        OutputFormat::Text => println!("Scanning subnet {}.* ({} devices)...", subnet, settings.mode),
        OutputFormat::Json => {}
    }

    // Create progress callback for text mode
    let progress_callback: Option<scanner::ProgressCallback> = match cli.format {
        OutputFormat::Text => Some(Box::new(|progress: scanner::ScanProgress| {
            if let Some(pct) = progress.percent {
                println!("  [{:>3}%] {}", pct, progress.message);
            } else {
                println!("  {}", progress.message);
            }
        })),
        OutputFormat::Json => None,
    };

    let devices = scanner::scan_network_with_progress(
        Some(&subnet.to_string()),
        settings.mode,
        settings.scan_options(),
        progress_callback,
    )
    .await?;

    let devices = if devices.is_empty() && samples {
        tracing::info!("No devices found, using sample devices");
        output::sample_devices(subnet)
    } else {
        devices
    };

    match cli.format {
        OutputFormat::Text => print_devices(&devices),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&devices)?),
    }

    if let Some(path) = target {
        output::save_device_config(&devices, &path)?;
        if install {
            output::request_widget_reload(&path)?;
        }
        match cli.format {
            OutputFormat::Text => println!("\nDevice configuration saved to {}", path.display()),
            OutputFormat::Json => {}
        }
    }

    Ok(())
}

/// Subnet to scan. Invalid input fails here, before any probing starts.
async fn target_subnet(settings: &ScanSettings) -> Result<SubnetPrefix> {
    scanner::resolve_subnet(settings.subnet.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
}

fn print_devices(devices: &[DiscoveredDevice]) {
    println!();
    if devices.is_empty() {
        println!("No devices found on the network.");
        println!("Possible reasons:");
        println!("  - Smart devices might be powered off");
        println!("  - Devices might be on a different subnet");
        println!("  - Devices might not have recognizable hostnames");
        println!("  - Firewall might be blocking the scan");
        return;
    }

    println!("Found {} device(s):", devices.len());
    println!();
    for device in devices {
        println!(
            "  {:>3}  {:15}  {:10}  {}",
            device.id,
            device.ip_address.to_string(),
            device.device_type.to_string(),
            device.name
        );
    }
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let settings = config::load_scan_settings();
    let config_path = config::get_config_file_path_string();
    let widget_path = output::widget_config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "-".to_string());

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:      {}", config_path);
            println!("Settings from:    {}", settings.source);
            println!("Subnet:           {}", settings.subnet.as_deref().unwrap_or("(detected)"));
            println!("Scan mode:        {}", settings.mode);
            println!("Concurrency:      {}", settings.concurrency);
            println!(
                "Timeouts (ms):    ping {}, port {}, lookup {}",
                settings.ping_timeout_ms, settings.port_timeout_ms, settings.lookup_timeout_ms
            );
            println!("TCP fallback:     {}", settings.tcp_fallback);
            println!("Widget devices:   {}", widget_path);
            println!();
            println!("Environment variables:");
            println!("  SMARTLIFE_SUBNET    - Override subnet prefix");
            println!("  SMARTLIFE_SCAN_MODE - Override scan mode (esp, tuya, all)");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config_path,
                    "source": settings.source.to_string(),
                    "subnet": settings.subnet,
                    "mode": settings.mode,
                    "concurrency": settings.concurrency,
                    "ping_timeout_ms": settings.ping_timeout_ms,
                    "port_timeout_ms": settings.port_timeout_ms,
                    "lookup_timeout_ms": settings.lookup_timeout_ms,
                    "tcp_fallback": settings.tcp_fallback,
                    "widget_devices": widget_path,
                })
            );
        }
    }

    Ok(())
}
