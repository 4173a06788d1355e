//! [`HostProbe`] backed by the operating system: the system `ping` command,
//! TCP connects and the system resolver tools.

use super::probe::HostProbe;
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::process::Command;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Create a Command that hides the console window on Windows.
pub(crate) fn hidden_command_sync(program: &str) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Probe that shells out to `ping` and the resolver tools and opens real
/// TCP connections.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    ping_wait: Duration,
    connect_timeout: Duration,
}

impl SystemProbe {
    pub fn new(ping_wait: Duration, connect_timeout: Duration) -> Self {
        Self {
            ping_wait,
            connect_timeout,
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_millis(300))
    }
}

#[async_trait]
impl HostProbe for SystemProbe {
    async fn is_reachable(&self, addr: Ipv4Addr) -> bool {
        let args = ping_args(addr, self.ping_wait);

        let result = tokio::task::spawn_blocking(move || {
            match hidden_command_sync("ping").args(&args).output() {
                Ok(output) => ping_succeeded(
                    output.status.success(),
                    &String::from_utf8_lossy(&output.stdout),
                ),
                Err(e) => {
                    tracing::debug!("Failed to execute ping: {}", e);
                    false
                }
            }
        })
        .await;

        result.unwrap_or(false)
    }

    async fn is_port_open(&self, addr: Ipv4Addr, port: u16) -> bool {
        let socket_addr = SocketAddr::from((addr, port));
        matches!(
            timeout(self.connect_timeout, TcpStream::connect(socket_addr)).await,
            Ok(Ok(_))
        )
    }

    async fn reverse_lookup(&self, addr: Ipv4Addr) -> Option<String> {
        tokio::task::spawn_blocking(move || resolve_with_system_tools(addr))
            .await
            .ok()
            .flatten()
    }
}

/// Arguments for a single echo request with the given wait.
fn ping_args(addr: Ipv4Addr, wait: Duration) -> Vec<String> {
    let ip = addr.to_string();

    #[cfg(target_os = "windows")]
    {
        vec!["-n".into(), "1".into(), "-w".into(), wait.as_millis().to_string(), ip]
    }

    #[cfg(target_os = "macos")]
    {
        // -W is in milliseconds on macOS
        vec!["-c".into(), "1".into(), "-W".into(), wait.as_millis().to_string(), ip]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let secs = wait.as_secs().max(1);
        vec!["-c".into(), "1".into(), "-W".into(), secs.to_string(), ip]
    }
}

/// Windows `ping` exits 0 for some failures, so its output is checked too.
fn ping_succeeded(exit_ok: bool, stdout: &str) -> bool {
    if !exit_ok {
        return false;
    }

    if cfg!(target_os = "windows") {
        let lower = stdout.to_lowercase();
        let failed = lower.contains("request timed out")
            || lower.contains("destination host unreachable")
            || lower.contains("transmit failed")
            || lower.contains("general failure");
        return !failed && lower.contains("reply from");
    }

    true
}

type Resolver = (&'static str, fn(Ipv4Addr) -> Vec<String>, fn(&str) -> Option<String>);

#[cfg(not(target_os = "windows"))]
const RESOLVERS: &[Resolver] = &[
    ("getent", getent_args, parse_getent),
    ("host", host_args, parse_host),
];

#[cfg(target_os = "windows")]
const RESOLVERS: &[Resolver] = &[("powershell", powershell_args, parse_single_line)];

#[cfg(not(target_os = "windows"))]
fn getent_args(ip: Ipv4Addr) -> Vec<String> {
    vec!["hosts".into(), ip.to_string()]
}

#[cfg(not(target_os = "windows"))]
fn host_args(ip: Ipv4Addr) -> Vec<String> {
    vec![ip.to_string()]
}

#[cfg(target_os = "windows")]
fn powershell_args(ip: Ipv4Addr) -> Vec<String> {
    vec![
        "-NoProfile".into(),
        "-Command".into(),
        format!(
            "try {{ (Resolve-DnsName -Name '{}' -Type PTR -ErrorAction Stop).NameHost }} catch {{ }}",
            ip
        ),
    ]
}

/// Try each resolver tool in turn; the first name wins.
fn resolve_with_system_tools(addr: Ipv4Addr) -> Option<String> {
    RESOLVERS.iter().find_map(|(program, args, parse)| {
        let output = hidden_command_sync(program).args(args(addr)).output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse(&String::from_utf8_lossy(&output.stdout))
            .map(|name| name.trim_end_matches('.').to_string())
            .filter(|name| !name.is_empty() && name.parse::<Ipv4Addr>().is_err())
    })
}

/// `192.168.1.50    esp-kitchen.lan`
#[cfg(not(target_os = "windows"))]
fn parse_getent(out: &str) -> Option<String> {
    out.split_whitespace().nth(1).map(str::to_string)
}

/// `50.1.168.192.in-addr.arpa domain name pointer esp-kitchen.lan.`
#[cfg(not(target_os = "windows"))]
fn parse_host(out: &str) -> Option<String> {
    out.split("pointer")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
}

#[cfg(target_os = "windows")]
fn parse_single_line(out: &str) -> Option<String> {
    out.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.to_lowercase().contains("error"))
        .map(str::to_string)
}
