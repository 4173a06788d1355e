//! Subnet prefixes and local network detection.

use super::ScanError;
use anyhow::{Context, Result};
use ipnetwork::Ipv4Network;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use tokio::net::UdpSocket;

/// Subnet used when the local one cannot be determined.
pub const DEFAULT_SUBNET: SubnetPrefix = SubnetPrefix([192, 168, 1]);

/// First and last host octet scanned in a prefix.
pub const FIRST_HOST: u8 = 1;
pub const LAST_HOST: u8 = 254;

/// The first three octets of a /24 network, e.g. `192.168.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    pub fn octets(&self) -> [u8; 3] {
        self.0
    }

    /// Address of host `octet` inside this prefix.
    pub fn host(&self, octet: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, octet)
    }

    /// Every scan target, `prefix.1` through `prefix.254`, ascending.
    pub fn targets(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        (FIRST_HOST..=LAST_HOST).map(move |octet| self.host(octet))
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        ip.octets()[..3] == self.0
    }

    /// Prefix of the /24 the address lives in.
    pub fn of(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        Self([a, b, c])
    }
}

impl std::fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}", a, b, c)
    }
}

impl FromStr for SubnetPrefix {
    type Err = ScanError;

    /// Accepts `192.168.1`, `192.168.1.` or `192.168.1.0/24`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = || ScanError::InvalidSubnet(s.to_string());

        if input.contains('/') {
            let network: Ipv4Network = input.parse().map_err(|_| invalid())?;
            if network.prefix() != 24 {
                return Err(invalid());
            }
            return Ok(Self::of(network.network()));
        }

        let trimmed = input.strip_suffix('.').unwrap_or(input);
        let octets = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || part.len() > 3 || !part.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u8>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<u8>, ScanError>>()?;

        match octets.as_slice() {
            [a, b, c] => Ok(Self([*a, *b, *c])),
            _ => Err(invalid()),
        }
    }
}

/// Determine the subnet of the primary local interface, falling back to
/// [`DEFAULT_SUBNET`].
pub async fn detect_local_subnet() -> SubnetPrefix {
    subnet_or_default(primary_local_ip().await)
}

fn subnet_or_default(local_ip: Result<Ipv4Addr>) -> SubnetPrefix {
    match local_ip {
        Ok(ip) => {
            let subnet = SubnetPrefix::of(ip);
            tracing::info!("Detected local address {} (subnet {})", ip, subnet);
            subnet
        }
        Err(e) => {
            tracing::warn!(
                "Could not determine local subnet: {:#}. Using {}",
                e,
                DEFAULT_SUBNET
            );
            DEFAULT_SUBNET
        }
    }
}

/// The address the OS would use to reach the internet. Connecting a UDP
/// socket only selects a route; nothing is sent.
async fn primary_local_ip() -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("Failed to bind UDP socket")?;
    socket
        .connect("8.8.8.8:80")
        .await
        .context("No route to the outside network")?;

    match socket.local_addr().context("Failed to read local address")? {
        SocketAddr::V4(addr) if is_usable_local(*addr.ip()) => Ok(*addr.ip()),
        other => Err(anyhow::anyhow!("Unusable local address {}", other.ip())),
    }
}

fn is_usable_local(ip: Ipv4Addr) -> bool {
    !ip.is_unspecified() && !ip.is_loopback() && !ip.is_link_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_prefix() {
        let subnet: SubnetPrefix = "192.168.1".parse().unwrap();
        assert_eq!(subnet.octets(), [192, 168, 1]);
        assert_eq!(subnet.to_string(), "192.168.1");

        let trailing: SubnetPrefix = " 10.0.42. ".parse().unwrap();
        assert_eq!(trailing, SubnetPrefix::new(10, 0, 42));
    }

    #[test]
    fn test_parse_cidr_prefix() {
        let subnet: SubnetPrefix = "192.168.7.0/24".parse().unwrap();
        assert_eq!(subnet, SubnetPrefix::new(192, 168, 7));

        assert!("192.168.0.0/16".parse::<SubnetPrefix>().is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "192.168", "192.168.1.1", "192.168.256", "a.b.c", "192..1", "+1.2.3", "192.168.1.0/abc"] {
            let err = bad.parse::<SubnetPrefix>().unwrap_err();
            assert!(matches!(err, ScanError::InvalidSubnet(_)), "{bad}");
        }
    }

    #[test]
    fn test_targets_cover_host_range() {
        let subnet = SubnetPrefix::new(192, 168, 1);
        let targets: Vec<Ipv4Addr> = subnet.targets().collect();

        assert_eq!(targets.len(), 254);
        assert_eq!(targets[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(targets[253], Ipv4Addr::new(192, 168, 1, 254));
        assert!(targets.iter().all(|ip| subnet.contains(*ip)));
    }

    #[test]
    fn test_contains() {
        let subnet = SubnetPrefix::new(10, 0, 0);
        assert!(subnet.contains(Ipv4Addr::new(10, 0, 0, 77)));
        assert!(!subnet.contains(Ipv4Addr::new(10, 0, 1, 77)));
    }

    #[test]
    fn test_subnet_or_default() {
        let detected = subnet_or_default(Ok(Ipv4Addr::new(10, 20, 30, 40)));
        assert_eq!(detected, SubnetPrefix::new(10, 20, 30));

        let fallback = subnet_or_default(Err(anyhow::anyhow!("No route to the outside network")));
        assert_eq!(fallback, DEFAULT_SUBNET);
        assert_eq!(fallback.to_string(), "192.168.1");
    }

    #[test]
    fn test_usable_local() {
        assert!(is_usable_local(Ipv4Addr::new(192, 168, 1, 20)));
        assert!(!is_usable_local(Ipv4Addr::LOCALHOST));
        assert!(!is_usable_local(Ipv4Addr::UNSPECIFIED));
        assert!(!is_usable_local(Ipv4Addr::new(169, 254, 3, 4)));
    }
}
