//! The network boundary of the scanner.
//!
//! The coordinator and fingerprinter only talk to the network through
//! [`HostProbe`], so tests can substitute a fake network.

use super::{ScanMode, ScanOptions};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::timeout;

/// Extra time granted to the reachability check on top of the ping wait,
/// covering process start-up of the system `ping`.
const PING_GRACE: Duration = Duration::from_millis(250);

/// Connectivity checks against a single host.
///
/// Implementations report failures as a negative answer. Deadlines are
/// applied by the caller, but implementations should also bound their own
/// work where the underlying call allows it.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// One ICMP-style liveness check, no retry.
    async fn is_reachable(&self, addr: Ipv4Addr) -> bool;

    /// One TCP connect attempt.
    async fn is_port_open(&self, addr: Ipv4Addr, port: u16) -> bool;

    /// Reverse hostname lookup.
    async fn reverse_lookup(&self, addr: Ipv4Addr) -> Option<String>;
}

/// What was learned about one address during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: Ipv4Addr,
    pub reachable: bool,
    pub open_ports: BTreeSet<u16>,
    pub hostname: Option<String>,
}

impl ProbeResult {
    pub fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            reachable: false,
            open_ports: BTreeSet::new(),
            hostname: None,
        }
    }
}

/// Applies the scan deadlines to every [`HostProbe`] call. A call that
/// errors or runs past its deadline counts as a negative answer.
pub struct Prober<'a, P: ?Sized> {
    net: &'a P,
    options: &'a ScanOptions,
}

impl<'a, P: HostProbe + ?Sized> Prober<'a, P> {
    pub fn new(net: &'a P, options: &'a ScanOptions) -> Self {
        Self { net, options }
    }

    pub async fn is_reachable(&self, addr: Ipv4Addr) -> bool {
        let deadline = self.options.ping_timeout + PING_GRACE;
        timeout(deadline, self.net.is_reachable(addr))
            .await
            .unwrap_or(false)
    }

    /// Probe `ports` in order, stopping at the first open one.
    pub async fn first_open_port(&self, addr: Ipv4Addr, ports: &[u16]) -> Option<u16> {
        for &port in ports {
            let open = timeout(self.options.port_timeout, self.net.is_port_open(addr, port))
                .await
                .unwrap_or(false);
            if open {
                tracing::debug!("{} has port {} open", addr, port);
                return Some(port);
            }
        }
        None
    }

    /// Check all `ports` at once under a single port deadline; the first
    /// open one in list order wins.
    pub async fn any_open_port(&self, addr: Ipv4Addr, ports: &[u16]) -> Option<u16> {
        let checks = ports.iter().map(|&port| async move {
            timeout(self.options.port_timeout, self.net.is_port_open(addr, port))
                .await
                .unwrap_or(false)
                .then_some(port)
        });
        join_all(checks).await.into_iter().flatten().next()
    }

    pub async fn reverse_lookup(&self, addr: Ipv4Addr) -> Option<String> {
        timeout(self.options.lookup_timeout, self.net.reverse_lookup(addr))
            .await
            .ok()
            .flatten()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }

    /// Liveness of one host: a single reachability check, then, if that
    /// fails and the fallback is enabled, one concurrent round over the
    /// mode's ports. A silent host costs at most the ping deadline plus one
    /// port deadline.
    pub async fn probe(&self, addr: Ipv4Addr, mode: ScanMode) -> ProbeResult {
        let mut result = ProbeResult::new(addr);

        if self.is_reachable(addr).await {
            result.reachable = true;
        } else if self.options.tcp_fallback {
            if let Some(port) = self.any_open_port(addr, mode.rules().ports).await {
                tracing::debug!("{} ignores ping but answers on port {}", addr, port);
                result.reachable = true;
                result.open_ports.insert(port);
            }
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::HostProbe;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory network used by the scanner tests.
    #[derive(Default)]
    pub struct FakeNetwork {
        pub reachable: HashSet<Ipv4Addr>,
        pub hostnames: HashMap<Ipv4Addr, String>,
        pub open_ports: HashMap<Ipv4Addr, HashSet<u16>>,
        /// Delay applied to every call, to exercise deadlines
        pub delay: Option<Duration>,
        /// Ports probed, in call order
        pub port_log: Mutex<Vec<(Ipv4Addr, u16)>>,
    }

    impl FakeNetwork {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn host(mut self, addr: Ipv4Addr) -> Self {
            self.reachable.insert(addr);
            self
        }

        pub fn hostname(mut self, addr: Ipv4Addr, name: &str) -> Self {
            self.hostnames.insert(addr, name.to_string());
            self
        }

        pub fn port(mut self, addr: Ipv4Addr, port: u16) -> Self {
            self.open_ports.entry(addr).or_default().insert(port);
            self
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn probed_ports(&self, addr: Ipv4Addr) -> Vec<u16> {
            self.port_log
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| *a == addr)
                .map(|(_, p)| *p)
                .collect()
        }

        async fn pause(&self) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl HostProbe for FakeNetwork {
        async fn is_reachable(&self, addr: Ipv4Addr) -> bool {
            self.pause().await;
            self.reachable.contains(&addr)
        }

        async fn is_port_open(&self, addr: Ipv4Addr, port: u16) -> bool {
            self.pause().await;
            self.port_log.lock().unwrap().push((addr, port));
            self.open_ports
                .get(&addr)
                .is_some_and(|ports| ports.contains(&port))
        }

        async fn reverse_lookup(&self, addr: Ipv4Addr) -> Option<String> {
            self.pause().await;
            self.hostnames.get(&addr).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeNetwork;
    use super::*;

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, last)
    }

    #[tokio::test]
    async fn test_probe_reachable_host() {
        let net = FakeNetwork::new().host(ip(5));
        let options = ScanOptions::default();
        let result = Prober::new(&net, &options).probe(ip(5), ScanMode::All).await;

        assert!(result.reachable);
        assert!(result.open_ports.is_empty());
        assert!(net.probed_ports(ip(5)).is_empty());
    }

    fn with_fallback() -> ScanOptions {
        ScanOptions {
            tcp_fallback: true,
            ..ScanOptions::default()
        }
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_tcp() {
        // ping blocked, but a Tuya port answers
        let net = FakeNetwork::new().port(ip(77), 6669);
        let options = with_fallback();
        let result = Prober::new(&net, &options).probe(ip(77), ScanMode::Tuya).await;

        assert!(result.reachable);
        assert_eq!(result.open_ports.into_iter().collect::<Vec<_>>(), vec![6669]);
        let mut probed = net.probed_ports(ip(77));
        probed.sort();
        assert_eq!(probed, vec![6668, 6669, 6670]);
    }

    #[tokio::test]
    async fn test_fallback_prefers_earlier_port() {
        let net = FakeNetwork::new().port(ip(40), 8883).port(ip(40), 81);
        let options = with_fallback();
        let result = Prober::new(&net, &options).probe(ip(40), ScanMode::All).await;

        assert_eq!(result.open_ports.into_iter().collect::<Vec<_>>(), vec![81]);
    }

    #[tokio::test]
    async fn test_probe_without_fallback() {
        let net = FakeNetwork::new().port(ip(77), 6669);
        let options = ScanOptions::default();
        assert!(!options.tcp_fallback);
        let result = Prober::new(&net, &options).probe(ip(77), ScanMode::Tuya).await;

        assert!(!result.reachable);
        assert!(net.probed_ports(ip(77)).is_empty());
    }

    #[tokio::test]
    async fn test_first_open_port_respects_priority() {
        let net = FakeNetwork::new().port(ip(3), 8266).port(ip(3), 81);
        let options = ScanOptions::default();
        let prober = Prober::new(&net, &options);

        assert_eq!(prober.first_open_port(ip(3), &[80, 81, 8080, 8081, 8266]).await, Some(81));
        assert_eq!(net.probed_ports(ip(3)), vec![80, 81]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_counts_as_negative() {
        let net = FakeNetwork::new()
            .host(ip(9))
            .hostname(ip(9), "esp-slow")
            .port(ip(9), 80)
            .delayed(Duration::from_secs(10));
        let options = ScanOptions::default();
        let prober = Prober::new(&net, &options);

        assert!(!prober.is_reachable(ip(9)).await);
        assert_eq!(prober.reverse_lookup(ip(9)).await, None);
        assert_eq!(prober.first_open_port(ip(9), &[80]).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_host_is_bounded() {
        let net = FakeNetwork::new().delayed(Duration::from_secs(30));
        let bound = Duration::from_millis(1550);

        for options in [ScanOptions::default(), with_fallback()] {
            let prober = Prober::new(&net, &options);
            for mode in [ScanMode::Esp, ScanMode::Tuya, ScanMode::All] {
                let start = tokio::time::Instant::now();
                let result = prober.probe(ip(99), mode).await;

                assert!(!result.reachable);
                assert!(start.elapsed() <= bound, "{} took {:?}", mode, start.elapsed());
            }
        }
    }

    #[tokio::test]
    async fn test_blank_hostname_is_ignored() {
        let net = FakeNetwork::new().hostname(ip(4), "   ");
        let options = ScanOptions::default();
        assert_eq!(Prober::new(&net, &options).reverse_lookup(ip(4)).await, None);
    }
}
