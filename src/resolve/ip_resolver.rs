//! Resolves MAC addresses back to IPv4 addresses via the local ARP cache

#[cfg(test)]
use mockall::automock;

use pnet::util::MacAddr;
use std::{io, net::Ipv4Addr, process::Command, str::FromStr, sync::Arc};

use crate::network::{self, NetworkInterface};

/// Trait describing a query of the operating system's ARP cache
#[cfg_attr(test, automock)]
pub trait ArpCache: Send + Sync {
    /// Returns every (ip, mac) pair currently in the cache
    fn entries(&self) -> Result<Vec<(Ipv4Addr, MacAddr)>, io::Error>;
}

/// An [`ArpCache`] implementation that shells out to the OS `arp` command
pub struct SystemArpCache;

impl ArpCache for SystemArpCache {
    fn entries(&self) -> Result<Vec<(Ipv4Addr, MacAddr)>, io::Error> {
        let args: &[&str] = if cfg!(windows) { &["-a"] } else { &["-e", "-n"] };
        let output = Command::new("arp").args(args).output()?;
        Ok(parse_arp_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extracts (ip, mac) pairs from `arp` command output
///
/// Works on both the Linux table layout and the Windows `arp -a` layout:
/// any line carrying both a parseable IPv4 address and a parseable MAC
/// address contributes one entry.
pub fn parse_arp_output(output: &str) -> Vec<(Ipv4Addr, MacAddr)> {
    let mut entries = Vec::new();

    for line in output.lines() {
        let mut ip: Option<Ipv4Addr> = None;
        let mut mac: Option<MacAddr> = None;

        for token in line.split_whitespace() {
            if ip.is_none() {
                if let Ok(parsed) = Ipv4Addr::from_str(token) {
                    ip = Some(parsed);
                    continue;
                }
            }

            if mac.is_none() {
                // windows prints dash-separated MAC addresses
                if let Ok(parsed) = MacAddr::from_str(&token.replace('-', ":")) {
                    mac = Some(parsed);
                }
            }
        }

        if let (Some(ip), Some(mac)) = (ip, mac) {
            entries.push((ip, mac));
        }
    }

    entries
}

/// Maps MAC addresses back to IPv4 addresses using the local ARP cache
///
/// A cache miss is not resolved here; the scan orchestrator falls back to
/// a full network sweep in that case, which is materially more expensive.
pub struct IpResolver {
    interface: Arc<NetworkInterface>,
    cache: Arc<dyn ArpCache>,
}

impl IpResolver {
    /// Returns a new IpResolver over the given interface and cache
    pub fn new(interface: Arc<NetworkInterface>, cache: Arc<dyn ArpCache>) -> Self {
        Self { interface, cache }
    }

    /// Returns the IPv4 address last seen for the MAC, if any
    ///
    /// The interface's own MAC maps straight to its own IP. Only cache
    /// entries on the interface's subnet are considered, so each interface
    /// claims addresses it can actually reach. Cache errors degrade to
    /// `None`.
    pub fn resolve(&self, mac: &MacAddr) -> Option<Ipv4Addr> {
        if *mac == self.interface.mac {
            return Some(self.interface.ipv4);
        }

        let entries = match self.cache.entries() {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("arp cache query failed: {e}");
                return None;
            }
        };

        entries
            .into_iter()
            .filter(|(ip, _)| {
                network::is_same_network(*ip, self.interface.ipv4, self.interface.netmask)
            })
            .find(|(_, entry_mac)| entry_mac == mac)
            .map(|(ip, _)| ip)
    }
}

#[cfg(test)]
#[path = "./ip_resolver_tests.rs"]
mod tests;
