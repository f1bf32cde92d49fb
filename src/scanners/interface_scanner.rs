//! Scans the subnet of a single network interface

use derive_builder::Builder;
use pnet::util::MacAddr;
use rand::seq::SliceRandom;
use std::{
    collections::HashMap,
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    error::{LanWhoError, Result},
    hostname::{DnsLookup, HostnameResolver, ReverseLookup},
    network::{self, NetworkInterface},
    packet::wire::{self, WireFactory},
    probe::{IcmpEcho, Pinger, PnetIcmpEcho},
    resolve::{
        ip_resolver::{ArpCache, IpResolver, SystemArpCache},
        mac_resolver::MacResolver,
    },
    scanners::{
        IpScanResult, ListenerSet, NetworkScanner, RunGuard, ScanOptions, StateListener,
    },
};

/// Scans hosts on the IPv4 subnet of one network interface
///
/// A scan runs in three stages: ARP requests over a raw wire to find
/// link-layer addresses, ICMP echo probes against every target, and
/// reverse-DNS lookups for the hosts that answered either probe. Only one
/// scan may run at a time per scanner; concurrent calls fail fast with
/// [`LanWhoError::AlreadyRunning`].
#[derive(Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct InterfaceScanner {
    /// The interface whose subnet is scanned
    interface: Arc<NetworkInterface>,
    /// Options applied to every scan this scanner runs
    #[builder(default)]
    options: ScanOptions,
    /// Opens the raw wire for the ARP stage; a fresh wire per scan
    #[builder(default = "Arc::new(wire::connect)")]
    wire_factory: Arc<WireFactory>,
    /// ICMP transport used by the ping stage
    #[builder(default = "Arc::new(PnetIcmpEcho)")]
    echo: Arc<dyn IcmpEcho>,
    /// Reverse-DNS transport used by the hostname stage
    #[builder(default = "Arc::new(DnsLookup)")]
    reverse_lookup: Arc<dyn ReverseLookup>,
    /// ARP cache consulted by [`NetworkScanner::scan_mac`]
    #[builder(default = "Arc::new(SystemArpCache)")]
    arp_cache: Arc<dyn ArpCache>,
    /// Flag set while a scan is in progress
    #[builder(default)]
    running: Arc<AtomicBool>,
    /// Callbacks invoked on idle/running transitions
    #[builder(default)]
    listeners: ListenerSet,
}

impl InterfaceScannerBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(interface) = &self.interface {
            if !network::is_valid_mask(interface.netmask) {
                return Err(format!(
                    "interface {} has an invalid netmask: {}",
                    interface.name, interface.netmask
                ));
            }
        }

        Ok(())
    }
}

impl InterfaceScanner {
    /// Returns builder for InterfaceScanner
    pub fn builder() -> InterfaceScannerBuilder {
        InterfaceScannerBuilder::default()
    }

    /// Registers a callback invoked on every idle/running transition
    pub fn on_state_change(&self, listener: StateListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    /// Returns the interface this scanner manages
    pub fn interface(&self) -> &NetworkInterface {
        &self.interface
    }

    fn host_addresses(&self) -> Vec<Ipv4Addr> {
        let mut hosts: Vec<Ipv4Addr> =
            network::host_addresses(self.interface.ipv4, self.interface.netmask).collect();

        if self.options.shuffle_addresses {
            hosts.shuffle(&mut rand::rng());
        }

        hosts
    }

    /// Runs the probe pipeline against the given targets and assembles one
    /// result per target, in target order
    fn run_scan(&self, targets: &[Ipv4Addr]) -> Result<Vec<IpScanResult>> {
        let options = &self.options;

        let mut macs: HashMap<Ipv4Addr, Option<MacAddr>> =
            targets.iter().map(|ip| (*ip, None)).collect();

        if options.send_arp {
            let wire = (self.wire_factory)(&self.interface)?;
            let resolver = MacResolver::new(
                Arc::clone(&self.interface),
                wire,
                options.arp_timeout,
                options.repeats,
            );
            macs = resolver.resolve(targets)?;
        }

        let mut pings: HashMap<Ipv4Addr, bool> = HashMap::new();

        if options.send_ping {
            let pinger = Pinger::new(Arc::clone(&self.echo), options.ping_timeout, options.repeats);
            pings = pinger.ping_many(targets);
        }

        let mut hostnames: HashMap<Ipv4Addr, String> = HashMap::new();

        if options.resolve_hostnames {
            // hostnames are only worth a lookup for hosts that answered
            // ARP or ping
            let responders: Vec<Ipv4Addr> = targets
                .iter()
                .copied()
                .filter(|ip| {
                    macs.get(ip).is_some_and(|mac| mac.is_some())
                        || pings.get(ip).copied().unwrap_or(false)
                })
                .collect();

            let suffix = (options.strip_dns_suffix && !self.interface.dns_suffix.is_empty())
                .then(|| self.interface.dns_suffix.clone());

            let resolver = HostnameResolver::new(
                Arc::clone(&self.reverse_lookup),
                options.dns_timeout,
                options.repeats,
                suffix,
            );
            hostnames = resolver.resolve_many(&responders);
        }

        Ok(targets
            .iter()
            .map(|&ip| {
                let mac = macs.get(&ip).copied().flatten();
                let vendor = mac
                    .map(|mac| options.vendor.lookup(&mac))
                    .unwrap_or_default();

                IpScanResult {
                    ip,
                    mac,
                    hostname: hostnames.get(&ip).cloned().unwrap_or_default(),
                    vendor,
                    was_arp_requested: options.send_arp,
                    was_pinged: options.send_ping,
                    responded_to_ping: pings.get(&ip).copied().unwrap_or(false),
                }
            })
            .collect())
    }
}

impl NetworkScanner for InterfaceScanner {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_on_network(&self, ip: Ipv4Addr) -> bool {
        network::is_same_network(ip, self.interface.ipv4, self.interface.netmask)
    }

    fn scan_network(&self) -> Result<Vec<IpScanResult>> {
        let _guard = RunGuard::acquire(&self.running, &self.listeners)?;
        self.run_scan(&self.host_addresses())
    }

    fn scan_address(&self, ip: Ipv4Addr) -> Result<IpScanResult> {
        if !self.is_on_network(ip) {
            return Err(LanWhoError::NotOnNetwork(ip));
        }

        let _guard = RunGuard::acquire(&self.running, &self.listeners)?;

        let mut results = self.run_scan(&[ip])?;
        results
            .pop()
            .ok_or_else(|| LanWhoError::Wire("scan produced no result".to_string()))
    }

    fn scan_mac(&self, mac: MacAddr) -> Result<Option<IpScanResult>> {
        let _guard = RunGuard::acquire(&self.running, &self.listeners)?;

        let resolver = IpResolver::new(Arc::clone(&self.interface), Arc::clone(&self.arp_cache));

        if let Some(ip) = resolver.resolve(&mac) {
            log::debug!("found {mac} at {ip} in the arp cache");
            let mut results = self.run_scan(&[ip])?;
            return Ok(results.pop());
        }

        // cache miss, sweep the whole subnet and pick out the owner
        let results = self.run_scan(&self.host_addresses())?;
        Ok(results.into_iter().find(|result| result.mac == Some(mac)))
    }
}

#[cfg(test)]
#[path = "./interface_scanner_tests.rs"]
mod tests;
