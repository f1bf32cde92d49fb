//! Coordinates scans across several network interfaces

use pnet::util::MacAddr;
use std::{
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crate::{
    error::{LanWhoError, Result},
    network,
    scanners::{
        interface_scanner::InterfaceScanner, IpScanResult, ListenerSet, NetworkScanner, RunGuard,
        ScanOptions, StateListener,
    },
};

/// Fans scans out over a set of scanners, one per network interface
///
/// Full-network and MAC scans run the members concurrently, one thread per
/// member. Address scans are routed to the member whose subnet contains
/// the address. Every scan holds the group's single-flight flag, which is
/// separate from the members' flags.
#[derive(Default)]
pub struct ScannerGroup {
    scanners: Vec<Arc<dyn NetworkScanner>>,
    running: Arc<AtomicBool>,
    listeners: ListenerSet,
}

impl ScannerGroup {
    /// Returns an empty ScannerGroup
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a ScannerGroup with an [`InterfaceScanner`] for every
    /// scannable interface on this machine, each using the given options
    ///
    /// Scannable means up, not a loopback, and carrying an IPv4 network no
    /// other interface already covers.
    pub fn from_all_interfaces(options: ScanOptions) -> Result<Self> {
        let mut group = Self::new();

        for interface in network::get_scan_interfaces() {
            let scanner = InterfaceScanner::builder()
                .interface(Arc::new(interface))
                .options(options.clone())
                .build()?;
            group.add(Arc::new(scanner));
        }

        Ok(group)
    }

    /// Adds a scanner to the group
    pub fn add(&mut self, scanner: Arc<dyn NetworkScanner>) {
        self.scanners.push(scanner);
    }

    /// Returns how many scanners are in the group
    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    /// Returns true when the group has no scanners
    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// Registers a callback invoked on every idle/running transition of
    /// the group
    pub fn on_state_change(&self, listener: StateListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }
}

impl NetworkScanner for ScannerGroup {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_on_network(&self, ip: Ipv4Addr) -> bool {
        self.scanners
            .iter()
            .any(|scanner| scanner.is_on_network(ip))
    }

    fn scan_network(&self) -> Result<Vec<IpScanResult>> {
        let _guard = RunGuard::acquire(&self.running, &self.listeners)?;

        let mut handles = Vec::with_capacity(self.scanners.len());
        for scanner in &self.scanners {
            let scanner = Arc::clone(scanner);
            handles.push(thread::spawn(move || scanner.scan_network()));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.extend(handle.join()??);
        }

        Ok(results)
    }

    fn scan_address(&self, ip: Ipv4Addr) -> Result<IpScanResult> {
        let scanner = self
            .scanners
            .iter()
            .find(|scanner| scanner.is_on_network(ip))
            .ok_or(LanWhoError::NotOnNetwork(ip))?;

        let _guard = RunGuard::acquire(&self.running, &self.listeners)?;

        scanner.scan_address(ip)
    }

    fn scan_mac(&self, mac: MacAddr) -> Result<Option<IpScanResult>> {
        let _guard = RunGuard::acquire(&self.running, &self.listeners)?;

        let mut handles = Vec::with_capacity(self.scanners.len());
        for scanner in &self.scanners {
            let scanner = Arc::clone(scanner);
            handles.push(thread::spawn(move || scanner.scan_mac(mac)));
        }

        // several interfaces may know the MAC; an online sighting beats an
        // offline one
        let mut best: Option<IpScanResult> = None;
        for handle in handles {
            if let Some(candidate) = handle.join()?? {
                let replace = match &best {
                    None => true,
                    Some(current) => candidate.is_online() && !current.is_online(),
                };

                if replace {
                    best = Some(candidate);
                }
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
#[path = "./scanner_group_tests.rs"]
mod tests;
