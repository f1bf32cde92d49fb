//! Provides the scan pipeline: options, results, and the scanners that
//! produce them
//!
//! This includes:
//! - [`interface_scanner::InterfaceScanner`] for scanning one interface's
//!   subnet
//! - [`scanner_group::ScannerGroup`] for coordinating scans across several
//!   interfaces

use derive_builder::Builder;
#[cfg(test)]
use mockall::automock;

use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    net::Ipv4Addr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::{
    error::{LanWhoError, Result},
    vendor::{NoVendor, VendorResolver},
};

pub mod interface_scanner;
pub mod scanner_group;

/// Observable state of a scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    /// No scan is in progress
    Idle,
    /// A scan is in progress
    Running,
}

/// Callback invoked on every idle/running transition of a scanner
pub type StateListener = Box<dyn Fn(ScannerState) + Send + Sync>;

pub(crate) type ListenerSet = Arc<Mutex<Vec<StateListener>>>;

/// Single-flight guard over a scanner's running flag
///
/// Acquiring flips the flag atomically and notifies listeners; dropping
/// releases it and notifies again, so the idle transition fires on the
/// error path too.
pub(crate) struct RunGuard {
    running: Arc<AtomicBool>,
    listeners: ListenerSet,
}

impl RunGuard {
    pub(crate) fn acquire(running: &Arc<AtomicBool>, listeners: &ListenerSet) -> Result<Self> {
        if running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LanWhoError::AlreadyRunning);
        }

        let guard = Self {
            running: Arc::clone(running),
            listeners: Arc::clone(listeners),
        };
        guard.notify(ScannerState::Running);

        Ok(guard)
    }

    fn notify(&self, state: ScannerState) {
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(state);
            }
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify(ScannerState::Idle);
    }
}

/// Configuration for a scan, immutable for the duration of one scan call
#[derive(Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanOptions {
    /// Whether to send ARP requests to hosts during the scan
    #[builder(default = "true")]
    pub send_arp: bool,
    /// Whether to send ICMP echo probes to hosts during the scan
    #[builder(default = "true")]
    pub send_ping: bool,
    /// Whether to resolve hostnames of responding hosts during the scan
    #[builder(default = "true")]
    pub resolve_hostnames: bool,
    /// Whether to strip the interface's DNS suffix from resolved
    /// hostnames, e.g. "host.domain.local" becomes "host" for a suffix of
    /// "domain.local"
    #[builder(default = "true")]
    pub strip_dns_suffix: bool,
    /// Whether to randomize host iteration order. Spreads ARP/ping load
    /// instead of walking sequential addresses, which can trip basic flood
    /// protections.
    #[builder(default = "false")]
    pub shuffle_addresses: bool,
    /// Number of rounds for the ARP and ping stages, at least 1
    #[builder(default = "1")]
    pub repeats: usize,
    /// How long to wait for ARP replies per round
    #[builder(default = "Duration::from_secs(1)")]
    pub arp_timeout: Duration,
    /// How long to wait for an ICMP echo reply per attempt
    #[builder(default = "Duration::from_secs(1)")]
    pub ping_timeout: Duration,
    /// How long to wait for a reverse-DNS answer per attempt
    #[builder(default = "Duration::from_secs(1)")]
    pub dns_timeout: Duration,
    /// Vendor lookup used to tag resolved MAC addresses; defaults to the
    /// no-op resolver
    #[builder(default = "Arc::new(NoVendor)")]
    pub vendor: Arc<dyn VendorResolver>,
}

impl ScanOptions {
    /// Returns builder for ScanOptions
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("default scan options are valid")
    }
}

impl ScanOptionsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(repeats) = self.repeats {
            if repeats < 1 {
                return Err("repeats must be at least 1".to_string());
            }
        }

        Ok(())
    }
}

fn serialize_mac<S>(mac: &Option<MacAddr>, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match mac {
        Some(mac) => s.serialize_some(&mac.to_string()),
        None => s.serialize_none(),
    }
}

fn deserialize_mac<'de, D>(d: D) -> std::result::Result<Option<MacAddr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(d)?;
    value
        .map(|s| s.parse::<MacAddr>().map_err(serde::de::Error::custom))
        .transpose()
}

/// The outcome of scanning one IPv4 address
///
/// Created fresh per scan and never reused across scans. Non-responses
/// are sentinel values (`None` MAC, empty hostname/vendor), never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpScanResult {
    /// The scanned IPv4 address
    pub ip: Ipv4Addr,
    /// MAC address of the host, if it answered ARP
    #[serde(
        serialize_with = "serialize_mac",
        deserialize_with = "deserialize_mac"
    )]
    pub mac: Option<MacAddr>,
    /// Hostname of the host, empty when unresolved
    pub hostname: String,
    /// NIC vendor of the host, empty when unknown
    pub vendor: String,
    /// Whether an ARP request was sent for this address
    pub was_arp_requested: bool,
    /// Whether an ICMP echo probe was sent to this address
    pub was_pinged: bool,
    /// Whether the host answered an ICMP echo probe
    pub responded_to_ping: bool,
}

impl IpScanResult {
    /// Returns true if the host answered ARP
    pub fn responded_to_arp(&self) -> bool {
        self.mac.is_some()
    }

    /// Returns true if the host answered ARP or ping
    pub fn is_online(&self) -> bool {
        self.responded_to_arp() || self.responded_to_ping
    }

    /// Returns true if a hostname was resolved
    pub fn has_hostname(&self) -> bool {
        !self.hostname.is_empty()
    }

    /// Returns true if a vendor was matched
    pub fn has_vendor(&self) -> bool {
        !self.vendor.is_empty()
    }
}

impl Display for IpScanResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ip)?;

        if !self.is_online() {
            return write!(f, " [Offline]");
        }

        if let Some(mac) = self.mac {
            write!(f, " {mac}")?;
        }

        if self.has_hostname() {
            write!(f, " {}", self.hostname)?;
        }

        if self.has_vendor() {
            write!(f, " ({})", self.vendor)?;
        }

        if self.responded_to_ping {
            write!(f, " [Pings]")?;
        }

        Ok(())
    }
}

/// Trait implemented by every scanner in this crate
#[cfg_attr(test, automock)]
pub trait NetworkScanner: Send + Sync {
    /// Returns true while a scan is in progress
    fn is_running(&self) -> bool;

    /// Returns true if the address falls in a subnet this scanner manages
    fn is_on_network(&self, ip: Ipv4Addr) -> bool;

    /// Scans every host address on the managed subnet(s)
    fn scan_network(&self) -> Result<Vec<IpScanResult>>;

    /// Scans a single address
    fn scan_address(&self, ip: Ipv4Addr) -> Result<IpScanResult>;

    /// Finds and scans the host owning the given MAC address
    fn scan_mac(&self, mac: MacAddr) -> Result<Option<IpScanResult>>;
}

#[cfg(test)]
#[path = "./scanners_tests.rs"]
mod tests;
