//! Library package for discovering and identifying hosts on any LAN
//!
//! The crate answers the question "who is on this network?" in a single
//! pass: it enumerates every host address on the local subnet(s), resolves
//! MAC addresses over raw ARP, probes reachability with ICMP echo, resolves
//! hostnames over reverse DNS, and tags NIC vendors using the IEEE OUI
//! dataset.
//!
//! # Examples
//!
//! ## Scanning a single interface
//!
//! ```no_run
//! use lanwho::network;
//! use lanwho::scanners::{interface_scanner::InterfaceScanner, NetworkScanner, ScanOptions};
//! use std::sync::Arc;
//!
//! let interface = network::get_default_interface().unwrap();
//! let scanner = InterfaceScanner::builder()
//!     .interface(Arc::new(interface))
//!     .options(ScanOptions::default())
//!     .build()
//!     .unwrap();
//!
//! for result in scanner.scan_network().unwrap() {
//!     println!("{result}");
//! }
//! ```
//!
//! ## Scanning every active interface
//!
//! ```no_run
//! use lanwho::scanners::{scanner_group::ScannerGroup, NetworkScanner, ScanOptions};
//!
//! let group = ScannerGroup::from_all_interfaces(ScanOptions::default()).unwrap();
//! let results = group.scan_network().unwrap();
//! println!("{} addresses scanned", results.len());
//! ```

#![deny(missing_docs)]
pub mod error;
pub mod hostname;
pub mod network;
pub mod packet;
pub mod probe;
pub mod resolve;
pub mod scanners;
pub mod vendor;
