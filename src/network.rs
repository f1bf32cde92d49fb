//! Subnet address arithmetic and network interface helpers

use pnet::{
    datalink::NetworkInterface as PNetNetworkInterface, ipnetwork::IpNetwork, util::MacAddr,
};
use std::{collections::HashSet, net::Ipv4Addr};

use crate::error::{LanWhoError, Result};

/// Returns the network address of the given IP address and subnet mask
pub fn network_address(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) & u32::from(mask))
}

/// Returns the broadcast address of the given IP address and subnet mask
pub fn broadcast_address(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(mask))
}

/// Returns true if both IP addresses fall in the same network under the
/// given subnet mask
pub fn is_same_network(a: Ipv4Addr, b: Ipv4Addr, mask: Ipv4Addr) -> bool {
    network_address(a, mask) == network_address(b, mask)
}

/// Returns the number of host addresses on the network of the given IP
/// address and subnet mask, excluding the network and broadcast addresses
pub fn host_count(ip: Ipv4Addr, mask: Ipv4Addr) -> u32 {
    let network = u32::from(network_address(ip, mask));
    let broadcast = u32::from(broadcast_address(ip, mask));
    (broadcast - network).saturating_sub(1)
}

/// Returns true if the mask's bits form a contiguous run of 1s followed
/// by 0s
pub fn is_valid_mask(mask: Ipv4Addr) -> bool {
    let bits = u32::from(mask);
    bits.count_ones() == bits.leading_ones()
}

/// Returns the CIDR prefix length of a subnet mask, rejecting masks with
/// non-contiguous bits
pub fn prefix_length(mask: Ipv4Addr) -> Result<u8> {
    if !is_valid_mask(mask) {
        return Err(LanWhoError::InvalidMask(mask));
    }

    Ok(u32::from(mask).leading_ones() as u8)
}

/// Returns a string representation of the IP address where every octet is
/// zero-padded to three digits, so lexicographic order equals numeric order
pub fn to_sortable_string(ip: Ipv4Addr) -> String {
    let octets = ip.octets();
    format!(
        "{:03}.{:03}.{:03}.{:03}",
        octets[0], octets[1], octets[2], octets[3]
    )
}

#[derive(Debug, Clone)]
/// Lazy ascending iterator over every host address on a network, excluding
/// the network and broadcast addresses
///
/// The iterator is cheap to clone, so a scan can restart enumeration
/// without re-deriving it from the interface.
pub struct HostAddresses {
    next: u32,
    broadcast: u32,
}

impl Iterator for HostAddresses {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.broadcast {
            return None;
        }

        let ip = Ipv4Addr::from(self.next);
        self.next += 1;
        Some(ip)
    }
}

/// Returns a [`HostAddresses`] iterator over every host address on the
/// network of the given IP address and subnet mask
pub fn host_addresses(ip: Ipv4Addr, mask: Ipv4Addr) -> HostAddresses {
    // saturate so the all-ones network address (a /32 at 255.255.255.255)
    // yields an empty iterator instead of wrapping around
    HostAddresses {
        next: u32::from(network_address(ip, mask)).saturating_add(1),
        broadcast: u32::from(broadcast_address(ip, mask)),
    }
}

/// Describes a network interface a scan can run on
#[derive(Debug, Clone)]
pub struct NetworkInterface {
    /// System name of the interface
    pub name: String,
    /// Human readable description of the interface if available
    pub description: String,
    /// IPv4 address assigned to the interface
    pub ipv4: Ipv4Addr,
    /// Subnet mask of the interface's IPv4 network
    pub netmask: Ipv4Addr,
    /// All IP networks assigned to the interface
    pub ips: Vec<IpNetwork>,
    /// MAC address of the interface
    pub mac: MacAddr,
    /// DNS suffix of the interface's connection, used for hostname suffix
    /// stripping. Left empty by the interface providers; set it when the
    /// embedding application knows the connection-specific suffix.
    pub dns_suffix: String,
    /// OS interface flags
    pub flags: u32,
    /// OS interface index
    pub index: u32,
}

impl TryFrom<PNetNetworkInterface> for NetworkInterface {
    type Error = LanWhoError;

    fn try_from(value: PNetNetworkInterface) -> Result<Self> {
        let mac = value.mac.ok_or_else(|| {
            LanWhoError::Wire(format!("interface {} has no mac address", value.name))
        })?;

        let ipnet = value
            .ips
            .iter()
            .find_map(|net| match net {
                IpNetwork::V4(net) => Some(net),
                IpNetwork::V6(_) => None,
            })
            .ok_or_else(|| {
                LanWhoError::Wire(format!("interface {} has no ipv4 address", value.name))
            })?;

        Ok(Self {
            name: value.name,
            description: value.description,
            ipv4: ipnet.ip(),
            netmask: ipnet.mask(),
            ips: value.ips,
            mac,
            dns_suffix: String::new(),
            flags: value.flags,
            index: value.index,
        })
    }
}

impl From<&NetworkInterface> for PNetNetworkInterface {
    fn from(value: &NetworkInterface) -> Self {
        Self {
            name: value.name.clone(),
            description: value.description.clone(),
            index: value.index,
            mac: Some(value.mac),
            ips: value.ips.clone(),
            flags: value.flags,
        }
    }
}

/// Returns the named interface if it is usable for scanning
pub fn get_interface(name: &str) -> Option<NetworkInterface> {
    let iface = pnet::datalink::interfaces()
        .into_iter()
        .find(|i| i.name == name)?;
    NetworkInterface::try_from(iface).ok()
}

/// Returns the first active, non-loopback interface with an IPv4 address
pub fn get_default_interface() -> Option<NetworkInterface> {
    get_scan_interfaces().into_iter().next()
}

/// Returns every active, non-loopback IPv4 interface on distinct networks
///
/// When two interfaces share a network address only the first is kept, so
/// a multi-interface scan never queries the same subnet twice.
pub fn get_scan_interfaces() -> Vec<NetworkInterface> {
    let mut seen_networks: HashSet<Ipv4Addr> = HashSet::new();

    pnet::datalink::interfaces()
        .into_iter()
        .filter(|i| i.is_up() && !i.is_loopback())
        .filter_map(|i| NetworkInterface::try_from(i).ok())
        .filter(|i| seen_networks.insert(network_address(i.ipv4, i.netmask)))
        .collect()
}

#[cfg(test)]
#[path = "./network_tests.rs"]
mod tests;
