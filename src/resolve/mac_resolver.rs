//! Resolves IPv4 addresses to MAC addresses over raw ARP

use pnet::{
    packet::{arp, ethernet, Packet},
    util::MacAddr,
};
use std::{
    collections::HashMap,
    io,
    net::Ipv4Addr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crate::{
    error::{LanWhoError, Result},
    network::NetworkInterface,
    packet::{self, arp_packet::ArpRequest, wire::Wire},
};

/// Resolves IPv4 addresses to link-layer addresses by broadcasting ARP
/// requests on an open [`Wire`] and harvesting replies within a deadline
///
/// The wire must be exclusively owned by this resolution call; the
/// scanners guarantee that with their single-flight flag and by opening a
/// fresh wire per call.
pub struct MacResolver {
    interface: Arc<NetworkInterface>,
    wire: Wire,
    timeout: Duration,
    retries: usize,
}

impl MacResolver {
    /// Returns a new MacResolver
    ///
    /// `retries` is the total number of request/harvest rounds and must be
    /// at least 1; later rounds only re-request addresses still
    /// unresolved.
    pub fn new(
        interface: Arc<NetworkInterface>,
        wire: Wire,
        timeout: Duration,
        retries: usize,
    ) -> Self {
        Self {
            interface,
            wire,
            timeout,
            retries: retries.max(1),
        }
    }

    /// Resolves the MAC address of every target
    ///
    /// Addresses that never reply map to `None`; that is a normal outcome,
    /// not an error. The interface's own address, if queried and left
    /// unresolved by the wire, is filled in from the interface itself.
    pub fn resolve(&self, targets: &[Ipv4Addr]) -> Result<HashMap<Ipv4Addr, Option<MacAddr>>> {
        let mut resolutions: HashMap<Ipv4Addr, Option<MacAddr>> =
            targets.iter().map(|ip| (*ip, None)).collect();

        let mut rounds = 0;
        loop {
            self.run_round(&mut resolutions)?;
            rounds += 1;

            let any_unresolved = resolutions.values().any(|mac| mac.is_none());
            if rounds >= self.retries || !any_unresolved {
                break;
            }
        }

        // the OS never answers ARP requests for our own address over the
        // wire; no round-trip is needed to know our own MAC
        if let Some(own) = resolutions.get_mut(&self.interface.ipv4) {
            if own.is_none() {
                *own = Some(self.interface.mac);
            }
        }

        Ok(resolutions)
    }

    fn run_round(&self, resolutions: &mut HashMap<Ipv4Addr, Option<MacAddr>>) -> Result<()> {
        let unresolved: Vec<Ipv4Addr> = resolutions
            .iter()
            .filter(|(_, mac)| mac.is_none())
            .map(|(ip, _)| *ip)
            .collect();

        self.send_requests(&unresolved)?;
        self.harvest_replies(resolutions, unresolved.len())
    }

    fn send_requests(&self, targets: &[Ipv4Addr]) -> Result<()> {
        let mut sender = self.wire.sender.lock()?;

        for &target in targets {
            log::debug!("requesting MAC of {target}");

            let request = ArpRequest::builder()
                .source_ip(self.interface.ipv4)
                .source_mac(self.interface.mac)
                .target_ip(target)
                .build()?;

            sender
                .send(&request.to_raw())
                .map_err(|e| LanWhoError::Wire(e.to_string()))?;

            // throttle packet sending to prevent packet loss
            thread::sleep(packet::DEFAULT_PACKET_SEND_TIMING);
        }

        Ok(())
    }

    /// Reads frames until every pending target has replied or the deadline
    /// elapses, whichever comes first
    fn harvest_replies(
        &self,
        resolutions: &mut HashMap<Ipv4Addr, Option<MacAddr>>,
        mut pending: usize,
    ) -> Result<()> {
        let mut reader = self.wire.reader.lock()?;
        let deadline = Instant::now() + self.timeout;

        while pending > 0 && Instant::now() < deadline {
            let pkt = match reader.next_packet() {
                Ok(pkt) => pkt,
                Err(e) if is_read_timeout(&e) => continue,
                Err(e) => return Err(LanWhoError::Wire(e.to_string())),
            };

            let Some((sender_ip, sender_mac)) = self.admit_reply(pkt) else {
                continue;
            };

            if let Some(entry) = resolutions.get_mut(&sender_ip) {
                if entry.is_none() {
                    log::debug!("resolved {sender_ip} to {sender_mac}");
                    *entry = Some(sender_mac);
                    pending -= 1;
                }
            }
        }

        Ok(())
    }

    // Software equivalent of the capture filter "arp and ether dst <local
    // mac>": only ARP frames addressed to us are considered.
    fn admit_reply(&self, pkt: &[u8]) -> Option<(Ipv4Addr, MacAddr)> {
        let eth = ethernet::EthernetPacket::new(pkt)?;

        if eth.get_ethertype() != ethernet::EtherTypes::Arp {
            return None;
        }

        if eth.get_destination() != self.interface.mac {
            return None;
        }

        let header = arp::ArpPacket::new(eth.payload())?;

        if header.get_operation() != arp::ArpOperations::Reply {
            return None;
        }

        Some((header.get_sender_proto_addr(), header.get_sender_hw_addr()))
    }
}

fn is_read_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
#[path = "./mac_resolver_tests.rs"]
mod tests;
