//! Concurrent ICMP echo probing for host reachability

#[cfg(test)]
use mockall::automock;

use pnet::packet::{
    icmp::{self, echo_request::MutableEchoRequestPacket, IcmpPacket, IcmpTypes},
    ip::IpNextHeaderProtocols,
    Packet,
};
use pnet::transport::{self, TransportChannelType, TransportProtocol};
use std::{
    collections::HashMap,
    io,
    net::{IpAddr, Ipv4Addr},
    sync::{mpsc, Arc},
    time::{Duration, Instant},
};
use threadpool::ThreadPool;

/// Upper bound on in-flight probes during a batched ping sweep
pub const MAX_CONCURRENT_PROBES: usize = 32;

const ECHO_BUFFER_SIZE: usize = 64;

/// Trait describing a single ICMP echo round-trip against one address
///
/// Implementations answer whether a reply arrived within the timeout; they
/// do not retry. Retrying is [`Pinger`]'s job.
#[cfg_attr(test, automock)]
pub trait IcmpEcho: Send + Sync {
    /// Sends one echo request and waits up to `timeout` for a matching
    /// reply
    fn echo(&self, ip: Ipv4Addr, timeout: Duration) -> Result<bool, io::Error>;
}

/// An [`IcmpEcho`] implementation over a pnet layer-4 ICMP transport
/// channel
pub struct PnetIcmpEcho;

impl IcmpEcho for PnetIcmpEcho {
    fn echo(&self, ip: Ipv4Addr, timeout: Duration) -> Result<bool, io::Error> {
        let protocol =
            TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
        let (mut tx, mut rx) = transport::transport_channel(256, protocol)?;

        let mut buf = [0u8; ECHO_BUFFER_SIZE];
        let mut request = MutableEchoRequestPacket::new(&mut buf)
            .expect("failed to generate echo request packet");

        request.set_icmp_type(IcmpTypes::EchoRequest);
        request.set_identifier(std::process::id() as u16);
        request.set_sequence_number(1);

        let checksum = icmp::checksum(
            &IcmpPacket::new(request.packet()).expect("failed to generate icmp packet"),
        );
        request.set_checksum(checksum);

        tx.send_to(request, IpAddr::V4(ip))?;

        let mut replies = transport::icmp_packet_iter(&mut rx);
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            match replies.next_with_timeout(remaining)? {
                Some((reply, addr)) => {
                    if addr == IpAddr::V4(ip) && reply.get_icmp_type() == IcmpTypes::EchoReply {
                        return Ok(true);
                    }
                    // a reply from some other conversation; keep waiting
                }
                None => return Ok(false),
            }
        }
    }
}

/// Probes host reachability with ICMP echo, with retry and timeout
#[derive(Clone)]
pub struct Pinger {
    echo: Arc<dyn IcmpEcho>,
    timeout: Duration,
    retries: usize,
}

impl Pinger {
    /// Returns a new Pinger
    ///
    /// `retries` is the total number of attempts per address and must be
    /// at least 1.
    pub fn new(echo: Arc<dyn IcmpEcho>, timeout: Duration, retries: usize) -> Self {
        Self {
            echo,
            timeout,
            retries: retries.max(1),
        }
    }

    /// Pings a single address
    ///
    /// Returns true on any successful reply within the timeout. Probe-layer
    /// errors (no route, unreachable, missing privileges) degrade to false
    /// and are never raised.
    pub fn ping(&self, ip: Ipv4Addr) -> bool {
        for _ in 0..self.retries {
            match self.echo.echo(ip, self.timeout) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    log::debug!("ping of {ip} failed: {e}");
                    return false;
                }
            }
        }

        false
    }

    /// Pings every address concurrently and returns the reachability of
    /// each
    ///
    /// Returns only once every probe has completed or exhausted its
    /// retries; there is no ordering guarantee between probes.
    pub fn ping_many(&self, ips: &[Ipv4Addr]) -> HashMap<Ipv4Addr, bool> {
        let pool = ThreadPool::new(MAX_CONCURRENT_PROBES);
        let (tx, rx) = mpsc::channel();

        for &ip in ips {
            let tx = tx.clone();
            let pinger = self.clone();
            pool.execute(move || {
                let _ = tx.send((ip, pinger.ping(ip)));
            });
        }

        // channel closes once every probe task has reported
        drop(tx);
        rx.iter().collect()
    }
}

#[cfg(test)]
#[path = "./probe_tests.rs"]
mod tests;
