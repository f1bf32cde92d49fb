//! Implements a default Wire using pnet

use pnet::datalink;
use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    error::{LanWhoError, Result},
    network::NetworkInterface,
    packet::{Reader, Sender},
};

/// How long a single capture read blocks before giving up
///
/// Kept short so receive loops can re-check their overall deadline and
/// early-exit conditions on every iteration instead of blocking
/// indefinitely on a quiet wire.
pub const WIRE_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// A capture handle: a packet Reader and packet Sender pair for one
/// interface
///
/// Exactly one resolution call may use a Wire at a time; replies would be
/// misattributed otherwise. The scanners enforce this with their
/// single-flight flag and open a fresh Wire per resolution call.
#[derive(Clone)]
pub struct Wire {
    /// Reads frames off the wire
    pub reader: Arc<Mutex<dyn Reader>>,
    /// Puts frames on the wire
    pub sender: Arc<Mutex<dyn Sender>>,
}

/// Factory for opening a [`Wire`] on an interface, so scanners can open a
/// capture handle per resolution call and tests can inject mocks
pub type WireFactory = dyn Fn(&NetworkInterface) -> Result<Wire> + Send + Sync;

/// A PNetReader implementation of packet Reader
pub struct PNetReader {
    receiver: Box<dyn datalink::DataLinkReceiver>,
}

// Implements the Reader trait for our PNet implementation
impl Reader for PNetReader {
    fn next_packet(&mut self) -> std::result::Result<&[u8], io::Error> {
        self.receiver.next()
    }
}

unsafe impl Sync for PNetReader {}

/// A PNetSender implementation of packet Sender
pub struct PNetSender {
    sender: Box<dyn datalink::DataLinkSender>,
}

// Implements the Sender trait for our PNet implementation
impl Sender for PNetSender {
    fn send(&mut self, packet: &[u8]) -> std::result::Result<(), io::Error> {
        match self.sender.send_to(packet, None) {
            Some(res) => res,
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "failed to send packet",
            )),
        }
    }
}

unsafe impl Sync for PNetSender {}

/// Opens a capture handle on the given interface in promiscuous mode with
/// a short read timeout
///
/// Example
/// ```no_run
/// # use lanwho::network;
/// # use lanwho::packet::wire;
/// let interface = network::get_default_interface().unwrap();
/// let wire = wire::connect(&interface).unwrap();
/// ```
pub fn connect(interface: &NetworkInterface) -> Result<Wire> {
    let cfg = datalink::Config {
        read_timeout: Some(WIRE_READ_TIMEOUT),
        promiscuous: true,
        ..datalink::Config::default()
    };

    let channel = match datalink::channel(&interface.into(), cfg) {
        Ok(datalink::Channel::Ethernet(tx, rx)) => Ok((tx, rx)),
        Ok(_) => Err(LanWhoError::Wire(
            "failed to create an ethernet channel".to_string(),
        )),
        Err(e) => Err(LanWhoError::Wire(e.to_string())),
    }?;

    Ok(Wire {
        reader: Arc::new(Mutex::new(PNetReader {
            receiver: channel.1,
        })),
        sender: Arc::new(Mutex::new(PNetSender { sender: channel.0 })),
    })
}

#[cfg(test)]
#[path = "./wire_tests.rs"]
mod tests;
