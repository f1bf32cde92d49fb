//! Provides helpers for creating and sending link-layer packets

use core::time;
use std::io;

pub mod arp_packet;
pub mod wire;

/// Default timing for throttling packet sends to prevent packet loss
pub const DEFAULT_PACKET_SEND_TIMING: time::Duration = time::Duration::from_micros(50);

/// Trait describing a packet reader
pub trait Reader: Send + Sync {
    /// Should return the next packet off of the wire, or an error of kind
    /// [`io::ErrorKind::TimedOut`] when no frame arrived within the wire's
    /// read timeout
    fn next_packet(&mut self) -> Result<&[u8], io::Error>;
}

/// Trait describing a packet sender
pub trait Sender: Send + Sync {
    /// Should send a packet over the wire
    fn send(&mut self, packet: &[u8]) -> Result<(), io::Error>;
}

#[cfg(test)]
#[path = "./packet_tests.rs"]
#[doc(hidden)]
pub mod mocks;
