//! Custom Error and Result types for this library

use std::{
    any::Any,
    net::Ipv4Addr,
    sync::{MutexGuard, PoisonError},
};
use thiserror::Error;

use crate::{
    packet::{arp_packet::ArpRequestBuilderError, Reader, Sender},
    scanners::{interface_scanner::InterfaceScannerBuilderError, ScanOptionsBuilderError},
};

/// Custom Error type for this library
#[derive(Error, Debug)]
pub enum LanWhoError {
    /// The queried IP address is outside every managed interface's subnet
    #[error("ip address {_0} is not on any scanned network")]
    NotOnNetwork(Ipv4Addr),

    /// A scan was requested while another scan is in progress on the same
    /// scanner
    #[error("a scan is already in progress")]
    AlreadyRunning,

    /// Error coming directly off the wire
    #[error("wire error: {_0}")]
    Wire(String),

    /// The provided subnet mask does not form a contiguous run of 1 bits
    #[error("invalid subnet mask: {_0}")]
    InvalidMask(Ipv4Addr),

    /// A vendor dataset record failed validation
    #[error("invalid oui record: {_0}")]
    InvalidOuiRecord(String),

    /// Error obtaining lock on packet reader
    #[error("failed to get lock on packet reader: {_0}")]
    PacketReaderLock(String),

    /// Error obtaining lock on packet sender
    #[error("failed to get lock on packet sender: {_0}")]
    PacketSenderLock(String),

    /// Generic thread error
    #[error("thread error: {_0}")]
    ThreadError(String),

    /// Error generated during ARP packet construction
    #[error("failed to build ARP packet: {_0}")]
    ArpPacketBuild(#[from] ArpRequestBuilderError),

    /// Error resulting from failure to build scan options
    #[error("failed to build scan options: {_0}")]
    ScanOptionsBuild(#[from] ScanOptionsBuilderError),

    /// Error resulting from failure to build an interface scanner
    #[error("failed to build interface scanner: {_0}")]
    ScannerBuild(#[from] InterfaceScannerBuilderError),
}

impl From<Box<dyn Any + Send>> for LanWhoError {
    fn from(value: Box<dyn Any + Send>) -> Self {
        if let Some(s) = value.downcast_ref::<&'static str>() {
            Self::ThreadError(format!("thread panicked with: {}", s))
        } else if let Some(s) = value.downcast_ref::<String>() {
            Self::ThreadError(format!("thread panicked with: {}", s))
        } else {
            Self::ThreadError("thread panicked with an unknown type".into())
        }
    }
}

impl<'a> From<PoisonError<MutexGuard<'a, dyn Reader + 'static>>> for LanWhoError {
    fn from(value: PoisonError<MutexGuard<'a, dyn Reader + 'static>>) -> Self {
        Self::PacketReaderLock(value.to_string())
    }
}

impl<'a> From<PoisonError<MutexGuard<'a, dyn Sender + 'static>>> for LanWhoError {
    fn from(value: PoisonError<MutexGuard<'a, dyn Sender + 'static>>) -> Self {
        Self::PacketSenderLock(value.to_string())
    }
}

/// Custom Result type for this library. All Errors exposed by this library
/// will be returned as [`LanWhoError`]
pub type Result<T> = std::result::Result<T, LanWhoError>;
