//! Bidirectional address resolution between IPv4 and MAC addresses

pub mod ip_resolver;
pub mod mac_resolver;
