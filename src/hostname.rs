//! Concurrent reverse-DNS hostname resolution

#[cfg(test)]
use mockall::automock;

use std::{
    collections::HashMap,
    io,
    net::Ipv4Addr,
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};
use threadpool::ThreadPool;

/// Upper bound on in-flight lookups during a batched hostname resolution
pub const MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Trait describing a single blocking reverse-DNS lookup
#[cfg_attr(test, automock)]
pub trait ReverseLookup: Send + Sync {
    /// Returns the hostname for the address, or an error when the OS
    /// resolver finds none
    fn lookup(&self, ip: Ipv4Addr) -> Result<String, io::Error>;
}

/// A [`ReverseLookup`] implementation over the system resolver
pub struct DnsLookup;

impl ReverseLookup for DnsLookup {
    fn lookup(&self, ip: Ipv4Addr) -> Result<String, io::Error> {
        dns_lookup::lookup_addr(&ip.into())
    }
}

/// Resolves hostnames with retry, timeout, and optional DNS suffix
/// stripping
#[derive(Clone)]
pub struct HostnameResolver {
    lookup: Arc<dyn ReverseLookup>,
    timeout: Duration,
    retries: usize,
    suffix: Option<String>,
}

impl HostnameResolver {
    /// Returns a new HostnameResolver
    ///
    /// When `suffix` is set, a trailing `.<suffix>` is removed
    /// case-insensitively from every resolved name. `retries` is the total
    /// number of attempts per address and must be at least 1.
    pub fn new(
        lookup: Arc<dyn ReverseLookup>,
        timeout: Duration,
        retries: usize,
        suffix: Option<String>,
    ) -> Self {
        Self {
            lookup,
            timeout,
            retries: retries.max(1),
            suffix,
        }
    }

    /// Resolves the hostname of a single address
    ///
    /// Attempts exceeding the timeout and resolver failures are retried up
    /// to the configured count; an unresolvable address yields an empty
    /// string, never an error.
    pub fn resolve(&self, ip: Ipv4Addr) -> String {
        for _ in 0..self.retries {
            // the OS call has no deadline parameter, so run it on a helper
            // thread and give up at the deadline; a late answer is dropped
            // with the channel
            let (tx, rx) = mpsc::channel();
            let lookup = Arc::clone(&self.lookup);

            thread::spawn(move || {
                let _ = tx.send(lookup.lookup(ip));
            });

            match rx.recv_timeout(self.timeout) {
                Ok(Ok(hostname)) => return self.strip_suffix(hostname),
                Ok(Err(e)) => {
                    log::debug!("cannot find the hostname of {ip}: {e}");
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    log::debug!("hostname resolution of {ip} timed out");
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    log::debug!("hostname resolution of {ip} aborted");
                }
            }
        }

        String::new()
    }

    /// Resolves hostnames for every address concurrently
    ///
    /// Returns only once every lookup has completed or exhausted its
    /// retries; there is no ordering guarantee between lookups.
    pub fn resolve_many(&self, ips: &[Ipv4Addr]) -> HashMap<Ipv4Addr, String> {
        let pool = ThreadPool::new(MAX_CONCURRENT_LOOKUPS);
        let (tx, rx) = mpsc::channel();

        for &ip in ips {
            let tx = tx.clone();
            let resolver = self.clone();
            pool.execute(move || {
                let _ = tx.send((ip, resolver.resolve(ip)));
            });
        }

        // channel closes once every lookup task has reported
        drop(tx);
        rx.iter().collect()
    }

    fn strip_suffix(&self, hostname: String) -> String {
        let Some(suffix) = self.suffix.as_deref() else {
            return hostname;
        };

        if suffix.is_empty() {
            return hostname;
        }

        let dotted = format!(".{}", suffix.to_ascii_lowercase());
        if hostname.to_ascii_lowercase().ends_with(&dotted) {
            hostname[..hostname.len() - dotted.len()].to_string()
        } else {
            hostname
        }
    }
}

#[cfg(test)]
#[path = "./hostname_tests.rs"]
mod tests;
