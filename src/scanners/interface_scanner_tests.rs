use super::*;
use mockall::predicate::*;
use pnet::packet::{arp::ArpPacket, ethernet::EthernetPacket};
use std::io;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use crate::hostname::MockReverseLookup;
use crate::packet::arp_packet::create_arp_reply;
use crate::packet::mocks::{MockPacketReader, MockPacketSender};
use crate::packet::wire::Wire;
use crate::probe::MockIcmpEcho;
use crate::resolve::ip_resolver::MockArpCache;
use crate::scanners::{ScanOptionsBuilder, ScannerState};
use crate::vendor::VendorResolver;

const PKT_ETH_SIZE: usize = EthernetPacket::minimum_packet_size();
const PKT_ARP_SIZE: usize = ArpPacket::minimum_packet_size();
const PKT_TOTAL_SIZE: usize = PKT_ETH_SIZE + PKT_ARP_SIZE;

struct FixedVendor;

impl VendorResolver for FixedVendor {
    fn lookup(&self, _mac: &MacAddr) -> String {
        "Acme Corp".to_string()
    }
}

fn ip(s: &str) -> Ipv4Addr {
    Ipv4Addr::from_str(s).unwrap()
}

// a /29: host addresses 192.168.1.1 through 192.168.1.6
fn test_interface() -> Arc<NetworkInterface> {
    Arc::new(NetworkInterface {
        name: "en0".to_string(),
        description: "test interface".to_string(),
        ipv4: ip("192.168.1.1"),
        netmask: ip("255.255.255.248"),
        ips: Vec::new(),
        mac: MacAddr::from_str("00:11:22:33:44:55").unwrap(),
        dns_suffix: "lan.local".to_string(),
        flags: 0,
        index: 1,
    })
}

fn mock_wire_factory(reader: MockPacketReader, sender: MockPacketSender) -> Arc<WireFactory> {
    let wire = Wire {
        reader: Arc::new(Mutex::new(reader)),
        sender: Arc::new(Mutex::new(sender)),
    };
    Arc::new(move |_: &NetworkInterface| Ok(wire.clone()))
}

fn options() -> ScanOptionsBuilder {
    let mut builder = ScanOptions::builder();
    builder
        .arp_timeout(Duration::from_millis(100))
        .ping_timeout(Duration::from_millis(100))
        .dns_timeout(Duration::from_millis(100));
    builder
}

#[test]
fn builder_rejects_an_invalid_netmask() {
    let interface = Arc::new(NetworkInterface {
        netmask: ip("255.0.255.0"),
        ..(*test_interface()).clone()
    });

    let result = InterfaceScanner::builder().interface(interface).build();
    assert!(result.is_err());
}

#[test]
fn pings_every_host_but_resolves_hostnames_only_for_responders() {
    let responder = ip("192.168.1.2");

    let mut echo = MockIcmpEcho::new();
    echo.expect_echo()
        .times(6)
        .returning(move |target, _| Ok(target == responder));

    // a strict mock: a lookup for any non-responder fails the test
    let mut lookup = MockReverseLookup::new();
    lookup
        .expect_lookup()
        .with(eq(responder))
        .times(1)
        .returning(|_| Ok("printer.lan.local".to_string()));

    let scanner = InterfaceScanner::builder()
        .interface(test_interface())
        .options(options().send_arp(false).build().unwrap())
        .echo(Arc::new(echo) as Arc<dyn IcmpEcho>)
        .reverse_lookup(Arc::new(lookup) as Arc<dyn ReverseLookup>)
        .build()
        .unwrap();

    let results = scanner.scan_network().unwrap();

    assert_eq!(results.len(), 6);
    assert_eq!(results[0].ip, ip("192.168.1.1"));
    assert_eq!(results[5].ip, ip("192.168.1.6"));

    let responder_result = results.iter().find(|r| r.ip == responder).unwrap();
    assert!(responder_result.responded_to_ping);
    // the interface suffix is stripped from the resolved name
    assert_eq!(responder_result.hostname, "printer");

    for result in results.iter().filter(|r| r.ip != responder) {
        assert!(!result.responded_to_ping);
        assert!(!result.has_hostname());
        assert!(!result.was_arp_requested);
        assert!(result.was_pinged);
    }
}

#[test]
#[allow(static_mut_refs)]
fn scan_address_resolves_mac_and_vendor_over_arp() {
    static mut PACKET: [u8; PKT_TOTAL_SIZE] = [0u8; PKT_TOTAL_SIZE];
    let interface = test_interface();
    let target = ip("192.168.1.2");
    let device_mac = MacAddr::from_str("de:ad:be:ef:00:01").unwrap();

    create_arp_reply(device_mac, target, interface.mac, interface.ipv4, unsafe {
        &mut PACKET
    });

    let mut reader = MockPacketReader::new();
    reader
        .expect_next_packet()
        .returning(|| Ok(unsafe { &PACKET }));

    let mut sender = MockPacketSender::new();
    sender.expect_send().times(1).returning(|_| Ok(()));

    let scanner = InterfaceScanner::builder()
        .interface(interface)
        .options(
            options()
                .send_ping(false)
                .resolve_hostnames(false)
                .vendor(Arc::new(FixedVendor) as Arc<dyn VendorResolver>)
                .build()
                .unwrap(),
        )
        .wire_factory(mock_wire_factory(reader, sender))
        .build()
        .unwrap();

    let result = scanner.scan_address(target).unwrap();

    assert_eq!(result.ip, target);
    assert_eq!(result.mac, Some(device_mac));
    assert_eq!(result.vendor, "Acme Corp");
    assert!(result.was_arp_requested);
    assert!(!result.was_pinged);
    assert!(result.is_online());
}

#[test]
fn scan_address_rejects_addresses_outside_the_subnet() {
    let scanner = InterfaceScanner::builder()
        .interface(test_interface())
        .build()
        .unwrap();

    assert!(matches!(
        scanner.scan_address(ip("10.0.0.1")),
        Err(LanWhoError::NotOnNetwork(addr)) if addr == ip("10.0.0.1")
    ));
    // the rejection happens before the single-flight guard is taken
    assert!(!scanner.is_running());
}

#[test]
fn refuses_concurrent_scans() {
    let scanner = InterfaceScanner::builder()
        .interface(test_interface())
        .running(Arc::new(AtomicBool::new(true)))
        .build()
        .unwrap();

    assert!(scanner.is_running());
    assert!(matches!(
        scanner.scan_network(),
        Err(LanWhoError::AlreadyRunning)
    ));
    assert!(matches!(
        scanner.scan_address(ip("192.168.1.2")),
        Err(LanWhoError::AlreadyRunning)
    ));
    assert!(matches!(
        scanner.scan_mac(MacAddr::zero()),
        Err(LanWhoError::AlreadyRunning)
    ));
}

#[test]
fn scan_mac_probes_the_cached_address_on_a_cache_hit() {
    let cached = ip("192.168.1.2");
    let device_mac = MacAddr::from_str("de:ad:be:ef:00:01").unwrap();

    let mut cache = MockArpCache::new();
    cache
        .expect_entries()
        .returning(move || Ok(vec![(cached, device_mac)]));

    // only the cached address gets probed, not the whole subnet
    let mut echo = MockIcmpEcho::new();
    echo.expect_echo()
        .with(eq(cached), always())
        .times(1)
        .returning(|_, _| Ok(true));

    let scanner = InterfaceScanner::builder()
        .interface(test_interface())
        .options(
            options()
                .send_arp(false)
                .resolve_hostnames(false)
                .build()
                .unwrap(),
        )
        .echo(Arc::new(echo) as Arc<dyn IcmpEcho>)
        .arp_cache(Arc::new(cache) as Arc<dyn ArpCache>)
        .build()
        .unwrap();

    let result = scanner.scan_mac(device_mac).unwrap().unwrap();
    assert_eq!(result.ip, cached);
    assert!(result.responded_to_ping);
}

#[test]
#[allow(static_mut_refs)]
fn scan_mac_falls_back_to_a_subnet_sweep_on_a_cache_miss() {
    static mut PACKET: [u8; PKT_TOTAL_SIZE] = [0u8; PKT_TOTAL_SIZE];
    let interface = test_interface();
    let owner = ip("192.168.1.3");
    let device_mac = MacAddr::from_str("de:ad:be:ef:00:01").unwrap();

    create_arp_reply(device_mac, owner, interface.mac, interface.ipv4, unsafe {
        &mut PACKET
    });

    let mut cache = MockArpCache::new();
    cache.expect_entries().returning(|| Ok(Vec::new()));

    let mut reader = MockPacketReader::new();
    reader
        .expect_next_packet()
        .times(1)
        .returning(|| Ok(unsafe { &PACKET }));
    reader
        .expect_next_packet()
        .returning(|| Err(io::Error::from(io::ErrorKind::TimedOut)));

    // one request per host address on the /29
    let mut sender = MockPacketSender::new();
    sender.expect_send().times(6).returning(|_| Ok(()));

    let scanner = InterfaceScanner::builder()
        .interface(interface)
        .options(
            options()
                .send_ping(false)
                .resolve_hostnames(false)
                .build()
                .unwrap(),
        )
        .wire_factory(mock_wire_factory(reader, sender))
        .arp_cache(Arc::new(cache) as Arc<dyn ArpCache>)
        .build()
        .unwrap();

    let result = scanner.scan_mac(device_mac).unwrap().unwrap();
    assert_eq!(result.ip, owner);
    assert_eq!(result.mac, Some(device_mac));
}

#[test]
fn scan_mac_returns_none_when_nobody_owns_the_mac() {
    let mut cache = MockArpCache::new();
    cache.expect_entries().returning(|| Ok(Vec::new()));

    let mut echo = MockIcmpEcho::new();
    echo.expect_echo().returning(|_, _| Ok(false));

    let scanner = InterfaceScanner::builder()
        .interface(test_interface())
        .options(
            options()
                .send_arp(false)
                .resolve_hostnames(false)
                .build()
                .unwrap(),
        )
        .echo(Arc::new(echo) as Arc<dyn IcmpEcho>)
        .arp_cache(Arc::new(cache) as Arc<dyn ArpCache>)
        .build()
        .unwrap();

    let result = scanner
        .scan_mac(MacAddr::from_str("de:ad:be:ef:00:01").unwrap())
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn notifies_listeners_around_a_scan() {
    let scanner = InterfaceScanner::builder()
        .interface(test_interface())
        .options(
            options()
                .send_arp(false)
                .send_ping(false)
                .resolve_hostnames(false)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_listener = Arc::clone(&seen);
    scanner.on_state_change(Box::new(move |state| {
        seen_by_listener.lock().unwrap().push(state);
    }));

    let results = scanner.scan_network().unwrap();

    // with every stage disabled the sweep still yields one result per host
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| !r.is_online()));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ScannerState::Running, ScannerState::Idle]
    );
    assert!(!scanner.is_running());
}
