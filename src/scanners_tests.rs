use super::*;
use std::str::FromStr;
use std::sync::atomic::AtomicUsize;

fn result(ip: &str) -> IpScanResult {
    IpScanResult {
        ip: Ipv4Addr::from_str(ip).unwrap(),
        mac: None,
        hostname: String::new(),
        vendor: String::new(),
        was_arp_requested: true,
        was_pinged: true,
        responded_to_ping: false,
    }
}

#[test]
fn default_options_probe_and_resolve_everything_once() {
    let options = ScanOptions::default();

    assert!(options.send_arp);
    assert!(options.send_ping);
    assert!(options.resolve_hostnames);
    assert!(options.strip_dns_suffix);
    assert!(!options.shuffle_addresses);
    assert_eq!(options.repeats, 1);
    assert_eq!(options.arp_timeout, Duration::from_secs(1));
    assert_eq!(options.ping_timeout, Duration::from_secs(1));
    assert_eq!(options.dns_timeout, Duration::from_secs(1));
}

#[test]
fn builder_rejects_zero_repeats() {
    let result = ScanOptions::builder().repeats(0usize).build();
    assert!(result.is_err());
}

#[test]
fn builder_accepts_overrides() {
    let options = ScanOptions::builder()
        .send_ping(false)
        .repeats(3usize)
        .arp_timeout(Duration::from_millis(250))
        .build()
        .unwrap();

    assert!(!options.send_ping);
    assert_eq!(options.repeats, 3);
    assert_eq!(options.arp_timeout, Duration::from_millis(250));
}

#[test]
fn offline_result_has_no_status_flags() {
    let result = result("192.168.1.5");

    assert!(!result.responded_to_arp());
    assert!(!result.is_online());
    assert!(!result.has_hostname());
    assert!(!result.has_vendor());
}

#[test]
fn arp_reply_alone_marks_a_host_online() {
    let mut result = result("192.168.1.5");
    result.mac = Some(MacAddr::from_str("aa:bb:cc:dd:ee:ff").unwrap());

    assert!(result.responded_to_arp());
    assert!(result.is_online());
}

#[test]
fn ping_reply_alone_marks_a_host_online() {
    let mut result = result("192.168.1.5");
    result.responded_to_ping = true;

    assert!(!result.responded_to_arp());
    assert!(result.is_online());
}

#[test]
fn displays_offline_hosts_tersely() {
    let result = result("192.168.1.5");
    assert_eq!(result.to_string(), "192.168.1.5 [Offline]");
}

#[test]
fn displays_online_hosts_with_everything_known_about_them() {
    let mut result = result("192.168.1.5");
    result.mac = Some(MacAddr::from_str("aa:bb:cc:dd:ee:ff").unwrap());
    result.hostname = "printer".to_string();
    result.vendor = "Hewlett Packard".to_string();
    result.responded_to_ping = true;

    assert_eq!(
        result.to_string(),
        "192.168.1.5 aa:bb:cc:dd:ee:ff printer (Hewlett Packard) [Pings]"
    );
}

#[test]
fn serializes_macs_as_strings() {
    let mut result = result("192.168.1.5");
    result.mac = Some(MacAddr::from_str("aa:bb:cc:dd:ee:ff").unwrap());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["mac"], "aa:bb:cc:dd:ee:ff");

    let back: IpScanResult = serde_json::from_value(json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn serializes_missing_macs_as_null() {
    let result = result("192.168.1.5");

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["mac"].is_null());

    let back: IpScanResult = serde_json::from_value(json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn run_guard_notifies_listeners_on_both_transitions() {
    let running = Arc::new(AtomicBool::new(false));
    let listeners: ListenerSet = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_listener = Arc::clone(&seen);
    listeners.lock().unwrap().push(Box::new(move |state| {
        seen_by_listener.lock().unwrap().push(state);
    }));

    {
        let _guard = RunGuard::acquire(&running, &listeners).unwrap();
        assert!(running.load(Ordering::SeqCst));
    }

    assert!(!running.load(Ordering::SeqCst));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ScannerState::Running, ScannerState::Idle]
    );
}

#[test]
fn run_guard_refuses_a_second_acquisition() {
    let running = Arc::new(AtomicBool::new(false));
    let listeners: ListenerSet = Arc::new(Mutex::new(Vec::new()));

    let _guard = RunGuard::acquire(&running, &listeners).unwrap();
    assert!(matches!(
        RunGuard::acquire(&running, &listeners),
        Err(LanWhoError::AlreadyRunning)
    ));
}

#[test]
fn run_guard_releases_even_when_listeners_count_calls() {
    let running = Arc::new(AtomicBool::new(false));
    let listeners: ListenerSet = Arc::new(Mutex::new(Vec::new()));

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_by_listener = Arc::clone(&calls);
    listeners.lock().unwrap().push(Box::new(move |_| {
        calls_by_listener.fetch_add(1, Ordering::SeqCst);
    }));

    drop(RunGuard::acquire(&running, &listeners).unwrap());
    let _guard = RunGuard::acquire(&running, &listeners).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
