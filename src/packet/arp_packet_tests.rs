use super::*;
use pnet::packet::Packet;
use std::str::FromStr;

#[test]
fn builds_a_broadcast_arp_request() {
    let source_ip = net::Ipv4Addr::from_str("192.168.68.1").unwrap();
    let source_mac = util::MacAddr::from_str("aa:bb:cc:dd:ee:ff").unwrap();
    let target_ip = net::Ipv4Addr::from_str("192.168.68.2").unwrap();

    let request = ArpRequest::builder()
        .source_ip(source_ip)
        .source_mac(source_mac)
        .target_ip(target_ip)
        .build()
        .unwrap();

    let raw = request.to_raw();

    let eth = ethernet::EthernetPacket::new(&raw).unwrap();
    assert_eq!(eth.get_destination(), util::MacAddr::broadcast());
    assert_eq!(eth.get_source(), source_mac);
    assert_eq!(eth.get_ethertype(), ethernet::EtherTypes::Arp);

    let header = arp::ArpPacket::new(eth.payload()).unwrap();
    assert_eq!(header.get_operation(), arp::ArpOperations::Request);
    assert_eq!(header.get_sender_hw_addr(), source_mac);
    assert_eq!(header.get_sender_proto_addr(), source_ip);
    assert_eq!(header.get_target_hw_addr(), util::MacAddr::zero());
    assert_eq!(header.get_target_proto_addr(), target_ip);
}

#[test]
fn fails_to_build_without_a_target() {
    let result = ArpRequest::builder()
        .source_ip(net::Ipv4Addr::UNSPECIFIED)
        .source_mac(util::MacAddr::zero())
        .build();

    assert!(result.is_err());
}
