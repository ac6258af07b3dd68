use std::net::IpAddr;
use std::net::Ipv4Addr;

use super::net::*;

#[test]
fn ip_literals_are_detected() {
    assert_eq!(
        parse_ip_literal("10.0.0.7"),
        Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)))
    );
    assert!(parse_ip_literal("[::1]").is_some());
    assert!(parse_ip_literal("node-0.node-hs").is_none());
    assert!(parse_ip_literal("").is_none());
}

#[test]
fn mapped_ipv6_collapses_to_ipv4() {
    assert_eq!(
        parse_ip_literal("::ffff:10.1.2.3"),
        Some(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
    );
}

#[test]
fn hostnames_normalize_case_and_root_dot() {
    assert_eq!(normalize_hostname("Node-0.Node-HS.default.svc."), "node-0.node-hs.default.svc");
    assert_eq!(normalize_hostname(" node-1 "), "node-1");
}

#[test]
fn split_host_port_accepts_every_reply_form() {
    assert_eq!(split_host_port("node-0:6379").unwrap(), ("node-0".to_string(), 6379));
    assert_eq!(split_host_port("node-0 6379").unwrap(), ("node-0".to_string(), 6379));
    assert_eq!(split_host_port("[fd00::1]:6380").unwrap(), ("fd00::1".to_string(), 6380));
}

#[test]
fn split_host_port_rejects_malformed_input() {
    assert!(split_host_port("node-0").is_err());
    assert!(split_host_port(":6379").is_err());
    assert!(split_host_port("node-0:notaport").is_err());
    assert!(split_host_port("[fd00::1]6380").is_err());
}
