use std::collections::HashMap;

use redis::Value;

use super::*;

fn bulk(pairs: &[(&str, &str)]) -> Value {
    Value::Bulk(
        pairs
            .iter()
            .flat_map(|(k, v)| [Value::Data(k.as_bytes().to_vec()), Value::Data(v.as_bytes().to_vec())])
            .collect(),
    )
}

#[test]
fn peer_from_fields_reads_address_and_flags() {
    let fields: HashMap<String, String> = [
        ("name", "10.0.0.11:6379"),
        ("ip", "10.0.0.11"),
        ("port", "6379"),
        ("flags", "slave,s_down"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let peer = MonitorPeer::from_fields(&fields).unwrap();

    assert_eq!(peer.ip, "10.0.0.11");
    assert_eq!(peer.port, 6379);
    assert!(peer.has_flag("slave"));
    assert!(peer.is_down());
}

#[test]
fn peer_without_port_is_skipped() {
    let fields: HashMap<String, String> = [("ip".to_string(), "10.0.0.11".to_string())].into();

    assert!(MonitorPeer::from_fields(&fields).is_none());
}

#[test]
fn peer_list_is_parsed_by_field_name_not_position() {
    let reply = Value::Bulk(vec![
        bulk(&[
            ("name", "a"),
            ("ip", "10.0.0.11"),
            ("port", "6379"),
            ("runid", "x"),
            ("flags", "slave"),
        ]),
        // Same fields in another order, as newer monitors return them
        bulk(&[
            ("flags", "slave,disconnected"),
            ("port", "6380"),
            ("link-pending-commands", "0"),
            ("ip", "10.0.0.12"),
            ("name", "b"),
        ]),
        bulk(&[("name", "no-address")]),
    ]);

    let peers = parse_peer_list(&reply).unwrap();

    assert_eq!(peers.len(), 2);
    assert_eq!(peers[0].name, "a");
    assert!(!peers[0].is_down());
    assert_eq!(peers[1].port, 6380);
    assert!(peers[1].is_down());
}

#[test]
fn empty_and_nil_lists_are_empty() {
    assert!(parse_peer_list(&Value::Nil).unwrap().is_empty());
    assert!(parse_peer_list(&Value::Bulk(vec![])).unwrap().is_empty());
}

#[test]
fn non_list_reply_is_rejected() {
    let err = parse_peer_list(&Value::Okay).unwrap_err();

    assert!(err.to_string().contains("SENTINEL peers"));
}
