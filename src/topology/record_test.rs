use super::*;
use crate::ErrorKind;

const RECORD: &str = "\
07c37dfeb235213a872192d90877d0cd55635b91 10.0.0.12:6379@16379,node-2.node-hs myself,master - 0 1700000000000 3 connected 10923-16383
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 10.0.0.10:6379@16379,node-0.node-hs master - 0 1700000000123 1 connected 0-5460
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 10.0.0.11:6379@16379,node-1.node-hs master,fail - 1700000000000 1700000000000 2 disconnected 5461-10922
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 10.0.0.13:6379@16379,node-3.node-hs slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1700000000456 1 connected
vars currentEpoch 6 lastVoteEpoch 0
";

#[test]
fn parses_entries_and_skips_vars() {
    let record = TopologyRecord::parse(RECORD).unwrap();

    assert_eq!(record.entries().len(), 4);
    let me = record.self_entry().unwrap();
    assert_eq!(me.ip, "10.0.0.12");
    assert_eq!(me.port, 6379);
    assert_eq!(me.bus_port, 16379);
    assert_eq!(me.hostname.as_deref(), Some("node-2.node-hs"));
    assert!(me.is_primary());

    let replica = record.entry("292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f").unwrap();
    assert!(replica.is_replica());
    assert_eq!(
        replica.primary_id.as_deref(),
        Some("e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca")
    );
}

#[test]
fn stale_peers_are_flagged_or_disconnected() {
    let record = TopologyRecord::parse(RECORD).unwrap();

    let stale: Vec<_> = record.stale_peers().map(|e| e.ip.clone()).collect();
    assert_eq!(stale, vec!["10.0.0.11".to_string()]);
}

#[test]
fn self_rewrite_changes_only_the_self_address() {
    let mut record = TopologyRecord::parse(RECORD).unwrap();

    assert!(record.rewrite_self_address("10.0.9.99").unwrap());

    let expected = RECORD.replacen("10.0.0.12:6379", "10.0.9.99:6379", 1);
    assert_eq!(record.render(), expected);
    assert_eq!(record.self_entry().unwrap().ip, "10.0.9.99");
}

#[test]
fn self_rewrite_is_a_no_op_when_address_is_current() {
    let mut record = TopologyRecord::parse(RECORD).unwrap();

    assert!(!record.rewrite_self_address("10.0.0.12").unwrap());
    assert_eq!(record.render(), RECORD);
}

#[test]
fn self_rewrite_fills_an_empty_address() {
    let fresh = "abc :6379@16379 myself,master - 0 0 0 connected\nvars currentEpoch 0 lastVoteEpoch 0\n";
    let mut record = TopologyRecord::parse(fresh).unwrap();

    assert!(record.rewrite_self_address("10.0.0.4").unwrap());
    assert_eq!(
        record.render(),
        "abc 10.0.0.4:6379@16379 myself,master - 0 0 0 connected\nvars currentEpoch 0 lastVoteEpoch 0\n"
    );
}

#[test]
fn record_without_self_is_rejected() {
    let text = RECORD.replace("myself,master", "master");
    let record = TopologyRecord::parse(&text).unwrap();

    let err = record.self_entry().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[test]
fn short_lines_are_malformed() {
    let err = TopologyRecord::parse("abc 10.0.0.1:6379@16379 master\n").unwrap_err();

    assert!(err.to_string().contains("line 1"));
}
