//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use crate::core::catalog::{
    ChainPolicy, ChainType, Family, Hook, Operator, SetElementType, SetFlag, TimeUnit,
};
use crate::core::expression::{CtMatch, Expression, Match};
use crate::core::fields::{CtKey, IpField, TcpField};
use crate::core::ruleset::{Chain, MetaInfo, Rule, Ruleset, Set, Table};
use crate::core::statement::{Counter, Limit, Verdict};
use std::sync::Mutex;

/// Mutex for tests that change `NFTKIT_NFT_COMMAND`.
///
/// # Example
///
/// ```ignore
/// let _guard = ENV_VAR_MUTEX.lock().unwrap();
/// unsafe {
///     std::env::set_var("NFTKIT_NFT_COMMAND", "/bin/true");
/// }
/// // ... test with custom env state ...
/// unsafe {
///     std::env::remove_var("NFTKIT_NFT_COMMAND");
/// }
/// ```
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// The ruleset of a freshly listed kernel with one ip table, as printed by
/// `nft -j list ruleset`.
pub const LISTED_RULESET: &str = r#"{"nftables": [
    {"metainfo": {"version": "1.0.9", "release_name": "Old Doc Yak #3", "json_schema_version": 1}},
    {"table": {"family": "ip", "name": "FirstTable", "handle": 1}},
    {"set": {"family": "ip", "name": "hosts", "table": "FirstTable", "type": "ipv4_addr", "handle": 4,
             "flags": ["interval"], "elem": [{"prefix": {"addr": "10.0.0.0", "len": 8}}, "192.168.1.10"]}},
    {"chain": {"family": "ip", "table": "FirstTable", "name": "input", "handle": 1,
               "type": "filter", "hook": "input", "prio": 0, "policy": "accept"}},
    {"rule": {"family": "ip", "table": "FirstTable", "chain": "input", "handle": 2, "expr": [
        {"match": {"op": "==", "left": {"payload": {"protocol": "ip", "field": "saddr"}}, "right": "@hosts"}},
        {"match": {"op": "==", "left": {"payload": {"protocol": "tcp", "field": "dport"}},
                   "right": {"set": [22, {"range": [8000, 8080]}]}}},
        {"counter": {"packets": 12, "bytes": 720}},
        {"accept": null}
    ]}},
    {"rule": {"family": "ip", "table": "FirstTable", "chain": "input", "handle": 3, "comment": "rate",
              "expr": [{"limit": {"rate": 20, "per": "second", "inv": true}}, {"drop": null}]}}
]}"#;

/// Typed equivalent of [`LISTED_RULESET`]
pub fn listed_ruleset() -> Ruleset {
    let table = Table {
        handle: Some(1),
        ..Table::new(Family::Ip, "FirstTable")
    };
    let hosts = Set {
        handle: Some(4),
        ..Set::new(&table, "hosts", SetElementType::Ipv4Addr)
            .with_flags([SetFlag::Interval])
            .with_elements(["10.0.0.0/8", "192.168.1.10"])
    };
    let input = Chain {
        handle: Some(1),
        ..Chain::new(&table, "input")
            .base(ChainType::Filter, Hook::Input, 0)
            .with_policy(ChainPolicy::Accept)
    };
    let allow = Rule {
        handle: Some(2),
        ..Rule::new(&input)
            .with_expression(Match::new(IpField::Saddr, Operator::Eq, ["@hosts"]))
            .with_expression(Match::new(TcpField::Dport, Operator::Eq, ["22", "8000-8080"]))
            .with_statement(Counter {
                packets: Some(12),
                bytes: Some(720),
            })
            .with_statement(Verdict::Accept)
    };
    let rate = Rule {
        handle: Some(3),
        ..Rule::new(&input)
            .with_statement(Limit::packets(20, TimeUnit::Second).over())
            .with_statement(Verdict::Drop)
            .with_comment("rate")
    };

    Ruleset {
        metainfo: Some(MetaInfo {
            version: "1.0.9".to_string(),
            release_name: "Old Doc Yak #3".to_string(),
            json_schema_version: "1".to_string(),
        }),
        tables: vec![table],
        chains: vec![input],
        sets: vec![hosts],
        rules: vec![allow, rate],
    }
}

/// An inet filter table with an input chain that accepts established
/// traffic and ssh, built without handles.
pub fn inet_filter() -> Ruleset {
    let table = Table::new(Family::Inet, "filter");
    let input = Chain::new(&table, "input")
        .base(ChainType::Filter, Hook::Input, 0)
        .with_policy(ChainPolicy::Drop);
    let established = Rule::new(&input)
        .with_expression(Expression::Ct(CtMatch::Key(Match::new(
            CtKey::State,
            Operator::Eq,
            ["established", "related"],
        ))))
        .with_statement(Verdict::Accept);
    let ssh = Rule::new(&input)
        .with_expression(Match::new(TcpField::Dport, Operator::Eq, ["22"]))
        .with_statement(Verdict::Accept)
        .with_comment("ssh");

    Ruleset {
        metainfo: None,
        tables: vec![table],
        chains: vec![input],
        sets: Vec::new(),
        rules: vec![established, ssh],
    }
}
