//! Wire JSON → ruleset
//!
//! Accepts the output of `nft -j list ruleset`: an object with a single
//! `nftables` array (a bare array is accepted too) whose elements each wrap
//! exactly one entity. Entities are registered in wire order, so a chain,
//! set or rule naming a table or chain that has not been seen yet is an
//! error. The first malformed node aborts the decode.

use crate::core::catalog::{
    ByteUnit, Catalog, ChainPolicy, ChainType, CtDirection, Family, Hook, LogLevel, NatFlag,
    Operator, RejectReason, RejectType, SetElementType, SetFlag, SetPolicy, TimeUnit,
};
use crate::core::error::{DecodeCause, DecodeError, UnknownVariant};
use crate::core::expression::{CtMatch, Expression, Match, TypeMatch};
use crate::core::fields::{
    AhField, ArpField, ArpOperation, CompField, CtDirKey, CtKey, DccpField, DccpType, DstField,
    EspField, EtherField, EtherType, FragField, HbhField, IcmpField, IcmpType, Icmpv6Field,
    Icmpv6Type, Ip6Field, IpField, MetaKey, MhField, RtField, SctpField, TcpField, UdpField,
    UdpliteField, VlanField,
};
use crate::core::registry::Registry;
use crate::core::ruleset::{Chain, MetaInfo, Rule, Ruleset, Set, Table};
use crate::core::statement::{Counter, Limit, Log, Nat, NatKind, Reject, Statement, Verdict};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Longest excerpt of unparseable input kept in a [`DecodeError`]
const EXCERPT_LEN: usize = 256;

/// Decodes wire JSON into a [`Ruleset`].
///
/// # Errors
///
/// Returns `Err` if the input is not JSON, a node does not match the wire
/// schema, a token is outside its catalog, an entity is defined twice or a
/// reference does not resolve. The error carries the offending node's text.
pub fn decode(bytes: &[u8]) -> Result<Ruleset, DecodeError> {
    let root: Value = serde_json::from_slice(bytes).map_err(|e| {
        let text = String::from_utf8_lossy(bytes);
        let excerpt: String = text.chars().take(EXCERPT_LEN).collect();
        DecodeError::new(excerpt, e)
    })?;

    let nodes = match &root {
        Value::Array(nodes) => nodes,
        Value::Object(obj) => obj
            .get("nftables")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                DecodeError::new(
                    root.to_string(),
                    DecodeCause::MissingField("nftables".to_string()),
                )
            })?,
        other => {
            return Err(DecodeError::new(
                other.to_string(),
                DecodeCause::UnexpectedNode(kind_of(other).to_string()),
            ));
        }
    };

    let mut registry = Registry::new();
    for node in nodes {
        decode_node(&mut registry, node)?;
    }
    let ruleset = registry.into_ruleset();
    debug!(
        "Decoded ruleset: {} tables, {} chains, {} sets, {} rules",
        ruleset.tables.len(),
        ruleset.chains.len(),
        ruleset.sets.len(),
        ruleset.rules.len()
    );
    Ok(ruleset)
}

impl Ruleset {
    /// Shorthand for [`decode`]
    pub fn from_json(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Splits a wrapper object `{"<key>": <body>}`.
fn single_key(node: &Value) -> Result<(&str, &Value), DecodeCause> {
    let obj = node
        .as_object()
        .ok_or_else(|| DecodeCause::UnexpectedNode(kind_of(node).to_string()))?;
    let mut entries = obj.iter();
    match (entries.next(), entries.next()) {
        (Some((key, body)), None) => Ok((key.as_str(), body)),
        _ => Err(DecodeCause::InvalidField {
            field: "node",
            reason: format!("must have exactly one key, found {}", obj.len()),
        }),
    }
}

fn from_body<'a, T: Deserialize<'a>>(body: &'a Value) -> Result<T, DecodeCause> {
    T::deserialize(body).map_err(|e| match missing_field(&e) {
        Some(field) => DecodeCause::MissingField(field),
        None => e.into(),
    })
}

/// Field name of serde's "missing field `<name>`" error
fn missing_field(error: &serde_json::Error) -> Option<String> {
    let message = error.to_string();
    let rest = message.strip_prefix("missing field `")?;
    let (field, _) = rest.split_once('`')?;
    Some(field.to_string())
}

fn optional<C: Catalog>(token: Option<&str>) -> Result<Option<C>, UnknownVariant> {
    token.map(C::from_token).transpose()
}

fn decode_node(registry: &mut Registry, node: &Value) -> Result<(), DecodeError> {
    let at_node = |cause: DecodeCause| DecodeError::new(node.to_string(), cause);
    let (kind, body) = single_key(node).map_err(at_node)?;
    match kind {
        "metainfo" => {
            let metainfo = decode_metainfo(body).map_err(at_node)?;
            registry.set_metainfo(metainfo).map_err(at_node)
        }
        "table" => {
            let table = decode_table(body).map_err(at_node)?;
            debug!("Decoded table {} {}", table.family, table.name);
            registry.register_table(table).map_err(at_node)
        }
        "chain" => {
            let chain = decode_chain(body).map_err(at_node)?;
            debug!("Decoded chain {} {} {}", chain.family, chain.table, chain.name);
            registry.register_chain(chain).map_err(at_node)
        }
        "set" => {
            let set = decode_set(body).map_err(at_node)?;
            debug!("Decoded set {} {} {}", set.family, set.table, set.name);
            registry.register_set(set).map_err(at_node)
        }
        "rule" => {
            let rule = decode_rule(registry, node, body)?;
            debug!(
                "Decoded rule {:?} in {} {} {}",
                rule.handle, rule.family, rule.table, rule.chain
            );
            registry.push_rule(rule).map_err(at_node)
        }
        other => Err(at_node(DecodeCause::UnexpectedNode(other.to_string()))),
    }
}

// ─── Entities ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WireMetaInfo {
    version: String,
    release_name: String,
    json_schema_version: Value,
}

#[derive(Deserialize)]
struct WireTable {
    family: String,
    name: String,
    handle: Option<u64>,
}

#[derive(Deserialize)]
struct WireChain {
    family: String,
    table: String,
    name: String,
    handle: Option<u64>,
    #[serde(rename = "type")]
    chain_type: Option<String>,
    hook: Option<String>,
    prio: Option<i32>,
    policy: Option<String>,
}

#[derive(Deserialize)]
struct WireSet {
    family: String,
    table: String,
    name: String,
    #[serde(rename = "type")]
    set_type: String,
    handle: Option<u64>,
    size: Option<u32>,
    timeout: Option<u32>,
    #[serde(rename = "gc-interval")]
    gc_interval: Option<u32>,
    policy: Option<String>,
    flags: Option<OneOrMany>,
    comment: Option<String>,
    elem: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct WireRule {
    family: String,
    table: String,
    chain: String,
    handle: Option<u64>,
    comment: Option<String>,
    #[serde(default)]
    expr: Vec<Value>,
}

/// Flag lists are written as a bare string when they hold a single flag.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn parse<C: Catalog>(&self) -> Result<Vec<C>, UnknownVariant> {
        match self {
            OneOrMany::One(token) => Ok(vec![C::from_token(token)?]),
            OneOrMany::Many(tokens) => tokens.iter().map(|t| C::from_token(t)).collect(),
        }
    }
}

fn decode_metainfo(body: &Value) -> Result<MetaInfo, DecodeCause> {
    let wire: WireMetaInfo = from_body(body)?;
    let json_schema_version = match wire.json_schema_version {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(DecodeCause::InvalidField {
                field: "json_schema_version",
                reason: format!("must be a string or number, found {}", kind_of(&other)),
            });
        }
    };
    Ok(MetaInfo {
        version: wire.version,
        release_name: wire.release_name,
        json_schema_version,
    })
}

fn decode_table(body: &Value) -> Result<Table, DecodeCause> {
    let wire: WireTable = from_body(body)?;
    Ok(Table {
        family: Family::from_token(&wire.family)?,
        name: wire.name,
        handle: wire.handle,
    })
}

fn decode_chain(body: &Value) -> Result<Chain, DecodeCause> {
    let wire: WireChain = from_body(body)?;
    let chain = Chain {
        family: Family::from_token(&wire.family)?,
        table: wire.table,
        name: wire.name,
        handle: wire.handle,
        chain_type: optional::<ChainType>(wire.chain_type.as_deref())?,
        hook: optional::<Hook>(wire.hook.as_deref())?,
        prio: wire.prio,
        policy: optional::<ChainPolicy>(wire.policy.as_deref())?,
    };
    chain.validate()?;
    Ok(chain)
}

fn decode_set(body: &Value) -> Result<Set, DecodeCause> {
    let wire: WireSet = from_body(body)?;
    let elements = wire
        .elem
        .as_deref()
        .map(|elem| elem.iter().map(literal).collect::<Result<Vec<_>, _>>())
        .transpose()?;
    Ok(Set {
        family: Family::from_token(&wire.family)?,
        table: wire.table,
        name: wire.name,
        handle: wire.handle,
        element_type: SetElementType::from_token(&wire.set_type)?,
        size: wire.size,
        timeout: wire.timeout,
        gc_interval: wire.gc_interval,
        policy: optional::<SetPolicy>(wire.policy.as_deref())?,
        flags: wire.flags.as_ref().map(OneOrMany::parse::<SetFlag>).transpose()?,
        comment: wire.comment,
        elements,
    })
}

fn decode_rule(registry: &Registry, node: &Value, body: &Value) -> Result<Rule, DecodeError> {
    let at_node = |cause: DecodeCause| DecodeError::new(node.to_string(), cause);
    let wire: WireRule = from_body(body).map_err(at_node)?;
    let mut rule = Rule {
        family: Family::from_token(&wire.family).map_err(|e| at_node(e.into()))?,
        table: wire.table,
        chain: wire.chain,
        handle: wire.handle,
        expressions: Vec::new(),
        statements: Vec::new(),
        comment: wire.comment,
    };

    for item in &wire.expr {
        let at_item = |cause: DecodeCause| DecodeError::new(item.to_string(), cause);
        let (key, value) = single_key(item).map_err(at_item)?;
        match key {
            "match" | "ct count" => {
                if !rule.statements.is_empty() {
                    return Err(at_item(DecodeCause::InvalidField {
                        field: "expr",
                        reason: format!("'{key}' follows a statement"),
                    }));
                }
                let expression = if key == "match" {
                    decode_match(value)
                } else {
                    decode_ct_count(value)
                }
                .map_err(at_item)?;
                check_set_references(registry, &rule, &expression).map_err(at_item)?;
                rule.expressions.push(expression);
            }
            _ => rule
                .statements
                .push(decode_statement(key, value).map_err(at_item)?),
        }
    }
    Ok(rule)
}

/// Named set lookups (`@name`) must point at a set of the rule's table.
fn check_set_references(
    registry: &Registry,
    rule: &Rule,
    expression: &Expression,
) -> Result<(), DecodeCause> {
    for name in expression_values(expression).filter_map(|v| v.strip_prefix('@')) {
        registry.resolve_set(rule.family, &rule.table, name)?;
    }
    Ok(())
}

fn expression_values(expression: &Expression) -> Box<dyn Iterator<Item = &str> + '_> {
    fn strs(values: &[String]) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(values.iter().map(String::as_str))
    }
    match expression {
        Expression::Ip(m) => strs(&m.values),
        Expression::Ip6(m) => strs(&m.values),
        Expression::Tcp(m) => strs(&m.values),
        Expression::Udp(m) => strs(&m.values),
        Expression::Udplite(m) => strs(&m.values),
        Expression::Sctp(m) => strs(&m.values),
        Expression::Dccp(m) => strs(&m.values),
        Expression::Ah(m) => strs(&m.values),
        Expression::Esp(m) => strs(&m.values),
        Expression::Comp(m) => strs(&m.values),
        Expression::Icmp(m) => strs(&m.values),
        Expression::Icmpv6(m) => strs(&m.values),
        Expression::Ether(m) => strs(&m.values),
        Expression::Dst(m) => strs(&m.values),
        Expression::Frag(m) => strs(&m.values),
        Expression::Hbh(m) => strs(&m.values),
        Expression::Mh(m) => strs(&m.values),
        Expression::Rt(m) => strs(&m.values),
        Expression::Vlan(m) => strs(&m.values),
        Expression::Arp(m) => strs(&m.values),
        Expression::Meta(m) => strs(&m.values),
        Expression::Ct(CtMatch::Key(m)) => strs(&m.values),
        Expression::Ct(CtMatch::Directional { values, .. }) => strs(values),
        Expression::Ct(CtMatch::Count { .. })
        | Expression::DccpType(_)
        | Expression::IcmpType(_)
        | Expression::Icmpv6Type(_)
        | Expression::EtherType(_)
        | Expression::ArpOperation(_) => Box::new(std::iter::empty()),
    }
}

// ─── Expressions ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WireMatch {
    op: String,
    left: Value,
    right: Value,
}

#[derive(Deserialize)]
struct WirePayload {
    protocol: String,
    field: String,
}

#[derive(Deserialize)]
struct WireMeta {
    key: String,
}

#[derive(Deserialize)]
struct WireCt {
    key: String,
    family: Option<String>,
    dir: Option<String>,
}

#[derive(Deserialize)]
struct WireCtCount {
    val: u32,
    #[serde(default)]
    inv: bool,
}

#[derive(Deserialize)]
struct WirePrefix {
    addr: String,
    len: u8,
}

/// Turns a wire value into its literal form: scalars as written, ranges as
/// `a-b` and prefixes as `addr/len`.
pub(crate) fn literal(value: &Value) -> Result<String, DecodeCause> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Object(obj) => {
            if let Some(Value::Array(bounds)) = obj.get("range")
                && let [low, high] = bounds.as_slice()
            {
                return Ok(format!("{}-{}", literal(low)?, literal(high)?));
            }
            if let Some(prefix) = obj.get("prefix") {
                let WirePrefix { addr, len } = from_body(prefix)?;
                return Ok(format!("{addr}/{len}"));
            }
            Err(DecodeCause::InvalidField {
                field: "value",
                reason: format!("unsupported literal {value}"),
            })
        }
        Value::Null | Value::Array(_) => Err(DecodeCause::InvalidField {
            field: "value",
            reason: format!("unsupported literal {value}"),
        }),
    }
}

/// Right-hand side of a match: a scalar, `{"set": [...]}` or a plain array.
fn literals(right: &Value) -> Result<Vec<String>, DecodeCause> {
    let items = match right {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("set") {
            Some(Value::Array(items)) => items,
            _ => return Ok(vec![literal(right)?]),
        },
        _ => return Ok(vec![literal(right)?]),
    };
    items.iter().map(literal).collect()
}

fn field_match<F: Catalog>(
    field: &str,
    op: Operator,
    values: Vec<String>,
) -> Result<Match<F>, UnknownVariant> {
    Ok(Match {
        field: F::from_token(field)?,
        op,
        values,
    })
}

fn type_match<T: Catalog>(op: Operator, values: &[String]) -> Result<TypeMatch<T>, UnknownVariant> {
    Ok(TypeMatch {
        op,
        types: values
            .iter()
            .map(|v| T::from_token(v))
            .collect::<Result<_, _>>()?,
    })
}

fn decode_match(body: &Value) -> Result<Expression, DecodeCause> {
    let wire: WireMatch = from_body(body)?;
    let op = Operator::from_token(&wire.op)?;
    let values = literals(&wire.right)?;
    let (kind, left) = single_key(&wire.left)?;
    match kind {
        "payload" => decode_payload(left, op, values),
        "meta" => {
            let WireMeta { key } = from_body(left)?;
            Ok(field_match::<MetaKey>(&key, op, values)?.into())
        }
        "ct" => decode_ct(left, op, values),
        other => Err(UnknownVariant::new("match left", other).into()),
    }
}

fn decode_payload(left: &Value, op: Operator, values: Vec<String>) -> Result<Expression, DecodeCause> {
    let WirePayload { protocol, field } = from_body(left)?;
    let f = field.as_str();
    let expression: Expression = match (protocol.as_str(), f) {
        ("ether", "type") => type_match::<EtherType>(op, &values)?.into(),
        ("arp", "operation") => type_match::<ArpOperation>(op, &values)?.into(),
        ("dccp", "type") => type_match::<DccpType>(op, &values)?.into(),
        ("icmp", "type") => type_match::<IcmpType>(op, &values)?.into(),
        ("icmpv6", "type") => type_match::<Icmpv6Type>(op, &values)?.into(),
        ("ip", _) => field_match::<IpField>(f, op, values)?.into(),
        ("ip6", _) => field_match::<Ip6Field>(f, op, values)?.into(),
        ("tcp", _) => field_match::<TcpField>(f, op, values)?.into(),
        ("udp", _) => field_match::<UdpField>(f, op, values)?.into(),
        ("udplite", _) => field_match::<UdpliteField>(f, op, values)?.into(),
        ("sctp", _) => field_match::<SctpField>(f, op, values)?.into(),
        ("dccp", _) => field_match::<DccpField>(f, op, values)?.into(),
        ("ah", _) => field_match::<AhField>(f, op, values)?.into(),
        ("esp", _) => field_match::<EspField>(f, op, values)?.into(),
        ("comp", _) => field_match::<CompField>(f, op, values)?.into(),
        ("icmp", _) => field_match::<IcmpField>(f, op, values)?.into(),
        ("icmpv6", _) => field_match::<Icmpv6Field>(f, op, values)?.into(),
        ("ether", _) => field_match::<EtherField>(f, op, values)?.into(),
        ("dst", _) => field_match::<DstField>(f, op, values)?.into(),
        ("frag", _) => field_match::<FragField>(f, op, values)?.into(),
        ("hbh", _) => field_match::<HbhField>(f, op, values)?.into(),
        ("mh", _) => field_match::<MhField>(f, op, values)?.into(),
        ("rt", _) => field_match::<RtField>(f, op, values)?.into(),
        ("vlan", _) => field_match::<VlanField>(f, op, values)?.into(),
        ("arp", _) => field_match::<ArpField>(f, op, values)?.into(),
        (other, _) => return Err(UnknownVariant::new("protocol", other).into()),
    };
    Ok(expression)
}

fn decode_ct(left: &Value, op: Operator, values: Vec<String>) -> Result<Expression, DecodeCause> {
    let wire: WireCt = from_body(left)?;
    let ct = match wire.dir.as_deref() {
        Some(dir) => CtMatch::Directional {
            dir: CtDirection::from_token(dir)?,
            family: optional::<Family>(wire.family.as_deref())?,
            key: CtDirKey::from_token(&wire.key)?,
            op,
            values,
        },
        None if wire.family.is_some() => {
            return Err(DecodeCause::InvalidField {
                field: "family",
                reason: "is only valid with a ct direction".to_string(),
            });
        }
        None => CtMatch::Key(field_match::<CtKey>(&wire.key, op, values)?),
    };
    Ok(Expression::Ct(ct))
}

fn decode_ct_count(body: &Value) -> Result<Expression, DecodeCause> {
    let WireCtCount { val, inv } = from_body(body)?;
    Ok(Expression::ct_count(val, inv))
}

// ─── Statements ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireTarget {
    target: String,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WireNat {
    addr: Option<Value>,
    port: Option<Value>,
    flags: Option<OneOrMany>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireLimit {
    rate: u64,
    per: Option<String>,
    rate_unit: Option<String>,
    #[serde(default)]
    inv: bool,
    burst: Option<u32>,
    burst_unit: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WireLog {
    prefix: Option<String>,
    level: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WireCounter {
    packets: Option<u64>,
    bytes: Option<u64>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WireReject {
    #[serde(rename = "type")]
    reject_type: Option<String>,
    expr: Option<String>,
}

fn decode_statement(key: &str, body: &Value) -> Result<Statement, DecodeCause> {
    let statement: Statement = match key {
        "accept" => bare_verdict(key, body, Verdict::Accept)?,
        "drop" => bare_verdict(key, body, Verdict::Drop)?,
        "queue" => bare_verdict(key, body, Verdict::Queue)?,
        "continue" => bare_verdict(key, body, Verdict::Continue)?,
        "return" => bare_verdict(key, body, Verdict::Return)?,
        "jump" => Verdict::Jump(from_body::<WireTarget>(body)?.target).into(),
        "goto" => Verdict::Goto(from_body::<WireTarget>(body)?.target).into(),
        "snat" | "dnat" | "redirect" | "masquerade" => {
            decode_nat(NatKind::from_token(key)?, body)?.into()
        }
        "limit" => decode_limit(body)?.into(),
        "log" => {
            let wire = from_body::<Option<WireLog>>(body)?.unwrap_or_default();
            Log {
                prefix: wire.prefix,
                level: optional::<LogLevel>(wire.level.as_deref())?,
            }
            .into()
        }
        "counter" => {
            let wire = from_body::<Option<WireCounter>>(body)?.unwrap_or_default();
            Counter {
                packets: wire.packets,
                bytes: wire.bytes,
            }
            .into()
        }
        "reject" => {
            let wire = from_body::<Option<WireReject>>(body)?.unwrap_or_default();
            Reject {
                reject_type: optional::<RejectType>(wire.reject_type.as_deref())?,
                reason: optional::<RejectReason>(wire.expr.as_deref())?,
            }
            .into()
        }
        other => return Err(UnknownVariant::new("statement", other).into()),
    };
    statement.validate()?;
    Ok(statement)
}

/// Verdicts without a target carry `null`; anything else is a form this
/// model cannot hold.
fn bare_verdict(key: &str, body: &Value, verdict: Verdict) -> Result<Statement, DecodeCause> {
    if !body.is_null() {
        return Err(DecodeCause::InvalidField {
            field: "verdict",
            reason: format!("{key} takes no arguments, found {body}"),
        });
    }
    Ok(verdict.into())
}

fn decode_nat(kind: NatKind, body: &Value) -> Result<Nat, DecodeCause> {
    let wire = from_body::<Option<WireNat>>(body)?.unwrap_or_default();
    let port = match &wire.port {
        None => None,
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.parse().ok(),
        Some(_) => None,
    };
    if wire.port.is_some() && port.is_none() {
        return Err(DecodeCause::InvalidField {
            field: "port",
            reason: "must be a port number".to_string(),
        });
    }
    Ok(Nat {
        kind,
        addr: wire.addr.as_ref().map(literal).transpose()?,
        port,
        flags: wire
            .flags
            .as_ref()
            .map(OneOrMany::parse::<NatFlag>)
            .transpose()?
            .unwrap_or_default(),
    })
}

/// `"packets"` is how nft spells the absence of a byte unit.
fn byte_unit(token: Option<&str>) -> Result<Option<ByteUnit>, UnknownVariant> {
    match token {
        None | Some("packets") => Ok(None),
        Some(token) => ByteUnit::from_token(token).map(Some),
    }
}

fn decode_limit(body: &Value) -> Result<Limit, DecodeCause> {
    let wire: WireLimit = from_body(body)?;
    Ok(Limit {
        rate: wire.rate,
        per: optional::<TimeUnit>(wire.per.as_deref())?.unwrap_or(TimeUnit::Second),
        rate_unit: byte_unit(wire.rate_unit.as_deref())?,
        inv: wire.inv,
        burst: wire.burst,
        burst_unit: byte_unit(wire.burst_unit.as_deref())?,
    })
}
