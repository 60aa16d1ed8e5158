//! Ruleset → wire JSON and native rule-language text
//!
//! JSON output mirrors what the decoder reads: the same keys, the same
//! nesting, optional fields left out instead of written as `null`. When every
//! kind's collection is already grouped by table (always the case for
//! rulesets read from nft), entities are emitted the way `nft -j list
//! ruleset` groups them: each table followed by its sets, chains and rules.
//! Otherwise they are emitted kind by kind, which keeps every collection's
//! order intact on re-decode.

use crate::core::catalog::{Catalog, Family, NatFlag, Operator};
use crate::core::error::EncodeError;
use crate::core::expression::{CtMatch, Expression, Match, TypeMatch};
use crate::core::ruleset::{Chain, MetaInfo, Rule, Ruleset, Set, Table};
use crate::core::statement::{Counter, Limit, Log, Nat, Reject, Statement, Verdict};
use ipnetwork::IpNetwork;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::net::IpAddr;

/// Builder for one wire object, keeping insertion order.
struct Fields(Map<String, Value>);

impl Fields {
    fn new() -> Self {
        Self(Map::new())
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    fn with_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `{"<kind>": {...}}`
    fn wrap(self, kind: &str) -> Value {
        let mut outer = Map::new();
        outer.insert(kind.to_string(), Value::Object(self.0));
        Value::Object(outer)
    }

    /// `{"<kind>": null}` when no field was set
    fn wrap_or_null(self, kind: &str) -> Value {
        if self.is_empty() {
            Fields::new().with(kind, Value::Null).into_value()
        } else {
            self.wrap(kind)
        }
    }

    fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Encodes a ruleset as a `{"nftables": [...]}` value.
///
/// # Errors
///
/// Returns `Err` if a chain or statement violates one of its invariants.
/// Values built through the checked constructors never do.
pub fn encode_value(ruleset: &Ruleset) -> Result<Value, EncodeError> {
    let mut nodes = Vec::with_capacity(
        1 + ruleset.tables.len() + ruleset.chains.len() + ruleset.sets.len() + ruleset.rules.len(),
    );
    if let Some(metainfo) = &ruleset.metainfo {
        nodes.push(encode_metainfo(metainfo));
    }

    match table_positions(ruleset) {
        Some(positions) => {
            for (i, table) in ruleset.tables.iter().enumerate() {
                nodes.push(encode_table(table));
                for set in ruleset.sets.iter().filter(|s| positions.of(s.family, &s.table) == i) {
                    nodes.push(encode_set(set));
                }
                for chain in ruleset.chains.iter().filter(|c| positions.of(c.family, &c.table) == i) {
                    nodes.push(encode_chain(chain)?);
                }
                for rule in ruleset.rules.iter().filter(|r| positions.of(r.family, &r.table) == i) {
                    nodes.push(encode_rule(rule)?);
                }
            }
            let orphan = ruleset.tables.len();
            for chain in ruleset.chains.iter().filter(|c| positions.of(c.family, &c.table) == orphan) {
                nodes.push(encode_chain(chain)?);
            }
            for set in ruleset.sets.iter().filter(|s| positions.of(s.family, &s.table) == orphan) {
                nodes.push(encode_set(set));
            }
            for rule in ruleset.rules.iter().filter(|r| positions.of(r.family, &r.table) == orphan) {
                nodes.push(encode_rule(rule)?);
            }
        }
        None => {
            nodes.extend(ruleset.tables.iter().map(encode_table));
            for chain in &ruleset.chains {
                nodes.push(encode_chain(chain)?);
            }
            nodes.extend(ruleset.sets.iter().map(encode_set));
            for rule in &ruleset.rules {
                nodes.push(encode_rule(rule)?);
            }
        }
    }

    Ok(Fields::new().with("nftables", nodes).into_value())
}

/// Encodes a ruleset as compact wire JSON.
///
/// # Errors
///
/// See [`encode_value`].
pub fn encode_json(ruleset: &Ruleset) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(&encode_value(ruleset)?)?)
}

/// Encodes a ruleset as indented wire JSON.
///
/// # Errors
///
/// See [`encode_value`].
pub fn encode_json_pretty(ruleset: &Ruleset) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec_pretty(&encode_value(ruleset)?)?)
}

/// Index of each table, used to group entities under their table.
struct TablePositions<'a> {
    index: HashMap<(Family, &'a str), usize>,
    orphan: usize,
}

impl TablePositions<'_> {
    fn of(&self, family: Family, table: &str) -> usize {
        self.index
            .get(&(family, table))
            .copied()
            .unwrap_or(self.orphan)
    }
}

/// Table positions, if grouping by table keeps the order of every kind.
fn table_positions(ruleset: &Ruleset) -> Option<TablePositions<'_>> {
    let mut index = HashMap::new();
    for (i, table) in ruleset.tables.iter().enumerate() {
        index.entry((table.family, table.name.as_str())).or_insert(i);
    }
    let positions = TablePositions {
        index,
        orphan: ruleset.tables.len(),
    };

    fn sorted(positions: impl Iterator<Item = usize>) -> bool {
        let positions: Vec<usize> = positions.collect();
        positions.windows(2).all(|w| w[0] <= w[1])
    }

    let grouped = sorted(ruleset.chains.iter().map(|c| positions.of(c.family, &c.table)))
        && sorted(ruleset.sets.iter().map(|s| positions.of(s.family, &s.table)))
        && sorted(ruleset.rules.iter().map(|r| positions.of(r.family, &r.table)));
    grouped.then_some(positions)
}

// ─── Entities ──────────────────────────────────────────────────────────────

fn encode_metainfo(metainfo: &MetaInfo) -> Value {
    let schema_version = match metainfo.json_schema_version.parse::<u32>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(metainfo.json_schema_version.as_str()),
    };
    Fields::new()
        .with("version", metainfo.version.as_str())
        .with("release_name", metainfo.release_name.as_str())
        .with("json_schema_version", schema_version)
        .wrap("metainfo")
}

fn encode_table(table: &Table) -> Value {
    Fields::new()
        .with("family", table.family.token())
        .with("name", table.name.as_str())
        .with_opt("handle", table.handle)
        .wrap("table")
}

fn encode_chain(chain: &Chain) -> Result<Value, EncodeError> {
    chain.validate()?;
    Ok(Fields::new()
        .with("family", chain.family.token())
        .with("table", chain.table.as_str())
        .with("name", chain.name.as_str())
        .with_opt("handle", chain.handle)
        .with_opt("type", chain.chain_type.map(Catalog::token))
        .with_opt("hook", chain.hook.map(Catalog::token))
        .with_opt("prio", chain.prio)
        .with_opt("policy", chain.policy.map(Catalog::token))
        .wrap("chain"))
}

fn encode_set(set: &Set) -> Value {
    Fields::new()
        .with("family", set.family.token())
        .with("table", set.table.as_str())
        .with("name", set.name.as_str())
        .with("type", set.element_type.token())
        .with_opt("handle", set.handle)
        .with_opt("size", set.size)
        .with_opt("timeout", set.timeout)
        .with_opt("gc-interval", set.gc_interval)
        .with_opt("policy", set.policy.map(Catalog::token))
        .with_opt(
            "flags",
            set.flags
                .as_ref()
                .map(|flags| flags.iter().map(|f| f.token()).collect::<Vec<_>>()),
        )
        .with_opt("comment", set.comment.as_deref())
        .with_opt(
            "elem",
            set.elements
                .as_ref()
                .map(|elements| elements.iter().map(|e| encode_literal(e)).collect::<Vec<_>>()),
        )
        .wrap("set")
}

fn encode_rule(rule: &Rule) -> Result<Value, EncodeError> {
    let mut expr: Vec<Value> = rule.expressions.iter().map(encode_expression).collect();
    for statement in &rule.statements {
        expr.push(encode_statement(statement)?);
    }
    Ok(Fields::new()
        .with("family", rule.family.token())
        .with("table", rule.table.as_str())
        .with("chain", rule.chain.as_str())
        .with_opt("handle", rule.handle)
        .with_opt("comment", rule.comment.as_deref())
        .with("expr", expr)
        .wrap("rule"))
}

// ─── Literals ──────────────────────────────────────────────────────────────

/// Decimal digits without a leading zero
fn canonical_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && (s == "0" || !s.starts_with('0'))
}

/// An address in the form its own parser prints it
fn canonical_address(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok_and(|addr| addr.to_string() == s)
}

/// `a-b` when both bounds are numbers or both are addresses, each written
/// the way the decoder renders it.
fn split_range(literal: &str) -> Option<(&str, &str)> {
    let (low, high) = literal.split_once('-')?;
    ((canonical_number(low) && canonical_number(high))
        || (canonical_address(low) && canonical_address(high)))
    .then_some((low, high))
}

/// Inverse of the decoder's literal form: `addr/len` becomes a prefix
/// object, `a-b` a range, anything else stays a string. Only canonical
/// spellings are converted, so decoding the output gives `literal` back.
pub(crate) fn encode_literal(literal: &str) -> Value {
    if let Some((addr, len)) = literal.split_once('/')
        && canonical_address(addr)
        && canonical_number(len)
        && literal.parse::<IpNetwork>().is_ok()
        && let Ok(len) = len.parse::<u8>()
    {
        let prefix = Fields::new().with("addr", addr).with("len", len);
        return prefix.wrap("prefix");
    }
    if let Some((low, high)) = split_range(literal) {
        return Fields::new()
            .with("range", vec![Value::from(low), Value::from(high)])
            .into_value();
    }
    Value::from(literal)
}

/// A single value is written as a scalar, several as an anonymous set.
fn right_side(values: &[String]) -> Value {
    match values {
        [single] => encode_literal(single),
        _ => Fields::new()
            .with(
                "set",
                values.iter().map(|v| encode_literal(v)).collect::<Vec<_>>(),
            )
            .into_value(),
    }
}

// ─── Expressions ───────────────────────────────────────────────────────────

fn match_node(left: Value, op: Operator, values: &[String]) -> Value {
    Fields::new()
        .with("op", op.token())
        .with("left", left)
        .with("right", right_side(values))
        .wrap("match")
}

fn payload(protocol: &str, field: &str) -> Value {
    Fields::new()
        .with("protocol", protocol)
        .with("field", field)
        .wrap("payload")
}

fn payload_match<F: Catalog>(m: &Match<F>) -> Value {
    match_node(payload(F::TAG, m.field.token()), m.op, &m.values)
}

fn type_match<T: Catalog>(protocol: &str, field: &str, m: &TypeMatch<T>) -> Value {
    let values: Vec<String> = m.types.iter().map(|t| t.token().to_string()).collect();
    match_node(payload(protocol, field), m.op, &values)
}

fn encode_expression(expression: &Expression) -> Value {
    match expression {
        Expression::Ip(m) => payload_match(m),
        Expression::Ip6(m) => payload_match(m),
        Expression::Tcp(m) => payload_match(m),
        Expression::Udp(m) => payload_match(m),
        Expression::Udplite(m) => payload_match(m),
        Expression::Sctp(m) => payload_match(m),
        Expression::Dccp(m) => payload_match(m),
        Expression::Ah(m) => payload_match(m),
        Expression::Esp(m) => payload_match(m),
        Expression::Comp(m) => payload_match(m),
        Expression::Icmp(m) => payload_match(m),
        Expression::Icmpv6(m) => payload_match(m),
        Expression::Ether(m) => payload_match(m),
        Expression::Dst(m) => payload_match(m),
        Expression::Frag(m) => payload_match(m),
        Expression::Hbh(m) => payload_match(m),
        Expression::Mh(m) => payload_match(m),
        Expression::Rt(m) => payload_match(m),
        Expression::Vlan(m) => payload_match(m),
        Expression::Arp(m) => payload_match(m),
        Expression::DccpType(m) => type_match("dccp", "type", m),
        Expression::IcmpType(m) => type_match("icmp", "type", m),
        Expression::Icmpv6Type(m) => type_match("icmpv6", "type", m),
        Expression::EtherType(m) => type_match("ether", "type", m),
        Expression::ArpOperation(m) => type_match("arp", "operation", m),
        Expression::Meta(m) => match_node(
            Fields::new().with("key", m.field.token()).wrap("meta"),
            m.op,
            &m.values,
        ),
        Expression::Ct(CtMatch::Key(m)) => match_node(
            Fields::new().with("key", m.field.token()).wrap("ct"),
            m.op,
            &m.values,
        ),
        Expression::Ct(CtMatch::Directional {
            dir,
            family,
            key,
            op,
            values,
        }) => match_node(
            Fields::new()
                .with("key", key.token())
                .with_opt("family", family.map(Catalog::token))
                .with("dir", dir.token())
                .wrap("ct"),
            *op,
            values,
        ),
        Expression::Ct(CtMatch::Count { over, count }) => Fields::new()
            .with("val", *count)
            .with_opt("inv", over.then_some(true))
            .wrap("ct count"),
    }
}

// ─── Statements ────────────────────────────────────────────────────────────

/// A single flag is written bare, as nft does.
fn nat_flags(flags: &[NatFlag]) -> Option<Value> {
    match flags {
        [] => None,
        [flag] => Some(Value::from(flag.token())),
        _ => Some(Value::from(
            flags.iter().map(|f| f.token()).collect::<Vec<_>>(),
        )),
    }
}

fn encode_statement(statement: &Statement) -> Result<Value, EncodeError> {
    statement.validate()?;
    let value = match statement {
        Statement::Verdict(verdict) => match verdict.target() {
            Some(target) => Fields::new().with("target", target).wrap(verdict.keyword()),
            None => Fields::new().wrap_or_null(verdict.keyword()),
        },
        Statement::Nat(nat) => Fields::new()
            .with_opt("addr", nat.addr.as_deref().map(encode_literal))
            .with_opt("port", nat.port)
            .with_opt("flags", nat_flags(&nat.flags))
            .wrap_or_null(nat.kind.token()),
        Statement::Limit(limit) => Fields::new()
            .with("rate", limit.rate)
            .with("per", limit.per.token())
            .with_opt("rate_unit", limit.rate_unit.map(Catalog::token))
            .with_opt("inv", limit.inv.then_some(true))
            .with_opt("burst", limit.burst)
            .with_opt("burst_unit", limit.burst_unit.map(Catalog::token))
            .wrap("limit"),
        Statement::Log(log) => Fields::new()
            .with_opt("prefix", log.prefix.as_deref())
            .with_opt("level", log.level.map(Catalog::token))
            .wrap_or_null("log"),
        Statement::Counter(counter) => Fields::new()
            .with_opt("packets", counter.packets)
            .with_opt("bytes", counter.bytes)
            .wrap_or_null("counter"),
        Statement::Reject(reject) => Fields::new()
            .with_opt("type", reject.reject_type.map(Catalog::token))
            .with_opt("expr", reject.reason.map(Catalog::token))
            .wrap_or_null("reject"),
    };
    Ok(value)
}

// ─── Native text ───────────────────────────────────────────────────────────

fn write_values<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    f.write_str("{")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{value}")?;
    }
    f.write_str("}")
}

impl<F: Catalog> fmt::Display for Match<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} ", F::TAG, self.field.token(), self.op.token())?;
        write_values(f, &self.values)
    }
}

/// Type catalogs are tagged with their own text prefix (`icmp type`).
impl<T: Catalog> fmt::Display for TypeMatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", T::TAG, self.op.token())?;
        let tokens: Vec<&str> = self.types.iter().map(|t| t.token()).collect();
        write_values(f, &tokens)
    }
}

impl fmt::Display for CtMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtMatch::Key(m) => m.fmt(f),
            CtMatch::Directional {
                dir,
                family,
                key,
                op,
                values,
            } => {
                write!(f, "ct {dir} ")?;
                if let Some(family) = family {
                    write!(f, "{family} ")?;
                }
                write!(f, "{key} {op} ")?;
                write_values(f, values)
            }
            CtMatch::Count { over: true, count } => write!(f, "ct count over {count}"),
            CtMatch::Count { over: false, count } => write!(f, "ct count {count}"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Ip(m) => m.fmt(f),
            Expression::Ip6(m) => m.fmt(f),
            Expression::Tcp(m) => m.fmt(f),
            Expression::Udp(m) => m.fmt(f),
            Expression::Udplite(m) => m.fmt(f),
            Expression::Sctp(m) => m.fmt(f),
            Expression::Dccp(m) => m.fmt(f),
            Expression::DccpType(m) => m.fmt(f),
            Expression::Ah(m) => m.fmt(f),
            Expression::Esp(m) => m.fmt(f),
            Expression::Comp(m) => m.fmt(f),
            Expression::Icmp(m) => m.fmt(f),
            Expression::IcmpType(m) => m.fmt(f),
            Expression::Icmpv6(m) => m.fmt(f),
            Expression::Icmpv6Type(m) => m.fmt(f),
            Expression::Ether(m) => m.fmt(f),
            Expression::EtherType(m) => m.fmt(f),
            Expression::Dst(m) => m.fmt(f),
            Expression::Frag(m) => m.fmt(f),
            Expression::Hbh(m) => m.fmt(f),
            Expression::Mh(m) => m.fmt(f),
            Expression::Rt(m) => m.fmt(f),
            Expression::Vlan(m) => m.fmt(f),
            Expression::Arp(m) => m.fmt(f),
            Expression::ArpOperation(m) => m.fmt(f),
            Expression::Ct(m) => m.fmt(f),
            Expression::Meta(m) => m.fmt(f),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())?;
        if let Some(target) = self.target() {
            write!(f, " {target}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Nat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.token())?;
        match (&self.addr, self.port) {
            (Some(addr), Some(port)) => write!(f, " to {addr}:{port}")?,
            (Some(addr), None) => write!(f, " to {addr}")?,
            (None, Some(port)) => write!(f, " to :{port}")?,
            (None, None) => {}
        }
        if !self.flags.is_empty() {
            let flags: Vec<&str> = self.flags.iter().map(|flag| flag.token()).collect();
            write!(f, " {}", flags.join(","))?;
        }
        Ok(())
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("limit rate ")?;
        if self.inv {
            f.write_str("over ")?;
        }
        write!(f, "{}", self.rate)?;
        if let Some(unit) = self.rate_unit {
            write!(f, " {unit}")?;
        }
        write!(f, "/{}", self.per)?;
        if let Some(burst) = self.burst {
            let unit = self.burst_unit.map_or("packets", Catalog::token);
            write!(f, " burst {burst} {unit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("log")?;
        if let Some(prefix) = &self.prefix {
            write!(f, " prefix \"{}\"", escape(prefix))?;
        }
        if let Some(level) = self.level {
            write!(f, " level {level}")?;
        }
        Ok(())
    }
}

/// Backslash-escapes `"` and `\` for a double-quoted nft string.
fn escape(s: &str) -> Cow<'_, str> {
    if s.contains(['"', '\\']) {
        Cow::Owned(s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        Cow::Borrowed(s)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("counter")?;
        if let Some(packets) = self.packets {
            write!(f, " packets {packets}")?;
        }
        if let Some(bytes) = self.bytes {
            write!(f, " bytes {bytes}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("reject")?;
        if let Some(reject_type) = self.reject_type {
            write!(f, " with {reject_type}")?;
            if let Some(reason) = self.reason {
                write!(f, " type {reason}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Verdict(s) => s.fmt(f),
            Statement::Nat(s) => s.fmt(f),
            Statement::Limit(s) => s.fmt(f),
            Statement::Log(s) => s.fmt(f),
            Statement::Counter(s) => s.fmt(f),
            Statement::Reject(s) => s.fmt(f),
        }
    }
}

/// `<expr> ... <stmt> ...`; the alternate form `{:#}` appends
/// `comment "<c>"` as `nft list ruleset` does.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .expressions
            .iter()
            .map(ToString::to_string)
            .chain(self.statements.iter().map(ToString::to_string));
        let mut first = true;
        for part in parts {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            f.write_str(&part)?;
        }
        if f.alternate()
            && let Some(comment) = &self.comment
        {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "comment \"{}\"", escape(comment))?;
        }
        Ok(())
    }
}

impl Ruleset {
    /// See [`encode_value`]
    pub fn to_value(&self) -> Result<Value, EncodeError> {
        encode_value(self)
    }

    /// See [`encode_json`]
    pub fn to_json(&self) -> Result<Vec<u8>, EncodeError> {
        encode_json(self)
    }

    /// SHA-256 of the compact wire JSON, as lowercase hex.
    pub fn checksum(&self) -> Result<String, EncodeError> {
        let mut hasher = Sha256::new();
        hasher.update(encode_json(self)?);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Renders the ruleset in `nft list ruleset` style blocks.
    ///
    /// Chains and sets whose table is missing, and rules whose chain is
    /// missing, are rendered under a block of the name they refer to.
    pub fn to_nft_text(&self) -> String {
        let mut blocks: Vec<(Family, &str)> = Vec::new();
        let keys = self
            .tables
            .iter()
            .map(|t| (t.family, t.name.as_str()))
            .chain(self.chains.iter().map(|c| (c.family, c.table.as_str())))
            .chain(self.sets.iter().map(|s| (s.family, s.table.as_str())))
            .chain(self.rules.iter().map(|r| (r.family, r.table.as_str())));
        for key in keys {
            if !blocks.contains(&key) {
                blocks.push(key);
            }
        }

        let mut out = String::new();
        for (family, table) in blocks {
            let _ = writeln!(out, "table {family} {table} {{");
            let mut first = true;
            let mut separate = |out: &mut String| {
                if !first {
                    out.push('\n');
                }
                first = false;
            };

            for set in self
                .sets
                .iter()
                .filter(|s| s.family == family && s.table == table)
            {
                separate(&mut out);
                write_set(&mut out, set);
            }

            let mut chain_names: Vec<&str> = self
                .chains
                .iter()
                .filter(|c| c.family == family && c.table == table)
                .map(|c| c.name.as_str())
                .collect();
            for rule in self
                .rules
                .iter()
                .filter(|r| r.family == family && r.table == table)
            {
                if !chain_names.contains(&rule.chain.as_str()) {
                    chain_names.push(&rule.chain);
                }
            }
            for name in chain_names {
                separate(&mut out);
                let _ = writeln!(out, "\tchain {name} {{");
                if let Some(chain) = self.chain(family, table, name) {
                    write_chain_header(&mut out, chain);
                }
                for rule in self.rules.iter().filter(|r| {
                    r.family == family && r.table == table && r.chain == name
                }) {
                    let _ = writeln!(out, "\t\t{rule:#}");
                }
                out.push_str("\t}\n");
            }
            out.push_str("}\n");
        }
        out
    }
}

fn write_chain_header(out: &mut String, chain: &Chain) {
    if let (Some(chain_type), Some(hook), Some(prio)) = (chain.chain_type, chain.hook, chain.prio) {
        let _ = write!(out, "\t\ttype {chain_type} hook {hook} priority {prio};");
        if let Some(policy) = chain.policy {
            let _ = write!(out, " policy {policy};");
        }
        out.push('\n');
    }
}

fn write_set(out: &mut String, set: &Set) {
    let _ = writeln!(out, "\tset {} {{", set.name);
    let _ = writeln!(out, "\t\ttype {}", set.element_type);
    if let Some(policy) = set.policy {
        let _ = writeln!(out, "\t\tpolicy {policy}");
    }
    if let Some(flags) = set.flags.as_deref().filter(|flags| !flags.is_empty()) {
        let flags: Vec<&str> = flags.iter().map(|flag| flag.token()).collect();
        let _ = writeln!(out, "\t\tflags {}", flags.join(","));
    }
    if let Some(timeout) = set.timeout {
        let _ = writeln!(out, "\t\ttimeout {timeout}s");
    }
    if let Some(gc_interval) = set.gc_interval {
        let _ = writeln!(out, "\t\tgc-interval {gc_interval}s");
    }
    if let Some(size) = set.size {
        let _ = writeln!(out, "\t\tsize {size}");
    }
    if let Some(comment) = &set.comment {
        let _ = writeln!(out, "\t\tcomment \"{}\"", escape(comment));
    }
    if !set.elements().is_empty() {
        let _ = writeln!(out, "\t\telements = {{ {} }}", set.elements().join(", "));
    }
    out.push_str("\t}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{
        ByteUnit, ChainPolicy, ChainType, Hook, RejectReason, RejectType, SetElementType, SetFlag,
        TimeUnit,
    };
    use crate::core::decode::decode;
    use crate::core::fields::{CtKey, IcmpType, IpField, MetaKey, TcpField};
    use serde_json::json;

    fn sample() -> Ruleset {
        let table = Table::new(Family::Inet, "filter");
        let input = Chain::new(&table, "input")
            .base(ChainType::Filter, Hook::Input, 0)
            .with_policy(ChainPolicy::Drop);
        let ports = Set::new(&table, "ports", SetElementType::InetService)
            .with_flags([SetFlag::Interval])
            .with_elements(["22", "8000-8080"]);
        let rule = Rule::new(&input)
            .with_expression(Match::new(CtKey::State, Operator::Eq, ["established", "related"]))
            .with_statement(Verdict::Accept);
        Ruleset {
            metainfo: None,
            tables: vec![table],
            chains: vec![input],
            sets: vec![ports],
            rules: vec![rule],
        }
    }

    #[test]
    fn test_scenario_rule_text() {
        let table = Table::new(Family::Ip, "FirstTable");
        let chain = Chain::new(&table, "c1");
        let rule = Rule::new(&chain)
            .with_expression(Match::new(IpField::Protocol, Operator::Eq, ["ip"]))
            .with_expression(Match::new(TcpField::Sport, Operator::Eq, ["54"]))
            .with_statement(Verdict::Drop);
        assert_eq!(rule.to_string(), "ip protocol == {ip} tcp sport == {54} drop");
    }

    #[test]
    fn test_statement_text() {
        let limit = Limit::packets(20, TimeUnit::Second).over();
        assert_eq!(limit.to_string(), "limit rate over 20/second");

        let bytes = Limit::bytes(10, ByteUnit::Mbytes, TimeUnit::Minute)
            .with_burst(2, Some(ByteUnit::Mbytes));
        assert_eq!(bytes.to_string(), "limit rate 10 mbytes/minute burst 2 mbytes");

        let snat = Nat::snat("10.0.0.1")
            .with_port(8080)
            .with_flag(NatFlag::Random)
            .with_flag(NatFlag::Persistent);
        assert_eq!(snat.to_string(), "snat to 10.0.0.1:8080 random,persistent");
        assert_eq!(Nat::redirect(8080).to_string(), "redirect to :8080");
        assert_eq!(Nat::masquerade().to_string(), "masquerade");

        let log = Log {
            prefix: Some("in: ".into()),
            level: Some(crate::core::catalog::LogLevel::Error),
        };
        assert_eq!(log.to_string(), "log prefix \"in: \" level err");

        let reject = Reject {
            reject_type: Some(RejectType::Icmp),
            reason: Some(RejectReason::HostUnreachable),
        };
        assert_eq!(reject.to_string(), "reject with icmp type host-unreachable");
        assert_eq!(Verdict::Goto("web".into()).to_string(), "goto web");
    }

    #[test]
    fn test_expression_text() {
        let icmp: Expression =
            TypeMatch::new(Operator::Eq, [IcmpType::EchoRequest, IcmpType::EchoReply]).into();
        assert_eq!(icmp.to_string(), "icmp type == {echo-request, echo-reply}");

        let meta: Expression = Match::new(MetaKey::Iifname, Operator::Ne, ["lo"]).into();
        assert_eq!(meta.to_string(), "meta iifname != {lo}");

        assert_eq!(Expression::ct_count(5, true).to_string(), "ct count over 5");
    }

    #[test]
    fn test_scenario_limit_json() {
        let table = Table::new(Family::Ip, "t");
        let chain = Chain::new(&table, "c");
        let rule = Rule::new(&chain).with_statement(Limit::packets(20, TimeUnit::Second).over());
        let value = encode_rule(&rule).unwrap();
        assert_eq!(
            value["rule"]["expr"][0],
            json!({"limit": {"rate": 20, "per": "second", "inv": true}})
        );
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let table = Table::new(Family::Ip, "t");
        let chain = Chain::new(&table, "c");
        let value = encode_chain(&chain).unwrap();
        assert_eq!(
            value,
            json!({"chain": {"family": "ip", "table": "t", "name": "c"}})
        );
    }

    #[test]
    fn test_empty_statements_encode_as_null() {
        for (statement, key) in [
            (Statement::Counter(Counter::default()), "counter"),
            (Statement::Log(Log::default()), "log"),
            (Statement::Reject(Reject::default()), "reject"),
            (Statement::Nat(Nat::masquerade()), "masquerade"),
            (Statement::Verdict(Verdict::Accept), "accept"),
        ] {
            assert_eq!(encode_statement(&statement).unwrap(), json!({ key: null }));
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            encode_literal("10.0.0.0/8"),
            json!({"prefix": {"addr": "10.0.0.0", "len": 8}})
        );
        assert_eq!(encode_literal("1024-65535"), json!({"range": ["1024", "65535"]}));
        assert_eq!(
            encode_literal("10.0.0.1-10.0.0.9"),
            json!({"range": ["10.0.0.1", "10.0.0.9"]})
        );
        assert_eq!(encode_literal("echo-request"), json!("echo-request"));
        assert_eq!(encode_literal("eth0/1"), json!("eth0/1"));
    }

    #[test]
    fn test_non_canonical_literals_stay_strings() {
        for literal in ["10.0.0.0/08", "010.0.0.0/8", "01-5", "1-05", "::0-::9"] {
            assert_eq!(encode_literal(literal), json!(literal), "{literal}");
        }

        let table = Table::new(Family::Ip, "t");
        let chain = Chain::new(&table, "c");
        let rule = Rule::new(&chain)
            .with_expression(Match::new(IpField::Saddr, Operator::Eq, ["10.0.0.0/08"]))
            .with_expression(Match::new(TcpField::Dport, Operator::Eq, ["01-5"]))
            .with_statement(Verdict::Accept);
        let ruleset = Ruleset {
            metainfo: None,
            tables: vec![table],
            chains: vec![chain],
            sets: Vec::new(),
            rules: vec![rule],
        };
        assert_eq!(decode(&encode_json(&ruleset).unwrap()).unwrap(), ruleset);
    }

    #[test]
    fn test_quotes_are_escaped_in_text() {
        let log = Log {
            prefix: Some(r#"a"b\c"#.into()),
            level: None,
        };
        assert_eq!(log.to_string(), r#"log prefix "a\"b\\c""#);

        let table = Table::new(Family::Ip, "t");
        let chain = Chain::new(&table, "c");
        let rule = Rule::new(&chain)
            .with_statement(Verdict::Accept)
            .with_comment(r#"say "hi""#);
        assert_eq!(format!("{rule:#}"), r#"accept comment "say \"hi\"""#);

        let set = Set::new(&table, "s", SetElementType::Ipv4Addr).with_comment("a\"b");
        let ruleset = Ruleset {
            metainfo: None,
            tables: vec![table],
            chains: Vec::new(),
            sets: vec![set],
            rules: Vec::new(),
        };
        assert!(ruleset.to_nft_text().contains(r#"comment "a\"b""#));
    }

    #[test]
    fn test_single_value_is_scalar() {
        assert_eq!(right_side(&["22".to_string()]), json!("22"));
        assert_eq!(
            right_side(&["22".to_string(), "80".to_string()]),
            json!({"set": ["22", "80"]})
        );
    }

    #[test]
    fn test_grouped_by_table() {
        let ruleset = sample();
        let value = encode_value(&ruleset).unwrap();
        let kinds: Vec<&str> = value["nftables"]
            .as_array()
            .unwrap()
            .iter()
            .map(|node| node.as_object().unwrap().keys().next().unwrap().as_str())
            .collect();
        assert_eq!(kinds, ["table", "set", "chain", "rule"]);
    }

    #[test]
    fn test_interleaved_tables_keep_kind_order() {
        let a = Table::new(Family::Ip, "a");
        let b = Table::new(Family::Ip, "b");
        let mut ruleset = Ruleset::new();
        ruleset.tables = vec![a.clone(), b.clone()];
        ruleset.chains = vec![
            Chain::new(&b, "first"),
            Chain::new(&a, "second"),
        ];
        let bytes = encode_json(&ruleset).unwrap();
        assert_eq!(decode(&bytes).unwrap(), ruleset);
    }

    #[test]
    fn test_round_trip_sample() {
        let ruleset = sample();
        let bytes = encode_json(&ruleset).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, ruleset);
        assert_eq!(encode_json(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_invalid_statement_fails_encode() {
        let mut ruleset = sample();
        let mut limit = Limit::packets(1, TimeUnit::Second);
        limit.burst_unit = Some(ByteUnit::Bytes);
        ruleset.rules[0].statements.push(limit.into());
        assert!(matches!(
            encode_json(&ruleset),
            Err(EncodeError::Invariant(_))
        ));
    }

    #[test]
    fn test_checksum_is_stable() {
        let ruleset = sample();
        let checksum = ruleset.checksum().unwrap();
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, sample().checksum().unwrap());

        let mut changed = sample();
        changed.sets[0].add_elements(["443"]);
        assert_ne!(changed.checksum().unwrap(), checksum);
    }

    #[test]
    fn test_nft_text() {
        let text = sample().to_nft_text();
        let expected = "table inet filter {\n\
            \tset ports {\n\
            \t\ttype inet_service\n\
            \t\tflags interval\n\
            \t\telements = { 22, 8000-8080 }\n\
            \t}\n\
            \n\
            \tchain input {\n\
            \t\ttype filter hook input priority 0; policy drop;\n\
            \t\tct state == {established, related} accept\n\
            \t}\n\
            }\n";
        assert_eq!(text, expected);
    }
}
