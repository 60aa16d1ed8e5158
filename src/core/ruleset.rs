//! Ruleset entities
//!
//! Tables, chains, sets and rules as they appear in `nft -j list ruleset`.
//! Entities never own each other: a chain names its table, a rule names its
//! table and chain. The [`Ruleset`] keeps one ordered collection per kind.
//!
//! # Example
//!
//! ```
//! use nftkit::core::catalog::{ChainPolicy, ChainType, Family, Hook, Operator};
//! use nftkit::core::expression::Match;
//! use nftkit::core::fields::TcpField;
//! use nftkit::core::ruleset::{Chain, Rule, Ruleset, Table};
//! use nftkit::core::statement::Verdict;
//!
//! let table = Table::new(Family::Inet, "filter");
//! let input = Chain::new(&table, "input")
//!     .base(ChainType::Filter, Hook::Input, 0)
//!     .with_policy(ChainPolicy::Drop);
//! let ssh = Rule::new(&input)
//!     .with_expression(Match::new(TcpField::Dport, Operator::Eq, ["22"]))
//!     .with_statement(Verdict::Accept)
//!     .with_comment("allow ssh");
//!
//! let mut ruleset = Ruleset::new();
//! ruleset.tables.push(table);
//! ruleset.chains.push(input);
//! ruleset.rules.push(ssh);
//!
//! assert_eq!(ruleset.rules[0].to_string(), "tcp dport == {22} accept");
//! assert_eq!(format!("{:#}", ruleset.rules[0]), "tcp dport == {22} accept comment \"allow ssh\"");
//! ```

use crate::core::catalog::{ChainPolicy, ChainType, Family, Hook, SetElementType, SetFlag, SetPolicy};
use crate::core::error::InvariantViolation;
use crate::core::expression::Expression;
use crate::core::statement::{Statement, Verdict};
use ipnetwork::IpNetwork;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub family: Family,
    pub name: String,
    /// Assigned by nft once the table exists in the kernel
    pub handle: Option<u64>,
}

impl Table {
    pub fn new(family: Family, name: impl Into<String>) -> Self {
        Self {
            family,
            name: name.into(),
            handle: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub family: Family,
    pub table: String,
    pub name: String,
    pub handle: Option<u64>,
    pub chain_type: Option<ChainType>,
    pub hook: Option<Hook>,
    pub prio: Option<i32>,
    pub policy: Option<ChainPolicy>,
}

impl Chain {
    /// Creates a regular (non-base) chain in `table`
    pub fn new(table: &Table, name: impl Into<String>) -> Self {
        Self {
            family: table.family,
            table: table.name.clone(),
            name: name.into(),
            handle: None,
            chain_type: None,
            hook: None,
            prio: None,
            policy: None,
        }
    }

    /// Hooks the chain into the packet path
    pub fn base(mut self, chain_type: ChainType, hook: Hook, prio: i32) -> Self {
        self.chain_type = Some(chain_type);
        self.hook = Some(hook);
        self.prio = Some(prio);
        self
    }

    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn is_base(&self) -> bool {
        self.hook.is_some()
    }

    /// A base chain carries type, hook and prio together; only a base chain
    /// has a policy.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let violation = |reason| InvariantViolation {
            subject: "chain",
            reason,
        };
        let base = [
            self.chain_type.is_some(),
            self.hook.is_some(),
            self.prio.is_some(),
        ];
        if base.contains(&true) && base.contains(&false) {
            return Err(violation("type, hook and prio must be given together"));
        }
        if self.policy.is_some() && self.hook.is_none() {
            return Err(violation("policy requires a base chain"));
        }
        Ok(())
    }
}

/// A named set.
///
/// Optional fields distinguish "absent" from "present but empty": a set
/// decoded with `"elem": []` keeps `Some(vec![])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set {
    pub family: Family,
    pub table: String,
    pub name: String,
    pub handle: Option<u64>,
    pub element_type: SetElementType,
    pub size: Option<u32>,
    pub timeout: Option<u32>,
    pub gc_interval: Option<u32>,
    pub policy: Option<SetPolicy>,
    pub flags: Option<Vec<SetFlag>>,
    pub comment: Option<String>,
    pub elements: Option<Vec<String>>,
}

impl Set {
    pub fn new(table: &Table, name: impl Into<String>, element_type: SetElementType) -> Self {
        Self {
            family: table.family,
            table: table.name.clone(),
            name: name.into(),
            handle: None,
            element_type,
            size: None,
            timeout: None,
            gc_interval: None,
            policy: None,
            flags: None,
            comment: None,
            elements: None,
        }
    }

    pub fn with_flags(mut self, flags: impl IntoIterator<Item = SetFlag>) -> Self {
        self.flags = Some(flags.into_iter().collect());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_elements<I, S>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elements = Some(Vec::new());
        self.add_elements(elements);
        self
    }

    /// Current elements (empty when absent)
    pub fn elements(&self) -> &[String] {
        self.elements.as_deref().unwrap_or_default()
    }

    /// Appends the given literals that are not already present.
    pub fn add_elements<I, S>(&mut self, added: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements = self.elements.get_or_insert_with(Vec::new);
        for element in added {
            let element = element.into();
            if !elements.contains(&element) {
                elements.push(element);
            }
        }
    }

    /// Removes every literal equal to one of `removed`.
    pub fn remove_elements<I, S>(&mut self, removed: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed: Vec<S> = removed.into_iter().collect();
        let removed: HashSet<&str> = removed.iter().map(AsRef::as_ref).collect();
        if let Some(elements) = self.elements.as_mut() {
            elements.retain(|e| !removed.contains(e.as_str()));
        }
    }

    /// Elements after = elements before ∖ removed ∪ added
    pub fn update_elements<A, R, S, T>(&mut self, added: A, removed: R)
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.remove_elements(removed);
        self.add_elements(added);
    }

    /// Elements that do not look like values of the set's element type.
    ///
    /// Purely informational: nothing in this crate rejects them.
    pub fn mismatched_elements(&self) -> Vec<&str> {
        self.elements()
            .iter()
            .map(String::as_str)
            .filter(|e| !element_matches_type(e, self.element_type))
            .collect()
    }
}

fn element_matches_type(element: &str, element_type: SetElementType) -> bool {
    let is_addr = |s: &str, v6: bool| {
        s.parse::<IpNetwork>()
            .is_ok_and(|net| net.is_ipv6() == v6)
    };
    let is_range_of = |s: &str, check: &dyn Fn(&str) -> bool| {
        check(s) || s.split_once('-').is_some_and(|(a, b)| check(a) && check(b))
    };
    match element_type {
        SetElementType::Ipv4Addr => is_range_of(element, &|s| is_addr(s, false)),
        SetElementType::Ipv6Addr => is_addr(element, true),
        SetElementType::EtherAddr => {
            let parts: Vec<&str> = element.split(':').collect();
            parts.len() == 6
                && parts
                    .iter()
                    .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
        }
        SetElementType::InetService => is_range_of(element, &|s| {
            s.parse::<u16>().is_ok() || (!s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase()))
        }),
        SetElementType::InetProto => {
            element.parse::<u8>().is_ok()
                || (!element.is_empty()
                    && element
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-'))
        }
        SetElementType::Mark => {
            element.parse::<u32>().is_ok()
                || element
                    .strip_prefix("0x")
                    .is_some_and(|hex| u32::from_str_radix(hex, 16).is_ok())
        }
        SetElementType::Ifname => !element.is_empty() && element.len() <= 15,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub family: Family,
    pub table: String,
    pub chain: String,
    pub handle: Option<u64>,
    /// Match predicates, AND-ed left to right
    pub expressions: Vec<Expression>,
    /// Actions, executed in order once every expression matched
    pub statements: Vec<Statement>,
    pub comment: Option<String>,
}

impl Rule {
    pub fn new(chain: &Chain) -> Self {
        Self {
            family: chain.family,
            table: chain.table.clone(),
            chain: chain.name.clone(),
            handle: None,
            expressions: Vec::new(),
            statements: Vec::new(),
            comment: None,
        }
    }

    pub fn with_expression(mut self, expression: impl Into<Expression>) -> Self {
        self.expressions.push(expression.into());
        self
    }

    pub fn with_statement(mut self, statement: impl Into<Statement>) -> Self {
        self.statements.push(statement.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The first verdict among the rule's statements, the one that decides
    /// the packet's fate when the rule matches.
    pub fn verdict(&self) -> Option<&Verdict> {
        self.statements.iter().find_map(|s| match s {
            Statement::Verdict(v) => Some(v),
            _ => None,
        })
    }
}

/// Version information emitted by nft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub version: String,
    pub release_name: String,
    pub json_schema_version: String,
}

/// Decode root: every entity of a ruleset, per kind, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ruleset {
    pub metainfo: Option<MetaInfo>,
    pub tables: Vec<Table>,
    pub chains: Vec<Chain>,
    pub sets: Vec<Set>,
    pub rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.chains.is_empty() && self.sets.is_empty() && self.rules.is_empty()
    }

    pub fn table(&self, family: Family, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.family == family && t.name == name)
    }

    pub fn chain(&self, family: Family, table: &str, name: &str) -> Option<&Chain> {
        self.chains
            .iter()
            .find(|c| c.family == family && c.table == table && c.name == name)
    }

    pub fn set(&self, family: Family, table: &str, name: &str) -> Option<&Set> {
        self.sets
            .iter()
            .find(|s| s.family == family && s.table == table && s.name == name)
    }

    pub fn set_mut(&mut self, family: Family, table: &str, name: &str) -> Option<&mut Set> {
        self.sets
            .iter_mut()
            .find(|s| s.family == family && s.table == table && s.name == name)
    }

    pub fn chains_of<'a>(&'a self, table: &'a Table) -> impl Iterator<Item = &'a Chain> + 'a {
        self.chains
            .iter()
            .filter(move |c| c.family == table.family && c.table == table.name)
    }

    pub fn sets_of<'a>(&'a self, table: &'a Table) -> impl Iterator<Item = &'a Set> + 'a {
        self.sets
            .iter()
            .filter(move |s| s.family == table.family && s.table == table.name)
    }

    pub fn rules_of<'a>(&'a self, chain: &'a Chain) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| {
            r.family == chain.family && r.table == chain.table && r.chain == chain.name
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Operator;
    use crate::core::expression::Match;
    use crate::core::fields::TcpField;
    use crate::core::statement::Counter;

    fn hosts() -> Set {
        let table = Table::new(Family::Ip, "FirstTable");
        Set::new(&table, "hosts", SetElementType::Ipv4Addr).with_elements([
            "127.0.0.1",
            "192.168.1.10",
            "20.20.20.127",
        ])
    }

    #[test]
    fn test_remove_elements() {
        let mut set = hosts();
        set.remove_elements(["192.168.1.10", "127.0.0.1"]);
        assert_eq!(set.elements(), ["20.20.20.127"]);
    }

    #[test]
    fn test_update_elements_is_difference_then_union() {
        let mut set = hosts();
        set.update_elements(["10.0.0.1", "127.0.0.1"], ["127.0.0.1", "20.20.20.127"]);
        assert_eq!(set.elements(), ["192.168.1.10", "10.0.0.1", "127.0.0.1"]);
    }

    #[test]
    fn test_add_elements_does_not_duplicate() {
        let mut set = hosts();
        set.add_elements(["20.20.20.127", "1.1.1.1"]);
        assert_eq!(set.elements().len(), 4);
    }

    #[test]
    fn test_remove_from_absent_elements_stays_absent() {
        let table = Table::new(Family::Inet, "t");
        let mut set = Set::new(&table, "s", SetElementType::InetService);
        set.remove_elements(["22"]);
        assert_eq!(set.elements, None);
    }

    #[test]
    fn test_mismatched_elements() {
        let table = Table::new(Family::Inet, "t");
        let set = Set::new(&table, "s", SetElementType::Ipv4Addr).with_elements([
            "10.0.0.0/8",
            "10.0.0.1-10.0.0.9",
            "::1",
            "eth0",
        ]);
        assert_eq!(set.mismatched_elements(), vec!["::1", "eth0"]);

        let ports = Set::new(&table, "p", SetElementType::InetService)
            .with_elements(["22", "1024-65535", "ssh", "70000"]);
        assert_eq!(ports.mismatched_elements(), vec!["70000"]);
    }

    #[test]
    fn test_chain_builder() {
        let table = Table::new(Family::Inet, "filter");
        let regular = Chain::new(&table, "c1");
        assert!(!regular.is_base());
        assert_eq!(regular.chain_type, None);

        let base = Chain::new(&table, "input").base(ChainType::Filter, Hook::Input, -10);
        assert!(base.is_base());
        assert_eq!(base.prio, Some(-10));
        assert_eq!(base.family, Family::Inet);
        assert_eq!(base.table, "filter");
        assert!(base.with_policy(ChainPolicy::Drop).validate().is_ok());
    }

    #[test]
    fn test_partial_base_chain_is_invalid() {
        let table = Table::new(Family::Inet, "filter");
        let mut chain = Chain::new(&table, "input").base(ChainType::Filter, Hook::Input, 0);
        chain.prio = None;
        assert!(chain.validate().is_err());

        let policy_only = Chain::new(&table, "c").with_policy(ChainPolicy::Accept);
        assert!(policy_only.validate().is_err());
    }

    #[test]
    fn test_rule_verdict_is_first_verdict_statement() {
        let table = Table::new(Family::Ip, "t");
        let chain = Chain::new(&table, "c");
        let rule = Rule::new(&chain)
            .with_expression(Match::new(TcpField::Dport, Operator::Eq, ["80"]))
            .with_statement(Counter::default())
            .with_statement(Verdict::Jump("web".into()))
            .with_statement(Verdict::Drop);
        assert_eq!(rule.verdict(), Some(&Verdict::Jump("web".into())));
    }

    #[test]
    fn test_lookup_by_key() {
        let table = Table::new(Family::Ip, "t");
        let other = Table::new(Family::Ip6, "t");
        let chain = Chain::new(&table, "c");
        let mut ruleset = Ruleset::new();
        ruleset.tables.extend([table.clone(), other.clone()]);
        ruleset.chains.push(chain.clone());

        assert!(ruleset.table(Family::Ip6, "t").is_some());
        assert!(ruleset.chain(Family::Ip6, "t", "c").is_none());
        assert_eq!(ruleset.chains_of(&table).count(), 1);
        assert_eq!(ruleset.chains_of(&other).count(), 0);
    }
}
