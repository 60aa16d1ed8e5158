//! Decode-scoped entity registry
//!
//! Chains, sets and rules refer to their table (and rules to their chain) by
//! family and name. The registry collects entities in wire order and answers
//! those lookups, so a reference to something not yet seen fails instead of
//! being silently patched up later. One registry lives for exactly one decode
//! and turns into the resulting [`Ruleset`].

use crate::core::catalog::Family;
use crate::core::error::{DecodeCause, UnresolvedReference};
use crate::core::ruleset::{Chain, MetaInfo, Rule, Ruleset, Set, Table};
use std::collections::{HashMap, HashSet};

type TableKey = (Family, String);
type MemberKey = (Family, String, String);
type RuleKey = (Family, String, String, u64);

#[derive(Debug, Default)]
pub struct Registry {
    ruleset: Ruleset,
    tables: HashMap<TableKey, usize>,
    chains: HashMap<MemberKey, usize>,
    sets: HashMap<MemberKey, usize>,
    rule_handles: HashSet<RuleKey>,
}

fn table_key(family: Family, name: &str) -> TableKey {
    (family, name.to_string())
}

fn member_key(family: Family, table: &str, name: &str) -> MemberKey {
    (family, table.to_string(), name.to_string())
}

fn describe(family: Family, path: &[&str]) -> String {
    format!("{family} {}", path.join(" "))
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_metainfo(&mut self, metainfo: MetaInfo) -> Result<(), DecodeCause> {
        if self.ruleset.metainfo.is_some() {
            return Err(DecodeCause::Duplicate {
                kind: "metainfo",
                key: metainfo.version,
            });
        }
        self.ruleset.metainfo = Some(metainfo);
        Ok(())
    }

    pub fn register_table(&mut self, table: Table) -> Result<(), DecodeCause> {
        let key = table_key(table.family, &table.name);
        if self.tables.contains_key(&key) {
            return Err(DecodeCause::Duplicate {
                kind: "table",
                key: describe(table.family, &[&table.name]),
            });
        }
        self.tables.insert(key, self.ruleset.tables.len());
        self.ruleset.tables.push(table);
        Ok(())
    }

    /// Registers a chain whose table must already be registered.
    pub fn register_chain(&mut self, chain: Chain) -> Result<(), DecodeCause> {
        self.resolve_table(chain.family, &chain.table)?;
        let key = member_key(chain.family, &chain.table, &chain.name);
        if self.chains.contains_key(&key) {
            return Err(DecodeCause::Duplicate {
                kind: "chain",
                key: describe(chain.family, &[&chain.table, &chain.name]),
            });
        }
        self.chains.insert(key, self.ruleset.chains.len());
        self.ruleset.chains.push(chain);
        Ok(())
    }

    /// Registers a set whose table must already be registered.
    pub fn register_set(&mut self, set: Set) -> Result<(), DecodeCause> {
        self.resolve_table(set.family, &set.table)?;
        let key = member_key(set.family, &set.table, &set.name);
        if self.sets.contains_key(&key) {
            return Err(DecodeCause::Duplicate {
                kind: "set",
                key: describe(set.family, &[&set.table, &set.name]),
            });
        }
        self.sets.insert(key, self.ruleset.sets.len());
        self.ruleset.sets.push(set);
        Ok(())
    }

    /// Adds a rule whose chain must already be registered. A handle may
    /// appear only once per chain.
    pub fn push_rule(&mut self, rule: Rule) -> Result<(), DecodeCause> {
        self.resolve_chain(rule.family, &rule.table, &rule.chain)?;
        if let Some(handle) = rule.handle {
            let key = (rule.family, rule.table.clone(), rule.chain.clone(), handle);
            if !self.rule_handles.insert(key) {
                return Err(DecodeCause::Duplicate {
                    kind: "rule",
                    key: describe(rule.family, &[&rule.table, &rule.chain, &handle.to_string()]),
                });
            }
        }
        self.ruleset.rules.push(rule);
        Ok(())
    }

    pub fn resolve_table(&self, family: Family, name: &str) -> Result<&Table, UnresolvedReference> {
        self.tables
            .get(&table_key(family, name))
            .map(|&i| &self.ruleset.tables[i])
            .ok_or_else(|| UnresolvedReference {
                kind: "table",
                key: describe(family, &[name]),
            })
    }

    pub fn resolve_chain(
        &self,
        family: Family,
        table: &str,
        name: &str,
    ) -> Result<&Chain, UnresolvedReference> {
        self.resolve_table(family, table)?;
        self.chains
            .get(&member_key(family, table, name))
            .map(|&i| &self.ruleset.chains[i])
            .ok_or_else(|| UnresolvedReference {
                kind: "chain",
                key: describe(family, &[table, name]),
            })
    }

    pub fn resolve_set(
        &self,
        family: Family,
        table: &str,
        name: &str,
    ) -> Result<&Set, UnresolvedReference> {
        self.resolve_table(family, table)?;
        self.sets
            .get(&member_key(family, table, name))
            .map(|&i| &self.ruleset.sets[i])
            .ok_or_else(|| UnresolvedReference {
                kind: "set",
                key: describe(family, &[table, name]),
            })
    }

    pub fn into_ruleset(self) -> Ruleset {
        self.ruleset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::SetElementType;

    #[test]
    fn test_forward_reference_is_rejected() {
        let mut registry = Registry::new();
        let table = Table::new(Family::Ip, "FirstTable");
        let chain = Chain::new(&table, "input");
        let err = registry.register_chain(chain).unwrap_err();
        assert!(matches!(
            err,
            DecodeCause::UnresolvedReference(UnresolvedReference { kind: "table", .. })
        ));
    }

    #[test]
    fn test_same_name_in_other_family_is_distinct() {
        let mut registry = Registry::new();
        registry
            .register_table(Table::new(Family::Ip, "filter"))
            .unwrap();
        registry
            .register_table(Table::new(Family::Ip6, "filter"))
            .unwrap();
        assert!(registry.resolve_table(Family::Ip6, "filter").is_ok());
        assert!(registry.resolve_table(Family::Inet, "filter").is_err());
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let mut registry = Registry::new();
        let table = Table::new(Family::Inet, "t");
        registry.register_table(table.clone()).unwrap();
        assert!(matches!(
            registry.register_table(table.clone()),
            Err(DecodeCause::Duplicate { kind: "table", .. })
        ));

        let set = Set::new(&table, "hosts", SetElementType::Ipv4Addr);
        registry.register_set(set.clone()).unwrap();
        let err = registry.register_set(set).unwrap_err();
        assert_eq!(
            err.to_string(),
            "set 'inet t hosts' is defined more than once"
        );
    }

    #[test]
    fn test_rules_resolve_their_chain() {
        let mut registry = Registry::new();
        let table = Table::new(Family::Ip, "t");
        let chain = Chain::new(&table, "c");
        registry.register_table(table).unwrap();
        let orphan = Rule::new(&chain);
        assert!(registry.push_rule(orphan.clone()).is_err());

        registry.register_chain(chain.clone()).unwrap();
        registry.push_rule(orphan).unwrap();
        let ruleset = registry.into_ruleset();
        assert_eq!(ruleset.rules.len(), 1);
        assert_eq!(ruleset.chains, vec![chain]);
    }

    #[test]
    fn test_rule_handles_are_unique_per_chain() {
        let mut registry = Registry::new();
        let table = Table::new(Family::Ip, "t");
        let c = Chain::new(&table, "c");
        let d = Chain::new(&table, "d");
        registry.register_table(table).unwrap();
        registry.register_chain(c.clone()).unwrap();
        registry.register_chain(d.clone()).unwrap();

        let numbered = |chain: &Chain, handle| Rule {
            handle: Some(handle),
            ..Rule::new(chain)
        };
        registry.push_rule(numbered(&c, 5)).unwrap();
        registry.push_rule(numbered(&d, 5)).unwrap();
        registry.push_rule(Rule::new(&c)).unwrap();
        registry.push_rule(Rule::new(&c)).unwrap();

        let err = registry.push_rule(numbered(&c, 5)).unwrap_err();
        assert!(matches!(err, DecodeCause::Duplicate { kind: "rule", .. }));
        assert_eq!(err.to_string(), "rule 'ip t c 5' is defined more than once");
        assert_eq!(registry.into_ruleset().rules.len(), 4);
    }

    #[test]
    fn test_resolve_set() {
        let mut registry = Registry::new();
        let table = Table::new(Family::Ip, "t");
        registry.register_table(table.clone()).unwrap();
        registry
            .register_set(Set::new(&table, "ports", SetElementType::InetService))
            .unwrap();
        assert_eq!(
            registry.resolve_set(Family::Ip, "t", "ports").unwrap().name,
            "ports"
        );
        assert_eq!(
            registry.resolve_set(Family::Ip, "t", "missing").unwrap_err().kind,
            "set"
        );
    }
}
