//! Match expressions
//!
//! An [`Expression`] is one predicate of a rule: a packet field compared
//! against a set of literal values. The variant set is closed and mirrors the
//! `left` shapes of nftables `match` nodes: one variant per payload protocol,
//! dedicated variants for the "type" fields that carry symbolic values,
//! `meta` keys and the three conntrack shapes.
//!
//! Values are kept as wire literals (`"22"`, `"10.0.0.0/8"`, `"1024-65535"`,
//! `"eth0"`). They are only checked for shape by the decoder, never against
//! the field's datatype.

use crate::core::catalog::{Catalog, CtDirection, Family, Operator};
use crate::core::fields::{
    AhField, ArpField, ArpOperation, CompField, CtDirKey, CtKey, DccpField, DccpType, DstField,
    EspField, EtherField, EtherType, FragField, HbhField, IcmpField, IcmpType, Icmpv6Field,
    Icmpv6Type, Ip6Field, IpField, MetaKey, MhField, RtField, SctpField, TcpField, UdpField,
    UdpliteField, VlanField,
};

/// A field compared against a list of literal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<F> {
    pub field: F,
    pub op: Operator,
    pub values: Vec<String>,
}

impl<F: Catalog> Match<F> {
    pub fn new<I, S>(field: F, op: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field,
            op,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A "type" field compared against symbolic values of a closed catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMatch<T> {
    pub op: Operator,
    pub types: Vec<T>,
}

impl<T: Catalog> TypeMatch<T> {
    pub fn new(op: Operator, types: impl IntoIterator<Item = T>) -> Self {
        Self {
            op,
            types: types.into_iter().collect(),
        }
    }
}

/// Connection tracking matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtMatch {
    /// `ct state`, `ct mark`, ...
    Key(Match<CtKey>),
    /// `ct original saddr`, `ct reply proto-dst`, ...
    Directional {
        dir: CtDirection,
        family: Option<Family>,
        key: CtDirKey,
        op: Operator,
        values: Vec<String>,
    },
    /// `ct count [over] <n>`
    Count { over: bool, count: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Ip(Match<IpField>),
    Ip6(Match<Ip6Field>),
    Tcp(Match<TcpField>),
    Udp(Match<UdpField>),
    Udplite(Match<UdpliteField>),
    Sctp(Match<SctpField>),
    Dccp(Match<DccpField>),
    DccpType(TypeMatch<DccpType>),
    Ah(Match<AhField>),
    Esp(Match<EspField>),
    Comp(Match<CompField>),
    Icmp(Match<IcmpField>),
    IcmpType(TypeMatch<IcmpType>),
    Icmpv6(Match<Icmpv6Field>),
    Icmpv6Type(TypeMatch<Icmpv6Type>),
    Ether(Match<EtherField>),
    EtherType(TypeMatch<EtherType>),
    Dst(Match<DstField>),
    Frag(Match<FragField>),
    Hbh(Match<HbhField>),
    Mh(Match<MhField>),
    Rt(Match<RtField>),
    Vlan(Match<VlanField>),
    Arp(Match<ArpField>),
    ArpOperation(TypeMatch<ArpOperation>),
    Ct(CtMatch),
    Meta(Match<MetaKey>),
}

macro_rules! impl_from_match {
    ($($inner:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$inner> for Expression {
                fn from(m: $inner) -> Self {
                    Expression::$variant(m)
                }
            }
        )+
    };
}

impl_from_match! {
    Match<IpField> => Ip,
    Match<Ip6Field> => Ip6,
    Match<TcpField> => Tcp,
    Match<UdpField> => Udp,
    Match<UdpliteField> => Udplite,
    Match<SctpField> => Sctp,
    Match<DccpField> => Dccp,
    TypeMatch<DccpType> => DccpType,
    Match<AhField> => Ah,
    Match<EspField> => Esp,
    Match<CompField> => Comp,
    Match<IcmpField> => Icmp,
    TypeMatch<IcmpType> => IcmpType,
    Match<Icmpv6Field> => Icmpv6,
    TypeMatch<Icmpv6Type> => Icmpv6Type,
    Match<EtherField> => Ether,
    TypeMatch<EtherType> => EtherType,
    Match<DstField> => Dst,
    Match<FragField> => Frag,
    Match<HbhField> => Hbh,
    Match<MhField> => Mh,
    Match<RtField> => Rt,
    Match<VlanField> => Vlan,
    Match<ArpField> => Arp,
    TypeMatch<ArpOperation> => ArpOperation,
    CtMatch => Ct,
    Match<MetaKey> => Meta,
}

impl From<Match<CtKey>> for Expression {
    fn from(m: Match<CtKey>) -> Self {
        Expression::Ct(CtMatch::Key(m))
    }
}

impl Expression {
    /// Protocol tag of the matcher (`"tcp"`, `"meta"`, `"ct"`, ...)
    pub fn protocol(&self) -> &'static str {
        match self {
            Expression::Ip(_) => IpField::TAG,
            Expression::Ip6(_) => Ip6Field::TAG,
            Expression::Tcp(_) => TcpField::TAG,
            Expression::Udp(_) => UdpField::TAG,
            Expression::Udplite(_) => UdpliteField::TAG,
            Expression::Sctp(_) => SctpField::TAG,
            Expression::Dccp(_) | Expression::DccpType(_) => DccpField::TAG,
            Expression::Ah(_) => AhField::TAG,
            Expression::Esp(_) => EspField::TAG,
            Expression::Comp(_) => CompField::TAG,
            Expression::Icmp(_) | Expression::IcmpType(_) => IcmpField::TAG,
            Expression::Icmpv6(_) | Expression::Icmpv6Type(_) => Icmpv6Field::TAG,
            Expression::Ether(_) | Expression::EtherType(_) => EtherField::TAG,
            Expression::Dst(_) => DstField::TAG,
            Expression::Frag(_) => FragField::TAG,
            Expression::Hbh(_) => HbhField::TAG,
            Expression::Mh(_) => MhField::TAG,
            Expression::Rt(_) => RtField::TAG,
            Expression::Vlan(_) => VlanField::TAG,
            Expression::Arp(_) | Expression::ArpOperation(_) => ArpField::TAG,
            Expression::Ct(_) => CtKey::TAG,
            Expression::Meta(_) => MetaKey::TAG,
        }
    }

    /// `ct count over <n>` when `over`, otherwise `ct count <n>`
    pub fn ct_count(count: u32, over: bool) -> Self {
        Expression::Ct(CtMatch::Count { over, count })
    }

    pub fn ct_directional<I, S>(
        dir: CtDirection,
        family: Option<Family>,
        key: CtDirKey,
        op: Operator,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expression::Ct(CtMatch::Directional {
            dir,
            family,
            key,
            op,
            values: values.into_iter().map(Into::into).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_match_picks_variant() {
        let expr: Expression = Match::new(TcpField::Sport, Operator::Eq, ["54"]).into();
        assert_eq!(
            expr,
            Expression::Tcp(Match {
                field: TcpField::Sport,
                op: Operator::Eq,
                values: vec!["54".to_string()],
            })
        );
        assert_eq!(expr.protocol(), "tcp");
    }

    #[test]
    fn test_type_matchers_share_protocol_tag() {
        let expr: Expression =
            TypeMatch::new(Operator::Eq, [IcmpType::EchoRequest, IcmpType::EchoReply]).into();
        assert_eq!(expr.protocol(), "icmp");

        let arp: Expression = TypeMatch::new(Operator::Eq, [ArpOperation::Request]).into();
        assert_eq!(arp.protocol(), "arp");
    }

    #[test]
    fn test_ct_key_match_converts() {
        let expr: Expression = Match::new(CtKey::State, Operator::Eq, ["established"]).into();
        assert!(matches!(
            expr,
            Expression::Ct(CtMatch::Key(Match {
                field: CtKey::State,
                ..
            }))
        ));
        assert_eq!(expr.protocol(), "ct");
    }

    #[test]
    fn test_ct_shapes() {
        assert_eq!(Expression::ct_count(10, true).protocol(), "ct");
        let dir = Expression::ct_directional(
            CtDirection::Reply,
            Some(Family::Ip),
            CtDirKey::Saddr,
            Operator::Ne,
            ["10.0.0.1"],
        );
        assert!(matches!(
            dir,
            Expression::Ct(CtMatch::Directional {
                dir: CtDirection::Reply,
                ..
            })
        ));
    }
}
