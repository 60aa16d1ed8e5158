//! Closed wire vocabularies
//!
//! Every token that appears in the nftables JSON schema with a fixed set of
//! legal values is modelled as a [`Catalog`] enum. Lookups are total in both
//! directions: [`Catalog::token`] never fails, and [`Catalog::from_token`]
//! returns [`UnknownVariant`] for anything outside the declared set.
//!
//! Protocol field catalogs live in [`crate::core::fields`].

use crate::core::error::UnknownVariant;
use std::str::FromStr;
use strum::IntoEnumIterator;

/// A closed set of wire tokens.
pub trait Catalog: Copy + FromStr + Into<&'static str> + IntoEnumIterator + 'static {
    /// Name of the vocabulary, used in error messages.
    const TAG: &'static str;

    /// Looks up the variant for a wire token.
    fn from_token(token: &str) -> Result<Self, UnknownVariant> {
        token
            .parse()
            .map_err(|_| UnknownVariant::new(Self::TAG, token))
    }

    /// Returns the wire token of this variant.
    fn token(self) -> &'static str {
        self.into()
    }
}

/// Declares a catalog enum together with its wire tokens.
macro_rules! catalog {
    (
        $(#[$meta:meta])*
        $name:ident, $tag:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $token:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            strum::Display,
            strum::EnumString,
            strum::EnumIter,
            strum::IntoStaticStr,
        )]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[strum(serialize = $token)]
                $variant,
            )+
        }

        impl $crate::core::catalog::Catalog for $name {
            const TAG: &'static str = $tag;
        }
    };
}

pub(crate) use catalog;

catalog! {
    /// Address family of a table and everything inside it
    Family, "family" {
        Ip => "ip",
        Ip6 => "ip6",
        Inet => "inet",
        Arp => "arp",
        Bridge => "bridge",
        Netdev => "netdev",
    }
}

catalog! {
    /// Relational operator of a match expression
    Operator, "operator" {
        Eq => "==",
        Ne => "!=",
        Lt => "<",
        Gt => ">",
        Le => "<=",
        Ge => ">=",
    }
}

catalog! {
    ChainType, "chain type" {
        Filter => "filter",
        Nat => "nat",
        Route => "route",
    }
}

catalog! {
    /// Packet path attachment point of a base chain
    Hook, "hook" {
        Prerouting => "prerouting",
        Input => "input",
        Forward => "forward",
        Output => "output",
        Postrouting => "postrouting",
        Ingress => "ingress",
        Egress => "egress",
    }
}

catalog! {
    ChainPolicy, "chain policy" {
        Accept => "accept",
        Drop => "drop",
    }
}

catalog! {
    /// Datatype of the elements stored in a named set
    SetElementType, "set type" {
        Ipv4Addr => "ipv4_addr",
        Ipv6Addr => "ipv6_addr",
        EtherAddr => "ether_addr",
        InetProto => "inet_proto",
        InetService => "inet_service",
        Mark => "mark",
        Ifname => "ifname",
    }
}

catalog! {
    SetPolicy, "set policy" {
        Performance => "performance",
        Memory => "memory",
    }
}

catalog! {
    SetFlag, "set flag" {
        Constant => "constant",
        Interval => "interval",
        Timeout => "timeout",
        Dynamic => "dynamic",
    }
}

catalog! {
    /// Connection tracking direction of a `ct original|reply` match
    CtDirection, "ct direction" {
        Original => "original",
        Reply => "reply",
    }
}

catalog! {
    /// Time unit of a `limit` statement
    TimeUnit, "time unit" {
        Second => "second",
        Minute => "minute",
        Hour => "hour",
        Day => "day",
        Week => "week",
    }
}

catalog! {
    /// Byte unit of a byte-rate `limit` statement
    ByteUnit, "byte unit" {
        Bytes => "bytes",
        Kbytes => "kbytes",
        Mbytes => "mbytes",
    }
}

catalog! {
    LogLevel, "log level" {
        Emerg => "emerg",
        Alert => "alert",
        Crit => "crit",
        Error => "err",
        Warn => "warn",
        Notice => "notice",
        Info => "info",
        Debug => "debug",
        Audit => "audit",
    }
}

catalog! {
    NatFlag, "nat flag" {
        Random => "random",
        FullyRandom => "fully-random",
        Persistent => "persistent",
    }
}

catalog! {
    RejectType, "reject type" {
        TcpReset => "tcp reset",
        Icmp => "icmp",
        Icmpv6 => "icmpv6",
        Icmpx => "icmpx",
    }
}

catalog! {
    /// ICMP code sent back by a `reject` statement
    RejectReason, "reject reason" {
        NetUnreachable => "net-unreachable",
        HostUnreachable => "host-unreachable",
        ProtUnreachable => "prot-unreachable",
        PortUnreachable => "port-unreachable",
        NetProhibited => "net-prohibited",
        HostProhibited => "host-prohibited",
        AdminProhibited => "admin-prohibited",
        NoRoute => "no-route",
        AddrUnreachable => "addr-unreachable",
    }
}

#[cfg(test)]
pub(crate) fn assert_catalog_round_trips<C: Catalog + std::fmt::Debug + PartialEq>() {
    for variant in C::iter() {
        assert_eq!(C::from_token(variant.token()), Ok(variant), "{}", C::TAG);
    }
}
