//! Protocol header fields and symbolic type values
//!
//! Each payload catalog's [`Catalog::TAG`](crate::core::catalog::Catalog::TAG)
//! is the protocol token itself (`"tcp"`, `"ip6"`, ...), so a field variant
//! alone is enough to rebuild the `payload` node it came from.
//!
//! The "type" style fields of ether, arp, dccp, icmp and icmpv6 are not part
//! of the payload catalogs: they are matched against closed symbolic value
//! lists instead (see the `*Type` catalogs at the bottom of this file).

use crate::core::catalog::catalog;

catalog! {
    IpField, "ip" {
        Version => "version",
        HdrLength => "hdrlength",
        Dscp => "dscp",
        Ecn => "ecn",
        Length => "length",
        Id => "id",
        FragOff => "frag-off",
        Ttl => "ttl",
        Protocol => "protocol",
        Checksum => "checksum",
        Saddr => "saddr",
        Daddr => "daddr",
    }
}

catalog! {
    Ip6Field, "ip6" {
        Version => "version",
        Dscp => "dscp",
        Ecn => "ecn",
        FlowLabel => "flowlabel",
        Length => "length",
        NextHdr => "nexthdr",
        HopLimit => "hoplimit",
        Saddr => "saddr",
        Daddr => "daddr",
    }
}

catalog! {
    TcpField, "tcp" {
        Sport => "sport",
        Dport => "dport",
        Sequence => "sequence",
        AckSeq => "ackseq",
        Doff => "doff",
        Reserved => "reserved",
        Flags => "flags",
        Window => "window",
        Checksum => "checksum",
        UrgPtr => "urgptr",
    }
}

catalog! {
    UdpField, "udp" {
        Sport => "sport",
        Dport => "dport",
        Length => "length",
        Checksum => "checksum",
    }
}

catalog! {
    UdpliteField, "udplite" {
        Sport => "sport",
        Dport => "dport",
        Checksum => "checksum",
    }
}

catalog! {
    SctpField, "sctp" {
        Sport => "sport",
        Dport => "dport",
        Vtag => "vtag",
        Checksum => "checksum",
    }
}

catalog! {
    DccpField, "dccp" {
        Sport => "sport",
        Dport => "dport",
    }
}

catalog! {
    AhField, "ah" {
        NextHdr => "nexthdr",
        HdrLength => "hdrlength",
        Reserved => "reserved",
        Spi => "spi",
        Sequence => "sequence",
    }
}

catalog! {
    EspField, "esp" {
        Spi => "spi",
        Sequence => "sequence",
    }
}

catalog! {
    CompField, "comp" {
        NextHdr => "nexthdr",
        Flags => "flags",
        Cpi => "cpi",
    }
}

catalog! {
    IcmpField, "icmp" {
        Code => "code",
        Checksum => "checksum",
        Id => "id",
        Sequence => "sequence",
        Gateway => "gateway",
        Mtu => "mtu",
    }
}

catalog! {
    Icmpv6Field, "icmpv6" {
        Code => "code",
        Checksum => "checksum",
        ParameterProblem => "parameter-problem",
        PacketTooBig => "packet-too-big",
        Id => "id",
        Sequence => "sequence",
        MaxDelay => "max-delay",
    }
}

catalog! {
    EtherField, "ether" {
        Saddr => "saddr",
        Daddr => "daddr",
    }
}

catalog! {
    /// IPv6 destination options header
    DstField, "dst" {
        NextHdr => "nexthdr",
        HdrLength => "hdrlength",
    }
}

catalog! {
    /// IPv6 fragment header
    FragField, "frag" {
        NextHdr => "nexthdr",
        Reserved => "reserved",
        FragOff => "frag-off",
        Reserved2 => "reserved2",
        MoreFragments => "more-fragments",
        Id => "id",
    }
}

catalog! {
    /// IPv6 hop-by-hop options header
    HbhField, "hbh" {
        NextHdr => "nexthdr",
        HdrLength => "hdrlength",
    }
}

catalog! {
    /// IPv6 mobility header
    MhField, "mh" {
        NextHdr => "nexthdr",
        HdrLength => "hdrlength",
        Type => "type",
        Reserved => "reserved",
        Checksum => "checksum",
    }
}

catalog! {
    /// IPv6 routing header
    RtField, "rt" {
        NextHdr => "nexthdr",
        HdrLength => "hdrlength",
        Type => "type",
        SegLeft => "seg-left",
    }
}

catalog! {
    VlanField, "vlan" {
        Id => "id",
        Cfi => "cfi",
        Pcp => "pcp",
        Type => "type",
    }
}

catalog! {
    ArpField, "arp" {
        Htype => "htype",
        Ptype => "ptype",
        Hlen => "hlen",
        Plen => "plen",
    }
}

catalog! {
    /// Packet metadata keys (`meta <key>`)
    MetaKey, "meta" {
        Length => "length",
        Nfproto => "nfproto",
        L4proto => "l4proto",
        Protocol => "protocol",
        Priority => "priority",
        Mark => "mark",
        Iif => "iif",
        Iifname => "iifname",
        Iiftype => "iiftype",
        Oif => "oif",
        Oifname => "oifname",
        Oiftype => "oiftype",
        Skuid => "skuid",
        Skgid => "skgid",
        Nftrace => "nftrace",
        Rtclassid => "rtclassid",
        Ibrname => "ibrname",
        Obrname => "obrname",
        Pkttype => "pkttype",
        Cpu => "cpu",
        Iifgroup => "iifgroup",
        Oifgroup => "oifgroup",
        Cgroup => "cgroup",
        Random => "random",
        Secpath => "secpath",
    }
}

catalog! {
    /// Conntrack keys matched without a direction
    CtKey, "ct" {
        State => "state",
        Direction => "direction",
        Status => "status",
        Mark => "mark",
        Expiration => "expiration",
        Helper => "helper",
        Label => "label",
        L3proto => "l3proto",
        Protocol => "protocol",
        Zone => "zone",
        Bytes => "bytes",
        Packets => "packets",
        Avgpkt => "avgpkt",
        Id => "id",
    }
}

catalog! {
    /// Conntrack keys matched per direction (`ct original saddr`)
    CtDirKey, "ct directional key" {
        Saddr => "saddr",
        Daddr => "daddr",
        L3proto => "l3proto",
        Protocol => "protocol",
        ProtoSrc => "proto-src",
        ProtoDst => "proto-dst",
        Bytes => "bytes",
        Packets => "packets",
        Avgpkt => "avgpkt",
        Zone => "zone",
    }
}

// ─── Symbolic type values ──────────────────────────────────────────────────

catalog! {
    EtherType, "ether type" {
        Ip => "ip",
        Ip6 => "ip6",
        Arp => "arp",
        Vlan => "vlan",
    }
}

catalog! {
    ArpOperation, "arp operation" {
        Request => "request",
        Reply => "reply",
        Rrequest => "rrequest",
        Rreply => "rreply",
        Inrequest => "inrequest",
        Inreply => "inreply",
        Nak => "nak",
    }
}

catalog! {
    DccpType, "dccp type" {
        Request => "request",
        Response => "response",
        Data => "data",
        Ack => "ack",
        DataAck => "dataack",
        CloseReq => "closereq",
        Close => "close",
        Reset => "reset",
        Sync => "sync",
        SyncAck => "syncack",
    }
}

catalog! {
    IcmpType, "icmp type" {
        EchoReply => "echo-reply",
        DestinationUnreachable => "destination-unreachable",
        SourceQuench => "source-quench",
        Redirect => "redirect",
        EchoRequest => "echo-request",
        RouterAdvertisement => "router-advertisement",
        RouterSolicitation => "router-solicitation",
        TimeExceeded => "time-exceeded",
        ParameterProblem => "parameter-problem",
        TimestampRequest => "timestamp-request",
        TimestampReply => "timestamp-reply",
        InfoRequest => "info-request",
        InfoReply => "info-reply",
        AddressMaskRequest => "address-mask-request",
        AddressMaskReply => "address-mask-reply",
    }
}

catalog! {
    Icmpv6Type, "icmpv6 type" {
        DestinationUnreachable => "destination-unreachable",
        PacketTooBig => "packet-too-big",
        TimeExceeded => "time-exceeded",
        ParameterProblem => "parameter-problem",
        EchoRequest => "echo-request",
        EchoReply => "echo-reply",
        MldListenerQuery => "mld-listener-query",
        MldListenerReport => "mld-listener-report",
        MldListenerDone => "mld-listener-done",
        NdRouterSolicit => "nd-router-solicit",
        NdRouterAdvert => "nd-router-advert",
        NdNeighborSolicit => "nd-neighbor-solicit",
        NdNeighborAdvert => "nd-neighbor-advert",
        NdRedirect => "nd-redirect",
        RouterRenumbering => "router-renumbering",
        IndNeighborSolicit => "ind-neighbor-solicit",
        IndNeighborAdvert => "ind-neighbor-advert",
        Mld2ListenerReport => "mld2-listener-report",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{Catalog, assert_catalog_round_trips};

    #[test]
    fn test_payload_tag_is_protocol_token() {
        assert_eq!(TcpField::TAG, "tcp");
        assert_eq!(Ip6Field::TAG, "ip6");
        assert_eq!(MetaKey::TAG, "meta");
    }

    #[test]
    fn test_hyphenated_fields() {
        assert_eq!(IpField::from_token("frag-off"), Ok(IpField::FragOff));
        assert_eq!(CtDirKey::ProtoDst.token(), "proto-dst");
        assert_eq!(FragField::MoreFragments.token(), "more-fragments");
    }

    #[test]
    fn test_type_field_is_not_a_payload_field() {
        assert!(IcmpField::from_token("type").is_err());
        assert!(EtherField::from_token("type").is_err());
        // mh/rt/vlan "type" carries plain numeric values
        assert_eq!(RtField::from_token("type"), Ok(RtField::Type));
    }

    #[test]
    fn test_directional_keys_need_direction() {
        assert!(CtKey::from_token("saddr").is_err());
        assert!(CtDirKey::from_token("state").is_err());
    }

    #[test]
    fn test_field_catalogs_are_total() {
        assert_catalog_round_trips::<IpField>();
        assert_catalog_round_trips::<Ip6Field>();
        assert_catalog_round_trips::<TcpField>();
        assert_catalog_round_trips::<UdpField>();
        assert_catalog_round_trips::<UdpliteField>();
        assert_catalog_round_trips::<SctpField>();
        assert_catalog_round_trips::<DccpField>();
        assert_catalog_round_trips::<AhField>();
        assert_catalog_round_trips::<EspField>();
        assert_catalog_round_trips::<CompField>();
        assert_catalog_round_trips::<IcmpField>();
        assert_catalog_round_trips::<Icmpv6Field>();
        assert_catalog_round_trips::<EtherField>();
        assert_catalog_round_trips::<DstField>();
        assert_catalog_round_trips::<FragField>();
        assert_catalog_round_trips::<HbhField>();
        assert_catalog_round_trips::<MhField>();
        assert_catalog_round_trips::<RtField>();
        assert_catalog_round_trips::<VlanField>();
        assert_catalog_round_trips::<ArpField>();
        assert_catalog_round_trips::<MetaKey>();
        assert_catalog_round_trips::<CtKey>();
        assert_catalog_round_trips::<CtDirKey>();
        assert_catalog_round_trips::<EtherType>();
        assert_catalog_round_trips::<ArpOperation>();
        assert_catalog_round_trips::<DccpType>();
        assert_catalog_round_trips::<IcmpType>();
        assert_catalog_round_trips::<Icmpv6Type>();
    }
}
