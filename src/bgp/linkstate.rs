//! BGP Link-State, RFC 7752.
//!
//! Link-state information travels in two places: as NLRI of the
//! 16388/71 address family, describing a node, link or prefix of an IGP
//! topology through descriptor TLVs, and in the BGP-LS path attribute
//! (type 29) carrying the properties of that object. Both use two octet
//! types and lengths and both are dispatched through a [`TlvRegistry`].

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use inetnum::asn::Asn;

use crate::bgp::extensions::BgpExtensions;
use crate::bgp::nlri::Nlris;
use crate::tlv::{
    compose_all, compose_tlv, parse_all, parse_tlv, TlvFormat, TlvRegistry,
    TlvValue, UnknownTlv, Unrecognized,
};
use crate::typeenum; // from util::macros
use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

typeenum!(
/// Link-state NLRI types.
    LsNlriType, u16,
    1 => Node,
    2 => Link,
    3 => Ipv4Prefix,
    4 => Ipv6Prefix,
);

typeenum!(
/// Source of the link-state information.
    ProtocolId, u8,
    1 => IsisLevel1,
    2 => IsisLevel2,
    3 => Ospfv2,
    4 => Direct,
    5 => Static,
    6 => Ospfv3,
    7 => Bgp,
);

//------------ NodeDescriptor ------------------------------------------------

/// Sub-TLVs of the local and remote node descriptors.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeDescriptor {
    AutonomousSystem(Asn),
    BgpLsIdentifier(u32),
    OspfAreaId(u32),
    IgpRouterId(Vec<u8>),
    Unknown(UnknownTlv),
}

impl NodeDescriptor {
    fn parse_all(mut cursor: Cursor<'_>) -> Result<Vec<Self>, ParseError> {
        let mut res = Vec::new();
        while !cursor.is_empty() {
            let (typ, mut value) = parse_tlv(&mut cursor, TlvFormat::WIDE)?;
            let desc = match typ {
                512 => NodeDescriptor::AutonomousSystem(
                    Asn::from_u32(value.read_u32()?)
                ),
                513 => NodeDescriptor::BgpLsIdentifier(value.read_u32()?),
                514 => NodeDescriptor::OspfAreaId(value.read_u32()?),
                515 => {
                    // ISO node id, pseudonode, OSPF router id, DR address.
                    if !matches!(value.remaining(), 4 | 6 | 7 | 8) {
                        return Err(ParseError::form_error(
                            "invalid IGP router id length"
                        ));
                    }
                    NodeDescriptor::IgpRouterId(value.read_rest().to_vec())
                }
                _ => NodeDescriptor::Unknown(
                    UnknownTlv::new(typ, value.read_rest().to_vec())
                ),
            };
            value.finish("trailing octets in node descriptor")?;
            res.push(desc);
        }
        Ok(res)
    }

    fn compose_all(descs: &[Self], target: &mut BytesMut)
        -> Result<(), ComposeError>
    {
        for desc in descs {
            let (typ, value): (u16, Vec<u8>) = match desc {
                NodeDescriptor::AutonomousSystem(asn) => {
                    (512, asn.into_u32().to_be_bytes().to_vec())
                }
                NodeDescriptor::BgpLsIdentifier(id) => {
                    (513, id.to_be_bytes().to_vec())
                }
                NodeDescriptor::OspfAreaId(id) => {
                    (514, id.to_be_bytes().to_vec())
                }
                NodeDescriptor::IgpRouterId(raw) => (515, raw.clone()),
                NodeDescriptor::Unknown(tlv) => {
                    (tlv.typ(), tlv.value().to_vec())
                }
            };
            compose_tlv(target, TlvFormat::WIDE, typ, |t| {
                t.put_slice(&value);
                Ok(())
            })?;
        }
        Ok(())
    }
}

//------------ LsDescriptor --------------------------------------------------

/// A descriptor TLV of a link-state NLRI.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LsDescriptor {
    LocalNode(Vec<NodeDescriptor>),
    RemoteNode(Vec<NodeDescriptor>),
    LinkIds { local: u32, remote: u32 },
    Ipv4Interface(Ipv4Addr),
    Ipv4Neighbor(Ipv4Addr),
    Ipv6Interface(Ipv6Addr),
    Ipv6Neighbor(Ipv6Addr),
    MultiTopology(Vec<u16>),
    OspfRouteType(u8),

    /// The prefix of a prefix NLRI, in its minimal encoding.
    ///
    /// Whether this is an IPv4 or IPv6 prefix depends on the NLRI type,
    /// see [`LinkStateNlri::prefix`].
    IpReachability { bits: u8, octets: Vec<u8> },

    Unknown(UnknownTlv),
}

/// Selects the serializer for an [`LsDescriptor`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LsDescriptorTag {
    LocalNode,
    RemoteNode,
    LinkIds,
    Ipv4Interface,
    Ipv4Neighbor,
    Ipv6Interface,
    Ipv6Neighbor,
    MultiTopology,
    OspfRouteType,
    IpReachability,
    Unknown,
}

impl TlvValue for LsDescriptor {
    type Tag = LsDescriptorTag;

    fn tag(&self) -> LsDescriptorTag {
        match self {
            LsDescriptor::LocalNode(_) => LsDescriptorTag::LocalNode,
            LsDescriptor::RemoteNode(_) => LsDescriptorTag::RemoteNode,
            LsDescriptor::LinkIds { .. } => LsDescriptorTag::LinkIds,
            LsDescriptor::Ipv4Interface(_) => LsDescriptorTag::Ipv4Interface,
            LsDescriptor::Ipv4Neighbor(_) => LsDescriptorTag::Ipv4Neighbor,
            LsDescriptor::Ipv6Interface(_) => LsDescriptorTag::Ipv6Interface,
            LsDescriptor::Ipv6Neighbor(_) => LsDescriptorTag::Ipv6Neighbor,
            LsDescriptor::MultiTopology(_) => LsDescriptorTag::MultiTopology,
            LsDescriptor::OspfRouteType(_) => LsDescriptorTag::OspfRouteType,
            LsDescriptor::IpReachability { .. } => {
                LsDescriptorTag::IpReachability
            }
            LsDescriptor::Unknown(_) => LsDescriptorTag::Unknown,
        }
    }

    fn unrecognized(typ: u16, value: &[u8]) -> Self {
        LsDescriptor::Unknown(UnknownTlv::new(typ, value.to_vec()))
    }

    fn as_unrecognized(&self) -> Option<(u16, &[u8])> {
        match self {
            LsDescriptor::Unknown(tlv) => Some((tlv.typ(), tlv.value())),
            _ => None,
        }
    }
}

fn parse_local_node(c: &mut Cursor<'_>) -> Result<LsDescriptor, ParseError> {
    let all = c.slice(c.remaining())?;
    NodeDescriptor::parse_all(all).map(LsDescriptor::LocalNode)
}

fn parse_remote_node(c: &mut Cursor<'_>) -> Result<LsDescriptor, ParseError> {
    let all = c.slice(c.remaining())?;
    NodeDescriptor::parse_all(all).map(LsDescriptor::RemoteNode)
}

fn parse_link_ids(c: &mut Cursor<'_>) -> Result<LsDescriptor, ParseError> {
    Ok(LsDescriptor::LinkIds { local: c.read_u32()?, remote: c.read_u32()? })
}

fn parse_ipv4_interface(c: &mut Cursor<'_>)
    -> Result<LsDescriptor, ParseError>
{
    Ok(LsDescriptor::Ipv4Interface(c.read_ipv4()?))
}

fn parse_ipv4_neighbor(c: &mut Cursor<'_>)
    -> Result<LsDescriptor, ParseError>
{
    Ok(LsDescriptor::Ipv4Neighbor(c.read_ipv4()?))
}

fn parse_ipv6_interface(c: &mut Cursor<'_>)
    -> Result<LsDescriptor, ParseError>
{
    Ok(LsDescriptor::Ipv6Interface(c.read_ipv6()?))
}

fn parse_ipv6_neighbor(c: &mut Cursor<'_>)
    -> Result<LsDescriptor, ParseError>
{
    Ok(LsDescriptor::Ipv6Neighbor(c.read_ipv6()?))
}

fn parse_multi_topology(c: &mut Cursor<'_>)
    -> Result<LsDescriptor, ParseError>
{
    if c.remaining() % 2 != 0 {
        return Err(ParseError::form_error("odd multi-topology id length"));
    }
    let mut res = Vec::new();
    while !c.is_empty() {
        res.push(c.read_u16()? & 0x0fff);
    }
    Ok(LsDescriptor::MultiTopology(res))
}

fn parse_ospf_route_type(c: &mut Cursor<'_>)
    -> Result<LsDescriptor, ParseError>
{
    Ok(LsDescriptor::OspfRouteType(c.read_u8()?))
}

fn parse_ip_reachability(c: &mut Cursor<'_>)
    -> Result<LsDescriptor, ParseError>
{
    let bits = c.read_u8()?;
    if bits > 128 {
        return Err(ParseError::form_error("prefix length too long"));
    }
    let octets = c.read_bytes((usize::from(bits) + 7) / 8)?.to_vec();
    Ok(LsDescriptor::IpReachability { bits, octets })
}

fn compose_descriptor(desc: &LsDescriptor, target: &mut BytesMut)
    -> Result<(), ComposeError>
{
    match desc {
        LsDescriptor::LocalNode(n) | LsDescriptor::RemoteNode(n) => {
            NodeDescriptor::compose_all(n, target)?
        }
        LsDescriptor::LinkIds { local, remote } => {
            target.put_u32(*local);
            target.put_u32(*remote);
        }
        LsDescriptor::Ipv4Interface(a) | LsDescriptor::Ipv4Neighbor(a) => {
            target.put_slice(&a.octets())
        }
        LsDescriptor::Ipv6Interface(a) | LsDescriptor::Ipv6Neighbor(a) => {
            target.put_slice(&a.octets())
        }
        LsDescriptor::MultiTopology(ids) => {
            for id in ids {
                target.put_u16(*id);
            }
        }
        LsDescriptor::OspfRouteType(t) => target.put_u8(*t),
        LsDescriptor::IpReachability { bits, octets } => {
            target.put_u8(*bits);
            target.put_slice(octets);
        }
        LsDescriptor::Unknown(tlv) => target.put_slice(tlv.value()),
    }
    Ok(())
}

/// Registers the descriptor TLVs of RFC 7752 section 3.2.
pub fn register_descriptor_defaults(
    registry: &mut TlvRegistry<LsDescriptor>
) {
    use LsDescriptorTag::*;
    let builtins: [(u16, LsDescriptorTag, crate::tlv::TlvParser<LsDescriptor>);
        10] = [
        (256, LocalNode, parse_local_node),
        (257, RemoteNode, parse_remote_node),
        (258, LinkIds, parse_link_ids),
        (259, Ipv4Interface, parse_ipv4_interface),
        (260, Ipv4Neighbor, parse_ipv4_neighbor),
        (261, Ipv6Interface, parse_ipv6_interface),
        (262, Ipv6Neighbor, parse_ipv6_neighbor),
        (263, MultiTopology, parse_multi_topology),
        (264, OspfRouteType, parse_ospf_route_type),
        (265, IpReachability, parse_ip_reachability),
    ];
    for (code, tag, parser) in builtins {
        if let Err(err) = registry.register(
            code, tag, parser, compose_descriptor
        ) {
            log::error!("cannot register BGP-LS descriptor: {}", err);
        }
    }
}

//------------ LinkStateNlri -------------------------------------------------

/// A single link-state NLRI.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkStateNlri {
    nlri_type: LsNlriType,
    protocol_id: ProtocolId,
    identifier: u64,
    descriptors: Vec<LsDescriptor>,
}

impl LinkStateNlri {
    pub fn new(
        nlri_type: LsNlriType,
        protocol_id: ProtocolId,
        identifier: u64,
        descriptors: Vec<LsDescriptor>,
    ) -> Self {
        LinkStateNlri { nlri_type, protocol_id, identifier, descriptors }
    }

    pub fn nlri_type(&self) -> LsNlriType {
        self.nlri_type
    }

    pub fn protocol_id(&self) -> ProtocolId {
        self.protocol_id
    }

    pub fn identifier(&self) -> u64 {
        self.identifier
    }

    pub fn descriptors(&self) -> &[LsDescriptor] {
        &self.descriptors
    }

    /// Returns the local node descriptors.
    pub fn local_node(&self) -> Option<&[NodeDescriptor]> {
        self.descriptors.iter().find_map(|d| match d {
            LsDescriptor::LocalNode(n) => Some(n.as_slice()),
            _ => None,
        })
    }

    /// Returns the reachability prefix of a prefix NLRI.
    pub fn prefix(&self) -> Option<inetnum::addr::Prefix> {
        let (bits, octets) = self.descriptors.iter().find_map(|d| match d {
            LsDescriptor::IpReachability { bits, octets } => {
                Some((*bits, octets))
            }
            _ => None,
        })?;
        let addr = match self.nlri_type {
            LsNlriType::Ipv4Prefix => {
                let mut buf = [0u8; 4];
                buf.get_mut(..octets.len())?.copy_from_slice(octets);
                std::net::IpAddr::from(buf)
            }
            LsNlriType::Ipv6Prefix => {
                let mut buf = [0u8; 16];
                buf.get_mut(..octets.len())?.copy_from_slice(octets);
                std::net::IpAddr::from(buf)
            }
            _ => return None,
        };
        inetnum::addr::Prefix::new(addr, bits).ok()
    }

    /// Parses one NLRI including its type and length header.
    pub fn parse(
        cursor: &mut Cursor<'_>,
        registry: &TlvRegistry<LsDescriptor>,
    ) -> Result<Self, ParseError> {
        let (typ, mut value) = parse_tlv(cursor, TlvFormat::WIDE)?;
        let protocol_id = value.read_u8()?.into();
        let identifier = value.read_u64()?;
        let descriptors = parse_all(
            value, TlvFormat::WIDE, registry, Unrecognized::Keep
        )?;
        let res = LinkStateNlri {
            nlri_type: typ.into(),
            protocol_id,
            identifier,
            descriptors,
        };
        if res.local_node().is_none() {
            return Err(ParseError::form_error(
                "link-state NLRI without local node descriptors"
            ));
        }
        Ok(res)
    }

    pub fn compose(
        &self,
        registry: &TlvRegistry<LsDescriptor>,
        target: &mut BytesMut,
    ) -> Result<(), ComposeError> {
        compose_tlv(target, TlvFormat::WIDE, self.nlri_type.into(), |t| {
            t.put_u8(self.protocol_id.into());
            t.put_u64(self.identifier);
            compose_all(&self.descriptors, TlvFormat::WIDE, registry, t)
        })
    }
}

impl fmt::Display for LinkStateNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "{} via {} (id {}, {} descriptors)",
            self.nlri_type, self.protocol_id, self.identifier,
            self.descriptors.len()
        )
    }
}

/// NLRI parser for the link-state address family.
pub fn parse_nlris(
    cursor: &mut Cursor<'_>,
    _add_path: bool,
    extensions: &BgpExtensions,
) -> Result<Nlris, ParseError> {
    let mut res = Vec::new();
    while !cursor.is_empty() {
        res.push(LinkStateNlri::parse(
            cursor, extensions.ls_descriptors()
        )?);
    }
    Ok(Nlris::LinkState(res))
}

/// NLRI serializer for the link-state address family.
pub fn compose_nlris(
    nlris: &Nlris,
    extensions: &BgpExtensions,
    target: &mut BytesMut,
) -> Result<(), ComposeError> {
    match nlris {
        Nlris::LinkState(v) => {
            for nlri in v {
                nlri.compose(extensions.ls_descriptors(), target)?;
            }
            Ok(())
        }
        _ => Err(ComposeError::InvalidValue("expected link-state NLRI")),
    }
}

//------------ LinkStateTlv --------------------------------------------------

/// Bandwidth in IEEE 754 bytes per second, kept as raw bits.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bandwidth(u32);

impl Bandwidth {
    pub fn from_bytes_per_sec(value: f32) -> Self {
        Bandwidth(value.to_bits())
    }

    pub fn bytes_per_sec(self) -> f32 {
        f32::from_bits(self.0)
    }
}

/// A TLV of the BGP-LS path attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkStateTlv {
    NodeName(String),
    IsisArea(Vec<u8>),
    LocalIpv4RouterId(Ipv4Addr),
    LocalIpv6RouterId(Ipv6Addr),
    RemoteIpv4RouterId(Ipv4Addr),
    RemoteIpv6RouterId(Ipv6Addr),
    AdminGroup(u32),
    MaxLinkBandwidth(Bandwidth),
    MaxReservableBandwidth(Bandwidth),
    TeDefaultMetric(u32),

    /// IGP metric, encoded in one to three octets.
    IgpMetric { metric: u32, width: u8 },

    LinkName(String),
    IgpFlags(u8),
    RouteTags(Vec<u32>),
    PrefixMetric(u32),
    Unknown(UnknownTlv),
}

/// Selects the serializer for a [`LinkStateTlv`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LinkStateTlvTag {
    NodeName,
    IsisArea,
    LocalIpv4RouterId,
    LocalIpv6RouterId,
    RemoteIpv4RouterId,
    RemoteIpv6RouterId,
    AdminGroup,
    MaxLinkBandwidth,
    MaxReservableBandwidth,
    TeDefaultMetric,
    IgpMetric,
    LinkName,
    IgpFlags,
    RouteTags,
    PrefixMetric,
    Unknown,
}

impl TlvValue for LinkStateTlv {
    type Tag = LinkStateTlvTag;

    fn tag(&self) -> LinkStateTlvTag {
        use LinkStateTlv as V;
        use LinkStateTlvTag as T;
        match self {
            V::NodeName(_) => T::NodeName,
            V::IsisArea(_) => T::IsisArea,
            V::LocalIpv4RouterId(_) => T::LocalIpv4RouterId,
            V::LocalIpv6RouterId(_) => T::LocalIpv6RouterId,
            V::RemoteIpv4RouterId(_) => T::RemoteIpv4RouterId,
            V::RemoteIpv6RouterId(_) => T::RemoteIpv6RouterId,
            V::AdminGroup(_) => T::AdminGroup,
            V::MaxLinkBandwidth(_) => T::MaxLinkBandwidth,
            V::MaxReservableBandwidth(_) => T::MaxReservableBandwidth,
            V::TeDefaultMetric(_) => T::TeDefaultMetric,
            V::IgpMetric { .. } => T::IgpMetric,
            V::LinkName(_) => T::LinkName,
            V::IgpFlags(_) => T::IgpFlags,
            V::RouteTags(_) => T::RouteTags,
            V::PrefixMetric(_) => T::PrefixMetric,
            V::Unknown(_) => T::Unknown,
        }
    }

    fn unrecognized(typ: u16, value: &[u8]) -> Self {
        LinkStateTlv::Unknown(UnknownTlv::new(typ, value.to_vec()))
    }

    fn as_unrecognized(&self) -> Option<(u16, &[u8])> {
        match self {
            LinkStateTlv::Unknown(tlv) => Some((tlv.typ(), tlv.value())),
            _ => None,
        }
    }
}

fn read_string(c: &mut Cursor<'_>) -> Result<String, ParseError> {
    String::from_utf8(c.read_rest().to_vec())
        .map_err(|_| ParseError::form_error("name is not valid UTF-8"))
}

fn parse_node_name(c: &mut Cursor<'_>) -> Result<LinkStateTlv, ParseError> {
    read_string(c).map(LinkStateTlv::NodeName)
}

fn parse_isis_area(c: &mut Cursor<'_>) -> Result<LinkStateTlv, ParseError> {
    Ok(LinkStateTlv::IsisArea(c.read_rest().to_vec()))
}

fn parse_local_ipv4_id(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::LocalIpv4RouterId(c.read_ipv4()?))
}

fn parse_local_ipv6_id(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::LocalIpv6RouterId(c.read_ipv6()?))
}

fn parse_remote_ipv4_id(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::RemoteIpv4RouterId(c.read_ipv4()?))
}

fn parse_remote_ipv6_id(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::RemoteIpv6RouterId(c.read_ipv6()?))
}

fn parse_admin_group(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::AdminGroup(c.read_u32()?))
}

fn parse_max_bandwidth(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::MaxLinkBandwidth(Bandwidth(c.read_u32()?)))
}

fn parse_max_reservable(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::MaxReservableBandwidth(Bandwidth(c.read_u32()?)))
}

fn parse_te_metric(c: &mut Cursor<'_>) -> Result<LinkStateTlv, ParseError> {
    Ok(LinkStateTlv::TeDefaultMetric(c.read_u32()?))
}

fn parse_igp_metric(c: &mut Cursor<'_>) -> Result<LinkStateTlv, ParseError> {
    let width = c.remaining();
    if !(1..=3).contains(&width) {
        return Err(ParseError::form_error("invalid IGP metric length"));
    }
    let mut metric = 0u32;
    for _ in 0..width {
        metric = metric << 8 | u32::from(c.read_u8()?);
    }
    // Range checked above.
    Ok(LinkStateTlv::IgpMetric { metric, width: width as u8 })
}

fn parse_link_name(c: &mut Cursor<'_>) -> Result<LinkStateTlv, ParseError> {
    read_string(c).map(LinkStateTlv::LinkName)
}

fn parse_igp_flags(c: &mut Cursor<'_>) -> Result<LinkStateTlv, ParseError> {
    Ok(LinkStateTlv::IgpFlags(c.read_u8()?))
}

fn parse_route_tags(c: &mut Cursor<'_>) -> Result<LinkStateTlv, ParseError> {
    if c.remaining() % 4 != 0 {
        return Err(ParseError::form_error("invalid route tag length"));
    }
    let mut res = Vec::new();
    while !c.is_empty() {
        res.push(c.read_u32()?);
    }
    Ok(LinkStateTlv::RouteTags(res))
}

fn parse_prefix_metric(c: &mut Cursor<'_>)
    -> Result<LinkStateTlv, ParseError>
{
    Ok(LinkStateTlv::PrefixMetric(c.read_u32()?))
}

fn compose_attribute_tlv(tlv: &LinkStateTlv, target: &mut BytesMut)
    -> Result<(), ComposeError>
{
    use LinkStateTlv as V;
    match tlv {
        V::NodeName(s) | V::LinkName(s) => target.put_slice(s.as_bytes()),
        V::IsisArea(raw) => target.put_slice(raw),
        V::LocalIpv4RouterId(a) | V::RemoteIpv4RouterId(a) => {
            target.put_slice(&a.octets())
        }
        V::LocalIpv6RouterId(a) | V::RemoteIpv6RouterId(a) => {
            target.put_slice(&a.octets())
        }
        V::AdminGroup(v) | V::TeDefaultMetric(v) | V::PrefixMetric(v) => {
            target.put_u32(*v)
        }
        V::MaxLinkBandwidth(b) | V::MaxReservableBandwidth(b) => {
            target.put_u32(b.0)
        }
        V::IgpMetric { metric, width } => {
            if !(1..=3).contains(width) {
                return Err(ComposeError::InvalidValue(
                    "IGP metric width must be 1 to 3"
                ));
            }
            let bytes = metric.to_be_bytes();
            target.put_slice(&bytes[4 - usize::from(*width)..]);
        }
        V::IgpFlags(f) => target.put_u8(*f),
        V::RouteTags(tags) => {
            for tag in tags {
                target.put_u32(*tag);
            }
        }
        V::Unknown(tlv) => target.put_slice(tlv.value()),
    }
    Ok(())
}

/// Registers the node, link and prefix attribute TLVs.
pub fn register_attribute_defaults(registry: &mut TlvRegistry<LinkStateTlv>) {
    use LinkStateTlvTag::*;
    let builtins: [(u16, LinkStateTlvTag, crate::tlv::TlvParser<LinkStateTlv>);
        15] = [
        (1026, NodeName, parse_node_name),
        (1027, IsisArea, parse_isis_area),
        (1028, LocalIpv4RouterId, parse_local_ipv4_id),
        (1029, LocalIpv6RouterId, parse_local_ipv6_id),
        (1030, RemoteIpv4RouterId, parse_remote_ipv4_id),
        (1031, RemoteIpv6RouterId, parse_remote_ipv6_id),
        (1088, AdminGroup, parse_admin_group),
        (1089, MaxLinkBandwidth, parse_max_bandwidth),
        (1090, MaxReservableBandwidth, parse_max_reservable),
        (1092, TeDefaultMetric, parse_te_metric),
        (1095, IgpMetric, parse_igp_metric),
        (1098, LinkName, parse_link_name),
        (1152, IgpFlags, parse_igp_flags),
        (1153, RouteTags, parse_route_tags),
        (1155, PrefixMetric, parse_prefix_metric),
    ];
    for (code, tag, parser) in builtins {
        if let Err(err) = registry.register(
            code, tag, parser, compose_attribute_tlv
        ) {
            log::error!("cannot register BGP-LS attribute TLV: {}", err);
        }
    }
}

/// Parses the value of a BGP-LS path attribute.
pub fn parse_attribute(
    cursor: Cursor<'_>,
    registry: &TlvRegistry<LinkStateTlv>,
) -> Result<Vec<LinkStateTlv>, ParseError> {
    parse_all(cursor, TlvFormat::WIDE, registry, Unrecognized::Keep)
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> TlvRegistry<LsDescriptor> {
        let mut reg = TlvRegistry::new();
        register_descriptor_defaults(&mut reg);
        reg
    }

    fn attributes() -> TlvRegistry<LinkStateTlv> {
        let mut reg = TlvRegistry::new();
        register_attribute_defaults(&mut reg);
        reg
    }

    // Node NLRI, OSPFv2, identifier 0, local node AS 65000, area 0,
    // router id 10.0.0.1.
    const NODE_NLRI: [u8; 41] = [
        0x00, 0x01, 0x00, 0x25,
        0x03,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x18,
        0x02, 0x00, 0x00, 0x04, 0x00, 0x00, 0xfd, 0xe8,
        0x02, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00,
        0x02, 0x03, 0x00, 0x04, 0x0a, 0x00, 0x00, 0x01,
    ];

    #[test]
    fn node_nlri() {
        let reg = descriptors();
        let mut cursor = Cursor::new(&NODE_NLRI);
        let nlri = LinkStateNlri::parse(&mut cursor, &reg).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(nlri.nlri_type(), LsNlriType::Node);
        assert_eq!(nlri.protocol_id(), ProtocolId::Ospfv2);
        assert_eq!(nlri.local_node().unwrap(), &[
            NodeDescriptor::AutonomousSystem(Asn::from_u32(65000)),
            NodeDescriptor::OspfAreaId(0),
            NodeDescriptor::IgpRouterId(vec![10, 0, 0, 1]),
        ]);

        let mut target = BytesMut::new();
        nlri.compose(&reg, &mut target).unwrap();
        assert_eq!(target.as_ref(), &NODE_NLRI[..]);
    }

    #[test]
    fn nlri_without_local_node() {
        let buf = [
            0x00, 0x01, 0x00, 0x09,
            0x03, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        assert!(LinkStateNlri::parse(&mut Cursor::new(&buf), &descriptors())
            .is_err());
    }

    #[test]
    fn prefix_nlri() {
        let buf = [
            0x00, 0x03, 0x00, 0x1d,
            0x03, 0, 0, 0, 0, 0, 0, 0, 0,
            0x01, 0x00, 0x00, 0x08,
            0x02, 0x00, 0x00, 0x04, 0x00, 0x00, 0xfd, 0xe8,
            0x01, 0x09, 0x00, 0x04, 0x18, 0x0a, 0x01, 0x02,
        ];
        let nlri = LinkStateNlri::parse(&mut Cursor::new(&buf), &descriptors())
            .unwrap();
        assert_eq!(
            nlri.prefix(),
            Some("10.1.2.0/24".parse().unwrap())
        );
    }

    #[test]
    fn attribute_tlvs() {
        let buf = [
            0x04, 0x02, 0x00, 0x02, b'r', b'1',
            0x04, 0x47, 0x00, 0x03, 0x00, 0x00, 0x0a,
            0x04, 0x41, 0x00, 0x04, 0x4c, 0xee, 0x6b, 0x28,
            0x05, 0xff, 0x00, 0x01, 0x99,
        ];
        let reg = attributes();
        let tlvs = parse_attribute(Cursor::new(&buf), &reg).unwrap();
        assert_eq!(tlvs[0], LinkStateTlv::NodeName("r1".into()));
        assert_eq!(tlvs[1], LinkStateTlv::IgpMetric { metric: 10, width: 3 });
        match tlvs[2] {
            LinkStateTlv::MaxLinkBandwidth(b) => {
                assert_eq!(b.bytes_per_sec(), 125_000_000.0)
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            tlvs[3],
            LinkStateTlv::Unknown(UnknownTlv::new(0x05ff, vec![0x99]))
        );

        let mut target = BytesMut::new();
        compose_all(&tlvs, TlvFormat::WIDE, &reg, &mut target).unwrap();
        assert_eq!(target.as_ref(), &buf[..]);
    }

    #[test]
    fn truncated_nlri_and_attribute() {
        let reg = descriptors();
        for len in 0..NODE_NLRI.len() {
            let mut cursor = Cursor::new(&NODE_NLRI[..len]);
            assert!(LinkStateNlri::parse(&mut cursor, &reg).is_err());
        }

        let buf = [
            0x04, 0x02, 0x00, 0x02, b'r', b'1',
            0x04, 0x47, 0x00, 0x03, 0x00, 0x00, 0x0a,
            0x04, 0x41, 0x00, 0x04, 0x4c, 0xee, 0x6b, 0x28,
            0x05, 0xff, 0x00, 0x01, 0x99,
        ];
        let reg = attributes();
        for len in 0..buf.len() {
            // Only a cut between two TLVs leaves a valid attribute.
            let boundary = [0, 6, 13, 21].contains(&len);
            assert_eq!(
                parse_attribute(Cursor::new(&buf[..len]), &reg).is_ok(),
                boundary
            );
        }
    }

    #[test]
    fn bad_attribute_tlv() {
        let reg = attributes();
        // IGP metric of four octets.
        let buf = [0x04, 0x47, 0x00, 0x04, 0, 0, 0, 1];
        assert!(parse_attribute(Cursor::new(&buf), &reg).is_err());
        // Router id with short value.
        let buf = [0x04, 0x04, 0x00, 0x02, 10, 0];
        assert!(parse_attribute(Cursor::new(&buf), &reg).is_err());
    }
}
