//! BGP communities: standard (RFC 1997), extended (RFC 4360) and large
//! (RFC 8092).
//!
//! Extended communities are dispatched through a registry keyed by their
//! (type, subtype) pair, the value is always six octets. Pairs without a
//! registered parser are kept as [`ExtendedCommunity::Unknown`].

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use inetnum::asn::Asn;
use log::debug;

use crate::registry::TypeRegistry;
use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

//------------ StandardCommunity ---------------------------------------------

/// Conventional, RFC1997 4-byte community.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StandardCommunity(u32);

impl StandardCommunity {
    pub const NO_EXPORT: Self = StandardCommunity(0xFFFFFF01);
    pub const NO_ADVERTISE: Self = StandardCommunity(0xFFFFFF02);
    pub const NO_EXPORT_SUBCONFED: Self = StandardCommunity(0xFFFFFF03);
    pub const NO_PEER: Self = StandardCommunity(0xFFFFFF04);
    pub const BLACKHOLE: Self = StandardCommunity(0xFFFF029A);

    pub fn new(asn: u16, tag: u16) -> Self {
        StandardCommunity(u32::from(asn) << 16 | u32::from(tag))
    }

    pub fn from_u32(raw: u32) -> Self {
        StandardCommunity(raw)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    pub fn is_wellknown(self) -> bool {
        self.0 >> 16 == 0xFFFF
    }

    fn wellknown_name(self) -> Option<&'static str> {
        match self {
            Self::NO_EXPORT => Some("NO_EXPORT"),
            Self::NO_ADVERTISE => Some("NO_ADVERTISE"),
            Self::NO_EXPORT_SUBCONFED => Some("NO_EXPORT_SUBCONFED"),
            Self::NO_PEER => Some("NO_PEER"),
            Self::BLACKHOLE => Some("BLACKHOLE"),
            _ => None,
        }
    }
}

impl fmt::Display for StandardCommunity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.wellknown_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}:{}", self.0 >> 16, self.0 & 0xffff),
        }
    }
}

/// Parses the value of a COMMUNITIES attribute.
pub fn parse_standard_communities(mut cursor: Cursor<'_>)
    -> Result<Vec<StandardCommunity>, ParseError>
{
    if cursor.remaining() % 4 != 0 {
        return Err(ParseError::form_error(
            "COMMUNITIES length not a multiple of 4"
        ));
    }
    let mut res = Vec::with_capacity(cursor.remaining() / 4);
    while !cursor.is_empty() {
        res.push(StandardCommunity(cursor.read_u32()?));
    }
    Ok(res)
}

//------------ LargeCommunity ------------------------------------------------

/// Large Community as defined in RFC8092.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LargeCommunity {
    global: u32,
    local1: u32,
    local2: u32,
}

impl LargeCommunity {
    pub fn new(global: u32, local1: u32, local2: u32) -> Self {
        LargeCommunity { global, local1, local2 }
    }

    pub fn asn(self) -> Asn {
        Asn::from_u32(self.global)
    }

    pub fn global(self) -> u32 {
        self.global
    }

    pub fn local1(self) -> u32 {
        self.local1
    }

    pub fn local2(self) -> u32 {
        self.local2
    }

    pub fn compose(self, target: &mut BytesMut) {
        target.put_u32(self.global);
        target.put_u32(self.local1);
        target.put_u32(self.local2);
    }
}

impl fmt::Display for LargeCommunity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.global, self.local1, self.local2)
    }
}

/// Parses the value of a LARGE_COMMUNITY attribute.
pub fn parse_large_communities(mut cursor: Cursor<'_>)
    -> Result<Vec<LargeCommunity>, ParseError>
{
    if cursor.remaining() % 12 != 0 {
        return Err(ParseError::form_error(
            "LARGE_COMMUNITY length not a multiple of 12"
        ));
    }
    let mut res = Vec::with_capacity(cursor.remaining() / 12);
    while !cursor.is_empty() {
        res.push(LargeCommunity {
            global: cursor.read_u32()?,
            local1: cursor.read_u32()?,
            local2: cursor.read_u32()?,
        });
    }
    Ok(res)
}

//------------ ExtendedCommunity ---------------------------------------------

/// A decoded extended community.
///
/// Only the transitive forms are listed. The non-transitive variant of a
/// known pair (type with bit 0x40 set) has no registered parser and ends up
/// as `Unknown`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExtendedCommunity {
    RouteTargetAs2 { asn: u16, value: u32 },
    RouteTargetIpv4 { addr: Ipv4Addr, value: u16 },
    RouteTargetAs4 { asn: Asn, value: u16 },
    RouteOriginAs2 { asn: u16, value: u32 },
    RouteOriginIpv4 { addr: Ipv4Addr, value: u16 },
    RouteOriginAs4 { asn: Asn, value: u16 },

    /// Flowspec traffic-rate in bytes per second, RFC 8955.
    ///
    /// The rate is kept as the raw IEEE 754 bits so the type stays `Eq`.
    TrafficRate { asn: u16, rate_bits: u32 },

    /// Flowspec traffic-action.
    TrafficAction { sample: bool, terminal: bool },

    /// Flowspec redirect to the VRF with this two octet AS route target.
    Redirect { asn: u16, value: u32 },

    /// Flowspec traffic-marking with a DSCP value.
    TrafficMarking { dscp: u8 },

    Unknown { typ: u8, subtype: u8, value: [u8; 6] },
}

impl ExtendedCommunity {
    pub fn traffic_rate(asn: u16, rate: f32) -> Self {
        ExtendedCommunity::TrafficRate { asn, rate_bits: rate.to_bits() }
    }

    /// Returns the traffic rate of a traffic-rate community.
    pub fn rate(&self) -> Option<f32> {
        match *self {
            ExtendedCommunity::TrafficRate { rate_bits, .. } => {
                Some(f32::from_bits(rate_bits))
            }
            _ => None
        }
    }

    pub fn tag(&self) -> ExtCommunityTag {
        use ExtendedCommunity::*;
        match self {
            RouteTargetAs2 { .. } => ExtCommunityTag::RouteTargetAs2,
            RouteTargetIpv4 { .. } => ExtCommunityTag::RouteTargetIpv4,
            RouteTargetAs4 { .. } => ExtCommunityTag::RouteTargetAs4,
            RouteOriginAs2 { .. } => ExtCommunityTag::RouteOriginAs2,
            RouteOriginIpv4 { .. } => ExtCommunityTag::RouteOriginIpv4,
            RouteOriginAs4 { .. } => ExtCommunityTag::RouteOriginAs4,
            TrafficRate { .. } => ExtCommunityTag::TrafficRate,
            TrafficAction { .. } => ExtCommunityTag::TrafficAction,
            Redirect { .. } => ExtCommunityTag::Redirect,
            TrafficMarking { .. } => ExtCommunityTag::TrafficMarking,
            Unknown { .. } => ExtCommunityTag::Unknown,
        }
    }
}

impl fmt::Display for ExtendedCommunity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ExtendedCommunity::*;
        match self {
            RouteTargetAs2 { asn, value } => write!(f, "rt:{}:{}", asn, value),
            RouteTargetIpv4 { addr, value } => {
                write!(f, "rt:{}:{}", addr, value)
            }
            RouteTargetAs4 { asn, value } => {
                write!(f, "rt:{}:{}", asn.into_u32(), value)
            }
            RouteOriginAs2 { asn, value } => write!(f, "ro:{}:{}", asn, value),
            RouteOriginIpv4 { addr, value } => {
                write!(f, "ro:{}:{}", addr, value)
            }
            RouteOriginAs4 { asn, value } => {
                write!(f, "ro:{}:{}", asn.into_u32(), value)
            }
            TrafficRate { asn, rate_bits } => {
                write!(f, "rate:{}:{}", asn, f32::from_bits(*rate_bits))
            }
            TrafficAction { sample, terminal } => {
                write!(f, "action:sample={},terminal={}", sample, terminal)
            }
            Redirect { asn, value } => write!(f, "redirect:{}:{}", asn, value),
            TrafficMarking { dscp } => write!(f, "mark:{}", dscp),
            Unknown { typ, subtype, value } => {
                write!(f, "0x{:02x}{:02x}:{:02x?}", typ, subtype, value)
            }
        }
    }
}

/// Selects the serializer for an extended community.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ExtCommunityTag {
    RouteTargetAs2,
    RouteTargetIpv4,
    RouteTargetAs4,
    RouteOriginAs2,
    RouteOriginIpv4,
    RouteOriginAs4,
    TrafficRate,
    TrafficAction,
    Redirect,
    TrafficMarking,
    Unknown,
}

//------------ Registry ------------------------------------------------------

/// Parses the six value octets of an extended community.
pub type ExtCommunityParser
    = fn(&mut Cursor<'_>) -> Result<ExtendedCommunity, ParseError>;

/// Writes the six value octets of an extended community.
pub type ExtCommunityComposer
    = fn(&ExtendedCommunity, &mut BytesMut) -> Result<(), ComposeError>;

pub type ExtCommunityRegistry = TypeRegistry<
    (u8, u8), ExtCommunityTag, ExtCommunityParser, ExtCommunityComposer
>;

/// Parses the value of an EXTENDED_COMMUNITIES attribute.
pub fn parse_extended_communities(
    mut cursor: Cursor<'_>,
    registry: &ExtCommunityRegistry,
) -> Result<Vec<ExtendedCommunity>, ParseError> {
    if cursor.remaining() % 8 != 0 {
        return Err(ParseError::form_error(
            "EXTENDED_COMMUNITIES length not a multiple of 8"
        ));
    }
    let mut res = Vec::with_capacity(cursor.remaining() / 8);
    while !cursor.is_empty() {
        let typ = cursor.read_u8()?;
        let subtype = cursor.read_u8()?;
        let mut value = cursor.slice(6)?;
        match registry.parser_for((typ, subtype)) {
            Some(parse) => {
                let comm = parse(&mut value)?;
                value.finish("trailing octets in extended community")?;
                res.push(comm);
            }
            None => {
                debug!(
                    "keeping unknown extended community {:#04x}/{:#04x}",
                    typ, subtype
                );
                res.push(ExtendedCommunity::Unknown {
                    typ, subtype, value: value.read_array()?
                });
            }
        }
    }
    Ok(res)
}

/// Writes the value of an EXTENDED_COMMUNITIES attribute.
pub fn compose_extended_communities(
    communities: &[ExtendedCommunity],
    registry: &ExtCommunityRegistry,
    target: &mut BytesMut,
) -> Result<(), ComposeError> {
    for comm in communities {
        if let ExtendedCommunity::Unknown { typ, subtype, value } = comm {
            target.put_u8(*typ);
            target.put_u8(*subtype);
            target.put_slice(value);
            continue;
        }
        let ((typ, subtype), compose) = registry.serializer_for(comm.tag())
            .ok_or_else(|| {
                ComposeError::Unregistered(format!("{:?}", comm.tag()))
            })?;
        target.put_u8(typ);
        target.put_u8(subtype);
        let start = target.len();
        compose(comm, target)?;
        if target.len() - start != 6 {
            return Err(ComposeError::InvalidValue(
                "extended community value must be six octets"
            ));
        }
    }
    Ok(())
}

fn parse_rt_as2(c: &mut Cursor<'_>) -> Result<ExtendedCommunity, ParseError> {
    Ok(ExtendedCommunity::RouteTargetAs2 {
        asn: c.read_u16()?, value: c.read_u32()?
    })
}

fn parse_rt_ipv4(c: &mut Cursor<'_>) -> Result<ExtendedCommunity, ParseError> {
    Ok(ExtendedCommunity::RouteTargetIpv4 {
        addr: c.read_ipv4()?, value: c.read_u16()?
    })
}

fn parse_rt_as4(c: &mut Cursor<'_>) -> Result<ExtendedCommunity, ParseError> {
    Ok(ExtendedCommunity::RouteTargetAs4 {
        asn: Asn::from_u32(c.read_u32()?), value: c.read_u16()?
    })
}

fn parse_ro_as2(c: &mut Cursor<'_>) -> Result<ExtendedCommunity, ParseError> {
    Ok(ExtendedCommunity::RouteOriginAs2 {
        asn: c.read_u16()?, value: c.read_u32()?
    })
}

fn parse_ro_ipv4(c: &mut Cursor<'_>) -> Result<ExtendedCommunity, ParseError> {
    Ok(ExtendedCommunity::RouteOriginIpv4 {
        addr: c.read_ipv4()?, value: c.read_u16()?
    })
}

fn parse_ro_as4(c: &mut Cursor<'_>) -> Result<ExtendedCommunity, ParseError> {
    Ok(ExtendedCommunity::RouteOriginAs4 {
        asn: Asn::from_u32(c.read_u32()?), value: c.read_u16()?
    })
}

fn parse_traffic_rate(c: &mut Cursor<'_>)
    -> Result<ExtendedCommunity, ParseError>
{
    Ok(ExtendedCommunity::TrafficRate {
        asn: c.read_u16()?, rate_bits: c.read_u32()?
    })
}

fn parse_traffic_action(c: &mut Cursor<'_>)
    -> Result<ExtendedCommunity, ParseError>
{
    c.skip(5)?;
    let flags = c.read_u8()?;
    Ok(ExtendedCommunity::TrafficAction {
        sample: flags & 0x02 != 0,
        terminal: flags & 0x01 != 0,
    })
}

fn parse_redirect(c: &mut Cursor<'_>)
    -> Result<ExtendedCommunity, ParseError>
{
    Ok(ExtendedCommunity::Redirect {
        asn: c.read_u16()?, value: c.read_u32()?
    })
}

fn parse_traffic_marking(c: &mut Cursor<'_>)
    -> Result<ExtendedCommunity, ParseError>
{
    c.skip(5)?;
    Ok(ExtendedCommunity::TrafficMarking { dscp: c.read_u8()? & 0x3f })
}

fn compose_builtin(comm: &ExtendedCommunity, target: &mut BytesMut)
    -> Result<(), ComposeError>
{
    use ExtendedCommunity::*;
    match *comm {
        RouteTargetAs2 { asn, value }
        | RouteOriginAs2 { asn, value }
        | Redirect { asn, value } => {
            target.put_u16(asn);
            target.put_u32(value);
        }
        RouteTargetIpv4 { addr, value } | RouteOriginIpv4 { addr, value } => {
            target.put_slice(&addr.octets());
            target.put_u16(value);
        }
        RouteTargetAs4 { asn, value } | RouteOriginAs4 { asn, value } => {
            target.put_u32(asn.into_u32());
            target.put_u16(value);
        }
        TrafficRate { asn, rate_bits } => {
            target.put_u16(asn);
            target.put_u32(rate_bits);
        }
        TrafficAction { sample, terminal } => {
            let mut flags = 0u8;
            if sample {
                flags |= 0x02;
            }
            if terminal {
                flags |= 0x01;
            }
            target.put_slice(&[0; 5]);
            target.put_u8(flags);
        }
        TrafficMarking { dscp } => {
            target.put_slice(&[0; 5]);
            target.put_u8(dscp & 0x3f);
        }
        Unknown { value, .. } => target.put_slice(&value),
    }
    Ok(())
}

/// Registers the route target, route origin and flowspec action codecs.
pub fn register_defaults(registry: &mut ExtCommunityRegistry) {
    use ExtCommunityTag::*;
    let builtins: [((u8, u8), ExtCommunityTag, ExtCommunityParser); 10] = [
        ((0x00, 0x02), RouteTargetAs2, parse_rt_as2),
        ((0x01, 0x02), RouteTargetIpv4, parse_rt_ipv4),
        ((0x02, 0x02), RouteTargetAs4, parse_rt_as4),
        ((0x00, 0x03), RouteOriginAs2, parse_ro_as2),
        ((0x01, 0x03), RouteOriginIpv4, parse_ro_ipv4),
        ((0x02, 0x03), RouteOriginAs4, parse_ro_as4),
        ((0x80, 0x06), TrafficRate, parse_traffic_rate),
        ((0x80, 0x07), TrafficAction, parse_traffic_action),
        ((0x80, 0x08), Redirect, parse_redirect),
        ((0x80, 0x09), TrafficMarking, parse_traffic_marking),
    ];
    for (code, tag, parser) in builtins {
        if let Err(err) = registry.register(code, tag, parser, compose_builtin)
        {
            log::error!("cannot register extended community codec: {}", err);
        }
    }
}

//--- Tests ------------------------------------------------------------------
