use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use inetnum::asn::Asn;

use crate::typeenum; // from util::macros
use crate::util::parser::{Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

typeenum!(
/// AFI as used in BGP OPEN and UPDATE messages.
    AFI, u16,
    1 => Ipv4,
    2 => Ipv6,
    25 => L2Vpn,
    16388 => LinkState,
);

typeenum!(
/// SAFI as used in BGP OPEN and UPDATE messages.
    SAFI, u8,
    1 => Unicast,
    2 => Multicast,
    4 => MplsUnicast,
    65 => Vpls,
    70 => Evpn,
    71 => LinkState,
    72 => LinkStateVpn,
    128 => MplsVpnUnicast,
    132 => RouteTarget,
    133 => FlowSpec,
    134 => FlowSpecVpn,
);

/// Valid/supported pair of `AFI` and `SAFI`.
///
/// Not all combinations of the `AFI` and `SAFI` variants make sense. This
/// enum explicitly comprises combinations which are described in standards
/// documents.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum AfiSafi {
    Ipv4Unicast,
    Ipv6Unicast,
    Ipv4Multicast,
    Ipv6Multicast,

    Ipv4MplsVpnUnicast,
    Ipv6MplsVpnUnicast,

    Ipv4FlowSpec,
    Ipv6FlowSpec,

    LinkState,
    LinkStateVpn,
}

impl TryFrom<(AFI, SAFI)> for AfiSafi {
    type Error = &'static str;
    fn try_from(t: (AFI, SAFI)) -> Result<Self, Self::Error> {

        use AfiSafi::*;
        match t {
            (AFI::Ipv4, SAFI::Unicast) => Ok(Ipv4Unicast),
            (AFI::Ipv6, SAFI::Unicast) => Ok(Ipv6Unicast),

            (AFI::Ipv4, SAFI::Multicast) => Ok(Ipv4Multicast),
            (AFI::Ipv6, SAFI::Multicast) => Ok(Ipv6Multicast),

            (AFI::Ipv4, SAFI::MplsVpnUnicast) => Ok(Ipv4MplsVpnUnicast),
            (AFI::Ipv6, SAFI::MplsVpnUnicast) => Ok(Ipv6MplsVpnUnicast),

            (AFI::Ipv4, SAFI::FlowSpec) => Ok(Ipv4FlowSpec),
            (AFI::Ipv6, SAFI::FlowSpec) => Ok(Ipv6FlowSpec),

            (AFI::LinkState, SAFI::LinkState) => Ok(LinkState),
            (AFI::LinkState, SAFI::LinkStateVpn) => Ok(LinkStateVpn),
            _ => Err("unsupported AFI/SAFI combination")
        }
    }
}

impl AfiSafi {
    pub fn afi(&self) -> AFI {
        self.split().0
    }

    pub fn safi(&self) -> SAFI {
        self.split().1
    }

    pub fn split(&self) -> (AFI, SAFI) {
        match self {
            Self::Ipv4Unicast => (AFI::Ipv4, SAFI::Unicast),
            Self::Ipv6Unicast => (AFI::Ipv6, SAFI::Unicast),
            Self::Ipv4Multicast => (AFI::Ipv4, SAFI::Multicast),
            Self::Ipv6Multicast => (AFI::Ipv6, SAFI::Multicast),

            Self::Ipv4MplsVpnUnicast => (AFI::Ipv4, SAFI::MplsVpnUnicast),
            Self::Ipv6MplsVpnUnicast => (AFI::Ipv6, SAFI::MplsVpnUnicast),

            Self::Ipv4FlowSpec => (AFI::Ipv4, SAFI::FlowSpec),
            Self::Ipv6FlowSpec => (AFI::Ipv6, SAFI::FlowSpec),

            Self::LinkState => (AFI::LinkState, SAFI::LinkState),
            Self::LinkStateVpn => (AFI::LinkState, SAFI::LinkStateVpn),
        }
    }
}

impl fmt::Display for AfiSafi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (afi, safi) = self.split();
        write!(f, "{}/{}", afi, safi)
    }
}

typeenum!(
/// Values of the ORIGIN path attribute.
    OriginType, u8,
    0 => Igp,
    1 => Egp,
    2 => Incomplete,
);

//------------ PathId --------------------------------------------------------

/// Path Identifier for BGP Multiple Paths (RFC7911).
///
/// Used in NLRI when Add-Path is negotiated for the address family.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathId(u32);

impl PathId {
    pub fn from_u32(id: u32) -> Self {
        PathId(id)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        Ok(PathId(cursor.read_u32()?))
    }

    pub fn compose(self, target: &mut BytesMut) {
        target.put_u32(self.0)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------ RouteDistinguisher --------------------------------------------

/// Route Distinguisher (RD) as defined in RFC 4364.
///
/// Shows up in VPN NLRI and in the BMP per-peer header.
//
//  Type 0: 2 octet type (0), 2 octet ASN, 4 octet assigned number
//  Type 1: 2 octet type (1), 4 octet IPv4 address, 2 octet assigned number
//  Type 2: 2 octet type (2), 4 octet ASN, 2 octet assigned number
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RouteDistinguisher {
    As2 { asn: Asn, value: u32 },
    Ipv4 { addr: Ipv4Addr, value: u16 },
    As4 { asn: Asn, value: u16 },
    Unknown { typ: u16, raw: [u8; 6] },
}

impl RouteDistinguisher {
    pub const LEN: usize = 8;

    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let typ = cursor.read_u16()?;
        let res = match typ {
            0 => RouteDistinguisher::As2 {
                asn: Asn::from_u32(cursor.read_u16()?.into()),
                value: cursor.read_u32()?,
            },
            1 => RouteDistinguisher::Ipv4 {
                addr: cursor.read_ipv4()?,
                value: cursor.read_u16()?,
            },
            2 => RouteDistinguisher::As4 {
                asn: Asn::from_u32(cursor.read_u32()?),
                value: cursor.read_u16()?,
            },
            _ => RouteDistinguisher::Unknown {
                typ,
                raw: cursor.read_array()?,
            },
        };
        Ok(res)
    }

    pub fn from_raw(raw: [u8; 8]) -> Result<Self, ParseError> {
        Self::parse(&mut Cursor::new(&raw))
    }

    pub fn compose(&self, target: &mut BytesMut) {
        match *self {
            RouteDistinguisher::As2 { asn, value } => {
                target.put_u16(0);
                // As2 only ever holds values read from two octets.
                target.put_u16(asn.into_u32() as u16);
                target.put_u32(value);
            }
            RouteDistinguisher::Ipv4 { addr, value } => {
                target.put_u16(1);
                target.put_slice(&addr.octets());
                target.put_u16(value);
            }
            RouteDistinguisher::As4 { asn, value } => {
                target.put_u16(2);
                target.put_u32(asn.into_u32());
                target.put_u16(value);
            }
            RouteDistinguisher::Unknown { typ, raw } => {
                target.put_u16(typ);
                target.put_slice(&raw);
            }
        }
    }

    /// Returns the type field.
    pub fn typ(&self) -> u16 {
        match self {
            RouteDistinguisher::As2 { .. } => 0,
            RouteDistinguisher::Ipv4 { .. } => 1,
            RouteDistinguisher::As4 { .. } => 2,
            RouteDistinguisher::Unknown { typ, .. } => *typ,
        }
    }
}

impl fmt::Display for RouteDistinguisher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteDistinguisher::As2 { asn, value } => {
                write!(f, "{}:{}", asn.into_u32(), value)
            }
            RouteDistinguisher::Ipv4 { addr, value } => {
                write!(f, "{}:{}", addr, value)
            }
            RouteDistinguisher::As4 { asn, value } => {
                write!(f, "{}:{}", asn.into_u32(), value)
            }
            RouteDistinguisher::Unknown { typ, raw } => {
                write!(f, "{}:{:02x?}", typ, raw)
            }
        }
    }
}

//--- Tests ------------------------------------------------------------------
