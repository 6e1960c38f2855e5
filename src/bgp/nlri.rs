//! NLRI encoding and the per address family NLRI registry.
//!
//! The conventional IPv4 unicast NLRI in the UPDATE body and the prefix
//! based NLRI in MP_REACH_NLRI/MP_UNREACH_NLRI share one layout: an
//! optional four octet Path Identifier (only if Add-Path was negotiated for
//! the address family, which cannot be seen from the octets themselves),
//! a one octet prefix length in bits, and the minimal number of octets to
//! hold that many bits.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use inetnum::addr::Prefix;

use crate::bgp::extensions::BgpExtensions;
use crate::bgp::linkstate::LinkStateNlri;
use crate::bgp::types::{AFI, SAFI, PathId};
use crate::registry::TypeRegistry;
use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

//------------ Prefixes ------------------------------------------------------

/// Reads a length-prefixed, minimally encoded prefix.
///
/// Bits beyond the prefix length are cleared.
pub fn parse_prefix(cursor: &mut Cursor<'_>, afi: AFI)
    -> Result<Prefix, ParseError>
{
    let bits = cursor.read_u8()?;
    let addr = match afi {
        AFI::Ipv4 => {
            let mut buf = [0u8; 4];
            read_prefix_bits(cursor, bits, &mut buf)?;
            IpAddr::V4(Ipv4Addr::from(buf))
        }
        AFI::Ipv6 => {
            let mut buf = [0u8; 16];
            read_prefix_bits(cursor, bits, &mut buf)?;
            IpAddr::V6(Ipv6Addr::from(buf))
        }
        _ => {
            return Err(ParseError::form_error(
                "prefix for non-IP address family"
            ))
        }
    };
    Prefix::new(addr, bits)
        .map_err(|_| ParseError::form_error("invalid prefix"))
}

fn read_prefix_bits(cursor: &mut Cursor<'_>, bits: u8, buf: &mut [u8])
    -> Result<(), ParseError>
{
    if usize::from(bits) > buf.len() * 8 {
        return Err(ParseError::form_error("prefix length too long"));
    }
    let octets = (usize::from(bits) + 7) / 8;
    cursor.read_buf(&mut buf[..octets])?;
    let rest = bits % 8;
    if rest != 0 {
        buf[octets - 1] &= 0xffu8 << (8 - rest);
    }
    Ok(())
}

/// Writes a prefix in its minimal encoding.
pub fn compose_prefix(prefix: &Prefix, target: &mut BytesMut) {
    let bits = prefix.len();
    let octets = (usize::from(bits) + 7) / 8;
    target.put_u8(bits);
    match prefix.addr() {
        IpAddr::V4(addr) => target.put_slice(&addr.octets()[..octets]),
        IpAddr::V6(addr) => target.put_slice(&addr.octets()[..octets]),
    }
}

/// Returns the length of the minimal encoding of `prefix`.
pub fn prefix_compose_len(prefix: &Prefix) -> usize {
    1 + (usize::from(prefix.len()) + 7) / 8
}

//------------ PrefixNlri ----------------------------------------------------

/// An IP prefix, optionally tagged with a Path Identifier.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrefixNlri {
    path_id: Option<PathId>,
    prefix: Prefix,
}

impl PrefixNlri {
    pub fn new(prefix: Prefix) -> Self {
        PrefixNlri { path_id: None, prefix }
    }

    pub fn with_path_id(prefix: Prefix, path_id: PathId) -> Self {
        PrefixNlri { path_id: Some(path_id), prefix }
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn path_id(&self) -> Option<PathId> {
        self.path_id
    }

    pub fn parse(cursor: &mut Cursor<'_>, afi: AFI, add_path: bool)
        -> Result<Self, ParseError>
    {
        let path_id = if add_path {
            Some(PathId::parse(cursor)?)
        } else {
            None
        };
        Ok(PrefixNlri { path_id, prefix: parse_prefix(cursor, afi)? })
    }

    /// Writes the NLRI. The Path Identifier is written if present.
    pub fn compose(&self, target: &mut BytesMut) {
        if let Some(id) = self.path_id {
            id.compose(target);
        }
        compose_prefix(&self.prefix, target);
    }

    pub fn compose_len(&self) -> usize {
        let id_len = if self.path_id.is_some() { 4 } else { 0 };
        id_len + prefix_compose_len(&self.prefix)
    }
}

impl From<Prefix> for PrefixNlri {
    fn from(prefix: Prefix) -> Self {
        PrefixNlri::new(prefix)
    }
}

impl fmt::Display for PrefixNlri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.path_id {
            Some(id) => write!(f, "{} (path id {})", self.prefix, id),
            None => write!(f, "{}", self.prefix),
        }
    }
}

/// Parses prefixes until `cursor` is exhausted.
pub fn parse_prefix_list(
    mut cursor: Cursor<'_>,
    afi: AFI,
    add_path: bool
) -> Result<Vec<PrefixNlri>, ParseError> {
    let mut res = Vec::new();
    while !cursor.is_empty() {
        res.push(PrefixNlri::parse(&mut cursor, afi, add_path)?);
    }
    Ok(res)
}

pub fn compose_prefix_list(nlri: &[PrefixNlri], target: &mut BytesMut) {
    for n in nlri {
        n.compose(target);
    }
}

//------------ Nlris ---------------------------------------------------------

/// The NLRI carried by one MP_REACH_NLRI or MP_UNREACH_NLRI attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Nlris {
    Prefixes(Vec<PrefixNlri>),
    LinkState(Vec<LinkStateNlri>),

    /// NLRI of an address family without a registered parser.
    Opaque(Vec<u8>),
}

impl Nlris {
    pub fn is_empty(&self) -> bool {
        match self {
            Nlris::Prefixes(v) => v.is_empty(),
            Nlris::LinkState(v) => v.is_empty(),
            Nlris::Opaque(v) => v.is_empty(),
        }
    }
}

impl Default for Nlris {
    fn default() -> Self {
        Nlris::Opaque(Vec::new())
    }
}

/// Parses all NLRI of one address family.
///
/// The flag tells whether Add-Path was negotiated for the family. The
/// extensions are passed on for families whose NLRI use registries of
/// their own.
pub type NlriParser = fn(
    &mut Cursor<'_>, bool, &BgpExtensions
) -> Result<Nlris, ParseError>;

/// Writes all NLRI of one address family.
pub type NlriComposer = fn(
    &Nlris, &BgpExtensions, &mut BytesMut
) -> Result<(), ComposeError>;

/// NLRI codecs per address family.
pub type NlriRegistry = TypeRegistry<
    (AFI, SAFI), (AFI, SAFI), NlriParser, NlriComposer
>;

fn parse_ipv4(cursor: &mut Cursor<'_>, add_path: bool, _: &BgpExtensions)
    -> Result<Nlris, ParseError>
{
    let all = cursor.slice(cursor.remaining())?;
    parse_prefix_list(all, AFI::Ipv4, add_path).map(Nlris::Prefixes)
}

fn parse_ipv6(cursor: &mut Cursor<'_>, add_path: bool, _: &BgpExtensions)
    -> Result<Nlris, ParseError>
{
    let all = cursor.slice(cursor.remaining())?;
    parse_prefix_list(all, AFI::Ipv6, add_path).map(Nlris::Prefixes)
}

fn compose_prefixes(nlris: &Nlris, _: &BgpExtensions, target: &mut BytesMut)
    -> Result<(), ComposeError>
{
    match nlris {
        Nlris::Prefixes(v) => {
            compose_prefix_list(v, target);
            Ok(())
        }
        _ => Err(ComposeError::InvalidValue("expected prefix NLRI")),
    }
}

/// Registers the IPv4 and IPv6 unicast and multicast families.
pub fn register_defaults(registry: &mut NlriRegistry) {
    let families: [((AFI, SAFI), NlriParser); 4] = [
        ((AFI::Ipv4, SAFI::Unicast), parse_ipv4),
        ((AFI::Ipv4, SAFI::Multicast), parse_ipv4),
        ((AFI::Ipv6, SAFI::Unicast), parse_ipv6),
        ((AFI::Ipv6, SAFI::Multicast), parse_ipv6),
    ];
    for (family, parser) in families {
        if let Err(err) = registry.register(
            family, family, parser, compose_prefixes
        ) {
            log::error!("cannot register NLRI codec: {}", err);
        }
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn p(s: &str) -> Prefix {
        Prefix::from_str(s).unwrap()
    }

    #[test]
    fn ipv4_prefixes() {
        let buf = [
            0x18, 10, 0, 1,
            0x20, 192, 0, 2, 1,
            0x00,
        ];
        let res = parse_prefix_list(Cursor::new(&buf), AFI::Ipv4, false)
            .unwrap();
        assert_eq!(res, vec![
            PrefixNlri::new(p("10.0.1.0/24")),
            PrefixNlri::new(p("192.0.2.1/32")),
            PrefixNlri::new(p("0.0.0.0/0")),
        ]);
        let mut target = BytesMut::new();
        compose_prefix_list(&res, &mut target);
        assert_eq!(target.as_ref(), &buf[..]);
    }

    #[test]
    fn path_ids() {
        let buf = [0, 0, 0, 1, 0x10, 10, 1, 0, 0, 0, 2, 0x10, 10, 1];
        let res = parse_prefix_list(Cursor::new(&buf), AFI::Ipv4, true)
            .unwrap();
        assert_eq!(res, vec![
            PrefixNlri::with_path_id(p("10.1.0.0/16"), PathId::from_u32(1)),
            PrefixNlri::with_path_id(p("10.1.0.0/16"), PathId::from_u32(2)),
        ]);
        assert_eq!(res[0].compose_len(), 7);
        let mut target = BytesMut::new();
        compose_prefix_list(&res, &mut target);
        assert_eq!(target.as_ref(), &buf[..]);

        // The same octets without Add-Path do not make sense.
        assert!(parse_prefix_list(Cursor::new(&buf), AFI::Ipv4, false)
            .is_err());
    }

    #[test]
    fn host_bits_cleared() {
        let buf = [0x17, 10, 0, 3];
        let res = parse_prefix_list(Cursor::new(&buf), AFI::Ipv4, false)
            .unwrap();
        assert_eq!(res[0].prefix(), p("10.0.2.0/23"));
    }

    #[test]
    fn invalid_prefixes() {
        assert!(parse_prefix(&mut Cursor::new(&[33, 1, 2, 3, 4, 5]), AFI::Ipv4)
            .is_err());
        assert_eq!(
            parse_prefix(&mut Cursor::new(&[24, 10, 0]), AFI::Ipv4),
            Err(ParseError::ShortInput)
        );
        assert!(parse_prefix(&mut Cursor::new(&[0]), AFI::L2Vpn).is_err());
    }

    #[test]
    fn ipv6_prefix() {
        let buf = [0x40, 0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 1];
        let res = parse_prefix(&mut Cursor::new(&buf), AFI::Ipv6).unwrap();
        assert_eq!(res, p("2001:db8:0:1::/64"));
    }

    #[test]
    fn registry_dispatch() {
        let mut reg = NlriRegistry::new();
        register_defaults(&mut reg);
        let parse = reg.parser_for((AFI::Ipv6, SAFI::Unicast)).unwrap();
        let buf = [0x20, 0x20, 0x01, 0x0d, 0xb8];
        let ext = BgpExtensions::new();
        let nlris = parse(&mut Cursor::new(&buf), false, &ext).unwrap();
        assert_eq!(
            nlris,
            Nlris::Prefixes(vec![PrefixNlri::new(p("2001:db8::/32"))])
        );
        assert!(reg.parser_for((AFI::L2Vpn, SAFI::Evpn)).is_none());
        let (code, compose) = reg.serializer_for((AFI::Ipv6, SAFI::Unicast))
            .unwrap();
        assert_eq!(code, (AFI::Ipv6, SAFI::Unicast));
        let mut target = BytesMut::new();
        compose(&nlris, &ext, &mut target).unwrap();
        assert_eq!(target.as_ref(), &buf[..]);
    }
}
