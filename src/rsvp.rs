//! RSVP-TE explicit route and exclude route subobjects.
//!
//! Both the ERO (RFC 3209) and the XRO (RFC 4874) are lists of subobjects
//! with a one octet type and a one octet length that includes the two octet
//! header. The top bit of the type octet is a flag: the L (loose hop) bit
//! in an ERO, the X (mandatory exclusion) bit in an XRO. Handlers are
//! registered for the remaining seven bits.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use log::{debug, error};

use crate::tlv::{
    compose_tlv, parse_tlv, TlvFormat, TlvParser, TlvRegistry, TlvValue,
    UnknownTlv,
};
use crate::typeenum; // from util::macros
use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

const FLAG: u16 = 0x80;

typeenum!(
/// Subobject types shared by EROs and XROs.
    SubobjectType, u16,
    1 => Ipv4Prefix,
    2 => Ipv6Prefix,
    4 => Unnumbered,
    32 => AsNumber,
);

//------------ SubobjectValue ------------------------------------------------

/// The value part of a subobject.
///
/// The trailing octet of the prefix subobjects and the second octet of the
/// unnumbered interface subobject are reserved in an ERO and carry the
/// attribute in an XRO, whether the exclusion concerns the interface, the
/// node or the SRLG.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SubobjectValue {
    Ipv4Prefix { addr: Ipv4Addr, len: u8, attribute: u8 },
    Ipv6Prefix { addr: Ipv6Addr, len: u8, attribute: u8 },
    Unnumbered { attribute: u8, router_id: Ipv4Addr, interface_id: u32 },
    AsNumber(u16),
    Unknown(UnknownTlv),
}

impl TlvValue for SubobjectValue {
    type Tag = SubobjectType;

    fn tag(&self) -> SubobjectType {
        match self {
            SubobjectValue::Ipv4Prefix { .. } => SubobjectType::Ipv4Prefix,
            SubobjectValue::Ipv6Prefix { .. } => SubobjectType::Ipv6Prefix,
            SubobjectValue::Unnumbered { .. } => SubobjectType::Unnumbered,
            SubobjectValue::AsNumber(_) => SubobjectType::AsNumber,
            SubobjectValue::Unknown(tlv) => tlv.typ().into(),
        }
    }

    fn unrecognized(typ: u16, value: &[u8]) -> Self {
        SubobjectValue::Unknown(UnknownTlv::new(typ, value.to_vec()))
    }

    fn as_unrecognized(&self) -> Option<(u16, &[u8])> {
        match self {
            SubobjectValue::Unknown(tlv) => Some((tlv.typ(), tlv.value())),
            _ => None
        }
    }
}

impl fmt::Display for SubobjectValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SubobjectValue::Ipv4Prefix { addr, len, .. } => {
                write!(f, "{}/{}", addr, len)
            }
            SubobjectValue::Ipv6Prefix { addr, len, .. } => {
                write!(f, "{}/{}", addr, len)
            }
            SubobjectValue::Unnumbered { router_id, interface_id, .. } => {
                write!(f, "{}%{}", router_id, interface_id)
            }
            SubobjectValue::AsNumber(asn) => write!(f, "AS{}", asn),
            SubobjectValue::Unknown(tlv) => {
                write!(f, "unknown-subobject-{}", tlv.typ())
            }
        }
    }
}

//------------ Subobject -----------------------------------------------------

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Subobject {
    flag: bool,
    value: SubobjectValue,
}

impl Subobject {
    pub fn new(flag: bool, value: SubobjectValue) -> Self {
        Subobject { flag, value }
    }

    /// Returns the top bit of the type octet.
    ///
    /// This is the loose hop bit in an ERO and the mandatory bit in an XRO.
    pub fn flag(&self) -> bool {
        self.flag
    }

    pub fn value(&self) -> &SubobjectValue {
        &self.value
    }
}

//------------ SubobjectRegistries -------------------------------------------

pub type SubobjectRegistry = TlvRegistry<SubobjectValue>;

/// The handlers for ERO and XRO subobjects.
#[derive(Clone, Debug, Default)]
pub struct SubobjectRegistries {
    ero: SubobjectRegistry,
    xro: SubobjectRegistry,
}

impl SubobjectRegistries {
    /// Creates empty registries. All subobjects will be kept opaque.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates registries holding the built-in subobject types.
    pub fn with_defaults() -> Self {
        let mut res = Self::new();
        register_defaults(&mut res.ero);
        register_defaults(&mut res.xro);
        res
    }

    pub fn ero(&self) -> &SubobjectRegistry {
        &self.ero
    }

    pub fn ero_mut(&mut self) -> &mut SubobjectRegistry {
        &mut self.ero
    }

    pub fn xro(&self) -> &SubobjectRegistry {
        &self.xro
    }

    pub fn xro_mut(&mut self) -> &mut SubobjectRegistry {
        &mut self.xro
    }

    /// Parses the subobjects of an ERO until `cursor` is exhausted.
    pub fn parse_ero(&self, cursor: Cursor<'_>)
        -> Result<Vec<Subobject>, ParseError>
    {
        parse_subobjects(cursor, &self.ero)
    }

    pub fn parse_xro(&self, cursor: Cursor<'_>)
        -> Result<Vec<Subobject>, ParseError>
    {
        parse_subobjects(cursor, &self.xro)
    }

    pub fn compose_ero(&self, subobjects: &[Subobject], target: &mut BytesMut)
        -> Result<(), ComposeError>
    {
        compose_subobjects(subobjects, &self.ero, target)
    }

    pub fn compose_xro(&self, subobjects: &[Subobject], target: &mut BytesMut)
        -> Result<(), ComposeError>
    {
        compose_subobjects(subobjects, &self.xro, target)
    }
}

fn parse_subobjects(mut cursor: Cursor<'_>, registry: &SubobjectRegistry)
    -> Result<Vec<Subobject>, ParseError>
{
    let mut res = Vec::new();
    while !cursor.is_empty() {
        let (typ, mut value) = parse_tlv(&mut cursor, TlvFormat::SUBOBJECT)?;
        let flag = typ & FLAG != 0;
        let code = typ & !FLAG;
        let value = match registry.parser_for(code) {
            Some(parse) => {
                let v = parse(&mut value)?;
                value.finish("trailing octets in subobject")?;
                v
            }
            None => {
                debug!("keeping unrecognized subobject type {}", code);
                SubobjectValue::unrecognized(code, value.peek_rest())
            }
        };
        res.push(Subobject { flag, value });
    }
    Ok(res)
}

fn compose_subobjects(
    subobjects: &[Subobject],
    registry: &SubobjectRegistry,
    target: &mut BytesMut,
) -> Result<(), ComposeError> {
    for sub in subobjects {
        let flag = if sub.flag { FLAG } else { 0 };
        if let Some((code, raw)) = sub.value.as_unrecognized() {
            compose_tlv(target, TlvFormat::SUBOBJECT, code | flag, |t| {
                t.put_slice(raw);
                Ok(())
            })?;
            continue;
        }
        let (code, compose) = registry.serializer_for(sub.value.tag())
            .ok_or_else(|| {
                ComposeError::Unregistered(sub.value.tag().to_string())
            })?;
        compose_tlv(target, TlvFormat::SUBOBJECT, code | flag, |t| {
            compose(&sub.value, t)
        })?;
    }
    Ok(())
}

//------------ Built-in subobjects -------------------------------------------

fn parse_ipv4_prefix(c: &mut Cursor<'_>) -> Result<SubobjectValue, ParseError> {
    let addr = c.read_ipv4()?;
    let len = c.read_u8()?;
    if len > 32 {
        return Err(ParseError::form_error("IPv4 prefix length over 32"))
    }
    Ok(SubobjectValue::Ipv4Prefix { addr, len, attribute: c.read_u8()? })
}

fn parse_ipv6_prefix(c: &mut Cursor<'_>) -> Result<SubobjectValue, ParseError> {
    let addr = c.read_ipv6()?;
    let len = c.read_u8()?;
    if len > 128 {
        return Err(ParseError::form_error("IPv6 prefix length over 128"))
    }
    Ok(SubobjectValue::Ipv6Prefix { addr, len, attribute: c.read_u8()? })
}

fn parse_unnumbered(c: &mut Cursor<'_>) -> Result<SubobjectValue, ParseError> {
    c.skip(1)?;
    Ok(SubobjectValue::Unnumbered {
        attribute: c.read_u8()?,
        router_id: c.read_ipv4()?,
        interface_id: c.read_u32()?,
    })
}

fn parse_as_number(c: &mut Cursor<'_>) -> Result<SubobjectValue, ParseError> {
    Ok(SubobjectValue::AsNumber(c.read_u16()?))
}

fn compose_value(v: &SubobjectValue, t: &mut BytesMut)
    -> Result<(), ComposeError>
{
    match v {
        SubobjectValue::Ipv4Prefix { addr, len, attribute } => {
            t.put_slice(&addr.octets());
            t.put_u8(*len);
            t.put_u8(*attribute);
        }
        SubobjectValue::Ipv6Prefix { addr, len, attribute } => {
            t.put_slice(&addr.octets());
            t.put_u8(*len);
            t.put_u8(*attribute);
        }
        SubobjectValue::Unnumbered { attribute, router_id, interface_id } => {
            t.put_u8(0);
            t.put_u8(*attribute);
            t.put_slice(&router_id.octets());
            t.put_u32(*interface_id);
        }
        SubobjectValue::AsNumber(asn) => t.put_u16(*asn),
        SubobjectValue::Unknown(_) => {
            return Err(ComposeError::InvalidValue("opaque subobject"))
        }
    }
    Ok(())
}

/// Registers the prefix, unnumbered interface and AS number subobjects.
pub fn register_defaults(registry: &mut SubobjectRegistry) {
    let parsers: [(SubobjectType, TlvParser<SubobjectValue>); 4] = [
        (SubobjectType::Ipv4Prefix, parse_ipv4_prefix),
        (SubobjectType::Ipv6Prefix, parse_ipv6_prefix),
        (SubobjectType::Unnumbered, parse_unnumbered),
        (SubobjectType::AsNumber, parse_as_number),
    ];
    for (typ, parse) in parsers {
        if let Err(err) = registry.register(
            typ.into(), typ, parse, compose_value
        ) {
            error!("failed to register subobject type {}: {}", typ, err);
        }
    }
}

//--- Tests ------------------------------------------------------------------
