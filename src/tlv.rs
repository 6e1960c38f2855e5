//! Generic type-length-value framing.
//!
//! The same framing is used all over the protocols in this crate, with
//! different field widths and length semantics:
//!
//! | user                    | type | length | length counts header |
//! |-------------------------|------|--------|----------------------|
//! | BGP-LS, BMP             | 2    | 2      | no                   |
//! | BGP capabilities        | 1    | 1      | no                   |
//! | RSVP ERO/XRO subobjects | 1    | 1      | yes                  |
//!
//! A [`TlvFormat`] captures these differences. [`parse_tlv`] reads one
//! header and returns a cursor scoped to exactly the value, [`parse_all`]
//! dispatches every TLV in a container through a [`TlvRegistry`], and
//! [`compose_tlv`] writes a header with a placeholder length, lets the
//! caller write the value and patches the length afterwards.

use std::fmt;
use std::hash::Hash;

use bytes::{BufMut, BytesMut};
use log::debug;

use crate::registry::TypeRegistry;
use crate::util::parser::{ComposeError, Cursor, ParseError};

//------------ TlvFormat -----------------------------------------------------

/// Header layout of a TLV flavour.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TlvFormat {
    type_len: usize,
    length_len: usize,
    length_includes_header: bool,
}

impl TlvFormat {
    /// Two octet type, two octet length of the value only.
    pub const WIDE: TlvFormat = TlvFormat::new(2, 2, false);

    /// One octet type, one octet length of the value only.
    pub const NARROW: TlvFormat = TlvFormat::new(1, 1, false);

    /// One octet type, one octet length counting the header as well.
    pub const SUBOBJECT: TlvFormat = TlvFormat::new(1, 1, true);

    /// Creates a format. Field widths must be 1 or 2.
    pub const fn new(
        type_len: usize,
        length_len: usize,
        length_includes_header: bool
    ) -> Self {
        TlvFormat { type_len, length_len, length_includes_header }
    }

    pub fn header_len(self) -> usize {
        self.type_len + self.length_len
    }

    fn read_field(cursor: &mut Cursor<'_>, width: usize)
        -> Result<u16, ParseError>
    {
        if width == 1 {
            Ok(cursor.read_u8()?.into())
        } else {
            cursor.read_u16()
        }
    }

    fn max_field(width: usize) -> usize {
        if width == 1 { u8::MAX.into() } else { u16::MAX.into() }
    }

    fn put_field(target: &mut BytesMut, width: usize, value: u16) {
        if width == 1 {
            // Range checked by the caller.
            target.put_u8(value as u8);
        } else {
            target.put_u16(value);
        }
    }
}

//------------ Parsing -------------------------------------------------------

/// Reads one TLV header and returns its type and a cursor over its value.
///
/// The declared length is checked against what is left in `cursor` before
/// anything else happens. A length running past the end of the enclosing
/// container is always an error.
pub fn parse_tlv<'a>(cursor: &mut Cursor<'a>, format: TlvFormat)
    -> Result<(u16, Cursor<'a>), ParseError>
{
    let typ = TlvFormat::read_field(cursor, format.type_len)?;
    let mut len = usize::from(
        TlvFormat::read_field(cursor, format.length_len)?
    );
    if format.length_includes_header {
        len = len.checked_sub(format.header_len()).ok_or(
            ParseError::form_error("TLV length shorter than its header")
        )?;
    }
    let value = cursor.slice(len)?;
    Ok((typ, value))
}

/// What to do with TLVs no parser is registered for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Unrecognized {
    /// Keep them as opaque values.
    Keep,

    /// Silently leave them out.
    Skip,

    /// Fail the whole container.
    Reject,
}

/// Values that can be stored in a TLV container.
pub trait TlvValue: Sized {
    /// Selects the serializer for a value.
    type Tag: Copy + Eq + Hash + fmt::Debug;

    fn tag(&self) -> Self::Tag;

    /// Wraps a TLV nobody registered a parser for.
    fn unrecognized(typ: u16, value: &[u8]) -> Self;

    /// Returns type and raw value if this is a wrapped unrecognized TLV.
    fn as_unrecognized(&self) -> Option<(u16, &[u8])>;
}

/// Parses a TLV value. The cursor covers exactly the value.
pub type TlvParser<V> = fn(&mut Cursor<'_>) -> Result<V, ParseError>;

/// Writes a TLV value, without the header.
pub type TlvComposer<V> = fn(&V, &mut BytesMut) -> Result<(), ComposeError>;

/// Registry for one family of TLVs.
pub type TlvRegistry<V> = TypeRegistry<
    u16, <V as TlvValue>::Tag, TlvParser<V>, TlvComposer<V>
>;

/// Parses TLVs until `cursor` is exhausted.
///
/// Each value is handed to the parser registered for its type, which has
/// to consume it completely.
pub fn parse_all<V: TlvValue>(
    mut cursor: Cursor<'_>,
    format: TlvFormat,
    registry: &TlvRegistry<V>,
    policy: Unrecognized,
) -> Result<Vec<V>, ParseError> {
    let mut res = Vec::new();
    while !cursor.is_empty() {
        let (typ, mut value) = parse_tlv(&mut cursor, format)?;
        match registry.parser_for(typ) {
            Some(parse) => {
                let v = parse(&mut value)?;
                value.finish("trailing octets in TLV value")?;
                res.push(v);
            }
            None => match policy {
                Unrecognized::Keep => {
                    debug!("keeping unrecognized TLV type {}", typ);
                    res.push(V::unrecognized(typ, value.peek_rest()));
                }
                Unrecognized::Skip => {
                    debug!("skipping unrecognized TLV type {}", typ);
                }
                Unrecognized::Reject => {
                    return Err(ParseError::form_error(
                        "unrecognized TLV type"
                    ));
                }
            }
        }
    }
    Ok(res)
}

//------------ Composing -----------------------------------------------------

/// Writes one TLV.
///
/// The length field is written as a placeholder and patched once `value`
/// has written the value, so the value is only encoded once.
pub fn compose_tlv<F>(
    target: &mut BytesMut,
    format: TlvFormat,
    typ: u16,
    value: F,
) -> Result<(), ComposeError>
where
    F: FnOnce(&mut BytesMut) -> Result<(), ComposeError>
{
    if usize::from(typ) > TlvFormat::max_field(format.type_len) {
        return Err(ComposeError::TooLong {
            what: "TLV type", len: typ.into()
        });
    }
    let start = target.len();
    TlvFormat::put_field(target, format.type_len, typ);
    let len_pos = target.len();
    TlvFormat::put_field(target, format.length_len, 0);
    let value_start = target.len();
    if let Err(err) = value(target) {
        target.truncate(start);
        return Err(err)
    }

    let mut len = target.len() - value_start;
    if format.length_includes_header {
        len += format.header_len();
    }
    if len > TlvFormat::max_field(format.length_len) {
        target.truncate(start);
        return Err(ComposeError::TooLong { what: "TLV value", len });
    }
    if format.length_len == 1 {
        target[len_pos] = len as u8;
    } else {
        target[len_pos..len_pos + 2]
            .copy_from_slice(&(len as u16).to_be_bytes());
    }
    Ok(())
}

/// Writes all `values` as TLVs.
pub fn compose_all<V: TlvValue>(
    values: &[V],
    format: TlvFormat,
    registry: &TlvRegistry<V>,
    target: &mut BytesMut,
) -> Result<(), ComposeError> {
    for v in values {
        if let Some((typ, raw)) = v.as_unrecognized() {
            compose_tlv(target, format, typ, |t| {
                t.put_slice(raw);
                Ok(())
            })?;
            continue;
        }
        let (code, compose) = registry.serializer_for(v.tag()).ok_or_else(
            || ComposeError::Unregistered(format!("{:?}", v.tag()))
        )?;
        compose_tlv(target, format, code, |t| compose(v, t))?;
    }
    Ok(())
}

//------------ UnknownTlv ----------------------------------------------------

/// A TLV kept as-is because nobody knew how to parse it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnknownTlv {
    typ: u16,
    value: Vec<u8>,
}

impl UnknownTlv {
    pub fn new(typ: u16, value: Vec<u8>) -> Self {
        UnknownTlv { typ, value }
    }

    pub fn typ(&self) -> u16 {
        self.typ
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

//--- Tests ------------------------------------------------------------------
