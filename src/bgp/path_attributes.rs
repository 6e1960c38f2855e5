//! Path attributes of UPDATE messages.
//!
//! Every attribute starts with a header of one octet flags, one octet type
//! code and a one or two octet length, depending on the extended length
//! flag. The value is handed to the [`AttributeParser`] registered for the
//! type code in the [`AttributeRegistry`]. Besides the parse function, the
//! registration declares which category (well-known, optional transitive,
//! optional non-transitive) the attribute belongs to and how a malformed
//! instance affects the UPDATE it arrived in, following RFC 7606.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use inetnum::asn::Asn;
use log::{debug, warn};

use crate::bgp::aspath::{AsPath, AS_TRANS};
use crate::bgp::communities::{
    compose_extended_communities, parse_extended_communities,
    parse_large_communities, parse_standard_communities, ExtendedCommunity,
    LargeCommunity, StandardCommunity,
};
use crate::bgp::error::{
    AttributeErrorPolicy, DocumentedError, TreatAsWithdraw,
    UpdateErrorSubcode,
};
use crate::bgp::extensions::CodecContext;
use crate::bgp::linkstate::{self, LinkStateTlv};
use crate::bgp::nlri::{Nlris, NlriParser};
use crate::bgp::types::{AFI, SAFI, OriginType};
use crate::registry::TypeRegistry;
use crate::tlv::{compose_all, TlvFormat};
use crate::typeenum; // from util::macros
use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::Serialize;

//------------ Flags ---------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Flags(u8);

impl core::ops::BitOr<u8> for Flags {
    type Output = Self;

    fn bitor(self, rhs: u8) -> Self::Output {
        Self(self.0 | rhs)
    }
}

impl Flags {
    // 0 1 2 3 4 5 6 7
    //
    // 0: optional (1 == optional)
    // 1: transitive (1 == transitive) (well-known attr are transitive)
    // 2: partial
    // 3: extended length (0 -> 1 byte length, 1 -> 2 byte length)
    // 4-7: MUST be 0 when sent, ignored when received
    pub const OPT_NON_TRANS: u8 = 0b1000_0000;
    pub const OPT_TRANS: u8     = 0b1100_0000;
    pub const WELLKNOWN: u8     = 0b0100_0000;

    pub const EXTENDED_LEN: u8  = 0b0001_0000;
    pub const PARTIAL: u8       = 0b0010_0000;

    const CATEGORY: u8          = 0b1100_0000;

    /// Returns true if the optional flag is set.
    pub fn is_optional(self) -> bool {
        self.0 & 0x80 == 0x80
    }

    /// Returns true if the transitive bit is set.
    pub fn is_transitive(self) -> bool {
        self.0 & 0x40 == 0x40
    }

    /// Returns true if the partial flag is set.
    pub fn is_partial(self) -> bool {
        self.0 & 0x20 == 0x20
    }

    /// Returns true if the extended length flag is set.
    pub fn is_extended_length(self) -> bool {
        self.0 & 0x10 == 0x10
    }

    /// Returns whether optional and transitive bits match `other`'s.
    pub fn same_category(self, other: Flags) -> bool {
        self.0 & Self::CATEGORY == other.0 & Self::CATEGORY
    }
}

impl From<u8> for Flags {
    fn from(u: u8) -> Flags {
        Flags(u)
    }
}

impl From<Flags> for u8 {
    fn from(f: Flags) -> u8 {
        f.0
    }
}

typeenum!(
/// Path attribute type codes.
    PathAttributeType, u8,
    1 => Origin,
    2 => AsPath,
    3 => NextHop,
    4 => MultiExitDisc,
    5 => LocalPref,
    6 => AtomicAggregate,
    7 => Aggregator,
    8 => Communities,
    9 => OriginatorId,
    10 => ClusterList,
    14 => MpReachNlri,
    15 => MpUnreachNlri,
    16 => ExtendedCommunities,
    17 => As4Path,
    18 => As4Aggregator,
    29 => BgpLs,
    32 => LargeCommunities,
);

//------------ Attribute values ----------------------------------------------

/// AGGREGATOR and AS4_AGGREGATOR.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Aggregator {
    asn: Asn,
    speaker: Ipv4Addr,
}

impl Aggregator {
    pub fn new(asn: Asn, speaker: Ipv4Addr) -> Self {
        Aggregator { asn, speaker }
    }

    pub fn asn(&self) -> Asn {
        self.asn
    }

    pub fn speaker(&self) -> Ipv4Addr {
        self.speaker
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.asn.into_u32(), self.speaker)
    }
}

/// The next hop of an MP_REACH_NLRI attribute.
///
/// Which kind it is follows from its length.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum NextHop {
    /// No next hop, as used by BGP-LS and flowspec.
    Empty,
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Ipv6LinkLocal(Ipv6Addr, Ipv6Addr),
    Opaque(Vec<u8>),
}

impl NextHop {
    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let res = match cursor.remaining() {
            0 => NextHop::Empty,
            4 => NextHop::Ipv4(cursor.read_ipv4()?),
            16 => NextHop::Ipv6(cursor.read_ipv6()?),
            32 => NextHop::Ipv6LinkLocal(
                cursor.read_ipv6()?, cursor.read_ipv6()?
            ),
            _ => NextHop::Opaque(cursor.read_rest().to_vec()),
        };
        Ok(res)
    }

    pub fn compose_len(&self) -> usize {
        match self {
            NextHop::Empty => 0,
            NextHop::Ipv4(_) => 4,
            NextHop::Ipv6(_) => 16,
            NextHop::Ipv6LinkLocal(..) => 32,
            NextHop::Opaque(raw) => raw.len(),
        }
    }

    pub fn compose(&self, target: &mut BytesMut) {
        match self {
            NextHop::Empty => { }
            NextHop::Ipv4(a) => target.put_slice(&a.octets()),
            NextHop::Ipv6(a) => target.put_slice(&a.octets()),
            NextHop::Ipv6LinkLocal(a, ll) => {
                target.put_slice(&a.octets());
                target.put_slice(&ll.octets());
            }
            NextHop::Opaque(raw) => target.put_slice(raw),
        }
    }
}

/// MP_REACH_NLRI, RFC 4760.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MpReachNlri {
    afi: AFI,
    safi: SAFI,
    next_hop: NextHop,
    nlri: Nlris,
}

impl MpReachNlri {
    pub fn new(afi: AFI, safi: SAFI, next_hop: NextHop, nlri: Nlris) -> Self {
        MpReachNlri { afi, safi, next_hop, nlri }
    }

    pub fn afi(&self) -> AFI {
        self.afi
    }

    pub fn safi(&self) -> SAFI {
        self.safi
    }

    pub fn next_hop(&self) -> &NextHop {
        &self.next_hop
    }

    pub fn nlri(&self) -> &Nlris {
        &self.nlri
    }
}

/// MP_UNREACH_NLRI, RFC 4760.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MpUnreachNlri {
    afi: AFI,
    safi: SAFI,
    withdrawn: Nlris,
}

impl MpUnreachNlri {
    pub fn new(afi: AFI, safi: SAFI, withdrawn: Nlris) -> Self {
        MpUnreachNlri { afi, safi, withdrawn }
    }

    pub fn afi(&self) -> AFI {
        self.afi
    }

    pub fn safi(&self) -> SAFI {
        self.safi
    }

    pub fn withdrawn(&self) -> &Nlris {
        &self.withdrawn
    }
}

/// An attribute nobody registered a parser for.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UnknownAttribute {
    flags: Flags,
    type_code: u8,
    value: Vec<u8>,
}

impl UnknownAttribute {
    pub fn new(flags: Flags, type_code: u8, value: Vec<u8>) -> Self {
        UnknownAttribute { flags, type_code, value }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn type_code(&self) -> u8 {
        self.type_code
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

//------------ PathAttribute -------------------------------------------------

/// A decoded path attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum PathAttribute {
    Origin(OriginType),
    AsPath(AsPath),
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    Communities(Vec<StandardCommunity>),
    OriginatorId(Ipv4Addr),
    ClusterList(Vec<Ipv4Addr>),
    MpReachNlri(MpReachNlri),
    MpUnreachNlri(MpUnreachNlri),
    ExtendedCommunities(Vec<ExtendedCommunity>),
    As4Path(AsPath),
    As4Aggregator(Aggregator),
    BgpLs(Vec<LinkStateTlv>),
    LargeCommunities(Vec<LargeCommunity>),
    Unknown(UnknownAttribute),
}

impl PathAttribute {
    pub fn type_code(&self) -> PathAttributeType {
        use PathAttributeType as T;
        match self {
            PathAttribute::Origin(_) => T::Origin,
            PathAttribute::AsPath(_) => T::AsPath,
            PathAttribute::NextHop(_) => T::NextHop,
            PathAttribute::MultiExitDisc(_) => T::MultiExitDisc,
            PathAttribute::LocalPref(_) => T::LocalPref,
            PathAttribute::AtomicAggregate => T::AtomicAggregate,
            PathAttribute::Aggregator(_) => T::Aggregator,
            PathAttribute::Communities(_) => T::Communities,
            PathAttribute::OriginatorId(_) => T::OriginatorId,
            PathAttribute::ClusterList(_) => T::ClusterList,
            PathAttribute::MpReachNlri(_) => T::MpReachNlri,
            PathAttribute::MpUnreachNlri(_) => T::MpUnreachNlri,
            PathAttribute::ExtendedCommunities(_) => T::ExtendedCommunities,
            PathAttribute::As4Path(_) => T::As4Path,
            PathAttribute::As4Aggregator(_) => T::As4Aggregator,
            PathAttribute::BgpLs(_) => T::BgpLs,
            PathAttribute::LargeCommunities(_) => T::LargeCommunities,
            PathAttribute::Unknown(u) => u.type_code.into(),
        }
    }

    /// Writes the attribute including its header.
    ///
    /// Unknown attributes are written with the partial bit set, RFC 4271
    /// section 5.
    pub fn compose(
        &self,
        ctx: &CodecContext<'_>,
        target: &mut BytesMut,
    ) -> Result<(), ComposeError> {
        let mut value = BytesMut::new();
        let (flags, code) = match self {
            PathAttribute::Unknown(u) => {
                value.put_slice(&u.value);
                (u.flags | Flags::PARTIAL, u.type_code)
            }
            _ => {
                let (code, ser) = ctx.extensions.attributes()
                    .serializer_for(self.type_code())
                    .ok_or_else(|| ComposeError::Unregistered(
                        self.type_code().to_string()
                    ))?;
                (ser.compose)(self, ctx, &mut value)?;
                (ser.flags, code)
            }
        };
        let len = value.len();
        if len > usize::from(u8::MAX) {
            let len = u16::try_from(len).map_err(|_| {
                ComposeError::TooLong { what: "path attribute", len }
            })?;
            target.put_u8(u8::from(flags | Flags::EXTENDED_LEN));
            target.put_u8(code);
            target.put_u16(len);
        } else {
            // Clear a stray extended length bit of unknown attributes.
            target.put_u8(u8::from(flags) & !Flags::EXTENDED_LEN);
            target.put_u8(code);
            target.put_u8(len as u8);
        }
        target.put_slice(&value);
        Ok(())
    }
}

//------------ PathAttributeSet ----------------------------------------------

/// The path attributes of one UPDATE, at most one per type code.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PathAttributeSet {
    attributes: BTreeMap<u8, PathAttribute>,
}

impl PathAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, returning the one it replaced.
    pub fn insert(&mut self, attr: PathAttribute) -> Option<PathAttribute> {
        self.attributes.insert(attr.type_code().into(), attr)
    }

    pub fn get(&self, typ: PathAttributeType) -> Option<&PathAttribute> {
        self.attributes.get(&typ.into())
    }

    pub fn remove(&mut self, typ: PathAttributeType)
        -> Option<PathAttribute>
    {
        self.attributes.remove(&typ.into())
    }

    pub fn contains(&self, typ: PathAttributeType) -> bool {
        self.attributes.contains_key(&typ.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathAttribute> + '_ {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn origin(&self) -> Option<OriginType> {
        match self.get(PathAttributeType::Origin) {
            Some(PathAttribute::Origin(o)) => Some(*o),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&AsPath> {
        match self.get(PathAttributeType::AsPath) {
            Some(PathAttribute::AsPath(p)) => Some(p),
            _ => None,
        }
    }

    pub fn next_hop(&self) -> Option<Ipv4Addr> {
        match self.get(PathAttributeType::NextHop) {
            Some(PathAttribute::NextHop(a)) => Some(*a),
            _ => None,
        }
    }

    pub fn mp_reach(&self) -> Option<&MpReachNlri> {
        match self.get(PathAttributeType::MpReachNlri) {
            Some(PathAttribute::MpReachNlri(m)) => Some(m),
            _ => None,
        }
    }

    pub fn mp_unreach(&self) -> Option<&MpUnreachNlri> {
        match self.get(PathAttributeType::MpUnreachNlri) {
            Some(PathAttribute::MpUnreachNlri(m)) => Some(m),
            _ => None,
        }
    }

    pub fn communities(&self) -> Option<&[StandardCommunity]> {
        match self.get(PathAttributeType::Communities) {
            Some(PathAttribute::Communities(c)) => Some(c),
            _ => None,
        }
    }

    /// Writes all attributes in ascending type code order.
    pub fn compose(
        &self,
        ctx: &CodecContext<'_>,
        target: &mut BytesMut,
    ) -> Result<(), ComposeError> {
        for attr in self.attributes.values() {
            attr.compose(ctx, target)?;
        }
        Ok(())
    }
}

impl FromIterator<PathAttribute> for PathAttributeSet {
    fn from_iter<I: IntoIterator<Item = PathAttribute>>(iter: I) -> Self {
        let mut res = Self::new();
        for attr in iter {
            res.insert(attr);
        }
        res
    }
}

//------------ Registry ------------------------------------------------------

/// Parses an attribute value. The cursor covers exactly the value.
pub type AttributeParseFn = fn(
    &mut Cursor<'_>, &CodecContext<'_>
) -> Result<PathAttribute, ParseError>;

/// Writes an attribute value, without the header.
pub type AttributeComposeFn = fn(
    &PathAttribute, &CodecContext<'_>, &mut BytesMut
) -> Result<(), ComposeError>;

/// Parsing side of an attribute registration.
#[derive(Clone, Copy, Debug)]
pub struct AttributeParser {
    category: Flags,
    policy: AttributeErrorPolicy,
    subcode: UpdateErrorSubcode,
    parse: AttributeParseFn,
}

impl AttributeParser {
    /// Creates a parser.
    ///
    /// `category` holds the optional and transitive bits the attribute must
    /// arrive with. `subcode` is reported if the value is malformed.
    pub fn new(
        category: u8,
        policy: AttributeErrorPolicy,
        subcode: UpdateErrorSubcode,
        parse: AttributeParseFn,
    ) -> Self {
        AttributeParser { category: category.into(), policy, subcode, parse }
    }

    pub fn policy(&self) -> AttributeErrorPolicy {
        self.policy
    }
}

/// Serializing side of an attribute registration.
#[derive(Clone, Copy, Debug)]
pub struct AttributeSerializer {
    flags: Flags,
    compose: AttributeComposeFn,
}

impl AttributeSerializer {
    pub fn new(flags: u8, compose: AttributeComposeFn) -> Self {
        AttributeSerializer { flags: flags.into(), compose }
    }
}

pub type AttributeRegistry = TypeRegistry<
    u8, PathAttributeType, AttributeParser, AttributeSerializer
>;

//------------ Parsing -------------------------------------------------------

/// The outcome of parsing the attribute section of an UPDATE.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedAttributes {
    pub attrs: PathAttributeSet,

    /// The first treat-as-withdraw condition encountered, if any.
    pub recoverable_error: Option<TreatAsWithdraw>,
}

struct AttributeHeader {
    flags: Flags,
    type_code: u8,
    header_len: usize,
    value_len: usize,
}

impl AttributeHeader {
    fn parse(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let flags = Flags(cursor.read_u8()?);
        let type_code = cursor.read_u8()?;
        let (header_len, value_len) = if flags.is_extended_length() {
            (4, usize::from(cursor.read_u16()?))
        } else {
            (3, usize::from(cursor.read_u8()?))
        };
        Ok(AttributeHeader { flags, type_code, header_len, value_len })
    }
}

/// Parses the path attribute section of an UPDATE message.
///
/// Structural problems of the section itself, i.e., a header or value
/// running past its end or a repeated type code, are session-fatal. What
/// happens with a single malformed attribute depends on the policy it was
/// registered with. If revised error handling is disabled for the session,
/// it is session-fatal, too.
pub fn parse_attributes(
    mut cursor: Cursor<'_>,
    ctx: &CodecContext<'_>,
) -> Result<ParsedAttributes, DocumentedError> {
    let mut res = ParsedAttributes::default();
    let mut seen = [false; 256];
    while !cursor.is_empty() {
        let whole = cursor.peek_rest();
        let header = AttributeHeader::parse(&mut cursor)
            .and_then(|header| {
                let value = cursor.slice(header.value_len)?;
                Ok((header, value))
            });
        let (header, mut value) = header.map_err(|err| {
            DocumentedError::update(
                UpdateErrorSubcode::MalformedAttributeList,
                Vec::new(),
                "path attribute exceeds attribute section",
            ).with_cause(err)
        })?;
        let raw = whole.get(..header.header_len + header.value_len)
            .unwrap_or(whole);

        // Dropped, discarded and withdrawn attributes count, too.
        let code = usize::from(header.type_code);
        if seen[code] {
            return Err(DocumentedError::update(
                UpdateErrorSubcode::MalformedAttributeList,
                Vec::new(),
                "duplicate path attribute",
            ));
        }
        seen[code] = true;

        let parser = match ctx.extensions.attributes()
            .parser_for(header.type_code)
        {
            Some(parser) => parser,
            None => {
                keep_unknown(&mut res.attrs, &header, value);
                continue;
            }
        };

        let outcome = if !parser.category.same_category(header.flags) {
            Err((
                UpdateErrorSubcode::AttributeFlagsError,
                "path attribute flags mismatch",
                None,
            ))
        } else {
            match (parser.parse)(&mut value, ctx) {
                Ok(attr) if value.is_empty() => Ok(attr),
                Ok(_) => Err((
                    UpdateErrorSubcode::AttributeLengthError,
                    "trailing octets in path attribute",
                    None,
                )),
                Err(err @ ParseError::ShortInput) => Err((
                    UpdateErrorSubcode::AttributeLengthError,
                    "path attribute too short",
                    Some(err),
                )),
                Err(err @ ParseError::Form(form)) => Err((
                    parser.subcode, form.msg(), Some(err)
                )),
            }
        };

        match outcome {
            Ok(attr) => {
                res.attrs.insert(attr);
            }
            Err((subcode, reason, cause)) => {
                let data = match subcode {
                    UpdateErrorSubcode::MalformedAsPath => Vec::new(),
                    _ => raw.to_vec(),
                };
                let mut taw = TreatAsWithdraw::new(subcode, data, reason);
                if let Some(cause) = cause {
                    taw = taw.with_cause(cause);
                }
                apply_policy(&mut res, header.type_code, parser, taw, ctx)?;
            }
        }
    }
    Ok(res)
}

fn keep_unknown(
    attrs: &mut PathAttributeSet,
    header: &AttributeHeader,
    mut value: Cursor<'_>,
) {
    if header.flags.is_optional() && header.flags.is_transitive() {
        debug!("keeping unknown transitive attribute {}", header.type_code);
        attrs.attributes.insert(
            header.type_code,
            PathAttribute::Unknown(UnknownAttribute::new(
                header.flags, header.type_code, value.read_rest().to_vec()
            ))
        );
    } else {
        debug!("dropping unknown attribute {}", header.type_code);
    }
}

fn apply_policy(
    res: &mut ParsedAttributes,
    type_code: u8,
    parser: AttributeParser,
    taw: TreatAsWithdraw,
    ctx: &CodecContext<'_>,
) -> Result<(), DocumentedError> {
    if !ctx.config.revised_error_handling() {
        return Err(taw.into_documented());
    }
    match parser.policy {
        AttributeErrorPolicy::TreatAsWithdraw => {
            warn!("attribute {}: {}", type_code, taw);
            if res.recoverable_error.is_none() {
                res.recoverable_error = Some(taw);
            }
            Ok(())
        }
        AttributeErrorPolicy::AttributeDiscard => {
            warn!("discarding attribute {}: {}", type_code, taw.reason());
            Ok(())
        }
        AttributeErrorPolicy::SessionReset => Err(taw.into_documented()),
    }
}

/// Parses NLRI of the given family through the NLRI registry.
///
/// Families without a registered parser are kept opaque.
pub fn parse_family_nlri(
    cursor: &mut Cursor<'_>,
    afi: AFI,
    safi: SAFI,
    ctx: &CodecContext<'_>,
) -> Result<Nlris, ParseError> {
    let parser: Option<NlriParser> = ctx.extensions.nlri()
        .parser_for((afi, safi));
    match parser {
        Some(parse) => parse(
            cursor, ctx.config.add_path_for(afi, safi), ctx.extensions
        ),
        None => {
            debug!("keeping NLRI of unsupported family {}/{}", afi, safi);
            Ok(Nlris::Opaque(cursor.read_rest().to_vec()))
        }
    }
}

fn compose_family_nlri(
    nlri: &Nlris,
    afi: AFI,
    safi: SAFI,
    ctx: &CodecContext<'_>,
    target: &mut BytesMut,
) -> Result<(), ComposeError> {
    if let Nlris::Opaque(raw) = nlri {
        target.put_slice(raw);
        return Ok(())
    }
    let (_, compose) = ctx.extensions.nlri().serializer_for((afi, safi))
        .ok_or_else(|| {
            ComposeError::Unregistered(format!("NLRI {}/{}", afi, safi))
        })?;
    compose(nlri, ctx.extensions, target)
}

//------------ Built-in attributes -------------------------------------------

fn parse_origin(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    match OriginType::from(c.read_u8()?) {
        OriginType::Unimplemented(_) => {
            Err(ParseError::form_error("undefined ORIGIN value"))
        }
        origin => Ok(PathAttribute::Origin(origin)),
    }
}

fn parse_as_path(c: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let all = c.slice(c.remaining())?;
    AsPath::parse(all, ctx.config.four_octet_asn()).map(PathAttribute::AsPath)
}

fn parse_next_hop(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    if c.remaining() != 4 {
        return Err(ParseError::ShortInput);
    }
    Ok(PathAttribute::NextHop(c.read_ipv4()?))
}

fn parse_med(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    Ok(PathAttribute::MultiExitDisc(c.read_u32()?))
}

fn parse_local_pref(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    Ok(PathAttribute::LocalPref(c.read_u32()?))
}

fn parse_atomic_aggregate(_: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    Ok(PathAttribute::AtomicAggregate)
}

fn read_aggregator(c: &mut Cursor<'_>, four_octet: bool)
    -> Result<Aggregator, ParseError>
{
    let asn = if four_octet {
        c.read_u32()?
    } else {
        c.read_u16()?.into()
    };
    Ok(Aggregator { asn: Asn::from_u32(asn), speaker: c.read_ipv4()? })
}

fn parse_aggregator(c: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    read_aggregator(c, ctx.config.four_octet_asn())
        .map(PathAttribute::Aggregator)
}

fn parse_communities(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let all = c.slice(c.remaining())?;
    parse_standard_communities(all).map(PathAttribute::Communities)
}

fn parse_originator_id(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    Ok(PathAttribute::OriginatorId(c.read_ipv4()?))
}

fn parse_cluster_list(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    if c.remaining() % 4 != 0 {
        return Err(ParseError::form_error(
            "CLUSTER_LIST length not a multiple of 4"
        ));
    }
    let mut res = Vec::with_capacity(c.remaining() / 4);
    while !c.is_empty() {
        res.push(c.read_ipv4()?);
    }
    Ok(PathAttribute::ClusterList(res))
}

fn parse_mp_reach(c: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let afi = AFI::from(c.read_u16()?);
    let safi = SAFI::from(c.read_u8()?);
    let nh_len = c.read_u8()?;
    let next_hop = NextHop::parse(&mut c.slice(nh_len.into())?)?;
    // Reserved, formerly number of SNPAs.
    c.skip(1)?;
    let nlri = parse_family_nlri(c, afi, safi, ctx)?;
    Ok(PathAttribute::MpReachNlri(MpReachNlri { afi, safi, next_hop, nlri }))
}

fn parse_mp_unreach(c: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let afi = AFI::from(c.read_u16()?);
    let safi = SAFI::from(c.read_u8()?);
    let withdrawn = parse_family_nlri(c, afi, safi, ctx)?;
    Ok(PathAttribute::MpUnreachNlri(MpUnreachNlri { afi, safi, withdrawn }))
}

fn parse_ext_communities(c: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let all = c.slice(c.remaining())?;
    parse_extended_communities(all, ctx.extensions.ext_communities())
        .map(PathAttribute::ExtendedCommunities)
}

fn parse_as4_path(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let all = c.slice(c.remaining())?;
    AsPath::parse(all, true).map(PathAttribute::As4Path)
}

fn parse_as4_aggregator(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    read_aggregator(c, true).map(PathAttribute::As4Aggregator)
}

fn parse_bgp_ls(c: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let all = c.slice(c.remaining())?;
    linkstate::parse_attribute(all, ctx.extensions.ls_attributes())
        .map(PathAttribute::BgpLs)
}

fn parse_large_comms(c: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<PathAttribute, ParseError>
{
    let all = c.slice(c.remaining())?;
    parse_large_communities(all).map(PathAttribute::LargeCommunities)
}

fn compose_aggregator(agg: &Aggregator, four_octet: bool, t: &mut BytesMut) {
    if four_octet {
        t.put_u32(agg.asn.into_u32());
    } else {
        t.put_u16(u16::try_from(agg.asn.into_u32()).unwrap_or(AS_TRANS));
    }
    t.put_slice(&agg.speaker.octets());
}

fn compose_builtin(
    attr: &PathAttribute,
    ctx: &CodecContext<'_>,
    t: &mut BytesMut,
) -> Result<(), ComposeError> {
    let four_octet = ctx.config.four_octet_asn();
    match attr {
        PathAttribute::Origin(o) => t.put_u8((*o).into()),
        PathAttribute::AsPath(p) => p.compose(four_octet, t)?,
        PathAttribute::NextHop(a) | PathAttribute::OriginatorId(a) => {
            t.put_slice(&a.octets())
        }
        PathAttribute::MultiExitDisc(v) | PathAttribute::LocalPref(v) => {
            t.put_u32(*v)
        }
        PathAttribute::AtomicAggregate => { }
        PathAttribute::Aggregator(agg) => {
            compose_aggregator(agg, four_octet, t)
        }
        PathAttribute::Communities(comms) => {
            for c in comms {
                t.put_u32(c.to_u32());
            }
        }
        PathAttribute::ClusterList(ids) => {
            for id in ids {
                t.put_slice(&id.octets());
            }
        }
        PathAttribute::MpReachNlri(mp) => {
            let nh_len = u8::try_from(mp.next_hop.compose_len())
                .map_err(|_| ComposeError::TooLong {
                    what: "next hop", len: mp.next_hop.compose_len()
                })?;
            t.put_u16(mp.afi.into());
            t.put_u8(mp.safi.into());
            t.put_u8(nh_len);
            mp.next_hop.compose(t);
            t.put_u8(0);
            compose_family_nlri(&mp.nlri, mp.afi, mp.safi, ctx, t)?;
        }
        PathAttribute::MpUnreachNlri(mp) => {
            t.put_u16(mp.afi.into());
            t.put_u8(mp.safi.into());
            compose_family_nlri(&mp.withdrawn, mp.afi, mp.safi, ctx, t)?;
        }
        PathAttribute::ExtendedCommunities(comms) => {
            compose_extended_communities(
                comms, ctx.extensions.ext_communities(), t
            )?
        }
        PathAttribute::As4Path(p) => p.compose(true, t)?,
        PathAttribute::As4Aggregator(agg) => compose_aggregator(agg, true, t),
        PathAttribute::BgpLs(tlvs) => {
            compose_all(
                tlvs, TlvFormat::WIDE, ctx.extensions.ls_attributes(), t
            )?
        }
        PathAttribute::LargeCommunities(comms) => {
            for c in comms {
                c.compose(t);
            }
        }
        PathAttribute::Unknown(u) => t.put_slice(&u.value),
    }
    Ok(())
}

/// Registers the attributes of RFCs 4271, 1997, 4456, 4760, 4360, 6793,
/// 7752 and 8092.
pub fn register_defaults(registry: &mut AttributeRegistry) {
    use AttributeErrorPolicy as P;
    use PathAttributeType as T;
    use UpdateErrorSubcode as S;

    let builtins: [(T, u8, P, S, AttributeParseFn); 17] = [
        (T::Origin, Flags::WELLKNOWN, P::TreatAsWithdraw,
            S::InvalidOriginAttribute, parse_origin),
        (T::AsPath, Flags::WELLKNOWN, P::TreatAsWithdraw,
            S::MalformedAsPath, parse_as_path),
        (T::NextHop, Flags::WELLKNOWN, P::TreatAsWithdraw,
            S::InvalidNextHopAttribute, parse_next_hop),
        (T::MultiExitDisc, Flags::OPT_NON_TRANS, P::TreatAsWithdraw,
            S::OptionalAttributeError, parse_med),
        (T::LocalPref, Flags::WELLKNOWN, P::TreatAsWithdraw,
            S::AttributeLengthError, parse_local_pref),
        (T::AtomicAggregate, Flags::WELLKNOWN, P::AttributeDiscard,
            S::AttributeLengthError, parse_atomic_aggregate),
        (T::Aggregator, Flags::OPT_TRANS, P::AttributeDiscard,
            S::OptionalAttributeError, parse_aggregator),
        (T::Communities, Flags::OPT_TRANS, P::TreatAsWithdraw,
            S::OptionalAttributeError, parse_communities),
        (T::OriginatorId, Flags::OPT_NON_TRANS, P::TreatAsWithdraw,
            S::OptionalAttributeError, parse_originator_id),
        (T::ClusterList, Flags::OPT_NON_TRANS, P::TreatAsWithdraw,
            S::OptionalAttributeError, parse_cluster_list),
        (T::MpReachNlri, Flags::OPT_NON_TRANS, P::SessionReset,
            S::OptionalAttributeError, parse_mp_reach),
        (T::MpUnreachNlri, Flags::OPT_NON_TRANS, P::SessionReset,
            S::OptionalAttributeError, parse_mp_unreach),
        (T::ExtendedCommunities, Flags::OPT_TRANS, P::TreatAsWithdraw,
            S::OptionalAttributeError, parse_ext_communities),
        (T::As4Path, Flags::OPT_TRANS, P::AttributeDiscard,
            S::OptionalAttributeError, parse_as4_path),
        (T::As4Aggregator, Flags::OPT_TRANS, P::AttributeDiscard,
            S::OptionalAttributeError, parse_as4_aggregator),
        (T::BgpLs, Flags::OPT_NON_TRANS, P::TreatAsWithdraw,
            S::OptionalAttributeError, parse_bgp_ls),
        (T::LargeCommunities, Flags::OPT_TRANS, P::TreatAsWithdraw,
            S::OptionalAttributeError, parse_large_comms),
    ];
    for (typ, category, policy, subcode, parse) in builtins {
        if let Err(err) = registry.register(
            typ.into(),
            typ,
            AttributeParser::new(category, policy, subcode, parse),
            AttributeSerializer::new(category, compose_builtin),
        ) {
            log::error!("cannot register path attribute: {}", err);
        }
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::error::ErrorCode;
    use crate::bgp::extensions::BgpExtensions;
    use crate::bgp::message::SessionConfig;
    use crate::bgp::nlri::PrefixNlri;
    use crate::bgp::types::AfiSafi;

    fn parse(buf: &[u8], config: &SessionConfig)
        -> Result<ParsedAttributes, DocumentedError>
    {
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(config, &ext);
        parse_attributes(Cursor::new(buf), &ctx)
    }

    fn compose(attrs: &PathAttributeSet, config: &SessionConfig) -> Vec<u8> {
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(config, &ext);
        let mut target = BytesMut::new();
        attrs.compose(&ctx, &mut target).unwrap();
        target.to_vec()
    }

    #[test]
    fn basic_attributes() {
        let buf = [
            0x40, 0x01, 0x01, 0x00,
            0x40, 0x02, 0x06, 0x02, 0x01, 0x00, 0x00, 0xfd, 0xe8,
            0x40, 0x03, 0x04, 0x0a, 0x00, 0x00, 0x01,
            0x80, 0x04, 0x04, 0x00, 0x00, 0x00, 0x64,
            0x40, 0x05, 0x04, 0x00, 0x00, 0x00, 0xc8,
            0xc0, 0x08, 0x04, 0xff, 0xff, 0xff, 0x01,
        ];
        let config = SessionConfig::modern();
        let parsed = parse(&buf, &config).unwrap();
        assert!(parsed.recoverable_error.is_none());
        let attrs = parsed.attrs;
        assert_eq!(attrs.len(), 6);
        assert_eq!(attrs.origin(), Some(OriginType::Igp));
        assert_eq!(attrs.as_path().unwrap().to_string(), "65000");
        assert_eq!(attrs.next_hop(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(
            attrs.get(PathAttributeType::LocalPref),
            Some(&PathAttribute::LocalPref(200))
        );
        assert_eq!(
            attrs.communities(),
            Some(&[StandardCommunity::NO_EXPORT][..])
        );
        assert_eq!(compose(&attrs, &config), buf);
    }

    #[test]
    fn duplicate_attribute_is_fatal() {
        let buf = [
            0x40, 0x01, 0x01, 0x00,
            0x40, 0x01, 0x01, 0x02,
        ];
        let err = parse(&buf, &SessionConfig::modern()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpdateMessage);
        assert_eq!(
            err.subcode(), u8::from(UpdateErrorSubcode::MalformedAttributeList)
        );
    }

    #[test]
    fn duplicate_of_dropped_attribute_is_fatal() {
        let is_malformed_list = |buf: &[u8]| {
            let err = parse(buf, &SessionConfig::modern()).unwrap_err();
            err.code() == ErrorCode::UpdateMessage
                && err.subcode()
                    == u8::from(UpdateErrorSubcode::MalformedAttributeList)
        };

        // Unknown non-transitive, dropped the first time.
        assert!(is_malformed_list(&[
            0x80, 0x63, 0x01, 0xaa,
            0x80, 0x63, 0x01, 0xbb,
        ]));

        // Malformed AGGREGATOR, discarded the first time.
        assert!(is_malformed_list(&[
            0xc0, 0x07, 0x06, 0xfd, 0xe8, 0x0a, 0x00, 0x00, 0x01,
            0xc0, 0x07, 0x08, 0x00, 0x00, 0xfd, 0xe8, 0x0a, 0x00, 0x00, 0x01,
        ]));

        // Invalid ORIGIN, treat-as-withdraw the first time.
        assert!(is_malformed_list(&[
            0x40, 0x01, 0x01, 0x07,
            0x40, 0x01, 0x01, 0x00,
        ]));
    }

    #[test]
    fn length_past_section_is_fatal() {
        let buf = [0x40, 0x01, 0x05, 0x00];
        let err = parse(&buf, &SessionConfig::modern()).unwrap_err();
        assert_eq!(err.subcode(), 1);
        assert_eq!(err.cause(), Some(ParseError::ShortInput));

        // Truncated header.
        assert!(parse(&[0x50, 0x01, 0x00], &SessionConfig::modern()).is_err());
    }

    #[test]
    fn invalid_origin_is_treat_as_withdraw() {
        let buf = [
            0x40, 0x01, 0x01, 0x07,
            0x40, 0x05, 0x04, 0x00, 0x00, 0x00, 0xc8,
        ];
        let parsed = parse(&buf, &SessionConfig::modern()).unwrap();
        let taw = parsed.recoverable_error.unwrap();
        assert_eq!(taw.subcode(), UpdateErrorSubcode::InvalidOriginAttribute);
        assert_eq!(taw.data(), &buf[..4]);
        // The remaining attributes are still there.
        assert!(parsed.attrs.contains(PathAttributeType::LocalPref));
        assert!(!parsed.attrs.contains(PathAttributeType::Origin));

        // Without revised error handling it is fatal.
        let err = parse(&buf, &SessionConfig::legacy()).unwrap_err();
        assert_eq!(
            err.subcode(), u8::from(UpdateErrorSubcode::InvalidOriginAttribute)
        );
    }

    #[test]
    fn flags_mismatch() {
        // ORIGIN flagged optional.
        let buf = [0x80, 0x01, 0x01, 0x00];
        let taw = parse(&buf, &SessionConfig::modern()).unwrap()
            .recoverable_error.unwrap();
        assert_eq!(taw.subcode(), UpdateErrorSubcode::AttributeFlagsError);
    }

    #[test]
    fn attribute_discard() {
        // AGGREGATOR of the wrong length for a four octet session.
        let buf = [
            0xc0, 0x07, 0x06, 0xfd, 0xe8, 0x0a, 0x00, 0x00, 0x01,
            0x40, 0x01, 0x01, 0x01,
        ];
        let parsed = parse(&buf, &SessionConfig::modern()).unwrap();
        assert!(parsed.recoverable_error.is_none());
        assert!(!parsed.attrs.contains(PathAttributeType::Aggregator));
        assert_eq!(parsed.attrs.origin(), Some(OriginType::Egp));

        // But correct for a two octet one.
        let parsed = parse(&buf, &SessionConfig::legacy()).unwrap();
        assert_eq!(
            parsed.attrs.get(PathAttributeType::Aggregator),
            Some(&PathAttribute::Aggregator(Aggregator::new(
                Asn::from_u32(65000), Ipv4Addr::new(10, 0, 0, 1)
            )))
        );
    }

    #[test]
    fn unknown_attributes() {
        let buf = [
            0xc0, 0x63, 0x02, 0xaa, 0xbb,
            0x80, 0x64, 0x01, 0xcc,
            0x40, 0x65, 0x01, 0xdd,
        ];
        let config = SessionConfig::modern();
        let parsed = parse(&buf, &config).unwrap();
        assert_eq!(parsed.attrs.len(), 1);
        let unknown = parsed.attrs.get(PathAttributeType::from(0x63)).unwrap();
        assert_eq!(
            unknown,
            &PathAttribute::Unknown(UnknownAttribute::new(
                Flags::from(0xc0), 0x63, vec![0xaa, 0xbb]
            ))
        );
        // Passed on with the partial bit.
        assert_eq!(
            compose(&parsed.attrs, &config),
            vec![0xe0, 0x63, 0x02, 0xaa, 0xbb]
        );
    }

    #[test]
    fn mp_reach_ipv6_with_add_path() {
        let buf = [
            0x90, 0x0e, 0x00, 0x1e,
            0x00, 0x02, 0x01, 0x10,
            0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01,
            0x00,
            0x00, 0x00, 0x00, 0x05, 0x20, 0x20, 0x01, 0x0d, 0xb8,
        ];
        let config = SessionConfig::modern()
            .with_add_path(AfiSafi::Ipv6Unicast);
        let parsed = parse(&buf, &config).unwrap();
        let mp = parsed.attrs.mp_reach().unwrap();
        assert_eq!(mp.afi(), AFI::Ipv6);
        assert_eq!(
            mp.next_hop(), &NextHop::Ipv6("2001:db8::1".parse().unwrap())
        );
        assert_eq!(
            mp.nlri(),
            &Nlris::Prefixes(vec![PrefixNlri::with_path_id(
                "2001:db8::/32".parse().unwrap(),
                crate::bgp::types::PathId::from_u32(5),
            )])
        );

        // The extended length bit is dropped for short values.
        let mut expected = vec![0x80, 0x0e, 0x1e];
        expected.extend_from_slice(&buf[4..]);
        assert_eq!(compose(&parsed.attrs, &config), expected);

        // Without Add-Path the same octets do not parse, which resets
        // the session even with revised error handling.
        let err = parse(&buf, &SessionConfig::modern()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpdateMessage);
        assert_eq!(
            err.subcode(), u8::from(UpdateErrorSubcode::AttributeLengthError)
        );
    }

    #[test]
    fn mp_unreach_unknown_family() {
        let buf = [
            0x80, 0x0f, 0x05, 0x00, 0x19, 0x46, 0x01, 0x02,
        ];
        let parsed = parse(&buf, &SessionConfig::modern()).unwrap();
        let mp = parsed.attrs.mp_unreach().unwrap();
        assert_eq!(mp.afi(), AFI::L2Vpn);
        assert_eq!(mp.safi(), SAFI::Evpn);
        assert_eq!(mp.withdrawn(), &Nlris::Opaque(vec![0x01, 0x02]));
        assert_eq!(compose(&parsed.attrs, &SessionConfig::modern()), buf);
    }

    #[test]
    fn extended_length() {
        let mut buf = vec![0xd0, 0x08, 0x01, 0x00];
        for i in 0..64u32 {
            buf.extend_from_slice(&(0x00010000 | i).to_be_bytes());
        }
        let parsed = parse(&buf, &SessionConfig::modern()).unwrap();
        assert_eq!(parsed.attrs.communities().unwrap().len(), 64);
        assert_eq!(compose(&parsed.attrs, &SessionConfig::modern()), buf);
    }

    #[test]
    fn trailing_octets_in_attribute() {
        // LOCAL_PREF with five octets.
        let buf = [0x40, 0x05, 0x05, 0, 0, 0, 1, 0];
        let taw = parse(&buf, &SessionConfig::modern()).unwrap()
            .recoverable_error.unwrap();
        assert_eq!(taw.subcode(), UpdateErrorSubcode::AttributeLengthError);
    }
}
