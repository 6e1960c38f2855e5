//! BMP message parsing and composing, RFC 7854.
//!
//! Every message starts with the common header. All types but initiation
//! and termination follow it with a per-peer header describing the BGP
//! session the payload belongs to. Embedded BGP messages are decoded with
//! the BGP codec and the registries held in [`BmpExtensions`].

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, TimeZone, Utc};
use inetnum::asn::Asn;
use log::{debug, error};

use crate::bgp::error::DocumentedError;
use crate::bgp::extensions::{BgpExtensions, CodecContext};
use crate::bgp::message::{
    self as bgp, Header as BgpHeader, MsgType, NotificationMessage,
    OpenMessage, ParsedUpdate, SessionConfig, UpdateMessage,
};
use crate::bgp::types::{RouteDistinguisher, AFI, SAFI};
use crate::registry::TypeRegistry;
use crate::tlv::{
    compose_all, parse_all, TlvFormat, TlvParser, TlvRegistry, TlvValue,
    UnknownTlv, Unrecognized,
};
use crate::typeenum; // from util::macros
use crate::util::parser::{ComposeError, Cursor, ParseError};

pub const VERSION: u8 = 3;
pub const COMMON_HEADER_LEN: usize = 6;
pub const PER_PEER_HEADER_LEN: usize = 42;

//------------ MessageError --------------------------------------------------

/// Errors related to BMP messages.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageError {
    /// Fewer octets than the message claims to have.
    Incomplete,

    /// The length field is smaller than the common header.
    IllegalSize,

    UnsupportedVersion(u8),

    /// No parser is registered for the message type.
    InvalidMsgType(u8),

    /// The BMP part of the message is malformed.
    Parse(ParseError),

    /// An embedded BGP message is malformed.
    Bgp(DocumentedError),
}

impl Display for MessageError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        use MessageError::*;
        match self {
            Incomplete => write!(f, "incomplete message"),
            IllegalSize => write!(f, "illegaly sized message"),
            UnsupportedVersion(v) => write!(f, "unsupported version {}", v),
            InvalidMsgType(t) => write!(f, "invalid message type {}", t),
            Parse(err) => write!(f, "malformed message: {}", err),
            Bgp(err) => write!(f, "malformed BGP message: {}", err),
        }
    }
}

impl Error for MessageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MessageError::Parse(err) => Some(err),
            MessageError::Bgp(err) => Some(err),
            _ => None
        }
    }
}

impl From<ParseError> for MessageError {
    fn from(err: ParseError) -> Self {
        MessageError::Parse(err)
    }
}

impl From<DocumentedError> for MessageError {
    fn from(err: DocumentedError) -> Self {
        MessageError::Bgp(err)
    }
}

//------------ Message -------------------------------------------------------

typeenum!(
    /// Types of BMP messages as defined in
    /// [RFC7854](https://datatracker.ietf.org/doc/html/rfc7854).
    MessageType, u8,
    0 => RouteMonitoring,
    1 => StatisticsReport,
    2 => PeerDownNotification,
    3 => PeerUpNotification,
    4 => InitiationMessage,
    5 => TerminationMessage,
    6 => RouteMirroring,
);

/// Full BMP message.
///
/// Route mirroring is not supported and has no variant. Its type code is
/// not registered, so such messages are rejected as an invalid type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    RouteMonitoring(RouteMonitoring),
    StatisticsReport(StatisticsReport),
    PeerDownNotification(PeerDownNotification),
    PeerUpNotification(PeerUpNotification),
    InitiationMessage(InitiationMessage),
    TerminationMessage(TerminationMessage),
}

impl Message {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::RouteMonitoring(_) => MessageType::RouteMonitoring,
            Message::StatisticsReport(_) => MessageType::StatisticsReport,
            Message::PeerDownNotification(_) => {
                MessageType::PeerDownNotification
            }
            Message::PeerUpNotification(_) => {
                MessageType::PeerUpNotification
            }
            Message::InitiationMessage(_) => MessageType::InitiationMessage,
            Message::TerminationMessage(_) => {
                MessageType::TerminationMessage
            }
        }
    }

    /// Returns the per-peer header if the message type has one.
    pub fn per_peer_header(&self) -> Option<&PerPeerHeader> {
        match self {
            Message::RouteMonitoring(m) => Some(&m.per_peer),
            Message::StatisticsReport(m) => Some(&m.per_peer),
            Message::PeerDownNotification(m) => Some(&m.per_peer),
            Message::PeerUpNotification(m) => Some(&m.per_peer),
            _ => None
        }
    }

    /// Returns the total length of the message at the start of `octets`.
    ///
    /// Returns `None` until the common header is complete.
    pub fn peek_len(octets: &[u8]) -> Option<usize> {
        if octets.len() < COMMON_HEADER_LEN {
            return None
        }
        let len = u32::from_be_bytes([
            octets[1], octets[2], octets[3], octets[4]
        ]);
        usize::try_from(len).ok()
    }

    /// Parses one message and advances `cursor` past it.
    pub fn parse(
        cursor: &mut Cursor<'_>,
        extensions: &BmpExtensions,
    ) -> Result<Self, MessageError> {
        let header = CommonHeader::parse(cursor)?;
        let mut body = cursor.slice(header.body_len())
            .map_err(|_| MessageError::Incomplete)?;
        let parse = extensions.messages()
            .parser_for(header.msg_type.into())
            .ok_or(MessageError::InvalidMsgType(header.msg_type.into()))?;
        let res = parse(&mut body, extensions)?;
        body.finish("trailing octets in BMP message")?;
        Ok(res)
    }

    /// Parses `octets` which have to hold exactly one message.
    pub fn from_octets(
        octets: &[u8],
        extensions: &BmpExtensions,
    ) -> Result<Self, MessageError> {
        let mut cursor = Cursor::new(octets);
        let res = Self::parse(&mut cursor, extensions)?;
        cursor.finish("octets after the BMP message")?;
        Ok(res)
    }

    /// Appends the complete message to `target`.
    pub fn compose(
        &self,
        extensions: &BmpExtensions,
        target: &mut BytesMut,
    ) -> Result<(), ComposeError> {
        let (code, compose) = extensions.messages()
            .serializer_for(self.msg_type())
            .ok_or_else(|| {
                ComposeError::Unregistered(self.msg_type().to_string())
            })?;
        let start = target.len();
        target.put_u8(VERSION);
        target.put_u32(0);
        target.put_u8(code);
        if let Err(err) = compose(self, extensions, target) {
            target.truncate(start);
            return Err(err)
        }
        let len = target.len() - start;
        let field = u32::try_from(len).map_err(|_| {
            target.truncate(start);
            ComposeError::TooLong { what: "BMP message", len }
        })?;
        target[start + 1..start + 5].copy_from_slice(&field.to_be_bytes());
        Ok(())
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.per_peer_header() {
            Some(pph) => write!(f, "{} from {}", self.msg_type(), pph),
            None => write!(f, "{}", self.msg_type()),
        }
    }
}

//------------ CommonHeader --------------------------------------------------

// As per RFC7854:
//
//   0                   1                   2                   3
//   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//  +-+-+-+-+-+-+-+-+
//  |    Version    |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                        Message Length                         |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |   Msg. Type   |
//  +---------------+

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommonHeader {
    version: u8,
    length: u32,
    msg_type: MessageType,
}

impl CommonHeader {
    /// Returns the BMP version of the message.
    pub fn version(self) -> u8 {
        self.version
    }

    /// Returns the length of the message, including headers.
    pub fn length(self) -> u32 {
        self.length
    }

    pub fn msg_type(self) -> MessageType {
        self.msg_type
    }

    fn body_len(self) -> usize {
        self.length as usize - COMMON_HEADER_LEN
    }

    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self, MessageError> {
        let [version, l0, l1, l2, l3, typ] = cursor.read_array::<6>()
            .map_err(|_| MessageError::Incomplete)?;
        if version != VERSION {
            return Err(MessageError::UnsupportedVersion(version))
        }
        let length = u32::from_be_bytes([l0, l1, l2, l3]);
        if (length as usize) < COMMON_HEADER_LEN {
            return Err(MessageError::IllegalSize)
        }
        Ok(CommonHeader { version, length, msg_type: typ.into() })
    }
}

impl Display for CommonHeader {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f, "BMPv{} {} ({} octets)", self.version, self.msg_type, self.length
        )
    }
}

//------------ PerPeerHeader -------------------------------------------------

/// The Per Peer Header, present in some BMP messages.
///
/// BMP messages often contain encapsulated BGP messages. The Per Peer Header
/// provides information on the peer that sent that encapsulated BGP message,
/// such as the remote address and ASN, the time of receiving, etc.
// As per RFC7854:
//
//   0                   1                   2                   3
//   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |   Peer Type   |  Peer Flags   |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |         Peer Distinguisher (present based on peer type)       |
//  |                                                               |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                 Peer Address (16 bytes)                       |
//  ~                                                               ~
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                           Peer AS                             |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                         Peer BGP ID                           |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                    Timestamp (seconds)                        |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                  Timestamp (microseconds)                     |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Clone, Copy, Debug)]
pub struct PerPeerHeader {
    peer_type: PeerType,
    flags: u8,
    distinguisher: RouteDistinguisher,
    address: IpAddr,
    asn: Asn,
    bgp_id: Ipv4Addr,
    ts_seconds: u32,
    ts_micros: u32,
}

typeenum!(
/// Peer types, RFC 7854 section 10.2 and RFC 9069.
    PeerType, u8,
    0 => GlobalInstance,
    1 => RdInstance,
    2 => LocalInstance,
    3 => LocalRibInstance,
);

/// Specify which RIB the contents of a message originated from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RibType {
    AdjRibIn,
    AdjRibOut,
}

impl PerPeerHeader {
    //  0 1 2 3 4 5 6 7
    // +-+-+-+-+-+-+-+-+
    // |V|L|A|O| Rservd|
    // +-+-+-+-+-+-+-+-+
    //
    // V: IP Version,  0 = IPv4, 1 = IPv6
    // L: 0 = pre-policy Adj-RIB-In, 1 = post-policy
    // A: 0 = 4-byte AS_PATH format, 1 = 2-byte legacy format
    // O: 0 = Adj-RIB-In, 1 = Adj-RIB-Out (RFC 8671)
    pub const FLAG_IPV6: u8 = 0x80;
    pub const FLAG_POST_POLICY: u8 = 0x40;
    pub const FLAG_LEGACY_FORMAT: u8 = 0x20;
    pub const FLAG_ADJ_RIB_OUT: u8 = 0x10;

    /// Creates a header, the V flag is taken from the address.
    pub fn new(
        peer_type: PeerType,
        flags: u8,
        distinguisher: RouteDistinguisher,
        address: IpAddr,
        asn: Asn,
        bgp_id: Ipv4Addr,
        timestamp: (u32, u32),
    ) -> Self {
        let flags = match address {
            IpAddr::V4(_) => flags & !Self::FLAG_IPV6,
            IpAddr::V6(_) => flags | Self::FLAG_IPV6,
        };
        PerPeerHeader {
            peer_type, flags, distinguisher, address, asn, bgp_id,
            ts_seconds: timestamp.0,
            ts_micros: timestamp.1,
        }
    }

    pub fn peer_type(&self) -> PeerType {
        self.peer_type
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_ipv4(&self) -> bool {
        self.flags & Self::FLAG_IPV6 == 0
    }

    pub fn is_ipv6(&self) -> bool {
        !self.is_ipv4()
    }

    pub fn is_pre_policy(&self) -> bool {
        self.flags & Self::FLAG_POST_POLICY == 0
    }

    pub fn is_post_policy(&self) -> bool {
        !self.is_pre_policy()
    }

    /// Returns true if embedded AS_PATHs use two octet ASNs.
    pub fn is_legacy_format(&self) -> bool {
        self.flags & Self::FLAG_LEGACY_FORMAT != 0
    }

    pub fn adj_rib_type(&self) -> RibType {
        if self.flags & Self::FLAG_ADJ_RIB_OUT != 0 {
            RibType::AdjRibOut
        } else {
            RibType::AdjRibIn
        }
    }

    pub fn distinguisher(&self) -> RouteDistinguisher {
        self.distinguisher
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn asn(&self) -> Asn {
        self.asn
    }

    pub fn bgp_id(&self) -> Ipv4Addr {
        self.bgp_id
    }

    /// Returns the time when the encapsulated message was received.
    ///
    /// Returns `None` for timestamps chrono can't represent.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(
            self.ts_seconds.into(), self.ts_micros.saturating_mul(1000)
        ).single()
    }

    /// Returns the raw seconds and microseconds of the timestamp.
    pub fn raw_timestamp(&self) -> (u32, u32) {
        (self.ts_seconds, self.ts_micros)
    }

    /// A session config for UPDATEs sent by this peer.
    ///
    /// Only the ASN width is known from the header itself. Whether
    /// Add-Path is in use can be learned from the Peer Up message.
    pub fn session_config(&self) -> SessionConfig {
        let mut res = SessionConfig::modern();
        res.set_four_octet_asn(!self.is_legacy_format());
        res
    }

    pub fn parse(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let peer_type = cursor.read_u8()?.into();
        let flags = cursor.read_u8()?;
        let distinguisher = RouteDistinguisher::parse(cursor)?;
        let address = read_padded_addr(cursor, flags & Self::FLAG_IPV6 == 0)?;
        let asn = Asn::from_u32(cursor.read_u32()?);
        let bgp_id = cursor.read_ipv4()?;
        let ts_seconds = cursor.read_u32()?;
        let ts_micros = cursor.read_u32()?;
        Ok(PerPeerHeader {
            peer_type, flags, distinguisher, address, asn, bgp_id,
            ts_seconds, ts_micros
        })
    }

    pub fn compose(&self, target: &mut BytesMut) {
        target.put_u8(self.peer_type.into());
        target.put_u8(self.flags);
        self.distinguisher.compose(target);
        put_padded_addr(self.address, target);
        target.put_u32(self.asn.into_u32());
        target.put_slice(&self.bgp_id.octets());
        target.put_u32(self.ts_seconds);
        target.put_u32(self.ts_micros);
    }
}

impl Display for PerPeerHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}/{}", self.address, self.asn, self.bgp_id)
    }
}

// Flags and timestamp differ between messages about the same peer, so
// they don't take part in identifying it.
impl Hash for PerPeerHeader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.peer_type.hash(state);
        self.distinguisher.hash(state);
        self.address.hash(state);
        self.asn.hash(state);
        self.bgp_id.hash(state);
    }
}

impl PartialEq for PerPeerHeader {
    fn eq(&self, other: &Self) -> bool {
        self.peer_type == other.peer_type
            && self.distinguisher == other.distinguisher
            && self.address == other.address
            && self.asn == other.asn
            && self.bgp_id == other.bgp_id
    }
}

impl Eq for PerPeerHeader { }

/// Reads an address stored in 16 octets, IPv4 in the last four.
fn read_padded_addr(cursor: &mut Cursor<'_>, ipv4: bool)
    -> Result<IpAddr, ParseError>
{
    let raw = cursor.read_array::<16>()?;
    if ipv4 {
        Ok(IpAddr::V4(Ipv4Addr::new(raw[12], raw[13], raw[14], raw[15])))
    } else {
        Ok(IpAddr::V6(Ipv6Addr::from(raw)))
    }
}

fn put_padded_addr(addr: IpAddr, target: &mut BytesMut) {
    match addr {
        IpAddr::V4(a) => {
            target.put_slice(&[0; 12]);
            target.put_slice(&a.octets());
        }
        IpAddr::V6(a) => target.put_slice(&a.octets()),
    }
}

/// Parses one embedded BGP message of the given type.
fn parse_bgp<'a>(
    cursor: &mut Cursor<'a>,
    expected: MsgType,
    ctx: &CodecContext<'_>,
) -> Result<(BgpHeader, Cursor<'a>), MessageError> {
    let header = BgpHeader::parse(cursor, ctx)?;
    if header.msg_type() != expected {
        return Err(MessageError::Parse(
            ParseError::form_error("unexpected embedded BGP message type")
        ))
    }
    let body = cursor.slice(header.body_len())?;
    Ok((header, body))
}

//------------ RouteMonitoring -----------------------------------------------

/// Route Monitoring message.
///
/// The embedded UPDATE is kept as received. Decoding it needs to know
/// whether Add-Path is in use, which only the Peer Up message for the
/// session can tell, so it happens on request via
/// [`bgp_update`](Self::bgp_update).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteMonitoring {
    per_peer: PerPeerHeader,
    update: Bytes,
}

impl RouteMonitoring {
    /// Creates a message from the complete BGP UPDATE message.
    pub fn new(per_peer: PerPeerHeader, update: Bytes) -> Self {
        RouteMonitoring { per_peer, update }
    }

    pub fn per_peer_header(&self) -> &PerPeerHeader {
        &self.per_peer
    }

    /// Returns the raw BGP message including its header.
    pub fn update_octets(&self) -> &Bytes {
        &self.update
    }

    /// Decodes the embedded UPDATE.
    ///
    /// A treat-as-withdraw condition is not an error here, it is returned
    /// as part of the [`ParsedUpdate`] for the caller to act upon.
    pub fn bgp_update(
        &self,
        config: &SessionConfig,
        extensions: &BgpExtensions,
    ) -> Result<ParsedUpdate, MessageError> {
        let ctx = CodecContext::new(config, extensions);
        let mut cursor = Cursor::new(self.update.as_ref());
        let (_, mut body) = parse_bgp(&mut cursor, MsgType::Update, &ctx)?;
        let res = UpdateMessage::parse_body(&mut body, &ctx)?;
        body.finish("trailing octets in UPDATE")?;
        Ok(res)
    }

    fn parse(cursor: &mut Cursor<'_>, ext: &BmpExtensions)
        -> Result<Self, MessageError>
    {
        let per_peer = PerPeerHeader::parse(cursor)?;
        let config = ext.embedded_config();
        let ctx = CodecContext::new(&config, ext.bgp());
        let start = cursor.peek_rest();
        let (header, _) = parse_bgp(cursor, MsgType::Update, &ctx)?;
        let update = Bytes::copy_from_slice(
            &start[..usize::from(header.length())]
        );
        Ok(RouteMonitoring { per_peer, update })
    }

    fn compose(&self, target: &mut BytesMut) {
        self.per_peer.compose(target);
        target.put_slice(&self.update);
    }
}

//------------ StatisticsReport ----------------------------------------------

/// Statistics Report message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatisticsReport {
    per_peer: PerPeerHeader,
    stats: Vec<Stat>,
}

impl StatisticsReport {
    pub fn new(per_peer: PerPeerHeader, stats: Vec<Stat>) -> Self {
        StatisticsReport { per_peer, stats }
    }

    pub fn per_peer_header(&self) -> &PerPeerHeader {
        &self.per_peer
    }

    pub fn stats(&self) -> &[Stat] {
        &self.stats
    }

    fn parse(cursor: &mut Cursor<'_>, _: &BmpExtensions)
        -> Result<Self, MessageError>
    {
        let per_peer = PerPeerHeader::parse(cursor)?;
        let count = cursor.read_u32()?;
        // Each stat takes at least four octets.
        if count as usize > cursor.remaining() / 4 {
            return Err(MessageError::Parse(ParseError::ShortInput))
        }
        let mut stats = Vec::with_capacity(count as usize);
        for _ in 0..count {
            stats.push(Stat::parse(cursor)?);
        }
        Ok(StatisticsReport { per_peer, stats })
    }

    fn compose(&self, target: &mut BytesMut) -> Result<(), ComposeError> {
        self.per_peer.compose(target);
        let count = u32::try_from(self.stats.len()).map_err(|_| {
            ComposeError::TooLong { what: "stats", len: self.stats.len() }
        })?;
        target.put_u32(count);
        for stat in &self.stats {
            stat.compose(target)?;
        }
        Ok(())
    }
}

typeenum!(
/// Statistics types, RFC 7854 section 4.8 and RFC 8671.
    StatType, u16,
    0 => RejectedByPolicy,
    1 => DuplicatePrefixAdvertisements,
    2 => DuplicateWithdraws,
    3 => InvalidatedClusterListLoop,
    4 => InvalidatedAsPathLoop,
    5 => InvalidatedOriginatorId,
    6 => InvalidatedAsConfedLoop,
    7 => AdjRibInRoutes,
    8 => LocRibRoutes,
    9 => AdjRibInRoutesPerAfiSafi,
    10 => LocRibRoutesPerAfiSafi,
    11 => UpdatesTreatAsWithdraw,
    12 => PrefixesTreatAsWithdraw,
    13 => DuplicateUpdates,
    14 => AdjRibOutPreRoutes,
    15 => AdjRibOutPostRoutes,
    16 => AdjRibOutPrePerAfiSafi,
    17 => AdjRibOutPostPerAfiSafi,
);

/// Represents the type and value of statistics in a BMP StatisticsReport.
///
/// <https://datatracker.ietf.org/doc/html/rfc7854#section-4.8>
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Stat {
    Counter(StatType, u32),
    Gauge(StatType, u64),
    FamilyGauge(StatType, AFI, SAFI, u64),

    /// Unknown types and known types of unexpected length.
    Unimplemented(UnknownTlv),
}

impl Stat {
    pub fn stat_type(&self) -> StatType {
        match self {
            Stat::Counter(t, _) | Stat::Gauge(t, _) => *t,
            Stat::FamilyGauge(t, ..) => *t,
            Stat::Unimplemented(tlv) => tlv.typ().into(),
        }
    }

    fn parse(cursor: &mut Cursor<'_>) -> Result<Self, ParseError> {
        let typ = cursor.read_u16()?;
        let len = cursor.read_u16()?;
        let mut value = cursor.slice(len.into())?;
        use StatType::*;
        let res = match (StatType::from(typ), len) {
            (RejectedByPolicy | DuplicatePrefixAdvertisements
                | DuplicateWithdraws | InvalidatedClusterListLoop
                | InvalidatedAsPathLoop | InvalidatedOriginatorId
                | InvalidatedAsConfedLoop | UpdatesTreatAsWithdraw
                | PrefixesTreatAsWithdraw | DuplicateUpdates, 4) =>
            {
                Stat::Counter(typ.into(), value.read_u32()?)
            }
            (AdjRibInRoutes | LocRibRoutes | AdjRibOutPreRoutes
                | AdjRibOutPostRoutes, 8) =>
            {
                Stat::Gauge(typ.into(), value.read_u64()?)
            }
            (AdjRibInRoutesPerAfiSafi | LocRibRoutesPerAfiSafi
                | AdjRibOutPrePerAfiSafi | AdjRibOutPostPerAfiSafi, 11) =>
            {
                let afi = value.read_u16()?.into();
                let safi = value.read_u8()?.into();
                Stat::FamilyGauge(typ.into(), afi, safi, value.read_u64()?)
            }
            _ => {
                debug!("keeping unimplemented stat type {} of {}", typ, len);
                Stat::Unimplemented(
                    UnknownTlv::new(typ, value.read_rest().to_vec())
                )
            }
        };
        Ok(res)
    }

    fn compose(&self, target: &mut BytesMut) -> Result<(), ComposeError> {
        target.put_u16(self.stat_type().into());
        match self {
            Stat::Counter(_, v) => {
                target.put_u16(4);
                target.put_u32(*v);
            }
            Stat::Gauge(_, v) => {
                target.put_u16(8);
                target.put_u64(*v);
            }
            Stat::FamilyGauge(_, afi, safi, v) => {
                target.put_u16(11);
                target.put_u16((*afi).into());
                target.put_u8((*safi).into());
                target.put_u64(*v);
            }
            Stat::Unimplemented(tlv) => {
                let len = u16::try_from(tlv.value().len()).map_err(|_| {
                    ComposeError::TooLong {
                        what: "stat", len: tlv.value().len()
                    }
                })?;
                target.put_u16(len);
                target.put_slice(tlv.value());
            }
        }
        Ok(())
    }
}

impl Display for Stat {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Stat::Counter(t, v) => write!(f, "{}: {}", t, v),
            Stat::Gauge(t, v) => write!(f, "{}: {}", t, v),
            Stat::FamilyGauge(t, afi, safi, v) => {
                write!(f, "{} {}/{}: {}", t, afi, safi, v)
            }
            Stat::Unimplemented(tlv) => {
                write!(f, "unimplemented-stat-type-{}", tlv.typ())
            }
        }
    }
}

//------------ PeerDownNotification ------------------------------------------

typeenum!(
/// Peer Down notification message reason codes.
    PeerDownReason, u8,
    1 => LocalNotification,
    2 => LocalFsm,
    3 => RemoteNotification,
    4 => RemoteNoData,
    5 => PeerDeconfigured,
);

/// What follows the reason in a Peer Down notification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PeerDownData {
    Notification(NotificationMessage),
    FsmEvent(u16),
    Empty,

    /// Data of reasons we don't know.
    Raw(Vec<u8>),
}

/// Peer Down Notification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerDownNotification {
    per_peer: PerPeerHeader,
    reason: PeerDownReason,
    data: PeerDownData,
}

impl PeerDownNotification {
    pub fn new(
        per_peer: PerPeerHeader,
        reason: PeerDownReason,
        data: PeerDownData,
    ) -> Self {
        PeerDownNotification { per_peer, reason, data }
    }

    pub fn per_peer_header(&self) -> &PerPeerHeader {
        &self.per_peer
    }

    pub fn reason(&self) -> PeerDownReason {
        self.reason
    }

    pub fn data(&self) -> &PeerDownData {
        &self.data
    }

    /// Returns the BGP NOTIFICATION, present for the notification reasons.
    pub fn notification(&self) -> Option<&NotificationMessage> {
        match &self.data {
            PeerDownData::Notification(n) => Some(n),
            _ => None
        }
    }

    /// Returns the FSM event code for [`PeerDownReason::LocalFsm`].
    pub fn fsm(&self) -> Option<u16> {
        match self.data {
            PeerDownData::FsmEvent(e) => Some(e),
            _ => None
        }
    }

    fn parse(cursor: &mut Cursor<'_>, ext: &BmpExtensions)
        -> Result<Self, MessageError>
    {
        let per_peer = PerPeerHeader::parse(cursor)?;
        let reason = PeerDownReason::from(cursor.read_u8()?);
        let data = match reason {
            PeerDownReason::LocalNotification
            | PeerDownReason::RemoteNotification => {
                let config = ext.embedded_config();
                let ctx = CodecContext::new(&config, ext.bgp());
                let (_, mut body) = parse_bgp(
                    cursor, MsgType::Notification, &ctx
                )?;
                PeerDownData::Notification(
                    NotificationMessage::parse_body(&mut body)?
                )
            }
            PeerDownReason::LocalFsm => {
                PeerDownData::FsmEvent(cursor.read_u16()?)
            }
            PeerDownReason::RemoteNoData
            | PeerDownReason::PeerDeconfigured => PeerDownData::Empty,
            PeerDownReason::Unimplemented(_) => {
                PeerDownData::Raw(cursor.read_rest().to_vec())
            }
        };
        Ok(PeerDownNotification { per_peer, reason, data })
    }

    fn compose(&self, ext: &BmpExtensions, target: &mut BytesMut)
        -> Result<(), ComposeError>
    {
        self.per_peer.compose(target);
        target.put_u8(self.reason.into());
        match &self.data {
            PeerDownData::Notification(n) => {
                let config = ext.embedded_config();
                let ctx = CodecContext::new(&config, ext.bgp());
                bgp::Message::Notification(n.clone())
                    .compose(&ctx, target)?;
            }
            PeerDownData::FsmEvent(e) => target.put_u16(*e),
            PeerDownData::Empty => { }
            PeerDownData::Raw(raw) => target.put_slice(raw),
        }
        Ok(())
    }
}

//------------ PeerUpNotification --------------------------------------------

/// Peer Up Notification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerUpNotification {
    per_peer: PerPeerHeader,
    local_address: IpAddr,
    local_port: u16,
    remote_port: u16,
    sent_open: OpenMessage,
    received_open: OpenMessage,
    information: Vec<InformationTlv>,
}

impl PeerUpNotification {
    pub fn new(
        per_peer: PerPeerHeader,
        local: (IpAddr, u16),
        remote_port: u16,
        opens: (OpenMessage, OpenMessage),
        information: Vec<InformationTlv>,
    ) -> Self {
        PeerUpNotification {
            per_peer,
            local_address: local.0,
            local_port: local.1,
            remote_port,
            sent_open: opens.0,
            received_open: opens.1,
            information,
        }
    }

    pub fn per_peer_header(&self) -> &PerPeerHeader {
        &self.per_peer
    }

    pub fn local_address(&self) -> IpAddr {
        self.local_address
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// The OPEN the monitored router sent to the peer.
    pub fn bgp_open_sent(&self) -> &OpenMessage {
        &self.sent_open
    }

    /// The OPEN the monitored router received from the peer.
    pub fn bgp_open_rcvd(&self) -> &OpenMessage {
        &self.received_open
    }

    pub fn information_tlvs(&self) -> &[InformationTlv] {
        &self.information
    }

    /// Returns the session config for UPDATEs received from this peer.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::negotiate(&self.sent_open, &self.received_open)
    }

    fn parse(cursor: &mut Cursor<'_>, ext: &BmpExtensions)
        -> Result<Self, MessageError>
    {
        let per_peer = PerPeerHeader::parse(cursor)?;
        let local_address = read_padded_addr(cursor, per_peer.is_ipv4())?;
        let local_port = cursor.read_u16()?;
        let remote_port = cursor.read_u16()?;
        let config = ext.embedded_config();
        let ctx = CodecContext::new(&config, ext.bgp());
        let (_, mut body) = parse_bgp(cursor, MsgType::Open, &ctx)?;
        let sent_open = OpenMessage::parse_body(&mut body, &ctx)?;
        body.finish("trailing octets in OPEN")?;
        let (_, mut body) = parse_bgp(cursor, MsgType::Open, &ctx)?;
        let received_open = OpenMessage::parse_body(&mut body, &ctx)?;
        body.finish("trailing octets in OPEN")?;
        let information = parse_all(
            Cursor::new(cursor.read_rest()),
            TlvFormat::WIDE,
            ext.information(),
            Unrecognized::Keep,
        )?;
        Ok(PeerUpNotification {
            per_peer, local_address, local_port, remote_port,
            sent_open, received_open, information
        })
    }

    fn compose(&self, ext: &BmpExtensions, target: &mut BytesMut)
        -> Result<(), ComposeError>
    {
        self.per_peer.compose(target);
        put_padded_addr(self.local_address, target);
        target.put_u16(self.local_port);
        target.put_u16(self.remote_port);
        let config = ext.embedded_config();
        let ctx = CodecContext::new(&config, ext.bgp());
        bgp::Message::Open(self.sent_open.clone()).compose(&ctx, target)?;
        bgp::Message::Open(self.received_open.clone())
            .compose(&ctx, target)?;
        compose_all(
            &self.information, TlvFormat::WIDE, ext.information(), target
        )
    }
}

//------------ InitiationMessage and TerminationMessage ----------------------

/// Initiation message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InitiationMessage {
    information: Vec<InformationTlv>,
}

impl InitiationMessage {
    pub fn new(information: Vec<InformationTlv>) -> Self {
        InitiationMessage { information }
    }

    pub fn information_tlvs(&self) -> &[InformationTlv] {
        &self.information
    }

    /// Returns the sysName, which RFC 7854 requires to be present.
    pub fn sys_name(&self) -> Option<&str> {
        self.information.iter().find_map(|tlv| match tlv {
            InformationTlv::SysName(s) => Some(s.as_str()),
            _ => None
        })
    }

    fn parse(cursor: &mut Cursor<'_>, ext: &BmpExtensions)
        -> Result<Self, MessageError>
    {
        let information = parse_all(
            Cursor::new(cursor.read_rest()),
            TlvFormat::WIDE,
            ext.information(),
            Unrecognized::Keep,
        )?;
        Ok(InitiationMessage { information })
    }
}

/// Termination message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TerminationMessage {
    information: Vec<TerminationTlv>,
}

impl TerminationMessage {
    pub fn new(information: Vec<TerminationTlv>) -> Self {
        TerminationMessage { information }
    }

    pub fn information(&self) -> &[TerminationTlv] {
        &self.information
    }

    pub fn reason(&self) -> Option<TerminationReason> {
        self.information.iter().find_map(|tlv| match tlv {
            TerminationTlv::Reason(r) => Some(*r),
            _ => None
        })
    }

    fn parse(cursor: &mut Cursor<'_>, ext: &BmpExtensions)
        -> Result<Self, MessageError>
    {
        let information = parse_all(
            Cursor::new(cursor.read_rest()),
            TlvFormat::WIDE,
            ext.termination(),
            Unrecognized::Keep,
        )?;
        Ok(TerminationMessage { information })
    }
}

//------------ Information TLVs ----------------------------------------------
//
// Information TLVs are present in the BMP InitiationMessage, and optionally
// in the PeerUpNotification. Their length excludes the four octet header.

typeenum!(
/// Types of Information TLVs.
///
/// See also
/// <https://www.iana.org/assignments/bmp-parameters/bmp-parameters.xhtml#initiation-peer-up-tlvs>
    InformationTlvType, u16,
    0 => String,
    1 => SysDesc,
    2 => SysName,
    3 => VrfTableName, // RFC 9069
    4 => AdminLabel, // RFC 8671
);

/// TLV used in Initiation Message and Peer Up Notification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InformationTlv {
    String(String),
    SysDesc(String),
    SysName(String),
    VrfTableName(String),
    AdminLabel(String),
    Unknown(UnknownTlv),
}

impl InformationTlv {
    /// Returns the text of the TLV, if it is one of the string types.
    pub fn text(&self) -> Option<&str> {
        match self {
            InformationTlv::String(s)
            | InformationTlv::SysDesc(s)
            | InformationTlv::SysName(s)
            | InformationTlv::VrfTableName(s)
            | InformationTlv::AdminLabel(s) => Some(s),
            InformationTlv::Unknown(_) => None,
        }
    }
}

impl TlvValue for InformationTlv {
    type Tag = InformationTlvType;

    fn tag(&self) -> InformationTlvType {
        match self {
            InformationTlv::String(_) => InformationTlvType::String,
            InformationTlv::SysDesc(_) => InformationTlvType::SysDesc,
            InformationTlv::SysName(_) => InformationTlvType::SysName,
            InformationTlv::VrfTableName(_) => {
                InformationTlvType::VrfTableName
            }
            InformationTlv::AdminLabel(_) => InformationTlvType::AdminLabel,
            InformationTlv::Unknown(tlv) => tlv.typ().into(),
        }
    }

    fn unrecognized(typ: u16, value: &[u8]) -> Self {
        InformationTlv::Unknown(UnknownTlv::new(typ, value.to_vec()))
    }

    fn as_unrecognized(&self) -> Option<(u16, &[u8])> {
        match self {
            InformationTlv::Unknown(tlv) => Some((tlv.typ(), tlv.value())),
            _ => None
        }
    }
}

impl Display for InformationTlv {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self.text() {
            Some(text) => write!(f, "{}: {}", self.tag(), text),
            None => write!(f, "{}", self.tag()),
        }
    }
}

fn read_text(cursor: &mut Cursor<'_>) -> Result<String, ParseError> {
    String::from_utf8(cursor.read_rest().to_vec()).map_err(|_| {
        ParseError::form_error("information TLV is not UTF-8")
    })
}

fn compose_information(tlv: &InformationTlv, t: &mut BytesMut)
    -> Result<(), ComposeError>
{
    match tlv.text() {
        Some(text) => {
            t.put_slice(text.as_bytes());
            Ok(())
        }
        None => Err(ComposeError::InvalidValue("not a string TLV")),
    }
}

typeenum!(
/// Reason codes of the Termination message.
    TerminationReason, u16,
    0 => AdministrativelyClosed,
    1 => Unspecified,
    2 => OutOfResources,
    3 => RedundantConnection,
    4 => PermanentlyClosed,
);

/// TLV used in the Termination message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TerminationTlv {
    String(String),
    Reason(TerminationReason),
    Unknown(UnknownTlv),
}

impl TlvValue for TerminationTlv {
    type Tag = u16;

    fn tag(&self) -> u16 {
        match self {
            TerminationTlv::String(_) => 0,
            TerminationTlv::Reason(_) => 1,
            TerminationTlv::Unknown(tlv) => tlv.typ(),
        }
    }

    fn unrecognized(typ: u16, value: &[u8]) -> Self {
        TerminationTlv::Unknown(UnknownTlv::new(typ, value.to_vec()))
    }

    fn as_unrecognized(&self) -> Option<(u16, &[u8])> {
        match self {
            TerminationTlv::Unknown(tlv) => Some((tlv.typ(), tlv.value())),
            _ => None
        }
    }
}

fn compose_termination(tlv: &TerminationTlv, t: &mut BytesMut)
    -> Result<(), ComposeError>
{
    match tlv {
        TerminationTlv::String(s) => t.put_slice(s.as_bytes()),
        TerminationTlv::Reason(r) => t.put_u16((*r).into()),
        TerminationTlv::Unknown(tlv) => t.put_slice(tlv.value()),
    }
    Ok(())
}

//------------ BmpExtensions -------------------------------------------------

/// Parses a message body. The cursor covers exactly the body.
pub type MessageParser = fn(
    &mut Cursor<'_>, &BmpExtensions
) -> Result<Message, MessageError>;

/// Writes a message body.
pub type MessageComposer = fn(
    &Message, &BmpExtensions, &mut BytesMut
) -> Result<(), ComposeError>;

pub type MessageRegistry = TypeRegistry<
    u8, MessageType, MessageParser, MessageComposer
>;

/// The registries a BMP station decodes messages with.
///
/// Embedded BGP messages are decoded with the BGP registries held here.
#[derive(Clone, Debug)]
pub struct BmpExtensions {
    messages: MessageRegistry,
    information: TlvRegistry<InformationTlv>,
    termination: TlvRegistry<TerminationTlv>,
    bgp: BgpExtensions,
}

impl BmpExtensions {
    /// Creates empty BMP registries around the given BGP ones.
    pub fn new(bgp: BgpExtensions) -> Self {
        BmpExtensions {
            messages: MessageRegistry::new(),
            information: TlvRegistry::new(),
            termination: TlvRegistry::new(),
            bgp,
        }
    }

    pub fn messages(&self) -> &MessageRegistry {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut MessageRegistry {
        &mut self.messages
    }

    pub fn information(&self) -> &TlvRegistry<InformationTlv> {
        &self.information
    }

    pub fn information_mut(&mut self) -> &mut TlvRegistry<InformationTlv> {
        &mut self.information
    }

    pub fn termination(&self) -> &TlvRegistry<TerminationTlv> {
        &self.termination
    }

    pub fn termination_mut(&mut self) -> &mut TlvRegistry<TerminationTlv> {
        &mut self.termination
    }

    pub fn bgp(&self) -> &BgpExtensions {
        &self.bgp
    }

    /// The config for framing embedded BGP messages.
    ///
    /// Extended messages are allowed since the monitored session may well
    /// have negotiated them.
    fn embedded_config(&self) -> SessionConfig {
        let mut res = SessionConfig::modern();
        res.set_extended_message(true);
        res
    }
}

impl Default for BmpExtensions {
    fn default() -> Self {
        let mut res = Self::new(BgpExtensions::default());
        register_defaults(&mut res);
        res
    }
}

fn parse_route_monitoring(c: &mut Cursor<'_>, ext: &BmpExtensions)
    -> Result<Message, MessageError>
{
    RouteMonitoring::parse(c, ext).map(Message::RouteMonitoring)
}

fn parse_statistics(c: &mut Cursor<'_>, ext: &BmpExtensions)
    -> Result<Message, MessageError>
{
    StatisticsReport::parse(c, ext).map(Message::StatisticsReport)
}

fn parse_peer_down(c: &mut Cursor<'_>, ext: &BmpExtensions)
    -> Result<Message, MessageError>
{
    PeerDownNotification::parse(c, ext).map(Message::PeerDownNotification)
}

fn parse_peer_up(c: &mut Cursor<'_>, ext: &BmpExtensions)
    -> Result<Message, MessageError>
{
    PeerUpNotification::parse(c, ext).map(Message::PeerUpNotification)
}

fn parse_initiation(c: &mut Cursor<'_>, ext: &BmpExtensions)
    -> Result<Message, MessageError>
{
    InitiationMessage::parse(c, ext).map(Message::InitiationMessage)
}

fn parse_termination(c: &mut Cursor<'_>, ext: &BmpExtensions)
    -> Result<Message, MessageError>
{
    TerminationMessage::parse(c, ext).map(Message::TerminationMessage)
}

fn compose_body(msg: &Message, ext: &BmpExtensions, t: &mut BytesMut)
    -> Result<(), ComposeError>
{
    match msg {
        Message::RouteMonitoring(m) => {
            m.compose(t);
            Ok(())
        }
        Message::StatisticsReport(m) => m.compose(t),
        Message::PeerDownNotification(m) => m.compose(ext, t),
        Message::PeerUpNotification(m) => m.compose(ext, t),
        Message::InitiationMessage(m) => compose_all(
            &m.information, TlvFormat::WIDE, ext.information(), t
        ),
        Message::TerminationMessage(m) => compose_all(
            &m.information, TlvFormat::WIDE, ext.termination(), t
        ),
    }
}

/// Registers the message types and TLVs of RFC 7854.
pub fn register_defaults(ext: &mut BmpExtensions) {
    let parsers: [(MessageType, MessageParser); 6] = [
        (MessageType::RouteMonitoring, parse_route_monitoring),
        (MessageType::StatisticsReport, parse_statistics),
        (MessageType::PeerDownNotification, parse_peer_down),
        (MessageType::PeerUpNotification, parse_peer_up),
        (MessageType::InitiationMessage, parse_initiation),
        (MessageType::TerminationMessage, parse_termination),
    ];
    for (typ, parse) in parsers {
        if let Err(err) = ext.messages.register(
            typ.into(), typ, parse, compose_body
        ) {
            error!("failed to register BMP message type {}: {}", typ, err);
        }
    }

    let information: [(InformationTlvType, TlvParser<InformationTlv>); 5] = [
        (InformationTlvType::String,
            |c| read_text(c).map(InformationTlv::String)),
        (InformationTlvType::SysDesc,
            |c| read_text(c).map(InformationTlv::SysDesc)),
        (InformationTlvType::SysName,
            |c| read_text(c).map(InformationTlv::SysName)),
        (InformationTlvType::VrfTableName,
            |c| read_text(c).map(InformationTlv::VrfTableName)),
        (InformationTlvType::AdminLabel,
            |c| read_text(c).map(InformationTlv::AdminLabel)),
    ];
    for (typ, parse) in information {
        if let Err(err) = ext.information.register(
            typ.into(), typ, parse, compose_information
        ) {
            error!("failed to register information TLV {}: {}", typ, err);
        }
    }

    let termination: [(u16, TlvParser<TerminationTlv>); 2] = [
        (0, |c| read_text(c).map(TerminationTlv::String)),
        (1, |c| Ok(TerminationTlv::Reason(c.read_u16()?.into()))),
    ];
    for (typ, parse) in termination {
        if let Err(err) = ext.termination.register(
            typ, typ, parse, compose_termination
        ) {
            error!("failed to register termination TLV {}: {}", typ, err);
        }
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::types::AfiSafi;
    use crate::bgp::message::open::{
        AddPathDirection, AddPathFamily, Capability
    };
    use crate::bgp::error::ErrorCode;

    const PER_PEER: [u8; 42] = [
        // peer type 0, flags 0
        0x00, 0x00,
        // RD type 0, 12345:654321
        0x00, 0x00, 0x30, 0x39, 0x00, 0x09, 0xfb, 0xf1,
        // 192.0.2.1
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xc0, 0x00, 0x02, 0x01,
        // AS 65001
        0x00, 0x00, 0xfd, 0xe9,
        // BGP id 10.0.0.2
        0x0a, 0x00, 0x00, 0x02,
        // 2021-01-01T00:00:00Z, 500 us
        0x5f, 0xee, 0x66, 0x00, 0x00, 0x00, 0x01, 0xf4,
    ];

    fn bmp(typ: u8, body: &[u8]) -> Vec<u8> {
        let mut res = vec![3];
        res.extend_from_slice(&((body.len() + 6) as u32).to_be_bytes());
        res.push(typ);
        res.extend_from_slice(body);
        res
    }

    fn bgp_msg(typ: u8, body: &[u8]) -> Vec<u8> {
        let mut res = vec![0xff; 16];
        res.extend_from_slice(&((body.len() + 19) as u16).to_be_bytes());
        res.push(typ);
        res.extend_from_slice(body);
        res
    }

    fn round_trip(buf: &[u8]) -> Message {
        let ext = BmpExtensions::default();
        let msg = Message::from_octets(buf, &ext).unwrap();
        let mut target = BytesMut::new();
        msg.compose(&ext, &mut target).unwrap();
        assert_eq!(target.as_ref(), buf);
        msg
    }

    #[test]
    fn per_peer_header() {
        let pph = PerPeerHeader::parse(&mut Cursor::new(&PER_PEER)).unwrap();
        assert_eq!(pph.peer_type(), PeerType::GlobalInstance);
        assert_eq!(
            pph.distinguisher(),
            RouteDistinguisher::As2 {
                asn: Asn::from_u32(12345), value: 654321
            }
        );
        assert!(pph.is_ipv4());
        assert!(pph.is_pre_policy());
        assert_eq!(pph.adj_rib_type(), RibType::AdjRibIn);
        assert_eq!(pph.address(), IpAddr::from([192, 0, 2, 1]));
        assert_eq!(pph.asn(), Asn::from_u32(65001));
        assert_eq!(pph.bgp_id(), Ipv4Addr::new(10, 0, 0, 2));
        let ts = pph.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1609459200);
        assert_eq!(ts.timestamp_subsec_micros(), 500);
        assert!(pph.session_config().four_octet_asn());

        let mut target = BytesMut::new();
        pph.compose(&mut target);
        assert_eq!(target.as_ref(), &PER_PEER[..]);
    }

    #[test]
    fn route_monitoring() {
        let update = bgp_msg(2, &[
            0x00, 0x00, 0x00, 0x0d,
            0x40, 0x01, 0x01, 0x00,
            0x40, 0x02, 0x06, 0x02, 0x01, 0x00, 0x00, 0xfd, 0xe9,
        ]);
        let mut body = PER_PEER.to_vec();
        body.extend_from_slice(&update);
        let msg = round_trip(&bmp(0, &body));
        let rm = match msg {
            Message::RouteMonitoring(rm) => rm,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(rm.update_octets().as_ref(), update.as_slice());
        let config = rm.per_peer_header().session_config();
        let parsed = rm.bgp_update(&config, &BgpExtensions::default())
            .unwrap();
        assert!(parsed.recoverable_error.is_none());
        assert_eq!(
            parsed.update.attributes().as_path().unwrap().to_string(),
            "65001"
        );
    }

    #[test]
    fn statistics_report() {
        let mut body = PER_PEER.to_vec();
        body.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x04,
            0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x02,
            0x00, 0x07, 0x00, 0x08, 0, 0, 0, 0, 0, 0, 0x03, 0xe8,
            0x00, 0x09, 0x00, 0x0b, 0x00, 0x02, 0x01, 0, 0, 0, 0, 0, 0, 0, 0x05,
            // type 1 with the wrong length
            0x00, 0x01, 0x00, 0x02, 0xab, 0xcd,
        ]);
        let msg = round_trip(&bmp(1, &body));
        let stats = match msg {
            Message::StatisticsReport(m) => m.stats().to_vec(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(stats, [
            Stat::Counter(StatType::RejectedByPolicy, 2),
            Stat::Gauge(StatType::AdjRibInRoutes, 1000),
            Stat::FamilyGauge(
                StatType::AdjRibInRoutesPerAfiSafi,
                AFI::Ipv6, SAFI::Unicast, 5
            ),
            Stat::Unimplemented(UnknownTlv::new(1, vec![0xab, 0xcd])),
        ]);
        assert_eq!(stats[1].to_string(), "AdjRibInRoutes: 1000");

        // A count larger than what follows.
        let mut body = PER_PEER.to_vec();
        body.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]);
        assert!(Message::from_octets(
            &bmp(1, &body), &BmpExtensions::default()
        ).is_err());
    }

    #[test]
    fn peer_down() {
        let mut body = PER_PEER.to_vec();
        body.push(1);
        body.extend_from_slice(&bgp_msg(3, &[0x06, 0x02]));
        let msg = round_trip(&bmp(2, &body));
        let pd = match msg {
            Message::PeerDownNotification(pd) => pd,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(pd.reason(), PeerDownReason::LocalNotification);
        let notification = pd.notification().unwrap();
        assert_eq!(notification.code(), ErrorCode::Cease);
        assert_eq!(notification.subcode(), 2);

        let mut body = PER_PEER.to_vec();
        body.extend_from_slice(&[0x02, 0x00, 0x07]);
        let msg = round_trip(&bmp(2, &body));
        match msg {
            Message::PeerDownNotification(pd) => {
                assert_eq!(pd.fsm(), Some(7))
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut body = PER_PEER.to_vec();
        body.push(4);
        round_trip(&bmp(2, &body));
    }

    #[test]
    fn peer_up() {
        let open = |asn: u16, id: u8, dir: u8| bgp_msg(1, &[
            0x04, (asn >> 8) as u8, asn as u8, 0x00, 0xb4, 10, 0, 0, id,
            0x0e, 0x02, 0x0c,
            0x41, 0x04, 0x00, 0x00, (asn >> 8) as u8, asn as u8,
            0x45, 0x04, 0x00, 0x01, 0x01, dir,
        ]);
        let mut body = PER_PEER.to_vec();
        body.extend_from_slice(&[0; 12]);
        body.extend_from_slice(&[192, 0, 2, 254]);
        body.extend_from_slice(&[0x00, 0xb3, 0xc0, 0x01]);
        body.extend_from_slice(&open(65000, 1, 1));
        body.extend_from_slice(&open(65001, 2, 2));
        body.extend_from_slice(&[0x00, 0x00, 0x00, 0x04, b't', b'e', b's', b't']);
        let msg = round_trip(&bmp(3, &body));
        let pu = match msg {
            Message::PeerUpNotification(pu) => pu,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(pu.local_address(), IpAddr::from([192, 0, 2, 254]));
        assert_eq!(pu.local_port(), 179);
        assert_eq!(pu.remote_port(), 49153);
        assert_eq!(pu.bgp_open_sent().asn(), Asn::from_u32(65000));
        assert_eq!(pu.bgp_open_rcvd().bgp_id(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(
            pu.bgp_open_rcvd().capabilities()[1],
            Capability::AddPath(vec![AddPathFamily::new(
                AFI::Ipv4, SAFI::Unicast, AddPathDirection::Send
            )])
        );
        assert_eq!(
            pu.information_tlvs(),
            [InformationTlv::String("test".into())]
        );
        let config = pu.session_config();
        assert!(config.four_octet_asn());
        assert_eq!(
            config.add_path_families().collect::<Vec<_>>(),
            [AfiSafi::Ipv4Unicast]
        );
    }

    #[test]
    fn initiation_and_termination() {
        let body = [
            0x00, 0x01, 0x00, 0x04, b't', b'e', b's', b't',
            0x00, 0x02, 0x00, 0x02, b'r', b'1',
            0x00, 0x63, 0x00, 0x01, 0xff,
        ];
        let msg = round_trip(&bmp(4, &body));
        match &msg {
            Message::InitiationMessage(m) => {
                assert_eq!(m.information_tlvs()[0].text(), Some("test"));
                assert_eq!(m.sys_name(), Some("r1"));
                assert_eq!(
                    m.information_tlvs()[2],
                    InformationTlv::Unknown(UnknownTlv::new(99, vec![0xff]))
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(msg.to_string(), "InitiationMessage");

        let body = [0x00, 0x01, 0x00, 0x02, 0x00, 0x01];
        match round_trip(&bmp(5, &body)) {
            Message::TerminationMessage(m) => {
                assert_eq!(m.reason(), Some(TerminationReason::Unspecified))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn errors() {
        let ext = BmpExtensions::default();

        // TLV length beyond the message.
        let buf = bmp(4, &[0x00, 0x01, 0x00, 0x0a, b't', b'e', b's', b't']);
        assert!(matches!(
            Message::from_octets(&buf, &ext),
            Err(MessageError::Parse(ParseError::ShortInput))
        ));

        let mut buf = bmp(4, &[]);
        buf[0] = 2;
        assert_eq!(
            Message::from_octets(&buf, &ext),
            Err(MessageError::UnsupportedVersion(2))
        );

        assert_eq!(
            Message::from_octets(&bmp(6, &[]), &ext),
            Err(MessageError::InvalidMsgType(6))
        );

        assert_eq!(
            Message::from_octets(&[3, 0, 0, 0, 5, 4], &ext),
            Err(MessageError::IllegalSize)
        );

        let buf = bmp(4, &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(Message::peek_len(&buf), Some(10));
        assert_eq!(
            Message::from_octets(&buf[..8], &ext),
            Err(MessageError::Incomplete)
        );

        // Embedded message of the wrong type.
        let mut body = PER_PEER.to_vec();
        body.extend_from_slice(&bgp_msg(4, &[]));
        assert!(Message::from_octets(&bmp(0, &body), &ext).is_err());
    }

    #[test]
    fn truncated_messages() {
        let ext = BmpExtensions::default();
        let mut body = PER_PEER.to_vec();
        body.push(1);
        body.extend_from_slice(&bgp_msg(3, &[0x06, 0x02]));
        let buf = bmp(2, &body);
        for len in 0..buf.len() {
            assert!(Message::from_octets(&buf[..len], &ext).is_err());
        }
        for len in 0..body.len() {
            let _ = Message::from_octets(&bmp(2, &body[..len]), &ext);
        }
    }
}
