//! BGP messages and their framing.
//!
//! Every message starts with the 19 octet header of RFC 4271 section 4.1:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                                                               |
//!  +                                                               +
//!  |                           Marker                              |
//!  +                                                               +
//!  |                                                               |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |          Length               |      Type     |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The body following the header is handed to the parser registered for
//! the message type in the [`MessageRegistry`].

pub mod keepalive;
pub mod notification;
pub mod open;
pub mod routerefresh;
pub mod update;

use bytes::{BufMut, Bytes, BytesMut};
use log::{error, warn};

use crate::bgp::error::{DocumentedError, HeaderErrorSubcode};
use crate::bgp::extensions::CodecContext;
use crate::registry::TypeRegistry;
use crate::typeenum; // from util::macros
use crate::util::parser::{ComposeError, Cursor, ParseError};

pub use keepalive::KeepaliveMessage;
pub use notification::NotificationMessage;
pub use open::OpenMessage;
pub use routerefresh::RouteRefreshMessage;
pub use update::{ParsedUpdate, SessionConfig, UpdateMessage};

typeenum!(
/// BGP Message types.
    MsgType, u8,
    1 => Open,
    2 => Update,
    3 => Notification,
    4 => Keepalive,
    5 => RouteRefresh, // RFC2918
);

impl MsgType {
    /// The smallest valid total length for a message of this type.
    pub fn min_len(self) -> usize {
        match self {
            MsgType::Open => 29,
            MsgType::Update => 23,
            MsgType::Notification => 21,
            MsgType::Keepalive => HEADER_LEN,
            MsgType::RouteRefresh => 23,
            MsgType::Unimplemented(_) => HEADER_LEN,
        }
    }
}

pub const MARKER: [u8; 16] = [0xff; 16];
pub const HEADER_LEN: usize = 19;

/// Maximum message length, RFC 4271.
pub const MAX_LEN: usize = 4096;

/// Maximum message length with extended messages, RFC 8654.
pub const MAX_EXTENDED_LEN: usize = 65535;

//------------ Message -------------------------------------------------------

/// A complete BGP message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    Open(OpenMessage),
    Update(UpdateMessage),
    Notification(NotificationMessage),
    Keepalive(KeepaliveMessage),
    RouteRefresh(RouteRefreshMessage),
}

impl Message {
    pub fn msg_type(&self) -> MsgType {
        match self {
            Message::Open(_) => MsgType::Open,
            Message::Update(_) => MsgType::Update,
            Message::Notification(_) => MsgType::Notification,
            Message::Keepalive(_) => MsgType::Keepalive,
            Message::RouteRefresh(_) => MsgType::RouteRefresh,
        }
    }

    /// Returns the total length of the message at the start of `octets`.
    ///
    /// Returns `None` if not even the header is available yet. This is
    /// meant for cutting messages out of a stream, nothing is validated.
    pub fn peek_len(octets: &[u8]) -> Option<usize> {
        if octets.len() < HEADER_LEN {
            return None
        }
        Some(u16::from_be_bytes([octets[16], octets[17]]).into())
    }

    /// Parses one message and advances `cursor` past it.
    pub fn parse(
        cursor: &mut Cursor<'_>,
        ctx: &CodecContext<'_>,
    ) -> Result<Self, DocumentedError> {
        let header = Header::parse(cursor, ctx)?;
        let body = cursor.slice(header.body_len()).map_err(|err| {
            header.length_error("message exceeds the available octets")
                .with_cause(err)
        })?;
        dispatch(header, body, ctx)
    }

    /// Parses `octets` which have to hold exactly one message.
    pub fn from_octets(
        octets: &[u8],
        ctx: &CodecContext<'_>,
    ) -> Result<Self, DocumentedError> {
        let mut cursor = Cursor::new(octets);
        let res = Self::parse(&mut cursor, ctx)?;
        if !cursor.is_empty() {
            return Err(DocumentedError::header(
                HeaderErrorSubcode::BadMessageLength,
                u16::try_from(octets.len()).unwrap_or(u16::MAX)
                    .to_be_bytes().to_vec(),
                "octets after the end of the message",
            ))
        }
        Ok(res)
    }

    /// Appends the complete message to `target`.
    ///
    /// Nothing is appended if this fails.
    pub fn compose(
        &self,
        ctx: &CodecContext<'_>,
        target: &mut BytesMut,
    ) -> Result<(), ComposeError> {
        let (code, compose) = ctx.extensions.messages()
            .serializer_for(self.msg_type())
            .ok_or_else(|| {
                ComposeError::Unregistered(self.msg_type().to_string())
            })?;
        let start = target.len();
        target.put_slice(&MARKER);
        target.put_u16(0);
        target.put_u8(code);
        if let Err(err) = compose(self, ctx, target) {
            target.truncate(start);
            return Err(err)
        }
        let len = target.len() - start;
        if len > ctx.config.max_message_len() {
            target.truncate(start);
            return Err(ComposeError::TooLong { what: "BGP message", len })
        }
        target[start + 16..start + 18]
            .copy_from_slice(&(len as u16).to_be_bytes());
        Ok(())
    }

    /// Returns the message as a freshly allocated buffer.
    pub fn to_bytes(
        &self,
        ctx: &CodecContext<'_>,
    ) -> Result<Bytes, ComposeError> {
        let mut target = BytesMut::new();
        self.compose(ctx, &mut target)?;
        Ok(target.freeze())
    }
}

impl From<NotificationMessage> for Message {
    fn from(msg: NotificationMessage) -> Self {
        Message::Notification(msg)
    }
}

//------------ Header --------------------------------------------------------

/// A validated message header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    length: u16,
    msg_type: MsgType,
}

impl Header {
    /// Returns the value of the length field, including the header.
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }

    /// Returns the length of the message body.
    pub fn body_len(&self) -> usize {
        usize::from(self.length) - HEADER_LEN
    }

    /// Reads and validates a header.
    ///
    /// Checks the marker, the overall length limits, that a parser is
    /// registered for the type and the minimum length of that type, in
    /// that order.
    pub fn parse(
        cursor: &mut Cursor<'_>,
        ctx: &CodecContext<'_>,
    ) -> Result<Self, DocumentedError> {
        let short = |err: ParseError| DocumentedError::header(
            HeaderErrorSubcode::BadMessageLength,
            Vec::new(),
            "truncated message header",
        ).with_cause(err);

        let marker = cursor.read_array::<16>().map_err(short)?;
        let length = cursor.read_u16().map_err(short)?;
        let typ = cursor.read_u8().map_err(short)?;

        if marker != MARKER {
            return Err(DocumentedError::header(
                HeaderErrorSubcode::ConnectionNotSynchronized,
                Vec::new(),
                "invalid marker",
            ))
        }
        let header = Header { length, msg_type: typ.into() };
        let len = usize::from(length);
        if len < HEADER_LEN || len > ctx.config.max_message_len() {
            return Err(header.length_error("message length out of range"))
        }
        if !ctx.extensions.messages().contains(typ) {
            return Err(DocumentedError::header(
                HeaderErrorSubcode::BadMessageType,
                vec![typ],
                "unsupported message type",
            ))
        }
        if len < header.msg_type.min_len() {
            return Err(header.length_error("message too short for its type"))
        }
        Ok(header)
    }

    /// Creates a bad message length error reporting our length field.
    fn length_error(&self, reason: &'static str) -> DocumentedError {
        DocumentedError::header(
            HeaderErrorSubcode::BadMessageLength,
            self.length.to_be_bytes().to_vec(),
            reason,
        )
    }
}

//------------ Registry ------------------------------------------------------

/// Parses a message body. The cursor covers exactly the body.
pub type MessageParser = fn(
    &mut Cursor<'_>, &CodecContext<'_>
) -> Result<Message, DocumentedError>;

/// Writes a message body.
pub type MessageComposer = fn(
    &Message, &CodecContext<'_>, &mut BytesMut
) -> Result<(), ComposeError>;

pub type MessageRegistry = TypeRegistry<
    u8, MsgType, MessageParser, MessageComposer
>;

/// Hands a message body to the parser registered for its type.
///
/// The parser has to consume the body completely.
pub fn dispatch(
    header: Header,
    mut body: Cursor<'_>,
    ctx: &CodecContext<'_>,
) -> Result<Message, DocumentedError> {
    let parse = ctx.extensions.messages()
        .parser_for(header.msg_type.into())
        .ok_or_else(|| DocumentedError::header(
            HeaderErrorSubcode::BadMessageType,
            vec![header.msg_type.into()],
            "unsupported message type",
        ))?;
    let res = parse(&mut body, ctx)?;
    if !body.is_empty() {
        return Err(header.length_error("trailing octets in message body"))
    }
    Ok(res)
}

fn parse_open(body: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<Message, DocumentedError>
{
    OpenMessage::parse_body(body, ctx).map(Message::Open)
}

/// Parses an UPDATE, turning treat-as-withdraw into a session reset.
fn parse_update(body: &mut Cursor<'_>, ctx: &CodecContext<'_>)
    -> Result<Message, DocumentedError>
{
    let parsed = UpdateMessage::parse_body(body, ctx)?;
    if let Some(taw) = parsed.recoverable_error {
        // TODO: hand the routes of the UPDATE back as withdrawals and keep
        // the session instead of resetting it.
        warn!("escalating treat-as-withdraw to session reset: {}", taw);
        return Err(taw.into_documented())
    }
    Ok(Message::Update(parsed.update))
}

fn parse_notification(body: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<Message, DocumentedError>
{
    NotificationMessage::parse_body(body).map(Message::Notification)
}

fn parse_keepalive(body: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<Message, DocumentedError>
{
    KeepaliveMessage::parse_body(body).map(Message::Keepalive)
}

fn parse_route_refresh(body: &mut Cursor<'_>, _: &CodecContext<'_>)
    -> Result<Message, DocumentedError>
{
    RouteRefreshMessage::parse_body(body).map(Message::RouteRefresh)
}

fn compose_body(
    msg: &Message,
    ctx: &CodecContext<'_>,
    target: &mut BytesMut,
) -> Result<(), ComposeError> {
    match msg {
        Message::Open(m) => m.compose_body(ctx, target),
        Message::Update(m) => m.compose_body(ctx, target),
        Message::Notification(m) => {
            m.compose_body(target);
            Ok(())
        }
        Message::Keepalive(_) => Ok(()),
        Message::RouteRefresh(m) => {
            m.compose_body(target);
            Ok(())
        }
    }
}

/// Registers the five message types of RFC 4271 and RFC 2918.
pub fn register_defaults(registry: &mut MessageRegistry) {
    let parsers: [(MsgType, MessageParser); 5] = [
        (MsgType::Open, parse_open),
        (MsgType::Update, parse_update),
        (MsgType::Notification, parse_notification),
        (MsgType::Keepalive, parse_keepalive),
        (MsgType::RouteRefresh, parse_route_refresh),
    ];
    for (typ, parse) in parsers {
        if let Err(err) = registry.register(typ.into(), typ, parse, compose_body)
        {
            error!("failed to register BGP message type {}: {}", typ, err);
        }
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::error::ErrorCode;
    use crate::bgp::extensions::BgpExtensions;

    fn header(len: u16, typ: u8) -> Vec<u8> {
        let mut res = vec![0xff; 16];
        res.extend_from_slice(&len.to_be_bytes());
        res.push(typ);
        res
    }

    #[test]
    fn keepalive_frame() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);

        let buf = header(19, 4);
        assert_eq!(Message::peek_len(&buf), Some(19));
        assert_eq!(Message::peek_len(&buf[..18]), None);
        let msg = Message::from_octets(&buf, &ctx).unwrap();
        assert_eq!(msg, Message::Keepalive(KeepaliveMessage::new()));
        assert_eq!(msg.to_bytes(&ctx).unwrap().as_ref(), buf.as_slice());
    }

    #[test]
    fn header_errors() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);

        // Broken marker.
        let mut buf = header(19, 4);
        buf[3] = 0;
        let err = Message::from_octets(&buf, &ctx).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MessageHeader);
        assert_eq!(err.subcode(), 1);

        // Length below the header.
        let err = Message::from_octets(&header(18, 4), &ctx).unwrap_err();
        assert_eq!(err.subcode(), 2);
        assert_eq!(err.data(), &[0, 18]);

        // Length above the maximum.
        let err = Message::from_octets(&header(4097, 2), &ctx).unwrap_err();
        assert_eq!(err.subcode(), 2);
        assert_eq!(err.data(), &[0x10, 0x01]);

        // Unknown type.
        let mut buf = header(19, 9);
        let err = Message::from_octets(&buf, &ctx).unwrap_err();
        assert_eq!(err.subcode(), 3);
        assert_eq!(err.data(), &[9]);

        // OPEN shorter than its minimum.
        buf = header(28, 1);
        buf.extend_from_slice(&[0; 9]);
        let err = Message::from_octets(&buf, &ctx).unwrap_err();
        assert_eq!(err.subcode(), 2);
        assert_eq!(err.data(), &[0, 28]);

        // Length field beyond the octets at hand.
        let err = Message::from_octets(&header(23, 2), &ctx).unwrap_err();
        assert_eq!(err.subcode(), 2);
        assert_eq!(err.cause(), Some(ParseError::ShortInput));

        // Truncated header.
        let err = Message::from_octets(&[0xff; 10], &ctx).unwrap_err();
        assert_eq!(err.subcode(), 2);
    }

    #[test]
    fn extended_message_length() {
        let mut config = SessionConfig::modern();
        config.set_extended_message(true);
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);

        // A 5000 octet NOTIFICATION passes the header check.
        let mut buf = header(5000, 3);
        buf.extend_from_slice(&[6, 0]);
        buf.resize(5000, 0);
        let msg = Message::from_octets(&buf, &ctx).unwrap();
        assert_eq!(msg.msg_type(), MsgType::Notification);
    }

    #[test]
    fn trailing_octets() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);

        let mut buf = header(19, 4);
        buf.push(0);
        let err = Message::from_octets(&buf, &ctx).unwrap_err();
        assert_eq!(err.subcode(), 2);

        // Two messages back to back parse one after the other.
        let mut buf = header(19, 4);
        buf.extend_from_slice(&header(19, 4));
        let mut cursor = Cursor::new(&buf);
        Message::parse(&mut cursor, &ctx).unwrap();
        Message::parse(&mut cursor, &ctx).unwrap();
        assert!(cursor.is_empty());
    }

    #[test]
    fn empty_registry() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::new();
        let ctx = CodecContext::new(&config, &ext);
        let err = Message::from_octets(&header(19, 4), &ctx).unwrap_err();
        assert_eq!(err.subcode(), 3);
        assert!(matches!(
            Message::Keepalive(KeepaliveMessage::new()).to_bytes(&ctx),
            Err(ComposeError::Unregistered(_))
        ));
    }

    #[test]
    fn compose_too_long() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let msg = Message::from(NotificationMessage::new(
            ErrorCode::Cease, 0, vec![0; 5000]
        ));
        let mut target = BytesMut::new();
        assert!(msg.compose(&ctx, &mut target).is_err());
        assert!(target.is_empty());
    }
}
