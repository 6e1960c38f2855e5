use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::bgp::error::{
    DocumentedError, ErrorCode, HeaderErrorSubcode, OpenErrorSubcode,
    RouteRefreshErrorSubcode, UpdateErrorSubcode,
};
use crate::util::parser::Cursor;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// BGP NOTIFICATION message, variant of the [`Message`] enum.
///
/// [`Message`]: crate::bgp::message::Message
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NotificationMessage {
    code: ErrorCode,
    subcode: u8,
    data: Vec<u8>,
}

impl NotificationMessage {
    pub fn new(code: ErrorCode, subcode: u8, data: Vec<u8>) -> Self {
        NotificationMessage { code, subcode, data }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn subcode(&self) -> u8 {
        self.subcode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Parses a NOTIFICATION body.
    ///
    /// The header check guarantees the two octets of code and subcode, so
    /// this can only fail when called on a shorter cursor directly.
    pub fn parse_body(cursor: &mut Cursor<'_>)
        -> Result<Self, DocumentedError>
    {
        let short = |err| DocumentedError::header(
            HeaderErrorSubcode::BadMessageLength,
            Vec::new(),
            "NOTIFICATION without code and subcode",
        ).with_cause(err);
        let code = cursor.read_u8().map_err(short)?.into();
        let subcode = cursor.read_u8().map_err(short)?;
        let data = cursor.read_rest().to_vec();
        Ok(NotificationMessage { code, subcode, data })
    }

    pub fn compose_body(&self, target: &mut BytesMut) {
        target.put_u8(self.code.into());
        target.put_u8(self.subcode);
        target.put_slice(&self.data);
    }
}

impl From<DocumentedError> for NotificationMessage {
    fn from(err: DocumentedError) -> Self {
        NotificationMessage::from(&err)
    }
}

impl From<&DocumentedError> for NotificationMessage {
    fn from(err: &DocumentedError) -> Self {
        NotificationMessage {
            code: err.code(),
            subcode: err.subcode(),
            data: err.data().to_vec(),
        }
    }
}

impl fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code)?;
        match self.code {
            ErrorCode::MessageHeader => {
                write!(f, "/{}", HeaderErrorSubcode::from(self.subcode))
            }
            ErrorCode::OpenMessage if self.subcode != 0 => {
                write!(f, "/{}", OpenErrorSubcode::from(self.subcode))
            }
            ErrorCode::UpdateMessage if self.subcode != 0 => {
                write!(f, "/{}", UpdateErrorSubcode::from(self.subcode))
            }
            ErrorCode::RouteRefreshMessage => {
                write!(f, "/{}", RouteRefreshErrorSubcode::from(self.subcode))
            }
            _ => write!(f, "/{}", self.subcode)
        }
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::extensions::{BgpExtensions, CodecContext};
    use crate::bgp::message::{Message, SessionConfig};

    #[test]
    fn parse_and_compose() {
        let buf = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0x00, 0x17, 0x03, 0x02, 0x02, 0xfd, 0xe8,
        ];
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let msg = match Message::from_octets(&buf, &ctx).unwrap() {
            Message::Notification(msg) => msg,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(msg.code(), ErrorCode::OpenMessage);
        assert_eq!(msg.subcode(), 2);
        assert_eq!(msg.data(), &[0xfd, 0xe8]);
        assert_eq!(msg.to_string(), "OpenMessage/BadPeerAs");
        assert_eq!(
            Message::from(msg).to_bytes(&ctx).unwrap().as_ref(), &buf[..]
        );
    }

    #[test]
    fn truncated_notification() {
        let buf = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0x00, 0x17, 0x06, 0x02, 0x01, 0x02, 0x03,
        ];
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        assert!(Message::from_octets(&buf, &ctx).is_ok());
        for len in 0..buf.len() {
            assert!(Message::from_octets(&buf[..len], &ctx).is_err());
        }
        assert!(NotificationMessage::parse_body(&mut Cursor::new(&[6]))
            .is_err());
    }

    #[test]
    fn from_documented() {
        let err = DocumentedError::update(
            UpdateErrorSubcode::MissingWellknownAttribute,
            vec![3],
            "missing NEXT_HOP",
        );
        let msg = NotificationMessage::from(err);
        assert_eq!(msg.code(), ErrorCode::UpdateMessage);
        assert_eq!(msg.subcode(), 3);
        assert_eq!(msg.data(), &[3]);

        let cease = NotificationMessage::new(ErrorCode::Cease, 4, Vec::new());
        assert_eq!(cease.to_string(), "Cease/4");
    }
}
