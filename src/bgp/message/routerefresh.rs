use bytes::{BufMut, BytesMut};

use crate::bgp::error::{
    DocumentedError, ErrorCode, RouteRefreshErrorSubcode
};
use crate::bgp::message::{MARKER, HEADER_LEN};
use crate::bgp::types::{AFI, SAFI};
use crate::typeenum; // from util::macros
use crate::util::parser::Cursor;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

typeenum!(
/// Message subtypes of enhanced route refresh, RFC 7313.
    RouteRefreshSubtype, u8,
    0 => Normal,
    1 => BeginRouteRefresh,
    2 => EndRouteRefresh,
);

/// BGP ROUTE-REFRESH message, RFC 2918 and RFC 7313.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteRefreshMessage {
    afi: AFI,
    subtype: RouteRefreshSubtype,
    safi: SAFI,
}

impl RouteRefreshMessage {
    pub fn new(afi: AFI, safi: SAFI) -> Self {
        RouteRefreshMessage {
            afi, subtype: RouteRefreshSubtype::Normal, safi
        }
    }

    pub fn with_subtype(mut self, subtype: RouteRefreshSubtype) -> Self {
        self.subtype = subtype;
        self
    }

    pub fn afi(&self) -> AFI {
        self.afi
    }

    pub fn safi(&self) -> SAFI {
        self.safi
    }

    pub fn subtype(&self) -> RouteRefreshSubtype {
        self.subtype
    }

    /// Parses a ROUTE-REFRESH body.
    ///
    /// The body is exactly four octets. Anything else is the invalid
    /// message length error of RFC 7313 carrying the whole message.
    pub fn parse_body(cursor: &mut Cursor<'_>)
        -> Result<Self, DocumentedError>
    {
        if cursor.remaining() != 4 {
            let body = cursor.read_rest();
            let mut data = Vec::with_capacity(HEADER_LEN + body.len());
            data.extend_from_slice(&MARKER);
            data.extend_from_slice(
                &((HEADER_LEN + body.len()) as u16).to_be_bytes()
            );
            data.push(5);
            data.extend_from_slice(body);
            return Err(DocumentedError::new(
                ErrorCode::RouteRefreshMessage,
                RouteRefreshErrorSubcode::InvalidMessageLength.into(),
                data,
                "ROUTE-REFRESH body is not four octets",
            ))
        }
        let [afi_hi, afi_lo, subtype, safi] = cursor.read_array::<4>()
            .map_err(|err| DocumentedError::new(
                ErrorCode::RouteRefreshMessage,
                RouteRefreshErrorSubcode::InvalidMessageLength.into(),
                Vec::new(),
                "short ROUTE-REFRESH",
            ).with_cause(err))?;
        Ok(RouteRefreshMessage {
            afi: u16::from_be_bytes([afi_hi, afi_lo]).into(),
            subtype: subtype.into(),
            safi: safi.into(),
        })
    }

    pub fn compose_body(&self, target: &mut BytesMut) {
        target.put_u16(self.afi.into());
        target.put_u8(self.subtype.into());
        target.put_u8(self.safi.into());
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::extensions::{BgpExtensions, CodecContext};
    use crate::bgp::message::{Message, SessionConfig};

    fn message(body: &[u8]) -> Vec<u8> {
        let mut res = vec![0xff; 16];
        res.extend_from_slice(&((body.len() + 19) as u16).to_be_bytes());
        res.push(5);
        res.extend_from_slice(body);
        res
    }

    #[test]
    fn route_refresh() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);

        let buf = message(&[0x00, 0x02, 0x01, 0x01]);
        let msg = match Message::from_octets(&buf, &ctx).unwrap() {
            Message::RouteRefresh(msg) => msg,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            msg,
            RouteRefreshMessage::new(AFI::Ipv6, SAFI::Unicast)
                .with_subtype(RouteRefreshSubtype::BeginRouteRefresh)
        );
        assert_eq!(
            Message::RouteRefresh(msg).to_bytes(&ctx).unwrap().as_ref(),
            buf.as_slice()
        );
    }

    #[test]
    fn truncated_route_refresh() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let buf = message(&[0x00, 0x01, 0x00, 0x01]);
        for len in 0..buf.len() {
            assert!(Message::from_octets(&buf[..len], &ctx).is_err());
        }
        for len in 0..4 {
            let err = RouteRefreshMessage::parse_body(
                &mut Cursor::new(&buf[19..19 + len])
            ).unwrap_err();
            assert_eq!(err.code(), ErrorCode::RouteRefreshMessage);
        }
    }

    #[test]
    fn bad_length() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);

        let buf = message(&[0x00, 0x01, 0x00, 0x01, 0x00]);
        let err = Message::from_octets(&buf, &ctx).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RouteRefreshMessage);
        assert_eq!(err.subcode(), 1);
        assert_eq!(err.data(), buf.as_slice());
    }
}
