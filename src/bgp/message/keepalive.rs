use crate::bgp::error::{DocumentedError, HeaderErrorSubcode};
use crate::bgp::message::HEADER_LEN;
use crate::util::parser::Cursor;

/// BGP KEEPALIVE message, variant of the [`Message`] enum.
///
/// It consists of the header only.
///
/// [`Message`]: crate::bgp::message::Message
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KeepaliveMessage;

impl KeepaliveMessage {
    pub fn new() -> Self {
        KeepaliveMessage
    }

    /// Checks that the body is empty.
    pub fn parse_body(cursor: &mut Cursor<'_>)
        -> Result<Self, DocumentedError>
    {
        if !cursor.is_empty() {
            let len = (HEADER_LEN + cursor.remaining()) as u16;
            return Err(DocumentedError::header(
                HeaderErrorSubcode::BadMessageLength,
                len.to_be_bytes().to_vec(),
                "KEEPALIVE of more than 19 octets",
            ))
        }
        Ok(KeepaliveMessage)
    }
}

//--- Tests ------------------------------------------------------------------
