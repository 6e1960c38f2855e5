//! UPDATE messages and the session state needed to parse them.
//!
//! Some information needed to decode an UPDATE is not contained in it but
//! was negotiated in the OPEN messages when the session came up: whether
//! ASNs are four octets wide and for which address families NLRI carry a
//! Path Identifier. This is kept in the [`SessionConfig`].

use std::collections::BTreeSet;

use bytes::{BufMut, BytesMut};

use crate::bgp::error::{DocumentedError, TreatAsWithdraw, UpdateErrorSubcode};
use crate::bgp::extensions::CodecContext;
use crate::bgp::message::{MAX_EXTENDED_LEN, MAX_LEN};
use crate::bgp::message::open::{CapabilityType, OpenMessage};
use crate::bgp::nlri::{
    compose_prefix_list, parse_prefix_list, Nlris, PrefixNlri
};
use crate::bgp::path_attributes::{
    parse_attributes, MpUnreachNlri, ParsedAttributes, PathAttribute,
    PathAttributeSet, PathAttributeType,
};
use crate::bgp::types::{AfiSafi, AFI, SAFI};
use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

//------------ SessionConfig -------------------------------------------------

/// Configuration parameters for an established BGP session.
///
/// The `SessionConfig` is a structure holding parameters to parse messages
/// for the particular session. Storing these parameters is necessary because
/// some information crucial to correctly parsing BGP UPDATE messages is not
/// available in the UPDATE messages themselves, but are only exchanged in the
/// BGP OPEN messages when the session was established.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct SessionConfig {
    four_octet_asn: bool,
    add_path: BTreeSet<AfiSafi>,
    revised_error_handling: bool,
    extended_message: bool,
}

impl SessionConfig {
    /// Four octet ASNs and RFC 7606 error handling, nothing else.
    pub fn modern() -> Self {
        SessionConfig {
            four_octet_asn: true,
            add_path: BTreeSet::new(),
            revised_error_handling: true,
            extended_message: false,
        }
    }

    /// Plain RFC 4271.
    pub fn legacy() -> Self {
        SessionConfig {
            four_octet_asn: false,
            add_path: BTreeSet::new(),
            revised_error_handling: false,
            extended_message: false,
        }
    }

    /// Derives the configuration from the OPEN messages exchanged.
    ///
    /// Path Identifiers are expected for a family if we said we can
    /// receive them and the peer said it will send them.
    pub fn negotiate(local: &OpenMessage, remote: &OpenMessage) -> Self {
        let mut res = Self::modern();
        res.four_octet_asn = local.four_octet_asn().is_some()
            && remote.four_octet_asn().is_some();
        res.extended_message =
            local.has_capability(CapabilityType::ExtendedMessage)
            && remote.has_capability(CapabilityType::ExtendedMessage);
        for theirs in remote.add_path_families() {
            if !theirs.direction().can_send() {
                continue
            }
            let receiving = local.add_path_families().any(|ours| {
                ours.afi() == theirs.afi() && ours.safi() == theirs.safi()
                    && ours.direction().can_receive()
            });
            if !receiving {
                continue
            }
            if let Ok(family) = AfiSafi::try_from(
                (theirs.afi(), theirs.safi())
            ) {
                res.add_path.insert(family);
            }
        }
        res
    }

    pub fn with_add_path(mut self, family: AfiSafi) -> Self {
        self.add_path.insert(family);
        self
    }

    pub fn four_octet_asn(&self) -> bool {
        self.four_octet_asn
    }

    pub fn set_four_octet_asn(&mut self, value: bool) {
        self.four_octet_asn = value
    }

    pub fn enable_add_path(&mut self, family: AfiSafi) {
        self.add_path.insert(family);
    }

    pub fn disable_add_path(&mut self, family: AfiSafi) {
        self.add_path.remove(&family);
    }

    /// Returns whether NLRI of the family carry Path Identifiers.
    pub fn add_path_for(&self, afi: AFI, safi: SAFI) -> bool {
        match AfiSafi::try_from((afi, safi)) {
            Ok(family) => self.add_path.contains(&family),
            Err(_) => false,
        }
    }

    pub fn add_path_families(&self) -> impl Iterator<Item = AfiSafi> + '_ {
        self.add_path.iter().copied()
    }

    /// Returns whether RFC 7606 revised error handling is enabled.
    ///
    /// If not, every malformed attribute is session-fatal.
    pub fn revised_error_handling(&self) -> bool {
        self.revised_error_handling
    }

    pub fn set_revised_error_handling(&mut self, value: bool) {
        self.revised_error_handling = value
    }

    pub fn extended_message(&self) -> bool {
        self.extended_message
    }

    pub fn set_extended_message(&mut self, value: bool) {
        self.extended_message = value
    }

    /// Returns the largest acceptable message length.
    pub fn max_message_len(&self) -> usize {
        if self.extended_message {
            MAX_EXTENDED_LEN
        } else {
            MAX_LEN
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::modern()
    }
}

//------------ UpdateMessage -------------------------------------------------

/// A BGP UPDATE message.
///
/// The withdrawn routes and NLRI sections only ever carry IPv4 unicast
/// prefixes, all other families travel in MP_REACH_NLRI and
/// MP_UNREACH_NLRI.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UpdateMessage {
    withdrawn: Vec<PrefixNlri>,
    attributes: PathAttributeSet,
    nlri: Vec<PrefixNlri>,
}

/// The outcome of parsing an UPDATE body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedUpdate {
    pub update: UpdateMessage,

    /// Set if the routes of the update are to be treated as withdrawn.
    pub recoverable_error: Option<TreatAsWithdraw>,
}

impl UpdateMessage {
    pub fn new(
        withdrawn: Vec<PrefixNlri>,
        attributes: PathAttributeSet,
        nlri: Vec<PrefixNlri>,
    ) -> Self {
        UpdateMessage { withdrawn, attributes, nlri }
    }

    /// Creates the End-of-RIB marker of RFC 4724 for a family.
    pub fn new_end_of_rib(afi: AFI, safi: SAFI) -> Self {
        let mut res = Self::default();
        if (afi, safi) != (AFI::Ipv4, SAFI::Unicast) {
            res.attributes.insert(PathAttribute::MpUnreachNlri(
                MpUnreachNlri::new(afi, safi, Nlris::Opaque(Vec::new()))
            ));
        }
        res
    }

    pub fn withdrawn(&self) -> &[PrefixNlri] {
        &self.withdrawn
    }

    pub fn attributes(&self) -> &PathAttributeSet {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut PathAttributeSet {
        &mut self.attributes
    }

    pub fn nlri(&self) -> &[PrefixNlri] {
        &self.nlri
    }

    /// Returns the family if this is an End-of-RIB marker.
    pub fn end_of_rib(&self) -> Option<(AFI, SAFI)> {
        if !self.withdrawn.is_empty() || !self.nlri.is_empty() {
            return None
        }
        if self.attributes.is_empty() {
            return Some((AFI::Ipv4, SAFI::Unicast))
        }
        match self.attributes.mp_unreach() {
            Some(unreach) if self.attributes.len() == 1
                && unreach.withdrawn().is_empty() =>
            {
                Some((unreach.afi(), unreach.safi()))
            }
            _ => None
        }
    }

    /// Returns whether any route is announced, in any family.
    pub fn has_announcements(&self) -> bool {
        !self.nlri.is_empty()
            || self.attributes.mp_reach()
                .map(|r| !r.nlri().is_empty())
                .unwrap_or(false)
    }

    /// Parses an UPDATE body.
    ///
    /// Session-fatal problems are returned as errors. A treat-as-withdraw
    /// condition is returned alongside the message and it is up to the
    /// caller what to do with it.
    pub fn parse_body(
        cursor: &mut Cursor<'_>,
        ctx: &CodecContext<'_>,
    ) -> Result<ParsedUpdate, DocumentedError> {
        let add_path = ctx.config.add_path_for(AFI::Ipv4, SAFI::Unicast);

        let withdrawn_len = cursor.read_u16().map_err(malformed_lengths)?;
        let withdrawn = cursor.slice(withdrawn_len.into())
            .map_err(malformed_lengths)?;
        let withdrawn = parse_prefix_list(withdrawn, AFI::Ipv4, add_path)
            .map_err(invalid_network)?;

        let attr_len = cursor.read_u16().map_err(malformed_lengths)?;
        let attributes = cursor.slice(attr_len.into())
            .map_err(malformed_lengths)?;
        let ParsedAttributes { attrs, recoverable_error } =
            parse_attributes(attributes, ctx)?;

        let nlri = Cursor::new(cursor.read_rest());
        let nlri = parse_prefix_list(nlri, AFI::Ipv4, add_path)
            .map_err(invalid_network)?;

        let update = UpdateMessage { withdrawn, attributes: attrs, nlri };
        if withdrawn_len == 0 && attr_len == 0 && update.nlri.is_empty() {
            return Ok(ParsedUpdate { update, recoverable_error: None })
        }

        let recoverable_error = match recoverable_error {
            Some(taw) => Some(taw),
            None => update.check_mandatory().err(),
        };
        Ok(ParsedUpdate { update, recoverable_error })
    }

    /// Checks for the well-known mandatory attributes.
    ///
    /// NLRI need a NEXT_HOP, and any announcement needs ORIGIN and AS_PATH.
    /// The data of the error is the type code of the first one missing.
    pub fn check_mandatory(&self) -> Result<(), TreatAsWithdraw> {
        let mut required = Vec::with_capacity(3);
        if self.has_announcements() {
            required.push(PathAttributeType::Origin);
            required.push(PathAttributeType::AsPath);
        }
        if !self.nlri.is_empty() {
            required.push(PathAttributeType::NextHop);
        }
        match required.into_iter().find(|t| !self.attributes.contains(*t)) {
            Some(missing) => Err(TreatAsWithdraw::new(
                UpdateErrorSubcode::MissingWellknownAttribute,
                vec![missing.into()],
                "missing well-known attribute",
            )),
            None => Ok(())
        }
    }

    /// Writes the UPDATE body.
    pub fn compose_body(
        &self,
        ctx: &CodecContext<'_>,
        target: &mut BytesMut,
    ) -> Result<(), ComposeError> {
        let add_path = ctx.config.add_path_for(AFI::Ipv4, SAFI::Unicast);
        if self.withdrawn.iter().chain(self.nlri.iter())
            .any(|n| n.path_id().is_some() != add_path)
        {
            return Err(ComposeError::InvalidValue(
                "path identifiers do not match the session"
            ))
        }

        let pos = target.len();
        target.put_u16(0);
        compose_prefix_list(&self.withdrawn, target);
        patch_len(target, pos, "withdrawn routes")?;

        let pos = target.len();
        target.put_u16(0);
        self.attributes.compose(ctx, target)?;
        patch_len(target, pos, "path attributes")?;

        compose_prefix_list(&self.nlri, target);
        Ok(())
    }
}

fn patch_len(
    target: &mut BytesMut,
    pos: usize,
    what: &'static str,
) -> Result<(), ComposeError> {
    let len = target.len() - pos - 2;
    let field = u16::try_from(len).map_err(|_| {
        ComposeError::TooLong { what, len }
    })?;
    target[pos..pos + 2].copy_from_slice(&field.to_be_bytes());
    Ok(())
}

fn malformed_lengths(err: ParseError) -> DocumentedError {
    DocumentedError::update(
        UpdateErrorSubcode::MalformedAttributeList,
        Vec::new(),
        "section lengths exceed the UPDATE message",
    ).with_cause(err)
}

fn invalid_network(err: ParseError) -> DocumentedError {
    DocumentedError::update(
        UpdateErrorSubcode::InvalidNetworkField,
        Vec::new(),
        "invalid prefix",
    ).with_cause(err)
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use inetnum::addr::Prefix;
    use crate::bgp::error::ErrorCode;
    use crate::bgp::extensions::BgpExtensions;
    use crate::bgp::message::Message;
    use crate::bgp::types::PathId;

    // ORIGIN IGP, AS_PATH 65000, NEXT_HOP 10.0.0.1
    const ATTRS: [u8; 20] = [
        0x40, 0x01, 0x01, 0x00,
        0x40, 0x02, 0x06, 0x02, 0x01, 0x00, 0x00, 0xfd, 0xe8,
        0x40, 0x03, 0x04, 0x0a, 0x00, 0x00, 0x01,
    ];

    // 192.0.2.0/24, 10.1.0.0/16
    const NLRI: [u8; 7] = [0x18, 0xc0, 0x00, 0x02, 0x10, 0x0a, 0x01];

    fn message(body: &[u8]) -> Vec<u8> {
        let mut res = vec![0xff; 16];
        res.extend_from_slice(&((body.len() + 19) as u16).to_be_bytes());
        res.push(2);
        res.extend_from_slice(body);
        res
    }

    fn body(withdrawn: &[u8], attrs: &[u8], nlri: &[u8]) -> Vec<u8> {
        let mut res = Vec::new();
        res.extend_from_slice(&(withdrawn.len() as u16).to_be_bytes());
        res.extend_from_slice(withdrawn);
        res.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        res.extend_from_slice(attrs);
        res.extend_from_slice(nlri);
        res
    }

    fn parse_body(buf: &[u8], config: &SessionConfig)
        -> Result<ParsedUpdate, DocumentedError>
    {
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(config, &ext);
        UpdateMessage::parse_body(&mut Cursor::new(buf), &ctx)
    }

    #[test]
    fn announcement() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let buf = message(&body(&[], &ATTRS, &NLRI));
        assert_eq!(buf.len(), 50);

        let update = match Message::from_octets(&buf, &ctx).unwrap() {
            Message::Update(update) => update,
            other => panic!("unexpected {:?}", other),
        };
        assert!(update.withdrawn().is_empty());
        assert_eq!(update.nlri().len(), 2);
        assert_eq!(
            update.nlri()[0].prefix(),
            "192.0.2.0/24".parse::<Prefix>().unwrap()
        );
        assert_eq!(
            update.attributes().next_hop(), Some(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(update.end_of_rib(), None);
        assert!(update.has_announcements());

        let composed = Message::Update(update).to_bytes(&ctx).unwrap();
        assert_eq!(composed.as_ref(), buf.as_slice());
    }

    #[test]
    fn missing_next_hop() {
        let buf = body(&[], &ATTRS[..13], &NLRI);
        let parsed = parse_body(&buf, &SessionConfig::modern()).unwrap();
        let taw = parsed.recoverable_error.unwrap();
        assert_eq!(
            taw.subcode(), UpdateErrorSubcode::MissingWellknownAttribute
        );
        assert_eq!(taw.data(), &[3]);

        // The registered parser resets the session instead.
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let err = Message::from_octets(&message(&buf), &ctx).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpdateMessage);
        assert_eq!(err.subcode(), 3);
        assert_eq!(err.data(), &[3]);
    }

    #[test]
    fn missing_origin_for_mp_reach() {
        let attrs = [
            // AS_PATH 65000
            0x40, 0x02, 0x06, 0x02, 0x01, 0x00, 0x00, 0xfd, 0xe8,
            // MP_REACH_NLRI IPv6 unicast, 2001:db8::1, 2001:db8::/32
            0x80, 0x0e, 0x1a, 0x00, 0x02, 0x01, 0x10,
            0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            0x00, 0x20, 0x20, 0x01, 0x0d, 0xb8,
        ];
        let parsed = parse_body(
            &body(&[], &attrs, &[]), &SessionConfig::modern()
        ).unwrap();
        assert!(parsed.update.has_announcements());
        assert_eq!(parsed.recoverable_error.unwrap().data(), &[1]);
    }

    #[test]
    fn end_of_rib() {
        let parsed = parse_body(&[0, 0, 0, 0], &SessionConfig::modern())
            .unwrap();
        assert!(parsed.recoverable_error.is_none());
        assert_eq!(
            parsed.update.end_of_rib(), Some((AFI::Ipv4, SAFI::Unicast))
        );

        let buf = body(&[], &[0x80, 0x0f, 0x03, 0x00, 0x02, 0x01], &[]);
        let parsed = parse_body(&buf, &SessionConfig::modern()).unwrap();
        assert!(parsed.recoverable_error.is_none());
        assert_eq!(
            parsed.update.end_of_rib(), Some((AFI::Ipv6, SAFI::Unicast))
        );

        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let mut target = BytesMut::new();
        UpdateMessage::new_end_of_rib(AFI::Ipv6, SAFI::Unicast)
            .compose_body(&ctx, &mut target).unwrap();
        assert_eq!(target.as_ref(), buf.as_slice());
    }

    #[test]
    fn nlri_without_attributes() {
        let buf = [0, 0, 0, 0, 0x18, 0xc0, 0x00, 0x02];
        let parsed = parse_body(&buf, &SessionConfig::modern()).unwrap();
        assert_eq!(parsed.update.nlri().len(), 1);
        assert_eq!(parsed.update.end_of_rib(), None);
        let taw = parsed.recoverable_error.unwrap();
        assert_eq!(
            taw.subcode(), UpdateErrorSubcode::MissingWellknownAttribute
        );
        assert_eq!(taw.data(), &[1]);

        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let err = Message::from_octets(&message(&buf), &ctx).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpdateMessage);
        assert_eq!(err.subcode(), 3);
    }

    #[test]
    fn withdrawals_only() {
        let buf = body(&[0x18, 0xc0, 0x00, 0x02], &[], &[]);
        let parsed = parse_body(&buf, &SessionConfig::modern()).unwrap();
        assert!(parsed.recoverable_error.is_none());
        assert_eq!(parsed.update.withdrawn().len(), 1);
        assert_eq!(parsed.update.end_of_rib(), None);
    }

    #[test]
    fn add_path() {
        let config = SessionConfig::modern()
            .with_add_path(AfiSafi::Ipv4Unicast);
        let withdrawn = [0x00, 0x00, 0x00, 0x07, 0x18, 0xc0, 0x00, 0x02];
        let buf = body(&withdrawn, &[], &[]);
        let parsed = parse_body(&buf, &config).unwrap();
        let nlri = parsed.update.withdrawn()[0];
        assert_eq!(nlri.path_id(), Some(PathId::from_u32(7)));

        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let mut target = BytesMut::new();
        parsed.update.compose_body(&ctx, &mut target).unwrap();
        assert_eq!(target.as_ref(), buf.as_slice());

        // Without Add-Path the same octets are garbage.
        assert!(parse_body(&buf, &SessionConfig::modern()).is_err());

        // Path Identifiers have to match the session when composing.
        let modern = SessionConfig::modern();
        let ctx = CodecContext::new(&modern, &ext);
        assert!(parsed.update.compose_body(&ctx, &mut target).is_err());
    }

    #[test]
    fn malformed_sections() {
        // Withdrawn routes length beyond the body.
        let err = parse_body(&[0x00, 0x09, 0x18, 0xc0, 0x00, 0x02],
            &SessionConfig::modern()
        ).unwrap_err();
        assert_eq!(err.subcode(), 1);

        // Attribute length beyond the body.
        let err = parse_body(&[0x00, 0x00, 0x00, 0x05, 0x40, 0x01],
            &SessionConfig::modern()
        ).unwrap_err();
        assert_eq!(err.subcode(), 1);

        // A /33 in the NLRI.
        let err = parse_body(&body(&[], &ATTRS, &[0x21, 0, 0, 0, 0, 0]),
            &SessionConfig::modern()
        ).unwrap_err();
        assert_eq!(err.subcode(), 10);
    }

    #[test]
    fn truncated_messages() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let buf = message(&body(&[], &ATTRS, &NLRI));
        for len in 0..buf.len() {
            assert!(Message::from_octets(&buf[..len], &ctx).is_err());
        }
        // Cutting the body and fixing up the length must not panic.
        for len in 0..buf.len() - 19 {
            let _ = Message::from_octets(&message(&buf[19..19 + len]), &ctx);
        }
    }

    #[test]
    fn negotiate() {
        use crate::bgp::message::open::{
            AddPathDirection, AddPathFamily, Capability
        };
        use inetnum::asn::Asn;

        let caps = |dir| vec![
            Capability::FourOctetAsn(Asn::from_u32(65000)),
            Capability::AddPath(vec![AddPathFamily::new(
                AFI::Ipv4, SAFI::Unicast, dir
            )]),
        ];
        let local = OpenMessage::new(
            Asn::from_u32(65000), 180, Ipv4Addr::new(10, 0, 0, 1),
            caps(AddPathDirection::Receive),
        );
        let remote = OpenMessage::new(
            Asn::from_u32(65001), 90, Ipv4Addr::new(10, 0, 0, 2),
            caps(AddPathDirection::SendReceive),
        );
        let config = SessionConfig::negotiate(&local, &remote);
        assert!(config.four_octet_asn());
        assert!(config.add_path_for(AFI::Ipv4, SAFI::Unicast));
        assert!(!config.extended_message());

        // We only send, so nothing to expect.
        let local = OpenMessage::new(
            Asn::from_u32(65000), 180, Ipv4Addr::new(10, 0, 0, 1),
            caps(AddPathDirection::Send),
        );
        let config = SessionConfig::negotiate(&local, &remote);
        assert!(!config.add_path_for(AFI::Ipv4, SAFI::Unicast));
    }

    #[test]
    #[cfg(feature = "serde")]
    fn serde_session_config() {
        use serde_test::{assert_tokens, Token};

        let config = SessionConfig::modern()
            .with_add_path(AfiSafi::Ipv4Unicast);
        assert_tokens(&config, &[
            Token::Struct { name: "SessionConfig", len: 4 },
            Token::Str("four_octet_asn"),
            Token::Bool(true),
            Token::Str("add_path"),
            Token::Seq { len: Some(1) },
            Token::UnitVariant { name: "AfiSafi", variant: "Ipv4Unicast" },
            Token::SeqEnd,
            Token::Str("revised_error_handling"),
            Token::Bool(true),
            Token::Str("extended_message"),
            Token::Bool(false),
            Token::StructEnd,
        ]);
    }
}
