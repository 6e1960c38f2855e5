//! OPEN messages and capabilities.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+
//!  |    Version    |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |     My Autonomous System      |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |           Hold Time           |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                         BGP Identifier                        |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  | Opt Parm Len  |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |             Optional Parameters (variable)                    |
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The only optional parameter in use is the Capabilities parameter of
//! RFC 5492, which holds one or more capability TLVs.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use inetnum::asn::Asn;
use log::error;

use crate::bgp::aspath::AS_TRANS;
use crate::bgp::error::{DocumentedError, ErrorCode, OpenErrorSubcode};
use crate::bgp::extensions::CodecContext;
use crate::bgp::types::{AFI, SAFI};
use crate::tlv::{
    compose_all, compose_tlv, parse_all, parse_tlv, TlvFormat, TlvParser,
    TlvComposer, TlvRegistry, TlvValue, UnknownTlv, Unrecognized,
};
use crate::typeenum; // from util::macros
use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// The optional parameter type carrying capabilities.
const CAPABILITIES_PARAM: u16 = 2;

//------------ OpenMessage ---------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct OpenMessage {
    version: u8,
    my_as: u16,
    hold_time: u16,
    bgp_id: Ipv4Addr,
    capabilities: Vec<Capability>,
}

impl OpenMessage {
    pub const VERSION: u8 = 4;

    /// Creates a version 4 OPEN.
    ///
    /// ASNs that do not fit into the two octet field are replaced by
    /// AS_TRANS there. The real one needs to be in a four octet ASN
    /// capability which is not added automatically.
    pub fn new(
        asn: Asn,
        hold_time: u16,
        bgp_id: Ipv4Addr,
        capabilities: Vec<Capability>,
    ) -> Self {
        OpenMessage {
            version: Self::VERSION,
            my_as: u16::try_from(asn.into_u32()).unwrap_or(AS_TRANS),
            hold_time,
            bgp_id,
            capabilities,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the content of the two octet My Autonomous System field.
    pub fn my_as(&self) -> u16 {
        self.my_as
    }

    /// Returns the ASN of the speaker, taking RFC 6793 into account.
    pub fn asn(&self) -> Asn {
        self.four_octet_asn()
            .unwrap_or_else(|| Asn::from_u32(self.my_as.into()))
    }

    pub fn hold_time(&self) -> u16 {
        self.hold_time
    }

    pub fn bgp_id(&self) -> Ipv4Addr {
        self.bgp_id
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn add_capability(&mut self, cap: Capability) {
        self.capabilities.push(cap)
    }

    pub fn has_capability(&self, typ: CapabilityType) -> bool {
        self.capabilities.iter().any(|c| c.tag() == typ)
    }

    /// Returns the ASN from the four octet ASN capability, if present.
    pub fn four_octet_asn(&self) -> Option<Asn> {
        self.capabilities.iter().find_map(|c| match c {
            Capability::FourOctetAsn(asn) => Some(*asn),
            _ => None
        })
    }

    /// Returns the families from all multiprotocol capabilities.
    pub fn multiprotocol(&self) -> impl Iterator<Item = (AFI, SAFI)> + '_ {
        self.capabilities.iter().filter_map(|c| match c {
            Capability::MultiProtocol(afi, safi) => Some((*afi, *safi)),
            _ => None
        })
    }

    pub fn add_path_families(
        &self
    ) -> impl Iterator<Item = &AddPathFamily> + '_ {
        self.capabilities.iter().filter_map(|c| match c {
            Capability::AddPath(families) => Some(families.iter()),
            _ => None
        }).flatten()
    }

    /// Parses an OPEN body.
    pub fn parse_body(
        cursor: &mut Cursor<'_>,
        ctx: &CodecContext<'_>,
    ) -> Result<Self, DocumentedError> {
        let version = cursor.read_u8().map_err(malformed)?;
        let my_as = cursor.read_u16().map_err(malformed)?;
        let hold_time = cursor.read_u16().map_err(malformed)?;
        let bgp_id = cursor.read_ipv4().map_err(malformed)?;
        let param_len = cursor.read_u8().map_err(malformed)?;

        if version != Self::VERSION {
            return Err(DocumentedError::open(
                OpenErrorSubcode::UnsupportedVersionNumber,
                u16::from(Self::VERSION).to_be_bytes().to_vec(),
                "unsupported BGP version",
            ))
        }
        if hold_time == 1 || hold_time == 2 {
            return Err(DocumentedError::open(
                OpenErrorSubcode::UnacceptableHoldTime,
                Vec::new(),
                "hold time below three seconds",
            ))
        }
        if bgp_id.is_unspecified() {
            return Err(DocumentedError::open(
                OpenErrorSubcode::BadBgpIdentifier,
                Vec::new(),
                "BGP identifier is zero",
            ))
        }

        let mut params = cursor.slice(param_len.into()).map_err(malformed)?;
        let mut capabilities = Vec::new();
        while !params.is_empty() {
            let (typ, value) = parse_tlv(&mut params, TlvFormat::NARROW)
                .map_err(malformed)?;
            if typ != CAPABILITIES_PARAM {
                return Err(DocumentedError::open(
                    OpenErrorSubcode::UnsupportedOptionalParameter,
                    Vec::new(),
                    "unsupported optional parameter",
                ))
            }
            capabilities.extend(parse_all(
                value,
                TlvFormat::NARROW,
                ctx.extensions.capabilities(),
                Unrecognized::Keep,
            ).map_err(malformed)?);
        }

        Ok(OpenMessage { version, my_as, hold_time, bgp_id, capabilities })
    }

    /// Writes the OPEN body with all capabilities in one parameter.
    ///
    /// An OPEN received with one capability per optional parameter is
    /// therefore not reproduced octet for octet. The capabilities and their
    /// order are kept.
    pub fn compose_body(
        &self,
        ctx: &CodecContext<'_>,
        target: &mut BytesMut,
    ) -> Result<(), ComposeError> {
        target.put_u8(self.version);
        target.put_u16(self.my_as);
        target.put_u16(self.hold_time);
        target.put_slice(&self.bgp_id.octets());
        let len_pos = target.len();
        target.put_u8(0);
        if !self.capabilities.is_empty() {
            compose_tlv(target, TlvFormat::NARROW, CAPABILITIES_PARAM, |t| {
                compose_all(
                    &self.capabilities,
                    TlvFormat::NARROW,
                    ctx.extensions.capabilities(),
                    t,
                )
            })?;
        }
        let len = target.len() - len_pos - 1;
        target[len_pos] = u8::try_from(len).map_err(|_| {
            ComposeError::TooLong { what: "optional parameters", len }
        })?;
        Ok(())
    }
}

impl fmt::Display for OpenMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "OPEN v{} {} hold {} id {}",
            self.version, self.asn(), self.hold_time, self.bgp_id
        )
    }
}

fn malformed(err: ParseError) -> DocumentedError {
    // RFC 4271 has no subcode for this, 0 is the unspecific one.
    DocumentedError::new(
        ErrorCode::OpenMessage, 0, Vec::new(), "malformed optional parameters"
    ).with_cause(err)
}

//------------ Capabilities --------------------------------------------------

typeenum!(
/// BGP Capability codes, RFC 5492.
    CapabilityType, u8,
    1 => MultiProtocol,
    2 => RouteRefresh,
    6 => ExtendedMessage,
    65 => FourOctetAsn,
    69 => AddPath,
    70 => EnhancedRouteRefresh,
);

typeenum!(
/// Send/receive values of the Add-Path capability, RFC 7911.
    AddPathDirection, u8,
    1 => Receive,
    2 => Send,
    3 => SendReceive,
);

impl AddPathDirection {
    pub fn can_receive(self) -> bool {
        matches!(self, AddPathDirection::Receive | AddPathDirection::SendReceive)
    }

    pub fn can_send(self) -> bool {
        matches!(self, AddPathDirection::Send | AddPathDirection::SendReceive)
    }
}

/// One family listed in an Add-Path capability.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AddPathFamily {
    afi: AFI,
    safi: SAFI,
    direction: AddPathDirection,
}

impl AddPathFamily {
    pub fn new(afi: AFI, safi: SAFI, direction: AddPathDirection) -> Self {
        AddPathFamily { afi, safi, direction }
    }

    pub fn afi(&self) -> AFI {
        self.afi
    }

    pub fn safi(&self) -> SAFI {
        self.safi
    }

    pub fn direction(&self) -> AddPathDirection {
        self.direction
    }
}

/// A capability advertised in an OPEN.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Capability {
    MultiProtocol(AFI, SAFI),
    RouteRefresh,
    ExtendedMessage,
    FourOctetAsn(Asn),
    AddPath(Vec<AddPathFamily>),
    EnhancedRouteRefresh,
    Unknown(UnknownTlv),
}

impl TlvValue for Capability {
    type Tag = CapabilityType;

    fn tag(&self) -> CapabilityType {
        match self {
            Capability::MultiProtocol(..) => CapabilityType::MultiProtocol,
            Capability::RouteRefresh => CapabilityType::RouteRefresh,
            Capability::ExtendedMessage => CapabilityType::ExtendedMessage,
            Capability::FourOctetAsn(_) => CapabilityType::FourOctetAsn,
            Capability::AddPath(_) => CapabilityType::AddPath,
            Capability::EnhancedRouteRefresh => {
                CapabilityType::EnhancedRouteRefresh
            }
            Capability::Unknown(tlv) => {
                CapabilityType::Unimplemented(tlv.typ() as u8)
            }
        }
    }

    fn unrecognized(typ: u16, value: &[u8]) -> Self {
        Capability::Unknown(UnknownTlv::new(typ, value.to_vec()))
    }

    fn as_unrecognized(&self) -> Option<(u16, &[u8])> {
        match self {
            Capability::Unknown(tlv) => Some((tlv.typ(), tlv.value())),
            _ => None
        }
    }
}

pub type CapabilityRegistry = TlvRegistry<Capability>;

fn parse_multiprotocol(c: &mut Cursor<'_>) -> Result<Capability, ParseError> {
    let afi = c.read_u16()?.into();
    c.skip(1)?;
    Ok(Capability::MultiProtocol(afi, c.read_u8()?.into()))
}

fn parse_route_refresh(_: &mut Cursor<'_>) -> Result<Capability, ParseError> {
    Ok(Capability::RouteRefresh)
}

fn parse_extended_message(_: &mut Cursor<'_>)
    -> Result<Capability, ParseError>
{
    Ok(Capability::ExtendedMessage)
}

fn parse_four_octet_asn(c: &mut Cursor<'_>)
    -> Result<Capability, ParseError>
{
    Ok(Capability::FourOctetAsn(Asn::from_u32(c.read_u32()?)))
}

fn parse_add_path(c: &mut Cursor<'_>) -> Result<Capability, ParseError> {
    if c.is_empty() {
        return Err(ParseError::form_error("empty Add-Path capability"))
    }
    let mut families = Vec::with_capacity(c.remaining() / 4);
    while !c.is_empty() {
        let afi = c.read_u16()?.into();
        let safi = c.read_u8()?.into();
        let direction = c.read_u8()?.into();
        families.push(AddPathFamily { afi, safi, direction });
    }
    Ok(Capability::AddPath(families))
}

fn parse_enhanced_route_refresh(_: &mut Cursor<'_>)
    -> Result<Capability, ParseError>
{
    Ok(Capability::EnhancedRouteRefresh)
}

fn compose_capability(cap: &Capability, t: &mut BytesMut)
    -> Result<(), ComposeError>
{
    match cap {
        Capability::MultiProtocol(afi, safi) => {
            t.put_u16((*afi).into());
            t.put_u8(0);
            t.put_u8((*safi).into());
        }
        Capability::FourOctetAsn(asn) => t.put_u32(asn.into_u32()),
        Capability::AddPath(families) => {
            for f in families {
                t.put_u16(f.afi.into());
                t.put_u8(f.safi.into());
                t.put_u8(f.direction.into());
            }
        }
        Capability::RouteRefresh
        | Capability::ExtendedMessage
        | Capability::EnhancedRouteRefresh => { }
        Capability::Unknown(tlv) => t.put_slice(tlv.value()),
    }
    Ok(())
}

/// Registers the capabilities of RFCs 4760, 2918, 8654, 6793, 7911 and 7313.
pub fn register_defaults(registry: &mut CapabilityRegistry) {
    let parsers: [(CapabilityType, TlvParser<Capability>); 6] = [
        (CapabilityType::MultiProtocol, parse_multiprotocol),
        (CapabilityType::RouteRefresh, parse_route_refresh),
        (CapabilityType::ExtendedMessage, parse_extended_message),
        (CapabilityType::FourOctetAsn, parse_four_octet_asn),
        (CapabilityType::AddPath, parse_add_path),
        (CapabilityType::EnhancedRouteRefresh, parse_enhanced_route_refresh),
    ];
    for (typ, parse) in parsers {
        let compose: TlvComposer<Capability> = compose_capability;
        if let Err(err) = registry.register(
            u8::from(typ).into(), typ, parse, compose
        ) {
            error!("failed to register capability {}: {}", typ, err);
        }
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::extensions::BgpExtensions;
    use crate::bgp::message::{Message, SessionConfig};

    fn open(body: &[u8]) -> Vec<u8> {
        let mut res = vec![0xff; 16];
        res.extend_from_slice(&((body.len() + 19) as u16).to_be_bytes());
        res.push(1);
        res.extend_from_slice(body);
        res
    }

    const BODY: [u8; 32] = [
        0x04, 0xfd, 0xe8, 0x00, 0xb4, 0x0a, 0x00, 0x00, 0x01,
        0x16, 0x02, 0x14,
        0x01, 0x04, 0x00, 0x01, 0x00, 0x01,
        0x02, 0x00,
        0x41, 0x04, 0x00, 0x00, 0xfd, 0xe8,
        0x45, 0x04, 0x00, 0x01, 0x01, 0x03,
    ];

    fn parse(body: &[u8]) -> Result<Message, DocumentedError> {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        Message::from_octets(&open(body), &ctx)
    }

    #[test]
    fn open_with_capabilities() {
        let msg = match parse(&BODY).unwrap() {
            Message::Open(msg) => msg,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(msg.version(), 4);
        assert_eq!(msg.asn(), Asn::from_u32(65000));
        assert_eq!(msg.hold_time(), 180);
        assert_eq!(msg.bgp_id(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(msg.capabilities().len(), 4);
        assert_eq!(
            msg.multiprotocol().collect::<Vec<_>>(),
            [(AFI::Ipv4, SAFI::Unicast)]
        );
        assert!(msg.has_capability(CapabilityType::RouteRefresh));
        assert!(!msg.has_capability(CapabilityType::ExtendedMessage));
        assert_eq!(
            msg.add_path_families().collect::<Vec<_>>(),
            [&AddPathFamily::new(
                AFI::Ipv4, SAFI::Unicast, AddPathDirection::SendReceive
            )]
        );

        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let composed = Message::Open(msg).to_bytes(&ctx).unwrap();
        assert_eq!(composed.as_ref(), open(&BODY).as_slice());
    }

    #[test]
    fn four_octet_speaker() {
        let msg = OpenMessage::new(
            Asn::from_u32(4200000000), 90, Ipv4Addr::new(192, 0, 2, 1),
            vec![Capability::FourOctetAsn(Asn::from_u32(4200000000))],
        );
        assert_eq!(msg.my_as(), AS_TRANS);
        assert_eq!(msg.asn(), Asn::from_u32(4200000000));
    }

    #[test]
    fn unknown_capability() {
        // Graceful restart, kept opaque.
        let body = [
            0x04, 0xfd, 0xe8, 0x00, 0xb4, 0x0a, 0x00, 0x00, 0x01,
            0x06, 0x02, 0x04, 0x40, 0x02, 0x00, 0x78,
        ];
        let msg = match parse(&body).unwrap() {
            Message::Open(msg) => msg,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            msg.capabilities(),
            [Capability::Unknown(UnknownTlv::new(64, vec![0x00, 0x78]))]
        );

        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let composed = Message::Open(msg).to_bytes(&ctx).unwrap();
        assert_eq!(composed.as_ref(), open(&body).as_slice());
    }

    #[test]
    fn validation() {
        let mut body = BODY;
        body[0] = 3;
        let err = parse(&body).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OpenMessage);
        assert_eq!(err.subcode(), 1);
        assert_eq!(err.data(), &[0, 4]);

        let mut body = BODY;
        body[4] = 2;
        assert_eq!(parse(&body).unwrap_err().subcode(), 6);

        let mut body = BODY;
        body[5..9].copy_from_slice(&[0, 0, 0, 0]);
        assert_eq!(parse(&body).unwrap_err().subcode(), 3);

        // Parameter type 1 (authentication) is long gone.
        let mut body = BODY;
        body[10] = 1;
        assert_eq!(parse(&body).unwrap_err().subcode(), 4);

        // Parameter length beyond the message.
        let mut body = BODY;
        body[9] = 0x17;
        assert_eq!(parse(&body).unwrap_err().subcode(), 0);

        // Truncated capability.
        let mut body = BODY;
        body[13] = 0x05;
        assert_eq!(parse(&body).unwrap_err().subcode(), 0);
    }

    #[test]
    fn capabilities_merged_into_one_parameter() {
        let body = [
            0x04, 0xfd, 0xe8, 0x00, 0xb4, 0x0a, 0x00, 0x00, 0x01,
            0x0c,
            0x02, 0x06, 0x01, 0x04, 0x00, 0x01, 0x00, 0x01,
            0x02, 0x02, 0x02, 0x00,
        ];
        let msg = match parse(&body).unwrap() {
            Message::Open(msg) => msg,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            msg.capabilities(),
            [
                Capability::MultiProtocol(AFI::Ipv4, SAFI::Unicast),
                Capability::RouteRefresh,
            ]
        );

        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let composed = Message::Open(msg).to_bytes(&ctx).unwrap();
        let merged = [
            0x04, 0xfd, 0xe8, 0x00, 0xb4, 0x0a, 0x00, 0x00, 0x01,
            0x0a,
            0x02, 0x08, 0x01, 0x04, 0x00, 0x01, 0x00, 0x01, 0x02, 0x00,
        ];
        assert_eq!(composed.as_ref(), open(&merged).as_slice());
    }

    #[test]
    fn truncated_open() {
        let config = SessionConfig::modern();
        let ext = BgpExtensions::default();
        let ctx = CodecContext::new(&config, &ext);
        let buf = open(&BODY);
        for len in 0..buf.len() {
            assert!(Message::from_octets(&buf[..len], &ctx).is_err());
        }
        // A shortened parameter section with a fixed up message length.
        for len in 0..BODY.len() {
            assert!(parse(&BODY[..len]).is_err());
        }
    }

    #[test]
    fn no_parameters() {
        let body = [0x04, 0x00, 0x01, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x00];
        let msg = match parse(&body).unwrap() {
            Message::Open(msg) => msg,
            other => panic!("unexpected {:?}", other),
        };
        assert!(msg.capabilities().is_empty());
        assert_eq!(msg.hold_time(), 0);
        assert_eq!(msg.to_string(), "OPEN v4 AS1 hold 0 id 1.2.3.4");
    }
}
