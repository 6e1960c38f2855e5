//! AS_PATH and AS4_PATH attribute values.
//!
//! On the wire a path is a sequence of segments, each one octet of segment
//! type, one octet holding the number of ASNs and then the ASNs themselves,
//! two or four octets each. Which ASN width is in use is not encoded in the
//! attribute: AS_PATH uses four octets only if both speakers support it
//! (RFC 6793), AS4_PATH always uses four.

use std::fmt;

use bytes::{BufMut, BytesMut};
use inetnum::asn::Asn;

use crate::util::parser::{ComposeError, Cursor, ParseError};

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

//------------ SegmentType ---------------------------------------------------

/// AS_PATH segment types as defined in RFC4271 and RFC5065.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentType {
    Set,
    Sequence,
    ConfedSequence,
    ConfedSet,
}

impl From<SegmentType> for u8 {
    fn from(value: SegmentType) -> u8 {
        match value {
            SegmentType::Set => 1,
            SegmentType::Sequence => 2,
            SegmentType::ConfedSequence => 3,
            SegmentType::ConfedSet => 4,
        }
    }
}

impl TryFrom<u8> for SegmentType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SegmentType::Set),
            2 => Ok(SegmentType::Sequence),
            3 => Ok(SegmentType::ConfedSequence),
            4 => Ok(SegmentType::ConfedSet),
            _ => Err(ParseError::form_error("invalid AS_PATH segment type"))
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            SegmentType::Set => "AS_SET",
            SegmentType::Sequence => "AS_SEQUENCE",
            SegmentType::ConfedSequence => "AS_CONFED_SEQUENCE",
            SegmentType::ConfedSet => "AS_CONFED_SET",
        })
    }
}

//------------ Segment -------------------------------------------------------

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    stype: SegmentType,
    asns: Vec<Asn>,
}

impl Segment {
    pub fn new(stype: SegmentType, asns: Vec<Asn>) -> Self {
        Segment { stype, asns }
    }

    pub fn segment_type(&self) -> SegmentType {
        self.stype
    }

    pub fn asns(&self) -> &[Asn] {
        &self.asns
    }

    fn parse(cursor: &mut Cursor<'_>, four_octet: bool)
        -> Result<Self, ParseError>
    {
        let stype = SegmentType::try_from(cursor.read_u8()?)?;
        let count = cursor.read_u8()?;
        if count == 0 {
            return Err(ParseError::form_error("empty AS_PATH segment"));
        }
        let width = if four_octet { 4 } else { 2 };
        cursor.check_len(usize::from(count) * width)?;
        let mut asns = Vec::with_capacity(count.into());
        for _ in 0..count {
            let asn = if four_octet {
                cursor.read_u32()?
            } else {
                cursor.read_u16()?.into()
            };
            asns.push(Asn::from_u32(asn));
        }
        Ok(Segment { stype, asns })
    }

    fn compose(&self, four_octet: bool, target: &mut BytesMut)
        -> Result<(), ComposeError>
    {
        let count = u8::try_from(self.asns.len()).map_err(|_| {
            ComposeError::TooLong {
                what: "AS_PATH segment", len: self.asns.len()
            }
        })?;
        target.put_u8(self.stype.into());
        target.put_u8(count);
        for asn in &self.asns {
            if four_octet {
                target.put_u32(asn.into_u32());
            } else {
                // RFC 6793: ASNs not fitting two octets become AS_TRANS.
                let asn = u16::try_from(asn.into_u32()).unwrap_or(AS_TRANS);
                target.put_u16(asn);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (open, close) = match self.stype {
            SegmentType::Sequence => ("", ""),
            SegmentType::Set => ("{", "}"),
            SegmentType::ConfedSequence => ("(", ")"),
            SegmentType::ConfedSet => ("[", "]"),
        };
        f.write_str(open)?;
        for (i, asn) in self.asns.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", asn.into_u32())?;
        }
        f.write_str(close)
    }
}

/// The two octet stand-in for ASNs that do not fit.
pub const AS_TRANS: u16 = 23456;

//------------ AsPath --------------------------------------------------------

/// A decoded AS_PATH or AS4_PATH.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AsPath {
    segments: Vec<Segment>,
}

impl AsPath {
    pub fn new(segments: Vec<Segment>) -> Self {
        AsPath { segments }
    }

    /// Creates a path of a single AS_SEQUENCE.
    pub fn from_sequence(asns: impl IntoIterator<Item = Asn>) -> Self {
        AsPath {
            segments: vec![Segment::new(
                SegmentType::Sequence, asns.into_iter().collect()
            )]
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parses a complete attribute value.
    pub fn parse(mut cursor: Cursor<'_>, four_octet: bool)
        -> Result<Self, ParseError>
    {
        let mut segments = Vec::new();
        while !cursor.is_empty() {
            segments.push(Segment::parse(&mut cursor, four_octet)?);
        }
        Ok(AsPath { segments })
    }

    pub fn compose(&self, four_octet: bool, target: &mut BytesMut)
        -> Result<(), ComposeError>
    {
        for segment in &self.segments {
            segment.compose(four_octet, target)?;
        }
        Ok(())
    }
}

impl fmt::Display for AsPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

//--- Tests ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_octet_path() {
        let buf = [
            0x02, 0x03, 0x00, 0x0a, 0x00, 0x14, 0x00, 0x1e,
            0x01, 0x02, 0x00, 0x28, 0x00, 0x32,
        ];
        let path = AsPath::parse(Cursor::new(&buf), false).unwrap();
        assert_eq!(path.segments().len(), 2);
        assert_eq!(path.to_string(), "10 20 30 {40 50}");

        let mut target = BytesMut::new();
        path.compose(false, &mut target).unwrap();
        assert_eq!(target.as_ref(), &buf[..]);
    }

    #[test]
    fn four_octet_path() {
        let buf = [0x02, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0xfd, 0xe8];
        let path = AsPath::parse(Cursor::new(&buf), true).unwrap();
        assert_eq!(
            path,
            AsPath::from_sequence([Asn::from_u32(65536), Asn::from_u32(65000)])
        );

        // Writing to a two octet speaker substitutes AS_TRANS.
        let mut target = BytesMut::new();
        path.compose(false, &mut target).unwrap();
        assert_eq!(target.as_ref(), &[0x02, 0x02, 0x5b, 0xa0, 0xfd, 0xe8][..]);
    }

    #[test]
    fn malformed_paths() {
        // Bad segment type.
        assert!(AsPath::parse(Cursor::new(&[0x05, 0x01, 0, 1]), false)
            .is_err());
        // Count beyond the attribute.
        assert_eq!(
            AsPath::parse(Cursor::new(&[0x02, 0x03, 0, 1, 0, 2]), false),
            Err(ParseError::ShortInput)
        );
        // Empty segment.
        assert!(AsPath::parse(Cursor::new(&[0x02, 0x00]), false).is_err());
        // Two octet path read as four octet one.
        assert!(AsPath::parse(Cursor::new(&[0x02, 0x01, 0, 1]), true)
            .is_err());
    }

    #[test]
    fn empty_path() {
        let path = AsPath::parse(Cursor::new(&[]), true).unwrap();
        assert!(path.is_empty());
    }
}
