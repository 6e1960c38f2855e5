//! Bounds-checked reading of octet sequences.
//!
//! All parsers in this crate read their input through a [`Cursor`], a thin
//! layer over [`octseq::Parser`] that keeps track of the read position and
//! refuses to read past the end of the range it was scoped to. Nested
//! encodings never share a cursor: a parser that learns the length of a
//! sub-structure from the wire asks for a [`Cursor::slice`] of exactly that
//! length and hands the slice on. The parent has already been advanced past
//! those octets, whatever the sub-parser does with them.

use core::fmt;
use std::error::Error;
use std::net::{Ipv4Addr, Ipv6Addr};

use octseq::Parser;

//------------ Cursor --------------------------------------------------------

/// A read cursor over an immutable octet slice.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    parser: Parser<'a, [u8]>,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned at the start of `octets`.
    pub fn new(octets: &'a [u8]) -> Self {
        Cursor { parser: Parser::from_ref(octets) }
    }

    /// Returns the current read position relative to the start of the
    /// range this cursor covers.
    pub fn pos(&self) -> usize {
        self.parser.pos()
    }

    /// Returns the number of octets left to read.
    pub fn remaining(&self) -> usize {
        self.parser.remaining()
    }

    /// Returns true if all octets have been read.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Checks that at least `len` octets are left.
    pub fn check_len(&self, len: usize) -> Result<(), ParseError> {
        if self.remaining() < len {
            Err(ParseError::ShortInput)
        } else {
            Ok(())
        }
    }

    /// Checks that the cursor has been read completely.
    pub fn finish(&self, what: &'static str) -> Result<(), ParseError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ParseError::form_error(what))
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.parser.parse_u8().map_err(|_| ParseError::ShortInput)
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.parser.parse_u16_be().map_err(|_| ParseError::ShortInput)
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        self.parser.parse_u32_be().map_err(|_| ParseError::ShortInput)
    }

    pub fn read_u64(&mut self) -> Result<u64, ParseError> {
        self.parser.parse_u64_be().map_err(|_| ParseError::ShortInput)
    }

    /// Fills `buf` completely from the cursor.
    ///
    /// If there aren't enough octets left, the cursor is left untouched.
    pub fn read_buf(&mut self, buf: &mut [u8]) -> Result<(), ParseError> {
        self.parser.parse_buf(buf).map_err(|_| ParseError::ShortInput)
    }

    /// Reads a fixed size array.
    pub fn read_array<const N: usize>(&mut self)
        -> Result<[u8; N], ParseError>
    {
        let mut res = [0u8; N];
        self.read_buf(&mut res)?;
        Ok(res)
    }

    /// Takes the next `len` octets without copying them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        self.parser.parse_octets(len).map_err(|_| ParseError::ShortInput)
    }

    /// Takes everything that is left.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let len = self.remaining();
        // Cannot fail, we asked for exactly what is there.
        self.parser.parse_octets(len).unwrap_or_default()
    }

    /// Returns the next `len` octets without advancing.
    pub fn peek(&self, len: usize) -> Result<&'a [u8], ParseError> {
        let mut copy = *self;
        copy.read_bytes(len)
    }

    /// Returns all remaining octets without advancing.
    pub fn peek_rest(&self) -> &'a [u8] {
        let mut copy = *self;
        copy.read_rest()
    }

    /// Skips over `len` octets.
    pub fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        self.parser.advance(len).map_err(|_| ParseError::ShortInput)
    }

    /// Returns a cursor over the next `len` octets and advances past them.
    ///
    /// This is the only way length fields taken from the wire should be
    /// acted upon: the check against the available octets happens here,
    /// before any of the sub-range is looked at.
    pub fn slice(&mut self, len: usize) -> Result<Cursor<'a>, ParseError> {
        self.parser.parse_parser(len)
            .map(|parser| Cursor { parser })
            .map_err(|_| ParseError::ShortInput)
    }

    pub fn read_ipv4(&mut self) -> Result<Ipv4Addr, ParseError> {
        Ok(Ipv4Addr::from(self.read_array::<4>()?))
    }

    pub fn read_ipv6(&mut self) -> Result<Ipv6Addr, ParseError> {
        Ok(Ipv6Addr::from(self.read_array::<16>()?))
    }
}


//--------- ParseError -------------------------------------------------------

/// An error happened while parsing data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// An attempt was made to go beyond the end of the input.
    ShortInput,

    /// A formatting error occurred.
    Form(FormError),
}

impl ParseError {
    /// Creates a new parse error as a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        FormError::new(msg).into()
    }
}

impl From<FormError> for ParseError {
    fn from(err: FormError) -> Self {
        ParseError::Form(err)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::ShortInput => f.write_str("unexpected end of input"),
            ParseError::Form(ref err) => err.fmt(f),
        }
    }
}

impl Error for ParseError { }

//------------ FormError -----------------------------------------------------

/// A formatting error occured.
///
/// This is a generic error for all kinds of error cases that result in data
/// not being accepted. For diagnostics, the error is being given a static
/// string describing the error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormError(&'static str);

impl FormError {
    /// Creates a new form error value with the given diagnostics string.
    pub fn new(msg: &'static str) -> Self {
        FormError(msg)
    }

    pub fn msg(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

//------------ ComposeError --------------------------------------------------

/// An error happened while serializing a value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComposeError {
    /// The encoded value does not fit the length field describing it.
    TooLong { what: &'static str, len: usize },

    /// No serializer is registered for the value.
    Unregistered(String),

    /// A serializer was handed a value it does not know how to encode.
    InvalidValue(&'static str),
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ComposeError::TooLong { what, len } => {
                write!(f, "{} of {} octets exceeds its length field", what, len)
            }
            ComposeError::Unregistered(tag) => {
                write!(f, "no serializer registered for {}", tag)
            }
            ComposeError::InvalidValue(msg) => {
                write!(f, "invalid value: {}", msg)
            }
        }
    }
}

impl Error for ComposeError { }

//--- Tests ------------------------------------------------------------------
