//! Registry-driven wire codecs for BGP, BMP and RSVP-TE objects.
//!
//! All extensible encodings are parsed through a [`registry::TypeRegistry`]
//! of handler functions and the generic TLV codec in [`tlv`]. The BGP
//! registries are bundled in [`bgp::extensions::BgpExtensions`], the BMP
//! ones in [`bmp::BmpExtensions`].

pub mod bgp;
#[cfg(feature = "bmp")]
pub mod bmp;
pub mod registry;
#[cfg(feature = "rsvp")]
pub mod rsvp;
pub mod tlv;
pub mod util;

pub use crate::util::parser::{ComposeError, Cursor, ParseError};
