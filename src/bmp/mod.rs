//! The BGP Monitoring Protocol, RFC 7854.
//!
//! Messages are decoded with the registries of a [`BmpExtensions`] which
//! also carries the BGP registries used for embedded BGP messages.
//!
//! [`BmpExtensions`]: message::BmpExtensions

pub mod message;

pub use self::message::{BmpExtensions, Message, MessageError};
