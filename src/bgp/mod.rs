//! Types and parsing for BGP messages.

pub mod aspath;
pub mod communities;
pub mod error;
pub mod extensions;
pub mod linkstate;
pub mod message;
pub mod nlri;
pub mod path_attributes;
pub mod types;

pub use self::error::{DocumentedError, TreatAsWithdraw};
pub use self::extensions::{BgpExtensions, CodecContext};
