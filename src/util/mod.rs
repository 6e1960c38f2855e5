#[macro_use]
pub(crate) mod macros;

pub mod parser;
