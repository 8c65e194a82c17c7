//! Lightweight C# syntax analysis: a lexer and a tolerant
//! declaration/invocation scanner. See [`model`] for what is extracted.

pub mod lexer;
pub mod model;
pub mod scan;

pub use model::*;
pub use scan::parse_source;
