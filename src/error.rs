//! Crate-wide error type.
//!
//! Every public decode/encode entry point returns `Result<T, Error>`. There
//! is no externally standardized error-code table to mirror for these four
//! formats (unlike e.g. JPEG-LS's numbered exceptions), so each variant
//! carries a short static context string instead of a numeric code.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("truncated input: {0}")]
    Truncated(&'static str),

    #[error("malformed input: {0}")]
    Malformed(&'static str),

    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),

    #[error("exceeded safety ceiling ({limit} iterations) in {context}")]
    SafetyCeiling { limit: u64, context: &'static str },

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
