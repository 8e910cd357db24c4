//! CCITT Group 3/4 fax encoder/decoder (ITU-T T.4 / T.6).
//!
//! `huffman` holds the Modified Huffman run tables and 2-D mode codes;
//! `codec` drives row-by-row encoding/decoding over them. The public
//! surface is [`encode`]/[`decode`] plus [`CcittOptions`], matching the
//! library surface enumerated in the external-interfaces section.

pub mod codec;
pub mod huffman;

pub use codec::{CcittOptions, Group};

use crate::error::Result;

/// `ccitt_decode(bytes, options) -> bitmap`.
pub fn decode(bytes: &[u8], options: &CcittOptions) -> Result<Vec<u8>> {
    log::debug!("ccitt::decode: {} bytes, width={}, group={:?}", bytes.len(), options.width, options.group);
    codec::decode(bytes, options)
}

/// `ccitt_encode(bitmap, height, options) -> bytes`.
pub fn encode(bitmap: &[u8], height: u32, options: &CcittOptions) -> Result<Vec<u8>> {
    log::debug!("ccitt::encode: {}x{}, group={:?}", options.width, height, options.group);
    codec::encode(bitmap, height, options)
}
