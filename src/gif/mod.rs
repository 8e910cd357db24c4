//! GIF87a/89a encoder/decoder (§4.8-4.9).
//!
//! `lzw` implements the variable-width LZW codec over GIF's sub-block byte
//! framing; `file` drives the container format (logical screen, graphics
//! control/application extensions, interlacing) on top of it.

pub mod file;
pub mod lzw;

pub use file::{GifFile, GifImage};

use crate::error::Result;

/// `gif_decode(bytes) -> GifFile`.
pub fn decode(bytes: &[u8]) -> Result<GifFile> {
    log::debug!("gif::decode: {} bytes", bytes.len());
    file::decode(bytes)
}

/// `gif_encode(file, max_colors) -> bytes`.
pub fn encode(gif_file: &GifFile, max_colors: u16) -> Result<Vec<u8>> {
    log::debug!("gif::encode: {} frame(s), max_colors={}", gif_file.frames.len(), max_colors);
    file::encode(gif_file, max_colors)
}
