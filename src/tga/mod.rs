//! Truevision TGA encoder/decoder (§4.10): header, RLE packets, 16/24/32-bit
//! and grayscale/palette pixel formats, orientation normalization.
//!
//! Extension/footer areas (TGA 2.0) are ignored on decode and never written
//! on encode, per scope.

use crate::error::{Error, Result};

const MAX_ITERATIONS: u64 = 100_000_000;
const HEADER_LEN: usize = 18;

const IMAGE_TYPE_NONE: u8 = 0;
const IMAGE_TYPE_COLOR_MAPPED: u8 = 1;
const IMAGE_TYPE_TRUE_COLOR: u8 = 2;
const IMAGE_TYPE_GRAYSCALE: u8 = 3;
const IMAGE_TYPE_COLOR_MAPPED_RLE: u8 = 9;
const IMAGE_TYPE_TRUE_COLOR_RLE: u8 = 10;
const IMAGE_TYPE_GRAYSCALE_RLE: u8 = 11;

/// Always top-down, left-to-right BGRA, regardless of the source descriptor.
#[derive(Clone, Debug)]
pub struct TgaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>, // BGRA, len == width*height*4
    pub bits_per_pixel: u8,
}

struct Header {
    id_length: u8,
    color_map_type: u8,
    image_type: u8,
    color_map_first_entry: u16,
    color_map_length: u16,
    color_map_entry_size: u8,
    width: u16,
    height: u16,
    pixel_depth: u8,
    descriptor: u8,
}

fn parse_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Truncated("TGA header"));
    }
    Ok(Header {
        id_length: bytes[0],
        color_map_type: bytes[1],
        image_type: bytes[2],
        color_map_first_entry: u16::from_le_bytes([bytes[3], bytes[4]]),
        color_map_length: u16::from_le_bytes([bytes[5], bytes[6]]),
        color_map_entry_size: bytes[7],
        width: u16::from_le_bytes([bytes[12], bytes[13]]),
        height: u16::from_le_bytes([bytes[14], bytes[15]]),
        pixel_depth: bytes[16],
        descriptor: bytes[17],
    })
}

fn decode_color_map_entry(bytes: &[u8], entry_size: u8) -> Result<[u8; 4]> {
    match entry_size {
        15 | 16 => {
            let value = u16::from_le_bytes([bytes[0], bytes[1]]);
            Ok(expand_16bit(value, 1))
        }
        24 => Ok([bytes[0], bytes[1], bytes[2], 255]),
        32 => Ok([bytes[0], bytes[1], bytes[2], bytes[3]]),
        other => {
            let _ = other;
            Err(Error::Unsupported("unsupported TGA color-map entry size"))
        }
    }
}

/// `alpha_bits` is the descriptor's attribute-bit-count field (low 4 bits);
/// per §4.10, the top bit of a 16-bit pixel only carries alpha when that
/// count is nonzero, otherwise every pixel is fully opaque.
fn expand_16bit(value: u16, alpha_bits: u8) -> [u8; 4] {
    let b5 = (value & 0x1F) as u8;
    let g5 = ((value >> 5) & 0x1F) as u8;
    let r5 = ((value >> 10) & 0x1F) as u8;
    let top_bit = (value >> 15) & 0x1 != 0;
    let expand = |c: u8| (c << 3) | (c >> 2);
    let alpha = if alpha_bits > 0 && !top_bit { 0 } else { 255 };
    [expand(b5), expand(g5), expand(r5), alpha]
}

/// Reads one pixel's BGRA value starting at `src`, given the stored pixel
/// depth and an optional color map (for color-mapped images).
fn decode_pixel(src: &[u8], pixel_depth: u8, image_type: u8, color_map: &[[u8; 4]], alpha_bits: u8) -> Result<[u8; 4]> {
    match (image_type, pixel_depth) {
        (IMAGE_TYPE_TRUE_COLOR, 32) | (IMAGE_TYPE_TRUE_COLOR_RLE, 32) => Ok([src[0], src[1], src[2], src[3]]),
        (IMAGE_TYPE_TRUE_COLOR, 24) | (IMAGE_TYPE_TRUE_COLOR_RLE, 24) => Ok([src[0], src[1], src[2], 255]),
        (IMAGE_TYPE_TRUE_COLOR, 16) | (IMAGE_TYPE_TRUE_COLOR_RLE, 16) => Ok(expand_16bit(u16::from_le_bytes([src[0], src[1]]), alpha_bits)),
        (IMAGE_TYPE_GRAYSCALE, 8) | (IMAGE_TYPE_GRAYSCALE_RLE, 8) => Ok([src[0], src[0], src[0], 255]),
        (IMAGE_TYPE_GRAYSCALE, 16) | (IMAGE_TYPE_GRAYSCALE_RLE, 16) => Ok([src[0], src[0], src[0], src[1]]),
        (IMAGE_TYPE_COLOR_MAPPED, 8) | (IMAGE_TYPE_COLOR_MAPPED_RLE, 8) => {
            let idx = src[0] as usize;
            color_map.get(idx).copied().ok_or(Error::Malformed("TGA color-map index out of range"))
        }
        _ => Err(Error::Unsupported("unsupported TGA image type / pixel depth combination")),
    }
}

fn bytes_per_pixel(pixel_depth: u8) -> Result<usize> {
    match pixel_depth {
        8 => Ok(1),
        16 => Ok(2),
        24 => Ok(3),
        32 => Ok(4),
        _ => Err(Error::Unsupported("unsupported TGA pixel depth")),
    }
}

pub fn decode(bytes: &[u8]) -> Result<TgaImage> {
    let header = parse_header(bytes)?;
    if header.width == 0 || header.height == 0 {
        return Err(Error::Malformed("TGA dimensions must be nonzero"));
    }
    let width = header.width as u32;
    let height = header.height as u32;

    let mut pos = HEADER_LEN + header.id_length as usize;
    if pos > bytes.len() {
        return Err(Error::Truncated("TGA image ID"));
    }

    let mut color_map = Vec::new();
    if header.color_map_type == 1 {
        let entry_bytes = match header.color_map_entry_size {
            15 | 16 => 2,
            24 => 3,
            32 => 4,
            _ => return Err(Error::Unsupported("unsupported TGA color-map entry size")),
        };
        let total = header.color_map_length as usize * entry_bytes;
        if pos + total > bytes.len() {
            return Err(Error::Truncated("TGA color map"));
        }
        for chunk in bytes[pos..pos + total].chunks_exact(entry_bytes) {
            color_map.push(decode_color_map_entry(chunk, header.color_map_entry_size)?);
        }
        pos += total;
        let _ = header.color_map_first_entry;
    } else if header.color_map_type != 0 {
        return Err(Error::Unsupported("unsupported TGA color-map type"));
    }

    if header.image_type == IMAGE_TYPE_NONE {
        return Err(Error::Unsupported("TGA image type 0 (no image data) not supported"));
    }

    let pixel_bytes = bytes_per_pixel(header.pixel_depth)?;
    let pixel_count = width as usize * height as usize;
    let is_rle = matches!(header.image_type, IMAGE_TYPE_COLOR_MAPPED_RLE | IMAGE_TYPE_TRUE_COLOR_RLE | IMAGE_TYPE_GRAYSCALE_RLE);
    let alpha_bits = header.descriptor & 0x0F;

    let mut bgra = vec![0u8; pixel_count * 4];
    if is_rle {
        decode_rle(&bytes[pos..], header.image_type, header.pixel_depth, pixel_bytes, &color_map, alpha_bits, &mut bgra)?;
    } else {
        let needed = pixel_count * pixel_bytes;
        if pos + needed > bytes.len() {
            return Err(Error::Truncated("TGA raw pixel data"));
        }
        for (i, chunk) in bytes[pos..pos + needed].chunks_exact(pixel_bytes).enumerate() {
            let px = decode_pixel(chunk, header.pixel_depth, header.image_type, &color_map, alpha_bits)?;
            bgra[i * 4..i * 4 + 4].copy_from_slice(&px);
        }
    }

    let flip_vertical = header.descriptor & 0x20 == 0; // bit 5 clear: origin at bottom
    let flip_horizontal = header.descriptor & 0x10 != 0; // bit 4 set: origin at right
    let normalized = normalize_orientation(&bgra, width, height, flip_vertical, flip_horizontal);

    Ok(TgaImage { width, height, pixels: normalized, bits_per_pixel: header.pixel_depth })
}

fn decode_rle(data: &[u8], image_type: u8, pixel_depth: u8, pixel_bytes: usize, color_map: &[[u8; 4]], alpha_bits: u8, out: &mut [u8]) -> Result<()> {
    let mut pos = 0usize;
    let mut out_pixel = 0usize;
    let total_pixels = out.len() / 4;
    let mut iterations = 0u64;

    while out_pixel < total_pixels {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(Error::SafetyCeiling { limit: MAX_ITERATIONS, context: "TGA RLE decode" });
        }
        if pos >= data.len() {
            return Err(Error::Truncated("TGA RLE packet header"));
        }
        let packet_header = data[pos];
        pos += 1;
        let count = (packet_header & 0x7F) as usize + 1;
        let is_run = packet_header & 0x80 != 0;

        if is_run {
            if pos + pixel_bytes > data.len() {
                return Err(Error::Truncated("TGA RLE run pixel"));
            }
            let px = decode_pixel(&data[pos..pos + pixel_bytes], pixel_depth, image_type, color_map, alpha_bits)?;
            pos += pixel_bytes;
            for _ in 0..count {
                if out_pixel >= total_pixels {
                    break;
                }
                out[out_pixel * 4..out_pixel * 4 + 4].copy_from_slice(&px);
                out_pixel += 1;
            }
        } else {
            let needed = count * pixel_bytes;
            if pos + needed > data.len() {
                return Err(Error::Truncated("TGA RLE raw packet"));
            }
            for chunk in data[pos..pos + needed].chunks_exact(pixel_bytes) {
                if out_pixel >= total_pixels {
                    break;
                }
                let px = decode_pixel(chunk, pixel_depth, image_type, color_map, alpha_bits)?;
                out[out_pixel * 4..out_pixel * 4 + 4].copy_from_slice(&px);
                out_pixel += 1;
            }
            pos += needed;
        }
    }
    Ok(())
}

fn normalize_orientation(bgra: &[u8], width: u32, height: u32, flip_vertical: bool, flip_horizontal: bool) -> Vec<u8> {
    if !flip_vertical && !flip_horizontal {
        return bgra.to_vec();
    }
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0u8; bgra.len()];
    for src_row in 0..h {
        let dst_row = if flip_vertical { h - 1 - src_row } else { src_row };
        for src_col in 0..w {
            let dst_col = if flip_horizontal { w - 1 - src_col } else { src_col };
            let src_idx = (src_row * w + src_col) * 4;
            let dst_idx = (dst_row * w + dst_col) * 4;
            out[dst_idx..dst_idx + 4].copy_from_slice(&bgra[src_idx..src_idx + 4]);
        }
    }
    out
}

pub fn encode(image: &TgaImage, bits_per_pixel: u8, use_rle: bool) -> Result<Vec<u8>> {
    if bits_per_pixel != 24 && bits_per_pixel != 32 {
        return Err(Error::Malformed("TGA encode requires bits_per_pixel in {24, 32}"));
    }
    if image.width == 0 || image.height == 0 {
        return Err(Error::Malformed("TGA dimensions must be nonzero"));
    }
    let pixel_bytes = if bits_per_pixel == 32 { 4 } else { 3 };
    let pixel_count = image.width as usize * image.height as usize;
    if image.pixels.len() < pixel_count * 4 {
        return Err(Error::Malformed("TGA pixel buffer shorter than width*height"));
    }

    let mut out = Vec::with_capacity(HEADER_LEN + pixel_count * pixel_bytes);
    out.push(0); // id length
    out.push(0); // no color map
    out.push(if use_rle { IMAGE_TYPE_TRUE_COLOR_RLE } else { IMAGE_TYPE_TRUE_COLOR });
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.push(0);
    out.extend_from_slice(&0u16.to_le_bytes()); // x origin
    out.extend_from_slice(&0u16.to_le_bytes()); // y origin
    out.extend_from_slice(&(image.width as u16).to_le_bytes());
    out.extend_from_slice(&(image.height as u16).to_le_bytes());
    out.push(bits_per_pixel);
    let alpha_bits = if bits_per_pixel == 32 { 8 } else { 0 };
    out.push(0x20 | alpha_bits); // top-down, left-to-right, per-pixel alpha count

    let write_pixel = |dst: &mut Vec<u8>, bgra: &[u8]| {
        dst.extend_from_slice(&bgra[0..3]);
        if bits_per_pixel == 32 {
            dst.push(bgra[3]);
        }
    };

    if !use_rle {
        for px in image.pixels.chunks_exact(4) {
            write_pixel(&mut out, px);
        }
        return Ok(out);
    }

    let pixels: Vec<[u8; 4]> = image.pixels.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect();
    let mut i = 0usize;
    while i < pixels.len() {
        let run_len = run_length_at(&pixels, i);
        if run_len >= 2 {
            let capped = run_len.min(128);
            out.push(0x80 | (capped as u8 - 1));
            write_pixel(&mut out, &pixels[i]);
            i += capped;
        } else {
            let raw_len = raw_span_at(&pixels, i).min(128);
            out.push(raw_len as u8 - 1);
            for px in &pixels[i..i + raw_len] {
                write_pixel(&mut out, px);
            }
            i += raw_len;
        }
    }
    Ok(out)
}

fn run_length_at(pixels: &[[u8; 4]], start: usize) -> usize {
    let mut n = 1;
    while start + n < pixels.len() && n < 128 && pixels[start + n] == pixels[start] {
        n += 1;
    }
    n
}

fn raw_span_at(pixels: &[[u8; 4]], start: usize) -> usize {
    let mut n = 1;
    while start + n < pixels.len() && n < 128 {
        // stop the raw span one pixel before a run of 2+ begins
        if start + n + 1 < pixels.len() && pixels[start + n] == pixels[start + n + 1] {
            break;
        }
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, bgra: [u8; 4]) -> TgaImage {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            pixels.extend_from_slice(&bgra);
        }
        TgaImage { width, height, pixels, bits_per_pixel: 32 }
    }

    #[test]
    fn uncompressed_32bit_round_trips_identity() {
        let image = solid(3, 2, [10, 20, 30, 255]);
        let bytes = encode(&image, 32, false).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.pixels, image.pixels);
    }

    #[test]
    fn uncompressed_24bit_round_trips_identity_on_bgr() {
        let image = solid(3, 2, [10, 20, 30, 255]);
        let bytes = encode(&image, 24, false).unwrap();
        let decoded = decode(&bytes).unwrap();
        for px in decoded.pixels.chunks_exact(4) {
            assert_eq!(&px[0..3], &[10, 20, 30]);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn rle_round_trips_same_as_raw() {
        let mut image = solid(8, 4, [0, 0, 255, 255]);
        // introduce a varied tail so both run and raw packets get exercised
        for (i, chunk) in image.pixels.chunks_exact_mut(4).enumerate().skip(20) {
            chunk.copy_from_slice(&[i as u8, 0, 0, 255]);
        }
        let rle_bytes = encode(&image, 32, true).unwrap();
        let raw_bytes = encode(&image, 32, false).unwrap();
        let from_rle = decode(&rle_bytes).unwrap();
        let from_raw = decode(&raw_bytes).unwrap();
        assert_eq!(from_rle.pixels, from_raw.pixels);
        assert_eq!(from_rle.pixels, image.pixels);
    }

    #[test]
    fn single_run_length_packet_decodes_to_128_pixels() {
        let mut bytes = Vec::new();
        bytes.push(0);
        bytes.push(0);
        bytes.push(IMAGE_TYPE_TRUE_COLOR_RLE);
        bytes.extend_from_slice(&[0u8; 5]);
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&128u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.push(24);
        bytes.push(0x20);
        bytes.push(0x80 | 127); // run packet, count 128
        bytes.extend_from_slice(&[0, 0, 255]); // BGR red

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.width, 128);
        assert_eq!(decoded.height, 1);
        for px in decoded.pixels.chunks_exact(4) {
            assert_eq!(px, [0, 0, 255, 255]);
        }
    }

    #[test]
    fn orientation_bottom_up_is_normalized_to_top_down() {
        let mut bytes = Vec::new();
        bytes.push(0);
        bytes.push(0);
        bytes.push(IMAGE_TYPE_TRUE_COLOR);
        bytes.extend_from_slice(&[0u8; 5]);
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.push(24);
        bytes.push(0x00); // bottom-up, left-to-right (bit 5 clear)
        bytes.extend_from_slice(&[255, 0, 0]); // stored row 0 (bottom): blue
        bytes.extend_from_slice(&[0, 0, 255]); // stored row 1 (top): red

        let decoded = decode(&bytes).unwrap();
        // top-down output: row 0 must be what was stored as row 1 (top)
        assert_eq!(&decoded.pixels[0..3], &[0, 0, 255]);
        assert_eq!(&decoded.pixels[4..7], &[255, 0, 0]);
    }

    #[test]
    fn sixteen_bit_expands_5_bit_channels() {
        // 0b0_11111_00000_11111 = A=0,R=31,G=0,B=31 -> magenta-ish with A=0
        let value: u16 = 0b0_11111_00000_11111;
        let expanded = expand_16bit(value, 1);
        assert_eq!(expanded[0], 255); // B
        assert_eq!(expanded[1], 0); // G
        assert_eq!(expanded[2], 255); // R
        assert_eq!(expanded[3], 0); // A (top bit clear)
    }
}
