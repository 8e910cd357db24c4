//! GIF87a/89a container: logical screen, image descriptors, graphics
//! control and application extensions, and Adam7-style interlacing (§4.9).

use crate::error::{Error, Result};
use crate::gif::lzw;
use std::collections::HashMap;

const TRAILER: u8 = 0x3B;
const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR: u8 = 0x2C;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;
const COMMENT_LABEL: u8 = 0xFE;
const PLAIN_TEXT_LABEL: u8 = 0x01;

/// One decoded (or to-be-encoded) frame: top-down, left-to-right BGRA.
#[derive(Clone, Debug)]
pub struct GifImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>, // BGRA, len == width*height*4
    pub delay_ms: u32,
}

#[derive(Clone, Debug, Default)]
pub struct GifFile {
    pub frames: Vec<GifImage>,
    pub loop_count: u16,
}

#[derive(Clone, Copy, Default)]
struct PendingGraphicControl {
    delay_ms: u32,
    transparent_index: Option<u8>,
}

fn read_color_table(data: &[u8], pos: &mut usize, size_field: u8) -> Result<Vec<[u8; 3]>> {
    let count = 1usize << (size_field as usize + 1);
    let bytes_needed = count * 3;
    if *pos + bytes_needed > data.len() {
        return Err(Error::Truncated("color table"));
    }
    let table = data[*pos..*pos + bytes_needed].chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
    *pos += bytes_needed;
    Ok(table)
}

/// Returns the index just past the terminating zero-length sub-block,
/// without interpreting the sub-block payload (used to skip over LZW data
/// and generic extension bodies alike).
fn sub_block_span(data: &[u8], start: usize) -> Result<usize> {
    let mut pos = start;
    loop {
        if pos >= data.len() {
            return Err(Error::Truncated("GIF sub-block length byte"));
        }
        let len = data[pos] as usize;
        pos += 1;
        if len == 0 {
            return Ok(pos);
        }
        if pos + len > data.len() {
            return Err(Error::Truncated("GIF sub-block data"));
        }
        pos += len;
    }
}

fn deinterlace(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; indices.len()];
    let starts = [0usize, 4, 2, 1];
    let incs = [8usize, 8, 4, 2];
    let mut src_row = 0usize;
    for pass in 0..4 {
        let mut row = starts[pass];
        while row < height {
            let src = src_row * width;
            let dst = row * width;
            out[dst..dst + width].copy_from_slice(&indices[src..src + width]);
            src_row += 1;
            row += incs[pass];
        }
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<GifFile> {
    if bytes.len() < 13 || (&bytes[0..6] != b"GIF87a" && &bytes[0..6] != b"GIF89a") {
        return Err(Error::Malformed("missing GIF signature"));
    }
    let screen_width = u16::from_le_bytes([bytes[6], bytes[7]]) as u32;
    let screen_height = u16::from_le_bytes([bytes[8], bytes[9]]) as u32;
    if screen_width == 0 || screen_height == 0 || screen_width > 32768 || screen_height > 32768 {
        return Err(Error::Malformed("GIF logical screen dimensions out of range"));
    }
    let screen_packed = bytes[10];
    let mut pos = 13usize;
    let global_table = if screen_packed & 0x80 != 0 {
        Some(read_color_table(bytes, &mut pos, screen_packed & 0x07)?)
    } else {
        None
    };

    let mut frames = Vec::new();
    let mut loop_count = 0u16;
    let mut pending_gc: Option<PendingGraphicControl> = None;
    let mut iterations = 0u64;

    loop {
        iterations += 1;
        if iterations > 100_000_000 {
            return Err(Error::SafetyCeiling { limit: 100_000_000, context: "GIF block loop" });
        }
        if pos >= bytes.len() {
            return Err(Error::Truncated("GIF ended without trailer"));
        }
        let introducer = bytes[pos];
        pos += 1;
        match introducer {
            TRAILER => break,
            EXTENSION_INTRODUCER => {
                if pos >= bytes.len() {
                    return Err(Error::Truncated("extension label"));
                }
                let label = bytes[pos];
                pos += 1;
                match label {
                    GRAPHIC_CONTROL_LABEL => {
                        if pos + 6 > bytes.len() {
                            return Err(Error::Truncated("graphic control extension"));
                        }
                        let _block_size = bytes[pos];
                        let packed = bytes[pos + 1];
                        let delay_cs = u16::from_le_bytes([bytes[pos + 2], bytes[pos + 3]]);
                        let transparent_color_index = bytes[pos + 4];
                        pos += 6; // block size + 4 body bytes + terminator
                        let transparent_index = if packed & 0x01 != 0 { Some(transparent_color_index) } else { None };
                        pending_gc = Some(PendingGraphicControl { delay_ms: delay_cs as u32 * 10, transparent_index });
                    }
                    APPLICATION_LABEL => {
                        if pos + 12 > bytes.len() {
                            return Err(Error::Truncated("application extension header"));
                        }
                        let _block_size = bytes[pos];
                        let identifier = &bytes[pos + 1..pos + 12];
                        let data_start = pos + 12;
                        if identifier == b"NETSCAPE2.0" {
                            if data_start + 4 <= bytes.len() && bytes[data_start] == 3 {
                                loop_count = u16::from_le_bytes([bytes[data_start + 2], bytes[data_start + 3]]);
                            }
                        }
                        pos = sub_block_span(bytes, data_start)?;
                    }
                    COMMENT_LABEL | PLAIN_TEXT_LABEL => {
                        let data_start = if label == PLAIN_TEXT_LABEL { pos + 13 } else { pos };
                        pos = sub_block_span(bytes, data_start)?;
                    }
                    _ => {
                        pos = sub_block_span(bytes, pos)?;
                    }
                }
            }
            IMAGE_DESCRIPTOR => {
                if pos + 9 > bytes.len() {
                    return Err(Error::Truncated("image descriptor"));
                }
                let width = u16::from_le_bytes([bytes[pos + 4], bytes[pos + 5]]) as u32;
                let height = u16::from_le_bytes([bytes[pos + 6], bytes[pos + 7]]) as u32;
                let packed = bytes[pos + 8];
                pos += 9;
                if width == 0 || height == 0 || width > 32768 || height > 32768 {
                    return Err(Error::Malformed("GIF frame dimensions out of range"));
                }
                let local_table = if packed & 0x80 != 0 { Some(read_color_table(bytes, &mut pos, packed & 0x07)?) } else { None };
                let interlaced = packed & 0x40 != 0;

                if pos >= bytes.len() {
                    return Err(Error::Truncated("LZW min code size"));
                }
                let min_code_size = bytes[pos];
                pos += 1;
                let data_end = sub_block_span(bytes, pos)?;
                let indices_raw = lzw::decode(min_code_size, &bytes[pos..data_end])?;
                pos = data_end;

                let pixel_count = (width * height) as usize;
                if indices_raw.len() < pixel_count {
                    return Err(Error::Malformed("LZW output shorter than frame dimensions"));
                }
                let indices = if interlaced { deinterlace(&indices_raw[..pixel_count], width as usize, height as usize) } else { indices_raw[..pixel_count].to_vec() };

                let table = local_table.as_ref().or(global_table.as_ref()).ok_or(Error::Malformed("no color table available for frame"))?;
                let transparent_index = pending_gc.and_then(|gc| gc.transparent_index);
                let mut pixels = Vec::with_capacity(pixel_count * 4);
                for &idx in &indices {
                    let color = table.get(idx as usize).copied().unwrap_or([0, 0, 0]);
                    let alpha = if Some(idx) == transparent_index { 0 } else { 255 };
                    pixels.extend_from_slice(&[color[2], color[1], color[0], alpha]);
                }
                frames.push(GifImage { width, height, pixels, delay_ms: pending_gc.map(|gc| gc.delay_ms).unwrap_or(0) });
                pending_gc = None;
            }
            other => return Err(Error::Malformed(unexpected_block_message(other))),
        }
    }

    let _ = screen_height; // canvas dims are not otherwise surfaced per the simplified model
    Ok(GifFile { frames, loop_count })
}

fn unexpected_block_message(byte: u8) -> &'static str {
    let _ = byte;
    "unexpected GIF block introducer"
}

fn quantize_nearest(color: [u8; 3], palette: &[[u8; 3]]) -> u8 {
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| {
            let dr = p[0] as i32 - color[0] as i32;
            let dg = p[1] as i32 - color[1] as i32;
            let db = p[2] as i32 - color[2] as i32;
            dr * dr + dg * dg + db * db
        })
        .map(|(i, _)| i as u8)
        .unwrap_or(0)
}

fn build_palette(frame: &GifImage, max_colors: u16, reserve_transparent: bool) -> Vec<[u8; 3]> {
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for px in frame.pixels.chunks_exact(4) {
        if px[3] == 0 {
            continue;
        }
        *counts.entry([px[2], px[1], px[0]]).or_insert(0) += 1;
    }
    let budget = (max_colors as usize).clamp(2, 256) - if reserve_transparent { 1 } else { 0 };
    let mut by_freq: Vec<([u8; 3], u32)> = counts.into_iter().collect();
    by_freq.sort_by(|a, b| b.1.cmp(&a.1));
    by_freq.truncate(budget.max(1));
    let mut palette: Vec<[u8; 3]> = by_freq.into_iter().map(|(c, _)| c).collect();
    if palette.is_empty() {
        palette.push([0, 0, 0]);
    }
    palette
}

fn min_code_size_for(color_count: usize) -> u8 {
    let mut n = 2u8;
    while (1usize << n) < color_count && n < 8 {
        n += 1;
    }
    n
}

pub fn encode(file: &GifFile, max_colors: u16) -> Result<Vec<u8>> {
    let first = file.frames.first().ok_or(Error::Malformed("GIF encode requires at least one frame"))?;
    if first.width == 0 || first.height == 0 {
        return Err(Error::Malformed("GIF frame dimensions must be nonzero"));
    }

    let has_transparency = file.frames.iter().any(|f| f.pixels.chunks_exact(4).any(|px| px[3] == 0));
    let mut palette = build_palette(first, max_colors, has_transparency);
    let transparent_index = if has_transparency {
        palette.push([0, 0, 0]);
        Some((palette.len() - 1) as u8)
    } else {
        None
    };
    let table_size_field = {
        let mut n = 0u8;
        while (1usize << (n + 1)) < palette.len() && n < 7 {
            n += 1;
        }
        n
    };
    let padded_len = 1usize << (table_size_field + 1);
    palette.resize(padded_len, [0, 0, 0]);

    let mut out = Vec::new();
    out.extend_from_slice(b"GIF89a");
    out.extend_from_slice(&(first.width as u16).to_le_bytes());
    out.extend_from_slice(&(first.height as u16).to_le_bytes());
    out.push(0x80 | (table_size_field << 4) | table_size_field);
    out.push(0); // background color index
    out.push(0); // pixel aspect ratio
    for color in &palette {
        out.extend_from_slice(&[color[0], color[1], color[2]]);
    }

    if file.frames.len() > 1 {
        out.extend_from_slice(&[0x21, APPLICATION_LABEL, 11]);
        out.extend_from_slice(b"NETSCAPE2.0");
        out.extend_from_slice(&[3, 1]);
        out.extend_from_slice(&file.loop_count.to_le_bytes());
        out.push(0);
    }

    let min_code_size = min_code_size_for(palette.len());

    for (frame_idx, frame) in file.frames.iter().enumerate() {
        if frame.delay_ms > 0 || has_transparency {
            out.push(0x21);
            out.push(GRAPHIC_CONTROL_LABEL);
            out.push(4);
            let packed = if transparent_index.is_some() { 0x01 } else { 0x00 };
            out.push(packed);
            out.extend_from_slice(&((frame.delay_ms / 10) as u16).to_le_bytes());
            out.push(transparent_index.unwrap_or(0));
            out.push(0);
        }

        out.push(IMAGE_DESCRIPTOR);
        out.extend_from_slice(&0u16.to_le_bytes()); // left
        out.extend_from_slice(&0u16.to_le_bytes()); // top
        out.extend_from_slice(&(frame.width as u16).to_le_bytes());
        out.extend_from_slice(&(frame.height as u16).to_le_bytes());
        out.push(0); // no local color table, not interlaced

        let indices: Vec<u8> = frame
            .pixels
            .chunks_exact(4)
            .map(|px| {
                if px[3] == 0 {
                    transparent_index.unwrap_or(0)
                } else {
                    quantize_nearest([px[2], px[1], px[0]], &palette[..palette.len() - transparent_index.map_or(0, |_| 1)])
                }
            })
            .collect();

        out.push(min_code_size);
        out.extend_from_slice(&lzw::encode(min_code_size, &indices));
        let _ = frame_idx;
    }

    out.push(TRAILER);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, bgra: [u8; 4]) -> GifImage {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            pixels.extend_from_slice(&bgra);
        }
        GifImage { width, height, pixels, delay_ms: 0 }
    }

    #[test]
    fn two_frame_red_square_round_trips() {
        let frame0 = solid_frame(4, 4, [0, 0, 255, 255]); // BGRA red
        let frame1 = solid_frame(4, 4, [0, 0, 255, 255]);
        let file = GifFile { frames: vec![frame0, frame1], loop_count: 0 };
        let bytes = encode(&file, 256).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.frames.len(), 2);
        assert_eq!(decoded.loop_count, 0);
        for frame in &decoded.frames {
            assert_eq!(frame.width, 4);
            assert_eq!(frame.height, 4);
            for px in frame.pixels.chunks_exact(4) {
                assert_eq!(px, [0, 0, 255, 255]);
            }
        }
    }

    #[test]
    fn transparency_round_trips_to_zero_alpha() {
        let mut frame = solid_frame(2, 2, [10, 20, 30, 255]);
        frame.pixels[4..8].copy_from_slice(&[0, 0, 0, 0]); // one transparent pixel
        let file = GifFile { frames: vec![frame], loop_count: 0 };
        let bytes = encode(&file, 256).unwrap();
        let decoded = decode(&bytes).unwrap();
        let px1 = &decoded.frames[0].pixels[4..8];
        assert_eq!(px1[3], 0);
    }

    #[test]
    fn interlaced_decode_reorders_rows() {
        // Build a tiny interlaced GIF by hand: 1x8 image, row values 0..8,
        // encoded in Adam7-ish pass order (0,4,2,6,1,3,5,7 for 8 rows — the
        // 4-pass starts [0,4,2,1] with increments [8,8,4,2]).
        let width = 1u32;
        let height = 8u32;
        let pass_order = [0u8, 4, 2, 6, 1, 3, 5, 7];
        let indices: Vec<u8> = pass_order.to_vec();
        let min_code_size = 3u8;
        let lzw_data = lzw::encode(min_code_size, &indices);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GIF89a");
        bytes.extend_from_slice(&(width as u16).to_le_bytes());
        bytes.extend_from_slice(&(height as u16).to_le_bytes());
        bytes.push(0x80 | 2); // global table, size field 2 -> 8 colors
        bytes.push(0);
        bytes.push(0);
        for i in 0..8u8 {
            bytes.extend_from_slice(&[i, i, i]);
        }
        bytes.push(IMAGE_DESCRIPTOR);
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&(width as u16).to_le_bytes());
        bytes.extend_from_slice(&(height as u16).to_le_bytes());
        bytes.push(0x40); // interlaced, no local table
        bytes.push(min_code_size);
        bytes.extend_from_slice(&lzw_data);
        bytes.push(TRAILER);

        let decoded = decode(&bytes).unwrap();
        let frame = &decoded.frames[0];
        for row in 0..8usize {
            assert_eq!(frame.pixels[row * 4], row as u8, "row {row} mismatch after deinterlace");
        }
    }
}
