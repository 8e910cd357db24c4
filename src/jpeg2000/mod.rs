//! JPEG 2000 Part 1 codestream encoder/decoder (simplified subset).
//!
//! Pipeline: level shift → optional multi-component transform (RCT for the
//! reversible 5/3 path, ICT for the irreversible 9/7 path) → DWT → scalar
//! quantization → EBCOT Tier-1 (per code-block) → Tier-2 packet assembly in
//! LRCP order → marker-delimited codestream. Decode runs the pipeline in
//! reverse. Single tile, single tile-part, one precinct per resolution —
//! not a conformant implementation of the full standard.
//!
//! - `dwt`: forward/inverse wavelet lifting (9/7 lossy, 5/3 lossless).
//! - `quantization`: scalar dead-zone quantization and the QCD wire format.
//! - `mq_coder`: the MQ arithmetic coder.
//! - `bit_plane_coder`: EBCOT Tier-1 context modeling over the MQ coder.
//! - `image`: `Image`/`Component`/`Subband`/code-block data model.
//! - `packet`: Tier-2 packet assembly/parsing.
//! - `codestream`: SOC/SIZ/COD/QCD/SOT/SOD/EOC marker framing.

pub mod bit_plane_coder;
pub mod codestream;
pub mod dwt;
pub mod image;
pub mod mq_coder;
pub mod packet;
pub mod quantization;

use crate::bitio::ByteReader;
use crate::error::{Error, Result};
use bit_plane_coder::BitPlaneCoder;
use codestream::{Cod, Qcd, Siz, SizComponent, Sot};
use image::{Component, EncodedBlock, Image, QuantizedBlock, Subband, SubbandKind};

const NUM_LAYERS: u32 = 1;
const MAX_DIMENSION: u32 = 32768;

pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::Malformed("J2K image dimensions must be nonzero"));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::Malformed("J2K image dimensions exceed the maximum"));
    }
    Ok(())
}

fn forward_rct(planes: &mut [Vec<f32>; 3]) {
    let [r, g, b] = planes;
    for i in 0..r.len() {
        let (rv, gv, bv) = (r[i], g[i], b[i]);
        r[i] = ((rv + 2.0 * gv + bv) / 4.0).floor();
        g[i] = bv - gv;
        b[i] = rv - gv;
    }
}

fn inverse_rct(planes: &mut [Vec<f32>; 3]) {
    let [y, cb, cr] = planes;
    for i in 0..y.len() {
        let (yv, cbv, crv) = (y[i], cb[i], cr[i]);
        let g = yv - ((cbv + crv) / 4.0).floor();
        let r = crv + g;
        let b = cbv + g;
        y[i] = r;
        cb[i] = g;
        cr[i] = b;
    }
}

fn forward_ict(planes: &mut [Vec<f32>; 3]) {
    let [r, g, b] = planes;
    for i in 0..r.len() {
        let (rv, gv, bv) = (r[i], g[i], b[i]);
        r[i] = 0.299 * rv + 0.587 * gv + 0.114 * bv;
        g[i] = -0.168736 * rv - 0.331264 * gv + 0.5 * bv;
        b[i] = 0.5 * rv - 0.418688 * gv - 0.081312 * bv;
    }
}

fn inverse_ict(planes: &mut [Vec<f32>; 3]) {
    let [y, cb, cr] = planes;
    for i in 0..y.len() {
        let (yv, cbv, crv) = (y[i], cb[i], cr[i]);
        y[i] = yv + 1.402 * crv;
        cb[i] = yv - 0.344136 * cbv - 0.714136 * crv;
        cr[i] = yv + 1.772 * cbv;
    }
}

fn extract_window(plane: &[f32], stride: usize, offset_x: u32, offset_y: u32, width: u32, height: u32) -> Vec<f32> {
    let mut out = Vec::with_capacity((width * height) as usize);
    for row in 0..height {
        let start = ((offset_y + row) as usize) * stride + offset_x as usize;
        out.extend_from_slice(&plane[start..start + width as usize]);
    }
    out
}

fn write_window(plane: &mut [f32], stride: usize, offset_x: u32, offset_y: u32, width: u32, height: u32, data: &[f32]) {
    for row in 0..height {
        let start = ((offset_y + row) as usize) * stride + offset_x as usize;
        plane[start..start + width as usize].copy_from_slice(&data[(row * width) as usize..((row + 1) * width) as usize]);
    }
}

/// Subbands belonging to resolution level `resolution` (0 = the coarsest LL,
/// `num_levels` = the finest detail), in a fixed Hl/Lh/Hh order.
fn subbands_for_resolution<'a>(subbands: &'a [Subband], num_levels: u8, resolution: u8) -> Vec<&'a Subband> {
    if resolution == 0 {
        subbands.iter().filter(|s| s.kind == SubbandKind::Ll).collect()
    } else {
        let target_level = num_levels - resolution;
        let mut out = Vec::new();
        for kind in [SubbandKind::Hl, SubbandKind::Lh, SubbandKind::Hh] {
            out.extend(subbands.iter().filter(|s| s.level == target_level && s.kind == kind));
        }
        out
    }
}

/// QCD step order: LL first, then each detail level from coarsest to finest
/// (our internal level numbering runs finest=0..coarsest=num_levels-1, so
/// this iterates that range in reverse), Hl/Lh/Hh within a level.
fn qcd_order_subbands(subbands: &[Subband], num_levels: u8) -> Vec<&Subband> {
    let mut out = Vec::new();
    out.extend(subbands.iter().filter(|s| s.kind == SubbandKind::Ll));
    for level in (0..num_levels).rev() {
        for kind in [SubbandKind::Hl, SubbandKind::Lh, SubbandKind::Hh] {
            out.extend(subbands.iter().filter(|s| s.level == level && s.kind == kind));
        }
    }
    out
}

struct EncodedComponent {
    subbands: Vec<Subband>,
    blocks: Vec<Vec<EncodedBlock>>, // one Vec<EncodedBlock> per subband, in `subbands` order
}

/// `j2k_encode(imageBytes, w, h, components, quality, lossy, levels, mct) -> bytes`.
#[allow(clippy::too_many_arguments)]
pub fn encode(image_bytes: &[u8], width: u32, height: u32, components: u8, quality: u8, lossy: bool, levels: u8, mct: bool) -> Result<Vec<u8>> {
    log::debug!("jpeg2000::encode: {width}x{height}x{components}, quality={quality}, lossy={lossy}, levels={levels}, mct={mct}");
    check_dimensions(width, height)?;
    if components == 0 {
        return Err(Error::Malformed("J2K image must have at least one component"));
    }
    let pixel_count = width as usize * height as usize;
    let expected_len = pixel_count.checked_mul(components as usize).ok_or(Error::Overflow("J2K image byte count"))?;
    if image_bytes.len() != expected_len {
        return Err(Error::Malformed("J2K image byte buffer does not match width*height*components"));
    }
    if levels == 0 {
        return Err(Error::Malformed("J2K decomposition must have at least one level"));
    }

    let apply_mct = mct && components == 3;

    let mut planes: Vec<Vec<f32>> = (0..components)
        .map(|c| {
            let gray: Vec<u8> = (0..pixel_count).map(|i| image_bytes[i * components as usize + c as usize]).collect();
            Image::from_gray(width, height, &gray).samples
        })
        .collect();

    if apply_mct {
        let mut rgb = [planes[0].clone(), planes[1].clone(), planes[2].clone()];
        if lossy {
            forward_ict(&mut rgb);
        } else {
            forward_rct(&mut rgb);
        }
        planes[0] = rgb[0].clone();
        planes[1] = rgb[1].clone();
        planes[2] = rgb[2].clone();
    }

    let base_step = if lossy { quantization::base_step_for_quality(quality) } else { 1.0 };
    let mut encoded_components = Vec::with_capacity(components as usize);
    let mut qcd_steps_encoded: Option<Vec<u16>> = None;

    for plane in &mut planes {
        if lossy {
            dwt::Dwt97::forward_2d(plane, width as usize, width as usize, height as usize, levels);
        } else {
            let mut ints: Vec<i32> = plane.iter().map(|&v| v.round() as i32).collect();
            dwt::Dwt53::forward_2d(&mut ints, width as usize, width as usize, height as usize, levels);
            for (dst, &src) in plane.iter_mut().zip(ints.iter()) {
                *dst = src as f32;
            }
        }

        let subbands = Component::plan_subbands(width, height, levels);
        let mut blocks = Vec::with_capacity(subbands.len());
        let mut steps_this_plane = Vec::with_capacity(subbands.len());

        for subband in &subbands {
            let step = quantization::step_size(subband.level, levels, subband.kind, base_step, !lossy);
            steps_this_plane.push(quantization::encode_step(step));
            let window = extract_window(plane, width as usize, subband.offset_x, subband.offset_y, subband.width, subband.height);
            let mut magnitudes = vec![0u32; window.len()];
            let mut signs = vec![false; window.len()];
            for (i, &v) in window.iter().enumerate() {
                let (mag, neg) = quantization::quantize(v, step);
                magnitudes[i] = mag;
                signs[i] = neg;
            }

            let coder = BitPlaneCoder::new(subband.kind);
            let mut subband_blocks = Vec::new();
            for (bx, by, bw, bh) in subband.block_origins() {
                let mut block_mag = Vec::with_capacity((bw * bh) as usize);
                let mut block_sign = Vec::with_capacity((bw * bh) as usize);
                for row in 0..bh {
                    let start = ((by + row) * subband.width + bx) as usize;
                    block_mag.extend_from_slice(&magnitudes[start..start + bw as usize]);
                    block_sign.extend_from_slice(&signs[start..start + bw as usize]);
                }
                let block = QuantizedBlock::new(bx, by, bw, bh, block_mag, block_sign);
                subband_blocks.push(coder.encode(&block));
            }
            blocks.push(subband_blocks);
        }

        if qcd_steps_encoded.is_none() {
            let ordered = qcd_order_subbands(&subbands, levels);
            let lookup: std::collections::HashMap<(u8, SubbandKind), u16> = subbands.iter().zip(steps_this_plane.iter()).map(|(s, &step)| ((s.level, s.kind), step)).collect();
            qcd_steps_encoded = Some(ordered.iter().map(|s| lookup[&(s.level, s.kind)]).collect());
        }

        encoded_components.push(EncodedComponent { subbands, blocks });
    }

    let mut out = Vec::new();
    codestream::write_marker(&mut out, codestream::SOC);
    codestream::write_siz(
        &mut out,
        &Siz {
            rsiz: 0,
            xsiz: width,
            ysiz: height,
            xosiz: 0,
            yosiz: 0,
            xtsiz: width,
            ytsiz: height,
            xtosiz: 0,
            ytosiz: 0,
            components: (0..components).map(|_| SizComponent { ssiz: 7, xrsiz: 1, yrsiz: 1 }).collect(),
        },
    );
    codestream::write_cod(
        &mut out,
        &Cod {
            scod: 0,
            progression_order: 0,
            num_layers: NUM_LAYERS as u16,
            mct: apply_mct as u8,
            levels,
            cb_width_exp: 6,
            cb_height_exp: 6,
            cb_style: 0,
            transform: lossy as u8,
        },
    );
    codestream::write_qcd(&mut out, &Qcd { sqcd: 0x42, steps: qcd_steps_encoded.unwrap_or_default() });

    let mut tile_body = Vec::new();
    for layer in 0..NUM_LAYERS {
        for resolution in 0..=levels {
            for component in &encoded_components {
                let targets = subbands_for_resolution(&component.subbands, levels, resolution);
                let mut packet = packet::Packet::default();
                for target in targets {
                    let idx = component.subbands.iter().position(|s| std::ptr::eq(s, target)).unwrap();
                    for block in &component.blocks[idx] {
                        let new_passes = if layer == 0 { block.pass_lengths.len().min(255) as u8 } else { 0 };
                        let data = if layer == 0 { block.data.clone() } else { Vec::new() };
                        packet.contributions.push(packet::Contribution { new_passes, data });
                    }
                }
                packet::write_packet(&mut tile_body, &packet, None);
            }
        }
    }

    codestream::write_sot(&mut out, &Sot { isot: 0, psot: 0, tpsot: 0, tnsot: 1 });
    codestream::write_marker(&mut out, codestream::SOD);
    out.extend_from_slice(&tile_body);
    codestream::write_marker(&mut out, codestream::EOC);

    Ok(out)
}

/// `j2k_decode(bytes) -> DecodedImage`.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage> {
    log::debug!("jpeg2000::decode: {} bytes", bytes.len());
    let mut reader = ByteReader::new(bytes);
    let soc = reader.read_u16_be()?;
    if soc != codestream::SOC {
        return Err(Error::Malformed("missing SOC marker"));
    }
    let siz = codestream::read_siz(&mut reader)?;
    let cod = codestream::read_cod(&mut reader)?;
    let qcd = codestream::read_qcd(&mut reader)?;

    check_dimensions(siz.xsiz, siz.ysiz)?;
    let width = siz.xsiz;
    let height = siz.ysiz;
    let components = siz.components.len() as u8;
    if components == 0 {
        return Err(Error::Malformed("SIZ declares zero components"));
    }
    let levels = cod.levels;
    if levels == 0 {
        return Err(Error::Malformed("COD declares zero decomposition levels"));
    }
    let lossy = cod.transform == 1;
    let apply_mct = cod.mct == 1 && components == 3;

    let sot = codestream::read_sot(&mut reader)?;
    if sot.tnsot != 0 && sot.tnsot != 1 {
        return Err(Error::Unsupported("multi-tile-part codestreams are not supported"));
    }
    let sod = reader.read_u16_be()?;
    if sod != codestream::SOD {
        return Err(Error::Malformed("missing SOD marker"));
    }

    let mut component_plan = Vec::with_capacity(components as usize);
    for _ in 0..components {
        let subbands = Component::plan_subbands(width, height, levels);
        let qcd_order = qcd_order_subbands(&subbands, levels);
        if qcd.steps.len() != qcd_order.len() {
            return Err(Error::Malformed("QCD step count does not match subband count"));
        }
        let mut step_by_key = std::collections::HashMap::new();
        for (subband, &encoded_step) in qcd_order.iter().zip(qcd.steps.iter()) {
            step_by_key.insert((subband.level, subband.kind), quantization::decode_step(encoded_step));
        }
        component_plan.push((subbands, step_by_key));
    }

    let mut planes: Vec<Vec<f32>> = (0..components).map(|_| vec![0.0f32; width as usize * height as usize]).collect();

    for layer in 0..NUM_LAYERS {
        for resolution in 0..=levels {
            for (component_idx, (subbands, steps)) in component_plan.iter().enumerate() {
                let targets = subbands_for_resolution(subbands, levels, resolution);
                let packet = packet::read_packet(&mut reader)?;
                let mut contribution_idx = 0usize;
                for subband in &targets {
                    let step = steps[&(subband.level, subband.kind)];
                    let mut magnitudes = vec![0u32; (subband.width * subband.height) as usize];
                    let mut signs = vec![false; (subband.width * subband.height) as usize];
                    let coder = BitPlaneCoder::new(subband.kind);

                    for (bx, by, bw, bh) in subband.block_origins() {
                        // An empty packet means every contribution was
                        // zero-pass; leave magnitudes/signs at their
                        // zero-initialized default without indexing.
                        if packet.contributions.is_empty() {
                            continue;
                        }
                        let contribution = packet.contributions.get(contribution_idx).ok_or(Error::Malformed("packet missing expected contribution"))?;
                        contribution_idx += 1;
                        if layer == 0 && contribution.new_passes > 0 {
                            let encoded = EncodedBlock { x: bx, y: by, width: bw, height: bh, bit_planes: estimate_bit_planes(contribution.new_passes), data: contribution.data.clone(), pass_lengths: vec![] };
                            let decoded_block = coder.decode(&encoded);
                            for row in 0..bh {
                                let dst_start = ((by + row) * subband.width + bx) as usize;
                                let src_start = (row * bw) as usize;
                                magnitudes[dst_start..dst_start + bw as usize].copy_from_slice(&decoded_block.magnitudes[src_start..src_start + bw as usize]);
                                signs[dst_start..dst_start + bw as usize].copy_from_slice(&decoded_block.signs[src_start..src_start + bw as usize]);
                            }
                        }
                    }

                    let mut window = vec![0.0f32; magnitudes.len()];
                    for i in 0..window.len() {
                        window[i] = quantization::dequantize(magnitudes[i], signs[i], step);
                    }
                    write_window(&mut planes[component_idx], width as usize, subband.offset_x, subband.offset_y, subband.width, subband.height, &window);
                }
            }
        }
    }

    for plane in &mut planes {
        if lossy {
            dwt::Dwt97::inverse_2d(plane, width as usize, width as usize, height as usize, levels);
        } else {
            let mut ints: Vec<i32> = plane.iter().map(|&v| v.round() as i32).collect();
            dwt::Dwt53::inverse_2d(&mut ints, width as usize, width as usize, height as usize, levels);
            for (dst, &src) in plane.iter_mut().zip(ints.iter()) {
                *dst = src as f32;
            }
        }
    }

    if apply_mct {
        let mut rgb = [planes[0].clone(), planes[1].clone(), planes[2].clone()];
        if lossy {
            inverse_ict(&mut rgb);
        } else {
            inverse_rct(&mut rgb);
        }
        planes[0] = rgb[0].clone();
        planes[1] = rgb[1].clone();
        planes[2] = rgb[2].clone();
    }

    let pixel_count = width as usize * height as usize;
    let mut pixels = vec![0u8; pixel_count * components as usize];
    for (c, plane) in planes.iter().enumerate() {
        let image = Image { width, height, samples: plane.clone() };
        let gray = image.into_gray();
        for i in 0..pixel_count {
            pixels[i * components as usize + c] = gray[i];
        }
    }

    Ok(DecodedImage { pixels, width, height, components })
}

/// Tier-1 needs `block.bit_planes` to size its padded state planes and pick
/// the first bit-plane to code; Tier-2 only records a pass count, not the
/// plane count directly, so this recovers the smallest plane count whose
/// three-passes-per-plane total could produce `new_passes` passes.
fn estimate_bit_planes(new_passes: u8) -> u8 {
    (new_passes as u32).div_ceil(3).min(32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(width: u32, height: u32) -> Vec<u8> {
        (0..(width * height)).map(|i| if (i % width + i / width) % 2 == 0 { 200 } else { 40 }).collect()
    }

    #[test]
    fn lossless_grayscale_round_trips_exactly() {
        let width = 16;
        let height = 16;
        let pixels = checkerboard(width, height);
        let bytes = encode(&pixels, width, height, 1, 100, false, 2, false).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.width, width);
        assert_eq!(decoded.height, height);
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn lossy_grayscale_round_trip_within_tolerance() {
        let width = 16;
        let height = 16;
        let pixels = checkerboard(width, height);
        let bytes = encode(&pixels, width, height, 1, 80, true, 2, false).unwrap();
        let decoded = decode(&bytes).unwrap();
        let mae: f64 = pixels.iter().zip(decoded.pixels.iter()).map(|(&a, &b)| (a as f64 - b as f64).abs()).sum::<f64>() / pixels.len() as f64;
        assert!(mae <= 5.0, "mean absolute error too high: {mae}");
    }

    #[test]
    fn lossless_rgb_round_trips_exactly_with_rct() {
        let width = 8;
        let height = 8;
        let mut pixels = Vec::new();
        for i in 0..(width * height) {
            pixels.extend_from_slice(&[(i * 3) as u8, (i * 5) as u8, (i * 7) as u8]);
        }
        let bytes = encode(&pixels, width, height, 3, 100, false, 1, true).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn rejects_mismatched_byte_length() {
        let result = encode(&[0u8; 10], 4, 4, 1, 80, true, 1, false);
        assert!(result.is_err());
    }
}
