//! Image, component, subband, and code-block data model.
//!
//! `CodeBlock` is deliberately split by pipeline stage instead of being one
//! struct with fields that get filled in as encoding progresses:
//! [`QuantizedBlock`] holds magnitude/sign planes awaiting Tier-1 coding,
//! [`EncodedBlock`] holds the Tier-1 output. Ownership moves from one to the
//! other; there is no "not yet populated" state to account for.

pub const CODE_BLOCK_SIZE: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubbandKind {
    Ll,
    Hl,
    Lh,
    Hh,
}

/// A single-component grayscale image, level-shifted to a signed
/// representation centered on zero before the wavelet transform.
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<f32>,
}

impl Image {
    pub fn from_gray(width: u32, height: u32, samples: &[u8]) -> Self {
        let shifted = samples.iter().map(|&s| s as f32 - 128.0).collect();
        Self { width, height, samples: shifted }
    }

    pub fn into_gray(self) -> Vec<u8> {
        self.samples
            .iter()
            .map(|&v| (v + 128.0).round().clamp(0.0, 255.0) as u8)
            .collect()
    }
}

/// One code-block's pending Tier-1 input: a rectangular patch of a subband's
/// coefficient magnitudes and signs, plus the bit-plane count derived from
/// the largest magnitude in the block.
pub struct QuantizedBlock {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub magnitudes: Vec<u32>,
    pub signs: Vec<bool>,
    pub bit_planes: u8,
}

impl QuantizedBlock {
    pub fn new(x: u32, y: u32, width: u32, height: u32, magnitudes: Vec<u32>, signs: Vec<bool>) -> Self {
        let max_mag = magnitudes.iter().copied().max().unwrap_or(0);
        let bit_planes = if max_mag == 0 { 0 } else { 32 - max_mag.leading_zeros() as u8 };
        Self { x, y, width, height, magnitudes, signs, bit_planes }
    }
}

/// Output of Tier-1 coding for one code-block: the MQ-coded bytes plus the
/// per-pass length prefix Tier-2 needs for rate allocation.
pub struct EncodedBlock {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub bit_planes: u8,
    pub data: Vec<u8>,
    pub pass_lengths: Vec<u32>,
}

pub struct Subband {
    pub kind: SubbandKind,
    pub level: u8,
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub step: f32,
}

impl Subband {
    /// Iterates code-block origins (in subband-local coordinates) covering
    /// this subband, each at most `CODE_BLOCK_SIZE` on a side.
    pub fn block_origins(&self) -> Vec<(u32, u32, u32, u32)> {
        let mut out = Vec::new();
        let cb = CODE_BLOCK_SIZE as u32;
        let mut y = 0;
        while y < self.height {
            let h = cb.min(self.height - y);
            let mut x = 0;
            while x < self.width {
                let w = cb.min(self.width - x);
                out.push((x, y, w, h));
                x += cb;
            }
            y += cb;
        }
        out
    }
}

pub struct Component {
    pub width: u32,
    pub height: u32,
    pub num_levels: u8,
    pub subbands: Vec<Subband>,
}

impl Component {
    /// Builds the subband geometry for a `width × height` component
    /// decomposed `num_levels` times. Exactly `3*num_levels + 1` subbands
    /// result: one LL at the deepest level, HL/LH/HH at every level.
    pub fn plan_subbands(width: u32, height: u32, num_levels: u8) -> Vec<Subband> {
        let mut subbands = Vec::new();
        let (mut w, mut h) = (width, height);
        let mut level = 0u8;
        while level < num_levels {
            let ll_w = w.div_ceil(2);
            let ll_h = h.div_ceil(2);
            let hl_w = w - ll_w;
            let lh_h = h - ll_h;
            subbands.push(Subband { kind: SubbandKind::Hl, level, width: hl_w, height: ll_h, offset_x: ll_w, offset_y: 0, step: 1.0 });
            subbands.push(Subband { kind: SubbandKind::Lh, level, width: ll_w, height: lh_h, offset_x: 0, offset_y: ll_h, step: 1.0 });
            subbands.push(Subband { kind: SubbandKind::Hh, level, width: hl_w, height: lh_h, offset_x: ll_w, offset_y: ll_h, step: 1.0 });
            w = ll_w;
            h = ll_h;
            level += 1;
        }
        subbands.push(Subband { kind: SubbandKind::Ll, level: num_levels, width: w, height: h, offset_x: 0, offset_y: 0, step: 1.0 });
        subbands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subband_count_matches_invariant() {
        let subbands = Component::plan_subbands(64, 64, 3);
        assert_eq!(subbands.len(), 3 * 3 + 1);
    }

    #[test]
    fn block_origins_cover_subband_without_overlap() {
        let subbands = Component::plan_subbands(200, 150, 1);
        let hl = subbands.iter().find(|s| s.kind == SubbandKind::Hl).unwrap();
        let origins = hl.block_origins();
        let covered: u64 = origins.iter().map(|&(_, _, w, h)| (w * h) as u64).sum();
        assert_eq!(covered, (hl.width * hl.height) as u64);
    }

    #[test]
    fn gray_level_shift_round_trips() {
        let samples = vec![0u8, 128, 255, 64];
        let image = Image::from_gray(2, 2, &samples);
        assert_eq!(image.into_gray(), samples);
    }
}
