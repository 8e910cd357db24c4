//! Discrete Wavelet Transform: CDF 9/7 (lossy) and CDF 5/3 (lossless) via lifting.
//!
//! Both transforms operate on a row-major buffer of `stride`-spaced rows,
//! applying the 1-D transform to every row then every column of the active
//! `width × height` region, then recursing on the resulting LL quadrant —
//! the lifting steps land the low-pass half at the front of each row/column
//! in place, so the LL quadrant is always the top-left corner already.

/// CDF 9/7 lifting coefficients (ISO/IEC 15444-1 Annex F.4.2).
const ALPHA: f32 = -1.586134342;
const BETA: f32 = -0.052980118;
const GAMMA: f32 = 0.882911075;
const DELTA: f32 = 0.443506852;
const K: f32 = 1.230174105;

pub struct Dwt97;

impl Dwt97 {
    fn forward_1d(t: &mut [f32]) {
        let n = t.len();
        if n < 2 {
            return;
        }
        for i in (1..n).step_by(2) {
            let left = t[i - 1];
            let right = if i + 1 < n { t[i + 1] } else { t[i - 1] };
            t[i] += ALPHA * (left + right);
        }
        for i in (0..n).step_by(2) {
            let left = if i > 0 { t[i - 1] } else { t[i + 1] };
            let right = if i + 1 < n { t[i + 1] } else { t[i - 1] };
            t[i] += BETA * (left + right);
        }
        for i in (1..n).step_by(2) {
            let left = t[i - 1];
            let right = if i + 1 < n { t[i + 1] } else { t[i - 1] };
            t[i] += GAMMA * (left + right);
        }
        for i in (0..n).step_by(2) {
            let left = if i > 0 { t[i - 1] } else { t[i + 1] };
            let right = if i + 1 < n { t[i + 1] } else { t[i - 1] };
            t[i] += DELTA * (left + right);
        }
        let mut low = Vec::with_capacity(n.div_ceil(2));
        let mut high = Vec::with_capacity(n / 2);
        for (i, &v) in t.iter().enumerate() {
            if i % 2 == 0 {
                low.push(v / K);
            } else {
                high.push(v * K);
            }
        }
        let l = low.len();
        t[..l].copy_from_slice(&low);
        t[l..].copy_from_slice(&high);
    }

    fn inverse_1d(t: &mut [f32]) {
        let n = t.len();
        if n < 2 {
            return;
        }
        let l = n.div_ceil(2);
        let mut x = vec![0f32; n];
        for i in 0..l {
            x[2 * i] = t[i] * K;
        }
        for i in 0..(n - l) {
            x[2 * i + 1] = t[l + i] / K;
        }
        for i in (0..n).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < n { x[i + 1] } else { x[i - 1] };
            x[i] -= DELTA * (left + right);
        }
        for i in (1..n).step_by(2) {
            let left = x[i - 1];
            let right = if i + 1 < n { x[i + 1] } else { x[i - 1] };
            x[i] -= GAMMA * (left + right);
        }
        for i in (0..n).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < n { x[i + 1] } else { x[i - 1] };
            x[i] -= BETA * (left + right);
        }
        for i in (1..n).step_by(2) {
            let left = x[i - 1];
            let right = if i + 1 < n { x[i + 1] } else { x[i - 1] };
            x[i] -= ALPHA * (left + right);
        }
        t.copy_from_slice(&x);
    }

    pub fn forward_2d(data: &mut [f32], stride: usize, width: usize, height: usize, levels: u8) {
        let (mut w, mut h) = (width, height);
        for _ in 0..levels {
            if w < 2 && h < 2 {
                break;
            }
            transform_rows(data, stride, w, h, Self::forward_1d);
            transform_cols(data, stride, w, h, Self::forward_1d);
            w = w.div_ceil(2);
            h = h.div_ceil(2);
        }
    }

    pub fn inverse_2d(data: &mut [f32], stride: usize, width: usize, height: usize, levels: u8) {
        let sizes = level_sizes(width, height, levels);
        for &(w, h) in sizes.iter().rev().skip(1) {
            transform_cols(data, stride, w, h, Self::inverse_1d);
            transform_rows(data, stride, w, h, Self::inverse_1d);
        }
    }
}

/// CDF 5/3 reversible lifting (integer arithmetic; exact inverse).
pub struct Dwt53;

impl Dwt53 {
    fn forward_1d(t: &mut [i32]) {
        let n = t.len();
        if n < 2 {
            return;
        }
        for i in (1..n).step_by(2) {
            let left = t[i - 1];
            let right = if i + 1 < n { t[i + 1] } else { t[i - 1] };
            t[i] -= (left + right) >> 1;
        }
        for i in (0..n).step_by(2) {
            let left = if i > 0 { t[i - 1] } else { t[i + 1] };
            let right = if i + 1 < n { t[i + 1] } else { t[i - 1] };
            t[i] += (left + right + 2) >> 2;
        }
        let mut low = Vec::with_capacity(n.div_ceil(2));
        let mut high = Vec::with_capacity(n / 2);
        for (i, &v) in t.iter().enumerate() {
            if i % 2 == 0 {
                low.push(v);
            } else {
                high.push(v);
            }
        }
        let l = low.len();
        t[..l].copy_from_slice(&low);
        t[l..].copy_from_slice(&high);
    }

    fn inverse_1d(t: &mut [i32]) {
        let n = t.len();
        if n < 2 {
            return;
        }
        let l = n.div_ceil(2);
        let mut x = vec![0i32; n];
        for i in 0..l {
            x[2 * i] = t[i];
        }
        for i in 0..(n - l) {
            x[2 * i + 1] = t[l + i];
        }
        for i in (0..n).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < n { x[i + 1] } else { x[i - 1] };
            x[i] -= (left + right + 2) >> 2;
        }
        for i in (1..n).step_by(2) {
            let left = x[i - 1];
            let right = if i + 1 < n { x[i + 1] } else { x[i - 1] };
            x[i] += (left + right) >> 1;
        }
        t.copy_from_slice(&x);
    }

    pub fn forward_2d(data: &mut [i32], stride: usize, width: usize, height: usize, levels: u8) {
        let (mut w, mut h) = (width, height);
        for _ in 0..levels {
            if w < 2 && h < 2 {
                break;
            }
            transform_rows(data, stride, w, h, Self::forward_1d);
            transform_cols(data, stride, w, h, Self::forward_1d);
            w = w.div_ceil(2);
            h = h.div_ceil(2);
        }
    }

    pub fn inverse_2d(data: &mut [i32], stride: usize, width: usize, height: usize, levels: u8) {
        let sizes = level_sizes(width, height, levels);
        for &(w, h) in sizes.iter().rev().skip(1) {
            transform_cols(data, stride, w, h, Self::inverse_1d);
            transform_rows(data, stride, w, h, Self::inverse_1d);
        }
    }
}

fn level_sizes(width: usize, height: usize, levels: u8) -> Vec<(usize, usize)> {
    let mut sizes = vec![(width, height)];
    let (mut w, mut h) = (width, height);
    for _ in 0..levels {
        if w < 2 && h < 2 {
            break;
        }
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        sizes.push((w, h));
    }
    sizes
}

fn transform_rows<T: Copy + Default>(
    data: &mut [T],
    stride: usize,
    width: usize,
    height: usize,
    f: impl Fn(&mut [T]),
) {
    if width < 2 {
        return;
    }
    let mut row = vec![T::default(); width];
    for y in 0..height {
        let start = y * stride;
        row.copy_from_slice(&data[start..start + width]);
        f(&mut row);
        data[start..start + width].copy_from_slice(&row);
    }
}

fn transform_cols<T: Copy + Default>(
    data: &mut [T],
    stride: usize,
    width: usize,
    height: usize,
    f: impl Fn(&mut [T]),
) {
    if height < 2 {
        return;
    }
    let mut col = vec![T::default(); height];
    for x in 0..width {
        for (y, slot) in col.iter_mut().enumerate() {
            *slot = data[y * stride + x];
        }
        f(&mut col);
        for (y, &v) in col.iter().enumerate() {
            data[y * stride + x] = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwt97_round_trip_within_tolerance() {
        let width = 8;
        let height = 8;
        let levels = 2;
        let original: Vec<f32> = (0..width * height).map(|i| (i as f32) * 3.0 - 50.0).collect();
        let mut data = original.clone();
        Dwt97::forward_2d(&mut data, width, width, height, levels);
        Dwt97::inverse_2d(&mut data, width, width, height, levels);
        for (a, b) in original.iter().zip(data.iter()) {
            let rel = (a - b).abs() / a.abs().max(1.0);
            assert!(rel < 1e-3, "a={a} b={b} rel={rel}");
        }
    }

    #[test]
    fn dwt53_round_trip_exact() {
        let width = 8;
        let height = 8;
        let levels = 2;
        let original: Vec<i32> = (0..width * height).map(|i| (i as i32) * 3 - 50).collect();
        let mut data = original.clone();
        Dwt53::forward_2d(&mut data, width, width, height, levels);
        Dwt53::inverse_2d(&mut data, width, width, height, levels);
        assert_eq!(original, data);
    }
}
