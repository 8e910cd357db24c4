//! End-to-end scenarios spanning more than one module's public surface.

use imaging_codecs::ccitt::{CcittOptions, Group};
use imaging_codecs::gif::{GifFile, GifImage};
use imaging_codecs::jpeg2000::mq_coder::{MqDecoder, MqEncoder};
use imaging_codecs::tga::TgaImage;
use imaging_codecs::{ccitt_decode, ccitt_encode, gif_decode, j2k_decode, j2k_encode, tga_decode, tga_encode};

#[test]
fn j2k_lossless_4x4_round_trips_exactly() {
    let pixels: Vec<u8> = (0..16).collect();
    let encoded = j2k_encode(&pixels, 4, 4, 1, 100, false, 1, false).unwrap();
    let decoded = j2k_decode(&encoded).unwrap();
    assert_eq!(decoded.width, 4);
    assert_eq!(decoded.height, 4);
    assert_eq!(decoded.pixels, pixels);
}

#[test]
fn j2k_lossy_checkerboard_round_trips_within_tolerance() {
    let mut pixels = vec![0u8; 16 * 16];
    for y in 0..16u32 {
        for x in 0..16u32 {
            let tile = (x / 8 + y / 8) % 2;
            pixels[(y * 16 + x) as usize] = if tile == 0 { 0 } else { 255 };
        }
    }
    let encoded = j2k_encode(&pixels, 16, 16, 1, 75, true, 2, false).unwrap();
    let decoded = j2k_decode(&encoded).unwrap();
    let total_error: i64 = pixels
        .iter()
        .zip(decoded.pixels.iter())
        .map(|(&a, &b)| (a as i64 - b as i64).abs())
        .sum();
    let mae = total_error as f64 / pixels.len() as f64;
    assert!(mae <= 5.0, "mean absolute error {mae} exceeds tolerance");
}

fn shifting_dot_bitmap(width: u32, rows: usize) -> Vec<u8> {
    let stride = (width as usize).div_ceil(8);
    let mut bitmap = vec![0u8; stride * rows];
    for (row, chunk) in bitmap.chunks_mut(stride).enumerate().skip(1) {
        let col = (row - 1) % width as usize;
        chunk[col / 8] |= 0x80 >> (col % 8);
    }
    bitmap
}

#[test]
fn ccitt_shifting_dot_round_trips_across_all_three_groups() {
    let width = 1728;
    let rows = 10;
    let bitmap = shifting_dot_bitmap(width, rows);

    for group in [Group::Group4, Group::Group3OneD, Group::Group3TwoD { k: 4 }] {
        for black_is_1 in [false, true] {
            let options = CcittOptions { group: group.clone(), width, height: rows as u32, black_is_1, ..Default::default() };
            let encoded = ccitt_encode(&bitmap, rows as u32, &options).unwrap();
            let decoded = ccitt_decode(&encoded, &options).unwrap();
            assert_eq!(decoded, bitmap, "mismatch for group {group:?} black_is_1={black_is_1}");
        }
    }
}

#[test]
fn ccitt_round_trips_across_widths_and_polarities() {
    for &width in &[1u32, 7, 8, 9, 1728, 2560, 10000] {
        for black_is_1 in [false, true] {
            let rows = 5;
            let bitmap = shifting_dot_bitmap(width, rows);
            let options = CcittOptions { group: Group::Group4, width, height: rows as u32, black_is_1, ..Default::default() };
            let encoded = ccitt_encode(&bitmap, rows as u32, &options).unwrap();
            let decoded = ccitt_decode(&encoded, &options).unwrap();
            assert_eq!(decoded, bitmap, "mismatch for width={width} black_is_1={black_is_1}");
        }
    }
}

#[test]
fn gif_two_frame_decode_reports_correct_pixels_and_no_loop() {
    let red_square = GifFile {
        frames: vec![
            GifImage { width: 4, height: 4, pixels: vec![0, 0, 255, 255].repeat(16), delay_ms: 0 },
            GifImage { width: 4, height: 4, pixels: vec![0, 0, 255, 255].repeat(16), delay_ms: 0 },
        ],
        loop_count: 0,
    };
    let encoded = imaging_codecs::gif_encode(&red_square, 2).unwrap();
    let decoded = gif_decode(&encoded).unwrap();
    assert_eq!(decoded.frames.len(), 2);
    assert_eq!(decoded.loop_count, 0);
    for frame in &decoded.frames {
        for px in frame.pixels.chunks(4) {
            assert_eq!(px, &[0, 0, 255, 255]);
        }
    }
}

#[test]
fn tga_single_run_length_packet_expands_to_128_pixels() {
    let mut bytes = vec![0u8; 18];
    bytes[2] = 10; // true-color RLE
    bytes[12] = 128;
    bytes[13] = 0;
    bytes[14] = 1;
    bytes[15] = 0;
    bytes[16] = 24;
    bytes[17] = 0x20; // top-down
    bytes.push(0x80 | 127); // run header: count = 128
    bytes.extend_from_slice(&[0, 0, 255]); // BGR

    let decoded = tga_decode(&bytes).unwrap();
    assert_eq!(decoded.width, 128);
    assert_eq!(decoded.height, 1);
    for px in decoded.pixels.chunks(4) {
        assert_eq!(px, &[0, 0, 255, 255]);
    }
}

#[test]
fn tga_encode_decode_round_trip_preserves_pixels() {
    let image = TgaImage { width: 2, height: 2, pixels: vec![10, 20, 30, 255].repeat(4), bits_per_pixel: 32 };
    let encoded = tga_encode(&image, 32, true).unwrap();
    let decoded = tga_decode(&encoded).unwrap();
    assert_eq!(decoded.pixels, image.pixels);
}

#[test]
fn mq_coder_round_trips_literal_bit_sequence() {
    let bits = [1u8, 0, 1, 1, 0, 0, 0, 1];
    let mut encoder = MqEncoder::new(1);
    encoder.set_context(0, 0, 0);
    for &bit in &bits {
        encoder.encode(bit, 0);
    }
    let encoded = encoder.finish();

    let mut decoder = MqDecoder::new(&encoded, 1);
    decoder.set_context(0, 0, 0);
    let decoded: Vec<u8> = (0..bits.len()).map(|_| decoder.decode(0)).collect();
    assert_eq!(decoded, bits);
}
