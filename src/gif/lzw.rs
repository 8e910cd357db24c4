//! Variable-width LZW over GIF's sub-block byte framing (§4.8).
//!
//! String reconstruction on decode walks the prefix chain into one shared
//! scratch buffer written back-to-front, per DESIGN NOTES §9 ("do not
//! allocate per-string") — a chain can be at most 4096 entries long, which
//! bounds the scratch buffer size statically.

use crate::bitio::{SubBlockBitReader, SubBlockBitWriter};
use crate::error::{Error, Result};
use std::collections::HashMap;

const DICT_CAPACITY: usize = 4096;
const MAX_ITERATIONS: u64 = 100_000_000;

struct Dictionary {
    prefix: [u16; DICT_CAPACITY],
    suffix: [u8; DICT_CAPACITY],
    clear: u16,
    next_code: u16,
}

impl Dictionary {
    fn new(min_code_size: u8) -> Self {
        let clear = 1u16 << min_code_size;
        let mut prefix = [0u16; DICT_CAPACITY];
        let mut suffix = [0u8; DICT_CAPACITY];
        for i in 0..clear as usize {
            prefix[i] = u16::MAX;
            suffix[i] = i as u8;
        }
        Self { prefix, suffix, clear, next_code: clear + 2 }
    }

    fn reset(&mut self) {
        self.next_code = self.clear + 2;
    }

    fn insert(&mut self, prefix_code: u16, suffix_byte: u8) -> bool {
        if (self.next_code as usize) >= DICT_CAPACITY {
            return false;
        }
        let idx = self.next_code as usize;
        self.prefix[idx] = prefix_code;
        self.suffix[idx] = suffix_byte;
        self.next_code += 1;
        true
    }

    /// Writes the string for `code` into the tail of `scratch`, returning
    /// `(start_index, first_char)`.
    fn expand(&self, code: u16, scratch: &mut [u8; DICT_CAPACITY]) -> Result<(usize, u8)> {
        let mut pos = DICT_CAPACITY;
        let mut c = code;
        loop {
            if pos == 0 {
                return Err(Error::Malformed("LZW prefix chain longer than dictionary capacity"));
            }
            pos -= 1;
            scratch[pos] = self.suffix[c as usize];
            if c < self.clear {
                return Ok((pos, scratch[pos]));
            }
            c = self.prefix[c as usize];
            if c == u16::MAX {
                return Err(Error::Malformed("broken LZW prefix chain"));
            }
        }
    }
}

/// Decodes a GIF LZW sub-block stream into raw indexed pixel bytes.
pub fn decode(min_code_size: u8, sub_blocks: &[u8]) -> Result<Vec<u8>> {
    if !(2..=11).contains(&min_code_size) {
        return Err(Error::Unsupported("LZW min code size outside [2, 11]"));
    }
    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    let mut code_size = min_code_size + 1;
    let mut code_mask = (1u16 << code_size) - 1;
    let mut dict = Dictionary::new(min_code_size);
    let mut reader = SubBlockBitReader::new(sub_blocks);
    let mut out = Vec::new();
    let mut scratch = [0u8; DICT_CAPACITY];
    let mut prev_code: i32 = -1;
    let mut first_char = 0u8;
    let mut iterations = 0u64;

    loop {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(Error::SafetyCeiling { limit: MAX_ITERATIONS, context: "GIF LZW decode" });
        }
        let code = match reader.read_code(code_size)? {
            Some(c) => c,
            None => return Err(Error::Truncated("LZW stream ended before end code")),
        };

        if code == end {
            break;
        }
        if code == clear {
            dict.reset();
            code_size = min_code_size + 1;
            code_mask = (1u16 << code_size) - 1;
            prev_code = -1;
            continue;
        }

        if (code as usize) < dict.next_code as usize {
            let (start, fc) = dict.expand(code, &mut scratch)?;
            out.extend_from_slice(&scratch[start..]);
            first_char = fc;
        } else if code == dict.next_code && prev_code >= 0 {
            let (start, fc) = dict.expand(prev_code as u16, &mut scratch)?;
            out.extend_from_slice(&scratch[start..]);
            out.push(first_char);
            let _ = fc;
        } else {
            return Err(Error::Malformed("invalid LZW code"));
        }

        if prev_code >= 0 && dict.insert(prev_code as u16, first_char) {
            if dict.next_code > code_mask && code_size < 12 {
                code_size += 1;
                code_mask = (1u16 << code_size) - 1;
            }
        }
        prev_code = code as i32;
    }
    Ok(out)
}

/// Encodes raw indexed pixel bytes into a GIF LZW sub-block stream,
/// including the leading clear code and trailing sub-block terminator.
pub fn encode(min_code_size: u8, data: &[u8]) -> Vec<u8> {
    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    let mut code_size = min_code_size + 1;
    let mut code_mask = (1u16 << code_size) - 1;
    let mut next_code = end + 1;
    let mut table: HashMap<(u16, u8), u16> = HashMap::new();
    let mut writer = SubBlockBitWriter::new();
    writer.write_code(clear, code_size);

    let mut current: Option<u16> = None;
    for &byte in data {
        match current {
            None => current = Some(byte as u16),
            Some(cur) => {
                if let Some(&next) = table.get(&(cur, byte)) {
                    current = Some(next);
                } else {
                    writer.write_code(cur, code_size);
                    if (next_code as usize) < DICT_CAPACITY {
                        table.insert((cur, byte), next_code);
                        next_code += 1;
                        if next_code > code_mask && code_size < 12 {
                            code_size += 1;
                            code_mask = (1u16 << code_size) - 1;
                        }
                    } else {
                        writer.write_code(clear, code_size);
                        table.clear();
                        next_code = end + 1;
                        code_size = min_code_size + 1;
                        code_mask = (1u16 << code_size) - 1;
                    }
                    current = Some(byte as u16);
                }
            }
        }
    }
    if let Some(cur) = current {
        writer.write_code(cur, code_size);
    }
    writer.write_code(end, code_size);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty() {
        let encoded = encode(4, &[]);
        let decoded = decode(4, &encoded).unwrap();
        assert_eq!(decoded, Vec::<u8>::new());
    }

    #[test]
    fn round_trip_repetitive_data() {
        for min_code_size in 2..=8u8 {
            let data: Vec<u8> = (0..2000).map(|i| ((i / 7) % (1u32 << min_code_size)) as u8).collect();
            let encoded = encode(min_code_size, &data);
            let decoded = decode(min_code_size, &encoded).unwrap();
            assert_eq!(decoded, data, "min_code_size={min_code_size}");
        }
    }

    #[test]
    fn round_trip_random_data() {
        let mut state = 12345u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as u32
        };
        let min_code_size = 8u8;
        let data: Vec<u8> = (0..5000).map(|_| (next() % 256) as u8).collect();
        let encoded = encode(min_code_size, &data);
        let decoded = decode(min_code_size, &encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn clear_code_forces_dictionary_reset() {
        // Force a small dictionary to fill quickly and trigger the
        // clear-and-reset path deterministically.
        let min_code_size = 2u8;
        let data: Vec<u8> = (0..500).map(|i| (i % 4) as u8).collect();
        let encoded = encode(min_code_size, &data);
        let decoded = decode(min_code_size, &encoded).unwrap();
        assert_eq!(decoded, data);
    }
}
