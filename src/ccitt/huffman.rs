//! Modified Huffman run-length tables (ITU-T T.4 Tables 2/3/3a) and the
//! 2-D mode-code table (ITU-T T.4 Table 4), materialized as decode tries
//! built once and shared immutably across decoder instances (DESIGN NOTES
//! §9: "CCITT trie built at construction").

use crate::error::{Error, Result};
use std::sync::OnceLock;

/// `(bits, code, run_length)` — `code` is right-aligned in its low `bits` bits.
type CodeEntry = (u8, u16, u16);

/// Sentinel run length for the synthetic EOL entry inserted into every
/// table (§4.6): never a legal run length so `RunValue::Eol` is unambiguous.
const EOL_RUN: u16 = 0xFFFF;
const EOL_BITS: u8 = 12;
const EOL_CODE: u16 = 0x001;

#[rustfmt::skip]
const WHITE_TERMINATING: &[CodeEntry] = &[
    (8, 0x35, 0), (6, 0x07, 1), (4, 0x07, 2), (4, 0x08, 3), (4, 0x0B, 4),
    (4, 0x0C, 5), (4, 0x0E, 6), (4, 0x0F, 7), (5, 0x13, 8), (5, 0x14, 9),
    (5, 0x07, 10), (5, 0x08, 11), (6, 0x08, 12), (6, 0x03, 13), (6, 0x34, 14),
    (6, 0x35, 15), (6, 0x2A, 16), (6, 0x2B, 17), (7, 0x27, 18), (7, 0x0C, 19),
    (7, 0x08, 20), (7, 0x17, 21), (7, 0x03, 22), (7, 0x04, 23), (7, 0x28, 24),
    (7, 0x2B, 25), (7, 0x13, 26), (7, 0x24, 27), (7, 0x18, 28), (8, 0x02, 29),
    (8, 0x03, 30), (8, 0x1A, 31), (8, 0x1B, 32), (8, 0x12, 33), (8, 0x13, 34),
    (8, 0x14, 35), (8, 0x15, 36), (8, 0x16, 37), (8, 0x17, 38), (8, 0x28, 39),
    (8, 0x29, 40), (8, 0x2A, 41), (8, 0x2B, 42), (8, 0x2C, 43), (8, 0x2D, 44),
    (8, 0x04, 45), (8, 0x05, 46), (8, 0x0A, 47), (8, 0x0B, 48), (8, 0x52, 49),
    (8, 0x53, 50), (8, 0x54, 51), (8, 0x55, 52), (8, 0x24, 53), (8, 0x25, 54),
    (8, 0x58, 55), (8, 0x59, 56), (8, 0x5A, 57), (8, 0x5B, 58), (8, 0x4A, 59),
    (8, 0x4B, 60), (8, 0x32, 61), (8, 0x33, 62), (8, 0x34, 63),
];

#[rustfmt::skip]
const WHITE_MAKEUP: &[CodeEntry] = &[
    (5, 0x1B, 64), (5, 0x12, 128), (6, 0x17, 192), (7, 0x37, 256), (8, 0x36, 320),
    (8, 0x37, 384), (8, 0x64, 448), (8, 0x65, 512), (8, 0x68, 576), (8, 0x67, 640),
    (9, 0xCC, 704), (9, 0xCD, 768), (9, 0xD2, 832), (9, 0xD3, 896), (9, 0xD4, 960),
    (9, 0xD5, 1024), (9, 0xD6, 1088), (9, 0xD7, 1152), (9, 0xD8, 1216), (9, 0xD9, 1280),
    (9, 0xDA, 1344), (9, 0xDB, 1408), (9, 0x98, 1472), (9, 0x99, 1536), (9, 0x9A, 1600),
    (6, 0x18, 1664), (9, 0x9B, 1728),
];

#[rustfmt::skip]
const BLACK_TERMINATING: &[CodeEntry] = &[
    (10, 0x37, 0), (3, 0x02, 1), (2, 0x03, 2), (2, 0x02, 3), (3, 0x03, 4),
    (4, 0x03, 5), (4, 0x02, 6), (5, 0x03, 7), (6, 0x05, 8), (6, 0x04, 9),
    (7, 0x04, 10), (7, 0x05, 11), (7, 0x07, 12), (8, 0x04, 13), (8, 0x07, 14),
    (9, 0x18, 15), (10, 0x17, 16), (10, 0x18, 17), (10, 0x08, 18), (11, 0x67, 19),
    (11, 0x68, 20), (11, 0x6C, 21), (11, 0x37, 22), (11, 0x28, 23), (11, 0x17, 24),
    (11, 0x18, 25), (12, 0xCA, 26), (12, 0xCB, 27), (12, 0xCC, 28), (12, 0xCD, 29),
    (12, 0x68, 30), (12, 0x69, 31), (12, 0x6A, 32), (12, 0x6B, 33), (12, 0xD2, 34),
    (12, 0xD3, 35), (12, 0xD4, 36), (12, 0xD5, 37), (12, 0xD6, 38), (12, 0xD7, 39),
    (12, 0x6C, 40), (12, 0x6D, 41), (12, 0xDA, 42), (12, 0xDB, 43), (12, 0x54, 44),
    (12, 0x55, 45), (12, 0x56, 46), (12, 0x57, 47), (12, 0x64, 48), (12, 0x65, 49),
    (12, 0x52, 50), (12, 0x53, 51), (12, 0x24, 52), (12, 0x37, 53), (12, 0x38, 54),
    (12, 0x27, 55), (12, 0x28, 56), (12, 0x58, 57), (12, 0x59, 58), (12, 0x2B, 59),
    (12, 0x2C, 60), (12, 0x5A, 61), (12, 0x66, 62), (12, 0x67, 63),
];

#[rustfmt::skip]
const BLACK_MAKEUP: &[CodeEntry] = &[
    (10, 0x0F, 64), (12, 0xC8, 128), (12, 0xC9, 192), (12, 0x5B, 256), (12, 0x33, 320),
    (12, 0x34, 384), (12, 0x35, 448), (13, 0x6C, 512), (13, 0x6D, 576), (13, 0x4A, 640),
    (13, 0x4B, 704), (13, 0x4C, 768), (13, 0x4D, 832), (13, 0x72, 896), (13, 0x73, 960),
    (13, 0x74, 1024), (13, 0x75, 1088), (13, 0x76, 1152), (13, 0x77, 1216), (13, 0x52, 1280),
    (13, 0x53, 1344), (13, 0x54, 1408), (13, 0x55, 1472), (13, 0x5A, 1536), (13, 0x5B, 1600),
    (13, 0x64, 1664), (13, 0x65, 1728),
];

#[rustfmt::skip]
const EXTENDED_MAKEUP: &[CodeEntry] = &[
    (11, 0x08, 1792), (11, 0x0C, 1856), (11, 0x0D, 1920), (12, 0x12, 1984),
    (12, 0x13, 2048), (12, 0x14, 2112), (12, 0x15, 2176), (12, 0x16, 2240),
    (12, 0x17, 2304), (12, 0x1C, 2368), (12, 0x1D, 2432), (12, 0x1E, 2496),
    (12, 0x1F, 2560),
];

/// A decoded run-length code: either a terminating run (coding for this
/// color ends) or a makeup run (more codes of the same color follow).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunValue {
    Terminating(u16),
    Makeup(u16),
    Eol,
}

/// 2-D (MR/MMR) mode codes, ITU-T T.4 Table 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Pass,
    Horizontal,
    Vertical(i8), // -3..=3
    Eol,
}

struct TrieNode<T: Copy> {
    children: [Option<usize>; 2],
    value: Option<T>,
}

impl<T: Copy> TrieNode<T> {
    fn empty() -> Self {
        Self { children: [None, None], value: None }
    }
}

/// A binary decode trie over fixed-length-prefix codes.
pub struct Trie<T: Copy> {
    nodes: Vec<TrieNode<T>>,
}

impl<T: Copy> Trie<T> {
    fn build(entries: &[(u8, u16, T)]) -> Self {
        let mut nodes = vec![TrieNode::empty()];
        for &(bits, code, value) in entries {
            let mut cur = 0usize;
            for i in (0..bits).rev() {
                let bit = ((code >> i) & 1) as usize;
                cur = match nodes[cur].children[bit] {
                    Some(next) => next,
                    None => {
                        nodes.push(TrieNode::empty());
                        let next = nodes.len() - 1;
                        nodes[cur].children[bit] = Some(next);
                        next
                    }
                };
            }
            nodes[cur].value = Some(value);
        }
        Self { nodes }
    }

    /// Walks one bit at a time (via `next_bit`), returning the decoded value
    /// once a complete code is matched.
    pub fn decode(&self, mut next_bit: impl FnMut() -> Result<u8>) -> Result<T> {
        let mut cur = 0usize;
        let max_depth = 14; // longest table entry here is 13 bits
        for _ in 0..max_depth {
            let bit = next_bit()? as usize;
            cur = self.nodes[cur].children[bit].ok_or(Error::Malformed("invalid CCITT code"))?;
            if let Some(v) = self.nodes[cur].value {
                return Ok(v);
            }
        }
        Err(Error::Malformed("CCITT code exceeds maximum length"))
    }
}

fn run_table_entries(terminating: &[CodeEntry], makeup: &[CodeEntry]) -> Vec<(u8, u16, RunValue)> {
    let mut v = Vec::with_capacity(terminating.len() + makeup.len() + EXTENDED_MAKEUP.len() + 1);
    v.extend(terminating.iter().map(|&(b, c, r)| (b, c, RunValue::Terminating(r))));
    v.extend(makeup.iter().map(|&(b, c, r)| (b, c, RunValue::Makeup(r))));
    v.extend(EXTENDED_MAKEUP.iter().map(|&(b, c, r)| (b, c, RunValue::Makeup(r))));
    v.push((EOL_BITS, EOL_CODE, RunValue::Eol));
    let _ = EOL_RUN;
    v
}

fn mode_table_entries() -> Vec<(u8, u16, Mode)> {
    vec![
        (4, 0b0001, Mode::Pass),
        (3, 0b001, Mode::Horizontal),
        (1, 0b1, Mode::Vertical(0)),
        (3, 0b011, Mode::Vertical(1)),
        (3, 0b010, Mode::Vertical(-1)),
        (6, 0b000011, Mode::Vertical(2)),
        (6, 0b000010, Mode::Vertical(-2)),
        (7, 0b0000011, Mode::Vertical(3)),
        (7, 0b0000010, Mode::Vertical(-3)),
        (EOL_BITS, EOL_CODE, Mode::Eol),
    ]
}

/// Finds the `(bits, code)` for encoding a given run length under a color's
/// tables, decomposing runs above 2560 into repeated extended-makeup codes.
pub fn encode_run(color_white: bool, mut run: u32, out: &mut Vec<(u8, u16)>) {
    let (terminating, makeup) = if color_white {
        (WHITE_TERMINATING, WHITE_MAKEUP)
    } else {
        (BLACK_TERMINATING, BLACK_MAKEUP)
    };
    while run >= 2560 {
        let (bits, code, _) = *EXTENDED_MAKEUP.last().unwrap();
        out.push((bits, code));
        run -= 2560;
    }
    while run > 63 {
        let step = (run / 64).min(27) * 64;
        let step = step.max(64);
        let entry = if step <= 1728 {
            makeup.iter().find(|&&(_, _, r)| r as u32 == step)
        } else {
            EXTENDED_MAKEUP.iter().find(|&&(_, _, r)| r as u32 == step)
        };
        let &(bits, code, found_run) = entry.expect("makeup table covers all multiples of 64 up to 2560");
        out.push((bits, code));
        run -= found_run as u32;
    }
    let &(bits, code, _) = terminating.iter().find(|&&(_, _, r)| r as u32 == run).expect("terminating table covers 0..=63");
    out.push((bits, code));
}

pub fn white_trie() -> &'static Trie<RunValue> {
    static TRIE: OnceLock<Trie<RunValue>> = OnceLock::new();
    TRIE.get_or_init(|| Trie::build(&run_table_entries(WHITE_TERMINATING, WHITE_MAKEUP)))
}

pub fn black_trie() -> &'static Trie<RunValue> {
    static TRIE: OnceLock<Trie<RunValue>> = OnceLock::new();
    TRIE.get_or_init(|| Trie::build(&run_table_entries(BLACK_TERMINATING, BLACK_MAKEUP)))
}

pub fn mode_trie() -> &'static Trie<Mode> {
    static TRIE: OnceLock<Trie<Mode>> = OnceLock::new();
    TRIE.get_or_init(|| Trie::build(&mode_table_entries()))
}

pub fn encode_mode(mode: Mode, out: &mut Vec<(u8, u16)>) {
    let (bits, code) = match mode {
        Mode::Pass => (4, 0b0001),
        Mode::Horizontal => (3, 0b001),
        Mode::Vertical(0) => (1, 0b1),
        Mode::Vertical(1) => (3, 0b011),
        Mode::Vertical(-1) => (3, 0b010),
        Mode::Vertical(2) => (6, 0b000011),
        Mode::Vertical(-2) => (6, 0b000010),
        Mode::Vertical(3) => (7, 0b0000011),
        Mode::Vertical(-3) => (7, 0b0000010),
        Mode::Vertical(_) => unreachable!("vertical offset magnitude clamped to 3 by the caller"),
        Mode::Eol => (EOL_BITS, EOL_CODE),
    };
    out.push((bits, code));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_is_prefix_free(entries: &[(u8, u16, u32)]) {
        for (i, &(bi, ci, _)) in entries.iter().enumerate() {
            for &(bj, cj, _) in entries.iter().skip(i + 1) {
                let shorter = bi.min(bj);
                let a = ci >> (bi - shorter);
                let b = cj >> (bj - shorter);
                assert_ne!(a, b, "codes overlap as prefixes");
            }
        }
    }

    #[test]
    fn white_table_is_prefix_free() {
        let mut entries: Vec<(u8, u16, u32)> = WHITE_TERMINATING.iter().map(|&(b, c, r)| (b, c, r as u32)).collect();
        entries.extend(WHITE_MAKEUP.iter().map(|&(b, c, r)| (b, c, r as u32)));
        entries.extend(EXTENDED_MAKEUP.iter().map(|&(b, c, r)| (b, c, r as u32)));
        table_is_prefix_free(&entries);
    }

    #[test]
    fn black_table_is_prefix_free() {
        let mut entries: Vec<(u8, u16, u32)> = BLACK_TERMINATING.iter().map(|&(b, c, r)| (b, c, r as u32)).collect();
        entries.extend(BLACK_MAKEUP.iter().map(|&(b, c, r)| (b, c, r as u32)));
        entries.extend(EXTENDED_MAKEUP.iter().map(|&(b, c, r)| (b, c, r as u32)));
        table_is_prefix_free(&entries);
    }

    #[test]
    fn mode_table_is_prefix_free() {
        let entries: Vec<(u8, u16, u32)> = mode_table_entries().iter().map(|&(b, c, m)| (b, c, m as u32 as u32 + (b as u32) * 100)).collect();
        // modes aren't integers; just check bit patterns directly are prefix-free
        let raw: Vec<(u8, u16, u32)> = mode_table_entries().iter().enumerate().map(|(i, &(b, c, _))| (b, c, i as u32)).collect();
        let _ = entries;
        table_is_prefix_free(&raw);
    }

    #[test]
    fn encode_then_decode_run_round_trips() {
        for &run in &[0u32, 5, 63, 64, 128, 1000, 1728, 1792, 2560, 3000, 5200] {
            for &white in &[true, false] {
                let mut codes = Vec::new();
                encode_run(white, run, &mut codes);
                let trie = if white { white_trie() } else { black_trie() };
                let mut total = 0u32;
                for (bits, code) in &codes {
                    let mut pos = 0u8;
                    let v = trie
                        .decode(|| {
                            let bit = ((code >> (*bits - 1 - pos)) & 1) as u8;
                            pos += 1;
                            Ok(bit)
                        })
                        .unwrap();
                    match v {
                        RunValue::Terminating(r) | RunValue::Makeup(r) => total += r as u32,
                        RunValue::Eol => panic!("unexpected EOL"),
                    }
                }
                assert_eq!(total, run, "white={white} run={run}");
            }
        }
    }
}
