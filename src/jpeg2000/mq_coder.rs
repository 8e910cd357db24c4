//! MQ arithmetic coder: a context-adaptive binary arithmetic coder
//! (ISO/IEC 15444-1 Annex C). Table-driven, OpenJPEG-compatible register
//! convention: MPS occupies `[0, A-Qe)`, LPS occupies `[A-Qe, A)`.

#[derive(Clone, Copy)]
struct MqState {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: u8,
}

/// Standard Table C-2 of the MQ coder specification.
const MQ_TABLE: [MqState; 47] = [
    MqState { qe: 0x5601, nmps: 1, nlps: 1, switch: 1 },
    MqState { qe: 0x3401, nmps: 2, nlps: 6, switch: 0 },
    MqState { qe: 0x1801, nmps: 3, nlps: 9, switch: 0 },
    MqState { qe: 0x0AC1, nmps: 4, nlps: 12, switch: 0 },
    MqState { qe: 0x0521, nmps: 5, nlps: 29, switch: 0 },
    MqState { qe: 0x0221, nmps: 38, nlps: 33, switch: 0 },
    MqState { qe: 0x5601, nmps: 7, nlps: 6, switch: 1 },
    MqState { qe: 0x5401, nmps: 8, nlps: 14, switch: 0 },
    MqState { qe: 0x4801, nmps: 9, nlps: 14, switch: 0 },
    MqState { qe: 0x3801, nmps: 10, nlps: 14, switch: 0 },
    MqState { qe: 0x3001, nmps: 11, nlps: 17, switch: 0 },
    MqState { qe: 0x2401, nmps: 12, nlps: 18, switch: 0 },
    MqState { qe: 0x1C01, nmps: 13, nlps: 20, switch: 0 },
    MqState { qe: 0x1601, nmps: 29, nlps: 21, switch: 0 },
    MqState { qe: 0x5601, nmps: 15, nlps: 14, switch: 1 },
    MqState { qe: 0x5401, nmps: 16, nlps: 14, switch: 0 },
    MqState { qe: 0x5101, nmps: 17, nlps: 15, switch: 0 },
    MqState { qe: 0x4801, nmps: 18, nlps: 16, switch: 0 },
    MqState { qe: 0x3801, nmps: 19, nlps: 17, switch: 0 },
    MqState { qe: 0x3401, nmps: 20, nlps: 18, switch: 0 },
    MqState { qe: 0x3001, nmps: 21, nlps: 19, switch: 0 },
    MqState { qe: 0x2801, nmps: 22, nlps: 19, switch: 0 },
    MqState { qe: 0x2401, nmps: 23, nlps: 19, switch: 0 },
    MqState { qe: 0x2201, nmps: 24, nlps: 19, switch: 0 },
    MqState { qe: 0x1C01, nmps: 25, nlps: 20, switch: 0 },
    MqState { qe: 0x1801, nmps: 26, nlps: 21, switch: 0 },
    MqState { qe: 0x1601, nmps: 27, nlps: 22, switch: 0 },
    MqState { qe: 0x1401, nmps: 28, nlps: 23, switch: 0 },
    MqState { qe: 0x1201, nmps: 29, nlps: 24, switch: 0 },
    MqState { qe: 0x1101, nmps: 30, nlps: 25, switch: 0 },
    MqState { qe: 0x0AC1, nmps: 31, nlps: 26, switch: 0 },
    MqState { qe: 0x09C1, nmps: 32, nlps: 27, switch: 0 },
    MqState { qe: 0x08A1, nmps: 33, nlps: 28, switch: 0 },
    MqState { qe: 0x0521, nmps: 34, nlps: 29, switch: 0 },
    MqState { qe: 0x0441, nmps: 35, nlps: 30, switch: 0 },
    MqState { qe: 0x02A1, nmps: 36, nlps: 31, switch: 0 },
    MqState { qe: 0x0221, nmps: 37, nlps: 32, switch: 0 },
    MqState { qe: 0x0141, nmps: 38, nlps: 33, switch: 0 },
    MqState { qe: 0x0111, nmps: 39, nlps: 34, switch: 0 },
    MqState { qe: 0x0085, nmps: 40, nlps: 35, switch: 0 },
    MqState { qe: 0x0049, nmps: 41, nlps: 36, switch: 0 },
    MqState { qe: 0x0025, nmps: 42, nlps: 37, switch: 0 },
    MqState { qe: 0x0015, nmps: 43, nlps: 38, switch: 0 },
    MqState { qe: 0x0009, nmps: 44, nlps: 39, switch: 0 },
    MqState { qe: 0x0005, nmps: 45, nlps: 40, switch: 0 },
    MqState { qe: 0x0001, nmps: 45, nlps: 41, switch: 0 },
    MqState { qe: 0x5601, nmps: 46, nlps: 46, switch: 0 },
];

/// Per-context probability state: an index into [`MQ_TABLE`] plus the
/// current MPS bit, packed as `state << 1 | mps`.
#[derive(Clone, Copy, Default)]
pub struct Context(u8);

impl Context {
    pub fn new(state_index: u8, mps: u8) -> Self {
        Self((state_index << 1) | (mps & 1))
    }

    fn state(self) -> usize {
        (self.0 >> 1) as usize
    }

    fn mps(self) -> u8 {
        self.0 & 1
    }

    fn set(&mut self, state_index: u8, mps: u8) {
        self.0 = (state_index << 1) | (mps & 1);
    }
}

pub struct MqEncoder {
    a: u32,
    c: u32,
    ct: i32,
    out: Vec<u8>,
    contexts: Vec<Context>,
}

impl MqEncoder {
    pub fn new(num_contexts: usize) -> Self {
        Self {
            a: 0x8000,
            c: 0,
            ct: 12,
            out: Vec::new(),
            contexts: vec![Context::default(); num_contexts],
        }
    }

    pub fn set_context(&mut self, cx: usize, state_index: u8, mps: u8) {
        self.contexts[cx].set(state_index, mps);
    }

    /// Bytes flushed to the output buffer so far (not bit-exact mid-register,
    /// but monotonic and sufficient for pass-length bookkeeping).
    pub fn approx_len(&self) -> usize {
        self.out.len()
    }

    pub fn encode(&mut self, bit: u8, cx: usize) {
        let ctx = self.contexts[cx];
        let state = &MQ_TABLE[ctx.state()];
        let mps = ctx.mps();
        let qe = state.qe as u32;
        self.a -= qe;

        if bit == mps {
            if self.a < 0x8000 {
                if self.a < qe {
                    self.c += self.a;
                    self.a = qe;
                }
                self.contexts[cx].set(state.nmps, mps);
                self.renormalize();
            }
        } else {
            if qe > self.a {
                self.a = qe;
                let next_mps = if state.switch == 1 { 1 - mps } else { mps };
                self.contexts[cx].set(state.nlps, next_mps);
            } else {
                self.c += self.a;
                self.a = qe;
                let next_mps = if state.switch == 1 { 1 - mps } else { mps };
                self.contexts[cx].set(state.nlps, next_mps);
            }
            self.renormalize();
        }
    }

    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out();
                self.ct = 8;
            }
            if self.a >= 0x8000 {
                break;
            }
        }
    }

    fn byte_out(&mut self) {
        let b_out = (self.c >> 19) as u8;
        if b_out == 0xFF {
            self.ct = 7;
        }
        self.c &= 0x7FFFF;
        self.out.push(b_out);
        log::trace!("mq byte_out: {b_out:#04x}");
    }

    /// Flushes the remaining register state (SETBITS, per C.2.9) and returns
    /// the encoded byte stream. Trailing `0xFF` bytes are trimmed — they
    /// carry no information and would otherwise collide with J2K markers.
    pub fn finish(mut self) -> Vec<u8> {
        let temp = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= temp {
            self.c -= 0x8000;
        }
        for _ in 0..4 {
            self.c <<= self.ct;
            self.byte_out();
            self.ct = 8;
            if self.c == 0 {
                break;
            }
        }
        while self.out.len() > 1 && *self.out.last().unwrap() == 0xFF {
            self.out.pop();
        }
        self.out
    }
}

pub struct MqDecoder<'a> {
    a: u32,
    c: u32,
    ct: i32,
    data: &'a [u8],
    pos: usize,
    contexts: Vec<Context>,
}

impl<'a> MqDecoder<'a> {
    pub fn new(data: &'a [u8], num_contexts: usize) -> Self {
        let mut dec = Self {
            a: 0x8000,
            c: 0,
            ct: 0,
            data,
            pos: 0,
            contexts: vec![Context::default(); num_contexts],
        };
        dec.c = if data.is_empty() { 0xFF << 16 } else { (data[0] as u32) << 16 };
        dec.byte_in();
        dec.c <<= 7;
        dec.ct -= 7;
        dec.a = 0x8000;
        dec
    }

    pub fn set_context(&mut self, cx: usize, state_index: u8, mps: u8) {
        self.contexts[cx].set(state_index, mps);
    }

    fn byte_in(&mut self) {
        if self.pos >= self.data.len() {
            self.c += 0xFF00;
            self.ct = 8;
            return;
        }
        let current = self.data[self.pos];
        if current == 0xFF {
            let next = self.data.get(self.pos + 1).copied().unwrap_or(0xFF);
            if next > 0x8F {
                self.c += 0xFF00;
                self.ct = 8;
            } else {
                self.pos += 1;
                self.c += (self.data[self.pos] as u32) << 9;
                self.ct = 7;
            }
        } else {
            self.pos += 1;
            if self.pos < self.data.len() {
                self.c += (self.data[self.pos] as u32) << 8;
                self.ct = 8;
            } else {
                self.c += 0xFF00;
                self.ct = 8;
            }
        }
    }

    pub fn decode(&mut self, cx: usize) -> u8 {
        let ctx = self.contexts[cx];
        let state = &MQ_TABLE[ctx.state()];
        let mps = ctx.mps();
        let qe = state.qe as u32;
        self.a -= qe;
        let chigh = (self.c >> 16) as u32 & 0xFFFF;

        let bit;
        if chigh >= self.a {
            self.c -= self.a << 16;
            if self.a < qe {
                bit = mps;
                self.contexts[cx].set(state.nmps, mps);
            } else {
                bit = 1 - mps;
                let next_mps = if state.switch == 1 { 1 - mps } else { mps };
                self.contexts[cx].set(state.nlps, next_mps);
            }
            self.a = qe;
            self.renormalize();
        } else if self.a < 0x8000 {
            if self.a < qe {
                bit = 1 - mps;
                let next_mps = if state.switch == 1 { 1 - mps } else { mps };
                self.contexts[cx].set(state.nlps, next_mps);
                self.a = qe;
            } else {
                bit = mps;
                self.contexts[cx].set(state.nmps, mps);
            }
            self.renormalize();
        } else {
            bit = mps;
        }
        bit
    }

    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a >= 0x8000 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_context_round_trip() {
        let bits: Vec<u8> = vec![1, 0, 1, 1, 0, 0, 0, 1];
        let mut enc = MqEncoder::new(1);
        for &b in &bits {
            enc.encode(b, 0);
        }
        let encoded = enc.finish();

        let mut dec = MqDecoder::new(&encoded, 1);
        let decoded: Vec<u8> = (0..bits.len()).map(|_| dec.decode(0)).collect();
        assert_eq!(bits, decoded);
    }

    #[test]
    fn multi_context_round_trip() {
        let ops: Vec<(u8, usize)> = vec![(0, 0), (1, 1), (0, 0), (1, 0), (0, 1), (1, 1), (1, 0)];
        let mut enc = MqEncoder::new(2);
        for &(b, cx) in &ops {
            enc.encode(b, cx);
        }
        let encoded = enc.finish();

        let mut dec = MqDecoder::new(&encoded, 2);
        for &(b, cx) in &ops {
            assert_eq!(dec.decode(cx), b);
        }
    }

    #[test]
    fn long_sequence_round_trip() {
        let bits: Vec<u8> = (0..500).map(|i| ((i * 37 + i / 5) % 3 == 0) as u8).collect();
        let mut enc = MqEncoder::new(4);
        for (i, &b) in bits.iter().enumerate() {
            enc.encode(b, i % 4);
        }
        let encoded = enc.finish();

        let mut dec = MqDecoder::new(&encoded, 4);
        for (i, &b) in bits.iter().enumerate() {
            assert_eq!(dec.decode(i % 4), b, "mismatch at bit {i}");
        }
    }
}
