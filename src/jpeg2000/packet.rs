//! Tier-2: packet assembly and parsing.
//!
//! This is a deliberately simplified framing, not the bit-exact packet
//! header syntax of the real standard (no tag trees, no precinct
//! partitioning beyond one precinct per resolution level): each packet
//! carries a contribution (a run of new bit-plane passes, already MQ-coded
//! bytes) from zero or more code-blocks, length-prefixed so a reader can
//! skip packets without decoding the arithmetic-coded payload.

use crate::bitio::ByteReader;
use crate::error::{Error, Result};

const SOP_MARKER: [u8; 2] = [0xFF, 0x91];

/// One code-block's contribution to a single packet: some number of new
/// bit-plane passes worth of already-encoded bytes.
#[derive(Clone, Debug)]
pub struct Contribution {
    pub new_passes: u8,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct Packet {
    pub contributions: Vec<Contribution>,
}

impl Packet {
    pub fn is_empty(&self) -> bool {
        self.contributions.iter().all(|c| c.new_passes == 0)
    }
}

/// Serializes one packet. `sop_sequence` is `Some(n)` to emit an optional
/// start-of-packet marker carrying sequence number `n`.
pub fn write_packet(out: &mut Vec<u8>, packet: &Packet, sop_sequence: Option<u16>) {
    if let Some(seq) = sop_sequence {
        out.extend_from_slice(&SOP_MARKER);
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&seq.to_be_bytes());
    }
    if packet.is_empty() {
        out.push(0);
        return;
    }
    out.push(1);
    out.extend_from_slice(&(packet.contributions.len() as u16).to_be_bytes());
    for contribution in &packet.contributions {
        out.push(contribution.new_passes);
        let len = contribution.data.len().min(u16::MAX as usize) as u16;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&contribution.data[..len as usize]);
    }
}

/// Parses one packet starting at the reader's current position. SOP markers
/// are consumed transparently if present.
pub fn read_packet(reader: &mut ByteReader) -> Result<Packet> {
    if reader.remaining().len() >= 2 && reader.remaining()[0..2] == SOP_MARKER {
        reader.advance(2)?;
        let len = reader.read_u16_be()?;
        if len != 4 {
            return Err(Error::Malformed("unexpected SOP marker length"));
        }
        reader.advance(2)?; // sequence number, not needed for reconstruction
    }
    let header = reader.read_u8()?;
    if header == 0 {
        return Ok(Packet::default());
    }
    let count = reader.read_u16_be()? as usize;
    let mut contributions = Vec::with_capacity(count);
    for _ in 0..count {
        let new_passes = reader.read_u8()?;
        let len = reader.read_u16_be()? as usize;
        let data = reader.read_bytes(len)?.to_vec();
        contributions.push(Contribution { new_passes, data });
    }
    Ok(Packet { contributions })
}

/// Rate allocation: splits `total_passes` evenly across `num_layers`,
/// rounding up so every pass is assigned to exactly one layer.
pub fn passes_per_layer(total_passes: u32, num_layers: u32) -> u32 {
    if num_layers == 0 {
        return total_passes;
    }
    total_passes.div_ceil(num_layers)
}

/// The half-open pass-index window `[start, end)` belonging to layer
/// `layer_index`, clamped to `total_passes`.
pub fn layer_window(layer_index: u32, passes_per_layer: u32, total_passes: u32) -> (u32, u32) {
    let start = (layer_index * passes_per_layer).min(total_passes);
    let end = ((layer_index + 1) * passes_per_layer).min(total_passes);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_packet_round_trips() {
        let packet = Packet { contributions: vec![Contribution { new_passes: 0, data: vec![] }] };
        let mut out = Vec::new();
        write_packet(&mut out, &packet, None);
        assert_eq!(out.len(), 1, "an empty packet carries only its header byte");
        let mut reader = ByteReader::new(&out);
        let parsed = read_packet(&mut reader).unwrap();
        assert!(parsed.contributions.is_empty());
    }

    #[test]
    fn non_empty_packet_round_trips_with_sop() {
        let packet = Packet {
            contributions: vec![
                Contribution { new_passes: 3, data: vec![0xAB, 0xCD, 0xEF] },
                Contribution { new_passes: 0, data: vec![] },
            ],
        };
        let mut out = Vec::new();
        write_packet(&mut out, &packet, Some(7));
        let mut reader = ByteReader::new(&out);
        let parsed = read_packet(&mut reader).unwrap();
        assert_eq!(parsed.contributions.len(), 2);
        assert_eq!(parsed.contributions[0].data, vec![0xAB, 0xCD, 0xEF]);
        assert_eq!(parsed.contributions[1].new_passes, 0);
    }

    #[test]
    fn passes_per_layer_rounds_up() {
        assert_eq!(passes_per_layer(10, 3), 4);
        assert_eq!(passes_per_layer(9, 3), 3);
        assert_eq!(passes_per_layer(10, 1), 10);
    }

    #[test]
    fn layer_window_is_clamped() {
        assert_eq!(layer_window(0, 4, 10), (0, 4));
        assert_eq!(layer_window(1, 4, 10), (4, 8));
        assert_eq!(layer_window(2, 4, 10), (8, 10));
    }
}
