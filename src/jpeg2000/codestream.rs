//! Marker-delimited codestream framing: SOC/SIZ/COD/QCD/SOT/SOD/EOC.
//!
//! A deliberately thinned marker set (no COM, PLM/PLT, TLM, POC, RGN) — only
//! what a single-tile, single-tile-part, one-precinct encode/decode actually
//! needs. All integers are big-endian, matching the real standard's wire
//! convention even though the marker bodies themselves are simplified.

use crate::bitio::ByteReader;
use crate::error::{Error, Result};

pub const SOC: u16 = 0xFF4F;
pub const SIZ: u16 = 0xFF51;
pub const COD: u16 = 0xFF52;
pub const QCD: u16 = 0xFF5C;
pub const SOT: u16 = 0xFF90;
pub const SOD: u16 = 0xFF93;
pub const EOC: u16 = 0xFFD9;

pub fn write_marker(out: &mut Vec<u8>, marker: u16) {
    out.extend_from_slice(&marker.to_be_bytes());
}

fn read_marker(reader: &mut ByteReader) -> Result<u16> {
    reader.read_u16_be()
}

fn expect_marker(reader: &mut ByteReader, expected: u16) -> Result<()> {
    let found = read_marker(reader)?;
    if found != expected {
        return Err(Error::Malformed("unexpected codestream marker"));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct SizComponent {
    pub ssiz: u8,
    pub xrsiz: u8,
    pub yrsiz: u8,
}

#[derive(Clone, Debug)]
pub struct Siz {
    pub rsiz: u16,
    pub xsiz: u32,
    pub ysiz: u32,
    pub xosiz: u32,
    pub yosiz: u32,
    pub xtsiz: u32,
    pub ytsiz: u32,
    pub xtosiz: u32,
    pub ytosiz: u32,
    pub components: Vec<SizComponent>,
}

pub fn write_siz(out: &mut Vec<u8>, siz: &Siz) {
    write_marker(out, SIZ);
    let body_len = 2 + 4 * 8 + 2 + siz.components.len() * 3;
    out.extend_from_slice(&((body_len + 2) as u16).to_be_bytes());
    out.extend_from_slice(&siz.rsiz.to_be_bytes());
    for field in [siz.xsiz, siz.ysiz, siz.xosiz, siz.yosiz, siz.xtsiz, siz.ytsiz, siz.xtosiz, siz.ytosiz] {
        out.extend_from_slice(&field.to_be_bytes());
    }
    out.extend_from_slice(&(siz.components.len() as u16).to_be_bytes());
    for c in &siz.components {
        out.push(c.ssiz);
        out.push(c.xrsiz);
        out.push(c.yrsiz);
    }
}

pub fn read_siz(reader: &mut ByteReader) -> Result<Siz> {
    expect_marker(reader, SIZ)?;
    let _length = reader.read_u16_be()?;
    let rsiz = reader.read_u16_be()?;
    let xsiz = reader.read_u32_be()?;
    let ysiz = reader.read_u32_be()?;
    let xosiz = reader.read_u32_be()?;
    let yosiz = reader.read_u32_be()?;
    let xtsiz = reader.read_u32_be()?;
    let ytsiz = reader.read_u32_be()?;
    let xtosiz = reader.read_u32_be()?;
    let ytosiz = reader.read_u32_be()?;
    let csiz = reader.read_u16_be()?;
    let mut components = Vec::with_capacity(csiz as usize);
    for _ in 0..csiz {
        let ssiz = reader.read_u8()?;
        let xrsiz = reader.read_u8()?;
        let yrsiz = reader.read_u8()?;
        components.push(SizComponent { ssiz, xrsiz, yrsiz });
    }
    if xsiz == 0 || ysiz == 0 {
        return Err(Error::Malformed("SIZ declares zero image dimension"));
    }
    Ok(Siz { rsiz, xsiz, ysiz, xosiz, yosiz, xtsiz, ytsiz, xtosiz, ytosiz, components })
}

#[derive(Clone, Debug)]
pub struct Cod {
    pub scod: u8,
    pub progression_order: u8,
    pub num_layers: u16,
    pub mct: u8,
    pub levels: u8,
    pub cb_width_exp: u8,
    pub cb_height_exp: u8,
    pub cb_style: u8,
    pub transform: u8,
}

pub fn write_cod(out: &mut Vec<u8>, cod: &Cod) {
    write_marker(out, COD);
    let body_len = 9; // Scod, order, 2B layers, MCT, levels, cbw, cbh, cb-style, xform (no precinct bytes: default precinct size)
    out.extend_from_slice(&((body_len + 2) as u16).to_be_bytes());
    out.push(cod.scod);
    out.push(cod.progression_order);
    out.extend_from_slice(&cod.num_layers.to_be_bytes());
    out.push(cod.mct);
    out.push(cod.levels);
    out.push(cod.cb_width_exp);
    out.push(cod.cb_height_exp);
    out.push(cod.cb_style);
    out.push(cod.transform);
}

pub fn read_cod(reader: &mut ByteReader) -> Result<Cod> {
    expect_marker(reader, COD)?;
    let length = reader.read_u16_be()?;
    let scod = reader.read_u8()?;
    let progression_order = reader.read_u8()?;
    let num_layers = reader.read_u16_be()?;
    let mct = reader.read_u8()?;
    let levels = reader.read_u8()?;
    let cb_width_exp = reader.read_u8()?;
    let cb_height_exp = reader.read_u8()?;
    let cb_style = reader.read_u8()?;
    let transform = reader.read_u8()?;
    let consumed = 2 + 9;
    if (length as usize) > consumed {
        reader.advance(length as usize - consumed)?; // skip any precinct bytes
    }
    Ok(Cod { scod, progression_order, num_layers, mct, levels, cb_width_exp, cb_height_exp, cb_style, transform })
}

#[derive(Clone, Debug)]
pub struct Qcd {
    pub sqcd: u8,
    pub steps: Vec<u16>,
}

pub fn write_qcd(out: &mut Vec<u8>, qcd: &Qcd) {
    write_marker(out, QCD);
    let body_len = 1 + 2 * qcd.steps.len();
    out.extend_from_slice(&((body_len + 2) as u16).to_be_bytes());
    out.push(qcd.sqcd);
    for &step in &qcd.steps {
        out.extend_from_slice(&step.to_be_bytes());
    }
}

pub fn read_qcd(reader: &mut ByteReader) -> Result<Qcd> {
    expect_marker(reader, QCD)?;
    let length = reader.read_u16_be()?;
    let sqcd = reader.read_u8()?;
    let remaining = length as usize - 2 - 1;
    if remaining % 2 != 0 {
        return Err(Error::Malformed("QCD body length not a multiple of step size"));
    }
    let mut steps = Vec::with_capacity(remaining / 2);
    for _ in 0..(remaining / 2) {
        steps.push(reader.read_u16_be()?);
    }
    Ok(Qcd { sqcd, steps })
}

#[derive(Clone, Debug)]
pub struct Sot {
    pub isot: u16,
    pub psot: u32,
    pub tpsot: u8,
    pub tnsot: u8,
}

pub const SOT_BODY_LEN: usize = 2 + 4 + 1 + 1;

pub fn write_sot(out: &mut Vec<u8>, sot: &Sot) {
    write_marker(out, SOT);
    out.extend_from_slice(&((SOT_BODY_LEN + 2) as u16).to_be_bytes());
    out.extend_from_slice(&sot.isot.to_be_bytes());
    out.extend_from_slice(&sot.psot.to_be_bytes());
    out.push(sot.tpsot);
    out.push(sot.tnsot);
}

pub fn read_sot(reader: &mut ByteReader) -> Result<Sot> {
    expect_marker(reader, SOT)?;
    let _length = reader.read_u16_be()?;
    let isot = reader.read_u16_be()?;
    let psot = reader.read_u32_be()?;
    let tpsot = reader.read_u8()?;
    let tnsot = reader.read_u8()?;
    Ok(Sot { isot, psot, tpsot, tnsot })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siz_round_trips() {
        let siz = Siz {
            rsiz: 0,
            xsiz: 64,
            ysiz: 32,
            xosiz: 0,
            yosiz: 0,
            xtsiz: 64,
            ytsiz: 32,
            xtosiz: 0,
            ytosiz: 0,
            components: vec![SizComponent { ssiz: 7, xrsiz: 1, yrsiz: 1 }; 3],
        };
        let mut out = Vec::new();
        write_siz(&mut out, &siz);
        let mut reader = ByteReader::new(&out);
        let parsed = read_siz(&mut reader).unwrap();
        assert_eq!(parsed.xsiz, 64);
        assert_eq!(parsed.components.len(), 3);
    }

    #[test]
    fn cod_round_trips() {
        let cod = Cod { scod: 0, progression_order: 0, num_layers: 1, mct: 1, levels: 3, cb_width_exp: 6, cb_height_exp: 6, cb_style: 0, transform: 1 };
        let mut out = Vec::new();
        write_cod(&mut out, &cod);
        let mut reader = ByteReader::new(&out);
        let parsed = read_cod(&mut reader).unwrap();
        assert_eq!(parsed.levels, 3);
        assert_eq!(parsed.transform, 1);
    }

    #[test]
    fn qcd_round_trips() {
        let qcd = Qcd { sqcd: 0x42, steps: vec![0x1234, 0x0001, 0xFFFF] };
        let mut out = Vec::new();
        write_qcd(&mut out, &qcd);
        let mut reader = ByteReader::new(&out);
        let parsed = read_qcd(&mut reader).unwrap();
        assert_eq!(parsed.steps, qcd.steps);
    }

    #[test]
    fn sot_round_trips() {
        let sot = Sot { isot: 0, psot: 12345, tpsot: 0, tnsot: 1 };
        let mut out = Vec::new();
        write_sot(&mut out, &sot);
        let mut reader = ByteReader::new(&out);
        let parsed = read_sot(&mut reader).unwrap();
        assert_eq!(parsed.psot, 12345);
    }
}
