//! TrueType subsetting. Input is the registered font program plus its glyph
//! usage set; output is a standalone font containing only the used glyphs
//! (plus `.notdef`), with a stable old→new glyph id remap.
//!
//! The subset keeps the eight tables a PDF embedding needs: cmap, glyf,
//! head, hhea, hmtx, loca, maxp, post. Everything else is dropped.

mod cmap;
mod glyf;
mod tables;

use crate::error::{Error, Result};
use crate::font::GlyphUsage;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// A finalized subset font program and its index mappings.
#[derive(Debug)]
pub struct SubsetFont {
    /// The subset font file, ready for a FontFile2 stream.
    pub data: Vec<u8>,
    /// Old glyph id → new glyph id. Injective; `.notdef` stays 0.
    pub gid_map: BTreeMap<u16, u16>,
    /// Number of glyphs in the subset, `.notdef` included.
    pub glyph_count: u16,
    /// New glyph id → Unicode codepoint, for the ToUnicode CMap.
    pub to_unicode: BTreeMap<u16, u32>,
}

impl SubsetFont {
    pub fn remap(&self, old_gid: u16) -> Option<u16> {
        self.gid_map.get(&old_gid).copied()
    }
}

/// Build the subset. Glyph data is laid out in the first-use order the usage
/// set already issued, so ids previously written into content streams stay
/// valid; composite components discovered here are appended after them in
/// ascending original-id order. Deterministic for a given (font, usage) pair.
pub fn subset(data: &[u8], usage: &GlyphUsage) -> Result<SubsetFont> {
    let sfnt = Sfnt::parse(data)?;

    let head = sfnt.expect(b"head")?;
    let maxp = sfnt.expect(b"maxp")?;
    let hhea = sfnt.expect(b"hhea")?;
    let hmtx = sfnt.expect(b"hmtx")?;
    let loca = sfnt.expect(b"loca")?;
    let glyf = sfnt.expect(b"glyf")?;

    let num_glyphs = read_u16(maxp, 4)?;
    let long_loca = read_u16(head, 50)? == 1;
    let num_h_metrics = read_u16(hhea, 34)?;

    let glyphs = glyf::GlyphSource::new(glyf, loca, num_glyphs, long_loca)?;

    // Issued ids first, composite-component extras appended after.
    let mut order: Vec<u16> = usage.order().to_vec();
    order.extend(glyf::closure_extras(&glyphs, usage.order())?);
    let mut gid_map: BTreeMap<u16, u16> = BTreeMap::new();
    for (new, old) in order.iter().copied().enumerate() {
        gid_map.insert(old, new as u16);
    }
    let glyph_count = order.len() as u16;

    let lookup: FxHashMap<u16, u16> = gid_map.iter().map(|(&o, &n)| (o, n)).collect();
    let (sub_glyf, sub_loca, sub_long_loca) = glyf::rebuild(&glyphs, &order, &lookup)?;

    let sub_hmtx = tables::rebuild_hmtx(hmtx, num_glyphs, num_h_metrics, &order)?;
    let sub_hhea = tables::rebuild_hhea(hhea, glyph_count)?;
    let sub_maxp = tables::rebuild_maxp(maxp, glyph_count)?;
    let sub_head = tables::rebuild_head(head, sub_long_loca)?;
    let sub_post = tables::minimal_post();

    let mut to_unicode: BTreeMap<u16, u32> = BTreeMap::new();
    let mut char_to_new: BTreeMap<u32, u16> = BTreeMap::new();
    for (&cp, &new_gid) in usage.by_codepoint() {
        to_unicode.entry(new_gid).or_insert(cp);
        char_to_new.insert(cp, new_gid);
    }
    let sub_cmap = cmap::build_format4(&char_to_new);

    // Directory order is the alphabetical tag order the format requires.
    let tables: [(&[u8; 4], &[u8]); 8] = [
        (b"cmap", &sub_cmap),
        (b"glyf", &sub_glyf),
        (b"head", &sub_head),
        (b"hhea", &sub_hhea),
        (b"hmtx", &sub_hmtx),
        (b"loca", &sub_loca),
        (b"maxp", &sub_maxp),
        (b"post", &sub_post),
    ];
    let data = assemble(&tables);

    log::debug!(
        "subset font: {} of {} glyphs, {} bytes",
        glyph_count,
        num_glyphs,
        data.len()
    );

    Ok(SubsetFont {
        data,
        gid_map,
        glyph_count,
        to_unicode,
    })
}

struct Sfnt<'a> {
    data: &'a [u8],
    records: Vec<([u8; 4], usize, usize)>,
}

impl<'a> Sfnt<'a> {
    fn parse(data: &'a [u8]) -> Result<Sfnt<'a>> {
        let version = read_u32(data, 0)?;
        if version != 0x0001_0000 && version != u32::from_be_bytes(*b"true") {
            return Err(Error::FontFormat("not a TrueType font".to_string()));
        }
        let num_tables = read_u16(data, 4)? as usize;
        let mut records = Vec::with_capacity(num_tables);
        for i in 0..num_tables {
            let base = 12 + i * 16;
            let tag: [u8; 4] = data
                .get(base..base + 4)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| Error::FontFormat("truncated table directory".to_string()))?;
            let offset = read_u32(data, base + 8)? as usize;
            let length = read_u32(data, base + 12)? as usize;
            if offset.checked_add(length).is_none_or(|end| end > data.len()) {
                return Err(Error::FontFormat(format!(
                    "table {} out of bounds",
                    String::from_utf8_lossy(&tag)
                )));
            }
            records.push((tag, offset, length));
        }
        Ok(Sfnt { data, records })
    }

    fn table(&self, tag: &[u8; 4]) -> Option<&'a [u8]> {
        self.records
            .iter()
            .find(|(t, _, _)| t == tag)
            .map(|&(_, offset, length)| &self.data[offset..offset + length])
    }

    fn expect(&self, tag: &[u8; 4]) -> Result<&'a [u8]> {
        self.table(tag).ok_or_else(|| {
            Error::FontFormat(format!("missing {} table", String::from_utf8_lossy(tag)))
        })
    }
}

/// Lay out the table directory and bodies, then patch head's
/// checksumAdjustment over the whole file.
fn assemble(tables: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = 16 * (1 << entry_selector);
    let range_shift = num_tables * 16 - search_range;

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    let mut offset = 12 + tables.len() * 16;
    let mut head_offset = None;
    for (tag, body) in tables {
        out.extend_from_slice(*tag);
        out.extend_from_slice(&checksum(body).to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        if *tag == b"head" {
            head_offset = Some(offset);
        }
        offset += padded_len(body.len());
    }
    for (_, body) in tables {
        out.extend_from_slice(body);
        out.resize(out.len() + padded_len(body.len()) - body.len(), 0);
    }

    if let Some(head) = head_offset {
        let adjustment = 0xB1B0_AFBAu32.wrapping_sub(checksum(&out));
        out[head + 8..head + 12].copy_from_slice(&adjustment.to_be_bytes());
    }
    out
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

pub(crate) fn checksum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u32::from_be_bytes(chunk.try_into().unwrap()));
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut last = [0u8; 4];
        last[..rest.len()].copy_from_slice(rest);
        sum = sum.wrapping_add(u32::from_be_bytes(last));
    }
    sum
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|s| u16::from_be_bytes([s[0], s[1]]))
        .ok_or_else(|| Error::FontFormat("unexpected end of table".to_string()))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|s| u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
        .ok_or_else(|| Error::FontFormat("unexpected end of table".to_string()))
}

pub(crate) fn read_i16(data: &[u8], offset: usize) -> Result<i16> {
    read_u16(data, offset).map(|v| v as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_pads_with_zeros() {
        assert_eq!(checksum(&[0, 0, 0, 1]), 1);
        assert_eq!(checksum(&[0, 0, 0, 1, 0, 0, 0, 2]), 3);
        // Trailing partial word is zero-padded, not dropped.
        assert_eq!(checksum(&[0x80]), 0x8000_0000);
    }

    #[test]
    fn directory_search_fields_for_eight_tables() {
        // 8 tables: searchRange 128, entrySelector 3, rangeShift 0.
        let body = [0u8; 4];
        let tables: Vec<(&[u8; 4], &[u8])> = vec![
            (b"aaaa", &body),
            (b"bbbb", &body),
            (b"cccc", &body),
            (b"dddd", &body),
            (b"eeee", &body),
            (b"ffff", &body),
            (b"gggg", &body),
            (b"hhhh", &body),
        ];
        let out = assemble(&tables);
        assert_eq!(read_u16(&out, 4).unwrap(), 8);
        assert_eq!(read_u16(&out, 6).unwrap(), 128);
        assert_eq!(read_u16(&out, 8).unwrap(), 3);
        assert_eq!(read_u16(&out, 10).unwrap(), 0);
    }
}
