//! glyf/loca handling: glyph closure over composite components, entry
//! extraction, component re-pointing, and the rebuilt loca offsets.

use super::{read_i16, read_u16, read_u32};
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

pub(super) struct GlyphSource<'a> {
    glyf: &'a [u8],
    offsets: Vec<usize>,
}

impl<'a> GlyphSource<'a> {
    pub(super) fn new(
        glyf: &'a [u8],
        loca: &'a [u8],
        num_glyphs: u16,
        long_loca: bool,
    ) -> Result<GlyphSource<'a>> {
        let count = num_glyphs as usize + 1;
        let mut offsets = Vec::with_capacity(count);
        for i in 0..count {
            let offset = if long_loca {
                read_u32(loca, i * 4)? as usize
            } else {
                read_u16(loca, i * 2)? as usize * 2
            };
            if offset > glyf.len() {
                return Err(Error::FontFormat("loca offset out of bounds".to_string()));
            }
            if let Some(&prev) = offsets.last() {
                if offset < prev {
                    return Err(Error::FontFormat("loca offsets not monotonic".to_string()));
                }
            }
            offsets.push(offset);
        }
        Ok(GlyphSource { glyf, offsets })
    }

    pub(super) fn num_glyphs(&self) -> u16 {
        (self.offsets.len() - 1) as u16
    }

    fn entry(&self, gid: u16) -> Option<&'a [u8]> {
        let start = *self.offsets.get(gid as usize)?;
        let end = *self.offsets.get(gid as usize + 1)?;
        Some(&self.glyf[start..end])
    }
}

/// Component glyph ids referenced by `entry`, with the byte offset of each
/// glyph-index field so rebuild can patch them in place.
fn components(entry: &[u8]) -> Result<Vec<(usize, u16)>> {
    let mut found = Vec::new();
    if entry.is_empty() || read_i16(entry, 0)? >= 0 {
        return Ok(found); // empty or simple glyph
    }
    let mut offset = 10;
    loop {
        let flags = read_u16(entry, offset)?;
        let gid_at = offset + 2;
        found.push((gid_at, read_u16(entry, gid_at)?));
        offset += 4;
        offset += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            offset += 8;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            offset += 4;
        } else if flags & WE_HAVE_A_SCALE != 0 {
            offset += 2;
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(found)
}

/// Composite components reachable from `initial` that are not themselves in
/// `initial`, in ascending glyph id order. These get appended after the
/// issued subset ids, so ids already written into content streams stay valid.
pub(super) fn closure_extras(source: &GlyphSource<'_>, initial: &[u16]) -> Result<Vec<u16>> {
    let mut seen: BTreeSet<u16> = initial.iter().copied().collect();
    let mut extras: BTreeSet<u16> = BTreeSet::new();
    let mut work: Vec<u16> = initial.to_vec();
    while let Some(gid) = work.pop() {
        if gid >= source.num_glyphs() {
            return Err(Error::FontFormat(format!(
                "glyph id {gid} beyond glyph count"
            )));
        }
        if let Some(entry) = source.entry(gid) {
            for (_, component) in components(entry)? {
                if seen.insert(component) {
                    extras.insert(component);
                    work.push(component);
                }
            }
        }
    }
    Ok(extras.into_iter().collect())
}

/// Write the subset glyf and loca. Returns (glyf, loca, long_loca).
pub(super) fn rebuild(
    source: &GlyphSource<'_>,
    order: &[u16],
    gid_map: &FxHashMap<u16, u16>,
) -> Result<(Vec<u8>, Vec<u8>, bool)> {
    let mut entries: Vec<Vec<u8>> = Vec::with_capacity(order.len());
    let mut total = 0usize;
    for &old in order {
        let mut entry = source
            .entry(old)
            .ok_or_else(|| Error::FontFormat("glyph entry missing".to_string()))?
            .to_vec();
        for (at, component) in components(&entry)? {
            let new = gid_map.get(&component).copied().ok_or_else(|| {
                Error::FontFormat("composite component outside closure".to_string())
            })?;
            entry[at..at + 2].copy_from_slice(&new.to_be_bytes());
        }
        if entry.len() % 2 != 0 {
            entry.push(0);
        }
        total += entry.len();
        entries.push(entry);
    }

    let long_loca = total > 2 * u16::MAX as usize;
    let mut glyf = Vec::with_capacity(total);
    let mut loca = Vec::with_capacity((order.len() + 1) * if long_loca { 4 } else { 2 });
    let mut write_offset = |loca: &mut Vec<u8>, offset: usize| {
        if long_loca {
            loca.extend_from_slice(&(offset as u32).to_be_bytes());
        } else {
            loca.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
        }
    };
    for entry in &entries {
        write_offset(&mut loca, glyf.len());
        glyf.extend_from_slice(entry);
    }
    write_offset(&mut loca, glyf.len());

    Ok((glyf, loca, long_loca))
}
