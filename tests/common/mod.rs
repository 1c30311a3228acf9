//! Shared test fixtures: a hand-assembled TrueType font small enough to
//! reason about byte-for-byte, plus byte-scanning helpers.

#![allow(dead_code)]

/// Four glyphs: `.notdef`, two simple triangles, and one composite that
/// references glyph 2. Character coverage comes from `map` as
/// (codepoint, glyph id) pairs, one cmap segment each, ascending.
pub fn test_font_with(map: &[(u32, u16)]) -> Vec<u8> {
    let head = build_head();
    let hhea = build_hhea();
    let maxp = build_maxp();
    let hmtx = build_hmtx();
    let (glyf, loca) = build_glyf();
    let cmap = build_cmap(map);

    // Alphabetical tag order, as the directory requires.
    let tables: [(&[u8; 4], &[u8]); 7] = [
        (b"cmap", &cmap),
        (b"glyf", &glyf),
        (b"head", &head),
        (b"hhea", &hhea),
        (b"hmtx", &hmtx),
        (b"loca", &loca),
        (b"maxp", &maxp),
    ];
    assemble(&tables)
}

/// The default fixture: A, B, C mapped to glyphs 1, 2, 3 (C is composite).
pub fn test_font() -> Vec<u8> {
    test_font_with(&[('A' as u32, 1), ('B' as u32, 2), ('C' as u32, 3)])
}

pub fn contains(haystack: &[u8], needle: &str) -> bool {
    find(haystack, needle).is_some()
}

pub fn find(haystack: &[u8], needle: &str) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle.as_bytes())
}

pub fn count(haystack: &[u8], needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack
        .windows(needle.len())
        .filter(|w| *w == needle.as_bytes())
        .count()
}

pub fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Locate a table in an sfnt file by tag.
pub fn sfnt_table<'a>(font: &'a [u8], tag: &[u8; 4]) -> Option<&'a [u8]> {
    let num_tables = read_u16(font, 4) as usize;
    for i in 0..num_tables {
        let base = 12 + i * 16;
        if &font[base..base + 4] == tag {
            let offset = read_u32(font, base + 8) as usize;
            let length = read_u32(font, base + 12) as usize;
            return Some(&font[offset..offset + length]);
        }
    }
    None
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn build_head() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000); // version
    push_u32(&mut t, 0); // fontRevision
    push_u32(&mut t, 0); // checkSumAdjustment
    push_u32(&mut t, 0x5F0F_3CF5); // magic
    push_u16(&mut t, 0); // flags
    push_u16(&mut t, 1000); // unitsPerEm
    t.extend_from_slice(&[0; 16]); // created + modified
    push_i16(&mut t, 0); // xMin
    push_i16(&mut t, -200); // yMin
    push_i16(&mut t, 600); // xMax
    push_i16(&mut t, 800); // yMax
    push_u16(&mut t, 0); // macStyle
    push_u16(&mut t, 8); // lowestRecPPEM
    push_i16(&mut t, 2); // fontDirectionHint
    push_i16(&mut t, 0); // indexToLocFormat (short)
    push_i16(&mut t, 0); // glyphDataFormat
    t
}

fn build_hhea() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000);
    push_i16(&mut t, 800); // ascender
    push_i16(&mut t, -200); // descender
    push_i16(&mut t, 0); // lineGap
    push_u16(&mut t, 600); // advanceWidthMax
    push_i16(&mut t, 0); // minLeftSideBearing
    push_i16(&mut t, 0); // minRightSideBearing
    push_i16(&mut t, 600); // xMaxExtent
    push_i16(&mut t, 1); // caretSlopeRise
    push_i16(&mut t, 0); // caretSlopeRun
    push_i16(&mut t, 0); // caretOffset
    t.extend_from_slice(&[0; 8]); // reserved
    push_i16(&mut t, 0); // metricDataFormat
    push_u16(&mut t, 4); // numberOfHMetrics
    t
}

fn build_maxp() -> Vec<u8> {
    let mut t = Vec::new();
    push_u32(&mut t, 0x0001_0000);
    push_u16(&mut t, 4); // numGlyphs
    t.extend_from_slice(&[0; 26]);
    t
}

fn build_hmtx() -> Vec<u8> {
    let mut t = Vec::new();
    for (advance, lsb) in [(500u16, 0i16), (600, 50), (550, 40), (500, 30)] {
        push_u16(&mut t, advance);
        push_i16(&mut t, lsb);
    }
    t
}

fn simple_glyph() -> Vec<u8> {
    let mut g = Vec::new();
    push_i16(&mut g, 1); // numberOfContours
    push_i16(&mut g, 0);
    push_i16(&mut g, 0);
    push_i16(&mut g, 600);
    push_i16(&mut g, 700);
    push_u16(&mut g, 2); // endPtsOfContours
    push_u16(&mut g, 0); // instructionLength
    g.extend_from_slice(&[0x01, 0x01, 0x01]); // flags: on-curve, word deltas
    for x in [0i16, 600, -300] {
        push_i16(&mut g, x);
    }
    for y in [0i16, 0, 700] {
        push_i16(&mut g, y);
    }
    if g.len() % 2 != 0 {
        g.push(0);
    }
    g
}

fn composite_glyph(component: u16) -> Vec<u8> {
    let mut g = Vec::new();
    push_i16(&mut g, -1);
    push_i16(&mut g, 0);
    push_i16(&mut g, 0);
    push_i16(&mut g, 600);
    push_i16(&mut g, 700);
    push_u16(&mut g, 0x0001); // ARG_1_AND_2_ARE_WORDS, no more components
    push_u16(&mut g, component);
    push_i16(&mut g, 0); // arg1
    push_i16(&mut g, 0); // arg2
    g
}

fn build_glyf() -> (Vec<u8>, Vec<u8>) {
    let entries = [Vec::new(), simple_glyph(), simple_glyph(), composite_glyph(2)];
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for entry in &entries {
        push_u16(&mut loca, (glyf.len() / 2) as u16);
        glyf.extend_from_slice(entry);
    }
    push_u16(&mut loca, (glyf.len() / 2) as u16);
    (glyf, loca)
}

fn build_cmap(map: &[(u32, u16)]) -> Vec<u8> {
    // One format 4 segment per mapping plus the required terminator.
    let seg_count = (map.len() + 1) as u16;
    let seg_count_x2 = seg_count * 2;
    let entry_selector = 15 - seg_count.leading_zeros() as u16;
    let search_range = 2 * (1 << entry_selector);
    let range_shift = seg_count_x2 - search_range;

    let mut sub = Vec::new();
    push_u16(&mut sub, 4); // format
    push_u16(&mut sub, 16 + 8 * seg_count); // length
    push_u16(&mut sub, 0); // language
    push_u16(&mut sub, seg_count_x2);
    push_u16(&mut sub, search_range);
    push_u16(&mut sub, entry_selector);
    push_u16(&mut sub, range_shift);
    for &(cp, _) in map {
        push_u16(&mut sub, cp as u16); // endCode
    }
    push_u16(&mut sub, 0xFFFF);
    push_u16(&mut sub, 0); // reservedPad
    for &(cp, _) in map {
        push_u16(&mut sub, cp as u16); // startCode
    }
    push_u16(&mut sub, 0xFFFF);
    for &(cp, gid) in map {
        push_u16(&mut sub, (gid as i32 - cp as i32) as u16); // idDelta
    }
    push_u16(&mut sub, 1);
    for _ in 0..seg_count {
        push_u16(&mut sub, 0); // idRangeOffset
    }

    let mut t = Vec::new();
    push_u16(&mut t, 0); // version
    push_u16(&mut t, 1); // numTables
    push_u16(&mut t, 3); // platformID: Windows
    push_u16(&mut t, 1); // encodingID: Unicode BMP
    push_u32(&mut t, 12); // offset
    t.extend_from_slice(&sub);
    t
}

fn assemble(tables: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let num_tables = tables.len() as u16;
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = 16 * (1 << entry_selector);

    let mut out = Vec::new();
    push_u32(&mut out, 0x0001_0000);
    push_u16(&mut out, num_tables);
    push_u16(&mut out, search_range);
    push_u16(&mut out, entry_selector);
    push_u16(&mut out, num_tables * 16 - search_range);

    let mut offset = 12 + tables.len() * 16;
    for (tag, body) in tables {
        out.extend_from_slice(*tag);
        push_u32(&mut out, 0); // checksum: parsers do not verify it
        push_u32(&mut out, offset as u32);
        push_u32(&mut out, body.len() as u32);
        offset += (body.len() + 3) & !3;
    }
    for (_, body) in tables {
        out.extend_from_slice(body);
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }
    out
}
