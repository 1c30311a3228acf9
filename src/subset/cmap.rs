//! Format 4 cmap for the subset: one (3,1) Windows Unicode BMP subtable
//! built from the codepoint→new-gid map, segments merged over runs where
//! both codepoint and glyph id increment together.

use std::collections::BTreeMap;

struct Segment {
    start: u16,
    end: u16,
    delta: i32,
}

pub(super) fn build_format4(char_to_gid: &BTreeMap<u32, u16>) -> Vec<u8> {
    let mut segments: Vec<Segment> = Vec::new();
    for (&cp, &gid) in char_to_gid {
        if cp > 0xFFFE {
            continue; // supplementary planes don't fit format 4
        }
        let cp = cp as u16;
        if let Some(last) = segments.last_mut() {
            if cp == last.end.wrapping_add(1) && gid as i32 - cp as i32 == last.delta {
                last.end = cp;
                continue;
            }
        }
        segments.push(Segment {
            start: cp,
            end: cp,
            delta: gid as i32 - cp as i32,
        });
    }
    // Required terminator segment.
    segments.push(Segment {
        start: 0xFFFF,
        end: 0xFFFF,
        delta: 1,
    });

    let seg_count = segments.len() as u16;
    let seg_count_x2 = seg_count * 2;
    let entry_selector = 15 - seg_count.leading_zeros() as u16;
    let search_range = 2 * (1u16 << entry_selector);
    let range_shift = seg_count_x2 - search_range;

    let mut sub = Vec::new();
    let length = 16 + 8 * seg_count as usize;
    sub.extend_from_slice(&4u16.to_be_bytes());
    sub.extend_from_slice(&(length as u16).to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes()); // language
    sub.extend_from_slice(&seg_count_x2.to_be_bytes());
    sub.extend_from_slice(&search_range.to_be_bytes());
    sub.extend_from_slice(&entry_selector.to_be_bytes());
    sub.extend_from_slice(&range_shift.to_be_bytes());
    for seg in &segments {
        sub.extend_from_slice(&seg.end.to_be_bytes());
    }
    sub.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
    for seg in &segments {
        sub.extend_from_slice(&seg.start.to_be_bytes());
    }
    for seg in &segments {
        sub.extend_from_slice(&(seg.delta as u16).to_be_bytes());
    }
    for _ in &segments {
        sub.extend_from_slice(&0u16.to_be_bytes()); // idRangeOffset
    }

    let mut out = Vec::with_capacity(12 + sub.len());
    out.extend_from_slice(&0u16.to_be_bytes()); // version
    out.extend_from_slice(&1u16.to_be_bytes()); // one encoding record
    out.extend_from_slice(&3u16.to_be_bytes()); // platform: Windows
    out.extend_from_slice(&1u16.to_be_bytes()); // encoding: Unicode BMP
    out.extend_from_slice(&12u32.to_be_bytes());
    out.extend_from_slice(&sub);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subset::read_u16;

    fn lookup(cmap: &[u8], cp: u16) -> u16 {
        // Walk the format 4 arrays directly.
        let sub = &cmap[12..];
        let seg_count = read_u16(sub, 6).unwrap() as usize / 2;
        let end_base = 14;
        let start_base = end_base + seg_count * 2 + 2;
        let delta_base = start_base + seg_count * 2;
        for i in 0..seg_count {
            let end = read_u16(sub, end_base + i * 2).unwrap();
            if cp <= end {
                let start = read_u16(sub, start_base + i * 2).unwrap();
                if cp < start {
                    return 0;
                }
                let delta = read_u16(sub, delta_base + i * 2).unwrap();
                return cp.wrapping_add(delta);
            }
        }
        0
    }

    #[test]
    fn consecutive_mappings_share_a_segment() {
        let map = BTreeMap::from([(65u32, 1u16), (66, 2), (67, 3), (90, 9)]);
        let cmap = build_format4(&map);
        let sub = &cmap[12..];
        // Run A..C, singleton Z, terminator.
        assert_eq!(read_u16(sub, 6).unwrap(), 3 * 2);
        assert_eq!(lookup(&cmap, 65), 1);
        assert_eq!(lookup(&cmap, 66), 2);
        assert_eq!(lookup(&cmap, 67), 3);
        assert_eq!(lookup(&cmap, 90), 9);
        assert_eq!(lookup(&cmap, 68), 0);
    }

    #[test]
    fn empty_map_still_emits_terminator() {
        let cmap = build_format4(&BTreeMap::new());
        let sub = &cmap[12..];
        assert_eq!(read_u16(sub, 0).unwrap(), 4);
        assert_eq!(read_u16(sub, 6).unwrap(), 2);
    }
}
