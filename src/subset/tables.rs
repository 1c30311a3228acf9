//! head/hhea/maxp/hmtx/post for the subset: copies of the source tables with
//! the glyph-count-dependent fields patched.

use super::{read_i16, read_u16};
use crate::error::{Error, Result};

/// Full longHorMetric records for every subset glyph, in new-gid order.
/// Emitting one record per glyph keeps hhea.numberOfHMetrics trivial.
pub(super) fn rebuild_hmtx(
    hmtx: &[u8],
    num_glyphs: u16,
    num_h_metrics: u16,
    order: &[u16],
) -> Result<Vec<u8>> {
    if num_h_metrics == 0 {
        return Err(Error::FontFormat("hhea.numberOfHMetrics is zero".to_string()));
    }
    let advance_for = |gid: u16| -> Result<u16> {
        let idx = gid.min(num_h_metrics - 1) as usize;
        read_u16(hmtx, idx * 4)
    };
    let lsb_for = |gid: u16| -> Result<i16> {
        if gid < num_h_metrics {
            read_i16(hmtx, gid as usize * 4 + 2)
        } else {
            let idx = (gid - num_h_metrics) as usize;
            let offset = num_h_metrics as usize * 4 + idx * 2;
            // Some fonts truncate the trailing lsb array.
            if gid < num_glyphs && offset + 2 <= hmtx.len() {
                read_i16(hmtx, offset)
            } else {
                Ok(0)
            }
        }
    };

    let mut out = Vec::with_capacity(order.len() * 4);
    for &old in order {
        out.extend_from_slice(&advance_for(old)?.to_be_bytes());
        out.extend_from_slice(&lsb_for(old)?.to_be_bytes());
    }
    Ok(out)
}

pub(super) fn rebuild_hhea(hhea: &[u8], glyph_count: u16) -> Result<Vec<u8>> {
    if hhea.len() < 36 {
        return Err(Error::FontFormat("hhea table too short".to_string()));
    }
    let mut out = hhea.to_vec();
    out[34..36].copy_from_slice(&glyph_count.to_be_bytes());
    Ok(out)
}

pub(super) fn rebuild_maxp(maxp: &[u8], glyph_count: u16) -> Result<Vec<u8>> {
    if maxp.len() < 6 {
        return Err(Error::FontFormat("maxp table too short".to_string()));
    }
    // Version 1.0 limit fields are upper bounds and stay valid unchanged.
    let mut out = maxp.to_vec();
    out[4..6].copy_from_slice(&glyph_count.to_be_bytes());
    Ok(out)
}

pub(super) fn rebuild_head(head: &[u8], long_loca: bool) -> Result<Vec<u8>> {
    if head.len() < 54 {
        return Err(Error::FontFormat("head table too short".to_string()));
    }
    let mut out = head.to_vec();
    // checksumAdjustment is recomputed over the assembled file.
    out[8..12].copy_from_slice(&[0, 0, 0, 0]);
    let format: u16 = if long_loca { 1 } else { 0 };
    out[50..52].copy_from_slice(&format.to_be_bytes());
    Ok(out)
}

/// post version 3.0: no glyph names, fixed 32-byte body.
pub(super) fn minimal_post() -> Vec<u8> {
    let mut out = Vec::with_capacity(32);
    out.extend_from_slice(&0x0003_0000u32.to_be_bytes());
    out.extend_from_slice(&[0u8; 28]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmtx_repeats_last_advance_for_trailing_glyphs() {
        // numberOfHMetrics = 2, then lsb-only entries for gids 2 and 3.
        let mut hmtx = Vec::new();
        hmtx.extend_from_slice(&500u16.to_be_bytes());
        hmtx.extend_from_slice(&10i16.to_be_bytes());
        hmtx.extend_from_slice(&600u16.to_be_bytes());
        hmtx.extend_from_slice(&20i16.to_be_bytes());
        hmtx.extend_from_slice(&30i16.to_be_bytes());
        hmtx.extend_from_slice(&40i16.to_be_bytes());

        let out = rebuild_hmtx(&hmtx, 4, 2, &[0, 3]).unwrap();
        assert_eq!(read_u16(&out, 0).unwrap(), 500);
        assert_eq!(read_i16(&out, 2).unwrap(), 10);
        // Old gid 3: advance sticks at 600, lsb from the trailing array.
        assert_eq!(read_u16(&out, 4).unwrap(), 600);
        assert_eq!(read_i16(&out, 6).unwrap(), 40);
    }

    #[test]
    fn head_zeroes_adjustment_and_sets_loca_format() {
        let head = vec![0xFFu8; 54];
        let out = rebuild_head(&head, true).unwrap();
        assert_eq!(&out[8..12], &[0, 0, 0, 0]);
        assert_eq!(read_u16(&out, 50).unwrap(), 1);
    }

    #[test]
    fn post_is_version_3() {
        let post = minimal_post();
        assert_eq!(post.len(), 32);
        assert_eq!(&post[0..4], &[0x00, 0x03, 0x00, 0x00]);
    }
}
