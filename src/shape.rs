use crate::error::{Diagnostic, Diagnostics};
use crate::font::{EmbeddedFont, FontId};
use rustybuzz::{
    Direction as HbDirection, Face as HbFace, Language as HbLanguage, Script as HbScript,
    ShapePlan, UnicodeBuffer,
};
use std::collections::HashMap;

/// Requested text direction. `Auto` resolves from the first strong character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextDirection {
    #[default]
    Auto,
    Ltr,
    Rtl,
}

/// One positioned glyph in final visual order. Advances and offsets are in
/// 1/1000 em.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapedGlyph {
    pub gid: u16,
    pub codepoint: Option<char>,
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

type PlanKey = (FontId, HbDirection, HbScript, Option<HbLanguage>);

/// Unicode-to-glyph conversion. Shape plans are compiled once per
/// (font, direction, script, language) combination and reused across calls.
#[derive(Default)]
pub struct Shaper {
    plans: HashMap<PlanKey, ShapePlan>,
}

impl std::fmt::Debug for Shaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shaper")
            .field("plans", &self.plans.len())
            .finish()
    }
}

impl Shaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full shaping through rustybuzz: contextual substitution, ligatures,
    /// kerning, and (for RTL runs) visual reordering. A codepoint the font
    /// cannot map comes back as the `.notdef` sentinel with a diagnostic,
    /// never as an error; fallback-font logic runs above this layer.
    pub fn shape(
        &mut self,
        font_id: FontId,
        font_name: &str,
        font: &EmbeddedFont,
        text: &str,
        direction: TextDirection,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ShapedGlyph> {
        let Some(face) = HbFace::from_slice(&font.data, 0) else {
            return self.shape_simple(font_name, font, text, diagnostics);
        };
        let upem = face.units_per_em().max(1) as i64;

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        match resolve_direction(direction, text) {
            TextDirection::Rtl => buffer.set_direction(HbDirection::RightToLeft),
            TextDirection::Ltr => buffer.set_direction(HbDirection::LeftToRight),
            TextDirection::Auto => {}
        }
        buffer.guess_segment_properties();

        let dir = buffer.direction();
        let script = buffer.script();
        let lang = buffer.language();
        let plan = self
            .plans
            .entry((font_id, dir, script, lang.clone()))
            .or_insert_with(|| ShapePlan::new(&face, dir, Some(script), lang.as_ref(), &[]));

        let output = rustybuzz::shape_with_plan(&face, plan, buffer);
        let scale = |v: i32| -> i32 {
            let v = v as i64;
            let adj = if v >= 0 { upem / 2 } else { -upem / 2 };
            ((v * 1000 + adj) / upem) as i32
        };

        let mut glyphs = Vec::with_capacity(output.len());
        for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
            let cluster = (info.cluster as usize).min(text.len());
            let codepoint = text[cluster..].chars().next();
            let gid = info.glyph_id as u16;
            if gid == 0 {
                diagnostics.record(Diagnostic::MissingGlyph {
                    font: font_name.to_string(),
                    codepoint: codepoint.map(|c| c as u32).unwrap_or(0),
                });
            }
            glyphs.push(ShapedGlyph {
                gid,
                codepoint,
                x_advance: scale(pos.x_advance),
                y_advance: scale(pos.y_advance),
                x_offset: scale(pos.x_offset),
                y_offset: scale(pos.y_offset),
            });
        }
        glyphs
    }

    /// Degraded 1:1 path used when shaping is disabled: direct cmap lookup
    /// with hmtx advances, no substitution or reordering.
    pub fn shape_simple(
        &self,
        font_name: &str,
        font: &EmbeddedFont,
        text: &str,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ShapedGlyph> {
        let mut glyphs = Vec::with_capacity(text.chars().count());
        for ch in text.chars() {
            let gid = match font.glyph_index(ch as u32) {
                Some(gid) => gid,
                None => {
                    diagnostics.record(Diagnostic::MissingGlyph {
                        font: font_name.to_string(),
                        codepoint: ch as u32,
                    });
                    0
                }
            };
            glyphs.push(ShapedGlyph {
                gid,
                codepoint: Some(ch),
                x_advance: font.advance(gid) as i32,
                y_advance: 0,
                x_offset: 0,
                y_offset: 0,
            });
        }
        glyphs
    }
}

fn resolve_direction(requested: TextDirection, text: &str) -> TextDirection {
    match requested {
        TextDirection::Auto => {
            for ch in text.chars() {
                if is_strong_rtl(ch) {
                    return TextDirection::Rtl;
                }
                if ch.is_alphabetic() {
                    return TextDirection::Ltr;
                }
            }
            TextDirection::Auto
        }
        other => other,
    }
}

fn is_strong_rtl(ch: char) -> bool {
    matches!(ch as u32,
        0x0590..=0x05FF        // Hebrew
        | 0x0600..=0x06FF      // Arabic
        | 0x0700..=0x074F      // Syriac
        | 0x0750..=0x077F      // Arabic Supplement
        | 0x08A0..=0x08FF      // Arabic Extended-A
        | 0xFB1D..=0xFDFF      // presentation forms
        | 0xFE70..=0xFEFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_direction_detects_strong_characters() {
        assert_eq!(resolve_direction(TextDirection::Auto, "hello"), TextDirection::Ltr);
        assert_eq!(resolve_direction(TextDirection::Auto, "שלום"), TextDirection::Rtl);
        assert_eq!(resolve_direction(TextDirection::Auto, "مرحبا"), TextDirection::Rtl);
        // Digits and punctuation alone stay undecided.
        assert_eq!(resolve_direction(TextDirection::Auto, "123"), TextDirection::Auto);
        assert_eq!(resolve_direction(TextDirection::Rtl, "abc"), TextDirection::Rtl);
    }
}
