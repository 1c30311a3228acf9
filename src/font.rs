use crate::core_fonts::CoreFamily;
use crate::error::{Error, Result};
use crate::subset::SubsetFont;
use crate::types::Pt;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn from_flags(bold: bool, italic: bool) -> FontStyle {
        match (bold, italic) {
            (false, false) => FontStyle::Regular,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            FontStyle::Regular => "",
            FontStyle::Bold => "B",
            FontStyle::Italic => "I",
            FontStyle::BoldItalic => "BI",
        }
    }
}

/// Handle to a font in the registry. Cheap to copy; stable for the lifetime
/// of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StyleKey {
    family: String,
    style: FontStyle,
}

impl StyleKey {
    pub(crate) fn new(family: &str, style: FontStyle) -> Self {
        Self {
            family: family.trim().to_ascii_lowercase(),
            style,
        }
    }

    pub(crate) fn display(&self) -> String {
        if self.style == FontStyle::Regular {
            self.family.clone()
        } else {
            format!("{}-{}", self.family, self.style.suffix())
        }
    }
}

/// Vertical metrics and descriptor fields, scaled to 1/1000 em.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub cap_height: i16,
    pub italic_angle: i16,
    pub stem_v: i16,
    pub bbox: (i16, i16, i16, i16),
    pub missing_width: u16,
    pub is_fixed_pitch: bool,
    pub is_symbolic: bool,
}

/// Monotonically growing record of which glyphs a font actually rendered.
///
/// Compact subset glyph ids are issued eagerly, in first-use order, so text
/// operators can be written with their final ids while pages are still being
/// built; the subsetter later lays glyph data out in exactly this order.
/// `.notdef` always occupies slot 0.
#[derive(Debug, Clone)]
pub struct GlyphUsage {
    /// index = subset gid, value = original gid.
    order: Vec<u16>,
    remap: HashMap<u16, u16>,
    by_codepoint: BTreeMap<u32, u16>,
}

impl Default for GlyphUsage {
    fn default() -> Self {
        Self {
            order: vec![0],
            remap: HashMap::from([(0u16, 0u16)]),
            by_codepoint: BTreeMap::new(),
        }
    }
}

impl GlyphUsage {
    /// Record a use of `gid` for `codepoint`, returning the stable subset id.
    pub fn note(&mut self, codepoint: u32, gid: u16) -> u16 {
        let subset_gid = self.note_gid(gid);
        self.by_codepoint.entry(codepoint).or_insert(subset_gid);
        subset_gid
    }

    pub fn note_gid(&mut self, gid: u16) -> u16 {
        if let Some(&mapped) = self.remap.get(&gid) {
            return mapped;
        }
        let mapped = self.order.len() as u16;
        self.order.push(gid);
        self.remap.insert(gid, mapped);
        mapped
    }

    /// Original glyph ids in subset order, `.notdef` first.
    pub fn order(&self) -> &[u16] {
        &self.order
    }

    /// codepoint → subset glyph id.
    pub fn by_codepoint(&self) -> &BTreeMap<u32, u16> {
        &self.by_codepoint
    }

    pub fn original_gid(&self, subset_gid: u16) -> Option<u16> {
        self.order.get(subset_gid as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing beyond `.notdef` was ever used.
    pub fn is_empty(&self) -> bool {
        self.order.len() <= 1
    }
}

#[derive(Debug)]
pub struct EmbeddedFont {
    pub data: Vec<u8>,
    pub sha: [u8; 32],
    pub metrics: FontMetrics,
    /// codepoint -> glyph id, flattened from the best cmap subtable at
    /// registration so later lookups need no re-parse.
    char_map: HashMap<u32, u16>,
    /// advance per gid, 1/1000 em.
    advances: Vec<u16>,
    pub usage: GlyphUsage,
    pub subset: Option<SubsetFont>,
}

impl EmbeddedFont {
    pub fn glyph_index(&self, codepoint: u32) -> Option<u16> {
        self.char_map.get(&codepoint).copied()
    }

    pub fn advance(&self, gid: u16) -> u16 {
        self.advances
            .get(gid as usize)
            .copied()
            .unwrap_or(self.metrics.missing_width)
    }
}

#[derive(Debug)]
pub enum FontKind {
    Core(CoreFamily),
    Embedded(EmbeddedFont),
}

#[derive(Debug)]
pub struct FontRecord {
    pub(crate) key: StyleKey,
    pub kind: FontKind,
}

impl FontRecord {
    pub fn display_name(&self) -> String {
        self.key.display()
    }

    pub fn style(&self) -> FontStyle {
        self.key.style
    }

    pub fn embedded(&self) -> Option<&EmbeddedFont> {
        match &self.kind {
            FontKind::Embedded(f) => Some(f),
            FontKind::Core(_) => None,
        }
    }
}

/// Document-level font registry. Owns every font record; pages refer to
/// fonts only through `FontId`.
#[derive(Debug, Default)]
pub struct FontRegistry {
    fonts: Vec<FontRecord>,
    lookup: HashMap<StyleKey, usize>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an embedded TrueType/OpenType font under a (family, style)
    /// key. Re-registering identical bytes is a no-op; different bytes under
    /// a bound key is a conflict and the first registration stays active.
    pub fn register(&mut self, data: Vec<u8>, family: &str, style: FontStyle) -> Result<FontId> {
        let key = StyleKey::new(family, style);
        let sha: [u8; 32] = Sha256::digest(&data).into();

        if let Some(&index) = self.lookup.get(&key) {
            match &self.fonts[index].kind {
                FontKind::Embedded(existing) if existing.sha == sha => {
                    return Ok(FontId(index));
                }
                _ => return Err(Error::FontNameConflict(key.display())),
            }
        }

        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|_| Error::FontFormat(key.display()))?;
        if face.tables().glyf.is_none() {
            // CFF-flavoured OpenType is not subsettable here.
            return Err(Error::FontFormat(format!(
                "{} has no TrueType outlines",
                key.display()
            )));
        }
        let metrics = extract_metrics(&face);
        let char_map = build_char_map(&face);
        let advances = build_advances(&face);

        let index = self.fonts.len();
        log::debug!("registered font {} ({} bytes)", key.display(), data.len());
        self.fonts.push(FontRecord {
            key: key.clone(),
            kind: FontKind::Embedded(EmbeddedFont {
                data,
                sha,
                metrics,
                char_map,
                advances,
                usage: GlyphUsage::default(),
                subset: None,
            }),
        });
        self.lookup.insert(key, index);
        Ok(FontId(index))
    }

    /// Resolve a family/style to a font id, materializing a built-in core
    /// font record on first use. Embedded registrations shadow core names.
    pub fn resolve(&mut self, family: &str, style: FontStyle) -> Option<FontId> {
        let key = StyleKey::new(family, style);
        if let Some(&index) = self.lookup.get(&key) {
            return Some(FontId(index));
        }
        let core = CoreFamily::from_name(family)?;
        let index = self.fonts.len();
        self.fonts.push(FontRecord {
            key: key.clone(),
            kind: FontKind::Core(core),
        });
        self.lookup.insert(key, index);
        Some(FontId(index))
    }

    /// Look up (or cmap-compute) the glyph index for a codepoint and record
    /// it in the font's usage set. Fallback-font logic runs before this call;
    /// here an unmapped codepoint is a hard error.
    pub fn note_glyph_used(&mut self, id: FontId, codepoint: u32) -> Result<u16> {
        let record = self
            .fonts
            .get_mut(id.0)
            .ok_or_else(|| Error::Structural(format!("unknown font id {}", id.0)))?;
        let name = record.key.display();
        match &mut record.kind {
            FontKind::Core(_) => Err(Error::Structural(format!(
                "glyph tracking requested for core font {name}"
            ))),
            FontKind::Embedded(font) => {
                let gid = font
                    .glyph_index(codepoint)
                    .ok_or(Error::GlyphNotFound {
                        font: name,
                        codepoint,
                    })?;
                Ok(font.usage.note(codepoint, gid))
            }
        }
    }

    /// Record a use of an already-shaped original glyph id (the shaper hands
    /// these out directly) and return its subset id.
    pub fn note_shaped(
        &mut self,
        id: FontId,
        original_gid: u16,
        codepoint: Option<u32>,
    ) -> Result<u16> {
        let record = self
            .fonts
            .get_mut(id.0)
            .ok_or_else(|| Error::Structural(format!("unknown font id {}", id.0)))?;
        match &mut record.kind {
            FontKind::Core(_) => Err(Error::Structural(
                "glyph tracking requested for core font".to_string(),
            )),
            FontKind::Embedded(font) => Ok(match codepoint {
                Some(cp) => font.usage.note(cp, original_gid),
                None => font.usage.note_gid(original_gid),
            }),
        }
    }

    /// Build and cache the subset font program for an embedded font.
    /// Idempotent, so repeated serialization reuses the first result.
    pub(crate) fn ensure_subset(&mut self, id: FontId) -> Result<()> {
        let record = self
            .fonts
            .get_mut(id.0)
            .ok_or_else(|| Error::Structural(format!("unknown font id {}", id.0)))?;
        if let FontKind::Embedded(font) = &mut record.kind {
            if font.subset.is_none() {
                font.subset = Some(crate::subset::subset(&font.data, &font.usage)?);
            }
        }
        Ok(())
    }

    pub fn supports_codepoint(&self, id: FontId, codepoint: u32) -> bool {
        match self.fonts.get(id.0).map(|r| &r.kind) {
            Some(FontKind::Embedded(font)) => font.glyph_index(codepoint).is_some(),
            Some(FontKind::Core(family)) => {
                (32..=126).contains(&codepoint) || family.is_symbolic()
            }
            None => false,
        }
    }

    pub fn get(&self, id: FontId) -> Option<&FontRecord> {
        self.fonts.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: FontId) -> Option<&mut FontRecord> {
        self.fonts.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (FontId, &FontRecord)> {
        self.fonts.iter().enumerate().map(|(i, r)| (FontId(i), r))
    }

    /// Width of `text` at `size`, using embedded advances or core tables.
    pub fn measure_text(&self, id: FontId, size: Pt, text: &str) -> Pt {
        let Some(record) = self.fonts.get(id.0) else {
            return Pt::ZERO;
        };
        let mut units: i32 = 0;
        match &record.kind {
            FontKind::Core(family) => {
                for ch in text.chars() {
                    units = units.saturating_add(family.char_width(record.key.style, ch) as i32);
                }
            }
            FontKind::Embedded(font) => {
                for ch in text.chars() {
                    let adv = match font.glyph_index(ch as u32) {
                        Some(gid) => font.advance(gid),
                        None => font.metrics.missing_width,
                    };
                    units = units.saturating_add(adv as i32);
                }
            }
        }
        size.mul_ratio(units, 1000)
    }

    pub fn line_height(&self, id: FontId, size: Pt) -> Pt {
        let Some(FontKind::Embedded(font)) = self.fonts.get(id.0).map(|r| &r.kind) else {
            // Core fonts: the conventional 1.2em leading.
            return size.mul_ratio(6, 5);
        };
        let m = &font.metrics;
        let units = m.ascent as i32 - m.descent as i32 + m.line_gap as i32;
        if units <= 0 {
            size.mul_ratio(6, 5)
        } else {
            size.mul_ratio(units, 1000)
        }
    }
}

fn scale_to_em(value: i16, units_per_em: u16) -> i16 {
    let units = units_per_em.max(1) as i64;
    let scaled = ((value as i64) * 1000 + units / 2 * value.signum() as i64) / units;
    scaled.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

fn extract_metrics(face: &ttf_parser::Face<'_>) -> FontMetrics {
    let upem = face.units_per_em().max(1);
    let ascent = scale_to_em(face.ascender(), upem);
    let descent = scale_to_em(face.descender(), upem);
    let line_gap = scale_to_em(face.line_gap(), upem);
    let cap_height = face
        .capital_height()
        .map(|v| scale_to_em(v, upem))
        .unwrap_or(ascent);
    let bbox = face.global_bounding_box();
    let bbox = (
        scale_to_em(bbox.x_min, upem),
        scale_to_em(bbox.y_min, upem),
        scale_to_em(bbox.x_max, upem),
        scale_to_em(bbox.y_max, upem),
    );
    let italic_angle = face
        .italic_angle()
        .map(|v| v.round() as i16)
        .unwrap_or(0);
    let missing_width = face
        .glyph_index(' ')
        .and_then(|gid| face.glyph_hor_advance(gid))
        .map(|adv| {
            let units = upem as i64;
            (((adv as i64) * 1000 + units / 2) / units).clamp(0, u16::MAX as i64) as u16
        })
        .unwrap_or(500);
    let is_symbolic = has_symbol_subtable(face);

    FontMetrics {
        units_per_em: upem,
        ascent,
        descent,
        line_gap,
        cap_height,
        italic_angle,
        stem_v: 80,
        bbox,
        missing_width,
        is_fixed_pitch: face.is_monospaced(),
        is_symbolic,
    }
}

fn has_symbol_subtable(face: &ttf_parser::Face<'_>) -> bool {
    let Some(cmap) = face.tables().cmap else {
        return false;
    };
    cmap.subtables.into_iter().any(|st| {
        st.platform_id == ttf_parser::name::PlatformId::Windows && st.encoding_id == 0
    })
}

/// Flatten the best cmap subtable into a plain map. Unicode subtables win;
/// a Windows symbol subtable is used as a last resort, with both the raw
/// codepoint and its 0xF000-paged alias mapped.
fn build_char_map(face: &ttf_parser::Face<'_>) -> HashMap<u32, u16> {
    let mut map = HashMap::new();
    let Some(cmap) = face.tables().cmap else {
        return map;
    };
    let mut symbol_only = true;
    for st in cmap.subtables {
        if !st.is_unicode() {
            continue;
        }
        symbol_only = false;
        st.codepoints(|cp| {
            if let Some(gid) = st.glyph_index(cp) {
                map.entry(cp).or_insert(gid.0);
            }
        });
    }
    if symbol_only {
        for st in cmap.subtables {
            if st.platform_id != ttf_parser::name::PlatformId::Windows || st.encoding_id != 0 {
                continue;
            }
            st.codepoints(|cp| {
                if let Some(gid) = st.glyph_index(cp) {
                    map.entry(cp).or_insert(gid.0);
                    if (0xF000..=0xF0FF).contains(&cp) {
                        map.entry(cp - 0xF000).or_insert(gid.0);
                    }
                }
            });
        }
    }
    map
}

fn build_advances(face: &ttf_parser::Face<'_>) -> Vec<u16> {
    let upem = face.units_per_em().max(1) as i64;
    let count = face.number_of_glyphs();
    let mut advances = Vec::with_capacity(count as usize);
    for gid in 0..count {
        let adv = face
            .glyph_hor_advance(ttf_parser::GlyphId(gid))
            .unwrap_or(0) as i64;
        advances.push(((adv * 1000 + upem / 2) / upem).clamp(0, u16::MAX as i64) as u16);
    }
    advances
}
