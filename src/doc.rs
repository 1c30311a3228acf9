//! The document builder. Pages are assembled top-down in user units with a
//! top-left origin; the flip into PDF page space happens at operator
//! emission, never in user-facing state.

use crate::content::{ContentStream, Op};
use crate::encrypt::Encryption;
use crate::error::{Diagnostic, Diagnostics, Error, Result};
use crate::font::{FontId, FontKind, FontRegistry, FontStyle};
use crate::image::{ImageId, ImageStore};
use crate::outline::Bookmark;
use crate::shape::{Shaper, TextDirection};
use crate::state::{GraphicsState, GraphicsStateStack, StateParam, TextRenderMode};
use crate::types::{Color, Margins, Matrix, Orientation, PageFormat, Pt, Rect, Size, Unit};
use crate::writer::{
    self, Annotation, LinkTarget, Metadata, PageUnit, PdfVersion, SerializeInput,
};
use std::collections::BTreeSet;

/// Knobs fixed at construction. Everything else is set through methods while
/// the document is open.
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub format: PageFormat,
    pub orientation: Orientation,
    pub unit: Unit,
    pub margins: Margins,
    pub version: PdfVersion,
    /// Deflate content streams. Font programs and raw pixel data are always
    /// compressed regardless.
    pub compress: bool,
    /// Write a cross-reference stream instead of the classic table
    /// (requires 1.5+; implied by 2.0).
    pub xref_streams: bool,
    /// Archival profile: refuse to serialize with non-embedded fonts.
    pub archival: bool,
    /// Run full shaping (ligatures, kerning, bidi) on embedded-font text.
    pub shape_text: bool,
    pub auto_page_break: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            format: PageFormat::default(),
            orientation: Orientation::default(),
            unit: Unit::default(),
            margins: Margins::default(),
            version: PdfVersion::default(),
            compress: true,
            xref_streams: false,
            archival: false,
            shape_text: true,
            auto_page_break: true,
        }
    }
}

/// How a shape operation paints its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintMode {
    #[default]
    Stroke,
    Fill,
    FillStroke,
}

#[derive(Debug)]
struct PageBuild {
    size: Size,
    content: ContentStream,
    annots: Vec<Annotation>,
}

/// An in-progress PDF document.
///
/// The lifecycle is append-only: add pages and content, then call
/// [`Document::output`] exactly once. Any mutation after that returns
/// [`Error::AlreadyFinalized`].
#[derive(Debug)]
pub struct Document {
    options: DocumentOptions,
    metadata: Metadata,
    fonts: FontRegistry,
    shaper: Shaper,
    diagnostics: Diagnostics,
    state: GraphicsStateStack,
    pages: Vec<PageBuild>,
    images: ImageStore,
    ext_gstates: Vec<(f32, f32)>,
    bookmarks: Vec<Bookmark>,
    fallback: Vec<FontId>,
    text_direction: TextDirection,
    used_fonts: BTreeSet<FontId>,
    used_images: BTreeSet<ImageId>,
    encryption: Option<Encryption>,
    cursor_x: Pt,
    cursor_y: Pt,
    finalized: bool,
}

impl Document {
    pub fn new(options: DocumentOptions) -> Self {
        Self {
            options,
            metadata: Metadata::default(),
            fonts: FontRegistry::new(),
            shaper: Shaper::new(),
            diagnostics: Diagnostics::default(),
            state: GraphicsStateStack::new(),
            pages: Vec::new(),
            images: ImageStore::new(),
            ext_gstates: Vec::new(),
            bookmarks: Vec::new(),
            fallback: Vec::new(),
            text_direction: TextDirection::Auto,
            used_fonts: BTreeSet::new(),
            used_images: BTreeSet::new(),
            encryption: None,
            cursor_x: Pt::ZERO,
            cursor_y: Pt::ZERO,
            finalized: false,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    // ---- metadata ----

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.metadata.title = Some(title.into());
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.metadata.author = Some(author.into());
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.metadata.subject = Some(subject.into());
    }

    pub fn set_keywords(&mut self, keywords: impl Into<String>) {
        self.metadata.keywords = Some(keywords.into());
    }

    pub fn set_creator(&mut self, creator: impl Into<String>) {
        self.metadata.creator = Some(creator.into());
    }

    pub fn set_producer(&mut self, producer: impl Into<String>) {
        self.metadata.producer = Some(producer.into());
    }

    /// Protect the output with the standard security handler (RC4,
    /// 128-bit). Incompatible with the archival profile; the conflict is
    /// reported at [`Document::output`].
    pub fn set_encryption(&mut self, encryption: Encryption) -> Result<()> {
        self.check_open()?;
        self.encryption = Some(encryption);
        Ok(())
    }

    // ---- fonts ----

    /// Register an embedded font under a family/style key.
    pub fn add_font(&mut self, family: &str, style: FontStyle, data: Vec<u8>) -> Result<FontId> {
        self.check_open()?;
        self.fonts.register(data, family, style)
    }

    /// Fonts tried, in order, for codepoints the selected font cannot map.
    pub fn set_fallback_fonts(&mut self, fonts: Vec<FontId>) {
        self.fallback = fonts;
    }

    /// Select the active font. `size` is in points, independent of the
    /// document unit.
    pub fn set_font(&mut self, family: &str, style: FontStyle, size: f32) -> Result<FontId> {
        self.check_open()?;
        let id = self
            .fonts
            .resolve(family, style)
            .ok_or_else(|| Error::UnknownFont(family.to_string()))?;
        self.state.set(StateParam::Font(Some(id)));
        self.state.set(StateParam::FontSize(Pt::from_f32(size)));
        self.used_fonts.insert(id);
        Ok(id)
    }

    /// Base direction for subsequent text. `Auto` resolves per run from the
    /// first strong character.
    pub fn set_text_direction(&mut self, direction: TextDirection) {
        self.text_direction = direction;
    }

    pub fn set_font_size(&mut self, size: f32) -> Result<()> {
        self.check_open()?;
        self.state.set(StateParam::FontSize(Pt::from_f32(size)));
        Ok(())
    }

    // ---- pages ----

    /// Start a new page with the document's default format. Drawing state
    /// carries over; open [`Document::with_state`] scopes do not, and leaving
    /// one open across a page break is an error.
    pub fn add_page(&mut self) -> Result<()> {
        self.add_page_sized(self.options.format, self.options.orientation)
    }

    pub fn add_page_sized(&mut self, format: PageFormat, orientation: Orientation) -> Result<()> {
        self.check_open()?;
        if !self.pages.is_empty() && self.state.depth() != 0 {
            return Err(Error::UnbalancedState(
                "page ended inside a scoped state block".to_string(),
            ));
        }
        let size = orientation.apply(format.size());
        self.pages.push(PageBuild {
            size,
            content: ContentStream::new(),
            annots: Vec::new(),
        });
        self.cursor_x = self.options.margins.left;
        self.cursor_y = self.options.margins.top;
        self.carry_state()
    }

    /// Re-assert the non-default drawing parameters on a fresh page, so the
    /// visible state survives page breaks. Fonts need no carry here; `Tf` is
    /// emitted inside every text object.
    fn carry_state(&mut self) -> Result<()> {
        let state = self.state.current().clone();
        let defaults = GraphicsState::default();
        let gs_index = (state.fill_alpha != defaults.fill_alpha
            || state.stroke_alpha != defaults.stroke_alpha)
            .then(|| self.gstate_index(state.fill_alpha, state.stroke_alpha));
        let page = self.pages.last_mut().expect("page just added");
        if state.line_width != defaults.line_width {
            page.content.emit(Op::SetLineWidth(state.line_width))?;
        }
        if state.line_cap != defaults.line_cap {
            page.content.emit(Op::SetLineCap(state.line_cap))?;
        }
        if state.line_join != defaults.line_join {
            page.content.emit(Op::SetLineJoin(state.line_join))?;
        }
        if state.miter_limit != defaults.miter_limit {
            page.content.emit(Op::SetMiterLimit(state.miter_limit))?;
        }
        if !state.dash_pattern.is_empty() || state.dash_phase != Pt::ZERO {
            page.content.emit(Op::SetDash {
                pattern: state.dash_pattern.clone(),
                phase: state.dash_phase,
            })?;
        }
        if state.fill_color != defaults.fill_color {
            page.content.emit(Op::SetFillColor(state.fill_color))?;
        }
        if state.stroke_color != defaults.stroke_color {
            page.content.emit(Op::SetStrokeColor(state.stroke_color))?;
        }
        if let Some(index) = gs_index {
            page.content
                .emit(Op::SetExtGState(writer::gstate_resource(index)))?;
        }
        Ok(())
    }

    // ---- drawing state ----

    pub fn set_fill_color(&mut self, color: Color) -> Result<()> {
        self.check_open()?;
        self.state.set(StateParam::FillColor(color));
        if let Some(page) = self.pages.last_mut() {
            page.content.emit(Op::SetFillColor(color))?;
        }
        Ok(())
    }

    pub fn set_stroke_color(&mut self, color: Color) -> Result<()> {
        self.check_open()?;
        self.state.set(StateParam::StrokeColor(color));
        if let Some(page) = self.pages.last_mut() {
            page.content.emit(Op::SetStrokeColor(color))?;
        }
        Ok(())
    }

    /// Color applied to glyphs. Scoped to each text object, so it never
    /// bleeds into fills.
    pub fn set_text_color(&mut self, color: Color) -> Result<()> {
        self.check_open()?;
        self.state.set(StateParam::TextColor(color));
        Ok(())
    }

    /// Line width in user units.
    pub fn set_line_width(&mut self, width: f32) -> Result<()> {
        self.check_open()?;
        let width = self.upt(width);
        self.state.set(StateParam::LineWidth(width));
        if let Some(page) = self.pages.last_mut() {
            page.content.emit(Op::SetLineWidth(width))?;
        }
        Ok(())
    }

    /// 0 = butt, 1 = round, 2 = square.
    pub fn set_line_cap(&mut self, cap: u8) -> Result<()> {
        self.check_open()?;
        let cap = cap.min(2);
        self.state.set(StateParam::LineCap(cap));
        if let Some(page) = self.pages.last_mut() {
            page.content.emit(Op::SetLineCap(cap))?;
        }
        Ok(())
    }

    /// 0 = miter, 1 = round, 2 = bevel.
    pub fn set_line_join(&mut self, join: u8) -> Result<()> {
        self.check_open()?;
        let join = join.min(2);
        self.state.set(StateParam::LineJoin(join));
        if let Some(page) = self.pages.last_mut() {
            page.content.emit(Op::SetLineJoin(join))?;
        }
        Ok(())
    }

    /// Dash lengths and phase in user units. An empty pattern restores solid
    /// lines.
    pub fn set_dash(&mut self, pattern: &[f32], phase: f32) -> Result<()> {
        self.check_open()?;
        let pattern: Vec<Pt> = pattern.iter().map(|&v| self.upt(v)).collect();
        let phase = self.upt(phase);
        self.state
            .set(StateParam::Dash(pattern.clone(), phase));
        if let Some(page) = self.pages.last_mut() {
            page.content.emit(Op::SetDash { pattern, phase })?;
        }
        Ok(())
    }

    /// Extra spacing between glyphs, in points.
    pub fn set_char_spacing(&mut self, spacing: f32) -> Result<()> {
        self.check_open()?;
        self.state
            .set(StateParam::CharSpacing(Pt::from_f32(spacing)));
        Ok(())
    }

    pub fn set_render_mode(&mut self, mode: TextRenderMode) -> Result<()> {
        self.check_open()?;
        self.state.set(StateParam::RenderMode(mode));
        Ok(())
    }

    /// Constant alpha for fills and strokes, clamped to 0..=1. Backed by a
    /// shared ExtGState resource per distinct pair.
    pub fn set_alpha(&mut self, fill: f32, stroke: f32) -> Result<()> {
        self.check_open()?;
        let fill = fill.clamp(0.0, 1.0);
        let stroke = stroke.clamp(0.0, 1.0);
        self.state.set(StateParam::FillAlpha(fill));
        self.state.set(StateParam::StrokeAlpha(stroke));
        let index = self.gstate_index(fill, stroke);
        if let Some(page) = self.pages.last_mut() {
            page.content
                .emit(Op::SetExtGState(writer::gstate_resource(index)))?;
        }
        Ok(())
    }

    fn gstate_index(&mut self, fill: f32, stroke: f32) -> usize {
        match self
            .ext_gstates
            .iter()
            .position(|&(f, s)| f == fill && s == stroke)
        {
            Some(index) => index,
            None => {
                self.ext_gstates.push((fill, stroke));
                self.ext_gstates.len() - 1
            }
        }
    }

    /// Run `f` inside a saved/restored state scope: every parameter change
    /// and the emitted `q`/`Q` pair are undone on exit, error or not.
    pub fn with_state<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.check_open()?;
        self.page_mut()?.content.emit(Op::SaveState)?;
        let scope = self.state.push();
        let result = f(self);
        self.state.pop(scope)?;
        self.page_mut()?.content.emit(Op::RestoreState)?;
        result
    }

    // ---- text ----

    /// Place `text` with its baseline at `(x, y)` in user units from the
    /// top-left corner. Returns the advance width in points.
    pub fn text(&mut self, x: f32, y: f32, text: &str) -> Result<Pt> {
        self.check_open()?;
        if self.pages.is_empty() {
            return Err(Error::NoPage);
        }
        let (x, y) = (self.upt(x), self.upt(y));
        self.draw_text_at(x, y, text)
    }

    /// Flowing text from the current cursor: greedy word wrap at the right
    /// margin, `\n` honored, automatic page breaks when enabled. With
    /// pagination off, overflowing text keeps its position and a
    /// [`Diagnostic::TextClipped`] event is recorded.
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        self.check_open()?;
        if self.pages.is_empty() {
            return Err(Error::NoPage);
        }
        let font = self.state.current().font.ok_or(Error::NoFontSelected)?;
        let size = self.state.current().font_size;
        let line_height = self.fonts.line_height(font, size);
        let left = self.options.margins.left;
        let mut clipped_on: Option<usize> = None;

        for (i, raw_line) in text.split('\n').enumerate() {
            if i > 0 {
                self.cursor_x = left;
                self.cursor_y += line_height;
            }
            for word in raw_line.split_whitespace() {
                let word_w = self.fonts.measure_text(font, size, word);
                let space_w = self.fonts.measure_text(font, size, " ");
                let page = self.pages.last().expect("checked above");
                let right_limit = page.size.width - self.options.margins.right;
                let bottom_limit = page.size.height - self.options.margins.bottom;

                let prefix = if self.cursor_x > left { space_w } else { Pt::ZERO };
                if self.cursor_x > left && self.cursor_x + prefix + word_w > right_limit {
                    self.cursor_x = left;
                    self.cursor_y += line_height;
                }
                if self.cursor_y + line_height > bottom_limit {
                    if self.options.auto_page_break {
                        self.add_page()?;
                    } else if clipped_on != Some(self.pages.len() - 1) {
                        clipped_on = Some(self.pages.len() - 1);
                        self.diagnostics.record(Diagnostic::TextClipped {
                            page: self.pages.len() - 1,
                        });
                    }
                }
                let x = if self.cursor_x > left {
                    self.cursor_x + space_w
                } else {
                    self.cursor_x
                };
                let baseline = self.cursor_y + line_height;
                let advance = self.draw_text_at(x, baseline, word)?;
                self.cursor_x = x + advance;
            }
        }
        Ok(())
    }

    fn draw_text_at(&mut self, x: Pt, baseline_from_top: Pt, text: &str) -> Result<Pt> {
        let font = self.state.current().font.ok_or(Error::NoFontSelected)?;
        let size = self.state.current().font_size;
        let baseline = self.page_mut()?.size.height - baseline_from_top;
        let runs = self.segment_runs(font, text);
        let mut pen = x;
        for (run_font, run_text) in runs {
            pen += self.draw_run(run_font, size, pen, baseline, &run_text)?;
        }
        Ok(pen - x)
    }

    /// Split `text` into maximal runs renderable by one font: the selected
    /// font where it can map the codepoint, otherwise the first fallback
    /// that can. Unmappable codepoints stay with the selected font and
    /// surface as missing-glyph diagnostics downstream.
    fn segment_runs(&mut self, primary: FontId, text: &str) -> Vec<(FontId, String)> {
        let fallback = self.fallback.clone();
        let mut runs: Vec<(FontId, String)> = Vec::new();
        for ch in text.chars() {
            let mut id = primary;
            if !self.fonts.supports_codepoint(primary, ch as u32) {
                if let Some(&fb) = fallback
                    .iter()
                    .find(|&&fb| self.fonts.supports_codepoint(fb, ch as u32))
                {
                    id = fb;
                }
            }
            match runs.last_mut() {
                Some((last, buf)) if *last == id => buf.push(ch),
                _ => runs.push((id, ch.to_string())),
            }
        }
        for (id, _) in &runs {
            if *id == primary {
                continue;
            }
            self.used_fonts.insert(*id);
            let requested = self
                .fonts
                .get(primary)
                .map(|r| r.display_name())
                .unwrap_or_default();
            let used = self
                .fonts
                .get(*id)
                .map(|r| r.display_name())
                .unwrap_or_default();
            self.diagnostics
                .record(Diagnostic::FallbackSubstitution { requested, used });
        }
        runs
    }

    fn draw_run(&mut self, id: FontId, size: Pt, x: Pt, baseline: Pt, text: &str) -> Result<Pt> {
        if text.is_empty() {
            return Ok(Pt::ZERO);
        }
        let state = self.state.current().clone();
        let is_core = matches!(
            self.fonts.get(id).map(|r| &r.kind),
            Some(FontKind::Core(_))
        );
        let (payload, width) = if is_core {
            self.encode_core_run(id, size, text)?
        } else {
            self.encode_embedded_run(id, size, text, &state)?
        };

        let page = self.pages.last_mut().ok_or(Error::NoPage)?;
        let tinted = state.text_color != state.fill_color;
        if tinted {
            page.content.emit(Op::SaveState)?;
            page.content.emit(Op::SetFillColor(state.text_color))?;
        }
        page.content.emit(Op::BeginText)?;
        page.content.emit(Op::SetFont {
            resource: writer::font_resource(id),
            size,
        })?;
        if state.char_spacing != Pt::ZERO {
            page.content.emit(Op::SetCharSpacing(state.char_spacing))?;
        }
        if state.render_mode != TextRenderMode::Fill {
            page.content
                .emit(Op::SetRenderMode(state.render_mode.operand()))?;
        }
        page.content
            .emit(Op::SetTextMatrix(Matrix::translate(x, baseline)))?;
        page.content.emit(payload)?;
        page.content.emit(Op::EndText)?;
        if tinted {
            page.content.emit(Op::RestoreState)?;
        }
        Ok(width)
    }

    /// Built-in fonts carry only the printable ASCII range here; anything
    /// else is replaced with `?` and recorded.
    fn encode_core_run(&mut self, id: FontId, size: Pt, text: &str) -> Result<(Op, Pt)> {
        let name = self
            .fonts
            .get(id)
            .map(|r| r.display_name())
            .unwrap_or_default();
        let mut replaced = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch.is_ascii() && !ch.is_ascii_control() {
                replaced.push(ch);
            } else {
                self.diagnostics.record(Diagnostic::MissingGlyph {
                    font: name.clone(),
                    codepoint: ch as u32,
                });
                replaced.push('?');
            }
        }
        let mut literal = String::with_capacity(replaced.len() + 2);
        literal.push('(');
        for ch in replaced.chars() {
            if matches!(ch, '(' | ')' | '\\') {
                literal.push('\\');
            }
            literal.push(ch);
        }
        literal.push(')');
        let mut width = self.fonts.measure_text(id, size, &replaced);
        let spacing = self.state.current().char_spacing;
        if spacing != Pt::ZERO {
            width += spacing * replaced.chars().count() as i32;
        }
        Ok((Op::ShowText(literal), width))
    }

    /// Shape the run, record glyph usage, and encode the subset glyph ids as
    /// a hex string, with TJ adjustments wherever the shaped position
    /// deviates from the plain advance.
    fn encode_embedded_run(
        &mut self,
        id: FontId,
        size: Pt,
        text: &str,
        state: &GraphicsState,
    ) -> Result<(Op, Pt)> {
        let name = self
            .fonts
            .get(id)
            .map(|r| r.display_name())
            .unwrap_or_default();
        let glyphs = {
            let record = self
                .fonts
                .get(id)
                .ok_or_else(|| Error::Structural(format!("unknown font id {}", id.0)))?;
            let font = record.embedded().ok_or_else(|| {
                Error::Structural("embedded encoding for a core font".to_string())
            })?;
            if self.options.shape_text {
                let direction = self.text_direction;
                self.shaper
                    .shape(id, &name, font, text, direction, &mut self.diagnostics)
            } else {
                self.shaper
                    .shape_simple(&name, font, text, &mut self.diagnostics)
            }
        };
        let nominals: Vec<u16> = {
            let record = self.fonts.get(id).expect("checked above");
            let font = record.embedded().expect("checked above");
            glyphs.iter().map(|g| font.advance(g.gid)).collect()
        };

        let mut parts: Vec<String> = Vec::new();
        let mut hex = String::new();
        let mut adjusted = false;
        let mut pending: i64 = 0;
        let mut total: i64 = 0;
        for (glyph, &nominal) in glyphs.iter().zip(&nominals) {
            let subset_gid =
                self.fonts
                    .note_shaped(id, glyph.gid, glyph.codepoint.map(|c| c as u32))?;
            let before = pending - glyph.x_offset as i64;
            if before != 0 {
                if !hex.is_empty() {
                    parts.push(format!("<{hex}>"));
                    hex.clear();
                }
                parts.push(before.to_string());
                adjusted = true;
            }
            hex.push_str(&format!("{subset_gid:04X}"));
            pending = glyph.x_offset as i64 + nominal as i64 - glyph.x_advance as i64;
            total += glyph.x_advance as i64;
        }
        if !hex.is_empty() {
            parts.push(format!("<{hex}>"));
        }

        let op = if adjusted {
            Op::ShowTextAdjusted(format!("[{}]", parts.join(" ")))
        } else {
            Op::ShowText(parts.pop().unwrap_or_else(|| "<>".to_string()))
        };
        let mut width = size.mul_ratio(total.clamp(i32::MIN as i64, i32::MAX as i64) as i32, 1000);
        if state.char_spacing != Pt::ZERO {
            width += state.char_spacing * glyphs.len() as i32;
        }
        Ok((op, width))
    }

    /// Width of `text` in the current font and size, in user units.
    /// Plain advances, no shaping adjustments.
    pub fn text_width(&self, text: &str) -> Result<f32> {
        let font = self.state.current().font.ok_or(Error::NoFontSelected)?;
        let size = self.state.current().font_size;
        let width = self.fonts.measure_text(font, size, text);
        Ok(width.to_f32() / self.options.unit.scale())
    }

    // ---- shapes ----

    /// Straight line between two points in user units, stroked with the
    /// current state.
    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<()> {
        self.check_open()?;
        let h = self.page_mut()?.size.height;
        let (x1, y1) = (self.upt(x1), h - self.upt(y1));
        let (x2, y2) = (self.upt(x2), h - self.upt(y2));
        let page = self.page_mut()?;
        page.content.emit(Op::MoveTo(x1, y1))?;
        page.content.emit(Op::LineTo(x2, y2))?;
        page.content.emit(Op::Stroke)
    }

    /// Axis-aligned rectangle, top-left anchored, in user units.
    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, mode: PaintMode) -> Result<()> {
        self.check_open()?;
        let page_h = self.page_mut()?.size.height;
        let (x, w, h) = (self.upt(x), self.upt(w), self.upt(h));
        let y = page_h - self.upt(y) - h;
        let page = self.page_mut()?;
        page.content.emit(Op::Rect(x, y, w, h))?;
        page.content.emit(match mode {
            PaintMode::Stroke => Op::Stroke,
            PaintMode::Fill => Op::Fill,
            PaintMode::FillStroke => Op::FillStroke,
        })
    }

    // ---- images ----

    /// Decode and register an image. The same bytes registered twice share
    /// one embedded object.
    pub fn register_image(&mut self, data: &[u8]) -> Result<ImageId> {
        self.check_open()?;
        self.images.register(data)
    }

    /// Place a registered image with its top-left corner at `(x, y)`.
    /// A missing dimension is derived from the other by aspect ratio; with
    /// both missing the image is placed at one point per pixel.
    pub fn image(
        &mut self,
        id: ImageId,
        x: f32,
        y: f32,
        w: Option<f32>,
        h: Option<f32>,
    ) -> Result<()> {
        self.check_open()?;
        let record = self
            .images
            .get(id)
            .ok_or_else(|| Error::Structural(format!("unknown image id {}", id.0)))?;
        let (px_w, px_h) = (record.width as i32, record.height as i32);
        let (w, h) = match (w, h) {
            (Some(w), Some(h)) => (self.upt(w), self.upt(h)),
            (Some(w), None) => (self.upt(w), self.upt(w).mul_ratio(px_h, px_w)),
            (None, Some(h)) => (self.upt(h).mul_ratio(px_w, px_h), self.upt(h)),
            (None, None) => (Pt::from_i32(px_w), Pt::from_i32(px_h)),
        };
        let page_h = self.page_mut()?.size.height;
        let x = self.upt(x);
        let y = page_h - self.upt(y) - h;
        self.used_images.insert(id);
        let page = self.page_mut()?;
        page.content.emit(Op::SaveState)?;
        page.content.emit(Op::Concat(Matrix {
            a: w.to_f32(),
            b: 0.0,
            c: 0.0,
            d: h.to_f32(),
            e: x,
            f: y,
        }))?;
        page.content
            .emit(Op::DrawXObject(writer::image_resource(id)))?;
        page.content.emit(Op::RestoreState)
    }

    // ---- links and bookmarks ----

    /// External link annotation over the given rectangle (user units,
    /// top-left anchored).
    pub fn link(&mut self, x: f32, y: f32, w: f32, h: f32, url: impl Into<String>) -> Result<()> {
        self.check_open()?;
        let rect = self.link_rect(x, y, w, h)?;
        self.page_mut()?.annots.push(Annotation {
            rect,
            target: LinkTarget::Url(url.into()),
        });
        Ok(())
    }

    /// Internal link to a position on another page. The target page may not
    /// exist yet; it is resolved at serialization.
    pub fn internal_link(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        page_index: usize,
        target_y: f32,
    ) -> Result<()> {
        self.check_open()?;
        let rect = self.link_rect(x, y, w, h)?;
        let target_h = self
            .pages
            .get(page_index)
            .map(|p| p.size.height)
            .unwrap_or_else(|| self.options.orientation.apply(self.options.format.size()).height);
        let target_y = target_h - self.upt(target_y);
        self.page_mut()?.annots.push(Annotation {
            rect,
            target: LinkTarget::Page {
                index: page_index,
                y: target_y,
            },
        });
        Ok(())
    }

    fn link_rect(&mut self, x: f32, y: f32, w: f32, h: f32) -> Result<Rect> {
        let page_h = self.page_mut()?.size.height;
        let (x, w, h) = (self.upt(x), self.upt(w), self.upt(h));
        Ok(Rect {
            x,
            y: page_h - self.upt(y) - h,
            width: w,
            height: h,
        })
    }

    /// Outline entry pointing at the current cursor position.
    pub fn bookmark(&mut self, title: impl Into<String>, level: usize) -> Result<()> {
        self.check_open()?;
        let page_h = self.page_mut()?.size.height;
        self.bookmarks.push(Bookmark {
            title: title.into(),
            level,
            page_index: self.pages.len() - 1,
            y: page_h - self.cursor_y,
        });
        Ok(())
    }

    // ---- cursor ----

    pub fn set_cursor(&mut self, x: f32, y: f32) {
        self.cursor_x = self.upt(x);
        self.cursor_y = self.upt(y);
    }

    pub fn cursor(&self) -> (f32, f32) {
        let scale = self.options.unit.scale();
        (
            self.cursor_x.to_f32() / scale,
            self.cursor_y.to_f32() / scale,
        )
    }

    // ---- output ----

    /// Finalize and serialize. Consuming operation: the first call produces
    /// the file, every later call (and every later mutation) fails with
    /// [`Error::AlreadyFinalized`].
    pub fn output(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        if self.pages.is_empty() {
            return Err(Error::EmptyDocument);
        }
        if self.state.depth() != 0 {
            return Err(Error::UnbalancedState(
                "document finalized inside a scoped state block".to_string(),
            ));
        }
        self.finalized = true;

        let mut units = Vec::with_capacity(self.pages.len());
        for page in std::mem::take(&mut self.pages) {
            units.push(PageUnit {
                size: page.size,
                content: page.content.finish()?,
                annots: page.annots,
            });
        }
        writer::serialize(SerializeInput {
            version: self.options.version,
            compress: self.options.compress,
            xref_streams: self.options.xref_streams,
            archival: self.options.archival,
            metadata: &self.metadata,
            pages: &units,
            fonts: &mut self.fonts,
            used_fonts: &self.used_fonts,
            images: &self.images,
            used_images: &self.used_images,
            ext_gstates: &self.ext_gstates,
            bookmarks: &self.bookmarks,
            encryption: self.encryption.as_ref(),
        })
    }

    pub fn output_to(&mut self, mut writer: impl std::io::Write) -> Result<()> {
        let bytes = self.output()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    // ---- internals ----

    fn check_open(&self) -> Result<()> {
        if self.finalized {
            Err(Error::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    fn page_mut(&mut self) -> Result<&mut PageBuild> {
        self.pages.last_mut().ok_or(Error::NoPage)
    }

    fn upt(&self, value: f32) -> Pt {
        self.options.unit.to_pt(value)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DocumentOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_doc() -> Document {
        Document::new(DocumentOptions {
            compress: false,
            ..DocumentOptions::default()
        })
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn empty_document_cannot_serialize() {
        let mut doc = plain_doc();
        assert!(matches!(doc.output(), Err(Error::EmptyDocument)));
        // Not finalized by the failed call.
        doc.add_page().unwrap();
        doc.output().unwrap();
    }

    #[test]
    fn output_is_single_shot() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        doc.output().unwrap();
        assert!(matches!(doc.output(), Err(Error::AlreadyFinalized)));
        assert!(matches!(doc.add_page(), Err(Error::AlreadyFinalized)));
    }

    #[test]
    fn text_needs_page_and_font() {
        let mut doc = plain_doc();
        assert!(matches!(doc.text(10.0, 10.0, "hi"), Err(Error::NoPage)));
        doc.add_page().unwrap();
        assert!(matches!(
            doc.text(10.0, 10.0, "hi"),
            Err(Error::NoFontSelected)
        ));
        doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
        doc.text(10.0, 10.0, "hi").unwrap();
    }

    #[test]
    fn unknown_family_is_rejected() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        let err = doc.set_font("NoSuchFont", FontStyle::Regular, 12.0);
        assert!(matches!(err, Err(Error::UnknownFont(_))));
    }

    #[test]
    fn page_break_inside_scoped_state_fails() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        let err = doc.with_state(|d| d.add_page());
        assert!(matches!(err, Err(Error::UnbalancedState(_))));
    }

    #[test]
    fn finalize_inside_scoped_state_fails() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        let err = doc.with_state(|d| d.output());
        assert!(matches!(err, Err(Error::UnbalancedState(_))));
        // The failed call does not finalize; once the scope is closed the
        // document serializes normally.
        doc.output().unwrap();
    }

    #[test]
    fn scoped_state_restores_and_balances() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        doc.set_line_width(2.0).unwrap();
        doc.with_state(|d| {
            d.set_line_width(8.0)?;
            d.line(10.0, 10.0, 50.0, 10.0)
        })
        .unwrap();
        assert_eq!(doc.state.current().line_width, Pt::from_f32(2.0 * 72.0 / 25.4));
        let bytes = doc.output().unwrap();
        assert!(contains(&bytes, "q\n"));
        assert!(contains(&bytes, "Q\n"));
    }

    #[test]
    fn core_text_replaces_unmapped_codepoints() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
        doc.text(10.0, 10.0, "a\u{263A}b").unwrap();
        assert_eq!(doc.diagnostics().len(), 1);
        let bytes = doc.output().unwrap();
        assert!(contains(&bytes, "(a?b) Tj"));
    }

    #[test]
    fn alpha_pairs_share_one_gstate() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        doc.set_alpha(0.5, 1.0).unwrap();
        doc.set_alpha(0.25, 1.0).unwrap();
        doc.set_alpha(0.5, 1.0).unwrap();
        assert_eq!(doc.ext_gstates.len(), 2);
        let bytes = doc.output().unwrap();
        assert!(contains(&bytes, "/GS1 gs"));
        assert!(contains(&bytes, "/GS2 gs"));
    }

    #[test]
    fn state_carries_across_page_breaks() {
        let mut doc = plain_doc();
        doc.add_page().unwrap();
        doc.set_stroke_color(Color::rgb(1.0, 0.0, 0.0)).unwrap();
        doc.set_line_width(4.0).unwrap();
        doc.add_page().unwrap();
        doc.line(0.0, 10.0, 40.0, 10.0).unwrap();
        let bytes = doc.output().unwrap();
        // Both pages carry the stroke color operator.
        let count = bytes
            .windows("1 0 0 RG".len())
            .filter(|w| *w == b"1 0 0 RG")
            .count();
        assert_eq!(count, 2);
    }
}
