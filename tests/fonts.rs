//! Font registry, fallback, and subsetting behavior through the public API.

mod common;

use common::{contains, read_u16, sfnt_table, test_font, test_font_with};
use vellum::font::GlyphUsage;
use vellum::{Diagnostic, Document, DocumentOptions, Error, FontStyle, Unit};

fn plain_options() -> DocumentOptions {
    DocumentOptions {
        compress: false,
        ..DocumentOptions::default()
    }
}

#[test]
fn registering_identical_bytes_is_idempotent() {
    let mut doc = Document::default();
    let a = doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    let b = doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn conflicting_registration_keeps_the_first_font() {
    let mut doc = Document::default();
    let first = doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    let err = doc
        .add_font(
            "body",
            FontStyle::Regular,
            test_font_with(&[('Z' as u32, 1)]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::FontNameConflict(_)));
    // The original binding stays usable.
    doc.add_page().unwrap();
    let resolved = doc.set_font("body", FontStyle::Regular, 12.0).unwrap();
    assert_eq!(resolved, first);
}

#[test]
fn styles_are_independent_keys() {
    let mut doc = Document::default();
    let regular = doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    let bold = doc
        .add_font("body", FontStyle::Bold, test_font_with(&[('Z' as u32, 1)]))
        .unwrap();
    assert_ne!(regular, bold);
}

#[test]
fn malformed_font_data_is_rejected() {
    let mut doc = Document::default();
    let err = doc
        .add_font("broken", FontStyle::Regular, vec![0u8; 32])
        .unwrap_err();
    assert!(matches!(err, Error::FontFormat(_)));
}

#[test]
fn fallback_fonts_cover_missing_codepoints_in_order() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.add_font(
        "primary",
        FontStyle::Regular,
        test_font_with(&[('A' as u32, 1), ('B' as u32, 2)]),
    )
    .unwrap();
    let fb = doc
        .add_font("extra", FontStyle::Regular, test_font_with(&[('Z' as u32, 1)]))
        .unwrap();
    doc.set_fallback_fonts(vec![fb]);
    doc.set_font("primary", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "AZ").unwrap();

    assert!(doc.diagnostics().iter().any(|d| matches!(
        d,
        Diagnostic::FallbackSubstitution { used, .. } if used == "extra"
    )));
    let bytes = doc.output().unwrap();
    // Both fonts appear as text resources on the page.
    assert!(contains(&bytes, "/F1 12 Tf"));
    assert!(contains(&bytes, "/F2 12 Tf"));
}

#[test]
fn unmappable_codepoints_surface_as_missing_glyphs() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.add_font(
        "primary",
        FontStyle::Regular,
        test_font_with(&[('A' as u32, 1), ('B' as u32, 2)]),
    )
    .unwrap();
    doc.set_font("primary", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "AQ").unwrap();
    assert!(doc.diagnostics().iter().any(|d| matches!(
        d,
        Diagnostic::MissingGlyph { codepoint, .. } if *codepoint == 'Q' as u32
    )));
    // Construction keeps going; the page still serializes.
    doc.output().unwrap();
}

#[test]
fn glyph_notes_resolve_through_the_registry() {
    let mut registry = vellum::font::FontRegistry::new();
    let id = registry
        .register(test_font(), "body", FontStyle::Regular)
        .unwrap();
    assert_eq!(registry.note_glyph_used(id, 'A' as u32).unwrap(), 1);
    // Repeats resolve to the same subset id.
    assert_eq!(registry.note_glyph_used(id, 'A' as u32).unwrap(), 1);
    let err = registry.note_glyph_used(id, 'Q' as u32).unwrap_err();
    assert!(matches!(err, Error::GlyphNotFound { codepoint, .. } if codepoint == 'Q' as u32));
}

#[test]
fn subsetter_renumbers_in_first_use_order() {
    let mut usage = GlyphUsage::default();
    assert_eq!(usage.note('B' as u32, 2), 1);
    assert_eq!(usage.note('A' as u32, 1), 2);
    let subset = vellum::subset::subset(&test_font(), &usage).unwrap();
    assert_eq!(subset.glyph_count, 3);
    assert_eq!(subset.remap(0), Some(0));
    assert_eq!(subset.remap(2), Some(1));
    assert_eq!(subset.remap(1), Some(2));
    // Unused glyph 3 is gone.
    assert_eq!(subset.remap(3), None);

    let maxp = sfnt_table(&subset.data, b"maxp").unwrap();
    assert_eq!(read_u16(maxp, 4), 3);
    let hhea = sfnt_table(&subset.data, b"hhea").unwrap();
    assert_eq!(read_u16(hhea, 34), 3);
    assert_eq!(subset.to_unicode.get(&1), Some(&('B' as u32)));
    assert_eq!(subset.to_unicode.get(&2), Some(&('A' as u32)));
}

#[test]
fn subsetter_appends_composite_components() {
    let mut usage = GlyphUsage::default();
    // Glyph 3 is a composite referencing glyph 2.
    assert_eq!(usage.note('C' as u32, 3), 1);
    let subset = vellum::subset::subset(&test_font(), &usage).unwrap();
    assert_eq!(subset.glyph_count, 3);
    assert_eq!(subset.remap(3), Some(1));
    assert_eq!(subset.remap(2), Some(2));
}

#[test]
fn core_font_measurement_is_exact_in_points() {
    let mut doc = Document::new(DocumentOptions {
        unit: Unit::Pt,
        ..DocumentOptions::default()
    });
    doc.add_page().unwrap();
    assert!(matches!(doc.text_width("abc"), Err(Error::NoFontSelected)));
    doc.set_font("courier", FontStyle::Regular, 10.0).unwrap();
    // Courier is fixed-pitch at 600/1000 em.
    assert_eq!(doc.text_width("abc").unwrap(), 18.0);
}
