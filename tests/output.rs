//! End-to-end serialization checks: determinism, cross-reference integrity,
//! subset embedding, and structural round-trips through an independent
//! parser.

mod common;

use common::{contains, count, read_u16, sfnt_table, test_font};
use vellum::{
    Document, DocumentOptions, Encryption, Error, FontStyle, PaintMode, PdfVersion, Permissions,
};

fn plain_options() -> DocumentOptions {
    DocumentOptions {
        compress: false,
        ..DocumentOptions::default()
    }
}

fn build_doc() -> Document {
    let mut doc = Document::new(plain_options());
    doc.set_title("fixture");
    doc.add_page().unwrap();
    doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    doc.set_font("body", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "AB").unwrap();
    doc.rect(10.0, 40.0, 50.0, 20.0, PaintMode::Stroke).unwrap();
    doc.add_page().unwrap();
    doc.set_font("helvetica", FontStyle::Bold, 14.0).unwrap();
    doc.text(20.0, 20.0, "Second page").unwrap();
    doc
}

fn rfind(haystack: &[u8], needle: &str) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|w| w == needle.as_bytes())
}

#[test]
fn identical_documents_serialize_identically() {
    let a = build_doc().output().unwrap();
    let b = build_doc().output().unwrap();
    assert_eq!(a, b);
}

#[test]
fn header_and_trailer_frame_the_file() {
    let bytes = build_doc().output().unwrap();
    assert!(bytes.starts_with(b"%PDF-1.7\n"));
    assert!(bytes.ends_with(b"%%EOF\n"));
    assert!(contains(&bytes, "/Root"));
    assert!(contains(&bytes, "/ID ["));
    assert!(contains(&bytes, "(fixture)"));
}

#[test]
fn xref_offsets_point_at_their_objects() {
    let bytes = build_doc().output().unwrap();
    let sx = rfind(&bytes, "startxref\n").unwrap() + "startxref\n".len();
    let end = sx + bytes[sx..].iter().position(|&b| b == b'\n').unwrap();
    let xref_off: usize = std::str::from_utf8(&bytes[sx..end]).unwrap().parse().unwrap();

    assert_eq!(&bytes[xref_off..xref_off + 5], b"xref\n");
    let header_end = xref_off + 5 + bytes[xref_off + 5..].iter().position(|&b| b == b'\n').unwrap();
    let header = std::str::from_utf8(&bytes[xref_off + 5..header_end]).unwrap();
    let total: usize = header.split(' ').nth(1).unwrap().parse().unwrap();
    assert!(total > 5);

    let entries = header_end + 1;
    for i in 1..total {
        let entry = &bytes[entries + 20 * i..entries + 20 * i + 20];
        let offset: usize = std::str::from_utf8(&entry[..10]).unwrap().parse().unwrap();
        let marker = format!("{i} 0 obj");
        assert_eq!(
            &bytes[offset..offset + marker.len()],
            marker.as_bytes(),
            "object {i}"
        );
    }
}

fn embedded_font_file(bytes: &[u8]) -> Vec<u8> {
    let parsed = lopdf::Document::load_mem(bytes).unwrap();
    let mut found = None;
    for object in parsed.objects.values() {
        if let lopdf::Object::Stream(stream) = object {
            if stream.dict.has(b"Length1") {
                assert!(found.is_none(), "one embedded font program expected");
                found = Some(stream.decompressed_content().unwrap());
            }
        }
    }
    found.expect("embedded font program")
}

#[test]
fn subset_carries_only_used_glyphs() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    doc.set_font("body", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "AB").unwrap();
    let bytes = doc.output().unwrap();

    let font = embedded_font_file(&bytes);
    let maxp = sfnt_table(&font, b"maxp").unwrap();
    // .notdef + A + B
    assert_eq!(read_u16(maxp, 4), 3);
}

#[test]
fn composite_glyphs_pull_in_their_components() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    doc.set_font("body", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "C").unwrap();
    let bytes = doc.output().unwrap();

    let font = embedded_font_file(&bytes);
    let maxp = sfnt_table(&font, b"maxp").unwrap();
    // .notdef + C + the simple glyph C references
    assert_eq!(read_u16(maxp, 4), 3);
}

#[test]
fn to_unicode_maps_subset_ids_back_to_text() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    doc.set_font("body", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "AB").unwrap();
    let bytes = doc.output().unwrap();

    let parsed = lopdf::Document::load_mem(&bytes).unwrap();
    let cmaps: Vec<Vec<u8>> = parsed
        .objects
        .values()
        .filter_map(|object| match object {
            lopdf::Object::Stream(stream) => stream.decompressed_content().ok(),
            _ => None,
        })
        .filter(|content| contains(content, "beginbfchar"))
        .collect();
    assert_eq!(cmaps.len(), 1);
    // A was noted first, so it holds subset glyph id 1.
    assert!(contains(&cmaps[0], "<0001> <0041>"));
    assert!(contains(&cmaps[0], "<0002> <0042>"));
}

#[test]
fn parser_round_trip_sees_both_pages() {
    let bytes = build_doc().output().unwrap();
    let parsed = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(parsed.get_pages().len(), 2);
}

#[test]
fn xref_stream_flavor_parses_too() {
    let mut doc = Document::new(DocumentOptions {
        compress: false,
        xref_streams: true,
        ..DocumentOptions::default()
    });
    doc.add_page().unwrap();
    doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "hi").unwrap();
    let bytes = doc.output().unwrap();
    assert!(contains(&bytes, "/Type /XRef"));
    assert!(!contains(&bytes, "\ntrailer\n"));
    let parsed = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(parsed.get_pages().len(), 1);
}

#[test]
fn pdf_2_0_always_uses_xref_streams() {
    let mut doc = Document::new(DocumentOptions {
        version: PdfVersion::V2_0,
        ..DocumentOptions::default()
    });
    doc.add_page().unwrap();
    let bytes = doc.output().unwrap();
    assert!(bytes.starts_with(b"%PDF-2.0\n"));
    assert!(contains(&bytes, "/Type /XRef"));
}

#[test]
fn archival_profile_rejects_builtin_fonts() {
    let mut doc = Document::new(DocumentOptions {
        archival: true,
        ..DocumentOptions::default()
    });
    doc.add_page().unwrap();
    doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "hi").unwrap();
    assert!(matches!(doc.output(), Err(Error::Structural(_))));
}

#[test]
fn encryption_seals_strings_and_streams() {
    let build = || {
        let mut doc = Document::new(plain_options());
        doc.set_title("fixture");
        doc.add_page().unwrap();
        doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
        doc.text(20.0, 20.0, "hi").unwrap();
        doc.set_encryption(Encryption {
            owner_password: "owner".to_string(),
            user_password: String::new(),
            permissions: Permissions::default(),
        })
        .unwrap();
        doc
    };
    let bytes = build().output().unwrap();
    assert!(contains(&bytes, "/Encrypt"));
    assert!(contains(&bytes, "/Filter /Standard"));
    assert!(contains(&bytes, "/V 2 /R 3 /Length 128"));
    assert!(contains(&bytes, "/P -4"));
    // The uncompressed operator text no longer appears anywhere.
    assert!(!contains(&bytes, "12 Tf"));
    // Neither does the Info title; strings are enciphered per object.
    assert!(!contains(&bytes, "(fixture)"));
    // Encrypted output is as deterministic as plain output.
    assert_eq!(bytes, build().output().unwrap());
}

#[test]
fn encrypted_xref_offsets_stay_valid() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "hi").unwrap();
    doc.set_encryption(Encryption::default()).unwrap();
    let bytes = doc.output().unwrap();

    let sx = rfind(&bytes, "startxref\n").unwrap() + "startxref\n".len();
    let end = sx + bytes[sx..].iter().position(|&b| b == b'\n').unwrap();
    let xref_off: usize = std::str::from_utf8(&bytes[sx..end]).unwrap().parse().unwrap();
    assert_eq!(&bytes[xref_off..xref_off + 5], b"xref\n");
    let header_end = xref_off + 5 + bytes[xref_off + 5..].iter().position(|&b| b == b'\n').unwrap();
    let header = std::str::from_utf8(&bytes[xref_off + 5..header_end]).unwrap();
    let total: usize = header.split(' ').nth(1).unwrap().parse().unwrap();

    let entries = header_end + 1;
    for i in 1..total {
        let entry = &bytes[entries + 20 * i..entries + 20 * i + 20];
        let offset: usize = std::str::from_utf8(&entry[..10]).unwrap().parse().unwrap();
        let marker = format!("{i} 0 obj");
        assert_eq!(
            &bytes[offset..offset + marker.len()],
            marker.as_bytes(),
            "object {i}"
        );
    }
}

#[test]
fn archival_profile_rejects_encryption() {
    let mut doc = Document::new(DocumentOptions {
        archival: true,
        ..DocumentOptions::default()
    });
    doc.add_page().unwrap();
    doc.add_font("body", FontStyle::Regular, test_font()).unwrap();
    doc.set_font("body", FontStyle::Regular, 12.0).unwrap();
    doc.text(20.0, 20.0, "A").unwrap();
    doc.set_encryption(Encryption::default()).unwrap();
    assert!(matches!(doc.output(), Err(Error::Structural(_))));
}

#[test]
fn images_are_embedded_once() {
    let png = {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    };
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    let id = doc.register_image(&png).unwrap();
    let again = doc.register_image(&png).unwrap();
    assert_eq!(id, again);
    doc.image(id, 10.0, 10.0, Some(40.0), None).unwrap();
    doc.image(id, 10.0, 60.0, None, Some(20.0)).unwrap();
    let bytes = doc.output().unwrap();
    assert_eq!(count(&bytes, "/Subtype /Image"), 1);
    assert_eq!(count(&bytes, "/Im1 Do"), 2);
}

#[test]
fn flowing_text_breaks_pages_automatically() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
    let paragraph = "lorem ipsum dolor sit amet ".repeat(400);
    doc.write_text(&paragraph).unwrap();
    assert!(doc.page_count() > 1);
    assert!(doc.diagnostics().is_empty());
    doc.output().unwrap();
}

#[test]
fn clipped_text_is_reported_when_pagination_is_off() {
    let mut doc = Document::new(DocumentOptions {
        auto_page_break: false,
        compress: false,
        ..DocumentOptions::default()
    });
    doc.add_page().unwrap();
    doc.set_font("helvetica", FontStyle::Regular, 12.0).unwrap();
    let paragraph = "lorem ipsum dolor sit amet ".repeat(400);
    doc.write_text(&paragraph).unwrap();
    assert_eq!(doc.page_count(), 1);
    assert!(doc
        .diagnostics()
        .iter()
        .any(|d| matches!(d, vellum::Diagnostic::TextClipped { page: 0 })));
}

#[test]
fn bookmarks_build_an_outline_tree() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.bookmark("Intro", 0).unwrap();
    doc.bookmark("Details", 1).unwrap();
    doc.add_page().unwrap();
    doc.bookmark("Appendix", 0).unwrap();
    let bytes = doc.output().unwrap();
    assert!(contains(&bytes, "/Outlines"));
    assert!(contains(&bytes, "(Intro)"));
    assert!(contains(&bytes, "/PageMode /UseOutlines"));
    lopdf::Document::load_mem(&bytes).unwrap();
}

#[test]
fn links_land_in_page_annotations() {
    let mut doc = Document::new(plain_options());
    doc.add_page().unwrap();
    doc.link(10.0, 10.0, 50.0, 10.0, "https://example.com/a").unwrap();
    doc.add_page().unwrap();
    doc.internal_link(10.0, 10.0, 50.0, 10.0, 0, 0.0).unwrap();
    let bytes = doc.output().unwrap();
    assert!(contains(&bytes, "/Subtype /Link"));
    assert!(contains(&bytes, "(https://example.com/a)"));
    assert!(contains(&bytes, "/XYZ"));
    lopdf::Document::load_mem(&bytes).unwrap();
}
