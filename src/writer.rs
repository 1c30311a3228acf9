//! File assembly: turns finished pages, fonts, and images into PDF bytes.
//!
//! Objects are built into the arena first, verified, and only then written,
//! so a structural mistake aborts before a single byte of output exists.
//! Everything here is deterministic: object numbers follow allocation order,
//! dictionaries keep insertion order, and the file identifier is derived
//! from the body bytes rather than a clock.

use crate::encrypt::{Encryption, SecurityHandler};
use crate::error::{Error, Result};
use crate::font::{FontId, FontKind, FontRecord, FontRegistry};
use crate::image::{ImageId, ImageRecord, ImageStore, PixelData};
use crate::object::{write_dict, write_value, Dict, ObjId, Object, ObjectArena, Value};
use crate::outline::{self, Bookmark};
use crate::types::{Pt, Rect, Size};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::Write as _;

/// Output format version. Controls the header line and which cross-reference
/// flavour is available; 2.0 always writes a cross-reference stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PdfVersion {
    V1_4,
    V1_6,
    #[default]
    V1_7,
    V2_0,
}

impl PdfVersion {
    fn header(self) -> &'static str {
        match self {
            PdfVersion::V1_4 => "%PDF-1.4",
            PdfVersion::V1_6 => "%PDF-1.6",
            PdfVersion::V1_7 => "%PDF-1.7",
            PdfVersion::V2_0 => "%PDF-2.0",
        }
    }

    fn supports_xref_streams(self) -> bool {
        !matches!(self, PdfVersion::V1_4)
    }
}

/// Document information entries. Unset fields are omitted from the file;
/// no timestamps are ever written, to keep output reproducible.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum LinkTarget {
    Url(String),
    Page { index: usize, y: Pt },
}

/// A link annotation. `rect` is in PDF page space, lower-left anchored.
#[derive(Debug, Clone)]
pub(crate) struct Annotation {
    pub rect: Rect,
    pub target: LinkTarget,
}

/// One finished page, ready for serialization.
#[derive(Debug)]
pub(crate) struct PageUnit {
    pub size: Size,
    pub content: Vec<u8>,
    pub annots: Vec<Annotation>,
}

pub(crate) struct SerializeInput<'a> {
    pub version: PdfVersion,
    pub compress: bool,
    pub xref_streams: bool,
    pub archival: bool,
    pub metadata: &'a Metadata,
    pub pages: &'a [PageUnit],
    pub fonts: &'a mut FontRegistry,
    pub used_fonts: &'a BTreeSet<FontId>,
    pub images: &'a ImageStore,
    pub used_images: &'a BTreeSet<ImageId>,
    pub ext_gstates: &'a [(f32, f32)],
    pub bookmarks: &'a [Bookmark],
    pub encryption: Option<&'a Encryption>,
}

pub(crate) fn font_resource(id: FontId) -> String {
    format!("F{}", id.0 + 1)
}

pub(crate) fn image_resource(id: ImageId) -> String {
    format!("Im{}", id.0 + 1)
}

pub(crate) fn gstate_resource(index: usize) -> String {
    format!("GS{}", index + 1)
}

pub(crate) fn serialize(input: SerializeInput<'_>) -> Result<Vec<u8>> {
    if input.archival && input.encryption.is_some() {
        return Err(Error::Structural(
            "archival output cannot be encrypted".to_string(),
        ));
    }

    // 1) Subsets. Built once per font and cached, so serializing the same
    //    document twice yields identical bytes without redoing the work.
    for &id in input.used_fonts {
        if input.archival {
            if let Some(record) = input.fonts.get(id) {
                if matches!(record.kind, FontKind::Core(_)) {
                    return Err(Error::Structural(format!(
                        "archival output requires embedded fonts, but {} is a built-in",
                        record.display_name()
                    )));
                }
            }
        }
        input.fonts.ensure_subset(id)?;
    }

    // 2) Object graph.
    let mut arena = ObjectArena::new();
    let catalog = arena.reserve();
    let pages_root = arena.reserve();
    let resources = arena.reserve();

    let page_ids: Vec<ObjId> = input.pages.iter().map(|_| arena.reserve()).collect();
    for (page, &page_id) in input.pages.iter().zip(&page_ids) {
        let content_id = arena.alloc(make_stream(
            Dict::new(),
            page.content.clone(),
            input.compress,
        ));
        let mut dict = Dict::new()
            .set("Type", Value::name("Page"))
            .set("Parent", Value::Ref(pages_root))
            .set(
                "MediaBox",
                Value::Array(vec![
                    Value::Int(0),
                    Value::Int(0),
                    Value::pt(page.size.width),
                    Value::pt(page.size.height),
                ]),
            )
            .set("Contents", Value::Ref(content_id))
            .set("Resources", Value::Ref(resources));
        if !page.annots.is_empty() {
            let annots = page
                .annots
                .iter()
                .map(|a| annotation_value(a, &page_ids))
                .collect::<Result<Vec<_>>>()?;
            dict.insert("Annots", Value::Array(annots));
        }
        arena.fill(page_id, Object::Dict(dict));
    }

    // 3) Fonts.
    let mut font_refs: Vec<(String, ObjId)> = Vec::new();
    for &id in input.used_fonts {
        let record = input
            .fonts
            .get(id)
            .ok_or_else(|| Error::Structural(format!("unknown font id {}", id.0)))?;
        let obj = match &record.kind {
            FontKind::Core(family) => {
                let mut dict = Dict::new()
                    .set("Type", Value::name("Font"))
                    .set("Subtype", Value::name("Type1"))
                    .set("BaseFont", Value::name(family.base_font(record.style())));
                if !family.is_symbolic() {
                    dict.insert("Encoding", Value::name("WinAnsiEncoding"));
                }
                arena.alloc(Object::Dict(dict))
            }
            FontKind::Embedded(_) => embed_font(&mut arena, record)?,
        };
        font_refs.push((font_resource(id), obj));
    }

    // 4) Images.
    let mut image_refs: Vec<(String, ObjId)> = Vec::new();
    for &id in input.used_images {
        let record = input
            .images
            .get(id)
            .ok_or_else(|| Error::Structural(format!("unknown image id {}", id.0)))?;
        let obj = embed_image(&mut arena, record);
        image_refs.push((image_resource(id), obj));
    }

    // 5) ExtGStates.
    let mut gstate_refs: Vec<(String, ObjId)> = Vec::new();
    for (index, &(fill, stroke)) in input.ext_gstates.iter().enumerate() {
        let dict = Dict::new()
            .set("Type", Value::name("ExtGState"))
            .set("ca", Value::Real(fill as f64))
            .set("CA", Value::Real(stroke as f64));
        gstate_refs.push((gstate_resource(index), arena.alloc(Object::Dict(dict))));
    }

    // 6) The shared resources dictionary.
    let mut res = Dict::new().set(
        "ProcSet",
        Value::Array(vec![
            Value::name("PDF"),
            Value::name("Text"),
            Value::name("ImageB"),
            Value::name("ImageC"),
        ]),
    );
    if !font_refs.is_empty() {
        let mut d = Dict::new();
        for (name, id) in &font_refs {
            d.insert(name.clone(), Value::Ref(*id));
        }
        res.insert("Font", Value::Dict(d));
    }
    if !image_refs.is_empty() {
        let mut d = Dict::new();
        for (name, id) in &image_refs {
            d.insert(name.clone(), Value::Ref(*id));
        }
        res.insert("XObject", Value::Dict(d));
    }
    if !gstate_refs.is_empty() {
        let mut d = Dict::new();
        for (name, id) in &gstate_refs {
            d.insert(name.clone(), Value::Ref(*id));
        }
        res.insert("ExtGState", Value::Dict(d));
    }
    arena.fill(resources, Object::Dict(res));

    // 7) Page tree root.
    arena.fill(
        pages_root,
        Object::Dict(
            Dict::new()
                .set("Type", Value::name("Pages"))
                .set(
                    "Kids",
                    Value::Array(page_ids.iter().map(|&id| Value::Ref(id)).collect()),
                )
                .set("Count", Value::Int(page_ids.len() as i64)),
        ),
    );

    // 8) Outline tree.
    let outline_root = build_outline(&mut arena, input.bookmarks, &page_ids);

    // 9) Catalog.
    let mut cat = Dict::new()
        .set("Type", Value::name("Catalog"))
        .set("Pages", Value::Ref(pages_root));
    if let Some(root) = outline_root {
        cat.insert("Outlines", Value::Ref(root));
        cat.insert("PageMode", Value::name("UseOutlines"));
    }
    arena.fill(catalog, Object::Dict(cat));

    // 10) Info.
    let info = arena.alloc(Object::Dict(info_dict(input.metadata)));

    arena.verify()?;

    // 11) Header + bodies.
    let mut out = Vec::new();
    out.extend_from_slice(input.version.header().as_bytes());
    out.push(b'\n');
    // Binary marker so transports treat the file as 8-bit data.
    out.extend_from_slice(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n']);

    let body_start = out.len();
    let mut offsets = vec![0usize; arena.len()];
    for (id, object) in arena.iter() {
        offsets[id.0] = out.len();
        write_object(id, object, &mut out);
    }

    // The identifier is a digest of the plaintext file, so identical
    // documents get identical /ID pairs and the encryption key never
    // depends on its own output.
    let digest = Sha256::digest(&out);
    let mut id_bytes = [0u8; 16];
    id_bytes.copy_from_slice(&digest[..16]);
    let file_id = hex(&id_bytes);

    let mut encrypt_ref = None;
    if let Some(settings) = input.encryption {
        let handler = SecurityHandler::new(settings, &id_bytes);
        // Second pass: same objects, strings and streams enciphered. RC4
        // keeps stream lengths, but literal strings become hex, so every
        // offset is re-recorded.
        out.truncate(body_start);
        for (id, object) in arena.iter() {
            offsets[id.0] = out.len();
            let sealed = seal_object(object, (id.0 + 1) as u32, &handler);
            write_object(id, &sealed, &mut out);
        }
        // The encryption dictionary itself stays plaintext and takes the
        // next object number.
        let id = ObjId(offsets.len());
        offsets.push(out.len());
        write_object(id, &Object::Dict(encrypt_dict(&handler)), &mut out);
        encrypt_ref = Some(id);
    }

    // 12) XRef + trailer.
    let use_xref_stream = matches!(input.version, PdfVersion::V2_0)
        || (input.xref_streams && input.version.supports_xref_streams());
    if use_xref_stream {
        write_xref_stream(&mut out, &offsets, catalog, info, encrypt_ref, &file_id);
    } else {
        write_xref_table(&mut out, &offsets, catalog, info, encrypt_ref, &file_id);
    }

    log::debug!("serialized {} objects, {} bytes", arena.len(), out.len());
    Ok(out)
}

fn annotation_value(annot: &Annotation, page_ids: &[ObjId]) -> Result<Value> {
    let rect = Value::Array(vec![
        Value::pt(annot.rect.x),
        Value::pt(annot.rect.y),
        Value::pt(annot.rect.x + annot.rect.width),
        Value::pt(annot.rect.y + annot.rect.height),
    ]);
    let mut dict = Dict::new()
        .set("Type", Value::name("Annot"))
        .set("Subtype", Value::name("Link"))
        .set("Rect", rect)
        .set(
            "Border",
            Value::Array(vec![Value::Int(0), Value::Int(0), Value::Int(0)]),
        );
    match &annot.target {
        LinkTarget::Url(url) => {
            dict.insert(
                "A",
                Value::Dict(
                    Dict::new()
                        .set("S", Value::name("URI"))
                        .set("URI", Value::str(url.clone())),
                ),
            );
        }
        LinkTarget::Page { index, y } => {
            let page = page_ids.get(*index).copied().ok_or_else(|| {
                Error::Structural(format!("link target page {index} does not exist"))
            })?;
            dict.insert(
                "Dest",
                Value::Array(vec![
                    Value::Ref(page),
                    Value::name("XYZ"),
                    Value::Null,
                    Value::pt(*y),
                    Value::Null,
                ]),
            );
        }
    }
    Ok(Value::Dict(dict))
}

/// Type0 + CIDFontType2 + descriptor + font program + ToUnicode for one
/// embedded font. Returns the Type0 object the resources dictionary names.
fn embed_font(arena: &mut ObjectArena, record: &FontRecord) -> Result<ObjId> {
    let font = record
        .embedded()
        .ok_or_else(|| Error::Structural("embed_font called on a core font".to_string()))?;
    let subset = font.subset.as_ref().ok_or_else(|| {
        Error::Structural(format!("no subset built for {}", record.display_name()))
    })?;

    let base_font = format!("{}+{}", subset_tag(&subset.data), ps_name(record));
    let m = &font.metrics;

    let file_id = arena.alloc(make_stream(
        Dict::new().set("Length1", Value::Int(subset.data.len() as i64)),
        subset.data.clone(),
        true,
    ));

    let mut flags = if m.is_symbolic { 1 << 2 } else { 1 << 5 };
    if m.is_fixed_pitch {
        flags |= 1;
    }
    if m.italic_angle != 0 {
        flags |= 1 << 6;
    }
    let descriptor = arena.alloc(Object::Dict(
        Dict::new()
            .set("Type", Value::name("FontDescriptor"))
            .set("FontName", Value::name(base_font.clone()))
            .set("Flags", Value::Int(flags))
            .set(
                "FontBBox",
                Value::Array(vec![
                    Value::Int(m.bbox.0 as i64),
                    Value::Int(m.bbox.1 as i64),
                    Value::Int(m.bbox.2 as i64),
                    Value::Int(m.bbox.3 as i64),
                ]),
            )
            .set("ItalicAngle", Value::Int(m.italic_angle as i64))
            .set("Ascent", Value::Int(m.ascent as i64))
            .set("Descent", Value::Int(m.descent as i64))
            .set("CapHeight", Value::Int(m.cap_height as i64))
            .set("StemV", Value::Int(m.stem_v as i64))
            .set("MissingWidth", Value::Int(m.missing_width as i64))
            .set("FontFile2", Value::Ref(file_id)),
    ));

    // Widths are indexed by subset glyph id; composite extras included.
    let mut widths = vec![0u16; subset.glyph_count as usize];
    for (&old, &new) in &subset.gid_map {
        widths[new as usize] = font.advance(old);
    }
    let w_array = Value::Array(vec![
        Value::Int(0),
        Value::Array(widths.iter().map(|&w| Value::Int(w as i64)).collect()),
    ]);

    let descendant = arena.alloc(Object::Dict(
        Dict::new()
            .set("Type", Value::name("Font"))
            .set("Subtype", Value::name("CIDFontType2"))
            .set("BaseFont", Value::name(base_font.clone()))
            .set(
                "CIDSystemInfo",
                Value::Dict(
                    Dict::new()
                        .set("Registry", Value::str("Adobe"))
                        .set("Ordering", Value::str("Identity"))
                        .set("Supplement", Value::Int(0)),
                ),
            )
            .set("FontDescriptor", Value::Ref(descriptor))
            .set("DW", Value::Int(m.missing_width as i64))
            .set("W", w_array)
            .set("CIDToGIDMap", Value::name("Identity")),
    ));

    let to_unicode = arena.alloc(make_stream(
        Dict::new(),
        to_unicode_cmap(&subset.to_unicode),
        true,
    ));

    Ok(arena.alloc(Object::Dict(
        Dict::new()
            .set("Type", Value::name("Font"))
            .set("Subtype", Value::name("Type0"))
            .set("BaseFont", Value::name(base_font))
            .set("Encoding", Value::name("Identity-H"))
            .set("DescendantFonts", Value::Array(vec![Value::Ref(descendant)]))
            .set("ToUnicode", Value::Ref(to_unicode)),
    )))
}

fn embed_image(arena: &mut ObjectArena, record: &ImageRecord) -> ObjId {
    let smask = record.alpha.as_ref().map(|alpha| {
        arena.alloc(make_stream(
            Dict::new()
                .set("Type", Value::name("XObject"))
                .set("Subtype", Value::name("Image"))
                .set("Width", Value::Int(record.width as i64))
                .set("Height", Value::Int(record.height as i64))
                .set("ColorSpace", Value::name("DeviceGray"))
                .set("BitsPerComponent", Value::Int(8)),
            alpha.clone(),
            true,
        ))
    });

    let mut dict = Dict::new()
        .set("Type", Value::name("XObject"))
        .set("Subtype", Value::name("Image"))
        .set("Width", Value::Int(record.width as i64))
        .set("Height", Value::Int(record.height as i64))
        .set("ColorSpace", Value::name(record.color.pdf_name()))
        .set("BitsPerComponent", Value::Int(8));
    if let Some(mask) = smask {
        dict.insert("SMask", Value::Ref(mask));
    }
    match &record.pixels {
        PixelData::Jpeg(data) => {
            dict.insert("Filter", Value::name("DCTDecode"));
            arena.alloc(make_stream(dict, data.clone(), false))
        }
        PixelData::Raw(data) => arena.alloc(make_stream(dict, data.clone(), true)),
    }
}

fn build_outline(
    arena: &mut ObjectArena,
    bookmarks: &[Bookmark],
    page_ids: &[ObjId],
) -> Option<ObjId> {
    if bookmarks.is_empty() {
        return None;
    }
    let nodes = outline::link(bookmarks);
    let root = arena.reserve();
    let item_ids: Vec<ObjId> = bookmarks.iter().map(|_| arena.reserve()).collect();
    let link = |index: Option<usize>| index.map(|i| Value::Ref(item_ids[i]));

    for (i, (bookmark, node)) in bookmarks.iter().zip(&nodes).enumerate() {
        let mut dict = Dict::new()
            .set("Title", Value::str(bookmark.title.clone()))
            .set(
                "Parent",
                link(node.parent).unwrap_or(Value::Ref(root)),
            );
        if let Some(v) = link(node.prev) {
            dict.insert("Prev", v);
        }
        if let Some(v) = link(node.next) {
            dict.insert("Next", v);
        }
        if let Some(v) = link(node.first) {
            dict.insert("First", v);
            dict.insert("Last", link(node.last).expect("first implies last"));
            dict.insert("Count", Value::Int(node.count as i64));
        }
        // An out-of-range page index falls back to the first page.
        let page = page_ids
            .get(bookmark.page_index)
            .or_else(|| page_ids.first())
            .copied();
        if let Some(page) = page {
            dict.insert(
                "Dest",
                Value::Array(vec![
                    Value::Ref(page),
                    Value::name("XYZ"),
                    Value::Null,
                    Value::pt(bookmark.y),
                    Value::Null,
                ]),
            );
        }
        arena.fill(item_ids[i], Object::Dict(dict));
    }

    let roots: Vec<usize> = (0..nodes.len()).filter(|&i| nodes[i].parent.is_none()).collect();
    arena.fill(
        root,
        Object::Dict(
            Dict::new()
                .set("Type", Value::name("Outlines"))
                .set("First", Value::Ref(item_ids[*roots.first().expect("non-empty")]))
                .set("Last", Value::Ref(item_ids[*roots.last().expect("non-empty")]))
                .set("Count", Value::Int(bookmarks.len() as i64)),
        ),
    );
    Some(root)
}

fn info_dict(metadata: &Metadata) -> Dict {
    let mut dict = Dict::new();
    let fields = [
        ("Title", &metadata.title),
        ("Author", &metadata.author),
        ("Subject", &metadata.subject),
        ("Keywords", &metadata.keywords),
        ("Creator", &metadata.creator),
    ];
    for (key, value) in fields {
        if let Some(v) = value {
            dict.insert(key, Value::str(v.clone()));
        }
    }
    let producer = metadata
        .producer
        .clone()
        .unwrap_or_else(|| concat!("vellum ", env!("CARGO_PKG_VERSION")).to_string());
    dict.insert("Producer", Value::str(producer));
    dict
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02X}")).collect()
}

fn encrypt_dict(handler: &SecurityHandler) -> Dict {
    Dict::new()
        .set("Filter", Value::name("Standard"))
        .set("V", Value::Int(2))
        .set("R", Value::Int(3))
        .set("Length", Value::Int(128))
        .set("O", Value::HexStr(hex(handler.o())))
        .set("U", Value::HexStr(hex(handler.u())))
        .set("P", Value::Int(handler.p() as i64))
}

fn seal_object(object: &Object, num: u32, handler: &SecurityHandler) -> Object {
    match object {
        Object::Dict(dict) => Object::Dict(seal_dict(dict, num, handler)),
        Object::Array(items) => Object::Array(
            items.iter().map(|v| seal_value(v, num, handler)).collect(),
        ),
        Object::Stream { dict, data } => Object::Stream {
            dict: seal_dict(dict, num, handler),
            data: handler.encrypt(num, data),
        },
    }
}

fn seal_dict(dict: &Dict, num: u32, handler: &SecurityHandler) -> Dict {
    let mut out = Dict::new();
    for (key, value) in dict.iter() {
        out.insert(key.clone(), seal_value(value, num, handler));
    }
    out
}

fn seal_value(value: &Value, num: u32, handler: &SecurityHandler) -> Value {
    match value {
        // Mirrors the plaintext writer's encoding choice: ASCII strings
        // encipher their bytes, everything else BOM plus UTF-16BE.
        Value::Str(text) => {
            let bytes = if text.is_ascii() {
                text.as_bytes().to_vec()
            } else {
                let mut utf16 = vec![0xFE, 0xFF];
                for unit in text.encode_utf16() {
                    utf16.extend_from_slice(&unit.to_be_bytes());
                }
                utf16
            };
            Value::HexStr(hex(&handler.encrypt(num, &bytes)))
        }
        Value::Array(items) => Value::Array(
            items.iter().map(|v| seal_value(v, num, handler)).collect(),
        ),
        Value::Dict(dict) => Value::Dict(seal_dict(dict, num, handler)),
        other => other.clone(),
    }
}

fn make_stream(mut dict: Dict, data: Vec<u8>, compress: bool) -> Object {
    let data = if compress { deflate(&data) } else { data };
    if compress {
        dict.insert("Filter", Value::name("FlateDecode"));
    }
    dict.insert("Length", Value::Int(data.len() as i64));
    Object::Stream { dict, data }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing to a Vec cannot fail.
    encoder.write_all(data).expect("in-memory deflate");
    encoder.finish().expect("in-memory deflate")
}

fn write_object(id: ObjId, object: &Object, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("{} 0 obj\n", id.0 + 1).as_bytes());
    match object {
        Object::Dict(dict) => write_dict(dict, out),
        Object::Array(items) => write_value(&Value::Array(items.clone()), out),
        Object::Stream { dict, data } => {
            write_dict(dict, out);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        }
    }
    out.extend_from_slice(b"\nendobj\n");
}

fn write_xref_table(
    out: &mut Vec<u8>,
    offsets: &[usize],
    catalog: ObjId,
    info: ObjId,
    encrypt: Option<ObjId>,
    file_id: &str,
) {
    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for &offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    let trailer = trailer_dict(offsets.len() + 1, catalog, info, encrypt, file_id);
    out.extend_from_slice(b"trailer\n");
    write_dict(&trailer, out);
    out.extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
}

fn write_xref_stream(
    out: &mut Vec<u8>,
    offsets: &[usize],
    catalog: ObjId,
    info: ObjId,
    encrypt: Option<ObjId>,
    file_id: &str,
) {
    // The stream describes itself too, so its own offset goes in last.
    let xref_offset = out.len();
    let count = offsets.len() + 2;
    let mut rows = Vec::with_capacity(count * 7);
    rows.extend_from_slice(&[0, 0, 0, 0, 0, 0xFF, 0xFF]);
    for &offset in offsets {
        rows.push(1);
        rows.extend_from_slice(&(offset as u32).to_be_bytes());
        rows.extend_from_slice(&[0, 0]);
    }
    rows.push(1);
    rows.extend_from_slice(&(xref_offset as u32).to_be_bytes());
    rows.extend_from_slice(&[0, 0]);

    let mut dict = trailer_dict(count, catalog, info, encrypt, file_id);
    dict.insert("Type", Value::name("XRef"));
    dict.insert(
        "W",
        Value::Array(vec![Value::Int(1), Value::Int(4), Value::Int(2)]),
    );
    dict.insert(
        "Index",
        Value::Array(vec![Value::Int(0), Value::Int(count as i64)]),
    );
    dict.insert("Length", Value::Int(rows.len() as i64));

    out.extend_from_slice(format!("{} 0 obj\n", offsets.len() + 1).as_bytes());
    write_dict(&dict, out);
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(&rows);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());
}

fn trailer_dict(
    size: usize,
    catalog: ObjId,
    info: ObjId,
    encrypt: Option<ObjId>,
    file_id: &str,
) -> Dict {
    let mut dict = Dict::new()
        .set("Size", Value::Int(size as i64))
        .set("Root", Value::Ref(catalog))
        .set("Info", Value::Ref(info));
    if let Some(id) = encrypt {
        dict.insert("Encrypt", Value::Ref(id));
    }
    dict.insert(
        "ID",
        Value::Array(vec![
            Value::HexStr(file_id.to_string()),
            Value::HexStr(file_id.to_string()),
        ]),
    );
    dict
}

/// Six uppercase letters derived from the subset bytes, per the embedded
/// subset naming convention.
fn subset_tag(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest[..6].iter().map(|b| char::from(b'A' + b % 26)).collect()
}

fn ps_name(record: &FontRecord) -> String {
    let filtered: String = record
        .display_name()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if filtered.is_empty() {
        "Embedded".to_string()
    } else {
        filtered
    }
}

fn to_unicode_cmap(map: &std::collections::BTreeMap<u16, u32>) -> Vec<u8> {
    let mut body = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );
    let entries: Vec<(u16, u32)> = map.iter().map(|(&g, &c)| (g, c)).collect();
    for chunk in entries.chunks(100) {
        body.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for &(gid, cp) in chunk {
            body.push_str(&format!("<{gid:04X}> <"));
            if let Some(ch) = char::from_u32(cp) {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    body.push_str(&format!("{unit:04X}"));
                }
            } else {
                body.push_str("FFFD");
            }
            body.push_str(">\n");
        }
        body.push_str("endbfchar\n");
    }
    body.push_str(
        "endcmap\n\
         CMap currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    body.into_bytes()
}
