//! The indirect-object arena. Objects reference each other through integer
//! handles, so the catalog/page-tree cycles of a PDF need no ownership
//! gymnastics; handles become `N 0 R` only during serialization.

use crate::error::{Error, Result};
use crate::types::Pt;

/// Handle to an object in the arena. The PDF object number is `index + 1`,
/// assigned in allocation order so serialization is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Name(String),
    /// A text string, escaped or hex-encoded as needed on write.
    Str(String),
    /// Pre-formed hex digits, written verbatim inside `<..>`.
    HexStr(String),
    Array(Vec<Value>),
    Dict(Dict),
    Ref(ObjId),
}

impl Value {
    pub fn name(v: impl Into<String>) -> Value {
        Value::Name(v.into())
    }

    pub fn str(v: impl Into<String>) -> Value {
        Value::Str(v.into())
    }

    pub fn pt(v: Pt) -> Value {
        // Store as milli-precision real; integers stay integers.
        let milli = v.to_milli_i64();
        if milli % 1000 == 0 {
            Value::Int(milli / 1000)
        } else {
            Value::Real(milli as f64 / 1000.0)
        }
    }

    fn collect_refs(&self, out: &mut Vec<ObjId>) {
        match self {
            Value::Ref(id) => out.push(*id),
            Value::Array(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Value::Dict(dict) => dict.collect_refs(out),
            _ => {}
        }
    }
}

/// Insertion-ordered dictionary; key order is part of the deterministic
/// output contract.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict(Vec<(String, Value)>);

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    fn collect_refs(&self, out: &mut Vec<ObjId>) {
        for (_, value) in &self.0 {
            value.collect_refs(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Dict(Dict),
    Stream { dict: Dict, data: Vec<u8> },
    Array(Vec<Value>),
}

#[derive(Debug, Default)]
pub struct ObjectArena {
    objects: Vec<Option<Object>>,
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, object: Object) -> ObjId {
        let id = ObjId(self.objects.len());
        self.objects.push(Some(object));
        id
    }

    /// Reserve an object number now, fill the body later. Lets parents and
    /// children reference each other regardless of build order.
    pub fn reserve(&mut self) -> ObjId {
        let id = ObjId(self.objects.len());
        self.objects.push(None);
        id
    }

    pub fn fill(&mut self, id: ObjId, object: Object) {
        self.objects[id.0] = Some(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Structural integrity sweep: every slot filled, every reference inside
    /// the arena. Run before any byte is written.
    pub fn verify(&self) -> Result<()> {
        let mut refs = Vec::new();
        for (index, slot) in self.objects.iter().enumerate() {
            let object = slot.as_ref().ok_or_else(|| {
                Error::Structural(format!("object {} reserved but never written", index + 1))
            })?;
            match object {
                Object::Dict(d) | Object::Stream { dict: d, .. } => d.collect_refs(&mut refs),
                Object::Array(items) => {
                    for item in items {
                        item.collect_refs(&mut refs);
                    }
                }
            }
        }
        for id in refs {
            if id.0 >= self.objects.len() {
                return Err(Error::Structural(format!(
                    "dangling reference to object {}",
                    id.0 + 1
                )));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|o| (ObjId(i), o)))
    }
}

fn fmt_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let milli = (value * 1000.0).round() as i64;
    if milli % 1000 == 0 {
        return format!("{}", milli / 1000);
    }
    let mut s = format!("{:.3}", milli as f64 / 1000.0);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

fn escape_name(name: &str, out: &mut Vec<u8>) {
    for byte in name.bytes() {
        let delimiter = matches!(
            byte,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        );
        if byte <= b' ' || byte > b'~' || delimiter {
            out.extend_from_slice(format!("#{byte:02X}").as_bytes());
        } else {
            out.push(byte);
        }
    }
}

/// ASCII text becomes an escaped literal string; anything else is written as
/// a UTF-16BE hex string with BOM, which every viewer accepts for metadata.
fn write_text_string(text: &str, out: &mut Vec<u8>) {
    if text.is_ascii() {
        out.push(b'(');
        for byte in text.bytes() {
            if matches!(byte, b'(' | b')' | b'\\') {
                out.push(b'\\');
            }
            out.push(byte);
        }
        out.push(b')');
    } else {
        out.extend_from_slice(b"<FEFF");
        for unit in text.encode_utf16() {
            out.extend_from_slice(format!("{unit:04X}").as_bytes());
        }
        out.push(b'>');
    }
}

pub(crate) fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Int(v) => out.extend_from_slice(v.to_string().as_bytes()),
        Value::Real(v) => out.extend_from_slice(fmt_real(*v).as_bytes()),
        Value::Name(name) => {
            out.push(b'/');
            escape_name(name, out);
        }
        Value::Str(text) => write_text_string(text, out),
        Value::HexStr(hex) => {
            out.push(b'<');
            out.extend_from_slice(hex.as_bytes());
            out.push(b'>');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        Value::Dict(dict) => write_dict(dict, out),
        Value::Ref(id) => {
            out.extend_from_slice(format!("{} 0 R", id.0 + 1).as_bytes());
        }
    }
}

pub(crate) fn write_dict(dict: &Dict, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<< ");
    for (key, value) in &dict.0 {
        out.push(b'/');
        escape_name(key, out);
        out.push(b' ');
        write_value(value, out);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}
