//! Deterministic PDF document generation.
//!
//! Build a [`Document`], add pages, text, shapes, and images, then call
//! [`Document::output`] for the finished file. Unicode text is shaped with
//! rustybuzz and embedded fonts are subset down to the glyphs actually used;
//! identical input always produces byte-identical output.
//!
//! ```no_run
//! use vellum::{Document, FontStyle};
//!
//! let mut doc = Document::default();
//! doc.add_page()?;
//! doc.set_font("helvetica", FontStyle::Regular, 12.0)?;
//! doc.text(20.0, 20.0, "Hello")?;
//! let bytes = doc.output()?;
//! # Ok::<(), vellum::Error>(())
//! ```

pub mod content;
pub mod core_fonts;
pub mod doc;
pub mod encrypt;
pub mod error;
pub mod font;
pub mod image;
pub mod object;
pub mod outline;
pub mod shape;
pub mod state;
pub mod subset;
pub mod types;
pub mod writer;

pub use doc::{Document, DocumentOptions, PaintMode};
pub use encrypt::{Encryption, Permissions};
pub use error::{Diagnostic, Diagnostics, Error, Result};
pub use font::{FontId, FontStyle};
pub use image::ImageId;
pub use shape::TextDirection;
pub use state::TextRenderMode;
pub use types::{Color, Margins, Orientation, PageFormat, Pt, Unit};
pub use writer::{Metadata, PdfVersion};
