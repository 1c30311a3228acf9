use std::fmt;

/// Crate-wide error type.
///
/// Usage and resource errors surface synchronously from the call that caused
/// them; `Structural` only ever comes out of finalize/serialize, and means no
/// output was produced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed font data for {0}")]
    FontFormat(String),

    #[error("font style key {0:?} is already bound to different font data")]
    FontNameConflict(String),

    #[error("font {font} has no glyph for U+{codepoint:04X}")]
    GlyphNotFound { font: String, codepoint: u32 },

    #[error("unbalanced graphics state: {0}")]
    UnbalancedState(String),

    #[error("invalid operator sequence: {0}")]
    InvalidOperatorSequence(String),

    #[error("document is already finalized")]
    AlreadyFinalized,

    #[error("document contains no pages")]
    EmptyDocument,

    #[error("no font selected before text output")]
    NoFontSelected,

    #[error("unknown font family {0:?}")]
    UnknownFont(String),

    #[error("no page has been added yet")]
    NoPage,

    #[error("unsupported or malformed image data: {0}")]
    ImageFormat(String),

    #[error("structural integrity failure: {0}")]
    Structural(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A non-fatal rendering-fidelity event. Construction keeps going; the
/// condition is recorded here and logged, so unattended callers can inspect
/// degradations after the fact.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A codepoint had no glyph in the requested font and no fallback could
    /// render it; the `.notdef` placeholder was emitted instead.
    MissingGlyph { font: String, codepoint: u32 },
    /// A fallback font was substituted for a run of text.
    FallbackSubstitution { requested: String, used: String },
    /// Text overflowed the printable area with automatic pagination disabled.
    TextClipped { page: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingGlyph { font, codepoint } => {
                write!(f, "no glyph for U+{codepoint:04X} in {font}; used .notdef")
            }
            Diagnostic::FallbackSubstitution { requested, used } => {
                write!(f, "substituted {used} for {requested}")
            }
            Diagnostic::TextClipped { page } => {
                write!(f, "text clipped on page {page} (auto page break off)")
            }
        }
    }
}

/// Collected rendering-fidelity warnings, queryable after generation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn record(&mut self, event: Diagnostic) {
        log::warn!("{event}");
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_collect_in_order() {
        let mut diags = Diagnostics::default();
        diags.record(Diagnostic::MissingGlyph {
            font: "Sans".to_string(),
            codepoint: 0x263A,
        });
        diags.record(Diagnostic::TextClipped { page: 2 });
        assert_eq!(diags.len(), 2);
        let first = diags.iter().next().unwrap();
        assert!(matches!(first, Diagnostic::MissingGlyph { codepoint, .. } if *codepoint == 0x263A));
    }
}
