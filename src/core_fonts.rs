//! Width tables for the built-in standard fonts. These never get embedded;
//! viewers are required to provide them. Widths are in 1/1000 em for the
//! printable ASCII range (32..=126), taken from the Adobe AFM metrics.

use crate::font::FontStyle;

/// The five standard families usable without embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreFamily {
    Courier,
    Helvetica,
    Times,
    Symbol,
    ZapfDingbats,
}

impl CoreFamily {
    pub fn from_name(name: &str) -> Option<CoreFamily> {
        let n = name.trim().to_ascii_lowercase();
        match n.as_str() {
            "courier" => Some(CoreFamily::Courier),
            "helvetica" | "arial" => Some(CoreFamily::Helvetica),
            "times" | "times-roman" | "times new roman" => Some(CoreFamily::Times),
            "symbol" => Some(CoreFamily::Symbol),
            "zapfdingbats" => Some(CoreFamily::ZapfDingbats),
            _ => None,
        }
    }

    /// The /BaseFont name for a given style. Symbol and ZapfDingbats have no
    /// styled variants.
    pub fn base_font(self, style: FontStyle) -> &'static str {
        match self {
            CoreFamily::Courier => match style {
                FontStyle::Regular => "Courier",
                FontStyle::Bold => "Courier-Bold",
                FontStyle::Italic => "Courier-Oblique",
                FontStyle::BoldItalic => "Courier-BoldOblique",
            },
            CoreFamily::Helvetica => match style {
                FontStyle::Regular => "Helvetica",
                FontStyle::Bold => "Helvetica-Bold",
                FontStyle::Italic => "Helvetica-Oblique",
                FontStyle::BoldItalic => "Helvetica-BoldOblique",
            },
            CoreFamily::Times => match style {
                FontStyle::Regular => "Times-Roman",
                FontStyle::Bold => "Times-Bold",
                FontStyle::Italic => "Times-Italic",
                FontStyle::BoldItalic => "Times-BoldItalic",
            },
            CoreFamily::Symbol => "Symbol",
            CoreFamily::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Width of `ch` in 1/1000 em, or the family's fallback width when the
    /// character is outside the tabulated range.
    pub fn char_width(self, style: FontStyle, ch: char) -> u16 {
        let code = ch as u32;
        if !(32..=126).contains(&code) {
            return self.missing_width();
        }
        let idx = (code - 32) as usize;
        match self {
            CoreFamily::Courier => 600,
            CoreFamily::Helvetica => match style {
                FontStyle::Regular | FontStyle::Italic => HELVETICA[idx],
                FontStyle::Bold | FontStyle::BoldItalic => HELVETICA_BOLD[idx],
            },
            CoreFamily::Times => match style {
                FontStyle::Regular => TIMES_ROMAN[idx],
                FontStyle::Bold => TIMES_BOLD[idx],
                FontStyle::Italic => TIMES_ITALIC[idx],
                FontStyle::BoldItalic => TIMES_BOLD_ITALIC[idx],
            },
            CoreFamily::Symbol => SYMBOL[idx],
            CoreFamily::ZapfDingbats => ZAPF_DINGBATS[idx],
        }
    }

    pub fn missing_width(self) -> u16 {
        match self {
            CoreFamily::Courier => 600,
            CoreFamily::Helvetica => 278,
            CoreFamily::Times | CoreFamily::Symbol => 250,
            CoreFamily::ZapfDingbats => 278,
        }
    }

    pub fn is_symbolic(self) -> bool {
        matches!(self, CoreFamily::Symbol | CoreFamily::ZapfDingbats)
    }
}

#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333,
    278, 278, 556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278,
    584, 584, 584, 556, 1015, 667, 667, 722, 722, 667, 611, 778, 722, 278,
    500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944,
    667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556,
    278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500,
    278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333,
    278, 278, 556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333,
    584, 584, 584, 611, 975, 722, 722, 722, 722, 667, 611, 778, 722, 278,
    556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944,
    667, 667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556,
    333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556,
    333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333,
    250, 278, 500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278,
    564, 564, 564, 444, 921, 722, 667, 667, 722, 611, 556, 722, 722, 333,
    389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722, 722, 944,
    722, 722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444,
    333, 500, 500, 278, 278, 500, 278, 778, 500, 500, 500, 500, 333, 389,
    278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333,
    250, 278, 500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333,
    570, 570, 570, 500, 930, 722, 667, 722, 722, 667, 611, 778, 778, 389,
    500, 778, 667, 944, 722, 778, 611, 778, 722, 556, 667, 722, 722, 1000,
    722, 722, 667, 333, 278, 333, 581, 500, 333, 500, 556, 444, 556, 444,
    333, 500, 556, 278, 333, 556, 278, 833, 556, 500, 556, 556, 444, 389,
    333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[rustfmt::skip]
static TIMES_ITALIC: [u16; 95] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333,
    250, 278, 500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333,
    675, 675, 675, 500, 920, 611, 611, 667, 722, 611, 611, 722, 722, 333,
    444, 667, 556, 833, 667, 722, 611, 722, 611, 500, 556, 722, 611, 833,
    611, 556, 556, 389, 278, 389, 422, 500, 333, 500, 500, 444, 500, 444,
    278, 500, 500, 278, 278, 444, 278, 722, 500, 500, 500, 500, 389, 389,
    278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

#[rustfmt::skip]
static TIMES_BOLD_ITALIC: [u16; 95] = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333,
    250, 278, 500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333,
    570, 570, 570, 500, 832, 667, 667, 667, 722, 667, 667, 722, 778, 389,
    500, 667, 611, 889, 722, 722, 611, 722, 667, 556, 611, 722, 667, 889,
    667, 611, 611, 333, 278, 333, 570, 500, 333, 500, 500, 444, 500, 444,
    333, 500, 556, 278, 278, 500, 278, 778, 556, 500, 500, 500, 389, 389,
    278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570,
];

#[rustfmt::skip]
static SYMBOL: [u16; 95] = [
    250, 333, 713, 500, 549, 833, 778, 439, 333, 333, 500, 549, 250, 549,
    250, 278, 500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278,
    549, 549, 549, 444, 549, 722, 667, 722, 612, 611, 763, 603, 722, 333,
    631, 722, 686, 889, 722, 722, 768, 741, 556, 592, 611, 690, 439, 768,
    645, 795, 611, 333, 863, 333, 658, 500, 500, 631, 549, 549, 494, 439,
    521, 411, 603, 329, 603, 549, 549, 576, 521, 549, 549, 521, 549, 603,
    439, 576, 521, 549, 549, 521, 549, 480, 200, 480, 549,
];

#[rustfmt::skip]
static ZAPF_DINGBATS: [u16; 95] = [
    278, 974, 961, 974, 980, 719, 789, 790, 791, 690, 960, 939, 549, 855,
    911, 933, 911, 945, 974, 755, 846, 762, 761, 571, 677, 763, 760, 759,
    754, 494, 552, 537, 577, 692, 786, 788, 788, 790, 793, 794, 816, 823,
    789, 841, 823, 833, 816, 831, 923, 744, 723, 749, 790, 792, 695, 776,
    768, 792, 759, 707, 708, 682, 701, 826, 815, 789, 789, 707, 687, 696,
    689, 786, 787, 713, 791, 785, 791, 873, 761, 762, 762, 759, 759, 892,
    892, 788, 784, 438, 138, 277, 415, 392, 392, 668, 668,
];
