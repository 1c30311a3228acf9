use crate::error::{Error, Result};
use crate::types::{Color, Matrix, Pt};

/// The closed set of operators the builder knows how to emit. Text payloads
/// arrive pre-encoded (literal `(..)`, hex `<..>`, or a full TJ array) so the
/// builder stays agnostic of font encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    SaveState,
    RestoreState,
    Concat(Matrix),
    SetLineWidth(Pt),
    SetLineCap(u8),
    SetLineJoin(u8),
    SetMiterLimit(Pt),
    SetDash { pattern: Vec<Pt>, phase: Pt },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetExtGState(String),
    BeginText,
    EndText,
    SetFont { resource: String, size: Pt },
    SetTextMatrix(Matrix),
    MoveText(Pt, Pt),
    SetLeading(Pt),
    SetCharSpacing(Pt),
    SetRenderMode(u8),
    NextLine,
    ShowText(String),
    ShowTextAdjusted(String),
    MoveTo(Pt, Pt),
    LineTo(Pt, Pt),
    CurveTo(Pt, Pt, Pt, Pt, Pt, Pt),
    Rect(Pt, Pt, Pt, Pt),
    ClosePath,
    Fill,
    FillEvenOdd,
    Stroke,
    FillStroke,
    Clip { evenodd: bool },
    EndPath,
    DrawXObject(String),
}

/// Append-only operator buffer for one page.
///
/// Sequencing preconditions are enforced here rather than trusted to the
/// caller: a violation returns `InvalidOperatorSequence` and leaves the
/// buffer untouched, so a malformed call can never produce malformed output.
#[derive(Debug)]
pub struct ContentStream {
    buf: String,
    in_text: bool,
    font_selected: bool,
    q_depth: usize,
    path_open: bool,
    has_current_point: bool,
    cursor_x: Pt,
    cursor_y: Pt,
}

impl ContentStream {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            in_text: false,
            font_selected: false,
            q_depth: 0,
            path_open: false,
            has_current_point: false,
            cursor_x: Pt::ZERO,
            cursor_y: Pt::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn q_depth(&self) -> usize {
        self.q_depth
    }

    pub fn in_text_object(&self) -> bool {
        self.in_text
    }

    pub fn font_selected(&self) -> bool {
        self.font_selected
    }

    pub fn cursor(&self) -> (Pt, Pt) {
        (self.cursor_x, self.cursor_y)
    }

    pub fn set_cursor(&mut self, x: Pt, y: Pt) {
        self.cursor_x = x;
        self.cursor_y = y;
    }

    /// Page-break predicate: would advancing the cursor by `height` cross
    /// `limit_y`? (Top-down coordinates; limit is the bottom printable edge.)
    pub fn would_overflow(&self, height: Pt, limit_y: Pt) -> bool {
        self.cursor_y + height > limit_y
    }

    pub fn emit(&mut self, op: Op) -> Result<()> {
        self.check(&op)?;
        self.track(&op);
        self.write(&op);
        Ok(())
    }

    fn check(&self, op: &Op) -> Result<()> {
        use Op::*;
        let reject = |msg: &str| Err(Error::InvalidOperatorSequence(msg.to_string()));
        match op {
            SaveState | RestoreState | Concat(_) if self.in_text => {
                reject("graphics state operator inside text object")
            }
            RestoreState if self.q_depth == 0 => reject("Q without matching q"),
            BeginText if self.in_text => reject("BT inside text object"),
            BeginText if self.path_open => reject("BT with unpainted path"),
            EndText if !self.in_text => reject("ET without BT"),
            SetTextMatrix(_) | MoveText(..) | SetLeading(_) | NextLine if !self.in_text => {
                reject("text-positioning operator outside BT/ET")
            }
            ShowText(_) | ShowTextAdjusted(_) if !self.in_text => {
                reject("text-showing operator outside BT/ET")
            }
            ShowText(_) | ShowTextAdjusted(_) if !self.font_selected => {
                reject("text-showing operator before font selection")
            }
            LineTo(..) | CurveTo(..) | ClosePath if !self.has_current_point => {
                reject("path segment without current point")
            }
            Fill | FillEvenOdd | Stroke | FillStroke | Clip { .. } | EndPath
                if !self.path_open =>
            {
                reject("path-painting operator without current path")
            }
            MoveTo(..) | LineTo(..) | CurveTo(..) | Rect(..) if self.in_text => {
                reject("path construction inside text object")
            }
            DrawXObject(_) if self.in_text => reject("XObject paint inside text object"),
            _ => Ok(()),
        }
    }

    fn track(&mut self, op: &Op) {
        use Op::*;
        match op {
            SaveState => self.q_depth += 1,
            RestoreState => self.q_depth -= 1,
            BeginText => self.in_text = true,
            EndText => self.in_text = false,
            SetFont { .. } => self.font_selected = true,
            MoveText(x, y) => {
                self.cursor_x += *x;
                self.cursor_y += *y;
            }
            MoveTo(x, y) | LineTo(x, y) => {
                self.path_open = true;
                self.has_current_point = true;
                self.cursor_x = *x;
                self.cursor_y = *y;
            }
            CurveTo(_, _, _, _, x, y) => {
                self.has_current_point = true;
                self.cursor_x = *x;
                self.cursor_y = *y;
            }
            Rect(..) => {
                self.path_open = true;
                // rect does not establish a current point for lineto.
            }
            Fill | FillEvenOdd | Stroke | FillStroke | Clip { .. } | EndPath => {
                self.path_open = false;
                self.has_current_point = false;
            }
            _ => {}
        }
    }

    fn write(&mut self, op: &Op) {
        use Op::*;
        let line = match op {
            SaveState => "q".to_string(),
            RestoreState => "Q".to_string(),
            Concat(m) => format!("{} cm", m.operands()),
            SetLineWidth(w) => format!("{} w", w.to_operand()),
            SetLineCap(c) => format!("{c} J"),
            SetLineJoin(j) => format!("{j} j"),
            SetMiterLimit(m) => format!("{} M", m.to_operand()),
            SetDash { pattern, phase } => {
                let parts = pattern
                    .iter()
                    .map(|p| p.to_operand())
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("[{}] {} d", parts, phase.to_operand())
            }
            SetFillColor(c) => format!("{} rg", c.operands()),
            SetStrokeColor(c) => format!("{} RG", c.operands()),
            SetExtGState(name) => format!("/{name} gs"),
            BeginText => "BT".to_string(),
            EndText => "ET".to_string(),
            SetFont { resource, size } => format!("/{} {} Tf", resource, size.to_operand()),
            SetTextMatrix(m) => format!("{} Tm", m.operands()),
            MoveText(x, y) => format!("{} {} Td", x.to_operand(), y.to_operand()),
            SetLeading(l) => format!("{} TL", l.to_operand()),
            SetCharSpacing(c) => format!("{} Tc", c.to_operand()),
            SetRenderMode(m) => format!("{m} Tr"),
            NextLine => "T*".to_string(),
            ShowText(payload) => format!("{payload} Tj"),
            ShowTextAdjusted(payload) => format!("{payload} TJ"),
            MoveTo(x, y) => format!("{} {} m", x.to_operand(), y.to_operand()),
            LineTo(x, y) => format!("{} {} l", x.to_operand(), y.to_operand()),
            CurveTo(x1, y1, x2, y2, x, y) => format!(
                "{} {} {} {} {} {} c",
                x1.to_operand(),
                y1.to_operand(),
                x2.to_operand(),
                y2.to_operand(),
                x.to_operand(),
                y.to_operand()
            ),
            Rect(x, y, w, h) => format!(
                "{} {} {} {} re",
                x.to_operand(),
                y.to_operand(),
                w.to_operand(),
                h.to_operand()
            ),
            ClosePath => "h".to_string(),
            Fill => "f".to_string(),
            FillEvenOdd => "f*".to_string(),
            Stroke => "S".to_string(),
            FillStroke => "B".to_string(),
            Clip { evenodd: false } => "W n".to_string(),
            Clip { evenodd: true } => "W* n".to_string(),
            EndPath => "n".to_string(),
            DrawXObject(name) => format!("/{name} Do"),
        };
        self.buf.push_str(&line);
        self.buf.push('\n');
    }

    /// Close the page. Fails when brackets are left open so an inconsistent
    /// page can never reach the serializer.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.in_text {
            return Err(Error::InvalidOperatorSequence(
                "page closed inside text object".to_string(),
            ));
        }
        if self.q_depth != 0 {
            return Err(Error::UnbalancedState(format!(
                "page closed with {} unmatched q",
                self.q_depth
            )));
        }
        Ok(self.buf.into_bytes())
    }
}

impl Default for ContentStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(payload: &str) -> Op {
        Op::ShowText(payload.to_string())
    }

    #[test]
    fn text_sequence_is_enforced() {
        let mut cs = ContentStream::new();
        let err = cs.emit(show("(hi)")).unwrap_err();
        assert!(matches!(err, Error::InvalidOperatorSequence(_)));

        cs.emit(Op::BeginText).unwrap();
        // Still no font selected.
        let err = cs.emit(show("(hi)")).unwrap_err();
        assert!(matches!(err, Error::InvalidOperatorSequence(_)));

        cs.emit(Op::SetFont {
            resource: "F1".to_string(),
            size: Pt::from_f32(12.0),
        })
        .unwrap();
        cs.emit(show("(hi)")).unwrap();
        cs.emit(Op::EndText).unwrap();

        let bytes = cs.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "BT\n/F1 12 Tf\n(hi) Tj\nET\n");
    }

    #[test]
    fn restore_without_save_is_rejected() {
        let mut cs = ContentStream::new();
        let err = cs.emit(Op::RestoreState).unwrap_err();
        assert!(matches!(err, Error::InvalidOperatorSequence(_)));
        cs.emit(Op::SaveState).unwrap();
        cs.emit(Op::RestoreState).unwrap();
    }

    #[test]
    fn unterminated_text_object_fails_finish() {
        let mut cs = ContentStream::new();
        cs.emit(Op::BeginText).unwrap();
        assert!(cs.finish().is_err());
    }

    #[test]
    fn unmatched_save_fails_finish() {
        let mut cs = ContentStream::new();
        cs.emit(Op::SaveState).unwrap();
        let err = cs.finish().unwrap_err();
        assert!(matches!(err, Error::UnbalancedState(_)));
    }

    #[test]
    fn painting_requires_a_path() {
        let mut cs = ContentStream::new();
        assert!(cs.emit(Op::Fill).is_err());
        cs.emit(Op::Rect(Pt::ZERO, Pt::ZERO, Pt::from_f32(10.0), Pt::from_f32(10.0)))
            .unwrap();
        cs.emit(Op::Fill).unwrap();
        // Path is consumed by the paint.
        assert!(cs.emit(Op::Stroke).is_err());
    }

    #[test]
    fn clip_consumes_the_path() {
        let mut cs = ContentStream::new();
        cs.emit(Op::MoveTo(Pt::ZERO, Pt::ZERO)).unwrap();
        cs.emit(Op::LineTo(Pt::from_f32(10.0), Pt::from_f32(10.0))).unwrap();
        cs.emit(Op::Clip { evenodd: false }).unwrap();
        // `W n` ends the path like any paint; segments and paints after it
        // need a fresh subpath.
        assert!(cs.emit(Op::LineTo(Pt::from_f32(20.0), Pt::ZERO)).is_err());
        assert!(cs.emit(Op::Fill).is_err());
        cs.emit(Op::MoveTo(Pt::ZERO, Pt::ZERO)).unwrap();
        cs.emit(Op::LineTo(Pt::from_f32(5.0), Pt::ZERO)).unwrap();
        cs.emit(Op::Stroke).unwrap();
    }

    #[test]
    fn line_without_move_is_rejected() {
        let mut cs = ContentStream::new();
        assert!(cs.emit(Op::LineTo(Pt::ZERO, Pt::ZERO)).is_err());
        cs.emit(Op::MoveTo(Pt::ZERO, Pt::ZERO)).unwrap();
        cs.emit(Op::LineTo(Pt::from_f32(5.0), Pt::ZERO)).unwrap();
        cs.emit(Op::Stroke).unwrap();
    }

    #[test]
    fn overflow_predicate_tracks_cursor() {
        let mut cs = ContentStream::new();
        cs.set_cursor(Pt::ZERO, Pt::from_f32(700.0));
        assert!(!cs.would_overflow(Pt::from_f32(50.0), Pt::from_f32(800.0)));
        assert!(cs.would_overflow(Pt::from_f32(150.0), Pt::from_f32(800.0)));
    }
}
