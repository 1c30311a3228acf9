use crate::error::{Error, Result};
use crate::font::FontId;
use crate::types::{Color, Matrix, Pt};

/// How glyphs are painted by text-showing operators (PDF `Tr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
}

impl TextRenderMode {
    pub(crate) fn operand(self) -> u8 {
        match self {
            TextRenderMode::Fill => 0,
            TextRenderMode::Stroke => 1,
            TextRenderMode::FillStroke => 2,
            TextRenderMode::Invisible => 3,
        }
    }
}

/// One snapshot of the drawing parameters active at a point in the content
/// stream. Copied wholesale on push, restored wholesale on pop, so it must
/// stay a plain value type.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub font: Option<FontId>,
    pub font_size: Pt,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub text_color: Color,
    pub line_width: Pt,
    pub line_cap: u8,
    pub line_join: u8,
    pub miter_limit: Pt,
    pub dash_pattern: Vec<Pt>,
    pub dash_phase: Pt,
    pub matrix: Matrix,
    pub fill_alpha: f32,
    pub stroke_alpha: f32,
    pub char_spacing: Pt,
    pub render_mode: TextRenderMode,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: Pt::from_f32(12.0),
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            text_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            line_cap: 0,
            line_join: 0,
            miter_limit: Pt::from_f32(10.0),
            dash_pattern: Vec::new(),
            dash_phase: Pt::ZERO,
            matrix: Matrix::IDENTITY,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            char_spacing: Pt::ZERO,
            render_mode: TextRenderMode::Fill,
        }
    }
}

/// Closed set of scoped-settable drawing parameters. Unknown keys cannot be
/// expressed; every variant maps onto exactly one snapshot field.
#[derive(Debug, Clone, PartialEq)]
pub enum StateParam {
    Font(Option<FontId>),
    FontSize(Pt),
    FillColor(Color),
    StrokeColor(Color),
    TextColor(Color),
    LineWidth(Pt),
    LineCap(u8),
    LineJoin(u8),
    MiterLimit(Pt),
    Dash(Vec<Pt>, Pt),
    FillAlpha(f32),
    StrokeAlpha(f32),
    CharSpacing(Pt),
    RenderMode(TextRenderMode),
}

/// Token returned by [`GraphicsStateStack::push`]. Pops must present the
/// token of the most recent live push; a stale or duplicated token is a
/// caller bug and is reported, not absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateScope(u64);

#[derive(Debug)]
pub struct GraphicsStateStack {
    current: GraphicsState,
    saved: Vec<(u64, GraphicsState)>,
    next_seq: u64,
}

impl GraphicsStateStack {
    pub fn new() -> Self {
        Self {
            current: GraphicsState::default(),
            saved: Vec::new(),
            next_seq: 1,
        }
    }

    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Save a copy of the current snapshot. The caller must emit the matching
    /// `q` operator itself, in the same order.
    pub fn push(&mut self) -> StateScope {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.saved.push((seq, self.current.clone()));
        StateScope(seq)
    }

    /// Restore the snapshot saved by `scope`. Enforced by sequence number,
    /// not just depth, so a stray pop with a stale token is caught even when
    /// the depths happen to line up.
    pub fn pop(&mut self, scope: StateScope) -> Result<()> {
        match self.saved.last() {
            None => Err(Error::UnbalancedState(
                "pop with no matching push".to_string(),
            )),
            Some((seq, _)) if *seq != scope.0 => Err(Error::UnbalancedState(format!(
                "out-of-order pop: expected scope {}, got {}",
                seq, scope.0
            ))),
            Some(_) => {
                let (_, state) = self.saved.pop().expect("checked above");
                self.current = state;
                Ok(())
            }
        }
    }

    /// Set one parameter on the top-of-stack snapshot and return the value it
    /// replaced, enabling set/work/restore patterns on all exit paths.
    pub fn set(&mut self, param: StateParam) -> StateParam {
        let state = &mut self.current;
        match param {
            StateParam::Font(v) => StateParam::Font(std::mem::replace(&mut state.font, v)),
            StateParam::FontSize(v) => {
                StateParam::FontSize(std::mem::replace(&mut state.font_size, v))
            }
            StateParam::FillColor(v) => {
                StateParam::FillColor(std::mem::replace(&mut state.fill_color, v))
            }
            StateParam::StrokeColor(v) => {
                StateParam::StrokeColor(std::mem::replace(&mut state.stroke_color, v))
            }
            StateParam::TextColor(v) => {
                StateParam::TextColor(std::mem::replace(&mut state.text_color, v))
            }
            StateParam::LineWidth(v) => {
                StateParam::LineWidth(std::mem::replace(&mut state.line_width, v))
            }
            StateParam::LineCap(v) => {
                StateParam::LineCap(std::mem::replace(&mut state.line_cap, v))
            }
            StateParam::LineJoin(v) => {
                StateParam::LineJoin(std::mem::replace(&mut state.line_join, v))
            }
            StateParam::MiterLimit(v) => {
                StateParam::MiterLimit(std::mem::replace(&mut state.miter_limit, v))
            }
            StateParam::Dash(pattern, phase) => {
                let old_pattern = std::mem::replace(&mut state.dash_pattern, pattern);
                let old_phase = std::mem::replace(&mut state.dash_phase, phase);
                StateParam::Dash(old_pattern, old_phase)
            }
            StateParam::FillAlpha(v) => {
                StateParam::FillAlpha(std::mem::replace(&mut state.fill_alpha, v))
            }
            StateParam::StrokeAlpha(v) => {
                StateParam::StrokeAlpha(std::mem::replace(&mut state.stroke_alpha, v))
            }
            StateParam::CharSpacing(v) => {
                StateParam::CharSpacing(std::mem::replace(&mut state.char_spacing, v))
            }
            StateParam::RenderMode(v) => {
                StateParam::RenderMode(std::mem::replace(&mut state.render_mode, v))
            }
        }
    }
}

impl Default for GraphicsStateStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_restores_snapshot() {
        let mut stack = GraphicsStateStack::new();
        stack.set(StateParam::LineWidth(Pt::from_f32(2.0)));
        let scope = stack.push();
        stack.set(StateParam::LineWidth(Pt::from_f32(5.0)));
        assert_eq!(stack.current().line_width, Pt::from_f32(5.0));
        stack.pop(scope).unwrap();
        assert_eq!(stack.current().line_width, Pt::from_f32(2.0));
    }

    #[test]
    fn pop_past_initial_depth_errors() {
        let mut stack = GraphicsStateStack::new();
        let scope = stack.push();
        stack.pop(scope).unwrap();
        let err = stack.pop(scope).unwrap_err();
        assert!(matches!(err, Error::UnbalancedState(_)));
        // The stack must stay usable after the failed pop.
        stack.set(StateParam::LineCap(2));
        assert_eq!(stack.current().line_cap, 2);
    }

    #[test]
    fn out_of_order_pop_is_rejected() {
        let mut stack = GraphicsStateStack::new();
        let outer = stack.push();
        let inner = stack.push();
        let err = stack.pop(outer).unwrap_err();
        assert!(matches!(err, Error::UnbalancedState(_)));
        stack.pop(inner).unwrap();
        stack.pop(outer).unwrap();
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn set_returns_previous_value() {
        let mut stack = GraphicsStateStack::new();
        let prev = stack.set(StateParam::FillColor(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(prev, StateParam::FillColor(Color::BLACK));
        let restored = stack.set(prev.clone());
        assert_eq!(
            restored,
            StateParam::FillColor(Color::rgb(1.0, 0.0, 0.0))
        );
        assert_eq!(stack.current().fill_color, Color::BLACK);
    }
}
