use super::level::{LevelKind, LevelTable};
use super::matcher::find_matches;
use crate::measure::SizeMeasure;
use crate::types::{Inclusion, Span};
use rayon::prelude::*;

/// A fragment produced by recursive splitting.
///
/// `span` covers the fragment's full extent; the last `dropped` bytes are a
/// delimiter removed under `Inclusion::None` and are not chunk text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub span: Span,
    pub dropped: usize,
    /// Level of the cut this piece starts at; `None` at the start of the text.
    pub boundary: Option<usize>,
    /// Most structural level whose delimiter begins this piece, whether or not
    /// a cut was made there (a `next` delimiter at the very start of the text).
    pub opens: Option<usize>,
    /// Still over budget after the last level was applied.
    pub oversized: bool,
}

impl Piece {
    pub fn new(span: Span, boundary: Option<usize>) -> Self {
        Self {
            span,
            dropped: 0,
            boundary,
            opens: boundary,
            oversized: false,
        }
    }

    /// The part of the span that is chunk text.
    pub fn content(&self) -> Span {
        Span::new(self.span.start, self.span.end - self.dropped)
    }
}

/// Recursive descent over a [`LevelTable`].
///
/// A span is cut at the matches of the current level; cut pieces that fit the
/// budget are kept, the rest recurse one level deeper. Delimiter levels up to
/// `section_level` are structural and cut even pieces that already fit. The
/// level index only grows, so recursion depth is bounded by the table length.
pub struct RecursiveSplitter<'a> {
    table: &'a LevelTable,
    measure: &'a dyn SizeMeasure,
    budget: usize,
    section_level: usize,
    parallel: bool,
}

impl<'a> RecursiveSplitter<'a> {
    pub fn new(table: &'a LevelTable, measure: &'a dyn SizeMeasure, budget: usize) -> Self {
        Self {
            table,
            measure,
            budget,
            section_level: 0,
            parallel: false,
        }
    }

    /// Always apply delimiter levels `0..=section_level`.
    pub fn sections(mut self, section_level: usize) -> Self {
        self.section_level = section_level;
        self
    }

    /// Evaluate sibling pieces on the rayon pool. Output order is unchanged.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Split `span` starting at `level`. Empty spans yield no pieces.
    pub fn split(&self, text: &str, span: Span, level: usize) -> Vec<Piece> {
        self.split_span(text, span, level, None, None)
    }

    fn split_span(
        &self,
        text: &str,
        span: Span,
        level: usize,
        boundary: Option<usize>,
        opens: Option<usize>,
    ) -> Vec<Piece> {
        if span.is_empty() {
            return Vec::new();
        }

        let leaf = |oversized: bool| Piece {
            span,
            dropped: 0,
            boundary,
            opens,
            oversized,
        };

        let fits = self.fits(span.slice(text));
        if fits && !self.is_structural(level) {
            return vec![leaf(false)];
        }

        let Some(rule) = self.table.get(level) else {
            // past the fallback level: emit as-is
            return vec![leaf(!fits)];
        };

        let matches = find_matches(text, span, rule);
        if matches.is_empty() {
            return self.split_span(text, span, level + 1, boundary, opens);
        }

        let pieces = cut(span, &matches, rule.inclusion, level, boundary, opens);
        self.refine_all(text, pieces, level + 1)
    }

    fn refine_all(&self, text: &str, pieces: Vec<Piece>, next_level: usize) -> Vec<Piece> {
        if self.parallel && pieces.len() > 1 {
            pieces
                .into_par_iter()
                .map(|piece| self.refine(text, piece, next_level))
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect()
        } else {
            pieces
                .into_iter()
                .flat_map(|piece| self.refine(text, piece, next_level))
                .collect()
        }
    }

    fn refine(&self, text: &str, piece: Piece, next_level: usize) -> Vec<Piece> {
        let content = piece.content();
        if self.fits(content.slice(text)) && !self.is_structural(next_level) {
            return vec![piece];
        }

        let mut parts = self.split_span(text, content, next_level, piece.boundary, piece.opens);
        match parts.last_mut() {
            // the dropped delimiter stays attached to the final sub-piece
            Some(last) => {
                last.span.end = piece.span.end;
                last.dropped += piece.dropped;
            }
            None => parts.push(piece),
        }
        parts
    }

    /// Delimiter levels up to `section_level`; never the whitespace fallback.
    fn is_structural(&self, level: usize) -> bool {
        level <= self.section_level
            && self
                .table
                .get(level)
                .is_some_and(|rule| matches!(rule.kind, LevelKind::Delimiters(_)))
    }

    fn fits(&self, text: &str) -> bool {
        self.measure.measure(text) <= self.budget
    }
}

/// Cut `span` at `matches` (sorted, non-overlapping).
///
/// Cuts that would fall on the span edges produce no empty pieces; a dropped
/// delimiter at the very end is recorded on the last piece. A `next`
/// delimiter sitting exactly at the span start marks the first piece as
/// opened at `level`.
fn cut(
    span: Span,
    matches: &[Span],
    inclusion: Inclusion,
    level: usize,
    boundary: Option<usize>,
    opens: Option<usize>,
) -> Vec<Piece> {
    let mut pieces = Vec::with_capacity(matches.len() + 1);
    let mut start = span.start;
    let mut current_boundary = boundary;
    let mut current_opens = opens;
    let mut trailing_dropped = 0;

    for m in matches {
        let at = inclusion.cut_position(*m);
        if at <= start {
            if inclusion == Inclusion::Next && m.start == span.start {
                current_opens = Some(current_opens.map_or(level, |o| o.min(level)));
            }
            continue;
        }
        if at >= span.end {
            trailing_dropped = inclusion.dropped_len(*m);
            break;
        }
        pieces.push(Piece {
            span: Span::new(start, at),
            dropped: inclusion.dropped_len(*m),
            boundary: current_boundary,
            opens: current_opens,
            oversized: false,
        });
        start = at;
        current_boundary = Some(level);
        current_opens = Some(level);
    }

    pieces.push(Piece {
        span: Span::new(start, span.end),
        dropped: trailing_dropped,
        boundary: current_boundary,
        opens: current_opens,
        oversized: false,
    });
    pieces
}
