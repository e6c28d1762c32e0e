use super::splitter::Piece;
use crate::config::BoundaryPolicy;
use crate::measure::SizeMeasure;
use crate::types::{Chunk, Span};

/// Merges split pieces into chunks and injects overlap.
pub struct Packer<'a> {
    measure: &'a dyn SizeMeasure,
    budget: usize,
    min_size: usize,
    overlap_size: usize,
    section_level: usize,
    policy: BoundaryPolicy,
    fallback_level: usize,
}

/// Contiguous run of pieces that becomes one chunk.
#[derive(Debug, Clone)]
struct Group {
    start: usize,
    end: usize,
    /// Delimiters removed under `Inclusion::None`, in order.
    dropped: Vec<Span>,
    /// False while only dropped delimiters were seen.
    has_text: bool,
    boundary: Option<usize>,
    opens: Option<usize>,
    /// Section boundaries merged in after the opening piece.
    sections: usize,
    size: usize,
    oversized: bool,
}

impl Group {
    fn open(piece: &Piece, size: usize) -> Self {
        let mut group = Self {
            start: piece.span.start,
            end: piece.span.start,
            dropped: Vec::new(),
            has_text: false,
            boundary: piece.boundary,
            opens: piece.opens,
            sections: 0,
            size,
            oversized: false,
        };
        group.extend(piece, size);
        group
    }

    fn extend(&mut self, piece: &Piece, size: usize) {
        if !piece.content().is_empty() {
            if !self.has_text {
                self.opens = piece.opens;
            }
            self.has_text = true;
        }
        if piece.dropped > 0 {
            self.dropped.push(Span::new(piece.span.end - piece.dropped, piece.span.end));
        }
        self.end = piece.span.end;
        self.size = size;
        self.oversized |= piece.oversized;
    }

    fn text(&self, source: &str) -> String {
        strip(source, Span::new(self.start, self.end), &self.dropped)
    }
}

/// `source[span]` with the sorted `dropped` ranges cut out.
fn strip<'d>(source: &str, span: Span, dropped: impl IntoIterator<Item = &'d Span>) -> String {
    let mut text = String::with_capacity(span.len());
    let mut pos = span.start;
    for gap in dropped {
        if gap.end <= pos {
            continue;
        }
        if gap.start >= span.end {
            break;
        }
        text.push_str(&source[pos..gap.start.max(pos)]);
        pos = gap.end.min(span.end);
    }
    if pos < span.end {
        text.push_str(&source[pos..span.end]);
    }
    text
}

impl<'a> Packer<'a> {
    pub fn new(measure: &'a dyn SizeMeasure, budget: usize, fallback_level: usize) -> Self {
        Self {
            measure,
            budget,
            min_size: 0,
            overlap_size: 0,
            section_level: 0,
            policy: BoundaryPolicy::Strict,
            fallback_level,
        }
    }

    pub fn overlap(mut self, overlap_size: usize) -> Self {
        self.overlap_size = overlap_size;
        self
    }

    pub fn sections(mut self, section_level: usize, policy: BoundaryPolicy, min_size: usize) -> Self {
        self.section_level = section_level;
        self.policy = policy;
        self.min_size = min_size;
        self
    }

    /// Pack contiguous `pieces` covering `source` into chunks.
    pub fn pack(&self, source: &str, pieces: &[Piece]) -> Vec<Chunk> {
        let groups = self.group(source, pieces);
        self.materialize(source, &groups)
    }

    fn group(&self, source: &str, pieces: &[Piece]) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        let mut current: Option<Group> = None;

        for piece in pieces {
            let content = piece.content();
            let Some(group) = current.as_mut() else {
                current = Some(Group::open(piece, self.measure.measure(content.slice(source))));
                continue;
            };

            // a bare dropped delimiter adds extent but no text
            if content.is_empty() {
                let size = group.size;
                group.extend(piece, size);
                continue;
            }

            if !group.has_text {
                group.extend(piece, self.measure.measure(content.slice(source)));
                continue;
            }

            let merged = if self.measure.is_additive() {
                group.size + self.measure.measure(content.slice(source))
            } else {
                let mut joined = group.text(source);
                joined.push_str(content.slice(source));
                self.measure.measure(&joined)
            };

            if self.should_flush(group, piece, merged) {
                if let Some(done) = current.take() {
                    groups.push(done);
                }
                current = Some(Group::open(piece, self.measure.measure(content.slice(source))));
            } else {
                group.extend(piece, merged);
                if self.is_section(piece) {
                    group.sections += 1;
                }
            }
        }

        groups.extend(current);
        groups
    }

    /// Cut made by a structural delimiter level, not the whitespace fallback.
    fn is_section(&self, piece: &Piece) -> bool {
        piece
            .boundary
            .is_some_and(|level| level <= self.section_level && level < self.fallback_level)
    }

    /// `group` is the bare header of an enclosing section (a play header before
    /// its first task), so the next, deeper section joins it.
    fn is_header(&self, group: &Group, piece: &Piece) -> bool {
        group.sections == 0
            && matches!((group.opens, piece.boundary), (Some(opened), Some(level)) if opened < level)
    }

    fn should_flush(&self, group: &Group, piece: &Piece, merged: usize) -> bool {
        if group.oversized || piece.oversized {
            return true;
        }
        if self.is_section(piece) && !self.is_header(group, piece) {
            match self.policy {
                BoundaryPolicy::Strict => return true,
                BoundaryPolicy::MinSize if group.size >= self.min_size => return true,
                BoundaryPolicy::MinSize => {}
            }
        }
        merged > self.budget
    }

    fn materialize(&self, source: &str, groups: &[Group]) -> Vec<Chunk> {
        let mut chunks = Vec::with_capacity(groups.len());

        for (index, group) in groups.iter().enumerate() {
            let closing = groups.get(index + 1).and_then(|next| next.boundary);
            let level = match (group.boundary, closing) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => self.fallback_level,
            };

            let previous = index.checked_sub(1).map(|i| &groups[i]);
            let overlap = match previous {
                Some(prev) if self.overlap_size > 0 => self.overlap_len(source, prev.start, group.start),
                _ => 0,
            };

            let start_offset = group.start - overlap;
            let dropped = previous
                .into_iter()
                .flat_map(|prev| prev.dropped.iter())
                .chain(group.dropped.iter());
            let text = strip(source, Span::new(start_offset, group.end), dropped);

            let size = self.measure.measure(&text);
            if group.oversized {
                tracing::warn!(
                    chunk = index,
                    size,
                    budget = self.budget,
                    "emitting oversized chunk: no level could split it under budget"
                );
            }

            chunks.push(Chunk {
                text,
                start_offset,
                end_offset: group.end,
                overlap,
                level,
                size,
                oversized: group.oversized,
            });
        }

        chunks
    }

    /// Byte length of the longest suffix of `source[start..end]` that
    /// measures at most `overlap_size`.
    fn overlap_len(&self, source: &str, start: usize, end: usize) -> usize {
        let boundaries: Vec<usize> = source[start..end]
            .char_indices()
            .map(|(offset, _)| start + offset)
            .collect();

        // suffixes shrink as the start moves right
        let (mut lo, mut hi) = (0, boundaries.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.measure.measure(&source[boundaries[mid]..end]) <= self.overlap_size {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        boundaries.get(lo).map_or(0, |&from| end - from)
    }
}
