use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

// ===== SPANS =====

/// Half-open byte range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} > end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        &text[self.start..self.end]
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

// ===== DELIMITER INCLUSION =====

/// Where the matched delimiter text ends up after a cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inclusion {
    /// Delimiter is dropped from the chunk text at the cut.
    None,
    /// Delimiter stays at the end of the piece before the cut.
    #[default]
    #[serde(alias = "previous")]
    Prev,
    /// Delimiter starts the piece after the cut.
    Next,
}

impl Inclusion {
    /// Byte offset at which a match is cut.
    ///
    /// `None` cuts after the delimiter so the dropped text still belongs to
    /// the preceding piece and offsets stay gap-free.
    pub fn cut_position(&self, matched: Span) -> usize {
        match self {
            Inclusion::Next => matched.start,
            Inclusion::Prev | Inclusion::None => matched.end,
        }
    }

    /// Trailing bytes of the preceding piece that are not chunk text.
    pub fn dropped_len(&self, matched: Span) -> usize {
        match self {
            Inclusion::None => matched.len(),
            Inclusion::Prev | Inclusion::Next => 0,
        }
    }
}

// ===== CHUNKS =====

/// A terminal segment of the source text.
///
/// `start_offset..end_offset` is the chunk's extent in the source, including
/// any overlap prefix. The core region (`core_range`) excludes the overlap;
/// core regions of consecutive chunks partition the source exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Bytes of overlap copied from the previous chunk's core.
    pub overlap: usize,
    /// Most structural level index among the cuts bounding this chunk.
    pub level: usize,
    /// `text` measured with the configured size measure.
    pub size: usize,
    /// The fallback level could not bring this fragment under budget.
    pub oversized: bool,
}

impl Chunk {
    pub fn core_start(&self) -> usize {
        self.start_offset + self.overlap
    }

    pub fn core_range(&self) -> Range<usize> {
        self.core_start()..self.end_offset
    }

    pub fn preview(&self, max_chars: usize) -> String {
        let head: String = self.text.chars().take(max_chars).collect();
        if head.len() < self.text.len() {
            format!("{head}...")
        } else {
            head
        }
    }
}

/// Ordered output of a segmentation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStream {
    pub chunks: Vec<Chunk>,
}

impl ChunkStream {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Chunks that exceed the size budget because they could not be split.
    pub fn oversized(&self) -> impl Iterator<Item = (usize, &Chunk)> {
        self.chunks.iter().enumerate().filter(|(_, c)| c.oversized)
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    pub fn stats(&self) -> StreamStats {
        let sizes: Vec<usize> = self.chunks.iter().map(|c| c.size).collect();
        let mut chunks_per_level = BTreeMap::new();
        for chunk in &self.chunks {
            *chunks_per_level.entry(chunk.level).or_insert(0) += 1;
        }

        StreamStats {
            chunk_count: self.chunks.len(),
            oversized_count: self.chunks.iter().filter(|c| c.oversized).count(),
            min_size: sizes.iter().copied().min().unwrap_or(0),
            max_size: sizes.iter().copied().max().unwrap_or(0),
            mean_size: if sizes.is_empty() {
                0.0
            } else {
                sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
            },
            chunks_per_level,
        }
    }
}

impl IntoIterator for ChunkStream {
    type Item = Chunk;
    type IntoIter = std::vec::IntoIter<Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChunkStream {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

/// Summary numbers over a [`ChunkStream`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub chunk_count: usize,
    pub oversized_count: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub mean_size: f64,
    pub chunks_per_level: BTreeMap<usize, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, start: usize, overlap: usize, level: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            start_offset: start,
            end_offset: start + text.len(),
            overlap,
            level,
            size: text.chars().count(),
            oversized: false,
        }
    }

    #[test]
    fn test_inclusion_cut_positions() {
        let m = Span::new(10, 14);
        assert_eq!(Inclusion::Next.cut_position(m), 10);
        assert_eq!(Inclusion::Prev.cut_position(m), 14);
        assert_eq!(Inclusion::None.cut_position(m), 14);
        assert_eq!(Inclusion::None.dropped_len(m), 4);
        assert_eq!(Inclusion::Prev.dropped_len(m), 0);
    }

    #[test]
    fn test_inclusion_deserializes_from_yaml() {
        let parsed: Vec<Inclusion> = serde_yaml::from_str("[none, prev, previous, next]").unwrap();
        assert_eq!(
            parsed,
            vec![Inclusion::None, Inclusion::Prev, Inclusion::Prev, Inclusion::Next]
        );
    }

    #[test]
    fn test_chunk_core_range_excludes_overlap() {
        let c = chunk("abcdef", 4, 2, 0);
        assert_eq!(c.core_start(), 6);
        assert_eq!(c.core_range(), 6..10);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let c = chunk("héllo wörld", 0, 0, 0);
        assert_eq!(c.preview(4), "héll...");
        assert_eq!(c.preview(50), "héllo wörld");
    }

    #[test]
    fn test_stream_stats() {
        let mut big = chunk("0123456789", 3, 0, 2);
        big.oversized = true;
        let stream = ChunkStream::new(vec![chunk("abc", 0, 0, 0), big]);

        let stats = stream.stats();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.oversized_count, 1);
        assert_eq!(stats.min_size, 3);
        assert_eq!(stats.max_size, 10);
        assert!((stats.mean_size - 6.5).abs() < f64::EPSILON);
        assert_eq!(stats.chunks_per_level.get(&0), Some(&1));
        assert_eq!(stats.chunks_per_level.get(&2), Some(&1));
        assert_eq!(stream.oversized().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_empty_stream_stats() {
        let stats = ChunkStream::default().stats();
        assert_eq!(stats.chunk_count, 0);
        assert_eq!(stats.mean_size, 0.0);
    }
}
