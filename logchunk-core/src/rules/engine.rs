use super::level::LevelTable;
use super::packer::Packer;
use super::splitter::{Piece, RecursiveSplitter};
use crate::config::{ChunkingConfig, ChunkingProfile};
use crate::error::Result;
use crate::measure::SizeMeasure;
use crate::types::{ChunkStream, Span};
use std::sync::Arc;

/// Segments text with a fixed level table, configuration and size measure.
///
/// Construction validates everything up front; `segment` itself cannot fail.
pub struct Segmenter {
    table: LevelTable,
    config: ChunkingConfig,
    measure: Arc<dyn SizeMeasure>,
}

impl Segmenter {
    /// Build a segmenter measuring with `config.size_unit`.
    pub fn new(table: LevelTable, config: ChunkingConfig) -> Result<Self> {
        let measure = config.size_unit.measure();
        Self::with_measure(table, config, measure)
    }

    /// Build a segmenter with a caller-supplied measure, e.g. a tokenizer.
    pub fn with_measure(
        table: LevelTable,
        config: ChunkingConfig,
        measure: Arc<dyn SizeMeasure>,
    ) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            levels = table.len(),
            max_size = config.max_size,
            overlap_size = config.overlap_size,
            measure = measure.name(),
            "segmenter ready"
        );
        Ok(Self {
            table,
            config,
            measure,
        })
    }

    pub fn from_profile(profile: &ChunkingProfile) -> Result<Self> {
        let table = LevelTable::from_config(&profile.levels)?;
        Self::new(table, profile.chunking.clone())
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn table(&self) -> &LevelTable {
        &self.table
    }

    pub fn measure(&self) -> &dyn SizeMeasure {
        self.measure.as_ref()
    }

    /// Split `text` into ordered pieces without merging. Useful for inspecting
    /// where each level cuts.
    pub fn split(&self, text: &str) -> Vec<Piece> {
        RecursiveSplitter::new(&self.table, self.measure.as_ref(), self.config.content_budget())
            .sections(self.config.section_level)
            .parallel(self.config.parallel)
            .split(text, Span::new(0, text.len()), 0)
    }

    /// Segment `text` into chunks.
    pub fn segment(&self, text: &str) -> ChunkStream {
        if text.is_empty() {
            return ChunkStream::default();
        }

        let pieces = self.split(text);
        let chunks = Packer::new(
            self.measure.as_ref(),
            self.config.content_budget(),
            self.table.fallback_index(),
        )
        .overlap(self.config.overlap_size)
        .sections(
            self.config.section_level,
            self.config.boundary_policy,
            self.config.min_size,
        )
        .pack(text, &pieces);

        tracing::debug!(
            bytes = text.len(),
            pieces = pieces.len(),
            chunks = chunks.len(),
            "segmented text"
        );
        ChunkStream::new(chunks)
    }
}

/// One-shot segmentation: validate, build and run.
pub fn segment(text: &str, table: &LevelTable, config: &ChunkingConfig) -> Result<ChunkStream> {
    let segmenter = Segmenter::new(table.clone(), config.clone())?;
    Ok(segmenter.segment(text))
}
