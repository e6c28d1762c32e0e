//! Error types for the segmentation engine.
//!
//! Configuration and pattern problems are reported before any text is
//! processed. Oversized atomic fragments are not errors; they surface as the
//! `oversized` flag on [`crate::Chunk`].

use thiserror::Error;

/// Errors raised while building a [`crate::Segmenter`] or its level table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    /// Size constraints are inconsistent (`min_size > max_size`, zero budget,
    /// `overlap_size >= max_size`).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The level table is empty, has an empty level, or cannot split any text.
    #[error("invalid level table: {0}")]
    InvalidLevelTable(String),

    /// A delimiter pattern failed to compile or validate.
    #[error("malformed pattern '{pattern}': {reason}")]
    MalformedPattern { pattern: String, reason: String },
}

/// Result type alias for engine construction.
pub type Result<T> = std::result::Result<T, ChunkingError>;
