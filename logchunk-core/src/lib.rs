// Logchunk Core Library
//
// Hierarchical recursive segmentation of automation run logs into
// size-bounded chunks, plus metadata extraction and alert evaluation.
// Main interface for turning a raw log into a chunk report.

pub mod config;
pub mod error;
pub mod measure;
pub mod metadata;
pub mod processor;
pub mod rules;
pub mod types;

// Re-export main types and functions for easy use
pub use config::{
    BoundaryPolicy, ChunkingConfig, ChunkingProfile, DelimiterConfig, LevelConfig, ProfileKind,
    ProfileManager,
};
pub use error::ChunkingError;
pub use measure::{ByteCount, CharacterCount, SizeMeasure, SizeUnit, TokenCount, WordCount};
pub use metadata::{evaluate_alerts, extract_metadata, AlertKind, ChunkMetadata, Severity, TriggeredAlert};
pub use processor::{LogProcessor, ProcessingReport, ReportFormat};
pub use rules::{segment, Delimiter, LevelTable, RuleLevel, Segmenter};
pub use types::*;
