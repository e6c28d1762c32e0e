// Collaborators that read the chunk stream:
// - extractor.rs: per-chunk playbook, task, host, status and timing facts
// - alerts.rs: alert conditions evaluated over the extracted metadata

pub mod alerts;
pub mod extractor;

pub use alerts::{evaluate_alerts, AlertEvaluator, AlertKind, Severity, TriggeredAlert};
pub use extractor::{
    extract_chunk_metadata, extract_metadata, ChunkMetadata, ChunkType, ErrorKind, HostStats,
    Status, TaskTiming,
};
