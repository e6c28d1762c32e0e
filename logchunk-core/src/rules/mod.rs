// Segmentation engine - delegates to the stages of the pipeline:
// - level.rs: compiled delimiters and the level table
// - matcher.rs: boundary matches for one level
// - splitter.rs: recursive descent through the levels
// - packer.rs: merging pieces into chunks, overlap injection
// - engine.rs: Segmenter tying the stages together

pub mod engine;
pub mod level;
pub mod matcher;
pub mod packer;
pub mod splitter;

pub use engine::{segment, Segmenter};
pub use level::{Delimiter, LevelKind, LevelTable, RuleLevel};
pub use matcher::find_matches;
pub use splitter::Piece;
