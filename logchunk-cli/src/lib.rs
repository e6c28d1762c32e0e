// All core functionality is in logchunk-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod overrides;
pub mod summary;

// Re-export core types for convenience
pub use logchunk_core::*;

// Re-export CLI utilities
pub use overrides::SizeOverrides;
