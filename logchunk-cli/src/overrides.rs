use anyhow::{Context, Result};
use logchunk_core::ChunkingProfile;

/// Size settings given on the command line; each replaces the profile's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeOverrides {
    pub max_size: Option<usize>,
    pub min_size: Option<usize>,
    pub overlap_size: Option<usize>,
}

impl SizeOverrides {
    pub fn is_empty(&self) -> bool {
        self.max_size.is_none() && self.min_size.is_none() && self.overlap_size.is_none()
    }

    /// Apply to `profile` and re-validate the combined configuration.
    pub fn apply(&self, profile: &mut ChunkingProfile) -> Result<()> {
        let chunking = &mut profile.chunking;
        if let Some(max_size) = self.max_size {
            chunking.max_size = max_size;
        }
        if let Some(min_size) = self.min_size {
            chunking.min_size = min_size;
        }
        if let Some(overlap_size) = self.overlap_size {
            chunking.overlap_size = overlap_size;
        }

        chunking
            .validate()
            .with_context(|| format!("size overrides rejected for profile '{}'", profile.name))
    }
}
