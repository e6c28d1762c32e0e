use crate::error::ChunkingError;
use crate::measure::SizeUnit;
use crate::types::Inclusion;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// Default value functions for serde
fn default_max_size() -> usize {
    2000 // characters by default
}

/// 100, capped at `max_size`.
fn default_min_size(max_size: usize) -> usize {
    100.min(max_size)
}

/// ~10% of max_size
fn default_overlap_size(max_size: usize) -> usize {
    max_size / 10
}

/// Size constraints and packing behaviour for one segmentation run.
///
/// When read from YAML, a missing `min_size` or `overlap_size` is derived from
/// `max_size`, so a profile that only sets `max_size` stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ChunkingConfigFile")]
pub struct ChunkingConfig {
    /// Maximum chunk size, overlap included
    pub max_size: usize,

    /// Buffers at least this large are closed at section boundaries under `min-size` policy
    pub min_size: usize,

    /// Trailing units of the previous chunk repeated at the start of the next
    pub overlap_size: usize,

    /// What to measure: "characters", "bytes", or "words"
    pub size_unit: SizeUnit,

    /// Delimiter levels with an index <= this always cut, and their cuts are
    /// section boundaries the packer does not merge across
    pub section_level: usize,

    /// Whether undersized buffers may merge across section boundaries
    pub boundary_policy: BoundaryPolicy,

    /// Evaluate sibling splits on the rayon pool
    pub parallel: bool,
}

/// On-disk shape of [`ChunkingConfig`]; fills in the size-dependent defaults.
#[derive(Deserialize)]
struct ChunkingConfigFile {
    #[serde(default = "default_max_size")]
    max_size: usize,
    min_size: Option<usize>,
    overlap_size: Option<usize>,
    #[serde(default)]
    size_unit: SizeUnit,
    #[serde(default)]
    section_level: usize,
    #[serde(default)]
    boundary_policy: BoundaryPolicy,
    #[serde(default)]
    parallel: bool,
}

impl From<ChunkingConfigFile> for ChunkingConfig {
    fn from(file: ChunkingConfigFile) -> Self {
        Self {
            max_size: file.max_size,
            min_size: file.min_size.unwrap_or_else(|| default_min_size(file.max_size)),
            overlap_size: file
                .overlap_size
                .unwrap_or_else(|| default_overlap_size(file.max_size)),
            size_unit: file.size_unit,
            section_level: file.section_level,
            boundary_policy: file.boundary_policy,
            parallel: file.parallel,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let max_size = default_max_size();
        Self {
            max_size,
            min_size: default_min_size(max_size),
            overlap_size: default_overlap_size(max_size),
            size_unit: SizeUnit::Characters,
            section_level: 0,
            boundary_policy: BoundaryPolicy::Strict,
            parallel: false,
        }
    }
}

impl ChunkingConfig {
    pub fn new(max_size: usize, min_size: usize, overlap_size: usize) -> Self {
        Self {
            max_size,
            min_size,
            overlap_size,
            ..Self::default()
        }
    }

    /// Reject inconsistent size constraints before any text is processed.
    pub fn validate(&self) -> std::result::Result<(), ChunkingError> {
        if self.max_size == 0 {
            return Err(ChunkingError::InvalidConfiguration(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(ChunkingError::InvalidConfiguration(format!(
                "min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            )));
        }
        if self.overlap_size >= self.max_size {
            return Err(ChunkingError::InvalidConfiguration(format!(
                "overlap_size {} must be smaller than max_size {}",
                self.overlap_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Budget for the non-overlapping part of a chunk.
    pub fn content_budget(&self) -> usize {
        self.max_size - self.overlap_size
    }
}

/// How the packer treats section boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// Never merge across a section boundary.
    #[default]
    Strict,
    /// Close the buffer at a section boundary only once it reaches `min_size`.
    MinSize,
}

// ===== LEVEL TABLE CONFIG =====

/// One delimiter pattern. A bare string is a case-sensitive literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelimiterConfig {
    Literal(String),
    Pattern {
        pattern: String,
        #[serde(default)]
        regex: bool,
        #[serde(default)]
        case_insensitive: bool,
    },
}

impl DelimiterConfig {
    pub fn literal(pattern: &str) -> Self {
        DelimiterConfig::Literal(pattern.to_string())
    }

    /// Multi-line regex: `^` and `$` anchor at line boundaries.
    pub fn regex(pattern: &str) -> Self {
        DelimiterConfig::Pattern {
            pattern: pattern.to_string(),
            regex: true,
            case_insensitive: false,
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            DelimiterConfig::Literal(p) => p,
            DelimiterConfig::Pattern { pattern, .. } => pattern,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, DelimiterConfig::Pattern { regex: true, .. })
    }

    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            DelimiterConfig::Pattern {
                case_insensitive: true,
                ..
            }
        )
    }
}

/// One rule level: either delimiters or the whitespace fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(default)]
    pub delimiters: Vec<DelimiterConfig>,
    #[serde(default)]
    pub whitespace: bool,
    #[serde(default)]
    pub inclusion: Inclusion,
}

impl LevelConfig {
    pub fn delimiters(delimiters: Vec<DelimiterConfig>, inclusion: Inclusion) -> Self {
        Self {
            delimiters,
            whitespace: false,
            inclusion,
        }
    }

    pub fn whitespace() -> Self {
        Self {
            delimiters: Vec::new(),
            whitespace: true,
            inclusion: Inclusion::Prev,
        }
    }
}

// ===== PROFILES =====

/// A named level table plus size constraints; the YAML document shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkingProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub levels: Vec<LevelConfig>,
}

/// Built-in presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Small chunks cut at failures, for real-time alert evaluation
    Alert,
    /// Large chunks preserving play and task context, for correlation
    Context,
    /// Medium chunks grouped around failure sequences
    Error,
}

impl ProfileKind {
    pub fn all() -> [ProfileKind; 3] {
        [ProfileKind::Alert, ProfileKind::Context, ProfileKind::Error]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Alert => "alert",
            ProfileKind::Context => "context",
            ProfileKind::Error => "error",
        }
    }

    pub fn profile(&self) -> ChunkingProfile {
        match self {
            ProfileKind::Alert => alert_profile(),
            ProfileKind::Context => context_profile(),
            ProfileKind::Error => error_profile(),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alert" => Ok(ProfileKind::Alert),
            "context" => Ok(ProfileKind::Context),
            "error" => Ok(ProfileKind::Error),
            other => Err(anyhow::anyhow!(
                "unknown profile '{other}' (expected alert, context or error)"
            )),
        }
    }
}

fn recap_level() -> LevelConfig {
    LevelConfig::delimiters(
        vec![
            DelimiterConfig::regex(r"^PLAY RECAP"),
            DelimiterConfig::regex(r"^TASKS RECAP"),
        ],
        Inclusion::Next,
    )
}

fn task_level() -> LevelConfig {
    LevelConfig::delimiters(
        vec![
            DelimiterConfig::regex(r"^TASK \["),
            DelimiterConfig::regex(r"^RUNNING HANDLER \["),
        ],
        Inclusion::Next,
    )
}

fn failure_level(extra: &[&str]) -> LevelConfig {
    let mut delimiters = vec![
        DelimiterConfig::regex(r"^fatal: \["),
        DelimiterConfig::regex(r"^UNREACHABLE!"),
        DelimiterConfig::regex(r"^FAILED - RETRYING:"),
    ];
    delimiters.extend(extra.iter().map(|p| DelimiterConfig::regex(p)));
    LevelConfig::delimiters(delimiters, Inclusion::Next)
}

fn fallback_levels() -> Vec<LevelConfig> {
    vec![
        LevelConfig::delimiters(vec![DelimiterConfig::literal("\n\n")], Inclusion::Prev),
        LevelConfig::delimiters(vec![DelimiterConfig::literal("\n")], Inclusion::Prev),
        LevelConfig::whitespace(),
    ]
}

fn alert_profile() -> ChunkingProfile {
    let mut levels = vec![recap_level(), failure_level(&[]), task_level()];
    levels.extend(fallback_levels());

    ChunkingProfile {
        name: ProfileKind::Alert.as_str().to_string(),
        description: "Small chunks cut at failures for real-time alert evaluation".to_string(),
        chunking: ChunkingConfig {
            section_level: 1,
            ..ChunkingConfig::new(500, 50, 50)
        },
        levels,
    }
}

fn context_profile() -> ChunkingProfile {
    let mut levels = vec![
        recap_level(),
        LevelConfig::delimiters(vec![DelimiterConfig::regex(r"^PLAY \[")], Inclusion::Next),
        task_level(),
        // per-host status lines and recap host rows
        LevelConfig::delimiters(
            vec![
                DelimiterConfig::regex(r"^(?:ok|changed|skipping|included): \["),
                DelimiterConfig::regex(r"^[A-Za-z0-9.\-_]+\s*:\s*ok=\d+"),
            ],
            Inclusion::Next,
        ),
        failure_level(&[]),
        // profile_tasks timing lines
        LevelConfig::delimiters(
            vec![DelimiterConfig::regex(
                r"^[A-Za-z]+ \d+ [A-Za-z]+ \d{4}\s+\d{2}:\d{2}:\d{2}",
            )],
            Inclusion::Next,
        ),
    ];
    levels.extend(fallback_levels());

    ChunkingProfile {
        name: ProfileKind::Context.as_str().to_string(),
        description: "Large chunks preserving play and task boundaries for correlation".to_string(),
        // recap, play and task headers all start sections
        chunking: ChunkingConfig {
            section_level: 2,
            ..ChunkingConfig::new(2000, 100, 200)
        },
        levels,
    }
}

fn error_profile() -> ChunkingProfile {
    let mut levels = vec![recap_level(), failure_level(&[r"^ERROR!"]), task_level()];
    levels.extend(fallback_levels());

    ChunkingProfile {
        name: ProfileKind::Error.as_str().to_string(),
        description: "Medium chunks grouped around failure sequences".to_string(),
        chunking: ChunkingConfig {
            section_level: 1,
            ..ChunkingConfig::new(1000, 75, 100)
        },
        levels,
    }
}

impl ChunkingProfile {
    /// Load a profile from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read profile {}", path.display()))?;
        let profile: ChunkingProfile = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse profile {}", path.display()))?;
        profile.chunking.validate()?;
        Ok(profile)
    }

    /// Load a profile with fallback to the context preset
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|e| {
                tracing::warn!(path = p, error = %e, "failed to load profile, using context preset");
                ProfileKind::Context.profile()
            }),
            None => ProfileKind::Context.profile(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Registry of the built-in presets plus profiles loaded from disk.
#[derive(Debug, Clone)]
pub struct ProfileManager {
    profiles: HashMap<String, ChunkingProfile>,
}

impl ProfileManager {
    pub fn new() -> Self {
        let profiles = ProfileKind::all()
            .iter()
            .map(|kind| (kind.as_str().to_string(), kind.profile()))
            .collect();
        Self { profiles }
    }

    pub fn get(&self, name: &str) -> Option<&ChunkingProfile> {
        self.profiles.get(name)
    }

    /// Load a YAML profile, replacing any profile with the same name.
    pub fn load_profile_from_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let profile = ChunkingProfile::load_from_file(path)?;
        let name = profile.name.clone();
        self.profiles.insert(name.clone(), profile);
        Ok(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProfileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_accepts_builtin_profiles() {
        for kind in ProfileKind::all() {
            let profile = kind.profile();
            assert!(profile.chunking.validate().is_ok(), "{kind} is invalid");
            assert!(profile.levels.last().unwrap().whitespace);
        }
    }

    #[test]
    fn test_validate_rejects_min_above_max() {
        let err = ChunkingConfig::new(100, 200, 0).validate().unwrap_err();
        assert!(matches!(err, ChunkingError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("min_size 200 exceeds max_size 100"));
    }

    #[test]
    fn test_validate_rejects_overlap_at_max() {
        let err = ChunkingConfig::new(100, 0, 100).validate().unwrap_err();
        assert!(matches!(err, ChunkingError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_validate_rejects_zero_max() {
        assert!(ChunkingConfig::new(0, 0, 0).validate().is_err());
    }

    #[test]
    fn test_content_budget_subtracts_overlap() {
        assert_eq!(ChunkingConfig::new(500, 50, 50).content_budget(), 450);
    }

    #[test]
    fn test_profile_kind_from_str() {
        assert_eq!("Alert".parse::<ProfileKind>().unwrap(), ProfileKind::Alert);
        assert_eq!("error".parse::<ProfileKind>().unwrap(), ProfileKind::Error);
        assert!("verbose".parse::<ProfileKind>().is_err());
    }

    #[test]
    fn test_delimiter_config_yaml_forms() {
        let yaml = r#"
- "\n\n"
- pattern: '^TASK \['
  regex: true
- pattern: unreachable!
  case_insensitive: true
"#;
        let parsed: Vec<DelimiterConfig> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed[0], DelimiterConfig::literal("\n\n"));
        assert!(parsed[1].is_regex());
        assert_eq!(parsed[1].pattern(), r"^TASK \[");
        assert!(!parsed[2].is_regex());
        assert!(parsed[2].is_case_insensitive());
    }

    #[test]
    fn test_chunking_config_defaults_from_partial_yaml() {
        let config: ChunkingConfig = serde_yaml::from_str("max_size: 800\nboundary_policy: min-size").unwrap();
        assert_eq!(config.max_size, 800);
        assert_eq!(config.min_size, 100);
        assert_eq!(config.overlap_size, 80);
        assert_eq!(config.section_level, 0);
        assert_eq!(config.size_unit, SizeUnit::Characters);
        assert_eq!(config.boundary_policy, BoundaryPolicy::MinSize);
        assert!(!config.parallel);
    }

    #[test]
    fn test_small_max_size_derives_valid_defaults() {
        let config: ChunkingConfig = serde_yaml::from_str("max_size: 150").unwrap();
        assert_eq!(config.overlap_size, 15);
        assert_eq!(config.min_size, 100);
        assert!(config.validate().is_ok());

        let tiny: ChunkingConfig = serde_yaml::from_str("max_size: 40\noverlap_size: 0").unwrap();
        assert_eq!(tiny.min_size, 40);
        assert_eq!(tiny.overlap_size, 0);
        assert!(tiny.validate().is_ok());
    }

    #[test]
    fn test_presets_mark_structural_levels() {
        assert_eq!(ProfileKind::Context.profile().chunking.section_level, 2);
        assert_eq!(ProfileKind::Alert.profile().chunking.section_level, 1);
        assert_eq!(ProfileKind::Error.profile().chunking.section_level, 1);
        assert_eq!(ChunkingConfig::default().section_level, 0);
    }

    #[test]
    fn test_profile_yaml_round_trip() {
        let profile = ProfileKind::Error.profile();
        let yaml = profile.to_yaml().unwrap();
        let parsed: ChunkingProfile = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_manager_loads_profile_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
name: lines
description: split on lines only
chunking:
  max_size: 120
  min_size: 10
  overlap_size: 0
levels:
  - delimiters: ["\n"]
    inclusion: none
  - whitespace: true
"#
        )
        .unwrap();

        let mut manager = ProfileManager::new();
        let name = manager.load_profile_from_file(file.path()).unwrap();
        assert_eq!(name, "lines");
        assert_eq!(manager.names(), vec!["alert", "context", "error", "lines"]);

        let profile = manager.get("lines").unwrap();
        assert_eq!(profile.chunking.max_size, 120);
        assert_eq!(profile.levels[0].inclusion, Inclusion::None);
        assert!(profile.levels[1].whitespace);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_sizes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "name: bad\nchunking:\n  max_size: 10\n  min_size: 20\nlevels:\n  - whitespace: true\n"
        )
        .unwrap();

        let err = ChunkingProfile::load_from_file(file.path()).unwrap_err();
        assert!(err.downcast_ref::<ChunkingError>().is_some());
    }

    #[test]
    fn test_load_with_fallback_uses_context() {
        let profile = ChunkingProfile::load_with_fallback(Some("/nonexistent/profile.yaml"));
        assert_eq!(profile.name, "context");
        assert_eq!(ChunkingProfile::load_with_fallback(None), ProfileKind::Context.profile());
    }
}
