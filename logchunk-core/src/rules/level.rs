use crate::config::{DelimiterConfig, LevelConfig};
use crate::error::{ChunkingError, Result};
use crate::types::{Inclusion, Span};
use regex::{Regex, RegexBuilder};

/// A compiled delimiter pattern.
#[derive(Debug, Clone)]
pub struct Delimiter {
    source: String,
    matcher: PatternMatcher,
}

#[derive(Debug, Clone)]
enum PatternMatcher {
    Literal(String),
    Regex(Regex),
}

impl Delimiter {
    /// Case-sensitive literal.
    pub fn literal(pattern: &str) -> Result<Self> {
        Self::compile(&DelimiterConfig::literal(pattern))
    }

    /// Multi-line regex.
    pub fn regex(pattern: &str) -> Result<Self> {
        Self::compile(&DelimiterConfig::regex(pattern))
    }

    pub fn compile(config: &DelimiterConfig) -> Result<Self> {
        let source = config.pattern().to_string();
        if source.is_empty() {
            return Err(malformed(&source, "pattern is empty"));
        }

        let matcher = match (config.is_regex(), config.is_case_insensitive()) {
            (false, false) => PatternMatcher::Literal(source.clone()),
            // case-insensitive literals go through the regex engine escaped
            (false, true) => PatternMatcher::Regex(build_regex(&regex::escape(&source), true, &source)?),
            (true, ci) => PatternMatcher::Regex(build_regex(&source, ci, &source)?),
        };

        Ok(Self { source, matcher })
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Non-overlapping, non-empty matches of this pattern inside `span`.
    ///
    /// Regex matching sees the whole text, so `^` and `$` anchor at real line
    /// boundaries even when the span starts or ends mid-line. Matches that run
    /// past `span.end` are discarded.
    pub fn find_in(&self, text: &str, span: Span) -> Vec<Span> {
        match &self.matcher {
            PatternMatcher::Literal(literal) => span
                .slice(text)
                .match_indices(literal.as_str())
                .map(|(offset, m)| Span::new(span.start + offset, span.start + offset + m.len()))
                .collect(),
            PatternMatcher::Regex(re) => {
                let mut found = Vec::new();
                let mut pos = span.start;
                while pos < span.end {
                    let Some(m) = re.find_at(text, pos) else {
                        break;
                    };
                    if m.start() >= span.end {
                        break;
                    }
                    if m.start() == m.end() || m.end() > span.end {
                        // step one char past the start and keep looking
                        pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
                        continue;
                    }
                    found.push(Span::new(m.start(), m.end()));
                    pos = m.end();
                }
                found
            }
        }
    }
}

fn build_regex(pattern: &str, case_insensitive: bool, source: &str) -> Result<Regex> {
    let re = RegexBuilder::new(pattern)
        .multi_line(true)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| malformed(source, &e.to_string()))?;

    if re.is_match("") {
        return Err(malformed(source, "pattern matches the empty string"));
    }
    Ok(re)
}

fn malformed(pattern: &str, reason: &str) -> ChunkingError {
    ChunkingError::MalformedPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    }
}

/// What a level splits on.
#[derive(Debug, Clone)]
pub enum LevelKind {
    Delimiters(Vec<Delimiter>),
    /// Runs of whitespace, with a midpoint cut when there are none.
    Whitespace,
}

/// One rule level of the hierarchy.
#[derive(Debug, Clone)]
pub struct RuleLevel {
    pub kind: LevelKind,
    pub inclusion: Inclusion,
}

impl RuleLevel {
    pub fn delimiters(delimiters: Vec<Delimiter>, inclusion: Inclusion) -> Self {
        Self {
            kind: LevelKind::Delimiters(delimiters),
            inclusion,
        }
    }

    pub fn whitespace(inclusion: Inclusion) -> Self {
        Self {
            kind: LevelKind::Whitespace,
            inclusion,
        }
    }

    pub fn compile(config: &LevelConfig) -> Result<Self> {
        match (config.whitespace, config.delimiters.is_empty()) {
            (true, true) => Ok(Self::whitespace(config.inclusion)),
            (true, false) => Err(ChunkingError::InvalidLevelTable(
                "a level cannot have both delimiters and the whitespace fallback".to_string(),
            )),
            (false, true) => Err(ChunkingError::InvalidLevelTable(
                "a delimiter level needs at least one delimiter".to_string(),
            )),
            (false, false) => {
                let delimiters = config
                    .delimiters
                    .iter()
                    .map(Delimiter::compile)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::delimiters(delimiters, config.inclusion))
            }
        }
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self.kind, LevelKind::Whitespace)
    }
}

/// Ordered rule levels, most structural first. Always ends in a whitespace level.
#[derive(Debug, Clone)]
pub struct LevelTable {
    levels: Vec<RuleLevel>,
}

impl LevelTable {
    pub fn new(levels: Vec<RuleLevel>) -> Result<Self> {
        let Some(last) = levels.last() else {
            return Err(ChunkingError::InvalidLevelTable("table is empty".to_string()));
        };
        if !last.is_whitespace() {
            return Err(ChunkingError::InvalidLevelTable(
                "last level must be the whitespace fallback".to_string(),
            ));
        }
        for (index, level) in levels.iter().enumerate() {
            if let LevelKind::Delimiters(delimiters) = &level.kind {
                if delimiters.is_empty() {
                    return Err(ChunkingError::InvalidLevelTable(format!(
                        "level {index} has no delimiters"
                    )));
                }
            }
        }
        Ok(Self { levels })
    }

    pub fn from_config(levels: &[LevelConfig]) -> Result<Self> {
        let compiled = levels
            .iter()
            .enumerate()
            .map(|(index, level)| {
                RuleLevel::compile(level).map_err(|e| match e {
                    ChunkingError::InvalidLevelTable(reason) => {
                        ChunkingError::InvalidLevelTable(format!("level {index}: {reason}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(compiled)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RuleLevel> {
        self.levels.get(index)
    }

    /// Index of the whitespace fallback level.
    pub fn fallback_index(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleLevel> {
        self.levels.iter()
    }
}
