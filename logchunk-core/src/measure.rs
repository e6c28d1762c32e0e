//! Size measures used wherever a span is compared against the budget.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Maps a text span to a scalar size.
///
/// Implementations must be pure. Measures are not assumed to be additive
/// unless `is_additive` says so; token counts can shrink under concatenation.
pub trait SizeMeasure: Send + Sync {
    fn measure(&self, text: &str) -> usize;

    fn name(&self) -> &str;

    /// `measure(a + b) == measure(a) + measure(b)` for all `a`, `b`.
    fn is_additive(&self) -> bool {
        false
    }
}

/// Built-in measures selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    #[default]
    Characters,
    Bytes,
    Words,
}

impl SizeUnit {
    pub fn measure(&self) -> Arc<dyn SizeMeasure> {
        match self {
            SizeUnit::Characters => Arc::new(CharacterCount),
            SizeUnit::Bytes => Arc::new(ByteCount),
            SizeUnit::Words => Arc::new(WordCount),
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizeUnit::Characters => "characters",
            SizeUnit::Bytes => "bytes",
            SizeUnit::Words => "words",
        };
        f.write_str(name)
    }
}

/// Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterCount;

impl SizeMeasure for CharacterCount {
    fn measure(&self, text: &str) -> usize {
        text.chars().count()
    }

    fn name(&self) -> &str {
        "characters"
    }

    fn is_additive(&self) -> bool {
        true
    }
}

/// UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCount;

impl SizeMeasure for ByteCount {
    fn measure(&self, text: &str) -> usize {
        text.len()
    }

    fn name(&self) -> &str {
        "bytes"
    }

    fn is_additive(&self) -> bool {
        true
    }
}

/// Whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCount;

impl SizeMeasure for WordCount {
    fn measure(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &str {
        "words"
    }
}

/// Token count from a caller-supplied tokenizer.
pub struct TokenCount<F> {
    tokenizer: F,
    name: String,
}

impl<F> TokenCount<F>
where
    F: Fn(&str) -> usize + Send + Sync,
{
    pub fn new(name: impl Into<String>, tokenizer: F) -> Self {
        Self {
            tokenizer,
            name: name.into(),
        }
    }
}

impl<F> SizeMeasure for TokenCount<F>
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn measure(&self, text: &str) -> usize {
        (self.tokenizer)(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
