use super::extractor::{ChunkMetadata, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        f.write_str(name)
    }
}

/// Alert conditions evaluated over chunk metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    UnreachableHost,
    FailedTask,
    RetriesRunningLow,
    DurationRecorded,
}

impl AlertKind {
    pub fn all() -> [AlertKind; 4] {
        [
            AlertKind::UnreachableHost,
            AlertKind::FailedTask,
            AlertKind::RetriesRunningLow,
            AlertKind::DurationRecorded,
        ]
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::UnreachableHost => Severity::Critical,
            AlertKind::FailedTask => Severity::High,
            AlertKind::RetriesRunningLow => Severity::Medium,
            AlertKind::DurationRecorded => Severity::Low,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AlertKind::UnreachableHost => "Host became unreachable during playbook execution",
            AlertKind::FailedTask => "Task execution failed",
            AlertKind::RetriesRunningLow => "Task is retrying with few attempts remaining",
            AlertKind::DurationRecorded => "Play duration recorded for baseline comparison",
        }
    }

    /// `retry_threshold` only applies to `RetriesRunningLow`.
    pub fn matches(&self, metadata: &ChunkMetadata, retry_threshold: u32) -> bool {
        match self {
            AlertKind::UnreachableHost => {
                metadata.has_error_kind(ErrorKind::HostUnreachable)
                    || metadata.has_error_kind(ErrorKind::HostUnreachableSummary)
            }
            AlertKind::FailedTask => {
                metadata.has_error_kind(ErrorKind::TaskFailed)
                    || metadata.has_error_kind(ErrorKind::TaskFailedSummary)
            }
            AlertKind::RetriesRunningLow => {
                metadata.has_error_kind(ErrorKind::RetryFailure)
                    && metadata.retry_counts.iter().any(|&left| left < retry_threshold)
            }
            AlertKind::DurationRecorded => {
                metadata.playbook_name.is_some() && !metadata.durations.is_empty()
            }
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertKind::UnreachableHost => "unreachable_host",
            AlertKind::FailedTask => "failed_task",
            AlertKind::RetriesRunningLow => "retries_running_low",
            AlertKind::DurationRecorded => "duration_recorded",
        };
        f.write_str(name)
    }
}

/// An alert kind together with the chunks that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredAlert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub description: String,
    pub chunk_indices: Vec<usize>,
}

impl TriggeredAlert {
    pub fn count(&self) -> usize {
        self.chunk_indices.len()
    }
}

pub struct AlertEvaluator {
    retry_threshold: u32,
}

impl AlertEvaluator {
    pub const DEFAULT_RETRY_THRESHOLD: u32 = 3;

    pub fn new(retry_threshold: u32) -> Self {
        Self { retry_threshold }
    }

    /// One entry per alert kind with at least one matching chunk.
    pub fn evaluate(&self, metadata: &[ChunkMetadata]) -> Vec<TriggeredAlert> {
        AlertKind::all()
            .into_iter()
            .filter_map(|kind| {
                let chunk_indices: Vec<usize> = metadata
                    .iter()
                    .filter(|m| kind.matches(m, self.retry_threshold))
                    .map(|m| m.chunk_index)
                    .collect();
                if chunk_indices.is_empty() {
                    return None;
                }
                tracing::debug!(alert = %kind, chunks = chunk_indices.len(), "alert triggered");
                Some(TriggeredAlert {
                    kind,
                    severity: kind.severity(),
                    description: kind.description().to_string(),
                    chunk_indices,
                })
            })
            .collect()
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETRY_THRESHOLD)
    }
}

pub fn evaluate_alerts(metadata: &[ChunkMetadata]) -> Vec<TriggeredAlert> {
    AlertEvaluator::default().evaluate(metadata)
}
