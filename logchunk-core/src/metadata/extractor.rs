use crate::types::Chunk;
use chrono::NaiveDateTime;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

// Pre-compiled regexes for log line recognition
static RECAP_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PLAY RECAP \*+").unwrap());

static HOST_STATS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"^([\w.\-]+)\s*:\s*ok=(\d+)\s+changed=(\d+)\s+unreachable=(\d+)\s+failed=(\d+)\s+skipped=(\d+)\s+rescued=(\d+)\s+ignored=(\d+)",
    )
    .multi_line(true)
    .build()
    .unwrap()
});

static TASK_TIMING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^([^-\n]+?)\s*-{2,}\s*([\d.]+)s")
        .multi_line(true)
        .build()
        .unwrap()
});

static PLAY_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PLAY \[(.*?)\]").unwrap());

static TASK_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"TASK \[(.*?)\]").unwrap());

static HOST_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:ok|changed|failed|skipping|unreachable|fatal): \[([\w.\-]+)\]",
        r"FAILED - RETRYING: \[([\w.\-]+)\]",
        r"UNREACHABLE! \[([\w.\-]+)\]",
    ]
    .iter()
    .map(|p| case_insensitive(p))
    .collect()
});

static STATUS_REGEXES: LazyLock<Vec<(Regex, Status, Option<ErrorKind>)>> = LazyLock::new(|| {
    vec![
        (case_insensitive(r"FAILED!"), Status::Failed, Some(ErrorKind::TaskFailed)),
        (case_insensitive(r"UNREACHABLE!"), Status::Unreachable, Some(ErrorKind::HostUnreachable)),
        (case_insensitive(r"FAILED - RETRYING"), Status::Retrying, Some(ErrorKind::RetryFailure)),
        (case_insensitive(r"changed:"), Status::Changed, None),
        (case_insensitive(r"ok:"), Status::Ok, None),
        (case_insensitive(r"skipping:"), Status::Skipping, None),
        (case_insensitive(r"included:"), Status::Included, None),
    ]
});

static RETRY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"FAILED - RETRYING:.*\((\d+) retries left\)"));

static TIMESTAMP_REGEXES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"[A-Za-z]+ \d+ [A-Za-z]+ \d{4}\s+\d{2}:\d{2}:\d{2}").unwrap(),
            "%A %d %B %Y %H:%M:%S",
        ),
        (
            Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}").unwrap(),
            "%Y-%m-%d %H:%M:%S",
        ),
        (
            Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").unwrap(),
            "%Y-%m-%dT%H:%M:%S",
        ),
    ]
});

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\d+:\d{2}:\d{2}\.\d+)\)").unwrap());

const TIMING_TABLE_RULE: &str =
    "===============================================================================";

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern).case_insensitive(true).build().unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    #[default]
    Standard,
    Recap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Changed,
    Failed,
    Unreachable,
    Retrying,
    Skipping,
    Included,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TaskFailed,
    HostUnreachable,
    RetryFailure,
    TaskFailedSummary,
    HostUnreachableSummary,
}

/// Per-host counters from a `PLAY RECAP` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostStats {
    pub ok: u32,
    pub changed: u32,
    pub unreachable: u32,
    pub failed: u32,
    pub skipped: u32,
    pub rescued: u32,
    pub ignored: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub task: String,
    pub duration_seconds: f64,
}

/// Structured facts pulled from one chunk's text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_index: usize,
    pub level: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub size: usize,
    pub chunk_type: ChunkType,
    pub playbook_name: Option<String>,
    pub task_names: Vec<String>,
    pub hosts: Vec<String>,
    pub statuses: Vec<Status>,
    pub has_error: bool,
    pub error_kinds: Vec<ErrorKind>,
    pub retry_counts: Vec<u32>,
    pub timestamps: Vec<String>,
    pub first_timestamp: Option<NaiveDateTime>,
    pub durations: Vec<String>,
    pub host_stats: BTreeMap<String, HostStats>,
    pub task_timings: Vec<TaskTiming>,
}

impl ChunkMetadata {
    pub fn is_recap(&self) -> bool {
        self.chunk_type == ChunkType::Recap
    }

    pub fn has_error_kind(&self, kind: ErrorKind) -> bool {
        self.error_kinds.contains(&kind)
    }
}

/// Extract metadata for every chunk, in stream order.
pub fn extract_metadata<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Vec<ChunkMetadata> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| extract_chunk_metadata(index, chunk))
        .collect()
}

pub fn extract_chunk_metadata(chunk_index: usize, chunk: &Chunk) -> ChunkMetadata {
    let text = chunk.text.as_str();
    let mut metadata = ChunkMetadata {
        chunk_index,
        level: chunk.level,
        start_offset: chunk.start_offset,
        end_offset: chunk.end_offset,
        size: chunk.size,
        ..ChunkMetadata::default()
    };
    let mut hosts = BTreeSet::new();

    if RECAP_HEADER_REGEX.is_match(text) {
        metadata.chunk_type = ChunkType::Recap;
        metadata.statuses.push(Status::Summary);
        extract_host_stats(text, &mut metadata);
        hosts.extend(metadata.host_stats.keys().cloned());
    }

    if let Some(timings) = extract_task_timings(text) {
        if !metadata.is_recap() {
            metadata.chunk_type = ChunkType::Recap;
            metadata.statuses.push(Status::Summary);
        }
        metadata.task_timings = timings;
    }

    if !metadata.is_recap() {
        metadata.playbook_name = PLAY_NAME_REGEX
            .captures(text)
            .map(|caps| caps[1].to_string());
        metadata.task_names = TASK_NAME_REGEX
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect();
    }

    for re in HOST_REGEXES.iter() {
        hosts.extend(re.captures_iter(text).map(|caps| caps[1].to_string()));
    }
    metadata.hosts = hosts.into_iter().collect();

    for (re, status, error_kind) in STATUS_REGEXES.iter() {
        let count = re.find_iter(text).count();
        metadata.statuses.extend(std::iter::repeat(*status).take(count));
        if let Some(kind) = error_kind {
            metadata.error_kinds.extend(std::iter::repeat(*kind).take(count));
        }
    }
    metadata.has_error = !metadata.error_kinds.is_empty();

    metadata.retry_counts = RETRY_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    extract_timestamps(text, &mut metadata);

    metadata.durations = DURATION_REGEX
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();

    metadata
}

fn extract_host_stats(text: &str, metadata: &mut ChunkMetadata) {
    for caps in HOST_STATS_REGEX.captures_iter(text) {
        let count = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
        let stats = HostStats {
            ok: count(2),
            changed: count(3),
            unreachable: count(4),
            failed: count(5),
            skipped: count(6),
            rescued: count(7),
            ignored: count(8),
        };

        if stats.unreachable > 0 {
            metadata.error_kinds.push(ErrorKind::HostUnreachableSummary);
        }
        if stats.failed > 0 {
            metadata.error_kinds.push(ErrorKind::TaskFailedSummary);
        }
        metadata.host_stats.insert(caps[1].to_string(), stats);
    }
}

/// Timings from a `TASKS RECAP` section or the `=====` table, slowest first.
fn extract_task_timings(text: &str) -> Option<Vec<TaskTiming>> {
    let section = if text.contains("TASKS RECAP") {
        text
    } else if let Some((_, tail)) = text.rsplit_once(TIMING_TABLE_RULE) {
        tail
    } else {
        return None;
    };

    let mut timings: Vec<TaskTiming> = TASK_TIMING_REGEX
        .captures_iter(section)
        .filter_map(|caps| {
            let duration_seconds = caps[2].parse::<f64>().ok()?;
            Some(TaskTiming {
                task: caps[1].trim().to_string(),
                duration_seconds,
            })
        })
        .collect();
    timings.sort_by(|a, b| b.duration_seconds.total_cmp(&a.duration_seconds));
    Some(timings)
}

fn extract_timestamps(text: &str, metadata: &mut ChunkMetadata) {
    let mut found: Vec<(usize, &str, &str)> = TIMESTAMP_REGEXES
        .iter()
        .flat_map(|(re, format)| re.find_iter(text).map(move |m| (m.start(), m.as_str(), *format)))
        .collect();
    found.sort_by_key(|(start, _, _)| *start);

    metadata.first_timestamp = found.iter().find_map(|(_, raw, format)| {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        NaiveDateTime::parse_from_str(&normalized, format).ok()
    });
    metadata.timestamps = found.into_iter().map(|(_, raw, _)| raw.to_string()).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            start_offset: 10,
            end_offset: 10 + text.len(),
            overlap: 0,
            level: 2,
            size: text.chars().count(),
            oversized: false,
        }
    }

    #[test]
    fn test_standard_chunk_fields() {
        let text = "PLAY [webservers] ****\n\
                    TASK [Install nginx] ****\n\
                    changed: [web1]\n\
                    ok: [web2]\n\
                    TASK [Start nginx] ****\n\
                    skipping: [web2]\n";
        let metadata = extract_chunk_metadata(3, &chunk(text));

        assert_eq!(metadata.chunk_index, 3);
        assert_eq!(metadata.start_offset, 10);
        assert_eq!(metadata.level, 2);
        assert_eq!(metadata.chunk_type, ChunkType::Standard);
        assert_eq!(metadata.playbook_name.as_deref(), Some("webservers"));
        assert_eq!(metadata.task_names, vec!["Install nginx", "Start nginx"]);
        assert_eq!(metadata.hosts, vec!["web1", "web2"]);
        assert_eq!(
            metadata.statuses,
            vec![Status::Changed, Status::Ok, Status::Skipping]
        );
        assert!(!metadata.has_error);
    }

    #[test]
    fn test_failures_and_retries() {
        let text = "FAILED - RETRYING: [db1]: Wait for port (2 retries left).\n\
                    fatal: [db1]: FAILED! => {\"msg\": \"timeout\"}\n\
                    fatal: [db2]: UNREACHABLE! => {\"msg\": \"ssh\"}\n";
        let metadata = extract_chunk_metadata(0, &chunk(text));

        assert!(metadata.has_error);
        assert_eq!(metadata.retry_counts, vec![2]);
        assert_eq!(metadata.hosts, vec!["db1", "db2"]);
        assert!(metadata.has_error_kind(ErrorKind::TaskFailed));
        assert!(metadata.has_error_kind(ErrorKind::HostUnreachable));
        assert!(metadata.has_error_kind(ErrorKind::RetryFailure));
        assert_eq!(
            metadata.statuses,
            vec![Status::Failed, Status::Unreachable, Status::Retrying]
        );
    }

    #[test]
    fn test_host_patterns_are_case_insensitive() {
        let metadata = extract_chunk_metadata(0, &chunk("OK: [Node-1.example]\n"));
        assert_eq!(metadata.hosts, vec!["Node-1.example"]);
        assert_eq!(metadata.statuses, vec![Status::Ok]);
    }

    #[test]
    fn test_recap_chunk() {
        let text = "PLAY RECAP *********\n\
                    web1 : ok=5    changed=2    unreachable=0    failed=0    skipped=1    rescued=0    ignored=0\n\
                    db1  : ok=1    changed=0    unreachable=1    failed=1    skipped=0    rescued=0    ignored=0\n";
        let metadata = extract_chunk_metadata(7, &chunk(text));

        assert!(metadata.is_recap());
        assert_eq!(metadata.statuses, vec![Status::Summary]);
        assert_eq!(metadata.hosts, vec!["db1", "web1"]);
        assert_eq!(metadata.host_stats["web1"].ok, 5);
        assert_eq!(metadata.host_stats["web1"].skipped, 1);
        assert_eq!(metadata.host_stats["db1"].unreachable, 1);
        assert!(metadata.has_error);
        assert_eq!(
            metadata.error_kinds,
            vec![ErrorKind::HostUnreachableSummary, ErrorKind::TaskFailedSummary]
        );
        assert!(metadata.playbook_name.is_none());
    }

    #[test]
    fn test_task_timing_table() {
        let text = "Friday 18 July 2025  10:00:05 +0000 (0:00:01.234)       0:00:05.678 ****\n\
                    ===============================================================================\n\
                    Install packages --------------------------------------------------------- 3.21s\n\
                    Gathering Facts ---------------------------------------------------------- 1.02s\n\
                    Start service ------------------------------------------------------------ 4.50s\n";
        let metadata = extract_chunk_metadata(0, &chunk(text));

        assert!(metadata.is_recap());
        let tasks: Vec<&str> = metadata.task_timings.iter().map(|t| t.task.as_str()).collect();
        assert_eq!(tasks, vec!["Start service", "Install packages", "Gathering Facts"]);
        assert!((metadata.task_timings[0].duration_seconds - 4.5).abs() < 1e-9);
        assert_eq!(metadata.durations, vec!["0:00:01.234"]);
    }

    #[test]
    fn test_timestamps_in_text_order() {
        let text = "started 2025-07-18T09:59:00Z\n\
                    Friday 18 July 2025  10:00:00 +0000 (0:00:00.050)\n\
                    logged 2025-07-18 10:01:00\n";
        let metadata = extract_chunk_metadata(0, &chunk(text));

        assert_eq!(
            metadata.timestamps,
            vec!["2025-07-18T09:59:00", "Friday 18 July 2025  10:00:00", "2025-07-18 10:01:00"]
        );
        let first = metadata.first_timestamp.unwrap();
        assert_eq!((first.year(), first.month(), first.day()), (2025, 7, 18));
        assert_eq!((first.hour(), first.minute()), (9, 59));
    }

    #[test]
    fn test_extract_metadata_indexes_stream() {
        let chunks = vec![chunk("ok: [a]\n"), chunk("PLAY RECAP ***\n")];
        let metadata = extract_metadata(&chunks);
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[1].chunk_index, 1);
        assert!(metadata[1].is_recap());
    }
}
