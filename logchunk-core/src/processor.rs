use crate::config::{ChunkingProfile, ProfileKind};
use crate::metadata::{extract_metadata, AlertEvaluator, ChunkMetadata, TriggeredAlert};
use crate::rules::Segmenter;
use crate::types::{Chunk, ChunkStream, StreamStats};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        tracing::debug!(step = step_name, elapsed_ms = elapsed.as_millis() as u64, "step finished");
        self.timings.push((step_name.to_string(), elapsed));
        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn total(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }

    pub fn print_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        println!("\n📊 Performance Summary:");
        let total = self.total();
        for (step, duration) in &self.timings {
            let share = if total.is_zero() {
                0.0
            } else {
                duration.as_secs_f64() / total.as_secs_f64() * 100.0
            };
            println!("   {:.<30} {:>8.2}ms ({:.1}%)", step, duration.as_secs_f64() * 1000.0, share);
        }
        println!("   {:.<30} {:>8.2}ms", "Total", total.as_secs_f64() * 1000.0);
    }
}

/// SHA-256 of the raw log text, hex encoded.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a configuration's JSON form, hex encoded.
pub fn hash_config<T: Serialize>(config: &T) -> Result<String> {
    let config_json = serde_json::to_string(config)
        .map_err(|e| anyhow!("Failed to serialize config for hashing: {}", e))?;

    let mut hasher = Sha256::new();
    hasher.update(config_json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Everything produced for one log: chunks, their metadata and alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub profile: String,
    pub source: String,
    pub source_hash: String,
    pub config_hash: String,
    pub generated_at: DateTime<Utc>,
    pub stats: StreamStats,
    pub chunks: Vec<Chunk>,
    pub metadata: Vec<ChunkMetadata>,
    pub alerts: Vec<TriggeredAlert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// The full report
    #[default]
    Report,
    /// One record per chunk: the chunk and its metadata
    Chunks,
    /// Chunk texts only
    Flat,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "report" => Ok(ReportFormat::Report),
            "chunks" => Ok(ReportFormat::Chunks),
            "flat" => Ok(ReportFormat::Flat),
            other => Err(anyhow!("unknown format '{other}' (expected report, chunks or flat)")),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Report => "report",
            ReportFormat::Chunks => "chunks",
            ReportFormat::Flat => "flat",
        };
        f.write_str(name)
    }
}

#[derive(Serialize)]
struct ChunkRecord<'a> {
    chunk: &'a Chunk,
    metadata: &'a ChunkMetadata,
}

impl ProcessingReport {
    pub fn to_json(&self, format: ReportFormat) -> Result<String> {
        let json = match format {
            ReportFormat::Report => serde_json::to_string_pretty(self)?,
            ReportFormat::Chunks => {
                let records: Vec<ChunkRecord> = self
                    .chunks
                    .iter()
                    .zip(&self.metadata)
                    .map(|(chunk, metadata)| ChunkRecord { chunk, metadata })
                    .collect();
                serde_json::to_string_pretty(&records)?
            }
            ReportFormat::Flat => {
                let texts: Vec<&str> = self.chunks.iter().map(|c| c.text.as_str()).collect();
                serde_json::to_string_pretty(&texts)?
            }
        };
        Ok(json)
    }

    pub fn save_with_format(&self, path: impl AsRef<Path>, format: ReportFormat) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json(format)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn chunk_stream(&self) -> ChunkStream {
        ChunkStream::new(self.chunks.clone())
    }
}

/// Drives segmentation, metadata extraction and alert evaluation for one profile.
pub struct LogProcessor {
    profile: ChunkingProfile,
    segmenter: Segmenter,
    evaluator: AlertEvaluator,
}

impl LogProcessor {
    pub fn new(profile: ChunkingProfile) -> Result<Self> {
        let segmenter = Segmenter::from_profile(&profile)
            .with_context(|| format!("invalid profile '{}'", profile.name))?;
        Ok(Self {
            profile,
            segmenter,
            evaluator: AlertEvaluator::default(),
        })
    }

    pub fn from_kind(kind: ProfileKind) -> Result<Self> {
        Self::new(kind.profile())
    }

    pub fn with_retry_threshold(mut self, retry_threshold: u32) -> Self {
        self.evaluator = AlertEvaluator::new(retry_threshold);
        self
    }

    pub fn profile(&self) -> &ChunkingProfile {
        &self.profile
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn process_text(&self, text: &str, source: &str) -> Result<ProcessingReport> {
        let mut profiler = StepProfiler::new(false);
        self.process_text_with_profiling(text, source, &mut profiler)
    }

    pub fn process_text_with_profiling(
        &self,
        text: &str,
        source: &str,
        profiler: &mut StepProfiler,
    ) -> Result<ProcessingReport> {
        let (source_hash, config_hash) = profiler.time_step("Hashing", || {
            Ok::<_, anyhow::Error>((hash_text(text), hash_config(&self.profile)?))
        })?;

        let stream = profiler.time_step("Segmentation", || self.segmenter.segment(text));
        let metadata = profiler.time_step("Metadata Extraction", || extract_metadata(&stream));
        let alerts = profiler.time_step("Alert Evaluation", || self.evaluator.evaluate(&metadata));

        let stats = stream.stats();
        tracing::info!(
            profile = %self.profile.name,
            source,
            chunks = stats.chunk_count,
            oversized = stats.oversized_count,
            alerts = alerts.len(),
            "processed log"
        );

        Ok(ProcessingReport {
            profile: self.profile.name.clone(),
            source: source.to_string(),
            source_hash,
            config_hash,
            generated_at: Utc::now(),
            stats,
            chunks: stream.into_chunks(),
            metadata,
            alerts,
        })
    }

    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<ProcessingReport> {
        let mut profiler = StepProfiler::new(false);
        self.process_file_with_profiling(path, &mut profiler)
    }

    pub fn process_file_with_profiling(
        &self,
        path: impl AsRef<Path>,
        profiler: &mut StepProfiler,
    ) -> Result<ProcessingReport> {
        let path = path.as_ref();
        let text = profiler.time_step("Read Log", || fs::read_to_string(path))
            .with_context(|| format!("failed to read log {}", path.display()))?;
        self.process_text_with_profiling(&text, &path.display().to_string(), profiler)
    }
}
