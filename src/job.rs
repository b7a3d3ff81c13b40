//! Per-file work units and their results.

use crate::constants::OUTPUT_EXTENSION;
use crate::formats::InputFormat;
use crate::output;
use crate::processing::CompressionOptions;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where compressed files are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace sources in place; non-JPEG sources become `<stem>.jpg`.
    InPlace,
    /// Write `<stem>.jpg` into a directory, leaving sources untouched.
    OutputDir(PathBuf),
}

/// One file to compress. Immutable once a batch starts.
#[derive(Debug, Clone)]
pub struct Job {
    /// Position in the batch, used to restore input order in summaries
    pub index: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: InputFormat,
    pub options: CompressionOptions,
    pub in_place: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Written, final size within tolerance of the target
    Compressed,
    /// Written, but still above target after every attempt
    BestEffort,
    /// JPEG source already at or below the target; left as is
    AlreadyWithinTarget,
    /// Re-encoding a JPEG source would not make it smaller; left as is
    NoGain,
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }

    pub fn wrote_output(&self) -> bool {
        matches!(self, Outcome::Compressed | Outcome::BestEffort)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Compressed => "✅",
            Outcome::BestEffort => "⚠️",
            Outcome::AlreadyWithinTarget => "⭐",
            Outcome::NoGain => "➖",
            Outcome::Failed(_) => "❌",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Compressed => write!(f, "compressed"),
            Outcome::BestEffort => write!(f, "over target"),
            Outcome::AlreadyWithinTarget => write!(f, "already within target"),
            Outcome::NoGain => write!(f, "kept original"),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub index: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    pub original_size: u64,
    pub final_size: u64,
    /// Quality of the written encode, `None` when nothing was encoded
    pub final_quality: Option<u8>,
    pub dimensions: Option<(u32, u32)>,
    pub attempts: u32,
    pub outcome: Outcome,
}

impl CompressionResult {
    pub fn failed(job: &Job, reason: impl Into<String>) -> Self {
        Self {
            index: job.index,
            source: job.source.clone(),
            output: job.output.clone(),
            original_size: 0,
            final_size: 0,
            final_quality: None,
            dimensions: None,
            attempts: 0,
            outcome: Outcome::Failed(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Build one job per supported file, assigning collision-free output paths.
///
/// Files whose extension is not a supported image format are skipped.
pub fn plan_jobs(files: &[PathBuf], options: &CompressionOptions, mode: &WriteMode) -> Vec<Job> {
    let sources: HashSet<PathBuf> = files.iter().map(|f| output::resolved_path(f)).collect();
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut jobs = Vec::with_capacity(files.len());

    for source in files {
        let Some(format) = InputFormat::from_path(source) else {
            crate::warn!("Skipping unsupported file: {:?}", source);
            continue;
        };

        let output = resolve_output_path(source, format, mode, &sources, &claimed);
        claimed.insert(output.clone());

        jobs.push(Job {
            index: jobs.len(),
            source: source.clone(),
            output,
            format,
            options: options.clone(),
            in_place: matches!(mode, WriteMode::InPlace),
        });
    }

    jobs
}

fn resolve_output_path(
    source: &Path,
    format: InputFormat,
    mode: &WriteMode,
    sources: &HashSet<PathBuf>,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    let dir = match mode {
        WriteMode::InPlace => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        WriteMode::OutputDir(dir) => dir.clone(),
    };
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let resolved_source = output::resolved_path(source);
    let taken = |candidate: &Path| {
        if claimed.contains(candidate) {
            return true;
        }
        let resolved = output::resolved_path(candidate);
        if resolved == resolved_source {
            return false;
        }
        // Another batch member is never overwritten. Earlier runs into an
        // output directory are; in place, any file already there survives.
        sources.contains(&resolved) || (matches!(mode, WriteMode::InPlace) && candidate.exists())
    };

    let preferred = if matches!(mode, WriteMode::InPlace) && format.is_jpeg() {
        source.to_path_buf()
    } else {
        dir.join(format!("{}.{}", stem, OUTPUT_EXTENSION))
    };
    if !taken(&preferred) {
        return preferred;
    }

    let tagged = format!("{}-{}", stem, format.extension());
    let candidate = dir.join(format!("{}.{}", tagged, OUTPUT_EXTENSION));
    if !taken(&candidate) {
        return candidate;
    }

    (1..)
        .map(|n| dir.join(format!("{}-{}.{}", tagged, n, OUTPUT_EXTENSION)))
        .find(|candidate| !taken(candidate))
        .unwrap_or(candidate)
}
