use crate::constants::{MAX_WORKERS, MIB, MIN_AVAILABLE_MEMORY_MIB, MIN_WORKERS};
use crate::error::{CompressionError, Result};
use crate::formats::{is_image_file, InputFormat};
use crate::job::{CompressionResult, Job};
use crate::pool::WorkerPool;
use crate::processing::process_job;
use crossbeam_channel::{unbounded, Receiver, Sender};
use glob::glob;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use walkdir::WalkDir;

/// Collect image files from a file path, a directory, or a glob pattern.
///
/// Directories are walked recursively unless `recursive` is false. Hidden
/// entries are skipped. The result is sorted and free of duplicates.
pub fn collect_image_files(input: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut image_files = BTreeSet::new();
    let input_path = Path::new(input);

    if input_path.is_file() {
        if is_image_file(input_path) {
            image_files.insert(input_path.to_path_buf());
        }
    } else if input_path.is_dir() {
        let walker = if recursive {
            WalkDir::new(input_path)
        } else {
            WalkDir::new(input_path).max_depth(1)
        };

        let visible = |e: &walkdir::DirEntry| {
            e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
        };
        for entry in walker.into_iter().filter_entry(visible) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && is_image_file(path) {
                image_files.insert(path.to_path_buf());
            }
        }
    } else {
        let mut matched_any = false;
        for entry in glob(input)?.flatten() {
            matched_any = true;
            if entry.is_file() && is_image_file(&entry) {
                image_files.insert(entry);
            }
        }
        if !matched_any {
            return Err(CompressionError::NoImageFilesFound(input.to_string()));
        }
    }

    Ok(image_files.into_iter().collect())
}

/// Collect from several inputs, keeping first-seen order across inputs.
pub fn collect_from_inputs(inputs: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut seen = BTreeSet::new();
    let mut files = Vec::new();
    for input in inputs {
        for file in collect_image_files(input, recursive)? {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }
    Ok(files)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub total_files: usize,
    pub total_bytes: u64,
    /// Counts keyed by lowercase extension as found on disk
    pub by_extension: BTreeMap<String, usize>,
}

pub fn scan_report(files: &[PathBuf]) -> ScanReport {
    let mut report = ScanReport {
        total_files: files.len(),
        ..ScanReport::default()
    };
    for file in files {
        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        *report.by_extension.entry(ext).or_insert(0) += 1;
        report.total_bytes += fs::metadata(file).map(|m| m.len()).unwrap_or(0);
    }
    report
}

pub fn validate_workers(workers: usize) -> Result<usize> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
        return Err(CompressionError::InvalidWorkerCount(
            workers,
            MIN_WORKERS,
            MAX_WORKERS,
        ));
    }
    Ok(workers)
}

/// Estimates decoded memory for an image file without loading it.
fn estimate_image_memory_usage(file_path: &Path) -> f64 {
    let file_size_mib = fs::metadata(file_path)
        .map(|m| m.len() as f64 / MIB as f64)
        .unwrap_or(0.0);

    // Decoded RGB plus the flattened copy and one encode buffer.
    let multiplier = match InputFormat::from_path(file_path) {
        Some(InputFormat::Jpeg) => 10.0,
        Some(InputFormat::WebP) => 8.0,
        Some(InputFormat::Png) | Some(InputFormat::Gif) => 6.0,
        Some(InputFormat::Bmp) | Some(InputFormat::Tiff) => 2.5,
        None => 6.0,
    };

    file_size_mib * multiplier
}

fn available_memory_mib() -> u64 {
    let mut sys =
        System::new_with_specifics(RefreshKind::new().with_memory(MemoryRefreshKind::new()));
    sys.refresh_memory();
    sys.available_memory() / MIB
}

/// Cap the requested worker count by file count and available memory.
pub fn plan_parallelism(files: &[PathBuf], requested: usize) -> usize {
    let baseline = requested.clamp(MIN_WORKERS, MAX_WORKERS).min(files.len().max(1));
    if files.is_empty() {
        return baseline;
    }

    let largest_mib = files
        .iter()
        .map(|f| estimate_image_memory_usage(f))
        .fold(0.0_f64, f64::max)
        .ceil()
        .max(1.0) as u64;

    let available = available_memory_mib();
    if available == 0 {
        // Available memory is not reported on this host.
        return baseline;
    }

    let mem_cap = (available.saturating_sub(MIN_AVAILABLE_MEMORY_MIB) / largest_mib)
        .clamp(1, baseline as u64) as usize;
    if mem_cap < baseline {
        crate::warn!(
            "Limiting to {} workers: ~{} MiB per image, {} MiB available",
            mem_cap,
            largest_mib,
            available
        );
    }
    mem_cap
}

/// Live counters shared between workers and the front-end.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicUsize,
    completed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    bytes_before: AtomicU64,
    bytes_after: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        let progress = Self::default();
        progress.total.store(total, Ordering::Relaxed);
        progress
    }

    /// Record one result; returns the completed count including it.
    pub fn record(&self, result: &CompressionResult) -> usize {
        if result.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
            self.bytes_before
                .fetch_add(result.original_size, Ordering::Relaxed);
            self.bytes_after.fetch_add(result.final_size, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Acquire),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_before: self.bytes_before.load(Ordering::Relaxed),
            bytes_after: self.bytes_after.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
        workers: usize,
    },
    FileStarted {
        index: usize,
        path: PathBuf,
    },
    FileFinished {
        index: usize,
        result: CompressionResult,
        completed: usize,
        total: usize,
    },
    Finished(BatchSummary),
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// One result per processed job, in job order
    pub results: Vec<CompressionResult>,
    pub total_jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.results.len() as f64 / secs
        } else {
            0.0
        }
    }

    /// Files that never reached a worker because the batch was cancelled.
    pub fn skipped(&self) -> usize {
        self.total_jobs - self.results.len()
    }
}

/// A batch running on a background thread.
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
    cancel: Arc<AtomicBool>,
    progress: Arc<Progress>,
    thread: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Stop handing out new files; files already being compressed finish.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// The flag behind [`BatchHandle::cancel`], for callers that cancel from
    /// another thread such as an interrupt handler.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn join(self) -> Result<BatchSummary> {
        self.thread
            .join()
            .map_err(|_| CompressionError::ThreadPool("batch thread panicked".to_string()))
    }
}

/// Start compressing `jobs` with `workers` threads in the background.
pub fn spawn_batch(jobs: Vec<Job>, workers: usize) -> Result<BatchHandle> {
    let pool = WorkerPool::new(validate_workers(workers)?)?;
    let (event_tx, event_rx) = unbounded();
    let cancel = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(Progress::new(jobs.len()));

    let thread = {
        let cancel = Arc::clone(&cancel);
        let progress = Arc::clone(&progress);
        thread::Builder::new()
            .name("img-fit-batch".to_string())
            .spawn(move || execute(pool, jobs, &cancel, &progress, &event_tx))?
    };

    Ok(BatchHandle {
        events: event_rx,
        cancel,
        progress,
        thread,
    })
}

/// Run a batch on the calling thread, forwarding events to `on_event`.
pub fn run_batch<F>(jobs: Vec<Job>, workers: usize, mut on_event: F) -> Result<BatchSummary>
where
    F: FnMut(&BatchEvent),
{
    let handle = spawn_batch(jobs, workers)?;
    for event in handle.events().iter() {
        on_event(&event);
    }
    handle.join()
}

fn execute(
    pool: WorkerPool,
    jobs: Vec<Job>,
    cancel: &AtomicBool,
    progress: &Progress,
    events: &Sender<BatchEvent>,
) -> BatchSummary {
    let start = Instant::now();
    let total = jobs.len();
    // A dropped receiver only means nobody is watching.
    let _ = events.send(BatchEvent::Started {
        total,
        workers: pool.workers(),
    });

    let results = std::sync::Mutex::new(Vec::with_capacity(total));
    pool.run(
        jobs,
        cancel,
        |job| {
            let _ = events.send(BatchEvent::FileStarted {
                index: job.index,
                path: job.source.clone(),
            });
            panic::catch_unwind(AssertUnwindSafe(|| process_job(&job))).unwrap_or_else(|_| {
                CompressionResult::failed(&job, "worker panicked while processing")
            })
        },
        |result| {
            let completed = progress.record(&result);
            let _ = events.send(BatchEvent::FileFinished {
                index: result.index,
                result: result.clone(),
                completed,
                total,
            });
            if let Ok(mut results) = results.lock() {
                results.push(result);
            }
        },
    );

    let mut results = results.into_inner().unwrap_or_else(|e| e.into_inner());
    results.sort_by_key(|r| r.index);
    let snapshot = progress.snapshot();

    let summary = BatchSummary {
        results,
        total_jobs: total,
        succeeded: snapshot.succeeded,
        failed: snapshot.failed,
        bytes_before: snapshot.bytes_before,
        bytes_after: snapshot.bytes_after,
        elapsed: start.elapsed(),
        cancelled: cancel.load(Ordering::Relaxed),
    };
    let _ = events.send(BatchEvent::Finished(summary.clone()));
    summary
}
