pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * 1024;

pub const DEFAULT_TARGET_SIZE: u64 = 100 * KIB;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;
pub const DEFAULT_MIN_QUALITY: u8 = 10;
pub const DEFAULT_MAX_QUALITY: u8 = 95;

/// Results up to `target * (1 + TOLERANCE)` count as on target.
pub const TOLERANCE: f64 = 0.05;
pub const MAX_SEARCH_ITERATIONS: u32 = 8;

pub const RESIZE_STEP: f64 = 0.9;
pub const MIN_DIMENSION: u32 = 50;
pub const MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_DIMENSION: u32 = 1080;

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 16;
pub const DEFAULT_WORKER_CAP: usize = 8;
/// Bounded queue depth per worker.
pub const QUEUE_DEPTH_PER_WORKER: usize = 2;

pub const MAX_FILE_SIZE: u64 = 100 * MIB;
pub const MAX_IMAGE_DIMENSION: u32 = 20_000;

/// Memory kept free when sizing the pool.
pub const MIN_AVAILABLE_MEMORY_MIB: u64 = 256;

pub const BACKUP_SUFFIX: &str = "bak";
pub const OUTPUT_EXTENSION: &str = "jpg";
pub const TEMP_FILE_PREFIX: &str = ".img-fit-";

pub const REPLACE_ATTEMPTS: u32 = 5;
pub const REPLACE_RETRY_DELAY_MS: u64 = 200;
pub const REMOVE_ATTEMPTS: u32 = 3;
pub const REMOVE_RETRY_DELAY_MS: u64 = 100;

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "webp", "bmp", "gif", "tiff", "tif"];

/// Default worker count: one core left for the front-end, capped.
pub fn default_workers() -> usize {
    num_cpus::get()
        .saturating_sub(1)
        .clamp(MIN_WORKERS, DEFAULT_WORKER_CAP)
}
