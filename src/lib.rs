pub mod logger;

pub mod batch;
pub mod cli;
pub mod constants;
pub mod error;
pub mod formats;
pub mod info;
pub mod job;
pub mod output;
pub mod pool;
pub mod processing;
pub mod report;
pub mod search;

pub use batch::{
    collect_image_files, plan_parallelism, run_batch, scan_report, spawn_batch, BatchEvent,
    BatchHandle, BatchSummary, ScanReport,
};
pub use error::{CompressionError, Result};
pub use formats::{is_image_file, InputFormat};
pub use info::{inspect_image, print_image_info, ImageInfo};
pub use job::{plan_jobs, CompressionResult, Job, Outcome, WriteMode};
pub use pool::WorkerPool;
pub use processing::{compress_to_target, encode_jpeg, process_job, CompressionOptions};
pub use report::{calculate_compression_ratio, format_file_size, parse_size};
pub use search::{search_quality, SearchOutcome, SearchParams};
