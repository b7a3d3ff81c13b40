use clap::Parser;
use img_fit::batch::{
    collect_from_inputs, plan_parallelism, scan_report, spawn_batch, validate_workers, BatchEvent,
};
use img_fit::cli::{Args, Commands, InputArgs};
use img_fit::constants::{default_workers, DEFAULT_TARGET_SIZE};
use img_fit::error::{CompressionError, Result};
use img_fit::info::print_image_info;
use img_fit::job::{plan_jobs, WriteMode};
use img_fit::processing::CompressionOptions;
use img_fit::report::{
    create_progress_bar, format_result_line, print_results_table, print_scan_report, print_summary,
};
use img_fit::{error, info, logger, verbose, warn};
use indicatif::ProgressDrawTarget;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

fn main() -> ExitCode {
    let args = Args::parse();
    logger::set_quiet_mode(args.quiet);
    logger::set_verbose_mode(args.verbose);

    match run(args.command) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Compress {
            input,
            output_dir,
            target_size,
            min_quality,
            max_quality,
            max_dimension,
            no_auto_resize,
            backup,
            threads,
        } => {
            let mut options = CompressionOptions::new(target_size, min_quality, max_quality)?
                .with_auto_resize(!no_auto_resize)
                .with_backup(backup);
            if let Some(max_dimension) = max_dimension {
                options = options.with_max_dimension(Some(max_dimension));
            }
            let requested = match threads {
                Some(n) => validate_workers(n)?,
                None => default_workers(),
            };
            compress(&input, output_dir, options, requested)
        }
        Commands::Scan { input } => {
            let files = collect(&input)?;
            print_scan_report(&scan_report(&files));
            for file in &files {
                verbose!("{}", file.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info { input, target_size } => {
            print_image_info(&input, target_size.unwrap_or(DEFAULT_TARGET_SIZE))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn collect(input: &InputArgs) -> Result<Vec<PathBuf>> {
    collect_from_inputs(&input.inputs, !input.no_recurse)
}

fn compress(
    input: &InputArgs,
    output_dir: Option<PathBuf>,
    options: CompressionOptions,
    requested_workers: usize,
) -> Result<ExitCode> {
    let mode = match output_dir {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .map_err(|_| CompressionError::DirectoryCreationFailed(dir.clone()))?;
            let dir = fs::canonicalize(&dir)
                .map_err(|_| CompressionError::DirectoryCreationFailed(dir.clone()))?;
            WriteMode::OutputDir(dir)
        }
        None => WriteMode::InPlace,
    };

    let files = collect(input)?;
    if files.is_empty() {
        return Err(CompressionError::NoImageFilesFound(input.inputs.join(", ")));
    }
    print_scan_report(&scan_report(&files));

    let jobs = plan_jobs(&files, &options, &mode);
    let workers = plan_parallelism(&files, requested_workers);
    verbose!(
        "Target {} bytes, quality {}-{}, {} worker(s)",
        options.target_size,
        options.min_quality,
        options.max_quality,
        workers
    );

    let handle = spawn_batch(jobs, workers)?;
    let interrupted = handle.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || interrupted.store(true, Ordering::Relaxed)) {
        warn!("Ctrl-C will not cancel the batch: {}", e);
    }
    let bar = create_progress_bar(handle.progress().total as u64);
    if logger::is_quiet() {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }
    logger::attach_progress_bar(&bar);

    for event in handle.events().iter() {
        match event {
            BatchEvent::Started { total, workers } => {
                bar.set_length(total as u64);
                bar.set_message(format!("{} worker(s)", workers));
            }
            BatchEvent::FileStarted { path, .. } => {
                verbose!("Compressing {}", path.display());
            }
            BatchEvent::FileFinished {
                result, completed, ..
            } => {
                bar.set_position(completed as u64);
                if result.is_success() {
                    verbose!("{}", format_result_line(&result));
                } else {
                    error!("{}", format_result_line(&result));
                }
            }
            BatchEvent::Finished(_) => bar.set_message("done"),
        }
    }

    bar.finish_and_clear();
    logger::detach_progress_bar();
    let summary = handle.join()?;

    print_results_table(&summary.results);
    print_summary(&summary);

    if summary.cancelled {
        return Ok(ExitCode::FAILURE);
    }

    if summary.succeeded == 0 && summary.failed > 0 {
        info!("No file was compressed successfully");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
