use crate::report::parse_size;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "img-fit",
    about = "Compress batches of images to JPEGs under a target file size",
    long_about = "img-fit re-encodes images as JPEG, searching for the highest quality whose \
                  output fits a target size and shrinking the image when no quality fits. \
                  Files are processed in parallel on a bounded worker pool.",
    version,
    after_help = "EXAMPLES:\n  \
    img-fit compress ./photos -s 200k\n  \
    img-fit compress \"./scans/*.png\" -o ./web -d 1600 -j 4\n  \
    img-fit scan ./photos\n  \
    img-fit info photo.png -s 150k"
)]
pub struct Args {
    #[arg(short, long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "quiet",
        help = "Print per-file details"
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct InputArgs {
    #[arg(
        required = true,
        help = "Image files, directories, or glob patterns",
        long_help = "Each input can be a file, a directory, or a glob expression. \
                     Examples: './images', '*.jpg', '/path/to/images/*.png'"
    )]
    pub inputs: Vec<String>,

    #[arg(long, help = "Do not descend into subdirectories")]
    pub no_recurse: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Compress images to a target size",
        long_about = "Compress every image found in the inputs to a JPEG no larger than the \
                      target size (within 5%). Without --output-dir files are replaced in \
                      place; non-JPEG sources are replaced by a .jpg next to them."
    )]
    Compress {
        #[command(flatten)]
        input: InputArgs,

        #[arg(
            short = 'o',
            long,
            help = "Write results into this directory instead of in place"
        )]
        output_dir: Option<PathBuf>,

        #[arg(
            short = 's',
            long,
            value_parser = parse_size,
            help = "Target size, e.g. 100k, 1.5M, 2048b (default: 100k)",
            long_help = "Target file size. Accepts b, k and M units; a bare number is KiB."
        )]
        target_size: Option<u64>,

        #[arg(long, help = "Lowest JPEG quality to try (1-100, default: 10)")]
        min_quality: Option<u8>,

        #[arg(long, help = "Highest JPEG quality to try (1-100, default: 95)")]
        max_quality: Option<u8>,

        #[arg(
            short = 'd',
            long,
            help = "Longest edge in pixels before compressing (default: 1080, 0 disables)"
        )]
        max_dimension: Option<u32>,

        #[arg(long, help = "Never shrink images below --max-dimension to reach the target")]
        no_auto_resize: bool,

        #[arg(
            short = 'b',
            long,
            help = "Keep a .bak copy of each replaced original"
        )]
        backup: bool,

        #[arg(
            short = 'j',
            long,
            help = "Number of worker threads (1-16, default: CPUs - 1, at most 8)"
        )]
        threads: Option<usize>,
    },

    #[command(about = "List the images that compress would process")]
    Scan {
        #[command(flatten)]
        input: InputArgs,
    },

    #[command(
        about = "Display image information",
        long_about = "Show dimensions, color type, format and file size, and whether the \
                      file already fits the target."
    )]
    Info {
        #[arg(help = "Image file path to analyze")]
        input: PathBuf,

        #[arg(short = 's', long, value_parser = parse_size, help = "Target size (default: 100k)")]
        target_size: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parses_compress_flags() {
        let args = Args::try_parse_from([
            "img-fit", "compress", "a.png", "dir", "-s", "1.5M", "-j", "3", "-b", "-o", "out",
            "--no-recurse",
        ])
        .unwrap();
        match args.command {
            Commands::Compress {
                input,
                target_size,
                threads,
                backup,
                output_dir,
                ..
            } => {
                assert_eq!(input.inputs, vec!["a.png", "dir"]);
                assert!(input.no_recurse);
                assert_eq!(target_size, Some(1536 * 1024));
                assert_eq!(threads, Some(3));
                assert!(backup);
                assert_eq!(output_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_size() {
        assert!(Args::try_parse_from(["img-fit", "compress", "a.png", "-s", "lots"]).is_err());
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        assert!(Args::try_parse_from(["img-fit", "-q", "-v", "scan", "."]).is_err());
    }
}
