use std::path::PathBuf;

use clap::{CommandFactory, Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use picmeta_core::{ExifToolMode, Mode, ProcessResult, ReorganizeOptions};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExifTool {
    Auto,
    Native,
    Docker,
    Off,
}

impl From<ExifTool> for ExifToolMode {
    fn from(value: ExifTool) -> Self {
        match value {
            ExifTool::Auto => ExifToolMode::Auto,
            ExifTool::Native => ExifToolMode::Native,
            ExifTool::Docker => ExifToolMode::Docker,
            ExifTool::Off => ExifToolMode::Off,
        }
    }
}

#[derive(Parser)]
#[command(name = "picmeta", version, about = "Reorganize photos and videos into a dated YYYY/YYYY-MM layout")]
struct Cli {
    /// Source directory (local, or on --ssh-host)
    #[arg(long)]
    source: Option<String>,

    /// Destination directory
    #[arg(long)]
    dest: Option<String>,

    /// Show what would happen without copying or modifying anything
    #[arg(long)]
    dry_run: bool,

    /// Read the source over ssh from this host ([user@]host[:port])
    #[arg(long)]
    ssh_host: Option<String>,

    /// Destination host, when different from --ssh-host
    #[arg(long)]
    dest_ssh_host: Option<String>,

    /// Write the destination on the remote host
    #[arg(long)]
    remote_dest: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Skip files whose destination already exists
    #[arg(long)]
    skip_existing: bool,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Only scan this subdirectory of --source
    #[arg(long)]
    test_dir: Option<String>,

    /// Only rewrite timestamps of files already at the destination
    #[arg(long)]
    fix_metadata: bool,

    /// How to find exiftool
    #[arg(long, value_enum, default_value = "auto")]
    exiftool: ExifTool,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_stats(result: &ProcessResult) {
    let stats = &result.stats;
    println!();
    println!("=== Processing Statistics ===");
    println!("Total files found:      {}", stats.total);
    println!("Successfully processed: {}", stats.processed);
    println!("Skipped:                {}", stats.skipped);
    println!("Errors:                 {}", stats.errored);
    println!("Files transferred:      {}", stats.transferred);
    println!("Metadata updated:       {}", stats.metadata_updated);
    println!("Metadata failed:        {}", stats.metadata_failed);
    println!(
        "Timestamps:             {} ({} from EXIF, {} sequential)",
        result.preallocated, result.authoritative, result.synthetic
    );
    println!("Elapsed:                {:.2}s", result.elapsed_secs);
}

/// Progress callback that moves `pb` to the reported stage and position.
fn drive_bar(pb: &ProgressBar) -> impl Fn(&str, u64, u64, &str) + Send + Sync + '_ {
    move |stage, current, total, message| {
        if pb.prefix() != stage {
            pb.set_prefix(stage.to_string());
        }
        pb.set_length(total);
        pb.set_position(current);
        pb.set_message(message.to_string());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (Some(source), Some(dest)) = (cli.source, cli.dest) else {
        eprintln!("error: --source and --dest are required\n");
        let _ = Cli::command().print_help();
        std::process::exit(1);
    };

    setup_logging(cli.verbose);

    let options = ReorganizeOptions {
        source,
        dest,
        dry_run: cli.dry_run,
        ssh_host: cli.ssh_host,
        dest_ssh_host: cli.dest_ssh_host,
        remote_dest: cli.remote_dest,
        skip_existing: cli.skip_existing,
        workers: cli.workers,
        test_dir: cli.test_dir,
        mode: if cli.fix_metadata {
            Mode::FixMetadata
        } else {
            Mode::Copy
        },
        exiftool: cli.exiftool.into(),
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:>8} [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let result = picmeta_core::process(&options, &drive_bar(&pb));
    pb.finish_and_clear();
    let result = result?;

    print_stats(&result);

    if let Some(path) = &cli.report {
        std::fs::write(path, serde_json::to_string_pretty(&result)?)?;
        log::info!("Report written to {}", path.display());
    }

    println!("\nPhoto reorganization complete!");
    Ok(())
}
