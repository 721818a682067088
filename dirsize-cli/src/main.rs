mod output;

use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crossbeam_channel::Receiver;
use dirsize_core::{
    CancellationToken, LocalConfig, LocalDirectory, SizeMode, SizeProgress, Sizer, SizerConfig,
    Units,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use output::{OutputFormat, print_progress, print_report};

/// dirsize - total size and file count of a directory tree, computed in parallel
#[derive(Parser, Debug)]
#[command(name = "dirsize")]
#[command(about = "Total size and file count of a directory tree, computed in parallel")]
#[command(version)]
struct Args {
    /// Path to measure (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Number of worker threads (0 = one per CPU)
    #[arg(short = 'j', long, default_value_t = 0)]
    workers: usize,

    /// Give up after this many seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Count file lengths instead of allocated blocks
    #[arg(long)]
    apparent_size: bool,

    /// Count the size of symlink targets instead of the links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Cross filesystem boundaries
    #[arg(short = 'x', long)]
    cross_filesystems: bool,

    /// Use powers of 1000 instead of 1024
    #[arg(long)]
    si: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Show a progress line on stderr
    #[arg(short, long)]
    progress: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.verbose);

    let local_config = LocalConfig {
        follow_symlinks: args.follow_symlinks,
        same_filesystem: !args.cross_filesystems,
        size_mode: if args.apparent_size {
            SizeMode::Apparent
        } else {
            SizeMode::DiskUsage
        },
    };
    let root = LocalDirectory::open(&args.path, local_config)
        .wrap_err_with(|| format!("Cannot measure {}", args.path.display()))?;
    let root_path = root.path().to_path_buf();

    let ctx = match args.timeout {
        Some(secs) => {
            let timeout = Duration::try_from_secs_f64(secs).wrap_err("Invalid --timeout")?;
            CancellationToken::with_timeout(timeout)
        }
        None => CancellationToken::new(),
    };

    let interrupt = ctx.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, stopping...");
        interrupt.cancel();
    })
    .wrap_err("Failed to set signal handler")?;

    let mut sizer = Sizer::new(SizerConfig::with_workers(args.workers));
    debug!(
        workers = sizer.config().worker_count(),
        path = %root_path.display(),
        "Configured"
    );

    let units = if args.si { Units::Decimal } else { Units::Binary };
    let mut progress_thread = None;
    if args.progress {
        let (tx, rx) = crossbeam_channel::bounded(1);
        sizer = sizer.with_progress(tx);
        progress_thread = Some(spawn_progress_printer(rx, units));
    }

    let report = sizer.size_with_report(&ctx, Box::new(root));

    // Dropping the sizer closes the progress channel and ends the printer
    drop(sizer);
    if let Some(handle) = progress_thread {
        let _ = handle.join();
    }

    let report = report.wrap_err_with(|| format!("Failed to measure {}", root_path.display()))?;
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    print_report(&root_path, &report, format, units)?;

    Ok(())
}

fn spawn_progress_printer(rx: Receiver<SizeProgress>, units: Units) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut printed = false;
        for progress in rx {
            print_progress(&progress, units);
            printed = true;
        }
        if printed {
            eprintln!();
        }
    })
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("dirsize_core=debug,dirsize=debug,warn")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(verbose)
        .init();
}
