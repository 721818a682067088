// Run with: cargo run --example debug_size -- /path/to/measure [workers]
// Prints heartbeats and flags stretches where no new directory completes.

use dirsize_core::{CancellationToken, LocalConfig, LocalDirectory, Sizer, SizerConfig};
use std::path::PathBuf;
use std::time::Duration;

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let workers = std::env::args()
        .nth(2)
        .and_then(|w| w.parse().ok())
        .unwrap_or(0);

    println!("Measuring: {:?}", path);

    let root = match LocalDirectory::open(&path, LocalConfig::default()) {
        Ok(root) => root,
        Err(e) => {
            println!("ERROR: {}", e);
            return;
        }
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let sizer = Sizer::new(SizerConfig {
        num_workers: workers,
        progress_interval: Duration::from_millis(250),
    })
    .with_progress(tx);

    let printer = std::thread::spawn(move || {
        let mut last_dirs = 0u64;
        let mut stuck_count = 0;
        for p in rx {
            if p.dirs_done == last_dirs {
                stuck_count += 1;
            } else {
                stuck_count = 0;
            }
            last_dirs = p.dirs_done;

            println!(
                "[{:>6.1}s] entries={:<8} files={:<8} dirs={:<8} bytes={:<12} pending={:<6} busy={:<3} stuck={}",
                p.elapsed.as_secs_f64(),
                p.total_entries(),
                p.files,
                p.dirs_done,
                p.bytes,
                p.pending,
                p.busy_workers,
                stuck_count,
            );
        }
    });

    let report = sizer.size_with_report(&CancellationToken::new(), Box::new(root));
    drop(sizer);
    let _ = printer.join();

    match report {
        Ok(report) => {
            println!(
                "\nFinal: {} in {} files, {:.2}s",
                dirsize_core::format_size(report.result.size),
                dirsize_core::format_count(report.result.count),
                report.elapsed.as_secs_f64()
            );
            for (id, stats) in report.workers.iter().enumerate() {
                println!(
                    "  worker {:>2}: dirs={:<8} files={:<8} bytes={}",
                    id, stats.dirs_processed, stats.files_statted, stats.bytes_statted
                );
            }
        }
        Err(e) => println!("\nERROR: {}", e),
    }
}
