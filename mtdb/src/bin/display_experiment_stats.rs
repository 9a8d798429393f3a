use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mtdb::{init_logger, metrics::DEFAULT_HMR_PAGE_SIZE, series, OutputRecord};

/// Print the headline numbers of one dump file.
#[derive(Parser)]
struct Cli {
    path: PathBuf,
    /// also print the per-window bandwidth from the stat snapshots
    #[arg(long)]
    windows: bool,
    #[arg(long, default_value_t = DEFAULT_HMR_PAGE_SIZE)]
    hmr_page_size: u64,
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let record = OutputRecord::from_path_with(&cli.path, cli.hmr_page_size)?;
    println!("{}", record);
    println!(
        "complete={} iteration={:?} tier2Warmup={:?} t2HitCount={:?} hmrc1={:?}",
        record.is_complete(),
        record.iteration(),
        record.tier2_warmup(),
        record.t2_hit_count(),
        record.hmrc1()
    );
    if cli.windows {
        for window in series::windows(&record) {
            println!(
                "T={} len={}s bandwidth={:.2} t2HitRate={:?}",
                window.ts, window.len, window.bandwidth, window.t2_hit_rate
            );
        }
    }
    Ok(())
}
