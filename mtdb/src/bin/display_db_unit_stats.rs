use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use mtdb::{init_logger, metrics, report, ConfigArgs, DirectoryUnit};

/// Print how many ST and MT configurations one {machine}/{workload}
/// directory holds and how many MT configurations lowered block latency.
#[derive(Parser)]
struct Cli {
    path: PathBuf,
    /// write the representative rows of the directory to this csv
    #[arg(long)]
    csv: Option<PathBuf>,
    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let config = cli.config.resolve()?;
    let unit = DirectoryUnit::load_from_path(&cli.path, &config)?;

    println!("\nDBUnit={}", unit.path().display());
    println!("----------------------------------\n");
    for (workload, summary) in unit.summaries() {
        let improved = |name: &str| {
            let split = summary.latency_improved.get(name).copied().unwrap_or_default();
            (split.pyramidal, split.non_pyramidal)
        };
        println!("Key={}", workload);
        println!(
            "configCount(ST/MT-P/MT-NP)={}/{}/{}",
            summary.st_count, summary.mt_count.pyramidal, summary.mt_count.non_pyramidal
        );
        println!(
            "tier1Sizes={} soloST={} soloMT={}",
            summary.unique_t1_sizes, summary.solo_st, summary.solo_mt
        );
        let (p, np) = improved(metrics::BLOCK_READ_SLAT_AVG);
        println!("blockReadsLatAvgOPT(MT-P/MT-NP)={}/{}", p, np);
        let (p, np) = improved(metrics::BLOCK_WRITE_SLAT_AVG);
        println!("blockWritesLatAvgOPT(MT-P/MT-NP)={}/{}", p, np);
        println!();
    }
    let counts = unit.counts();
    println!(
        "mt optimal {}, non-pyramidal mt optimal {}, st optimal {}",
        counts.mt_optimal, counts.non_pyramidal_mt_optimal, counts.st_optimal
    );

    if let Some(path) = cli.csv {
        let file = File::create(&path).with_context(|| format!("creating {:?}", path))?;
        report::write_representatives_csv(BufWriter::new(file), unit.representatives())?;
    }
    Ok(())
}
