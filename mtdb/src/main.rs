use std::{
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use mtdb::{
    correlation::{CorrelationTable, Grouping},
    init_logger, report, ConfigArgs, Corpus,
};
use tracing::info;

/// Compare every multi-tier configuration of a corpus against its
/// single-tier baseline.
#[derive(Parser)]
struct Cli {
    /// corpus root, laid out as {machine}/{workload}/{dumps}
    path: PathBuf,
    /// directory for diffs.csv, summary.json and correlation.csv
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// groupings for the correlation table, all of them when empty
    #[arg(long, value_enum)]
    grouping: Vec<Grouping>,
    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let config = cli.config.resolve()?;
    info!("loading corpus {:?} with {:?}", cli.path, config);
    let corpus = Corpus::load(&cli.path, &config)?;

    for unit in corpus.units() {
        let counts = unit.counts();
        println!(
            "{}/{}: mt optimal {}, non-pyramidal mt optimal {}, st optimal {}",
            unit.machine_id(),
            unit.workload_id(),
            counts.mt_optimal,
            counts.non_pyramidal_mt_optimal,
            counts.st_optimal
        );
    }
    let counts = corpus.counts();
    println!(
        "total: mt optimal {}, non-pyramidal mt optimal {}, st optimal {}",
        counts.mt_optimal, counts.non_pyramidal_mt_optimal, counts.st_optimal
    );

    let Some(output) = cli.output else {
        return Ok(());
    };
    fs::create_dir_all(&output).with_context(|| format!("creating {:?}", output))?;
    let create = |name: &str| {
        let path = output.join(name);
        File::create(&path)
            .map(BufWriter::new)
            .with_context(|| format!("creating {:?}", path))
    };

    report::write_diffs_csv(create("diffs.csv")?, corpus.diff_records())?;
    report::write_json(create("summary.json")?, &corpus.summary())?;

    let groupings = if cli.grouping.is_empty() {
        Grouping::ALL.to_vec()
    } else {
        cli.grouping
    };
    for grouping in groupings {
        let table = CorrelationTable::build(corpus.diff_records(), grouping);
        report::write_correlation_csv(create(&format!("correlation_{grouping}.csv"))?, &table)?;
    }
    info!("results written to {:?}", output);
    Ok(())
}
