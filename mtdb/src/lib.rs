//! Offline analysis of multi-tier cache benchmark dumps: parse each run,
//! collapse repeated iterations, and measure what a second cache tier changes
//! against the single-tier baseline.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub mod aggregate;
pub mod compare;
pub mod config;
pub mod corpus;
pub mod correlation;
pub mod error;
pub mod key;
pub mod metrics;
pub mod output;
pub mod report;
pub mod series;
pub mod unit;

#[cfg(test)]
mod test_util;

pub use aggregate::{EvalPolicy, RepresentativeRecord, RunAggregator};
pub use compare::{DiffRecord, OptimalityCounts, Outcome, TierComparison, TierComparisonEngine};
pub use config::{AnalysisConfig, ConfigArgs};
pub use corpus::{Corpus, CorpusSummary};
pub use error::{ConfigError, LoadError, ParseError, ReportError};
pub use key::{ConfigurationKey, FileName};
pub use output::{OutputParser, OutputRecord};
pub use unit::DirectoryUnit;

fn init_logger_with(default: LevelFilter) {
    tracing_subscriber::fmt::SubscriberBuilder::default()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default.into())
                .from_env_lossy(),
        )
        .init();
}

/// `RUST_LOG` overrides the default `info` level.
pub fn init_logger() {
    init_logger_with(LevelFilter::INFO);
}

pub fn init_logger_debug() {
    init_logger_with(LevelFilter::DEBUG);
}
