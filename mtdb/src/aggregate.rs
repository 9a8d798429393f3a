//! Collapses repeated runs of the same configuration into one row.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::AnalysisConfig, error::LoadError, key::ConfigurationKey, metrics, output::OutputRecord,
};

/// How a group of iterations is reduced to one representative row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EvalPolicy {
    /// arithmetic mean of every numeric column
    #[display(fmt = "mean")]
    Mean,
    /// the iteration with the highest bandwidth
    #[display(fmt = "best")]
    Best,
}

impl EvalPolicy {
    /// `members` must share `key` and must not be empty.
    pub fn reduce(&self, key: ConfigurationKey, members: &[&OutputRecord]) -> Option<RepresentativeRecord> {
        let first = members.first()?;
        let columns = match self {
            EvalPolicy::Mean => mean_columns(members),
            EvalPolicy::Best => best_member(members)?.row(),
        };
        Some(RepresentativeRecord {
            key,
            iterations: members.len(),
            tag: first.config().tag.clone(),
            columns,
        })
    }
}

/// Mean per column over the members that report it.
fn mean_columns(members: &[&OutputRecord]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for member in members {
        for (name, value) in member.row() {
            let entry = sums.entry(name).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect()
}

/// The first member with the maximum bandwidth; members without a finite
/// bandwidth lose to every member with one.
fn best_member<'a>(members: &[&'a OutputRecord]) -> Option<&'a OutputRecord> {
    members.iter().copied().fold(None, |best, member| match best {
        None => Some(member),
        Some(best) => {
            let bandwidth = |r: &OutputRecord| {
                r.metric(metrics::BANDWIDTH)
                    .filter(|b| b.is_finite())
                    .unwrap_or(f64::NEG_INFINITY)
            };
            if bandwidth(member).total_cmp(&bandwidth(best)).is_gt() {
                Some(member)
            } else {
                Some(best)
            }
        }
    })
}

/// One row per unique configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeRecord {
    pub key: ConfigurationKey,
    /// number of complete runs behind this row
    pub iterations: usize,
    pub tag: Option<String>,
    pub columns: BTreeMap<String, f64>,
}

impl RepresentativeRecord {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.columns.get(name).copied()
    }
}

/// What happened to the files of one directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    pub files: usize,
    pub unparsable: usize,
    pub incomplete: usize,
    pub groups: usize,
    pub dropped_groups: usize,
}

/// Owns the records of one directory and their representative rows.
#[derive(Debug, Clone)]
pub struct RunAggregator {
    dir: PathBuf,
    records: Vec<OutputRecord>,
    representatives: Vec<RepresentativeRecord>,
    stats: LoadStats,
}

impl RunAggregator {
    /// Parses every file directly inside `dir`. Files that fail to parse are
    /// skipped, the directory may hold anything besides dumps.
    pub fn load(dir: &Path, config: &AnalysisConfig) -> Result<Self, LoadError> {
        let read_dir_err = |source| LoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = fs::read_dir(dir)
            .map_err(read_dir_err)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_dir_err)?;
        paths.retain(|path| path.is_file());
        paths.sort();

        let mut unparsable = 0;
        let records = paths
            .iter()
            .filter_map(|path| match OutputRecord::from_path_with(path, config.hmr_page_size) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("skipping {}: {}", path.display(), e);
                    unparsable += 1;
                    None
                }
            })
            .collect_vec();

        let mut aggregator = Self::from_records(dir, records, config);
        aggregator.stats.files = paths.len();
        aggregator.stats.unparsable = unparsable;
        info!(
            "{}: {} files, {} unparsable, {} incomplete, {} configurations kept, {} dropped",
            dir.display(),
            aggregator.stats.files,
            aggregator.stats.unparsable,
            aggregator.stats.incomplete,
            aggregator.representatives.len(),
            aggregator.stats.dropped_groups,
        );
        Ok(aggregator)
    }

    pub fn from_records(dir: impl Into<PathBuf>, records: Vec<OutputRecord>, config: &AnalysisConfig) -> Self {
        let mut stats = LoadStats {
            files: records.len(),
            ..Default::default()
        };
        let mut groups: BTreeMap<ConfigurationKey, Vec<&OutputRecord>> = BTreeMap::new();
        for record in &records {
            if record.is_complete() {
                groups.entry(record.key()).or_default().push(record);
            } else {
                debug!("{} is incomplete", record.path().display());
                stats.incomplete += 1;
            }
        }
        stats.groups = groups.len();

        let representatives = groups
            .into_iter()
            .filter_map(|(key, mut members)| {
                if members.len() < config.min_iterations {
                    debug!(
                        "dropping {}: {} of {} iterations",
                        key,
                        members.len(),
                        config.min_iterations
                    );
                    stats.dropped_groups += 1;
                    return None;
                }
                members.sort_by(|a, b| (a.iteration(), a.path()).cmp(&(b.iteration(), b.path())));
                config.eval.reduce(key, &members)
            })
            .collect_vec();

        Self {
            dir: dir.into(),
            records,
            representatives,
            stats,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn representatives(&self) -> &[RepresentativeRecord] {
        &self.representatives
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_util::{mt_key, st_key, DumpBuilder};

    fn config(eval: EvalPolicy) -> AnalysisConfig {
        AnalysisConfig {
            eval,
            ..Default::default()
        }
    }

    #[test]
    fn test_mean_policy() {
        let dir = tempfile::tempdir().unwrap();
        for (i, bandwidth) in [1e6, 2e6, 3e6].into_iter().enumerate() {
            DumpBuilder::new(st_key())
                .metric(metrics::BANDWIDTH, bandwidth)
                .write(dir.path(), i as u32);
        }
        let aggregator = RunAggregator::load(dir.path(), &config(EvalPolicy::Mean)).unwrap();
        let reps = aggregator.representatives();
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].key, st_key());
        assert_eq!(reps[0].iterations, 3);
        assert_eq!(reps[0].metric(metrics::BANDWIDTH), Some(2e6));
        assert_eq!(reps[0].metric(metrics::CACHE_SIZE_MB), Some(800.0));
        assert_eq!(reps[0].tag.as_deref(), Some("w82"));
    }

    #[test]
    fn test_mean_skips_absent_values() {
        let dir = tempfile::tempdir().unwrap();
        DumpBuilder::new(st_key()).metric("extra", 4.0).write(dir.path(), 0);
        DumpBuilder::new(st_key()).metric("extra", 8.0).write(dir.path(), 1);
        DumpBuilder::new(st_key()).write(dir.path(), 2);
        let aggregator = RunAggregator::load(dir.path(), &config(EvalPolicy::Mean)).unwrap();
        assert_eq!(aggregator.representatives()[0].metric("extra"), Some(6.0));
    }

    #[test]
    fn test_best_policy() {
        let dir = tempfile::tempdir().unwrap();
        for (i, (bandwidth, latency)) in [(1e6, 10.0), (3e6, 30.0), (3e6, 99.0), (2e6, 20.0)]
            .into_iter()
            .enumerate()
        {
            DumpBuilder::new(st_key())
                .metric(metrics::BANDWIDTH, bandwidth)
                .metric(metrics::BLOCK_READ_SLAT_AVG, latency)
                .write(dir.path(), i as u32);
        }
        let aggregator = RunAggregator::load(dir.path(), &config(EvalPolicy::Best)).unwrap();
        let rep = &aggregator.representatives()[0];
        assert_eq!(rep.iterations, 4);
        assert_eq!(rep.metric(metrics::BANDWIDTH), Some(3e6));
        // ties go to the earliest iteration
        assert_eq!(rep.metric(metrics::BLOCK_READ_SLAT_AVG), Some(30.0));
    }

    #[test]
    fn test_best_policy_skips_non_finite_bandwidth() {
        let dir = tempfile::tempdir().unwrap();
        let runs = [(1e6, 10.0), (f64::NAN, 30.0), (f64::INFINITY, 40.0), (2e6, 20.0)];
        for (i, (bandwidth, latency)) in runs.into_iter().enumerate() {
            DumpBuilder::new(st_key())
                .metric(metrics::BANDWIDTH, bandwidth)
                .metric(metrics::BLOCK_READ_SLAT_AVG, latency)
                .write(dir.path(), i as u32);
        }
        let aggregator = RunAggregator::load(dir.path(), &config(EvalPolicy::Best)).unwrap();
        let rep = &aggregator.representatives()[0];
        assert_eq!(rep.iterations, 4);
        assert_eq!(rep.metric(metrics::BANDWIDTH), Some(2e6));
        assert_eq!(rep.metric(metrics::BLOCK_READ_SLAT_AVG), Some(20.0));
    }

    #[test]
    fn test_min_iterations() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            DumpBuilder::new(st_key()).write(dir.path(), i);
        }
        for i in 0..2 {
            DumpBuilder::new(mt_key(1600)).write(dir.path(), i);
        }
        let aggregator = RunAggregator::load(dir.path(), &AnalysisConfig::default()).unwrap();
        let keys = aggregator.representatives().iter().map(|r| r.key).collect_vec();
        assert_eq!(keys, vec![st_key()]);
        assert_eq!(aggregator.stats().dropped_groups, 1);
        assert!(aggregator
            .representatives()
            .iter()
            .all(|r| r.iterations >= AnalysisConfig::default().min_iterations));

        let relaxed = AnalysisConfig {
            min_iterations: 2,
            ..Default::default()
        };
        let aggregator = RunAggregator::load(dir.path(), &relaxed).unwrap();
        assert_eq!(aggregator.representatives().len(), 2);
    }

    #[test]
    fn test_skips_junk_and_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            DumpBuilder::new(st_key()).write(dir.path(), i);
        }
        // incomplete run would make the group reach the threshold on its own
        for i in 0..3 {
            DumpBuilder::new(mt_key(1600))
                .without(metrics::BANDWIDTH)
                .write(dir.path(), i);
        }
        fs::write(dir.path().join("notes.txt"), "just some notes\n").unwrap();
        fs::write(dir.path().join("bad_metric"), "bandwidth_byte/s=fast\n").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let aggregator = RunAggregator::load(dir.path(), &AnalysisConfig::default()).unwrap();
        let stats = aggregator.stats();
        assert_eq!(stats.files, 8);
        assert_eq!(stats.unparsable, 2);
        assert_eq!(stats.incomplete, 3);
        assert_eq!(aggregator.records().len(), 6);
        assert_eq!(aggregator.representatives().len(), 1);
    }

    #[test]
    fn test_missing_dir() {
        let err = RunAggregator::load(Path::new("/definitely/not/here"), &AnalysisConfig::default());
        assert!(matches!(err, Err(LoadError::ReadDir { .. })));
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(EvalPolicy::Mean.to_string(), "mean");
        assert_eq!(EvalPolicy::Best.to_string(), "best");
        assert_eq!(serde_json::to_string(&EvalPolicy::Best).unwrap(), "\"best\"");
    }
}
