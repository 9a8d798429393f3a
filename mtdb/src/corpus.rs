//! Every directory unit under a corpus root, laid out as
//! `root/{machine_id}/{workload_id}/{dumps}`.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    compare::{DiffRecord, OptimalityCounts},
    config::AnalysisConfig,
    error::LoadError,
    unit::{leaf_dirs, DirectoryUnit},
};

#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    units: Vec<DirectoryUnit>,
}

impl Corpus {
    /// Walks `root` once; each directory directly holding a file becomes one
    /// unit. Units are built in parallel and sorted by (machine, workload).
    pub fn load(root: &Path, config: &AnalysisConfig) -> Result<Self, LoadError> {
        let leaves = leaf_dirs(root)?;
        info!("{}: {} directories with files", root.display(), leaves.len());
        let units = leaves
            .par_iter()
            .map(|dir| DirectoryUnit::load_from_path(dir, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_units(root, units))
    }

    pub fn from_units(root: impl Into<PathBuf>, units: Vec<DirectoryUnit>) -> Self {
        let mut units = units
            .into_iter()
            .filter(|unit| {
                if unit.is_empty() {
                    debug!("dropping {}: no representative records", unit.path().display());
                }
                !unit.is_empty()
            })
            .collect::<Vec<_>>();
        units.sort_by(|a, b| {
            (a.machine_id(), a.workload_id(), a.path()).cmp(&(b.machine_id(), b.workload_id(), b.path()))
        });
        Self {
            root: root.into(),
            units,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn units(&self) -> &[DirectoryUnit] {
        &self.units
    }

    pub fn find(&self, machine_id: &str, workload_id: &str) -> Option<&DirectoryUnit> {
        self.units
            .iter()
            .find(|unit| unit.machine_id() == machine_id && unit.workload_id() == workload_id)
    }

    /// All diff records, unit by unit.
    pub fn diff_records(&self) -> impl Iterator<Item = &DiffRecord> {
        self.units.iter().flat_map(|unit| unit.diffs())
    }

    pub fn counts(&self) -> OptimalityCounts {
        self.units.iter().map(|unit| unit.counts()).sum()
    }

    pub fn summary(&self) -> CorpusSummary {
        CorpusSummary {
            root: self.root.clone(),
            counts: self.counts(),
            units: self
                .units
                .iter()
                .map(|unit| UnitSummary {
                    machine_id: unit.machine_id().to_string(),
                    workload_id: unit.workload_id().to_string(),
                    representatives: unit.representatives().len(),
                    diffs: unit.diffs().len(),
                    counts: unit.counts(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub machine_id: String,
    pub workload_id: String,
    pub representatives: usize,
    pub diffs: usize,
    pub counts: OptimalityCounts,
}

/// Machine-readable totals of a corpus run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub root: PathBuf,
    pub counts: OptimalityCounts,
    pub units: Vec<UnitSummary>,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        key::ConfigurationKey,
        metrics,
        test_util::{mt_key, st_key, DumpBuilder},
    };

    fn optimal_mt(key: ConfigurationKey) -> DumpBuilder {
        DumpBuilder::new(key)
            .metric(metrics::BLOCK_READ_SLAT_AVG, 800.0)
            .metric(metrics::BLOCK_WRITE_SLAT_AVG, 1500.0)
            .metric(metrics::BANDWIDTH, 1.2e6)
    }

    fn slower_mt(key: ConfigurationKey) -> DumpBuilder {
        DumpBuilder::new(key).metric(metrics::BANDWIDTH, 0.5e6)
    }

    fn write_all(dir: &Path, builders: &[DumpBuilder]) {
        fs::create_dir_all(dir).unwrap();
        for builder in builders {
            for i in 0..3 {
                builder.write(dir, i);
            }
        }
    }

    #[test]
    fn test_counts_combine_across_units() {
        let root = tempfile::tempdir().unwrap();
        // 2 mt optimal, 1 st optimal
        write_all(
            &root.path().join("c220g1").join("w82"),
            &[
                DumpBuilder::new(st_key()),
                optimal_mt(mt_key(1600)),
                optimal_mt(mt_key(400)),
                slower_mt(mt_key(3200)),
            ],
        );
        // 0 mt optimal, 2 st optimal
        write_all(
            &root.path().join("c220g5").join("w66"),
            &[
                DumpBuilder::new(st_key()),
                slower_mt(mt_key(1600)),
                slower_mt(mt_key(3200)),
            ],
        );

        let corpus = Corpus::load(root.path(), &AnalysisConfig::default()).unwrap();
        assert_eq!(corpus.units().len(), 2);
        assert_eq!(corpus.units()[0].counts(), (2, 1, 1).into());
        assert_eq!(corpus.units()[1].counts(), (0, 0, 2).into());

        let counts = corpus.counts();
        assert_eq!(counts.mt_optimal, 2);
        assert_eq!(counts.st_optimal, 3);
        assert_eq!(corpus.diff_records().count(), 5);
        assert!(corpus.find("c220g5", "w66").is_some());

        let summary = corpus.summary();
        assert_eq!(summary.units[0].machine_id, "c220g1");
        assert_eq!(summary.units[1].diffs, 2);
        assert_eq!(summary.counts, counts);
    }

    #[test]
    fn test_units_without_representatives_dropped() {
        let root = tempfile::tempdir().unwrap();
        write_all(&root.path().join("m").join("w"), &[DumpBuilder::new(st_key())]);
        let notes = root.path().join("m").join("notes");
        fs::create_dir_all(&notes).unwrap();
        fs::write(notes.join("README"), "not a dump\n").unwrap();

        let corpus = Corpus::load(root.path(), &AnalysisConfig::default()).unwrap();
        assert_eq!(corpus.units().len(), 1);
        assert_eq!(corpus.units()[0].workload_id(), "w");
        assert_eq!(corpus.counts(), OptimalityCounts::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_not_followed() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("m").join("w");
        write_all(&dir, &[DumpBuilder::new(st_key()), optimal_mt(mt_key(1600))]);
        std::os::unix::fs::symlink(root.path(), dir.join("loop")).unwrap();

        let corpus = Corpus::load(root.path(), &AnalysisConfig::default()).unwrap();
        assert_eq!(corpus.units().len(), 1);
        assert_eq!(corpus.units()[0].path(), dir.as_path());
        assert_eq!(corpus.counts(), (1, 0, 0).into());
    }
}
