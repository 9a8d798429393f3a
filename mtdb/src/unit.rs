//! One `{machine}/{workload}` directory of dumps, loaded and compared.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use tracing::info;
use walkdir::WalkDir;

use crate::{
    aggregate::{LoadStats, RepresentativeRecord, RunAggregator},
    compare::{DiffRecord, GroupSummary, OptimalityCounts, TierComparison, TierComparisonEngine},
    config::AnalysisConfig,
    error::LoadError,
    key::WorkloadConfig,
};

#[derive(Debug, Clone)]
pub struct DirectoryUnit {
    machine_id: String,
    workload_id: String,
    aggregator: RunAggregator,
    comparison: TierComparison,
}

impl DirectoryUnit {
    pub fn load(
        dir: &Path,
        machine_id: impl Into<String>,
        workload_id: impl Into<String>,
        config: &AnalysisConfig,
    ) -> Result<Self, LoadError> {
        let aggregator = RunAggregator::load(dir, config)?;
        Ok(Self::from_aggregator(aggregator, machine_id, workload_id))
    }

    /// Machine and workload ids taken from the last two path components.
    pub fn load_from_path(dir: &Path, config: &AnalysisConfig) -> Result<Self, LoadError> {
        let (machine_id, workload_id) = ids_from_path(dir);
        Self::load(dir, machine_id, workload_id, config)
    }

    pub fn from_aggregator(
        aggregator: RunAggregator,
        machine_id: impl Into<String>,
        workload_id: impl Into<String>,
    ) -> Self {
        let machine_id = machine_id.into();
        let workload_id = workload_id.into();
        let comparison =
            TierComparisonEngine::new(machine_id.as_str(), workload_id.as_str()).run(aggregator.representatives());
        let counts = comparison.counts;
        info!(
            "{}/{}: {} diffs, mt optimal {}, non-pyramidal mt optimal {}, st optimal {}",
            machine_id,
            workload_id,
            comparison.diffs.len(),
            counts.mt_optimal,
            counts.non_pyramidal_mt_optimal,
            counts.st_optimal
        );
        Self {
            machine_id,
            workload_id,
            aggregator,
            comparison,
        }
    }

    pub fn path(&self) -> &Path {
        self.aggregator.dir()
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn workload_id(&self) -> &str {
        &self.workload_id
    }

    pub fn representatives(&self) -> &[RepresentativeRecord] {
        self.aggregator.representatives()
    }

    pub fn diffs(&self) -> &[DiffRecord] {
        &self.comparison.diffs
    }

    pub fn counts(&self) -> OptimalityCounts {
        self.comparison.counts
    }

    pub fn summaries(&self) -> &BTreeMap<WorkloadConfig, GroupSummary> {
        &self.comparison.summaries
    }

    pub fn load_stats(&self) -> LoadStats {
        self.aggregator.stats()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives().is_empty()
    }
}

/// `.../{machine}/{workload}` -> (machine, workload); missing components are empty.
pub fn ids_from_path(dir: &Path) -> (String, String) {
    let name = |p: Option<&Path>| {
        p.and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    (name(dir.parent()), name(Some(dir)))
}

/// Lists the distinct parent directories of every file under `root`, sorted.
/// Symbolic links are not followed.
pub(crate) fn leaf_dirs(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut leaves = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| LoadError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            if let Some(parent) = entry.path().parent() {
                leaves.insert(parent.to_path_buf());
            }
        }
    }
    Ok(leaves.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        metrics,
        test_util::{mt_key, st_key, DumpBuilder},
    };

    #[test]
    fn test_ids_from_path() {
        assert_eq!(
            ids_from_path(Path::new("/data/c220g1/w82")),
            ("c220g1".to_string(), "w82".to_string())
        );
        assert_eq!(ids_from_path(Path::new("w82")), (String::new(), "w82".to_string()));
    }

    #[test]
    fn test_unit_compares_its_dumps() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("c220g1").join("w82");
        fs::create_dir_all(&dir).unwrap();
        for i in 0..3 {
            DumpBuilder::new(st_key()).write(&dir, i);
            DumpBuilder::new(mt_key(1600))
                .metric(metrics::BLOCK_READ_SLAT_AVG, 800.0)
                .metric(metrics::BLOCK_WRITE_SLAT_AVG, 1500.0)
                .metric(metrics::BANDWIDTH, 1.2e6)
                .write(&dir, i);
        }
        let unit = DirectoryUnit::load_from_path(&dir, &AnalysisConfig::default()).unwrap();
        assert_eq!(unit.machine_id(), "c220g1");
        assert_eq!(unit.workload_id(), "w82");
        assert_eq!(unit.path(), dir.as_path());
        assert_eq!(unit.representatives().len(), 2);
        assert_eq!(unit.diffs().len(), 1);
        assert_eq!(unit.diffs()[0].machine_id, "c220g1");
        assert_eq!(unit.counts(), (1, 0, 0).into());
        assert_eq!(unit.summaries()[&st_key().workload()].st_count, 1);
        assert_eq!(unit.load_stats().files, 6);
        assert!(!unit.is_empty());
    }

    #[test]
    fn test_leaf_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = root.path().join("m1").join("w1");
        let b = root.path().join("m2").join("w2");
        let empty = root.path().join("m3").join("w3");
        for dir in [&a, &b, &empty] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(a.join("x"), "").unwrap();
        fs::write(a.join("y"), "").unwrap();
        fs::write(b.join("z"), "").unwrap();
        assert_eq!(leaf_dirs(root.path()).unwrap(), vec![a, b]);

        let missing = leaf_dirs(&root.path().join("nope"));
        assert!(matches!(missing, Err(LoadError::Walk { .. })));
    }
}
