//! Pearson correlation between the percent change of performance metrics
//! and candidate predictors, over groups of diff records.

use std::collections::BTreeMap;

use clap::ValueEnum;
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{compare::DiffRecord, key::WorkloadConfig, metrics};

pub static PERF_METRICS: [&str; 11] = [
    metrics::BLOCK_READ_SLAT_AVG,
    metrics::BLOCK_WRITE_SLAT_AVG,
    "blockReadSlat_p99_ns",
    "blockWriteSlat_p99_ns",
    "blockReadSlat_p999_ns",
    "blockWriteSlat_p999_ns",
    "blockReadSlat_p9999_ns",
    "blockWriteSlat_p9999_ns",
    "blockReadSlat_p99999_ns",
    "blockWriteSlat_p99999_ns",
    metrics::BANDWIDTH,
];

pub static PREDICTORS: [&str; 4] = [
    metrics::T1_T2_SIZE_RATIO,
    metrics::T2_HIT_COUNT,
    metrics::NVM_CACHE_SIZE_MB,
    metrics::NET_GAIN,
];

/// Groups smaller than this or equal to it get no coefficient.
pub const MIN_POINTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    #[display(fmt = "machine")]
    Machine,
    #[display(fmt = "workload")]
    Workload,
    #[display(fmt = "machine_workload")]
    MachineWorkload,
    #[display(fmt = "config")]
    Config,
    #[display(fmt = "machine_config")]
    MachineConfig,
    #[display(fmt = "machine_workload_config")]
    MachineWorkloadConfig,
}

impl Grouping {
    pub const ALL: [Grouping; 6] = [
        Grouping::Machine,
        Grouping::Workload,
        Grouping::MachineWorkload,
        Grouping::Config,
        Grouping::MachineConfig,
        Grouping::MachineWorkloadConfig,
    ];

    fn group_of(&self, diff: &DiffRecord) -> GroupId {
        let machine = || Some(diff.machine_id.clone());
        let workload = || Some(diff.workload_id.clone());
        let config = || Some(diff.key.workload());
        match self {
            Grouping::Machine => GroupId {
                machine_id: machine(),
                ..Default::default()
            },
            Grouping::Workload => GroupId {
                workload_id: workload(),
                ..Default::default()
            },
            Grouping::MachineWorkload => GroupId {
                machine_id: machine(),
                workload_id: workload(),
                config: None,
            },
            Grouping::Config => GroupId {
                config: config(),
                ..Default::default()
            },
            Grouping::MachineConfig => GroupId {
                machine_id: machine(),
                workload_id: None,
                config: config(),
            },
            Grouping::MachineWorkloadConfig => GroupId {
                machine_id: machine(),
                workload_id: workload(),
                config: config(),
            },
        }
    }
}

/// `None` components mean "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId {
    pub machine_id: Option<String>,
    pub workload_id: Option<String>,
    pub config: Option<WorkloadConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEntry {
    pub group: GroupId,
    pub perf: &'static str,
    pub pred: &'static str,
    /// number of finite pairs used
    pub points: usize,
    pub pearson: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationTable {
    pub grouping: Grouping,
    pub entries: Vec<CorrelationEntry>,
}

impl CorrelationTable {
    /// Single-tier rows never reach here; every diff is an MT configuration.
    pub fn build<'a>(diffs: impl IntoIterator<Item = &'a DiffRecord>, grouping: Grouping) -> Self {
        let mut groups: BTreeMap<GroupId, Vec<&DiffRecord>> = BTreeMap::new();
        for diff in diffs {
            groups.entry(grouping.group_of(diff)).or_default().push(diff);
        }

        let mut entries = groups
            .iter()
            .flat_map(|(group, members)| {
                PERF_METRICS
                    .iter()
                    .cartesian_product(PREDICTORS.iter())
                    .map(move |(&perf, &pred)| {
                        let (xs, ys): (Vec<f64>, Vec<f64>) = members
                            .iter()
                            .filter_map(|diff| {
                                let x = diff.metric(perf)?;
                                let y = diff.metric(pred).unwrap_or(f64::INFINITY);
                                (x.is_finite() && y.is_finite()).then_some((x, y))
                            })
                            .unzip();
                        let coefficient = if xs.len() > MIN_POINTS { pearson(&xs, &ys) } else { None };
                        CorrelationEntry {
                            group: group.clone(),
                            perf,
                            pred,
                            points: xs.len(),
                            pearson: coefficient,
                        }
                    })
            })
            .collect_vec();
        entries.sort_by(|a, b| {
            let abs = |e: &CorrelationEntry| e.pearson.map_or(f64::NEG_INFINITY, f64::abs);
            abs(b).total_cmp(&abs(a))
        });
        Self { grouping, entries }
    }

    /// Entries that have a coefficient.
    pub fn ranked(&self) -> impl Iterator<Item = &CorrelationEntry> {
        self.entries.iter().filter(|e| e.pearson.is_some())
    }
}

/// Sample Pearson coefficient; `None` when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compare::{LatencyImpact, Outcome},
        test_util::mt_key,
    };

    fn diff(machine: &str, t2_size_mb: u64, bandwidth: f64, hit_count: Option<f64>) -> DiffRecord {
        let key = mt_key(t2_size_mb);
        let mut columns = BTreeMap::from([
            (metrics::BANDWIDTH.to_string(), bandwidth),
            (metrics::NVM_CACHE_SIZE_MB.to_string(), t2_size_mb as f64),
            (
                metrics::T1_T2_SIZE_RATIO.to_string(),
                key.t1_size_mb as f64 / t2_size_mb as f64,
            ),
        ]);
        if let Some(hit_count) = hit_count {
            columns.insert(metrics::T2_HIT_COUNT.to_string(), hit_count);
        }
        DiffRecord {
            machine_id: machine.to_string(),
            workload_id: "w".to_string(),
            key,
            columns,
            latency: LatencyImpact::default(),
            outcome: Outcome::StOptimal,
            t1_t2_size_ratio: key.t1_size_mb as f64 / t2_size_mb as f64,
            t1_t2_hr_ratio: 4.0,
            pyramidal: key.t1_size_mb < t2_size_mb,
            allocated_pyramidal: None,
        }
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_table() {
        // bandwidth grows with tier-2 size on m1, hit count missing on half the rows
        let mut diffs = (1..=12)
            .map(|i| diff("m1", i * 100, i as f64 * 2.0, (i % 2 == 0).then_some(i as f64)))
            .collect_vec();
        // too few points on m2
        diffs.extend((1..=5).map(|i| diff("m2", i * 100, 1.0, None)));

        let table = CorrelationTable::build(&diffs, Grouping::Machine);
        let m1 = GroupId {
            machine_id: Some("m1".to_string()),
            ..Default::default()
        };
        let find = |group: &GroupId, perf: &str, pred: &str| {
            table
                .entries
                .iter()
                .find(|e| &e.group == group && e.perf == perf && e.pred == pred)
                .unwrap()
                .clone()
        };

        let by_size = find(&m1, metrics::BANDWIDTH, metrics::NVM_CACHE_SIZE_MB);
        assert_eq!(by_size.points, 12);
        assert!((by_size.pearson.unwrap() - 1.0).abs() < 1e-12);
        // missing predictor values are dropped
        let by_hits = find(&m1, metrics::BANDWIDTH, metrics::T2_HIT_COUNT);
        assert_eq!((by_hits.points, by_hits.pearson), (6, None));
        // missing perf metric
        let latency = find(&m1, "blockReadSlat_p99_ns", metrics::NVM_CACHE_SIZE_MB);
        assert_eq!(latency.points, 0);

        let m2 = GroupId {
            machine_id: Some("m2".to_string()),
            ..Default::default()
        };
        assert_eq!(find(&m2, metrics::BANDWIDTH, metrics::NVM_CACHE_SIZE_MB).pearson, None);

        assert_eq!(
            table.entries.len(),
            2 * PERF_METRICS.len() * PREDICTORS.len()
        );
        let ranked = table.ranked().collect_vec();
        assert!(!ranked.is_empty());
        assert!(ranked
            .windows(2)
            .all(|w| w[0].pearson.unwrap().abs() >= w[1].pearson.unwrap().abs()));
        assert!(table.entries[0].pearson.is_some());
    }

    #[test]
    fn test_groupings() {
        let diffs = [diff("m1", 1600, 1.0, None), diff("m2", 1600, 1.0, None)];
        let groups = |grouping: Grouping| {
            CorrelationTable::build(&diffs, grouping)
                .entries
                .into_iter()
                .map(|e| e.group)
                .unique()
                .count()
        };
        assert_eq!(groups(Grouping::Machine), 2);
        assert_eq!(groups(Grouping::Workload), 1);
        assert_eq!(groups(Grouping::Config), 1);
        assert_eq!(groups(Grouping::MachineWorkloadConfig), 2);
        assert_eq!(Grouping::MachineConfig.to_string(), "machine_config");
    }
}
