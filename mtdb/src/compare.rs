//! Pairs every multi-tier configuration with the single-tier run of the same
//! tier-1 size and measures what the second tier changed.

use std::{
    collections::BTreeMap,
    iter::Sum,
    ops::Add,
};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    aggregate::RepresentativeRecord,
    key::{ConfigurationKey, Tier1Group, WorkloadConfig},
    metrics,
};

const NS_PER_S: f64 = 1e9;

/// `100 * (mt - st) / st`; a zero baseline gives an infinity or NaN.
pub fn percent_diff(st: f64, mt: f64) -> f64 {
    100.0 * (mt - st) / st
}

/// mt optimal, non-pyramidal mt optimal, st optimal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimalityCounts {
    pub mt_optimal: usize,
    pub non_pyramidal_mt_optimal: usize,
    pub st_optimal: usize,
}

impl OptimalityCounts {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::MtOptimal { non_pyramidal } => {
                self.mt_optimal += 1;
                if non_pyramidal {
                    self.non_pyramidal_mt_optimal += 1;
                }
            }
            Outcome::StOptimal => self.st_optimal += 1,
        }
    }
}

impl Add for OptimalityCounts {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        OptimalityCounts {
            mt_optimal: self.mt_optimal + rhs.mt_optimal,
            non_pyramidal_mt_optimal: self.non_pyramidal_mt_optimal + rhs.non_pyramidal_mt_optimal,
            st_optimal: self.st_optimal + rhs.st_optimal,
        }
    }
}

impl Sum for OptimalityCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(OptimalityCounts::default(), |a, b| a + b)
    }
}

impl From<(usize, usize, usize)> for OptimalityCounts {
    fn from((mt_optimal, non_pyramidal_mt_optimal, st_optimal): (usize, usize, usize)) -> Self {
        OptimalityCounts {
            mt_optimal,
            non_pyramidal_mt_optimal,
            st_optimal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Outcome {
    /// read latency, write latency and bandwidth all improved
    #[display(fmt = "mt-optimal")]
    MtOptimal { non_pyramidal: bool },
    #[display(fmt = "st-optimal")]
    StOptimal,
}

impl Outcome {
    pub fn is_mt_optimal(&self) -> bool {
        matches!(self, Outcome::MtOptimal { .. })
    }

    pub fn is_non_pyramidal_optimal(&self) -> bool {
        matches!(self, Outcome::MtOptimal { non_pyramidal: true })
    }
}

/// Seconds lost to or saved by the second tier, over the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyImpact {
    pub find_latency_increase: Option<f64>,
    pub alloc_latency_increase: Option<f64>,
    pub load_latency_increase: Option<f64>,
    pub overhead: Option<f64>,
    pub tier2_gain: Option<f64>,
    pub backing_write_gain: Option<f64>,
    pub backing_read_gain: Option<f64>,
    pub net_gain: Option<f64>,
}

impl LatencyImpact {
    pub fn estimate(st: &RepresentativeRecord, mt: &RepresentativeRecord) -> Self {
        // count taken from the mt row, latency delta mt - st
        let increase = |count: &str, latency: &str| {
            Some(mt.metric(count)? * (mt.metric(latency)? - st.metric(latency)?) / NS_PER_S)
        };
        let find_latency_increase = increase(metrics::T1_GET_COUNT, metrics::FIND_LAT_AVG);
        let alloc_latency_increase = increase(metrics::ALLOC_COUNT, metrics::ALLOC_LAT_AVG);
        let load_latency_increase = increase(metrics::BLOCK_REQ_COUNT, metrics::LOAD_DURATION_AVG);
        let overhead = (|| Some(find_latency_increase? + alloc_latency_increase? + load_latency_increase?))();

        let tier2_gain = (|| {
            Some(
                (st.metric(metrics::BACKING_READ_LAT_AVG)? - mt.metric(metrics::T2_READ_LAT_AVG)?)
                    * mt.metric(metrics::T2_HIT_COUNT)?
                    / NS_PER_S,
            )
        })();
        let backing_write_gain = (|| {
            Some(
                (st.metric(metrics::BACKING_WRITE_LAT_AVG)? - mt.metric(metrics::BACKING_WRITE_LAT_AVG)?)
                    * mt.metric(metrics::BACKING_WRITE_REQ_COUNT)?
                    / NS_PER_S,
            )
        })();
        let backing_read_gain = (|| {
            let reads = mt.metric(metrics::BACKING_REQ_COUNT)? - mt.metric(metrics::BACKING_WRITE_REQ_COUNT)?;
            Some(
                (st.metric(metrics::BACKING_READ_LAT_AVG)? - mt.metric(metrics::BACKING_READ_LAT_AVG)?) * reads
                    / NS_PER_S,
            )
        })();
        let net_gain = (|| Some(tier2_gain? + backing_write_gain? + backing_read_gain? - overhead?))();

        LatencyImpact {
            find_latency_increase,
            alloc_latency_increase,
            load_latency_increase,
            overhead,
            tier2_gain,
            backing_write_gain,
            backing_read_gain,
            net_gain,
        }
    }

    fn columns(&self) -> [(&'static str, Option<f64>); 8] {
        [
            (metrics::FIND_LATENCY_INCREASE, self.find_latency_increase),
            (metrics::ALLOC_LATENCY_INCREASE, self.alloc_latency_increase),
            (metrics::LOAD_LATENCY_INCREASE, self.load_latency_increase),
            (metrics::OVERHEAD, self.overhead),
            (metrics::T2_GAIN, self.tier2_gain),
            (metrics::BACKING_WRITE_GAIN, self.backing_write_gain),
            (metrics::BACKING_READ_GAIN, self.backing_read_gain),
            (metrics::NET_GAIN, self.net_gain),
        ]
    }
}

/// One MT configuration measured against its ST baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub machine_id: String,
    pub workload_id: String,
    /// key of the mt configuration
    pub key: ConfigurationKey,
    /// percent change per metric, except for the raw and derived fields
    pub columns: BTreeMap<String, f64>,
    pub latency: LatencyImpact,
    pub outcome: Outcome,
    pub t1_t2_size_ratio: f64,
    pub t1_t2_hr_ratio: f64,
    /// tier-2 larger than tier-1 by configured size
    pub pyramidal: bool,
    /// tier-2 larger than tier-1 by resident size; `None` without `t1Size`/`t2Size`
    pub allocated_pyramidal: Option<bool>,
}

impl DiffRecord {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.columns.get(name).copied()
    }

    fn build(st: &RepresentativeRecord, mt: &RepresentativeRecord, machine_id: &str, workload_id: &str) -> Self {
        let mut columns: BTreeMap<String, f64> = mt
            .columns
            .iter()
            .filter_map(|(name, mt_value)| Some((name.clone(), percent_diff(st.metric(name)?, *mt_value))))
            .collect();

        let mut raw = mt.columns.clone();
        let ratio = |num: &str, other: &str| Some(mt.metric(num)? / (mt.metric(num)? + mt.metric(other)?));
        if let Some(r) = ratio(metrics::BACKING_WRITE_IO_BYTES, metrics::BACKING_READ_IO_BYTES) {
            raw.insert(metrics::WRITE_IO_RATIO.to_string(), r);
        }
        if let Some(r) = (|| Some(mt.metric(metrics::WRITE_REQ_COUNT)? / mt.metric(metrics::BLOCK_REQ_COUNT)?))() {
            raw.insert(metrics::WRITE_REQ_RATIO.to_string(), r);
        }
        for name in metrics::RAW_DIFF_FIELDS {
            if let Some(value) = raw.get(name) {
                columns.insert(name.to_string(), *value);
            }
        }
        for name in [metrics::BACKING_READ_SIZE_AVG, metrics::BACKING_WRITE_SIZE_AVG] {
            if let Some(value) = st.metric(name) {
                columns.insert(format!("st_{name}"), value);
            }
        }

        let latency = LatencyImpact::estimate(st, mt);
        for (name, value) in latency.columns() {
            if let Some(value) = value {
                columns.insert(name.to_string(), value);
            }
        }

        let improved = |name: &str, better: fn(f64) -> bool| columns.get(name).is_some_and(|d| better(*d));
        let mt_optimal = improved(metrics::BLOCK_READ_SLAT_AVG, |d| d < 0.0)
            && improved(metrics::BLOCK_WRITE_SLAT_AVG, |d| d < 0.0)
            && improved(metrics::BANDWIDTH, |d| d > 0.0);
        let key = mt.key;
        let outcome = if mt_optimal {
            Outcome::MtOptimal {
                non_pyramidal: key.t1_size_mb >= key.t2_size_mb,
            }
        } else {
            Outcome::StOptimal
        };

        let t1_t2_size_ratio = key.t1_size_mb as f64 / key.t2_size_mb as f64;
        let t1_t2_hr_ratio = mt.metric(metrics::T1_HIT_RATE).unwrap_or(f64::NAN)
            / mt.metric(metrics::T2_HIT_RATE).unwrap_or(f64::NAN);
        columns.insert(metrics::T1_T2_SIZE_RATIO.to_string(), t1_t2_size_ratio);
        columns.insert(metrics::T1_T2_HR_RATIO.to_string(), t1_t2_hr_ratio);

        let allocated_pyramidal = (|| {
            let t1_mb = mt.metric(metrics::T1_SIZE)? * mt.metric(metrics::T1_ALLOC_SIZE)? / 1e6;
            let t2_mb = mt.metric(metrics::T2_SIZE)? * mt.metric(metrics::PAGE_SIZE_BYTES)? / 1e6;
            Some(t1_mb < t2_mb)
        })();

        DiffRecord {
            machine_id: machine_id.to_string(),
            workload_id: workload_id.to_string(),
            key,
            columns,
            latency,
            outcome,
            t1_t2_size_ratio,
            t1_t2_hr_ratio,
            pyramidal: key.t1_size_mb < key.t2_size_mb,
            allocated_pyramidal,
        }
    }
}

/// Pyramidal / non-pyramidal split of a count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidSplit {
    pub pyramidal: usize,
    pub non_pyramidal: usize,
}

impl PyramidSplit {
    fn bump(&mut self, pyramidal: bool) {
        if pyramidal {
            self.pyramidal += 1;
        } else {
            self.non_pyramidal += 1;
        }
    }
}

/// Counts for every cache size tried with one workload configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub unique_t1_sizes: usize,
    pub st_count: usize,
    pub mt_count: PyramidSplit,
    /// tier-1 sizes with an ST run but no MT run
    pub solo_st: usize,
    /// tier-1 sizes with MT runs but no ST baseline
    pub solo_mt: usize,
    /// block latency metric -> MT configurations that lowered it
    pub latency_improved: BTreeMap<String, PyramidSplit>,
}

/// Output of [`TierComparisonEngine::run`] for one directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierComparison {
    pub diffs: Vec<DiffRecord>,
    pub counts: OptimalityCounts,
    pub summaries: BTreeMap<WorkloadConfig, GroupSummary>,
}

#[derive(Debug, Clone)]
pub struct TierComparisonEngine {
    machine_id: String,
    workload_id: String,
}

impl TierComparisonEngine {
    pub fn new(machine_id: impl Into<String>, workload_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            workload_id: workload_id.into(),
        }
    }

    pub fn run(&self, representatives: &[RepresentativeRecord]) -> TierComparison {
        let mut groups: BTreeMap<Tier1Group, Vec<&RepresentativeRecord>> = BTreeMap::new();
        for rep in representatives {
            groups.entry(rep.key.tier1_group()).or_default().push(rep);
        }

        let mut result = TierComparison::default();
        for (group, mut members) in groups {
            members.sort_by_key(|rep| rep.key.t2_size_mb);
            let summary = result.summaries.entry(group.workload).or_default();
            summary.unique_t1_sizes += 1;

            let st = members.iter().find(|rep| rep.key.is_single_tier());
            let mts = members.iter().filter(|rep| !rep.key.is_single_tier()).collect::<Vec<_>>();
            let Some(st) = st else {
                debug!("no ST baseline for {:?}", group);
                summary.solo_mt += 1;
                continue;
            };
            summary.st_count += 1;
            if mts.is_empty() {
                summary.solo_st += 1;
                continue;
            }

            for mt in mts {
                let diff = DiffRecord::build(st, mt, &self.machine_id, &self.workload_id);
                summary.mt_count.bump(diff.pyramidal);
                for (name, value) in &diff.columns {
                    let is_block_latency = name.starts_with(metrics::BLOCK_READ_SLAT_PREFIX)
                        || name.starts_with(metrics::BLOCK_WRITE_SLAT_PREFIX);
                    if is_block_latency && *value < 0.0 {
                        summary
                            .latency_improved
                            .entry(name.clone())
                            .or_default()
                            .bump(diff.pyramidal);
                    }
                }
                result.counts.record(diff.outcome);
                result.diffs.push(diff);
            }
        }
        result
    }
}
