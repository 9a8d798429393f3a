//! Parser for a single experiment dump file.
//!
//! A dump mixes three kinds of lines:
//! - `name=value` metrics printed at the end of a run,
//! - `stat:` snapshots (`T=30, t1HitRate=80, ...`) printed periodically,
//! - the pretty-printed JSON configuration of the run.
//!
//! The configuration is not parsed as JSON; fields are picked out by name,
//! most specific name first, so that `nvmCacheSizeMB` is never taken for
//! `cacheSizeMB`.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::ParseError,
    key::{ConfigurationKey, FileName},
    metrics::{self, DEFAULT_HMR_PAGE_SIZE},
};

/// One `stat:` line, metric name to value.
pub type Snapshot = BTreeMap<String, f64>;

const SNAPSHOT_MARKER: &str = "stat:";

/// Scalar configuration picked out of the JSON-ish config block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub t1_size_mb: u64,
    pub t2_size_mb: u64,
    pub alloc_size_bytes: u64,
    pub page_size_bytes: u64,
    pub input_queue_size: u64,
    pub processor_thread_count: u64,
    pub iat_scale: u64,
    pub tag: Option<String>,
}

impl ExperimentConfig {
    pub fn key(&self) -> ConfigurationKey {
        ConfigurationKey {
            queue_depth: self.input_queue_size,
            thread_count: self.processor_thread_count,
            iat_scale: self.iat_scale,
            t1_size_mb: self.t1_size_mb,
            t2_size_mb: self.t2_size_mb,
        }
    }

    fn missing_essentials(&self) -> Vec<&'static str> {
        [
            (self.input_queue_size, ConfigField::InputQueueSize),
            (self.processor_thread_count, ConfigField::ProcessorThreadCount),
            (self.iat_scale, ConfigField::ScaleIat),
        ]
        .into_iter()
        .filter(|(value, _)| *value == 0)
        .map(|(_, field)| field.name())
        .collect()
    }
}

/// When tier-2 started serving hits, as seen in the snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier2Warmup {
    /// no snapshot reported a positive tier-2 hit rate
    #[default]
    Cold,
    /// snapshots predate tier-2 tracking
    Untracked,
    WarmAt(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigField {
    NvmCacheSizeMb,
    CacheSizeMb,
    AllocSizes,
    PageSizeBytes,
    InputQueueSize,
    ProcessorThreadCount,
    ScaleIat,
    Tag,
}

impl ConfigField {
    fn name(self) -> &'static str {
        match self {
            ConfigField::NvmCacheSizeMb => metrics::NVM_CACHE_SIZE_MB,
            ConfigField::CacheSizeMb => metrics::CACHE_SIZE_MB,
            ConfigField::AllocSizes => "allocSizes",
            ConfigField::PageSizeBytes => metrics::PAGE_SIZE_BYTES,
            ConfigField::InputQueueSize => metrics::INPUT_QUEUE_SIZE,
            ConfigField::ProcessorThreadCount => metrics::PROCESSOR_THREAD_COUNT,
            ConfigField::ScaleIat => metrics::SCALE_IAT,
            ConfigField::Tag => "tag",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Match {
    Contains,
    Exact,
}

// Checked in order, first hit wins. `nvmCacheSizeMB` contains `cacheSizeMB`.
const CONFIG_MATCHERS: [(ConfigField, Match); 8] = [
    (ConfigField::NvmCacheSizeMb, Match::Contains),
    (ConfigField::CacheSizeMb, Match::Contains),
    (ConfigField::AllocSizes, Match::Contains),
    (ConfigField::PageSizeBytes, Match::Contains),
    (ConfigField::InputQueueSize, Match::Contains),
    (ConfigField::ProcessorThreadCount, Match::Contains),
    (ConfigField::ScaleIat, Match::Contains),
    (ConfigField::Tag, Match::Exact),
];

#[derive(Debug, PartialEq)]
enum LineKind<'a> {
    Metric { name: &'a str, value: &'a str },
    Snapshot(&'a str),
    Config { field: ConfigField, value: Option<&'a str> },
    Other,
}

fn classify(line: &str) -> LineKind<'_> {
    // a quote means the `=` belongs to an embedded JSON string
    if line.matches('=').count() == 1 && !line.contains('"') {
        if let Some((name, value)) = line.split_once('=') {
            return LineKind::Metric {
                name: name.trim(),
                value: value.trim(),
            };
        }
    }
    if let Some(pos) = line.find(SNAPSHOT_MARKER) {
        return LineKind::Snapshot(&line[pos + SNAPSHOT_MARKER.len()..]);
    }
    let (key, value) = match line.split_once(':') {
        Some((key, value)) => (key, Some(value)),
        None => (line, None),
    };
    let key = key.trim().trim_matches('"');
    CONFIG_MATCHERS
        .iter()
        .find(|(field, mode)| match mode {
            Match::Contains => key.contains(field.name()),
            Match::Exact => key == field.name(),
        })
        .map_or(LineKind::Other, |(field, _)| LineKind::Config {
            field: *field,
            value,
        })
}

fn parse_snapshot(body: &str) -> Snapshot {
    body.split(',')
        .filter_map(|token| {
            let (name, value) = token.split_once('=')?;
            match value.trim().parse::<f64>() {
                Ok(value) => Some((name.trim().to_string(), value)),
                Err(_) => {
                    debug!("skipping snapshot field {:?}", token);
                    None
                }
            }
        })
        .collect()
}

/// Line-by-line state machine behind [`OutputRecord::from_path`].
///
/// `allocSizes` is printed as a JSON array, so its value usually sits alone
/// on the following line; `pending_alloc_size` tracks that.
#[derive(Debug)]
pub struct OutputParser {
    path: PathBuf,
    hmr_page_size: u64,
    line_no: usize,
    pending_alloc_size: bool,
    metrics: BTreeMap<String, f64>,
    time_series: BTreeMap<u64, Snapshot>,
    config: ExperimentConfig,
    warmup: Tier2Warmup,
}

impl OutputParser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hmr_page_size: DEFAULT_HMR_PAGE_SIZE,
            line_no: 0,
            pending_alloc_size: false,
            metrics: BTreeMap::new(),
            time_series: BTreeMap::new(),
            config: ExperimentConfig::default(),
            warmup: Tier2Warmup::Cold,
        }
    }

    pub fn with_hmr_page_size(mut self, page_size: u64) -> Self {
        self.hmr_page_size = page_size;
        self
    }

    pub fn feed_line(&mut self, line: &str) -> Result<(), ParseError> {
        self.line_no += 1;
        let line = line.trim_end();
        if self.pending_alloc_size {
            self.pending_alloc_size = false;
            self.config.alloc_size_bytes = self.config_int(ConfigField::AllocSizes, line)?;
            return Ok(());
        }
        match classify(line) {
            LineKind::Metric { name, value } => {
                let parsed = value.parse::<f64>().map_err(|_| ParseError::InvalidMetric {
                    path: self.path.clone(),
                    line: self.line_no,
                    name: name.to_string(),
                    value: value.to_string(),
                })?;
                self.metrics.insert(name.to_string(), parsed);
            }
            LineKind::Snapshot(body) => self.record_snapshot(parse_snapshot(body)),
            LineKind::Config { field, value } => self.record_config(field, value)?,
            LineKind::Other => {}
        }
        Ok(())
    }

    fn record_snapshot(&mut self, snapshot: Snapshot) {
        let Some(ts) = snapshot
            .get(metrics::SNAPSHOT_TIMESTAMP)
            .filter(|ts| ts.is_finite() && **ts >= 0.0)
            .map(|ts| *ts as u64)
        else {
            debug!("{}:{}: snapshot without timestamp", self.path.display(), self.line_no);
            return;
        };
        if self.warmup == Tier2Warmup::Cold {
            match snapshot.get(metrics::T2_HIT_RATE) {
                None => self.warmup = Tier2Warmup::Untracked,
                Some(rate) if *rate > 0.0 => self.warmup = Tier2Warmup::WarmAt(ts),
                Some(_) => {}
            }
        }
        self.time_series.insert(ts, snapshot);
    }

    fn record_config(&mut self, field: ConfigField, value: Option<&str>) -> Result<(), ParseError> {
        let value = value.unwrap_or_default();
        match field {
            ConfigField::AllocSizes => {
                // `[4136],` on the same line, or `[` with the value on the next one
                let inline = value
                    .trim()
                    .trim_start_matches('[')
                    .split([',', ']'])
                    .next()
                    .unwrap_or_default();
                if inline.trim().is_empty() {
                    self.pending_alloc_size = true;
                } else {
                    self.config.alloc_size_bytes = self.config_int(field, inline)?;
                }
            }
            ConfigField::NvmCacheSizeMb => self.config.t2_size_mb = self.config_int(field, value)?,
            ConfigField::CacheSizeMb => self.config.t1_size_mb = self.config_int(field, value)?,
            ConfigField::PageSizeBytes => {
                self.config.page_size_bytes = self.config_int(field, value)?
            }
            ConfigField::InputQueueSize => {
                self.config.input_queue_size = self.config_int(field, value)?
            }
            ConfigField::ProcessorThreadCount => {
                self.config.processor_thread_count = self.config_int(field, value)?
            }
            ConfigField::ScaleIat => self.config.iat_scale = self.config_int(field, value)?,
            ConfigField::Tag => {
                let tag = value.replace(',', "");
                self.config.tag = Some(tag.trim().trim_matches('"').to_string());
            }
        }
        Ok(())
    }

    fn config_int(&self, field: ConfigField, raw: &str) -> Result<u64, ParseError> {
        raw.replace(',', "")
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidConfig {
                path: self.path.clone(),
                line: self.line_no,
                field: field.name(),
                value: raw.to_string(),
            })
    }

    pub fn finish(self) -> Result<OutputRecord, ParseError> {
        if self.pending_alloc_size {
            return Err(ParseError::InvalidConfig {
                path: self.path,
                line: self.line_no,
                field: ConfigField::AllocSizes.name(),
                value: String::new(),
            });
        }
        let missing = self.config.missing_essentials();
        if !missing.is_empty() {
            return Err(ParseError::MalformedInput {
                path: self.path,
                missing,
            });
        }

        let has_all = |names: &[&str]| {
            names.iter().all(|name| {
                self.metrics.contains_key(*name)
                    || (*name == metrics::INPUT_QUEUE_SIZE && self.config.input_queue_size > 0)
            })
        };
        let complete =
            has_all(&metrics::REQUIRED_FOR_SANITY) && has_all(&metrics::REQUIRED_FOR_COMPLETE);

        let iteration = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(FileName::parse)
            .map(|name| {
                if name.key != self.config.key() {
                    warn!(
                        "{}: file name says {} but contents say {}",
                        self.path.display(),
                        name.key,
                        self.config.key()
                    );
                }
                name.iteration
            });

        let mut record = OutputRecord {
            path: self.path,
            metrics: self.metrics,
            time_series: self.time_series,
            config: self.config,
            iteration,
            complete,
            warmup: self.warmup,
            t2_hit_count: None,
            hmrc1: None,
        };
        record.t2_hit_count = record.compute_t2_hit_count();
        record.hmrc1 = record.hmrc(self.hmr_page_size);
        Ok(record)
    }
}

/// One parsed dump file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    path: PathBuf,
    metrics: BTreeMap<String, f64>,
    time_series: BTreeMap<u64, Snapshot>,
    config: ExperimentConfig,
    iteration: Option<u32>,
    complete: bool,
    warmup: Tier2Warmup,
    t2_hit_count: Option<f64>,
    hmrc1: Option<f64>,
}

impl OutputRecord {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        Self::from_path_with(path, DEFAULT_HMR_PAGE_SIZE)
    }

    pub fn from_path_with(path: impl AsRef<Path>, hmr_page_size: u64) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), path, hmr_page_size)
    }

    /// `path` is only used for the iteration index and error messages.
    pub fn from_reader(
        reader: impl BufRead,
        path: impl Into<PathBuf>,
        hmr_page_size: u64,
    ) -> Result<Self, ParseError> {
        let mut parser = OutputParser::new(path).with_hmr_page_size(hmr_page_size);
        for line in reader.lines() {
            let line = line.map_err(|source| ParseError::Io {
                path: parser.path.clone(),
                source,
            })?;
            parser.feed_line(&line)?;
        }
        parser.finish()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn time_series(&self) -> &BTreeMap<u64, Snapshot> {
        &self.time_series
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn key(&self) -> ConfigurationKey {
        self.config.key()
    }

    pub fn iteration(&self) -> Option<u32> {
        self.iteration
    }

    /// False for truncated or still running experiments.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn tier2_warmup(&self) -> Tier2Warmup {
        self.warmup
    }

    pub fn t2_hit_count(&self) -> Option<f64> {
        self.t2_hit_count
    }

    /// Hit-miss byte ratio computed at load time.
    pub fn hmrc1(&self) -> Option<f64> {
        self.hmrc1
    }

    fn compute_t2_hit_count(&self) -> Option<f64> {
        Some(self.metric(metrics::T2_GET_COUNT)? * self.metric(metrics::T2_HIT_RATE)? / 100.0)
    }

    /// Tier-2 hit bytes over tier-2 miss bytes plus bytes written to the
    /// backing store.
    pub fn hmrc(&self, page_size: u64) -> Option<f64> {
        let page_size = page_size as f64;
        let hits = self.compute_t2_hit_count()?;
        let misses = self.metric(metrics::T2_GET_COUNT)? - hits;
        let write_bytes = self.metric(metrics::BACKING_WRITE_IO_BYTES)?;
        Some(hits * page_size / (misses * page_size + write_bytes))
    }

    /// The flat row used for aggregation: metrics, then configuration, then
    /// derived values.
    pub fn row(&self) -> BTreeMap<String, f64> {
        let mut row = self.metrics.clone();
        let config = &self.config;
        for (name, value) in [
            (metrics::CACHE_SIZE_MB, config.t1_size_mb),
            (metrics::NVM_CACHE_SIZE_MB, config.t2_size_mb),
            (metrics::T1_ALLOC_SIZE, config.alloc_size_bytes),
            (metrics::PAGE_SIZE_BYTES, config.page_size_bytes),
            (metrics::INPUT_QUEUE_SIZE, config.input_queue_size),
            (metrics::PROCESSOR_THREAD_COUNT, config.processor_thread_count),
            (metrics::SCALE_IAT, config.iat_scale),
        ] {
            row.insert(name.to_string(), value as f64);
        }
        if let Some(count) = self.t2_hit_count {
            row.insert(metrics::T2_HIT_COUNT.to_string(), count);
        }
        if let Some(hmr) = self.hmrc1 {
            row.insert(metrics::HMRC1.to_string(), hmr);
        }
        row
    }

    pub fn runtime_s(&self) -> Option<f64> {
        self.metric(metrics::EXPERIMENT_TIME)
    }

    pub fn block_req_per_second(&self) -> Option<f64> {
        Some(self.metric(metrics::BLOCK_REQ_COUNT)? / self.runtime_s()?)
    }

    /// Tier-1 size from the resident item count rather than the configured size.
    pub fn t1_size_mb_allocated(&self) -> Option<f64> {
        Some(self.metric(metrics::T1_SIZE)? * self.config.alloc_size_bytes as f64 / 1e6)
    }

    pub fn t2_size_mb_allocated(&self) -> Option<f64> {
        Some(self.metric(metrics::T2_SIZE)? * self.config.page_size_bytes as f64 / 1e6)
    }

    /// Share of the configured tier-2 that holds items, in percent.
    pub fn nvm_usage_percent(&self) -> Option<f64> {
        if self.config.t2_size_mb == 0 {
            return Some(0.0);
        }
        let used_mb = self.metric(metrics::T2_SIZE)? * metrics::T2_ITEM_SIZE_BYTES / 1e6;
        Some(100.0 * used_mb / self.config.t2_size_mb as f64)
    }
}

impl fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let get = |name: &str| self.metric(name).unwrap_or(f64::NAN);
        write!(
            f,
            "ExperimentOutput:Size[T1/T2]={},{}, HR(%)[T1/T2]={:3.1},{:3.1}, \
             MEANSLAT(ms)[R/W]={:3.2},{:3.2},{:3.2},{:3.2} BANDWIDTH={:3.2}",
            self.config.t1_size_mb,
            self.config.t2_size_mb,
            get(metrics::T1_HIT_RATE),
            get(metrics::T2_HIT_RATE),
            get(metrics::BLOCK_READ_SLAT_AVG) / 1e6,
            get(metrics::BLOCK_WRITE_SLAT_AVG) / 1e6,
            get("blockReadSlat_p99_ns") / 1e6,
            get("blockWriteSlat_p99_ns") / 1e6,
            get(metrics::BANDWIDTH) / 1e6,
        )
    }
}
