//! Synthetic dump files for tests.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{key::ConfigurationKey, metrics};

pub(crate) fn st_key() -> ConfigurationKey {
    ConfigurationKey {
        queue_depth: 128,
        thread_count: 16,
        iat_scale: 100,
        t1_size_mb: 800,
        t2_size_mb: 0,
    }
}

pub(crate) fn mt_key(t2_size_mb: u64) -> ConfigurationKey {
    ConfigurationKey {
        t2_size_mb,
        ..st_key()
    }
}

pub(crate) struct DumpBuilder {
    key: ConfigurationKey,
    metrics: Vec<(String, f64)>,
    snapshots: Vec<String>,
}

impl DumpBuilder {
    /// A complete dump with plausible values.
    pub(crate) fn new(key: ConfigurationKey) -> Self {
        let t2_hit_rate = if key.is_single_tier() { 0.0 } else { 20.0 };
        let metrics = [
            (metrics::BLOCK_REQ_COUNT, 1000.0),
            (metrics::BLOCK_READ_SLAT_AVG, 1000.0),
            (metrics::BLOCK_WRITE_SLAT_AVG, 2000.0),
            (metrics::BANDWIDTH, 1e6),
            (metrics::T2_WRITE_LAT_P100, 50.0),
            (metrics::T2_GET_COUNT, 100.0),
            (metrics::T1_HIT_RATE, 80.0),
            (metrics::T2_HIT_RATE, t2_hit_rate),
            (metrics::BACKING_WRITE_IO_BYTES, 4096.0 * 300.0),
            (metrics::EXPERIMENT_TIME, 60.0),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
        Self {
            key,
            metrics,
            snapshots: vec![],
        }
    }

    pub(crate) fn metric(mut self, name: &str, value: f64) -> Self {
        match self.metrics.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.metrics.push((name.to_string(), value)),
        }
        self
    }

    pub(crate) fn without(mut self, name: &str) -> Self {
        self.metrics.retain(|(n, _)| n != name);
        self
    }

    pub(crate) fn snapshot(mut self, line: &str) -> Self {
        self.snapshots.push(line.to_string());
        self
    }

    pub(crate) fn render(&self) -> String {
        let key = &self.key;
        let mut out = format!(
            "{{\n  \"cache_config\": {{\n    \"cacheSizeMB\": {},\n    \"allocSizes\": [\n      4136\n    ],\n    \
             \"nvmCacheSizeMB\": {},\n    \"pageSizeBytes\": 4096,\n    \"tag\": \"w82\"\n  }},\n  \
             \"system_config\": {{\n    \"inputQueueSize\": {},\n    \"processorThreadCount\": {},\n    \
             \"scaleIAT\": {}\n  }}\n}}\n",
            key.t1_size_mb, key.t2_size_mb, key.queue_depth, key.thread_count, key.iat_scale
        );
        for line in &self.snapshots {
            out.push_str(line);
            out.push('\n');
        }
        for (name, value) in &self.metrics {
            out.push_str(&format!("{name}={value}\n"));
        }
        out
    }

    /// Writes `{key}_{iteration}` into `dir` using the usual naming.
    pub(crate) fn write(&self, dir: &Path, iteration: u32) -> PathBuf {
        let key = &self.key;
        let path = dir.join(format!(
            "{}_{}_{}_{}_{}_{}",
            key.queue_depth, key.thread_count, key.iat_scale, key.t1_size_mb, key.t2_size_mb, iteration
        ));
        fs::write(&path, self.render()).unwrap();
        path
    }
}
