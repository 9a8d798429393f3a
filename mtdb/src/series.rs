//! Window-by-window view of the `stat:` snapshots, and ST vs MT comparison
//! over the period both runs cover.

use serde::{Deserialize, Serialize};

use crate::{metrics, output::OutputRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// snapshot timestamp closing the window
    pub ts: u64,
    pub len: u64,
    pub read_bytes: f64,
    pub write_bytes: f64,
    /// bytes per second processed inside the window
    pub bandwidth: f64,
    pub t2_hit_rate: Option<f64>,
}

/// Snapshots carry cumulative byte counters; consecutive snapshots are
/// differenced into windows. Snapshots missing a counter are skipped, and a
/// snapshot at the same time as the previous one (`T=0` first) only moves the
/// baseline.
pub fn windows(record: &OutputRecord) -> Vec<Window> {
    let mut prev_ts = 0;
    let (mut prev_read, mut prev_write) = (0.0, 0.0);
    record
        .time_series()
        .iter()
        .filter_map(|(ts, snapshot)| {
            let read = *snapshot.get(metrics::READ_IO_PROCESSED)?;
            let write = *snapshot.get(metrics::WRITE_IO_PROCESSED)?;
            let len = ts - prev_ts;
            if len == 0 {
                (prev_read, prev_write) = (read, write);
                return None;
            }
            let window = Window {
                ts: *ts,
                len,
                read_bytes: read - prev_read,
                write_bytes: write - prev_write,
                bandwidth: (read - prev_read + write - prev_write) / len as f64,
                t2_hit_rate: snapshot.get(metrics::T2_HIT_RATE).copied(),
            };
            (prev_ts, prev_read, prev_write) = (*ts, read, write);
            Some(window)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowComparison {
    pub index: usize,
    pub st_ts: u64,
    pub mt_ts: u64,
    pub st_bandwidth: f64,
    pub mt_bandwidth: f64,
    /// `(st - mt) / st`, positive while ST is ahead
    pub bandwidth_gap: f64,
    pub mt_t2_hit_rate: Option<f64>,
}

/// Pairs windows by position; snapshot times drift a little between runs so
/// timestamps are not matched exactly. Only the overlapping prefix is kept.
pub fn compare_windows(st: &OutputRecord, mt: &OutputRecord) -> Vec<WindowComparison> {
    windows(st)
        .into_iter()
        .zip(windows(mt))
        .enumerate()
        .map(|(index, (st, mt))| WindowComparison {
            index,
            st_ts: st.ts,
            mt_ts: mt.ts,
            st_bandwidth: st.bandwidth,
            mt_bandwidth: mt.bandwidth,
            bandwidth_gap: (st.bandwidth - mt.bandwidth) / st.bandwidth,
            mt_t2_hit_rate: mt.t2_hit_rate,
        })
        .collect()
}
