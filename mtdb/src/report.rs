//! CSV and JSON outputs of an analysis run.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    aggregate::RepresentativeRecord, compare::DiffRecord, correlation::CorrelationTable, error::ReportError,
};

const REPRESENTATIVE_ID_COLUMNS: [&str; 3] = ["key", "iterations", "tag"];
const DIFF_ID_COLUMNS: [&str; 6] = [
    "machine_id",
    "workload_id",
    "key",
    "outcome",
    "pyramidal",
    "allocated_pyramidal",
];

fn union_columns<'a>(rows: impl Iterator<Item = &'a BTreeMap<String, f64>>) -> Vec<&'a str> {
    rows.flat_map(|columns| columns.keys().map(String::as_str))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Empty for absent values, `inf`/`-inf`/`NaN` for non-finite ones.
fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_representatives_csv<W: Write>(out: W, records: &[RepresentativeRecord]) -> Result<(), ReportError> {
    let columns = union_columns(records.iter().map(|r| &r.columns));
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(REPRESENTATIVE_ID_COLUMNS.iter().copied().chain(columns.iter().copied()))?;
    for record in records {
        let ids = [
            record.key.to_string(),
            record.iterations.to_string(),
            record.tag.clone().unwrap_or_default(),
        ];
        let values = columns.iter().map(|name| cell(record.metric(name)));
        writer.write_record(ids.into_iter().chain(values))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_diffs_csv<'a, W: Write>(
    out: W,
    diffs: impl IntoIterator<Item = &'a DiffRecord>,
) -> Result<(), ReportError> {
    let diffs = diffs.into_iter().collect_vec();
    let columns = union_columns(diffs.iter().map(|&d| &d.columns));
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(DIFF_ID_COLUMNS.iter().copied().chain(columns.iter().copied()))?;
    for diff in diffs {
        let ids = [
            diff.machine_id.clone(),
            diff.workload_id.clone(),
            diff.key.to_string(),
            diff.outcome.to_string(),
            diff.pyramidal.to_string(),
            diff.allocated_pyramidal.map(|p| p.to_string()).unwrap_or_default(),
        ];
        let values = columns.iter().map(|name| cell(diff.metric(name)));
        writer.write_record(ids.into_iter().chain(values))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct CorrelationRow<'a> {
    grouping: String,
    machine_id: &'a str,
    workload_id: &'a str,
    config: String,
    perf: &'a str,
    pred: &'a str,
    points: usize,
    pearson: Option<f64>,
}

pub fn write_correlation_csv<W: Write>(out: W, table: &CorrelationTable) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    for entry in table.ranked() {
        writer.serialize(CorrelationRow {
            grouping: table.grouping.to_string(),
            machine_id: entry.group.machine_id.as_deref().unwrap_or("all"),
            workload_id: entry.group.workload_id.as_deref().unwrap_or("all"),
            config: entry
                .group
                .config
                .map_or_else(|| "all".to_string(), |config| config.to_string()),
            perf: entry.perf,
            pred: entry.pred,
            points: entry.points,
            pearson: entry.pearson,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<W: Write, T: Serialize>(out: W, value: &T) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(out, value)?;
    Ok(())
}
