//! Quarantine Partitioner: splits every collection into clean and failed.

use crate::{
    batch::{Batch, Rejections},
    record::Record,
    run_log::RunLog,
    types::RunId,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// No issues: every record was accepted.
    Passed,
    /// Issues were found; clean data was still emitted.
    Partial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub total:  usize,
    pub clean:  usize,
    pub failed: usize,
}

/// The audit artifact written as `failed_records.json`.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub run_id:         RunId,
    pub status:         RunStatus,
    pub issues:         Vec<String>,
    pub warnings:       Vec<String>,
    /// Collection name → rejected records, normalized, in input order.
    pub failed_records: BTreeMap<String, Vec<Record>>,
    pub data_summary:   BTreeMap<String, EntitySummary>,
}

impl FailureReport {
    pub fn failed_count(&self) -> usize {
        self.failed_records.values().map(Vec::len).sum()
    }
}

/// Partition `batch` by `rejections`.
///
/// Every record lands in exactly one side. Kinds left without clean records
/// are omitted from the clean batch; kinds without failures are omitted
/// from `failed_records`.
pub fn partition(batch: &Batch, rejections: &Rejections, log: &RunLog) -> (Batch, FailureReport) {
    let mut clean = Batch::new();
    let mut failed_records = BTreeMap::new();
    let mut data_summary = BTreeMap::new();

    for kind in batch.kinds() {
        let (failed, kept): (Vec<(usize, &Record)>, Vec<(usize, &Record)>) = batch
            .records(kind)
            .iter()
            .enumerate()
            .partition(|(index, _)| rejections.is_rejected(kind, *index));

        let summary = EntitySummary {
            total: kept.len() + failed.len(),
            clean: kept.len(),
            failed: failed.len(),
        };
        log::info!(
            "quarantine: clean {}: {}/{} records",
            kind.collection(),
            summary.clean,
            summary.total
        );
        data_summary.insert(kind.collection().to_string(), summary);

        if !kept.is_empty() {
            clean.insert(kind, kept.into_iter().map(|(_, r)| r.clone()).collect());
        }
        if !failed.is_empty() {
            failed_records.insert(
                kind.collection().to_string(),
                failed.into_iter().map(|(_, r)| r.clone()).collect(),
            );
        }
    }

    let status = if log.has_issues() {
        RunStatus::Partial
    } else {
        RunStatus::Passed
    };
    let report = FailureReport {
        run_id: log.run_id.clone(),
        status,
        issues: log.issues.clone(),
        warnings: log.warnings.clone(),
        failed_records,
        data_summary,
    };
    (clean, report)
}
