//! Batch loader and artifact writer.
//!
//! Input: one `<collection>.json` array per entity kind in a directory.
//! Output: one file per kind with clean records, plus `failed_records.json`
//! and `risk_alerts.json`, which are always written.
//!
//! RULE: A missing input directory is the only fatal condition here. A
//! missing file means the kind is absent; a malformed file is treated as
//! empty and recorded as a load issue.
//! RULE: After a write, every `<collection>.json` in the output directory
//! holds clean records only. Kinds with none have their file removed.

use crate::{
    batch::Batch,
    engine::GateOutcome,
    error::{GateError, GateResult},
    record::{EntityKind, Record},
    run_log::RunLog,
};
use serde::Serialize;
use serde_json::Value;
use std::{fs, path::Path};

pub const FAILED_RECORDS_FILE: &str = "failed_records.json";
pub const RISK_ALERTS_FILE: &str = "risk_alerts.json";

pub fn input_file(kind: EntityKind) -> String {
    format!("{}.json", kind.collection())
}

/// Read every known collection file from `dir`.
pub fn load_batch(dir: &Path, log: &mut RunLog) -> GateResult<Batch> {
    if !dir.is_dir() {
        return Err(GateError::MissingInput {
            path: dir.display().to_string(),
        });
    }

    let mut batch = Batch::new();
    for kind in EntityKind::ALL {
        let path = dir.join(input_file(kind));
        if !path.exists() {
            log::info!("load: {} not present; {} skipped", path.display(), kind);
            continue;
        }
        let records = match read_collection(&path) {
            Ok(values) => to_records(kind, values, log),
            Err(e) => {
                log.load_error(format!(
                    "Could not load {}: {e}; treated as empty",
                    input_file(kind)
                ));
                Vec::new()
            }
        };
        log::info!("load: {} {} records", records.len(), kind.collection());
        batch.insert(kind, records);
    }
    Ok(batch)
}

fn read_collection(path: &Path) -> GateResult<Vec<Value>> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(values) => Ok(values),
        other => Err(GateError::Other(anyhow::anyhow!(
            "expected a JSON array, found {}",
            json_type(&other)
        ))),
    }
}

fn to_records(kind: EntityKind, values: Vec<Value>, log: &mut RunLog) -> Vec<Record> {
    let mut records = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        let kind_name = json_type(&value);
        match Record::from_value(value) {
            Some(record) => records.push(record),
            None => log.load_error(format!(
                "{} entry {position} is {kind_name}, not an object; skipped",
                input_file(kind)
            )),
        }
    }
    records
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Write the clean collections, the failure report and the alerts to `dir`,
/// creating it if needed. Returns the paths written.
///
/// A collection with no clean records leaves no file behind: a stale copy in
/// `dir` (the inputs themselves, when writing in place) is removed so nothing
/// quarantined sits where clean data is picked up.
pub fn write_outputs(dir: &Path, outcome: &GateOutcome) -> GateResult<Vec<String>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for kind in EntityKind::ALL {
        let records = outcome.clean.records(kind);
        if records.is_empty() {
            remove_stale(dir, &input_file(kind))?;
            continue;
        }
        written.push(write_json(dir, &input_file(kind), &records)?);
    }
    written.push(write_json(dir, FAILED_RECORDS_FILE, &outcome.report)?);
    written.push(write_json(dir, RISK_ALERTS_FILE, &outcome.alerts)?);

    log::info!("write: {} artifacts to {}", written.len(), dir.display());
    Ok(written)
}

fn remove_stale(dir: &Path, name: &str) -> GateResult<()> {
    let path = dir.join(name);
    match fs::remove_file(&path) {
        Ok(()) => {
            log::info!("write: removed stale {} (no clean records)", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> GateResult<String> {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    Ok(path.display().to_string())
}
