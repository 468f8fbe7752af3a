//! Field Validator: presence and format checks per entity.
//!
//! Every record is first normalized (strings trimmed, timestamps made
//! canonical) into a new record, then checked field by field in a fixed
//! order. The first failing field rejects the record and nothing else is
//! checked for it. Data problems are issues on the RunLog, never errors.

use crate::{
    batch::{Batch, Rejections},
    config::ValidationConfig,
    record::{parse_timestamp, EntityKind, Record},
    run_log::RunLog,
};
use chrono::NaiveDateTime;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRule {
    /// Integer identifier (primary or foreign key).
    Id,
    /// Non-blank string, optionally restricted by the configured vocabulary.
    Text,
    /// Fixed-length all-digit string.
    NationalId,
    Flag,
    NonNegative,
    Positive,
    Timestamp,
    /// Timestamp that may not lie after the run's reference time.
    EventTime,
}

fn rules(kind: EntityKind) -> &'static [(&'static str, FieldRule)] {
    use FieldRule::*;
    match kind {
        EntityKind::Customer => &[
            ("CustomerID", Id),
            ("NationalID", NationalId),
            ("Name", Text),
            ("Address", Text),
            ("Contact", Text),
            ("Username", Text),
            ("PasswordHash", Text),
        ],
        EntityKind::Device => &[
            ("DeviceID", Id),
            ("CustomerID", Id),
            ("DeviceType", Text),
            ("DeviceInfo", Text),
            ("IsVerified", Flag),
            ("LastUsed", Timestamp),
        ],
        EntityKind::Account => &[
            ("AccountID", Id),
            ("CustomerID", Id),
            ("AccountType", Text),
            ("Balance", NonNegative),
            ("Currency", Text),
            ("Status", Text),
        ],
        EntityKind::Transaction => &[
            ("TransactionID", Id),
            ("FromAccountID", Id),
            ("ToAccountID", Id),
            ("DeviceID", Id),
            ("TxnType", Text),
            ("Amount", Positive),
            ("Timestamp", EventTime),
        ],
        EntityKind::AuthLog => &[
            ("AuthID", Id),
            ("CustomerID", Id),
            ("DeviceID", Id),
            ("AuthMethod", Text),
            ("AuthStatus", Text),
            ("Timestamp", Timestamp),
        ],
    }
}

pub struct FieldValidator<'a> {
    config: &'a ValidationConfig,
    as_of:  NaiveDateTime,
}

impl<'a> FieldValidator<'a> {
    pub fn new(config: &'a ValidationConfig, as_of: NaiveDateTime) -> Self {
        Self { config, as_of }
    }

    /// Normalize and check every record of the batch.
    ///
    /// Returns the normalized batch (same shape and order as `raw`); every
    /// failing record is added to `rejections` with one issue on `log`.
    pub fn validate_batch(
        &self,
        raw: &Batch,
        rejections: &mut Rejections,
        log: &mut RunLog,
    ) -> Batch {
        let mut normalized = Batch::new();
        for kind in raw.kinds() {
            let records: Vec<Record> = raw.records(kind).iter().map(Record::normalized).collect();
            for (index, record) in records.iter().enumerate() {
                if let Err(issue) = self.check(kind, record) {
                    rejections.reject(kind, index);
                    log.issue(issue);
                }
            }
            log::info!(
                "field validation: {} {} checked, {} rejected",
                records.len(),
                kind.collection(),
                rejections.count(kind)
            );
            normalized.insert(kind, records);
        }
        normalized
    }

    /// Check one (already normalized) record. Stops at the first failing field.
    pub fn check(&self, kind: EntityKind, record: &Record) -> Result<(), String> {
        for &(field, rule) in rules(kind) {
            let value = match record.get(field) {
                None | Some(Value::Null) => {
                    return Err(format!(
                        "NULL value in {kind}.{field} for {}",
                        record.label(kind)
                    ));
                }
                Some(Value::String(s)) if s.trim().is_empty() => {
                    return Err(format!(
                        "Blank value in {kind}.{field} for {}",
                        record.label(kind)
                    ));
                }
                Some(v) => v,
            };
            self.check_format(kind, field, rule, value).map_err(|reason| {
                format!("Invalid format in {kind}.{field} for {}: {reason}", record.label(kind))
            })?;
        }
        Ok(())
    }

    fn check_format(
        &self,
        kind: EntityKind,
        field: &str,
        rule: FieldRule,
        value: &Value,
    ) -> Result<(), String> {
        match rule {
            FieldRule::Id => match value.as_i64() {
                Some(_) => Ok(()),
                None => Err(format!("expected an integer identifier, got {value}")),
            },
            FieldRule::Text => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("expected text, got {value}"))?;
                match self.config.allowed(kind.table(), field) {
                    Some(allowed) if !allowed.iter().any(|a| a.eq_ignore_ascii_case(text)) => {
                        Err(format!("'{text}' is not one of {}", allowed.join(", ")))
                    }
                    _ => Ok(()),
                }
            }
            FieldRule::NationalId => {
                let digits = self.config.national_id_digits;
                match value.as_str() {
                    Some(s) if s.len() == digits && s.bytes().all(|b| b.is_ascii_digit()) => Ok(()),
                    Some(s) => Err(format!("expected {digits} digits, got '{s}'")),
                    None => Err(format!("expected {digits} digits, got {value}")),
                }
            }
            FieldRule::Flag => match value {
                Value::Bool(_) => Ok(()),
                other => Err(format!("expected true or false, got {other}")),
            },
            FieldRule::NonNegative => match value.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => Ok(()),
                Some(n) => Err(format!("must be >= 0, got {n}")),
                None => Err(format!("expected a number, got {value}")),
            },
            FieldRule::Positive => match value.as_f64() {
                Some(n) if n.is_finite() && n > 0.0 => Ok(()),
                Some(n) => Err(format!("must be > 0, got {n}")),
                None => Err(format!("expected a number, got {value}")),
            },
            FieldRule::Timestamp | FieldRule::EventTime => {
                let ts = value
                    .as_str()
                    .and_then(parse_timestamp)
                    .ok_or_else(|| format!("expected an ISO-8601 timestamp, got {value}"))?;
                if rule == FieldRule::EventTime
                    && self.config.reject_future_timestamps
                    && ts > self.as_of
                {
                    return Err(format!("future timestamp {value}"));
                }
                Ok(())
            }
        }
    }
}
