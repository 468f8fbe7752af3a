//! SQLite persisted store.
//!
//! RULE: Only store/ talks to the database.
//! The engine reaches it through the PersistedStore trait; it never
//! executes SQL directly, and it never writes during a gate run.

use crate::{
    error::GateResult,
    gateway::{AccountSnapshot, PersistedStore},
    record::{EntityKind, KeyField, KeyValue, Record},
    types::RecordId,
};
use chrono::NaiveDate;
use rusqlite::{
    params_from_iter,
    types::{ToSqlOutput, Value as SqlValue},
    Connection, ToSql,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

mod account;
mod device;
mod transaction;

/// Stay well under SQLite's bound-parameter limit for `IN (...)` lists.
const MAX_BOUND_PARAMS: usize = 900;

pub struct GateStore {
    conn: Connection,
}

impl GateStore {
    pub fn open(path: &str) -> GateResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an existing store without creating it. A missing file is an error,
    /// which the runner treats as a store outage.
    pub fn open_existing(path: &str) -> GateResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GateResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GateResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_persisted_store.sql"))?;
        Ok(())
    }

    // ── Promotion ──────────────────────────────────────────────────

    /// Insert one record into its table. Fields that are not columns of the
    /// table are ignored. Used to seed fixture stores.
    pub fn insert_record(&self, kind: EntityKind, record: &Record) -> GateResult<()> {
        let columns = columns(kind);
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            kind.table(),
            columns.join(", "),
            placeholders(columns.len())
        );
        let values = columns
            .iter()
            .map(|c| json_to_sql(record.get(c).unwrap_or(&Value::Null)));
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    pub fn row_count(&self, kind: EntityKind) -> GateResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", kind.table());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    // ── Existence ──────────────────────────────────────────────────

    fn existing_values(
        &self,
        kind: EntityKind,
        field: KeyField,
        values: &[KeyValue],
    ) -> GateResult<HashSet<KeyValue>> {
        let mut found = HashSet::new();
        for chunk in values.chunks(MAX_BOUND_PARAMS) {
            let sql = format!(
                "SELECT {col} FROM \"{table}\" WHERE {col} IN ({})",
                placeholders(chunk.len()),
                col = field.column(),
                table = kind.table(),
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                row.get::<_, SqlValue>(0)
            })?;
            for value in rows {
                match value? {
                    SqlValue::Integer(v) => found.insert(KeyValue::Int(v)),
                    SqlValue::Text(v) => found.insert(KeyValue::Text(v)),
                    _ => false,
                };
            }
        }
        Ok(found)
    }
}

impl PersistedStore for GateStore {
    fn existing(
        &self,
        kind: EntityKind,
        field: KeyField,
        values: &[KeyValue],
    ) -> GateResult<HashSet<KeyValue>> {
        self.existing_values(kind, field, values)
    }

    fn sum_same_day(&self, account_id: RecordId, date: NaiveDate) -> GateResult<f64> {
        self.sent_on_day(account_id, date)
    }

    fn account_snapshots(&self, ids: &[RecordId]) -> GateResult<HashMap<RecordId, AccountSnapshot>> {
        self.accounts_by_id(ids)
    }

    fn device_verification(&self, ids: &[RecordId]) -> GateResult<HashMap<RecordId, bool>> {
        self.devices_verified(ids)
    }
}

impl ToSql for KeyValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            KeyValue::Int(v) => ToSqlOutput::from(*v),
            KeyValue::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}

/// Placeholder list `?, ?, ?` for an `IN (...)` clause of `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Customer => &[
            "CustomerID", "NationalID", "Name", "Address", "Contact", "Username", "PasswordHash",
        ],
        EntityKind::Device => &[
            "DeviceID", "CustomerID", "DeviceType", "DeviceInfo", "IsVerified", "LastUsed",
        ],
        EntityKind::Account => &[
            "AccountID", "CustomerID", "AccountType", "Balance", "Currency", "Status",
        ],
        EntityKind::Transaction => &[
            "TransactionID", "FromAccountID", "ToAccountID", "DeviceID", "TxnType", "Amount",
            "Timestamp",
        ],
        EntityKind::AuthLog => &[
            "AuthID", "CustomerID", "DeviceID", "AuthMethod", "AuthStatus", "Timestamp",
        ],
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
