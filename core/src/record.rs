//! Batch records: entity kinds, key fields, and the JSON record wrapper.
//!
//! RULE: Records stay as loosely-typed JSON maps until the field validator
//! has passed them. Only clean records are converted into the typed views
//! at the bottom of this file.

use crate::types::RecordId;
use chrono::{DateTime, NaiveDateTime};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fields that carry timestamps and are re-rendered canonically on normalization.
pub const TIMESTAMP_FIELDS: [&str; 2] = ["Timestamp", "LastUsed"];

// ── Entity kinds ─────────────────────────────────────────────────────────────

/// Every entity type in a batch.
///
/// Variant order is the dependency order (Customer → Device → Account →
/// Transaction → AuthLog). Each kind only references kinds declared before
/// it, and `Ord` follows declaration order, so a `BTreeMap<EntityKind, _>`
/// iterates in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Device,
    Account,
    Transaction,
    AuthLog,
}

/// A foreign-key field on a referencing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub field:  &'static str,
    pub target: KeyField,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Customer,
        EntityKind::Device,
        EntityKind::Account,
        EntityKind::Transaction,
        EntityKind::AuthLog,
    ];

    /// Name of the input/output collection (and its JSON file stem).
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Customer    => "customers",
            EntityKind::Device      => "devices",
            EntityKind::Account     => "accounts",
            EntityKind::Transaction => "transactions",
            EntityKind::AuthLog     => "auth_logs",
        }
    }

    /// Table name in the persisted store.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Customer    => "Customer",
            EntityKind::Device      => "Device",
            EntityKind::Account     => "Account",
            EntityKind::Transaction => "Transaction",
            EntityKind::AuthLog     => "AuthenticationLog",
        }
    }

    pub fn primary_key(self) -> KeyField {
        match self {
            EntityKind::Customer    => KeyField::CustomerId,
            EntityKind::Device      => KeyField::DeviceId,
            EntityKind::Account     => KeyField::AccountId,
            EntityKind::Transaction => KeyField::TransactionId,
            EntityKind::AuthLog     => KeyField::AuthId,
        }
    }

    /// Key fields that must be unique across the batch and the store.
    /// Only customers carry secondary unique keys.
    pub fn unique_keys(self) -> &'static [KeyField] {
        match self {
            EntityKind::Customer => &[KeyField::CustomerId, KeyField::NationalId, KeyField::Username],
            EntityKind::Device      => &[KeyField::DeviceId],
            EntityKind::Account     => &[KeyField::AccountId],
            EntityKind::Transaction => &[KeyField::TransactionId],
            EntityKind::AuthLog     => &[KeyField::AuthId],
        }
    }

    /// Foreign keys, in the order they are checked.
    pub fn foreign_keys(self) -> &'static [ForeignKey] {
        const CUSTOMER: ForeignKey = ForeignKey { field: "CustomerID", target: KeyField::CustomerId };
        const DEVICE: ForeignKey = ForeignKey { field: "DeviceID", target: KeyField::DeviceId };
        match self {
            EntityKind::Customer => &[],
            EntityKind::Device   => &[CUSTOMER],
            EntityKind::Account  => &[CUSTOMER],
            EntityKind::Transaction => &[
                ForeignKey { field: "FromAccountID", target: KeyField::AccountId },
                ForeignKey { field: "ToAccountID",   target: KeyField::AccountId },
                DEVICE,
            ],
            EntityKind::AuthLog => &[CUSTOMER, DEVICE],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

// ── Key fields and values ────────────────────────────────────────────────────

/// A primary or unique key column. Foreign keys resolve against these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyField {
    CustomerId,
    NationalId,
    Username,
    DeviceId,
    AccountId,
    TransactionId,
    AuthId,
}

impl KeyField {
    pub fn column(self) -> &'static str {
        match self {
            KeyField::CustomerId    => "CustomerID",
            KeyField::NationalId    => "NationalID",
            KeyField::Username      => "Username",
            KeyField::DeviceId      => "DeviceID",
            KeyField::AccountId     => "AccountID",
            KeyField::TransactionId => "TransactionID",
            KeyField::AuthId        => "AuthID",
        }
    }

    /// The entity kind whose records own this key.
    pub fn owner(self) -> EntityKind {
        match self {
            KeyField::CustomerId | KeyField::NationalId | KeyField::Username => EntityKind::Customer,
            KeyField::DeviceId      => EntityKind::Device,
            KeyField::AccountId     => EntityKind::Account,
            KeyField::TransactionId => EntityKind::Transaction,
            KeyField::AuthId        => EntityKind::AuthLog,
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(self, KeyField::NationalId | KeyField::Username)
    }
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The value held in a key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v)  => write!(f, "{v}"),
            KeyValue::Text(v) => write!(f, "'{v}'"),
        }
    }
}

impl From<RecordId> for KeyValue {
    fn from(v: RecordId) -> Self {
        KeyValue::Int(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

// ── Record ───────────────────────────────────────────────────────────────────

/// One input record, keyed by the field names of the data model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap a JSON value; `None` if it is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn int_field(&self, field: &str) -> Option<i64> {
        self.0.get(field).and_then(Value::as_i64)
    }

    /// Read a key column, typed the way the store holds it.
    pub fn key(&self, field: KeyField) -> Option<KeyValue> {
        if field.is_textual() {
            self.str_field(field.column()).map(KeyValue::from)
        } else {
            self.int_field(field.column()).map(KeyValue::Int)
        }
    }

    /// Human-readable handle used in issue strings, e.g. `Customer 17`.
    pub fn label(&self, kind: EntityKind) -> String {
        match self.key(kind.primary_key()) {
            Some(KeyValue::Int(id)) => format!("{kind} {id}"),
            _ => format!("{kind} (no valid {})", kind.primary_key()),
        }
    }

    /// Return a normalized copy: strings trimmed, parseable timestamps
    /// re-rendered canonically. The receiver is left untouched.
    pub fn normalized(&self) -> Record {
        let fields = self
            .0
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => {
                        let trimmed = s.trim();
                        let canonical = TIMESTAMP_FIELDS
                            .contains(&name.as_str())
                            .then(|| parse_timestamp(trimmed))
                            .flatten()
                            .map(format_timestamp);
                        Value::String(canonical.unwrap_or_else(|| trimmed.to_string()))
                    }
                    other => other.clone(),
                };
                (name.clone(), value)
            })
            .collect();
        Record(fields)
    }

    /// Convert into one of the typed views.
    pub fn typed<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

// ── Timestamps ───────────────────────────────────────────────────────────────

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp. Offsets are converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Canonical rendering: `YYYY-MM-DDTHH:MM:SS` plus a fraction only when non-zero.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

// ── Typed views of clean records ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(rename = "DeviceID")]
    pub device_id:   RecordId,
    #[serde(rename = "CustomerID")]
    pub customer_id: RecordId,
    #[serde(rename = "IsVerified")]
    pub is_verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    #[serde(rename = "AccountID")]
    pub account_id:  RecordId,
    #[serde(rename = "CustomerID")]
    pub customer_id: RecordId,
    #[serde(rename = "Balance")]
    pub balance:     f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    #[serde(rename = "TransactionID")]
    pub transaction_id:  RecordId,
    #[serde(rename = "FromAccountID")]
    pub from_account_id: RecordId,
    #[serde(rename = "ToAccountID")]
    pub to_account_id:   RecordId,
    #[serde(rename = "DeviceID")]
    pub device_id:       RecordId,
    #[serde(rename = "Amount")]
    pub amount:          f64,
    #[serde(rename = "Timestamp")]
    pub timestamp:       NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthLog {
    #[serde(rename = "AuthID")]
    pub auth_id:     RecordId,
    #[serde(rename = "CustomerID")]
    pub customer_id: RecordId,
    #[serde(rename = "DeviceID")]
    pub device_id:   RecordId,
    #[serde(rename = "AuthMethod")]
    pub auth_method: String,
    #[serde(rename = "AuthStatus")]
    pub auth_status: String,
    #[serde(rename = "Timestamp")]
    pub timestamp:   NaiveDateTime,
}
