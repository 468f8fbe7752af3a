//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use bankgate_core::{
    config::GateConfig,
    engine::GateEngine,
    record::{parse_timestamp, EntityKind, Record},
    store::GateStore,
};
use chrono::NaiveDateTime;
use serde_json::{json, Value};

/// Reference time for every test run.
pub const AS_OF: &str = "2024-06-01T00:00:00";
/// A business day before AS_OF.
pub const DAY: &str = "2024-05-31";

pub fn as_of() -> NaiveDateTime {
    parse_timestamp(AS_OF).unwrap()
}

pub fn at(time: &str) -> String {
    format!("{DAY}T{time}")
}

pub fn engine<'s>(run_id: &str) -> GateEngine<'s> {
    GateEngine::new(run_id.into(), GateConfig::default(), as_of())
}

pub fn engine_with<'s>(run_id: &str, config: GateConfig) -> GateEngine<'s> {
    GateEngine::new(run_id.into(), config, as_of())
}

pub fn store() -> GateStore {
    let store = GateStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

pub fn seed(store: &GateStore, kind: EntityKind, values: Vec<Value>) {
    for value in values {
        store
            .insert_record(kind, &Record::from_value(value).unwrap())
            .unwrap();
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

pub fn customer(id: i64, national_id: &str, username: &str) -> Value {
    json!({
        "CustomerID": id,
        "NationalID": national_id,
        "Name": format!("Customer {id}"),
        "Address": "12 Harbour Road",
        "Contact": "+84 90 000 0000",
        "Username": username,
        "PasswordHash": "5f4dcc3b5aa765d61d8327deb882cf99"
    })
}

/// Customer with a NationalID and Username derived from the id.
pub fn plain_customer(id: i64) -> Value {
    customer(id, &format!("{:012}", 100_000_000_000 + id), &format!("user{id}"))
}

pub fn device(id: i64, customer_id: i64, verified: bool) -> Value {
    json!({
        "DeviceID": id,
        "CustomerID": customer_id,
        "DeviceType": "MOBILE",
        "DeviceInfo": "Pixel 8",
        "IsVerified": verified,
        "LastUsed": at("08:00:00")
    })
}

pub fn account(id: i64, customer_id: i64, balance: f64) -> Value {
    json!({
        "AccountID": id,
        "CustomerID": customer_id,
        "AccountType": "CHECKING",
        "Balance": balance,
        "Currency": "VND",
        "Status": "ACTIVE"
    })
}

pub fn transaction(id: i64, from: i64, to: i64, device_id: i64, amount: f64, timestamp: &str) -> Value {
    json!({
        "TransactionID": id,
        "FromAccountID": from,
        "ToAccountID": to,
        "DeviceID": device_id,
        "TxnType": "TRANSFER",
        "Amount": amount,
        "Timestamp": timestamp
    })
}

pub fn auth(id: i64, customer_id: i64, device_id: i64, method: &str, status: &str, timestamp: &str) -> Value {
    json!({
        "AuthID": id,
        "CustomerID": customer_id,
        "DeviceID": device_id,
        "AuthMethod": method,
        "AuthStatus": status,
        "Timestamp": timestamp
    })
}
