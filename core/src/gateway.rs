//! Persisted-store gateway.
//!
//! `PersistedStore` is the contract the engine consumes; `GateStore` in
//! store/ is the SQLite implementation. `StoreGateway` wraps an optional
//! store and applies the outage policy: the first failing call records a
//! warning and takes the gateway offline, after which every call answers
//! "nothing found" without touching the store. The engine never halts on
//! a store error.

use crate::{
    error::GateResult,
    record::{EntityKind, KeyField, KeyValue},
    run_log::RunLog,
    types::RecordId,
};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Owner and balance of an account already in the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub account_id:  RecordId,
    pub customer_id: RecordId,
    pub balance:     f64,
}

/// Read-only queries the engine issues against previously persisted data.
/// Every method must accept empty input.
pub trait PersistedStore {
    /// Subset of `values` already present in `kind`'s `field` column.
    fn existing(
        &self,
        kind: EntityKind,
        field: KeyField,
        values: &[KeyValue],
    ) -> GateResult<HashSet<KeyValue>>;

    /// Sum of persisted transaction amounts sent from `account_id` on `date`.
    fn sum_same_day(&self, account_id: RecordId, date: NaiveDate) -> GateResult<f64>;

    fn account_snapshots(&self, ids: &[RecordId]) -> GateResult<HashMap<RecordId, AccountSnapshot>>;

    /// DeviceID → IsVerified for the devices found.
    fn device_verification(&self, ids: &[RecordId]) -> GateResult<HashMap<RecordId, bool>>;
}

pub struct StoreGateway<'s> {
    store:   Option<&'s dyn PersistedStore>,
    offline: bool,
}

impl<'s> StoreGateway<'s> {
    pub fn new(store: Option<&'s dyn PersistedStore>) -> Self {
        Self {
            offline: store.is_none(),
            store,
        }
    }

    /// Gateway with no store behind it. Every store-based check degrades.
    pub fn detached() -> Self {
        Self::new(None)
    }

    pub fn is_online(&self) -> bool {
        !self.offline
    }

    /// Record the reason once on the run log and stop querying.
    fn go_offline(&mut self, op: &str, reason: impl std::fmt::Display, log: &mut RunLog) {
        if !self.offline {
            log.warning(format!(
                "persisted store unavailable during {op} ({reason}); cross-batch checks skipped"
            ));
        }
        self.offline = true;
    }

    fn call<T: Default>(
        &mut self,
        op: &str,
        log: &mut RunLog,
        query: impl FnOnce(&dyn PersistedStore) -> GateResult<T>,
    ) -> T {
        let Some(store) = self.store.filter(|_| !self.offline) else {
            return T::default();
        };
        match query(store) {
            Ok(found) => found,
            Err(e) => {
                self.go_offline(op, e, log);
                T::default()
            }
        }
    }

    pub fn existing(
        &mut self,
        kind: EntityKind,
        field: KeyField,
        values: &BTreeSet<KeyValue>,
        log: &mut RunLog,
    ) -> HashSet<KeyValue> {
        if values.is_empty() {
            return HashSet::new();
        }
        let values: Vec<KeyValue> = values.iter().cloned().collect();
        let op = format!("existence check on {kind}.{field}");
        self.call(&op, log, |store| store.existing(kind, field, &values))
    }

    pub fn sum_same_day(&mut self, account_id: RecordId, date: NaiveDate, log: &mut RunLog) -> f64 {
        self.call("same-day sum", log, |store| store.sum_same_day(account_id, date))
    }

    pub fn account_snapshots(
        &mut self,
        ids: &BTreeSet<RecordId>,
        log: &mut RunLog,
    ) -> HashMap<RecordId, AccountSnapshot> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let ids: Vec<RecordId> = ids.iter().copied().collect();
        self.call("account lookup", log, |store| store.account_snapshots(&ids))
    }

    pub fn device_verification(
        &mut self,
        ids: &BTreeSet<RecordId>,
        log: &mut RunLog,
    ) -> HashMap<RecordId, bool> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let ids: Vec<RecordId> = ids.iter().copied().collect();
        self.call("device verification lookup", log, |store| store.device_verification(&ids))
    }
}
