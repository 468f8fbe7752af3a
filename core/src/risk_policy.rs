//! Risk Policy Evaluator: flags clean transactions that break security rules.
//!
//! Rules, evaluated per transaction in batch order, independently:
//!   R1 High value without strong authentication      (HIGH)
//!   R2 Unverified device                              (MEDIUM)
//!   R3 Origin balance below the transaction amount    (HIGH)
//!   R4 Daily cumulative total over the limit          (HIGH)
//! and once per customer over the authentication log:
//!   R5 Repeated authentication failure                (MEDIUM)
//!
//! R1 looks at the latest successful authentication on the (customer, device)
//! pair at or before the transaction's timestamp. A later login never clears
//! an earlier transfer.
//!
//! All state lives in RiskState and is scoped to one evaluation. Store
//! lookups go through the gateway, so an outage degrades (devices count as
//! unverified, same-day sums seed at zero) instead of aborting the pass.

use crate::{
    batch::Batch,
    config::RiskPolicyConfig,
    gateway::{AccountSnapshot, StoreGateway},
    record::{format_timestamp, Account, AuthLog, Device, EntityKind, Transaction},
    run_log::RunLog,
    types::RecordId,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRule {
    HighValueNoStrongAuth,
    UnverifiedDevice,
    InsufficientBalance,
    DailyLimitExceeded,
    RepeatedAuthFailure,
}

impl RiskRule {
    pub fn code(self) -> &'static str {
        match self {
            RiskRule::HighValueNoStrongAuth => "R1",
            RiskRule::UnverifiedDevice      => "R2",
            RiskRule::InsufficientBalance   => "R3",
            RiskRule::DailyLimitExceeded    => "R4",
            RiskRule::RepeatedAuthFailure   => "R5",
        }
    }

    pub fn level(self) -> AlertLevel {
        match self {
            RiskRule::UnverifiedDevice | RiskRule::RepeatedAuthFailure => AlertLevel::Medium,
            _ => AlertLevel::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAlert {
    #[serde(rename = "AlertID")]
    pub alert_id:       u64,
    #[serde(rename = "CustomerID")]
    pub customer_id:    RecordId,
    #[serde(rename = "TransactionID")]
    pub transaction_id: Option<RecordId>,
    #[serde(rename = "AlertType")]
    pub rule:           RiskRule,
    #[serde(rename = "RuleCode")]
    pub rule_code:      &'static str,
    #[serde(rename = "AlertLevel")]
    pub level:          AlertLevel,
    #[serde(rename = "Description")]
    pub description:    String,
    #[serde(rename = "Timestamp")]
    pub timestamp:      String,
}

/// In-memory accumulators for one evaluation.
#[derive(Default)]
struct RiskState {
    /// (customer, day) → running total, seeded from the store.
    daily_totals:     HashMap<(RecordId, NaiveDate), f64>,
    /// (account, day) pairs whose persisted same-day sum is already included.
    seeded:           HashSet<(RecordId, NaiveDate)>,
    /// (customer, day) pairs that already raised R4. A customer is alerted at
    /// most once per calendar day; a batch spanning several days can alert the
    /// same customer once on each day that crosses the limit.
    limit_alerted:    HashSet<(RecordId, NaiveDate)>,
    /// (customer, day) pairs with at least one strong-auth success.
    strong_auth_days: HashSet<(RecordId, NaiveDate)>,
    /// (customer, device) → successful authentications, oldest first.
    successes:        HashMap<(RecordId, RecordId), Vec<(NaiveDateTime, String)>>,
    failed_auths:     BTreeMap<RecordId, usize>,
}

impl RiskState {
    /// Method of the latest success on (customer, device) at or before `at`.
    fn latest_success_before(&self, customer: RecordId, device: RecordId, at: NaiveDateTime) -> Option<&str> {
        let history = self.successes.get(&(customer, device))?;
        let upto = history.partition_point(|(ts, _)| *ts <= at);
        history[..upto].last().map(|(_, method)| method.as_str())
    }
}

pub struct RiskPolicyEvaluator<'a> {
    config: &'a RiskPolicyConfig,
    as_of:  NaiveDateTime,
}

impl<'a> RiskPolicyEvaluator<'a> {
    pub fn new(config: &'a RiskPolicyConfig, as_of: NaiveDateTime) -> Self {
        Self { config, as_of }
    }

    /// Evaluate every clean transaction in `clean`. Alerts are numbered from 1
    /// in emission order.
    pub fn evaluate(
        &self,
        clean: &Batch,
        gateway: &mut StoreGateway<'_>,
        log: &mut RunLog,
    ) -> Vec<RiskAlert> {
        let devices: HashMap<RecordId, Device> = typed::<Device>(clean, EntityKind::Device, log)
            .into_iter()
            .map(|d| (d.device_id, d))
            .collect();
        let mut accounts: HashMap<RecordId, AccountSnapshot> = typed::<Account>(clean, EntityKind::Account, log)
            .into_iter()
            .map(|a| {
                (a.account_id, AccountSnapshot {
                    account_id: a.account_id,
                    customer_id: a.customer_id,
                    balance: a.balance,
                })
            })
            .collect();
        let transactions: Vec<Transaction> = typed(clean, EntityKind::Transaction, log);
        let auth_logs: Vec<AuthLog> = typed(clean, EntityKind::AuthLog, log);

        let mut state = RiskState::default();
        self.index_auth_logs(&auth_logs, &mut state);

        // Origins and devices missing from the batch are looked up in one call each.
        let missing_accounts: BTreeSet<RecordId> = transactions
            .iter()
            .map(|t| t.from_account_id)
            .filter(|id| !accounts.contains_key(id))
            .collect();
        accounts.extend(gateway.account_snapshots(&missing_accounts, log));

        let missing_devices: BTreeSet<RecordId> = transactions
            .iter()
            .map(|t| t.device_id)
            .filter(|id| !devices.contains_key(id))
            .collect();
        let stored_devices = gateway.device_verification(&missing_devices, log);

        let mut alerts = Vec::new();
        for txn in &transactions {
            let Some(origin) = accounts.get(&txn.from_account_id).copied() else {
                log.warning(format!(
                    "Transaction {}: origin account {} could not be resolved; risk rules skipped",
                    txn.transaction_id, txn.from_account_id
                ));
                continue;
            };
            let customer = origin.customer_id;

            // R1
            if txn.amount > self.config.high_value_threshold {
                let method = state
                    .latest_success_before(customer, txn.device_id, txn.timestamp);
                if !method.is_some_and(|m| self.config.is_strong(m)) {
                    let auth = method.unwrap_or("no successful authentication");
                    self.emit(&mut alerts, RiskRule::HighValueNoStrongAuth, customer, Some(txn.transaction_id), format!(
                        "Transaction {} of {:.2} authenticated by {auth}; strong authentication required above {:.2}",
                        txn.transaction_id, txn.amount, self.config.high_value_threshold
                    ));
                }
            }

            // R2
            let verified = devices
                .get(&txn.device_id)
                .map(|d| d.is_verified)
                .or_else(|| stored_devices.get(&txn.device_id).copied())
                .unwrap_or(false);
            if !verified {
                self.emit(&mut alerts, RiskRule::UnverifiedDevice, customer, Some(txn.transaction_id), format!(
                    "Transaction {} from unverified device {}",
                    txn.transaction_id, txn.device_id
                ));
            }

            // R3
            if origin.balance < txn.amount {
                self.emit(&mut alerts, RiskRule::InsufficientBalance, customer, Some(txn.transaction_id), format!(
                    "Account {} balance {:.2} is below transaction {} amount {:.2}",
                    origin.account_id, origin.balance, txn.transaction_id, txn.amount
                ));
            }

            // R4
            let day = txn.timestamp.date();
            if state.seeded.insert((origin.account_id, day)) {
                let persisted = gateway.sum_same_day(origin.account_id, day, log);
                *state.daily_totals.entry((customer, day)).or_default() += persisted;
            }
            let total = state.daily_totals.entry((customer, day)).or_default();
            *total += txn.amount;
            let total = *total;
            if total > self.config.daily_limit
                && !state.strong_auth_days.contains(&(customer, day))
                && state.limit_alerted.insert((customer, day))
            {
                self.emit(&mut alerts, RiskRule::DailyLimitExceeded, customer, Some(txn.transaction_id), format!(
                    "Customer {customer} daily total {total:.2} on {day} exceeds limit {:.2} without strong authentication",
                    self.config.daily_limit
                ));
            }
        }

        // R5
        for (&customer, &count) in &state.failed_auths {
            if count >= self.config.failed_auth_threshold {
                self.emit(&mut alerts, RiskRule::RepeatedAuthFailure, customer, None, format!(
                    "Customer {customer} has {count} failed authentication attempts"
                ));
            }
        }

        log::info!(
            "risk policy: {} transactions evaluated, {} alerts",
            transactions.len(),
            alerts.len()
        );
        alerts
    }

    fn index_auth_logs(&self, auth_logs: &[AuthLog], state: &mut RiskState) {
        for auth in auth_logs {
            if self.config.is_success(&auth.auth_status) {
                let method = auth.auth_method.to_ascii_uppercase();
                if self.config.is_strong(&method) {
                    state
                        .strong_auth_days
                        .insert((auth.customer_id, auth.timestamp.date()));
                }
                state
                    .successes
                    .entry((auth.customer_id, auth.device_id))
                    .or_default()
                    .push((auth.timestamp, method));
            } else if self.config.is_failure(&auth.auth_status) {
                *state.failed_auths.entry(auth.customer_id).or_default() += 1;
            }
        }
        // Stable, so equal timestamps keep batch order and the later entry wins.
        for history in state.successes.values_mut() {
            history.sort_by_key(|(at, _)| *at);
        }
    }

    fn emit(
        &self,
        alerts: &mut Vec<RiskAlert>,
        rule: RiskRule,
        customer_id: RecordId,
        transaction_id: Option<RecordId>,
        description: String,
    ) {
        log::debug!("risk policy: {} {description}", rule.code());
        alerts.push(RiskAlert {
            alert_id: alerts.len() as u64 + 1,
            customer_id,
            transaction_id,
            rule,
            rule_code: rule.code(),
            level: rule.level(),
            description,
            timestamp: format_timestamp(self.as_of),
        });
    }
}

/// Convert the clean records of one kind into typed views, skipping (with a
/// warning) any record that no longer fits its type.
fn typed<T: DeserializeOwned>(clean: &Batch, kind: EntityKind, log: &mut RunLog) -> Vec<T> {
    clean
        .records(kind)
        .iter()
        .filter_map(|record| match record.typed::<T>() {
            Ok(view) => Some(view),
            Err(e) => {
                log.warning(format!(
                    "{} skipped by risk policy: {e}",
                    record.label(kind)
                ));
                None
            }
        })
        .collect()
}
