//! Uniqueness & Referential Resolver.
//!
//! PHASES (fixed order, one call to `resolve` per batch):
//!   1. Initial pass over entity kinds in dependency order. Unique keys are
//!      checked against `seen` (accepted records only). Each foreign key is
//!      either linked to an accepted batch record or deferred into the
//!      pending registry, including keys whose batch copy was rejected.
//!   2. Store uniqueness: one batched existence query per unique key field
//!      over every accepted value.
//!   3. Pending resolution: one batched existence query per referenced key
//!      field over every deferred value. Values the store lacks fail; the
//!      issue says "rejected" when the batch carried a rejected copy.
//!   4. Cascade: a reference satisfied by a batch record that was rejected
//!      in phase 2 or 3 fails, unless the key exists in the store.
//!
//! RULES:
//!   - A rejected record never satisfies uniqueness or a foreign key.
//!   - Store lookups are batched per key field, never per record.
//!   - A store outage degrades to "nothing found" (see gateway.rs).

use crate::{
    batch::{Batch, Rejections},
    gateway::StoreGateway,
    record::{EntityKind, ForeignKey, KeyField, KeyValue},
    run_log::RunLog,
    types::RecordIndex,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owner {
    kind:  EntityKind,
    index: RecordIndex,
}

/// One foreign-key field on one referencing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reference {
    kind:  EntityKind,
    index: RecordIndex,
    fk:    ForeignKey,
}

/// A reference satisfied inside the batch.
#[derive(Debug, Clone)]
struct Link {
    reference: Reference,
    value:     KeyValue,
    owner:     Owner,
}

/// Counters reported after a resolver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub intra_batch_duplicates: usize,
    /// Unresolved references whose only batch copy was rejected.
    pub rejected_targets:       usize,
    /// References parked in the pending registry during the initial pass.
    pub deferred:               usize,
    pub resolved_from_store:    usize,
    pub unresolved:             usize,
    pub store_duplicates:       usize,
    pub cascaded:               usize,
}

#[derive(Default)]
pub struct ReferentialResolver {
    /// key field → value → accepted batch record carrying it.
    seen:          HashMap<KeyField, BTreeMap<KeyValue, Owner>>,
    /// Primary-key values carried only by rejected batch records.
    rejected_keys: HashMap<KeyField, HashSet<KeyValue>>,
    /// Deferred references: referenced key field → value → referencing records.
    pending:       BTreeMap<KeyField, BTreeMap<KeyValue, Vec<Reference>>>,
    links:         Vec<Link>,
    /// Values the store confirmed present, per key field.
    in_store:      HashMap<KeyField, HashSet<KeyValue>>,
    summary:       ResolutionSummary,
}

impl ReferentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all four phases. `batch` must already be normalized and field-validated;
    /// records failing here are added to `rejections`.
    pub fn resolve(
        mut self,
        batch: &Batch,
        rejections: &mut Rejections,
        gateway: &mut StoreGateway<'_>,
        log: &mut RunLog,
    ) -> ResolutionSummary {
        for kind in batch.kinds() {
            self.initial_pass(kind, batch, rejections, log);
        }
        self.check_store_duplicates(batch, rejections, gateway, log);
        self.resolve_pending(batch, rejections, gateway, log);
        self.cascade(batch, rejections, log);

        log::info!(
            "resolver: deferred={} resolved_from_store={} rejected_targets={} unresolved={} store_duplicates={} cascaded={}",
            self.summary.deferred,
            self.summary.resolved_from_store,
            self.summary.rejected_targets,
            self.summary.unresolved,
            self.summary.store_duplicates,
            self.summary.cascaded
        );
        self.summary
    }

    // ── Phase 1 ────────────────────────────────────────────────────

    fn initial_pass(
        &mut self,
        kind: EntityKind,
        batch: &Batch,
        rejections: &mut Rejections,
        log: &mut RunLog,
    ) {
        let records = batch.records(kind);
        let pk = kind.primary_key();

        // Field-validation failures never count, but their keys are remembered
        // so a reference the store cannot satisfy names the rejected copy.
        for (index, record) in records.iter().enumerate() {
            if rejections.is_rejected(kind, index) {
                self.remember_rejected(pk, record.key(pk));
            }
        }

        'records: for (index, record) in records.iter().enumerate() {
            if rejections.is_rejected(kind, index) {
                continue;
            }
            let label = record.label(kind);

            for &field in kind.unique_keys() {
                let Some(value) = record.key(field) else { continue };
                if self.seen.get(&field).is_some_and(|m| m.contains_key(&value)) {
                    log.issue(format!(
                        "Duplicate {kind}.{field} {value}: {label} repeats a value already accepted in this batch"
                    ));
                    rejections.reject(kind, index);
                    self.summary.intra_batch_duplicates += 1;
                    self.remember_rejected(pk, record.key(pk));
                    continue 'records;
                }
            }

            let mut links = Vec::new();
            let mut deferred = Vec::new();
            for &fk in kind.foreign_keys() {
                let Some(id) = record.int_field(fk.field) else { continue };
                let value = KeyValue::Int(id);
                let reference = Reference { kind, index, fk };

                if let Some(&owner) = self.seen.get(&fk.target).and_then(|m| m.get(&value)) {
                    links.push(Link { reference, value, owner });
                } else {
                    deferred.push((value, reference));
                }
            }

            for &field in kind.unique_keys() {
                if let Some(value) = record.key(field) {
                    self.seen
                        .entry(field)
                        .or_default()
                        .insert(value, Owner { kind, index });
                }
            }
            self.links.extend(links);
            self.summary.deferred += deferred.len();
            for (value, reference) in deferred {
                self.pending
                    .entry(reference.fk.target)
                    .or_default()
                    .entry(value)
                    .or_default()
                    .push(reference);
            }
        }
    }

    fn remember_rejected(&mut self, pk: KeyField, value: Option<KeyValue>) {
        let Some(value) = value else { return };
        if !self.seen.get(&pk).is_some_and(|m| m.contains_key(&value)) {
            self.rejected_keys.entry(pk).or_default().insert(value);
        }
    }

    // ── Phase 2 ────────────────────────────────────────────────────

    fn check_store_duplicates(
        &mut self,
        batch: &Batch,
        rejections: &mut Rejections,
        gateway: &mut StoreGateway<'_>,
        log: &mut RunLog,
    ) {
        for kind in EntityKind::ALL {
            for &field in kind.unique_keys() {
                let Some(accepted) = self.seen.get(&field) else { continue };
                let values: BTreeSet<KeyValue> = accepted
                    .iter()
                    .filter(|(_, owner)| !rejections.is_rejected(owner.kind, owner.index))
                    .map(|(value, _)| value.clone())
                    .collect();

                let found = gateway.existing(kind, field, &values, log);
                let mut hits: Vec<&KeyValue> = found.iter().collect();
                hits.sort();
                for value in hits {
                    let Some(owner) = accepted.get(value) else { continue };
                    if rejections.reject(owner.kind, owner.index) {
                        let label = batch.records(owner.kind)[owner.index].label(owner.kind);
                        log.issue(format!(
                            "Duplicate {kind}.{field} {value}: {label} already exists in the persisted store"
                        ));
                        self.summary.store_duplicates += 1;
                    }
                }
                self.in_store.entry(field).or_default().extend(found);
            }
        }
    }

    // ── Phase 3 ────────────────────────────────────────────────────

    fn resolve_pending(
        &mut self,
        batch: &Batch,
        rejections: &mut Rejections,
        gateway: &mut StoreGateway<'_>,
        log: &mut RunLog,
    ) {
        let pending = std::mem::take(&mut self.pending);
        for (target, by_value) in pending {
            let live = |refs: &Vec<Reference>| {
                refs.iter()
                    .any(|r| !rejections.is_rejected(r.kind, r.index))
            };
            let values: BTreeSet<KeyValue> = by_value
                .iter()
                .filter(|(_, refs)| live(refs))
                .map(|(value, _)| value.clone())
                .collect();

            let found = gateway.existing(target.owner(), target, &values, log);
            let suffix = if gateway.is_online() { "" } else { " (persisted store unavailable)" };
            let rejected = self.rejected_keys.get(&target);

            for (value, refs) in &by_value {
                for r in refs {
                    if rejections.is_rejected(r.kind, r.index) {
                        continue;
                    }
                    if found.contains(value) {
                        self.summary.resolved_from_store += 1;
                        continue;
                    }
                    rejections.reject(r.kind, r.index);
                    let label = batch.records(r.kind)[r.index].label(r.kind);
                    if rejected.is_some_and(|s| s.contains(value)) {
                        self.summary.rejected_targets += 1;
                        log.issue(format!(
                            "Invalid foreign key: {label}.{} = {value} references a rejected {}{suffix}",
                            r.fk.field,
                            target.owner()
                        ));
                    } else {
                        self.summary.unresolved += 1;
                        log.issue(format!(
                            "Unresolved foreign key: {label}.{} = {value} not found in this batch or the persisted store{suffix}",
                            r.fk.field
                        ));
                    }
                }
            }
            self.in_store.entry(target).or_default().extend(found);
        }
    }

    // ── Phase 4 ────────────────────────────────────────────────────

    fn cascade(&mut self, batch: &Batch, rejections: &mut Rejections, log: &mut RunLog) {
        loop {
            let mut changed = false;
            for link in &self.links {
                let r = link.reference;
                if rejections.is_rejected(r.kind, r.index)
                    || !rejections.is_rejected(link.owner.kind, link.owner.index)
                {
                    continue;
                }
                let persisted = self
                    .in_store
                    .get(&r.fk.target)
                    .is_some_and(|s| s.contains(&link.value));
                if persisted {
                    continue;
                }
                rejections.reject(r.kind, r.index);
                self.summary.cascaded += 1;
                changed = true;
                let label = batch.records(r.kind)[r.index].label(r.kind);
                log.issue(format!(
                    "Invalid foreign key: {label}.{} = {} references a rejected {}",
                    r.fk.field,
                    link.value,
                    link.owner.kind
                ));
            }
            if !changed {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer(id: i64, national_id: &str, username: &str) -> serde_json::Value {
        json!({
            "CustomerID": id, "NationalID": national_id, "Name": "N", "Address": "A",
            "Contact": "C", "Username": username, "PasswordHash": "h"
        })
    }

    #[test]
    fn duplicate_national_id_rejects_later_record_only() {
        let batch = Batch::new().with(
            EntityKind::Customer,
            vec![
                customer(1, "111111111111", "a"),
                customer(2, "111111111111", "b"),
            ],
        );
        let mut rejections = Rejections::default();
        let mut log = RunLog::new("resolver-dup".into());
        let summary = ReferentialResolver::new().resolve(
            &batch,
            &mut rejections,
            &mut StoreGateway::detached(),
            &mut log,
        );

        assert!(!rejections.is_rejected(EntityKind::Customer, 0));
        assert!(rejections.is_rejected(EntityKind::Customer, 1));
        assert_eq!(summary.intra_batch_duplicates, 1);
        assert!(log.issues[0].contains("NationalID"));
    }

    #[test]
    fn reference_to_rejected_record_fails_when_store_lacks_it() {
        let batch = Batch::new()
            .with(EntityKind::Customer, vec![customer(1, "111111111111", "a")])
            .with(
                EntityKind::Device,
                vec![json!({"DeviceID": 10, "CustomerID": 1}), json!({"DeviceID": 11, "CustomerID": 1})],
            );
        let mut rejections = Rejections::default();
        rejections.reject(EntityKind::Customer, 0);
        let mut log = RunLog::new("resolver-fk".into());
        let summary = ReferentialResolver::new().resolve(
            &batch,
            &mut rejections,
            &mut StoreGateway::detached(),
            &mut log,
        );

        assert_eq!(summary.deferred, 2);
        assert_eq!(summary.rejected_targets, 2);
        assert_eq!(summary.unresolved, 0);
        assert_eq!(rejections.count(EntityKind::Device), 2);
        assert!(log.issues[0].contains("references a rejected Customer"));
    }

    #[test]
    fn unknown_reference_is_deferred_then_fails_without_store() {
        let batch = Batch::new().with(
            EntityKind::Account,
            vec![json!({"AccountID": 5, "CustomerID": 99})],
        );
        let mut rejections = Rejections::default();
        let mut log = RunLog::new("resolver-pending".into());
        let summary = ReferentialResolver::new().resolve(
            &batch,
            &mut rejections,
            &mut StoreGateway::detached(),
            &mut log,
        );

        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.unresolved, 1);
        assert!(rejections.is_rejected(EntityKind::Account, 0));
        assert!(log.issues[0].contains("persisted store unavailable"));
    }
}
