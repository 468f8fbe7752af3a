//! In-memory batch: one record collection per entity kind, plus the
//! rejection set that every stage of the gate adds to.

use crate::{
    record::{EntityKind, Record},
    types::RecordIndex,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    collections: BTreeMap<EntityKind, Vec<Record>>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by tests and the loader: objects only, anything else is dropped.
    pub fn with(mut self, kind: EntityKind, values: Vec<Value>) -> Self {
        let records = values.into_iter().filter_map(Record::from_value).collect();
        self.insert(kind, records);
        self
    }

    pub fn insert(&mut self, kind: EntityKind, records: Vec<Record>) {
        self.collections.insert(kind, records);
    }

    /// Records of one kind; empty when the kind never appeared in the batch.
    pub fn records(&self, kind: EntityKind) -> &[Record] {
        self.collections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.collections.contains_key(&kind)
    }

    /// Kinds present in the batch, in dependency order.
    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.collections.keys().copied()
    }

    pub fn total_records(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Indexes of rejected records, per entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rejections {
    by_kind: BTreeMap<EntityKind, BTreeSet<RecordIndex>>,
}

impl Rejections {
    /// Mark a record rejected. Returns false if it already was.
    pub fn reject(&mut self, kind: EntityKind, index: RecordIndex) -> bool {
        self.by_kind.entry(kind).or_default().insert(index)
    }

    pub fn is_rejected(&self, kind: EntityKind, index: RecordIndex) -> bool {
        self.by_kind
            .get(&kind)
            .is_some_and(|set| set.contains(&index))
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.by_kind.get(&kind).map_or(0, BTreeSet::len)
    }

    pub fn total(&self) -> usize {
        self.by_kind.values().map(BTreeSet::len).sum()
    }
}
