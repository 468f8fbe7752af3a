//! Shared primitive types used across the engine.

/// Integer primary/foreign key of any banking record.
pub type RecordId = i64;

/// Identifier of one engine invocation. Tags every artifact the run writes.
pub type RunId = String;

/// Index of a record inside its entity collection for the current batch.
pub type RecordIndex = usize;
