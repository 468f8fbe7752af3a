//! bankgate-core: record validation and risk assessment for banking batches.
//!
//! A batch of customers, devices, accounts, transactions and authentication
//! logs passes through the gate once. Records that break a field, uniqueness
//! or reference rule are quarantined; the rest are emitted clean and scored
//! against the risk policy. See `engine` for the stage order.

pub mod batch;
pub mod batch_io;
pub mod config;
pub mod engine;
pub mod error;
pub mod field_validator;
pub mod gateway;
pub mod quarantine;
pub mod record;
pub mod resolver;
pub mod risk_policy;
pub mod run_log;
pub mod store;
pub mod types;
