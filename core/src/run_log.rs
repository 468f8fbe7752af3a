//! Per-invocation issue accumulator.
//!
//! RULE: Components never keep their own issue lists or touch global state.
//! Each engine run owns exactly one RunLog and passes it `&mut` into every
//! stage. Entries are mirrored to the `log` facade as they are recorded.

use crate::types::RunId;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub run_id:   RunId,
    /// Data problems, in the order they were found. Any entry makes the run PARTIAL.
    pub issues:   Vec<String>,
    /// Degraded operation (store outages, skipped lookups). Informational only.
    pub warnings: Vec<String>,
}

impl RunLog {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            issues: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn issue(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("run={} {message}", self.run_id);
        self.issues.push(message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("run={} degraded: {message}", self.run_id);
        self.warnings.push(message);
    }

    /// A load failure: logged at error level, recorded as an issue.
    pub fn load_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("run={} {message}", self.run_id);
        self.issues.push(message);
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}
