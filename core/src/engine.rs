//! The gate engine: one invocation validates one batch.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Field validator       (normalize + presence/format)
//!   2. Referential resolver  (uniqueness, foreign keys, store lookups)
//!   3. Quarantine partitioner
//!   4. Risk policy evaluator (clean data only)
//!
//! RULES:
//!   - Stages share one RunLog and one Rejections set, both owned here.
//!   - The store is read, never written.
//!   - Rejected records never halt the run; only missing input is fatal,
//!     and that is detected by the loader before the engine starts.

use crate::{
    batch::{Batch, Rejections},
    config::GateConfig,
    field_validator::FieldValidator,
    gateway::{PersistedStore, StoreGateway},
    quarantine::{self, FailureReport, RunStatus},
    resolver::{ReferentialResolver, ResolutionSummary},
    risk_policy::{RiskAlert, RiskPolicyEvaluator},
    run_log::RunLog,
    types::RunId,
};
use chrono::NaiveDateTime;

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Accepted records, normalized. Kinds without clean records are absent.
    pub clean:      Batch,
    pub report:     FailureReport,
    pub alerts:     Vec<RiskAlert>,
    pub resolution: ResolutionSummary,
}

impl GateOutcome {
    pub fn status(&self) -> RunStatus {
        self.report.status
    }
}

pub struct GateEngine<'s> {
    pub run_id: RunId,
    config:     GateConfig,
    /// Reference time: future-timestamp cutoff and alert timestamp.
    as_of:      NaiveDateTime,
    store:      Option<&'s dyn PersistedStore>,
}

impl<'s> GateEngine<'s> {
    pub fn new(run_id: RunId, config: GateConfig, as_of: NaiveDateTime) -> Self {
        Self {
            run_id,
            config,
            as_of,
            store: None,
        }
    }

    /// Engine with a fresh run id.
    pub fn build(config: GateConfig, as_of: NaiveDateTime) -> Self {
        Self::new(format!("gate-{}", uuid::Uuid::new_v4()), config, as_of)
    }

    pub fn with_store(mut self, store: &'s dyn PersistedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn run(&self, raw: &Batch) -> GateOutcome {
        self.run_with_log(raw, RunLog::new(self.run_id.clone()))
    }

    /// Run all stages, continuing a log that already holds load issues.
    pub fn run_with_log(&self, raw: &Batch, mut log: RunLog) -> GateOutcome {
        log::info!(
            "run={} gate started: {} records across {} collections",
            self.run_id,
            raw.total_records(),
            raw.kinds().count()
        );
        let mut gateway = StoreGateway::new(self.store);
        if self.store.is_none() {
            log.warning("no persisted store configured; cross-batch checks skipped");
        }
        let mut rejections = Rejections::default();

        // 1. Field validator
        let validator = FieldValidator::new(&self.config.validation, self.as_of);
        let normalized = validator.validate_batch(raw, &mut rejections, &mut log);

        // 2. Referential resolver
        let resolution =
            ReferentialResolver::new().resolve(&normalized, &mut rejections, &mut gateway, &mut log);

        // 3. Quarantine
        let (clean, mut report) = quarantine::partition(&normalized, &rejections, &log);

        // 4. Risk policy
        let evaluator = RiskPolicyEvaluator::new(&self.config.risk, self.as_of);
        let alerts = evaluator.evaluate(&clean, &mut gateway, &mut log);

        // Degradation noticed during the risk pass belongs in the audit artifact too.
        report.warnings = log.warnings.clone();

        log::info!(
            "run={} gate finished: status={:?} rejected={} alerts={}",
            self.run_id,
            report.status,
            rejections.total(),
            alerts.len()
        );
        GateOutcome {
            clean,
            report,
            alerts,
            resolution,
        }
    }
}
