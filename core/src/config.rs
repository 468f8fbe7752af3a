use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Field validation ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Exact number of digits a NationalID must carry.
    pub national_id_digits: usize,
    /// Reject transactions stamped after the run's reference time.
    pub reject_future_timestamps: bool,
    /// `"Entity.Field"` → allowed values, compared case-insensitively.
    /// A missing or empty list leaves the field unrestricted.
    #[serde(default)]
    pub allowed_values: HashMap<String, Vec<String>>,
}

impl ValidationConfig {
    pub fn allowed(&self, table: &str, field: &str) -> Option<&[String]> {
        self.allowed_values
            .get(&format!("{table}.{field}"))
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let vocab = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        Self {
            national_id_digits: 12,
            reject_future_timestamps: true,
            allowed_values: [
                ("Account.AccountType".to_string(), vocab(&["CHECKING", "SAVINGS", "BUSINESS"])),
                ("Account.Status".to_string(), vocab(&["ACTIVE", "FROZEN", "CLOSED"])),
                ("Account.Currency".to_string(), vocab(&["USD", "VND", "EUR"])),
                ("Transaction.TxnType".to_string(), vocab(&["TRANSFER", "PAYMENT"])),
                ("AuthenticationLog.AuthMethod".to_string(), vocab(&["PASSWORD", "OTP", "BIOMETRIC"])),
                ("AuthenticationLog.AuthStatus".to_string(), vocab(&["SUCCESS", "FAIL", "FAILED"])),
            ]
            .into(),
        }
    }
}

// ── Risk policy ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicyConfig {
    /// R1 fires above this single-transaction amount.
    pub high_value_threshold: f64,
    /// R4 fires once a customer's same-day total exceeds this.
    pub daily_limit: f64,
    /// Authentication methods that count as strong (upper-case).
    pub strong_auth_methods: Vec<String>,
    pub success_status: String,
    pub failure_statuses: Vec<String>,
    /// R5 fires at this many failed authentications per customer.
    pub failed_auth_threshold: usize,
}

impl RiskPolicyConfig {
    pub fn is_strong(&self, method: &str) -> bool {
        self.strong_auth_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn is_success(&self, status: &str) -> bool {
        self.success_status.eq_ignore_ascii_case(status)
    }

    pub fn is_failure(&self, status: &str) -> bool {
        self.failure_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
    }
}

impl Default for RiskPolicyConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: 10_000_000.0,
            daily_limit: 20_000_000.0,
            strong_auth_methods: vec!["BIOMETRIC".into(), "OTP".into()],
            success_status: "SUCCESS".into(),
            failure_statuses: vec!["FAIL".into(), "FAILED".into()],
            failed_auth_threshold: 3,
        }
    }
}

// ── Engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub risk: RiskPolicyConfig,
}

impl GateConfig {
    /// Load from a JSON file such as `data/gate_config.json`.
    /// In tests, use GateConfig::default().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: GateConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if config.risk.daily_limit <= 0.0 || config.risk.high_value_threshold <= 0.0 {
            anyhow::bail!("{path}: risk thresholds must be positive");
        }
        Ok(config)
    }
}
