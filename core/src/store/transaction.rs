use super::GateStore;
use crate::{error::GateResult, types::RecordId};
use chrono::NaiveDate;
use rusqlite::params;

impl GateStore {
    // ── Transaction ───────────────────────────────────────────────

    /// Total persisted amount sent from an account on one calendar day.
    /// Timestamps are stored canonically, so the day is the first 10 chars.
    pub fn sent_on_day(&self, account_id: RecordId, date: NaiveDate) -> GateResult<f64> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(Amount), 0.0) FROM \"Transaction\"
             WHERE FromAccountID = ?1 AND substr(Timestamp, 1, 10) = ?2",
            params![account_id, date.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
