use super::{placeholders, GateStore, MAX_BOUND_PARAMS};
use crate::{error::GateResult, gateway::AccountSnapshot, types::RecordId};
use rusqlite::params_from_iter;
use std::collections::HashMap;

impl GateStore {
    // ── Account ───────────────────────────────────────────────────

    pub fn accounts_by_id(&self, ids: &[RecordId]) -> GateResult<HashMap<RecordId, AccountSnapshot>> {
        let mut found = HashMap::new();
        for chunk in ids.chunks(MAX_BOUND_PARAMS) {
            let sql = format!(
                "SELECT AccountID, CustomerID, Balance FROM Account WHERE AccountID IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok(AccountSnapshot {
                    account_id: row.get(0)?,
                    customer_id: row.get(1)?,
                    balance: row.get(2)?,
                })
            })?;
            for snapshot in rows {
                let snapshot = snapshot?;
                found.insert(snapshot.account_id, snapshot);
            }
        }
        Ok(found)
    }
}
