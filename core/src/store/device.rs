use super::{placeholders, GateStore, MAX_BOUND_PARAMS};
use crate::{error::GateResult, types::RecordId};
use rusqlite::params_from_iter;
use std::collections::HashMap;

impl GateStore {
    // ── Device ────────────────────────────────────────────────────

    pub fn devices_verified(&self, ids: &[RecordId]) -> GateResult<HashMap<RecordId, bool>> {
        let mut found = HashMap::new();
        for chunk in ids.chunks(MAX_BOUND_PARAMS) {
            let sql = format!(
                "SELECT DeviceID, IsVerified FROM Device WHERE DeviceID IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, RecordId>(0)?, row.get::<_, i64>(1)? != 0))
            })?;
            for row in rows {
                let (device_id, verified) = row?;
                found.insert(device_id, verified);
            }
        }
        Ok(found)
    }
}
