use super::SimStore;
use crate::error::EngineResult;
use rusqlite::params;

impl SimStore {
    // ── Scenario anchors ──────────────────────────────────────────

    /// Associated function, not a `&self` method: called from inside the
    /// closure `with_transaction` passes a `&Transaction` to, where
    /// `self.store` is already mutably borrowed by the outer call.
    pub fn insert_anchor(
        tx: &rusqlite::Transaction,
        instance_id: &str,
        anchor_type: &str,
        lat: f64,
        lng: f64,
    ) -> EngineResult<()> {
        tx.execute(
            "INSERT INTO scenario_instance_anchors (instance_id, anchor_type, lat, lng)
             VALUES (?1, ?2, ?3, ?4)",
            params![instance_id, anchor_type, lat, lng],
        )?;
        Ok(())
    }
}
