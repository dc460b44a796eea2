use super::SimStore;
use crate::error::EngineResult;
use crate::types::{InstanceId, Tick};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceRow {
    pub id: InstanceId,
    pub city: String,
    pub scenario: String,
    pub hazard_type: String,
    pub template_id: String,
    pub duration_hours: i64,
    pub tick_minutes: i64,
    pub repair_crews: i64,
    pub total_ticks: Tick,
    pub seed: i64,
    pub status: String,
    pub created_at: i64,
}

impl SimStore {
    // ── Instances ──────────────────────────────────────────────────

    /// Associated function, not a `&self` method: called from inside the
    /// closure `with_transaction` passes a `&Transaction` to, where
    /// `self.store` is already mutably borrowed by the outer call.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_instance(
        tx: &rusqlite::Transaction,
        row: &InstanceRow,
    ) -> EngineResult<()> {
        tx.execute(
            "INSERT INTO scenario_instances
                (id, city, scenario, hazard_type, template_id, duration_hours, tick_minutes,
                 repair_crews, total_ticks, seed, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                row.id,
                row.city,
                row.scenario,
                row.hazard_type,
                row.template_id,
                row.duration_hours,
                row.tick_minutes,
                row.repair_crews,
                row.total_ticks as i64,
                row.seed,
                row.status,
                row.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_instance(&self, id: &str) -> EngineResult<Option<InstanceRow>> {
        self.conn
            .query_row(
                "SELECT id, city, scenario, hazard_type, template_id, duration_hours, tick_minutes,
                        repair_crews, total_ticks, seed, status, created_at
                 FROM scenario_instances WHERE id = ?1",
                params![id],
                Self::row_to_instance,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_instances(&self, limit: i64) -> EngineResult<Vec<InstanceRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, city, scenario, hazard_type, template_id, duration_hours, tick_minutes,
                    repair_crews, total_ticks, seed, status, created_at
             FROM scenario_instances ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], Self::row_to_instance)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn row_to_instance(row: &rusqlite::Row) -> rusqlite::Result<InstanceRow> {
        Ok(InstanceRow {
            id: row.get(0)?,
            city: row.get(1)?,
            scenario: row.get(2)?,
            hazard_type: row.get(3)?,
            template_id: row.get(4)?,
            duration_hours: row.get(5)?,
            tick_minutes: row.get(6)?,
            repair_crews: row.get(7)?,
            total_ticks: row.get::<_, i64>(8)? as u64,
            seed: row.get(9)?,
            status: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}
