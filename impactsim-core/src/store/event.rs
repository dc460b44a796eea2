use super::SimStore;
use crate::error::EngineResult;
use crate::types::Tick;
use rusqlite::params;

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub instance_id: String,
    pub tick_index: Tick,
    pub event_kind: String,
    pub asset_id: String,
    pub performance_pct: f64,
    pub repair_time_minutes: Option<f64>,
    pub source_rule_id: Option<String>,
}

impl SimStore {
    // ── Scenario events ────────────────────────────────────────────

    /// Associated function, not a `&self` method: called from inside the
    /// closure `with_transaction` passes a `&Transaction` to, where
    /// `self.store` is already mutably borrowed by the outer call.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_event(
        tx: &rusqlite::Transaction,
        row: &EventRow,
    ) -> EngineResult<()> {
        tx.execute(
            "INSERT INTO scenario_events
                (instance_id, tick_index, event_kind, asset_id, performance_pct,
                 repair_time_minutes, source_rule_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.instance_id,
                row.tick_index as i64,
                row.event_kind,
                row.asset_id,
                row.performance_pct,
                row.repair_time_minutes,
                row.source_rule_id,
            ],
        )?;
        Ok(())
    }

    /// Full event timeline for an instance, ordered by tick then
    /// insertion order — the order both the materializer writes and the
    /// runner replays (§4.3.1).
    pub fn events_for_instance(&self, instance_id: &str) -> EngineResult<Vec<EventRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT instance_id, tick_index, event_kind, asset_id, performance_pct,
                    repair_time_minutes, source_rule_id
             FROM scenario_events
             WHERE instance_id = ?1
             ORDER BY tick_index ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![instance_id], Self::row_to_event)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Events scheduled for exactly one tick, in the same stable order.
    pub fn events_at_tick(&self, instance_id: &str, tick: Tick) -> EngineResult<Vec<EventRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT instance_id, tick_index, event_kind, asset_id, performance_pct,
                    repair_time_minutes, source_rule_id
             FROM scenario_events
             WHERE instance_id = ?1 AND tick_index = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![instance_id, tick as i64], Self::row_to_event)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<EventRow> {
        Ok(EventRow {
            instance_id: row.get(0)?,
            tick_index: row.get::<_, i64>(1)? as u64,
            event_kind: row.get(2)?,
            asset_id: row.get(3)?,
            performance_pct: row.get(4)?,
            repair_time_minutes: row.get(5)?,
            source_rule_id: row.get(6)?,
        })
    }
}
