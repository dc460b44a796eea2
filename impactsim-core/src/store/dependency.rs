use super::SimStore;
use crate::error::EngineResult;
use crate::types::AssetId;
use rusqlite::params;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyRow {
    pub provider_asset_id: AssetId,
    pub consumer_asset_id: AssetId,
    pub dependency_type: String,
    pub priority: i64,
    pub is_active: bool,
}

impl SimStore {
    // ── Dependency edges ───────────────────────────────────────────

    pub fn insert_dependency(
        &self,
        provider_asset_id: &str,
        consumer_asset_id: &str,
        dependency_type: &str,
        priority: i64,
        is_active: bool,
    ) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO asset_dependencies (provider_asset_id, consumer_asset_id, dependency_type, priority, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![provider_asset_id, consumer_asset_id, dependency_type, priority, is_active as i64],
        )?;
        Ok(())
    }

    /// The full active-edge snapshot, loaded once per resolver call
    /// (§4.1: "a single call observes a consistent active-edge snapshot
    /// taken at call entry").
    pub fn active_dependencies(&self) -> EngineResult<Vec<DependencyRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT provider_asset_id, consumer_asset_id, dependency_type, priority, is_active
             FROM asset_dependencies WHERE is_active = 1",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DependencyRow {
                provider_asset_id: row.get(0)?,
                consumer_asset_id: row.get(1)?,
                dependency_type: row.get(2)?,
                priority: row.get(3)?,
                is_active: row.get::<_, i64>(4)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
