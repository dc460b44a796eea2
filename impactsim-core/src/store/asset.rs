use super::SimStore;
use crate::error::EngineResult;
use crate::types::AssetId;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRow {
    pub id: AssetId,
    pub name: String,
    pub sector: String,
    pub subtype: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub criticality: i64,
    pub metadata: Option<String>,
}

impl SimStore {
    // ── Asset ──────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn insert_asset(
        &self,
        id: &str,
        name: &str,
        sector: &str,
        subtype: &str,
        city: &str,
        lat: f64,
        lng: f64,
        criticality: i64,
        metadata: Option<&str>,
    ) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO assets (id, name, sector, subtype, city, lat, lng, criticality, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, sector=excluded.sector, subtype=excluded.subtype,
                city=excluded.city, lat=excluded.lat, lng=excluded.lng,
                criticality=excluded.criticality, metadata=excluded.metadata",
            params![id, name, sector, subtype, city, lat, lng, criticality, metadata],
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO asset_operational_state (asset_id, status) VALUES (?1, 'active')",
            params![id],
        )?;
        Ok(())
    }

    pub fn get_asset(&self, id: &str) -> EngineResult<Option<AssetRow>> {
        self.conn
            .query_row(
                "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata
                 FROM assets WHERE id = ?1",
                params![id],
                Self::row_to_asset,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All assets in a city matching `(sector, subtype)` — the rule's
    /// candidate set (§4.2.2 step 1).
    pub fn assets_by_sector_subtype(
        &self,
        city: &str,
        sector: &str,
        subtype: &str,
    ) -> EngineResult<Vec<AssetRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata
             FROM assets WHERE city = ?1 AND sector = ?2 AND subtype = ?3
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![city, sector, subtype], Self::row_to_asset)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every asset in a city, keyed for batch resolution (dependency
    /// resolver §4.1 loads ids in one batch after traversal).
    pub fn assets_by_ids(&self, ids: &[AssetId]) -> EngineResult<Vec<AssetRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata
             FROM assets WHERE id IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), Self::row_to_asset)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn assets_in_city(&self, city: &str) -> EngineResult<Vec<AssetRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, sector, subtype, city, lat, lng, criticality, metadata
             FROM assets WHERE city = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![city], Self::row_to_asset)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn row_to_asset(row: &rusqlite::Row) -> rusqlite::Result<AssetRow> {
        Ok(AssetRow {
            id: row.get(0)?,
            name: row.get(1)?,
            sector: row.get(2)?,
            subtype: row.get(3)?,
            city: row.get(4)?,
            lat: row.get(5)?,
            lng: row.get(6)?,
            criticality: row.get(7)?,
            metadata: row.get(8)?,
        })
    }
}
