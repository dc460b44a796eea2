use super::SimStore;
use crate::error::EngineResult;
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRow {
    pub template_id: String,
    pub name: String,
    pub hazard_type: String,
    pub version: i64,
    pub is_active: bool,
}

impl SimStore {
    // ── Templates ──────────────────────────────────────────────────

    /// Upsert by `template_id` (§6 CSV import: "Upsert is by
    /// (template_id) for templates").
    pub fn upsert_template(
        &self,
        template_id: &str,
        name: &str,
        hazard_type: &str,
        version: i64,
        is_active: bool,
    ) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO scenario_templates (template_id, name, hazard_type, version, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(template_id) DO UPDATE SET
                name=excluded.name, hazard_type=excluded.hazard_type,
                version=excluded.version, is_active=excluded.is_active",
            params![template_id, name, hazard_type, version, is_active as i64],
        )?;
        Ok(())
    }

    pub fn get_template(&self, template_id: &str) -> EngineResult<Option<TemplateRow>> {
        self.conn
            .query_row(
                "SELECT template_id, name, hazard_type, version, is_active
                 FROM scenario_templates WHERE template_id = ?1",
                params![template_id],
                |row| {
                    Ok(TemplateRow {
                        template_id: row.get(0)?,
                        name: row.get(1)?,
                        hazard_type: row.get(2)?,
                        version: row.get(3)?,
                        is_active: row.get::<_, i64>(4)? != 0,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}
