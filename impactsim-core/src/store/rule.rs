use super::SimStore;
use crate::error::EngineResult;
use rusqlite::params;

#[derive(Debug, Clone, PartialEq)]
pub struct RuleRow {
    pub rule_id: String,
    pub template_id: String,
    pub event_kind: String,
    pub time_pct: f64,
    pub time_jitter_pct: f64,
    pub selection_scope: String,
    pub sector: String,
    pub subtype: String,
    pub target_mode: String,
    pub target_value: f64,
    pub allow_reuse_asset: bool,
    pub performance_pct: f64,
    pub repair_time_min: Option<f64>,
    pub repair_time_max: Option<f64>,
    pub geo_anchor: Option<String>,
    pub geo_param_1_km: Option<f64>,
    pub priority: i64,
    pub enabled: bool,
}

impl SimStore {
    // ── Template rules ─────────────────────────────────────────────

    /// Upsert by `rule_id` (§6 CSV import: "Upsert is by (rule_id) for
    /// rules. Re-import is idempotent.").
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_rule(&self, rule: &RuleRow) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO scenario_template_rules
                (rule_id, template_id, event_kind, time_pct, time_jitter_pct, selection_scope,
                 sector, subtype, target_mode, target_value, allow_reuse_asset, performance_pct,
                 repair_time_min, repair_time_max, geo_anchor, geo_param_1_km, priority, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT(rule_id) DO UPDATE SET
                template_id=excluded.template_id, event_kind=excluded.event_kind,
                time_pct=excluded.time_pct, time_jitter_pct=excluded.time_jitter_pct,
                selection_scope=excluded.selection_scope, sector=excluded.sector,
                subtype=excluded.subtype, target_mode=excluded.target_mode,
                target_value=excluded.target_value, allow_reuse_asset=excluded.allow_reuse_asset,
                performance_pct=excluded.performance_pct, repair_time_min=excluded.repair_time_min,
                repair_time_max=excluded.repair_time_max, geo_anchor=excluded.geo_anchor,
                geo_param_1_km=excluded.geo_param_1_km, priority=excluded.priority,
                enabled=excluded.enabled",
            params![
                rule.rule_id,
                rule.template_id,
                rule.event_kind,
                rule.time_pct,
                rule.time_jitter_pct,
                rule.selection_scope,
                rule.sector,
                rule.subtype,
                rule.target_mode,
                rule.target_value,
                rule.allow_reuse_asset as i64,
                rule.performance_pct,
                rule.repair_time_min,
                rule.repair_time_max,
                rule.geo_anchor,
                rule.geo_param_1_km,
                rule.priority,
                rule.enabled as i64,
            ],
        )?;
        Ok(())
    }

    /// Rules for a template, in materializer scan order (§4.2.2:
    /// `time_pct ASC, priority DESC, rule_id ASC`). Only enabled rules
    /// are returned.
    pub fn rules_for_template(&self, template_id: &str) -> EngineResult<Vec<RuleRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT rule_id, template_id, event_kind, time_pct, time_jitter_pct, selection_scope,
                    sector, subtype, target_mode, target_value, allow_reuse_asset, performance_pct,
                    repair_time_min, repair_time_max, geo_anchor, geo_param_1_km, priority, enabled
             FROM scenario_template_rules
             WHERE template_id = ?1 AND enabled = 1
             ORDER BY time_pct ASC, priority DESC, rule_id ASC",
        )?;
        let rows = stmt.query_map(params![template_id], Self::row_to_rule)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn row_to_rule(row: &rusqlite::Row) -> rusqlite::Result<RuleRow> {
        Ok(RuleRow {
            rule_id: row.get(0)?,
            template_id: row.get(1)?,
            event_kind: row.get(2)?,
            time_pct: row.get(3)?,
            time_jitter_pct: row.get(4)?,
            selection_scope: row.get(5)?,
            sector: row.get(6)?,
            subtype: row.get(7)?,
            target_mode: row.get(8)?,
            target_value: row.get(9)?,
            allow_reuse_asset: row.get::<_, i64>(10)? != 0,
            performance_pct: row.get(11)?,
            repair_time_min: row.get(12)?,
            repair_time_max: row.get(13)?,
            geo_anchor: row.get(14)?,
            geo_param_1_km: row.get(15)?,
            priority: row.get(16)?,
            enabled: row.get::<_, i64>(17)? != 0,
        })
    }
}
