//! CSV rule import (§6.1). Shared by `impactsim-tools` and any other host
//! that needs to load `scenario_template_rules`/`scenario_templates` from
//! a spreadsheet export.

use std::io::Read;

use crate::config::parse_bool;
use crate::error::{EngineError, EngineResult};
use crate::store::{RuleRow, SimStore};

const EXPECTED_HEADER: &[&str] = &[
    "template_id", "template_name", "hazard_type", "rule_id", "event_kind", "time_pct",
    "time_jitter_pct", "selection_scope", "sector", "subtype", "target_mode", "target_value",
    "allow_reuse_asset", "performance_pct", "repair_time_min", "repair_time_max", "geo_anchor",
    "geo_param_1_km", "priority", "notes",
];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportSummary {
    pub templates_upserted: usize,
    pub rules_upserted: usize,
}

fn parse_optional_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        trimmed.parse().ok()
    }
}

/// Import rules (and their owning templates) from a CSV reader. Upsert is
/// by `(template_id)` for templates and `(rule_id)` for rules — re-import
/// of the same file is idempotent (§6, §8).
pub fn import_rules(store: &SimStore, reader: impl Read) -> EngineResult<ImportSummary> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let header_names: Vec<&str> = headers.iter().collect();
    if header_names != EXPECTED_HEADER {
        return Err(EngineError::bad_input(format!(
            "rule CSV header mismatch: expected {EXPECTED_HEADER:?}, got {header_names:?}"
        )));
    }

    let mut summary = ImportSummary::default();
    let mut seen_templates = std::collections::HashSet::new();

    for record in csv_reader.records() {
        let record = record?;
        let row = RuleCsvRow::from_record(&record)?;

        if seen_templates.insert(row.template_id.clone()) {
            store.upsert_template(&row.template_id, &row.template_name, &row.hazard_type, 1, true)?;
            summary.templates_upserted += 1;
        }

        let rule = RuleRow {
            rule_id: row.rule_id,
            template_id: row.template_id,
            event_kind: row.event_kind,
            time_pct: row.time_pct,
            time_jitter_pct: row.time_jitter_pct,
            selection_scope: row.selection_scope,
            sector: row.sector,
            subtype: row.subtype,
            target_mode: row.target_mode,
            target_value: row.target_value,
            allow_reuse_asset: row.allow_reuse_asset,
            performance_pct: row.performance_pct,
            repair_time_min: row.repair_time_min,
            repair_time_max: row.repair_time_max,
            geo_anchor: row.geo_anchor,
            geo_param_1_km: row.geo_param_1_km,
            priority: row.priority,
            enabled: true,
        };
        store.upsert_rule(&rule)?;
        summary.rules_upserted += 1;
    }

    Ok(summary)
}

struct RuleCsvRow {
    template_id: String,
    template_name: String,
    hazard_type: String,
    rule_id: String,
    event_kind: String,
    time_pct: f64,
    time_jitter_pct: f64,
    selection_scope: String,
    sector: String,
    subtype: String,
    target_mode: String,
    target_value: f64,
    allow_reuse_asset: bool,
    performance_pct: f64,
    repair_time_min: Option<f64>,
    repair_time_max: Option<f64>,
    geo_anchor: Option<String>,
    geo_param_1_km: Option<f64>,
    priority: i64,
}

impl RuleCsvRow {
    fn from_record(record: &csv::StringRecord) -> EngineResult<Self> {
        let field = |idx: usize| -> &str { record.get(idx).unwrap_or("") };
        let bad = |what: &str| EngineError::bad_input(format!("rule CSV row: invalid {what}"));

        let allow_reuse_asset =
            parse_bool(field(12)).ok_or_else(|| bad("allow_reuse_asset"))?;
        let time_pct: f64 = field(5).trim().parse().map_err(|_| bad("time_pct"))?;
        let time_jitter_pct: f64 = field(6).trim().parse().unwrap_or(0.0);
        let target_value: f64 = field(11).trim().parse().map_err(|_| bad("target_value"))?;
        let performance_pct: f64 = field(13).trim().parse().map_err(|_| bad("performance_pct"))?;
        let priority: i64 = field(18).trim().parse().unwrap_or(1);
        let geo_anchor_raw = field(16).trim();

        Ok(Self {
            template_id: field(0).trim().to_string(),
            template_name: field(1).trim().to_string(),
            hazard_type: field(2).trim().to_string(),
            rule_id: field(3).trim().to_string(),
            event_kind: field(4).trim().to_uppercase(),
            time_pct,
            time_jitter_pct,
            selection_scope: field(7).trim().to_uppercase(),
            sector: field(8).trim().to_string(),
            subtype: field(9).trim().to_string(),
            target_mode: field(10).trim().to_uppercase(),
            target_value,
            allow_reuse_asset,
            performance_pct,
            repair_time_min: parse_optional_f64(field(14)),
            repair_time_max: parse_optional_f64(field(15)),
            geo_anchor: if geo_anchor_raw.is_empty() { None } else { Some(geo_anchor_raw.to_string()) },
            geo_param_1_km: parse_optional_f64(field(17)),
            priority,
        })
    }
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        EngineError::bad_input(format!("rule CSV parse error: {e}"))
    }
}
