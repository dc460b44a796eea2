//! Scenario materializer (§4.2): turns a template's rules, the operator's
//! anchors, and the city asset inventory into the instance's complete
//! event table.

use std::collections::HashSet;

use crate::error::{EngineError, EngineResult};
use crate::geo::haversine_km;
use crate::rng::RecoveryRng;
use crate::store::{AssetRow, EventRow, RuleRow, SimStore};
use crate::types::{EventKind, SelectionScope, TargetMode, Tick};

/// Everything `prepare()` needs that isn't already in the store.
pub struct PrepareRequest {
    pub city: String,
    pub scenario: String,
    pub duration_hours: i64,
    pub tick_minutes: i64,
    pub repair_crews: i64,
    pub anchors: Vec<(String, f64, f64)>,
    pub seed: u64,
}

pub struct MaterializeOutcome {
    pub total_ticks: Tick,
    pub events: Vec<EventRow>,
    pub events_created: usize,
    pub recoveries_added: usize,
    pub assets_used: usize,
}

const MIN_DURATION_HOURS: i64 = 1;
const MAX_DURATION_HOURS: i64 = 168;
const MIN_TICK_MINUTES: i64 = 1;
const MAX_TICK_MINUTES: i64 = 60;
const MAX_REPAIR_CREWS: i64 = 999;

/// Clamp `(duration_hours, tick_minutes, repair_crews)` to their documented
/// bounds (§3, §4.2.1: "clamp-and-continue" is the default policy).
pub fn clamp_instance_params(duration_hours: i64, tick_minutes: i64, repair_crews: i64) -> (i64, i64, i64) {
    (
        duration_hours.clamp(MIN_DURATION_HOURS, MAX_DURATION_HOURS),
        tick_minutes.clamp(MIN_TICK_MINUTES, MAX_TICK_MINUTES),
        repair_crews.clamp(0, MAX_REPAIR_CREWS),
    )
}

pub fn total_ticks_for(duration_hours: i64, tick_minutes: i64) -> Tick {
    let ticks = (duration_hours * 60) / tick_minutes.max(1);
    ticks.max(1) as Tick
}

/// Build the complete, ordered event list for an instance: rule expansion
/// (§4.2.2) followed by recovery injection (§4.2.3). Does not touch the
/// store — callers persist the returned rows inside their own transaction.
pub fn materialize(
    store: &SimStore,
    instance_id: &str,
    city: &str,
    total_ticks: Tick,
    rules: &[RuleRow],
    anchor_lookup: impl Fn(&str) -> EngineResult<Option<(f64, f64)>>,
    seed: u64,
) -> EngineResult<MaterializeOutcome> {
    let mut events: Vec<EventRow> = Vec::new();
    let mut used_assets: HashSet<String> = HashSet::new();

    for rule in rules {
        let candidates = store.assets_by_sector_subtype(city, &rule.sector, &rule.subtype)?;
        if candidates.is_empty() {
            continue;
        }
        let ordered = order_candidates(candidates, rule, &anchor_lookup)?;
        let k = select_count(rule, ordered.len());
        let mut emitted = 0usize;
        for asset in ordered.into_iter() {
            if emitted >= k {
                break;
            }
            if !rule.allow_reuse_asset && used_assets.contains(&asset.id) {
                continue;
            }
            let Some(event_kind) = EventKind::parse_rule_kind(&rule.event_kind) else { continue };
            let tick_index = clamp_tick(
                (rule.time_pct / 100.0 * total_ticks as f64).ceil() as i64,
                total_ticks,
            );
            let performance_pct = rule.performance_pct.clamp(0.0, 100.0);
            let repair_time_minutes = average_repair_time(rule.repair_time_min, rule.repair_time_max);

            events.push(EventRow {
                instance_id: instance_id.to_string(),
                tick_index,
                event_kind: event_kind.as_str().to_string(),
                asset_id: asset.id.clone(),
                performance_pct,
                repair_time_minutes,
                source_rule_id: Some(rule.rule_id.clone()),
            });
            used_assets.insert(asset.id.clone());
            emitted += 1;
        }
    }

    let assets_used = used_assets.len();
    let events_created = events.len();
    let recoveries = inject_recoveries(instance_id, total_ticks, &events, seed);
    let recoveries_added = recoveries.len();
    events.extend(recoveries);

    Ok(MaterializeOutcome { total_ticks, events, events_created, recoveries_added, assets_used })
}

fn clamp_tick(raw: i64, total_ticks: Tick) -> Tick {
    raw.clamp(0, total_ticks as i64 - 1) as Tick
}

fn average_repair_time(min: Option<f64>, max: Option<f64>) -> Option<f64> {
    match (min, max) {
        (Some(a), Some(b)) => Some(((a + b) / 2.0).floor()),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Apply §4.2.2 step 2: filter/order the candidate pool by selection scope.
fn order_candidates(
    mut candidates: Vec<AssetRow>,
    rule: &RuleRow,
    anchor_lookup: &impl Fn(&str) -> EngineResult<Option<(f64, f64)>>,
) -> EngineResult<Vec<AssetRow>> {
    match SelectionScope::parse(&rule.selection_scope) {
        SelectionScope::GeoRadius => {
            let radius = rule.geo_param_1_km.unwrap_or(0.0);
            let anchor = match &rule.geo_anchor {
                Some(anchor_type) if radius > 0.0 => anchor_lookup(anchor_type)?,
                _ => None,
            };
            if let Some((lat, lng)) = anchor {
                candidates.retain(|a| haversine_km(a.lat, a.lng, lat, lng) <= radius);
            }
            candidates.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(candidates)
        }
        SelectionScope::GraphCentrality => {
            candidates.sort_by(|a, b| b.criticality.cmp(&a.criticality).then_with(|| a.id.cmp(&b.id)));
            Ok(candidates)
        }
        SelectionScope::GeoScatter => {
            candidates.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(candidates)
        }
    }
}

fn select_count(rule: &RuleRow, pool_size: usize) -> usize {
    let n = pool_size as f64;
    match TargetMode::parse(&rule.target_mode) {
        Some(TargetMode::Count) => rule.target_value.clamp(0.0, n) as usize,
        Some(TargetMode::Pct) => ((rule.target_value / 100.0 * n).ceil()).clamp(0.0, n) as usize,
        None => 0,
    }
}

const DELTA_PARTIAL_MIN: i64 = 2;
const DELTA_PARTIAL_MAX: i64 = 10;
const DELTA_FULL_MIN: i64 = 8;
const DELTA_FULL_MAX: i64 = 40;
const DELTA_PERF_MIN: i64 = 20;
const DELTA_PERF_MAX: i64 = 45;

/// §4.2.3: for every damage event, schedule a paired partial/full recovery.
/// Seeded from the instance so that identical inputs plus identical seed
/// reproduce the same injected events.
fn inject_recoveries(instance_id: &str, total_ticks: Tick, events: &[EventRow], seed: u64) -> Vec<EventRow> {
    let mut rng = RecoveryRng::new(seed);
    let mut seen: HashSet<(String, String, Tick, i64)> = HashSet::new();
    let mut out = Vec::new();

    for event in events {
        if event.performance_pct >= 100.0 {
            continue;
        }
        let origin_tick = event.tick_index;
        let damaged = event.performance_pct;

        let delta_partial = rng.range_inclusive(DELTA_PARTIAL_MIN, DELTA_PARTIAL_MAX) as u64;
        let delta_perf = rng.range_inclusive(DELTA_PERF_MIN, DELTA_PERF_MAX) as f64;
        let partial_tick = (origin_tick + delta_partial).min(total_ticks - 1);
        let partial_perf = (damaged + delta_perf).clamp(50.0, 95.0);
        push_recovery(
            &mut out, &mut seen, instance_id, &event.asset_id,
            origin_tick, partial_tick, partial_perf, EventKind::RepairPartial, event,
        );

        let delta_full = rng.range_inclusive(DELTA_FULL_MIN, DELTA_FULL_MAX) as u64;
        let full_tick = (origin_tick + delta_full).min(total_ticks - 1);
        push_recovery(
            &mut out, &mut seen, instance_id, &event.asset_id,
            origin_tick, full_tick, 100.0, EventKind::RepairFull, event,
        );
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn push_recovery(
    out: &mut Vec<EventRow>,
    seen: &mut HashSet<(String, String, Tick, i64)>,
    instance_id: &str,
    asset_id: &str,
    origin_tick: Tick,
    candidate_tick: Tick,
    performance_pct: f64,
    kind: EventKind,
    origin_event: &EventRow,
) {
    if candidate_tick <= origin_tick || performance_pct <= origin_event.performance_pct {
        return;
    }
    let key = (instance_id.to_string(), asset_id.to_string(), candidate_tick, performance_pct.round() as i64);
    if !seen.insert(key) {
        return;
    }
    out.push(EventRow {
        instance_id: instance_id.to_string(),
        tick_index: candidate_tick,
        event_kind: kind.as_str().to_string(),
        asset_id: asset_id.to_string(),
        performance_pct,
        repair_time_minutes: None,
        source_rule_id: origin_event.source_rule_id.clone(),
    });
}

/// Resolve `scenario` to its template/hazard mapping and validate the
/// supplied anchors against the hazard's required anchor type (§4.2.1).
pub fn require_anchor(
    required_anchor: Option<&str>,
    anchors: &[(String, f64, f64)],
) -> EngineResult<()> {
    if let Some(required) = required_anchor {
        if !anchors.iter().any(|(t, _, _)| t == required) {
            return Err(EngineError::MissingAnchor { required_anchor_type: required.to_string() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SimStore;

    fn seed_city(store: &SimStore) {
        store.migrate().unwrap();
        for (id, lat, lng) in [
            ("sub-1", 31.771, 35.221),
            ("sub-2", 31.772, 35.223),
            ("sub-3", 31.775, 35.225),
            ("sub-4", 31.95, 35.40),
            ("sub-5", 32.05, 35.50),
        ] {
            store.insert_asset(id, id, "electricity", "substation", "jerusalem", lat, lng, 3, None).unwrap();
        }
    }

    fn epicenter_rule() -> RuleRow {
        RuleRow {
            rule_id: "r1".into(),
            template_id: "EQ_030".into(),
            event_kind: "IMPACT".into(),
            time_pct: 50.0,
            time_jitter_pct: 0.0,
            selection_scope: "GEO_RADIUS".into(),
            sector: "electricity".into(),
            subtype: "substation".into(),
            target_mode: "PCT".into(),
            target_value: 100.0,
            allow_reuse_asset: false,
            performance_pct: 0.0,
            repair_time_min: None,
            repair_time_max: None,
            geo_anchor: Some("EPICENTER".into()),
            geo_param_1_km: Some(5.0),
            priority: 1,
            enabled: true,
        }
    }

    #[test]
    fn geo_radius_scenario_matches_spec_example_one() {
        let store = SimStore::in_memory().unwrap();
        seed_city(&store);
        let rule = epicenter_rule();
        let anchor = (31.7683, 35.2137);
        let outcome = materialize(
            &store, "inst-1", "jerusalem", 24, std::slice::from_ref(&rule),
            |t| Ok(if t == "EPICENTER" { Some(anchor) } else { None }),
            42,
        ).unwrap();

        assert_eq!(outcome.events_created, 3);
        assert_eq!(outcome.assets_used, 3);
        for e in outcome.events.iter().filter(|e| e.event_kind == "IMPACT") {
            assert_eq!(e.tick_index, 12);
            assert_eq!(e.performance_pct, 0.0);
        }
        assert_eq!(outcome.recoveries_added, 6);
    }

    #[test]
    fn empty_candidate_pool_contributes_zero_events_without_error() {
        let store = SimStore::in_memory().unwrap();
        store.migrate().unwrap();
        let mut rule = epicenter_rule();
        rule.sector = "water".into();
        let outcome = materialize(
            &store, "inst-2", "jerusalem", 24, std::slice::from_ref(&rule),
            |_| Ok(None), 1,
        ).unwrap();
        assert_eq!(outcome.events_created, 0);
    }

    #[test]
    fn time_pct_zero_and_hundred_hit_tick_boundaries() {
        assert_eq!(clamp_tick((0.0_f64 / 100.0 * 24.0).ceil() as i64, 24), 0);
        assert_eq!(clamp_tick((100.0_f64 / 100.0 * 24.0).ceil() as i64, 24), 23);
    }

    #[test]
    fn same_seed_reproduces_identical_recovery_events() {
        let store = SimStore::in_memory().unwrap();
        seed_city(&store);
        let rule = epicenter_rule();
        let anchor = (31.7683, 35.2137);
        let a = materialize(
            &store, "inst-1", "jerusalem", 24, std::slice::from_ref(&rule),
            |t| Ok(if t == "EPICENTER" { Some(anchor) } else { None }), 99,
        ).unwrap();
        let b = materialize(
            &store, "inst-1", "jerusalem", 24, std::slice::from_ref(&rule),
            |t| Ok(if t == "EPICENTER" { Some(anchor) } else { None }), 99,
        ).unwrap();
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn reuse_disallowed_rules_never_double_book_an_asset() {
        let store = SimStore::in_memory().unwrap();
        seed_city(&store);
        let rule_a = epicenter_rule();
        let mut rule_b = epicenter_rule();
        rule_b.rule_id = "r2".into();
        rule_b.geo_param_1_km = Some(50.0);
        let anchor = (31.7683, 35.2137);
        let outcome = materialize(
            &store, "inst-3", "jerusalem", 24, &[rule_a, rule_b],
            |t| Ok(if t == "EPICENTER" { Some(anchor) } else { None }), 7,
        ).unwrap();
        let impact_asset_ids: Vec<&str> =
            outcome.events.iter().filter(|e| e.event_kind == "IMPACT").map(|e| e.asset_id.as_str()).collect();
        let unique: HashSet<&str> = impact_asset_ids.iter().copied().collect();
        assert_eq!(impact_asset_ids.len(), unique.len());
    }
}
