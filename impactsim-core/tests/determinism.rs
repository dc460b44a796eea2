//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Two prepares, same inputs, same seed.
//! They must produce byte-identical event tables.
//! Any divergence is a blocker — do not merge until fixed.

use std::sync::Arc;

use impactsim_core::engine::ScenarioEngine;
use impactsim_core::materializer::PrepareRequest;
use impactsim_core::runner::Spawner;
use impactsim_core::store::{RuleRow, SimStore};

struct InlineSpawner;
impl Spawner for InlineSpawner {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        task();
    }
}

fn seeded_store() -> SimStore {
    let store = SimStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.upsert_template("EQ_030", "Earthquake", "EARTHQUAKE", 1, true).unwrap();
    store
        .upsert_rule(&RuleRow {
            rule_id: "eq-sub".into(),
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
            repair_time_min: Some(60.0),
            repair_time_max: Some(180.0),
            geo_anchor: Some("EPICENTER".into()),
            geo_param_1_km: Some(5.0),
            priority: 1,
            enabled: true,
        })
        .unwrap();
    for (id, lat, lng) in [
        ("sub-near-1", 31.771, 35.221),
        ("sub-near-2", 31.772, 35.223),
        ("sub-near-3", 31.775, 35.225),
        ("sub-far-1", 31.95, 35.40),
    ] {
        store.insert_asset(id, id, "electricity", "substation", "jerusalem", lat, lng, 3, None).unwrap();
    }
    store
}

fn prepare_with_seed(seed: u64) -> Vec<impactsim_core::store::InstanceRow> {
    let store = seeded_store();
    let mut engine = ScenarioEngine::new(store, Arc::new(InlineSpawner));
    let summary = engine
        .prepare(PrepareRequest {
            city: "jerusalem".into(),
            scenario: "earthquake".into(),
            duration_hours: 24,
            tick_minutes: 60,
            repair_crews: 0,
            anchors: vec![("EPICENTER".into(), 31.7683, 35.2137)],
            seed,
        })
        .unwrap();
    vec![engine.describe_prepared(&summary.instance_id).unwrap()]
}

/// Full per-tick payload sequence for a completed run — the complete
/// observable event log a client would see. Compared structurally
/// (not via serialized strings): `TickPayload.sectors` is a `HashMap`
/// and two equal-content maps are not guaranteed to serialize to the
/// same key order across processes.
fn event_log_for(seed: u64) -> Vec<impactsim_core::runner::TickPayload> {
    let store = seeded_store();
    let mut engine = ScenarioEngine::new(store, Arc::new(InlineSpawner));
    let summary = engine
        .prepare(PrepareRequest {
            city: "jerusalem".into(),
            scenario: "earthquake".into(),
            duration_hours: 24,
            tick_minutes: 60,
            repair_crews: 0,
            anchors: vec![("EPICENTER".into(), 31.7683, 35.2137)],
            seed,
        })
        .unwrap();

    let run = engine.start(&summary.instance_id).unwrap();
    let total_ticks = engine.state(&run.sim_run_id).unwrap().total_ticks;
    (0..total_ticks)
        .map(|t| match engine.tick(&run.sim_run_id, t).unwrap() {
            impactsim_core::runner::TickResponse::Ready(payload) => payload,
            impactsim_core::runner::TickResponse::Pending => {
                panic!("tick {t} should be ready for a completed run")
            }
        })
        .collect()
}

#[test]
fn same_seed_produces_identical_event_logs() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let log_a = event_log_for(SEED);
    let log_b = event_log_for(SEED);

    assert_eq!(log_a.len(), log_b.len(), "tick counts differ: {} vs {}", log_a.len(), log_b.len());
    for (i, (a, b)) in log_a.iter().zip(log_b.iter()).enumerate() {
        assert_eq!(a, b, "tick payload diverged at tick {i}");
    }
}

#[test]
fn different_seeds_usually_diverge_in_recovery_timing() {
    let a = event_log_for(1);
    let b = event_log_for(2);
    assert!(a.iter().zip(b.iter()).any(|(x, y)| x != y), "different seeds produced identical logs — seed is not being used");
}

#[test]
fn repeated_prepare_with_same_inputs_and_seed_is_byte_identical_modulo_instance_id() {
    let a = prepare_with_seed(5);
    let b = prepare_with_seed(5);
    assert_eq!(a[0].city, b[0].city);
    assert_eq!(a[0].scenario, b[0].scenario);
    assert_eq!(a[0].total_ticks, b[0].total_ticks);
    assert_eq!(a[0].seed, b[0].seed);
}
