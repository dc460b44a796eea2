//! Simulation runner (§4.3): precomputes one payload per tick for a
//! prepared instance and serves it to pollers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::store::{AssetRow, EventRow, SimStore};
use crate::types::{OperationalStatus, RunId, Tick};

/// Per-tick status change, reported in a tick payload's `assets_changed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetStatusChange {
    pub id: String,
    pub status: &'static str,
}

/// One precomputed tick payload (§4.3.1 step 5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickPayload {
    pub sim_run_id: RunId,
    pub tick_index: Tick,
    pub total_ticks: Tick,
    pub sectors: HashMap<String, i64>,
    pub assets_changed: Vec<AssetStatusChange>,
    pub recommendations: Vec<String>,
}

/// `state()` response shape (§4.3 contract).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    pub sim_run_id: RunId,
    pub scenario_instance_id: String,
    pub city: String,
    pub total_ticks: Tick,
    pub computed_max_tick: i64,
    pub done: bool,
}

/// What `tick()` returns — either a materialized payload, or a sentinel
/// meaning the background task has not reached that tick yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickResponse {
    Ready(TickPayload),
    Pending,
}

/// Shared, per-run state: an append-only tick cache written by exactly
/// one background task and read by many pollers (§4.3.2, §5, §9 "Per-run
/// state sharing"). `computed_max_tick` starts at -1 and only increases.
pub struct RunHandle {
    pub sim_run_id: RunId,
    pub scenario_instance_id: String,
    pub city: String,
    pub total_ticks: Tick,
    cache: Vec<OnceLock<TickPayload>>,
    computed_max_tick: AtomicI64,
    done: std::sync::atomic::AtomicBool,
}

impl RunHandle {
    fn new(sim_run_id: RunId, scenario_instance_id: String, city: String, total_ticks: Tick) -> Self {
        let mut cache = Vec::with_capacity(total_ticks as usize);
        cache.resize_with(total_ticks as usize, OnceLock::new);
        Self {
            sim_run_id,
            scenario_instance_id,
            city,
            total_ticks,
            cache,
            computed_max_tick: AtomicI64::new(-1),
            done: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RunState {
        RunState {
            sim_run_id: self.sim_run_id.clone(),
            scenario_instance_id: self.scenario_instance_id.clone(),
            city: self.city.clone(),
            total_ticks: self.total_ticks,
            computed_max_tick: self.computed_max_tick.load(Ordering::Acquire),
            done: self.done.load(Ordering::Acquire),
        }
    }

    pub fn tick(&self, tick_index: Tick) -> TickResponse {
        let idx = tick_index.min(self.total_ticks.saturating_sub(1)) as usize;
        match self.cache.get(idx).and_then(OnceLock::get) {
            Some(payload) => TickResponse::Ready(payload.clone()),
            None => TickResponse::Pending,
        }
    }

    fn publish(&self, tick_index: Tick, payload: TickPayload) {
        if let Some(slot) = self.cache.get(tick_index as usize) {
            let _ = slot.set(payload);
        }
        self.computed_max_tick.store(tick_index as i64, Ordering::Release);
    }

    fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }
}

/// Decouples the synchronous precomputation loop from whatever async
/// runtime (or none) the host embeds `impactsim-core` in. The edge binary
/// supplies a `tokio::task::spawn_blocking`-backed spawner; headless
/// tools run the closure inline.
pub trait Spawner: Send + Sync {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>);
}

pub struct Runner {
    registry: DashMap<RunId, Arc<RunHandle>>,
    spawner: Arc<dyn Spawner>,
    tick_pace: Duration,
}

impl Runner {
    pub fn new(spawner: Arc<dyn Spawner>) -> Self {
        Self { registry: DashMap::new(), spawner, tick_pace: Duration::from_millis(15) }
    }

    #[cfg(test)]
    pub fn with_tick_pace(spawner: Arc<dyn Spawner>, tick_pace: Duration) -> Self {
        Self { registry: DashMap::new(), spawner, tick_pace }
    }

    /// `start(scenario_instance_id)` (§4.3 contract).
    pub fn start(&self, store: &SimStore, scenario_instance_id: &str) -> EngineResult<RunState> {
        let instance = store
            .get_instance(scenario_instance_id)?
            .ok_or_else(|| EngineError::not_found(format!("instance `{scenario_instance_id}` does not exist")))?;

        let assets = store.assets_in_city(&instance.city)?;
        let events = store.events_for_instance(scenario_instance_id)?;

        let sim_run_id = Uuid::new_v4().to_string();
        let handle = Arc::new(RunHandle::new(
            sim_run_id.clone(),
            scenario_instance_id.to_string(),
            instance.city.clone(),
            instance.total_ticks,
        ));
        self.registry.insert(sim_run_id.clone(), handle.clone());

        let tick_pace = self.tick_pace;
        self.spawner.spawn(Box::new(move || {
            precompute(&handle, assets, events, tick_pace);
        }));

        Ok(RunState {
            sim_run_id,
            scenario_instance_id: scenario_instance_id.to_string(),
            city: instance.city,
            total_ticks: instance.total_ticks,
            computed_max_tick: -1,
            done: false,
        })
    }

    pub fn state(&self, sim_run_id: &str) -> EngineResult<RunState> {
        self.registry
            .get(sim_run_id)
            .map(|h| h.state())
            .ok_or_else(|| EngineError::not_found(format!("run `{sim_run_id}` does not exist")))
    }

    pub fn tick(&self, sim_run_id: &str, tick_index: Tick) -> EngineResult<TickResponse> {
        self.registry
            .get(sim_run_id)
            .map(|h| h.tick(tick_index))
            .ok_or_else(|| EngineError::not_found(format!("run `{sim_run_id}` does not exist")))
    }
}

/// §4.3.1: the single-writer tick precomputation loop. Never parallelized
/// across ticks — each tick's status comparison depends on the previous
/// tick's computed state (§9 "Coroutine-like precomputation").
fn precompute(handle: &RunHandle, assets: Vec<AssetRow>, events: Vec<EventRow>, tick_pace: Duration) {
    let mut perf: HashMap<String, f64> = assets.iter().map(|a| (a.id.clone(), 100.0)).collect();
    let mut last_status: HashMap<String, OperationalStatus> =
        assets.iter().map(|a| (a.id.clone(), OperationalStatus::Active)).collect();

    let mut events_by_tick: HashMap<Tick, Vec<&EventRow>> = HashMap::new();
    for event in &events {
        events_by_tick.entry(event.tick_index).or_default().push(event);
    }

    let criticality: HashMap<&str, i64> = assets.iter().map(|a| (a.id.as_str(), a.criticality)).collect();
    let mut sectors_by_asset: HashMap<&str, &str> = HashMap::new();
    for a in &assets {
        sectors_by_asset.insert(a.id.as_str(), a.sector.as_str());
    }

    for t in 0..handle.total_ticks {
        if let Some(tick_events) = events_by_tick.get(&t) {
            for event in tick_events {
                perf.insert(event.asset_id.clone(), event.performance_pct);
            }
        }

        let mut assets_changed = Vec::new();
        for asset in &assets {
            let pct = perf.get(&asset.id).copied().unwrap_or(100.0);
            let status = OperationalStatus::from_performance_pct(pct.round() as u32);
            let prior = last_status.get(&asset.id).copied();
            if prior != Some(status) {
                assets_changed.push(AssetStatusChange { id: asset.id.clone(), status: status.as_str() });
            }
            last_status.insert(asset.id.clone(), status);
        }

        let mut weighted: HashMap<&str, (f64, f64)> = HashMap::new();
        for asset in &assets {
            let pct = perf.get(&asset.id).copied().unwrap_or(100.0);
            let crit = *criticality.get(asset.id.as_str()).unwrap_or(&3) as f64;
            let entry = weighted.entry(asset.sector.as_str()).or_insert((0.0, 0.0));
            entry.0 += pct * crit;
            entry.1 += crit;
        }
        let mut sectors = HashMap::new();
        for (sector, (sum, weight)) in weighted {
            if weight > 0.0 {
                sectors.insert(sector.to_string(), (sum / weight).round() as i64);
            }
        }

        let recommendations = if !assets_changed.is_empty() {
            vec![format!("{} asset(s) changed state at tick {t}", assets_changed.len())]
        } else {
            Vec::new()
        };

        handle.publish(t, TickPayload {
            sim_run_id: handle.sim_run_id.clone(),
            tick_index: t,
            total_ticks: handle.total_ticks,
            sectors,
            assets_changed,
            recommendations,
        });

        if !tick_pace.is_zero() {
            std::thread::sleep(tick_pace);
        }
    }

    handle.mark_done();
}

#[cfg(test)]
mod tests {
    use super::*;

    struct InlineSpawner;
    impl Spawner for InlineSpawner {
        fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) {
            task();
        }
    }

    fn seeded_store() -> SimStore {
        let mut store = SimStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
            .insert_asset("sub-1", "Substation 1", "electricity", "substation", "jerusalem", 0.0, 0.0, 5, None)
            .unwrap();
        store
            .with_transaction(|tx| {
                let row = crate::store::InstanceRow {
                    id: "inst-1".into(), city: "jerusalem".into(), scenario: "earthquake".into(),
                    hazard_type: "EARTHQUAKE".into(), template_id: "EQ_030".into(), duration_hours: 24,
                    tick_minutes: 60, repair_crews: 0, total_ticks: 24, seed: 1, status: "PREPARED".into(), created_at: 0,
                };
                tx.execute(
                    "INSERT INTO scenario_instances
                        (id, city, scenario, hazard_type, template_id, duration_hours, tick_minutes,
                         repair_crews, total_ticks, seed, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    rusqlite::params![
                        row.id, row.city, row.scenario, row.hazard_type, row.template_id, row.duration_hours,
                        row.tick_minutes, row.repair_crews, row.total_ticks as i64, row.seed, row.status, row.created_at,
                    ],
                )?;
                tx.execute(
                    "INSERT INTO scenario_events (instance_id, tick_index, event_kind, asset_id, performance_pct, repair_time_minutes, source_rule_id)
                     VALUES ('inst-1', 12, 'IMPACT', 'sub-1', 0.0, NULL, NULL)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn run_completes_and_publishes_every_tick_in_order() {
        let store = seeded_store();
        let runner = Runner::with_tick_pace(Arc::new(InlineSpawner), Duration::ZERO);
        let start = runner.start(&store, "inst-1").unwrap();
        assert_eq!(start.total_ticks, 24);

        let state = runner.state(&start.sim_run_id).unwrap();
        assert!(state.done);
        assert_eq!(state.computed_max_tick, 23);

        match runner.tick(&start.sim_run_id, 11).unwrap() {
            TickResponse::Ready(payload) => {
                assert!(payload.assets_changed.is_empty());
                assert_eq!(payload.sectors.get("electricity"), Some(&100));
            }
            TickResponse::Pending => panic!("tick 11 should be ready"),
        }

        match runner.tick(&start.sim_run_id, 12).unwrap() {
            TickResponse::Ready(payload) => {
                assert_eq!(payload.assets_changed.len(), 1);
                assert_eq!(payload.assets_changed[0].status, "inactive");
                assert!(payload.sectors.get("electricity").copied().unwrap_or(100) < 100);
            }
            TickResponse::Pending => panic!("tick 12 should be ready"),
        }
    }

    #[test]
    fn unknown_run_id_is_not_found() {
        let runner = Runner::with_tick_pace(Arc::new(InlineSpawner), Duration::ZERO);
        let err = runner.state("nonexistent").unwrap_err();
        assert_eq!(err.kind(), "NOT_FOUND");
    }
}
