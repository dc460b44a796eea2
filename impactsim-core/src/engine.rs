//! Scenario engine façade (§4.4): the only surface the edge invokes.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::dependency_resolver::{self, ChainResult};
use crate::error::{EngineError, EngineResult};
use crate::materializer::{self, PrepareRequest};
use crate::runner::{RunState, Runner, Spawner, TickResponse};
use crate::scenario_map;
use crate::store::{AssetRow, InstanceRow, SimStore};
use crate::types::{Direction, InstanceId, Tick};

#[derive(Debug, Clone, Serialize)]
pub struct PrepareSummary {
    pub instance_id: InstanceId,
    pub template_id: String,
    pub hazard_type: String,
    pub rule_count: usize,
    pub events_created: usize,
    pub recoveries_added: usize,
    pub assets_used: usize,
    pub total_ticks: Tick,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub bucket_start_tick: Tick,
    pub event_count: usize,
}

/// Full `{nodes, links}` structural view of a city's dependency graph,
/// the unfiltered counterpart to `chain` (§6's `/api/dependencies/graph`).
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub nodes: Vec<AssetRow>,
    pub links: Vec<crate::store::DependencyRow>,
}

pub struct ScenarioEngine {
    store: SimStore,
    runner: Runner,
}

impl ScenarioEngine {
    pub fn new(store: SimStore, spawner: Arc<dyn Spawner>) -> Self {
        Self { store, runner: Runner::new(spawner) }
    }

    /// `prepare(city, scenario, duration_hours, tick_minutes, repair_crews, anchors[])` (§4.4).
    pub fn prepare(&mut self, req: PrepareRequest) -> EngineResult<PrepareSummary> {
        let mapping = scenario_map::lookup(&req.scenario)
            .ok_or_else(|| EngineError::UnknownScenario { scenario: req.scenario.clone() })?;
        materializer::require_anchor(mapping.required_anchor, &req.anchors)?;

        let (duration_hours, tick_minutes, repair_crews) =
            materializer::clamp_instance_params(req.duration_hours, req.tick_minutes, req.repair_crews);
        let total_ticks = materializer::total_ticks_for(duration_hours, tick_minutes);

        let rules = self.store.rules_for_template(mapping.template_id)?;
        let instance_id = Uuid::new_v4().to_string();
        let city = req.city.clone();

        let outcome = materializer::materialize(
            &self.store,
            &instance_id,
            &city,
            total_ticks,
            &rules,
            |anchor_type| {
                Ok(req
                    .anchors
                    .iter()
                    .find(|(t, _, _)| t == anchor_type)
                    .map(|(_, lat, lng)| (*lat, *lng)))
            },
            req.seed,
        )?;

        self.store.with_transaction(|tx| {
            let instance_row = InstanceRow {
                id: instance_id.clone(),
                city: city.clone(),
                scenario: req.scenario.clone(),
                hazard_type: mapping.hazard_type.to_string(),
                template_id: mapping.template_id.to_string(),
                duration_hours,
                tick_minutes,
                repair_crews,
                total_ticks,
                seed: req.seed as i64,
                status: "PREPARED".to_string(),
                created_at: Utc::now().timestamp(),
            };
            SimStore::insert_instance(tx, &instance_row)?;
            for (anchor_type, lat, lng) in &req.anchors {
                SimStore::insert_anchor(tx, &instance_id, anchor_type, *lat, *lng)?;
            }
            for event in &outcome.events {
                SimStore::insert_event(tx, event)?;
            }
            Ok(())
        })?;

        Ok(PrepareSummary {
            instance_id,
            template_id: mapping.template_id.to_string(),
            hazard_type: mapping.hazard_type.to_string(),
            rule_count: rules.len(),
            events_created: outcome.events_created,
            recoveries_added: outcome.recoveries_added,
            assets_used: outcome.assets_used,
            total_ticks,
            status: "PREPARED".to_string(),
        })
    }

    pub fn list_prepared(&self, limit: i64) -> EngineResult<Vec<InstanceRow>> {
        self.store.list_instances(limit)
    }

    pub fn describe_prepared(&self, instance_id: &str) -> EngineResult<InstanceRow> {
        self.store
            .get_instance(instance_id)?
            .ok_or_else(|| EngineError::not_found(format!("instance `{instance_id}` does not exist")))
    }

    /// Bucketed event counts for an instance's timeline, `bucket_ticks` wide.
    pub fn timeline(&self, instance_id: &str, bucket_ticks: Tick) -> EngineResult<Vec<TimelineEntry>> {
        let bucket_ticks = bucket_ticks.max(1);
        let events = self.store.events_for_instance(instance_id)?;
        let mut buckets: std::collections::BTreeMap<Tick, usize> = std::collections::BTreeMap::new();
        for event in &events {
            let bucket_start = (event.tick_index / bucket_ticks) * bucket_ticks;
            *buckets.entry(bucket_start).or_insert(0) += 1;
        }
        Ok(buckets
            .into_iter()
            .map(|(bucket_start_tick, event_count)| TimelineEntry { bucket_start_tick, event_count })
            .collect())
    }

    pub fn start(&self, instance_id: &str) -> EngineResult<RunState> {
        self.runner.start(&self.store, instance_id)
    }

    pub fn state(&self, run_id: &str) -> EngineResult<RunState> {
        self.runner.state(run_id)
    }

    pub fn tick(&self, run_id: &str, tick_index: Tick) -> EngineResult<TickResponse> {
        self.runner.tick(run_id, tick_index)
    }

    pub fn chain(&self, asset_id: &str, direction: Direction, max_depth: Option<u32>) -> EngineResult<ChainResult> {
        dependency_resolver::resolve_chain(&self.store, asset_id, direction, max_depth)
    }

    /// Every asset in `city` plus the active edges between them, for the
    /// full-graph structural view (§6's `GET /api/dependencies/graph`).
    pub fn graph(&self, city: &str) -> EngineResult<GraphView> {
        let nodes = self.store.assets_in_city(city)?;
        let node_ids: std::collections::HashSet<&str> = nodes.iter().map(|a| a.id.as_str()).collect();
        let links = self
            .store
            .active_dependencies()?
            .into_iter()
            .filter(|d| node_ids.contains(d.provider_asset_id.as_str()) && node_ids.contains(d.consumer_asset_id.as_str()))
            .collect();
        Ok(GraphView { nodes, links })
    }
}
