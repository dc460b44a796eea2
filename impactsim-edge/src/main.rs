//! impactsim-edge: the HTTP surface over the scenario engine (§6).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use impactsim_core::config::EngineConfig;
use impactsim_core::engine::ScenarioEngine;
use impactsim_core::error::EngineError;
use impactsim_core::materializer::PrepareRequest;
use impactsim_core::runner::Spawner;
use impactsim_core::store::SimStore;
use impactsim_core::types::Direction;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(name = "impactsim-edge", about = "HTTP edge for the scenario engine")]
struct Cli {
    #[arg(long, env = "IMPACTSIM_STORE_PATH")]
    store_path: Option<String>,
    #[arg(long, env = "IMPACTSIM_HOST")]
    host: Option<String>,
    #[arg(long, env = "IMPACTSIM_PORT")]
    port: Option<u16>,
}

/// Bridges the engine's synchronous background precomputation onto
/// tokio's blocking thread pool, so the request-handling runtime is
/// never starved by a tick loop (§4.3.3 / §5).
struct TokioBlockingSpawner {
    handle: tokio::runtime::Handle,
}

impl Spawner for TokioBlockingSpawner {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        self.handle.spawn_blocking(task);
    }
}

struct AppState {
    engine: Mutex<ScenarioEngine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(store_path) = cli.store_path {
        config.store_path = store_path;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let store = SimStore::open(&config.store_path)?;
    store.migrate()?;

    if config.autoload_templates {
        autoload_templates(&store, &config.template_dir)?;
    }

    let spawner = Arc::new(TokioBlockingSpawner { handle: tokio::runtime::Handle::current() });
    let state = Arc::new(AppState { engine: Mutex::new(ScenarioEngine::new(store, spawner)) });

    let app = Router::new()
        .route("/api/scenario/prepare", post(prepare))
        .route("/api/scenario/list", get(list_prepared))
        .route("/api/scenario/describe", get(describe_prepared))
        .route("/api/scenario/timeline", get(timeline))
        .route("/api/sim/start", post(start_run))
        .route("/api/sim/state", get(run_state))
        .route("/api/sim/tick", get(run_tick))
        .route("/api/dependencies/chain", get(dependency_chain))
        .route("/api/dependencies/graph", get(dependency_graph))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    log::info!("impactsim-edge listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Imports every `*.csv` rule file under `template_dir` on startup when
/// `IMPACTSIM_AUTOLOAD_TEMPLATES` is set (§6 Environment). A missing
/// directory is not fatal — it just means no templates autoload.
fn autoload_templates(store: &SimStore, template_dir: &str) -> anyhow::Result<()> {
    let dir = std::path::Path::new(template_dir);
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("autoload_templates: cannot read {template_dir}: {e}");
            return Ok(());
        }
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let file = std::fs::File::open(&path)?;
        match impactsim_core::rules_import::import_rules(store, file) {
            Ok(summary) => log::info!(
                "autoloaded {}: templates_upserted={} rules_upserted={}",
                path.display(), summary.templates_upserted, summary.rules_upserted
            ),
            Err(e) => log::warn!("autoload_templates: failed to import {}: {e}", path.display()),
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct AnchorDto {
    #[serde(rename = "type")]
    anchor_type: String,
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct PrepareBody {
    city: String,
    scenario: String,
    duration_hours: i64,
    tick_minutes: i64,
    repair_crews: i64,
    #[serde(default)]
    anchors: Vec<AnchorDto>,
    #[serde(default)]
    seed: Option<u64>,
}

async fn prepare(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PrepareBody>,
) -> Result<Json<impactsim_core::PrepareSummary>, ApiError> {
    let mut engine = state.engine.lock().await;
    let summary = engine.prepare(PrepareRequest {
        city: body.city,
        scenario: body.scenario,
        duration_hours: body.duration_hours,
        tick_minutes: body.tick_minutes,
        repair_crews: body.repair_crews,
        anchors: body.anchors.into_iter().map(|a| (a.anchor_type, a.lat, a.lng)).collect(),
        seed: body.seed.unwrap_or_else(default_seed),
    })?;
    Ok(Json(summary))
}

fn default_seed() -> u64 {
    // A fixed, documented default keeps `prepare` reproducible when the
    // caller doesn't supply its own seed (§9 Open Question resolution).
    0x5eed_0000_0000_0001
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default = "default_list_limit")]
    limit: i64,
}

fn default_list_limit() -> i64 {
    50
}

async fn list_prepared(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<impactsim_core::store::InstanceRow>>, ApiError> {
    let engine = state.engine.lock().await;
    let rows = engine.list_prepared(q.limit)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
struct IdQuery {
    id: String,
}

async fn describe_prepared(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IdQuery>,
) -> Result<Json<impactsim_core::store::InstanceRow>, ApiError> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.describe_prepared(&q.id)?))
}

#[derive(Deserialize)]
struct TimelineQuery {
    id: String,
    #[serde(default = "default_bucket_ticks")]
    bucket_ticks: u64,
}

fn default_bucket_ticks() -> u64 {
    1
}

async fn timeline(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TimelineQuery>,
) -> Result<Json<Vec<impactsim_core::TimelineEntry>>, ApiError> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.timeline(&q.id, q.bucket_ticks)?))
}

#[derive(Deserialize)]
struct StartBody {
    scenario_instance_id: String,
}

async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartBody>,
) -> Result<Json<impactsim_core::runner::RunState>, ApiError> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.start(&body.scenario_instance_id)?))
}

#[derive(Deserialize)]
struct RunIdQuery {
    sim_run_id: String,
}

async fn run_state(
    State(state): State<Arc<AppState>>,
    Query(q): Query<RunIdQuery>,
) -> Result<Json<impactsim_core::runner::RunState>, ApiError> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.state(&q.sim_run_id)?))
}

#[derive(Deserialize)]
struct TickQuery {
    sim_run_id: String,
    tick_index: u64,
}

async fn run_tick(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TickQuery>,
) -> Result<Json<impactsim_core::runner::TickResponse>, ApiError> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.tick(&q.sim_run_id, q.tick_index)?))
}

#[derive(Deserialize)]
struct ChainQuery {
    asset_id: String,
    direction: String,
    max_depth: Option<u32>,
}

#[derive(Serialize)]
struct ChainDto {
    root: String,
    nodes: Vec<impactsim_core::store::AssetRow>,
    links: Vec<ChainEdgeDto>,
}

#[derive(Serialize)]
struct ChainEdgeDto {
    from: String,
    to: String,
    dependency_type: String,
    priority: i64,
    level: u32,
}

async fn dependency_chain(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ChainQuery>,
) -> Result<Json<ChainDto>, ApiError> {
    let direction = Direction::parse(&q.direction)
        .ok_or_else(|| ApiError(EngineError::bad_input(format!("invalid direction `{}`", q.direction))))?;
    let engine = state.engine.lock().await;
    let chain = engine.chain(&q.asset_id, direction, q.max_depth)?;
    Ok(Json(ChainDto {
        root: chain.root,
        nodes: chain.assets,
        links: chain
            .edges
            .into_iter()
            .map(|e| ChainEdgeDto {
                from: e.from_asset,
                to: e.to_asset,
                dependency_type: e.dependency_type,
                priority: e.priority,
                level: e.level,
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct GraphQuery {
    city: String,
}

async fn dependency_graph(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GraphQuery>,
) -> Result<Json<impactsim_core::engine::GraphView>, ApiError> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.graph(&q.city)?))
}

/// Wraps [`EngineError`] so it can be returned directly from an axum
/// handler, mapped to the `{error, details?, required_anchor?}` shape
/// and HTTP status codes of §7.
struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_anchor: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::BadInput { .. } => StatusCode::BAD_REQUEST,
            EngineError::UnknownScenario { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::MissingAnchor { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Database(_) | EngineError::Serialization(_) | EngineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        log::error!("request failed: {}", self.0);
        let body = ErrorBody {
            error: self.0.kind(),
            details: Some(self.0.details()),
            required_anchor: self.0.required_anchor().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}
