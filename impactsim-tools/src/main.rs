//! impactsim-tools: headless CLI for scenario preparation, rule import,
//! and test-fixture seeding, run without the HTTP edge.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use impactsim_core::engine::ScenarioEngine;
use impactsim_core::materializer::PrepareRequest;
use impactsim_core::runner::Spawner;
use impactsim_core::rules_import;
use impactsim_core::store::SimStore;
use impactsim_core::types::{Direction, Tick};

#[derive(Parser)]
#[command(name = "impactsim-tools", about = "Headless scenario engine tooling")]
struct Cli {
    /// Path to the SQLite store, or `:memory:`.
    #[arg(long, env = "IMPACTSIM_STORE_PATH", default_value = "./impactsim.db")]
    store_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the schema migrations to the store.
    Migrate,
    /// Import hazard templates and rules from a CSV file (§6.1).
    ImportRules {
        #[arg(long)]
        file: PathBuf,
    },
    /// Load assets and dependencies from CSV fixtures (§6.2, test fixtures only).
    ImportFixtures {
        #[arg(long)]
        assets: PathBuf,
        #[arg(long)]
        dependencies: Option<PathBuf>,
    },
    /// Prepare a scenario instance and print the summary.
    Prepare {
        #[arg(long)]
        city: String,
        #[arg(long)]
        scenario: String,
        #[arg(long, default_value_t = 24)]
        duration_hours: i64,
        #[arg(long, default_value_t = 60)]
        tick_minutes: i64,
        #[arg(long, default_value_t = 0)]
        repair_crews: i64,
        /// Repeatable `type=lat,lng` anchor definitions.
        #[arg(long = "anchor", value_parser = parse_anchor)]
        anchors: Vec<(String, f64, f64)>,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Run a prepared instance headlessly to completion and print the final state.
    Run {
        #[arg(long)]
        instance_id: String,
    },
    /// Print the dependency chain from an asset.
    Chain {
        #[arg(long)]
        asset_id: String,
        #[arg(long, default_value = "downstream")]
        direction: String,
        #[arg(long)]
        max_depth: Option<u32>,
    },
}

/// Runs the background precomputation loop synchronously on the calling
/// thread — headless tooling has no async runtime to hand off to.
struct InlineSpawner;
impl Spawner for InlineSpawner {
    fn spawn(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        task();
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let store = SimStore::open(&cli.store_path).context("opening store")?;
    store.migrate().context("applying migrations")?;

    match cli.command {
        Command::Migrate => {
            println!("migrations applied to {}", cli.store_path);
        }
        Command::ImportRules { file } => {
            let f = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
            let summary = rules_import::import_rules(&store, f)?;
            println!(
                "templates_upserted={} rules_upserted={}",
                summary.templates_upserted, summary.rules_upserted
            );
        }
        Command::ImportFixtures { assets, dependencies } => {
            import_asset_fixtures(&store, &assets)?;
            if let Some(deps) = dependencies {
                import_dependency_fixtures(&store, &deps)?;
            }
            println!("fixtures imported");
        }
        Command::Prepare { city, scenario, duration_hours, tick_minutes, repair_crews, anchors, seed } => {
            let mut engine = ScenarioEngine::new(store, Arc::new(InlineSpawner));
            let summary = engine.prepare(PrepareRequest {
                city, scenario, duration_hours, tick_minutes, repair_crews, anchors, seed,
            })?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Run { instance_id } => {
            let engine = ScenarioEngine::new(store, Arc::new(InlineSpawner));
            let run = engine.start(&instance_id)?;
            let state = engine.state(&run.sim_run_id)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            if let Ok(impactsim_core::runner::TickResponse::Ready(payload)) =
                engine.tick(&run.sim_run_id, state.total_ticks.saturating_sub(1) as Tick)
            {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }
        Command::Chain { asset_id, direction, max_depth } => {
            let engine = ScenarioEngine::new(store, Arc::new(InlineSpawner));
            let direction = Direction::parse(&direction)
                .ok_or_else(|| anyhow::anyhow!("invalid direction `{direction}`"))?;
            let chain = engine.chain(&asset_id, direction, max_depth)?;
            println!("nodes={} edges={}", chain.assets.len(), chain.edges.len());
            for edge in &chain.edges {
                println!("  {} -> {} ({}, level={})", edge.from_asset, edge.to_asset, edge.dependency_type, edge.level);
            }
        }
    }

    Ok(())
}

fn parse_anchor(raw: &str) -> Result<(String, f64, f64), String> {
    let (anchor_type, coords) = raw.split_once('=').ok_or("expected `type=lat,lng`")?;
    let (lat, lng) = coords.split_once(',').ok_or("expected `type=lat,lng`")?;
    let lat: f64 = lat.trim().parse().map_err(|_| "invalid latitude".to_string())?;
    let lng: f64 = lng.trim().parse().map_err(|_| "invalid longitude".to_string())?;
    Ok((anchor_type.trim().to_string(), lat, lng))
}

/// Minimal fixture loader for test cities (§6.2 — fixtures only, never a
/// production seeding path). Expects header
/// `id,name,sector,subtype,city,lat,lng,criticality`.
fn import_asset_fixtures(store: &SimStore, path: &PathBuf) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    for record in reader.records() {
        let record = record?;
        let criticality: i64 = record.get(7).unwrap_or("3").trim().parse().unwrap_or(3);
        store.insert_asset(
            record.get(0).unwrap_or(""),
            record.get(1).unwrap_or(""),
            record.get(2).unwrap_or(""),
            record.get(3).unwrap_or(""),
            record.get(4).unwrap_or(""),
            record.get(5).unwrap_or("0").trim().parse().unwrap_or(0.0),
            record.get(6).unwrap_or("0").trim().parse().unwrap_or(0.0),
            criticality,
            None,
        )?;
    }
    Ok(())
}

/// Expects header `provider_asset_id,consumer_asset_id,dependency_type,priority,is_active`.
fn import_dependency_fixtures(store: &SimStore, path: &PathBuf) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    for record in reader.records() {
        let record = record?;
        let priority: i64 = record.get(3).unwrap_or("1").trim().parse().unwrap_or(1);
        let is_active = record.get(4).map(|v| v.trim() != "0").unwrap_or(true);
        store.insert_dependency(
            record.get(0).unwrap_or(""),
            record.get(1).unwrap_or(""),
            record.get(2).unwrap_or(""),
            priority,
            is_active,
        )?;
    }
    Ok(())
}
