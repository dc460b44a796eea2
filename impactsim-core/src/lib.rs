//! Deterministic scenario engine for crisis-impact simulation of urban
//! critical infrastructure: a materializer that turns a hazard template
//! into a timed event stream, a runner that replays it tick-by-tick, and
//! a dependency chain resolver over the asset graph.
//!
//! This crate is synchronous and has no opinion about the host's async
//! runtime — the [`runner::Spawner`] trait is the seam a host uses to
//! run the background tick precomputation loop.

pub mod config;
pub mod dependency_resolver;
pub mod engine;
pub mod error;
pub mod geo;
pub mod materializer;
pub mod rng;
pub mod rules_import;
pub mod runner;
pub mod scenario_map;
pub mod store;
pub mod types;

pub use engine::{PrepareSummary, ScenarioEngine, TimelineEntry};
pub use error::{EngineError, EngineResult};
