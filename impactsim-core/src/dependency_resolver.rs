//! Directed dependency graph traversal (upstream/downstream chains).
//!
//! A dependency edge runs provider -> consumer: the consumer's operation
//! depends on the provider. `Downstream` follows edges forward from a
//! starting asset (who does this asset's failure affect); `Upstream`
//! follows them in reverse (what does this asset depend on).

use std::collections::{HashSet, VecDeque};

use crate::error::{EngineError, EngineResult};
use crate::store::{AssetRow, DependencyRow, SimStore};
use crate::types::{AssetId, Direction};

#[derive(Debug, Clone, PartialEq)]
pub struct ChainEdge {
    pub from_asset: AssetId,
    pub to_asset: AssetId,
    pub dependency_type: String,
    pub priority: i64,
    /// Hop distance from the traversal root at which this edge was
    /// discovered (§4.1: edges are emitted as `(from, to, type, priority,
    /// level = d+1)`). Set when the edge is pushed into the BFS output,
    /// not when the static adjacency map is built.
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainResult {
    pub root: AssetId,
    pub direction: Direction,
    pub edges: Vec<ChainEdge>,
    pub assets: Vec<AssetRow>,
}

const DEFAULT_MAX_DEPTH: u32 = 8;
const MIN_MAX_DEPTH: u32 = 1;
const MAX_MAX_DEPTH: u32 = 12;

/// Walk the active dependency graph from `root` in the given direction.
///
/// Loads a single snapshot of active edges at call entry (§4.1: "a
/// single call observes a consistent active-edge snapshot"), then runs
/// a breadth-first traversal bounded by `max_depth` hops. Edges are
/// deduplicated on `(from, to, dependency_type, priority)` — the same
/// logical edge reachable via two paths is only reported once.
pub fn resolve_chain(
    store: &SimStore,
    root: &str,
    direction: Direction,
    max_depth: Option<u32>,
) -> EngineResult<ChainResult> {
    let max_depth = match max_depth {
        Some(d) if !(MIN_MAX_DEPTH..=MAX_MAX_DEPTH).contains(&d) => {
            return Err(EngineError::bad_input(format!(
                "max_depth must be in [{MIN_MAX_DEPTH},{MAX_MAX_DEPTH}], got {d}"
            )));
        }
        Some(d) => d,
        None => DEFAULT_MAX_DEPTH,
    };

    if store.get_asset(root)?.is_none() {
        return Err(EngineError::not_found(format!("asset `{root}` does not exist")));
    }

    let snapshot = store.active_dependencies()?;
    let adjacency = build_adjacency(&snapshot, direction);

    let mut seen_assets: HashSet<AssetId> = HashSet::new();
    let mut seen_edges: HashSet<(AssetId, AssetId, String, i64)> = HashSet::new();
    let mut edges: Vec<ChainEdge> = Vec::new();

    seen_assets.insert(root.to_string());
    let mut queue: VecDeque<(AssetId, u32)> = VecDeque::new();
    queue.push_back((root.to_string(), 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(out) = adjacency.get(&node) else { continue };
        for edge in out {
            let key = (
                edge.from_asset.clone(),
                edge.to_asset.clone(),
                edge.dependency_type.clone(),
                edge.priority,
            );
            if seen_edges.insert(key) {
                let mut emitted = edge.clone();
                emitted.level = depth + 1;
                edges.push(emitted);
            }
            if seen_assets.insert(edge.to_asset.clone()) {
                queue.push_back((edge.to_asset.clone(), depth + 1));
            }
        }
    }

    let mut ids: Vec<AssetId> = seen_assets.into_iter().collect();
    ids.sort();
    let assets = store.assets_by_ids(&ids)?;

    Ok(ChainResult { root: root.to_string(), direction, edges, assets })
}

/// Adjacency keyed by the traversal's "from" node: for `Downstream` that's
/// the provider, for `Upstream` it's the consumer (edges walked in
/// reverse).
fn build_adjacency(
    rows: &[DependencyRow],
    direction: Direction,
) -> std::collections::HashMap<AssetId, Vec<ChainEdge>> {
    let mut map: std::collections::HashMap<AssetId, Vec<ChainEdge>> =
        std::collections::HashMap::new();
    for row in rows {
        let (from, to) = match direction {
            Direction::Downstream => (row.provider_asset_id.clone(), row.consumer_asset_id.clone()),
            Direction::Upstream => (row.consumer_asset_id.clone(), row.provider_asset_id.clone()),
        };
        map.entry(from.clone()).or_default().push(ChainEdge {
            from_asset: from,
            to_asset: to,
            dependency_type: row.dependency_type.clone(),
            priority: row.priority,
            level: 0,
        });
    }
    for edges in map.values_mut() {
        edges.sort_by(|a, b| a.to_asset.cmp(&b.to_asset).then(b.priority.cmp(&a.priority)));
    }
    map
}
