//! Shared primitive types and closed enums used across the engine.

use serde::{Deserialize, Serialize};

/// A discrete tick index inside a scenario instance. Tick `0` is the
/// first tick; `tick_index < total_ticks` always.
pub type Tick = u64;

/// A stable, unique identifier for any entity in the store.
pub type AssetId = String;
pub type InstanceId = String;
pub type RunId = String;
pub type RuleId = String;
pub type TemplateId = String;

/// Infrastructure sectors an asset can belong to (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Electricity,
    Water,
    Gas,
    Communication,
    FirstResponders,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Water => "water",
            Self::Gas => "gas",
            Self::Communication => "communication",
            Self::FirstResponders => "first_responders",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "electricity" => Some(Self::Electricity),
            "water" => Some(Self::Water),
            "gas" => Some(Self::Gas),
            "communication" => Some(Self::Communication),
            "first_responders" => Some(Self::FirstResponders),
            _ => None,
        }
    }
}

/// Derived operational status, thresholded from `performance_pct` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalStatus {
    Active,
    Partial,
    Inactive,
}

impl OperationalStatus {
    /// `>=100 -> active`, `[50..99] -> partial`, `<50 -> inactive`.
    pub fn from_performance_pct(pct: u32) -> Self {
        if pct >= 100 {
            Self::Active
        } else if pct >= 50 {
            Self::Partial
        } else {
            Self::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Partial => "partial",
            Self::Inactive => "inactive",
        }
    }
}

/// A rule or event's kind. Rules are `Impact`/`Repair`; the materializer
/// also injects `RepairPartial`/`RepairFull` events (§3 Event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Impact,
    Repair,
    RepairPartial,
    RepairFull,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impact => "IMPACT",
            Self::Repair => "REPAIR",
            Self::RepairPartial => "REPAIR_PARTIAL",
            Self::RepairFull => "REPAIR_FULL",
        }
    }

    /// Rules only declare `IMPACT`/`REPAIR`; parse case-insensitively
    /// per the CSV import format (§6).
    pub fn parse_rule_kind(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "IMPACT" => Some(Self::Impact),
            "REPAIR" => Some(Self::Repair),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "IMPACT" => Some(Self::Impact),
            "REPAIR" => Some(Self::Repair),
            "REPAIR_PARTIAL" => Some(Self::RepairPartial),
            "REPAIR_FULL" => Some(Self::RepairFull),
            _ => None,
        }
    }
}

/// How a rule's candidate pool is filtered/ordered before selection (§3, §4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionScope {
    GeoRadius,
    GeoScatter,
    GraphCentrality,
}

impl SelectionScope {
    /// Unrecognized scopes fall back to `GeoScatter`'s lexicographic
    /// ordering (§4.2.2 step 2: "GEO_SCATTER or unrecognized").
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "GEO_RADIUS" => Self::GeoRadius,
            "GRAPH_CENTRALITY" => Self::GraphCentrality,
            _ => Self::GeoScatter,
        }
    }
}

/// Whether a rule's `target_value` is a percentage of the candidate pool
/// or an absolute count (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    Pct,
    Count,
}

impl TargetMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "PCT" => Some(Self::Pct),
            "COUNT" => Some(Self::Count),
            _ => None,
        }
    }
}

/// Dependency traversal direction (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upstream,
    Downstream,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "upstream" => Some(Self::Upstream),
            "downstream" => Some(Self::Downstream),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_thresholds_match_spec_boundaries() {
        assert_eq!(OperationalStatus::from_performance_pct(100), OperationalStatus::Active);
        assert_eq!(OperationalStatus::from_performance_pct(50), OperationalStatus::Partial);
        assert_eq!(OperationalStatus::from_performance_pct(99), OperationalStatus::Partial);
        assert_eq!(OperationalStatus::from_performance_pct(49), OperationalStatus::Inactive);
        assert_eq!(OperationalStatus::from_performance_pct(0), OperationalStatus::Inactive);
    }

    #[test]
    fn unrecognized_selection_scope_falls_back_to_geo_scatter() {
        assert_eq!(SelectionScope::parse("banana"), SelectionScope::GeoScatter);
        assert_eq!(SelectionScope::parse("geo_radius"), SelectionScope::GeoRadius);
    }
}
