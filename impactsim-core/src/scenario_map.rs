//! The UI scenario → template mapping (§6). Hard-coded and versioned
//! with the code, not the store — adding a hazard type is a code change,
//! not a data migration.

/// One row of the scenario→template mapping table (§6).
#[derive(Debug, Clone, Copy)]
pub struct ScenarioMapping {
    pub scenario: &'static str,
    pub template_id: &'static str,
    pub hazard_type: &'static str,
    /// `None` means the hazard has no required anchor type.
    pub required_anchor: Option<&'static str>,
}

const MAPPINGS: &[ScenarioMapping] = &[
    ScenarioMapping { scenario: "earthquake", template_id: "EQ_030", hazard_type: "EARTHQUAKE", required_anchor: Some("EPICENTER") },
    ScenarioMapping { scenario: "cyber_attack", template_id: "CY_020", hazard_type: "CYBER", required_anchor: None },
    ScenarioMapping { scenario: "tsunami", template_id: "TS_025", hazard_type: "TSUNAMI", required_anchor: Some("IMPACT_CENTER") },
    ScenarioMapping { scenario: "pandemic", template_id: "PD_040", hazard_type: "PANDEMIC", required_anchor: None },
    ScenarioMapping { scenario: "severe_storm", template_id: "SS_020", hazard_type: "SEVERE_STORM", required_anchor: Some("FLOOD_POCKET") },
    ScenarioMapping { scenario: "wildfire", template_id: "WF_020", hazard_type: "WILDFIRE", required_anchor: Some("FIRE_ORIGIN") },
];

/// Look up the mapping for a UI scenario key. Returns `None` for any
/// key the table doesn't carry — callers surface `UNKNOWN_SCENARIO`.
pub fn lookup(scenario: &str) -> Option<ScenarioMapping> {
    MAPPINGS.iter().copied().find(|m| m.scenario == scenario)
}
