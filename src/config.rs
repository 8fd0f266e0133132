//! Retrieval tuning knobs.
//!
//! The depth bound and the ingredient-overlap slack are hand-tuned values
//! carried over from the reference graphs; they are configuration rather
//! than constants because there is no evidence they generalize to
//! arbitrarily large graphs.

use serde::{Deserialize, Serialize};

/// Parameters shared by both retrieval algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum number of times the greedy search may re-encounter its goal
    /// node before the attempt is abandoned; a cheap, deterministic cycle
    /// breaker.
    pub depth_bound: usize,

    /// Fraction of a candidate unit's required ingredients that may fall
    /// outside the goal-relevant set before the candidate is discarded
    /// during path-tree expansion.
    pub ingredient_overlap_slack: f64,

    /// State labels that mark an object as raw material: a node whose states
    /// are all drawn from this vocabulary is never expanded even if a
    /// producer exists.
    pub base_state_labels: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            depth_bound: 25,
            ingredient_overlap_slack: 0.2,
            base_state_labels: [
                "empty",
                "off",
                "off (ready)",
                "clean",
                "whole",
                "unpeeled",
                "clove",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl RetrievalConfig {
    pub fn is_base_state_label(&self, label: &str) -> bool {
        self.base_state_labels.iter().any(|l| l == label)
    }
}

/// Options specific to exhaustive path-tree retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathTreeOptions {
    /// Prune candidate units whose output ingredients overlap the goal's
    /// relevant-ingredient set too little.
    pub check_ingredient_context: bool,

    /// Search-tree nodes deeper than this are recorded but not expanded.
    pub max_height: Option<usize>,

    /// Keep only this many smallest-cardinality combinations per tree node
    /// (greedy truncation; fewer new units per step is preferred).
    pub max_children: Option<usize>,

    /// When non-empty, unit inputs whose labels and ingredients fall outside
    /// this list are ignored during expansion, and `Plan::project` strips
    /// them from the reported plans.
    pub objects_to_keep: Vec<String>,
}

impl Default for PathTreeOptions {
    fn default() -> Self {
        PathTreeOptions {
            check_ingredient_context: true,
            max_height: None,
            max_children: None,
            objects_to_keep: Vec::new(),
        }
    }
}
