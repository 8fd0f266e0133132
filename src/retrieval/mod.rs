//! Task-tree retrieval over the knowledge graph.
//!
//! Two algorithms share this module's vocabulary: the greedy searcher in
//! [`task_tree`] returns the first plan it can close over the available
//! items, and the exhaustive searcher in [`path_tree`] enumerates every
//! acyclic plan before one is selected. Both borrow the graph immutably and
//! report plans as ordered unit-index lists.

pub mod path_tree;
pub mod selection;
pub mod task_tree;

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::graph::node::{NodeIndex, ObjectNode, UnitIndex};
use crate::graph::unit::UnitSnapshot;
use crate::graph::FoonGraph;
use crate::types::Level;

/// What a retrieval query asks for: an object type in a particular state
/// combination. Labels are not part of the query; type codes identify the
/// object and its states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSpec {
    pub object_type: i32,
    pub state_types: Vec<i32>,
}

impl GoalSpec {
    pub fn new(object_type: i32, state_types: Vec<i32>) -> Self {
        GoalSpec {
            object_type,
            state_types,
        }
    }

    pub fn from_object(object: &ObjectNode) -> Self {
        GoalSpec {
            object_type: object.object_type,
            state_types: object.state_types(),
        }
    }

    /// Stable textual key for error reports.
    pub fn key(&self) -> String {
        let mut key = format!("O{}", self.object_type);
        for s in &self.state_types {
            key.push_str(&format!("S{s}"));
        }
        key
    }
}

/// An ordered sequence of functional units; executing them front to back
/// turns the available items into the goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub units: Vec<UnitIndex>,
}

impl Plan {
    pub fn new(units: Vec<UnitIndex>) -> Self {
        Plan { units }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Owned copies of the plan's units, in execution order.
    pub fn snapshots(&self, graph: &FoonGraph, level: Level) -> Vec<UnitSnapshot> {
        let arena = graph.level(level);
        self.units.iter().map(|&u| arena.snapshot_unit(u)).collect()
    }

    /// Distinct object nodes the plan touches, in order of first appearance.
    pub fn referenced_objects(&self, graph: &FoonGraph, level: Level) -> Vec<NodeIndex> {
        let arena = graph.level(level);
        let mut seen = Vec::new();
        for &u in &self.units {
            let unit = &arena.units[u];
            for &node in unit.inputs.iter().chain(unit.outputs.iter()) {
                if !seen.contains(&node) {
                    seen.push(node);
                }
            }
        }
        seen
    }

    /// Snapshots restricted to the objects named in `keep`. An object
    /// survives the projection if its own label is kept, or if it carries
    /// ingredients and at least one of them is kept; surviving ingredient
    /// lists are intersected with `keep`. With an empty `keep` list the
    /// snapshots are returned unchanged.
    pub fn project(&self, graph: &FoonGraph, level: Level, keep: &[String]) -> Vec<UnitSnapshot> {
        let mut snapshots = self.snapshots(graph, level);
        if keep.is_empty() {
            return snapshots;
        }
        for snap in &mut snapshots {
            project_objects(&mut snap.inputs, &mut snap.input_active, keep);
            project_objects(&mut snap.outputs, &mut snap.output_active, keep);
        }
        snapshots
    }
}

/// Whether an object survives projection onto a kept-label set.
pub(crate) fn object_is_kept(object: &ObjectNode, keep: &[String]) -> bool {
    keep.iter().any(|k| *k == object.label)
        || (object.has_ingredients()
            && object
                .ingredient_labels()
                .iter()
                .any(|i| keep.iter().any(|k| k == i)))
}

fn project_objects(objects: &mut Vec<ObjectNode>, active: &mut Vec<bool>, keep: &[String]) {
    let mut idx = 0;
    objects.retain(|o| {
        let kept = object_is_kept(o, keep);
        if !kept && idx < active.len() {
            active.remove(idx);
        } else {
            idx += 1;
        }
        kept
    });
    for o in objects.iter_mut() {
        o.ingredients
            .retain(|i| keep.iter().any(|k| k == i.label()));
    }
}

/// Object substitution seam: given an item that could not be anchored to the
/// graph, propose equivalent items to try instead.
pub trait Substituter {
    fn substitutes(&self, object: &ObjectNode) -> Vec<ObjectNode>;
}

/// The default seam: no substitution.
pub struct NoSubstitution;

impl Substituter for NoSubstitution {
    fn substitutes(&self, _object: &ObjectNode) -> Vec<ObjectNode> {
        Vec::new()
    }
}

/// Graph nodes matching the goal's type/state signature at the query level,
/// most recently added first. Level-3 queries match by signature alone, so
/// every ingredient variant of the goal is a candidate.
pub fn find_goal_candidates(
    graph: &FoonGraph,
    level: Level,
    goal: &GoalSpec,
) -> Result<Vec<NodeIndex>, RetrievalError> {
    let mut candidates = graph
        .level(level)
        .find_objects_by_signature(goal.object_type, &goal.state_types);
    if candidates.is_empty() {
        return Err(RetrievalError::GoalNotFound {
            key: goal.key(),
            level: level.index() as u8 + 1,
        });
    }
    candidates.reverse();
    Ok(candidates)
}

/// Anchors a list of available items to the arena of a level. Items that
/// match no node are offered to the substituter; items that still match
/// nothing are dropped, since a node absent from the graph can never appear
/// among a unit's inputs.
pub fn resolve_environment(
    graph: &FoonGraph,
    level: Level,
    items: &[ObjectNode],
    substituter: &dyn Substituter,
) -> Vec<NodeIndex> {
    let arena = graph.level(level);
    let mut resolved = Vec::new();
    let mut anchor = |object: &ObjectNode, resolved: &mut Vec<NodeIndex>| -> bool {
        let matches = arena.find_objects_by_signature(object.object_type, &object.state_types());
        for idx in &matches {
            if !resolved.contains(idx) {
                resolved.push(*idx);
            }
        }
        !matches.is_empty()
    };
    for item in items {
        if anchor(item, &mut resolved) {
            continue;
        }
        let mut substituted = false;
        for alternative in substituter.substitutes(item) {
            if anchor(&alternative, &mut resolved) {
                log::debug!(
                    "[retrieval] '{}' unavailable, substituting '{}'",
                    item.label,
                    alternative.label
                );
                substituted = true;
            }
        }
        if !substituted {
            log::debug!("[retrieval] item '{}' matches no graph node", item.label);
        }
    }
    resolved
}
