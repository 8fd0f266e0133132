//! Derived adjacency indices over one hierarchy level.
//!
//! These are pure functions of a level's node and unit arenas: they are
//! rebuilt whenever the graph changes and never persisted. Because every
//! level's arena deduplicates object nodes by that level's equality,
//! node-index equality coincides with level equality here, which keeps the
//! build at O(U·I) instead of the quadratic node-by-node scan.

use crate::graph::node::{NodeIndex, UnitIndex};
use crate::graph::LevelGraph;

/// The three retrieval maps of one level, each keyed by arena index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelIndices {
    /// Units producing a given object node (the node appears in their
    /// outputs). Empty for motion nodes and for starting nodes.
    pub outputs_to_units: Vec<Vec<UnitIndex>>,
    /// Units referencing a given object node as input or output.
    pub objects_to_units: Vec<Vec<UnitIndex>>,
    /// For each unit, the units whose outputs feed one of its inputs.
    pub unit_prerequisites: Vec<Vec<UnitIndex>>,
}

impl LevelIndices {
    /// Computes all three maps from scratch; prior contents are discarded,
    /// so repeated builds over an unchanged graph are identical.
    pub fn build(graph: &LevelGraph) -> LevelIndices {
        let mut outputs_to_units = vec![Vec::new(); graph.nodes.len()];
        let mut objects_to_units = vec![Vec::new(); graph.nodes.len()];

        for (u, unit) in graph.units.iter().enumerate() {
            for &out in &unit.outputs {
                push_unique(&mut outputs_to_units[out], u);
                push_unique(&mut objects_to_units[out], u);
            }
            for &inp in &unit.inputs {
                push_unique(&mut objects_to_units[inp], u);
            }
        }

        let mut unit_prerequisites = vec![Vec::new(); graph.units.len()];
        for (u, unit) in graph.units.iter().enumerate() {
            for &inp in &unit.inputs {
                for &producer in &outputs_to_units[inp] {
                    push_unique(&mut unit_prerequisites[u], producer);
                }
            }
        }

        LevelIndices {
            outputs_to_units,
            objects_to_units,
            unit_prerequisites,
        }
    }

    /// A starting node has no producing unit and is assumed obtainable
    /// without one.
    pub fn is_starting_node(&self, node: NodeIndex) -> bool {
        self.outputs_to_units[node].is_empty()
    }
}

fn push_unique(list: &mut Vec<UnitIndex>, unit: UnitIndex) {
    if !list.contains(&unit) {
        list.push(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FoonGraph;
    use crate::loader::test_support::bread_graph;
    use crate::types::Level;

    #[test]
    fn rebuild_is_idempotent() {
        let mut graph: FoonGraph = bread_graph();
        graph.build_indices();
        let first = graph.indices(Level::Three).unwrap().clone();
        graph.build_indices();
        let second = graph.indices(Level::Three).unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_graph_yields_empty_maps() {
        let level = LevelGraph::default();
        let indices = LevelIndices::build(&level);
        assert!(indices.outputs_to_units.is_empty());
        assert!(indices.objects_to_units.is_empty());
        assert!(indices.unit_prerequisites.is_empty());
    }

    #[test]
    fn prerequisites_follow_output_edges() {
        let mut graph: FoonGraph = bread_graph();
        graph.build_indices();
        let level = graph.level(Level::Three);
        let indices = graph.indices(Level::Three).unwrap();

        // the unit producing bread depends on the unit producing dough
        let bread_unit = level
            .units
            .iter()
            .position(|u| {
                u.outputs
                    .iter()
                    .any(|&o| level.object(o).label == "bread")
            })
            .unwrap();
        let dough_unit = level
            .units
            .iter()
            .position(|u| {
                u.outputs
                    .iter()
                    .any(|&o| level.object(o).label == "dough")
            })
            .unwrap();
        assert_eq!(indices.unit_prerequisites[bread_unit], vec![dough_unit]);
        assert!(indices.unit_prerequisites[dough_unit].is_empty());
    }
}
