//! The graph model: per-level node/unit arenas, the hierarchy builder that
//! registers each raw functional unit at all three levels, and the derived
//! index maps.

pub mod indices;
pub mod node;
pub mod unit;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::indices::LevelIndices;
use crate::graph::node::{Ingredient, MotionNode, Node, NodeIndex, ObjectNode, State, UnitIndex};
use crate::graph::unit::{FunctionalUnit, UnitSnapshot};
use crate::types::{Entity, Level};

/// A raw object record as supplied by a loader: full level-3 fidelity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    pub object_type: i32,
    pub label: String,
    pub states: Vec<State>,
    pub ingredients: Vec<String>,
    pub has_portion: bool,
    pub is_goal: bool,
    /// Whether the object is actively manipulated by the unit's motion.
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMotion {
    pub motion_type: i32,
    pub label: String,
    pub taxonomy_code: Option<String>,
}

/// One functional-unit record from the input stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUnit {
    pub inputs: Vec<RawObject>,
    pub motion: Option<RawMotion>,
    pub outputs: Vec<RawObject>,
    pub times: Option<(String, String)>,
    pub success_rate: Option<f64>,
    pub entity: Option<Entity>,
}

impl RawUnit {
    pub fn is_empty(&self) -> bool {
        self.motion.is_none() || self.inputs.is_empty() || self.outputs.is_empty()
    }
}

/// Node and unit arenas of a single hierarchy level.
#[derive(Debug, Clone, Default)]
pub struct LevelGraph {
    pub nodes: Vec<Node>,
    pub units: Vec<FunctionalUnit>,
}

impl LevelGraph {
    /// Arena access for node indices that units reference as inputs or
    /// outputs; those are object nodes by construction.
    pub fn object(&self, idx: NodeIndex) -> &ObjectNode {
        match &self.nodes[idx] {
            Node::Object(o) => o,
            Node::Motion(m) => panic!("node {} ('{}') is not an object", idx, m.label),
        }
    }

    pub fn motion(&self, idx: NodeIndex) -> &MotionNode {
        match &self.nodes[idx] {
            Node::Motion(m) => m,
            Node::Object(o) => panic!("node {} ('{}') is not a motion", idx, o.label),
        }
    }

    /// Index of the first object node equal to `probe` at `level`, if any.
    pub fn find_object(&self, probe: &ObjectNode, level: Level) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| {
            n.as_object()
                .map(|o| o.matches(probe, level))
                .unwrap_or(false)
        })
    }

    /// Indices of every object node with the given type code and state-type
    /// multiset, ignoring state labels and ingredients. This is how goal and
    /// environment probes are anchored to the graph.
    pub fn find_objects_by_signature(&self, object_type: i32, state_types: &[i32]) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| {
                let o = n.as_object()?;
                (o.object_type == object_type && o.matches_state_types(state_types)).then_some(i)
            })
            .collect()
    }

    /// Whether an equal unit is already present. Because object nodes are
    /// interned per level, comparing the index sets of inputs and outputs is
    /// exactly the level's set-wise unit equality.
    pub fn find_equal_unit(
        &self,
        inputs: &[NodeIndex],
        outputs: &[NodeIndex],
        motion_type: i32,
    ) -> Option<UnitIndex> {
        let same_set = |a: &[NodeIndex], b: &[NodeIndex]| {
            a.len() == b.len() && a.iter().all(|x| b.contains(x))
        };
        self.units.iter().position(|u| {
            self.motion(u.motion).motion_type == motion_type
                && same_set(&u.inputs, inputs)
                && same_set(&u.outputs, outputs)
        })
    }

    /// Owned copy of a unit with its nodes resolved, edge lists dropped.
    pub fn snapshot_unit(&self, unit: UnitIndex) -> UnitSnapshot {
        let u = &self.units[unit];
        let strip = |idx: &NodeIndex| {
            let mut o = self.object(*idx).clone();
            o.neighbors.clear();
            o
        };
        let mut motion = self.motion(u.motion).clone();
        motion.neighbors.clear();
        UnitSnapshot {
            inputs: u.inputs.iter().map(strip).collect(),
            input_active: u.input_active.clone(),
            motion,
            outputs: u.outputs.iter().map(strip).collect(),
            output_active: u.output_active.clone(),
            times: u.times.clone(),
            success_rate: u.success_rate,
            entity: u.entity,
        }
    }
}

/// The whole knowledge graph: one `LevelGraph` per hierarchy level plus the
/// derived indices. A fresh instance replaces any notion of a global reset;
/// retrieval calls borrow the graph immutably, so the model and indices stay
/// valid across queries.
#[derive(Debug, Clone, Default)]
pub struct FoonGraph {
    levels: [LevelGraph; 3],
    indices: [Option<LevelIndices>; 3],
}

impl FoonGraph {
    pub fn new() -> Self {
        FoonGraph::default()
    }

    pub fn level(&self, level: Level) -> &LevelGraph {
        &self.levels[level.index()]
    }

    /// The derived maps for a level; `None` until `build_indices` has run
    /// after the most recent mutation.
    pub fn indices(&self, level: Level) -> Option<&LevelIndices> {
        self.indices[level.index()].as_ref()
    }

    pub fn unit_count(&self, level: Level) -> usize {
        self.level(level).units.len()
    }

    pub fn node_count(&self, level: Level) -> usize {
        self.level(level).nodes.len()
    }

    /// Registers one raw functional unit at all three levels.
    ///
    /// Object nodes are interned per level using that level's equality;
    /// the unit itself is inserted only if no equal unit exists at the
    /// level, so unit counts shrink monotonically from level 3 to level 1.
    /// Edges are wired to match the level-3 topology: each input object
    /// points at the motion, the motion points at each output object.
    pub fn append_unit(&mut self, raw: &RawUnit) -> Result<(), GraphError> {
        let Some(motion) = raw.motion.as_ref() else {
            return Err(GraphError::EmptyUnit);
        };
        if raw.is_empty() {
            return Err(GraphError::EmptyUnit);
        }
        for level in Level::ALL {
            self.append_at_level(raw, motion, level);
        }
        // any mutation invalidates the derived maps
        self.indices = [None, None, None];
        Ok(())
    }

    fn append_at_level(&mut self, raw: &RawUnit, motion: &RawMotion, level: Level) {
        let arena = &mut self.levels[level.index()];

        let intern = |arena: &mut LevelGraph, raw_obj: &RawObject| -> NodeIndex {
            let probe = object_at_fidelity(raw_obj, level);
            match arena.find_object(&probe, level) {
                Some(idx) => {
                    if raw_obj.is_goal {
                        if let Node::Object(o) = &mut arena.nodes[idx] {
                            o.is_goal = true;
                        }
                    }
                    idx
                }
                None => {
                    arena.nodes.push(Node::Object(probe));
                    arena.nodes.len() - 1
                }
            }
        };

        let inputs: Vec<NodeIndex> = raw.inputs.iter().map(|o| intern(arena, o)).collect();
        let outputs: Vec<NodeIndex> = raw.outputs.iter().map(|o| intern(arena, o)).collect();

        if arena
            .find_equal_unit(&inputs, &outputs, motion.motion_type)
            .is_some()
        {
            log::debug!(
                "[graph] level {} already holds an equal unit for motion '{}'",
                level,
                motion.label
            );
            return;
        }

        // motion nodes are per-unit instances; one is created for every kept
        // unit rather than interned
        let motion_idx = arena.nodes.len();
        arena.nodes.push(Node::Motion(MotionNode {
            motion_type: motion.motion_type,
            label: motion.label.clone(),
            taxonomy_code: motion.taxonomy_code.clone(),
            neighbors: Vec::new(),
        }));

        let mut unit = FunctionalUnit {
            motion: motion_idx,
            times: raw.times.clone(),
            success_rate: raw.success_rate,
            entity: raw.entity,
            ..Default::default()
        };
        for (idx, raw_obj) in inputs.iter().zip(&raw.inputs) {
            unit.add_input(*idx, raw_obj.active);
        }
        for (idx, raw_obj) in outputs.iter().zip(&raw.outputs) {
            unit.add_output(*idx, raw_obj.active);
        }

        for &input in &unit.inputs {
            if let Node::Object(o) = &mut arena.nodes[input] {
                o.neighbors.push(motion_idx);
            }
        }
        if let Node::Motion(m) = &mut arena.nodes[motion_idx] {
            m.neighbors.extend(unit.outputs.iter().copied());
        }

        arena.units.push(unit);
    }

    /// Recomputes the derived maps for every level. Idempotent: building
    /// twice without mutation yields identical maps. Requires exclusive
    /// access, so no retrieval can observe a half-built index.
    pub fn build_indices(&mut self) {
        for level in Level::ALL {
            let built = LevelIndices::build(&self.levels[level.index()]);
            log::debug!(
                "[graph] level {}: indexed {} nodes / {} units",
                level,
                built.outputs_to_units.len(),
                built.unit_prerequisites.len()
            );
            self.indices[level.index()] = Some(built);
        }
    }

    pub fn indices_built(&self) -> bool {
        self.indices.iter().all(|i| i.is_some())
    }

    /// Object nodes at a level that no unit produces; a convenient seed for
    /// callers assembling a raw-materials environment.
    pub fn input_only_nodes(&self, level: Level) -> Vec<NodeIndex> {
        let Some(indices) = self.indices(level) else {
            return Vec::new();
        };
        self.level(level)
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| n.is_object() && indices.is_starting_node(*i))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Projects a raw object record to the fidelity of a level: level 3 keeps
/// states and ingredients, level 2 keeps states only, level 1 keeps only the
/// type code and label.
fn object_at_fidelity(raw: &RawObject, level: Level) -> ObjectNode {
    let mut o = ObjectNode::new(raw.object_type, raw.label.clone());
    o.has_portion = raw.has_portion;
    o.is_goal = raw.is_goal;
    if level >= Level::Two {
        for s in &raw.states {
            o.add_state(s.clone());
        }
    }
    if level == Level::Three {
        o.ingredients = raw
            .ingredients
            .iter()
            .map(|l| Ingredient::Label(l.clone()))
            .collect();
    }
    o
}
