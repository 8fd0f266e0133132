//! Functional units: one action instance relating input objects, a motion
//! and output objects.

use serde::{Deserialize, Serialize};

use crate::graph::node::{MotionNode, NodeIndex, ObjectNode};
use crate::types::Entity;

/// A functional unit stored inside a level's arena. Inputs, outputs and the
/// motion are arena indices; the parallel `*_active` vectors flag which
/// objects are actively manipulated by the motion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionalUnit {
    pub inputs: Vec<NodeIndex>,
    pub input_active: Vec<bool>,
    pub motion: NodeIndex,
    pub outputs: Vec<NodeIndex>,
    pub output_active: Vec<bool>,
    /// Start/end of the unit inside its source sequence, when annotated.
    pub times: Option<(String, String)>,
    /// Execution success rate in [0, 1], when annotated.
    pub success_rate: Option<f64>,
    pub entity: Option<Entity>,
}

impl FunctionalUnit {
    pub fn add_input(&mut self, node: NodeIndex, active: bool) {
        if !self.inputs.contains(&node) {
            self.inputs.push(node);
            self.input_active.push(active);
        }
    }

    pub fn add_output(&mut self, node: NodeIndex, active: bool) {
        if !self.outputs.contains(&node) {
            self.outputs.push(node);
            self.output_active.push(active);
        }
    }
}

/// An owned, serializable copy of a functional unit, detached from the
/// arena. Snapshots are what retrieval hands to callers when unit content
/// must be modified without touching the shared graph: the weighted selector
/// reassigns success rates on snapshots, and plan projection drops nodes and
/// ingredients from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub inputs: Vec<ObjectNode>,
    pub input_active: Vec<bool>,
    pub motion: MotionNode,
    pub outputs: Vec<ObjectNode>,
    pub output_active: Vec<bool>,
    pub times: Option<(String, String)>,
    pub success_rate: Option<f64>,
    pub entity: Option<Entity>,
}

impl UnitSnapshot {
    /// Reassigns this step to a human performer, forcing its success rate to
    /// certainty.
    pub fn reassign_to_human(&mut self) {
        self.entity = Some(Entity::Human);
        self.success_rate = Some(1.0);
    }
}
