//! Node entities of the bipartite graph: object nodes, motion nodes and the
//! state/ingredient records attached to objects.
//!
//! Nodes are addressed by stable arena indices (`NodeIndex`) per hierarchy
//! level; edges and ingredient lists are index sequences, never owning
//! references, so the mutual object/motion cross-references cannot form
//! reference cycles.

use serde::{Deserialize, Serialize};

use crate::types::Level;

/// Position of a node inside a level's arena.
pub type NodeIndex = usize;

/// Position of a functional unit inside a level's unit list.
pub type UnitIndex = usize;

/// One state record of an object node.
///
/// `related_object` names another object through which this object shares a
/// geometric relation (e.g. "in \[bowl\]").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub state_type: i32,
    pub label: Option<String>,
    pub related_object: Option<String>,
}

impl State {
    pub fn new(state_type: i32, label: impl Into<String>) -> Self {
        State {
            state_type,
            label: Some(label.into()),
            related_object: None,
        }
    }

    pub fn with_related(mut self, related: impl Into<String>) -> Self {
        self.related_object = Some(related.into());
        self
    }
}

/// An ingredient reference held by an object node. Ingredients are plain
/// labels unless the graph is built in recursive mode, in which case they
/// carry a fully nested object node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ingredient {
    Label(String),
    Nested(Box<ObjectNode>),
}

impl Ingredient {
    pub fn label(&self) -> &str {
        match self {
            Ingredient::Label(l) => l,
            Ingredient::Nested(o) => &o.label,
        }
    }
}

/// An object node: any item consumed or produced by a manipulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectNode {
    pub object_type: i32,
    pub label: String,
    /// Kept sorted by `(has_related, related_object, state_type)` after every
    /// mutation so that state-set comparison is order-independent.
    pub states: Vec<State>,
    pub ingredients: Vec<Ingredient>,
    pub has_portion: bool,
    pub is_goal: bool,
    /// Outgoing edges; for an object node these point at the motion nodes
    /// that consume it.
    #[serde(skip)]
    pub neighbors: Vec<NodeIndex>,
}

impl ObjectNode {
    pub fn new(object_type: i32, label: impl Into<String>) -> Self {
        ObjectNode {
            object_type,
            label: label.into(),
            ..Default::default()
        }
    }

    /// Appends a state unless an identical record is already present, then
    /// restores the sorting invariant.
    pub fn add_state(&mut self, state: State) {
        let duplicate = self.states.iter().any(|s| {
            s.state_type == state.state_type
                && s.label == state.label
                && s.related_object == state.related_object
        });
        if duplicate {
            log::warn!(
                "[graph] duplicate state {} ignored on object '{}'",
                state.state_type,
                self.label
            );
            return;
        }
        self.states.push(state);
        self.sort_states();
    }

    pub fn sort_states(&mut self) {
        self.states.sort_by(|a, b| {
            let ka = (a.related_object.is_some(), &a.related_object, a.state_type);
            let kb = (b.related_object.is_some(), &b.related_object, b.state_type);
            ka.cmp(&kb)
        });
    }

    pub fn state_types(&self) -> Vec<i32> {
        self.states.iter().map(|s| s.state_type).collect()
    }

    pub fn ingredient_labels(&self) -> Vec<String> {
        self.ingredients
            .iter()
            .map(|i| i.label().to_string())
            .collect()
    }

    pub fn has_ingredients(&self) -> bool {
        !self.ingredients.is_empty()
    }

    /// Level-1 equivalence: type code only.
    pub fn same_type(&self, other: &ObjectNode) -> bool {
        self.object_type == other.object_type
    }

    /// Full state-set equality (type, label and related object), compared as
    /// an unordered set.
    pub fn same_states(&self, other: &ObjectNode) -> bool {
        if self.states.len() != other.states.len() {
            return false;
        }
        self.states.iter().all(|s| {
            other.states.iter().any(|o| {
                s.state_type == o.state_type
                    && s.label == o.label
                    && s.related_object == o.related_object
            })
        })
    }

    /// State-set equality by type code only; used when matching goal and
    /// environment probes whose labels are unknown.
    pub fn same_state_types(&self, other: &ObjectNode) -> bool {
        self.matches_state_types(&other.state_types())
    }

    pub fn matches_state_types(&self, types: &[i32]) -> bool {
        let mut mine = self.state_types();
        let mut theirs = types.to_vec();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }

    /// Ingredient multiset equality, by label.
    pub fn same_ingredients(&self, other: &ObjectNode) -> bool {
        let mut mine = self.ingredient_labels();
        let mut theirs = other.ingredient_labels();
        mine.sort();
        theirs.sort();
        mine == theirs
    }

    /// Equivalence at a hierarchy level: level 1 compares type codes, level 2
    /// additionally the state set, level 3 additionally the ingredient
    /// multiset.
    pub fn matches(&self, other: &ObjectNode, level: Level) -> bool {
        match level {
            Level::One => self.same_type(other),
            Level::Two => self.same_type(other) && self.same_states(other),
            Level::Three => {
                self.same_type(other)
                    && self.same_states(other)
                    && self.same_ingredients(other)
            }
        }
    }

    /// Stable textual key for an object at a given level, used in error
    /// reports and file names.
    pub fn object_key(&self, level: Level) -> String {
        let mut key = format!("O{}", self.object_type);
        if level == Level::One {
            return key;
        }
        for s in &self.states {
            key.push_str(&format!(
                "S{}_{}",
                s.state_type,
                s.related_object.as_deref().unwrap_or("")
            ));
        }
        if level == Level::Three {
            key.push('{');
            key.push_str(&self.ingredient_labels().join(","));
            key.push('}');
        }
        key
    }
}

/// A motion node: the manipulation that transforms input objects into output
/// objects. Equality between motions is type-code only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionNode {
    pub motion_type: i32,
    pub label: String,
    /// Motion-taxonomy code; carried but not interpreted.
    pub taxonomy_code: Option<String>,
    /// Outgoing edges; for a motion node these point at the object nodes it
    /// produces.
    #[serde(skip)]
    pub neighbors: Vec<NodeIndex>,
}

impl MotionNode {
    pub fn new(motion_type: i32, label: impl Into<String>) -> Self {
        MotionNode {
            motion_type,
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn same_type(&self, other: &MotionNode) -> bool {
        self.motion_type == other.motion_type
    }
}

/// A graph node is either an object or a motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Object(ObjectNode),
    Motion(MotionNode),
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Object(o) => &o.label,
            Node::Motion(m) => &m.label,
        }
    }

    pub fn neighbors(&self) -> &[NodeIndex] {
        match self {
            Node::Object(o) => &o.neighbors,
            Node::Motion(m) => &m.neighbors,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            Node::Object(o) => Some(o),
            Node::Motion(_) => None,
        }
    }

    pub fn as_motion(&self) -> Option<&MotionNode> {
        match self {
            Node::Motion(m) => Some(m),
            Node::Object(_) => None,
        }
    }
}
