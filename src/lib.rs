//! FOON knowledge graphs and task-tree retrieval.
//!
//! A FOON (functional object-oriented network) is a bipartite graph relating
//! object nodes to the motions that transform them, grouped into functional
//! units. This crate maintains such a graph at three levels of object detail,
//! derives the adjacency maps retrieval depends on, and answers "how do I
//! produce this object" queries two ways: a greedy searcher that returns the
//! first workable plan, and an exhaustive searcher that enumerates every
//! acyclic plan so a selector can pick the best one by item availability or
//! by success probability under human assistance.
//!
//! ```no_run
//! use foon::{load_subgraph, FoonGraph, GoalSpec, Level, NoSubstitution, RetrievalConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = FoonGraph::new();
//! load_subgraph(&mut graph, &std::fs::read_to_string("universal.txt")?)?;
//! graph.build_indices();
//!
//! let goal = GoalSpec::new(3, vec![12]);
//! let plan = foon::task_tree::retrieve(
//!     &graph,
//!     Level::Three,
//!     &goal,
//!     &[],
//!     &RetrievalConfig::default(),
//!     &NoSubstitution,
//! )?;
//! for step in plan.snapshots(&graph, Level::Three) {
//!     println!("{}", step.motion.label);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod loader;
pub mod retrieval;
pub mod types;

pub use config::{PathTreeOptions, RetrievalConfig};
pub use error::{GraphError, LoadError, ParseError, RetrievalError};
pub use graph::indices::LevelIndices;
pub use graph::node::{Ingredient, MotionNode, Node, NodeIndex, ObjectNode, State, UnitIndex};
pub use graph::unit::{FunctionalUnit, UnitSnapshot};
pub use graph::{FoonGraph, LevelGraph, RawMotion, RawObject, RawUnit};
pub use loader::{
    load_object_list_path, load_subgraph, load_subgraph_path, parse_object_list, parse_subgraph,
};
pub use retrieval::selection::{select_by_availability, select_by_weighting, WeightedChoice};
pub use retrieval::{path_tree, task_tree, GoalSpec, NoSubstitution, Plan, Substituter};
pub use types::{Entity, Level};
