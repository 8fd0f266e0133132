//! Error taxonomy for graph construction, loading and retrieval.
//!
//! A missing producer is not an error (the object is promoted to the
//! available set) and an ambiguous goal is resolved by trying every
//! candidate; neither appears here. All failures are local to a single query and never
//! invalidate the shared graph or its indices.

use thiserror::Error;

use crate::graph::node::NodeIndex;

#[derive(Debug, Error)]
pub enum GraphError {
    /// A functional unit without a motion, inputs or outputs.
    #[error("functional unit is empty (missing motion, inputs or outputs)")]
    EmptyUnit,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// No graph node matches the goal's type/state signature at the
    /// requested level.
    #[error("goal {key} not found in the graph at level {level}")]
    GoalNotFound { key: String, level: u8 },

    /// The greedy retriever re-encountered the goal more often than the
    /// configured depth bound allows; carries the unresolved queue and the
    /// available set at the time of abort for diagnosis.
    #[error("search for {key} exceeded the re-encounter bound of {bound} (queue of {} unresolved nodes)", pending.len())]
    UnresolvableWithinDepth {
        key: String,
        bound: usize,
        pending: Vec<NodeIndex>,
        available: Vec<NodeIndex>,
    },

    /// Hierarchy levels are 1, 2 or 3.
    #[error("invalid hierarchy level {0}; must be 1, 2 or 3")]
    InvalidLevel(u8),

    /// Retrieval was attempted before `FoonGraph::build_indices`.
    #[error("graph indices have not been built; call build_indices() after loading")]
    IndicesNotBuilt,
}

/// Loader errors carry the one-based line number of the offending input.
#[derive(Debug, Error)]
#[error("parse error at line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        ParseError {
            line,
            reason: reason.into(),
        }
    }
}

/// Failure while loading graph files from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
