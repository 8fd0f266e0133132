//! Shared primitive types used across the graph and retrieval modules.

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// One of the three hierarchy levels a graph is maintained at.
///
/// Level 3 carries full detail, level 2 drops ingredients, level 1 keeps only
/// object type codes. Equality at level `k` implies equality at every coarser
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    One,
    Two,
    Three,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::One, Level::Two, Level::Three];

    /// Zero-based index into per-level arrays.
    pub fn index(self) -> usize {
        match self {
            Level::One => 0,
            Level::Two => 1,
            Level::Three => 2,
        }
    }

    pub fn from_number(level: u8) -> Result<Level, RetrievalError> {
        match level {
            1 => Ok(Level::One),
            2 => Ok(Level::Two),
            3 => Ok(Level::Three),
            other => Err(RetrievalError::InvalidLevel(other)),
        }
    }

    /// The level used when matching goal candidates against unit outputs:
    /// level-3 searches compare at level 2 so that objects differing only in
    /// ingredients are all considered.
    pub fn match_level(self) -> Level {
        match self {
            Level::Three => Level::Two,
            other => other,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index() + 1)
    }
}

/// Performer of a functional unit, for success-rate bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Human,
    Robot,
}

impl Entity {
    pub fn parse(text: &str) -> Option<Entity> {
        match text.to_ascii_lowercase().as_str() {
            "human" => Some(Entity::Human),
            "robot" => Some(Entity::Robot),
            _ => None,
        }
    }
}
