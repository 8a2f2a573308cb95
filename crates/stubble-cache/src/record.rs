//! The persisted cache record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use stubble_core::Unit;

/// What gets serialized to disk for one compiled unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// The unit with every class link stripped.
    pub unit: Unit,
    /// Fully qualified names of the modules this unit depends on. A
    /// non-empty unit records its own module too, so an empty module and a
    /// self-referencing one round-trip observably differently.
    pub dependencies: BTreeSet<String>,
    /// The qualified names of every ClassType node, in deterministic
    /// traversal order, for targeted relinking. `None` means the precise
    /// list was invalidated (e.g. by a rename) and relinking must
    /// re-derive the nodes by a full traversal.
    pub class_types: Option<Vec<String>>,
}
