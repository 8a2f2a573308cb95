use thiserror::Error;

use stubble_core::CoreError;
use stubble_parser::ParseError;

#[derive(Error, Debug)]
pub enum CacheError {
    /// A stored unit references a module or symbol the live module map
    /// cannot supply; the cache entry cannot be restored.
    #[error("unrestorable dependency: {0}")]
    UnrestorableDependency(String),

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("cache encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
