use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A qualified reference that no reachable symbol table satisfies.
    #[error("symbol lookup failed: {name}")]
    Lookup { name: String },

    /// A template or container shape violation (contradictory type-parameter
    /// orderings, unbound type parameters, bad arity).
    #[error("container error: {0}")]
    Container(String),

    /// A pass was used in a state it does not support.
    #[error("internal error: {0}")]
    Internal(String),
}
