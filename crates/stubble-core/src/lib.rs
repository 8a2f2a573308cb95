//! Core IR, visitor engine and passes for the stubble stub-declaration
//! compiler.

pub mod arena;
pub mod error;
pub mod ir;
pub mod kinds;
pub mod passes;
pub mod visit;

pub use arena::ClassArena;
pub use error::CoreError;
pub use ir::{Type, Unit};
