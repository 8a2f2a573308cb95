//! The passes hosted on the transformation engine.

pub mod canonical;
pub mod deps;
pub mod print;
pub mod rename;
pub mod resolve;
pub mod strip;
pub mod template;

pub use canonical::CanonicalOrdering;
pub use deps::CollectDependencies;
pub use print::Printer;
pub use rename::{AddNamePrefix, RenameModule};
pub use resolve::{InsertTypeParameters, LinkClassTypes, NamedToClassType, VerifyLinked};
pub use strip::{IndexClassTypes, RelinkByPosition, StripClassLinks};
pub use template::{merge_sequences, AdjustTypeParameters};
