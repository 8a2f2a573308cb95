//! Binary cache and batch loader for the stubble stub-declaration
//! compiler.

pub mod error;
pub mod loader;
pub mod record;
pub mod serialize;

pub use error::CacheError;
pub use loader::{Loader, MapSource, ModuleSource, SourceModule};
pub use record::CacheRecord;
pub use serialize::{
    ensure_name, from_bytes, load_from_path, process_record, store_to_path, store_unit, to_bytes,
};
