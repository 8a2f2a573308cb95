//! Storing and restoring units across processes.
//!
//! Class links are arena indices and never portable, so storing strips
//! them and records which ClassType nodes existed; loading patches links
//! back in against the live module map. A unit loaded under a different
//! name than it was stored with must first be renamed wholesale, which
//! invalidates the precise node list and forces the full-traversal path.

use std::path::Path;

use tracing::debug;

use stubble_core::arena::ClassArena;
use stubble_core::ir::ClassIx;
use stubble_core::passes::{
    CollectDependencies, IndexClassTypes, LinkClassTypes, RelinkByPosition, RenameModule,
    StripClassLinks,
};
use stubble_core::{visit, CoreError, Unit};

use crate::error::CacheError;
use crate::record::CacheRecord;

/// Build the cache record for a resolved (or partially resolved) unit.
pub fn store_unit(unit: &Unit) -> Result<CacheRecord, CacheError> {
    // A package `__init__` collapses to its package name.
    let unit = match unit.name.strip_suffix(".__init__") {
        Some(package) => {
            let mut rename = RenameModule::new(&unit.name, package)?;
            visit::run(&mut rename, unit)?
        }
        None => unit.clone(),
    };

    let mut deps = CollectDependencies::new();
    visit::run(&mut deps, &unit)?;
    let mut dependencies = deps.modules;
    if !unit.is_empty() {
        dependencies.insert(unit.name.clone());
    }

    let unit = visit::run(&mut StripClassLinks, &unit)?;
    let mut index = IndexClassTypes::new();
    visit::run(&mut index, &unit)?;

    Ok(CacheRecord {
        unit,
        dependencies,
        class_types: Some(index.names),
    })
}

pub fn to_bytes(record: &CacheRecord) -> Result<Vec<u8>, CacheError> {
    Ok(bincode::serialize(record)?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<CacheRecord, CacheError> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn store_to_path(unit: &Unit, path: &Path) -> Result<(), CacheError> {
    let record = store_unit(unit)?;
    std::fs::write(path, to_bytes(&record)?)?;
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<CacheRecord, CacheError> {
    from_bytes(&std::fs::read(path)?)
}

/// Rename the record if it is being loaded under a different module name
/// than it was stored with. Renaming rewrites every qualified name field,
/// so the precise relink list no longer matches and is dropped.
pub fn ensure_name(record: &mut CacheRecord, module_name: &str) -> Result<(), CacheError> {
    if record.unit.name == module_name {
        return Ok(());
    }
    debug!(
        stored = %record.unit.name,
        loaded_as = %module_name,
        "module name changed since storing; renaming"
    );
    let mut rename = RenameModule::new(record.unit.name.clone(), module_name)?;
    record.unit = visit::run(&mut rename, &record.unit)?;
    record.class_types = None;
    Ok(())
}

/// Relink a loaded record against the live units and return the restored
/// unit together with the arena its links point into.
///
/// When the record carries its precise ClassType list, only those nodes
/// are relinked; a single unresolvable name fails the load. Without the
/// list the whole unit is traversed.
pub fn process_record(
    record: CacheRecord,
    live: &[&Unit],
) -> Result<(Unit, ClassArena), CacheError> {
    let mut arena = ClassArena::from_units(live.iter().copied());
    arena.register(record.unit.name.clone(), &record.unit);

    match record.class_types {
        Some(names) => {
            let mut links: Vec<ClassIx> = Vec::with_capacity(names.len());
            for name in &names {
                match arena.resolve(name) {
                    Some(ix) => links.push(ix),
                    None => {
                        return Err(CacheError::UnrestorableDependency(name.clone()));
                    }
                }
            }
            let mut relink = RelinkByPosition::new(links);
            let unit = visit::run(&mut relink, &record.unit)?;
            relink.finish();
            Ok((unit, arena))
        }
        None => {
            debug!(module = %record.unit.name, "precise relink list missing; full traversal");
            let mut link = LinkClassTypes::strict(&arena);
            let unit = visit::run(&mut link, &record.unit).map_err(|e| match e {
                CoreError::Lookup { name } => CacheError::UnrestorableDependency(name),
                other => CacheError::Core(other),
            })?;
            Ok((unit, arena))
        }
    }
}
