//! The batch loader: two-phase cross-module resolution.
//!
//! Class references may be mutually cyclic across modules, so pointer
//! fill-in never requires a module to be "resolved", only "parsed": the
//! loader first parses every reachable module syntactically, then fills in
//! class links across the whole batch against one growing arena.
//!
//! Module identity is the declared path, never the content: two names that
//! map to byte-identical (or empty) sources are parsed and namespaced as
//! two independent units.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use stubble_core::arena::{ClassArena, BUILTINS};
use stubble_core::passes::{
    AdjustTypeParameters, CollectDependencies, LinkClassTypes, NamedToClassType, VerifyLinked,
};
use stubble_core::{visit, Unit};
use stubble_parser::{parse_source, ParseOptions, Version};

use crate::error::CacheError;

/// Source text for one module, as supplied by the external module loader.
#[derive(Debug, Clone)]
pub struct SourceModule {
    pub filename: String,
    pub source: String,
}

/// The external collaborator that maps module names to source text.
pub trait ModuleSource {
    fn load(&self, module: &str) -> Option<SourceModule>;
}

/// A simple in-memory source, mainly for tests and embedders.
#[derive(Debug, Default, Clone)]
pub struct MapSource {
    modules: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        MapSource::default()
    }

    pub fn insert(&mut self, module: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.modules.insert(module.into(), source.into());
        self
    }
}

impl ModuleSource for MapSource {
    fn load(&self, module: &str) -> Option<SourceModule> {
        self.modules.get(module).map(|source| SourceModule {
            filename: format!("{module}.stub"),
            source: source.clone(),
        })
    }
}

/// Run the standalone resolution pipeline over one parsed unit: template
/// adjustment, syntactic class-type conversion, then link fill-in against
/// the given context units.
pub fn resolve_unit(unit: &Unit, context: &[&Unit]) -> Result<(Unit, ClassArena), CacheError> {
    let unit = visit::run(&mut AdjustTypeParameters::new(), unit)?;
    let unit = visit::run(&mut NamedToClassType, &unit)?;
    let mut arena = ClassArena::from_units(context.iter().copied());
    arena.register(unit.name.clone(), &unit);
    let unit = visit::run(&mut LinkClassTypes::new(&arena), &unit)?;
    Ok((unit, arena))
}

pub struct Loader<S> {
    source: S,
    version: Version,
    platform: String,
    modules: HashMap<String, Unit>,
    /// Modules that already went through template adjustment and class-type
    /// conversion; they only need link fill-in on later batches.
    converted: HashSet<String>,
    arena: ClassArena,
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl<S: ModuleSource> Loader<S> {
    pub fn new(source: S) -> Self {
        Loader {
            source,
            version: stubble_parser::builder::DEFAULT_VERSION,
            platform: stubble_parser::builder::DEFAULT_PLATFORM.to_string(),
            modules: HashMap::new(),
            converted: HashSet::new(),
            arena: ClassArena::new(),
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    pub fn with_target(mut self, version: Version, platform: impl Into<String>) -> Self {
        self.version = version;
        self.platform = platform.into();
        self
    }

    /// Load a module (parsing it and everything reachable from it that the
    /// source can supply) and return it with class links filled in.
    pub fn import_name(&mut self, module: &str) -> Result<&Unit, CacheError> {
        self.load_batch(&[module])?;
        Ok(&self.modules[module])
    }

    /// Load a batch of modules. All parsing happens before any pointer
    /// fill-in, so mutually cyclic imports are fine.
    pub fn load_batch(&mut self, roots: &[&str]) -> Result<(), CacheError> {
        // Phase 1: parse every reachable module.
        let mut queue: VecDeque<(String, bool)> = VecDeque::new();
        queue.push_back((BUILTINS.to_string(), false));
        for root in roots {
            queue.push_back((root.to_string(), true));
        }
        let mut newly_parsed = Vec::new();
        while let Some((name, required)) = queue.pop_front() {
            if self.modules.contains_key(&name) {
                continue;
            }
            let Some(found) = self.source.load(&name) else {
                if required {
                    return Err(CacheError::ModuleNotFound(name));
                }
                continue;
            };
            debug!(module = %name, filename = %found.filename, "parsing");
            let options = ParseOptions {
                version: self.version,
                platform: self.platform.clone(),
                ..ParseOptions::default()
            };
            let unit = parse_source(
                &found.source,
                Some(&name),
                Some(&found.filename),
                &options,
            )?;

            let mut deps = CollectDependencies::new();
            visit::run(&mut deps, &unit)?;
            self.node(&name);
            for dep in deps.modules {
                if dep != name {
                    let (from, to) = (self.node(&name), self.node(&dep));
                    self.graph.update_edge(from, to, ());
                    // Transitive dependencies are best-effort; resolution
                    // falls through softly for modules nobody can supply.
                    queue.push_back((dep, false));
                }
            }
            self.modules.insert(name.clone(), unit);
            newly_parsed.push(name);
        }

        // Phase 2: convert the new units, then fill in links everywhere.
        for name in &newly_parsed {
            let unit = &self.modules[name];
            let unit = visit::run(&mut AdjustTypeParameters::new(), unit)?;
            let unit = visit::run(&mut NamedToClassType, &unit)?;
            self.arena.register(name.clone(), &unit);
            self.modules.insert(name.clone(), unit);
            self.converted.insert(name.clone());
        }
        let names: Vec<String> = self.modules.keys().cloned().collect();
        for name in names {
            let unit = &self.modules[&name];
            let linked = visit::run(&mut LinkClassTypes::new(&self.arena), unit)?;
            self.modules.insert(name, linked);
        }
        Ok(())
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        match self.nodes.get(name) {
            Some(ix) => *ix,
            None => {
                let ix = self.graph.add_node(name.to_string());
                self.nodes.insert(name.to_string(), ix);
                ix
            }
        }
    }

    pub fn get_module(&self, name: &str) -> Option<&Unit> {
        self.modules.get(name)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Unit> {
        self.modules.values()
    }

    pub fn arena(&self) -> &ClassArena {
        &self.arena
    }

    /// The module dependency graph discovered so far.
    pub fn dependency_graph(&self) -> &DiGraph<String, ()> {
        &self.graph
    }

    /// Assert that a loaded module has no unresolved references left.
    /// Aborts on violation; an unresolved leftover here is a pipeline
    /// defect, not user input.
    pub fn verify(&self, name: &str) {
        if let Some(unit) = self.modules.get(name) {
            let _ = visit::run(&mut VerifyLinked, unit);
        }
    }
}
