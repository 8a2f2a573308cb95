//! The per-batch class arena.
//!
//! Cross-module class references are resolved to indices into an arena
//! built from every unit in a loaded batch, replacing ambient object
//! identity. Lookup walks symbol tables in a fixed precedence order: the
//! reference's own module qualifier, then the unqualified name against the
//! registering unit, then the `builtins` table, then an optional wildcard
//! fallback table.

use std::collections::HashMap;

use crate::ir::{Class, ClassIx, Unit};

pub const BUILTINS: &str = "builtins";

#[derive(Debug, Clone)]
pub struct ClassArena {
    classes: Vec<Class>,
    /// table name -> class name (as the class carries it) -> index.
    tables: HashMap<String, HashMap<String, ClassIx>>,
    fallback: Option<String>,
}

impl ClassArena {
    pub fn new() -> Self {
        ClassArena {
            classes: Vec::new(),
            tables: HashMap::new(),
            fallback: None,
        }
    }

    /// Build an arena over a batch of units, each registered under its
    /// module name.
    pub fn from_units<'a>(units: impl IntoIterator<Item = &'a Unit>) -> Self {
        let mut arena = ClassArena::new();
        for unit in units {
            arena.register(unit.name.clone(), unit);
        }
        arena
    }

    /// Register every class of `unit` under the table `name`. The same unit
    /// may be registered under several table names (e.g. under its own name
    /// and under the empty name for unqualified self-references).
    pub fn register(&mut self, name: impl Into<String>, unit: &Unit) {
        let table = self.tables.entry(name.into()).or_default();
        for class in &unit.classes {
            let ix = match table.get(&class.name) {
                Some(ix) => *ix,
                None => {
                    let ix = ClassIx(self.classes.len() as u32);
                    self.classes.push(class.clone());
                    ix
                }
            };
            table.insert(class.name.clone(), ix);
        }
    }

    /// Use the table registered under `name` as the wildcard fallback.
    pub fn set_fallback(&mut self, name: impl Into<String>) {
        self.fallback = Some(name.into());
    }

    pub fn class(&self, ix: ClassIx) -> &Class {
        &self.classes[ix.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn table_get(&self, table: &str, name: &str) -> Option<ClassIx> {
        self.tables.get(table)?.get(name).copied()
    }

    /// Resolve a class reference name to an arena index.
    pub fn resolve(&self, name: &str) -> Option<ClassIx> {
        let (module, _, _) = rpartition(name);
        let mut attempts: Vec<(String, String)> = Vec::new();
        if !module.is_empty() {
            attempts.push((module.to_string(), name.to_string()));
        } else {
            attempts.push((String::new(), name.to_string()));
            attempts.push((BUILTINS.to_string(), name.to_string()));
            attempts.push((BUILTINS.to_string(), format!("{BUILTINS}.{name}")));
        }
        if let Some(fallback) = &self.fallback {
            attempts.push((fallback.clone(), name.to_string()));
            attempts.push((fallback.clone(), format!("{BUILTINS}.{name}")));
        }
        for (table, key) in attempts {
            if let Some(ix) = self.table_get(&table, &key) {
                return Some(ix);
            }
        }
        None
    }
}

impl Default for ClassArena {
    fn default() -> Self {
        ClassArena::new()
    }
}

/// Split `name` into (everything before the final dot, ".", tail); the
/// first component is empty when there is no dot.
pub fn rpartition(name: &str) -> (&str, &str, &str) {
    match name.rfind('.') {
        Some(pos) => (&name[..pos], ".", &name[pos + 1..]),
        None => ("", "", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Class;

    fn class(name: &str) -> Class {
        Class {
            name: name.to_string(),
            metaclass: None,
            parents: vec![],
            methods: vec![],
            constants: vec![],
            template: vec![],
        }
    }

    fn unit(name: &str, classes: &[&str]) -> Unit {
        Unit {
            name: name.to_string(),
            classes: classes.iter().map(|c| class(c)).collect(),
            ..Unit::default()
        }
    }

    #[test]
    fn qualified_lookup_uses_the_module_table() {
        let foo = unit("foo", &["foo.C"]);
        let arena = ClassArena::from_units([&foo]);
        assert!(arena.resolve("foo.C").is_some());
        assert!(arena.resolve("bar.C").is_none());
    }

    #[test]
    fn unqualified_lookup_falls_through_to_builtins() {
        let builtins = unit(BUILTINS, &["builtins.int"]);
        let arena = ClassArena::from_units([&builtins]);
        assert!(arena.resolve("int").is_some());
        assert!(arena.resolve("str").is_none());
    }

    #[test]
    fn fallback_table_is_tried_last() {
        let builtins = unit(BUILTINS, &["builtins.int"]);
        let wild = unit("wild", &["D"]);
        let mut arena = ClassArena::from_units([&builtins, &wild]);
        assert!(arena.resolve("D").is_none());
        arena.set_fallback("wild");
        assert!(arena.resolve("D").is_some());
    }
}
