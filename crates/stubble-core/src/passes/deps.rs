//! Dependency collection: the module prefixes of every qualified reference.

use std::collections::BTreeSet;

use crate::arena::rpartition;
use crate::error::CoreError;
use crate::ir::{ClassType, NamedType};
use crate::kinds::{NodeKind, PassSpec};
use crate::visit::Pass;

#[derive(Debug, Default)]
pub struct CollectDependencies {
    pub modules: BTreeSet<String>,
}

impl CollectDependencies {
    pub fn new() -> Self {
        CollectDependencies::default()
    }

    fn note(&mut self, name: &str) {
        let (module, dot, _) = rpartition(name);
        if !dot.is_empty() {
            self.modules.insert(module.to_string());
        }
    }
}

impl Pass for CollectDependencies {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new(
            "collect-dependencies",
            &[NodeKind::NamedType, NodeKind::ClassType],
        );
        &SPEC
    }

    fn enter_named_type(&mut self, node: &NamedType) -> Result<(), CoreError> {
        self.note(&node.name);
        Ok(())
    }

    fn enter_class_type(&mut self, node: &ClassType) -> Result<(), CoreError> {
        self.note(&node.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, Type, Unit};
    use crate::visit;

    #[test]
    fn collects_module_prefixes_only() {
        let unit = Unit {
            name: "m".into(),
            constants: vec![
                Constant {
                    name: "a".into(),
                    ty: Type::named("foo.bar.C"),
                },
                Constant {
                    name: "b".into(),
                    ty: Type::named("int"),
                },
            ],
            ..Unit::default()
        };
        let mut pass = CollectDependencies::new();
        visit::run(&mut pass, &unit).unwrap();
        assert_eq!(
            pass.modules.into_iter().collect::<Vec<_>>(),
            vec!["foo.bar".to_string()]
        );
    }
}
