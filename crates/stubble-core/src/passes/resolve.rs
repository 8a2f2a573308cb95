//! Reference resolution: NamedType to ClassType conversion, pointer
//! fill-in against the class arena, and declared-type-parameter insertion.

use std::collections::HashMap;

use tracing::debug;

use crate::arena::ClassArena;
use crate::error::CoreError;
use crate::ir::*;
use crate::kinds::{NodeKind, PassSpec};
use crate::visit::Pass;

/// Syntactic conversion of every NamedType into a ClassType with an empty
/// link. Pointer fill-in happens later, against a whole batch.
pub struct NamedToClassType;

impl Pass for NamedToClassType {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("named-to-class-type", &[NodeKind::NamedType]);
        &SPEC
    }

    fn rebuild_named_type(&mut self, node: NamedType) -> Result<Type, CoreError> {
        Ok(Type::Class(ClassType::unresolved(node.name)))
    }
}

/// Fill in class links against an arena. Misses are part of normal
/// operation unless `strict` is set: a later pass or a fallback table may
/// still supply them.
pub struct LinkClassTypes<'a> {
    arena: &'a ClassArena,
    strict: bool,
}

impl<'a> LinkClassTypes<'a> {
    pub fn new(arena: &'a ClassArena) -> Self {
        LinkClassTypes {
            arena,
            strict: false,
        }
    }

    /// Turn resolution misses into hard lookup errors.
    pub fn strict(arena: &'a ClassArena) -> Self {
        LinkClassTypes {
            arena,
            strict: true,
        }
    }
}

impl Pass for LinkClassTypes<'_> {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("link-class-types", &[NodeKind::ClassType]);
        &SPEC
    }

    fn rebuild_class_type(&mut self, node: ClassType) -> Result<Type, CoreError> {
        if node.link.is_resolved() {
            return Ok(Type::Class(node));
        }
        match self.arena.resolve(&node.name) {
            Some(ix) => Ok(Type::Class(ClassType {
                name: node.name,
                link: ClassLink::Resolved(ix),
            })),
            None if self.strict => Err(CoreError::Lookup { name: node.name }),
            None => {
                debug!(name = %node.name, "class reference not resolved yet");
                Ok(Type::Class(node))
            }
        }
    }
}

/// Replace references to declared type parameters with the declarations
/// themselves. Runs immediately after building a unit, before any name
/// prefixing.
pub struct InsertTypeParameters {
    declared: HashMap<String, TypeParameter>,
}

impl InsertTypeParameters {
    pub fn new() -> Self {
        InsertTypeParameters {
            declared: HashMap::new(),
        }
    }
}

impl Default for InsertTypeParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for InsertTypeParameters {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new(
            "insert-type-parameters",
            &[NodeKind::Unit, NodeKind::NamedType],
        );
        &SPEC
    }

    fn enter_unit(&mut self, node: &Unit) -> Result<(), CoreError> {
        self.declared = node
            .type_params
            .iter()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();
        Ok(())
    }

    fn leave_unit(&mut self, _: &Unit) {
        self.declared.clear();
    }

    fn rebuild_named_type(&mut self, node: NamedType) -> Result<Type, CoreError> {
        match self.declared.get(&node.name) {
            Some(tp) => Ok(Type::TypeParam(tp.clone())),
            None => Ok(Type::Named(node)),
        }
    }
}

/// Assertion-style check that resolution left nothing behind. A violation
/// is a defect in the pipeline itself, not malformed user input, so it
/// aborts instead of reporting a diagnostic.
pub struct VerifyLinked;

impl Pass for VerifyLinked {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new(
            "verify-linked",
            &[NodeKind::NamedType, NodeKind::ClassType],
        );
        &SPEC
    }

    fn enter_named_type(&mut self, node: &NamedType) -> Result<(), CoreError> {
        panic!("unresolved NamedType survived resolution: {}", node.name);
    }

    fn enter_class_type(&mut self, node: &ClassType) -> Result<(), CoreError> {
        assert!(
            node.link.is_resolved(),
            "ClassType without a class link: {}",
            node.name
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visit;

    fn constant_unit(name: &str, ty: Type) -> Unit {
        Unit {
            name: "m".into(),
            constants: vec![Constant {
                name: name.into(),
                ty,
            }],
            ..Unit::default()
        }
    }

    #[test]
    fn named_types_become_unresolved_class_types() {
        let unit = constant_unit("c", Type::named("foo.C"));
        let out = visit::run(&mut NamedToClassType, &unit).unwrap();
        assert_eq!(
            out.constants[0].ty,
            Type::Class(ClassType::unresolved("foo.C"))
        );
    }

    #[test]
    fn insert_type_parameters_replaces_declared_names() {
        let mut unit = constant_unit("c", Type::named("T"));
        unit.type_params = vec![TypeParameter::named("T")];
        let out = visit::run(&mut InsertTypeParameters::new(), &unit).unwrap();
        assert_eq!(out.constants[0].ty, Type::TypeParam(TypeParameter::named("T")));
    }

    #[test]
    #[should_panic(expected = "unresolved NamedType")]
    fn verify_rejects_named_types() {
        let unit = constant_unit("c", Type::named("foo.C"));
        let _ = visit::run(&mut VerifyLinked, &unit);
    }

    #[test]
    #[should_panic(expected = "without a class link")]
    fn verify_rejects_empty_links() {
        let unit = constant_unit("c", Type::Class(ClassType::unresolved("foo.C")));
        let _ = visit::run(&mut VerifyLinked, &unit);
    }
}
