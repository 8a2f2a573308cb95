//! Name qualification and module renaming.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::ir::*;
use crate::kinds::{NodeKind, PassSpec};
use crate::visit::Pass;

const NAMED_KINDS: &[NodeKind] = &[
    NodeKind::Unit,
    NodeKind::Class,
    NodeKind::Function,
    NodeKind::ExternalFunction,
    NodeKind::Constant,
    NodeKind::Alias,
    NodeKind::NamedType,
    NodeKind::ClassType,
    NodeKind::TypeParameter,
];

/// Qualify every top-level definition, every reference to a local class,
/// and every module-scoped type parameter with the unit's name.
pub struct AddNamePrefix {
    prefix: String,
    local_classes: HashSet<String>,
    class_depth: usize,
}

impl AddNamePrefix {
    pub fn new() -> Self {
        AddNamePrefix {
            prefix: String::new(),
            local_classes: HashSet::new(),
            class_depth: 0,
        }
    }
}

impl Default for AddNamePrefix {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for AddNamePrefix {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("add-name-prefix", NAMED_KINDS);
        &SPEC
    }

    fn enter_unit(&mut self, node: &Unit) -> Result<(), CoreError> {
        self.prefix = format!("{}.", node.name);
        self.local_classes = node.classes.iter().map(|c| c.name.clone()).collect();
        Ok(())
    }

    fn enter_class(&mut self, _: &Class) -> Result<(), CoreError> {
        self.class_depth += 1;
        Ok(())
    }

    fn leave_class(&mut self, _: &Class) {
        self.class_depth -= 1;
    }

    fn rebuild_named_type(&mut self, node: NamedType) -> Result<Type, CoreError> {
        if self.local_classes.contains(&node.name) {
            Ok(Type::named(format!("{}{}", self.prefix, node.name)))
        } else {
            Ok(Type::Named(node))
        }
    }

    fn rebuild_class_type(&mut self, node: ClassType) -> Result<Type, CoreError> {
        if node.link.is_resolved() {
            return Err(CoreError::Internal(format!(
                "name-prefix pass ran after resolving {}",
                node.name
            )));
        }
        if self.local_classes.contains(&node.name) {
            Ok(Type::Class(ClassType::unresolved(format!(
                "{}{}",
                self.prefix, node.name
            ))))
        } else {
            Ok(Type::Class(node))
        }
    }

    fn rebuild_class(&mut self, node: Class) -> Result<Class, CoreError> {
        Ok(Class {
            name: format!("{}{}", self.prefix, node.name),
            ..node
        })
    }

    fn rebuild_function(&mut self, node: Function) -> Result<Function, CoreError> {
        if self.class_depth > 0 {
            return Ok(node);
        }
        Ok(Function {
            name: format!("{}{}", self.prefix, node.name),
            ..node
        })
    }

    fn rebuild_external_function(
        &mut self,
        node: ExternalFunction,
    ) -> Result<ExternalFunction, CoreError> {
        if self.class_depth > 0 {
            return Ok(node);
        }
        Ok(ExternalFunction {
            name: format!("{}{}", self.prefix, node.name),
            ..node
        })
    }

    fn rebuild_constant(&mut self, node: Constant) -> Result<Constant, CoreError> {
        if self.class_depth > 0 {
            return Ok(node);
        }
        Ok(Constant {
            name: format!("{}{}", self.prefix, node.name),
            ..node
        })
    }

    fn rebuild_alias(&mut self, node: Alias) -> Result<Alias, CoreError> {
        if self.class_depth > 0 {
            return Ok(node);
        }
        Ok(Alias {
            name: format!("{}{}", self.prefix, node.name),
            ..node
        })
    }

    fn rebuild_type_parameter(&mut self, node: TypeParameter) -> Result<TypeParameter, CoreError> {
        match &node.scope {
            Some(scope) => {
                let scope = format!("{}{}", self.prefix, scope);
                Ok(TypeParameter {
                    scope: Some(scope),
                    ..node
                })
            }
            // Module-level type parameters get the module as their scope;
            // the template-adjustment pass narrows the others later.
            None => Ok(node.with_scope(self.prefix.trim_end_matches('.'))),
        }
    }
}

/// Rewrite every qualified name under `old` to live under `new` instead.
/// This touches definitions, references and type-parameter scopes, which
/// makes it strictly more expensive than targeted link fill-in.
pub struct RenameModule {
    old: String,
    new: String,
}

impl RenameModule {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Result<Self, CoreError> {
        let old = old.into();
        if old.is_empty() {
            return Err(CoreError::Internal(
                "rename requires a non-empty module name".to_string(),
            ));
        }
        Ok(RenameModule {
            old,
            new: new.into(),
        })
    }

    fn maybe_new(&self, name: &str) -> Option<String> {
        if name == self.old {
            Some(self.new.clone())
        } else {
            name.strip_prefix(&self.old)
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|rest| format!("{}.{}", self.new, rest))
        }
    }
}

impl Pass for RenameModule {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("rename-module", NAMED_KINDS);
        &SPEC
    }

    fn rebuild_unit(&mut self, node: Unit) -> Result<Unit, CoreError> {
        Ok(Unit {
            name: self.new.clone(),
            ..node
        })
    }

    fn rebuild_named_type(&mut self, node: NamedType) -> Result<Type, CoreError> {
        match self.maybe_new(&node.name) {
            Some(name) => Ok(Type::named(name)),
            None => Ok(Type::Named(node)),
        }
    }

    fn rebuild_class_type(&mut self, node: ClassType) -> Result<Type, CoreError> {
        match self.maybe_new(&node.name) {
            Some(name) => Ok(Type::Class(ClassType {
                name,
                link: node.link,
            })),
            None => Ok(Type::Class(node)),
        }
    }

    fn rebuild_class(&mut self, node: Class) -> Result<Class, CoreError> {
        match self.maybe_new(&node.name) {
            Some(name) => Ok(Class { name, ..node }),
            None => Ok(node),
        }
    }

    fn rebuild_function(&mut self, node: Function) -> Result<Function, CoreError> {
        match self.maybe_new(&node.name) {
            Some(name) => Ok(Function { name, ..node }),
            None => Ok(node),
        }
    }

    fn rebuild_external_function(
        &mut self,
        node: ExternalFunction,
    ) -> Result<ExternalFunction, CoreError> {
        match self.maybe_new(&node.name) {
            Some(name) => Ok(ExternalFunction { name, ..node }),
            None => Ok(node),
        }
    }

    fn rebuild_constant(&mut self, node: Constant) -> Result<Constant, CoreError> {
        match self.maybe_new(&node.name) {
            Some(name) => Ok(Constant { name, ..node }),
            None => Ok(node),
        }
    }

    fn rebuild_alias(&mut self, node: Alias) -> Result<Alias, CoreError> {
        match self.maybe_new(&node.name) {
            Some(name) => Ok(Alias { name, ..node }),
            None => Ok(node),
        }
    }

    fn rebuild_type_parameter(&mut self, node: TypeParameter) -> Result<TypeParameter, CoreError> {
        let scope = match &node.scope {
            Some(scope) => match self.maybe_new(scope) {
                Some(new) => Some(new),
                None => Some(scope.clone()),
            },
            None => None,
        };
        Ok(TypeParameter { scope, ..node })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visit;

    #[test]
    fn prefix_qualifies_definitions_and_local_references() {
        let unit = Unit {
            name: "m".into(),
            constants: vec![Constant {
                name: "c".into(),
                ty: Type::named("C"),
            }],
            classes: vec![Class {
                name: "C".into(),
                metaclass: None,
                parents: vec![Type::named("other.D")],
                methods: vec![],
                constants: vec![Constant {
                    name: "attr".into(),
                    ty: Type::named("int"),
                }],
                template: vec![],
            }],
            ..Unit::default()
        };
        let out = visit::run(&mut AddNamePrefix::new(), &unit).unwrap();
        assert_eq!(out.constants[0].name, "m.c");
        assert_eq!(out.constants[0].ty, Type::named("m.C"));
        assert_eq!(out.classes[0].name, "m.C");
        // Non-local references and class members keep their names.
        assert_eq!(out.classes[0].parents[0], Type::named("other.D"));
        assert_eq!(out.classes[0].constants[0].name, "attr");
    }

    #[test]
    fn rename_rewrites_all_qualified_names() {
        let unit = Unit {
            name: "pkg.__init__".into(),
            classes: vec![Class {
                name: "pkg.__init__.C".into(),
                metaclass: None,
                parents: vec![],
                methods: vec![],
                constants: vec![],
                template: vec![],
            }],
            constants: vec![Constant {
                name: "pkg.__init__.c".into(),
                ty: Type::Class(ClassType::unresolved("pkg.__init__.C")),
            }],
            type_params: vec![TypeParameter {
                name: "T".into(),
                scope: Some("pkg.__init__".into()),
                bound: None,
                constraints: vec![],
            }],
            ..Unit::default()
        };
        let mut pass = RenameModule::new("pkg.__init__", "pkg").unwrap();
        let out = visit::run(&mut pass, &unit).unwrap();
        assert_eq!(out.name, "pkg");
        assert_eq!(out.classes[0].name, "pkg.C");
        assert_eq!(
            out.constants[0].ty,
            Type::Class(ClassType::unresolved("pkg.C"))
        );
        assert_eq!(out.type_params[0].scope.as_deref(), Some("pkg"));
    }

    #[test]
    fn rename_does_not_touch_lookalike_prefixes() {
        let mut pass = RenameModule::new("foo", "bar").unwrap();
        let unit = Unit {
            name: "foo".into(),
            constants: vec![Constant {
                name: "foobar.c".into(),
                ty: Type::named("foobar.C"),
            }],
            ..Unit::default()
        };
        let out = visit::run(&mut pass, &unit).unwrap();
        assert_eq!(out.constants[0].name, "foobar.c");
        assert_eq!(out.constants[0].ty, Type::named("foobar.C"));
    }
}
