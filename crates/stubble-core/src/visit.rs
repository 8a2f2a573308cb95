//! Generic post-order tree rewriting over the IR.
//!
//! A pass registers a [`PassSpec`] naming the kinds it handles; the engine
//! restricts traversal to the kinds whose subtrees can contain a handled
//! kind and copies everything else unchanged without descent. Traversal is
//! strict deterministic post-order: children are rewritten first in the
//! field order given by [`crate::kinds::children_of`], then the rebuild hook
//! for the current kind computes the replacement from the already-rewritten
//! children, then the leave hook runs.
//!
//! Hooks form an explicit dispatch table: every kind has an `enter_*`
//! (pre-order), `rebuild_*` (post-order, fallible) and `leave_*` entry
//! defaulting to a no-op or identity. A pass must list every kind it hooks
//! in its spec, or declare [`PassSpec::visit_all`].

use crate::error::CoreError;
use crate::ir::*;
use crate::kinds::{KindSet, NodeKind, PassSpec};

#[allow(unused_variables)]
pub trait Pass {
    fn spec(&self) -> &'static PassSpec;

    fn enter_unit(&mut self, node: &Unit) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_constant(&mut self, node: &Constant) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_alias(&mut self, node: &Alias) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_class(&mut self, node: &Class) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_function(&mut self, node: &Function) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_external_function(&mut self, node: &ExternalFunction) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_signature(&mut self, node: &Signature) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_parameter(&mut self, node: &Parameter) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_template_item(&mut self, node: &TemplateItem) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_named_type(&mut self, node: &NamedType) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_class_type(&mut self, node: &ClassType) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_generic_type(&mut self, node: &GenericType) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_tuple_type(&mut self, node: &TupleType) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_callable_type(&mut self, node: &CallableType) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_union_type(&mut self, node: &UnionType) -> Result<(), CoreError> {
        Ok(())
    }
    fn enter_type_parameter(&mut self, node: &TypeParameter) -> Result<(), CoreError> {
        Ok(())
    }

    fn rebuild_unit(&mut self, node: Unit) -> Result<Unit, CoreError> {
        Ok(node)
    }
    fn rebuild_constant(&mut self, node: Constant) -> Result<Constant, CoreError> {
        Ok(node)
    }
    fn rebuild_alias(&mut self, node: Alias) -> Result<Alias, CoreError> {
        Ok(node)
    }
    fn rebuild_class(&mut self, node: Class) -> Result<Class, CoreError> {
        Ok(node)
    }
    fn rebuild_function(&mut self, node: Function) -> Result<Function, CoreError> {
        Ok(node)
    }
    fn rebuild_external_function(
        &mut self,
        node: ExternalFunction,
    ) -> Result<ExternalFunction, CoreError> {
        Ok(node)
    }
    fn rebuild_signature(&mut self, node: Signature) -> Result<Signature, CoreError> {
        Ok(node)
    }
    fn rebuild_parameter(&mut self, node: Parameter) -> Result<Parameter, CoreError> {
        Ok(node)
    }
    fn rebuild_template_item(&mut self, node: TemplateItem) -> Result<TemplateItem, CoreError> {
        Ok(node)
    }
    fn rebuild_named_type(&mut self, node: NamedType) -> Result<Type, CoreError> {
        Ok(Type::Named(node))
    }
    fn rebuild_class_type(&mut self, node: ClassType) -> Result<Type, CoreError> {
        Ok(Type::Class(node))
    }
    fn rebuild_generic_type(&mut self, node: GenericType) -> Result<Type, CoreError> {
        Ok(Type::Generic(node))
    }
    fn rebuild_tuple_type(&mut self, node: TupleType) -> Result<Type, CoreError> {
        Ok(Type::Tuple(node))
    }
    fn rebuild_callable_type(&mut self, node: CallableType) -> Result<Type, CoreError> {
        Ok(Type::Callable(node))
    }
    fn rebuild_union_type(&mut self, node: UnionType) -> Result<Type, CoreError> {
        Ok(Type::Union(node))
    }
    fn rebuild_type_parameter(&mut self, node: TypeParameter) -> Result<TypeParameter, CoreError> {
        Ok(node)
    }
    fn rebuild_anything(&mut self) -> Result<Type, CoreError> {
        Ok(Type::Anything)
    }
    fn rebuild_nothing(&mut self) -> Result<Type, CoreError> {
        Ok(Type::Nothing)
    }

    fn leave_unit(&mut self, node: &Unit) {}
    fn leave_class(&mut self, node: &Class) {}
    fn leave_constant(&mut self, node: &Constant) {}
    fn leave_alias(&mut self, node: &Alias) {}
    fn leave_function(&mut self, node: &Function) {}
    fn leave_signature(&mut self, node: &Signature) {}
    fn leave_parameter(&mut self, node: &Parameter) {}
}

/// Run `pass` over a whole unit, producing the rewritten unit.
pub fn run<P: Pass + ?Sized>(pass: &mut P, unit: &Unit) -> Result<Unit, CoreError> {
    Rewriter::new(pass).unit(unit)
}

/// Run `pass` over a single signature (used by the builder's mutator
/// application).
pub fn run_signature<P: Pass + ?Sized>(
    pass: &mut P,
    sig: &Signature,
) -> Result<Signature, CoreError> {
    Rewriter::new(pass).signature(sig)
}

/// Run `pass` over a bare type expression.
pub fn run_type<P: Pass + ?Sized>(pass: &mut P, ty: &Type) -> Result<Type, CoreError> {
    Rewriter::new(pass).ty(ty)
}

struct Rewriter<'p, P: Pass + ?Sized> {
    pass: &'p mut P,
    set: KindSet,
}

impl<'p, P: Pass + ?Sized> Rewriter<'p, P> {
    fn new(pass: &'p mut P) -> Self {
        let set = pass.spec().visit_set();
        Rewriter { pass, set }
    }

    fn skip(&self, kind: NodeKind) -> bool {
        !self.set.contains(kind)
    }

    fn unit(&mut self, node: &Unit) -> Result<Unit, CoreError> {
        if self.skip(NodeKind::Unit) {
            return Ok(node.clone());
        }
        self.pass.enter_unit(node)?;
        let constants = self.constants(&node.constants)?;
        let type_params = node
            .type_params
            .iter()
            .map(|t| self.type_parameter(t))
            .collect::<Result<_, _>>()?;
        let classes = node
            .classes
            .iter()
            .map(|c| self.class(c))
            .collect::<Result<_, _>>()?;
        let functions = self.any_functions(&node.functions)?;
        let aliases = node
            .aliases
            .iter()
            .map(|a| self.alias(a))
            .collect::<Result<_, _>>()?;
        let out = self.pass.rebuild_unit(Unit {
            name: node.name.clone(),
            constants,
            type_params,
            classes,
            functions,
            aliases,
        })?;
        self.pass.leave_unit(node);
        Ok(out)
    }

    fn constants(&mut self, nodes: &[Constant]) -> Result<Vec<Constant>, CoreError> {
        nodes.iter().map(|c| self.constant(c)).collect()
    }

    fn any_functions(&mut self, nodes: &[AnyFunction]) -> Result<Vec<AnyFunction>, CoreError> {
        nodes
            .iter()
            .map(|f| match f {
                AnyFunction::Function(f) => Ok(AnyFunction::Function(self.function(f)?)),
                AnyFunction::External(f) => Ok(AnyFunction::External(self.external_function(f)?)),
            })
            .collect()
    }

    fn constant(&mut self, node: &Constant) -> Result<Constant, CoreError> {
        if self.skip(NodeKind::Constant) {
            return Ok(node.clone());
        }
        self.pass.enter_constant(node)?;
        let ty = self.ty(&node.ty)?;
        let out = self.pass.rebuild_constant(Constant {
            name: node.name.clone(),
            ty,
        })?;
        self.pass.leave_constant(node);
        Ok(out)
    }

    fn alias(&mut self, node: &Alias) -> Result<Alias, CoreError> {
        if self.skip(NodeKind::Alias) {
            return Ok(node.clone());
        }
        self.pass.enter_alias(node)?;
        let ty = self.ty(&node.ty)?;
        let out = self.pass.rebuild_alias(Alias {
            name: node.name.clone(),
            ty,
        })?;
        self.pass.leave_alias(node);
        Ok(out)
    }

    fn class(&mut self, node: &Class) -> Result<Class, CoreError> {
        if self.skip(NodeKind::Class) {
            return Ok(node.clone());
        }
        self.pass.enter_class(node)?;
        let parents = node
            .parents
            .iter()
            .map(|p| self.ty(p))
            .collect::<Result<_, _>>()?;
        let metaclass = node.metaclass.as_ref().map(|m| self.ty(m)).transpose()?;
        let template = node
            .template
            .iter()
            .map(|t| self.template_item(t))
            .collect::<Result<_, _>>()?;
        let constants = self.constants(&node.constants)?;
        let methods = self.any_functions(&node.methods)?;
        let out = self.pass.rebuild_class(Class {
            name: node.name.clone(),
            metaclass,
            parents,
            methods,
            constants,
            template,
        })?;
        self.pass.leave_class(node);
        Ok(out)
    }

    fn function(&mut self, node: &Function) -> Result<Function, CoreError> {
        if self.skip(NodeKind::Function) {
            return Ok(node.clone());
        }
        self.pass.enter_function(node)?;
        let signatures = node
            .signatures
            .iter()
            .map(|s| self.signature(s))
            .collect::<Result<_, _>>()?;
        let out = self.pass.rebuild_function(Function {
            name: node.name.clone(),
            signatures,
            kind: node.kind,
        })?;
        self.pass.leave_function(node);
        Ok(out)
    }

    fn external_function(&mut self, node: &ExternalFunction) -> Result<ExternalFunction, CoreError> {
        if self.skip(NodeKind::ExternalFunction) {
            return Ok(node.clone());
        }
        self.pass.enter_external_function(node)?;
        self.pass.rebuild_external_function(node.clone())
    }

    fn signature(&mut self, node: &Signature) -> Result<Signature, CoreError> {
        if self.skip(NodeKind::Signature) {
            return Ok(node.clone());
        }
        self.pass.enter_signature(node)?;
        let params = node
            .params
            .iter()
            .map(|p| self.parameter(p))
            .collect::<Result<_, _>>()?;
        let starargs = node
            .starargs
            .as_ref()
            .map(|p| self.parameter(p))
            .transpose()?;
        let starstarargs = node
            .starstarargs
            .as_ref()
            .map(|p| self.parameter(p))
            .transpose()?;
        let return_type = self.ty(&node.return_type)?;
        let exceptions = node
            .exceptions
            .iter()
            .map(|e| self.ty(e))
            .collect::<Result<_, _>>()?;
        let template = node
            .template
            .iter()
            .map(|t| self.template_item(t))
            .collect::<Result<_, _>>()?;
        let out = self.pass.rebuild_signature(Signature {
            params,
            starargs,
            starstarargs,
            return_type,
            exceptions,
            template,
        })?;
        self.pass.leave_signature(node);
        Ok(out)
    }

    fn parameter(&mut self, node: &Parameter) -> Result<Parameter, CoreError> {
        if self.skip(NodeKind::Parameter) {
            return Ok(node.clone());
        }
        self.pass.enter_parameter(node)?;
        let ty = self.ty(&node.ty)?;
        let mutated_type = node
            .mutated_type
            .as_ref()
            .map(|m| self.ty(m))
            .transpose()?;
        let out = self.pass.rebuild_parameter(Parameter {
            name: node.name.clone(),
            ty,
            kwonly: node.kwonly,
            optional: node.optional,
            mutated_type,
        })?;
        self.pass.leave_parameter(node);
        Ok(out)
    }

    fn template_item(&mut self, node: &TemplateItem) -> Result<TemplateItem, CoreError> {
        if self.skip(NodeKind::TemplateItem) {
            return Ok(node.clone());
        }
        self.pass.enter_template_item(node)?;
        let type_param = self.type_parameter(&node.type_param)?;
        self.pass.rebuild_template_item(TemplateItem { type_param })
    }

    fn type_parameter(&mut self, node: &TypeParameter) -> Result<TypeParameter, CoreError> {
        if self.skip(NodeKind::TypeParameter) {
            return Ok(node.clone());
        }
        self.pass.enter_type_parameter(node)?;
        let bound = match &node.bound {
            Some(b) => Some(Box::new(self.ty(b)?)),
            None => None,
        };
        let constraints = node
            .constraints
            .iter()
            .map(|c| self.ty(c))
            .collect::<Result<_, _>>()?;
        self.pass.rebuild_type_parameter(TypeParameter {
            name: node.name.clone(),
            scope: node.scope.clone(),
            bound,
            constraints,
        })
    }

    fn ty(&mut self, node: &Type) -> Result<Type, CoreError> {
        match node {
            Type::Named(n) => {
                if self.skip(NodeKind::NamedType) {
                    return Ok(node.clone());
                }
                self.pass.enter_named_type(n)?;
                self.pass.rebuild_named_type(n.clone())
            }
            Type::Class(c) => {
                if self.skip(NodeKind::ClassType) {
                    return Ok(node.clone());
                }
                self.pass.enter_class_type(c)?;
                self.pass.rebuild_class_type(c.clone())
            }
            Type::Generic(g) => {
                if self.skip(NodeKind::GenericType) {
                    return Ok(node.clone());
                }
                self.pass.enter_generic_type(g)?;
                let base = Box::new(self.ty(&g.base)?);
                let parameters = g
                    .parameters
                    .iter()
                    .map(|p| self.ty(p))
                    .collect::<Result<_, _>>()?;
                self.pass
                    .rebuild_generic_type(GenericType { base, parameters })
            }
            Type::Tuple(t) => {
                if self.skip(NodeKind::TupleType) {
                    return Ok(node.clone());
                }
                self.pass.enter_tuple_type(t)?;
                let base = Box::new(self.ty(&t.base)?);
                let elements = t
                    .elements
                    .iter()
                    .map(|e| self.ty(e))
                    .collect::<Result<_, _>>()?;
                self.pass.rebuild_tuple_type(TupleType { base, elements })
            }
            Type::Callable(c) => {
                if self.skip(NodeKind::CallableType) {
                    return Ok(node.clone());
                }
                self.pass.enter_callable_type(c)?;
                let base = Box::new(self.ty(&c.base)?);
                let parameters = c
                    .parameters
                    .iter()
                    .map(|p| self.ty(p))
                    .collect::<Result<_, _>>()?;
                self.pass
                    .rebuild_callable_type(CallableType { base, parameters })
            }
            Type::Union(u) => {
                if self.skip(NodeKind::UnionType) {
                    return Ok(node.clone());
                }
                self.pass.enter_union_type(u)?;
                let options = u
                    .options
                    .iter()
                    .map(|o| self.ty(o))
                    .collect::<Result<_, _>>()?;
                self.pass.rebuild_union_type(UnionType { options })
            }
            Type::TypeParam(tp) => Ok(Type::TypeParam(self.type_parameter(tp)?)),
            Type::Anything => {
                if self.skip(NodeKind::AnythingType) {
                    return Ok(Type::Anything);
                }
                self.pass.rebuild_anything()
            }
            Type::Nothing => {
                if self.skip(NodeKind::NothingType) {
                    return Ok(Type::Nothing);
                }
                self.pass.rebuild_nothing()
            }
        }
    }
}
