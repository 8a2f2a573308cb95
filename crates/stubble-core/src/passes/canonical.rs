//! Canonical (sorted) ordering of a unit.

use crate::error::CoreError;
use crate::ir::*;
use crate::kinds::{NodeKind, PassSpec};
use crate::visit::Pass;

/// Sort every unordered name-space and every union into a canonical order.
/// Signature order is left alone by default: it determines overload
/// resolution order and is semantic.
pub struct CanonicalOrdering {
    sort_signatures: bool,
}

impl CanonicalOrdering {
    pub fn new() -> Self {
        CanonicalOrdering {
            sort_signatures: false,
        }
    }

    /// Also sort signatures. Only valid for units whose signature order is
    /// not meaningful (e.g. inference output).
    pub fn with_sorted_signatures() -> Self {
        CanonicalOrdering {
            sort_signatures: true,
        }
    }
}

impl Default for CanonicalOrdering {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for CanonicalOrdering {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new(
            "canonical-ordering",
            &[
                NodeKind::Unit,
                NodeKind::Class,
                NodeKind::Function,
                NodeKind::Signature,
                NodeKind::UnionType,
            ],
        );
        &SPEC
    }

    fn rebuild_unit(&mut self, mut node: Unit) -> Result<Unit, CoreError> {
        node.constants.sort();
        node.type_params.sort();
        node.classes.sort_by(|a, b| a.name.cmp(&b.name));
        node.functions.sort_by(|a, b| a.name().cmp(b.name()));
        node.aliases.sort();
        Ok(node)
    }

    fn rebuild_class(&mut self, mut node: Class) -> Result<Class, CoreError> {
        node.methods.sort_by(|a, b| a.name().cmp(b.name()));
        node.constants.sort();
        Ok(node)
    }

    fn rebuild_function(&mut self, mut node: Function) -> Result<Function, CoreError> {
        if self.sort_signatures {
            node.signatures.sort();
        }
        Ok(node)
    }

    fn rebuild_signature(&mut self, mut node: Signature) -> Result<Signature, CoreError> {
        node.exceptions.sort();
        Ok(node)
    }

    fn rebuild_union_type(&mut self, mut node: UnionType) -> Result<Type, CoreError> {
        node.options.sort();
        Ok(Type::Union(node))
    }
}
