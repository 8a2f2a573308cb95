//! Type-parameter adjustment: class templates merged from generic parents,
//! signature templates, and lexical scope assignment.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::ir::*;
use crate::kinds::{NodeKind, PassSpec};
use crate::visit::Pass;

/// Merge a sequence of sequences into one sequence in which every element
/// appears exactly once and each input's relative order is preserved.
/// Fails when two inputs impose contradictory orderings.
pub fn merge_sequences<T: Clone + PartialEq>(seqs: &[Vec<T>]) -> Result<Vec<T>, CoreError> {
    let mut seqs: Vec<Vec<T>> = seqs.to_vec();
    let mut result = Vec::new();
    loop {
        if seqs.iter().all(|s| s.is_empty()) {
            return Ok(result);
        }
        // Find a head that appears in no other sequence's tail.
        let mut candidate = None;
        for seq in &seqs {
            let Some(head) = seq.first() else { continue };
            let blocked = seqs
                .iter()
                .any(|other| other.len() > 1 && other[1..].contains(head) && other != seq);
            if !blocked {
                candidate = Some(head.clone());
                break;
            }
        }
        let Some(cand) = candidate else {
            return Err(CoreError::Container(
                "inconsistent ordering while merging sequences".to_string(),
            ));
        };
        for seq in &mut seqs {
            if seq.first() == Some(&cand) {
                seq.remove(0);
            }
        }
        result.push(cand);
    }
}

/// Collect the type parameters appearing in a generic parent's parameter
/// list, recursing through generics and unions.
fn template_items(param: &Type, items: &mut Vec<TypeParameter>) {
    match param {
        Type::Generic(g) => {
            for p in &g.parameters {
                template_items(p, items);
            }
        }
        Type::Union(u) => {
            for o in &u.options {
                template_items(o, items);
            }
        }
        Type::TypeParam(tp) => items.push(tp.clone()),
        _ => {}
    }
}

/// Adjusts type parameters across a unit:
///
/// * computes each class's template by merging the generic-parameter lists
///   of all its generic parents (order-preserving linearization);
/// * builds per-signature templates from the parameters a signature uses
///   that its class does not bind;
/// * assigns every type parameter its lexical scope;
/// * gives `self` parameters their class type;
/// * appends declarations for any used-but-undeclared type parameters.
pub struct AdjustTypeParameters {
    bound: HashSet<String>,
    bound_by_class: HashSet<String>,
    class_template: Option<Vec<TypeParameter>>,
    class_name: Option<String>,
    function_name: Option<String>,
    constant_name: Option<String>,
    sig_template: Option<Vec<TypeParameter>>,
    all_params: Vec<TypeParameter>,
}

impl AdjustTypeParameters {
    pub fn new() -> Self {
        AdjustTypeParameters {
            bound: HashSet::new(),
            bound_by_class: HashSet::new(),
            class_template: None,
            class_name: None,
            function_name: None,
            constant_name: None,
            sig_template: None,
            all_params: Vec::new(),
        }
    }

    fn full_name(&self, name: &str) -> String {
        match &self.class_name {
            Some(class) => format!("{class}.{name}"),
            None => name.to_string(),
        }
    }

    fn scope_for(&self, name: &str) -> Option<String> {
        if self.bound_by_class.contains(name) {
            return self.class_name.clone();
        }
        self.function_name
            .as_ref()
            .map(|f| self.full_name(f))
    }

    fn record(&mut self, tp: &TypeParameter) {
        if !self.all_params.contains(tp) {
            self.all_params.push(tp.clone());
        }
    }
}

impl Default for AdjustTypeParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for AdjustTypeParameters {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new(
            "adjust-type-parameters",
            &[
                NodeKind::Unit,
                NodeKind::Class,
                NodeKind::Function,
                NodeKind::Signature,
                NodeKind::Constant,
                NodeKind::TypeParameter,
            ],
        );
        &SPEC
    }

    fn enter_class(&mut self, node: &Class) -> Result<(), CoreError> {
        let mut per_parent = Vec::new();
        for parent in &node.parents {
            if let Type::Generic(g) = parent {
                let mut items = Vec::new();
                for p in &g.parameters {
                    template_items(p, &mut items);
                }
                per_parent.push(items);
            }
        }
        let template = merge_sequences(&per_parent).map_err(|_| {
            CoreError::Container(format!(
                "illegal type parameter order in class {}",
                node.name
            ))
        })?;

        for tp in &template {
            if !self.bound.insert(tp.name.clone()) {
                return Err(CoreError::Container(format!(
                    "duplicate type parameter {} in class {}",
                    tp.name, node.name
                )));
            }
        }
        self.bound_by_class = template.iter().map(|t| t.name.clone()).collect();
        self.class_template = Some(template);
        self.class_name = Some(node.name.clone());
        Ok(())
    }

    fn leave_class(&mut self, _: &Class) {
        for tp in self.class_template.take().unwrap_or_default() {
            self.bound.remove(&tp.name);
        }
        self.bound_by_class.clear();
        self.class_name = None;
    }

    fn rebuild_class(&mut self, node: Class) -> Result<Class, CoreError> {
        let class_name = node.name.clone();
        let template: Vec<TemplateItem> = self
            .class_template
            .clone()
            .unwrap_or_default()
            .iter()
            .map(|tp| TemplateItem {
                type_param: tp.with_scope(&class_name),
            })
            .collect();
        let mut node = Class { template, ..node };
        adjust_self(&mut node);
        Ok(node)
    }

    fn enter_function(&mut self, node: &Function) -> Result<(), CoreError> {
        self.function_name = Some(node.name.clone());
        Ok(())
    }

    fn leave_function(&mut self, _: &Function) {
        self.function_name = None;
    }

    fn enter_constant(&mut self, node: &Constant) -> Result<(), CoreError> {
        self.constant_name = Some(node.name.clone());
        Ok(())
    }

    fn leave_constant(&mut self, _: &Constant) {
        self.constant_name = None;
    }

    fn enter_signature(&mut self, _: &Signature) -> Result<(), CoreError> {
        self.sig_template = Some(Vec::new());
        Ok(())
    }

    fn leave_signature(&mut self, _: &Signature) {
        self.sig_template = None;
    }

    fn rebuild_signature(&mut self, node: Signature) -> Result<Signature, CoreError> {
        let template = self
            .sig_template
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|type_param| TemplateItem { type_param })
            .collect();
        Ok(Signature { template, ..node })
    }

    fn rebuild_type_parameter(&mut self, node: TypeParameter) -> Result<TypeParameter, CoreError> {
        if self.constant_name.is_some()
            && (self.class_name.is_none() || !self.bound_by_class.contains(&node.name))
        {
            return Err(CoreError::Container(format!(
                "unbound type parameter {} in {}",
                node.name,
                self.full_name(self.constant_name.as_deref().unwrap_or("")),
            )));
        }
        let node = match self.scope_for(&node.name) {
            Some(scope) => node.with_scope(scope),
            // Module-level parameter; the name-prefix pass already gave it
            // the module as its scope.
            None => node,
        };
        if let Some(sig_template) = &mut self.sig_template {
            if !self.bound.contains(&node.name) && !sig_template.iter().any(|t| t.name == node.name)
            {
                sig_template.push(node.clone());
            }
        }
        self.record(&node);
        Ok(node)
    }

    fn rebuild_unit(&mut self, node: Unit) -> Result<Unit, CoreError> {
        let declared: HashSet<String> = node.type_params.iter().map(|t| t.name.clone()).collect();
        let mut type_params = node.type_params;
        for tp in &self.all_params {
            if !declared.contains(&tp.name) && !type_params.iter().any(|t| t.name == tp.name) {
                tracing::debug!(name = %tp.name, "adding definition for type parameter");
                type_params.push(TypeParameter {
                    scope: None,
                    ..tp.clone()
                });
            }
        }
        Ok(Unit {
            type_params,
            ..node
        })
    }
}

/// Give untyped `self` parameters the type of their enclosing class.
fn adjust_self(class: &mut Class) {
    let self_type = class_as_type(class);
    let replaceable = |ty: &Type| match ty {
        Type::Named(n) => n.name == "object",
        Type::Class(c) => c.name == "object" || c.name == "builtins.object",
        Type::Anything => true,
        _ => false,
    };
    for method in &mut class.methods {
        if let AnyFunction::Function(f) = method {
            if f.kind != MethodKind::Method {
                continue;
            }
            for sig in &mut f.signatures {
                if let Some(first) = sig.params.first_mut() {
                    if first.name == "self" && replaceable(&first.ty) {
                        first.ty = self_type.clone();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visit;

    fn tp(name: &str) -> TypeParameter {
        TypeParameter::named(name)
    }

    #[test]
    fn merge_preserves_relative_order() {
        let merged = merge_sequences(&[vec!["T"], vec!["K", "V"]]).unwrap();
        assert_eq!(merged, vec!["T", "K", "V"]);
    }

    #[test]
    fn merge_rejects_contradictions() {
        assert!(merge_sequences(&[vec!["T", "K"], vec!["K", "T"]]).is_err());
    }

    fn generic_parent(base: &str, params: &[&str]) -> Type {
        Type::generic(
            Type::named(base),
            params.iter().map(|p| Type::TypeParam(tp(p))).collect(),
        )
    }

    #[test]
    fn class_template_merges_generic_parents() {
        let unit = Unit {
            name: "m".into(),
            classes: vec![Class {
                name: "m.C".into(),
                metaclass: None,
                parents: vec![
                    generic_parent("typing.Generic", &["T"]),
                    generic_parent("typing.Mapping", &["K", "V"]),
                ],
                methods: vec![],
                constants: vec![],
                template: vec![],
            }],
            ..Unit::default()
        };
        let out = visit::run(&mut AdjustTypeParameters::new(), &unit).unwrap();
        let names: Vec<&str> = out.classes[0].template.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["T", "K", "V"]);
        for item in &out.classes[0].template {
            assert_eq!(item.type_param.scope.as_deref(), Some("m.C"));
        }
        // Used parameters that were never declared get appended.
        let declared: Vec<&str> = out.type_params.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(declared, vec!["T", "K", "V"]);
    }

    #[test]
    fn contradictory_parent_order_is_an_error() {
        let unit = Unit {
            name: "m".into(),
            classes: vec![Class {
                name: "m.C".into(),
                metaclass: None,
                parents: vec![
                    generic_parent("typing.Generic", &["T", "K"]),
                    generic_parent("typing.Mapping", &["K", "T"]),
                ],
                methods: vec![],
                constants: vec![],
                template: vec![],
            }],
            ..Unit::default()
        };
        let err = visit::run(&mut AdjustTypeParameters::new(), &unit).unwrap_err();
        assert!(matches!(err, CoreError::Container(_)));
    }

    #[test]
    fn signature_templates_exclude_class_bound_params() {
        let sig = Signature {
            params: vec![Parameter {
                name: "x".into(),
                ty: Type::TypeParam(tp("S")),
                kwonly: false,
                optional: false,
                mutated_type: None,
            }],
            starargs: None,
            starstarargs: None,
            return_type: Type::TypeParam(tp("T")),
            exceptions: vec![],
            template: vec![],
        };
        let unit = Unit {
            name: "m".into(),
            classes: vec![Class {
                name: "m.C".into(),
                metaclass: None,
                parents: vec![generic_parent("typing.Generic", &["T"])],
                methods: vec![AnyFunction::Function(Function {
                    name: "f".into(),
                    signatures: vec![sig],
                    kind: MethodKind::Method,
                })],
                constants: vec![],
                template: vec![],
            }],
            ..Unit::default()
        };
        let out = visit::run(&mut AdjustTypeParameters::new(), &unit).unwrap();
        let AnyFunction::Function(f) = &out.classes[0].methods[0] else {
            panic!("expected a concrete function");
        };
        let sig_template: Vec<&str> = f.signatures[0].template.iter().map(|t| t.name()).collect();
        assert_eq!(sig_template, vec!["S"]);
        let s = &f.signatures[0].params[0];
        let Type::TypeParam(stp) = &s.ty else {
            panic!("expected type parameter");
        };
        assert_eq!(stp.scope.as_deref(), Some("m.C.f"));
    }

    #[test]
    fn unbound_parameter_in_constant_is_an_error() {
        let unit = Unit {
            name: "m".into(),
            constants: vec![Constant {
                name: "c".into(),
                ty: Type::TypeParam(tp("T")),
            }],
            ..Unit::default()
        };
        let err = visit::run(&mut AdjustTypeParameters::new(), &unit).unwrap_err();
        assert!(matches!(err, CoreError::Container(_)));
    }
}
