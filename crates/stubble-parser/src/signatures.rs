//! Signature construction: parameter-list validation, decorator rules, and
//! overload/property merging.

use std::collections::HashMap;

use stubble_core::error::CoreError;
use stubble_core::ir::*;
use stubble_core::kinds::{NodeKind, PassSpec};
use stubble_core::visit::{self, Pass};
use stubble_core::{ir, Type};

use crate::error::ParseError;

/// One function signature as collected by the grammar, before merging.
#[derive(Debug, Clone)]
pub struct NameAndSig {
    pub name: String,
    pub signature: Signature,
    pub decorator: Option<String>,
    pub external: bool,
}

/// A parameter as the grammar delivers it. Star parameters keep their
/// `*`/`**` name prefix; a bare `*` has the name `*`.
#[derive(Debug, Clone)]
pub enum ParamDecl {
    Param {
        name: String,
        ty: Option<Type>,
        default: Option<DefaultValue>,
    },
    /// Trailing `...` sugar: synthesizes both `*args` and `**kwargs`.
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    NoneLiteral,
    Int,
    Float,
    Ellipsis,
    Other,
}

#[derive(Debug, Clone)]
pub struct Params {
    pub required: Vec<Parameter>,
    pub starargs: Option<Parameter>,
    pub starstarargs: Option<Parameter>,
    pub has_bare_star: bool,
}

/// Find names for `*args`/`**kwargs` that collide with nothing in
/// `existing`.
pub fn invent_star_arg_params(existing: &[String]) -> (Parameter, Parameter) {
    let mut args = "args".to_string();
    let mut kwargs = "kwargs".to_string();
    while existing.contains(&args) {
        args = format!("_{args}");
    }
    while existing.contains(&kwargs) {
        kwargs = format!("_{kwargs}");
    }
    (
        Parameter {
            name: args,
            ty: Type::named("tuple"),
            kwonly: false,
            optional: true,
            mutated_type: None,
        },
        Parameter {
            name: kwargs,
            ty: Type::named("dict"),
            kwonly: false,
            optional: true,
            mutated_type: None,
        },
    )
}

fn type_for_default(default: DefaultValue) -> Type {
    match default {
        DefaultValue::NoneLiteral => Type::named("NoneType"),
        DefaultValue::Int => Type::named("int"),
        DefaultValue::Float => Type::named("float"),
        DefaultValue::Ellipsis | DefaultValue::Other => Type::named("object"),
    }
}

fn normal_param(
    name: String,
    param_type: Option<Type>,
    default: Option<DefaultValue>,
    kwonly: bool,
) -> Parameter {
    let mut param_type = param_type;
    if let Some(default) = default {
        let default_type = type_for_default(default);
        if default == DefaultValue::NoneLiteral {
            // `x: T = None` widens to T | None.
            if let Some(explicit) = param_type {
                param_type = Some(ir::join_types(vec![explicit, default_type]));
            }
        } else if param_type.is_none() {
            param_type = Some(default_type);
        }
    }
    Parameter {
        name,
        ty: param_type.unwrap_or_else(|| Type::named("object")),
        kwonly,
        optional: default.is_some(),
        mutated_type: None,
    }
}

fn star_param(name: &str, param_type: Option<Type>) -> Parameter {
    let ty = match param_type {
        None => Type::named("tuple"),
        Some(t) => Type::generic(Type::named("tuple"), vec![t]),
    };
    Parameter {
        name: name.to_string(),
        ty,
        kwonly: false,
        optional: true,
        mutated_type: None,
    }
}

fn starstar_param(name: &str, param_type: Option<Type>) -> Parameter {
    let ty = match param_type {
        None => Type::named("dict"),
        Some(t) => Type::generic(Type::named("dict"), vec![Type::named("str"), t]),
    };
    Parameter {
        name: name.to_string(),
        ty,
        kwonly: false,
        optional: true,
        mutated_type: None,
    }
}

/// Validate a parameter list and split it into required parameters, the
/// variadic parameters and the bare-star marker.
pub fn validate_params(param_list: Vec<ParamDecl>) -> Result<Params, ParseError> {
    let mut required: Vec<Parameter> = Vec::new();
    let mut has_bare_star = false;
    let mut starargs: Option<Parameter> = None;
    let mut starstarargs: Option<Parameter> = None;

    let count = param_list.len();
    for (i, param) in param_list.into_iter().enumerate() {
        let is_last = i + 1 == count;
        let ParamDecl::Param { name, ty, default } = param else {
            if !is_last {
                return Err(ParseError::new("ellipsis (...) must be last parameter"));
            }
            if has_bare_star {
                return Err(ParseError::new("ellipsis (...) not compatible with bare *"));
            }
            let (args, kwargs) = invent_star_arg_params(&[]);
            starargs = Some(args);
            starstarargs = Some(kwargs);
            continue;
        };

        if let Some(rest) = name.strip_prefix("**") {
            if !is_last {
                return Err(ParseError::new(format!("{name} must be last parameter")));
            }
            starstarargs = Some(starstar_param(rest, ty));
        } else if let Some(rest) = name.strip_prefix('*') {
            if starargs.is_some() || has_bare_star {
                return Err(ParseError::new("unexpected second *"));
            }
            if rest.is_empty() && is_last {
                return Err(ParseError::new("named arguments must follow bare *"));
            }
            if rest.is_empty() {
                has_bare_star = true;
            } else {
                starargs = Some(star_param(rest, ty));
            }
        } else {
            let kwonly = starargs.is_some() || has_bare_star;
            required.push(normal_param(name, ty, default, kwonly));
        }
    }

    Ok(Params {
        required,
        starargs,
        starstarargs,
        has_bare_star,
    })
}

pub fn is_property_decorator(decorator: &str) -> bool {
    // Property decorators are the only dotted ones.
    decorator == "property" || decorator.contains('.')
}

/// Whether the decorator must be kept for later processing. `overload` and
/// `abstractmethod` are legal but dropped; anything else unknown is an
/// error.
pub fn keep_decorator(decorator: &str) -> Result<bool, ParseError> {
    if decorator == "overload" || decorator == "abstractmethod" {
        Ok(false)
    } else if decorator == "staticmethod"
        || decorator == "classmethod"
        || is_property_decorator(decorator)
    {
        Ok(true)
    } else {
        Err(ParseError::new(format!(
            "decorator {decorator} not supported"
        )))
    }
}

/// Applies one `name := new_type` body statement to a signature.
pub struct MutateParameter {
    name: String,
    new_type: Type,
    applied: bool,
}

impl MutateParameter {
    pub fn new(name: impl Into<String>, new_type: Type) -> Self {
        MutateParameter {
            name: name.into(),
            new_type,
            applied: false,
        }
    }

    /// Apply this mutator to a signature; the mutator must match exactly
    /// one parameter, which may not be optional.
    pub fn apply(mut self, sig: &Signature) -> Result<Signature, ParseError> {
        let out = visit::run_signature(&mut self, sig).map_err(|e| match e {
            CoreError::Container(msg) => ParseError::new(msg),
            other => ParseError::new(other.to_string()),
        })?;
        if !self.applied {
            return Err(ParseError::new(format!(
                "no parameter named {}",
                self.name
            )));
        }
        Ok(out)
    }
}

impl Pass for MutateParameter {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("mutate-parameter", &[NodeKind::Parameter]);
        &SPEC
    }

    fn rebuild_parameter(&mut self, node: Parameter) -> Result<Parameter, CoreError> {
        if node.name != self.name {
            return Ok(node);
        }
        if node.optional {
            return Err(CoreError::Container(format!(
                "argument {} can not be both mutable and optional",
                node.name
            )));
        }
        self.applied = true;
        Ok(Parameter {
            mutated_type: Some(self.new_type.clone()),
            ..node
        })
    }
}

fn split_methods_and_properties(
    signatures: Vec<NameAndSig>,
) -> (Vec<NameAndSig>, Vec<NameAndSig>) {
    signatures.into_iter().partition(|sig| {
        !sig
            .decorator
            .as_deref()
            .is_some_and(is_property_decorator)
    })
}

/// Check a signature against the property shapes and return the property
/// type it contributes, if any.
fn parse_signature_as_property(sig: &NameAndSig) -> Result<Option<Type>, ParseError> {
    let decorator = sig.decorator.as_deref().unwrap_or_default();
    let num_params = sig.signature.params.len();
    if (decorator == "property" || decorator == format!("{}.getter", sig.name)) && num_params == 1 {
        return Ok(Some(sig.signature.return_type.clone()));
    }
    if (decorator == format!("{}.setter", sig.name) && num_params == 2)
        || (decorator == format!("{}.deleter", sig.name) && num_params == 1)
    {
        // Setters and deleters carry no property type information.
        return Ok(None);
    }
    Err(ParseError::new(format!("unhandled decorator: {decorator}")))
}

fn merge_property_signatures(signatures: Vec<NameAndSig>) -> Result<Vec<Constant>, ParseError> {
    let mut order: Vec<String> = Vec::new();
    let mut types: HashMap<String, Vec<Type>> = HashMap::new();
    for sig in &signatures {
        if !types.contains_key(&sig.name) {
            order.push(sig.name.clone());
            types.insert(sig.name.clone(), Vec::new());
        }
        if let Some(ty) = parse_signature_as_property(sig)? {
            types.get_mut(&sig.name).unwrap().push(ty);
        }
    }
    Ok(order
        .into_iter()
        .map(|name| {
            let tys = types.remove(&name).unwrap_or_default();
            let ty = if tys.is_empty() {
                Type::Anything
            } else {
                ir::join_types(tys)
            };
            Constant { name, ty }
        })
        .collect())
}

fn merge_method_signatures(signatures: Vec<NameAndSig>) -> Result<Vec<AnyFunction>, ParseError> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<Signature>> = HashMap::new();
    let mut decorators: HashMap<String, Option<String>> = HashMap::new();
    let mut external: HashMap<String, bool> = HashMap::new();

    for sig in signatures {
        if !grouped.contains_key(&sig.name) {
            order.push(sig.name.clone());
            grouped.insert(sig.name.clone(), Vec::new());
            decorators.insert(sig.name.clone(), sig.decorator.clone());
            external.insert(sig.name.clone(), sig.external);
        } else {
            if decorators[&sig.name] != sig.decorator {
                return Err(ParseError::new(format!(
                    "overloaded signatures for {} disagree on decorators",
                    sig.name
                )));
            }
            if sig.external && external[&sig.name] {
                return Err(ParseError::new(format!(
                    "multiple external definitions for {}",
                    sig.name
                )));
            }
            if sig.external != external[&sig.name] {
                return Err(ParseError::new(format!(
                    "mixed stub and external definitions for {}",
                    sig.name
                )));
            }
        }
        grouped.get_mut(&sig.name).unwrap().push(sig.signature);
    }

    Ok(order
        .into_iter()
        .map(|name| {
            let decorator = decorators.remove(&name).flatten();
            let kind = if name == "__new__" || decorator.as_deref() == Some("staticmethod") {
                MethodKind::StaticMethod
            } else if decorator.as_deref() == Some("classmethod") {
                MethodKind::ClassMethod
            } else {
                MethodKind::Method
            };
            if external.remove(&name) == Some(true) {
                AnyFunction::External(ExternalFunction { name, kind })
            } else {
                AnyFunction::Function(Function {
                    name: name.clone(),
                    signatures: grouped.remove(&name).unwrap_or_default(),
                    kind,
                })
            }
        })
        .collect())
}

/// Merge a flat list of signatures into functions and property constants.
/// A name used both ways is an error.
pub fn merge_signatures(
    signatures: Vec<NameAndSig>,
) -> Result<(Vec<AnyFunction>, Vec<Constant>), ParseError> {
    let (method_sigs, property_sigs) = split_methods_and_properties(signatures);
    let methods = merge_method_signatures(method_sigs)?;
    let constants = merge_property_signatures(property_sigs)?;
    let clashes: Vec<&str> = methods
        .iter()
        .map(|m| m.name())
        .filter(|m| constants.iter().any(|c| c.name == *m))
        .collect();
    if !clashes.is_empty() {
        return Err(ParseError::new(format!(
            "incompatible signatures for {}",
            clashes.join(", ")
        )));
    }
    Ok((methods, constants))
}
