//! The high-level builder: peer of the grammar front end.
//!
//! The grammar driver parses statements and calls back into a [`Builder`]
//! to construct IR. The builder owns all semantic state of one build call:
//! the condition-scope stack, the definition accumulators, the alias type
//! map and the import path map. A builder is used for exactly one unit;
//! `finish` consumes it.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use tracing::debug;

use stubble_core::ir::*;
use stubble_core::passes::{AddNamePrefix, InsertTypeParameters};
use stubble_core::{visit, Type};

use crate::compat::CompatRewrite;
use crate::condition::{eval_condition, Condition, ConditionScope, Version};
use crate::error::ParseError;
use crate::signatures::{
    keep_decorator, merge_signatures, validate_params, MutateParameter, NameAndSig, ParamDecl,
};

/// Attributes every generated named-tuple class carries, typed as anything.
const NAMEDTUPLE_MEMBERS: &[&str] = &[
    "_asdict",
    "__dict__",
    "_fields",
    "__getnewargs__",
    "__getstate__",
    "_make",
    "_replace",
    "__slots__",
];

pub const DEFAULT_VERSION: Version = Version([2, 7, 6]);
pub const DEFAULT_PLATFORM: &str = "linux";

/// A definition produced while parsing a block: the grammar collects these
/// and hands them back through `if_end`, `add_class` or `finish`.
#[derive(Debug, Clone)]
pub enum Def {
    Constant(Constant),
    Function(NameAndSig),
    Alias(Alias),
}

/// The value on the right-hand side of a module-level constant.
#[derive(Debug, Clone)]
pub enum ConstantValue {
    /// A bare `...` with no type comment.
    None,
    Int(i64),
    Type(Type),
}

/// One item of an import list.
#[derive(Debug, Clone)]
pub enum ImportItem {
    Plain(String),
    Renamed(String, String),
}

/// A type argument inside `[...]`; the ellipsis is a marker, not a type.
#[derive(Debug, Clone)]
pub enum TypeArg {
    Type(Type),
    Ellipsis,
}

/// A class-definition parent-list entry.
#[derive(Debug, Clone)]
pub enum ParentArg {
    Type(Type),
    Keyword(String, Type),
}

/// A statement in a function body.
#[derive(Debug, Clone)]
pub enum BodyStmt {
    Raise(Type),
    Mutate(String, Type),
}

/// A keyword argument in a `TypeVar(...)` call.
#[derive(Debug, Clone)]
pub enum KwargValue {
    Type(Type),
    Bool(bool),
}

pub struct Builder<'a> {
    version: Version,
    platform: String,
    unit_name: Option<String>,
    compat: Option<&'a dyn CompatRewrite>,
    scope: Box<ConditionScope>,
    constants: Vec<Constant>,
    aliases: Vec<Alias>,
    classes: Vec<Class>,
    type_params: Vec<TypeParameter>,
    type_map: HashMap<String, Type>,
    module_path_map: HashMap<String, String>,
    generated_classes: Vec<Class>,
    generated_counts: HashMap<String, usize>,
}

impl<'a> Builder<'a> {
    pub fn new(
        unit_name: Option<&str>,
        version: Option<Version>,
        platform: Option<&str>,
        compat: Option<&'a dyn CompatRewrite>,
    ) -> Self {
        Builder {
            version: version.unwrap_or(DEFAULT_VERSION),
            platform: platform.unwrap_or(DEFAULT_PLATFORM).to_string(),
            unit_name: unit_name.map(str::to_string),
            compat,
            scope: Box::new(ConditionScope::root()),
            constants: Vec::new(),
            aliases: Vec::new(),
            classes: Vec::new(),
            type_params: Vec::new(),
            type_map: HashMap::new(),
            module_path_map: HashMap::new(),
            generated_classes: Vec::new(),
            generated_counts: HashMap::new(),
        }
    }

    fn active(&self) -> bool {
        self.scope.active()
    }

    fn unit_name(&self) -> &str {
        self.unit_name.as_deref().unwrap_or_default()
    }

    // ---- conditional compilation -------------------------------------

    /// Begin an `if` block; returns whether the new scope is active.
    pub fn if_begin(&mut self, cond: &Condition) -> Result<bool, ParseError> {
        let value = eval_condition(cond, self.version, &self.platform)?;
        let scope = std::mem::replace(&mut self.scope, Box::new(ConditionScope::root()));
        self.scope = scope.push();
        self.scope.apply_condition(value);
        Ok(self.active())
    }

    /// Begin an `elif` clause of the current block.
    pub fn if_elif(&mut self, cond: &Condition) -> Result<bool, ParseError> {
        let value = eval_condition(cond, self.version, &self.platform)?;
        self.scope.apply_condition(value);
        Ok(self.active())
    }

    /// Begin the `else` clause of the current block.
    pub fn if_else(&mut self) -> bool {
        self.scope.apply_condition(true);
        self.active()
    }

    /// Finish the block; returns the definitions of the clause that ended
    /// active, if any.
    pub fn if_end(&mut self, clauses: Vec<(bool, Vec<Def>)>) -> Vec<Def> {
        let scope = std::mem::replace(&mut self.scope, Box::new(ConditionScope::root()));
        self.scope = scope.pop();
        for (active, defs) in clauses {
            if active {
                return defs;
            }
        }
        Vec::new()
    }

    // ---- definitions --------------------------------------------------

    pub fn new_constant(&self, name: &str, value: ConstantValue) -> Result<Constant, ParseError> {
        let ty = match value {
            ConstantValue::None => Type::Anything,
            ConstantValue::Int(0) => Type::named("int"),
            ConstantValue::Int(_) => {
                return Err(ParseError::new("only '0' allowed as int literal"));
            }
            ConstantValue::Type(t) => t,
        };
        Ok(Constant {
            name: name.to_string(),
            ty,
        })
    }

    /// Add a module-level alias or constant. `True`/`False` values become
    /// bool constants; anything else is an alias and is recorded in the
    /// in-file type map.
    pub fn add_alias_or_constant(&mut self, name: &str, value: Type) {
        if !self.active() {
            return;
        }
        let is_bool = matches!(
            value.reference_name(),
            Some("True") | Some("False")
        );
        if is_bool {
            self.constants.push(Constant {
                name: name.to_string(),
                ty: Type::named("bool"),
            });
        } else {
            self.type_map.insert(name.to_string(), value.clone());
            self.aliases.push(Alias {
                name: name.to_string(),
                ty: value,
            });
        }
    }

    /// Record an import statement. Renaming is only legal in the `from`
    /// form.
    pub fn add_import(
        &mut self,
        from_package: Option<&str>,
        items: Vec<ImportItem>,
    ) -> Result<(), ParseError> {
        match from_package {
            Some(package) => {
                if !self.active() {
                    return Ok(());
                }
                for item in items {
                    let (name, new_name) = match item {
                        ImportItem::Plain(name) => (name.clone(), name),
                        ImportItem::Renamed(name, new_name) => (name, new_name),
                    };
                    if name == "*" {
                        debug!(package, "wildcard import ignored");
                        continue;
                    }
                    let t = Type::named(format!("{package}.{name}"));
                    self.type_map.insert(new_name.clone(), t.clone());
                    if package != "typing" {
                        self.aliases.push(Alias { name: new_name, ty: t });
                        self.module_path_map
                            .insert(name.clone(), format!("{package}.{name}"));
                    }
                }
                Ok(())
            }
            None => {
                // A plain import has no effect on the unit, but renames are
                // not expressible.
                for item in &items {
                    if matches!(item, ImportItem::Renamed(..)) {
                        return Err(ParseError::new(
                            "renaming of modules not supported, use 'from' syntax",
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    // ---- types --------------------------------------------------------

    fn is_tuple_base(&self, t: &Type) -> bool {
        let Some(name) = t.reference_name() else {
            return false;
        };
        name == "tuple"
            || (self.unit_name() != "builtins" && name == "builtins.tuple")
            || (self.unit_name() == "typing" && name == "Tuple")
            || (self.unit_name() != "typing" && name == "typing.Tuple")
    }

    fn is_callable_base(&self, t: &Type) -> bool {
        let Some(name) = t.reference_name() else {
            return false;
        };
        (self.unit_name() == "typing" && name == "Callable")
            || (self.unit_name() != "typing" && name == "typing.Callable")
    }

    fn is_union_base(name: &str) -> bool {
        name == "typing.Union" || name == "Union"
    }

    fn is_optional_base(name: &str) -> bool {
        name == "typing.Optional" || name == "Optional"
    }

    fn is_empty_tuple(&self, t: &Type) -> bool {
        match t {
            Type::Generic(g) => {
                self.is_tuple_base(&g.base) && g.parameters == [Type::Nothing]
            }
            _ => false,
        }
    }

    fn is_heterogeneous_tuple(&self, t: &Type) -> bool {
        // The canonical empty tuple is encoded as a homogeneous container
        // over nothing, but its parameters are exactly known.
        matches!(t, Type::Tuple(_)) || self.is_empty_tuple(t)
    }

    fn is_any(t: &Type) -> bool {
        t.is_anything() || t.reference_name() == Some("typing.Any")
    }

    fn heterogeneous_tuple(base: Type, elements: Vec<Type>) -> Type {
        if elements.is_empty() {
            Type::generic(base, vec![Type::Nothing])
        } else {
            Type::Tuple(TupleType {
                base: Box::new(base),
                elements,
            })
        }
    }

    /// Build the type for a (possibly parameterized) name. Aliases and
    /// registered class names shadow imports; otherwise the head of a
    /// dotted name is expanded through the import path map.
    pub fn new_type(
        &self,
        name: &str,
        parameters: Option<Vec<TypeArg>>,
    ) -> Result<Type, ParseError> {
        if name == "None" {
            return Ok(Type::named("NoneType"));
        }
        let base_type = match self.type_map.get(name) {
            Some(t) => t.clone(),
            None => {
                let full = match name.split_once('.') {
                    Some((head, tail)) => {
                        let head = self
                            .module_path_map
                            .get(head)
                            .cloned()
                            .unwrap_or_else(|| head.to_string());
                        format!("{head}.{tail}")
                    }
                    None => name.to_string(),
                };
                Type::named(full)
            }
        };
        match parameters {
            Some(parameters) => {
                if let Some(base_name) = base_type.reference_name() {
                    if Self::is_union_base(base_name) {
                        let options = Self::resolve_ellipses(parameters);
                        return Ok(join_types(options));
                    }
                    if Self::is_optional_base(base_name) {
                        let mut options = Self::resolve_ellipses(parameters);
                        options.push(Type::named("NoneType"));
                        return Ok(join_types(options));
                    }
                }
                self.parameterized_type(base_type, parameters)
            }
            None => {
                if let Some(base_name) = base_type.reference_name() {
                    if Self::is_union_base(base_name) || Self::is_optional_base(base_name) {
                        return Err(ParseError::new(format!("missing options to {base_name}")));
                    }
                }
                Ok(base_type)
            }
        }
    }

    fn resolve_ellipses(parameters: Vec<TypeArg>) -> Vec<Type> {
        parameters
            .into_iter()
            .map(|p| match p {
                TypeArg::Type(t) => t,
                TypeArg::Ellipsis => Type::Anything,
            })
            .collect()
    }

    fn parameterized_type(
        &self,
        base_type: Type,
        parameters: Vec<TypeArg>,
    ) -> Result<Type, ParseError> {
        let ellipsis_last = parameters.len() == 2
            && matches!(parameters[1], TypeArg::Ellipsis)
            && !self.is_callable_base(&base_type);
        if ellipsis_last {
            let element = match parameters.into_iter().next().unwrap() {
                TypeArg::Type(t) => t,
                TypeArg::Ellipsis => {
                    return Err(ParseError::new("[..., ...] not supported"));
                }
            };
            return Ok(Type::generic(base_type, vec![element]));
        }

        let parameters = Self::resolve_ellipses(parameters);
        if self.is_tuple_base(&base_type) {
            return Ok(Self::heterogeneous_tuple(base_type, parameters));
        }
        if self.is_callable_base(&base_type)
            && parameters
                .first()
                .is_some_and(|p| self.is_heterogeneous_tuple(p))
        {
            if parameters.len() > 2 {
                return Err(ParseError::new(format!(
                    "expected 2 parameters to Callable, got {}",
                    parameters.len()
                )));
            }
            let mut parameters = parameters;
            if parameters.len() == 1 {
                // A return type is required, or the last argument would be
                // ambiguous.
                parameters.push(Type::Anything);
            }
            let first = parameters.remove(0);
            let mut flattened = match first {
                Type::Tuple(t) => t.elements,
                _ => Vec::new(), // the canonical empty tuple
            };
            flattened.extend(parameters);
            return Ok(Type::Callable(CallableType {
                base: Box::new(base_type),
                parameters: flattened,
            }));
        }
        if parameters.is_empty() {
            return Err(ParseError::new("missing type parameters"));
        }
        if self.is_callable_base(&base_type) && !Self::is_any(&parameters[0]) {
            return Err(ParseError::new(
                "first argument to Callable must be a list of argument types",
            ));
        }
        Ok(Type::Generic(GenericType {
            base: Box::new(base_type),
            parameters,
        }))
    }

    /// Union of the given types, flattened and de-duplicated.
    pub fn new_union_type(&self, types: Vec<Type>) -> Type {
        join_types(types)
    }

    // ---- functions ----------------------------------------------------

    /// Build one function signature from its syntactic parts.
    pub fn new_function(
        &self,
        decorators: Vec<String>,
        name: &str,
        param_list: Vec<ParamDecl>,
        return_type: Type,
        body: Vec<BodyStmt>,
    ) -> Result<NameAndSig, ParseError> {
        let return_type = if name == "__init__" && return_type.is_anything() {
            Type::named("NoneType")
        } else {
            return_type
        };
        let params = validate_params(param_list)?;

        let mut exceptions = Vec::new();
        let mut mutators = Vec::new();
        for stmt in body {
            match stmt {
                BodyStmt::Raise(ty) => exceptions.push(ty),
                BodyStmt::Mutate(name, ty) => mutators.push(MutateParameter::new(name, ty)),
            }
        }

        let mut signature = Signature {
            params: params.required,
            starargs: params.starargs,
            starstarargs: params.starstarargs,
            return_type,
            exceptions,
            template: Vec::new(),
        };
        for mutator in mutators {
            signature = mutator.apply(&signature)?;
        }

        let mut kept = Vec::new();
        for d in decorators {
            if keep_decorator(&d)? {
                kept.push(d);
            }
        }
        if kept.len() > 1 {
            return Err(ParseError::new(format!("too many decorators for {name}")));
        }

        Ok(NameAndSig {
            name: name.to_string(),
            signature,
            decorator: kept.into_iter().next(),
            external: false,
        })
    }

    /// A function whose body lives outside the IR; the signature is a
    /// placeholder and is ignored.
    pub fn new_external_function(&self, name: &str) -> NameAndSig {
        NameAndSig {
            name: name.to_string(),
            signature: Signature {
                params: Vec::new(),
                starargs: None,
                starstarargs: None,
                return_type: Type::Nothing,
                exceptions: Vec::new(),
                template: Vec::new(),
            },
            decorator: None,
            external: true,
        }
    }

    // ---- named tuples -------------------------------------------------

    fn namedtuple_new(
        &mut self,
        class_name: &str,
        fields: &[(String, Type)],
    ) -> Result<NameAndSig, ParseError> {
        let type_param = TypeParameter {
            name: format!("_T{class_name}"),
            scope: None,
            bound: Some(Box::new(Type::named(class_name))),
            constraints: Vec::new(),
        };
        self.type_params.push(type_param.clone());
        let mut params = vec![ParamDecl::Param {
            name: "cls".to_string(),
            ty: Some(Type::generic(
                Type::named("type"),
                vec![Type::TypeParam(type_param.clone())],
            )),
            default: None,
        }];
        for (name, ty) in fields {
            params.push(ParamDecl::Param {
                name: name.clone(),
                ty: Some(ty.clone()),
                default: None,
            });
        }
        self.new_function(
            Vec::new(),
            "__new__",
            params,
            Type::TypeParam(type_param),
            Vec::new(),
        )
    }

    fn namedtuple_init(&self) -> Result<NameAndSig, ParseError> {
        let params = ["self", "*args", "**kwargs"]
            .into_iter()
            .map(|name| ParamDecl::Param {
                name: name.to_string(),
                ty: Some(Type::Anything),
                default: None,
            })
            .collect();
        self.new_function(
            Vec::new(),
            "__init__",
            params,
            Type::named("NoneType"),
            Vec::new(),
        )
    }

    /// Synthesize the class behind a `NamedTuple(name, [(field, type)...])`
    /// call and return a reference to it. Repeated calls with the same base
    /// name get distinct occurrence-numbered classes.
    pub fn new_named_tuple(
        &mut self,
        base_name: &str,
        fields: Vec<(String, Type)>,
    ) -> Result<Type, ParseError> {
        let count = self.generated_counts.entry(base_name.to_string()).or_insert(0);
        let class_name = format!("~{base_name}_{count}");
        *count += 1;

        let class_parent =
            Self::heterogeneous_tuple(Type::named("tuple"), fields.iter().map(|(_, t)| t.clone()).collect());
        let mut class_constants: Vec<Constant> = fields
            .iter()
            .map(|(name, ty)| Constant {
                name: name.clone(),
                ty: ty.clone(),
            })
            .collect();
        // Only the declared fields are commonly used; everything else a
        // tuple carries is typed as anything.
        class_constants.extend(NAMEDTUPLE_MEMBERS.iter().map(|name| Constant {
            name: name.to_string(),
            ty: Type::Anything,
        }));

        let new_sig = self.namedtuple_new(&class_name, &fields)?;
        let init_sig = self.namedtuple_init()?;
        let (methods, _) = merge_signatures(vec![new_sig, init_sig])?;

        let nt_class = Class {
            name: class_name.clone(),
            metaclass: None,
            parents: vec![class_parent],
            methods,
            constants: class_constants,
            template: Vec::new(),
        };
        self.generated_classes.push(nt_class);
        Ok(Type::named(class_name))
    }

    // ---- classes ------------------------------------------------------

    /// Register a class name as soon as its header is parsed, so the body
    /// and later statements can reference it (shadowing imported aliases).
    pub fn register_class_name(&mut self, class_name: &str) {
        if !self.active() {
            return;
        }
        self.type_map
            .insert(class_name.to_string(), Type::named(class_name));
    }

    /// Add a class definition. Duplicate-name validation runs even inside
    /// inactive conditional scopes, so invalid code is never silently
    /// hidden.
    pub fn add_class(
        &mut self,
        class_name: &str,
        parent_args: Vec<ParentArg>,
        defs: Vec<Def>,
    ) -> Result<(), ParseError> {
        let mut parents = Vec::new();
        let mut metaclass = None;
        let count = parent_args.len();
        for (i, arg) in parent_args.into_iter().enumerate() {
            match arg {
                ParentArg::Type(t) => parents.push(t),
                ParentArg::Keyword(keyword, value) => {
                    if i + 1 != count {
                        return Err(ParseError::new("metaclass must be last argument"));
                    }
                    if keyword != "metaclass" {
                        return Err(ParseError::new(
                            "only 'metaclass' allowed as classdef kwarg",
                        ));
                    }
                    metaclass = Some(value);
                }
            }
        }

        let (mut constants, methods, aliases) = split_definitions(defs);

        let mut all_names: Vec<String> = Vec::new();
        let mut seen_methods = HashSet::new();
        for m in &methods {
            if seen_methods.insert(m.name.clone()) {
                all_names.push(m.name.clone());
            }
        }
        all_names.extend(constants.iter().map(|c| c.name.clone()));
        all_names.extend(aliases.iter().map(|a| a.name.clone()));
        let duplicates = duplicate_names(&all_names);
        if !duplicates.is_empty() {
            return Err(ParseError::new(format!(
                "duplicate identifier(s): {}",
                duplicates.join(", ")
            )));
        }

        // Validation above runs regardless; emission only when active.
        if !self.active() {
            return Ok(());
        }

        // Class-body aliases chain through same-class members and resolve
        // to a member constant's type.
        for alias in &aliases {
            let mut target = alias.ty.clone();
            let mut visited: HashSet<String> = HashSet::new();
            let ty = loop {
                let Type::Named(named) = &target else {
                    return Err(illegal_alias(&alias.name));
                };
                if let Some(c) = constants.iter().find(|c| c.name == named.name) {
                    break c.ty.clone();
                }
                if !visited.insert(named.name.clone()) {
                    return Err(illegal_alias(&alias.name));
                }
                match aliases.iter().find(|a| a.name == named.name) {
                    Some(next) => target = next.ty.clone(),
                    None => return Err(illegal_alias(&alias.name)),
                }
            };
            constants.push(Constant {
                name: alias.name.clone(),
                ty,
            });
        }

        let parents: Vec<Type> = parents.into_iter().filter(|p| !p.is_nothing()).collect();
        let (methods, properties) = merge_signatures(methods)?;
        let mut constants = constants;
        constants.extend(properties);

        // Classes with no declared parents inherit the legacy root.
        let parents = if parents.is_empty() && class_name != "classobj" && class_name != "object" {
            vec![Type::named("classobj")]
        } else {
            parents
        };

        self.classes.push(Class {
            name: class_name.to_string(),
            metaclass,
            parents,
            methods,
            constants,
            template: Vec::new(),
        });
        Ok(())
    }

    // ---- type variables -----------------------------------------------

    /// Add `name = TypeVar(name_arg, *constraints, **kwargs)`.
    pub fn add_type_var(
        &mut self,
        name: &str,
        name_arg: &str,
        constraints: Vec<Type>,
        kwargs: Vec<(String, KwargValue)>,
    ) -> Result<(), ParseError> {
        if name != name_arg {
            return Err(ParseError::new(format!(
                "TypeVar name needs to be '{name_arg}' (not '{name}')"
            )));
        }
        let mut bound = None;
        let mut unknown = Vec::new();
        for (key, value) in kwargs {
            match key.as_str() {
                "bound" => match value {
                    KwargValue::Type(t) => bound = Some(Box::new(t)),
                    KwargValue::Bool(_) => {
                        return Err(ParseError::new("bound must be a type"));
                    }
                },
                "covariant" | "contravariant" => {}
                other => unknown.push(other.to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(ParseError::new(format!(
                "unrecognized keyword(s): {}",
                unknown.join(", ")
            )));
        }
        if !self.active() {
            return Ok(());
        }
        self.type_params.push(TypeParameter {
            name: name.to_string(),
            scope: None,
            bound,
            constraints,
        });
        Ok(())
    }

    // ---- assembly -----------------------------------------------------

    /// Assemble the unit from the module-level definitions plus the
    /// builder's accumulated state, then run the post-parse pipeline.
    pub fn finish(self, defs: Vec<Def>, src: &str) -> Result<Unit, ParseError> {
        let (constants, functions, aliases) = split_definitions(defs);
        debug_assert!(
            aliases.is_empty(),
            "top-level aliases go through add_alias_or_constant"
        );

        let mut constants = constants;
        constants.extend(self.constants);

        let mut classes = self.generated_classes;
        classes.extend(self.classes);

        let mut all_names: Vec<String> = Vec::new();
        let mut seen_functions = HashSet::new();
        for f in &functions {
            if seen_functions.insert(f.name.clone()) {
                all_names.push(f.name.clone());
            }
        }
        all_names.extend(constants.iter().map(|c| c.name.clone()));
        all_names.extend(self.type_params.iter().map(|t| t.name.clone()));
        all_names.extend(classes.iter().map(|c| c.name.clone()));
        all_names.extend(self.aliases.iter().map(|a| a.name.clone()));
        let duplicates = duplicate_names(&all_names);
        if !duplicates.is_empty() {
            return Err(ParseError::new(format!(
                "duplicate top-level identifier(s): {}",
                duplicates.join(", ")
            )));
        }

        let (functions, properties) = merge_signatures(functions)?;
        if !properties.is_empty() {
            let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
            return Err(ParseError::new(format!(
                "module-level functions with property decorators: {}",
                names.join(", ")
            )));
        }

        let mut unit = Unit {
            name: String::new(),
            constants,
            type_params: self.type_params,
            classes,
            functions,
            aliases: self.aliases,
        };

        unit = visit::run(&mut InsertTypeParameters::new(), &unit)?;
        if let Some(compat) = self.compat {
            unit = compat.rewrite(unit)?;
        }

        match &self.unit_name {
            Some(name) => {
                unit.name = name.clone();
                unit = visit::run(&mut AddNamePrefix::new(), &unit)?;
            }
            None => {
                // No unique name; use the source digest.
                let digest = Sha256::digest(src.as_bytes());
                unit.name = format!("{digest:x}");
            }
        }
        Ok(unit)
    }
}

fn illegal_alias(name: &str) -> ParseError {
    ParseError::new(format!(
        "illegal value for alias '{name}': value must be an attribute on the same class"
    ))
}

fn split_definitions(defs: Vec<Def>) -> (Vec<Constant>, Vec<NameAndSig>, Vec<Alias>) {
    let mut constants = Vec::new();
    let mut functions = Vec::new();
    let mut aliases = Vec::new();
    for def in defs {
        match def {
            Def::Constant(c) => constants.push(c),
            Def::Function(f) => functions.push(f),
            Def::Alias(a) => aliases.push(a),
        }
    }
    (constants, functions, aliases)
}

/// Every name occurring at least twice, in first-occurrence order.
fn duplicate_names(names: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name).or_insert(0) += 1;
    }
    let mut out = Vec::new();
    for name in names {
        if counts.get(name.as_str()).copied().unwrap_or(0) >= 2 && !out.contains(name) {
            out.push(name.clone());
        }
    }
    out
}
