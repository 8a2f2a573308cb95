//! The IR node model for one stub module.
//!
//! Every node is an immutable value type; passes produce new nodes by
//! structural copy. The set of kinds is closed (see [`crate::kinds`]) so the
//! visitor engine can prune traversals from static nesting data alone.

use serde::{Deserialize, Serialize};

/// Top-level container for one parsed stub module.
///
/// The five definition name-spaces (constants, type parameters, functions,
/// classes, aliases) are jointly unique: the builder rejects a module in
/// which the same name appears in more than one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub constants: Vec<Constant>,
    pub type_params: Vec<TypeParameter>,
    pub classes: Vec<Class>,
    pub functions: Vec<AnyFunction>,
    pub aliases: Vec<Alias>,
}

/// A definition found by [`Unit::lookup`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Definition<'a> {
    Constant(&'a Constant),
    TypeParameter(&'a TypeParameter),
    Class(&'a Class),
    Function(&'a AnyFunction),
    Alias(&'a Alias),
}

impl Unit {
    /// Look up a definition by the exact name it carries (fully qualified
    /// once the name-prefix pass has run).
    pub fn lookup(&self, name: &str) -> Option<Definition<'_>> {
        if let Some(c) = self.classes.iter().find(|c| c.name == name) {
            return Some(Definition::Class(c));
        }
        if let Some(c) = self.constants.iter().find(|c| c.name == name) {
            return Some(Definition::Constant(c));
        }
        if let Some(f) = self.functions.iter().find(|f| f.name() == name) {
            return Some(Definition::Function(f));
        }
        if let Some(a) = self.aliases.iter().find(|a| a.name == name) {
            return Some(Definition::Alias(a));
        }
        if let Some(t) = self.type_params.iter().find(|t| t.name == name) {
            return Some(Definition::TypeParameter(t));
        }
        None
    }

    /// A unit with no definitions at all.
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
            && self.type_params.is_empty()
            && self.classes.is_empty()
            && self.functions.is_empty()
            && self.aliases.is_empty()
    }
}

/// A typed module- or class-level constant (`x = ...  # type: int`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub ty: Type,
}

/// A name bound to a type expression (`x = other.Thing`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub metaclass: Option<Type>,
    /// Parent types in declaration order.
    pub parents: Vec<Type>,
    pub methods: Vec<AnyFunction>,
    pub constants: Vec<Constant>,
    /// The ordered type parameters this class introduces. Derived from the
    /// generic parents by the template-adjustment pass; every item's scope
    /// equals the class name.
    pub template: Vec<TemplateItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    Method,
    StaticMethod,
    ClassMethod,
}

/// A function with one or more signatures. Signature order is declaration
/// order and is semantically meaningful for overload resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub signatures: Vec<Signature>,
    pub kind: MethodKind,
}

/// A function whose body is implemented outside this IR. Its signature is
/// ignored entirely.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExternalFunction {
    pub name: String,
    pub kind: MethodKind,
}

/// Either kind of function, wherever functions can appear.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnyFunction {
    Function(Function),
    External(ExternalFunction),
}

impl AnyFunction {
    pub fn name(&self) -> &str {
        match self {
            AnyFunction::Function(f) => &f.name,
            AnyFunction::External(f) => &f.name,
        }
    }

    pub fn kind(&self) -> MethodKind {
        match self {
            AnyFunction::Function(f) => f.kind,
            AnyFunction::External(f) => f.kind,
        }
    }
}

/// One call shape of a function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Parameter>,
    /// The `*args` parameter, if present.
    pub starargs: Option<Parameter>,
    /// The `**kwargs` parameter, if present. Always last.
    pub starstarargs: Option<Parameter>,
    pub return_type: Type,
    /// Declared raised exception types. Set semantics; stored in canonical
    /// order after the canonical-ordering pass.
    pub exceptions: Vec<Type>,
    /// Type parameters bound only within this signature.
    pub template: Vec<TemplateItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub kwonly: bool,
    pub optional: bool,
    /// An in-body rebinding (`x := NewType`), modelling reference-parameter
    /// narrowing.
    pub mutated_type: Option<Type>,
}

/// One entry of a class or signature template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateItem {
    pub type_param: TypeParameter,
}

impl TemplateItem {
    pub fn name(&self) -> &str {
        &self.type_param.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    /// The lexical scope binding this parameter: the enclosing class if
    /// bound by that class's template, else the enclosing function path,
    /// else the module name.
    pub scope: Option<String>,
    pub bound: Option<Box<Type>>,
    pub constraints: Vec<Type>,
}

impl TypeParameter {
    pub fn named(name: impl Into<String>) -> Self {
        TypeParameter {
            name: name.into(),
            scope: None,
            bound: None,
            constraints: Vec::new(),
        }
    }

    pub fn with_scope(&self, scope: impl Into<String>) -> Self {
        TypeParameter {
            scope: Some(scope.into()),
            ..self.clone()
        }
    }
}

/// An unresolved textual type reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamedType {
    pub name: String,
}

/// Index of a class in the per-batch [`crate::arena::ClassArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassIx(pub u32);

/// Resolution state of a [`ClassType`]. Resolution replaces the tag; it
/// never mutates through shared pointer identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassLink {
    #[default]
    Unresolved,
    Resolved(ClassIx),
}

impl ClassLink {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ClassLink::Resolved(_))
    }
}

/// A class reference carrying a resolved-or-empty link into the class arena.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassType {
    pub name: String,
    pub link: ClassLink,
}

impl ClassType {
    pub fn unresolved(name: impl Into<String>) -> Self {
        ClassType {
            name: name.into(),
            link: ClassLink::Unresolved,
        }
    }
}

/// A parameterized type (`base[p1, p2]`). A single-parameter generic over a
/// tuple-like base is the homogeneous-container encoding of `Tuple[X, ...]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenericType {
    pub base: Box<Type>,
    pub parameters: Vec<Type>,
}

/// A heterogeneous fixed-arity tuple (`Tuple[int, str]`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TupleType {
    pub base: Box<Type>,
    pub elements: Vec<Type>,
}

/// A callable. `parameters` holds the argument types followed by the return
/// type as the final element.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallableType {
    pub base: Box<Type>,
    pub parameters: Vec<Type>,
}

impl CallableType {
    pub fn args(&self) -> &[Type] {
        &self.parameters[..self.parameters.len().saturating_sub(1)]
    }

    pub fn return_type(&self) -> Option<&Type> {
        self.parameters.last()
    }
}

/// An ordered, duplicate-free union.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnionType {
    pub options: Vec<Type>,
}

/// The closed set of type nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    Named(NamedType),
    Class(ClassType),
    Generic(GenericType),
    Tuple(TupleType),
    Callable(CallableType),
    Union(UnionType),
    TypeParam(TypeParameter),
    Anything,
    Nothing,
}

impl Type {
    pub fn named(name: impl Into<String>) -> Type {
        Type::Named(NamedType { name: name.into() })
    }

    pub fn generic(base: Type, parameters: Vec<Type>) -> Type {
        Type::Generic(GenericType {
            base: Box::new(base),
            parameters,
        })
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Type::Nothing)
    }

    pub fn is_anything(&self) -> bool {
        matches!(self, Type::Anything)
    }

    /// The textual name of a reference type, if this is one.
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            Type::Named(n) => Some(&n.name),
            Type::Class(c) => Some(&c.name),
            _ => None,
        }
    }
}

/// Combine a list of types into a union, flattening nested unions, dropping
/// `Nothing`, and de-duplicating while preserving first-seen order. A list
/// containing `Anything` collapses to `Anything`; an empty list yields
/// `Nothing`; a singleton yields its only member.
pub fn join_types(types: impl IntoIterator<Item = Type>) -> Type {
    let mut queue: std::collections::VecDeque<Type> = types.into_iter().collect();
    let mut seen: Vec<Type> = Vec::new();
    while let Some(t) = queue.pop_front() {
        match t {
            Type::Union(u) => {
                for (i, opt) in u.options.into_iter().enumerate() {
                    queue.insert(i, opt);
                }
            }
            Type::Nothing => {}
            other => {
                if !seen.contains(&other) {
                    seen.push(other);
                }
            }
        }
    }
    if seen.len() == 1 {
        seen.pop().unwrap()
    } else if seen.iter().any(Type::is_anything) {
        Type::Anything
    } else if seen.is_empty() {
        Type::Nothing
    } else {
        Type::Union(UnionType { options: seen })
    }
}

/// Convert a class to the type its instances have: the bare class name, or a
/// generic over its own template for parameterized classes.
pub fn class_as_type(class: &Class) -> Type {
    if class.template.is_empty() {
        Type::named(class.name.clone())
    } else {
        Type::generic(
            Type::named(class.name.clone()),
            class
                .template
                .iter()
                .map(|item| Type::TypeParam(item.type_param.clone()))
                .collect(),
        )
    }
}
