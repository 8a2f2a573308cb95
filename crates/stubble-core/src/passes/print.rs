//! Printing IR back to stub source.
//!
//! The printer is a visit-all pass: every node pushes its rendering onto a
//! result stack as the post-order walk unwinds, so a parent's rebuild hook
//! finds its children's strings on top of the stack in traversal order.
//! Abbreviated forms are reconstructed on the way: `object`-typed
//! parameters lose their annotation, `self`/`cls` print bare, unions with
//! `None` become `Optional[...]`, and the unit's own name prefix is
//! stripped from local names so that the output re-parses.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::arena::rpartition;
use crate::error::CoreError;
use crate::ir::*;
use crate::kinds::PassSpec;
use crate::visit::{self, Pass};

const INDENT: &str = "    ";

const RESERVED: &[&str] = &[
    "class", "def", "if", "elif", "else", "import", "from", "as", "raise", "pass", "and", "or",
    "nothing", "NamedTuple", "TypeVar",
];

/// Generic bases that print under their capitalized typing-module name.
fn maybe_capitalized(name: &str) -> Option<&'static str> {
    match name {
        "tuple" => Some("Tuple"),
        "list" => Some("List"),
        "dict" => Some("Dict"),
        "set" => Some("Set"),
        "frozenset" => Some("FrozenSet"),
        "type" => Some("Type"),
        _ => None,
    }
}

pub struct Printer {
    stack: Vec<String>,
    local_prefix: String,
    local_names: HashSet<String>,
    class_members: HashSet<String>,
    class_names: Vec<String>,
    imports: BTreeMap<String, BTreeSet<Option<String>>>,
    typing_counts: BTreeMap<String, i64>,
    mutators: Vec<(String, String)>,
    alias_snapshot: Option<(
        BTreeMap<String, BTreeSet<Option<String>>>,
        BTreeMap<String, i64>,
    )>,
}

impl Printer {
    pub fn new() -> Self {
        Printer {
            stack: Vec::new(),
            local_prefix: String::new(),
            local_names: HashSet::new(),
            class_members: HashSet::new(),
            class_names: Vec::new(),
            imports: BTreeMap::new(),
            typing_counts: BTreeMap::new(),
            mutators: Vec::new(),
            alias_snapshot: None,
        }
    }

    /// Render a whole unit as stub source.
    pub fn print_unit(unit: &Unit) -> Result<String, CoreError> {
        let mut printer = Printer::new();
        visit::run(&mut printer, unit)?;
        Ok(printer.pop())
    }

    /// Render a bare type with a fresh printer. Import registrations made
    /// by the fresh printer are discarded.
    pub fn print_type(ty: &Type) -> String {
        let mut printer = Printer::new();
        // Type rendering is infallible; the error type is shared with
        // rebuilding passes.
        visit::run_type(&mut printer, ty).expect("type printing cannot fail");
        printer.pop()
    }

    fn push(&mut self, s: String) {
        self.stack.push(s);
    }

    fn pop(&mut self) -> String {
        self.stack.pop().expect("printer result stack underflow")
    }

    fn pop_n(&mut self, n: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.pop());
        }
        out.reverse();
        out
    }

    fn pop_if(&mut self, present: bool) -> Option<String> {
        present.then(|| self.pop())
    }

    fn strip_local<'n>(&self, name: &'n str) -> &'n str {
        if self.local_prefix.is_empty() {
            return name;
        }
        name.strip_prefix(&self.local_prefix).unwrap_or(name)
    }

    fn escaped_name(name: &str) -> String {
        let plain = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !name.chars().next().unwrap().is_ascii_digit()
            && !RESERVED.contains(&name);
        if plain {
            name.to_string()
        } else {
            format!("`{name}`")
        }
    }

    fn safe_name(name: &str) -> String {
        name.split('.')
            .map(Self::escaped_name)
            .collect::<Vec<_>>()
            .join(".")
    }

    fn name_collision(&self, name: &str) -> bool {
        self.local_names.contains(name) || self.class_members.contains(name)
    }

    fn require_import(&mut self, module: &str, name: Option<&str>) {
        self.imports
            .entry(module.to_string())
            .or_default()
            .insert(name.map(str::to_string));
    }

    fn from_typing(&mut self, name: &str) -> String {
        *self.typing_counts.entry(name.to_string()).or_insert(0) += 1;
        self.require_import("typing", Some(name));
        name.to_string()
    }

    fn discount_typing(&mut self, name: &str) {
        *self.typing_counts.entry(name.to_string()).or_insert(0) -= 1;
    }

    /// Render a textual type reference, reconstructing abbreviations.
    fn format_ref(&mut self, name: &str) -> String {
        let name = self.strip_local(name).to_string();
        let (module, _, suffix) = rpartition(&name);
        let rendered = if module == "builtins" && !self.name_collision(suffix) {
            suffix.to_string()
        } else if module == "typing" {
            self.from_typing(suffix)
        } else if !module.is_empty() {
            self.require_import(module, None);
            name.clone()
        } else {
            name.clone()
        };
        if rendered == "NoneType" {
            "None".to_string()
        } else {
            Self::safe_name(&rendered)
        }
    }

    fn maybe_capitalize(&mut self, base: &str) -> String {
        match maybe_capitalized(base) {
            Some(cap) => self.from_typing(cap),
            None => base.to_string(),
        }
    }

    fn build_union(&mut self, options: &[String]) -> String {
        let mut unique: Vec<&String> = Vec::new();
        for o in options {
            if !unique.contains(&o) {
                unique.push(o);
            }
        }
        if unique.len() == 1 {
            return unique[0].clone();
        }
        if unique.iter().any(|o| o.as_str() == "None") {
            let rest: Vec<String> = unique
                .iter()
                .filter(|o| o.as_str() != "None")
                .map(|o| (*o).clone())
                .collect();
            let optional = self.from_typing("Optional");
            return format!("{}[{}]", optional, self.build_union(&rest));
        }
        let union = self.from_typing("Union");
        format!(
            "{}[{}]",
            union,
            unique.iter().map(|o| o.as_str()).collect::<Vec<_>>().join(", ")
        )
    }

    /// Render the element binding of a `*args`/`**kwargs` parameter: the
    /// last type parameter of its container type, or nothing when the
    /// container is bare.
    fn container_contents(&mut self, param: &Parameter) -> String {
        let name = Self::escaped_name(&param.name);
        match &param.ty {
            Type::Generic(g) => {
                let base = g
                    .base
                    .reference_name()
                    .map(|n| rpartition(n).2.to_string())
                    .unwrap_or_default();
                if let Some(cap) = maybe_capitalized(&base) {
                    self.discount_typing(cap);
                }
                match g.parameters.last() {
                    Some(element) => format!("{}: {}", name, Self::print_type(element)),
                    None => name,
                }
            }
            _ => name,
        }
    }

    fn import_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (module, names) in &self.imports {
            let mut names: BTreeSet<Option<String>> = names.clone();
            if module == "typing" {
                names.retain(|n| match n {
                    Some(n) => self.typing_counts.get(n).copied().unwrap_or(0) > 0,
                    None => true,
                });
            }
            if names.remove(&None) {
                lines.push(format!("import {module}"));
            }
            let named: Vec<String> = names.into_iter().flatten().collect();
            if !named.is_empty() {
                lines.push(format!("from {} import {}", module, named.join(", ")));
            }
        }
        lines
    }

    fn format_type_param_decl(tp: &TypeParameter) -> String {
        let name = Self::escaped_name(&tp.name);
        let mut args = vec![format!("'{}'", tp.name)];
        for c in &tp.constraints {
            args.push(Self::print_type(c));
        }
        if let Some(bound) = &tp.bound {
            args.push(format!("bound={}", Self::print_type(bound)));
        }
        format!("{} = TypeVar({})", name, args.join(", "))
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for Printer {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::visit_all("print");
        &SPEC
    }

    fn enter_unit(&mut self, node: &Unit) -> Result<(), CoreError> {
        if !node.name.is_empty() {
            self.local_prefix = format!("{}.", node.name);
        }
        let prefix = self.local_prefix.clone();
        let strip = |n: &str| {
            n.strip_prefix(prefix.as_str())
                .unwrap_or(n)
                .to_string()
        };
        self.local_names = node
            .classes
            .iter()
            .map(|c| strip(&c.name))
            .chain(node.functions.iter().map(|f| strip(f.name())))
            .chain(node.constants.iter().map(|c| strip(&c.name)))
            .chain(node.type_params.iter().map(|t| t.name.clone()))
            .chain(node.aliases.iter().map(|a| strip(&a.name)))
            .collect();
        Ok(())
    }

    fn rebuild_unit(&mut self, node: Unit) -> Result<Unit, CoreError> {
        let aliases = self.pop_n(node.aliases.len());
        let functions = self.pop_n(node.functions.len());
        let classes = self.pop_n(node.classes.len());
        let _ = self.pop_n(node.type_params.len());
        let constants = self.pop_n(node.constants.len());

        let mut type_param_lines = Vec::new();
        if !node.type_params.is_empty() {
            self.from_typing("TypeVar");
            for tp in &node.type_params {
                type_param_lines.push(Self::format_type_param_decl(tp));
            }
        }

        let sections: Vec<String> = [
            self.import_lines(),
            aliases,
            constants,
            type_param_lines,
            classes,
            functions,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.join("\n"))
        .collect();
        self.push(sections.join("\n\n"));
        Ok(node)
    }

    fn rebuild_constant(&mut self, node: Constant) -> Result<Constant, CoreError> {
        let ty = self.pop();
        let name = Self::safe_name(self.strip_local(&node.name));
        self.push(format!("{name} = ...  # type: {ty}"));
        Ok(node)
    }

    fn enter_alias(&mut self, _: &Alias) -> Result<(), CoreError> {
        self.alias_snapshot = Some((self.imports.clone(), self.typing_counts.clone()));
        Ok(())
    }

    fn rebuild_alias(&mut self, node: Alias) -> Result<Alias, CoreError> {
        let ty = self.pop();
        let snapshot = self.alias_snapshot.take();
        let alias_name = self.strip_local(&node.name).to_string();
        if let Type::Named(n) = &node.ty {
            let target = self.strip_local(&n.name).to_string();
            let (module, _, name) = rpartition(&target);
            if !module.is_empty() {
                // The alias prints as an import line; undo any import
                // registrations its type produced.
                if let Some((imports, counts)) = snapshot {
                    self.imports = imports;
                    self.typing_counts = counts;
                }
                let suffix = if name != alias_name {
                    format!(" as {}", Self::safe_name(&alias_name))
                } else {
                    String::new()
                };
                self.push(format!("from {module} import {name}{suffix}"));
                return Ok(node);
            }
        }
        self.push(format!("{} = {}", Self::safe_name(&alias_name), ty));
        Ok(node)
    }

    fn enter_class(&mut self, node: &Class) -> Result<(), CoreError> {
        let mut header = Self::safe_name(self.strip_local(&node.name));
        if !node.template.is_empty() {
            let params: Vec<String> = node
                .template
                .iter()
                .map(|t| Self::escaped_name(t.name()))
                .collect();
            header = format!("{}[{}]", header, params.join(", "));
        }
        for member in &node.methods {
            self.class_members.insert(member.name().to_string());
        }
        for member in &node.constants {
            self.class_members.insert(member.name.clone());
        }
        self.class_names.push(header);
        Ok(())
    }

    fn leave_class(&mut self, _: &Class) {
        self.class_members.clear();
        self.class_names.pop();
    }

    fn rebuild_class(&mut self, node: Class) -> Result<Class, CoreError> {
        let methods = self.pop_n(node.methods.len());
        let constants = self.pop_n(node.constants.len());
        let _ = self.pop_n(node.template.len());
        let metaclass = self.pop_if(node.metaclass.is_some());
        let mut parents = self.pop_n(node.parents.len());
        if parents == ["classobj"] {
            // Old-style class; the legacy root is implied.
            parents.clear();
        }
        if let Some(metaclass) = metaclass {
            parents.push(format!("metaclass={metaclass}"));
        }
        let parents_str = if parents.is_empty() {
            String::new()
        } else {
            format!("({})", parents.join(", "))
        };
        let header = format!(
            "class {}{}:",
            Self::safe_name(self.strip_local(&node.name)),
            parents_str
        );
        let mut lines = vec![header];
        if constants.is_empty() && methods.is_empty() {
            lines.push(format!("{INDENT}pass"));
        } else {
            for c in &constants {
                lines.push(format!("{INDENT}{c}"));
            }
            for m in &methods {
                for line in m.lines() {
                    lines.push(format!("{INDENT}{line}"));
                }
            }
        }
        self.push(format!("{}\n", lines.join("\n")));
        Ok(node)
    }

    fn rebuild_function(&mut self, node: Function) -> Result<Function, CoreError> {
        let sigs = self.pop_n(node.signatures.len());
        let name = Self::escaped_name(self.strip_local(&node.name));
        let decorator = match node.kind {
            MethodKind::StaticMethod if node.name != "__new__" => "@staticmethod\n",
            MethodKind::ClassMethod => "@classmethod\n",
            _ => "",
        };
        let rendered: Vec<String> = sigs
            .into_iter()
            .map(|sig| format!("{decorator}def {name}{sig}"))
            .collect();
        self.push(rendered.join("\n"));
        Ok(node)
    }

    fn rebuild_external_function(
        &mut self,
        node: ExternalFunction,
    ) -> Result<ExternalFunction, CoreError> {
        let name = Self::safe_name(self.strip_local(&node.name));
        self.push(format!("def {name} PYTHONCODE"));
        Ok(node)
    }

    fn enter_signature(&mut self, _: &Signature) -> Result<(), CoreError> {
        self.mutators.clear();
        Ok(())
    }

    fn rebuild_signature(&mut self, node: Signature) -> Result<Signature, CoreError> {
        let _ = self.pop_n(node.template.len());
        let exceptions = self.pop_n(node.exceptions.len());
        let ret = self.pop();
        let _ = self.pop_if(node.starstarargs.is_some());
        let _ = self.pop_if(node.starargs.is_some());
        let mut params = self.pop_n(node.params.len());

        let star = node
            .starargs
            .as_ref()
            .map(|p| self.container_contents(p))
            .unwrap_or_default();
        match node.params.iter().position(|p| p.kwonly) {
            Some(i) => params.insert(i, format!("*{star}")),
            None => {
                if node.starargs.is_some() {
                    params.push(format!("*{star}"));
                }
            }
        }
        if let Some(p) = &node.starstarargs {
            let contents = self.container_contents(p);
            params.push(format!("**{contents}"));
        }

        let mut body = String::new();
        for (name, new_type) in self.mutators.drain(..) {
            body.push_str(&format!("\n{INDENT}{name} := {new_type}"));
        }
        for exc in &exceptions {
            body.push_str(&format!("\n{INDENT}raise {exc}()"));
        }
        if body.is_empty() {
            body.push_str(" ...");
        }
        self.push(format!("({}) -> {}:{}", params.join(", "), ret, body));
        Ok(node)
    }

    fn rebuild_parameter(&mut self, node: Parameter) -> Result<Parameter, CoreError> {
        let mutated = self.pop_if(node.mutated_type.is_some());
        let ty = self.pop();
        if let Some(mutated) = mutated {
            self.mutators.push((node.name.clone(), mutated));
        }
        let suffix = if node.optional { " = ..." } else { "" };
        let name = Self::escaped_name(&node.name);
        let current_class: Option<String> = self.class_names.last().cloned();
        let rendered = if ty == "object" {
            format!("{name}{suffix}")
        } else if ty == "Any" {
            self.discount_typing("Any");
            format!("{name}{suffix}")
        } else if node.name == "self" && current_class.as_deref() == Some(ty.as_str()) {
            format!("{name}{suffix}")
        } else if node.name == "cls"
            && current_class
                .as_deref()
                .is_some_and(|c| ty == format!("Type[{c}]"))
        {
            self.discount_typing("Type");
            format!("{name}{suffix}")
        } else {
            format!("{name}: {ty}{suffix}")
        };
        self.push(rendered);
        Ok(node)
    }

    fn rebuild_template_item(&mut self, node: TemplateItem) -> Result<TemplateItem, CoreError> {
        // The child type parameter's rendering stands for the whole item.
        Ok(node)
    }

    fn rebuild_named_type(&mut self, node: NamedType) -> Result<Type, CoreError> {
        let rendered = self.format_ref(&node.name);
        self.push(rendered);
        Ok(Type::Named(node))
    }

    fn rebuild_class_type(&mut self, node: ClassType) -> Result<Type, CoreError> {
        let rendered = self.format_ref(&node.name);
        self.push(rendered);
        Ok(Type::Class(node))
    }

    fn rebuild_generic_type(&mut self, node: GenericType) -> Result<Type, CoreError> {
        let params = self.pop_n(node.parameters.len());
        let base = self.pop();
        // A generic over a tuple base is the homogeneous container
        // encoding, printed with a trailing ellipsis.
        let ellipsis = if base == "tuple" || base == "Tuple" {
            ", ..."
        } else {
            ""
        };
        let base = self.maybe_capitalize(&base);
        self.push(format!("{}[{}{}]", base, params.join(", "), ellipsis));
        Ok(Type::Generic(node))
    }

    fn rebuild_tuple_type(&mut self, node: TupleType) -> Result<Type, CoreError> {
        let elements = self.pop_n(node.elements.len());
        let base = self.pop();
        let base = self.maybe_capitalize(&base);
        self.push(format!("{}[{}]", base, elements.join(", ")));
        Ok(Type::Tuple(node))
    }

    fn rebuild_callable_type(&mut self, node: CallableType) -> Result<Type, CoreError> {
        let mut params = self.pop_n(node.parameters.len());
        let base = self.pop();
        let base = self.maybe_capitalize(&base);
        let ret = params.pop().unwrap_or_else(|| "Any".to_string());
        self.push(format!("{}[[{}], {}]", base, params.join(", "), ret));
        Ok(Type::Callable(node))
    }

    fn rebuild_union_type(&mut self, node: UnionType) -> Result<Type, CoreError> {
        let options = self.pop_n(node.options.len());
        let rendered = self.build_union(&options);
        self.push(rendered);
        Ok(Type::Union(node))
    }

    fn rebuild_type_parameter(&mut self, node: TypeParameter) -> Result<TypeParameter, CoreError> {
        let _ = self.pop_n(node.constraints.len());
        let _ = self.pop_if(node.bound.is_some());
        self.push(Self::escaped_name(&node.name));
        Ok(node)
    }

    fn rebuild_anything(&mut self) -> Result<Type, CoreError> {
        let any = self.from_typing("Any");
        self.push(any);
        Ok(Type::Anything)
    }

    fn rebuild_nothing(&mut self) -> Result<Type, CoreError> {
        self.push("nothing".to_string());
        Ok(Type::Nothing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_types() {
        assert_eq!(Printer::print_type(&Type::named("int")), "int");
        assert_eq!(Printer::print_type(&Type::named("NoneType")), "None");
        assert_eq!(Printer::print_type(&Type::Anything), "Any");
        assert_eq!(
            Printer::print_type(&Type::generic(Type::named("tuple"), vec![Type::named("int")])),
            "Tuple[int, ...]"
        );
        assert_eq!(
            Printer::print_type(&Type::Union(UnionType {
                options: vec![Type::named("int"), Type::named("NoneType")],
            })),
            "Optional[int]"
        );
        assert_eq!(
            Printer::print_type(&Type::Union(UnionType {
                options: vec![Type::named("int"), Type::named("str")],
            })),
            "Union[int, str]"
        );
    }

    #[test]
    fn prints_callables_and_tuples() {
        let callable = Type::Callable(CallableType {
            base: Box::new(Type::named("typing.Callable")),
            parameters: vec![Type::named("int"), Type::named("str")],
        });
        assert_eq!(Printer::print_type(&callable), "Callable[[int], str]");

        let tuple = Type::Tuple(TupleType {
            base: Box::new(Type::named("tuple")),
            elements: vec![Type::named("int"), Type::named("str")],
        });
        assert_eq!(Printer::print_type(&tuple), "Tuple[int, str]");
    }

    #[test]
    fn prints_a_simple_unit() {
        let unit = Unit {
            name: "m".into(),
            constants: vec![Constant {
                name: "m.x".into(),
                ty: Type::named("int"),
            }],
            classes: vec![Class {
                name: "m.C".into(),
                metaclass: None,
                parents: vec![Type::named("classobj")],
                methods: vec![AnyFunction::Function(Function {
                    name: "f".into(),
                    signatures: vec![Signature {
                        params: vec![Parameter {
                            name: "self".into(),
                            ty: Type::named("m.C"),
                            kwonly: false,
                            optional: false,
                            mutated_type: None,
                        }],
                        starargs: None,
                        starstarargs: None,
                        return_type: Type::named("int"),
                        exceptions: vec![],
                        template: vec![],
                    }],
                    kind: MethodKind::Method,
                })],
                constants: vec![],
                template: vec![],
            }],
            ..Unit::default()
        };
        let printed = Printer::print_unit(&unit).unwrap();
        assert_eq!(
            printed,
            "x = ...  # type: int\n\nclass C:\n    def f(self) -> int: ...\n"
        );
    }

    #[test]
    fn escapes_exotic_names() {
        assert_eq!(Printer::print_type(&Type::named("~X_0")), "`~X_0`");
        assert_eq!(Printer::print_type(&Type::named("foo.C")), "foo.C");
    }
}
