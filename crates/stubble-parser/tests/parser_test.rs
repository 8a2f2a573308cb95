//! End-to-end tests for the builder and grammar driver.

use pretty_assertions::assert_eq;

use stubble_core::ir::*;
use stubble_core::Type;
use stubble_parser::{parse_source, ParseOptions, Version};

fn parse(src: &str) -> Unit {
    parse_source(src, Some("m"), Some("m.stub"), &ParseOptions::default())
        .unwrap_or_else(|e| panic!("parse failed: {e}"))
}

fn parse_with(src: &str, version: Version, platform: &str) -> Unit {
    let options = ParseOptions {
        version,
        platform: platform.to_string(),
        ..ParseOptions::default()
    };
    parse_source(src, Some("m"), None, &options).unwrap_or_else(|e| panic!("parse failed: {e}"))
}

fn parse_err(src: &str) -> String {
    match parse_source(src, Some("m"), None, &ParseOptions::default()) {
        Ok(_) => panic!("expected a parse error"),
        Err(e) => e.message().to_string(),
    }
}

fn constant<'u>(unit: &'u Unit, name: &str) -> &'u Constant {
    unit.constants
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no constant {name}"))
}

fn class<'u>(unit: &'u Unit, name: &str) -> &'u Class {
    unit.classes
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no class {name}"))
}

// ---- conditional compilation ------------------------------------------

const CONDITIONAL: &str = "\
if sys.version_info >= (3,):
    x = ...  # type: int
elif sys.version_info >= (2, 7):
    x = ...  # type: str
else:
    x = ...  # type: float
";

#[test]
fn exactly_one_conditional_clause_is_retained() {
    let unit = parse_with(CONDITIONAL, Version::new(3, 6, 0), "linux");
    assert_eq!(unit.constants.len(), 1);
    assert_eq!(constant(&unit, "m.x").ty, Type::named("int"));

    let unit = parse_with(CONDITIONAL, Version::new(2, 7, 6), "linux");
    assert_eq!(constant(&unit, "m.x").ty, Type::named("str"));

    let unit = parse_with(CONDITIONAL, Version::new(2, 6, 0), "linux");
    assert_eq!(constant(&unit, "m.x").ty, Type::named("float"));
}

#[test]
fn unmatched_conditional_without_else_retains_nothing() {
    let src = "\
if sys.platform == 'win32':
    x = ...  # type: int
";
    let unit = parse_with(src, Version::new(2, 7, 6), "linux");
    assert!(unit.constants.is_empty());
}

#[test]
fn platform_conditions_select_by_string() {
    let src = "\
if sys.platform == 'win32':
    x = ...  # type: int
else:
    x = ...  # type: str
";
    let unit = parse_with(src, Version::new(2, 7, 6), "win32");
    assert_eq!(constant(&unit, "m.x").ty, Type::named("int"));
}

#[test]
fn inactive_clauses_are_still_validated() {
    let src = "\
if sys.version_info >= (3,):
    class C:
        x = ...  # type: int
        x = ...  # type: str
";
    let msg = parse_err(src);
    assert!(msg.contains("duplicate identifier"), "got: {msg}");
}

#[test]
fn unsupported_condition_targets_are_errors() {
    let msg = parse_err("if sys.maxsize > 100:\n    x = ...  # type: int\n");
    assert!(msg.contains("unsupported condition"), "got: {msg}");
}

#[test]
fn version_slice_conditions_work() {
    let src = "\
if sys.version_info[:2] == (2, 7):
    x = ...  # type: int
else:
    x = ...  # type: str
";
    let unit = parse_with(src, Version::new(2, 7, 6), "linux");
    assert_eq!(constant(&unit, "m.x").ty, Type::named("int"));
}

// ---- duplicates --------------------------------------------------------

#[test]
fn duplicate_top_level_identifiers_name_every_duplicate() {
    let src = "\
x = ...  # type: int
x = ...  # type: str
def y() -> int: ...
class y: ...
";
    let msg = parse_err(src);
    assert!(msg.contains("duplicate top-level identifier"), "got: {msg}");
    assert!(msg.contains('x'), "got: {msg}");
    assert!(msg.contains('y'), "got: {msg}");
}

// ---- generics ----------------------------------------------------------

#[test]
fn bracket_forms_build_the_right_containers() {
    let src = "\
from typing import Any, Callable, List, Tuple

het = ...  # type: Tuple[int, str]
hom = ...  # type: List[int, ...]
empty = ...  # type: Tuple[()]
call = ...  # type: Callable[[int, str], float]
thunk = ...  # type: Callable[[], int]
loose = ...  # type: Callable[Any, int]
";
    let unit = parse(src);
    assert_eq!(
        constant(&unit, "m.het").ty,
        Type::Tuple(TupleType {
            base: Box::new(Type::named("tuple")),
            elements: vec![Type::named("int"), Type::named("str")],
        })
    );
    assert_eq!(
        constant(&unit, "m.hom").ty,
        Type::generic(Type::named("list"), vec![Type::named("int")])
    );
    assert_eq!(
        constant(&unit, "m.empty").ty,
        Type::generic(Type::named("tuple"), vec![Type::Nothing])
    );
    assert_eq!(
        constant(&unit, "m.call").ty,
        Type::Callable(CallableType {
            base: Box::new(Type::named("typing.Callable")),
            parameters: vec![Type::named("int"), Type::named("str"), Type::named("float")],
        })
    );
    assert_eq!(
        constant(&unit, "m.thunk").ty,
        Type::Callable(CallableType {
            base: Box::new(Type::named("typing.Callable")),
            parameters: vec![Type::named("int")],
        })
    );
    assert_eq!(
        constant(&unit, "m.loose").ty,
        Type::generic(Type::named("typing.Callable"), vec![Type::Anything, Type::named("int")])
    );
}

#[test]
fn callable_arity_violations_are_errors() {
    let msg = parse_err(
        "from typing import Callable\nc = ...  # type: Callable[[int], str, float]\n",
    );
    assert!(msg.contains("expected 2 parameters to Callable"), "got: {msg}");

    let msg = parse_err("from typing import Callable\nc = ...  # type: Callable[int, str]\n");
    assert!(
        msg.contains("first argument to Callable"),
        "got: {msg}"
    );
}

#[test]
fn union_and_optional_spellings_collapse() {
    let src = "\
from typing import Optional, Union

a = ...  # type: Union[int, str]
b = ...  # type: Optional[int]
c = ...  # type: int or str or int
";
    let unit = parse(src);
    assert_eq!(
        constant(&unit, "m.a").ty,
        Type::Union(UnionType {
            options: vec![Type::named("int"), Type::named("str")],
        })
    );
    assert_eq!(
        constant(&unit, "m.b").ty,
        Type::Union(UnionType {
            options: vec![Type::named("int"), Type::named("NoneType")],
        })
    );
    assert_eq!(
        constant(&unit, "m.c").ty,
        Type::Union(UnionType {
            options: vec![Type::named("int"), Type::named("str")],
        })
    );
}

#[test]
fn unparameterized_union_is_an_error() {
    let msg = parse_err("from typing import Union\nu = ...  # type: Union\n");
    assert!(msg.contains("missing options"), "got: {msg}");
}

// ---- signatures --------------------------------------------------------

#[test]
fn overloads_merge_in_declaration_order() {
    let src = "\
def f(x: int) -> int: ...
def f(x: str) -> str: ...
";
    let unit = parse(src);
    assert_eq!(unit.functions.len(), 1);
    let AnyFunction::Function(f) = &unit.functions[0] else {
        panic!("expected a concrete function");
    };
    assert_eq!(f.signatures.len(), 2);
    assert_eq!(f.signatures[0].return_type, Type::named("int"));
    assert_eq!(f.signatures[1].return_type, Type::named("str"));
}

#[test]
fn mismatched_overload_decorators_are_an_error() {
    let src = "\
class C:
    @staticmethod
    def f(x: int) -> int: ...
    @classmethod
    def f(cls, x: str) -> str: ...
";
    let msg = parse_err(src);
    assert!(msg.contains("disagree on decorators"), "got: {msg}");
}

#[test]
fn init_without_return_annotation_returns_none() {
    let src = "\
class C:
    def __init__(self): ...
";
    let unit = parse(src);
    let AnyFunction::Function(init) = &class(&unit, "m.C").methods[0] else {
        panic!("expected a concrete function");
    };
    assert_eq!(init.signatures[0].return_type, Type::named("NoneType"));
}

#[test]
fn ellipsis_sugar_synthesizes_both_variadics() {
    let unit = parse("def f(x: int, ...) -> int: ...\n");
    let AnyFunction::Function(f) = &unit.functions[0] else {
        panic!("expected a concrete function");
    };
    let sig = &f.signatures[0];
    assert_eq!(sig.params.len(), 1);
    assert_eq!(sig.starargs.as_ref().unwrap().name, "args");
    assert_eq!(sig.starstarargs.as_ref().unwrap().name, "kwargs");
}

#[test]
fn body_mutators_attach_to_their_parameter() {
    let src = "\
def f(x: int) -> None:
    x := float
    raise ValueError()
";
    let unit = parse(src);
    let AnyFunction::Function(f) = &unit.functions[0] else {
        panic!("expected a concrete function");
    };
    let sig = &f.signatures[0];
    assert_eq!(sig.params[0].mutated_type, Some(Type::named("float")));
    assert_eq!(sig.exceptions, vec![Type::named("ValueError")]);
}

#[test]
fn mutators_must_match_a_parameter() {
    let msg = parse_err("def f(x: int) -> None:\n    y := float\n");
    assert!(msg.contains("no parameter named y"), "got: {msg}");
}

#[test]
fn external_functions_keep_no_signature() {
    let unit = parse("def f PYTHONCODE\n");
    let AnyFunction::External(f) = &unit.functions[0] else {
        panic!("expected an external function");
    };
    assert_eq!(f.name, "m.f");
    assert_eq!(f.kind, MethodKind::Method);
}

#[test]
fn mixing_external_and_stub_definitions_is_an_error() {
    let msg = parse_err("def f PYTHONCODE\ndef f(x: int) -> int: ...\n");
    assert!(msg.contains("mixed stub and external"), "got: {msg}");

    let msg = parse_err("def f PYTHONCODE\ndef f PYTHONCODE\n");
    assert!(msg.contains("multiple external definitions"), "got: {msg}");
}

#[test]
fn unknown_decorators_are_errors() {
    let msg = parse_err("@garnish\ndef f() -> int: ...\n");
    assert!(msg.contains("decorator garnish not supported"), "got: {msg}");
}

#[test]
fn properties_merge_into_constants() {
    let src = "\
class C:
    @property
    def x(self) -> int: ...
    @x.setter
    def x(self, value: str) -> None: ...
";
    let unit = parse(src);
    let c = class(&unit, "m.C");
    assert!(c.methods.is_empty());
    assert_eq!(c.constants[0].name, "x");
    assert_eq!(c.constants[0].ty, Type::named("int"));
}

// ---- named tuples ------------------------------------------------------

#[test]
fn named_tuples_synthesize_classes() {
    let src = "Point = NamedTuple(\"Point\", [(\"x\", int), (\"y\", str)])\n";
    let unit = parse(src);
    let c = class(&unit, "m.~Point_0");
    assert_eq!(
        c.parents[0],
        Type::Tuple(TupleType {
            base: Box::new(Type::named("tuple")),
            elements: vec![Type::named("int"), Type::named("str")],
        })
    );
    // Declared fields first, then the standard introspection attributes.
    assert_eq!(c.constants[0].name, "x");
    assert_eq!(c.constants[1].name, "y");
    assert!(c.constants.iter().any(|k| k.name == "_fields"));
    assert!(c
        .constants
        .iter()
        .filter(|k| k.name != "x" && k.name != "y")
        .all(|k| k.ty == Type::Anything));

    let AnyFunction::Function(new) = &c.methods[0] else {
        panic!("expected a concrete function");
    };
    assert_eq!(new.name, "__new__");
    assert_eq!(new.kind, MethodKind::StaticMethod);
    let sig = &new.signatures[0];
    assert_eq!(sig.params[0].name, "cls");
    let Type::Generic(cls_ty) = &sig.params[0].ty else {
        panic!("cls should be typed type[T]");
    };
    assert_eq!(*cls_ty.base, Type::named("type"));
    let Type::TypeParam(tp) = &cls_ty.parameters[0] else {
        panic!("cls parameter should be the fresh type parameter");
    };
    assert_eq!(tp.name, "_T~Point_0");
    assert_eq!(tp.bound.as_deref(), Some(&Type::named("m.~Point_0")));
    assert_eq!(sig.params[1].name, "x");
    assert_eq!(sig.params[1].ty, Type::named("int"));
    assert!(matches!(&sig.return_type, Type::TypeParam(t) if t.name == "_T~Point_0"));

    // The fresh type parameter is registered at module level.
    assert!(unit.type_params.iter().any(|t| t.name == "_T~Point_0"));

    // A second named tuple with the same base name gets a new counter.
    let src2 = "\
A = NamedTuple(\"P\", [(\"a\", int)])
B = NamedTuple(\"P\", [(\"b\", str)])
";
    let unit2 = parse(src2);
    assert!(unit2.classes.iter().any(|c| c.name == "m.~P_0"));
    assert!(unit2.classes.iter().any(|c| c.name == "m.~P_1"));
}

// ---- classes -----------------------------------------------------------

#[test]
fn metaclass_must_be_the_last_argument() {
    let unit = parse("class C(Base, metaclass=Meta): ...\n");
    let c = class(&unit, "m.C");
    assert_eq!(c.metaclass, Some(Type::named("Meta")));

    let msg = parse_err("class C(metaclass=Meta, Base): ...\n");
    assert!(msg.contains("metaclass must be last"), "got: {msg}");

    let msg = parse_err("class C(Base, other=Meta): ...\n");
    assert!(msg.contains("only 'metaclass' allowed"), "got: {msg}");
}

#[test]
fn parentless_classes_inherit_the_legacy_root() {
    let unit = parse("class C: ...\n");
    assert_eq!(class(&unit, "m.C").parents, vec![Type::named("classobj")]);
}

#[test]
fn class_aliases_resolve_through_members() {
    let src = "\
class C:
    x = ...  # type: int
    y = x
";
    let unit = parse(src);
    let c = class(&unit, "m.C");
    let y = c.constants.iter().find(|k| k.name == "y").unwrap();
    assert_eq!(y.ty, Type::named("int"));
}

#[test]
fn class_aliases_to_non_members_are_errors() {
    let msg = parse_err("class C:\n    y = elsewhere\n");
    assert!(msg.contains("illegal value for alias"), "got: {msg}");
}

// ---- type variables ----------------------------------------------------

#[test]
fn type_var_name_must_match_string_argument() {
    let msg = parse_err("T = TypeVar('U')\n");
    assert!(msg.contains("TypeVar name needs to be"), "got: {msg}");
}

#[test]
fn type_var_rejects_unknown_keywords() {
    let msg = parse_err("T = TypeVar('T', flavor=int)\n");
    assert!(msg.contains("unrecognized keyword"), "got: {msg}");
}

#[test]
fn type_var_bound_and_constraints_are_recorded() {
    let unit = parse("T = TypeVar('T', int, str, bound=float, covariant=True)\n");
    let tp = &unit.type_params[0];
    assert_eq!(tp.constraints, vec![Type::named("int"), Type::named("str")]);
    assert_eq!(tp.bound.as_deref(), Some(&Type::named("float")));
}

// ---- imports -----------------------------------------------------------

#[test]
fn from_imports_create_aliases_and_expand_references() {
    let src = "\
from helpers import Base, Other as O

class C(Base): ...
x = ...  # type: O
";
    let unit = parse(src);
    assert_eq!(
        class(&unit, "m.C").parents,
        vec![Type::named("helpers.Base")]
    );
    assert_eq!(constant(&unit, "m.x").ty, Type::named("helpers.Other"));
    assert!(unit
        .aliases
        .iter()
        .any(|a| a.name == "m.Base" && a.ty == Type::named("helpers.Base")));
}

#[test]
fn plain_import_renames_are_errors() {
    let msg = parse_err("import helpers as h\n");
    assert!(msg.contains("renaming of modules"), "got: {msg}");
}

#[test]
fn default_values_widen_and_infer_types() {
    let src = "def f(a: int = None, b=0, c=1.5, d=other) -> None: ...\n";
    let unit = parse(src);
    let AnyFunction::Function(f) = &unit.functions[0] else {
        panic!("expected a concrete function");
    };
    let p = &f.signatures[0].params;
    assert_eq!(
        p[0].ty,
        Type::Union(UnionType {
            options: vec![Type::named("int"), Type::named("NoneType")],
        })
    );
    assert!(p[0].optional);
    assert_eq!(p[1].ty, Type::named("int"));
    assert_eq!(p[2].ty, Type::named("float"));
    assert_eq!(p[3].ty, Type::named("object"));
}

#[test]
fn unnamed_units_hash_their_source() {
    let unit = parse_source("x = ...  # type: int\n", None, None, &ParseOptions::default())
        .unwrap();
    assert_eq!(unit.name.len(), 64);
    assert!(unit.name.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn true_and_false_values_become_bool_constants() {
    let unit = parse("DEBUG = True\n");
    assert_eq!(constant(&unit, "m.DEBUG").ty, Type::named("bool"));
    assert!(unit.aliases.is_empty());
}

// ---- error reporting ---------------------------------------------------

#[test]
fn errors_carry_source_locations() {
    let err = parse_source(
        "x = ...  # type: int\ny = ...  # type: Union\n",
        Some("m"),
        Some("m.stub"),
        &ParseOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.line(), Some(2));
    let rendered = err.to_string();
    assert!(rendered.contains("m.stub"), "got: {rendered}");
    assert!(rendered.contains("ParseError"), "got: {rendered}");
}

// ---- algebraic properties ----------------------------------------------

mod join_properties {
    use proptest::prelude::*;
    use stubble_core::ir::{join_types, UnionType};
    use stubble_core::Type;

    fn names() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[a-d]", 0..8)
    }

    proptest! {
        #[test]
        fn join_is_duplicate_free_and_order_preserving(names in names()) {
            let joined = join_types(names.iter().map(|n| Type::named(n.clone())));
            let flattened: Vec<Type> = match joined {
                Type::Union(UnionType { options }) => options,
                Type::Nothing => vec![],
                single => vec![single],
            };
            // Each distinct name appears exactly once.
            let mut expected = Vec::new();
            for n in &names {
                let t = Type::named(n.clone());
                if !expected.contains(&t) {
                    expected.push(t);
                }
            }
            prop_assert_eq!(flattened, expected);
        }

        #[test]
        fn join_is_idempotent(names in names()) {
            let once = join_types(names.iter().map(|n| Type::named(n.clone())));
            let twice = join_types(vec![once.clone()]);
            prop_assert_eq!(once, twice);
        }
    }
}
