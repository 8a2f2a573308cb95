//! The compatibility rewrite applied once after a raw parse.
//!
//! Canonicalizes the typing-module spellings of builtin containers into the
//! IR's native spellings so downstream passes and the printer see one form.
//! Callers with different conventions can supply their own [`CompatRewrite`].

use stubble_core::error::CoreError;
use stubble_core::ir::{NamedType, Type, Unit};
use stubble_core::kinds::{NodeKind, PassSpec};
use stubble_core::visit::{self, Pass};

use crate::error::ParseError;

/// Hook for the post-parse canonicalization rewrite.
pub trait CompatRewrite {
    fn rewrite(&self, unit: Unit) -> Result<Unit, ParseError>;
}

/// The default rewrite: typing container names become their native
/// equivalents, and `typing.Any` becomes the anything type.
pub struct DefaultCompat;

impl CompatRewrite for DefaultCompat {
    fn rewrite(&self, unit: Unit) -> Result<Unit, ParseError> {
        let mut pass = TypingToNative;
        visit::run(&mut pass, &unit).map_err(ParseError::from)
    }
}

const TRANSLATIONS: &[(&str, &str)] = &[
    ("typing.List", "list"),
    ("typing.Dict", "dict"),
    ("typing.Set", "set"),
    ("typing.FrozenSet", "frozenset"),
    ("typing.Tuple", "tuple"),
    ("typing.Type", "type"),
    ("typing.Text", "str"),
];

struct TypingToNative;

impl Pass for TypingToNative {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("typing-to-native", &[NodeKind::NamedType]);
        &SPEC
    }

    fn rebuild_named_type(&mut self, node: NamedType) -> Result<Type, CoreError> {
        if node.name == "typing.Any" {
            return Ok(Type::Anything);
        }
        for (typing_name, native) in TRANSLATIONS {
            if node.name == *typing_name {
                return Ok(Type::named(*native));
            }
        }
        Ok(Type::Named(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stubble_core::ir::Constant;

    #[test]
    fn typing_containers_become_native() {
        let unit = Unit {
            name: String::new(),
            constants: vec![Constant {
                name: "c".into(),
                ty: Type::generic(Type::named("typing.List"), vec![Type::named("typing.Any")]),
            }],
            ..Unit::default()
        };
        let out = DefaultCompat.rewrite(unit).unwrap();
        assert_eq!(
            out.constants[0].ty,
            Type::generic(Type::named("list"), vec![Type::Anything])
        );
    }
}
