//! Serialization support: clearing class links, enumerating ClassType
//! nodes, and patching links back in by traversal position.

use crate::error::CoreError;
use crate::ir::{ClassIx, ClassLink, ClassType, Type};
use crate::kinds::{NodeKind, PassSpec};
use crate::visit::Pass;

/// Clear every resolved class link. Links are arena indices and are not
/// portable across processes, so they are stripped before storing.
pub struct StripClassLinks;

impl Pass for StripClassLinks {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("strip-class-links", &[NodeKind::ClassType]);
        &SPEC
    }

    fn rebuild_class_type(&mut self, node: ClassType) -> Result<Type, CoreError> {
        Ok(Type::Class(ClassType {
            name: node.name,
            link: ClassLink::Unresolved,
        }))
    }
}

/// Record the qualified name of every ClassType node, in deterministic
/// traversal order. The resulting list identifies exactly the nodes a
/// targeted relink must touch.
#[derive(Debug, Default)]
pub struct IndexClassTypes {
    pub names: Vec<String>,
}

impl IndexClassTypes {
    pub fn new() -> Self {
        IndexClassTypes::default()
    }
}

impl Pass for IndexClassTypes {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("index-class-types", &[NodeKind::ClassType]);
        &SPEC
    }

    fn enter_class_type(&mut self, node: &ClassType) -> Result<(), CoreError> {
        self.names.push(node.name.clone());
        Ok(())
    }
}

/// Patch pre-resolved links into the ClassType nodes of a unit, matched by
/// traversal position. The caller must have produced `links` from the same
/// traversal order [`IndexClassTypes`] uses; a count mismatch is a defect
/// in the pipeline and aborts.
pub struct RelinkByPosition {
    links: Vec<ClassIx>,
    pos: usize,
}

impl RelinkByPosition {
    pub fn new(links: Vec<ClassIx>) -> Self {
        RelinkByPosition { links, pos: 0 }
    }

    /// Every link must have been consumed by the end of the walk.
    pub fn finish(self) {
        assert_eq!(
            self.pos,
            self.links.len(),
            "targeted relink visited fewer class references than were recorded"
        );
    }
}

impl Pass for RelinkByPosition {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("relink-by-position", &[NodeKind::ClassType]);
        &SPEC
    }

    fn rebuild_class_type(&mut self, node: ClassType) -> Result<Type, CoreError> {
        let ix = *self
            .links
            .get(self.pos)
            .unwrap_or_else(|| panic!("targeted relink ran past its recorded class references"));
        self.pos += 1;
        Ok(Type::Class(ClassType {
            name: node.name,
            link: ClassLink::Resolved(ix),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, Unit};
    use crate::visit;

    fn unit_with_refs() -> Unit {
        Unit {
            name: "m".into(),
            constants: vec![
                Constant {
                    name: "a".into(),
                    ty: Type::Class(ClassType {
                        name: "m.C".into(),
                        link: ClassLink::Resolved(ClassIx(0)),
                    }),
                },
                Constant {
                    name: "b".into(),
                    ty: Type::Class(ClassType::unresolved("foo.D")),
                },
            ],
            ..Unit::default()
        }
    }

    #[test]
    fn strip_then_index_then_relink_round_trips() {
        let unit = unit_with_refs();
        let stripped = visit::run(&mut StripClassLinks, &unit).unwrap();
        assert!(stripped
            .constants
            .iter()
            .all(|c| matches!(&c.ty, Type::Class(ct) if !ct.link.is_resolved())));

        let mut index = IndexClassTypes::new();
        visit::run(&mut index, &stripped).unwrap();
        assert_eq!(index.names, vec!["m.C".to_string(), "foo.D".to_string()]);

        let mut relink = RelinkByPosition::new(vec![ClassIx(3), ClassIx(7)]);
        let relinked = visit::run(&mut relink, &stripped).unwrap();
        relink.finish();
        assert_eq!(
            relinked.constants[0].ty,
            Type::Class(ClassType {
                name: "m.C".into(),
                link: ClassLink::Resolved(ClassIx(3)),
            })
        );
        assert_eq!(
            relinked.constants[1].ty,
            Type::Class(ClassType {
                name: "foo.D".into(),
                link: ClassLink::Resolved(ClassIx(7)),
            })
        );
    }
}
