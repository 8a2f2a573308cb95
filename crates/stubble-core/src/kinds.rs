//! Node-kind tags and the static nesting table.
//!
//! The nesting table is hand-authored from the IR's own structural
//! constraints (which kind can legally contain which). The visitor engine
//! uses it to compute, once per pass registration, the minimal set of kinds
//! a pass needs to visit.

use std::sync::OnceLock;

/// Tag for every node kind in the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    Unit,
    Constant,
    Alias,
    Class,
    Function,
    ExternalFunction,
    Signature,
    Parameter,
    TemplateItem,
    NamedType,
    ClassType,
    GenericType,
    TupleType,
    CallableType,
    UnionType,
    TypeParameter,
    AnythingType,
    NothingType,
}

pub const NODE_KIND_COUNT: usize = 18;

/// A bitset over [`NodeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSet(u32);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);
    pub const ALL: KindSet = KindSet((1 << NODE_KIND_COUNT as u32) - 1);

    pub const fn contains(self, kind: NodeKind) -> bool {
        self.0 & (1 << kind as u32) != 0
    }

    pub fn insert(&mut self, kind: NodeKind) {
        self.0 |= 1 << kind as u32;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<NodeKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = NodeKind>>(iter: I) -> Self {
        let mut set = KindSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// The kinds a type expression can be.
const TYPE_KINDS: &[NodeKind] = &[
    NodeKind::NamedType,
    NodeKind::ClassType,
    NodeKind::GenericType,
    NodeKind::TupleType,
    NodeKind::CallableType,
    NodeKind::UnionType,
    NodeKind::TypeParameter,
    NodeKind::AnythingType,
    NodeKind::NothingType,
];

/// Which kinds may appear directly beneath each kind. The engine walks
/// children in the order given here; the printing pass relies on that order
/// for its result stack.
pub fn children_of(kind: NodeKind) -> &'static [NodeKind] {
    match kind {
        NodeKind::Unit => &[
            NodeKind::Constant,
            NodeKind::TypeParameter,
            NodeKind::Class,
            NodeKind::Function,
            NodeKind::ExternalFunction,
            NodeKind::Alias,
        ],
        NodeKind::Constant | NodeKind::Alias | NodeKind::Parameter => TYPE_KINDS,
        NodeKind::Class => &[
            NodeKind::NamedType,
            NodeKind::ClassType,
            NodeKind::GenericType,
            NodeKind::TupleType,
            NodeKind::CallableType,
            NodeKind::UnionType,
            NodeKind::TypeParameter,
            NodeKind::AnythingType,
            NodeKind::NothingType,
            NodeKind::Function,
            NodeKind::ExternalFunction,
            NodeKind::Constant,
            NodeKind::TemplateItem,
        ],
        NodeKind::Function => &[NodeKind::Signature],
        NodeKind::ExternalFunction => &[],
        NodeKind::Signature => &[
            NodeKind::Parameter,
            NodeKind::NamedType,
            NodeKind::ClassType,
            NodeKind::GenericType,
            NodeKind::TupleType,
            NodeKind::CallableType,
            NodeKind::UnionType,
            NodeKind::TypeParameter,
            NodeKind::AnythingType,
            NodeKind::NothingType,
            NodeKind::TemplateItem,
        ],
        NodeKind::TemplateItem => &[NodeKind::TypeParameter],
        NodeKind::GenericType
        | NodeKind::TupleType
        | NodeKind::CallableType
        | NodeKind::UnionType
        | NodeKind::TypeParameter => TYPE_KINDS,
        NodeKind::NamedType
        | NodeKind::ClassType
        | NodeKind::AnythingType
        | NodeKind::NothingType => &[],
    }
}

const ALL_KINDS: [NodeKind; NODE_KIND_COUNT] = [
    NodeKind::Unit,
    NodeKind::Constant,
    NodeKind::Alias,
    NodeKind::Class,
    NodeKind::Function,
    NodeKind::ExternalFunction,
    NodeKind::Signature,
    NodeKind::Parameter,
    NodeKind::TemplateItem,
    NodeKind::NamedType,
    NodeKind::ClassType,
    NodeKind::GenericType,
    NodeKind::TupleType,
    NodeKind::CallableType,
    NodeKind::UnionType,
    NodeKind::TypeParameter,
    NodeKind::AnythingType,
    NodeKind::NothingType,
];

/// Registration data for one pass type.
///
/// `handled` must name every kind for which the pass overrides a hook; the
/// engine restricts traversal to the kinds whose subtrees can contain a
/// handled kind. A pass built with [`PassSpec::visit_all`] visits every
/// kind unconditionally. The computed visit set is memoized on the spec
/// itself; recomputation is idempotent, so a first-use race is harmless.
pub struct PassSpec {
    pub name: &'static str,
    handled: &'static [NodeKind],
    all: bool,
    visit_set: OnceLock<KindSet>,
}

impl PassSpec {
    pub const fn new(name: &'static str, handled: &'static [NodeKind]) -> Self {
        PassSpec {
            name,
            handled,
            all: false,
            visit_set: OnceLock::new(),
        }
    }

    pub const fn visit_all(name: &'static str) -> Self {
        PassSpec {
            name,
            handled: &[],
            all: true,
            visit_set: OnceLock::new(),
        }
    }

    /// The set of kinds this pass must visit: every handled kind, plus every
    /// kind from which a handled kind is reachable through legal nesting.
    pub fn visit_set(&self) -> KindSet {
        *self.visit_set.get_or_init(|| {
            if self.all {
                return KindSet::ALL;
            }
            let mut set: KindSet = self.handled.iter().copied().collect();
            loop {
                let mut grew = false;
                for kind in ALL_KINDS {
                    if set.contains(kind) {
                        continue;
                    }
                    if children_of(kind).iter().any(|c| set.contains(*c)) {
                        set.insert(kind);
                        grew = true;
                    }
                }
                if !grew {
                    return set;
                }
            }
        })
    }
}
