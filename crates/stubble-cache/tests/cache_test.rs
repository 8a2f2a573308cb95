//! Store/load behavior of the binary cache and the batch loader.

use pretty_assertions::assert_eq;

use stubble_cache::loader::{Loader, MapSource};
use stubble_cache::{ensure_name, from_bytes, process_record, store_unit, to_bytes, CacheError};
use stubble_core::ir::{ClassLink, Type, Unit};
use stubble_core::kinds::{NodeKind, PassSpec};
use stubble_core::visit::{self, Pass};
use stubble_core::CoreError;

const BUILTINS_SRC: &str = "\
class object: ...
class classobj: ...
class int(object): ...
class float(object): ...
class bool(object): ...
class str(object): ...
class tuple(object): ...
class dict(object): ...
class list(object): ...
class type(object): ...
class NoneType(object): ...
class ValueError(object): ...
";

fn source_with(modules: &[(&str, &str)]) -> MapSource {
    let mut source = MapSource::new();
    source.insert("builtins", BUILTINS_SRC);
    for (name, src) in modules {
        source.insert(*name, *src);
    }
    source
}

/// Collects every class link in a unit.
#[derive(Default)]
struct CollectLinks {
    links: Vec<ClassLink>,
}

impl Pass for CollectLinks {
    fn spec(&self) -> &'static PassSpec {
        static SPEC: PassSpec = PassSpec::new("collect-links", &[NodeKind::ClassType]);
        &SPEC
    }

    fn enter_class_type(
        &mut self,
        node: &stubble_core::ir::ClassType,
    ) -> Result<(), CoreError> {
        self.links.push(node.link);
        Ok(())
    }
}

fn links_of(unit: &Unit) -> Vec<ClassLink> {
    let mut pass = CollectLinks::default();
    visit::run(&mut pass, unit).unwrap();
    pass.links
}

fn assert_fully_linked(unit: &Unit) {
    let links = links_of(unit);
    assert!(!links.is_empty(), "expected some class references");
    assert!(
        links.iter().all(|l| l.is_resolved()),
        "unresolved links remain: {links:?}"
    );
}

#[test]
fn store_then_load_under_the_same_name_relinks_everything() {
    let mut loader = Loader::new(source_with(&[(
        "mod",
        "class C: ...\ndef f(x: C) -> int: ...\n",
    )]));
    let unit = loader.import_name("mod").unwrap().clone();
    assert_fully_linked(&unit);

    let record = store_unit(&unit).unwrap();
    // Stored links are stripped; the node list is precise.
    assert!(links_of(&record.unit).iter().all(|l| !l.is_resolved()));
    let names = record.class_types.as_ref().unwrap();
    assert!(names.contains(&"mod.C".to_string()));
    assert!(names.contains(&"int".to_string()));
    // A non-empty module depends on itself.
    assert!(record.dependencies.contains("mod"));

    let bytes = to_bytes(&record).unwrap();
    let mut restored = from_bytes(&bytes).unwrap();
    ensure_name(&mut restored, "mod").unwrap();
    // Same name: the precise list survives and the targeted relink runs.
    assert!(restored.class_types.is_some());

    let live: Vec<&Unit> = loader.modules().collect();
    let (unit, _arena) = process_record(restored, &live).unwrap();
    assert_fully_linked(&unit);
}

#[test]
fn empty_units_record_no_dependencies() {
    let mut loader = Loader::new(source_with(&[("empty", "")]));
    let unit = loader.import_name("empty").unwrap().clone();
    let record = store_unit(&unit).unwrap();
    assert!(record.dependencies.is_empty());
    assert_eq!(record.class_types.as_deref(), Some(&[][..]));
}

#[test]
fn package_init_collapses_to_the_package_name() {
    let mut loader = Loader::new(source_with(&[("pkg.__init__", "class C: ...\n")]));
    let unit = loader.import_name("pkg.__init__").unwrap().clone();
    let record = store_unit(&unit).unwrap();
    assert_eq!(record.unit.name, "pkg");
    assert!(record.unit.classes.iter().any(|c| c.name == "pkg.C"));
}

#[test]
fn loading_under_a_new_name_forces_the_full_rename_path() {
    let mut loader = Loader::new(source_with(&[("old", "class C: ...\nx = ...  # type: C\n")]));
    let unit = loader.import_name("old").unwrap().clone();
    let mut record = store_unit(&unit).unwrap();
    ensure_name(&mut record, "new").unwrap();

    // The rename invalidates the precise relink list.
    assert!(record.class_types.is_none());
    assert_eq!(record.unit.name, "new");
    assert!(record.unit.classes.iter().any(|c| c.name == "new.C"));

    let mut builtins_loader = Loader::new(source_with(&[]));
    builtins_loader.import_name("builtins").unwrap();
    let live: Vec<&Unit> = builtins_loader.modules().collect();
    let (restored, _arena) = process_record(record, &live).unwrap();
    assert_fully_linked(&restored);
    assert!(restored
        .constants
        .iter()
        .any(|c| c.name == "new.x"
            && matches!(&c.ty, Type::Class(ct) if ct.name == "new.C" && ct.link.is_resolved())));
}

#[test]
fn missing_dependencies_are_unrestorable() {
    let mut loader = Loader::new(source_with(&[(
        "mod",
        "from vanished import Gone\nx = ...  # type: Gone\n",
    )]));
    let unit = loader.import_name("mod").unwrap().clone();
    let record = store_unit(&unit).unwrap();
    assert!(record.dependencies.contains("vanished"));

    // The live map has builtins but not `vanished`.
    let mut builtins_loader = Loader::new(source_with(&[]));
    builtins_loader.import_name("builtins").unwrap();
    let live: Vec<&Unit> = builtins_loader.modules().collect();
    let err = process_record(record, &live).unwrap_err();
    match err {
        CacheError::UnrestorableDependency(name) => {
            assert!(name.contains("vanished"), "got: {name}")
        }
        other => panic!("expected an unrestorable dependency, got {other}"),
    }
}

#[test]
fn bytes_survive_a_disk_round_trip() {
    let mut loader = Loader::new(source_with(&[("mod", "class C: ...\n")]));
    let unit = loader.import_name("mod").unwrap().clone();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mod.cache");
    stubble_cache::store_to_path(&unit, &path).unwrap();
    let record = stubble_cache::load_from_path(&path).unwrap();
    assert_eq!(record.unit.name, "mod");
    assert!(record.unit.classes.iter().any(|c| c.name == "mod.C"));
}

#[test]
fn module_identity_is_declared_path_not_content() {
    const SHARED: &str = "class C: ...\nx = ...  # type: C\n";
    let mut loader = Loader::new(source_with(&[
        ("foo", SHARED),
        ("another.foo", SHARED),
        ("empty1", ""),
        ("empty2", ""),
    ]));
    loader.load_batch(&["foo", "another.foo", "empty1", "empty2"]).unwrap();

    let foo = loader.get_module("foo").unwrap();
    let other = loader.get_module("another.foo").unwrap();
    assert_eq!(foo.name, "foo");
    assert_eq!(other.name, "another.foo");
    assert!(foo.classes.iter().any(|c| c.name == "foo.C"));
    assert!(other.classes.iter().any(|c| c.name == "another.foo.C"));
    assert_ne!(foo, other);

    let e1 = loader.get_module("empty1").unwrap();
    let e2 = loader.get_module("empty2").unwrap();
    assert_eq!(e1.name, "empty1");
    assert_eq!(e2.name, "empty2");
    assert!(e1.is_empty());
    assert!(e2.is_empty());
    assert_ne!(e1, e2);
}

#[test]
fn cyclic_cross_module_references_resolve() {
    let mut loader = Loader::new(source_with(&[
        (
            "foo",
            "from bar import Bar\nclass Foo: ...\ndef get_bar() -> Bar: ...\n",
        ),
        (
            "bar",
            "from foo import Foo\nclass Bar: ...\ndef get_foo() -> Foo: ...\n",
        ),
    ]));
    loader.load_batch(&["foo", "bar"]).unwrap();

    for name in ["foo", "bar"] {
        assert_fully_linked(loader.get_module(name).unwrap());
    }
    // The dependency graph recorded the cycle.
    assert!(petgraph::algo::is_cyclic_directed(loader.dependency_graph()));
}

#[test]
fn missing_roots_are_reported() {
    let mut loader = Loader::new(source_with(&[]));
    let err = loader.import_name("nowhere").unwrap_err();
    assert!(matches!(err, CacheError::ModuleNotFound(name) if name == "nowhere"));
}
