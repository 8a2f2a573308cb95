//! Print/re-parse round trip: printing a resolved unit and running the
//! result through the same pipeline yields a structurally equal unit under
//! canonical ordering.

use pretty_assertions::assert_eq;

use stubble_cache::loader::{Loader, MapSource};
use stubble_core::passes::{CanonicalOrdering, Printer, VerifyLinked};
use stubble_core::{visit, Unit};

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

const HELPERS_SRC: &str = "\
class Base: ...
";

const TYPING_SRC: &str = "\
class Generic: ...
class Callable: ...
";

const MODULE_SRC: &str = "\
from typing import Any, Generic, List, Optional, Tuple, TypeVar, Union
from helpers import Base

T = TypeVar('T')

CONST = ...  # type: int
pair = ...  # type: Tuple[int, str]
bag = ...  # type: Tuple[int, ...]
Point = NamedTuple(\"Point\", [(\"x\", int), (\"y\", int)])

class Box(Generic[T]):
    value = ...  # type: T
    def get(self) -> T: ...
    def put(self, value: T) -> None: ...

class Child(Box[int], Base):
    def describe(self, prefix: str = ..., *, verbose: bool = ...) -> str: ...

class Stream:
    def seek(self, pos: int) -> None:
        pos := float
    def close(self) -> None:
        raise ValueError()

def find(needle: str, haystack: List[str]) -> Optional[int]: ...
def find(needle: int, haystack: List[int]) -> Optional[int]: ...
def mix(value: int or str) -> Union[int, str]: ...
def fetch(*args: int, **kwargs: str) -> None: ...
";

fn load(module_src: &str) -> (Unit, String) {
    let mut source = MapSource::new();
    source.insert("builtins", BUILTINS_SRC);
    source.insert("helpers", HELPERS_SRC);
    source.insert("typing", TYPING_SRC);
    source.insert("m", module_src);
    let mut loader = Loader::new(source);
    let unit = loader.import_name("m").unwrap().clone();
    let printed = Printer::print_unit(&unit).unwrap();
    (unit, printed)
}

fn canonical(unit: &Unit) -> Unit {
    visit::run(&mut CanonicalOrdering::new(), unit).unwrap()
}

#[test]
fn print_then_reparse_is_structurally_stable() {
    let (first, printed) = load(MODULE_SRC);
    // The unit resolved completely on the first pass.
    visit::run(&mut VerifyLinked, &first).unwrap();

    let (second, reprinted) = load(&printed);
    assert_eq!(canonical(&first), canonical(&second));
    // And printing is a fixed point from the first print onward.
    assert_eq!(printed, reprinted);
}

#[test]
fn printed_output_regenerates_imports() {
    let (_, printed) = load(MODULE_SRC);
    assert!(printed.contains("from typing import"), "got:\n{printed}");
    assert!(printed.contains("import helpers"), "got:\n{printed}");
    assert!(printed.contains("Base = helpers.Base"), "got:\n{printed}");
    assert!(printed.contains("TypeVar"), "got:\n{printed}");
}

#[test]
fn abbreviated_forms_print_compactly() {
    let (_, printed) = load(MODULE_SRC);
    // `self` parameters print bare, optional object parameters drop their
    // annotation, and unions with None print as Optional.
    assert!(printed.contains("def get(self) -> T: ..."), "got:\n{printed}");
    assert!(printed.contains("Optional[int]"), "got:\n{printed}");
    assert!(printed.contains("Tuple[int, ...]"), "got:\n{printed}");
    assert!(printed.contains("*args: int"), "got:\n{printed}");
    assert!(printed.contains("**kwargs: str"), "got:\n{printed}");
    assert!(printed.contains("pos := float"), "got:\n{printed}");
    assert!(printed.contains("raise ValueError()"), "got:\n{printed}");
}
