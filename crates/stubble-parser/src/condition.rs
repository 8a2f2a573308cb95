//! Conditional-compilation scopes and condition evaluation.
//!
//! Each `if`/`elif`/`else` layer is a scope with two flags: whether it is
//! currently active, and whether it can still trigger. A scope triggers at
//! most once; evaluating a true condition while triggerable activates the
//! scope and disables further triggering, anything else deactivates it.

use crate::error::ParseError;

/// The target Python version, normalized to three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(pub [i64; 3]);

impl Version {
    pub fn new(major: i64, minor: i64, micro: i64) -> Self {
        Version([major, minor, micro])
    }
}

impl From<(i64, i64)> for Version {
    fn from((major, minor): (i64, i64)) -> Self {
        Version([major, minor, 0])
    }
}

impl From<(i64, i64, i64)> for Version {
    fn from((major, minor, micro): (i64, i64, i64)) -> Self {
        Version([major, minor, micro])
    }
}

/// Zero-pad to three components and truncate anything longer.
fn three_tuple(values: &[i64]) -> [i64; 3] {
    let mut out = [0; 3];
    for (i, v) in values.iter().take(3).enumerate() {
        out[i] = *v;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn apply<T: Ord>(self, left: &T, right: &T) -> bool {
        match self {
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
            CmpOp::Lt => left < right,
            CmpOp::Le => left <= right,
            CmpOp::Gt => left > right,
            CmpOp::Ge => left >= right,
        }
    }
}

/// An optional subscript on `sys.version_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscript {
    Full,
    Index(i64),
    Slice(Option<i64>, Option<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CondValue {
    Int(i64),
    IntTuple(Vec<i64>),
    Str(String),
}

/// A parsed condition expression. Compound conditions combine with `or`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Or(Box<Condition>, Box<Condition>),
    Compare {
        target: String,
        subscript: Subscript,
        op: CmpOp,
        value: CondValue,
    },
}

/// Evaluate a condition against a target version and platform.
pub fn eval_condition(
    cond: &Condition,
    version: Version,
    platform: &str,
) -> Result<bool, ParseError> {
    match cond {
        Condition::Or(left, right) => Ok(eval_condition(left, version, platform)?
            || eval_condition(right, version, platform)?),
        Condition::Compare {
            target,
            subscript,
            op,
            value,
        } => eval_comparison(target, *subscript, *op, value, version, platform),
    }
}

fn eval_comparison(
    target: &str,
    subscript: Subscript,
    op: CmpOp,
    value: &CondValue,
    version: Version,
    platform: &str,
) -> Result<bool, ParseError> {
    match target {
        "sys.version_info" => match subscript {
            Subscript::Index(i) => {
                let CondValue::Int(expected) = value else {
                    return Err(ParseError::new(
                        "an element of sys.version_info must be compared to an integer",
                    ));
                };
                let len = version.0.len() as i64;
                let ix = if i < 0 { i + len } else { i };
                if ix < 0 || ix >= len {
                    return Err(ParseError::new(format!(
                        "sys.version_info index out of range: {i}"
                    )));
                }
                Ok(op.apply(&version.0[ix as usize], expected))
            }
            Subscript::Full | Subscript::Slice(..) => {
                let CondValue::IntTuple(expected) = value else {
                    return Err(ParseError::new(
                        "sys.version_info must be compared to a tuple of integers",
                    ));
                };
                let actual = match subscript {
                    Subscript::Slice(start, end) => {
                        let len = version.0.len() as i64;
                        let clamp = |v: i64| -> usize {
                            let v = if v < 0 { v + len } else { v };
                            v.clamp(0, len) as usize
                        };
                        let start = clamp(start.unwrap_or(0));
                        let end = clamp(end.unwrap_or(len));
                        version.0[start..end.max(start)].to_vec()
                    }
                    _ => version.0.to_vec(),
                };
                Ok(op.apply(&three_tuple(&actual), &three_tuple(expected)))
            }
        },
        "sys.platform" => {
            let CondValue::Str(expected) = value else {
                return Err(ParseError::new("sys.platform must be compared to a string"));
            };
            if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
                return Err(ParseError::new(
                    "sys.platform must be compared using == or !=",
                ));
            }
            Ok(op.apply(&platform.to_string(), expected))
        }
        other => Err(ParseError::new(format!("unsupported condition: '{other}'"))),
    }
}

/// One layer of the condition stack.
#[derive(Debug)]
pub struct ConditionScope {
    active: bool,
    can_trigger: bool,
    parent: Option<Box<ConditionScope>>,
}

impl ConditionScope {
    /// The always-active root scope.
    pub fn root() -> Self {
        ConditionScope {
            active: true,
            can_trigger: false,
            parent: None,
        }
    }

    /// Push a child scope; it may trigger only while its parent is active.
    pub fn push(self: Box<Self>) -> Box<ConditionScope> {
        let can_trigger = self.active;
        Box::new(ConditionScope {
            active: false,
            can_trigger,
            parent: Some(self),
        })
    }

    /// Pop back to the parent at the end of an if-statement.
    pub fn pop(self: Box<Self>) -> Box<ConditionScope> {
        self.parent
            .expect("condition scope stack underflow: if_end without if_begin")
    }

    /// Apply a condition result. A scope triggers at most once.
    pub fn apply_condition(&mut self, value: bool) {
        assert!(
            self.parent.is_some(),
            "apply_condition called on the root scope"
        );
        if self.can_trigger && value {
            self.active = true;
            self.can_trigger = false;
        } else {
            self.active = false;
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }
}
