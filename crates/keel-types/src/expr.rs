//! Translatable expression trees.
//!
//! [`Expr`] is the storage-neutral form of a predicate or constructor that
//! hooks hand to the storage engine: filter handlers return a predicate to
//! push into the query, insert handlers rewrite a constructor, bindings
//! produce a computed column. The event pipeline never evaluates these
//! trees; it only passes them along and folds rewrites in order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One member assignment inside an [`Expr::Construct`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInit {
    /// Member name.
    pub name: String,
    /// Assigned value.
    pub value: Expr,
}

/// A storage-neutral expression.
///
/// # Example
///
/// ```
/// use keel_types::Expr;
///
/// let visible = Expr::and_all([
///     !Expr::field("archived"),
///     Expr::field("tenant").equals(Expr::param("current")),
/// ]);
/// assert_eq!(visible.to_string(), "!archived && tenant == @current");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Member access on the row/entity, dotted for nested members.
    Field {
        /// Dotted member path.
        path: String,
    },
    /// Constant value.
    Literal {
        /// JSON-encoded constant.
        value: Value,
    },
    /// Value bound when the query executes (current tenant, current user).
    Param {
        /// Parameter name.
        name: String,
    },
    /// Logical negation.
    Not {
        /// Negated operand.
        operand: Box<Expr>,
    },
    /// Equality comparison.
    Eq {
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Conjunction. Empty means `true`.
    And {
        /// Operands in evaluation order.
        operands: Vec<Expr>,
    },
    /// Disjunction. Empty means `false`.
    Or {
        /// Operands in evaluation order.
        operands: Vec<Expr>,
    },
    /// Entity constructor used by bulk inserts.
    Construct {
        /// Member assignments in declaration order.
        fields: Vec<FieldInit>,
    },
}

impl Expr {
    /// Member access.
    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field { path: path.into() }
    }

    /// Constant.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// Execution-time parameter.
    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param { name: name.into() }
    }

    /// `self == other`.
    #[must_use]
    pub fn equals(self, other: Expr) -> Self {
        Self::Eq {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Conjunction of all operands, flattening nested conjunctions.
    ///
    /// Zero operands yield the literal `true`; one operand is returned as is.
    #[must_use]
    pub fn and_all(operands: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for op in operands {
            match op {
                Self::And { operands } => flat.extend(operands),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Self::literal(true),
            1 => flat.remove(0),
            _ => Self::And { operands: flat },
        }
    }

    /// Disjunction of all operands, flattening nested disjunctions.
    ///
    /// Zero operands yield the literal `false`; one operand is returned as is.
    #[must_use]
    pub fn or_any(operands: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for op in operands {
            match op {
                Self::Or { operands } => flat.extend(operands),
                other => flat.push(other),
            }
        }

        match flat.len() {
            0 => Self::literal(false),
            1 => flat.remove(0),
            _ => Self::Or { operands: flat },
        }
    }

    /// Empty constructor.
    #[must_use]
    pub fn construct() -> Self {
        Self::Construct { fields: Vec::new() }
    }

    /// Sets a member of a constructor, replacing an existing assignment of
    /// the same name in place or appending a new one.
    ///
    /// Expressions other than [`Expr::Construct`] are returned unchanged.
    #[must_use]
    pub fn with_field(self, name: impl Into<String>, value: Expr) -> Self {
        match self {
            Self::Construct { mut fields } => {
                let name = name.into();
                match fields.iter_mut().find(|f| f.name == name) {
                    Some(existing) => existing.value = value,
                    None => fields.push(FieldInit { name, value }),
                }
                Self::Construct { fields }
            }
            other => other,
        }
    }

    /// Value assigned to `name` in a constructor.
    #[must_use]
    pub fn field_init(&self, name: &str) -> Option<&Expr> {
        match self {
            Self::Construct { fields } => fields.iter().find(|f| f.name == name).map(|f| &f.value),
            _ => None,
        }
    }

    /// Returns `true` for the literal `true`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Literal { value: Value::Bool(true) })
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And { .. } | Self::Or { .. } | Self::Eq { .. } => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not {
            operand: Box::new(self),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { path } => f.write_str(path),
            Self::Literal { value } => write!(f, "{value}"),
            Self::Param { name } => write!(f, "@{name}"),
            Self::Not { operand } => {
                f.write_str("!")?;
                operand.fmt_operand(f)
            }
            Self::Eq { left, right } => {
                left.fmt_operand(f)?;
                f.write_str(" == ")?;
                right.fmt_operand(f)
            }
            Self::And { operands } | Self::Or { operands } => {
                let sep = if matches!(self, Self::And { .. }) {
                    " && "
                } else {
                    " || "
                };
                for (i, op) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    match op {
                        Self::Eq { .. } => write!(f, "{op}")?,
                        _ => op.fmt_operand(f)?,
                    }
                }
                Ok(())
            }
            Self::Construct { fields } => {
                f.write_str("new {")?;
                for (i, init) in fields.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    write!(f, "{} = {}", init.name, init.value)?;
                }
                f.write_str(if fields.is_empty() { "}" } else { " }" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_all_flattens_nested_conjunctions() {
        let inner = Expr::and_all([Expr::field("a"), Expr::field("b")]);
        let outer = Expr::and_all([inner, Expr::field("c")]);
        assert_eq!(
            outer,
            Expr::And {
                operands: vec![Expr::field("a"), Expr::field("b"), Expr::field("c")]
            }
        );
    }

    #[test]
    fn and_all_degenerate_cases() {
        assert!(Expr::and_all([]).is_true());
        assert_eq!(Expr::and_all([Expr::field("x")]), Expr::field("x"));
        assert_eq!(Expr::or_any([]), Expr::literal(false));
    }

    #[test]
    fn display_precedence() {
        let e = Expr::or_any([
            Expr::field("a").equals(Expr::literal(1)),
            Expr::and_all([Expr::field("b"), !Expr::field("c")]),
        ]);
        assert_eq!(e.to_string(), "a == 1 || (b && !c)");
        let negated_eq = !Expr::field("a").equals(Expr::literal("x"));
        assert_eq!(negated_eq.to_string(), "!(a == \"x\")");
    }

    #[test]
    fn with_field_appends_then_replaces() {
        let ctor = Expr::construct()
            .with_field("name", Expr::literal("n"))
            .with_field("state", Expr::literal("draft"));
        assert_eq!(ctor.to_string(), "new { name = \"n\", state = \"draft\" }");

        let replaced = ctor.with_field("name", Expr::literal("m"));
        assert_eq!(replaced.field_init("name"), Some(&Expr::literal("m")));
        assert_eq!(
            replaced.to_string(),
            "new { name = \"m\", state = \"draft\" }"
        );
    }

    #[test]
    fn with_field_ignores_non_constructors() {
        let e = Expr::field("x").with_field("y", Expr::literal(1));
        assert_eq!(e, Expr::field("x"));
        assert_eq!(Expr::construct().to_string(), "new {}");
    }

    #[test]
    fn serde_shape_is_tagged() {
        let e = Expr::field("tenant").equals(Expr::param("current"));
        let value = serde_json::to_value(&e).expect("expr should serialize");
        assert_eq!(
            value,
            json!({
                "kind": "eq",
                "left": {"kind": "field", "path": "tenant"},
                "right": {"kind": "param", "name": "current"}
            })
        );
        let back: Expr = serde_json::from_value(value).expect("expr should deserialize");
        assert_eq!(back, e);
    }
}
