//! Criterion expression trees
//!
//! A `Criterion` is an immutable boolean expression over field comparisons,
//! built from `FieldRef` handles and composed with `&` / `|`. The tree holds
//! literal values; turning them into placeholders is the parameterizer's job
//! (see [`params`]).

mod params;

pub use params::{parameterize, ParameterizedCriterion};

use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::value::SqlValue;

/// A reference to a column, optionally table-qualified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub table: Option<String>,
    pub column: String,
}

/// Shorthand for an unqualified column reference
pub fn col(column: &str) -> FieldRef {
    FieldRef {
        table: None,
        column: column.to_string(),
    }
}

impl FieldRef {
    /// A table-qualified column reference
    pub fn qualified(table: &str, column: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            column: column.to_string(),
        }
    }

    pub(crate) fn render(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", table, self.column),
            None => self.column.clone(),
        }
    }

    pub fn eq<V: Into<SqlValue>>(self, value: V) -> Criterion {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne<V: Into<SqlValue>>(self, value: V) -> Criterion {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt<V: Into<SqlValue>>(self, value: V) -> Criterion {
        self.compare(CompareOp::Gt, value)
    }

    pub fn gte<V: Into<SqlValue>>(self, value: V) -> Criterion {
        self.compare(CompareOp::Gte, value)
    }

    pub fn lt<V: Into<SqlValue>>(self, value: V) -> Criterion {
        self.compare(CompareOp::Lt, value)
    }

    pub fn lte<V: Into<SqlValue>>(self, value: V) -> Criterion {
        self.compare(CompareOp::Lte, value)
    }

    pub fn like(self, pattern: &str) -> Criterion {
        self.compare(CompareOp::Like, pattern)
    }

    pub fn not_like(self, pattern: &str) -> Criterion {
        self.compare(CompareOp::NotLike, pattern)
    }

    /// Set membership over the given values
    pub fn is_in<V: Into<SqlValue>>(self, values: impl IntoIterator<Item = V>) -> Criterion {
        Criterion::InSet {
            field: self,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V: Into<SqlValue>>(self, values: impl IntoIterator<Item = V>) -> Criterion {
        Criterion::InSet {
            field: self,
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// Inclusive range test
    pub fn between<V: Into<SqlValue>>(self, low: V, high: V) -> Criterion {
        Criterion::Between {
            field: self,
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn is_null(self) -> Criterion {
        Criterion::Null {
            field: self,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Criterion {
        Criterion::Null {
            field: self,
            negated: true,
        }
    }

    fn compare<V: Into<SqlValue>>(self, op: CompareOp, value: V) -> Criterion {
        Criterion::Compare {
            field: self,
            op,
            value: value.into(),
        }
    }
}

/// Comparison operators for leaf criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Ne => write!(f, "<>"),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
            CompareOp::Like => write!(f, "LIKE"),
            CompareOp::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

/// A boolean expression tree over field comparisons
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: SqlValue,
    },
    Between {
        field: FieldRef,
        low: SqlValue,
        high: SqlValue,
    },
    InSet {
        field: FieldRef,
        values: Vec<SqlValue>,
        negated: bool,
    },
    Null {
        field: FieldRef,
        negated: bool,
    },
    And(Box<Criterion>, Box<Criterion>),
    Or(Box<Criterion>, Box<Criterion>),
}

impl Criterion {
    /// Conjunction; `a & b` is equivalent
    pub fn and(self, other: Criterion) -> Criterion {
        Criterion::And(Box::new(self), Box::new(other))
    }

    /// Disjunction; `a | b` is equivalent
    pub fn or(self, other: Criterion) -> Criterion {
        Criterion::Or(Box::new(self), Box::new(other))
    }
}

impl BitAnd for Criterion {
    type Output = Criterion;

    fn bitand(self, rhs: Criterion) -> Criterion {
        self.and(rhs)
    }
}

impl BitOr for Criterion {
    type Output = Criterion;

    fn bitor(self, rhs: Criterion) -> Criterion {
        self.or(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_build_the_expected_leaves() {
        assert_eq!(
            col("id").eq(1),
            Criterion::Compare {
                field: col("id"),
                op: CompareOp::Eq,
                value: SqlValue::Int(1),
            }
        );
        assert_eq!(
            col("age").between(18, 65),
            Criterion::Between {
                field: col("age"),
                low: SqlValue::Int(18),
                high: SqlValue::Int(65),
            }
        );
        assert_eq!(
            col("company_id").is_in(vec![1i64, 2]),
            Criterion::InSet {
                field: col("company_id"),
                values: vec![SqlValue::Int(1), SqlValue::Int(2)],
                negated: false,
            }
        );
    }

    #[test]
    fn operators_compose_trees() {
        let combined = col("a").eq(1) & (col("b").gt(2) | col("c").is_null());
        match combined {
            Criterion::And(left, right) => {
                assert!(matches!(*left, Criterion::Compare { .. }));
                assert!(matches!(*right, Criterion::Or(_, _)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn qualified_fields_render_with_their_table() {
        assert_eq!(FieldRef::qualified("employee", "id").render(), "employee.id");
        assert_eq!(col("id").render(), "id");
    }
}
