//! Row predicates for selection and in-place filtering.

use std::cmp::Ordering;

use crate::error::Result;
use crate::example::Example;
use crate::key::Key;
use crate::value::Value;

/// Comparison operators for [`Filter::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    /// Equality at the variable's precision.
    Eq,
    Ne,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
        }
    }
}

/// A row predicate. Undefined values never satisfy a comparison or a range.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare { key: Key, op: CompareOp, value: Value },
    /// Numeric value within `[min, max]`.
    Between { key: Key, min: f64, max: f64 },
    Defined(Key),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn compare(key: impl Into<Key>, op: CompareOp, value: Value) -> Self {
        Self::Compare {
            key: key.into(),
            op,
            value,
        }
    }

    pub fn equals(key: impl Into<Key>, value: Value) -> Self {
        Self::compare(key, CompareOp::Eq, value)
    }

    pub fn between(key: impl Into<Key>, min: f64, max: f64) -> Self {
        Self::Between {
            key: key.into(),
            min,
            max,
        }
    }

    pub fn defined(key: impl Into<Key>) -> Self {
        Self::Defined(key.into())
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn matches(&self, example: &Example) -> Result<bool> {
        match self {
            Self::Compare { key, op, value } => {
                let actual = example.get(key.clone())?;
                if actual.is_undefined() || value.is_undefined() {
                    return Ok(false);
                }
                let variable = example.domain().variable(key)?;
                Ok(op.accepts(variable.compare(&actual, value)))
            }
            Self::Between { key, min, max } => Ok(example
                .get(key.clone())?
                .as_f64()
                .is_some_and(|x| *min <= x && x <= *max)),
            Self::Defined(key) => Ok(example.get(key.clone())?.is_defined()),
            Self::And(filters) => {
                for filter in filters {
                    if !filter.matches(example)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(filters) => {
                for filter in filters {
                    if filter.matches(example)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(inner) => Ok(!inner.matches(example)?),
        }
    }
}
