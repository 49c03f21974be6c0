//! Single typed datum with an undefined state.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::variable::VarKind;

/// A value stored in a slot of an example.
///
/// `Continuous` never holds NaN: [`Value::continuous`] folds NaN into
/// `Undefined`, which is also how external numeric buffers encode a
/// missing value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Undefined,
    Continuous(f64),
    Discrete(i32),
    String(String),
}

impl Value {
    pub fn continuous(x: f64) -> Self {
        if x.is_nan() {
            Self::Undefined
        } else {
            Self::Continuous(x)
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_defined(&self) -> bool {
        !self.is_undefined()
    }

    /// The kind of variable this value fits, `None` for `Undefined`.
    pub fn var_kind(&self) -> Option<VarKind> {
        match self {
            Self::Undefined => None,
            Self::Continuous(_) => Some(VarKind::Continuous),
            Self::Discrete(_) => Some(VarKind::Discrete),
            Self::String(_) => Some(VarKind::String),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Continuous(_) => "continuous",
            Self::Discrete(_) => "discrete",
            Self::String(_) => "string",
        }
    }

    /// Numeric view: continuous values as-is, discrete codes widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Continuous(x) => Some(*x),
            Self::Discrete(code) => Some(f64::from(*code)),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<i32> {
        match self {
            Self::Discrete(code) => Some(*code),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Discrete(_) => 1,
            Self::Continuous(_) => 2,
            Self::String(_) => 3,
        }
    }

    /// Total order over values: undefined first, then by kind, then by content.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Continuous(a), Self::Continuous(b)) => a.total_cmp(b),
            (Self::Discrete(a), Self::Discrete(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::continuous(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_folds_into_undefined() {
        assert_eq!(Value::continuous(f64::NAN), Value::Undefined);
        assert_eq!(Value::from(2.5), Value::Continuous(2.5));
    }

    #[test]
    fn undefined_sorts_first() {
        let mut values = vec![
            Value::Continuous(1.0),
            Value::Undefined,
            Value::Continuous(-3.0),
        ];
        values.sort_by(Value::total_cmp);
        assert_eq!(
            values,
            vec![
                Value::Undefined,
                Value::Continuous(-3.0),
                Value::Continuous(1.0)
            ]
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&Value::Discrete(2)).expect("value should serialize");
        assert_eq!(json, r#"{"kind":"discrete","value":2}"#);
        let back: Value = serde_json::from_str(r#"{"kind":"undefined"}"#).expect("should parse");
        assert!(back.is_undefined());
    }
}
