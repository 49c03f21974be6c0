//! Keys addressing variables, meta attributes and rows.

use std::fmt;

use crate::domain::MetaId;
use crate::variable::{VarId, Variable};

/// One key form accepted by every lookup in [`Domain`](crate::domain::Domain),
/// [`Example`](crate::example::Example) and [`Table`](crate::table::Table).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Position, negative counts from the end.
    Position(i64),
    /// Variable or meta attribute name.
    Name(String),
    /// Variable identity.
    Var(VarId),
    /// Meta attribute id.
    Meta(MetaId),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(i) => write!(f, "position {i}"),
            Self::Name(name) => write!(f, "'{name}'"),
            Self::Var(id) => write!(f, "{id}"),
            Self::Meta(id) => write!(f, "{id}"),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Position(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Self::Position(i64::from(i))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Position(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&Variable> for Key {
    fn from(variable: &Variable) -> Self {
        Self::Var(variable.id())
    }
}

impl From<MetaId> for Key {
    fn from(id: MetaId) -> Self {
        Self::Meta(id)
    }
}

/// Resolves a Python-style `start:stop:step` slice against a length.
///
/// Returns the selected positions in order; a zero step is rejected by
/// returning `None`.
pub(crate) fn slice_positions(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: i64,
) -> Option<Vec<usize>> {
    if step == 0 {
        return None;
    }
    let n = i64::try_from(len).ok()?;
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + n } else { bound };
        bound.clamp(low, high)
    };
    let mut positions = Vec::new();
    if step > 0 {
        let mut i = start.map_or(0, |s| clamp(s, 0, n));
        let end = stop.map_or(n, |s| clamp(s, 0, n));
        while i < end {
            positions.push(usize::try_from(i).ok()?);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        let mut i = start.map_or(n - 1, |s| clamp(s, -1, n - 1));
        let end = stop.map_or(-1, |s| clamp(s, -1, n - 1));
        while i > end {
            positions.push(usize::try_from(i).ok()?);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    }
    Some(positions)
}
