//! Error types for Tabula core operations.

use crate::variable::VarKind;

/// Errors arising from lookups, assignments and structural operations.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// A name, variable, meta id or row does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// A key of the wrong form was used (e.g. a meta id where a column is required).
    #[error("invalid key type: {key} cannot be used to {context}")]
    WrongKeyType { key: String, context: &'static str },

    /// A positional index lies outside the addressed sequence.
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    /// A value of the wrong kind was assigned to a slot.
    #[error("type mismatch for '{variable}': expected {expected:?} value, got {found}")]
    TypeMismatch {
        variable: String,
        expected: VarKind,
        found: &'static str,
    },

    /// Schema incompatibility or malformed arguments.
    #[error("invalid value: {0}")]
    Invalid(String),

    /// A statistic was requested from a distribution that cannot supply it.
    #[error("cannot compute {statistic}: {reason}")]
    Statistic {
        statistic: &'static str,
        reason: String,
    },

    /// A structural operation was attempted while rows or views are referenced.
    #[error("table is locked by {references} outstanding reference(s)")]
    Locked { references: usize },

    /// A structural operation was attempted on rows backed by an external buffer.
    #[error("cannot {operation}: rows are stored in an external buffer of fixed size")]
    ExternalStorage { operation: &'static str },
}

/// Coarse classification of [`DataError`] and downstream errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Lookup,
    Type,
    Value,
    Lock,
    Io,
}

impl DataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::WrongKeyType { .. } | Self::IndexOutOfRange { .. } => {
                ErrorKind::Lookup
            }
            Self::TypeMismatch { .. } => ErrorKind::Type,
            Self::Invalid(_) | Self::Statistic { .. } => ErrorKind::Value,
            Self::Locked { .. } | Self::ExternalStorage { .. } => ErrorKind::Lock,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub(crate) fn statistic(statistic: &'static str, reason: impl Into<String>) -> Self {
        Self::Statistic {
            statistic,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = DataError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_variants_share_a_kind() {
        assert_eq!(DataError::not_found("meta 3").kind(), ErrorKind::Lookup);
        let wrong = DataError::WrongKeyType {
            key: "meta #3".into(),
            context: "address a column",
        };
        assert_eq!(wrong.kind(), ErrorKind::Lookup);
        assert!(!matches!(wrong, DataError::NotFound { .. }));
    }

    #[test]
    fn messages_name_the_offender() {
        let err = DataError::Locked { references: 2 };
        assert_eq!(err.to_string(), "table is locked by 2 outstanding reference(s)");
        assert_eq!(err.kind(), ErrorKind::Lock);
    }
}
