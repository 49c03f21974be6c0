//! Errors from reading and writing tables.

use tabula_core::{DataError, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("{path}: I/O error: {message}")]
    Io { path: String, message: String },

    #[error("line {line}: parse error: {message}")]
    Parse { line: usize, message: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid reader configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl ReadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } | Self::Serialize(_) | Self::Config(_) => ErrorKind::Value,
            Self::Data(err) => err.kind(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
