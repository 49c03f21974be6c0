//! Reader settings, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tabula_core::MakeStatus;
use tabula_core::variable::is_undefined_token;

use crate::error::ReadError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Column separator; chosen from the file extension when unset.
    pub delimiter: Option<char>,
    /// Tokens read as undefined in addition to the built-in ones.
    pub missing_tokens: Vec<String>,
    /// Registry policy for columns whose name is already known.
    pub create_new_on: MakeStatus,
    /// Untyped columns with more distinct values than this may become strings.
    pub max_discrete_values: usize,
    /// Do not turn the last column into the class.
    pub no_class: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            missing_tokens: Vec::new(),
            create_new_on: MakeStatus::Incompatible,
            max_discrete_values: 20,
            no_class: false,
        }
    }
}

impl ReaderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ReadError> {
        toml::from_str(text).map_err(|e| ReadError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ReadError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// The configured delimiter, else comma for `.csv` and tab otherwise.
    pub fn delimiter_for(&self, path: &Path) -> char {
        if let Some(delimiter) = self.delimiter {
            return delimiter;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ',',
            _ => '\t',
        }
    }

    pub fn is_missing(&self, token: &str) -> bool {
        let token = token.trim();
        is_undefined_token(token) || self.missing_tokens.iter().any(|m| m == token)
    }
}
