//! Content hashing for change detection.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::MetaId;
use crate::value::Value;

/// SHA-256 digest, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn builder() -> ContentHashBuilder {
        ContentHashBuilder {
            hasher: Sha256::new(),
        }
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental hash over values in a stable order.
///
/// Numbers are fed as their exact bit patterns, so the digest changes
/// whenever a stored number does, however small the change.
pub struct ContentHashBuilder {
    hasher: Sha256,
}

impl ContentHashBuilder {
    pub fn value(mut self, value: &Value) -> Self {
        match value {
            Value::Undefined => self.hasher.update(b"u"),
            Value::Continuous(x) => {
                self.hasher.update(b"c");
                self.hasher.update(x.to_bits().to_le_bytes());
            }
            Value::Discrete(code) => {
                self.hasher.update(b"d");
                self.hasher.update(code.to_le_bytes());
            }
            Value::String(s) => {
                self.hasher.update(b"s");
                self.hasher.update((s.len() as u64).to_le_bytes());
                self.hasher.update(s.as_bytes());
            }
        }
        self
    }

    pub fn meta(mut self, id: MetaId, value: &Value) -> Self {
        self.hasher.update(b"m");
        self.hasher.update(id.0.to_le_bytes());
        self.value(value)
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.hasher.update(b"w");
        self.hasher.update(weight.to_bits().to_le_bytes());
        self
    }

    /// Marks a row boundary.
    pub fn end_row(mut self) -> Self {
        self.hasher.update(b"\n");
        self
    }

    pub fn finish(self) -> ContentHash {
        let hash = self.hasher.finalize();
        ContentHash(format!("{hash:x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_order_sensitive() {
        let a = Value::Continuous(1.0);
        let b = Value::from("x");
        let h1 = ContentHash::builder().value(&a).value(&b).finish();
        let h2 = ContentHash::builder().value(&a).value(&b).finish();
        let h3 = ContentHash::builder().value(&b).value(&a).finish();
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.0.len(), 64);
    }

    #[test]
    fn undefined_differs_from_zero() {
        let undefined = ContentHash::builder().value(&Value::Undefined).finish();
        let zero = ContentHash::builder().value(&Value::Continuous(0.0)).finish();
        assert_ne!(undefined, zero);
    }
}
