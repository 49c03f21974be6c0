//! Content checksum over a table's rows.

use super::Table;
use crate::hash::ContentHash;

/// Which parts of each row the checksum covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumParts {
    pub values: bool,
    pub metas: bool,
    pub weights: bool,
}

impl ChecksumParts {
    pub const VALUES: Self = Self {
        values: true,
        metas: false,
        weights: false,
    };

    pub const ALL: Self = Self {
        values: true,
        metas: true,
        weights: true,
    };
}

impl Default for ChecksumParts {
    fn default() -> Self {
        Self::VALUES
    }
}

impl Table {
    /// Hash of the selected parts of all rows, in row order.
    pub fn checksum(&self, parts: ChecksumParts) -> ContentHash {
        let store = self.store.read();
        let width = self.domain.len();
        let mut builder = ContentHash::builder();
        for (&slot, &weight) in self.rows.iter().zip(&self.weights) {
            if parts.values {
                for column in 0..width {
                    builder = builder.value(&store.value(slot, self.projection.physical(column)));
                }
            }
            if parts.metas {
                for (id, value) in store.metas(slot) {
                    builder = builder.meta(*id, value);
                }
            }
            if parts.weights {
                builder = builder.weight(weight);
            }
            builder = builder.end_row();
        }
        builder.finish()
    }
}
