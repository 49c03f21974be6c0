//! Reference counting behind the structural lock.
//!
//! Every table owns a [`Lock`]. Views and indirect examples derived from a
//! table carry a [`Pin`] on it (and on every table it was derived from);
//! dropping them releases the pin. A table with outstanding pins refuses
//! operations that reorder, insert or remove rows.

use std::sync::Arc;

use crate::error::{DataError, Result};

#[derive(Debug, Default)]
pub(crate) struct Lock(Arc<()>);

#[derive(Debug, Clone)]
pub(crate) struct Pin(Arc<()>);

impl Lock {
    pub(crate) fn pin(&self) -> Pin {
        Pin(Arc::clone(&self.0))
    }

    pub(crate) fn outstanding(&self) -> usize {
        Arc::strong_count(&self.0) - 1
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<()> {
        match self.outstanding() {
            0 => Ok(()),
            references => Err(DataError::Locked { references }),
        }
    }
}

impl Pin {
    pub(crate) fn holds(&self, lock: &Lock) -> bool {
        Arc::ptr_eq(&self.0, &lock.0)
    }
}
