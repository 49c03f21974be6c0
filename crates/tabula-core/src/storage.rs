//! Physical row storage shared between a table and everything derived from it.
//!
//! Rows are addressed by physical slot. Tables keep their own ordered list
//! of slots, so views, sorting and shuffling never move row data. Slots
//! freed by removal are recycled for later appends.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::NumericBuffer;
use crate::domain::MetaId;
use crate::error::{DataError, Result};
use crate::example::RowId;
use crate::value::Value;
use crate::variable::{VarKind, Variable};

pub(crate) type MetaOverlay = BTreeMap<MetaId, Value>;

pub(crate) type SharedStore = Arc<RwLock<RowStore>>;

pub(crate) fn share(store: RowStore) -> SharedStore {
    Arc::new(RwLock::new(store))
}

/// Maps a domain's column positions onto physical storage columns.
#[derive(Debug, Clone, Default)]
pub(crate) struct Projection(Option<Arc<[usize]>>);

impl Projection {
    pub(crate) fn identity() -> Self {
        Self(None)
    }

    pub(crate) fn physical(&self, column: usize) -> usize {
        match &self.0 {
            Some(map) => map[column],
            None => column,
        }
    }

    /// Projection selecting `columns` (positions in this projection's space).
    pub(crate) fn compose(&self, columns: &[usize]) -> Self {
        let mapped: Vec<usize> = columns.iter().map(|&c| self.physical(c)).collect();
        Self(Some(mapped.into()))
    }
}

#[derive(Debug)]
enum Backing {
    Owned(Vec<Vec<Value>>),
    External {
        buffer: NumericBuffer,
        columns: Vec<Variable>,
    },
}

#[derive(Debug)]
pub(crate) struct RowStore {
    backing: Backing,
    ids: Vec<RowId>,
    metas: Vec<MetaOverlay>,
    free: Vec<usize>,
}

impl RowStore {
    pub(crate) fn owned() -> Self {
        Self {
            backing: Backing::Owned(Vec::new()),
            ids: Vec::new(),
            metas: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Rows read from and written to `buffer`; `columns` gives each column's
    /// variable and so its encoding.
    pub(crate) fn external(buffer: NumericBuffer, columns: Vec<Variable>) -> Result<Self> {
        let (rows, width) = buffer.shape();
        if columns.len() != width {
            return Err(DataError::invalid(format!(
                "domain has {} variables but the buffer has {width} columns",
                columns.len()
            )));
        }
        if columns.iter().any(|v| v.kind() == VarKind::String) {
            return Err(DataError::invalid(
                "string variables cannot be stored in a numeric buffer",
            ));
        }
        Ok(Self {
            backing: Backing::External { buffer, columns },
            ids: (0..rows).map(|_| RowId::mint()).collect(),
            metas: vec![MetaOverlay::new(); rows],
            free: Vec::new(),
        })
    }

    pub(crate) fn is_external(&self) -> bool {
        matches!(self.backing, Backing::External { .. })
    }

    pub(crate) fn id(&self, row: usize) -> RowId {
        self.ids[row]
    }

    pub(crate) fn value(&self, row: usize, column: usize) -> Value {
        match &self.backing {
            Backing::Owned(rows) => rows[row].get(column).cloned().unwrap_or_default(),
            Backing::External { buffer, columns } => {
                let Some(x) = buffer.get(row, column) else {
                    return Value::Undefined;
                };
                let variable = &columns[column];
                match variable.kind() {
                    VarKind::Continuous => Value::continuous(x),
                    VarKind::Discrete => decode_code(x, variable.value_count()),
                    VarKind::String => Value::Undefined,
                }
            }
        }
    }

    pub(crate) fn set_value(&mut self, row: usize, column: usize, value: Value) -> Result<()> {
        match &mut self.backing {
            Backing::Owned(rows) => {
                let cells = &mut rows[row];
                if cells.len() <= column {
                    cells.resize(column + 1, Value::Undefined);
                }
                cells[column] = value;
                Ok(())
            }
            Backing::External { buffer, .. } => {
                let x = match value {
                    Value::Undefined => f64::NAN,
                    Value::Continuous(x) => x,
                    Value::Discrete(code) => f64::from(code),
                    Value::String(_) => {
                        return Err(DataError::invalid(
                            "a numeric buffer cannot hold string values",
                        ));
                    }
                };
                buffer.set(row, column, x)
            }
        }
    }

    pub(crate) fn values(&self, row: usize, projection: &Projection, width: usize) -> Vec<Value> {
        (0..width)
            .map(|c| self.value(row, projection.physical(c)))
            .collect()
    }

    pub(crate) fn metas(&self, row: usize) -> &MetaOverlay {
        &self.metas[row]
    }

    pub(crate) fn metas_mut(&mut self, row: usize) -> &mut MetaOverlay {
        &mut self.metas[row]
    }

    /// Stores a new row and returns its physical slot.
    pub(crate) fn push_row(
        &mut self,
        id: RowId,
        values: Vec<Value>,
        metas: MetaOverlay,
    ) -> Result<usize> {
        let Backing::Owned(rows) = &mut self.backing else {
            return Err(DataError::ExternalStorage {
                operation: "append rows",
            });
        };
        match self.free.pop() {
            Some(slot) => {
                rows[slot] = values;
                self.ids[slot] = id;
                self.metas[slot] = metas;
                Ok(slot)
            }
            None => {
                rows.push(values);
                self.ids.push(id);
                self.metas.push(metas);
                Ok(rows.len() - 1)
            }
        }
    }

    /// Frees a slot for reuse. Callers guarantee nothing else references it.
    pub(crate) fn release_row(&mut self, row: usize) {
        if let Backing::Owned(rows) = &mut self.backing {
            rows[row].clear();
            self.metas[row].clear();
            self.free.push(row);
        }
    }
}

/// A buffer cell as a discrete code: anything but an exact label index reads
/// as undefined.
fn decode_code(x: f64, labels: usize) -> Value {
    let in_range = x >= 0.0 && x < labels as f64 && x <= f64::from(i32::MAX);
    if in_range && x.fract() == 0.0 {
        // Exact non-negative integer below i32::MAX, checked above.
        Value::Discrete(x as i32)
    } else {
        Value::Undefined
    }
}
