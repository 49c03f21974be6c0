//! Externally owned rectangular numeric buffers.
//!
//! A [`NumericBuffer`] is a shared handle: cloning it shares the same cells,
//! which is how a table built as a zero-copy view and the caller keep seeing
//! each other's writes. Missing values are stored as NaN; discrete values
//! as their code.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::Domain;
use crate::error::{DataError, Result};
use crate::variable::Variable;

/// Columns with more distinct codes than this are read as continuous.
const MAX_INFERRED_CODES: usize = 10;

#[derive(Debug, Clone)]
pub struct NumericBuffer {
    cells: Arc<RwLock<Vec<f64>>>,
    rows: usize,
    columns: usize,
}

impl NumericBuffer {
    /// Wraps row-major `data` of shape `rows` x `columns`.
    pub fn new(rows: usize, columns: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(columns) != Some(data.len()) {
            return Err(DataError::invalid(format!(
                "buffer of {} cells does not have shape {rows}x{columns}",
                data.len()
            )));
        }
        Ok(Self {
            cells: Arc::new(RwLock::new(data)),
            rows,
            columns,
        })
    }

    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self {
            cells: Arc::new(RwLock::new(vec![0.0; rows * columns])),
            rows,
            columns,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.offset(row, column).map(|i| self.cells.read()[i])
    }

    pub fn set(&self, row: usize, column: usize, value: f64) -> Result<()> {
        let index = self.offset(row, column).ok_or(DataError::IndexOutOfRange {
            index: i64::try_from(row).unwrap_or(i64::MAX),
            len: self.rows,
        })?;
        self.cells.write()[index] = value;
        Ok(())
    }

    pub fn row(&self, row: usize) -> Option<Vec<f64>> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.columns;
        Some(self.cells.read()[start..start + self.columns].to_vec())
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.cells.read().clone()
    }

    /// Whether another handle (e.g. a table view) shares these cells.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.cells) > 1
    }

    fn offset(&self, row: usize, column: usize) -> Option<usize> {
        (row < self.rows && column < self.columns).then(|| row * self.columns + column)
    }

    /// Names columns `a1..aN` and types them from their contents.
    ///
    /// A column is discrete when all its defined cells are non-negative
    /// integers with at most ten distinct codes; its labels are `"0"` up to
    /// the largest code.
    pub fn infer_domain(&self) -> Result<Domain> {
        let cells = self.cells.read();
        let mut variables = Vec::with_capacity(self.columns);
        for column in 0..self.columns {
            let mut codes = BTreeSet::new();
            let mut discrete = true;
            for row in 0..self.rows {
                let x = cells[row * self.columns + column];
                if x.is_nan() {
                    continue;
                }
                if x < 0.0 || x.fract() != 0.0 || !x.is_finite() {
                    discrete = false;
                    break;
                }
                // Exact non-negative integer, checked above.
                codes.insert(x as u64);
                if codes.len() > MAX_INFERRED_CODES {
                    discrete = false;
                    break;
                }
            }
            let name = format!("a{}", column + 1);
            let variable = match codes.last() {
                Some(&max) if discrete => {
                    Variable::discrete(name, (0..=max).map(|code| code.to_string()))
                }
                _ => Variable::continuous(name),
            };
            variables.push(variable);
        }
        Domain::new(variables, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VarKind;

    #[test]
    fn clones_share_cells() {
        let buffer = NumericBuffer::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).expect("shape");
        let handle = buffer.clone();
        assert!(buffer.is_shared());
        handle.set(1, 0, 9.0).expect("in range");
        assert_eq!(buffer.get(1, 0), Some(9.0));
        assert_eq!(buffer.row(1), Some(vec![9.0, 4.0]));
        assert!(buffer.set(2, 0, 1.0).is_err());
    }

    #[test]
    fn shape_must_match() {
        assert!(NumericBuffer::new(2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn infers_small_integer_columns_as_discrete() {
        let buffer = NumericBuffer::new(
            3,
            3,
            vec![0.5, 0.0, 4.0, 1.5, 2.0, -1.0, f64::NAN, 1.0, 3.0],
        )
        .expect("shape");
        let domain = buffer.infer_domain().expect("domain");
        let kinds: Vec<VarKind> = domain.variables().iter().map(Variable::kind).collect();
        assert_eq!(
            kinds,
            vec![VarKind::Continuous, VarKind::Discrete, VarKind::Continuous]
        );
        assert_eq!(domain.variables()[1].values(), vec!["0", "1", "2"]);
        assert_eq!(domain.variables()[0].name(), "a1");
    }
}
