//! Views, translation, sampling and copies.

use std::ops::Range;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{RowRecord, Table};
use crate::domain::{ClassSpec, Domain};
use crate::error::{DataError, Result};
use crate::example::{Example, RowId, check_row};
use crate::filter::Filter;
use crate::key::{Key, slice_positions};
use crate::lock::Lock;
use crate::storage::Projection;

/// Row selection forms accepted by [`Table::select`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowSelector {
    /// `start:stop:step`, negative bounds count from the end.
    Range {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
    /// Explicit positions, negative counts from the end.
    Indices(Vec<i64>),
    Filter(Filter),
}

impl Table {
    fn view(&self, positions: &[usize], domain: Arc<Domain>, projection: Projection) -> Table {
        Table {
            domain,
            store: Arc::clone(&self.store),
            projection,
            rows: positions.iter().map(|&p| self.rows[p]).collect(),
            weights: positions.iter().map(|&p| self.weights[p]).collect(),
            lock: Lock::default(),
            pins: self.derived_pins(),
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    fn same_view(&self, positions: &[usize]) -> Table {
        self.view(positions, Arc::clone(&self.domain), self.projection.clone())
    }

    /// A reference view of the selected rows.
    pub fn select(&self, selector: &RowSelector) -> Result<Table> {
        match selector {
            RowSelector::Range { start, stop, step } => self.slice(*start, *stop, *step),
            RowSelector::Indices(indices) => self.select_rows(indices),
            RowSelector::Filter(filter) => self.filter(filter),
        }
    }

    pub fn slice(&self, start: Option<i64>, stop: Option<i64>, step: i64) -> Result<Table> {
        let positions = slice_positions(self.len(), start, stop, step)
            .ok_or_else(|| DataError::invalid("slice step cannot be zero"))?;
        Ok(self.same_view(&positions))
    }

    pub fn range(&self, range: Range<usize>) -> Result<Table> {
        if range.start > range.end || range.end > self.len() {
            return Err(DataError::IndexOutOfRange {
                index: i64::try_from(range.end).unwrap_or(i64::MAX),
                len: self.len(),
            });
        }
        let positions: Vec<usize> = range.collect();
        Ok(self.same_view(&positions))
    }

    pub fn select_rows(&self, indices: &[i64]) -> Result<Table> {
        let len = i64::try_from(self.len()).unwrap_or(i64::MAX);
        let positions = indices
            .iter()
            .map(|&index| {
                let absolute = if index < 0 { index + len } else { index };
                usize::try_from(absolute)
                    .ok()
                    .filter(|&p| p < self.len())
                    .ok_or(DataError::IndexOutOfRange {
                        index,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.same_view(&positions))
    }

    pub fn filter(&self, filter: &Filter) -> Result<Table> {
        let mut positions = Vec::new();
        for position in 0..self.len() {
            if filter.matches(&self.peek(position)?)? {
                positions.push(position);
            }
        }
        Ok(self.same_view(&positions))
    }

    pub fn filter_by<F>(&self, mut predicate: F) -> Result<Table>
    where
        F: FnMut(&Example) -> bool,
    {
        let mut positions = Vec::new();
        for position in 0..self.len() {
            if predicate(&self.peek(position)?) {
                positions.push(position);
            }
        }
        Ok(self.same_view(&positions))
    }

    /// This table under another domain.
    ///
    /// When every target variable is a column of this table the result is a
    /// reference view with a different column projection. Otherwise values
    /// are computed into a new owning table: from metas, from compute
    /// functions, or undefined. Row ids are kept either way.
    pub fn translate(&self, domain: impl Into<Arc<Domain>>) -> Result<Table> {
        let domain = domain.into();
        if Arc::ptr_eq(&domain, &self.domain) {
            return Ok(self.same_view(&(0..self.len()).collect::<Vec<_>>()));
        }
        if let Some(columns) = domain.projection_of(&self.domain) {
            let projection = self.projection.compose(&columns);
            log::debug!("translation to {} columns is a projection", columns.len());
            return Ok(self.view(&(0..self.len()).collect::<Vec<_>>(), domain, projection));
        }
        log::debug!("translation requires computing {} rows", self.len());
        self.copy_positions(&(0..self.len()).collect::<Vec<_>>(), domain, false)
    }

    /// Translates to a domain built from keys resolved against this table's domain.
    pub fn translate_keys(&self, keys: &[Key], class: ClassSpec) -> Result<Table> {
        let domain = Domain::select(&self.domain, keys, class)?;
        self.translate(domain)
    }

    /// An owning copy with freshly minted row ids.
    pub fn deep_copy(&self) -> Result<Table> {
        let positions: Vec<usize> = (0..self.len()).collect();
        self.copy_positions(&positions, Arc::clone(&self.domain), true)
    }

    /// Rows whose fold index equals `selected_fold`, or is non-zero when
    /// `selected_fold` is negative.
    ///
    /// Folds beyond the end of `folds` are not selected. A fold list longer
    /// than the table is rejected.
    pub fn sample(&self, folds: &[i64], selected_fold: i64, copy: bool) -> Result<Table> {
        if folds.len() > self.len() {
            return Err(DataError::invalid(format!(
                "length of the fold list exceeds the number of rows ({} > {})",
                folds.len(),
                self.len()
            )));
        }
        let positions: Vec<usize> = folds
            .iter()
            .enumerate()
            .filter(|&(_, &fold)| {
                if selected_fold >= 0 {
                    fold == selected_fold
                } else {
                    fold != 0
                }
            })
            .map(|(position, _)| position)
            .collect();
        if copy {
            self.copy_positions(&positions, Arc::clone(&self.domain), true)
        } else {
            Ok(self.same_view(&positions))
        }
    }

    fn copy_positions(
        &self,
        positions: &[usize],
        domain: Arc<Domain>,
        fresh_ids: bool,
    ) -> Result<Table> {
        let same_domain = Arc::ptr_eq(&domain, &self.domain);
        let mut records = Vec::with_capacity(positions.len());
        for &position in positions {
            let example = self.peek(position)?;
            let values = if same_domain {
                example.values()
            } else {
                domain.convert(&example)
            };
            check_row(&domain, &values)?;
            let slot = self.rows[position];
            records.push(RowRecord {
                id: Some(if fresh_ids {
                    RowId::mint()
                } else {
                    example.id()
                }),
                values,
                metas: self.meta_overlay(slot),
                weight: self.weights[position],
            });
        }
        Table::from_records(domain, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::small_table;
    use crate::value::Value;
    use crate::variable::{ComputeValue, VarKind, Variable, VariableBuilder};

    #[test]
    fn slices_alias_storage_through_nesting() {
        let table = small_table();
        let outer = table.slice(Some(1), Some(5), 1).expect("slice");
        let inner = outer.slice(Some(1), None, 2).expect("nested slice");
        assert_eq!(inner.len(), 2);
        assert!(inner.is_view_of(&outer));
        assert!(inner.is_view_of(&table));

        inner.set(0, "x", Value::Continuous(42.0)).expect("write");
        assert_eq!(table.get(2, "x").expect("get"), Value::Continuous(42.0));
        assert_eq!(outer.get(1, "x").expect("get"), Value::Continuous(42.0));

        table.set(4, "y", Value::Continuous(-1.0)).expect("write");
        assert_eq!(inner.get(1, "y").expect("get"), Value::Continuous(-1.0));
        assert_eq!(inner.ids(), vec![table.id(2).expect("id"), table.id(4).expect("id")]);
    }

    #[test]
    fn selections_by_index_and_filter() {
        let table = small_table();
        let picked = table.select_rows(&[-1, 0]).expect("indices");
        assert_eq!(picked.get(0, "x").expect("get"), Value::Continuous(4.0));
        assert!(table.select_rows(&[5]).is_err());

        let odd = table
            .select(&RowSelector::Filter(Filter::equals("c", Value::Discrete(1))))
            .expect("filter");
        assert_eq!(odd.len(), 2);
        let big = table
            .filter_by(|ex| ex.get("y").ok().and_then(|v| v.as_f64()).is_some_and(|y| y > 25.0))
            .expect("closure filter");
        assert_eq!(big.len(), 2);
        assert!(table.slice(None, None, 0).is_err());
    }

    #[test]
    fn projection_translation_is_a_view() {
        let table = small_table();
        let projected = table
            .translate_keys(&[Key::from("y"), Key::from("x")], ClassSpec::None)
            .expect("translate");
        assert!(projected.is_reference());
        assert_eq!(projected.ids(), table.ids());
        projected.set(0, 0i64, Value::Continuous(3.5)).expect("write");
        assert_eq!(table.get(0, "y").expect("get"), Value::Continuous(3.5));

        let back = projected
            .translate(Arc::clone(table.domain()))
            .expect("translate back");
        for row in 0..table.len() {
            assert_eq!(
                back.get(row, "x").expect("get"),
                table.get(row, "x").expect("get")
            );
        }
    }

    #[test]
    fn computed_translation_copies() {
        let table = small_table();
        let x = table.domain().variables()[0].clone();
        let squared = VariableBuilder::new("x2", VarKind::Continuous)
            .compute(ComputeValue::new(|ex| {
                ex.get("x")
                    .ok()
                    .and_then(|v| v.as_f64())
                    .map_or(Value::Undefined, |x| Value::Continuous(x * x))
            }))
            .build();
        let target = Domain::new(vec![x, squared, Variable::string("note")], None).expect("domain");
        let computed = table.translate(target).expect("translate");
        assert!(!computed.is_reference());
        assert!(!computed.shares_storage_with(&table));
        assert_eq!(computed.ids(), table.ids());
        assert_eq!(computed.get(3, "x2").expect("get"), Value::Continuous(9.0));
        assert_eq!(computed.get(3, "note").expect("get"), Value::Undefined);

        computed.set(3, "x", Value::Continuous(0.0)).expect("write");
        assert_eq!(table.get(3, "x").expect("get"), Value::Continuous(3.0));
    }

    #[test]
    fn sampling_views_and_copies() {
        let table = small_table();
        let folds = [0, 1, 1, 0, 2];
        let ones = table.sample(&folds, 1, false).expect("sample");
        assert_eq!(ones.len(), 2);
        assert!(ones.is_reference());
        assert_eq!(ones.id(0).expect("id"), table.id(1).expect("id"));

        let nonzero = table.sample(&folds, -1, true).expect("sample");
        assert_eq!(nonzero.len(), 3);
        assert!(!nonzero.is_reference());
        assert_ne!(nonzero.id(0).expect("id"), table.id(1).expect("id"));

        let short = table.sample(&[1, 1], 1, false).expect("short fold list");
        assert_eq!(short.len(), 2);
        assert!(table.sample(&[0; 6], 0, false).is_err());
    }

    #[test]
    fn deep_copy_is_independent() {
        let table = small_table();
        let copy = table.deep_copy().expect("copy");
        assert!(!table.is_locked());
        copy.set(0, "x", Value::Continuous(100.0)).expect("write");
        assert_eq!(table.get(0, "x").expect("get"), Value::Continuous(0.0));
        assert!(copy.ids().iter().zip(table.ids()).all(|(a, b)| *a != b));
    }
}
