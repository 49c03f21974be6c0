//! Structural mutation: operations that change row order or membership.
//!
//! Every operation here first checks the table's lock. Owning tables also
//! refuse when their rows live in an external buffer.

use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;

use super::Table;
use crate::domain::Scope;
use crate::error::{DataError, Result};
use crate::example::{Example, RowId, check_row};
use crate::filter::Filter;
use crate::key::Key;
use crate::value::Value;

impl Table {
    fn ensure_structural(&self, operation: &'static str) -> Result<()> {
        self.lock.ensure_unlocked()?;
        if !self.is_reference() && self.store.read().is_external() {
            return Err(DataError::ExternalStorage { operation });
        }
        Ok(())
    }

    /// Appends a row and returns its id.
    ///
    /// An owning table stores a converted copy under a fresh id. A reference
    /// table can only take rows that already live in its storage.
    pub fn append(&mut self, example: &Example) -> Result<RowId> {
        self.ensure_structural("append rows")?;
        if self.is_reference() {
            let slot = example.points_into(&self.store).ok_or_else(|| {
                DataError::invalid("a reference table can only hold rows of the storage it views")
            })?;
            self.rows.push(slot);
            self.weights.push(1.0);
            return Ok(example.id());
        }

        let values = if Arc::ptr_eq(example.domain(), &self.domain) {
            example.values()
        } else {
            self.domain.convert(example)
        };
        check_row(&self.domain, &values)?;
        let metas = example.meta_overlay();
        let id = RowId::mint();
        let slot = self.store.write().push_row(id, values, metas)?;
        self.rows.push(slot);
        self.weights.push(1.0);
        Ok(id)
    }

    /// Appends every row of `other`, weights included.
    ///
    /// An owning table cannot be extended by a view of its own storage.
    pub fn extend(&mut self, other: &Table) -> Result<()> {
        let shared = self.shares_storage_with(other);
        if !self.is_reference() && shared {
            return Err(DataError::invalid(
                "cannot extend a table with a view of its own rows",
            ));
        }
        self.ensure_structural("extend")?;
        if self.is_reference() {
            if !shared {
                return Err(DataError::invalid(
                    "a reference table can only be extended with rows of the storage it views",
                ));
            }
            self.rows.extend_from_slice(&other.rows);
            self.weights.extend_from_slice(&other.weights);
            return Ok(());
        }

        let same_domain = Arc::ptr_eq(&other.domain, &self.domain);
        for position in 0..other.len() {
            let example = other.peek(position)?;
            let values = if same_domain {
                example.values()
            } else {
                self.domain.convert(&example)
            };
            check_row(&self.domain, &values)?;
            let metas = example.meta_overlay();
            let slot = self.store.write().push_row(RowId::mint(), values, metas)?;
            self.rows.push(slot);
            self.weights.push(other.weights[position]);
        }
        log::debug!("extended table by {} rows", other.len());
        Ok(())
    }

    /// Keeps the rows for which `keep(position)` holds, freeing the others.
    fn retain_positions(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let owner = !self.is_reference();
        let mut rows = Vec::with_capacity(self.rows.len());
        let mut weights = Vec::with_capacity(self.rows.len());
        let mut store = self.store.write();
        for (position, (&slot, &weight)) in self.rows.iter().zip(&self.weights).enumerate() {
            if keep(position) {
                rows.push(slot);
                weights.push(weight);
            } else if owner {
                store.release_row(slot);
            }
        }
        drop(store);
        self.rows = rows;
        self.weights = weights;
    }

    pub fn remove(&mut self, row: usize) -> Result<()> {
        self.ensure_structural("remove rows")?;
        self.slot(row)?;
        self.retain_positions(|position| position != row);
        Ok(())
    }

    pub fn remove_range(&mut self, range: Range<usize>) -> Result<()> {
        self.ensure_structural("remove rows")?;
        if range.start > range.end || range.end > self.len() {
            return Err(DataError::IndexOutOfRange {
                index: i64::try_from(range.end).unwrap_or(i64::MAX),
                len: self.len(),
            });
        }
        self.retain_positions(|position| !range.contains(&position));
        Ok(())
    }

    pub fn remove_rows(&mut self, rows: &[usize]) -> Result<()> {
        self.ensure_structural("remove rows")?;
        for &row in rows {
            self.slot(row)?;
        }
        self.retain_positions(|position| !rows.contains(&position));
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_structural("clear")?;
        self.retain_positions(|_| false);
        Ok(())
    }

    /// Removes the rows that do not satisfy `filter`.
    pub fn filter_in_place(&mut self, filter: &Filter) -> Result<()> {
        self.ensure_structural("filter rows")?;
        let mut keep = Vec::with_capacity(self.len());
        for position in 0..self.len() {
            keep.push(filter.matches(&self.peek(position)?)?);
        }
        self.retain_positions(|position| keep[position]);
        Ok(())
    }

    fn permute(&mut self, order: &[usize]) {
        self.rows = order.iter().map(|&p| self.rows[p]).collect();
        self.weights = order.iter().map(|&p| self.weights[p]).collect();
    }

    /// Stable sort by all variables in domain order.
    pub fn sort(&mut self) -> Result<()> {
        let keys: Vec<Key> = (0..self.domain.len()).map(Key::from).collect();
        self.sort_by(&keys)
    }

    /// Stable lexicographic sort by the given columns.
    pub fn sort_by(&mut self, keys: &[Key]) -> Result<()> {
        self.ensure_structural("sort")?;
        let columns = keys
            .iter()
            .map(|key| self.domain.position(key, Scope::Variables))
            .collect::<Result<Vec<_>>>()?;
        let sort_keys: Vec<Vec<Value>> = {
            let store = self.store.read();
            self.rows
                .iter()
                .map(|&slot| {
                    columns
                        .iter()
                        .map(|&c| store.value(slot, self.projection.physical(c)))
                        .collect()
                })
                .collect()
        };
        let variables = self.domain.variables();
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            columns
                .iter()
                .enumerate()
                .map(|(k, &c)| variables[c].compare(&sort_keys[a][k], &sort_keys[b][k]))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        self.permute(&order);
        Ok(())
    }

    /// Shuffles rows with the table's own generator; repeatable across runs.
    pub fn shuffle(&mut self) -> Result<()> {
        self.ensure_structural("shuffle")?;
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.shuffle(&mut self.rng);
        self.permute(&order);
        Ok(())
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.ensure_structural("shuffle")?;
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.shuffle(rng);
        self.permute(&order);
        Ok(())
    }

    /// Sorts, then merges rows with equal values (metas ignored).
    ///
    /// The first row of each run is kept and gains the meta values it lacks
    /// from the merged rows. With `merge_weights` it also takes their weights.
    pub fn remove_duplicates(&mut self, merge_weights: bool) -> Result<()> {
        self.ensure_structural("remove duplicates")?;
        self.sort()?;
        let width = self.domain.len();
        let values: Vec<Vec<Value>> = {
            let store = self.store.read();
            self.rows
                .iter()
                .map(|&slot| store.values(slot, &self.projection, width))
                .collect()
        };
        let variables = self.domain.variables();
        let equal = |a: &[Value], b: &[Value]| {
            variables
                .iter()
                .zip(a.iter().zip(b))
                .all(|(v, (x, y))| v.values_equal(x, y))
        };

        let mut keep = vec![true; self.rows.len()];
        let mut kept = 0;
        {
            let mut store = self.store.write();
            for position in 1..self.rows.len() {
                if equal(&values[kept], &values[position]) {
                    keep[position] = false;
                    if merge_weights {
                        self.weights[kept] += self.weights[position];
                    }
                    let extra = store.metas(self.rows[position]).clone();
                    let target = store.metas_mut(self.rows[kept]);
                    for (id, value) in extra {
                        target.entry(id).or_insert(value);
                    }
                } else {
                    kept = position;
                }
            }
        }
        let removed = keep.iter().filter(|k| !**k).count();
        self.retain_positions(|position| keep[position]);
        log::debug!("removed {removed} duplicate rows");
        Ok(())
    }
}
