//! Tables: ordered rows over one domain with shared, reference-counted storage.
//!
//! A table owns a list of physical row slots into a [`RowStore`]. Views
//! (slices, selections, projections) share the store and keep their own
//! slot list, column projection and weights. Writes through any sharer are
//! visible to all; only the row order and membership are private.
//!
//! ```text
//! Table (owner) ─┬─ rows: [3, 0, 1]     ─┐
//!                │                        ├─► Arc<RwLock<RowStore>>
//! Table (view)  ─┴─ rows: [0, 1], pins ──┘
//! ```

mod checksum;
mod mutate;
mod views;

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::buffer::NumericBuffer;
use crate::domain::{Domain, MetaId, Slot};
use crate::error::{DataError, Result};
use crate::example::{Example, RowId, check_row, native_value};
use crate::key::Key;
use crate::lock::{Lock, Pin};
use crate::storage::{MetaOverlay, Projection, RowStore, SharedStore, share};
use crate::value::Value;
use crate::variable::Variable;

pub use checksum::ChecksumParts;
pub use views::RowSelector;

/// A row with explicit identity, metas and weight, as restored from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    pub id: Option<RowId>,
    pub values: Vec<Value>,
    pub metas: BTreeMap<MetaId, Value>,
    pub weight: f64,
}

impl RowRecord {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            id: None,
            values,
            metas: BTreeMap::new(),
            weight: 1.0,
        }
    }
}

#[derive(Debug)]
pub struct Table {
    domain: Arc<Domain>,
    store: SharedStore,
    projection: Projection,
    rows: Vec<usize>,
    weights: Vec<f64>,
    lock: Lock,
    /// Locks of every table this one was derived from, root first.
    pins: Vec<Pin>,
    rng: ChaCha8Rng,
}

impl Table {
    /// An empty owning table.
    pub fn new(domain: Arc<Domain>) -> Self {
        Self::with_store(domain, share(RowStore::owned()), Vec::new())
    }

    fn with_store(domain: Arc<Domain>, store: SharedStore, rows: Vec<usize>) -> Self {
        let weights = vec![1.0; rows.len()];
        Self {
            domain,
            store,
            projection: Projection::identity(),
            rows,
            weights,
            lock: Lock::default(),
            pins: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    pub fn from_rows(domain: Arc<Domain>, rows: Vec<Vec<Value>>) -> Result<Self> {
        Self::from_records(domain, rows.into_iter().map(RowRecord::new).collect())
    }

    /// Builds an owning table from records; missing ids are minted.
    pub fn from_records(domain: Arc<Domain>, records: Vec<RowRecord>) -> Result<Self> {
        let mut store = RowStore::owned();
        let mut rows = Vec::with_capacity(records.len());
        let mut weights = Vec::with_capacity(records.len());
        for record in records {
            check_row(&domain, &record.values)?;
            let id = match record.id {
                Some(id) => {
                    RowId::observe(id);
                    id
                }
                None => RowId::mint(),
            };
            for meta in record.metas.keys() {
                MetaId::observe(*meta);
            }
            rows.push(store.push_row(id, record.values, record.metas)?);
            weights.push(record.weight);
        }
        let mut table = Self::with_store(domain, share(store), rows);
        table.weights = weights;
        Ok(table)
    }

    /// Owning table holding the rows of `examples` converted to `domain`.
    pub fn from_examples(domain: Arc<Domain>, examples: &[Example]) -> Result<Self> {
        let mut table = Self::new(domain);
        for example in examples {
            table.append(example)?;
        }
        Ok(table)
    }

    /// Owning copy of a numeric buffer; the domain is inferred when absent.
    pub fn from_buffer(buffer: &NumericBuffer, domain: Option<Arc<Domain>>) -> Result<Self> {
        let domain = match domain {
            Some(domain) => domain,
            None => Arc::new(buffer.infer_domain()?),
        };
        let columns = domain.variables().to_vec();
        let external = RowStore::external(buffer.clone(), columns)?;
        let (rows, _) = buffer.shape();
        let width = domain.len();
        let records = (0..rows)
            .map(|row| RowRecord::new(external.values(row, &Projection::identity(), width)))
            .collect();
        Self::from_records(domain, records)
    }

    /// Zero-copy table over `buffer`; writes reach the buffer and vice versa.
    ///
    /// The row count is fixed by the buffer, so appending or removing rows
    /// fails. Views of this table may still reorder their own rows.
    pub fn view_buffer(buffer: NumericBuffer, domain: Option<Arc<Domain>>) -> Result<Self> {
        let domain = match domain {
            Some(domain) => domain,
            None => Arc::new(buffer.infer_domain()?),
        };
        let columns = domain.variables().to_vec();
        let (rows, _) = buffer.shape();
        let store = RowStore::external(buffer, columns)?;
        Ok(Self::with_store(domain, share(store), (0..rows).collect()))
    }

    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether this table is a view sharing another table's storage.
    pub fn is_reference(&self) -> bool {
        !self.pins.is_empty()
    }

    pub fn is_external(&self) -> bool {
        self.store.read().is_external()
    }

    /// Outstanding rows and views derived from this table.
    pub fn references(&self) -> usize {
        self.lock.outstanding()
    }

    pub fn is_locked(&self) -> bool {
        self.references() > 0
    }

    pub fn shares_storage_with(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Whether this table was derived, directly or through other views, from `other`.
    pub fn is_view_of(&self, other: &Table) -> bool {
        self.pins.iter().any(|pin| pin.holds(&other.lock))
    }

    fn slot(&self, row: usize) -> Result<usize> {
        self.rows.get(row).copied().ok_or(DataError::IndexOutOfRange {
            index: i64::try_from(row).unwrap_or(i64::MAX),
            len: self.rows.len(),
        })
    }

    fn derived_pins(&self) -> Vec<Pin> {
        let mut pins = self.pins.clone();
        pins.push(self.lock.pin());
        pins
    }

    fn example_at(&self, slot: usize, pins: Vec<Pin>) -> Example {
        Example::indirect(
            Arc::clone(&self.domain),
            Arc::clone(&self.store),
            slot,
            self.projection.clone(),
            pins,
        )
    }

    /// A short-lived window on a row that does not lock the table.
    pub(crate) fn peek(&self, row: usize) -> Result<Example> {
        Ok(self.example_at(self.slot(row)?, Vec::new()))
    }

    /// An indirect example for `row`; the table stays locked while it lives.
    pub fn row(&self, row: usize) -> Result<Example> {
        Ok(self.example_at(self.slot(row)?, self.derived_pins()))
    }

    /// Indirect examples in row order.
    pub fn iter(&self) -> impl Iterator<Item = Example> + '_ {
        self.rows
            .iter()
            .map(|&slot| self.example_at(slot, self.derived_pins()))
    }

    pub fn get(&self, row: usize, key: impl Into<Key>) -> Result<Value> {
        self.peek(row)?.get(key)
    }

    /// Writes through to the shared storage; allowed while locked.
    pub fn set(&self, row: usize, key: impl Into<Key>, value: Value) -> Result<()> {
        self.peek(row)?.set(key, value)
    }

    pub fn values(&self, row: usize) -> Result<Vec<Value>> {
        let slot = self.slot(row)?;
        Ok(self
            .store
            .read()
            .values(slot, &self.projection, self.domain.len()))
    }

    pub fn id(&self, row: usize) -> Result<RowId> {
        let slot = self.slot(row)?;
        Ok(self.store.read().id(slot))
    }

    pub fn ids(&self) -> Vec<RowId> {
        let store = self.store.read();
        self.rows.iter().map(|&slot| store.id(slot)).collect()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight(&self, row: usize) -> Result<f64> {
        self.slot(row)?;
        Ok(self.weights[row])
    }

    pub fn set_weight(&mut self, row: usize, weight: f64) -> Result<()> {
        self.slot(row)?;
        self.weights[row] = weight;
        Ok(())
    }

    /// Assigns the same weight to every row.
    pub fn set_weights(&mut self, weight: f64) {
        self.weights.iter_mut().for_each(|w| *w = weight);
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Whether any attribute value is undefined.
    pub fn has_missing(&self) -> bool {
        let attributes = self.domain.attributes().len();
        let store = self.store.read();
        self.rows.iter().any(|&slot| {
            (0..attributes).any(|c| store.value(slot, self.projection.physical(c)).is_undefined())
        })
    }

    /// Whether any class value is undefined; `false` without a class.
    pub fn has_missing_class(&self) -> bool {
        if !self.domain.has_class() {
            return false;
        }
        let column = self.projection.physical(self.domain.len() - 1);
        let store = self.store.read();
        self.rows
            .iter()
            .any(|&slot| store.value(slot, column).is_undefined())
    }

    /// Registers a meta attribute on this table's domain.
    ///
    /// Views derived earlier keep the domain they were built with.
    pub fn add_meta_attribute(&mut self, variable: Variable, optional: bool) -> MetaId {
        Arc::make_mut(&mut self.domain).add_meta_variable(variable, optional)
    }

    /// Sets meta `id` to `value` on every row.
    pub fn add_meta_value(&self, id: MetaId, value: Value) -> Result<()> {
        if let Some(meta) = self.domain.meta_by_id(id) {
            meta.variable.check(&value)?;
        }
        let mut store = self.store.write();
        for &slot in &self.rows {
            store.metas_mut(slot).insert(id, value.clone());
        }
        Ok(())
    }

    /// Removes meta `id` from every row.
    pub fn remove_meta_value(&self, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        let id = match &key {
            Key::Meta(id) => *id,
            _ => match self.domain.resolve(&key)? {
                Slot::Meta(id) => id,
                Slot::Column(_) => {
                    return Err(DataError::WrongKeyType {
                        key: key.to_string(),
                        context: "remove a meta value",
                    });
                }
            },
        };
        let mut store = self.store.write();
        for &slot in &self.rows {
            store.metas_mut(slot).remove(&id);
        }
        Ok(())
    }

    /// A uniformly drawn row as an indirect example.
    pub fn random_example<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Example> {
        if self.rows.is_empty() {
            return Err(DataError::invalid("cannot draw a row from an empty table"));
        }
        self.row(rng.gen_range(0..self.rows.len()))
    }

    /// Decoded rows for export.
    pub fn native(&self) -> Vec<Vec<serde_json::Value>> {
        let store = self.store.read();
        let variables = self.domain.variables();
        self.rows
            .iter()
            .map(|&slot| {
                variables
                    .iter()
                    .enumerate()
                    .map(|(c, v)| native_value(v, &store.value(slot, self.projection.physical(c))))
                    .collect()
            })
            .collect()
    }

    /// Rows as records, for persistence.
    pub fn records(&self) -> Vec<RowRecord> {
        let store = self.store.read();
        self.rows
            .iter()
            .zip(&self.weights)
            .map(|(&slot, &weight)| RowRecord {
                id: Some(store.id(slot)),
                values: store.values(slot, &self.projection, self.domain.len()),
                metas: store.metas(slot).clone(),
                weight,
            })
            .collect()
    }

    fn meta_overlay(&self, slot: usize) -> MetaOverlay {
        self.store.read().metas(slot).clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::example::ReferenceType;

    pub(crate) fn small_table() -> Table {
        let domain = Domain::new(
            vec![Variable::continuous("x"), Variable::continuous("y")],
            Some(Variable::discrete("c", ["a", "b"])),
        )
        .expect("domain should build");
        let rows = (0..5)
            .map(|i| {
                let x = f64::from(i);
                vec![
                    Value::Continuous(x),
                    Value::Continuous(10.0 * x),
                    Value::Discrete(i % 2),
                ]
            })
            .collect();
        Table::from_rows(Arc::new(domain), rows).expect("rows should fit")
    }

    #[test]
    fn rows_are_indirect_and_lock() {
        let table = small_table();
        let mut row = table.row(1).expect("row");
        assert_eq!(row.reference_type(), ReferenceType::Indirect);
        assert!(table.is_locked());
        row.set("x", Value::Continuous(7.0)).expect("write through");
        assert_eq!(table.get(1, "x").expect("get"), Value::Continuous(7.0));
        drop(row);
        assert!(!table.is_locked());
    }

    #[test]
    fn set_checks_types() {
        let table = small_table();
        let err = table.set(0, "x", Value::from("text")).expect_err("type");
        assert_eq!(err.kind(), ErrorKind::Type);
        let err = table.get(9, "x").expect_err("range");
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn weights_default_to_one() {
        let mut table = small_table();
        assert_eq!(table.total_weight(), 5.0);
        table.set_weights(0.5);
        table.set_weight(0, 2.0).expect("in range");
        assert_eq!(table.total_weight(), 4.0);
    }

    #[test]
    fn missing_queries() {
        let table = small_table();
        assert!(!table.has_missing());
        assert!(!table.has_missing_class());
        table.set(2, "c", Value::Undefined).expect("set");
        assert!(table.has_missing_class());
        assert!(!table.has_missing());

        let classless = Domain::new(vec![Variable::continuous("x")], None).expect("domain");
        let table = Table::from_rows(Arc::new(classless), vec![vec![Value::Undefined]])
            .expect("rows");
        assert!(table.has_missing());
        assert!(!table.has_missing_class());
    }

    #[test]
    fn meta_values_across_rows() {
        let mut table = small_table();
        let id = table.add_meta_attribute(Variable::string("tag"), true);
        table.add_meta_value(id, Value::from("t")).expect("add");
        assert_eq!(table.get(3, "tag").expect("meta"), Value::from("t"));
        table.remove_meta_value("tag").expect("remove");
        assert_eq!(table.get(3, "tag").expect("registered"), Value::Undefined);
        assert!(table.add_meta_value(id, Value::Continuous(1.0)).is_err());
    }

    #[test]
    fn buffer_copy_and_view() {
        let buffer = NumericBuffer::new(2, 2, vec![0.5, 1.0, 1.5, 0.0]).expect("shape");
        let copy = Table::from_buffer(&buffer, None).expect("copy");
        let view = Table::view_buffer(buffer.clone(), None).expect("view");
        assert!(view.is_external());
        assert!(!copy.is_external());

        view.set(0, 0i64, Value::Continuous(9.0)).expect("write");
        assert_eq!(buffer.get(0, 0), Some(9.0));
        assert_eq!(copy.get(0, 0i64).expect("get"), Value::Continuous(0.5));

        buffer.set(1, 1, 1.0).expect("write");
        assert_eq!(view.get(1, "a2").expect("get"), Value::Discrete(1));
        buffer.set(1, 1, 0.5).expect("write");
        assert_eq!(view.get(1, "a2").expect("get"), Value::Undefined);
        buffer.set(1, 1, 7.0).expect("write");
        assert_eq!(view.get(1, "a2").expect("get"), Value::Undefined);
    }

    #[test]
    fn nan_cells_are_rejected() {
        let table = small_table();
        assert!(table.set(0, "x", Value::Continuous(f64::NAN)).is_err());
        table.set(0, "x", Value::continuous(f64::NAN)).expect("folds to undefined");
        assert_eq!(table.get(0, "x").expect("get"), Value::Undefined);
    }

    #[test]
    fn native_rows() {
        let table = small_table();
        let native = table.native();
        assert_eq!(native.len(), 5);
        assert_eq!(native[1][2], serde_json::json!("b"));

        table.set(1, "y", Value::Undefined).expect("set");
        let head = table.range(0..2).expect("range").native();
        insta::assert_json_snapshot!(head, @r#"
        [
          [
            0.0,
            0.0,
            "a"
          ],
          [
            1.0,
            null,
            "b"
          ]
        ]
        "#);
    }
}
