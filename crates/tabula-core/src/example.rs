//! Rows: owning examples and indirect windows into a table's storage.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::domain::{Domain, MetaId, Slot};
use crate::error::{DataError, Result};
use crate::key::Key;
use crate::lock::Pin;
use crate::storage::{MetaOverlay, Projection, SharedStore};
use crate::value::Value;
use crate::variable::{VarKind, Variable};

/// Stable row identity, kept through slicing and translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

static NEXT_ROW_ID: AtomicU64 = AtomicU64::new(1);

impl RowId {
    pub fn mint() -> Self {
        Self(NEXT_ROW_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Keeps future mints clear of an id restored from elsewhere.
    pub fn observe(id: RowId) {
        NEXT_ROW_ID.fetch_max(id.0.saturating_add(1), AtomicOrdering::Relaxed);
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Owning,
    Indirect,
}

#[derive(Debug)]
enum Repr {
    Owned {
        id: RowId,
        values: Vec<Value>,
        metas: MetaOverlay,
    },
    Indirect {
        store: SharedStore,
        row: usize,
        projection: Projection,
        _pins: Vec<Pin>,
    },
}

/// One row over a domain.
///
/// An indirect example reads and writes through to its table's storage,
/// meta values included, and keeps the table locked until dropped.
#[derive(Debug)]
pub struct Example {
    domain: Arc<Domain>,
    repr: Repr,
}

impl Example {
    /// An owning example with every value undefined.
    pub fn new(domain: Arc<Domain>) -> Self {
        let values = vec![Value::Undefined; domain.len()];
        Self::owned(domain, RowId::mint(), values, MetaOverlay::new())
    }

    pub fn from_values(domain: Arc<Domain>, values: Vec<Value>) -> Result<Self> {
        check_row(&domain, &values)?;
        Ok(Self::owned(domain, RowId::mint(), values, MetaOverlay::new()))
    }

    /// Parses one text field per variable, appending unseen discrete labels.
    pub fn parse<S: AsRef<str>>(domain: Arc<Domain>, fields: &[S]) -> Result<Self> {
        if fields.len() != domain.len() {
            return Err(DataError::invalid(format!(
                "expected {} fields, got {}",
                domain.len(),
                fields.len()
            )));
        }
        let values = domain
            .variables()
            .iter()
            .zip(fields)
            .map(|(variable, field)| variable.parse_add(field.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::owned(domain, RowId::mint(), values, MetaOverlay::new()))
    }

    pub(crate) fn owned(
        domain: Arc<Domain>,
        id: RowId,
        values: Vec<Value>,
        metas: MetaOverlay,
    ) -> Self {
        Self {
            domain,
            repr: Repr::Owned { id, values, metas },
        }
    }

    pub(crate) fn indirect(
        domain: Arc<Domain>,
        store: SharedStore,
        row: usize,
        projection: Projection,
        pins: Vec<Pin>,
    ) -> Self {
        Self {
            domain,
            repr: Repr::Indirect {
                store,
                row,
                projection,
                _pins: pins,
            },
        }
    }

    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    pub fn id(&self) -> RowId {
        match &self.repr {
            Repr::Owned { id, .. } => *id,
            Repr::Indirect { store, row, .. } => store.read().id(*row),
        }
    }

    pub fn reference_type(&self) -> ReferenceType {
        match self.repr {
            Repr::Owned { .. } => ReferenceType::Owning,
            Repr::Indirect { .. } => ReferenceType::Indirect,
        }
    }

    /// Whether this example is a window into `store`'s slot `row`.
    pub(crate) fn points_into(&self, other: &SharedStore) -> Option<usize> {
        match &self.repr {
            Repr::Indirect { store, row, .. } if Arc::ptr_eq(store, other) => Some(*row),
            _ => None,
        }
    }

    fn column(&self, index: usize) -> Value {
        match &self.repr {
            Repr::Owned { values, .. } => values.get(index).cloned().unwrap_or_default(),
            Repr::Indirect {
                store,
                row,
                projection,
                ..
            } => store.read().value(*row, projection.physical(index)),
        }
    }

    fn meta_value(&self, id: MetaId) -> Option<Value> {
        match &self.repr {
            Repr::Owned { metas, .. } => metas.get(&id).cloned(),
            Repr::Indirect { store, row, .. } => store.read().metas(*row).get(&id).cloned(),
        }
    }

    fn slot(&self, key: &Key) -> Result<Slot> {
        match key {
            Key::Meta(id) => Ok(Slot::Meta(*id)),
            _ => self.domain.resolve(key),
        }
    }

    /// Reads a column or meta value.
    ///
    /// A registered meta attribute without a value on this row reads as
    /// undefined; an unregistered meta id reads only if a value is present.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        match self.slot(&key.into())? {
            Slot::Column(index) => Ok(self.column(index)),
            Slot::Meta(id) => match self.meta_value(id) {
                Some(value) => Ok(value),
                None if self.domain.meta_by_id(id).is_some() => Ok(Value::Undefined),
                None => Err(DataError::not_found(format!("{id}"))),
            },
        }
    }

    pub fn set(&mut self, key: impl Into<Key>, value: Value) -> Result<()> {
        match self.slot(&key.into())? {
            Slot::Column(index) => {
                self.domain.variables()[index].check(&value)?;
                self.write_column(index, value)
            }
            Slot::Meta(id) => {
                if let Some(meta) = self.domain.meta_by_id(id) {
                    meta.variable.check(&value)?;
                }
                self.write_meta(id, value);
                Ok(())
            }
        }
    }

    /// Sets a value from text, parsed by the addressed variable.
    pub fn set_label(&mut self, key: impl Into<Key>, text: &str) -> Result<()> {
        let key = key.into();
        let value = self.domain.variable(&key)?.parse(text)?;
        self.set(key, value)
    }

    fn write_column(&mut self, index: usize, value: Value) -> Result<()> {
        match &mut self.repr {
            Repr::Owned { values, .. } => {
                values[index] = value;
                Ok(())
            }
            Repr::Indirect {
                store,
                row,
                projection,
                ..
            } => store
                .write()
                .set_value(*row, projection.physical(index), value),
        }
    }

    fn write_meta(&mut self, id: MetaId, value: Value) {
        match &mut self.repr {
            Repr::Owned { metas, .. } => {
                metas.insert(id, value);
            }
            Repr::Indirect { store, row, .. } => {
                store.write().metas_mut(*row).insert(id, value);
            }
        }
    }

    pub fn has_meta(&self, key: impl Into<Key>) -> bool {
        match self.slot(&key.into()) {
            Ok(Slot::Meta(id)) => self.meta_value(id).is_some(),
            _ => false,
        }
    }

    /// Removes a meta value from this row.
    pub fn remove_meta(&mut self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        let id = match self.slot(&key) {
            Ok(Slot::Meta(id)) => id,
            Ok(Slot::Column(_)) => {
                return Err(DataError::WrongKeyType {
                    key: key.to_string(),
                    context: "remove a meta value",
                });
            }
            Err(err) => return Err(err),
        };
        let removed = match &mut self.repr {
            Repr::Owned { metas, .. } => metas.remove(&id),
            Repr::Indirect { store, row, .. } => store.write().metas_mut(*row).remove(&id),
        };
        removed.ok_or_else(|| DataError::not_found(format!("meta value {key}")))
    }

    /// Meta values present on this row, by id.
    pub fn metas(&self) -> Vec<(MetaId, Value)> {
        match &self.repr {
            Repr::Owned { metas, .. } => metas.iter().map(|(k, v)| (*k, v.clone())).collect(),
            Repr::Indirect { store, row, .. } => store
                .read()
                .metas(*row)
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
        }
    }

    pub(crate) fn meta_overlay(&self) -> MetaOverlay {
        self.metas().into_iter().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        match &self.repr {
            Repr::Owned { values, .. } => values.clone(),
            Repr::Indirect {
                store,
                row,
                projection,
                ..
            } => store.read().values(*row, projection, self.domain.len()),
        }
    }

    pub fn class_value(&self) -> Option<Value> {
        self.domain
            .class_var()
            .map(|_| self.column(self.domain.len() - 1))
    }

    pub fn set_class(&mut self, value: Value) -> Result<()> {
        if !self.domain.has_class() {
            return Err(DataError::not_found("class variable"));
        }
        let index = self.domain.len() - 1;
        self.set(Key::from(index), value)
    }

    /// Decoded values for export: numbers, labels, text, `null` when undefined.
    pub fn native(&self) -> Vec<serde_json::Value> {
        self.domain
            .variables()
            .iter()
            .zip(self.values())
            .map(|(variable, value)| native_value(variable, &value))
            .collect()
    }

    /// An owning copy with a fresh id.
    pub fn copy(&self) -> Self {
        Self::owned(
            Arc::clone(&self.domain),
            RowId::mint(),
            self.values(),
            self.meta_overlay(),
        )
    }

    /// This row expressed over `domain`; keeps the row id.
    pub fn convert(&self, domain: &Arc<Domain>) -> Self {
        if Arc::ptr_eq(domain, &self.domain) {
            return Self::owned(
                Arc::clone(domain),
                self.id(),
                self.values(),
                self.meta_overlay(),
            );
        }
        let values = domain.convert(self);
        Self::owned(Arc::clone(domain), self.id(), values, self.meta_overlay())
    }

    /// Equality of values as each variable compares them; metas ignored.
    pub fn same_values(&self, other: &Example) -> bool {
        let ours = self.values();
        let theirs = other.values();
        ours.len() == theirs.len()
            && self
                .domain
                .variables()
                .iter()
                .zip(ours.iter().zip(&theirs))
                .all(|(variable, (a, b))| variable.values_equal(a, b))
    }
}

impl Domain {
    /// Values of `example` expressed over this domain.
    ///
    /// Each variable is taken from the example's columns, then its meta
    /// attributes, then the variable's compute function; anything else is
    /// undefined.
    pub fn convert(&self, example: &Example) -> Vec<Value> {
        let source = example.domain();
        self.variables()
            .iter()
            .map(|variable| {
                if let Some(index) = source.index_of(variable) {
                    example.column(index)
                } else if let Some(meta) = source.meta(&Key::from(variable)) {
                    example.meta_value(meta.id).unwrap_or_default()
                } else if let Some(compute) = variable.compute_value() {
                    compute.compute(example)
                } else {
                    Value::Undefined
                }
            })
            .collect()
    }
}

pub(crate) fn check_row(domain: &Domain, values: &[Value]) -> Result<()> {
    if values.len() != domain.len() {
        return Err(DataError::invalid(format!(
            "expected {} values, got {}",
            domain.len(),
            values.len()
        )));
    }
    for (variable, value) in domain.variables().iter().zip(values) {
        variable.check(value)?;
    }
    Ok(())
}

pub(crate) fn native_value(variable: &Variable, value: &Value) -> serde_json::Value {
    match value {
        Value::Undefined => serde_json::Value::Null,
        Value::Continuous(x) => serde_json::Number::from_f64(*x)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Discrete(_) if variable.kind() == VarKind::Discrete => {
            serde_json::Value::String(variable.format(value))
        }
        Value::Discrete(code) => serde_json::Value::from(*code),
        Value::String(s) => serde_json::Value::String(s.clone()),
    }
}
