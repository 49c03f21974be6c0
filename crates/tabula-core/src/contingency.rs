//! Two-variable frequency tables.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::distribution::{Distribution, FloatKey};
use crate::error::{DataError, Result};
use crate::key::Key;
use crate::table::Table;
use crate::value::Value;
use crate::variable::{VarKind, Variable};

#[derive(Debug, Clone, PartialEq)]
enum Cells {
    Discrete(Vec<Distribution>),
    Continuous(BTreeMap<FloatKey, Distribution>),
}

/// Distributions of an inner variable, one per value of an outer variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Contingency {
    outer: Variable,
    inner: Variable,
    cells: Cells,
    outer_distribution: Distribution,
    inner_distribution: Distribution,
    inner_unknown: Distribution,
}

impl Contingency {
    pub fn new(outer: &Variable, inner: &Variable) -> Result<Self> {
        for variable in [outer, inner] {
            if !variable.is_primitive() {
                return Err(DataError::invalid(format!(
                    "'{}' is not a primitive variable",
                    variable.name()
                )));
            }
        }
        let cells = match outer.kind() {
            VarKind::Discrete => Cells::Discrete(
                (0..outer.value_count())
                    .map(|_| Distribution::for_variable(inner))
                    .collect::<Result<_>>()?,
            ),
            _ => Cells::Continuous(BTreeMap::new()),
        };
        Ok(Self {
            outer: outer.clone(),
            inner: inner.clone(),
            cells,
            outer_distribution: Distribution::for_variable(outer)?,
            inner_distribution: Distribution::for_variable(inner)?,
            inner_unknown: Distribution::for_variable(inner)?,
        })
    }

    /// Attribute values outside, class values inside.
    pub fn attr_class(table: &Table, attribute: impl Into<Key>, weighted: bool) -> Result<Self> {
        let class = class_key(table)?;
        Self::attr_attr(table, attribute, class, weighted)
    }

    /// Class values outside, attribute values inside.
    pub fn class_attr(table: &Table, attribute: impl Into<Key>, weighted: bool) -> Result<Self> {
        let class = class_key(table)?;
        Self::attr_attr(table, class, attribute, weighted)
    }

    pub fn attr_attr(
        table: &Table,
        outer: impl Into<Key>,
        inner: impl Into<Key>,
        weighted: bool,
    ) -> Result<Self> {
        let (outer, inner) = (outer.into(), inner.into());
        let domain = table.domain();
        let mut contingency = Self::new(domain.variable(&outer)?, domain.variable(&inner)?)?;
        for row in 0..table.len() {
            let weight = if weighted { table.weight(row)? } else { 1.0 };
            contingency.add_pair(
                &table.get(row, outer.clone())?,
                &table.get(row, inner.clone())?,
                weight,
            )?;
        }
        Ok(contingency)
    }

    pub fn outer(&self) -> &Variable {
        &self.outer
    }

    pub fn inner(&self) -> &Variable {
        &self.inner
    }

    pub fn outer_distribution(&self) -> &Distribution {
        &self.outer_distribution
    }

    pub fn inner_distribution(&self) -> &Distribution {
        &self.inner_distribution
    }

    /// Inner values seen together with an undefined outer value.
    pub fn inner_unknown(&self) -> &Distribution {
        &self.inner_unknown
    }

    pub fn len(&self) -> usize {
        match &self.cells {
            Cells::Discrete(cells) => cells.len(),
            Cells::Continuous(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds one co-occurrence. A rejected pair leaves the table unchanged.
    pub fn add_pair(&mut self, outer: &Value, inner: &Value, weight: f64) -> Result<()> {
        self.outer_distribution.accepts(outer)?;
        self.inner_distribution.accepts(inner)?;
        self.outer_distribution.add(outer, weight)?;
        if outer.is_undefined() {
            return self.inner_unknown.add(inner, weight);
        }
        self.inner_distribution.add(inner, weight)?;
        let cell = match (&mut self.cells, outer) {
            (Cells::Discrete(cells), Value::Discrete(code)) => {
                let index = usize::try_from(*code)
                    .map_err(|_| DataError::invalid(format!("negative discrete code {code}")))?;
                while cells.len() <= index {
                    cells.push(Distribution::for_variable(&self.inner)?);
                }
                &mut cells[index]
            }
            (Cells::Continuous(cells), Value::Continuous(x)) => match cells.entry(FloatKey(*x)) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(Distribution::for_variable(&self.inner)?),
            },
            // unreachable once the outer value is accepted
            _ => return Err(DataError::invalid("outer value kind does not match")),
        };
        cell.add(inner, weight)
    }

    /// The inner distribution for one outer value.
    pub fn get(&self, outer: &Value) -> Option<&Distribution> {
        match (&self.cells, outer) {
            (Cells::Discrete(cells), Value::Discrete(code)) => {
                usize::try_from(*code).ok().and_then(|i| cells.get(i))
            }
            (Cells::Continuous(cells), Value::Continuous(x)) => cells.get(&FloatKey(*x)),
            _ => None,
        }
    }

    /// `(outer value, inner distribution)` pairs in outer order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Value, &Distribution)> + '_> {
        match &self.cells {
            Cells::Discrete(cells) => Box::new(
                cells
                    .iter()
                    .enumerate()
                    .filter_map(|(i, d)| i32::try_from(i).ok().map(|c| (Value::Discrete(c), d))),
            ),
            Cells::Continuous(cells) => {
                Box::new(cells.iter().map(|(k, d)| (Value::Continuous(k.0), d)))
            }
        }
    }

    /// Normalizes every inner distribution on its own.
    pub fn normalize(&mut self) {
        match &mut self.cells {
            Cells::Discrete(cells) => cells.iter_mut().for_each(Distribution::normalize),
            Cells::Continuous(cells) => cells.values_mut().for_each(Distribution::normalize),
        }
    }
}

fn class_key(table: &Table) -> Result<Key> {
    let class = table
        .domain()
        .class_var()
        .ok_or_else(|| DataError::not_found("class variable"))?;
    Ok(Key::from(class))
}

/// One contingency per primitive attribute against the class.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainContingency {
    class_is_outer: bool,
    contingencies: Vec<Option<Contingency>>,
    classes: Distribution,
}

impl DomainContingency {
    pub fn from_table(table: &Table, class_is_outer: bool, weighted: bool) -> Result<Self> {
        let domain = table.domain();
        let class = domain
            .class_var()
            .ok_or_else(|| DataError::not_found("class variable"))?;
        let mut contingencies = domain
            .attributes()
            .iter()
            .map(|attribute| {
                if !attribute.is_primitive() {
                    return Ok(None);
                }
                let contingency = if class_is_outer {
                    Contingency::new(class, attribute)?
                } else {
                    Contingency::new(attribute, class)?
                };
                Ok(Some(contingency))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut classes = Distribution::for_variable(class)?;
        for row in 0..table.len() {
            let weight = if weighted { table.weight(row)? } else { 1.0 };
            let mut values = table.values(row)?;
            let class_value = values.pop().unwrap_or_default();
            classes.add(&class_value, weight)?;
            for (contingency, value) in contingencies.iter_mut().zip(&values) {
                let Some(contingency) = contingency else {
                    continue;
                };
                if class_is_outer {
                    contingency.add_pair(&class_value, value, weight)?;
                } else {
                    contingency.add_pair(value, &class_value, weight)?;
                }
            }
        }
        log::debug!(
            "built {} contingencies over {} rows",
            contingencies.iter().flatten().count(),
            table.len()
        );
        Ok(Self {
            class_is_outer,
            contingencies,
            classes,
        })
    }

    pub fn class_is_outer(&self) -> bool {
        self.class_is_outer
    }

    pub fn classes(&self) -> &Distribution {
        &self.classes
    }

    pub fn get(&self, attribute: usize) -> Option<&Contingency> {
        self.contingencies.get(attribute).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.contingencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contingencies.is_empty()
    }

    pub fn normalize(&mut self) {
        self.classes.normalize();
        self.contingencies
            .iter_mut()
            .flatten()
            .for_each(Contingency::normalize);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::table::tests::small_table;

    #[test]
    fn pairs_fill_cells_and_marginals() {
        let outer = Variable::discrete("o", ["a", "b"]);
        let inner = Variable::continuous("i");
        let mut c = Contingency::new(&outer, &inner).expect("new");
        c.add_pair(&Value::Discrete(0), &Value::Continuous(1.0), 1.0)
            .expect("add");
        c.add_pair(&Value::Discrete(1), &Value::Continuous(2.0), 2.0)
            .expect("add");
        c.add_pair(&Value::Undefined, &Value::Continuous(3.0), 1.0)
            .expect("add");

        assert_eq!(c.len(), 2);
        assert_eq!(c.outer_distribution().abs(), 3.0);
        assert_eq!(c.outer_distribution().unknowns(), 1.0);
        assert_eq!(c.inner_distribution().abs(), 3.0);
        assert_eq!(c.inner_unknown().abs(), 1.0);
        assert_eq!(c.get(&Value::Discrete(1)).expect("cell").abs(), 2.0);
        assert!(c.add_pair(&Value::Continuous(0.0), &Value::Undefined, 1.0).is_err());
    }

    #[test]
    fn rejected_pair_leaves_marginals_alone() {
        let outer = Variable::discrete("o", ["a", "b"]);
        let inner = Variable::continuous("i");
        let mut c = Contingency::new(&outer, &inner).expect("new");
        c.add_pair(&Value::Discrete(1), &Value::Continuous(1.0), 1.0)
            .expect("add");

        assert!(c.add_pair(&Value::Discrete(0), &Value::Discrete(1), 1.0).is_err());
        assert!(c.add_pair(&Value::Undefined, &Value::Discrete(1), 1.0).is_err());
        assert!(c.add_pair(&Value::Discrete(-1), &Value::Continuous(1.0), 1.0).is_err());
        assert_eq!(c.outer_distribution().abs(), 1.0);
        assert_eq!(c.outer_distribution().unknowns(), 0.0);
        assert_eq!(c.inner_distribution().abs(), 1.0);
        assert_eq!(c.inner_unknown().abs(), 0.0);
        assert!(c.get(&Value::Discrete(0)).is_none_or(|cell| cell.abs() == 0.0));
    }

    #[test]
    fn continuous_outer_grows_by_key() {
        let outer = Variable::continuous("o");
        let inner = Variable::discrete("i", ["x", "y"]);
        let mut c = Contingency::new(&outer, &inner).expect("new");
        for x in [1.0, 2.0, 1.0] {
            c.add_pair(&Value::Continuous(x), &Value::Discrete(1), 1.0)
                .expect("add");
        }
        assert_eq!(c.len(), 2);
        let keys: Vec<Value> = c.iter().map(|(v, _)| v).collect();
        assert_eq!(keys, vec![Value::Continuous(1.0), Value::Continuous(2.0)]);
    }

    #[test]
    fn normalize_is_per_cell() {
        let table = small_table();
        let mut c = Contingency::class_attr(&table, "x", false).expect("class_attr");
        c.normalize();
        for (_, cell) in c.iter() {
            let total: f64 = cell.as_continuous().expect("continuous").iter().map(|(_, p)| p).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        }
        assert_eq!(c.outer_distribution().abs(), 5.0);
    }

    #[test]
    fn domain_contingency_needs_a_class() {
        let table = small_table();
        let dc = DomainContingency::from_table(&table, false, true).expect("domain");
        assert_eq!(dc.len(), 2);
        assert_eq!(dc.classes().abs(), 5.0);
        let x = dc.get(0).expect("x");
        assert_eq!(x.outer().name(), "x");
        assert_eq!(x.len(), 5);

        let flat = table
            .translate_keys(&[Key::from("x")], crate::domain::ClassSpec::None)
            .expect("translate");
        assert!(DomainContingency::from_table(&flat, false, true).is_err());
        assert!(Contingency::attr_class(&flat, "x", false).is_err());
    }
}
