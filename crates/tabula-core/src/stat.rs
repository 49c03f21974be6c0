//! Running summaries of continuous variables.

use serde::Serialize;

use crate::distribution::ContDistribution;
use crate::error::{DataError, Result};
use crate::key::Key;
use crate::table::Table;
use crate::variable::{VarKind, Variable};

/// Minimum, maximum, mean and deviation of a continuous variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicAttrStat {
    #[serde(skip)]
    variable: Option<Variable>,
    pub min: f64,
    pub max: f64,
    pub n: f64,
    pub sum: f64,
    pub sum2: f64,
}

impl BasicAttrStat {
    pub fn new(variable: Option<Variable>) -> Self {
        Self {
            variable,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            n: 0.0,
            sum: 0.0,
            sum2: 0.0,
        }
    }

    /// Summarizes the defined values of `key` over the table.
    pub fn from_table(table: &Table, key: impl Into<Key>, weighted: bool) -> Result<Self> {
        let key = key.into();
        let variable = table.domain().variable(&key)?;
        if variable.kind() != VarKind::Continuous {
            return Err(DataError::invalid(format!(
                "basic statistics need a continuous variable, '{}' is {}",
                variable.name(),
                variable.kind()
            )));
        }
        let mut stat = Self::new(Some(variable.clone()));
        for row in 0..table.len() {
            if let Some(x) = table.get(row, key.clone())?.as_f64() {
                let weight = if weighted { table.weight(row)? } else { 1.0 };
                stat.add(x, weight);
            }
        }
        Ok(stat)
    }

    pub fn from_distribution(distribution: &ContDistribution) -> Self {
        let mut stat = Self::new(distribution.variable().cloned());
        for (x, weight) in distribution.iter() {
            stat.add(x, weight);
        }
        stat
    }

    pub fn variable(&self) -> Option<&Variable> {
        self.variable.as_ref()
    }

    pub fn add(&mut self, x: f64, weight: f64) {
        self.sum += weight * x;
        self.sum2 += weight * x * x;
        self.n += weight;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    pub fn avg(&self) -> Option<f64> {
        (self.n > 0.0).then(|| self.sum / self.n)
    }

    pub fn dev(&self) -> Option<f64> {
        let avg = self.avg()?;
        Some((self.sum2 / self.n - avg * avg).max(0.0).sqrt())
    }
}

/// Basic statistics for every continuous variable of a domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainBasicAttrStat(Vec<Option<BasicAttrStat>>);

impl DomainBasicAttrStat {
    pub fn from_table(table: &Table, weighted: bool) -> Result<Self> {
        let mut stats: Vec<Option<BasicAttrStat>> = table
            .domain()
            .variables()
            .iter()
            .map(|v| (v.kind() == VarKind::Continuous).then(|| BasicAttrStat::new(Some(v.clone()))))
            .collect();
        for row in 0..table.len() {
            let weight = if weighted { table.weight(row)? } else { 1.0 };
            for (stat, value) in stats.iter_mut().zip(table.values(row)?) {
                if let (Some(stat), Some(x)) = (stat, value.as_f64()) {
                    stat.add(x, weight);
                }
            }
        }
        Ok(Self(stats))
    }

    pub fn get(&self, index: usize) -> Option<&BasicAttrStat> {
        self.0.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&BasicAttrStat>> + '_ {
        self.0.iter().map(Option::as_ref)
    }
}
