//! Repeatable random fold assignments for [`Table::sample`].
//!
//! Every generator is seeded, so the same settings over the same table
//! always produce the same folds.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::table::Table;
use crate::value::Value;
use crate::variable::VarKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stratification {
    NotStratified,
    #[default]
    StratifiedIfPossible,
    Stratified,
}

/// Row positions grouped by class, in random order within each class.
///
/// `None` means stratification is off or impossible and the caller should
/// fall back to plain indices.
fn class_order(
    table: &Table,
    stratification: Stratification,
    rng: &mut ChaCha8Rng,
) -> Result<Option<Vec<usize>>> {
    if stratification == Stratification::NotStratified {
        return Ok(None);
    }
    let discrete_class = table
        .domain()
        .class_var()
        .is_some_and(|class| class.kind() == VarKind::Discrete);
    if !discrete_class {
        return match stratification {
            Stratification::Stratified => Err(DataError::invalid(
                "cannot prepare stratified indices for data without a discrete class",
            )),
            _ => Ok(None),
        };
    }
    let mut pairs = Vec::with_capacity(table.len());
    for (position, example) in table.iter().enumerate() {
        match example.class_value() {
            Some(Value::Discrete(code)) => pairs.push((position, code)),
            _ if stratification == Stratification::StratifiedIfPossible => return Ok(None),
            _ => {
                return Err(DataError::invalid(
                    "cannot prepare stratified indices due to unknown classes",
                ));
            }
        }
    }
    pairs.shuffle(rng);
    pairs.sort_by_key(|&(_, code)| code);
    Ok(Some(pairs.into_iter().map(|(position, _)| position).collect()))
}

fn refuse_without_data(stratification: Stratification) -> Result<()> {
    if stratification == Stratification::Stratified {
        return Err(DataError::invalid(
            "cannot prepare stratified indices without data",
        ));
    }
    Ok(())
}

fn round(x: f64) -> usize {
    (x + 0.5).max(0.0) as usize
}

/// A split into fold 0 and fold 1.
///
/// `p0` up to 1 is the proportion of zeros; above 1 it is their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomIndices2 {
    pub p0: f64,
    pub stratified: Stratification,
    pub seed: u64,
}

impl RandomIndices2 {
    pub fn new(p0: f64) -> Self {
        Self {
            p0,
            stratified: Stratification::default(),
            seed: 0,
        }
    }

    pub fn stratified(mut self, stratified: Stratification) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn indices(&self, n: usize) -> Result<Vec<i64>> {
        refuse_without_data(self.stratified)?;
        let zeros = if self.p0 <= 1.0 {
            round(self.p0 * n as f64)
        } else {
            round(self.p0)
        }
        .min(n);
        let mut indices = vec![0; zeros];
        indices.resize(n, 1);
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));
        Ok(indices)
    }

    pub fn indices_for(&self, table: &Table) -> Result<Vec<i64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let Some(order) = class_order(table, self.stratified, &mut rng)? else {
            return Self {
                stratified: Stratification::NotStratified,
                ..self.clone()
            }
            .indices(table.len());
        };
        let p0 = if self.p0 > 1.0 {
            let share = self.p0 / table.len() as f64;
            if share > 1.0 {
                return Err(DataError::invalid(format!(
                    "p0 exceeds the number of rows ({} > {})",
                    self.p0,
                    table.len()
                )));
            }
            share
        } else {
            self.p0
        };
        let p1 = 1.0 - p0;
        // zeros and ones alternate so that each class is split in proportion
        let mut indices = vec![0; table.len()];
        let mut remainder = 0.0;
        for position in order {
            if remainder <= 0.0 {
                indices[position] = 1;
                remainder += p0;
            } else {
                indices[position] = 0;
                remainder -= p1;
            }
        }
        Ok(indices)
    }
}

/// A split into several folds given by proportions or counts; rows left
/// over go to one more fold after the listed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomIndicesN {
    pub p: Vec<f64>,
    pub seed: u64,
}

impl RandomIndicesN {
    pub fn new(p: Vec<f64>) -> Self {
        Self { p, seed: 0 }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn indices(&self, n: usize) -> Result<Vec<i64>> {
        if self.p.is_empty() {
            return Err(DataError::invalid("no fold sizes given"));
        }
        let sum: f64 = self.p.iter().sum();
        let proportions = self.p.iter().all(|&p| p <= 1.0);
        if proportions && sum >= 1.0 {
            return Err(DataError::invalid(format!(
                "sum of proportions must be below 1, not {sum:.3}"
            )));
        }
        if !proportions && sum > n as f64 {
            return Err(DataError::invalid(format!(
                "sum of counts, {sum:.3}, exceeds the number of rows"
            )));
        }
        // Fold boundaries come from rounded running totals, so the listed
        // folds never claim more than `n` rows.
        let mut indices = Vec::with_capacity(n);
        let mut total = 0.0;
        let mut fold = 0i64;
        for &p in &self.p {
            total += if proportions { p * n as f64 } else { p };
            let boundary = round(total).min(n).max(indices.len());
            indices.resize(boundary, fold);
            fold += 1;
        }
        indices.resize(n, fold);
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));
        Ok(indices)
    }

    pub fn indices_for(&self, table: &Table) -> Result<Vec<i64>> {
        self.indices(table.len())
    }
}

/// Cross-validation folds of (nearly) equal size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomIndicesCv {
    pub folds: usize,
    pub stratified: Stratification,
    pub seed: u64,
}

impl RandomIndicesCv {
    pub fn new(folds: usize) -> Self {
        Self {
            folds,
            stratified: Stratification::default(),
            seed: 0,
        }
    }

    pub fn stratified(mut self, stratified: Stratification) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn check_folds(&self) -> Result<i64> {
        match i64::try_from(self.folds) {
            Ok(folds) if folds > 0 => Ok(folds),
            _ => Err(DataError::invalid(format!(
                "invalid number of folds ({})",
                self.folds
            ))),
        }
    }

    pub fn indices(&self, n: usize) -> Result<Vec<i64>> {
        refuse_without_data(self.stratified)?;
        let folds = self.check_folds()?;
        let per_fold = n / self.folds;
        let mut indices = Vec::with_capacity(n);
        for fold in 0..folds {
            indices.resize(indices.len() + per_fold, fold);
        }
        let mut fold = 0;
        while indices.len() < n {
            indices.push(fold);
            fold += 1;
        }
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));
        Ok(indices)
    }

    pub fn indices_for(&self, table: &Table) -> Result<Vec<i64>> {
        let folds = self.check_folds()?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let Some(order) = class_order(table, self.stratified, &mut rng)? else {
            return Self {
                stratified: Stratification::NotStratified,
                ..self.clone()
            }
            .indices(table.len());
        };
        let mut indices = vec![0; table.len()];
        for (rank, position) in order.into_iter().enumerate() {
            indices[position] = rank as i64 % folds;
        }
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::Domain;
    use crate::table::tests::small_table;
    use crate::variable::Variable;

    fn counts(indices: &[i64], folds: i64) -> Vec<usize> {
        (0..folds)
            .map(|f| indices.iter().filter(|&&i| i == f).count())
            .collect()
    }

    fn balanced_table(n: usize) -> Table {
        let domain = Domain::new(
            vec![Variable::continuous("x")],
            Some(Variable::discrete("c", ["a", "b"])),
        )
        .expect("domain");
        let rows = (0..n)
            .map(|i| {
                vec![
                    Value::Continuous(i as f64),
                    Value::Discrete(i32::from(i % 2 == 1)),
                ]
            })
            .collect();
        Table::from_rows(Arc::new(domain), rows).expect("rows")
    }

    #[test]
    fn two_way_split_by_proportion_and_count() {
        let by_share = RandomIndices2::new(0.3).indices(10).expect("share");
        assert_eq!(counts(&by_share, 2), vec![3, 7]);
        let by_count = RandomIndices2::new(4.0).indices(10).expect("count");
        assert_eq!(counts(&by_count, 2), vec![4, 6]);
        let capped = RandomIndices2::new(40.0).indices(10).expect("capped");
        assert_eq!(counts(&capped, 2), vec![10, 0]);
    }

    #[test]
    fn seeds_repeat() {
        let a = RandomIndicesCv::new(3).seed(7).indices(20).expect("a");
        let b = RandomIndicesCv::new(3).seed(7).indices(20).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn stratified_split_halves_each_class() {
        let table = balanced_table(20);
        let indices = RandomIndices2::new(0.5)
            .stratified(Stratification::Stratified)
            .indices_for(&table)
            .expect("stratified");
        for class in [0, 1] {
            let zeros = indices
                .iter()
                .enumerate()
                .filter(|&(p, &i)| p % 2 == class && i == 0)
                .count();
            assert_eq!(zeros, 5);
        }
    }

    #[test]
    fn strict_stratification_needs_a_class() {
        let table = small_table();
        let flat = table
            .translate_keys(&[crate::key::Key::from("x")], crate::domain::ClassSpec::None)
            .expect("flat");
        let strict = RandomIndicesCv::new(2).stratified(Stratification::Stratified);
        assert!(strict.indices_for(&flat).is_err());
        assert!(strict.indices(5).is_err());
        let lenient = RandomIndicesCv::new(2);
        assert_eq!(lenient.indices_for(&flat).expect("lenient").len(), 5);

        table.set(0, "c", Value::Undefined).expect("write");
        assert!(strict.indices_for(&table).is_err());
        assert_eq!(lenient.indices_for(&table).expect("fallback").len(), 5);
    }

    #[test]
    fn n_way_leftovers_get_the_last_fold() {
        let indices = RandomIndicesN::new(vec![0.2, 0.3]).indices(10).expect("n");
        assert_eq!(counts(&indices, 3), vec![2, 3, 5]);
        assert!(RandomIndicesN::new(vec![0.5, 0.5]).indices(10).is_err());
        assert!(RandomIndicesN::new(vec![6.0, 5.0]).indices(10).is_err());
        assert!(RandomIndicesN::new(vec![]).indices(10).is_err());
    }

    #[test]
    fn n_way_rounding_keeps_every_row() {
        let indices = RandomIndicesN::new(vec![0.3, 0.3, 0.3]).indices(5).expect("n");
        assert_eq!(indices.len(), 5);
        let sizes = counts(&indices, 4);
        assert_eq!(sizes, vec![2, 1, 2, 0]);
        assert_eq!(sizes.iter().sum::<usize>(), 5);

        let indices = RandomIndicesN::new(vec![2.5, 2.5]).indices(5).expect("n");
        assert_eq!(counts(&indices, 3), vec![3, 2, 0]);

        let indices = RandomIndicesN::new(vec![0.3, 0.3]).indices(5).expect("n");
        assert_eq!(counts(&indices, 3), vec![2, 1, 2]);
    }

    #[test]
    fn cross_validation_folds() {
        let indices = RandomIndicesCv::new(3).indices(10).expect("cv");
        assert_eq!(counts(&indices, 3), vec![4, 3, 3]);
        assert!(RandomIndicesCv::new(0).indices(10).is_err());

        let table = balanced_table(12);
        let stratified = RandomIndicesCv::new(3)
            .stratified(Stratification::Stratified)
            .indices_for(&table)
            .expect("stratified");
        for class in [0, 1] {
            let per_fold: Vec<usize> = (0..3)
                .map(|f| {
                    stratified
                        .iter()
                        .enumerate()
                        .filter(|&(p, &i)| p % 2 == class && i == f)
                        .count()
                })
                .collect();
            assert_eq!(per_fold, vec![2, 2, 2]);
        }
    }
}
