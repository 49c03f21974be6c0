//! Frequency distributions of single variables.
//!
//! Distributions are snapshots: they copy what they count and hold no
//! reference to the table they were built from.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::Rng;

use crate::error::{DataError, Result};
use crate::key::Key;
use crate::table::Table;
use crate::value::Value;
use crate::variable::{VarKind, Variable};

/// An `f64` usable as an ordered map key.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FloatKey(pub(crate) f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Frequencies of the codes of a discrete variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscDistribution {
    variable: Option<Variable>,
    counts: Vec<f64>,
    abs: f64,
    cases: f64,
    unknowns: f64,
}

impl DiscDistribution {
    /// An empty distribution sized to the variable's values.
    pub fn new(variable: Option<Variable>) -> Self {
        let len = variable.as_ref().map_or(0, Variable::value_count);
        Self {
            variable,
            counts: vec![0.0; len],
            abs: 0.0,
            cases: 0.0,
            unknowns: 0.0,
        }
    }

    pub fn from_counts(counts: Vec<f64>) -> Self {
        let abs = counts.iter().sum();
        Self {
            variable: None,
            counts,
            abs,
            cases: abs,
            unknowns: 0.0,
        }
    }

    pub fn variable(&self) -> Option<&Variable> {
        self.variable.as_ref()
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total weight of defined values.
    pub fn abs(&self) -> f64 {
        self.abs
    }

    /// Total weight of everything added, undefined values included.
    pub fn cases(&self) -> f64 {
        self.cases
    }

    pub fn unknowns(&self) -> f64 {
        self.unknowns
    }

    fn index(code: i32) -> Result<usize> {
        usize::try_from(code)
            .map_err(|_| DataError::invalid(format!("negative discrete code {code}")))
    }

    pub fn add_code(&mut self, code: i32, weight: f64) -> Result<()> {
        let index = Self::index(code)?;
        if index >= self.counts.len() {
            self.counts.resize(index + 1, 0.0);
        }
        self.counts[index] += weight;
        self.abs += weight;
        self.cases += weight;
        Ok(())
    }

    pub fn add_unknown(&mut self, weight: f64) {
        self.unknowns += weight;
        self.cases += weight;
    }

    /// Replaces the frequency of `code`.
    pub fn set(&mut self, code: i32, weight: f64) -> Result<()> {
        let index = Self::index(code)?;
        if index >= self.counts.len() {
            self.counts.resize(index + 1, 0.0);
        }
        self.abs += weight - self.counts[index];
        self.counts[index] = weight;
        Ok(())
    }

    pub fn get(&self, code: i32) -> f64 {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.counts.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Divides every frequency by the total; an all-zero distribution
    /// becomes uniform.
    pub fn normalize(&mut self) {
        if self.abs > 0.0 {
            let abs = self.abs;
            self.counts.iter_mut().for_each(|c| *c /= abs);
            self.abs = 1.0;
        } else if !self.counts.is_empty() {
            let p = 1.0 / self.counts.len() as f64;
            self.counts.iter_mut().for_each(|c| *c = p);
            self.abs = 1.0;
        }
    }

    /// Relative frequency of `code`.
    pub fn p(&self, code: i32) -> f64 {
        if self.abs > 0.0 {
            self.get(code) / self.abs
        } else if self.counts.is_empty() {
            0.0
        } else {
            1.0 / self.counts.len() as f64
        }
    }

    /// Most frequent code; the lowest code wins ties.
    pub fn mode(&self) -> Option<i32> {
        let mut best: Option<(usize, f64)> = None;
        for (index, &count) in self.counts.iter().enumerate() {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((index, count));
            }
        }
        best.and_then(|(index, _)| i32::try_from(index).ok())
    }

    /// A code drawn in proportion to frequency, uniformly when all are zero.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<i32> {
        if self.counts.is_empty() {
            return Err(DataError::statistic("a random value", "empty distribution"));
        }
        let index = if self.abs > 0.0 {
            let mut remaining = rng.gen_range(0.0..self.abs);
            let mut chosen = self.counts.len() - 1;
            for (index, &count) in self.counts.iter().enumerate() {
                if remaining < count {
                    chosen = index;
                    break;
                }
                remaining -= count;
            }
            chosen
        } else {
            rng.gen_range(0..self.counts.len())
        };
        i32::try_from(index).map_err(|_| DataError::invalid("too many discrete values"))
    }
}

/// Frequencies of the observed values of a continuous variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ContDistribution {
    variable: Option<Variable>,
    values: BTreeMap<FloatKey, f64>,
    abs: f64,
    cases: f64,
    unknowns: f64,
    sum: f64,
    sum2: f64,
}

impl ContDistribution {
    pub fn new(variable: Option<Variable>) -> Self {
        Self {
            variable,
            values: BTreeMap::new(),
            abs: 0.0,
            cases: 0.0,
            unknowns: 0.0,
            sum: 0.0,
            sum2: 0.0,
        }
    }

    pub fn variable(&self) -> Option<&Variable> {
        self.variable.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn abs(&self) -> f64 {
        self.abs
    }

    pub fn cases(&self) -> f64 {
        self.cases
    }

    pub fn unknowns(&self) -> f64 {
        self.unknowns
    }

    /// `(value, frequency)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().map(|(k, v)| (k.0, *v))
    }

    /// Adds `weight` at `x`; NaN counts as unknown.
    pub fn add(&mut self, x: f64, weight: f64) {
        if x.is_nan() {
            self.unknowns += weight;
            self.cases += weight;
            return;
        }
        *self.values.entry(FloatKey(x)).or_insert(0.0) += weight;
        self.abs += weight;
        self.cases += weight;
        self.sum += weight * x;
        self.sum2 += weight * x * x;
    }

    /// Replaces the frequency at `x`.
    pub fn set(&mut self, x: f64, weight: f64) -> Result<()> {
        if x.is_nan() {
            return Err(DataError::invalid(
                "cannot set the frequency of an unknown value",
            ));
        }
        let previous = self.values.insert(FloatKey(x), weight).unwrap_or(0.0);
        let delta = weight - previous;
        self.abs += delta;
        self.sum += delta * x;
        self.sum2 += delta * x * x;
        Ok(())
    }

    pub fn get(&self, x: f64) -> f64 {
        self.values.get(&FloatKey(x)).copied().unwrap_or(0.0)
    }

    /// Divides every frequency by the total; an all-zero distribution
    /// becomes uniform over its keys.
    pub fn normalize(&mut self) {
        if self.abs > 0.0 {
            let abs = self.abs;
            self.values.values_mut().for_each(|v| *v /= abs);
            self.sum /= abs;
            self.sum2 /= abs;
            self.abs = 1.0;
        } else if !self.values.is_empty() {
            let p = 1.0 / self.values.len() as f64;
            self.sum = 0.0;
            self.sum2 = 0.0;
            for (key, frequency) in self.values.iter_mut() {
                *frequency = p;
                self.sum += p * key.0;
                self.sum2 += p * key.0 * key.0;
            }
            self.abs = 1.0;
        }
    }

    pub fn average(&self) -> Result<f64> {
        if self.abs < 1.0 {
            return Err(DataError::statistic("the average", "empty distribution"));
        }
        Ok(self.sum / self.abs)
    }

    fn spread(&self, statistic: &'static str) -> Result<f64> {
        if self.abs < 2.0 {
            return Err(DataError::statistic(
                statistic,
                "fewer than two instances",
            ));
        }
        Ok(self.sum2 - self.sum * self.sum / self.abs)
    }

    pub fn variance(&self) -> Result<f64> {
        let spread = self.spread("the variance")?;
        Ok((spread / self.abs).max(0.0))
    }

    pub fn deviation(&self) -> Result<f64> {
        let spread = self.spread("the standard deviation")?;
        Ok((spread / self.abs).max(0.0).sqrt())
    }

    /// Standard error of the mean.
    pub fn error(&self) -> Result<f64> {
        let spread = self.spread("the standard error")?;
        if spread > 0.0 {
            Ok((spread / (self.abs - 1.0) / self.abs).sqrt())
        } else {
            Ok(0.0)
        }
    }

    /// Value below which `p` percent of the weight lies.
    ///
    /// When the cumulative weight lands exactly on a key boundary the two
    /// neighbouring keys are averaged.
    pub fn percentile(&self, p: f64) -> Result<f64> {
        if !(0.0..=100.0).contains(&p) {
            return Err(DataError::statistic(
                "a percentile",
                format!("{p} is outside [0, 100]"),
            ));
        }
        let (Some((first, _)), Some((last, _))) =
            (self.values.first_key_value(), self.values.last_key_value())
        else {
            return Err(DataError::statistic("a percentile", "empty distribution"));
        };
        if self.abs < 1e-6 {
            return Err(DataError::statistic("a percentile", "empty distribution"));
        }
        if p == 0.0 {
            return Ok(first.0);
        }
        if p == 100.0 {
            return Ok(last.0);
        }
        let mut togo = self.abs * p / 100.0;
        let mut entries = self.values.iter().peekable();
        let mut previous = first.0;
        while togo > 0.0 {
            let Some((key, frequency)) = entries.next() else {
                break;
            };
            togo -= frequency;
            previous = key.0;
        }
        match entries.peek() {
            Some((next, _)) if togo >= 0.0 => Ok((previous + next.0) / 2.0),
            _ => Ok(previous),
        }
    }

    /// Frequency at `x`: the stored weight at an exact key, linear
    /// interpolation between neighbouring keys, zero outside the key range.
    /// The result is not normalized by the total weight.
    pub fn density(&self, x: f64) -> f64 {
        let above = self.values.range(FloatKey(x)..).next();
        let Some((upper, &upper_f)) = above else {
            return 0.0;
        };
        if upper.0 == x {
            return upper_f;
        }
        let Some((lower, &lower_f)) = self.values.range(..FloatKey(x)).next_back() else {
            return 0.0;
        };
        lower_f + (x - lower.0) * (upper_f - lower_f) / (upper.0 - lower.0)
    }

    /// Total frequency at or below `x`.
    pub fn cumulative(&self, x: f64) -> f64 {
        self.values.range(..=FloatKey(x)).map(|(_, v)| v).sum()
    }

    /// The most frequent value; the lowest value wins ties.
    pub fn mode(&self) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for (key, &frequency) in &self.values {
            if best.is_none_or(|(_, top)| frequency > top) {
                best = Some((key.0, frequency));
            }
        }
        best.map(|(x, _)| x)
    }

    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        if self.values.is_empty() || self.abs <= 0.0 {
            return Err(DataError::statistic("a random value", "empty distribution"));
        }
        let mut remaining = rng.gen_range(0.0..self.abs);
        let mut chosen = None;
        for (key, &frequency) in &self.values {
            chosen = Some(key.0);
            if remaining < frequency {
                break;
            }
            remaining -= frequency;
        }
        chosen.ok_or_else(|| DataError::statistic("a random value", "empty distribution"))
    }
}

/// Distribution of one variable, discrete or continuous.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Discrete(DiscDistribution),
    Continuous(ContDistribution),
}

impl Distribution {
    /// An empty distribution of the right shape for `variable`.
    pub fn for_variable(variable: &Variable) -> Result<Self> {
        match variable.kind() {
            VarKind::Discrete => Ok(Self::Discrete(DiscDistribution::new(Some(variable.clone())))),
            VarKind::Continuous => Ok(Self::Continuous(ContDistribution::new(Some(
                variable.clone(),
            )))),
            VarKind::String => Err(DataError::invalid(format!(
                "cannot build a distribution of string variable '{}'",
                variable.name()
            ))),
        }
    }

    /// Counts the values of `key` over all rows, with row weights when `weighted`.
    pub fn from_table(table: &Table, key: impl Into<Key>, weighted: bool) -> Result<Self> {
        let key = key.into();
        let variable = table.domain().variable(&key)?.clone();
        let mut distribution = Self::for_variable(&variable)?;
        for row in 0..table.len() {
            let weight = if weighted { table.weight(row)? } else { 1.0 };
            distribution.add(&table.get(row, key.clone())?, weight)?;
        }
        Ok(distribution)
    }

    pub fn variable(&self) -> Option<&Variable> {
        match self {
            Self::Discrete(d) => d.variable(),
            Self::Continuous(d) => d.variable(),
        }
    }

    /// Fails when `add` would reject `value`, without changing anything.
    pub fn accepts(&self, value: &Value) -> Result<()> {
        match (self, value) {
            (_, Value::Undefined)
            | (Self::Discrete(_), Value::Discrete(_))
            | (Self::Continuous(_), Value::Continuous(_)) => {
                if let Value::Discrete(code) = value {
                    DiscDistribution::index(*code)?;
                }
                Ok(())
            }
            (this, other) => Err(DataError::TypeMismatch {
                variable: this
                    .variable()
                    .map_or_else(|| "distribution".to_string(), |v| v.name().to_string()),
                expected: match this {
                    Self::Discrete(_) => VarKind::Discrete,
                    Self::Continuous(_) => VarKind::Continuous,
                },
                found: other.kind_name(),
            }),
        }
    }

    pub fn add(&mut self, value: &Value, weight: f64) -> Result<()> {
        self.accepts(value)?;
        match (self, value) {
            (Self::Discrete(d), Value::Undefined) => d.add_unknown(weight),
            (Self::Continuous(d), Value::Undefined) => d.add(f64::NAN, weight),
            (Self::Discrete(d), Value::Discrete(code)) => d.add_code(*code, weight)?,
            (Self::Continuous(d), Value::Continuous(x)) => d.add(*x, weight),
            _ => {}
        }
        Ok(())
    }

    pub fn normalize(&mut self) {
        match self {
            Self::Discrete(d) => d.normalize(),
            Self::Continuous(d) => d.normalize(),
        }
    }

    pub fn abs(&self) -> f64 {
        match self {
            Self::Discrete(d) => d.abs(),
            Self::Continuous(d) => d.abs(),
        }
    }

    pub fn cases(&self) -> f64 {
        match self {
            Self::Discrete(d) => d.cases(),
            Self::Continuous(d) => d.cases(),
        }
    }

    pub fn unknowns(&self) -> f64 {
        match self {
            Self::Discrete(d) => d.unknowns(),
            Self::Continuous(d) => d.unknowns(),
        }
    }

    /// Relative frequency (discrete) or interpolated frequency (continuous)
    /// of `value`.
    pub fn p(&self, value: &Value) -> f64 {
        match (self, value) {
            (Self::Discrete(d), Value::Discrete(code)) => d.p(*code),
            (Self::Continuous(d), Value::Continuous(x)) => d.density(*x),
            _ => 0.0,
        }
    }

    pub fn mode(&self) -> Option<Value> {
        match self {
            Self::Discrete(d) => d.mode().map(Value::Discrete),
            Self::Continuous(d) => d.mode().map(Value::Continuous),
        }
    }

    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Value> {
        match self {
            Self::Discrete(d) => d.random(rng).map(Value::Discrete),
            Self::Continuous(d) => d.random(rng).map(Value::Continuous),
        }
    }

    pub fn as_discrete(&self) -> Option<&DiscDistribution> {
        match self {
            Self::Discrete(d) => Some(d),
            Self::Continuous(_) => None,
        }
    }

    pub fn as_continuous(&self) -> Option<&ContDistribution> {
        match self {
            Self::Continuous(d) => Some(d),
            Self::Discrete(_) => None,
        }
    }
}

/// One distribution per domain variable, gathered in a single scan.
///
/// String variables, and kinds the caller skips, get `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainDistributions(Vec<Option<Distribution>>);

impl DomainDistributions {
    pub fn from_table(
        table: &Table,
        weighted: bool,
        skip_discrete: bool,
        skip_continuous: bool,
    ) -> Result<Self> {
        let mut distributions: Vec<Option<Distribution>> = table
            .domain()
            .variables()
            .iter()
            .map(|variable| match variable.kind() {
                VarKind::Discrete if !skip_discrete => Distribution::for_variable(variable).ok(),
                VarKind::Continuous if !skip_continuous => {
                    Distribution::for_variable(variable).ok()
                }
                _ => None,
            })
            .collect();
        for row in 0..table.len() {
            let weight = if weighted { table.weight(row)? } else { 1.0 };
            let values = table.values(row)?;
            for (distribution, value) in distributions.iter_mut().zip(&values) {
                if let Some(distribution) = distribution {
                    distribution.add(value, weight)?;
                }
            }
        }
        Ok(Self(distributions))
    }

    pub fn get(&self, index: usize) -> Option<&Distribution> {
        self.0.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Distribution>> + '_ {
        self.0.iter().map(Option::as_ref)
    }

    pub fn normalize(&mut self) {
        self.0.iter_mut().flatten().for_each(Distribution::normalize);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn continuous(pairs: &[(f64, f64)]) -> ContDistribution {
        let mut d = ContDistribution::new(None);
        for &(x, w) in pairs {
            d.add(x, w);
        }
        d
    }

    #[test]
    fn continuous_moments() {
        let d = continuous(&[(1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (4.0, 1.0)]);
        assert_abs_diff_eq!(d.average().expect("avg"), 2.5);
        assert_abs_diff_eq!(d.variance().expect("var"), 1.25);
        assert_abs_diff_eq!(d.deviation().expect("dev"), 1.25f64.sqrt());
        assert_abs_diff_eq!(d.error().expect("err"), (5.0f64 / 3.0 / 4.0).sqrt());
    }

    #[test]
    fn small_samples_refuse_spread() {
        let d = continuous(&[(1.0, 1.0)]);
        assert!(d.average().is_ok());
        assert!(d.variance().is_err());
        assert!(ContDistribution::new(None).average().is_err());
    }

    #[test]
    fn unknowns_do_not_count_towards_abs() {
        let mut d = continuous(&[(1.0, 2.0)]);
        d.add(f64::NAN, 3.0);
        assert_eq!(d.abs(), 2.0);
        assert_eq!(d.unknowns(), 3.0);
        assert_eq!(d.cases(), 5.0);
    }

    #[test]
    fn percentiles() {
        let d = continuous(&[(1.0, 1.0), (2.0, 1.0), (3.0, 1.0), (4.0, 1.0)]);
        assert_eq!(d.percentile(0.0).expect("p0"), 1.0);
        assert_eq!(d.percentile(100.0).expect("p100"), 4.0);
        assert_eq!(d.percentile(50.0).expect("median"), 2.5);
        assert_eq!(d.percentile(60.0).expect("p60"), 3.0);
        assert!(d.percentile(101.0).is_err());
        assert!(d.percentile(-0.5).is_err());
        assert!(ContDistribution::new(None).percentile(50.0).is_err());
    }

    #[test]
    fn density_interpolates() {
        let d = continuous(&[(0.0, 1.0), (2.0, 3.0)]);
        assert_abs_diff_eq!(d.density(0.0), 1.0);
        assert_abs_diff_eq!(d.density(1.0), 2.0);
        assert_abs_diff_eq!(d.density(1.5), 2.5);
        assert_abs_diff_eq!(d.density(2.0), 3.0);
        assert_eq!(d.density(-1.0), 0.0);
        assert_eq!(d.density(3.0), 0.0);
        assert_eq!(d.cumulative(1.0), 1.0);
        assert_eq!(d.cumulative(2.0), 4.0);
    }

    #[test]
    fn density_reports_raw_weights() {
        let x = Variable::continuous("x");
        let mut d = Distribution::for_variable(&x).expect("continuous");
        d.add(&Value::Continuous(1.0), 6.0).expect("add");
        d.add(&Value::Continuous(3.0), 2.0).expect("add");
        assert_abs_diff_eq!(d.p(&Value::Continuous(1.0)), 6.0);
        assert_abs_diff_eq!(d.p(&Value::Continuous(2.5)), 3.0);
        assert_eq!(d.p(&Value::Continuous(0.5)), 0.0);
    }

    #[test]
    fn normalization_preserves_order() {
        let mut d = continuous(&[(1.0, 5.0), (2.0, 1.0), (3.0, 2.0)]);
        d.normalize();
        let total: f64 = d.iter().map(|(_, p)| p).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        assert_eq!(d.mode(), Some(1.0));
        assert!(d.get(3.0) > d.get(2.0));

        let mut disc = DiscDistribution::from_counts(vec![0.0, 0.0]);
        disc.normalize();
        assert_eq!(disc.counts(), &[0.5, 0.5]);
    }

    #[test]
    fn discrete_bookkeeping() {
        let color = Variable::discrete("color", ["r", "g", "b"]);
        let mut d = Distribution::for_variable(&color).expect("discrete");
        d.add(&Value::Discrete(2), 2.0).expect("add");
        d.add(&Value::Discrete(0), 1.0).expect("add");
        d.add(&Value::Undefined, 1.0).expect("add");
        assert_eq!(d.mode(), Some(Value::Discrete(2)));
        assert_abs_diff_eq!(d.p(&Value::Discrete(2)), 2.0 / 3.0);
        assert_eq!(d.unknowns(), 1.0);
        assert!(d.add(&Value::Continuous(1.0), 1.0).is_err());
        assert!(Distribution::for_variable(&Variable::string("s")).is_err());
    }

    #[test]
    fn random_draws_follow_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let d = DiscDistribution::from_counts(vec![0.0, 1.0, 0.0]);
        for _ in 0..20 {
            assert_eq!(d.random(&mut rng).expect("draw"), 1);
        }
        let c = continuous(&[(5.0, 1.0)]);
        assert_eq!(c.random(&mut rng).expect("draw"), 5.0);
        assert!(ContDistribution::new(None).random(&mut rng).is_err());
    }
}
