//! Typed column descriptors.
//!
//! A [`Variable`] is compared by identity: two variables built separately
//! under the same name are different variables unless the
//! [`VariableRegistry`](crate::registry::VariableRegistry) hands out the
//! same one. Discrete label lists only ever grow, so codes stay valid for
//! every value already stored.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::example::Example;
use crate::value::Value;

/// Tokens that read as an undefined value regardless of variable kind.
pub const UNDEFINED_TOKENS: [&str; 6] = ["", "?", ".", "~", "*", "NA"];

pub fn is_undefined_token(text: &str) -> bool {
    UNDEFINED_TOKENS.contains(&text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Continuous,
    Discrete,
    String,
}

impl VarKind {
    pub fn is_primitive(self) -> bool {
        !matches!(self, Self::String)
    }
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Continuous => "continuous",
            Self::Discrete => "discrete",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Process-unique variable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub u64);

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

impl VarId {
    fn mint() -> Self {
        Self(NEXT_VAR_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}

type ComputeFn = dyn Fn(&Example) -> Value + Send + Sync;

/// Derives a variable's value from an example of another domain.
#[derive(Clone)]
pub struct ComputeValue(Arc<ComputeFn>);

impl ComputeValue {
    pub fn new(f: impl Fn(&Example) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn compute(&self, example: &Example) -> Value {
        (self.0)(example)
    }
}

impl fmt::Debug for ComputeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputeValue(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjust {
    FirstLiteral,
    Widen,
    Fixed,
}

#[derive(Debug, Clone, Copy)]
struct Precision {
    decimals: usize,
    adjust: Adjust,
    scientific: bool,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            decimals: 3,
            adjust: Adjust::FirstLiteral,
            scientific: false,
        }
    }
}

#[derive(Debug)]
struct VariableData {
    id: VarId,
    name: String,
    kind: VarKind,
    ordered: bool,
    labels: RwLock<Vec<String>>,
    precision: RwLock<Precision>,
    compute: Option<ComputeValue>,
}

/// Builder for variables that need more than a name and a label list.
#[derive(Debug)]
pub struct VariableBuilder {
    name: String,
    kind: VarKind,
    labels: Vec<String>,
    ordered: bool,
    decimals: Option<usize>,
    compute: Option<ComputeValue>,
}

impl VariableBuilder {
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            labels: Vec::new(),
            ordered: false,
            decimals: None,
            compute: None,
        }
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for label in labels {
            let label = label.into();
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn compute(mut self, compute: ComputeValue) -> Self {
        self.compute = Some(compute);
        self
    }

    pub fn build(self) -> Variable {
        let mut precision = Precision::default();
        if let Some(decimals) = self.decimals {
            precision.decimals = decimals;
            precision.adjust = Adjust::Fixed;
        }
        Variable(Arc::new(VariableData {
            id: VarId::mint(),
            name: self.name,
            kind: self.kind,
            ordered: self.ordered,
            labels: RwLock::new(self.labels),
            precision: RwLock::new(precision),
            compute: self.compute,
        }))
    }
}

/// A typed column descriptor with identity semantics.
#[derive(Clone)]
pub struct Variable(Arc<VariableData>);

impl Variable {
    pub fn continuous(name: impl Into<String>) -> Self {
        VariableBuilder::new(name, VarKind::Continuous).build()
    }

    pub fn discrete<I, S>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VariableBuilder::new(name, VarKind::Discrete)
            .labels(labels)
            .build()
    }

    pub fn string(name: impl Into<String>) -> Self {
        VariableBuilder::new(name, VarKind::String).build()
    }

    pub fn id(&self) -> VarId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> VarKind {
        self.0.kind
    }

    pub fn is_primitive(&self) -> bool {
        self.0.kind.is_primitive()
    }

    pub fn is_ordered(&self) -> bool {
        self.0.ordered
    }

    pub fn compute_value(&self) -> Option<&ComputeValue> {
        self.0.compute.as_ref()
    }

    /// Discrete labels in code order (empty for other kinds).
    pub fn values(&self) -> Vec<String> {
        self.0.labels.read().clone()
    }

    pub fn value_count(&self) -> usize {
        self.0.labels.read().len()
    }

    pub fn code_of(&self, label: &str) -> Option<i32> {
        self.0
            .labels
            .read()
            .iter()
            .position(|l| l == label)
            .and_then(|p| i32::try_from(p).ok())
    }

    pub fn label_of(&self, code: i32) -> Option<String> {
        let index = usize::try_from(code).ok()?;
        self.0.labels.read().get(index).cloned()
    }

    /// Appends `label` unless present; returns its code either way.
    pub fn add_value(&self, label: &str) -> Result<i32> {
        self.require_kind(VarKind::Discrete, "add a value to")?;
        let mut labels = self.0.labels.write();
        let index = match labels.iter().position(|l| l == label) {
            Some(index) => index,
            None => {
                labels.push(label.to_string());
                log::debug!("variable '{}' gained value '{label}'", self.0.name);
                labels.len() - 1
            }
        };
        i32::try_from(index).map_err(|_| DataError::invalid("too many discrete values"))
    }

    pub fn decimals(&self) -> usize {
        self.0.precision.read().decimals
    }

    /// Fixes the number of decimals; literals no longer widen it.
    pub fn set_decimals(&self, decimals: usize) {
        let mut precision = self.0.precision.write();
        precision.decimals = decimals;
        precision.adjust = Adjust::Fixed;
    }

    pub fn set_scientific(&self, scientific: bool) {
        self.0.precision.write().scientific = scientific;
    }

    fn require_kind(&self, kind: VarKind, action: &str) -> Result<()> {
        if self.0.kind == kind {
            Ok(())
        } else {
            Err(DataError::invalid(format!(
                "cannot {action} {} variable '{}'",
                self.0.kind, self.0.name
            )))
        }
    }

    fn observe_literal(&self, literal: &str) {
        let mantissa = literal.split(['e', 'E']).next().unwrap_or(literal);
        let decimals = mantissa
            .split_once('.')
            .map_or(0, |(_, fraction)| fraction.len());
        let scientific = mantissa.len() != literal.len();
        let mut precision = self.0.precision.write();
        match precision.adjust {
            Adjust::FirstLiteral => {
                precision.decimals = decimals;
                precision.scientific |= scientific;
                precision.adjust = Adjust::Widen;
            }
            Adjust::Widen => {
                precision.decimals = precision.decimals.max(decimals);
                precision.scientific |= scientific;
            }
            Adjust::Fixed => {}
        }
    }

    /// Parses text into a value of this variable; unknown discrete labels fail.
    pub fn parse(&self, text: &str) -> Result<Value> {
        self.parse_inner(text, false)
    }

    /// Like [`parse`](Self::parse) but appends unknown discrete labels.
    pub fn parse_add(&self, text: &str) -> Result<Value> {
        self.parse_inner(text, true)
    }

    fn parse_inner(&self, text: &str, add: bool) -> Result<Value> {
        let text = text.trim();
        if is_undefined_token(text) {
            return Ok(Value::Undefined);
        }
        match self.0.kind {
            VarKind::Continuous => {
                let x: f64 = text.parse().map_err(|_| {
                    DataError::invalid(format!("'{text}' is not a number ('{}')", self.0.name))
                })?;
                if !x.is_finite() {
                    return Err(DataError::invalid(format!(
                        "'{text}' is not a finite number ('{}')",
                        self.0.name
                    )));
                }
                self.observe_literal(text);
                Ok(Value::Continuous(x))
            }
            VarKind::Discrete => match self.code_of(text) {
                Some(code) => Ok(Value::Discrete(code)),
                None if add => Ok(Value::Discrete(self.add_value(text)?)),
                None => Err(DataError::invalid(format!(
                    "'{text}' is not a value of '{}'",
                    self.0.name
                ))),
            },
            VarKind::String => Ok(Value::String(text.to_string())),
        }
    }

    /// Renders a value the way readers accept it back.
    pub fn format(&self, value: &Value) -> String {
        match value {
            Value::Undefined => "?".to_string(),
            Value::Continuous(x) => {
                let precision = *self.0.precision.read();
                if precision.scientific {
                    format!("{:.*e}", precision.decimals, x)
                } else {
                    format!("{:.*}", precision.decimals, x)
                }
            }
            Value::Discrete(code) => self.label_of(*code).unwrap_or_else(|| format!("#{code}")),
            Value::String(s) => s.clone(),
        }
    }

    /// Rejects values that cannot be stored in a slot of this variable.
    pub fn check(&self, value: &Value) -> Result<()> {
        match (self.0.kind, value) {
            (VarKind::Continuous, Value::Continuous(x)) if x.is_nan() => {
                Err(DataError::invalid(format!(
                    "NaN stored in '{}'; use an undefined value for missing data",
                    self.0.name
                )))
            }
            (_, Value::Undefined)
            | (VarKind::Continuous, Value::Continuous(_))
            | (VarKind::String, Value::String(_)) => Ok(()),
            (VarKind::Discrete, Value::Discrete(code)) => {
                let count = self.value_count();
                if usize::try_from(*code).is_ok_and(|c| c < count) {
                    Ok(())
                } else {
                    Err(DataError::invalid(format!(
                        "code {code} is out of range for '{}' ({count} values)",
                        self.0.name
                    )))
                }
            }
            (expected, other) => Err(DataError::TypeMismatch {
                variable: self.0.name.clone(),
                expected,
                found: other.kind_name(),
            }),
        }
    }

    /// Equality as this variable sees it; continuous values compare at
    /// the variable's decimal precision.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Continuous(x), Value::Continuous(y)) => {
                if self.format(a) == self.format(b) {
                    Ordering::Equal
                } else {
                    x.total_cmp(y)
                }
            }
            _ => a.total_cmp(b),
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .finish()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}
