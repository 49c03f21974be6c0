//! Variable registry: reconciles variable identity by name.
//!
//! Independently built schemas refer to "the same" variable by asking the
//! registry for it. The registry is an explicit session object; nothing in
//! this crate consults a global instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::variable::{VarId, VarKind, Variable, VariableBuilder};

/// How well an existing variable matches a request, best first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MakeStatus {
    /// All requested labels are already known.
    Ok,
    /// Some requested labels are new and would be appended.
    MissingValues,
    /// None of the requested labels is known.
    NoRecognizedValues,
    /// The requested label order contradicts the existing codes.
    Incompatible,
    /// No variable with this name and kind is registered.
    NotFound,
}

/// A request for a variable by name.
#[derive(Debug, Clone)]
pub struct VariableRequest {
    pub name: String,
    pub kind: VarKind,
    /// Labels whose relative order matters.
    pub ordered_values: Vec<String>,
    /// Labels appended in presorted order.
    pub values: Vec<String>,
    /// Create a fresh variable when the best match is this bad or worse.
    pub create_new_on: MakeStatus,
}

impl VariableRequest {
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ordered_values: Vec::new(),
            values: Vec::new(),
            create_new_on: MakeStatus::Incompatible,
        }
    }

    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn ordered_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ordered_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn create_new_on(mut self, status: MakeStatus) -> Self {
        self.create_new_on = status;
        self
    }

    fn requested(&self) -> impl Iterator<Item = &String> {
        self.ordered_values.iter().chain(&self.values)
    }
}

/// Session-scoped registry of variables.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    by_name: BTreeMap<String, Vec<Variable>>,
    by_id: BTreeMap<VarId, Variable>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes an existing variable available for reuse.
    pub fn register(&mut self, variable: &Variable) {
        if self.by_id.contains_key(&variable.id()) {
            return;
        }
        self.by_id.insert(variable.id(), variable.clone());
        self.by_name
            .entry(variable.name().to_string())
            .or_default()
            .push(variable.clone());
    }

    pub fn get(&self, id: VarId) -> Option<&Variable> {
        self.by_id.get(&id)
    }

    pub fn candidates(&self, name: &str) -> &[Variable] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Finds the best matching registered variable without changing anything.
    pub fn retrieve(&self, request: &VariableRequest) -> (Option<Variable>, MakeStatus) {
        let mut best: Option<(&Variable, MakeStatus)> = None;
        for candidate in self.candidates(&request.name) {
            if candidate.kind() != request.kind {
                continue;
            }
            let status = classify(candidate, request);
            if best.is_none_or(|(_, current)| status < current) {
                best = Some((candidate, status));
            }
        }
        match best {
            Some((variable, status)) => (Some(variable.clone()), status),
            None => (None, MakeStatus::NotFound),
        }
    }

    /// Returns a reused or fresh variable satisfying the request.
    ///
    /// A reused discrete variable gains the requested labels it lacked.
    pub fn make(&mut self, request: &VariableRequest) -> Result<(Variable, MakeStatus)> {
        let (found, status) = self.retrieve(request);
        if let Some(variable) = found
            && status < request.create_new_on
        {
            if variable.kind() == VarKind::Discrete {
                for label in &request.ordered_values {
                    variable.add_value(label)?;
                }
                for label in presort_values(&request.values) {
                    variable.add_value(&label)?;
                }
            }
            log::debug!(
                "registry reused '{}' ({}) with status {status:?}",
                variable.name(),
                variable.id()
            );
            return Ok((variable, status));
        }

        let mut labels = request.ordered_values.clone();
        for label in presort_values(&request.values) {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        let variable = VariableBuilder::new(request.name.clone(), request.kind)
            .labels(labels)
            .ordered(!request.ordered_values.is_empty())
            .build();
        self.register(&variable);
        log::debug!(
            "registry created '{}' ({}) with status {status:?}",
            variable.name(),
            variable.id()
        );
        Ok((variable, status))
    }
}

fn classify(candidate: &Variable, request: &VariableRequest) -> MakeStatus {
    if candidate.kind() != VarKind::Discrete {
        return MakeStatus::Ok;
    }
    let existing = candidate.values();
    if existing.is_empty() {
        return MakeStatus::Ok;
    }

    // Ordered labels must extend the existing labels position by position.
    if request
        .ordered_values
        .iter()
        .zip(&existing)
        .any(|(requested, known)| requested != known)
    {
        return MakeStatus::Incompatible;
    }

    let mut requested = 0usize;
    let mut recognized = 0usize;
    for label in request.requested() {
        requested += 1;
        if existing.contains(label) {
            recognized += 1;
        }
    }
    if requested == 0 || recognized == requested {
        MakeStatus::Ok
    } else if recognized == 0 {
        MakeStatus::NoRecognizedValues
    } else {
        MakeStatus::MissingValues
    }
}

const LEADING_LABELS: [&str; 4] = ["no", "none", "absent", "normal"];

/// Orders unordered labels: negative-sounding labels first, then numbers
/// numerically or everything else alphabetically.
pub fn presort_values(values: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(value) {
            unique.push(value.clone());
        }
    }

    let mut leading = Vec::new();
    for label in LEADING_LABELS {
        if let Some(pos) = unique.iter().position(|v| v.eq_ignore_ascii_case(label)) {
            leading.push(unique.remove(pos));
        }
    }

    let numeric: Option<Vec<f64>> = unique.iter().map(|v| v.parse::<f64>().ok()).collect();
    match numeric {
        Some(keys) if !unique.is_empty() => {
            let mut keyed: Vec<(f64, String)> = keys.into_iter().zip(unique).collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            leading.extend(keyed.into_iter().map(|(_, v)| v));
        }
        _ => {
            unique.sort();
            leading.extend(unique);
        }
    }
    leading
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discrete(name: &str, values: &[&str]) -> VariableRequest {
        VariableRequest::new(name, VarKind::Discrete).values(values.iter().copied())
    }

    #[test]
    fn reuse_appends_missing_labels() {
        let mut registry = VariableRegistry::new();
        let (first, status) = registry
            .make(&discrete("color", &["red", "blue"]))
            .expect("make should succeed");
        assert_eq!(status, MakeStatus::NotFound);

        let (second, status) = registry
            .make(&discrete("color", &["red", "green"]))
            .expect("make should succeed");
        assert_eq!(status, MakeStatus::MissingValues);
        assert_eq!(first, second);
        assert_eq!(first.values(), vec!["blue", "red", "green"]);
    }

    #[test]
    fn known_labels_report_ok() {
        let mut registry = VariableRegistry::new();
        let (first, _) = registry.make(&discrete("c", &["a", "b"])).expect("make");
        let (second, status) = registry.make(&discrete("c", &["b"])).expect("make");
        assert_eq!(status, MakeStatus::Ok);
        assert_eq!(first, second);
    }

    #[test]
    fn unrecognized_labels_are_appended_by_default() {
        let mut registry = VariableRegistry::new();
        let (first, _) = registry
            .make(&discrete("c", &["a", "b", "c", "d"]))
            .expect("make");
        let (second, status) = registry.make(&discrete("c", &["e"])).expect("make");
        assert_eq!(status, MakeStatus::NoRecognizedValues);
        assert_eq!(first, second);
        assert_eq!(second.values(), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(registry.candidates("c").len(), 1);
    }

    #[test]
    fn lowered_threshold_creates_fresh_variable() {
        let mut registry = VariableRegistry::new();
        let (first, _) = registry.make(&discrete("c", &["a", "b"])).expect("make");
        let request = discrete("c", &["x", "y"]).create_new_on(MakeStatus::NoRecognizedValues);
        let (second, status) = registry.make(&request).expect("make");
        assert_eq!(status, MakeStatus::NoRecognizedValues);
        assert_ne!(first, second);
        assert_eq!(first.values(), vec!["a", "b"]);
        assert_eq!(second.values(), vec!["x", "y"]);
        assert_eq!(registry.candidates("c").len(), 2);
    }

    #[test]
    fn ordered_labels_must_match_by_position() {
        let mut registry = VariableRegistry::new();
        let ab = VariableRequest::new("grade", VarKind::Discrete).ordered_values(["a", "b"]);
        let (first, _) = registry.make(&ab).expect("make");

        let b_only = VariableRequest::new("grade", VarKind::Discrete).ordered_values(["b"]);
        let (second, status) = registry.make(&b_only).expect("make");
        assert_eq!(status, MakeStatus::Incompatible);
        assert_ne!(first, second);
        assert_eq!(second.values(), vec!["b"]);

        let abc = VariableRequest::new("grade", VarKind::Discrete).ordered_values(["a", "b", "c"]);
        let (third, status) = registry.make(&abc).expect("make");
        assert_eq!(status, MakeStatus::MissingValues);
        assert_eq!(first, third);
        assert_eq!(first.values(), vec!["a", "b", "c"]);
    }

    #[test]
    fn conflicting_order_is_incompatible() {
        let mut registry = VariableRegistry::new();
        let low_high = VariableRequest::new("size", VarKind::Discrete)
            .ordered_values(["low", "high"]);
        let (first, _) = registry.make(&low_high).expect("make");
        assert!(first.is_ordered());

        let high_low = VariableRequest::new("size", VarKind::Discrete)
            .ordered_values(["high", "low"])
            .create_new_on(MakeStatus::NotFound);
        let (_, status) = registry.retrieve(&high_low);
        assert_eq!(status, MakeStatus::Incompatible);

        let (second, status) = registry
            .make(&high_low.create_new_on(MakeStatus::Incompatible))
            .expect("make");
        assert_eq!(status, MakeStatus::Incompatible);
        assert_ne!(first, second);
    }

    #[test]
    fn create_new_on_ok_always_creates() {
        let mut registry = VariableRegistry::new();
        let request = VariableRequest::new("x", VarKind::Continuous);
        let (first, _) = registry.make(&request).expect("make");
        let (same, status) = registry.make(&request).expect("make");
        assert_eq!(status, MakeStatus::Ok);
        assert_eq!(first, same);
        let (fresh, _) = registry
            .make(&request.clone().create_new_on(MakeStatus::Ok))
            .expect("make");
        assert_ne!(first, fresh);
    }

    #[test]
    fn kind_must_match() {
        let mut registry = VariableRegistry::new();
        let (cont, _) = registry
            .make(&VariableRequest::new("v", VarKind::Continuous))
            .expect("make");
        let (disc, status) = registry.make(&discrete("v", &["a"])).expect("make");
        assert_eq!(status, MakeStatus::NotFound);
        assert_ne!(cont, disc);
        assert_eq!(registry.get(disc.id()), Some(&disc));
    }

    #[test]
    fn presort_puts_negatives_first() {
        let sorted = presort_values(&["yes".into(), "maybe".into(), "no".into()]);
        assert_eq!(sorted, vec!["no", "maybe", "yes"]);
        let numbers = presort_values(&["10".into(), "9".into(), "1".into()]);
        assert_eq!(numbers, vec!["1", "9", "10"]);
    }
}
