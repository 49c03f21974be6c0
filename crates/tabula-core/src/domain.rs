//! Ordered schema: attributes, an optional class and registered metas.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::key::Key;
use crate::variable::{VarKind, Variable};

/// Process-unique meta attribute id, never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaId(pub i64);

static NEXT_META_ID: AtomicI64 = AtomicI64::new(1);

impl MetaId {
    pub fn mint() -> Self {
        Self(NEXT_META_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Keeps future mints clear of an id restored from elsewhere.
    pub fn observe(id: MetaId) {
        NEXT_META_ID.fetch_max(id.0.saturating_add(1), AtomicOrdering::Relaxed);
    }
}

impl fmt::Display for MetaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "meta#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaDescriptor {
    pub id: MetaId,
    pub variable: Variable,
    /// Optional metas may be absent from rows without meaning "missing".
    pub optional: bool,
}

/// Where a resolved key points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Column(usize),
    Meta(MetaId),
}

/// Which sequence negative positions count back from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Attributes,
    Variables,
}

/// Class designation when deriving a domain from keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ClassSpec {
    /// Keep the source class if it is among the selected variables.
    #[default]
    Inherit,
    /// No class variable.
    None,
    /// The last selected variable is the class.
    LastIsClass,
    /// The variable this key resolves to is the class.
    Key(Key),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    variables: Vec<Variable>,
    has_class: bool,
    metas: Vec<MetaDescriptor>,
}

impl Domain {
    pub fn new(attributes: Vec<Variable>, class: Option<Variable>) -> Result<Self> {
        let has_class = class.is_some();
        let mut variables = attributes;
        variables.extend(class);
        Self::from_variables(variables, has_class)
    }

    /// Builds a domain whose last variable is the class when `has_class`.
    pub fn from_variables(variables: Vec<Variable>, has_class: bool) -> Result<Self> {
        if has_class && variables.is_empty() {
            return Err(DataError::invalid("a class requires at least one variable"));
        }
        for (i, variable) in variables.iter().enumerate() {
            if variables[..i].iter().any(|v| v.name() == variable.name()) {
                return Err(DataError::invalid(format!(
                    "duplicate variable name '{}' in domain",
                    variable.name()
                )));
            }
        }
        Ok(Self {
            variables,
            has_class,
            metas: Vec::new(),
        })
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn attributes(&self) -> &[Variable] {
        let end = self.variables.len() - usize::from(self.has_class);
        &self.variables[..end]
    }

    pub fn class_var(&self) -> Option<&Variable> {
        if self.has_class {
            self.variables.last()
        } else {
            None
        }
    }

    pub fn has_class(&self) -> bool {
        self.has_class
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn index_of(&self, variable: &Variable) -> Option<usize> {
        self.variables.iter().position(|v| v == variable)
    }

    /// Column position of a key, or the reason it does not address a column.
    pub fn position(&self, key: &Key, scope: Scope) -> Result<usize> {
        match key {
            Key::Position(index) => {
                let len = match scope {
                    Scope::Attributes => self.attributes().len(),
                    Scope::Variables => self.variables.len(),
                };
                resolve_position(*index, len)
            }
            Key::Meta(_) => Err(DataError::WrongKeyType {
                key: key.to_string(),
                context: "address a column",
            }),
            _ => match self.resolve(key)? {
                Slot::Column(index) => Ok(index),
                Slot::Meta(_) => Err(DataError::WrongKeyType {
                    key: key.to_string(),
                    context: "address a column",
                }),
            },
        }
    }

    /// Resolves a key to a column or a registered meta attribute.
    pub fn resolve(&self, key: &Key) -> Result<Slot> {
        match key {
            Key::Position(index) => {
                resolve_position(*index, self.variables.len()).map(Slot::Column)
            }
            Key::Name(name) => {
                if let Some(index) = self.variables.iter().position(|v| v.name() == name) {
                    Ok(Slot::Column(index))
                } else if let Some(meta) = self.metas.iter().find(|m| m.variable.name() == name) {
                    Ok(Slot::Meta(meta.id))
                } else {
                    Err(DataError::not_found(format!("variable {key}")))
                }
            }
            Key::Var(id) => {
                if let Some(index) = self.variables.iter().position(|v| v.id() == *id) {
                    Ok(Slot::Column(index))
                } else if let Some(meta) = self.metas.iter().find(|m| m.variable.id() == *id) {
                    Ok(Slot::Meta(meta.id))
                } else {
                    Err(DataError::not_found(format!("variable {key}")))
                }
            }
            Key::Meta(id) => self
                .meta_by_id(*id)
                .map(|m| Slot::Meta(m.id))
                .ok_or_else(|| DataError::not_found(format!("{id}"))),
        }
    }

    /// The variable a key addresses, column or meta.
    pub fn variable(&self, key: &Key) -> Result<&Variable> {
        match self.resolve(key)? {
            Slot::Column(index) => Ok(&self.variables[index]),
            Slot::Meta(id) => self
                .meta_by_id(id)
                .map(|m| &m.variable)
                .ok_or_else(|| DataError::not_found(format!("{id}"))),
        }
    }

    pub fn metas(&self) -> &[MetaDescriptor] {
        &self.metas
    }

    pub fn meta_by_id(&self, id: MetaId) -> Option<&MetaDescriptor> {
        self.metas.iter().find(|m| m.id == id)
    }

    pub fn meta_by_name(&self, name: &str) -> Option<&MetaDescriptor> {
        self.metas.iter().find(|m| m.variable.name() == name)
    }

    /// Finds a meta registration by id, name or variable identity.
    pub fn meta(&self, key: &Key) -> Option<&MetaDescriptor> {
        match key {
            Key::Meta(id) => self.meta_by_id(*id),
            Key::Name(name) => self.meta_by_name(name),
            Key::Var(id) => self.metas.iter().find(|m| m.variable.id() == *id),
            Key::Position(_) => None,
        }
    }

    pub fn has_meta(&self, key: &Key) -> bool {
        self.meta(key).is_some()
    }

    pub fn add_meta(&mut self, id: MetaId, variable: Variable, optional: bool) -> Result<()> {
        if let Some(existing) = self.meta_by_id(id) {
            return Err(DataError::invalid(format!(
                "{id} is already registered for '{}'",
                existing.variable.name()
            )));
        }
        MetaId::observe(id);
        self.metas.push(MetaDescriptor {
            id,
            variable,
            optional,
        });
        Ok(())
    }

    /// Registers a meta attribute under a freshly minted id.
    pub fn add_meta_variable(&mut self, variable: Variable, optional: bool) -> MetaId {
        let id = MetaId::mint();
        self.metas.push(MetaDescriptor {
            id,
            variable,
            optional,
        });
        id
    }

    /// Drops a registration; rows keep their values, only visibility changes.
    pub fn remove_meta(&mut self, key: &Key) -> Result<MetaDescriptor> {
        let id = self
            .meta(key)
            .map(|m| m.id)
            .ok_or_else(|| DataError::not_found(format!("meta attribute {key}")))?;
        let index = self
            .metas
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| DataError::not_found(format!("{id}")))?;
        Ok(self.metas.remove(index))
    }

    /// Builds a domain from keys resolved against `source`.
    pub fn select(source: &Domain, keys: &[Key], class: ClassSpec) -> Result<Self> {
        let mut variables = Vec::with_capacity(keys.len());
        for key in keys {
            let variable = source.variable(key)?.clone();
            if variables.contains(&variable) {
                return Err(DataError::invalid(format!(
                    "variable '{}' selected twice",
                    variable.name()
                )));
            }
            variables.push(variable);
        }

        let class_var = match class {
            ClassSpec::None => None,
            ClassSpec::LastIsClass => variables.pop(),
            ClassSpec::Inherit => source.class_var().and_then(|class| {
                let index = variables.iter().position(|v| v == class)?;
                Some(variables.remove(index))
            }),
            ClassSpec::Key(key) => {
                let class = source.variable(&key)?.clone();
                variables.retain(|v| v != &class);
                Some(class)
            }
        };

        let mut domain = Self::new(variables, class_var)?;
        domain.metas = source
            .metas
            .iter()
            .filter(|m| !domain.variables.contains(&m.variable))
            .cloned()
            .collect();
        Ok(domain)
    }

    /// Columns of `source` holding each of this domain's variables, if all do.
    pub fn projection_of(&self, source: &Domain) -> Option<Vec<usize>> {
        self.variables
            .iter()
            .map(|v| source.index_of(v))
            .collect()
    }

    pub fn has_continuous_attributes(&self, include_class: bool) -> bool {
        self.has_kind(VarKind::Continuous, include_class)
    }

    pub fn has_discrete_attributes(&self, include_class: bool) -> bool {
        self.has_kind(VarKind::Discrete, include_class)
    }

    fn has_kind(&self, kind: VarKind, include_class: bool) -> bool {
        let scanned = if include_class {
            &self.variables[..]
        } else {
            self.attributes()
        };
        scanned.iter().any(|v| v.kind() == kind)
    }
}

fn resolve_position(index: i64, len: usize) -> Result<usize> {
    let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
    let absolute = if index < 0 { index + signed_len } else { index };
    usize::try_from(absolute)
        .ok()
        .filter(|&i| i < len)
        .ok_or(DataError::IndexOutOfRange { index, len })
}
