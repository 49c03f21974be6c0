//! JSON snapshots of a table: its domain and its rows.
//!
//! Variables are stored by name, kind and labels. Loading reconciles them
//! through a [`VariableRegistry`], so discrete codes written by one
//! variable are remapped by label onto whatever variable the registry
//! hands back.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabula_core::{
    Domain, MetaId, RowId, RowRecord, Table, Value, VarKind, Variable, VariableRegistry,
    VariableRequest,
};

use crate::atomic::write_atomically;
use crate::error::ReadError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVariable {
    pub name: String,
    pub kind: VarKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ordered: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl StoredVariable {
    fn of(variable: &Variable) -> Self {
        Self {
            name: variable.name().to_string(),
            kind: variable.kind(),
            values: variable.values(),
            ordered: variable.is_ordered(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeta {
    pub id: MetaId,
    pub variable: StoredVariable,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDomain {
    pub variables: Vec<StoredVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<StoredVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metas: Vec<StoredMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMetaValue {
    pub id: MetaId,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: RowId,
    pub values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metas: Vec<StoredMetaValue>,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTable {
    pub domain: StoredDomain,
    pub rows: Vec<StoredRow>,
}

/// Label-based code translation for one stored variable.
struct Reconciled {
    variable: Variable,
    codes: Vec<i32>,
}

impl Reconciled {
    fn remap(&self, value: Value) -> Result<Value, ReadError> {
        match value {
            Value::Discrete(code) => usize::try_from(code)
                .ok()
                .and_then(|c| self.codes.get(c))
                .map(|&mapped| Value::Discrete(mapped))
                .ok_or_else(|| {
                    ReadError::Serialize(format!(
                        "code {code} has no label in '{}'",
                        self.variable.name()
                    ))
                }),
            other => Ok(other),
        }
    }
}

fn reconcile(
    stored: &StoredVariable,
    registry: &mut VariableRegistry,
) -> Result<Reconciled, ReadError> {
    let request = VariableRequest::new(stored.name.clone(), stored.kind);
    let request = if stored.ordered {
        request.ordered_values(&stored.values)
    } else {
        request.values(&stored.values)
    };
    let (variable, status) = registry.make(&request)?;
    log::trace!("reconciled '{}' with status {status:?}", stored.name);
    let codes = stored
        .values
        .iter()
        .map(|label| match variable.code_of(label) {
            Some(code) => Ok(code),
            None => Ok(variable.add_value(label)?),
        })
        .collect::<Result<Vec<_>, ReadError>>()?;
    Ok(Reconciled { variable, codes })
}

impl StoredTable {
    pub fn from_table(table: &Table) -> Self {
        let domain = table.domain();
        let stored_domain = StoredDomain {
            variables: domain.attributes().iter().map(StoredVariable::of).collect(),
            class: domain.class_var().map(StoredVariable::of),
            metas: domain
                .metas()
                .iter()
                .map(|m| StoredMeta {
                    id: m.id,
                    variable: StoredVariable::of(&m.variable),
                    optional: m.optional,
                })
                .collect(),
        };
        let rows = table
            .records()
            .into_iter()
            .map(|record| StoredRow {
                id: record.id.unwrap_or_else(RowId::mint),
                values: record.values,
                metas: record
                    .metas
                    .into_iter()
                    .map(|(id, value)| StoredMetaValue { id, value })
                    .collect(),
                weight: record.weight,
            })
            .collect();
        Self {
            domain: stored_domain,
            rows,
        }
    }

    /// Rebuilds the table, taking its variables from `registry`.
    pub fn into_table(self, registry: &mut VariableRegistry) -> Result<Table, ReadError> {
        let attributes = self
            .domain
            .variables
            .iter()
            .map(|v| reconcile(v, registry))
            .collect::<Result<Vec<_>, _>>()?;
        let class = self
            .domain
            .class
            .as_ref()
            .map(|v| reconcile(v, registry))
            .transpose()?;
        let mut columns: Vec<Reconciled> = attributes;
        let class_variable = class.as_ref().map(|c| c.variable.clone());
        let mut domain = Domain::new(
            columns.iter().map(|c| c.variable.clone()).collect(),
            class_variable,
        )?;
        columns.extend(class);

        let mut metas: BTreeMap<MetaId, Reconciled> = BTreeMap::new();
        for meta in &self.domain.metas {
            let reconciled = reconcile(&meta.variable, registry)?;
            domain.add_meta(meta.id, reconciled.variable.clone(), meta.optional)?;
            metas.insert(meta.id, reconciled);
        }

        let mut records = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.into_iter().enumerate() {
            if row.values.len() != columns.len() {
                return Err(ReadError::Serialize(format!(
                    "row {index} has {} values, domain has {}",
                    row.values.len(),
                    columns.len()
                )));
            }
            let values = row
                .values
                .into_iter()
                .zip(&columns)
                .map(|(value, column)| column.remap(value))
                .collect::<Result<Vec<_>, _>>()?;
            let mut overlay = BTreeMap::new();
            for entry in row.metas {
                let value = match metas.get(&entry.id) {
                    Some(meta) => meta.remap(entry.value)?,
                    None => entry.value,
                };
                overlay.insert(entry.id, value);
            }
            records.push(RowRecord {
                id: Some(row.id),
                values,
                metas: overlay,
                weight: row.weight,
            });
        }
        Ok(Table::from_records(Arc::new(domain), records)?)
    }
}

pub fn table_to_json(table: &Table) -> Result<String, ReadError> {
    serde_json::to_string_pretty(&StoredTable::from_table(table))
        .map_err(|e| ReadError::Serialize(e.to_string()))
}

pub fn table_from_json(text: &str, registry: &mut VariableRegistry) -> Result<Table, ReadError> {
    let stored: StoredTable =
        serde_json::from_str(text).map_err(|e| ReadError::Serialize(e.to_string()))?;
    stored.into_table(registry)
}

/// Writes a JSON snapshot of `table`, replacing `path` atomically.
pub fn save_table(path: impl AsRef<Path>, table: &Table) -> Result<(), ReadError> {
    let path = path.as_ref();
    let json = table_to_json(table)?;
    write_atomically(path, |writer| {
        writer
            .write_all(json.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| ReadError::io(path, e))
    })?;
    log::info!("saved {} rows to {}", table.len(), path.display());
    Ok(())
}

pub fn load_table(
    path: impl AsRef<Path>,
    registry: &mut VariableRegistry,
) -> Result<Table, ReadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ReadError::io(path, e))?;
    let table = table_from_json(&text, registry)?;
    log::debug!("loaded {} rows from {}", table.len(), path.display());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::tests::temp_path;

    fn colored() -> Table {
        let color = Variable::discrete("color", ["red", "blue"]);
        let mut domain = Domain::new(vec![Variable::continuous("x")], Some(color)).expect("domain");
        let note = domain.add_meta_variable(Variable::string("note"), true);
        let mut first = RowRecord::new(vec![Value::Continuous(1.5), Value::Discrete(0)]);
        first.metas.insert(note, Value::String("first".into()));
        first.weight = 2.0;
        let second = RowRecord::new(vec![Value::Undefined, Value::Discrete(1)]);
        Table::from_records(Arc::new(domain), vec![first, second]).expect("table")
    }

    #[test]
    fn save_and_load_keep_rows_ids_and_metas() {
        let table = colored();
        let path = temp_path("persist", "json");
        save_table(&path, &table).expect("save");

        let mut registry = VariableRegistry::new();
        let loaded = load_table(&path, &mut registry).expect("load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.id(0).expect("id"), table.id(0).expect("id"));
        assert_eq!(loaded.id(1).expect("id"), table.id(1).expect("id"));
        assert_eq!(loaded.weight(0).expect("weight"), 2.0);
        assert_eq!(loaded.get(0, "x").expect("x"), Value::Continuous(1.5));
        assert_eq!(loaded.get(1, "x").expect("x"), Value::Undefined);
        assert_eq!(loaded.get(0, "note").expect("note"), Value::String("first".into()));
        assert_eq!(loaded.get(1, "note").expect("note"), Value::Undefined);

        let class = loaded.domain().class_var().expect("class").clone();
        let label = |row| class.format(&loaded.get(row, "color").expect("color"));
        assert_eq!(label(0), "red");
        assert_eq!(label(1), "blue");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn codes_follow_labels_of_the_registered_variable() {
        let json = table_to_json(&colored()).expect("json");
        let mut registry = VariableRegistry::new();
        // Presorted, so blue takes code 0 here.
        let (color, _) = registry
            .make(&VariableRequest::new("color", VarKind::Discrete).values(["red", "blue"]))
            .expect("make");
        assert_eq!(color.code_of("blue"), Some(0));

        let loaded = table_from_json(&json, &mut registry).expect("load");
        let class = loaded.domain().class_var().expect("class");
        assert_eq!(class, &color);
        assert_eq!(loaded.get(0, "color").expect("color"), Value::Discrete(1));
        assert_eq!(class.format(&loaded.get(0, "color").expect("color")), "red");
    }

    #[test]
    fn repeated_loads_share_variables() {
        let json = table_to_json(&colored()).expect("json");
        let mut registry = VariableRegistry::new();
        let a = table_from_json(&json, &mut registry).expect("first");
        let b = table_from_json(&json, &mut registry).expect("second");
        assert_eq!(a.domain().variables(), b.domain().variables());
        assert_eq!(a.domain().metas(), b.domain().metas());
    }

    #[test]
    fn stray_codes_are_rejected() {
        let mut stored = StoredTable::from_table(&colored());
        stored.rows[0].values[1] = Value::Discrete(7);
        let mut registry = VariableRegistry::new();
        let err = stored.into_table(&mut registry).unwrap_err();
        assert!(matches!(err, ReadError::Serialize(_)));
    }

    #[test]
    fn snapshot_shape_is_stable() {
        let stored = StoredTable::from_table(&colored());
        let value = serde_json::json!({
            "variables": stored.domain.variables,
            "class": stored.domain.class,
            "meta": stored.domain.metas[0].variable,
            "row": stored.rows[1].values,
        });
        insta::assert_json_snapshot!(value, @r#"
        {
          "class": {
            "kind": "discrete",
            "name": "color",
            "values": [
              "red",
              "blue"
            ]
          },
          "meta": {
            "kind": "string",
            "name": "note"
          },
          "row": [
            {
              "kind": "undefined"
            },
            {
              "kind": "discrete",
              "value": 1
            }
          ],
          "variables": [
            {
              "kind": "continuous",
              "name": "x"
            }
          ]
        }
        "#);
    }
}
