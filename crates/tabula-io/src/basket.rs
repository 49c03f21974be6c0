//! Basket files: one row per line, each line a comma-separated list of
//! `item` or `item=quantity` entries.
//!
//! Every distinct item becomes an optional continuous meta attribute and
//! rows hold the summed quantities of the items they mention.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tabula_core::{Domain, MetaId, RowRecord, Table, Value, VarKind, VariableRegistry, VariableRequest};

use crate::error::ReadError;

fn parse_item(entry: &str, line_no: usize) -> Result<(String, f64), ReadError> {
    match entry.split_once('=') {
        None => Ok((entry.trim().to_string(), 1.0)),
        Some((item, quantity)) => {
            let item = item.trim().to_string();
            let quantity = quantity.trim().parse::<f64>().map_err(|_| {
                ReadError::parse(line_no, format!("invalid number after '{item}='"))
            })?;
            Ok((item, quantity))
        }
    }
}

/// Reads baskets into a table without attributes.
///
/// Items already registered as metas of `source` keep their meta ids;
/// other items get fresh ids. Item variables come from `registry`, so a
/// name maps to the same variable across reads.
pub fn read_baskets(
    text: &str,
    registry: &mut VariableRegistry,
    source: Option<&Domain>,
) -> Result<Table, ReadError> {
    let mut lines: Vec<Vec<(String, f64)>> = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let items = line
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| parse_item(entry, index + 1))
            .collect::<Result<Vec<_>, _>>()?;
        lines.push(items);
    }

    let mut domain = Domain::new(Vec::new(), None)?;
    let mut ids: BTreeMap<String, MetaId> = BTreeMap::new();
    for (item, _) in lines.iter().flatten() {
        if ids.contains_key(item) {
            continue;
        }
        let (variable, _) = registry.make(&VariableRequest::new(item.clone(), VarKind::Continuous))?;
        let known = source
            .and_then(|d| d.meta_by_name(item))
            .filter(|m| m.variable == variable)
            .map(|m| m.id);
        let id = match known {
            Some(id) => {
                domain.add_meta(id, variable, true)?;
                id
            }
            None => domain.add_meta_variable(variable, true),
        };
        ids.insert(item.clone(), id);
    }

    let mut records = Vec::with_capacity(lines.len());
    for items in lines {
        let mut record = RowRecord::new(Vec::new());
        for (item, quantity) in items {
            let Some(&id) = ids.get(&item) else {
                continue;
            };
            let slot = record.metas.entry(id).or_insert(Value::Continuous(0.0));
            if let Value::Continuous(total) = slot {
                *total += quantity;
            }
        }
        records.push(record);
    }
    log::debug!("read {} baskets over {} items", records.len(), ids.len());
    Ok(Table::from_records(Arc::new(domain), records)?)
}

pub fn read_baskets_from_path(
    path: impl AsRef<Path>,
    registry: &mut VariableRegistry,
    source: Option<&Domain>,
) -> Result<Table, ReadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ReadError::io(path, e))?;
    read_baskets(&text, registry, source)
}
