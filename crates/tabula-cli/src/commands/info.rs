use serde_json::{Value, json};
use tabula_core::{ChecksumParts, Table};

use crate::cli::ReadArgs;
use crate::support::{print_json, read_input_or_exit, yes_no};

fn role(table: &Table, index: usize) -> &'static str {
    if table.domain().has_class() && index + 1 == table.domain().len() {
        "class"
    } else {
        "attribute"
    }
}

pub fn summary(path: &str, table: &Table) -> Value {
    let domain = table.domain();
    let variables: Vec<Value> = domain
        .variables()
        .iter()
        .enumerate()
        .map(|(index, variable)| {
            json!({
                "name": variable.name(),
                "kind": variable.kind(),
                "role": role(table, index),
                "values": variable.values(),
            })
        })
        .collect();
    let metas: Vec<Value> = domain
        .metas()
        .iter()
        .map(|meta| {
            json!({
                "id": meta.id,
                "name": meta.variable.name(),
                "kind": meta.variable.kind(),
                "optional": meta.optional,
            })
        })
        .collect();
    json!({
        "path": path,
        "rows": table.len(),
        "attributes": domain.attributes().len(),
        "class": domain.class_var().map(|v| v.name()),
        "variables": variables,
        "metas": metas,
        "has_missing": table.has_missing(),
        "has_missing_class": table.has_missing_class(),
        "checksum": table.checksum(ChecksumParts::VALUES).to_string(),
    })
}

pub fn run(path: String, read: ReadArgs, json_output: bool) {
    let (table, _) = read_input_or_exit(&path, &read);

    if json_output {
        print_json(&summary(&path, &table));
        return;
    }

    let domain = table.domain();
    println!("tabula info {path}");
    println!("  Rows: {}", table.len());
    println!("  Attributes: {}", domain.attributes().len());
    println!(
        "  Class: {}",
        domain.class_var().map_or("none", |v| v.name())
    );
    println!("  Metas: {}", domain.metas().len());
    println!("  Missing values: {}", yes_no(table.has_missing()));
    println!("  Missing class: {}", yes_no(table.has_missing_class()));
    println!("  Checksum: {}", table.checksum(ChecksumParts::VALUES));
    println!();
    for (index, variable) in domain.variables().iter().enumerate() {
        let labels = variable.values();
        if labels.is_empty() {
            println!("  {:<9} {} ({})", role(&table, index), variable.name(), variable.kind());
        } else {
            println!(
                "  {:<9} {} ({}: {})",
                role(&table, index),
                variable.name(),
                variable.kind(),
                labels.join(", ")
            );
        }
    }
    for meta in domain.metas() {
        println!(
            "  {:<9} {} ({}, id {})",
            "meta",
            meta.variable.name(),
            meta.variable.kind(),
            meta.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabula_core::{Domain, Value as Cell, Variable};

    #[test]
    fn summary_lists_roles_and_flags() {
        let domain = Domain::new(
            vec![Variable::continuous("x")],
            Some(Variable::discrete("y", ["no", "yes"])),
        )
        .expect("domain");
        let table = Table::from_rows(
            Arc::new(domain),
            vec![
                vec![Cell::Continuous(1.0), Cell::Discrete(1)],
                vec![Cell::Undefined, Cell::Discrete(0)],
            ],
        )
        .expect("table");
        let summary = summary("t.tab", &table);
        assert_eq!(summary["rows"], 2);
        assert_eq!(summary["class"], "y");
        assert_eq!(summary["variables"][0]["role"], "attribute");
        assert_eq!(summary["variables"][1]["role"], "class");
        assert_eq!(summary["variables"][1]["values"], json!(["no", "yes"]));
        assert_eq!(summary["has_missing"], true);
        assert_eq!(summary["has_missing_class"], false);
        assert_eq!(summary["checksum"].as_str().map(str::len), Some(64));
    }
}
