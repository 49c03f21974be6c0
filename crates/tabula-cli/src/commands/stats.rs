use serde_json::{Value, json};
use tabula_core::{
    BasicAttrStat, DiscDistribution, Distribution, DomainBasicAttrStat, DomainDistributions,
    Table, Variable,
};

use crate::cli::ReadArgs;
use crate::support::{fail, number, print_json, read_input_or_exit};

fn discrete_entry(variable: &Variable, distribution: &DiscDistribution) -> Value {
    let counts: Vec<Value> = distribution
        .counts()
        .iter()
        .enumerate()
        .map(|(code, count)| {
            let label = i32::try_from(code)
                .ok()
                .and_then(|c| variable.label_of(c))
                .unwrap_or_default();
            json!({ "label": label, "count": count })
        })
        .collect();
    json!({
        "name": variable.name(),
        "kind": variable.kind(),
        "counts": counts,
        "mode": distribution.mode().and_then(|c| variable.label_of(c)),
        "unknowns": distribution.unknowns(),
    })
}

fn continuous_entry(variable: &Variable, stat: &BasicAttrStat, unknowns: f64) -> Value {
    let empty = stat.n == 0.0;
    json!({
        "name": variable.name(),
        "kind": variable.kind(),
        "n": stat.n,
        "min": (!empty).then_some(stat.min),
        "max": (!empty).then_some(stat.max),
        "avg": stat.avg(),
        "dev": stat.dev(),
        "unknowns": unknowns,
    })
}

pub fn statistics(table: &Table, weighted: bool) -> Result<Vec<Value>, String> {
    let distributions = DomainDistributions::from_table(table, weighted, false, false)
        .map_err(|e| e.to_string())?;
    let stats = DomainBasicAttrStat::from_table(table, weighted).map_err(|e| e.to_string())?;
    let entries = table
        .domain()
        .variables()
        .iter()
        .enumerate()
        .map(|(index, variable)| match (distributions.get(index), stats.get(index)) {
            (Some(Distribution::Discrete(d)), _) => discrete_entry(variable, d),
            (distribution, Some(stat)) => continuous_entry(
                variable,
                stat,
                distribution.map_or(0.0, Distribution::unknowns),
            ),
            _ => json!({ "name": variable.name(), "kind": variable.kind() }),
        })
        .collect();
    Ok(entries)
}

pub fn run(path: String, read: ReadArgs, weighted: bool, json_output: bool) {
    let (table, _) = read_input_or_exit(&path, &read);
    let entries = statistics(&table, weighted).unwrap_or_else(|e| fail(e));

    if json_output {
        print_json(&json!({
            "path": path,
            "rows": table.len(),
            "weighted": weighted,
            "variables": entries,
        }));
        return;
    }

    println!("tabula stats {path}");
    println!("  Rows: {}", table.len());
    for entry in &entries {
        println!();
        println!(
            "  {} ({})",
            entry["name"].as_str().unwrap_or_default(),
            entry["kind"].as_str().unwrap_or_default()
        );
        if let Some(counts) = entry["counts"].as_array() {
            for count in counts {
                println!(
                    "    {:<20} {}",
                    count["label"].as_str().unwrap_or_default(),
                    count["count"].as_f64().map_or_else(|| "-".to_string(), number)
                );
            }
        } else if entry.get("n").is_some() {
            for field in ["n", "min", "max", "avg", "dev"] {
                let shown = entry[field].as_f64().map_or_else(|| "-".to_string(), number);
                println!("    {field:<4} {shown}");
            }
        }
        if let Some(unknowns) = entry["unknowns"].as_f64()
            && unknowns > 0.0
        {
            println!("    unknown {}", number(unknowns));
        }
    }
}
