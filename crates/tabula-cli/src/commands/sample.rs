use serde_json::json;
use tabula_core::{RandomIndicesCv, Table};

use crate::cli::{ReadArgs, StratifiedArg};
use crate::support::{fail, print_json, read_input_or_exit, write_output};

pub struct Args {
    pub path: String,
    pub read: ReadArgs,
    pub folds: usize,
    pub fold: i64,
    pub seed: u64,
    pub stratified: StratifiedArg,
    pub output: Option<String>,
    pub json: bool,
}

/// Rows per fold for a fold assignment.
pub fn fold_sizes(indices: &[i64], folds: usize) -> Vec<usize> {
    let mut sizes = vec![0; folds];
    for &fold in indices {
        if let Some(size) = usize::try_from(fold).ok().and_then(|f| sizes.get_mut(f)) {
            *size += 1;
        }
    }
    sizes
}

pub fn select_fold(table: &Table, args: &Args) -> Result<(Table, Vec<usize>), String> {
    if args.folds == 0 {
        return Err("--folds must be at least 1".to_string());
    }
    if args.fold >= args.folds as i64 {
        return Err(format!(
            "fold {} is out of range for {} folds",
            args.fold, args.folds
        ));
    }
    let indices = RandomIndicesCv::new(args.folds)
        .stratified(args.stratified.into())
        .seed(args.seed)
        .indices_for(table)
        .map_err(|e| e.to_string())?;
    let selected = table
        .sample(&indices, args.fold, false)
        .map_err(|e| e.to_string())?;
    Ok((selected, fold_sizes(&indices, args.folds)))
}

pub fn run(args: Args) {
    let (table, config) = read_input_or_exit(&args.path, &args.read);
    let (selected, sizes) = select_fold(&table, &args).unwrap_or_else(|e| fail(e));
    if let Some(output) = &args.output {
        write_output(output, &selected, &config).unwrap_or_else(|e| fail(e));
    }

    if args.json {
        print_json(&json!({
            "path": args.path,
            "rows": table.len(),
            "folds": args.folds,
            "fold": args.fold,
            "seed": args.seed,
            "fold_sizes": sizes,
            "selected": selected.len(),
            "output": args.output,
        }));
        return;
    }

    println!(
        "tabula sample {} --folds {} --fold {}",
        args.path, args.folds, args.fold
    );
    println!("  Rows: {}", table.len());
    println!(
        "  Fold sizes: {}",
        sizes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );
    println!("  Selected: {}", selected.len());
    if let Some(output) = &args.output {
        println!("  Written to: {output}");
    }
}
