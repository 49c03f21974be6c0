use serde_json::json;

use crate::cli::ReadArgs;
use crate::support::{fail, print_json, read_input_or_exit, write_output};

pub fn run(input: String, output: String, read: ReadArgs, json_output: bool) {
    let (table, config) = read_input_or_exit(&input, &read);
    write_output(&output, &table, &config).unwrap_or_else(|e| fail(e));

    if json_output {
        print_json(&json!({
            "input": input,
            "output": output,
            "rows": table.len(),
            "variables": table.domain().len(),
            "metas": table.domain().metas().len(),
        }));
    } else {
        println!("tabula convert {input} -> {output}");
        println!("  Rows: {}", table.len());
        println!("  Variables: {}", table.domain().len());
        println!("  Metas: {}", table.domain().metas().len());
    }
}
