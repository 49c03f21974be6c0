//! Tabula CLI: the `tabula` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    support::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { path, read, json } => commands::info::run(path, read, json),

        Commands::Stats {
            path,
            read,
            weighted,
            json,
        } => commands::stats::run(path, read, weighted, json),

        Commands::Convert {
            input,
            output,
            read,
            json,
        } => commands::convert::run(input, output, read, json),

        Commands::Sample {
            path,
            read,
            folds,
            fold,
            seed,
            stratified,
            output,
            json,
        } => commands::sample::run(commands::sample::Args {
            path,
            read,
            folds,
            fold,
            seed,
            stratified,
            output,
            json,
        }),
    }
}
