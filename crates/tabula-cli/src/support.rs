use std::path::Path;

use serde_json::Value;
use tabula_core::{Table, VariableRegistry};
use tabula_io::{
    ReadError, ReaderConfig, load_table, read_baskets_from_path, read_table_from_path, save_table,
    write_table_to_path,
};
use tracing_subscriber::EnvFilter;

use crate::cli::ReadArgs;

const LOG_ENV: &str = "TABULA_LOG";

/// Installs the stderr formatter; `log` records from the libraries are
/// bridged into it.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Snapshot,
    Basket,
    Delimited,
}

impl FileFormat {
    pub fn of(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Self::Snapshot,
            Some("basket") => Self::Basket,
            _ => Self::Delimited,
        }
    }
}

/// The config file, if any, with command-line flags applied on top.
pub fn reader_config(args: &ReadArgs) -> Result<ReaderConfig, ReadError> {
    let mut config = match &args.config {
        Some(path) => ReaderConfig::load(path)?,
        None => ReaderConfig::default(),
    };
    if args.delimiter.is_some() {
        config.delimiter = args.delimiter;
    }
    if args.no_class {
        config.no_class = true;
    }
    Ok(config)
}

pub fn read_input(
    path: &str,
    config: &ReaderConfig,
    registry: &mut VariableRegistry,
) -> Result<Table, ReadError> {
    let path = Path::new(path);
    let table = match FileFormat::of(path) {
        FileFormat::Snapshot => load_table(path, registry)?,
        FileFormat::Basket => read_baskets_from_path(path, registry, None)?,
        FileFormat::Delimited => read_table_from_path(path, config, registry)?,
    };
    log::info!("read {} rows from {}", table.len(), path.display());
    Ok(table)
}

pub fn write_output(path: &str, table: &Table, config: &ReaderConfig) -> Result<(), ReadError> {
    let path = Path::new(path);
    match FileFormat::of(path) {
        FileFormat::Snapshot => save_table(path, table),
        FileFormat::Basket => Err(ReadError::Config(format!(
            "{}: basket files are read-only",
            path.display()
        ))),
        FileFormat::Delimited => write_table_to_path(path, table, config.delimiter),
    }
}

pub fn read_input_or_exit(path: &str, args: &ReadArgs) -> (Table, ReaderConfig) {
    let config = reader_config(args).unwrap_or_else(|e| fail(e));
    let mut registry = VariableRegistry::new();
    let table = read_input(path, &config, &mut registry).unwrap_or_else(|e| fail(e));
    (table, config)
}

pub fn print_json(payload: &Value) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(format!("json serialization: {e}")),
    }
}

pub fn yes_no(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}

/// Formats a number for text output, `-` when it is not finite.
pub fn number(x: f64) -> String {
    if x.is_finite() {
        format!("{x:.3}")
    } else {
        "-".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(FileFormat::of(Path::new("a.JSON")), FileFormat::Snapshot);
        assert_eq!(FileFormat::of(Path::new("a.basket")), FileFormat::Basket);
        assert_eq!(FileFormat::of(Path::new("a.tab")), FileFormat::Delimited);
        assert_eq!(FileFormat::of(Path::new("noext")), FileFormat::Delimited);
    }

    #[test]
    fn flags_override_defaults() {
        let args = ReadArgs {
            config: None,
            delimiter: Some(';'),
            no_class: true,
        };
        let config = reader_config(&args).expect("config");
        assert_eq!(config.delimiter, Some(';'));
        assert!(config.no_class);
        assert_eq!(config.max_discrete_values, 20);
    }

    #[test]
    fn baskets_cannot_be_written() {
        let table = Table::new(std::sync::Arc::new(
            tabula_core::Domain::new(Vec::new(), None).expect("domain"),
        ));
        let err = write_output("out.basket", &table, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(err, ReadError::Config(_)));
    }

    #[test]
    fn numbers_hide_infinities() {
        assert_eq!(number(1.0), "1.000");
        assert_eq!(number(f64::INFINITY), "-");
    }
}
