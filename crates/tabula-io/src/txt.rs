//! Delimited text tables with typed headers.
//!
//! The first non-empty line names the columns. A name may carry a prefix
//! ending in `#`: an optional role (`m` meta, `i` ignore, `c` class) and an
//! optional kind (`D` discrete, `C` continuous, `S` string), as in
//! `cD#species` or `mS#comment`. Columns without a kind are typed from
//! their values.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tabula_core::{
    Domain, Key, MetaId, RowRecord, Table, Value, VarKind, Variable, VariableRegistry,
    VariableRequest,
};

use crate::atomic::write_atomically;
use crate::config::ReaderConfig;
use crate::error::ReadError;

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([mic]?)([DCS]?)#(.+)$").expect("header regex must compile"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Attribute,
    Class,
    Meta,
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    role: Role,
    kind: Option<VarKind>,
}

fn parse_column(raw: &str) -> Column {
    let raw = raw.trim();
    let Some(caps) = header_re().captures(raw) else {
        return plain_column(raw);
    };
    let (role, kind) = (&caps[1], &caps[2]);
    if role.is_empty() && kind.is_empty() {
        return plain_column(raw);
    }
    Column {
        name: caps[3].to_string(),
        role: match role {
            "m" => Role::Meta,
            "i" => Role::Ignore,
            "c" => Role::Class,
            _ => Role::Attribute,
        },
        kind: match kind {
            "D" => Some(VarKind::Discrete),
            "C" => Some(VarKind::Continuous),
            "S" => Some(VarKind::String),
            _ => None,
        },
    }
}

fn plain_column(name: &str) -> Column {
    Column {
        name: name.to_string(),
        role: Role::Attribute,
        kind: None,
    }
}

fn split_line(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(|cell| cell.trim().to_string()).collect()
}

/// Types a column from its defined tokens.
///
/// Single digits make a discrete column and numbers a continuous one.
/// Anything else is discrete unless there are many distinct tokens and
/// fewer than half of them repeat, which makes a string column.
fn infer_kind<'a>(
    tokens: impl Iterator<Item = &'a str>,
    config: &ReaderConfig,
) -> Option<VarKind> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for token in tokens.filter(|t| !config.is_missing(t)) {
        *counts.entry(token).or_default() += 1;
    }
    if counts.is_empty() {
        return None;
    }
    let is_digit = |t: &str| t.len() == 1 && t.as_bytes()[0].is_ascii_digit();
    if counts.keys().all(|t| is_digit(t)) {
        return Some(VarKind::Discrete);
    }
    let is_number = |t: &str| t.parse::<f64>().is_ok_and(f64::is_finite);
    if counts.keys().all(|t| is_number(t)) {
        return Some(VarKind::Continuous);
    }
    let repeated = counts.values().filter(|&&n| n > 1).count();
    if counts.len() > config.max_discrete_values && repeated * 2 < counts.len() {
        return Some(VarKind::String);
    }
    Some(VarKind::Discrete)
}

struct Rows {
    /// `(line number, cells)`, padded to the header width.
    cells: Vec<(usize, Vec<String>)>,
}

fn collect_rows<'a>(
    lines: impl Iterator<Item = (usize, &'a str)>,
    delimiter: char,
    width: usize,
) -> Result<Rows, ReadError> {
    let mut cells = Vec::new();
    for (line_no, line) in lines {
        let mut row = split_line(line, delimiter);
        if row.len() < width {
            log::warn!(
                "line {line_no}: {} of {width} columns, the rest are undefined",
                row.len()
            );
            row.resize(width, String::new());
        } else if row.len() > width {
            if row[width..].iter().any(|cell| !cell.is_empty()) {
                return Err(ReadError::parse(
                    line_no,
                    format!("row has {} columns, the header has {width}", row.len()),
                ));
            }
            row.truncate(width);
        }
        cells.push((line_no, row));
    }
    Ok(Rows { cells })
}

/// Reads a table from text, taking variables from `registry`.
pub fn read_table(
    text: &str,
    delimiter: char,
    config: &ReaderConfig,
    registry: &mut VariableRegistry,
) -> Result<Table, ReadError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());
    let (_, header) = lines
        .next()
        .ok_or_else(|| ReadError::parse(1, "empty file"))?;
    let mut columns: Vec<Column> = header.split(delimiter).map(parse_column).collect();
    if columns.iter().filter(|c| c.role == Role::Class).count() > 1 {
        return Err(ReadError::parse(1, "more than one column is marked as class"));
    }
    let rows = collect_rows(lines, delimiter, columns.len())?;

    for (index, column) in columns.iter_mut().enumerate() {
        if column.role == Role::Ignore || column.kind.is_some() {
            continue;
        }
        let tokens = rows.cells.iter().map(|(_, row)| row[index].as_str());
        let kind = infer_kind(tokens, config).ok_or_else(|| {
            ReadError::parse(1, format!("cannot determine the type of '{}'", column.name))
        })?;
        if kind == VarKind::String && column.role == Role::Attribute {
            log::debug!("'{}' looks like free text, reading it as a meta", column.name);
            column.role = Role::Meta;
        }
        column.kind = Some(kind);
    }
    if !config.no_class
        && !columns.iter().any(|c| c.role == Role::Class)
        && let Some(last) = columns.iter_mut().rev().find(|c| c.role == Role::Attribute)
    {
        last.role = Role::Class;
    }

    let mut variables: Vec<Option<Variable>> = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let Some(kind) = column.kind.filter(|_| column.role != Role::Ignore) else {
            variables.push(None);
            continue;
        };
        let mut labels: Vec<&str> = Vec::new();
        if kind == VarKind::Discrete {
            for (_, row) in &rows.cells {
                let token = row[index].as_str();
                if !config.is_missing(token) && !labels.contains(&token) {
                    labels.push(token);
                }
            }
        }
        let request = VariableRequest::new(column.name.clone(), kind)
            .values(labels)
            .create_new_on(config.create_new_on);
        let (variable, status) = registry.make(&request)?;
        log::debug!("column '{}' resolved with status {status:?}", column.name);
        variables.push(Some(variable));
    }

    let pick = |role: Role| -> Vec<(usize, Variable)> {
        columns
            .iter()
            .zip(&variables)
            .enumerate()
            .filter(|(_, (column, _))| column.role == role)
            .filter_map(|(index, (_, variable))| variable.clone().map(|v| (index, v)))
            .collect()
    };
    let attributes = pick(Role::Attribute);
    let class = pick(Role::Class).into_iter().next();
    let mut domain = Domain::new(
        attributes.iter().map(|(_, v)| v.clone()).collect(),
        class.as_ref().map(|(_, v)| v.clone()),
    )?;
    let metas: Vec<(usize, MetaId, Variable)> = pick(Role::Meta)
        .into_iter()
        .map(|(index, variable)| (index, domain.add_meta_variable(variable.clone(), false), variable))
        .collect();

    let value_columns: Vec<(usize, Variable)> = attributes.into_iter().chain(class).collect();
    let mut records = Vec::with_capacity(rows.cells.len());
    for (line_no, row) in &rows.cells {
        let parse = |index: usize, variable: &Variable| -> Result<Value, ReadError> {
            let token = row[index].as_str();
            if config.is_missing(token) {
                return Ok(Value::Undefined);
            }
            variable
                .parse_add(token)
                .map_err(|e| ReadError::parse(*line_no, format!("'{}': {e}", variable.name())))
        };
        let values = value_columns
            .iter()
            .map(|(index, variable)| parse(*index, variable))
            .collect::<Result<Vec<_>, _>>()?;
        let mut record = RowRecord::new(values);
        for (index, id, variable) in &metas {
            let value = parse(*index, variable)?;
            if value.is_defined() {
                record.metas.insert(*id, value);
            }
        }
        records.push(record);
    }
    log::debug!(
        "read {} rows over {} columns",
        records.len(),
        value_columns.len()
    );
    Ok(Table::from_records(Arc::new(domain), records)?)
}

pub fn read_table_from_path(
    path: impl AsRef<Path>,
    config: &ReaderConfig,
    registry: &mut VariableRegistry,
) -> Result<Table, ReadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ReadError::io(path, e))?;
    read_table(&text, config.delimiter_for(path), config, registry)
}

fn kind_letter(kind: VarKind) -> char {
    match kind {
        VarKind::Continuous => 'C',
        VarKind::Discrete => 'D',
        VarKind::String => 'S',
    }
}

/// Renders the table in the format [`read_table`] accepts.
pub fn render_table(table: &Table, delimiter: char) -> Result<String, ReadError> {
    let domain = table.domain();
    let separator = delimiter.to_string();
    let class = domain.class_var();
    let mut header: Vec<String> = domain
        .variables()
        .iter()
        .map(|v| {
            let role = if class == Some(v) { "c" } else { "" };
            format!("{role}{}#{}", kind_letter(v.kind()), v.name())
        })
        .collect();
    header.extend(
        domain
            .metas()
            .iter()
            .map(|m| format!("m{}#{}", kind_letter(m.variable.kind()), m.variable.name())),
    );

    let mut out = header.join(&separator);
    out.push('\n');
    for row in 0..table.len() {
        let mut cells: Vec<String> = domain
            .variables()
            .iter()
            .zip(table.values(row)?)
            .map(|(variable, value)| variable.format(&value))
            .collect();
        for meta in domain.metas() {
            cells.push(meta.variable.format(&table.get(row, Key::Meta(meta.id))?));
        }
        out.push_str(&cells.join(&separator));
        out.push('\n');
    }
    Ok(out)
}

pub fn write_table(writer: &mut impl Write, table: &Table, delimiter: char) -> Result<(), ReadError> {
    let text = render_table(table, delimiter)?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| ReadError::Serialize(e.to_string()))
}

/// Writes atomically; the delimiter follows the extension unless given.
pub fn write_table_to_path(
    path: impl AsRef<Path>,
    table: &Table,
    delimiter: Option<char>,
) -> Result<(), ReadError> {
    let path = path.as_ref();
    let delimiter = delimiter.unwrap_or_else(|| ReaderConfig::default().delimiter_for(path));
    write_atomically(path, |writer| write_table(writer, table, delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Table {
        read_table(text, '\t', &ReaderConfig::default(), &mut VariableRegistry::new())
            .expect("table should read")
    }

    #[test]
    fn header_prefixes() {
        assert_eq!(
            parse_column("cD#species"),
            Column {
                name: "species".into(),
                role: Role::Class,
                kind: Some(VarKind::Discrete),
            }
        );
        assert_eq!(parse_column("mS#note").role, Role::Meta);
        assert_eq!(parse_column("i#skip").kind, None);
        assert_eq!(parse_column("C#x").kind, Some(VarKind::Continuous));
        assert_eq!(parse_column("a#b").name, "a#b");
        assert_eq!(parse_column("#hash").name, "#hash");
    }

    #[test]
    fn types_are_inferred() {
        let config = ReaderConfig::default();
        let kind = |tokens: &[&str]| infer_kind(tokens.iter().copied(), &config);
        assert_eq!(kind(&["1", "2", "?"]), Some(VarKind::Discrete));
        assert_eq!(kind(&["1", "2.5", "-3"]), Some(VarKind::Continuous));
        assert_eq!(kind(&["red", "blue", "red"]), Some(VarKind::Discrete));
        assert_eq!(kind(&["nan", "1"]), Some(VarKind::Discrete));
        assert_eq!(kind(&["?", ""]), None);

        let names: Vec<String> = (0..25).map(|i| format!("name{i}")).collect();
        assert_eq!(
            kind(&names.iter().map(String::as_str).collect::<Vec<_>>()),
            Some(VarKind::String)
        );
    }

    #[test]
    fn last_column_is_the_class() {
        let table = read("x\ty\tkind\n1.5\t2.5\ta\n2.5\t?\tb\n");
        let domain = table.domain();
        assert_eq!(domain.attributes().len(), 2);
        assert_eq!(domain.class_var().map(Variable::name), Some("kind"));
        assert_eq!(table.get(1, "y").expect("get"), Value::Undefined);

        let config = ReaderConfig {
            no_class: true,
            ..ReaderConfig::default()
        };
        let flat = read_table(
            "x\tkind\n1.5\ta\n",
            '\t',
            &config,
            &mut VariableRegistry::new(),
        )
        .expect("flat");
        assert!(!flat.domain().has_class());
    }

    #[test]
    fn roles_from_prefixes() {
        let table = read("mS#id\tx\tcD#kind\ti#junk\nr1\t1.5\ta\tzz\n");
        let domain = table.domain();
        assert_eq!(domain.len(), 2);
        assert_eq!(domain.class_var().map(Variable::name), Some("kind"));
        let id = domain.meta_by_name("id").expect("meta").id;
        assert_eq!(table.get(0, id).expect("meta"), Value::from("r1"));
    }

    #[test]
    fn ragged_rows() {
        let table = read("a\tb\tc\n1.5\t2.5\n0.5\t1.5\tx\n");
        assert_eq!(table.get(0, "c").expect("get"), Value::Undefined);
        let long = read_table(
            "a\tb\n1\t2\t3\n",
            '\t',
            &ReaderConfig::default(),
            &mut VariableRegistry::new(),
        );
        assert!(matches!(long, Err(ReadError::Parse { line: 2, .. })));
    }

    #[test]
    fn columns_without_values_are_rejected() {
        let err = read_table(
            "a\tb\n?\t1\n",
            '\t',
            &ReaderConfig::default(),
            &mut VariableRegistry::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot determine the type of 'a'"));
    }

    #[test]
    fn registry_shares_variables_across_reads() {
        let mut registry = VariableRegistry::new();
        let config = ReaderConfig::default();
        let first = read_table("x\tc\n1.5\ta\n", '\t', &config, &mut registry).expect("first");
        let second = read_table("x\tc\n2.5\tb\n", '\t', &config, &mut registry).expect("second");
        assert_eq!(first.domain().variables()[0], second.domain().variables()[0]);
        // an unseen label extends the shared class
        let class = &second.domain().variables()[1];
        assert_eq!(&first.domain().variables()[1], class);
        assert_eq!(class.values(), vec!["a", "b"]);
        assert_eq!(first.get(0, "c").expect("get"), Value::Discrete(0));
        assert_eq!(second.get(0, "c").expect("get"), Value::Discrete(1));
    }

    #[test]
    fn written_text_reads_back() {
        let table = read("mS#id\tx\tsize\tcolor\nr1\t1.5\t1\tred\nr2\t2.25\t2\tblue\nr3\t?\t1\tred\n");
        let rendered = render_table(&table, ',').expect("render");
        insta::assert_snapshot!(rendered.trim_end(), @r"
        C#x,D#size,cD#color,mS#id
        1.50,1,red,r1
        2.25,2,blue,r2
        ?,1,red,r3
        ");

        let again = read_table(
            &rendered,
            ',',
            &ReaderConfig::default(),
            &mut VariableRegistry::new(),
        )
        .expect("read back");
        assert_eq!(again.len(), 3);
        assert_eq!(again.get(1, "color").expect("get"), table.get(1, "color").expect("get"));
    }
}
