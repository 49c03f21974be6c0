//! # tabula-io
//!
//! Storage layer for tabula tables.
//!
//! This crate provides:
//! - the header-typed delimited text format (`.tab`, `.csv`, `.txt`)
//! - basket files, where each line lists the items of one row
//! - JSON snapshots that keep row ids and meta ids across runs
//! - `ReaderConfig`, the TOML-loadable reader settings
//!
//! Every reader takes variables from a caller-owned `VariableRegistry`, so
//! two files naming the same column share one variable.
//!
//! ```text
//! text / baskets ──read──▶ Table ──save──▶ JSON snapshot
//!                            ▲                  │
//!                            └──────load────────┘
//! ```

mod atomic;
pub mod basket;
pub mod config;
pub mod error;
pub mod persist;
pub mod txt;

pub use basket::{read_baskets, read_baskets_from_path};
pub use config::ReaderConfig;
pub use error::ReadError;
pub use persist::{
    StoredDomain, StoredMeta, StoredMetaValue, StoredRow, StoredTable, StoredVariable,
    load_table, save_table, table_from_json, table_to_json,
};
pub use txt::{read_table, read_table_from_path, render_table, write_table, write_table_to_path};
