use clap::{Args, Parser, Subcommand, ValueEnum};
use tabula_core::Stratification;

#[derive(Parser)]
#[command(
    name = "tabula",
    about = "Tabula: inspect, summarize, convert and sample labeled tables",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that reads a table.
#[derive(Args, Debug, Clone, Default)]
pub struct ReadArgs {
    /// Reader settings (TOML)
    #[arg(long)]
    pub config: Option<String>,

    /// Column delimiter; overrides the config file and the extension
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Do not turn the last column into the class
    #[arg(long)]
    pub no_class: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show shape, domain, missing-value flags and checksum
    Info {
        /// Table file (.tab, .txt, .csv, .basket or .json)
        path: String,

        #[command(flatten)]
        read: ReadArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Per-variable distributions and basic statistics
    Stats {
        /// Table file (.tab, .txt, .csv, .basket or .json)
        path: String,

        #[command(flatten)]
        read: ReadArgs,

        /// Count rows by their weights
        #[arg(long)]
        weighted: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert between formats; the output extension picks the writer
    Convert {
        /// Input table file
        input: String,

        /// Output file (.json snapshot, or delimited text)
        output: String,

        #[command(flatten)]
        read: ReadArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Select one cross-validation fold
    Sample {
        /// Table file (.tab, .txt, .csv, .basket or .json)
        path: String,

        #[command(flatten)]
        read: ReadArgs,

        /// Number of folds
        #[arg(long, default_value_t = 10)]
        folds: usize,

        /// Fold to select; negative selects every row outside fold 0
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        fold: i64,

        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Stratification by class
        #[arg(long, value_enum, default_value_t = StratifiedArg::IfPossible)]
        stratified: StratifiedArg,

        /// Write the selected rows here
        #[arg(short, long)]
        output: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StratifiedArg {
    No,
    IfPossible,
    Yes,
}

impl From<StratifiedArg> for Stratification {
    fn from(arg: StratifiedArg) -> Self {
        match arg {
            StratifiedArg::No => Self::NotStratified,
            StratifiedArg::IfPossible => Self::StratifiedIfPossible,
            StratifiedArg::Yes => Self::Stratified,
        }
    }
}
