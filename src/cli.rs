use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Build pivot tables from tabular data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer column types and default aggregations for a CSV file
    Probe(ProbeArgs),
    /// Compute a pivot table from a CSV file or a saved pivot
    Pivot(PivotArgs),
    /// Store a dataset and a pivot definition in the workbench store
    Save(SaveArgs),
    /// List datasets and saved pivots in the workbench store
    List(ListArgs),
    /// Delete a saved pivot, or a dataset together with its pivots
    Remove(RemoveArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SpecArgs {
    /// YAML or JSON pivot spec file; inline options are appended to it
    #[arg(long = "spec")]
    pub spec: Option<PathBuf>,
    /// Row dimensions such as `Region` or `Region:desc:totals`
    #[arg(short = 'r', long = "rows", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub rows: Vec<String>,
    /// Column dimensions such as `Product` or `Year:totals`
    #[arg(short = 'c', long = "columns", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
    /// Value fields of the form `field[:sum|avg|count|count_unique|min|max]`
    #[arg(short = 'v', long = "values", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub values: Vec<String>,
    /// Inclusion filters such as `Region=East|West`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Show subtotals for every row and column dimension
    #[arg(long)]
    pub totals: bool,
    /// Sort every dimension descending
    #[arg(long)]
    pub desc: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub source: InputArgs,
}

#[derive(Debug, Args)]
pub struct PivotArgs {
    #[command(flatten)]
    pub source: InputArgs,
    #[command(flatten)]
    pub spec: SpecArgs,
    /// Workbench store file, needed with `--pivot`
    #[arg(long = "store")]
    pub store: Option<PathBuf>,
    /// Id of a saved pivot to compute from the store
    #[arg(long = "pivot")]
    pub pivot: Option<String>,
    /// Node ids to expand, e.g. `root:East:0`
    #[arg(long = "expand", action = clap::ArgAction::Append)]
    pub expand: Vec<String>,
    /// Expand every group
    #[arg(long = "expand-all")]
    pub expand_all: bool,
    /// Output format
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Write the effective spec to this YAML or JSON file
    #[arg(long = "save-spec")]
    pub save_spec: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    #[command(flatten)]
    pub source: InputArgs,
    #[command(flatten)]
    pub spec: SpecArgs,
    /// Workbench store file (created when missing)
    #[arg(long = "store")]
    pub store: PathBuf,
    /// Title for the saved pivot (generated when omitted)
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Workbench store file
    #[arg(long = "store")]
    pub store: PathBuf,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Workbench store file
    #[arg(long = "store")]
    pub store: PathBuf,
    /// Saved pivot id to delete
    #[arg(long = "pivot", conflicts_with = "dataset", required_unless_present = "dataset")]
    pub pivot: Option<String>,
    /// Dataset id to delete, along with its pivots
    #[arg(long = "dataset")]
    pub dataset: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
