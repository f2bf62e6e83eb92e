use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{ColumnRef, DEFAULT_CONFIG_FILE},
    preview::DEFAULT_CELL_WIDTH,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Merge RFI questionnaire rows into a Word response template",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the response document: expand markers and drop unmapped sections
    Generate(GenerateArgs),
    /// Show the cleaned questions grouped by section
    Preview(PreviewArgs),
    /// List the fill color of every cell in a questionnaire column
    Fills(FillsArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArg {
    /// YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub config: ConfigArg,
    /// Print the question map and edit plan without writing the export file
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub config: ConfigArg,
    /// Truncate cells wider than this many characters
    #[arg(short, long, default_value_t = DEFAULT_CELL_WIDTH)]
    pub width: usize,
}

#[derive(Debug, Args)]
pub struct FillsArgs {
    #[command(flatten)]
    pub config: ConfigArg,
    /// Column letters to scan, such as `A` or `AB`
    #[arg(long)]
    pub column: ColumnRef,
}
