pub mod blocks;
pub mod cli;
pub mod config;
pub mod docx;
pub mod error;
pub mod fills;
pub mod io_utils;
pub mod package;
pub mod pipeline;
pub mod plan;
pub mod preview;
pub mod rewrite;
pub mod rows;
pub mod sections;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("rfi_merge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => handle_generate(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Fills(args) => handle_fills(&args),
    }
}

fn handle_generate(args: &cli::GenerateArgs) -> Result<()> {
    let config = pipeline::load_config(&args.config.config)?;
    pipeline::generate(&config, args.dry_run)?;
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let config = pipeline::load_config(&args.config.config)?;
    let map = pipeline::build_question_map(&config)?;
    print!("{}", preview::render_question_map(&map, args.width));
    info!(
        "Displayed {} question(s) in {} section(s)",
        map.question_count(),
        map.len()
    );
    Ok(())
}

fn handle_fills(args: &cli::FillsArgs) -> Result<()> {
    let config = pipeline::load_config(&args.config.config)?;
    let source = &config.excel;
    if !io_utils::has_extension(&source.filepath, io_utils::WORKBOOK_EXTENSIONS) {
        anyhow::bail!(
            "{:?} is not an .xlsx/.xlsm workbook; only workbooks carry fill colors",
            source.filepath
        );
    }
    let cells = fills::column_fills(&source.filepath, source.sheet_name.as_deref(), args.column)
        .with_context(|| {
            format!(
                "Reading fill colors of column {} in {:?}",
                args.column, source.filepath
            )
        })?;
    print!("{}", preview::render_fills(&cells));
    info!("Listed {} cell(s) in column {}", cells.len(), args.column);
    Ok(())
}
