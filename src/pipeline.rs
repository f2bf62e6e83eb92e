use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::{
    blocks::BlockDocument,
    config::Config,
    docx::DocxDocument,
    plan::EditPlan,
    preview,
    rewrite::{self, RewriteSummary},
    rows,
    sections::{self, QuestionMap},
    workbook,
};

/// Outcome of a full run, for callers that report or assert on it.
#[derive(Debug)]
pub struct MergeOutcome {
    pub questions: QuestionMap,
    pub plan: EditPlan,
    pub summary: Option<RewriteSummary>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    info!("Loading configuration from {path:?}");
    Config::load(path).with_context(|| format!("Loading configuration {path:?}"))
}

/// Reads, cleans, and groups the questionnaire rows.
pub fn build_question_map(config: &Config) -> Result<QuestionMap> {
    let source = &config.excel;
    let raw = workbook::load_rows(source)
        .with_context(|| format!("Reading questionnaire {:?}", source.filepath))?;
    let excluded = workbook::excluded_positions(source)
        .with_context(|| format!("Scanning fill colors in {:?}", source.filepath))?;
    let clean = rows::normalize(&raw, &excluded, &source.exclude_keyword)?;
    info!(
        "{} of {} row(s) kept after removing {} color-excluded row(s) and incomplete or cross-reference rows",
        clean.len(),
        raw.len(),
        excluded.len()
    );
    let map = sections::map_sections(&clean)?;
    info!(
        "Mapped {} question(s) into {} section(s)",
        map.question_count(),
        map.len()
    );
    Ok(map)
}

/// Runs the whole merge. A dry run prints the plan and leaves the export
/// path untouched.
pub fn generate(config: &Config, dry_run: bool) -> Result<MergeOutcome> {
    let questions = build_question_map(config)?;
    let template_path = &config.word.template_path;
    let mut document = DocxDocument::open(template_path)
        .with_context(|| format!("Opening template {template_path:?}"))?;
    let plan = EditPlan::build(&document, &questions)
        .with_context(|| format!("Planning edits for {template_path:?}"))?;
    info!(
        "Plan: {} marker(s) to expand, {} span(s) covering {} block(s) to delete",
        plan.modify.len(),
        plan.delete.len(),
        plan.deleted_block_count()
    );

    if dry_run {
        print!(
            "{}",
            preview::render_question_map(&questions, preview::DEFAULT_CELL_WIDTH)
        );
        println!();
        print!(
            "{}",
            preview::render_plan(&document, &plan, &questions, preview::DEFAULT_CELL_WIDTH)
        );
        info!("Dry run: {:?} was not written", config.word.export_path);
        return Ok(MergeOutcome {
            questions,
            plan,
            summary: None,
        });
    }

    let expected = plan.expected_block_count(document.block_count(), &questions);
    let summary = rewrite::rewrite(
        &mut document,
        &plan,
        &questions,
        &config.word.item_template(),
    )
    .with_context(|| format!("Rewriting {template_path:?}"))?;
    if document.block_count() != expected {
        anyhow::bail!(
            "rewritten document has {} block(s), expected {expected}",
            document.block_count()
        );
    }
    let export_path = &config.word.export_path;
    document
        .save(export_path)
        .with_context(|| format!("Writing {export_path:?}"))?;
    info!("Generated {export_path:?}");
    Ok(MergeOutcome {
        questions,
        plan,
        summary: Some(summary),
    })
}
