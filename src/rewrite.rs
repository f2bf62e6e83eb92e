//! Applies edit plans to a live [`BlockDocument`].
//!
//! Plans hold positions captured before any mutation. Every application here
//! walks positions from highest to lowest so an insertion or removal never
//! shifts a position that is still waiting to be processed.

use std::cmp::Reverse;

use log::{debug, info};

use crate::{
    blocks::{BlockDocument, ListFormat},
    error::{MergeError, MergeResult},
    plan::{DeleteSpan, EditPlan, ModifyEntry},
    sections::QuestionMap,
};

pub const DEFAULT_RESPONSE_PLACEHOLDER: &str = "[enter response here]";

/// How generated question blocks look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTemplate {
    pub format: ListFormat,
    pub response: String,
}

impl Default for ItemTemplate {
    fn default() -> Self {
        Self {
            format: ListFormat::default(),
            response: DEFAULT_RESPONSE_PLACEHOLDER.to_string(),
        }
    }
}

impl ItemTemplate {
    pub fn render(&self, question: &str) -> String {
        format!("{question}\n\n{}\n\n", self.response)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteSummary {
    pub markers_expanded: usize,
    pub questions_written: usize,
    pub blocks_removed: usize,
}

pub fn apply_modify<D>(
    document: &mut D,
    entries: &[ModifyEntry],
    map: &QuestionMap,
    template: &ItemTemplate,
) -> MergeResult<RewriteSummary>
where
    D: BlockDocument + ?Sized,
{
    let mut summary = RewriteSummary::default();
    for entry in entries.iter().rev() {
        summary.questions_written += expand_marker(document, entry, map, template)?;
        summary.markers_expanded += 1;
    }
    Ok(summary)
}

pub fn apply_delete<D>(document: &mut D, spans: &[DeleteSpan]) -> MergeResult<RewriteSummary>
where
    D: BlockDocument + ?Sized,
{
    let mut summary = RewriteSummary::default();
    for span in spans.iter().rev() {
        summary.blocks_removed += remove_span(document, *span)?;
    }
    Ok(summary)
}

enum Edit<'a> {
    Modify(&'a ModifyEntry),
    Delete(DeleteSpan),
}

impl Edit<'_> {
    fn anchor(&self) -> usize {
        match self {
            Edit::Modify(entry) => entry.position,
            Edit::Delete(span) => span.start,
        }
    }
}

/// Applies both plans interleaved, highest position first.
pub fn rewrite<D>(
    document: &mut D,
    plan: &EditPlan,
    map: &QuestionMap,
    template: &ItemTemplate,
) -> MergeResult<RewriteSummary>
where
    D: BlockDocument + ?Sized,
{
    validate(document, plan)?;
    let mut edits = plan
        .modify
        .iter()
        .map(Edit::Modify)
        .chain(plan.delete.iter().copied().map(Edit::Delete))
        .collect::<Vec<_>>();
    edits.sort_by_key(|edit| Reverse(edit.anchor()));

    let mut summary = RewriteSummary::default();
    for edit in edits {
        match edit {
            Edit::Modify(entry) => {
                summary.questions_written += expand_marker(document, entry, map, template)?;
                summary.markers_expanded += 1;
            }
            Edit::Delete(span) => summary.blocks_removed += remove_span(document, span)?,
        }
    }
    info!(
        "Expanded {} marker(s) into {} question block(s); removed {} block(s)",
        summary.markers_expanded, summary.questions_written, summary.blocks_removed
    );
    Ok(summary)
}

/// Rejects plans that reference missing blocks or overlap each other.
pub fn validate<D>(document: &D, plan: &EditPlan) -> MergeResult<()>
where
    D: BlockDocument + ?Sized,
{
    let count = document.block_count();
    for entry in &plan.modify {
        if entry.position >= count {
            return Err(MergeError::InternalConsistency(format!(
                "marker for section {} at block {} is past the end ({count} block(s))",
                entry.section, entry.position
            )));
        }
        if let Some(span) = plan.delete.iter().find(|span| span.contains(entry.position)) {
            return Err(MergeError::InternalConsistency(format!(
                "marker for section {} at block {} falls inside deleted span {}..={}",
                entry.section, entry.position, span.start, span.end
            )));
        }
    }
    for span in &plan.delete {
        if span.start > span.end || span.end >= count {
            return Err(MergeError::InternalConsistency(format!(
                "deleted span {}..={} is invalid for {count} block(s)",
                span.start, span.end
            )));
        }
    }
    Ok(())
}

fn expand_marker<D>(
    document: &mut D,
    entry: &ModifyEntry,
    map: &QuestionMap,
    template: &ItemTemplate,
) -> MergeResult<usize>
where
    D: BlockDocument + ?Sized,
{
    let questions = map.get(entry.section.as_str()).ok_or_else(|| {
        MergeError::InternalConsistency(format!(
            "section {} is planned but has no questions",
            entry.section
        ))
    })?;
    let Some((first, rest)) = questions.split_first() else {
        return Err(MergeError::InternalConsistency(format!(
            "section {} has an empty question list",
            entry.section
        )));
    };

    document.write_list_item(entry.position, &template.render(first), template.format)?;
    for (offset, question) in rest.iter().enumerate() {
        // Chain each item after the one written before it.
        document.insert_list_item_after(
            entry.position + offset,
            &template.render(question),
            template.format,
        )?;
    }
    debug!(
        "Section {}: block {} now holds {} question(s)",
        entry.section,
        entry.position,
        questions.len()
    );
    Ok(questions.len())
}

fn remove_span<D>(document: &mut D, span: DeleteSpan) -> MergeResult<usize>
where
    D: BlockDocument + ?Sized,
{
    for position in (span.start..=span.end).rev() {
        document.remove_block(position)?;
    }
    Ok(span.len())
}
