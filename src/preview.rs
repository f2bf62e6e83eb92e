//! Plain-text tables for the `preview`, `fills`, and `generate --dry-run` commands.

use std::{borrow::Cow, fmt::Write as _};

use crate::{
    blocks::BlockDocument,
    fills::CellFill,
    plan::EditPlan,
    sections::QuestionMap,
};

pub const DEFAULT_CELL_WIDTH: usize = 80;

const ELLIPSIS: char = '\u{2026}';

pub fn render_table(headers: &[String], rows: &[Vec<String>], max_width: usize) -> String {
    let max_width = max_width.max(1);
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(&sanitize_cell(cell)));
        }
    }
    for width in &mut widths {
        *width = (*width).clamp(1, max_width);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// One row per question, numbered within its section.
pub fn render_question_map(map: &QuestionMap, max_width: usize) -> String {
    let headers = ["Section", "#", "Question"].map(String::from);
    let rows = map
        .iter()
        .flat_map(|(id, questions)| {
            questions.iter().enumerate().map(move |(idx, question)| {
                vec![id.to_string(), (idx + 1).to_string(), question.clone()]
            })
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows, max_width)
}

/// Planned edits in document order, with the text of the affected blocks.
pub fn render_plan<D>(document: &D, plan: &EditPlan, map: &QuestionMap, max_width: usize) -> String
where
    D: BlockDocument + ?Sized,
{
    let headers = ["Action", "Blocks", "Detail"].map(String::from);
    let text = |position: usize| document.block_text(position).unwrap_or_default().to_string();

    let mut rows = Vec::new();
    for entry in &plan.modify {
        let questions = map.get(entry.section.as_str()).map_or(0, <[String]>::len);
        rows.push((
            entry.position,
            vec![
                "expand".to_string(),
                entry.position.to_string(),
                format!("{} -> {questions} question(s)", entry.section),
            ],
        ));
    }
    for span in &plan.delete {
        rows.push((
            span.start,
            vec![
                "delete".to_string(),
                format!("{}..={}", span.start, span.end),
                text(span.start),
            ],
        ));
    }
    if let Some(start) = plan.retained_tail {
        rows.push((
            start,
            vec![
                "keep".to_string(),
                format!("{start}.."),
                format!("unmapped trailing section: {}", text(start)),
            ],
        ));
    }
    rows.sort_by_key(|(position, _)| *position);
    let rows = rows.into_iter().map(|(_, row)| row).collect::<Vec<_>>();

    let mut output = render_table(&headers, &rows, max_width);
    let _ = writeln!(
        output,
        "{} block(s) now, {} after the rewrite",
        document.block_count(),
        plan.expected_block_count(document.block_count(), map)
    );
    output
}

pub fn render_fills(fills: &[CellFill]) -> String {
    let headers = ["Row", "Fill"].map(String::from);
    let rows = fills
        .iter()
        .map(|cell| {
            vec![
                cell.row.to_string(),
                cell.color.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows, DEFAULT_CELL_WIDTH)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (value, width) in values.iter().zip(widths) {
        let sanitized = sanitize_cell(value);
        let mut cell = truncate(&sanitized, *width).into_owned();
        let padding = width.saturating_sub(display_width(&cell));
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn truncate(value: &str, width: usize) -> Cow<'_, str> {
    if display_width(value) <= width {
        return Cow::Borrowed(value);
    }
    let mut truncated = value.chars().take(width.saturating_sub(1)).collect::<String>();
    truncated.push(ELLIPSIS);
    Cow::Owned(truncated)
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(
            value
                .chars()
                .map(|ch| match ch {
                    '\n' | '\r' | '\t' => ' ',
                    other => other,
                })
                .collect(),
        )
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blocks::MemoryDocument, rows::CleanRow, sections::map_sections};

    fn row(position: usize, section: &str, question: &str) -> CleanRow {
        CleanRow {
            position,
            section: section.to_string(),
            question: question.to_string(),
        }
    }

    #[test]
    fn table_pads_and_truncates_cells() {
        let headers = ["A", "Long"].map(String::from);
        let rows = vec![vec!["xyz".to_string(), "line one\nline two".to_string()]];
        let rendered = render_table(&headers, &rows, 8);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "A    Long");
        assert_eq!(lines[1], "---  --------");
        assert_eq!(lines[2], "xyz  line on\u{2026}");
    }

    #[test]
    fn question_map_lists_every_question_in_order() {
        let map = map_sections(&[
            row(0, "1.09 Title", "Q1"),
            row(1, "1.09 Title", "Q2"),
            row(2, "2.01 Other", "Q3"),
        ])
        .unwrap();
        let rendered = render_question_map(&map, DEFAULT_CELL_WIDTH);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], "1.09     1  Q1");
        assert_eq!(lines[4], "2.01     1  Q3");
    }

    #[test]
    fn plan_rows_follow_document_order() {
        let document = MemoryDocument::from_texts([
            "Standard 1.09 \u{2013} Kept",
            "Confirm/Submit/Describe",
            "Standard 1.10 \u{2013} Dropped",
            "Body",
            "Standard 1.11 \u{2013} Kept",
            "Confirm/Submit/Describe",
        ]);
        let map = map_sections(&[
            row(0, "1.09 Kept", "Q1"),
            row(1, "1.09 Kept", "Q2"),
            row(2, "1.11 Kept", "Q3"),
        ])
        .unwrap();
        let plan = EditPlan::build(&document, &map).unwrap();
        let rendered = render_plan(&document, &plan, &map, DEFAULT_CELL_WIDTH);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert!(lines[2].starts_with("expand  1"));
        assert!(lines[3].starts_with("delete  2..=3"));
        assert!(lines[3].ends_with("Standard 1.10 \u{2013} Dropped"));
        assert!(lines[4].starts_with("expand  5"));
        assert_eq!(lines[5], "6 block(s) now, 5 after the rewrite");
    }

    #[test]
    fn fills_show_a_dash_for_unfilled_cells() {
        let rendered = render_fills(&[
            CellFill {
                row: 2,
                color: Some("FFFFFF00".to_string()),
            },
            CellFill { row: 3, color: None },
        ]);
        assert!(rendered.contains("2    FFFFFF00"));
        assert!(rendered.lines().any(|line| line == "3    -"));
    }
}
