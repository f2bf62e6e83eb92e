//! Raw questionnaire rows and the normalization pass that cleans them.
//!
//! [`normalize()`] is a pure filter: rows at excluded positions, rows with a
//! missing cell, and rows whose question starts with the exclude keyword are
//! dropped. A surviving question holding a character Word cannot store is an
//! error rather than a silently corrupted document. Surviving rows remember the position they had in the source so
//! diagnostics can cite them.

use std::collections::BTreeSet;

use log::debug;

use crate::{
    error::{MergeError, MergeResult},
    package::forbidden_xml_char,
};

pub const DEFAULT_EXCLUDE_KEYWORD: &str = "see";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub section_raw: Option<String>,
    pub question_raw: Option<String>,
}

impl RawRow {
    pub fn new(section: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            section_raw: Some(section.into()),
            question_raw: Some(question.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRow {
    pub position: usize,
    pub section: String,
    pub question: String,
}

impl From<&CleanRow> for RawRow {
    fn from(row: &CleanRow) -> Self {
        RawRow::new(row.section.clone(), row.question.clone())
    }
}

pub fn normalize(
    rows: &[RawRow],
    excluded_positions: &BTreeSet<usize>,
    exclude_keyword: &str,
) -> MergeResult<Vec<CleanRow>> {
    if let Some(&position) = excluded_positions.range(rows.len()..).next() {
        return Err(MergeError::config(format!(
            "excluded row position {position} is outside the {} data row(s); check header and row_shift",
            rows.len()
        )));
    }

    let keyword = exclude_keyword.to_lowercase();
    let mut cleaned = Vec::with_capacity(rows.len());
    let (mut colored, mut missing, mut keyworded) = (0usize, 0usize, 0usize);
    for (position, row) in rows.iter().enumerate() {
        if excluded_positions.contains(&position) {
            colored += 1;
            continue;
        }
        let (Some(section), Some(question)) = (present(&row.section_raw), present(&row.question_raw))
        else {
            missing += 1;
            continue;
        };
        if !keyword.is_empty() && question.to_lowercase().starts_with(&keyword) {
            keyworded += 1;
            continue;
        }
        if let Some(ch) = forbidden_xml_char(question) {
            return Err(MergeError::config(format!(
                "question in data row {position} contains U+{:04X}, which a Word document cannot store",
                u32::from(ch)
            )));
        }
        cleaned.push(CleanRow {
            position,
            section: section.to_string(),
            question: question.to_string(),
        });
    }
    debug!(
        "Normalized {} row(s): {} excluded by fill, {} incomplete, {} matched keyword '{}'",
        rows.len(),
        colored,
        missing,
        keyworded,
        exclude_keyword
    );
    Ok(cleaned)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(rows: &[CleanRow]) -> Vec<&str> {
        rows.iter().map(|row| row.question.as_str()).collect()
    }

    #[test]
    fn normalize_drops_keyword_rows_case_insensitively() {
        let rows = vec![
            RawRow::new("1.09 Title", "Q1"),
            RawRow::new("1.09 Title", "See 3.4"),
            RawRow::new("1.09 Title", "SEE above"),
            RawRow::new("1.09 Title", "Q2"),
        ];
        let cleaned = normalize(&rows, &BTreeSet::new(), "see").unwrap();
        assert_eq!(questions(&cleaned), vec!["Q1", "Q2"]);
        assert_eq!(cleaned[1].position, 3);
    }

    #[test]
    fn normalize_drops_missing_and_blank_cells() {
        let rows = vec![
            RawRow {
                section_raw: Some("1.01 A".into()),
                question_raw: None,
            },
            RawRow {
                section_raw: None,
                question_raw: Some("orphan".into()),
            },
            RawRow::new("1.01 A", "   "),
            RawRow::new("1.01 A", "kept"),
        ];
        let cleaned = normalize(&rows, &BTreeSet::new(), "see").unwrap();
        assert_eq!(questions(&cleaned), vec!["kept"]);
    }

    #[test]
    fn normalize_drops_excluded_positions() {
        let rows = vec![
            RawRow::new("1.01 A", "first"),
            RawRow::new("1.01 A", "colored"),
            RawRow::new("1.01 A", "third"),
        ];
        let excluded = BTreeSet::from([1]);
        let cleaned = normalize(&rows, &excluded, "see").unwrap();
        assert_eq!(questions(&cleaned), vec!["first", "third"]);
    }

    #[test]
    fn normalize_rejects_out_of_bounds_exclusions() {
        let rows = vec![RawRow::new("1.01 A", "only")];
        let excluded = BTreeSet::from([4]);
        let err = normalize(&rows, &excluded, "see").unwrap_err();
        assert!(matches!(err, MergeError::Config(_)), "{err}");
    }

    #[test]
    fn control_characters_in_questions_name_the_row() {
        let rows = vec![
            RawRow::new("1.01 A", "fine\tline\nbreak"),
            RawRow::new("1.01 A", "see \u{1} skipped anyway"),
            RawRow::new("1.01 A", "Q\u{B}1"),
        ];
        let err = normalize(&rows, &BTreeSet::new(), "see").unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, MergeError::Config(_)), "{message}");
        assert!(message.contains("data row 2"), "{message}");
        assert!(message.contains("U+000B"), "{message}");
    }

    #[test]
    fn empty_keyword_keeps_every_complete_row() {
        let rows = vec![RawRow::new("1.01 A", "see below")];
        let cleaned = normalize(&rows, &BTreeSet::new(), "").unwrap();
        assert_eq!(cleaned.len(), 1);
    }
}
