//! Section identifiers and the ordered question map built from cleaned rows.

use std::{borrow::Borrow, fmt, sync::OnceLock};

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use regex::Regex;

use crate::{
    error::{MergeError, MergeResult},
    rows::CleanRow,
};

/// One digit, a decimal point, two digits: `1.09`.
const SECTION_ID_PATTERN: &str = r"\d\.\d{2}";

fn section_id_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SECTION_ID_PATTERN).expect("section id pattern compiles"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(String);

impl SectionId {
    /// First identifier embedded in `text`, if any.
    pub fn find(text: &str) -> Option<Self> {
        section_id_regex()
            .find(text)
            .map(|m| SectionId(m.as_str().to_string()))
    }

    /// Like [`SectionId::find`], but a missing identifier is format drift.
    pub fn extract(text: &str, context: &'static str) -> MergeResult<Self> {
        Self::find(text).ok_or_else(|| MergeError::FormatDrift {
            context,
            text: text.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered `SectionId -> questions`. Entries are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionMap {
    sections: IndexMap<SectionId, Vec<String>>,
}

impl QuestionMap {
    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.sections.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn question_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionId, &[String])> {
        self.sections
            .iter()
            .map(|(id, questions)| (id, questions.as_slice()))
    }

    fn append(&mut self, id: SectionId, questions: Vec<String>) {
        if questions.is_empty() {
            return;
        }
        self.sections.entry(id).or_default().extend(questions);
    }
}

pub fn map_sections(rows: &[CleanRow]) -> MergeResult<QuestionMap> {
    let mut map = QuestionMap::default();
    for section in rows.iter().map(|row| row.section.as_str()).unique() {
        let questions = rows
            .iter()
            .filter(|row| row.section == section)
            .map(|row| row.question.clone())
            .collect::<Vec<_>>();
        let id = SectionId::extract(section, "section column")?;
        debug!("Section {id} ('{section}') has {} question(s)", questions.len());
        map.append(id, questions);
    }
    Ok(map)
}
