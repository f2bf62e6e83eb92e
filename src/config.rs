//! YAML run configuration.
//!
//! The file has two sections: `excel` describes the questionnaire source and
//! `word` the template and output document. Relative paths are resolved
//! against the directory holding the configuration file. [`Config::load`]
//! parses, resolves, and validates in one step so a bad setting stops the run
//! before any data is read.

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::{
    blocks::ListFormat,
    error::{MergeError, MergeResult},
    io_utils,
    rewrite::{DEFAULT_RESPONSE_PLACEHOLDER, ItemTemplate},
    rows::DEFAULT_EXCLUDE_KEYWORD,
};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Zero-based spreadsheet column, written as letters (`C`) or an index (`2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "ColumnSpec")]
pub struct ColumnRef(u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnSpec {
    Index(u32),
    Letters(String),
}

/// Columns in a worksheet, `A` through `XFD`.
pub const MAX_COLUMNS: u32 = 16_384;

impl TryFrom<ColumnSpec> for ColumnRef {
    type Error = String;

    fn try_from(spec: ColumnSpec) -> Result<Self, Self::Error> {
        match spec {
            ColumnSpec::Index(index) if index < MAX_COLUMNS => Ok(ColumnRef(index)),
            ColumnSpec::Index(index) => Err(format!(
                "Column index {index} is past the last sheet column (XFD, index {})",
                MAX_COLUMNS - 1
            )),
            ColumnSpec::Letters(letters) => letters.parse(),
        }
    }
}

impl ColumnRef {
    pub fn from_index(index: u32) -> Self {
        ColumnRef(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn letters(self) -> String {
        let mut remaining = u64::from(self.0) + 1;
        let mut letters = Vec::new();
        while remaining > 0 {
            let rem = (remaining - 1) % 26;
            letters.push(char::from(b'A' + rem as u8));
            remaining = (remaining - 1) / 26;
        }
        letters.iter().rev().collect()
    }
}

impl FromStr for ColumnRef {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.len() > 3 {
            return Err(format!("Invalid column letters '{value}'"));
        }
        let mut number = 0u32;
        for ch in trimmed.chars() {
            if !ch.is_ascii_alphabetic() {
                return Err(format!("Invalid column letters '{value}'"));
            }
            number = number * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        if number > MAX_COLUMNS {
            return Err(format!("Column '{value}' is past the last sheet column XFD"));
        }
        Ok(ColumnRef(number - 1))
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ColumnMap {
    pub section: ColumnRef,
    pub question: ColumnRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Workbook,
    Delimited,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    pub filepath: PathBuf,
    #[serde(default)]
    pub sheet_name: Option<String>,
    /// Zero-based sheet row holding the column titles.
    #[serde(default)]
    pub header: u32,
    /// Subtracted from a 1-based sheet row number to get a data row position.
    #[serde(default)]
    pub row_shift: Option<i64>,
    #[serde(default)]
    pub ignore_color: Option<String>,
    #[serde(default)]
    pub ignore_column: Option<ColumnRef>,
    #[serde(default)]
    pub input_encoding: Option<String>,
    #[serde(default = "default_exclude_keyword")]
    pub exclude_keyword: String,
    pub column_map: ColumnMap,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSettings {
    pub template_path: PathBuf,
    pub export_path: PathBuf,
    #[serde(default = "default_response_placeholder")]
    pub response_placeholder: String,
    #[serde(default)]
    pub numbering_id: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub excel: SourceSettings,
    pub word: TemplateSettings,
}

fn default_exclude_keyword() -> String {
    DEFAULT_EXCLUDE_KEYWORD.to_string()
}

fn default_response_placeholder() -> String {
    DEFAULT_RESPONSE_PLACEHOLDER.to_string()
}

impl SourceSettings {
    pub fn kind(&self) -> MergeResult<SourceKind> {
        if io_utils::has_extension(&self.filepath, io_utils::WORKBOOK_EXTENSIONS) {
            Ok(SourceKind::Workbook)
        } else if io_utils::has_extension(&self.filepath, io_utils::DELIMITED_EXTENSIONS) {
            Ok(SourceKind::Delimited)
        } else {
            Err(MergeError::config(format!(
                "questionnaire file {:?} must be .xlsx, .xlsm, .csv or .tsv",
                self.filepath
            )))
        }
    }

    pub fn effective_row_shift(&self) -> i64 {
        self.row_shift.unwrap_or(i64::from(self.header) + 2)
    }

    /// `(column, ARGB)` when fill-based exclusion is configured.
    pub fn ignore_fill(&self) -> MergeResult<Option<(ColumnRef, String)>> {
        match (&self.ignore_color, self.ignore_column) {
            (None, None) => Ok(None),
            (Some(color), Some(column)) => Ok(Some((column, normalize_argb(color)?))),
            (Some(_), None) => Err(MergeError::config(
                "excel.ignore_color is set but excel.ignore_column is missing",
            )),
            (None, Some(_)) => Err(MergeError::config(
                "excel.ignore_column is set but excel.ignore_color is missing",
            )),
        }
    }
}

impl TemplateSettings {
    pub fn item_template(&self) -> ItemTemplate {
        let mut format = ListFormat::default();
        if let Some(num_id) = self.numbering_id {
            format.num_id = num_id;
        }
        ItemTemplate {
            format,
            response: self.response_placeholder.clone(),
        }
    }
}

/// Uppercase 8-digit ARGB; a 6-digit RGB gets an opaque alpha.
pub fn normalize_argb(value: &str) -> MergeResult<String> {
    let trimmed = value.trim().trim_start_matches('#');
    if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(MergeError::config(format!(
            "Fill color '{value}' is not a hex ARGB value"
        )));
    }
    match trimmed.len() {
        8 => Ok(trimmed.to_ascii_uppercase()),
        6 => Ok(format!("FF{}", trimmed.to_ascii_uppercase())),
        _ => Err(MergeError::config(format!(
            "Fill color '{value}' must have 6 (RGB) or 8 (ARGB) hex digits"
        ))),
    }
}

impl Config {
    pub fn load(path: &Path) -> MergeResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            MergeError::config(format!("Cannot read configuration file {path:?}: {err}"))
        })?;
        let mut config = Self::parse(&raw)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> MergeResult<Self> {
        serde_yaml::from_str(raw)
            .map_err(|err| MergeError::config(format!("Invalid configuration: {err}")))
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.excel.filepath,
            &mut self.word.template_path,
            &mut self.word.export_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> MergeResult<()> {
        let kind = self.excel.kind()?;
        io_utils::require_extension(
            &self.word.template_path,
            io_utils::DOCUMENT_EXTENSIONS,
            "template file",
        )?;
        io_utils::require_extension(
            &self.word.export_path,
            io_utils::DOCUMENT_EXTENSIONS,
            "export file",
        )?;
        let fill = self.excel.ignore_fill()?;
        match kind {
            SourceKind::Delimited => {
                if fill.is_some() {
                    return Err(MergeError::config(
                        "excel.ignore_color needs an .xlsx/.xlsm source; CSV files carry no fill colors",
                    ));
                }
                if self.excel.sheet_name.is_some() {
                    return Err(MergeError::config(
                        "excel.sheet_name only applies to .xlsx/.xlsm sources",
                    ));
                }
                io_utils::resolve_encoding(self.excel.input_encoding.as_deref())?;
            }
            SourceKind::Workbook => {
                if self.excel.input_encoding.is_some() {
                    return Err(MergeError::config(
                        "excel.input_encoding only applies to .csv/.tsv sources",
                    ));
                }
            }
        }
        let columns = self.excel.column_map;
        if columns.section == columns.question {
            return Err(MergeError::config(format!(
                "Section and question columns are both {}",
                columns.section
            )));
        }
        if self.word.template_path == self.word.export_path {
            return Err(MergeError::config(
                "word.export_path must differ from word.template_path",
            ));
        }
        io_utils::require_file(&self.excel.filepath, "questionnaire file")?;
        io_utils::require_file(&self.word.template_path, "template file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
excel:
  filepath: questions.xlsx
  column_map:
    section: C
    question: 8
word:
  template_path: template.docx
  export_path: out/filled.docx
"#;

    #[test]
    fn column_letters_round_trip_through_indexes() {
        assert_eq!("A".parse::<ColumnRef>().unwrap().index(), 0);
        assert_eq!("i".parse::<ColumnRef>().unwrap().index(), 8);
        assert_eq!("AA".parse::<ColumnRef>().unwrap().index(), 26);
        assert_eq!(ColumnRef::from_index(27).letters(), "AB");
        assert!("A1".parse::<ColumnRef>().is_err());
        assert!("".parse::<ColumnRef>().is_err());
    }

    #[test]
    fn columns_past_xfd_are_rejected() {
        assert_eq!("XFD".parse::<ColumnRef>().unwrap().index(), MAX_COLUMNS - 1);
        assert_eq!(ColumnRef::from_index(MAX_COLUMNS - 1).letters(), "XFD");
        assert!("XFE".parse::<ColumnRef>().is_err());
        assert!("ZZZ".parse::<ColumnRef>().is_err());
        assert_eq!(ColumnRef::from_index(u32::MAX).letters(), "MWLQKWV");

        let huge = MINIMAL.replace("question: 8", "question: 4294967295");
        let err = Config::parse(&huge).unwrap_err();
        assert!(matches!(err, MergeError::Config(_)), "{err}");
        assert!(Config::parse(&MINIMAL.replace("question: 8", "question: 16383")).is_ok());
    }

    #[test]
    fn parse_applies_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.excel.column_map.section.index(), 2);
        assert_eq!(config.excel.column_map.question.index(), 8);
        assert_eq!(config.excel.header, 0);
        assert_eq!(config.excel.effective_row_shift(), 2);
        assert_eq!(config.excel.exclude_keyword, "see");
        assert_eq!(config.word.response_placeholder, "[enter response here]");
        assert_eq!(config.excel.kind().unwrap(), SourceKind::Workbook);
    }

    #[test]
    fn parse_rejects_bad_column_letters() {
        let raw = MINIMAL.replace("section: C", "section: C3");
        let err = Config::parse(&raw).unwrap_err();
        assert!(matches!(err, MergeError::Config(_)), "{err}");
    }

    #[test]
    fn resolve_paths_joins_relative_entries() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.resolve_paths(Path::new("/data/run"));
        assert_eq!(
            config.excel.filepath,
            PathBuf::from("/data/run/questions.xlsx")
        );
        assert_eq!(
            config.word.export_path,
            PathBuf::from("/data/run/out/filled.docx")
        );
    }

    #[test]
    fn ignore_fill_requires_both_halves() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.excel.ignore_color = Some("ffff00".to_string());
        assert!(config.excel.ignore_fill().is_err());
        config.excel.ignore_column = Some(ColumnRef::from_index(0));
        let (column, color) = config.excel.ignore_fill().unwrap().unwrap();
        assert_eq!(column.letters(), "A");
        assert_eq!(color, "FFFFFF00");
    }

    #[test]
    fn normalize_argb_rejects_garbage() {
        assert!(normalize_argb("yellow").is_err());
        assert!(normalize_argb("FFF").is_err());
        assert_eq!(normalize_argb("#00ff00").unwrap(), "FF00FF00");
    }

    #[test]
    fn validate_rejects_unknown_source_extension() {
        let raw = MINIMAL.replace("questions.xlsx", "questions.ods");
        let config = Config::parse(&raw).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MergeError::Config(_)), "{err}");
    }

    #[test]
    fn validate_reports_missing_files_as_data_access() {
        let config = Config::parse(MINIMAL).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MergeError::DataAccess { .. }), "{err}");
    }
}
