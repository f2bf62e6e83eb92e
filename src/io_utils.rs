//! File-level helpers shared by the source and template loaders.
//!
//! - **Extensions**: every configured path is checked against the extensions
//!   its role accepts before anything is opened.
//! - **Delimited input**: `.csv`/`.tsv` questionnaires are read through the
//!   `csv` crate, with the delimiter taken from the extension.
//! - **Encoding**: delimited input is decoded via `encoding_rs`, defaulting to
//!   UTF-8.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};

use crate::error::{MergeError, MergeResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];
pub const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["docx"];

pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    extension(path).is_some_and(|ext| allowed.contains(&ext.as_str()))
}

pub fn require_extension(path: &Path, allowed: &[&str], role: &str) -> MergeResult<()> {
    if has_extension(path, allowed) {
        Ok(())
    } else {
        Err(MergeError::config(format!(
            "{role} {path:?} must have one of the extensions: {}",
            allowed.join(", ")
        )))
    }
}

pub fn require_file(path: &Path, role: &str) -> MergeResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MergeError::data_access(
            path,
            format!("{role} not found"),
        ))
    }
}

pub fn resolve_encoding(label: Option<&str>) -> MergeResult<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| MergeError::config(format!("Unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path) -> u8 {
    match extension(path).as_deref() {
        Some("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

/// Questionnaires are hand-edited, so rows may be ragged.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path) -> MergeResult<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| MergeError::data_access(path, err))?;
    Ok(open_csv_reader(
        BufReader::new(file),
        resolve_input_delimiter(path),
    ))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> MergeResult<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(MergeError::config(format!(
            "Failed to decode text with encoding {}",
            encoding.name()
        )))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> MergeResult<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}
