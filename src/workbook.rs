//! Questionnaire loading: raw rows from `.xlsx`/`.xlsm` or `.csv`/`.tsv`, and
//! the fill-color exclusion set.
//!
//! Data positions are zero-based and start on the row after the header row, so
//! position `i` is sheet row `header + 2 + i` (1-based). Fill scanning reports
//! sheet row numbers; `row_shift` converts them back to positions.

use std::{collections::BTreeSet, path::Path};

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    config::{ColumnMap, SourceKind, SourceSettings},
    error::{MergeError, MergeResult},
    fills, io_utils,
    rows::RawRow,
};

pub fn load_rows(settings: &SourceSettings) -> MergeResult<Vec<RawRow>> {
    let rows = match settings.kind()? {
        SourceKind::Workbook => load_workbook_rows(
            &settings.filepath,
            settings.sheet_name.as_deref(),
            settings.header,
            settings.column_map,
        )?,
        SourceKind::Delimited => {
            let encoding = io_utils::resolve_encoding(settings.input_encoding.as_deref())?;
            load_delimited_rows(
                &settings.filepath,
                encoding,
                settings.header,
                settings.column_map,
            )?
        }
    };
    info!("Read {} data row(s) from {:?}", rows.len(), settings.filepath);
    Ok(rows)
}

pub fn load_workbook_rows(
    path: &Path,
    sheet: Option<&str>,
    header: u32,
    columns: ColumnMap,
) -> MergeResult<Vec<RawRow>> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|err| MergeError::data_access(path, err))?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| MergeError::data_access(path, "workbook has no sheets"))?,
    };
    if !workbook.sheet_names().contains(&sheet_name) {
        return Err(MergeError::data_access(
            path,
            format!("sheet '{sheet_name}' not found"),
        ));
    }
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| MergeError::data_access(path, format!("sheet '{sheet_name}': {err}")))?;
    debug!("Reading sheet '{sheet_name}' from {path:?}");
    Ok(rows_from_range(&range, header, columns))
}

fn rows_from_range(range: &Range<Data>, header: u32, columns: ColumnMap) -> Vec<RawRow> {
    let Some((_, (last_row, _))) = range.start().zip(range.end()) else {
        return Vec::new();
    };
    (header + 1..=last_row)
        .map(|row| RawRow {
            section_raw: cell_text(range, row, columns.section.index()),
            question_raw: cell_text(range, row, columns.question.index()),
        })
        .collect()
}

fn cell_text(range: &Range<Data>, row: u32, column: u32) -> Option<String> {
    match range.get_value((row, column))? {
        Data::Empty | Data::Error(_) => None,
        Data::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

pub fn load_delimited_rows(
    path: &Path,
    encoding: &'static Encoding,
    header: u32,
    columns: ColumnMap,
) -> MergeResult<Vec<RawRow>> {
    let mut reader = io_utils::open_csv_reader_from_path(path)?;
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            MergeError::data_access(path, format!("reading line {}: {err}", idx + 1))
        })?;
        if idx <= header as usize {
            continue;
        }
        let decoded = io_utils::decode_record(&record, encoding)?;
        let field = |column: u32| {
            decoded
                .get(column as usize)
                .filter(|value| !value.is_empty())
                .cloned()
        };
        rows.push(RawRow {
            section_raw: field(columns.section.index()),
            question_raw: field(columns.question.index()),
        });
    }
    Ok(rows)
}

/// Data positions whose ignore-column cell carries the ignore fill color.
pub fn excluded_positions(settings: &SourceSettings) -> MergeResult<BTreeSet<usize>> {
    let Some((column, color)) = settings.ignore_fill()? else {
        return Ok(BTreeSet::new());
    };
    let sheet_rows = fills::rows_with_fill(
        &settings.filepath,
        settings.sheet_name.as_deref(),
        column,
        &color,
    )?;
    let positions = positions_from_sheet_rows(&sheet_rows, settings.effective_row_shift())?;
    info!(
        "{} row(s) in column {column} are filled with {color} and will be skipped",
        positions.len()
    );
    Ok(positions)
}

pub fn positions_from_sheet_rows(rows: &[u32], row_shift: i64) -> MergeResult<BTreeSet<usize>> {
    rows.iter()
        .map(|&row| {
            let position = i64::from(row) - row_shift;
            usize::try_from(position).map_err(|_| {
                MergeError::config(format!(
                    "filled sheet row {row} maps to position {position} with row_shift {row_shift}; \
                     it lies above the first data row"
                ))
            })
        })
        .collect()
}
