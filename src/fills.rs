//! Cell background colors read straight from an `.xlsx` package.
//!
//! Value readers do not expose styling, so this walks the package parts
//! directly: `xl/workbook.xml` and its relationships locate the sheet part,
//! `xl/styles.xml` maps a cell's style index to a fill, and the fill's
//! `patternFill/fgColor@rgb` is the color compared against the configuration.

use std::path::Path;

use quick_xml::{Reader, events::Event};

use crate::{
    config::ColumnRef,
    error::{MergeError, MergeResult},
    package::{self, attribute, xml_error},
};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFill {
    /// 1-based sheet row number.
    pub row: u32,
    /// Uppercase ARGB, when the fill carries an explicit RGB color.
    pub color: Option<String>,
}

pub fn column_fills(
    path: &Path,
    sheet: Option<&str>,
    column: ColumnRef,
) -> MergeResult<Vec<CellFill>> {
    let mut archive = package::open_archive(path)?;
    let workbook = package::read_part(&mut archive, path, WORKBOOK_PART)?;
    let rels = package::read_part(&mut archive, path, WORKBOOK_RELS_PART)?;
    let sheet_part = resolve_sheet_part(path, &workbook, &rels, sheet)?;
    let styles = match package::read_optional_part(&mut archive, path, STYLES_PART)? {
        Some(xml) => StyleTable::parse(path, &xml)?,
        None => StyleTable::default(),
    };
    let sheet_xml = package::read_part(&mut archive, path, &sheet_part)?;
    scan_column(path, &sheet_part, &sheet_xml, column, &styles)
}

/// Sheet rows (1-based) whose cell in `column` is filled with `argb`.
pub fn rows_with_fill(
    path: &Path,
    sheet: Option<&str>,
    column: ColumnRef,
    argb: &str,
) -> MergeResult<Vec<u32>> {
    Ok(column_fills(path, sheet, column)?
        .into_iter()
        .filter(|cell| {
            cell.color
                .as_deref()
                .is_some_and(|color| color.eq_ignore_ascii_case(argb))
        })
        .map(|cell| cell.row)
        .collect())
}

fn resolve_sheet_part(
    path: &Path,
    workbook: &str,
    rels: &str,
    wanted: Option<&str>,
) -> MergeResult<String> {
    let sheets = parse_sheets(path, workbook)?;
    let (name, rel_id) = match wanted {
        Some(wanted) => sheets.iter().find(|(name, _)| name == wanted),
        None => sheets.first(),
    }
    .ok_or_else(|| match wanted {
        Some(wanted) => MergeError::data_access(path, format!("sheet '{wanted}' not found")),
        None => MergeError::data_access(path, "workbook has no sheets"),
    })?;

    let target = package::parse_relationships(path, WORKBOOK_RELS_PART, rels)?
        .into_iter()
        .find(|rel| rel.id == *rel_id)
        .map(|rel| rel.target)
        .ok_or_else(|| {
            MergeError::data_access(path, format!("sheet '{name}' has no part relationship"))
        })?;
    Ok(package::resolve_target("xl/", &target))
}

fn parse_sheets(path: &Path, xml: &str) -> MergeResult<Vec<(String, String)>> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader
            .read_event()
            .map_err(|err| xml_error(path, WORKBOOK_PART, err))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (attribute(&e, b"name"), attribute(&e, b"id")) {
                    sheets.push((name, id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct StyleTable {
    fills: Vec<Option<String>>,
    /// `cellXfs` index -> fill index.
    cell_fill_ids: Vec<usize>,
}

impl StyleTable {
    fn parse(path: &Path, xml: &str) -> MergeResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut table = StyleTable::default();
        let mut in_fills = false;
        let mut in_pattern = false;
        let mut in_cell_xfs = false;
        loop {
            let event = reader
                .read_event()
                .map_err(|err| xml_error(path, STYLES_PART, err))?;
            let (element, is_empty) = match &event {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(e) => {
                    match e.local_name().as_ref() {
                        b"fills" => in_fills = false,
                        b"patternFill" => in_pattern = false,
                        b"cellXfs" => in_cell_xfs = false,
                        _ => {}
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };
            match element.local_name().as_ref() {
                b"fills" => in_fills = !is_empty,
                b"fill" if in_fills => table.fills.push(None),
                b"patternFill" if in_fills => in_pattern = !is_empty,
                b"fgColor" if in_pattern => {
                    if let (Some(slot), Some(rgb)) =
                        (table.fills.last_mut(), attribute(element, b"rgb"))
                    {
                        *slot = Some(rgb.to_ascii_uppercase());
                    }
                }
                b"cellXfs" => in_cell_xfs = !is_empty,
                b"xf" if in_cell_xfs => {
                    let fill_id = attribute(element, b"fillId")
                        .and_then(|value| value.parse().ok())
                        .unwrap_or(0);
                    table.cell_fill_ids.push(fill_id);
                }
                _ => {}
            }
        }
        Ok(table)
    }

    fn color_for_style(&self, style: usize) -> Option<&str> {
        let fill = *self.cell_fill_ids.get(style)?;
        self.fills.get(fill)?.as_deref()
    }
}

fn scan_column(
    path: &Path,
    part: &str,
    xml: &str,
    column: ColumnRef,
    styles: &StyleTable,
) -> MergeResult<Vec<CellFill>> {
    let mut reader = Reader::from_str(xml);
    let mut cells = Vec::new();
    let mut row = 0u32;
    let mut next_column = 0u32;
    loop {
        match reader
            .read_event()
            .map_err(|err| xml_error(path, part, err))?
        {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = attribute(&e, b"r")
                        .and_then(|value| value.parse().ok())
                        .unwrap_or(row + 1);
                    next_column = 0;
                }
                b"c" => {
                    let (cell_column, cell_row) = attribute(&e, b"r")
                        .and_then(|reference| split_reference(&reference))
                        .unwrap_or((ColumnRef::from_index(next_column), row));
                    next_column = cell_column.index() + 1;
                    if cell_column != column {
                        continue;
                    }
                    let style = attribute(&e, b"s")
                        .and_then(|value| value.parse().ok())
                        .unwrap_or(0);
                    cells.push(CellFill {
                        row: cell_row,
                        color: styles.color_for_style(style).map(str::to_string),
                    });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(cells)
}

/// `"AB12"` -> (column AB, row 12).
fn split_reference(reference: &str) -> Option<(ColumnRef, u32)> {
    let digits_at = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(digits_at);
    let column = letters.parse().ok()?;
    let row = digits.parse().ok()?;
    Some((column, row))
}
