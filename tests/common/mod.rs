#![allow(dead_code)]

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use rfi_merge::blocks::BlockDocument;
use rfi_merge::docx::DocxDocument;
use tempfile::{TempDir, tempdir};
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

pub const MARKER: &str = "Confirm/Submit/Describe";
pub const FILL_ARGB: &str = "FFFFFF00";

/// Section header block text in the template layout ("Standard X.YY – Title").
pub fn header(id: &str, title: &str) -> String {
    format!("Standard {id} \u{2013} {title}")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a single-sheet workbook. Empty strings leave the cell out;
    /// `filled` lists zero-based `(row, column)` cells styled with [`FILL_ARGB`].
    pub fn write_xlsx(
        &self,
        name: &str,
        sheet: &str,
        rows: &[Vec<&str>],
        filled: &[(usize, usize)],
    ) -> PathBuf {
        let mut sheet_data = String::new();
        for (row_idx, row) in rows.iter().enumerate() {
            let row_number = row_idx + 1;
            sheet_data.push_str(&format!(r#"<row r="{row_number}">"#));
            let filled_width = filled
                .iter()
                .filter(|(r, _)| *r == row_idx)
                .map(|(_, c)| c + 1)
                .max()
                .unwrap_or(0);
            let width = row.len().max(filled_width);
            for col_idx in 0..width {
                let text = row.get(col_idx).copied().unwrap_or("");
                let is_filled = filled.contains(&(row_idx, col_idx));
                if text.is_empty() && !is_filled {
                    continue;
                }
                let reference = format!("{}{row_number}", column_letters(col_idx));
                let style = if is_filled { r#" s="1""# } else { "" };
                if text.is_empty() {
                    sheet_data.push_str(&format!(r#"<c r="{reference}"{style}/>"#));
                } else {
                    sheet_data.push_str(&format!(
                        r#"<c r="{reference}"{style} t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(text)
                    ));
                }
            }
            sheet_data.push_str("</row>");
        }

        let parts = [
            (
                "[Content_Types].xml",
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
                    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
                    "</Types>"
                )
                .to_string(),
            ),
            (
                "_rels/.rels",
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
                    "</Relationships>"
                )
                .to_string(),
            ),
            (
                "xl/workbook.xml",
                format!(
                    concat!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
                        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
                        r#"<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
                    ),
                    escape(sheet)
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
                    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
                    "</Relationships>"
                )
                .to_string(),
            ),
            (
                "xl/styles.xml",
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
                    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
                    r#"<fills count="3"><fill><patternFill patternType="none"/></fill>"#,
                    r#"<fill><patternFill patternType="gray125"/></fill>"#,
                    r#"<fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/><bgColor indexed="64"/></patternFill></fill></fills>"#,
                    r#"<borders count="1"><border/></borders>"#,
                    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
                    r#"<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
                    r#"<xf numFmtId="0" fontId="0" fillId="2" borderId="0" xfId="0" applyFill="1"/></cellXfs>"#,
                    "</styleSheet>"
                )
                .to_string(),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    concat!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
                        "<sheetData>{}</sheetData></worksheet>"
                    ),
                    sheet_data
                ),
            ),
        ];
        self.write_zip(name, &parts)
    }

    /// Writes a template whose body holds one plain paragraph per entry.
    pub fn write_docx<S: AsRef<str>>(&self, name: &str, paragraphs: &[S]) -> PathBuf {
        let body = paragraphs
            .iter()
            .map(|text| {
                format!(
                    r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                    escape(text.as_ref())
                )
            })
            .collect::<String>();
        let parts = [
            (
                "[Content_Types].xml",
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
                    "</Types>"
                )
                .to_string(),
            ),
            (
                "_rels/.rels",
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
                    "</Relationships>"
                )
                .to_string(),
            ),
            (
                "word/document.xml",
                format!(
                    concat!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                        r#"<w:body>{}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
                    ),
                    body
                ),
            ),
        ];
        self.write_zip(name, &parts)
    }

    /// Writes a configuration file next to the inputs. `excel_extra` lines are
    /// appended to the `excel` section as-is.
    pub fn write_config(
        &self,
        source: &str,
        template: &str,
        export: &str,
        excel_extra: &[&str],
    ) -> PathBuf {
        let mut yaml = format!(
            "excel:\n  filepath: {source}\n  header: 0\n  column_map:\n    section: A\n    question: B\n"
        );
        for line in excel_extra {
            yaml.push_str("  ");
            yaml.push_str(line);
            yaml.push('\n');
        }
        yaml.push_str(&format!(
            "word:\n  template_path: {template}\n  export_path: {export}\n"
        ));
        self.write("config.yaml", &yaml)
    }

    fn write_zip(&self, name: &str, parts: &[(&str, String)]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let file = File::create(&path).expect("create package");
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (part, contents) in parts {
            zip.start_file(*part, options).expect("start package entry");
            zip.write_all(contents.as_bytes())
                .expect("write package entry");
        }
        zip.finish().expect("finish package");
        path
    }
}

/// Zero-based column index as spreadsheet letters.
pub fn column_letters(index: usize) -> String {
    let mut remaining = index + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        letters.push(char::from(b'A' + ((remaining - 1) % 26) as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Text of every body paragraph in a saved document.
pub fn paragraph_texts(path: &Path) -> Vec<String> {
    let document = DocxDocument::open(path).expect("open docx");
    (0..document.block_count())
        .map(|position| document.block_text(position).expect("block").to_string())
        .collect()
}

/// Raw `word/document.xml` of a saved document.
pub fn document_xml(path: &Path) -> String {
    let mut archive = ZipArchive::new(File::open(path).expect("open package")).expect("zip");
    let mut part = archive.by_name("word/document.xml").expect("document part");
    let mut xml = String::new();
    part.read_to_string(&mut xml).expect("read document part");
    xml
}

pub fn read_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).expect("read file")
}
