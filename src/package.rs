//! Office Open XML package access (the zip container behind `.xlsx` and `.docx`).

use std::{
    fs::{self, File},
    io::{BufReader, Read, Write},
    path::Path,
};

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use tempfile::NamedTempFile;
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::error::{MergeError, MergeResult};

pub type Archive = ZipArchive<BufReader<File>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl PackageEntry {
    fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

pub fn open_archive(path: &Path) -> MergeResult<Archive> {
    let file = File::open(path).map_err(|err| MergeError::data_access(path, err))?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|err| MergeError::data_access(path, format!("not an Office package: {err}")))
}

pub fn read_optional_part(
    archive: &mut Archive,
    path: &Path,
    part: &str,
) -> MergeResult<Option<String>> {
    let mut entry = match archive.by_name(part) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(MergeError::data_access(path, format!("{part}: {err}"))),
    };
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|err| MergeError::data_access(path, format!("{part}: {err}")))?;
    Ok(Some(content))
}

pub fn read_part(archive: &mut Archive, path: &Path, part: &str) -> MergeResult<String> {
    read_optional_part(archive, path, part)?
        .ok_or_else(|| MergeError::data_access(path, format!("package has no {part}")))
}

/// Every entry in archive order.
pub fn read_entries(path: &Path) -> MergeResult<Vec<PackageEntry>> {
    let mut archive = open_archive(path)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| MergeError::data_access(path, err))?;
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|err| MergeError::data_access(path, format!("{name}: {err}")))?;
        entries.push(PackageEntry { name, data });
    }
    Ok(entries)
}

/// Writes to a temporary file beside `path` and renames it into place, so a
/// failure never leaves a half-written package behind.
pub fn write_entries(path: &Path, entries: &[PackageEntry]) -> MergeResult<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|err| MergeError::data_access(dir, err))?;
    let mut temp = NamedTempFile::new_in(dir).map_err(|err| MergeError::data_access(dir, err))?;

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(temp.as_file_mut());
    for entry in entries {
        if entry.is_dir() {
            zip.add_directory(entry.name.as_str(), options)
                .map_err(|err| MergeError::data_access(path, err))?;
            continue;
        }
        zip.start_file(entry.name.as_str(), options)
            .map_err(|err| MergeError::data_access(path, err))?;
        zip.write_all(&entry.data)
            .map_err(|err| MergeError::data_access(path, err))?;
    }
    zip.finish()
        .map_err(|err| MergeError::data_access(path, err))?;

    temp.persist(path)
        .map_err(|err| MergeError::data_access(path, err.error))?;
    Ok(())
}

/// Package-level relationships, naming the main document part.
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Relationship type URI.
    pub kind: String,
    pub target: String,
}

pub fn parse_relationships(path: &Path, part: &str, xml: &str) -> MergeResult<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut relationships = Vec::new();
    loop {
        match reader
            .read_event()
            .map_err(|err| xml_error(path, part, err))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target"))
                {
                    relationships.push(Relationship {
                        id,
                        kind: attribute(&e, b"Type").unwrap_or_default(),
                        target,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(relationships)
}

/// Part name for a relationship target; relative targets resolve against `base`.
pub fn resolve_target(base: &str, target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base}{target}"),
    }
}

/// First character XML 1.0 cannot carry, if any.
pub fn forbidden_xml_char(text: &str) -> Option<char> {
    text.chars().find(|&ch| {
        matches!(ch, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
    })
}

/// Unescaped value of the attribute whose local name is `local`.
pub fn attribute(element: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.local_name().as_ref() == local)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

pub fn xml_error(path: &Path, part: &str, err: impl std::fmt::Display) -> MergeError {
    MergeError::data_access(path, format!("malformed {part}: {err}"))
}
