//! `.docx` templates as [`BlockDocument`]s.
//!
//! Blocks are the paragraphs that sit directly under `w:body`. Tables, section
//! properties, and whitespace between paragraphs are carried along untouched as
//! raw XML, so saving reproduces everything the rewrite did not edit.

use std::{path::Path, sync::OnceLock};

use log::{debug, info};
use quick_xml::{Reader, escape::escape, events::Event};
use regex::Regex;

use crate::{
    blocks::{BlockDocument, ListFormat},
    error::{MergeError, MergeResult},
    package::{self, PACKAGE_RELS_PART, PackageEntry, forbidden_xml_char, xml_error},
};

/// Main part name when the package relationships do not name one.
const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_TYPE: &str = "/officeDocument";

/// `w:pPr` children that must precede `w:numPr`.
const BEFORE_NUMBERING: &[&str] = &[
    "pStyle",
    "keepNext",
    "keepLines",
    "pageBreakBefore",
    "framePr",
    "widowControl",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Paragraph {
    xml: String,
    text: String,
    properties: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BodyNode {
    Paragraph(Paragraph),
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct DocxDocument {
    document_part: String,
    entries: Vec<PackageEntry>,
    head: String,
    nodes: Vec<BodyNode>,
    tail: String,
    /// Node index of every paragraph, in order.
    paragraphs: Vec<usize>,
}

impl DocxDocument {
    pub fn open(path: &Path) -> MergeResult<Self> {
        let entries = package::read_entries(path)?;
        let document_part = document_part(path, &entries)?;
        let document = entries
            .iter()
            .find(|entry| entry.name == document_part)
            .ok_or_else(|| MergeError::data_access(path, format!("package has no {document_part}")))?;
        let xml = String::from_utf8(document.data.clone())
            .map_err(|err| xml_error(path, &document_part, err))?;
        let parsed = parse_body(path, &document_part, &xml)?;
        let mut doc = Self {
            document_part,
            entries,
            head: parsed.head,
            nodes: parsed.nodes,
            tail: parsed.tail,
            paragraphs: Vec::new(),
        };
        doc.reindex();
        info!(
            "Loaded template {:?} with {} paragraph(s)",
            path,
            doc.paragraphs.len()
        );
        Ok(doc)
    }

    pub fn document_xml(&self) -> String {
        let mut xml = String::with_capacity(self.head.len() + self.tail.len());
        xml.push_str(&self.head);
        for node in &self.nodes {
            match node {
                BodyNode::Paragraph(paragraph) => xml.push_str(&paragraph.xml),
                BodyNode::Raw(raw) => xml.push_str(raw),
            }
        }
        xml.push_str(&self.tail);
        xml
    }

    pub fn save(&self, path: &Path) -> MergeResult<()> {
        let document = self.document_xml().into_bytes();
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                if entry.name == self.document_part {
                    PackageEntry {
                        name: entry.name.clone(),
                        data: document.clone(),
                    }
                } else {
                    entry.clone()
                }
            })
            .collect::<Vec<_>>();
        package::write_entries(path, &entries)?;
        info!("Saved {} paragraph(s) to {:?}", self.paragraphs.len(), path);
        Ok(())
    }

    fn reindex(&mut self) {
        self.paragraphs = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, BodyNode::Paragraph(_)))
            .map(|(idx, _)| idx)
            .collect();
    }

    fn node_index(&self, position: usize) -> MergeResult<usize> {
        self.paragraphs.get(position).copied().ok_or_else(|| {
            MergeError::InternalConsistency(format!(
                "paragraph {position} does not exist ({} paragraph(s))",
                self.paragraphs.len()
            ))
        })
    }

    fn properties_at(&self, node: usize) -> Option<String> {
        match self.nodes.get(node)? {
            BodyNode::Paragraph(paragraph) => paragraph.properties.clone(),
            BodyNode::Raw(_) => None,
        }
    }

    fn paragraph(&self, position: usize) -> Option<&Paragraph> {
        match self.nodes.get(*self.paragraphs.get(position)?)? {
            BodyNode::Paragraph(paragraph) => Some(paragraph),
            BodyNode::Raw(_) => None,
        }
    }
}

impl BlockDocument for DocxDocument {
    fn block_count(&self) -> usize {
        self.paragraphs.len()
    }

    fn block_text(&self, position: usize) -> Option<&str> {
        self.paragraph(position).map(|paragraph| paragraph.text.as_str())
    }

    fn write_list_item(
        &mut self,
        position: usize,
        text: &str,
        format: ListFormat,
    ) -> MergeResult<()> {
        let node = self.node_index(position)?;
        let properties = self.properties_at(node);
        self.nodes[node] = BodyNode::Paragraph(list_paragraph(properties.as_deref(), text, format)?);
        Ok(())
    }

    fn insert_list_item_after(
        &mut self,
        position: usize,
        text: &str,
        format: ListFormat,
    ) -> MergeResult<()> {
        let node = self.node_index(position)?;
        let properties = self.properties_at(node);
        let section = properties
            .as_deref()
            .and_then(|props| section_regex().find(props))
            .map(|found| found.as_str().to_string());
        let inherited = properties
            .as_deref()
            .map(|props| inherited_properties(props, section.as_deref()));
        let paragraph = list_paragraph(inherited.as_deref(), text, format)?;
        // A section break ends the run of items, so it moves to the new last item.
        if let (Some(section), BodyNode::Paragraph(anchor)) = (section.as_deref(), &mut self.nodes[node]) {
            anchor.xml = anchor.xml.replacen(section, "", 1);
            anchor.properties = anchor
                .properties
                .as_ref()
                .map(|props| props.replacen(section, "", 1));
        }
        self.nodes.insert(node + 1, BodyNode::Paragraph(paragraph));
        self.reindex();
        Ok(())
    }

    fn remove_block(&mut self, position: usize) -> MergeResult<()> {
        let node = self.node_index(position)?;
        self.nodes.remove(node);
        self.reindex();
        debug!("Removed paragraph {position}");
        Ok(())
    }
}

#[derive(Debug)]
struct ParsedBody {
    head: String,
    nodes: Vec<BodyNode>,
    tail: String,
}

/// Text and property capture for the body paragraph being read.
struct ParagraphScan {
    start: usize,
    depth: usize,
    text: String,
    properties_start: Option<usize>,
    properties: Option<String>,
    runs: usize,
    in_text: bool,
    /// Depth of an enclosing text box, whose paragraphs are not ours.
    text_box: Option<usize>,
}

impl ParagraphScan {
    fn new(start: usize, depth: usize) -> Self {
        Self {
            start,
            depth,
            text: String::new(),
            properties_start: None,
            properties: None,
            runs: 0,
            in_text: false,
            text_box: None,
        }
    }

    fn open(&mut self, local: &[u8], depth: usize, start: usize) {
        if self.text_box.is_some() {
            return;
        }
        match local {
            b"txbxContent" => self.text_box = Some(depth),
            b"pPr" if depth == self.depth + 1 => self.properties_start = Some(start),
            b"r" => self.runs += 1,
            b"t" if self.runs > 0 => self.in_text = true,
            _ => {}
        }
    }

    fn close(&mut self, xml: &str, local: &[u8], depth: usize, end: usize) {
        if let Some(box_depth) = self.text_box {
            if depth == box_depth {
                self.text_box = None;
            }
            return;
        }
        match local {
            b"pPr" if depth == self.depth + 1 => {
                if let Some(start) = self.properties_start.take() {
                    self.properties = Some(xml[start..end].to_string());
                }
            }
            b"r" => self.runs = self.runs.saturating_sub(1),
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn empty(&mut self, xml: &str, local: &[u8], depth: usize, start: usize, end: usize) {
        if self.text_box.is_some() {
            return;
        }
        match local {
            b"pPr" if depth == self.depth + 1 => self.properties = Some(xml[start..end].to_string()),
            b"tab" if self.runs > 0 => self.text.push('\t'),
            b"br" | b"cr" if self.runs > 0 => self.text.push('\n'),
            _ => {}
        }
    }

    fn finish(self, xml: &str, end: usize) -> Paragraph {
        Paragraph {
            xml: xml[self.start..end].to_string(),
            text: self.text,
            properties: self.properties,
        }
    }
}

/// Main document part named by the package relationships.
fn document_part(path: &Path, entries: &[PackageEntry]) -> MergeResult<String> {
    let Some(rels) = entries.iter().find(|entry| entry.name == PACKAGE_RELS_PART) else {
        return Ok(DEFAULT_DOCUMENT_PART.to_string());
    };
    let xml = std::str::from_utf8(&rels.data).map_err(|err| xml_error(path, PACKAGE_RELS_PART, err))?;
    let part = package::parse_relationships(path, PACKAGE_RELS_PART, xml)?
        .into_iter()
        .find(|rel| rel.kind.ends_with(OFFICE_DOCUMENT_TYPE))
        .map(|rel| package::resolve_target("", &rel.target))
        .unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string());
    debug!("Main document part is {part}");
    Ok(part)
}

fn parse_body(path: &Path, part: &str, xml: &str) -> MergeResult<ParsedBody> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut body_open: Option<usize> = None;
    let mut body_end: Option<usize> = None;
    let mut cursor = 0usize;
    let mut nodes = Vec::new();
    let mut scan: Option<ParagraphScan> = None;
    let mut other_start: Option<usize> = None;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|err| xml_error(path, part, err))?;
        let end = reader.buffer_position() as usize;
        match event {
            Event::Start(e) => {
                depth += 1;
                let local = e.local_name();
                match body_depth {
                    None if body_end.is_none() && local.as_ref() == b"body" => {
                        body_depth = Some(depth);
                        body_open = Some(end);
                        cursor = end;
                    }
                    Some(bd) if depth == bd + 1 => {
                        push_gap(&mut nodes, xml, cursor, start);
                        if local.as_ref() == b"p" {
                            scan = Some(ParagraphScan::new(start, depth));
                        } else {
                            other_start = Some(start);
                        }
                    }
                    _ => {
                        if let Some(scan) = scan.as_mut() {
                            scan.open(local.as_ref(), depth, start);
                        }
                    }
                }
            }
            Event::End(e) => {
                match body_depth {
                    Some(bd) if depth == bd => {
                        push_gap(&mut nodes, xml, cursor, start);
                        body_end = Some(start);
                        body_depth = None;
                    }
                    Some(bd) if depth == bd + 1 => {
                        if let Some(scan) = scan.take() {
                            nodes.push(BodyNode::Paragraph(scan.finish(xml, end)));
                        } else if let Some(other) = other_start.take() {
                            nodes.push(BodyNode::Raw(xml[other..end].to_string()));
                        }
                        cursor = end;
                    }
                    _ => {
                        if let Some(scan) = scan.as_mut() {
                            scan.close(xml, e.local_name().as_ref(), depth, end);
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Empty(e) => match body_depth {
                Some(bd) if depth == bd => {
                    push_gap(&mut nodes, xml, cursor, start);
                    let raw = xml[start..end].to_string();
                    if e.local_name().as_ref() == b"p" {
                        nodes.push(BodyNode::Paragraph(Paragraph {
                            xml: raw,
                            text: String::new(),
                            properties: None,
                        }));
                    } else {
                        nodes.push(BodyNode::Raw(raw));
                    }
                    cursor = end;
                }
                _ => {
                    if let Some(scan) = scan.as_mut() {
                        scan.empty(xml, e.local_name().as_ref(), depth + 1, start, end);
                    }
                }
            },
            Event::Text(t) => {
                if let Some(scan) = scan.as_mut().filter(|scan| scan.in_text) {
                    let text = t
                        .unescape()
                        .map_err(|err| xml_error(path, part, err))?;
                    scan.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(scan) = scan.as_mut().filter(|scan| scan.in_text) {
                    scan.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let (Some(body_start), Some(body_end)) = (body_open, body_end) else {
        return Err(xml_error(path, part, "no w:body element"));
    };
    Ok(ParsedBody {
        head: xml[..body_start].to_string(),
        nodes,
        tail: xml[body_end..].to_string(),
    })
}

fn push_gap(nodes: &mut Vec<BodyNode>, xml: &str, from: usize, to: usize) {
    if to > from {
        nodes.push(BodyNode::Raw(xml[from..to].to_string()));
    }
}

fn numbering_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<w:numPr\s*/>|<w:numPr\b.*?</w:numPr>").expect("numPr pattern compiles")
    })
}

fn section_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<w:sectPr\b[^>]*/>|<w:sectPr\b.*?</w:sectPr>")
            .expect("sectPr pattern compiles")
    })
}

fn tracked_change_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<w:pPrChange\b[^>]*/>|<w:pPrChange\b.*?</w:pPrChange>")
            .expect("pPrChange pattern compiles")
    })
}

fn child_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<w:(\w+)").expect("child pattern compiles"))
}

/// `w:pPr` carrying `numbering`, based on the paragraph's existing properties.
fn properties_with_numbering(existing: Option<&str>, numbering: &str) -> String {
    let Some(existing) = existing else {
        return format!("<w:pPr>{numbering}</w:pPr>");
    };
    let stripped = numbering_regex().replace_all(existing, "");
    let Some(open_end) = stripped.find('>').map(|idx| idx + 1) else {
        return format!("<w:pPr>{numbering}</w:pPr>");
    };
    if stripped[..open_end].ends_with("/>") {
        return format!("<w:pPr>{numbering}</w:pPr>");
    }
    let inner = &stripped[open_end..];
    let insert_at = child_regex()
        .captures_iter(inner)
        .find(|caps| !BEFORE_NUMBERING.contains(&&caps[1]))
        .and_then(|caps| caps.get(0))
        .map(|found| open_end + found.start())
        .or_else(|| stripped.rfind("</w:pPr>"))
        .unwrap_or(stripped.len());
    let mut properties = stripped.into_owned();
    properties.insert_str(insert_at, numbering);
    properties
}

/// Properties for an item inserted after `anchor`: no tracked change, and the
/// anchor's section break, if any, as the last child.
fn inherited_properties(anchor: &str, section: Option<&str>) -> String {
    let without_section = section_regex().replace_all(anchor, "");
    let mut properties = tracked_change_regex()
        .replace_all(&without_section, "")
        .into_owned();
    if let Some(section) = section {
        match properties.rfind("</w:pPr>") {
            Some(close) => properties.insert_str(close, section),
            None => properties = format!("<w:pPr>{section}</w:pPr>"),
        }
    }
    properties
}

fn list_paragraph(existing: Option<&str>, text: &str, format: ListFormat) -> MergeResult<Paragraph> {
    if let Some(ch) = forbidden_xml_char(text) {
        return Err(MergeError::config(format!(
            "list item '{}' contains U+{:04X}, which a Word document cannot store",
            text.escape_debug(),
            u32::from(ch)
        )));
    }
    let numbering = format!(
        r#"<w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{}"/></w:numPr>"#,
        format.level, format.num_id
    );
    let properties = properties_with_numbering(existing, &numbering);

    let mut run = String::from("<w:r>");
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            run.push_str("<w:br/>");
        }
        if !line.is_empty() {
            run.push_str(r#"<w:t xml:space="preserve">"#);
            run.push_str(&escape(line));
            run.push_str("</w:t>");
        }
    }
    run.push_str("</w:r>");

    Ok(Paragraph {
        xml: format!("<w:p>{properties}{run}</w:p>"),
        text: text.to_string(),
        properties: Some(properties),
    })
}
