//! Block-structured documents and block classification.
//!
//! A template is a flat sequence of text blocks. Headers announce a section by
//! putting an en dash at a fixed character offset; the insertion marker is a
//! literal placeholder paragraph. Everything else is plain content.

use crate::{
    error::{MergeError, MergeResult},
    sections::SectionId,
};

/// Zero-based character offset of the header separator.
pub const HEADER_SEPARATOR_OFFSET: usize = 14;
pub const HEADER_SEPARATOR: char = '\u{2013}';
pub const INSERTION_MARKER: &str = "Confirm/Submit/Describe";

/// Numbering applied to generated question blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFormat {
    pub num_id: u32,
    pub level: u32,
}

impl Default for ListFormat {
    fn default() -> Self {
        Self {
            num_id: 1,
            level: 0,
        }
    }
}

/// Positional access to an ordered sequence of text blocks.
pub trait BlockDocument {
    fn block_count(&self) -> usize;

    fn block_text(&self, position: usize) -> Option<&str>;

    /// Clear the block at `position` and refill it as a list item.
    fn write_list_item(
        &mut self,
        position: usize,
        text: &str,
        format: ListFormat,
    ) -> MergeResult<()>;

    /// Insert a new list item directly after `position`.
    fn insert_list_item_after(
        &mut self,
        position: usize,
        text: &str,
        format: ListFormat,
    ) -> MergeResult<()>;

    fn remove_block(&mut self, position: usize) -> MergeResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRole {
    SectionHeader(SectionId),
    InsertionMarker,
    Plain,
}

pub fn classify(text: &str) -> MergeResult<BlockRole> {
    if is_section_header(text) {
        return SectionId::extract(text, "template header").map(BlockRole::SectionHeader);
    }
    if is_insertion_marker(text) {
        return Ok(BlockRole::InsertionMarker);
    }
    Ok(BlockRole::Plain)
}

fn is_section_header(text: &str) -> bool {
    text.chars().nth(HEADER_SEPARATOR_OFFSET) == Some(HEADER_SEPARATOR)
}

fn is_insertion_marker(text: &str) -> bool {
    let stem = text
        .trim_end()
        .trim_end_matches(|c| c == '\u{2026}' || c == '.')
        .trim_end();
    stem == INSERTION_MARKER
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub text: String,
    pub list: Option<ListFormat>,
}

/// Vector-backed [`BlockDocument`], used for dry runs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDocument {
    blocks: Vec<MemoryBlock>,
}

impl MemoryDocument {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let blocks = texts
            .into_iter()
            .map(|text| MemoryBlock {
                text: text.into(),
                list: None,
            })
            .collect();
        Self { blocks }
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn texts(&self) -> Vec<&str> {
        self.blocks.iter().map(|block| block.text.as_str()).collect()
    }

    fn check(&self, position: usize) -> MergeResult<()> {
        if position < self.blocks.len() {
            Ok(())
        } else {
            Err(MergeError::InternalConsistency(format!(
                "block {position} does not exist ({} block(s))",
                self.blocks.len()
            )))
        }
    }
}

impl BlockDocument for MemoryDocument {
    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn block_text(&self, position: usize) -> Option<&str> {
        self.blocks.get(position).map(|block| block.text.as_str())
    }

    fn write_list_item(
        &mut self,
        position: usize,
        text: &str,
        format: ListFormat,
    ) -> MergeResult<()> {
        self.check(position)?;
        self.blocks[position] = MemoryBlock {
            text: text.to_string(),
            list: Some(format),
        };
        Ok(())
    }

    fn insert_list_item_after(
        &mut self,
        position: usize,
        text: &str,
        format: ListFormat,
    ) -> MergeResult<()> {
        self.check(position)?;
        self.blocks.insert(
            position + 1,
            MemoryBlock {
                text: text.to_string(),
                list: Some(format),
            },
        );
        Ok(())
    }

    fn remove_block(&mut self, position: usize) -> MergeResult<()> {
        self.check(position)?;
        self.blocks.remove(position);
        Ok(())
    }
}
