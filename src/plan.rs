//! Edit-plan construction: one forward pass, two state machines.
//!
//! The modify machine tracks which mapped section (if any) is active so that
//! insertion markers under it become [`ModifyEntry`] values. The delete machine
//! opens a span at every unmapped header and closes it at the next header.
//! Positions refer to the document as it was when the plan was built.

use log::{debug, warn};

use crate::{
    blocks::{BlockDocument, BlockRole, classify},
    error::{MergeError, MergeResult},
    sections::{QuestionMap, SectionId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyEntry {
    pub section: SectionId,
    pub position: usize,
}

/// Inclusive range of block positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSpan {
    pub start: usize,
    pub end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl DeleteSpan {
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn contains(&self, position: usize) -> bool {
        (self.start..=self.end).contains(&position)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    /// Discovery order.
    pub modify: Vec<ModifyEntry>,
    /// Discovery order.
    pub delete: Vec<DeleteSpan>,
    /// Start of an unmapped section that no later header closed. Left in place.
    pub retained_tail: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ModifyState {
    NoActiveSection,
    ActiveSection(SectionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteState {
    NotDeleting,
    Deleting { start: usize },
}

impl EditPlan {
    pub fn build<D>(document: &D, map: &QuestionMap) -> MergeResult<Self>
    where
        D: BlockDocument + ?Sized,
    {
        let mut plan = EditPlan::default();
        let mut modify_state = ModifyState::NoActiveSection;
        let mut delete_state = DeleteState::NotDeleting;

        for position in 0..document.block_count() {
            let text = document.block_text(position).ok_or_else(|| {
                MergeError::InternalConsistency(format!("block {position} vanished while planning"))
            })?;
            match classify(text)? {
                BlockRole::SectionHeader(id) => {
                    if let DeleteState::Deleting { start } = delete_state {
                        plan.delete.push(DeleteSpan {
                            start,
                            end: position - 1,
                        });
                    }
                    let mapped = map.contains(id.as_str());
                    delete_state = if mapped {
                        DeleteState::NotDeleting
                    } else {
                        DeleteState::Deleting { start: position }
                    };
                    modify_state = if mapped {
                        ModifyState::ActiveSection(id)
                    } else {
                        ModifyState::NoActiveSection
                    };
                }
                BlockRole::InsertionMarker => {
                    if let ModifyState::ActiveSection(id) = &modify_state {
                        plan.modify.push(ModifyEntry {
                            section: id.clone(),
                            position,
                        });
                    }
                }
                BlockRole::Plain => {}
            }
        }

        if let DeleteState::Deleting { start } = delete_state {
            warn!(
                "Unmapped section starting at block {start} is the last section; it is left in place"
            );
            plan.retained_tail = Some(start);
        }
        for entry in &plan.modify {
            debug!("Modify: section {} at block {}", entry.section, entry.position);
        }
        for span in &plan.delete {
            debug!("Delete: blocks {}..={}", span.start, span.end);
        }
        Ok(plan)
    }

    pub fn deleted_block_count(&self) -> usize {
        self.delete.iter().map(DeleteSpan::len).sum()
    }

    /// Block count once the plan is applied against `map`.
    pub fn expected_block_count(&self, original: usize, map: &QuestionMap) -> usize {
        let added: usize = self
            .modify
            .iter()
            .filter_map(|entry| map.get(entry.section.as_str()))
            .map(|questions| questions.len().saturating_sub(1))
            .sum();
        original - self.deleted_block_count() + added
    }

    pub fn is_noop(&self) -> bool {
        self.modify.is_empty() && self.delete.is_empty()
    }
}
