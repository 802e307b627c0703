//! Change notifications emitted by pages and documents.
//!
//! Mutations push events into the owner's outbox; callers collect them with
//! `drain_events()`. Events carry ids and structural data only.

use crate::model::document::DocumentId;
use crate::model::geometry::{Color, Size};
use crate::model::object::ObjectId;
use crate::model::page::PageId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    DocumentTitleChanged { document_id: DocumentId },
    DocumentDescriptionChanged { document_id: DocumentId },
    TagsChanged { document_id: DocumentId },
    /// Whole document replaced by `set_state`.
    DocumentReloaded { document_id: DocumentId },
    ModifiedChanged { modified: bool },
    PageAdded { page_id: PageId, index: usize },
    PageRemoved { page_id: PageId, index: usize },
    PageMoved { page_id: PageId, from: usize, to: usize },
    CurrentPageChanged { page_id: Option<PageId> },
    LinkAdded { from: PageId, to: PageId },
    LinkRemoved { from: PageId, to: PageId },
    PageTitleChanged { page_id: PageId },
    PageSizeChanged { page_id: PageId, size: Size },
    PageBackgroundChanged { page_id: PageId, color: Color },
    /// Page replaced by `set_state`.
    PageReloaded { page_id: PageId },
    ObjectAdded { page_id: PageId, object_id: ObjectId },
    ObjectRemoved { page_id: PageId, object_id: ObjectId },
    ObjectChanged { page_id: PageId, object_id: ObjectId },
    ObjectLayerChanged { page_id: PageId, object_id: ObjectId, layer: u32 },
    SelectionChanged { page_id: PageId },
}

impl ChangeEvent {
    /// Returns whether the event reflects persisted content.
    ///
    /// Selection, cursor and modified-flag events do not.
    pub fn is_content_change(&self) -> bool {
        !matches!(
            self,
            Self::ModifiedChanged { .. }
                | Self::CurrentPageChanged { .. }
                | Self::SelectionChanged { .. }
        )
    }
}
