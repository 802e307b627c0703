//! Current-document coordinator.
//!
//! # Responsibility
//! - Hold the single live document and pass it explicitly into storage.
//! - Own save/close/delete ordering and the autosave tick.
//!
//! # Invariants
//! - The modified flag is cleared only after a successful save.
//! - Replacing the current document first saves it when modified; a failed
//!   save aborts the replacement and keeps the document.
//! - Pending edits are saved before the store is read, so loading or
//!   duplicating the current document sees its latest state.
//! - Deleting the current document discards it without saving.
//! - Delete and restore drop the current document only once the store
//!   operation succeeded.

use crate::config::{AutosaveConfig, CoreConfig};
use crate::model::document::{Document, DocumentId};
use crate::repo::DocumentSummary;
use crate::storage::{Storage, StorageError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type NotebookResult<T> = Result<T, NotebookError>;

#[derive(Debug)]
pub enum NotebookError {
    Storage(StorageError),
    NoCurrentDocument,
}

impl Display for NotebookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::NoCurrentDocument => write!(f, "no document is open"),
        }
    }
}

impl Error for NotebookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::NoCurrentDocument => None,
        }
    }
}

impl From<StorageError> for NotebookError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Result of one autosave tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Saved,
    SkippedUnmodified,
    SkippedNoDocument,
    SkippedDisabled,
}

pub struct NotebookService {
    storage: Storage,
    current: Option<Document>,
    autosave: AutosaveConfig,
}

impl NotebookService {
    /// Wraps an already initialized storage handle.
    pub fn new(storage: Storage, autosave: AutosaveConfig) -> Self {
        Self {
            storage,
            current: None,
            autosave,
        }
    }

    /// Opens the store named by `config`.
    pub fn open(config: &CoreConfig) -> NotebookResult<Self> {
        let mut storage = Storage::new();
        storage.initialize(&config.db_path)?;
        Ok(Self::new(storage, config.autosave))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    pub fn autosave_config(&self) -> AutosaveConfig {
        self.autosave
    }

    pub fn set_autosave_config(&mut self, autosave: AutosaveConfig) {
        self.autosave = autosave;
    }

    pub fn current_document(&self) -> Option<&Document> {
        self.current.as_ref()
    }

    pub fn current_document_mut(&mut self) -> Option<&mut Document> {
        self.current.as_mut()
    }

    pub fn is_modified(&self) -> bool {
        self.current.as_ref().is_some_and(Document::is_modified)
    }

    /// Makes a fresh unsaved document current.
    pub fn create_new_document(&mut self, title: &str) -> NotebookResult<DocumentId> {
        self.close_current_document()?;
        let document = Document::new(title);
        let id = document.id();
        self.current = Some(document);
        info!("event=document_create module=service status=ok document_id={id}");
        Ok(id)
    }

    /// Loads a stored document and makes it current.
    pub fn load_document(&mut self, id: DocumentId) -> NotebookResult<()> {
        self.save_if_modified()?;
        let document = self.storage.load_document(id)?;
        self.close_current_document()?;
        self.current = Some(document);
        info!("event=document_load module=service status=ok document_id={id}");
        Ok(())
    }

    /// Saves the current document and clears its modified flag.
    ///
    /// # Errors
    /// - `NoCurrentDocument` when nothing is open.
    /// - `Storage` when the save fails; the document stays modified.
    pub fn save_current_document(&mut self) -> NotebookResult<()> {
        let document = self.current.as_mut().ok_or(NotebookError::NoCurrentDocument)?;
        self.storage.save_document(document)?;
        document.set_modified(false);
        Ok(())
    }

    /// Renames the current document, then saves it.
    pub fn save_document_as(&mut self, title: &str) -> NotebookResult<()> {
        let document = self.current.as_mut().ok_or(NotebookError::NoCurrentDocument)?;
        document.set_title(title);
        self.save_current_document()
    }

    fn save_if_modified(&mut self) -> NotebookResult<()> {
        if self.is_modified() {
            self.save_current_document()?;
        }
        Ok(())
    }

    /// Saves the current document when modified, then drops it.
    ///
    /// Closing with nothing open is a no-op.
    pub fn close_current_document(&mut self) -> NotebookResult<()> {
        self.save_if_modified()?;
        if let Some(document) = self.current.take() {
            debug!(
                "event=document_close module=service status=ok document_id={}",
                document.id()
            );
        }
        Ok(())
    }

    /// Deletes a stored document; when it is current, it is discarded unsaved.
    ///
    /// A failed delete keeps the current document untouched.
    pub fn delete_document(&mut self, id: DocumentId) -> NotebookResult<()> {
        self.storage.delete_document(id)?;
        if self.current.as_ref().is_some_and(|document| document.id() == id) {
            self.current = None;
            debug!("event=document_close module=service status=ok reason=delete document_id={id}");
        }
        Ok(())
    }

    /// Copies a stored document under fresh ids, makes it current and saves it.
    pub fn duplicate_document(&mut self, id: DocumentId) -> NotebookResult<DocumentId> {
        self.save_if_modified()?;
        let copy = self.storage.load_document(id)?.duplicate();
        let copy_id = copy.id();
        self.close_current_document()?;
        self.current = Some(copy);
        self.save_current_document()?;
        info!(
            "event=document_duplicate module=service status=ok source_id={id} document_id={copy_id}"
        );
        Ok(copy_id)
    }

    pub fn list_documents(&mut self) -> NotebookResult<Vec<DocumentId>> {
        Ok(self.storage.list_documents()?)
    }

    pub fn search_documents(&mut self, query: &str) -> NotebookResult<Vec<DocumentId>> {
        Ok(self.storage.search_documents(query)?)
    }

    pub fn find_documents_by_tag(&mut self, tag: &str) -> NotebookResult<Vec<DocumentId>> {
        Ok(self.storage.find_documents_by_tag(tag)?)
    }

    pub fn recent_documents(&mut self, limit: u32) -> NotebookResult<Vec<DocumentSummary>> {
        Ok(self.storage.recent_documents(limit)?)
    }

    pub fn create_backup(&mut self, backup_path: impl AsRef<Path>) -> NotebookResult<()> {
        Ok(self.storage.create_backup(backup_path)?)
    }

    /// Restores the store from a backup; on success the current document is
    /// discarded unsaved.
    pub fn restore_from_backup(&mut self, backup_path: impl AsRef<Path>) -> NotebookResult<()> {
        self.storage.restore_from_backup(backup_path)?;
        if let Some(document) = self.current.take() {
            debug!(
                "event=document_close module=service status=ok reason=restore document_id={}",
                document.id()
            );
        }
        Ok(())
    }

    /// Autosave tick: saves only an open, modified document.
    ///
    /// The caller's timer decides when to tick; ticks never overlap because
    /// saves borrow the service mutably.
    pub fn trigger_autosave(&mut self) -> NotebookResult<AutosaveOutcome> {
        if !self.autosave.enabled {
            return Ok(AutosaveOutcome::SkippedDisabled);
        }
        let Some(document) = self.current.as_ref() else {
            return Ok(AutosaveOutcome::SkippedNoDocument);
        };
        if !document.is_modified() {
            return Ok(AutosaveOutcome::SkippedUnmodified);
        }
        if let Err(err) = self.save_current_document() {
            warn!("event=autosave module=service status=error error={err}");
            return Err(err);
        }
        debug!("event=autosave module=service status=ok");
        Ok(AutosaveOutcome::Saved)
    }
}
