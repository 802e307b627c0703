//! Store lifecycle, side-channel events and file-level operations.
//!
//! # Responsibility
//! - Own the single SQLite connection of a notebook store (Closed/Open).
//! - Route every document/page operation through the repository contract.
//! - Provide backup/restore as whole-file copies of the store.
//!
//! # Invariants
//! - Every operation while Closed returns `StorageError::NotOpen`.
//! - Every failed operation logs at error level and queues a
//!   `StorageEvent::DatabaseError`; the handle stays usable afterwards.
//! - Log lines carry ids and counts only, never titles or content.
//!
//! # See also
//! - repo::document_repo for the SQL and transaction boundaries.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::document::{Document, DocumentId};
use crate::model::page::{Page, PageId};
use crate::repo::{DocumentRepository, DocumentSummary, RepoError, RepoResult, SqliteDocumentRepository};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    NotOpen,
    NotFound {
        entity: &'static str,
        key: String,
    },
    Corrupt {
        entity: &'static str,
        key: String,
        reason: String,
    },
    ConstraintViolation(String),
    Io {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    /// A multi-statement write was rolled back; `source` is the cause.
    TransactionFailure {
        step: &'static str,
        source: Box<StorageError>,
    },
    Db(DbError),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "storage is not open"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Corrupt {
                entity,
                key,
                reason,
            } => write!(f, "corrupt {entity} {key}: {reason}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Io {
                operation,
                path,
                source,
            } => write!(f, "{operation} failed for `{}`: {source}", path.display()),
            Self::TransactionFailure { step, source } => {
                write!(f, "transaction failed at {step}: {source}")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::TransactionFailure { source, .. } => Some(source.as_ref()),
            Self::Db(err) => Some(err),
            Self::NotOpen
            | Self::NotFound { .. }
            | Self::Corrupt { .. }
            | Self::ConstraintViolation(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for StorageError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            RepoError::NotFound { entity, key } => Self::NotFound { entity, key },
            RepoError::Corrupt {
                entity,
                key,
                reason,
            } => Self::Corrupt {
                entity,
                key,
                reason,
            },
            RepoError::ConstraintViolation(message) => Self::ConstraintViolation(message),
            RepoError::MissingRequiredTable(table) => Self::Corrupt {
                entity: "schema",
                key: table.to_string(),
                reason: "required table is missing".to_string(),
            },
            RepoError::Transaction { step, source } => Self::TransactionFailure {
                step,
                source: Box::new(Self::from(*source)),
            },
        }
    }
}

/// Side-channel notifications collected with [`Storage::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    DocumentSaved { id: DocumentId },
    DocumentDeleted { id: DocumentId },
    DatabaseError { operation: &'static str, message: String },
}

/// Handle to one notebook store.
#[derive(Default)]
pub struct Storage {
    conn: Option<Connection>,
    path: Option<PathBuf>,
    events: Vec<StorageEvent>,
}

impl Storage {
    /// Creates a closed handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or creates) the store at `path` and applies migrations.
    ///
    /// Returns `Ok` without reopening when the handle is already open.
    pub fn initialize(&mut self, path: impl AsRef<Path>) -> StorageResult<()> {
        if self.is_open() {
            debug!("event=storage_init module=storage status=ok reason=already_open");
            return Ok(());
        }
        let path = path.as_ref().to_path_buf();
        let result = open_db(&path).map_err(StorageError::from);
        let conn = self.observe("initialize", Instant::now(), result)?;
        self.conn = Some(conn);
        self.path = Some(path);
        info!("event=storage_init module=storage status=ok mode=file");
        Ok(())
    }

    /// Opens a private in-memory store.
    pub fn initialize_in_memory(&mut self) -> StorageResult<()> {
        if self.is_open() {
            debug!("event=storage_init module=storage status=ok reason=already_open");
            return Ok(());
        }
        let result = open_db_in_memory().map_err(StorageError::from);
        let conn = self.observe("initialize", Instant::now(), result)?;
        self.conn = Some(conn);
        self.path = None;
        info!("event=storage_init module=storage status=ok mode=memory");
        Ok(())
    }

    /// Closes the connection. Closing a closed handle is a no-op.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!("event=storage_close module=storage status=error error={err}");
                return;
            }
            info!("event=storage_close module=storage status=ok");
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Store file path while open on a file; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        if self.is_open() {
            self.path.as_deref()
        } else {
            None
        }
    }

    pub fn drain_events(&mut self) -> Vec<StorageEvent> {
        std::mem::take(&mut self.events)
    }

    /// Saves the document with all pages and links in one transaction.
    pub fn save_document(&mut self, document: &Document) -> StorageResult<()> {
        let id = document.id();
        self.run("save_document", |repo| repo.save_document(document))?;
        info!(
            "event=document_save module=storage status=ok document_id={id} pages={}",
            document.page_count()
        );
        self.events.push(StorageEvent::DocumentSaved { id });
        Ok(())
    }

    pub fn load_document(&mut self, id: DocumentId) -> StorageResult<Document> {
        self.run("load_document", |repo| repo.load_document(id))
    }

    pub fn load_document_by_title(&mut self, title: &str) -> StorageResult<Document> {
        self.run("load_document_by_title", |repo| {
            repo.load_document_by_title(title)
        })
    }

    /// Deletes the document and its pages in one transaction.
    pub fn delete_document(&mut self, id: DocumentId) -> StorageResult<()> {
        self.run("delete_document", |repo| repo.delete_document(id))?;
        info!("event=document_delete module=storage status=ok document_id={id}");
        self.events.push(StorageEvent::DocumentDeleted { id });
        Ok(())
    }

    /// Document ids, most recently modified first.
    pub fn list_documents(&mut self) -> StorageResult<Vec<DocumentId>> {
        self.run("list_documents", |repo| repo.list_documents())
    }

    pub fn search_documents(&mut self, query: &str) -> StorageResult<Vec<DocumentId>> {
        self.run("search_documents", |repo| repo.search_documents(query))
    }

    pub fn find_documents_by_tag(&mut self, tag: &str) -> StorageResult<Vec<DocumentId>> {
        self.run("find_documents_by_tag", |repo| repo.find_documents_by_tag(tag))
    }

    pub fn recent_documents(&mut self, limit: u32) -> StorageResult<Vec<DocumentSummary>> {
        self.run("recent_documents", |repo| repo.recent_documents(limit))
    }

    pub fn save_page(&mut self, document_id: DocumentId, page: &Page) -> StorageResult<()> {
        self.run("save_page", |repo| repo.save_page(document_id, page))
    }

    pub fn load_page(&mut self, id: PageId) -> StorageResult<Page> {
        self.run("load_page", |repo| repo.load_page(id))
    }

    pub fn delete_page(&mut self, id: PageId) -> StorageResult<()> {
        self.run("delete_page", |repo| repo.delete_page(id))
    }

    pub fn update_document_metadata(
        &mut self,
        id: DocumentId,
        entries: &BTreeMap<String, String>,
    ) -> StorageResult<()> {
        self.run("update_document_metadata", |repo| {
            repo.update_document_metadata(id, entries)
        })
    }

    pub fn document_metadata(&mut self, id: DocumentId) -> StorageResult<BTreeMap<String, String>> {
        self.run("document_metadata", |repo| repo.document_metadata(id))
    }

    pub fn find_page_backlinks(&mut self, page_id: PageId) -> StorageResult<Vec<PageId>> {
        self.run("find_page_backlinks", |repo| repo.find_page_backlinks(page_id))
    }

    pub fn document_count(&mut self) -> StorageResult<u64> {
        self.run("document_count", |repo| repo.document_count())
    }

    pub fn page_count(&mut self) -> StorageResult<u64> {
        self.run("page_count", |repo| repo.page_count())
    }

    /// Store file size in bytes; `0` for in-memory stores.
    pub fn database_size(&mut self) -> StorageResult<u64> {
        let started_at = Instant::now();
        let result = match (&self.conn, &self.path) {
            (None, _) => Err(StorageError::NotOpen),
            (Some(_), None) => Ok(0),
            (Some(_), Some(path)) => std::fs::metadata(path)
                .map(|meta| meta.len())
                .map_err(|source| StorageError::Io {
                    operation: "database_size",
                    path: path.clone(),
                    source,
                }),
        };
        self.observe("database_size", started_at, result)
    }

    /// Copies the store file to `backup_path`, overwriting it.
    pub fn create_backup(&mut self, backup_path: impl AsRef<Path>) -> StorageResult<()> {
        let started_at = Instant::now();
        let backup_path = backup_path.as_ref();
        let result = match (&self.conn, &self.path) {
            (None, _) => Err(StorageError::NotOpen),
            (Some(_), None) => Err(StorageError::Io {
                operation: "create_backup",
                path: backup_path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Unsupported, "in-memory store has no file"),
            }),
            (Some(_), Some(path)) => std::fs::copy(path, backup_path)
                .map(|_| ())
                .map_err(|source| StorageError::Io {
                    operation: "create_backup",
                    path: backup_path.to_path_buf(),
                    source,
                }),
        };
        self.observe("create_backup", started_at, result)?;
        info!("event=storage_backup module=storage status=ok");
        Ok(())
    }

    /// Replaces the store file with `backup_path` and reopens it.
    ///
    /// # Errors
    /// - `Io` when the backup is missing or the copy fails; the original
    ///   store is reopened in that case.
    /// - `Db` when the restored file cannot be opened or migrated.
    pub fn restore_from_backup(&mut self, backup_path: impl AsRef<Path>) -> StorageResult<()> {
        let started_at = Instant::now();
        let backup_path = backup_path.as_ref().to_path_buf();
        let result = self.replace_store_file(&backup_path);
        self.observe("restore_from_backup", started_at, result)?;
        info!("event=storage_restore module=storage status=ok");
        Ok(())
    }

    fn replace_store_file(&mut self, backup_path: &Path) -> StorageResult<()> {
        let io_error = |source| StorageError::Io {
            operation: "restore_from_backup",
            path: backup_path.to_path_buf(),
            source,
        };
        let store_path = match (&self.conn, &self.path) {
            (None, _) => return Err(StorageError::NotOpen),
            (Some(_), None) => {
                return Err(io_error(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "in-memory store has no file",
                )))
            }
            (Some(_), Some(path)) => path.clone(),
        };
        if !backup_path.is_file() {
            return Err(io_error(io::Error::new(
                io::ErrorKind::NotFound,
                "backup file does not exist",
            )));
        }

        self.close();
        if let Err(source) = std::fs::copy(backup_path, &store_path) {
            if let Ok(conn) = open_db(&store_path) {
                self.conn = Some(conn);
            }
            return Err(io_error(source));
        }
        self.conn = Some(open_db(&store_path)?);
        Ok(())
    }

    fn run<T>(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&mut SqliteDocumentRepository<'_>) -> RepoResult<T>,
    ) -> StorageResult<T> {
        let started_at = Instant::now();
        let result = match self.conn.as_mut() {
            None => Err(StorageError::NotOpen),
            Some(conn) => SqliteDocumentRepository::try_new(conn)
                .and_then(|mut repo| call(&mut repo))
                .map_err(StorageError::from),
        };
        self.observe(operation, started_at, result)
    }

    fn observe<T>(
        &mut self,
        operation: &'static str,
        started_at: Instant,
        result: StorageResult<T>,
    ) -> StorageResult<T> {
        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => debug!(
                "event=storage_op module=storage status=ok op={operation} duration_ms={duration_ms}"
            ),
            Err(err) => {
                error!(
                    "event=storage_op module=storage status=error op={operation} duration_ms={duration_ms} error_code={} error={err}",
                    error_code(err)
                );
                self.events.push(StorageEvent::DatabaseError {
                    operation,
                    message: err.to_string(),
                });
            }
        }
        result
    }
}

fn error_code(err: &StorageError) -> &'static str {
    match err {
        StorageError::NotOpen => "not_open",
        StorageError::NotFound { .. } => "not_found",
        StorageError::Corrupt { .. } => "corrupt",
        StorageError::ConstraintViolation(_) => "constraint_violation",
        StorageError::Io { .. } => "io",
        StorageError::TransactionFailure { .. } => "transaction_failure",
        StorageError::Db(_) => "db",
    }
}

#[cfg(test)]
mod tests {
    use super::{Storage, StorageError, StorageEvent};
    use crate::model::document::Document;
    use uuid::Uuid;

    #[test]
    fn closed_handle_rejects_operations_and_queues_error_event() {
        let mut storage = Storage::new();
        assert!(matches!(storage.document_count(), Err(StorageError::NotOpen)));
        assert!(matches!(
            storage.save_document(&Document::new("Draft")),
            Err(StorageError::NotOpen)
        ));

        let events = storage.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            StorageEvent::DatabaseError {
                operation: "document_count",
                ..
            }
        ));
        assert!(storage.drain_events().is_empty());
    }

    #[test]
    fn save_and_delete_emit_events() {
        let mut storage = Storage::new();
        storage.initialize_in_memory().unwrap();
        let document = Document::new("Lab notes");
        storage.save_document(&document).unwrap();
        storage.delete_document(document.id()).unwrap();

        assert_eq!(
            storage.drain_events(),
            vec![
                StorageEvent::DocumentSaved { id: document.id() },
                StorageEvent::DocumentDeleted { id: document.id() },
            ]
        );
    }

    #[test]
    fn missing_document_is_not_found() {
        let mut storage = Storage::new();
        storage.initialize_in_memory().unwrap();
        let err = storage.load_document(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: "document", .. }));
        assert!(matches!(
            storage.delete_document(Uuid::new_v4()),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn initialize_is_idempotent_and_close_returns_to_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        let mut storage = Storage::new();
        storage.initialize(&path).unwrap();
        storage.initialize(&path).unwrap();
        assert_eq!(storage.path(), Some(path.as_path()));
        assert!(storage.database_size().unwrap() > 0);

        storage.close();
        assert!(!storage.is_open());
        assert!(storage.path().is_none());
        assert!(matches!(storage.database_size(), Err(StorageError::NotOpen)));
    }

    #[test]
    fn in_memory_store_has_no_file_operations() {
        let mut storage = Storage::new();
        storage.initialize_in_memory().unwrap();
        assert_eq!(storage.database_size().unwrap(), 0);

        let dir = tempfile::tempdir().unwrap();
        let err = storage
            .create_backup(dir.path().join("backup.sqlite3"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { operation: "create_backup", .. }));
    }

    #[test]
    fn restore_from_missing_backup_keeps_store_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::new();
        storage.initialize(dir.path().join("store.sqlite3")).unwrap();
        storage.save_document(&Document::new("Keep")).unwrap();

        let err = storage
            .restore_from_backup(dir.path().join("missing.sqlite3"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(storage.is_open());
        assert_eq!(storage.document_count().unwrap(), 1);
    }
}
