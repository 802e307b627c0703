//! Core document model and persistence engine for InkNote.
//! This crate is the single source of truth for notebook invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use config::{AutosaveConfig, ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{Document, DocumentId};
pub use model::drawing::{Drawing, DrawingMode, Pen};
pub use model::event::ChangeEvent;
pub use model::geometry::{Color, Point, Rect, Size};
pub use model::object::{ObjectId, ObjectKind, ObjectType, PageObject};
pub use model::page::{Page, PageId};
pub use model::schema::{SchemaError, SchemaResult};
pub use model::text::TextContent;
pub use repo::{DocumentRepository, DocumentSummary, RepoError, RepoResult};
pub use service::{AutosaveOutcome, NotebookError, NotebookResult, NotebookService};
pub use storage::{Storage, StorageError, StorageEvent, StorageResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
