//! Repository layer: persistence contracts and their SQLite implementation.
//!
//! # Responsibility
//! - Define document/page data access contracts.
//! - Isolate SQL from the storage lifecycle and the notebook service.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Corrupt`) in
//!   addition to transport errors.

pub mod document_repo;

pub use document_repo::{
    like_pattern, DocumentRepository, DocumentSummary, RepoError, RepoResult,
    SqliteDocumentRepository,
};
