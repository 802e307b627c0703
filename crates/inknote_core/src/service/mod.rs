//! Core use-case services.
//!
//! # Responsibility
//! - Coordinate the live document with storage for callers above the core.
//! - Keep shell/UI layers decoupled from repository details.

pub mod notebook_service;

pub use notebook_service::{AutosaveOutcome, NotebookError, NotebookResult, NotebookService};
