//! Core document model for InkNote.
//!
//! # Responsibility
//! - Define documents, pages and page objects plus their JSON contracts.
//! - Keep model logic independent from storage and UI concerns.
//!
//! # Invariants
//! - Ownership is strictly hierarchical: documents own pages, pages own
//!   objects; cross references use ids.
//! - Every entity id is a UUID v4 that is never reused.
//!
//! # See also
//! - storage for the persistence boundary.

pub mod document;
pub mod drawing;
pub mod event;
pub mod geometry;
pub mod object;
pub mod page;
pub mod path;
pub mod schema;
pub mod text;
