//! Document/page repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist documents and their pages as JSON blobs plus queryable columns.
//! - Keep the `links` table as an index of each document's link graph.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `save_document` writes the document row, page rows and link index in
//!   one IMMEDIATE transaction; any failure rolls all of it back.
//! - The document blob is authoritative on reload; page rows and links are
//!   derived data.
//! - Read paths reject undecodable rows as `Corrupt` instead of masking them.
//!
//! # See also
//! - storage for lifecycle, events and logging around these calls.

use crate::db::DbError;
use crate::model::document::{Document, DocumentId};
use crate::model::page::{Page, PageId};
use crate::model::schema::{format_timestamp, parse_timestamp, SchemaError};
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for document/page persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
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
    MissingRequiredTable(&'static str),
    /// A step inside a multi-statement write failed and was rolled back.
    Transaction {
        step: &'static str,
        source: Box<RepoError>,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::Corrupt {
                entity,
                key,
                reason,
            } => write!(f, "corrupt {entity} row {key}: {reason}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::Transaction { step, source } => {
                write!(f, "transaction rolled back at {step}: {source}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Transaction { source, .. } => Some(source.as_ref()),
            Self::NotFound { .. }
            | Self::Corrupt { .. }
            | Self::ConstraintViolation(_)
            | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, message)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(
                    message.clone().unwrap_or_else(|| err.to_string()),
                )
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Listing row for recently modified documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    pub description: String,
    pub modified_at: DateTime<Utc>,
}

/// Repository interface for document persistence.
pub trait DocumentRepository {
    /// Upserts the document, its pages and its link index atomically.
    fn save_document(&mut self, document: &Document) -> RepoResult<()>;
    fn load_document(&self, id: DocumentId) -> RepoResult<Document>;
    /// Loads the most recently modified document with exactly this title.
    fn load_document_by_title(&self, title: &str) -> RepoResult<Document>;
    fn delete_document(&mut self, id: DocumentId) -> RepoResult<()>;
    /// Document ids, most recently modified first.
    fn list_documents(&self) -> RepoResult<Vec<DocumentId>>;
    /// Substring match over title, description and tags, ignoring case.
    ///
    /// Case folding is Unicode-aware; an empty query matches nothing.
    fn search_documents(&self, query: &str) -> RepoResult<Vec<DocumentId>>;
    fn find_documents_by_tag(&self, tag: &str) -> RepoResult<Vec<DocumentId>>;
    fn recent_documents(&self, limit: u32) -> RepoResult<Vec<DocumentSummary>>;
    /// Upserts one page row without touching the document blob.
    fn save_page(&mut self, document_id: DocumentId, page: &Page) -> RepoResult<()>;
    fn load_page(&self, id: PageId) -> RepoResult<Page>;
    fn delete_page(&mut self, id: PageId) -> RepoResult<()>;
    /// Upserts key/value pairs attached to a stored document.
    fn update_document_metadata(
        &mut self,
        id: DocumentId,
        entries: &BTreeMap<String, String>,
    ) -> RepoResult<()>;
    fn document_metadata(&self, id: DocumentId) -> RepoResult<BTreeMap<String, String>>;
    /// Stored pages linking to `page_id`, from the link index.
    fn find_page_backlinks(&self, page_id: PageId) -> RepoResult<Vec<PageId>>;
    fn document_count(&self) -> RepoResult<u64>;
    fn page_count(&self) -> RepoResult<u64>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Wraps a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        for table in ["documents", "pages", "metadata", "links"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn save_document(&mut self, document: &Document) -> RepoResult<()> {
        let document_id = document.id().to_string();
        let tx = in_step(
            "begin",
            self.conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(RepoError::from),
        )?;

        in_step("document_row", upsert_document_row(&tx, document))?;
        in_step("stale_pages", delete_stale_pages(&tx, &document_id, document))?;
        for page in document.pages() {
            in_step("page_row", upsert_page_row(&tx, &document_id, page))?;
        }
        in_step("links", rewrite_link_index(&tx, document))?;
        in_step("commit", tx.commit().map_err(RepoError::from))?;
        Ok(())
    }

    fn load_document(&self, id: DocumentId) -> RepoResult<Document> {
        let key = id.to_string();
        let data = self
            .conn
            .query_row(
                "SELECT data FROM documents WHERE id = ?1;",
                [key.as_str()],
                |row| blob_column(row, 0),
            )
            .optional()?;
        match data {
            Some(data) => decode_document(&key, data),
            None => Err(RepoError::NotFound {
                entity: "document",
                key,
            }),
        }
    }

    fn load_document_by_title(&self, title: &str) -> RepoResult<Document> {
        let row = self
            .conn
            .query_row(
                "SELECT id, data
                 FROM documents
                 WHERE title = ?1
                 ORDER BY modified_date DESC, id ASC
                 LIMIT 1;",
                [title],
                |row| Ok((row.get::<_, String>(0)?, blob_column(row, 1)?)),
            )
            .optional()?;
        match row {
            Some((key, data)) => decode_document(&key, data),
            None => Err(RepoError::NotFound {
                entity: "document",
                key: "by_title".to_string(),
            }),
        }
    }

    fn delete_document(&mut self, id: DocumentId) -> RepoResult<()> {
        let key = id.to_string();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        in_step(
            "pages",
            tx.execute("DELETE FROM pages WHERE document_id = ?1;", [key.as_str()])
                .map_err(RepoError::from),
        )?;
        let removed = in_step(
            "document_row",
            tx.execute("DELETE FROM documents WHERE id = ?1;", [key.as_str()])
                .map_err(RepoError::from),
        )?;
        if removed == 0 {
            return Err(RepoError::NotFound {
                entity: "document",
                key,
            });
        }
        in_step("commit", tx.commit().map_err(RepoError::from))?;
        Ok(())
    }

    fn list_documents(&self) -> RepoResult<Vec<DocumentId>> {
        query_ids(
            self.conn,
            "SELECT id FROM documents ORDER BY modified_date DESC, id ASC;",
            [],
        )
    }

    fn search_documents(&self, query: &str) -> RepoResult<Vec<DocumentId>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = like_pattern(&query.to_lowercase());
        query_ids(
            self.conn,
            r"SELECT id
              FROM documents
              WHERE fold_case(title) LIKE ?1 ESCAPE '\'
                 OR fold_case(description) LIKE ?1 ESCAPE '\'
                 OR fold_case(tags) LIKE ?1 ESCAPE '\'
              ORDER BY modified_date DESC, id ASC;",
            [pattern.as_str()],
        )
    }

    fn find_documents_by_tag(&self, tag: &str) -> RepoResult<Vec<DocumentId>> {
        if tag.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = like_pattern(&tag.to_lowercase());
        query_ids(
            self.conn,
            r"SELECT id
              FROM documents
              WHERE fold_case(tags) LIKE ?1 ESCAPE '\'
              ORDER BY modified_date DESC, id ASC;",
            [pattern.as_str()],
        )
    }

    fn recent_documents(&self, limit: u32) -> RepoResult<Vec<DocumentSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, modified_date
             FROM documents
             ORDER BY modified_date DESC, id ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get("id")?;
            let modified_text: String = row.get("modified_date")?;
            let modified_at = parse_timestamp(&modified_text).ok_or_else(|| RepoError::Corrupt {
                entity: "document",
                key: key.clone(),
                reason: "invalid modified_date".to_string(),
            })?;
            summaries.push(DocumentSummary {
                id: parse_uuid("document", &key)?,
                title: row.get("title")?,
                description: row.get("description")?,
                modified_at,
            });
        }
        Ok(summaries)
    }

    fn save_page(&mut self, document_id: DocumentId, page: &Page) -> RepoResult<()> {
        upsert_page_row(self.conn, &document_id.to_string(), page)
    }

    fn load_page(&self, id: PageId) -> RepoResult<Page> {
        let key = id.to_string();
        let data = self
            .conn
            .query_row(
                "SELECT data FROM pages WHERE id = ?1;",
                [key.as_str()],
                |row| blob_column(row, 0),
            )
            .optional()?;
        let Some(data) = data else {
            return Err(RepoError::NotFound { entity: "page", key });
        };
        let value = decode_json("page", &key, data)?;
        Page::from_json(&value).map_err(|err| corrupt("page", &key, &err))
    }

    fn delete_page(&mut self, id: PageId) -> RepoResult<()> {
        let key = id.to_string();
        let removed = self
            .conn
            .execute("DELETE FROM pages WHERE id = ?1;", [key.as_str()])?;
        if removed == 0 {
            return Err(RepoError::NotFound { entity: "page", key });
        }
        Ok(())
    }

    fn update_document_metadata(
        &mut self,
        id: DocumentId,
        entries: &BTreeMap<String, String>,
    ) -> RepoResult<()> {
        let key = id.to_string();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !document_exists(&tx, &key)? {
            return Err(RepoError::NotFound {
                entity: "document",
                key,
            });
        }
        for (name, value) in entries {
            in_step(
                "metadata_row",
                tx.execute(
                    "INSERT INTO metadata (document_id, key, value)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(document_id, key) DO UPDATE SET value = excluded.value;",
                    params![key.as_str(), name, value],
                )
                .map_err(RepoError::from),
            )?;
        }
        in_step("commit", tx.commit().map_err(RepoError::from))?;
        Ok(())
    }

    fn document_metadata(&self, id: DocumentId) -> RepoResult<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM metadata WHERE document_id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut entries = BTreeMap::new();
        while let Some(row) = rows.next()? {
            entries.insert(row.get("key")?, row.get("value")?);
        }
        Ok(entries)
    }

    fn find_page_backlinks(&self, page_id: PageId) -> RepoResult<Vec<PageId>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_page_id
             FROM links
             WHERE to_page_id = ?1
             ORDER BY from_page_id ASC;",
        )?;
        let mut rows = stmt.query([page_id.to_string()])?;
        let mut sources = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            sources.push(parse_uuid("link", &value)?);
        }
        Ok(sources)
    }

    fn document_count(&self) -> RepoResult<u64> {
        count_rows(self.conn, "SELECT COUNT(*) FROM documents;")
    }

    fn page_count(&self) -> RepoResult<u64> {
        count_rows(self.conn, "SELECT COUNT(*) FROM pages;")
    }
}

/// Builds a `LIKE` substring pattern with `\` escaping the query's wildcards.
pub fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn in_step<T>(step: &'static str, result: RepoResult<T>) -> RepoResult<T> {
    result.map_err(|source| RepoError::Transaction {
        step,
        source: Box::new(source),
    })
}

fn upsert_document_row(tx: &Transaction<'_>, document: &Document) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO documents (id, title, description, created_date, modified_date, tags, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            created_date = excluded.created_date,
            modified_date = excluded.modified_date,
            tags = excluded.tags,
            data = excluded.data;",
        params![
            document.id().to_string(),
            document.title(),
            document.description(),
            format_timestamp(&document.created_at()),
            format_timestamp(&document.modified_at()),
            document.tags().join(","),
            encode_json(&document.to_json()),
        ],
    )?;
    Ok(())
}

fn delete_stale_pages(tx: &Transaction<'_>, document_id: &str, document: &Document) -> RepoResult<()> {
    let live: HashSet<String> = document
        .pages()
        .iter()
        .map(|page| page.id().to_string())
        .collect();
    let mut stmt = tx.prepare("SELECT id FROM pages WHERE document_id = ?1;")?;
    let stored: Vec<String> = stmt
        .query_map([document_id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    for page_id in stored.iter().filter(|id| !live.contains(*id)) {
        tx.execute("DELETE FROM pages WHERE id = ?1;", [page_id.as_str()])?;
    }
    Ok(())
}

fn upsert_page_row(conn: &Connection, document_id: &str, page: &Page) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO pages (id, document_id, title, data)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            document_id = excluded.document_id,
            title = excluded.title,
            data = excluded.data;",
        params![
            page.id().to_string(),
            document_id,
            page.title(),
            encode_json(&page.to_json()),
        ],
    )?;
    Ok(())
}

/// Replaces link rows sourced from this document's pages.
///
/// Only pairs whose endpoints are both pages of the document are indexed.
fn rewrite_link_index(tx: &Transaction<'_>, document: &Document) -> RepoResult<()> {
    let page_ids: HashSet<PageId> = document.pages().iter().map(Page::id).collect();
    for page_id in &page_ids {
        tx.execute(
            "DELETE FROM links WHERE from_page_id = ?1;",
            [page_id.to_string()],
        )?;
    }
    for (source, targets) in document.links() {
        if !page_ids.contains(source) {
            continue;
        }
        for target in targets.iter().filter(|target| page_ids.contains(*target)) {
            tx.execute(
                "INSERT OR IGNORE INTO links (from_page_id, to_page_id) VALUES (?1, ?2);",
                params![source.to_string(), target.to_string()],
            )?;
        }
    }
    Ok(())
}

fn encode_json(value: &Value) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Reads a text or blob column as raw bytes; other storage classes map to
/// `None`.
fn blob_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<Vec<u8>>> {
    Ok(match row.get_ref(index)? {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Some(bytes.to_vec()),
        _ => None,
    })
}

fn decode_json(entity: &'static str, key: &str, data: Option<Vec<u8>>) -> RepoResult<Value> {
    let bytes = data.ok_or_else(|| RepoError::Corrupt {
        entity,
        key: key.to_string(),
        reason: "data column is not text or blob".to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| RepoError::Corrupt {
        entity,
        key: key.to_string(),
        reason: err.to_string(),
    })
}

fn decode_document(key: &str, data: Option<Vec<u8>>) -> RepoResult<Document> {
    let value = decode_json("document", key, data)?;
    Document::from_json(&value).map_err(|err| corrupt("document", key, &err))
}

fn corrupt(entity: &'static str, key: &str, err: &SchemaError) -> RepoError {
    RepoError::Corrupt {
        entity,
        key: key.to_string(),
        reason: err.to_string(),
    }
}

fn parse_uuid(entity: &'static str, value: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| RepoError::Corrupt {
        entity,
        key: value.to_string(),
        reason: "invalid uuid".to_string(),
    })
}

fn query_ids<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> RepoResult<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid("document", &value)?);
    }
    Ok(ids)
}

fn count_rows(conn: &Connection, sql: &str) -> RepoResult<u64> {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn document_exists(conn: &Connection, key: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1);",
        [key],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{like_pattern, DocumentRepository, RepoError, SqliteDocumentRepository};
    use crate::db::open_db_in_memory;
    use crate::model::document::Document;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn wildcard_queries_match_literally() {
        let mut conn = open_db_in_memory().unwrap();
        let mut repo = SqliteDocumentRepository::try_new(&mut conn).unwrap();
        let literal = Document::new("100% done");
        let other = Document::new("1000 done");
        repo.save_document(&literal).unwrap();
        repo.save_document(&other).unwrap();

        assert_eq!(repo.search_documents("0%").unwrap(), vec![literal.id()]);
        assert!(repo.search_documents("").unwrap().is_empty());
    }

    #[test]
    fn missing_rows_are_not_found() {
        let mut conn = open_db_in_memory().unwrap();
        let mut repo = SqliteDocumentRepository::try_new(&mut conn).unwrap();
        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            repo.load_document(id),
            Err(RepoError::NotFound { entity: "document", .. })
        ));
        assert!(matches!(
            repo.delete_document(id),
            Err(RepoError::NotFound { .. })
        ));
    }

    #[test]
    fn undecodable_blob_is_corrupt() {
        let mut conn = open_db_in_memory().unwrap();
        let id = uuid::Uuid::new_v4();
        conn.execute(
            "INSERT INTO documents (id, title, created_date, modified_date, data)
             VALUES (?1, 'broken', '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z', X'7B7B');",
            [id.to_string()],
        )
        .unwrap();
        let repo = SqliteDocumentRepository::try_new(&mut conn).unwrap();
        assert!(matches!(
            repo.load_document(id),
            Err(RepoError::Corrupt { entity: "document", .. })
        ));
    }
}
