use inknote_core::{Document, Storage, StorageError, StorageEvent};
use rusqlite::Connection;
use std::path::Path;

/// Makes the `fail_at`-th page insert abort its statement.
fn install_page_fault(path: &Path, fail_at: i64) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE page_writes (n INTEGER NOT NULL);
         INSERT INTO page_writes (n) VALUES (0);
         CREATE TRIGGER fail_page_write BEFORE INSERT ON pages
         BEGIN
             UPDATE page_writes SET n = n + 1;
             SELECT RAISE(ABORT, 'injected page failure')
             WHERE (SELECT n FROM page_writes) >= {fail_at};
         END;"
    ))
    .unwrap();
}

fn three_page_document(title: &str) -> Document {
    let mut document = Document::new(title);
    document.create_new_page("Second");
    document.create_new_page("Third");
    document
}

#[test]
fn failure_on_nth_page_rolls_back_the_whole_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atomic.sqlite3");
    let mut storage = Storage::new();
    storage.initialize(&path).unwrap();

    let mut document = three_page_document("Before");
    storage.save_document(&document).unwrap();
    storage.drain_events();

    install_page_fault(&path, 2);
    document.set_title("After");
    document.create_new_page("Fourth");

    let err = storage.save_document(&document).unwrap_err();
    match err {
        StorageError::TransactionFailure { step, source } => {
            assert_eq!(step, "page_row");
            assert!(matches!(*source, StorageError::ConstraintViolation(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(document.is_modified());

    let stored = storage.load_document(document.id()).unwrap();
    assert_eq!(stored.title(), "Before");
    assert_eq!(stored.page_count(), 3);
    assert_eq!(storage.page_count().unwrap(), 3);

    let events = storage.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        StorageEvent::DatabaseError {
            operation: "save_document",
            ..
        }
    ));
}

#[test]
fn store_stays_usable_after_a_rolled_back_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usable.sqlite3");
    let mut storage = Storage::new();
    storage.initialize(&path).unwrap();

    install_page_fault(&path, 1);
    let blocked = three_page_document("Blocked");
    assert!(storage.save_document(&blocked).is_err());
    assert_eq!(storage.document_count().unwrap(), 0);

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("DROP TRIGGER fail_page_write;").unwrap();
    drop(conn);

    storage.save_document(&blocked).unwrap();
    assert_eq!(storage.document_count().unwrap(), 1);
    assert_eq!(storage.page_count().unwrap(), 3);
}
