use inknote_core::model::drawing::{DrawingMode, Stroke};
use inknote_core::model::path::{PathPoint, StrokePath};
use inknote_core::{Document, PageObject, Storage, StorageError, StorageEvent};
use std::collections::BTreeMap;
use std::path::Path;

fn two_page_document() -> Document {
    let mut document = Document::new("Field notes");
    document.set_description("Survey of the north ridge");
    document.set_tags(["ink", "survey"]);
    let first = document.pages()[0].id();
    let second = document.create_new_page("Sketches");

    document.with_page_mut(first, |page| {
        page.add_object(PageObject::text("Hello world"));
    });
    document.with_page_mut(second, |page| {
        let mut drawing = PageObject::drawing();
        let path = StrokePath::from_points(vec![PathPoint::new(1.0, 2.0), PathPoint::new(3.0, 4.0)]);
        drawing
            .as_drawing_mut()
            .unwrap()
            .add_stroke(Stroke::new(path, DrawingMode::Pen.default_pen(), DrawingMode::Pen));
        page.add_object(drawing);
    });
    document.add_link(first, second);
    document
}

fn open(path: &Path) -> Storage {
    let mut storage = Storage::new();
    storage.initialize(path).unwrap();
    storage
}

#[test]
fn document_survives_a_fresh_storage_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.sqlite3");
    let document = two_page_document();

    let mut writer = open(&path);
    writer.save_document(&document).unwrap();
    writer.close();

    let mut reader = open(&path);
    let loaded = reader.load_document(document.id()).unwrap();
    assert_eq!(loaded.title(), "Field notes");
    assert_eq!(loaded.tags(), document.tags());
    assert_eq!(loaded.page_count(), 2);
    assert_eq!(loaded, document);
    assert!(!loaded.is_modified());

    assert_eq!(reader.document_count().unwrap(), 1);
    assert_eq!(reader.page_count().unwrap(), 2);
}

#[test]
fn resaving_removes_stale_pages_and_rewrites_links() {
    let mut storage = Storage::new();
    storage.initialize_in_memory().unwrap();
    let mut document = two_page_document();
    let first = document.pages()[0].id();
    let second = document.pages()[1].id();
    storage.save_document(&document).unwrap();
    assert_eq!(storage.find_page_backlinks(second).unwrap(), vec![first]);

    document.remove_page(second);
    storage.save_document(&document).unwrap();

    assert_eq!(storage.page_count().unwrap(), 1);
    assert!(storage.find_page_backlinks(second).unwrap().is_empty());
    assert!(matches!(
        storage.load_page(second),
        Err(StorageError::NotFound { entity: "page", .. })
    ));
    assert_eq!(storage.load_document(document.id()).unwrap().page_count(), 1);
}

#[test]
fn queries_cover_title_description_and_tags() {
    let mut storage = Storage::new();
    storage.initialize_in_memory().unwrap();
    let field = two_page_document();
    let mut other = Document::new("Groceries 100%");
    other.add_tag("home");
    storage.save_document(&field).unwrap();
    storage.save_document(&other).unwrap();

    assert_eq!(storage.search_documents("NORTH").unwrap(), vec![field.id()]);
    assert_eq!(storage.search_documents("survey").unwrap(), vec![field.id()]);
    assert_eq!(storage.search_documents("100%").unwrap(), vec![other.id()]);
    assert!(storage.search_documents("").unwrap().is_empty());
    assert_eq!(storage.find_documents_by_tag("home").unwrap(), vec![other.id()]);

    let by_title = storage.load_document_by_title("Groceries 100%").unwrap();
    assert_eq!(by_title.id(), other.id());
    assert!(matches!(
        storage.load_document_by_title("missing"),
        Err(StorageError::NotFound { .. })
    ));

    let mut listed = storage.list_documents().unwrap();
    listed.sort();
    let mut expected = vec![field.id(), other.id()];
    expected.sort();
    assert_eq!(listed, expected);

    let recent = storage.recent_documents(1).unwrap();
    assert_eq!(recent.len(), 1);
    let summaries = storage.recent_documents(10).unwrap();
    let field_summary = summaries.iter().find(|s| s.id == field.id()).unwrap();
    assert_eq!(field_summary.description, "Survey of the north ridge");
    assert_eq!(field_summary.modified_at, field.modified_at());
}

#[test]
fn single_page_and_metadata_operations() {
    let mut storage = Storage::new();
    storage.initialize_in_memory().unwrap();
    let mut document = two_page_document();
    storage.save_document(&document).unwrap();

    let page_id = document.pages()[0].id();
    document.with_page_mut(page_id, |page| page.set_title("Renamed"));
    storage
        .save_page(document.id(), document.page_by_id(page_id).unwrap())
        .unwrap();
    assert_eq!(storage.load_page(page_id).unwrap().title(), "Renamed");

    storage.delete_page(page_id).unwrap();
    assert!(matches!(storage.delete_page(page_id), Err(StorageError::NotFound { .. })));

    let entries = BTreeMap::from([
        ("author".to_string(), "ada".to_string()),
        ("version".to_string(), "1".to_string()),
    ]);
    storage.update_document_metadata(document.id(), &entries).unwrap();
    storage
        .update_document_metadata(
            document.id(),
            &BTreeMap::from([("version".to_string(), "2".to_string())]),
        )
        .unwrap();
    let stored = storage.document_metadata(document.id()).unwrap();
    assert_eq!(stored.get("author").map(String::as_str), Some("ada"));
    assert_eq!(stored.get("version").map(String::as_str), Some("2"));

    let orphan = Document::new("Never saved");
    assert!(matches!(
        storage.update_document_metadata(orphan.id(), &entries),
        Err(StorageError::NotFound { entity: "document", .. })
    ));
    assert!(matches!(
        storage.save_page(orphan.id(), &orphan.pages()[0]),
        Err(StorageError::ConstraintViolation(_))
    ));

    let events = storage.drain_events();
    assert!(events.contains(&StorageEvent::DocumentSaved { id: document.id() }));
    assert!(events
        .iter()
        .any(|event| matches!(event, StorageEvent::DatabaseError { operation: "save_page", .. })));
}

#[test]
fn delete_document_removes_pages_and_metadata() {
    let mut storage = Storage::new();
    storage.initialize_in_memory().unwrap();
    let document = two_page_document();
    storage.save_document(&document).unwrap();
    storage
        .update_document_metadata(
            document.id(),
            &BTreeMap::from([("k".to_string(), "v".to_string())]),
        )
        .unwrap();

    storage.delete_document(document.id()).unwrap();

    assert_eq!(storage.document_count().unwrap(), 0);
    assert_eq!(storage.page_count().unwrap(), 0);
    assert!(storage.document_metadata(document.id()).unwrap().is_empty());
}

#[test]
fn search_folds_case_beyond_ascii() {
    let mut storage = Storage::new();
    storage.initialize_in_memory().unwrap();
    let mut notes = Document::new("Über Notizen");
    notes.add_tag("Straße");
    storage.save_document(&notes).unwrap();
    storage.save_document(&Document::new("Unrelated")).unwrap();

    assert_eq!(storage.search_documents("über").unwrap(), vec![notes.id()]);
    assert_eq!(storage.search_documents("ÜBER").unwrap(), vec![notes.id()]);
    assert_eq!(storage.search_documents("NOTIZEN").unwrap(), vec![notes.id()]);
    assert_eq!(storage.find_documents_by_tag("STRASSE").unwrap(), Vec::<inknote_core::DocumentId>::new());
    assert_eq!(storage.find_documents_by_tag("STRAßE").unwrap(), vec![notes.id()]);
}
