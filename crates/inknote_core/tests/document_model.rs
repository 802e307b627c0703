use inknote_core::{ChangeEvent, Document, ObjectType, Page, PageObject, Point, Rect};
use serde_json::json;

/// Document "D" with page "P1" holding a text and a drawing.
fn scenario() -> (Document, PageObject, PageObject) {
    let mut document = Document::new("D");
    let page_id = document.current_page_id().unwrap();

    let mut text = PageObject::text("Hello world");
    text.bounds = Rect::new(0, 0, 200, 50);
    let mut drawing = PageObject::drawing();
    drawing.bounds = Rect::new(300, 300, 100, 100);
    drawing.layer = 1;

    document.with_page_mut(page_id, |page| {
        page.set_title("P1");
        page.add_object(text.clone());
        page.add_object(drawing.clone());
    });
    (document, text, drawing)
}

#[test]
fn new_document_has_one_current_page_and_is_modified() {
    let mut document = Document::new("Fresh");
    assert_eq!(document.page_count(), 1);
    assert_eq!(document.pages()[0].title(), "Page 1");
    assert_eq!(document.current_page_id(), Some(document.pages()[0].id()));
    assert!(document.is_modified());
    assert!(document.drain_events().is_empty());
}

#[test]
fn scenario_searches_and_hit_tests() {
    let (document, text, drawing) = scenario();

    let hits = document.search_objects("hello");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id(), text.id());

    let page = document.current_page().unwrap();
    assert_eq!(
        page.object_at(Point::new(350, 350)).map(PageObject::id),
        Some(drawing.id())
    );
    assert_eq!(page.find_objects_by_type(ObjectType::Text).len(), 1);
    let layers: Vec<u32> = page.objects().iter().map(|object| object.layer).collect();
    assert_eq!(layers, vec![0, 1]);

    let tagged = document.find_pages_by_tag("P1");
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id(), page.id());
}

#[test]
fn page_search_uses_regex_for_titles_and_substring_for_content() {
    let mut document = Document::new("Search");
    let first = document.pages()[0].id();
    document.with_page_mut(first, |page| page.set_title("Week 12 review"));
    let second = document.create_new_page("Plain");
    document.with_page_mut(second, |page| {
        page.add_object(PageObject::text("costs went up by 12 dollars"));
    });

    let by_regex: Vec<_> = document.search_pages(r"week \d+").iter().map(|p| p.id()).collect();
    assert_eq!(by_regex, vec![first]);

    // Content is matched literally, so a pattern never hits body text.
    let literal: Vec<_> = document.search_pages(r"\d+ dollars").iter().map(|p| p.id()).collect();
    assert!(literal.is_empty());

    let both: Vec<_> = document.search_pages("12").iter().map(|p| p.id()).collect();
    assert_eq!(both, vec![first, second]);

    // An invalid pattern still searches content.
    document.with_page_mut(second, |page| {
        page.add_object(PageObject::text("array[ index"));
    });
    let invalid: Vec<_> = document.search_pages("[").iter().map(|p| p.id()).collect();
    assert_eq!(invalid, vec![second]);
}

#[test]
fn links_and_backlinks_stay_symmetric() {
    let mut document = Document::new("Links");
    let a = document.pages()[0].id();
    let b = document.create_new_page("B");
    let c = document.create_new_page("C");

    assert!(document.add_link(a, c));
    assert!(document.add_link(b, c));
    assert!(!document.add_link(a, c));
    assert_eq!(document.links_from(a), &[c]);
    let mut backlinks = document.get_backlinks(c);
    backlinks.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(backlinks, expected);

    assert!(document.remove_link(a, c));
    assert_eq!(document.get_backlinks(c), vec![b]);
    assert!(document.links_from(a).is_empty());
    assert!(!document.remove_link(a, c));
}

#[test]
fn page_structure_edits_move_the_cursor() {
    let mut document = Document::new("Pages");
    let first = document.pages()[0].id();
    let second = document.create_new_page("Second");
    let third = document.create_new_page("");
    assert_eq!(document.page_by_id(third).unwrap().title(), "Untitled Page");

    assert!(document.move_page(2, 0));
    assert_eq!(document.page_index(third), Some(0));
    assert!(!document.move_page(0, 9));

    document.set_current_page(Some(second));
    document.remove_page(second);
    assert_eq!(document.current_page_id(), Some(first));

    let copy = document.duplicate_page(0).unwrap();
    assert_eq!(document.page_index(copy), Some(1));
    assert_eq!(document.page_by_id(copy).unwrap().title(), "Untitled Page (Copy)");
}

#[test]
fn page_edits_propagate_modified_and_events() {
    let mut document = Document::new("Events");
    document.set_modified(false);
    document.drain_events();
    let page_id = document.pages()[0].id();

    let object_id = document
        .with_page_mut(page_id, |page| page.add_object(PageObject::text("x")))
        .unwrap();

    assert!(document.is_modified());
    let events = document.drain_events();
    assert!(events.contains(&ChangeEvent::ObjectAdded { page_id, object_id }));
    assert!(events.contains(&ChangeEvent::ModifiedChanged { modified: true }));
}

#[test]
fn duplicate_document_is_independent() {
    let (mut document, text, _) = scenario();
    let a = document.pages()[0].id();
    let b = document.create_new_page("Other");
    document.add_link(a, b);

    let mut copy = document.duplicate();
    assert_ne!(copy.id(), document.id());
    assert_eq!(copy.title(), "D (Copy)");
    let copy_a = copy.pages()[0].id();
    let copy_b = copy.pages()[1].id();
    assert_ne!(copy_a, a);
    assert_eq!(copy.links_from(copy_a), &[copy_b]);
    assert_eq!(copy.current_page_id(), Some(copy_a));

    let copied_text = copy.pages()[0].objects()[0].id();
    assert_ne!(copied_text, text.id());
    copy.with_page_mut(copy_a, |page| {
        page.with_object_mut(copied_text, |object| {
            object.as_text_mut().unwrap().content = "changed".to_string();
        });
    });
    assert_eq!(document.search_objects("hello").len(), 1);
    assert!(copy.search_objects("hello").is_empty());
}

#[test]
fn json_round_trip_keeps_identity_and_starts_unmodified() {
    let (mut document, _, _) = scenario();
    document.set_description("desc");
    document.set_tags(["work", "ink", "work", ""]);
    assert_eq!(document.tags(), ["work", "ink"]);

    let wire = document.to_json();
    assert_eq!(wire["title"], json!("D"));
    assert_eq!(wire["tags"], json!(["work", "ink"]));
    assert!(wire["createdDate"].as_str().unwrap().ends_with('Z'));

    let restored = Document::from_json(&wire).unwrap();
    assert_eq!(restored, document);
    assert!(!restored.is_modified());
    assert_eq!(restored.current_page_id(), Some(restored.pages()[0].id()));
}

#[test]
fn set_state_restores_snapshot_and_marks_modified() {
    let (mut document, _, _) = scenario();
    let snapshot = document.get_state();
    document.set_title("Renamed");
    document.add_page(Page::new("Extra"));
    document.set_modified(false);

    document.set_state(&snapshot).unwrap();

    assert_eq!(document.title(), "D");
    assert_eq!(document.page_count(), 1);
    assert!(document.is_modified());
    assert!(document
        .drain_events()
        .contains(&ChangeEvent::DocumentReloaded {
            document_id: document.id()
        }));

    let before = document.clone();
    assert!(document.set_state(&json!({"id": 42})).is_err());
    assert_eq!(document, before);
}

#[test]
fn empty_page_tag_matches_every_page() {
    let (mut document, _, _) = scenario();
    document.create_new_page("Appendix");

    assert_eq!(document.find_pages_by_tag("").len(), 2);
    assert_eq!(document.find_pages_by_tag("p1").len(), 1);
    assert!(document.find_pages_by_tag("missing").is_empty());
}
