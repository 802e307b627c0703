use inknote_core::{ChangeEvent, ObjectId, ObjectType, Page, PageObject, Point, Rect, Size};
use serde_json::json;

fn placed(content: &str, bounds: Rect) -> PageObject {
    let mut object = PageObject::text(content);
    object.bounds = bounds;
    object
}

fn layers(page: &Page) -> Vec<u32> {
    page.objects().iter().map(|object| object.layer).collect()
}

fn order(page: &Page) -> Vec<ObjectId> {
    page.objects().iter().map(PageObject::id).collect()
}

fn assert_non_decreasing(page: &Page) {
    let layers = layers(page);
    assert!(
        layers.windows(2).all(|pair| pair[0] <= pair[1]),
        "layers out of order: {layers:?}"
    );
}

#[test]
fn z_order_operations_keep_layers_sorted() {
    let mut page = Page::new("Layers");
    let a = page.add_object(placed("a", Rect::new(0, 0, 10, 10)));
    let b = page.add_object(placed("b", Rect::new(0, 0, 10, 10)));
    let c = page.add_object(placed("c", Rect::new(0, 0, 10, 10)));

    assert!(page.bring_to_front(a));
    assert_eq!(order(&page).last(), Some(&a));
    assert_non_decreasing(&page);

    assert!(page.send_to_back(c));
    assert_eq!(order(&page).first(), Some(&c));
    assert_non_decreasing(&page);

    assert!(page.bring_forward(c));
    assert_non_decreasing(&page);
    assert!(page.send_backward(a));
    assert_non_decreasing(&page);
    assert!(page.set_object_layer(b, 9));
    assert_eq!(order(&page).last(), Some(&b));
    assert_non_decreasing(&page);

    assert!(!page.bring_forward(b));
    assert!(!page.bring_to_front(ObjectId::new_v4()));
}

#[test]
fn object_at_returns_topmost_visible_hit() {
    let mut page = Page::new("Hits");
    let bottom = page.add_object(placed("bottom", Rect::new(0, 0, 50, 50)));
    let top = page.add_object(placed("top", Rect::new(0, 0, 50, 50)));
    page.bring_to_front(top);

    assert_eq!(page.object_at(Point::new(10, 10)).map(PageObject::id), Some(top));

    page.with_object_mut(top, |object| object.visible = false);
    assert_eq!(page.object_at(Point::new(10, 10)).map(PageObject::id), Some(bottom));
    assert!(page.object_at(Point::new(50, 50)).is_none());
}

#[test]
fn select_in_rect_adds_to_existing_selection() {
    let mut page = Page::new("Select");
    let left = page.add_object(placed("left", Rect::new(0, 0, 10, 10)));
    let right = page.add_object(placed("right", Rect::new(100, 0, 10, 10)));
    page.select(left);

    page.select_in_rect(&Rect::new(95, 0, 20, 20));

    let selected: Vec<ObjectId> = page.selected_objects().iter().map(|o| o.id()).collect();
    assert_eq!(selected, vec![left, right]);
}

#[test]
fn duplicate_selection_offsets_copies_and_moves_selection() {
    let mut page = Page::new("Copies");
    let original = page.add_object(placed("note", Rect::new(10, 10, 30, 30)));
    page.select(original);
    page.drain_events();

    let copies = page.duplicate_selected_objects();

    assert_eq!(copies.len(), 1);
    assert_eq!(page.object_count(), 2);
    let copy = page.object(copies[0]).unwrap();
    assert_eq!(copy.bounds.origin(), Point::new(30, 30));
    assert!(copy.selected);
    assert!(!page.object(original).unwrap().selected);
    assert!(page
        .drain_events()
        .contains(&ChangeEvent::ObjectAdded {
            page_id: page.id(),
            object_id: copies[0],
        }));
}

#[test]
fn delete_and_move_selected_objects() {
    let mut page = Page::new("Edit");
    let keep = page.add_object(placed("keep", Rect::new(0, 0, 10, 10)));
    let gone = page.add_object(placed("drop", Rect::new(0, 0, 10, 10)));
    page.select(keep);
    page.move_selected_objects(Point::new(3, 4));
    assert_eq!(page.object(keep).unwrap().bounds.origin(), Point::new(3, 4));

    page.clear_selection();
    page.select(gone);
    assert_eq!(page.delete_selected_objects(), 1);
    assert!(page.object(gone).is_none());
    assert_eq!(page.object_count(), 1);
}

#[test]
fn find_objects_by_type_and_text() {
    let mut page = Page::new("Find");
    page.add_object(PageObject::text("Meeting notes"));
    page.add_object(PageObject::drawing());

    assert_eq!(page.find_objects_by_type(ObjectType::Drawing).len(), 1);
    assert_eq!(page.find_objects_containing("MEETING").len(), 1);
    assert!(page.find_objects_containing("").is_empty());
}

#[test]
fn page_round_trip_skips_placeholder_objects() {
    let mut page = Page::new("Wire");
    page.set_size(Size::new(1024, 768));
    let text = page.add_object(PageObject::text("kept"));
    page.add_object(PageObject::image());

    let wire = page.to_json();
    assert_eq!(wire["size"], json!({"width": 1024, "height": 768}));
    assert_eq!(wire["objects"].as_array().unwrap().len(), 2);

    let restored = Page::from_json(&wire).unwrap();
    assert_eq!(restored.id(), page.id());
    assert_eq!(restored.size(), Size::new(1024, 768));
    assert_eq!(order(&restored), vec![text]);
}

#[test]
fn failed_set_state_leaves_page_unchanged() {
    let mut page = Page::new("Stable");
    page.add_object(PageObject::text("body"));
    let before = page.clone();

    let err = page.set_state(&json!({"id": "broken", "title": "x"}));

    assert!(err.is_err());
    assert_eq!(page, before);
}
