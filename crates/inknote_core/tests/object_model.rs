use inknote_core::model::drawing::{Drawing, DrawingMode, Stroke};
use inknote_core::model::path::{PathPoint, StrokePath};
use inknote_core::{Color, ObjectKind, ObjectType, PageObject, Point, Rect, SchemaError, Size};
use serde_json::json;

fn sample_stroke() -> Stroke {
    let path = StrokePath::from_points(vec![
        PathPoint::new(10.0, 10.0),
        PathPoint::new(40.0, 10.0),
        PathPoint::new(40.0, 30.5),
    ]);
    Stroke::new(path, DrawingMode::Pen.default_pen(), DrawingMode::Pen)
}

#[test]
fn text_object_round_trips_with_identity_and_wire_shape() {
    let mut object = PageObject::text("Hello world");
    object.bounds = Rect::new(5, 6, 120, 40);
    object.layer = 3;
    if let Some(text) = object.as_text_mut() {
        text.font.bold = true;
        text.text_color = Color::rgb(0x11, 0x22, 0x33);
    }

    let wire = object.to_json();
    assert_eq!(wire["type"], json!(0));
    assert_eq!(
        wire["bounds"],
        json!({"x": 5, "y": 6, "width": 120, "height": 40})
    );
    assert_eq!(wire["content"], json!("Hello world"));
    assert_eq!(wire["markdownMode"], json!(true));
    assert_eq!(wire["textColor"], json!("#112233"));
    assert!(wire.get("selected").is_none());

    let restored = PageObject::from_json(&wire).unwrap();
    assert_eq!(restored.id(), object.id());
    assert_eq!(restored, object);
}

#[test]
fn drawing_object_round_trips_strokes() {
    let mut object = PageObject::drawing();
    object
        .as_drawing_mut()
        .unwrap()
        .add_stroke(sample_stroke());

    let wire = object.to_json();
    assert_eq!(wire["type"], json!(1));
    assert_eq!(wire["strokes"].as_array().unwrap().len(), 1);
    assert_eq!(wire["strokes"][0]["path"], json!("M10 10 L40 10 L40 30.5"));

    let restored = PageObject::from_json(&wire).unwrap();
    assert_eq!(restored.id(), object.id());
    assert!(restored.persisted_eq(&object));
}

#[test]
fn placeholder_types_keep_their_common_fields() {
    let mut image = PageObject::image();
    image.bounds = Rect::new(1, 2, 3, 4);
    let restored = PageObject::from_json(&image.to_json()).unwrap();
    assert_eq!(restored.kind, ObjectKind::Image);
    assert_eq!(restored.bounds, image.bounds);

    let pdf = PageObject::from_json(&PageObject::pdf().to_json()).unwrap();
    assert_eq!(pdf.object_type(), ObjectType::Pdf);
}

#[test]
fn unknown_type_code_is_rejected() {
    let err = PageObject::from_json(&json!({"id": uuid::Uuid::new_v4().to_string(), "type": 7}))
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnknownObjectType(7)));
}

#[test]
fn missing_id_gets_a_fresh_one_and_bad_id_is_rejected() {
    let fresh = PageObject::from_json(&json!({"type": 0, "content": "x"})).unwrap();
    assert!(!fresh.id().is_nil());

    let err = PageObject::from_json(&json!({"id": "not-a-uuid", "type": 0})).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidId { .. }));
}

#[test]
fn duplicate_is_independent_of_the_original() {
    let original = PageObject::text("draft");
    let mut copy = original.duplicate();
    assert_ne!(copy.id(), original.id());

    copy.as_text_mut().unwrap().content = "edited".to_string();
    copy.move_by(Point::new(10, 10));

    assert_eq!(original.as_text().unwrap().content, "draft");
    assert_eq!(original.bounds, Rect::new(0, 0, 100, 100));
    assert_eq!(copy.bounds.origin(), Point::new(10, 10));
}

#[test]
fn moving_a_drawing_moves_its_strokes() {
    let mut drawing = Drawing::new();
    drawing.add_stroke(sample_stroke());
    let mut object = PageObject::new(ObjectKind::Drawing(drawing));

    object.move_by(Point::new(5, -5));

    let first = object.as_drawing().unwrap().strokes()[0].path.points()[0];
    assert_eq!(first, PathPoint::new(15.0, 5.0));
}

#[test]
fn scale_keeps_center_and_truncates() {
    let mut object = PageObject::text("scaled");
    object.scale(0.5);
    assert_eq!(object.bounds.size(), Size::new(50, 50));
    assert_eq!(object.bounds.center(), Point::new(49, 49));
}

#[test]
fn state_snapshot_carries_selection_but_keeps_id() {
    let mut object = PageObject::text("snap");
    object.selected = true;
    let state = object.get_state();
    assert_eq!(state["selected"], json!(true));

    let mut other = PageObject::text("other");
    let other_id = other.id();
    other.set_state(&state).unwrap();
    assert_eq!(other.id(), other_id);
    assert!(other.selected);
    assert_eq!(other.as_text().unwrap().content, "snap");
}
