//! Page objects: shared geometry/layer state plus a typed payload.
//!
//! # Responsibility
//! - Define the closed set of object variants and their wire type codes.
//! - Own per-object geometry operations and the JSON contract.
//!
//! # Invariants
//! - `id` never changes after construction; `duplicate()` is the only way to
//!   obtain a copy with a different id.
//! - Persisted JSON never contains the selection flag; `get_state()` does.
//! - Strokes live in page coordinates and follow the object on move/scale.
//!
//! # See also
//! - model::page for layer ordering and selection over many objects.

use crate::model::drawing::{Drawing, DrawingRecord};
use crate::model::geometry::{Point, Rect, Size};
use crate::model::path::PathPoint;
use crate::model::schema::{clamp_layer, parse_id, read_record, SchemaError, SchemaResult};
use crate::model::text::{TextContent, TextRecord};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub type ObjectId = Uuid;

/// Geometry every new object starts with.
pub const DEFAULT_BOUNDS: Rect = Rect::new(0, 0, 100, 100);

/// Wire-level discriminator of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Text,
    Drawing,
    Image,
    Pdf,
}

impl ObjectType {
    pub fn code(self) -> i64 {
        match self {
            Self::Text => 0,
            Self::Drawing => 1,
            Self::Image => 2,
            Self::Pdf => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Text),
            1 => Some(Self::Drawing),
            2 => Some(Self::Image),
            3 => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Drawing => "drawing",
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }
}

/// Variant payload. Image and PDF carry no data yet.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Text(TextContent),
    Drawing(Drawing),
    Image,
    Pdf,
}

impl ObjectKind {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Text(_) => ObjectType::Text,
            Self::Drawing(_) => ObjectType::Drawing,
            Self::Image => ObjectType::Image,
            Self::Pdf => ObjectType::Pdf,
        }
    }

    fn persisted_eq(&self, other: &ObjectKind) -> bool {
        match (self, other) {
            (Self::Drawing(left), Self::Drawing(right)) => left.persisted_eq(right),
            (left, right) => left == right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageObject {
    id: ObjectId,
    pub bounds: Rect,
    /// Z-order key; higher layers paint above lower ones.
    pub layer: u32,
    pub visible: bool,
    /// Transient selection flag.
    pub selected: bool,
    pub kind: ObjectKind,
}

impl PageObject {
    /// Creates an object with a fresh id and default geometry.
    pub fn new(kind: ObjectKind) -> Self {
        Self::with_id(Uuid::new_v4(), kind)
    }

    /// Creates an object with a caller-provided id.
    pub fn with_id(id: ObjectId, kind: ObjectKind) -> Self {
        Self {
            id,
            bounds: DEFAULT_BOUNDS,
            layer: 0,
            visible: true,
            selected: false,
            kind,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(ObjectKind::Text(TextContent::new(content)))
    }

    pub fn drawing() -> Self {
        Self::new(ObjectKind::Drawing(Drawing::new()))
    }

    pub fn image() -> Self {
        Self::new(ObjectKind::Image)
    }

    pub fn pdf() -> Self {
        Self::new(ObjectKind::Pdf)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    pub fn as_text(&self) -> Option<&TextContent> {
        match &self.kind {
            ObjectKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextContent> {
        match &mut self.kind {
            ObjectKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_drawing(&self) -> Option<&Drawing> {
        match &self.kind {
            ObjectKind::Drawing(drawing) => Some(drawing),
            _ => None,
        }
    }

    pub fn as_drawing_mut(&mut self) -> Option<&mut Drawing> {
        match &mut self.kind {
            ObjectKind::Drawing(drawing) => Some(drawing),
            _ => None,
        }
    }

    /// Hit test against the bounding rect; visibility is not considered.
    pub fn contains(&self, point: Point) -> bool {
        self.bounds.contains(point)
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        self.bounds.intersects(rect)
    }

    pub fn set_position(&mut self, position: Point) {
        let origin = self.bounds.origin();
        self.move_by(Point::new(
            position.x.saturating_sub(origin.x),
            position.y.saturating_sub(origin.y),
        ));
    }

    pub fn set_size(&mut self, size: Size) {
        self.bounds = Rect::from_origin_size(self.bounds.origin(), size);
    }

    pub fn move_by(&mut self, delta: Point) {
        self.bounds = self.bounds.translated(delta);
        if let ObjectKind::Drawing(drawing) = &mut self.kind {
            drawing.translate(f64::from(delta.x), f64::from(delta.y));
        }
    }

    /// Scales the bounds around their center; sizes are not clamped.
    pub fn scale(&mut self, factor: f64) {
        let center = self.bounds.center();
        self.bounds = self.bounds.scaled(factor);
        if let ObjectKind::Drawing(drawing) = &mut self.kind {
            drawing.scale_about(PathPoint::from(center), factor);
        }
    }

    /// Copy with a fresh id; the copy starts unselected.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.selected = false;
        if let ObjectKind::Drawing(drawing) = &mut copy.kind {
            drawing.clear_stroke_selection();
            drawing.cancel_stroke();
        }
        copy
    }

    /// Case-insensitive substring match over text content.
    pub fn matches_text(&self, query: &str) -> bool {
        self.as_text().is_some_and(|text| text.contains_text(query))
    }

    /// Returns whether both objects would serialize identically.
    pub fn persisted_eq(&self, other: &PageObject) -> bool {
        self.id == other.id
            && self.bounds == other.bounds
            && self.layer == other.layer
            && self.visible == other.visible
            && self.kind.persisted_eq(&other.kind)
    }

    pub fn to_json(&self) -> Value {
        self.write_json(false)
    }

    /// Snapshot including transient selection state.
    pub fn get_state(&self) -> Value {
        self.write_json(true)
    }

    pub fn from_json(value: &Value) -> SchemaResult<Self> {
        Self::read_json(value, false)
    }

    /// Restores a snapshot taken with `get_state`; the id is kept.
    pub fn set_state(&mut self, value: &Value) -> SchemaResult<()> {
        let restored = Self::read_json(value, true)?;
        *self = Self {
            id: self.id,
            ..restored
        };
        Ok(())
    }

    fn write_json(&self, with_state: bool) -> Value {
        let mut out = Map::new();
        out.insert("id".to_string(), json!(self.id.to_string()));
        out.insert("type".to_string(), json!(self.object_type().code()));
        out.insert(
            "bounds".to_string(),
            json!({
                "x": self.bounds.x,
                "y": self.bounds.y,
                "width": self.bounds.width,
                "height": self.bounds.height,
            }),
        );
        out.insert("layer".to_string(), json!(self.layer));
        out.insert("visible".to_string(), json!(self.visible));
        if with_state {
            out.insert("selected".to_string(), json!(self.selected));
        }
        match &self.kind {
            ObjectKind::Text(text) => text.write_fields(&mut out),
            ObjectKind::Drawing(drawing) => drawing.write_fields(&mut out, with_state),
            ObjectKind::Image | ObjectKind::Pdf => {}
        }
        Value::Object(out)
    }

    pub(crate) fn read_json(value: &Value, with_state: bool) -> SchemaResult<Self> {
        let record: ObjectRecord = read_record("object", value)?;
        let object_type = ObjectType::from_code(record.type_code)
            .ok_or(SchemaError::UnknownObjectType(record.type_code))?;
        let kind = match object_type {
            ObjectType::Text => {
                ObjectKind::Text(read_record::<TextRecord>("text object", value)?.into())
            }
            ObjectType::Drawing => ObjectKind::Drawing(
                read_record::<DrawingRecord>("drawing object", value)?.into_drawing(with_state),
            ),
            ObjectType::Image => ObjectKind::Image,
            ObjectType::Pdf => ObjectKind::Pdf,
        };

        Ok(Self {
            id: parse_id("object.id", record.id.as_deref())?,
            bounds: record.bounds.into(),
            layer: clamp_layer(record.layer),
            visible: record.visible,
            selected: with_state && record.selected,
            kind,
        })
    }
}

/// Reads only the `type` code of a serialized object.
pub(crate) fn peek_object_type(value: &Value) -> Option<i64> {
    value.get("type").and_then(Value::as_i64)
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ObjectRecord {
    id: Option<String>,
    #[serde(rename = "type")]
    type_code: i64,
    bounds: BoundsRecord,
    layer: i64,
    visible: bool,
    selected: bool,
}

impl Default for ObjectRecord {
    fn default() -> Self {
        Self {
            id: None,
            type_code: ObjectType::Text.code(),
            bounds: BoundsRecord::default(),
            layer: 0,
            visible: true,
            selected: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BoundsRecord {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Default for BoundsRecord {
    fn default() -> Self {
        Self {
            x: DEFAULT_BOUNDS.x,
            y: DEFAULT_BOUNDS.y,
            width: DEFAULT_BOUNDS.width,
            height: DEFAULT_BOUNDS.height,
        }
    }
}

impl From<BoundsRecord> for Rect {
    fn from(record: BoundsRecord) -> Self {
        Rect::new(record.x, record.y, record.width, record.height)
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectType, PageObject, DEFAULT_BOUNDS};
    use crate::model::geometry::{Point, Rect};
    use crate::model::schema::SchemaError;
    use serde_json::json;

    #[test]
    fn new_objects_use_default_geometry() {
        let object = PageObject::text("note");
        assert_eq!(object.bounds, DEFAULT_BOUNDS);
        assert_eq!(object.layer, 0);
        assert!(object.visible);
        assert!(!object.selected);
        assert!(object.as_text().unwrap().markdown_mode);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let object = PageObject::from_json(&json!({ "type": 0, "content": "hi" })).unwrap();
        assert_eq!(object.bounds, DEFAULT_BOUNDS);
        assert!(object.visible);
        let text = object.as_text().unwrap();
        assert_eq!(text.content, "hi");
        assert!(text.markdown_mode);
    }

    #[test]
    fn unknown_type_and_bad_id_are_rejected() {
        let err = PageObject::from_json(&json!({ "type": 42 })).unwrap_err();
        assert_eq!(err, SchemaError::UnknownObjectType(42));

        let err = PageObject::from_json(&json!({ "type": 0, "id": "nope" })).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidId { .. }));
    }

    #[test]
    fn selection_is_only_in_state_snapshots() {
        let mut object = PageObject::drawing();
        object.selected = true;
        assert!(object.to_json().get("selected").is_none());
        assert_eq!(object.get_state()["selected"], json!(true));

        let mut restored = PageObject::drawing();
        restored.set_state(&object.get_state()).unwrap();
        assert!(restored.selected);
        assert_ne!(restored.id(), object.id());
    }

    #[test]
    fn image_and_pdf_stubs_round_trip() {
        for object in [PageObject::image(), PageObject::pdf()] {
            let restored = PageObject::from_json(&object.to_json()).unwrap();
            assert_eq!(restored, object);
        }
        assert_eq!(PageObject::pdf().object_type(), ObjectType::Pdf);
    }

    #[test]
    fn move_and_scale_keep_identity() {
        let mut object = PageObject::text("x");
        let id = object.id();
        object.move_by(Point::new(10, -5));
        assert_eq!(object.bounds, Rect::new(10, -5, 100, 100));
        object.scale(2.0);
        assert_eq!((object.bounds.width, object.bounds.height), (200, 200));
        assert_eq!(object.id(), id);
        assert_ne!(object.duplicate().id(), id);
    }
}
