//! Page container: layer-ordered objects plus page metadata.
//!
//! # Responsibility
//! - Keep objects sorted by layer after every mutation.
//! - Own selection, z-order and bulk manipulation of objects.
//! - Serialize the page and its objects.
//!
//! # Invariants
//! - `objects` is non-decreasing by `layer`; the sort is stable, so objects
//!   with equal layers keep their relative order.
//! - Objects are only mutated through this type, so ordering cannot drift.
//! - Every mutation that changes state pushes a `ChangeEvent`.
//!
//! # See also
//! - model::document for page ownership and link bookkeeping.

use crate::model::event::ChangeEvent;
use crate::model::geometry::{Color, Point, Rect, Size};
use crate::model::object::{peek_object_type, ObjectId, ObjectType, PageObject};
use crate::model::schema::{color_or, parse_id, read_record, SchemaResult};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub type PageId = Uuid;

pub const DEFAULT_PAGE_TITLE: &str = "Untitled Page";
pub const DEFAULT_PAGE_SIZE: Size = Size::new(800, 600);

/// Offset applied to objects copied by `duplicate_selected_objects`.
const DUPLICATE_OFFSET: Point = Point::new(20, 20);

#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    title: String,
    size: Size,
    background_color: Color,
    objects: Vec<PageObject>,
    events: Vec<ChangeEvent>,
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.size == other.size
            && self.background_color == other.background_color
            && self.objects == other.objects
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_TITLE)
    }
}

impl Page {
    /// Creates an empty page; an empty title becomes "Untitled Page".
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), title)
    }

    pub fn with_id(id: PageId, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id,
            title: if title.is_empty() {
                DEFAULT_PAGE_TITLE.to_string()
            } else {
                title
            },
            size: DEFAULT_PAGE_SIZE,
            background_color: Color::WHITE,
            objects: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.emit(ChangeEvent::PageTitleChanged { page_id: self.id });
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, size: Size) {
        if self.size != size {
            self.size = size;
            self.emit(ChangeEvent::PageSizeChanged {
                page_id: self.id,
                size,
            });
        }
    }

    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn set_background_color(&mut self, color: Color) {
        if self.background_color != color {
            self.background_color = color;
            self.emit(ChangeEvent::PageBackgroundChanged {
                page_id: self.id,
                color,
            });
        }
    }

    /// Objects in ascending layer order.
    pub fn objects(&self) -> &[PageObject] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, id: ObjectId) -> Option<&PageObject> {
        self.objects.iter().find(|object| object.id() == id)
    }

    pub fn object_index(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|object| object.id() == id)
    }

    pub fn add_object(&mut self, object: PageObject) -> ObjectId {
        let object_id = object.id();
        self.objects.push(object);
        self.sort_objects();
        self.emit(ChangeEvent::ObjectAdded {
            page_id: self.id,
            object_id,
        });
        object_id
    }

    /// Inserts at `index` (clamped) before re-sorting by layer.
    pub fn insert_object(&mut self, index: usize, object: PageObject) -> ObjectId {
        let object_id = object.id();
        let index = index.min(self.objects.len());
        self.objects.insert(index, object);
        self.sort_objects();
        self.emit(ChangeEvent::ObjectAdded {
            page_id: self.id,
            object_id,
        });
        object_id
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<PageObject> {
        let index = self.object_index(id)?;
        self.remove_object_at(index)
    }

    pub fn remove_object_at(&mut self, index: usize) -> Option<PageObject> {
        if index >= self.objects.len() {
            return None;
        }
        let removed = self.objects.remove(index);
        self.emit(ChangeEvent::ObjectRemoved {
            page_id: self.id,
            object_id: removed.id(),
        });
        if removed.selected {
            self.emit(ChangeEvent::SelectionChanged { page_id: self.id });
        }
        Some(removed)
    }

    pub fn clear_objects(&mut self) {
        let removed = std::mem::take(&mut self.objects);
        let had_selection = removed.iter().any(|object| object.selected);
        for object in &removed {
            self.emit(ChangeEvent::ObjectRemoved {
                page_id: self.id,
                object_id: object.id(),
            });
        }
        if had_selection {
            self.emit(ChangeEvent::SelectionChanged { page_id: self.id });
        }
    }

    /// Topmost visible object whose bounds contain `point`.
    pub fn object_at(&self, point: Point) -> Option<&PageObject> {
        self.objects
            .iter()
            .rev()
            .find(|object| object.visible && object.contains(point))
    }

    /// Visible objects intersecting `rect`, in ascending layer order.
    pub fn objects_in_rect(&self, rect: &Rect) -> Vec<&PageObject> {
        self.objects
            .iter()
            .filter(|object| object.visible && object.intersects(rect))
            .collect()
    }

    pub fn selected_objects(&self) -> Vec<&PageObject> {
        self.objects.iter().filter(|object| object.selected).collect()
    }

    pub fn select(&mut self, id: ObjectId) -> bool {
        self.set_selected(id, true)
    }

    pub fn deselect(&mut self, id: ObjectId) -> bool {
        self.set_selected(id, false)
    }

    /// Adds visible objects intersecting `rect` to the selection.
    pub fn select_in_rect(&mut self, rect: &Rect) {
        self.select_where(|object| object.visible && object.intersects(rect));
    }

    pub fn select_all(&mut self) {
        self.select_where(|object| object.visible);
    }

    pub fn clear_selection(&mut self) {
        let mut changed = false;
        for object in &mut self.objects {
            changed |= object.selected;
            object.selected = false;
        }
        if changed {
            self.emit(ChangeEvent::SelectionChanged { page_id: self.id });
        }
    }

    pub fn move_selected_objects(&mut self, delta: Point) {
        let mut moved = Vec::new();
        for object in &mut self.objects {
            if object.selected {
                object.move_by(delta);
                moved.push(object.id());
            }
        }
        for object_id in moved {
            self.emit(ChangeEvent::ObjectChanged {
                page_id: self.id,
                object_id,
            });
        }
    }

    /// Removes every selected object and returns how many were removed.
    pub fn delete_selected_objects(&mut self) -> usize {
        let selected: Vec<ObjectId> = self
            .selected_objects()
            .iter()
            .map(|object| object.id())
            .collect();
        for object_id in &selected {
            self.remove_object(*object_id);
        }
        selected.len()
    }

    /// Replaces the selection with offset copies of the selected objects.
    pub fn duplicate_selected_objects(&mut self) -> Vec<ObjectId> {
        let originals: Vec<PageObject> = self
            .objects
            .iter()
            .filter(|object| object.selected)
            .cloned()
            .collect();
        self.clear_selection();

        let mut copies = Vec::with_capacity(originals.len());
        for original in &originals {
            let mut copy = original.duplicate();
            copy.move_by(DUPLICATE_OFFSET);
            copy.selected = true;
            copies.push(self.add_object(copy));
        }
        if !copies.is_empty() {
            self.emit(ChangeEvent::SelectionChanged { page_id: self.id });
        }
        copies
    }

    /// Moves the object to the end and raises its layer above all others.
    pub fn bring_to_front(&mut self, id: ObjectId) -> bool {
        let Some(index) = self.object_index(id) else {
            return false;
        };
        let mut object = self.objects.remove(index);
        let top_layer = self
            .objects
            .iter()
            .map(|other| other.layer)
            .max()
            .unwrap_or(0);
        let boundary = u32::try_from(self.objects.len()).unwrap_or(u32::MAX);
        object.layer = boundary.max(top_layer);
        let layer = object.layer;
        self.objects.push(object);
        self.sort_objects();
        self.emit_layer_changed(id, layer);
        true
    }

    /// Moves the object to the start with layer 0.
    pub fn send_to_back(&mut self, id: ObjectId) -> bool {
        let Some(index) = self.object_index(id) else {
            return false;
        };
        let mut object = self.objects.remove(index);
        object.layer = 0;
        self.objects.insert(0, object);
        self.sort_objects();
        self.emit_layer_changed(id, 0);
        true
    }

    /// Swaps with the next object; no-op when already last.
    pub fn bring_forward(&mut self, id: ObjectId) -> bool {
        match self.object_index(id) {
            Some(index) if index + 1 < self.objects.len() => {
                self.swap_with_neighbor(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Swaps with the previous object; no-op when already first.
    pub fn send_backward(&mut self, id: ObjectId) -> bool {
        match self.object_index(id) {
            Some(index) if index > 0 => {
                self.swap_with_neighbor(index - 1, index);
                true
            }
            _ => false,
        }
    }

    pub fn set_object_layer(&mut self, id: ObjectId, layer: u32) -> bool {
        let Some(index) = self.object_index(id) else {
            return false;
        };
        if self.objects[index].layer == layer {
            return true;
        }
        self.objects[index].layer = layer;
        self.sort_objects();
        self.emit_layer_changed(id, layer);
        true
    }

    /// Runs `mutate` on one object, then re-sorts and reports what changed.
    ///
    /// Returns `None` when no object has this id.
    pub fn with_object_mut<R>(
        &mut self,
        id: ObjectId,
        mutate: impl FnOnce(&mut PageObject) -> R,
    ) -> Option<R> {
        let index = self.object_index(id)?;
        let before = self.objects[index].clone();
        let result = mutate(&mut self.objects[index]);
        let after = &self.objects[index];

        let layer_changed = before.layer != after.layer;
        let selection_changed = before.selected != after.selected;
        let content_changed = !before.persisted_eq(after);
        let layer = after.layer;

        if layer_changed {
            self.sort_objects();
            self.emit_layer_changed(id, layer);
        }
        if content_changed {
            self.emit(ChangeEvent::ObjectChanged {
                page_id: self.id,
                object_id: id,
            });
        }
        if selection_changed {
            self.emit(ChangeEvent::SelectionChanged { page_id: self.id });
        }
        Some(result)
    }

    pub fn find_objects_by_type(&self, object_type: ObjectType) -> Vec<&PageObject> {
        self.objects
            .iter()
            .filter(|object| object.object_type() == object_type)
            .collect()
    }

    /// Text objects whose content contains `text`, ignoring case.
    pub fn find_objects_containing(&self, text: &str) -> Vec<&PageObject> {
        self.objects
            .iter()
            .filter(|object| object.matches_text(text))
            .collect()
    }

    /// Deep copy with fresh object ids; the page id is kept on request.
    pub fn duplicate(&self, preserve_id: bool) -> Page {
        let id = if preserve_id { self.id } else { Uuid::new_v4() };
        Page {
            id,
            title: self.title.clone(),
            size: self.size,
            background_color: self.background_color,
            objects: self.objects.iter().map(PageObject::duplicate).collect(),
            events: Vec::new(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn to_json(&self) -> Value {
        self.write_json(false)
    }

    /// Snapshot including object selection state.
    pub fn get_state(&self) -> Value {
        self.write_json(true)
    }

    pub fn from_json(value: &Value) -> SchemaResult<Self> {
        Self::read_json(value, false)
    }

    /// Replaces this page with a `get_state` snapshot.
    ///
    /// On error the page is left unchanged.
    pub fn set_state(&mut self, value: &Value) -> SchemaResult<()> {
        let restored = Self::read_json(value, true)?;
        self.id = restored.id;
        self.title = restored.title;
        self.size = restored.size;
        self.background_color = restored.background_color;
        self.objects = restored.objects;
        self.emit(ChangeEvent::PageReloaded { page_id: self.id });
        Ok(())
    }

    fn write_json(&self, with_state: bool) -> Value {
        let objects: Vec<Value> = self
            .objects
            .iter()
            .map(|object| {
                if with_state {
                    object.get_state()
                } else {
                    object.to_json()
                }
            })
            .collect();
        json!({
            "id": self.id.to_string(),
            "title": self.title,
            "size": { "width": self.size.width, "height": self.size.height },
            "backgroundColor": self.background_color.to_hex(),
            "objects": objects,
        })
    }

    fn read_json(value: &Value, with_state: bool) -> SchemaResult<Self> {
        let record: PageRecord = read_record("page", value)?;
        let id = parse_id("page.id", record.id.as_deref())?;

        let mut objects = Vec::with_capacity(record.objects.len());
        for object in &record.objects {
            match peek_object_type(object).and_then(ObjectType::from_code) {
                Some(ObjectType::Text | ObjectType::Drawing) => {
                    objects.push(PageObject::read_json(object, with_state)?);
                }
                Some(other) => {
                    debug!(
                        "event=page_read module=model status=skip page_id={id} object_type={}",
                        other.as_str()
                    );
                }
                None => {
                    warn!(
                        "event=page_read module=model status=skip page_id={id} error_code=unknown_object_type"
                    );
                }
            }
        }

        let mut page = Page {
            id,
            title: record.title.unwrap_or_else(|| DEFAULT_PAGE_TITLE.to_string()),
            size: Size::new(record.size.width, record.size.height),
            background_color: color_or(
                "page.backgroundColor",
                record.background_color.as_deref(),
                Color::WHITE,
            ),
            objects,
            events: Vec::new(),
        };
        page.sort_objects();
        Ok(page)
    }

    fn set_selected(&mut self, id: ObjectId, selected: bool) -> bool {
        let Some(object) = self.objects.iter_mut().find(|object| object.id() == id) else {
            return false;
        };
        if object.selected == selected {
            return false;
        }
        object.selected = selected;
        self.emit(ChangeEvent::SelectionChanged { page_id: self.id });
        true
    }

    fn select_where(&mut self, predicate: impl Fn(&PageObject) -> bool) {
        let mut changed = false;
        for object in &mut self.objects {
            if !object.selected && predicate(object) {
                object.selected = true;
                changed = true;
            }
        }
        if changed {
            self.emit(ChangeEvent::SelectionChanged { page_id: self.id });
        }
    }

    /// Swaps two adjacent objects and their layer values.
    fn swap_with_neighbor(&mut self, lower: usize, upper: usize) {
        let lower_layer = self.objects[lower].layer;
        let upper_layer = self.objects[upper].layer;
        self.objects.swap(lower, upper);
        self.objects[lower].layer = lower_layer;
        self.objects[upper].layer = upper_layer;

        let moved_down = self.objects[lower].id();
        let moved_up = self.objects[upper].id();
        self.emit_layer_changed(moved_up, upper_layer);
        self.emit_layer_changed(moved_down, lower_layer);
    }

    fn sort_objects(&mut self) {
        self.objects.sort_by_key(|object| object.layer);
    }

    fn emit_layer_changed(&mut self, object_id: ObjectId, layer: u32) {
        self.emit(ChangeEvent::ObjectLayerChanged {
            page_id: self.id,
            object_id,
            layer,
        });
    }

    fn emit(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PageRecord {
    id: Option<String>,
    title: Option<String>,
    size: SizeRecord,
    background_color: Option<String>,
    objects: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SizeRecord {
    width: i32,
    height: i32,
}

impl Default for SizeRecord {
    fn default() -> Self {
        Self {
            width: DEFAULT_PAGE_SIZE.width,
            height: DEFAULT_PAGE_SIZE.height,
        }
    }
}
