//! Freehand drawing payload: strokes, pens and live stroke capture.
//!
//! # Responsibility
//! - Own the ordered strokes of one drawing object.
//! - Smooth captured input with a moving average before committing.
//! - Provide stroke-level selection and editing.
//!
//! # Invariants
//! - `selected_strokes` only holds indices that are in range, sorted and
//!   without duplicates.
//! - Capture state and stroke selection are transient and never persisted.
//! - A captured stroke is committed only when its path length is non-zero.

use crate::model::geometry::Color;
use crate::model::path::{PathPoint, StrokePath};
use crate::model::schema::{color_or, now_millis};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Number of raw points averaged for each smoothed capture point.
pub const SMOOTHING_WINDOW: usize = 3;

/// Offset applied to strokes copied by `duplicate_selected_strokes`.
const DUPLICATE_OFFSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingMode {
    #[default]
    Pen,
    Highlighter,
    Eraser,
}

impl DrawingMode {
    pub fn code(self) -> i64 {
        match self {
            Self::Pen => 0,
            Self::Highlighter => 1,
            Self::Eraser => 2,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Highlighter,
            2 => Self::Eraser,
            _ => Self::Pen,
        }
    }

    /// Pen a stroke in this mode starts with.
    pub fn default_pen(self) -> Pen {
        match self {
            Self::Pen => Pen::new(Color::BLACK, 2.0),
            Self::Highlighter => Pen::new(Color::rgba(255, 255, 0, 128), 10.0),
            Self::Eraser => Pen::new(Color::WHITE, 20.0),
        }
    }
}

/// Qt-compatible pen style codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PenStyle {
    NoPen,
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
    Custom,
}

impl PenStyle {
    pub fn code(self) -> i64 {
        match self {
            Self::NoPen => 0,
            Self::Solid => 1,
            Self::Dash => 2,
            Self::Dot => 3,
            Self::DashDot => 4,
            Self::DashDotDot => 5,
            Self::Custom => 6,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::NoPen,
            2 => Self::Dash,
            3 => Self::Dot,
            4 => Self::DashDot,
            5 => Self::DashDotDot,
            6 => Self::Custom,
            _ => Self::Solid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapStyle {
    Flat,
    Square,
    #[default]
    Round,
}

impl CapStyle {
    pub fn code(self) -> i64 {
        match self {
            Self::Flat => 0x00,
            Self::Square => 0x10,
            Self::Round => 0x20,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0x00 => Self::Flat,
            0x10 => Self::Square,
            _ => Self::Round,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinStyle {
    Miter,
    Bevel,
    #[default]
    Round,
    SvgMiter,
}

impl JoinStyle {
    pub fn code(self) -> i64 {
        match self {
            Self::Miter => 0x00,
            Self::Bevel => 0x40,
            Self::Round => 0x80,
            Self::SvgMiter => 0x100,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0x00 => Self::Miter,
            0x40 => Self::Bevel,
            0x100 => Self::SvgMiter,
            _ => Self::Round,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub color: Color,
    pub width: f64,
    pub style: PenStyle,
    pub cap: CapStyle,
    pub join: JoinStyle,
}

impl Pen {
    /// Solid pen with round cap and join.
    pub fn new(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            style: PenStyle::Solid,
            cap: CapStyle::Round,
            join: JoinStyle::Round,
        }
    }

    fn to_json(self) -> Value {
        json!({
            "color": self.color.to_hex(),
            "width": self.width,
            "style": self.style.code(),
            "capStyle": self.cap.code(),
            "joinStyle": self.join.code(),
        })
    }
}

impl Default for Pen {
    fn default() -> Self {
        DrawingMode::Pen.default_pen()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrushStyle {
    #[default]
    None,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Brush {
    pub color: Color,
    pub style: BrushStyle,
}

impl Brush {
    fn to_json(self) -> Value {
        let style = match self.style {
            BrushStyle::None => 0,
            BrushStyle::Solid => 1,
        };
        json!({ "color": self.color.to_hex(), "style": style })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub path: StrokePath,
    pub pen: Pen,
    pub brush: Brush,
    pub mode: DrawingMode,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

impl Stroke {
    pub fn new(path: StrokePath, pen: Pen, mode: DrawingMode) -> Self {
        Self {
            path,
            pen,
            brush: Brush::default(),
            mode,
            timestamp: now_millis().timestamp_millis(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "mode": self.mode.code(),
            "timestamp": self.timestamp,
            "path": self.path.to_svg(),
            "pen": self.pen.to_json(),
            "brush": self.brush.to_json(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StrokeCapture {
    stroke: Stroke,
    raw_points: Vec<PathPoint>,
}

/// Payload of a drawing object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Drawing {
    strokes: Vec<Stroke>,
    selected_strokes: Vec<usize>,
    current_mode: DrawingMode,
    current_pen: Pen,
    current_brush: Brush,
    capture: Option<StrokeCapture>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn current_mode(&self) -> DrawingMode {
        self.current_mode
    }

    /// Switches mode and resets the current pen to that mode's default.
    pub fn set_current_mode(&mut self, mode: DrawingMode) {
        self.current_mode = mode;
        self.current_pen = mode.default_pen();
    }

    pub fn current_pen(&self) -> Pen {
        self.current_pen
    }

    pub fn set_current_pen(&mut self, pen: Pen) {
        self.current_pen = pen;
    }

    pub fn current_brush(&self) -> Brush {
        self.current_brush
    }

    pub fn set_current_brush(&mut self, brush: Brush) {
        self.current_brush = brush;
    }

    pub fn add_stroke(&mut self, stroke: Stroke) -> usize {
        self.strokes.push(stroke);
        self.strokes.len() - 1
    }

    /// Removes one stroke; out-of-range indices are a no-op.
    pub fn remove_stroke(&mut self, index: usize) -> Option<Stroke> {
        if index >= self.strokes.len() {
            return None;
        }
        let removed = self.strokes.remove(index);
        self.selected_strokes.retain(|selected| *selected != index);
        for selected in &mut self.selected_strokes {
            if *selected > index {
                *selected -= 1;
            }
        }
        Some(removed)
    }

    pub fn clear_strokes(&mut self) {
        self.strokes.clear();
        self.selected_strokes.clear();
    }

    /// Index of the topmost stroke whose bounds contain `point`.
    pub fn stroke_at(&self, point: PathPoint) -> Option<usize> {
        self.strokes
            .iter()
            .rposition(|stroke| stroke.path.bounds().is_some_and(|bounds| bounds.contains(point)))
    }

    pub fn selected_strokes(&self) -> &[usize] {
        &self.selected_strokes
    }

    pub fn select_stroke(&mut self, index: usize) -> bool {
        if index >= self.strokes.len() {
            return false;
        }
        match self.selected_strokes.binary_search(&index) {
            Ok(_) => false,
            Err(position) => {
                self.selected_strokes.insert(position, index);
                true
            }
        }
    }

    pub fn deselect_stroke(&mut self, index: usize) -> bool {
        match self.selected_strokes.binary_search(&index) {
            Ok(position) => {
                self.selected_strokes.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear_stroke_selection(&mut self) {
        self.selected_strokes.clear();
    }

    pub fn move_selected_strokes(&mut self, dx: f64, dy: f64) {
        for index in &self.selected_strokes {
            if let Some(stroke) = self.strokes.get_mut(*index) {
                stroke.path.translate(dx, dy);
            }
        }
    }

    /// Deletes every selected stroke and returns how many were removed.
    pub fn delete_selected_strokes(&mut self) -> usize {
        let selected = std::mem::take(&mut self.selected_strokes);
        for index in selected.iter().rev() {
            if *index < self.strokes.len() {
                self.strokes.remove(*index);
            }
        }
        selected.len()
    }

    /// Copies the selected strokes with a small offset and selects the copies.
    pub fn duplicate_selected_strokes(&mut self) -> Vec<usize> {
        let copies: Vec<Stroke> = self
            .selected_strokes
            .iter()
            .filter_map(|index| self.strokes.get(*index).cloned())
            .collect();
        self.selected_strokes.clear();
        let mut indices = Vec::with_capacity(copies.len());
        for mut copy in copies {
            copy.path.translate(DUPLICATE_OFFSET, DUPLICATE_OFFSET);
            copy.timestamp = now_millis().timestamp_millis();
            let index = self.add_stroke(copy);
            self.selected_strokes.push(index);
            indices.push(index);
        }
        indices
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Starts a new capture with the current mode, pen and brush.
    ///
    /// Any capture already in progress is discarded.
    pub fn begin_stroke(&mut self, point: PathPoint) {
        let mut stroke = Stroke::new(
            StrokePath::from_points(vec![point]),
            self.current_pen,
            self.current_mode,
        );
        stroke.brush = self.current_brush;
        self.capture = Some(StrokeCapture {
            stroke,
            raw_points: vec![point],
        });
    }

    /// Appends one input point and returns the smoothed point recorded.
    pub fn extend_stroke(&mut self, point: PathPoint) -> Option<PathPoint> {
        let capture = self.capture.as_mut()?;
        capture.raw_points.push(point);
        let smoothed = smooth_tail(&capture.raw_points).unwrap_or(point);
        capture.stroke.path.push(smoothed);
        Some(smoothed)
    }

    /// Ends the capture, committing the stroke when its path has length.
    pub fn finish_stroke(&mut self) -> Option<usize> {
        let capture = self.capture.take()?;
        if capture.stroke.path.length() > 0.0 {
            Some(self.add_stroke(capture.stroke))
        } else {
            None
        }
    }

    pub fn cancel_stroke(&mut self) {
        self.capture = None;
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for stroke in &mut self.strokes {
            stroke.path.translate(dx, dy);
        }
    }

    pub fn scale_about(&mut self, origin: PathPoint, factor: f64) {
        for stroke in &mut self.strokes {
            stroke.path.scale_about(origin, factor);
        }
    }

    /// Compares only the persisted part of two drawings.
    pub(crate) fn persisted_eq(&self, other: &Drawing) -> bool {
        self.strokes == other.strokes
            && self.current_mode == other.current_mode
            && self.current_pen == other.current_pen
            && self.current_brush == other.current_brush
    }

    pub(crate) fn write_fields(&self, out: &mut Map<String, Value>, with_state: bool) {
        let strokes: Vec<Value> = self.strokes.iter().map(Stroke::to_json).collect();
        out.insert("strokes".to_string(), Value::Array(strokes));
        out.insert("currentMode".to_string(), json!(self.current_mode.code()));
        out.insert("currentPen".to_string(), self.current_pen.to_json());
        out.insert("currentBrush".to_string(), self.current_brush.to_json());
        if with_state {
            out.insert("selectedStrokes".to_string(), json!(self.selected_strokes));
        }
    }
}

fn smooth_tail(raw_points: &[PathPoint]) -> Option<PathPoint> {
    if raw_points.len() < SMOOTHING_WINDOW {
        return None;
    }
    let window = &raw_points[raw_points.len() - SMOOTHING_WINDOW..];
    let count = window.len() as f64;
    let (sum_x, sum_y) = window
        .iter()
        .fold((0.0, 0.0), |(x, y), point| (x + point.x, y + point.y));
    Some(PathPoint::new(sum_x / count, sum_y / count))
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct DrawingRecord {
    strokes: Vec<StrokeRecord>,
    current_mode: i64,
    current_pen: Option<PenRecord>,
    current_brush: BrushRecord,
    selected_strokes: Vec<usize>,
}

impl Default for DrawingRecord {
    fn default() -> Self {
        Self {
            strokes: Vec::new(),
            current_mode: DrawingMode::Pen.code(),
            current_pen: None,
            current_brush: BrushRecord::default(),
            selected_strokes: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StrokeRecord {
    mode: i64,
    timestamp: i64,
    path: String,
    pen: Option<PenRecord>,
    brush: BrushRecord,
}

impl Default for StrokeRecord {
    fn default() -> Self {
        Self {
            mode: DrawingMode::Pen.code(),
            timestamp: 0,
            path: String::new(),
            pen: None,
            brush: BrushRecord::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PenRecord {
    color: Option<String>,
    width: Option<f64>,
    style: Option<i64>,
    cap_style: Option<i64>,
    join_style: Option<i64>,
}

impl PenRecord {
    /// Builds a pen, filling gaps from `fallback`.
    fn into_pen(self, fallback: Pen) -> Pen {
        Pen {
            color: color_or("pen.color", self.color.as_deref(), fallback.color),
            width: self.width.unwrap_or(fallback.width),
            style: self.style.map_or(fallback.style, PenStyle::from_code),
            cap: self.cap_style.map_or(fallback.cap, CapStyle::from_code),
            join: self.join_style.map_or(fallback.join, JoinStyle::from_code),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BrushRecord {
    color: Option<String>,
    style: i64,
}

impl From<BrushRecord> for Brush {
    fn from(record: BrushRecord) -> Self {
        Self {
            color: color_or("brush.color", record.color.as_deref(), Color::BLACK),
            style: if record.style == 0 {
                BrushStyle::None
            } else {
                BrushStyle::Solid
            },
        }
    }
}

impl DrawingRecord {
    pub(crate) fn into_drawing(self, with_state: bool) -> Drawing {
        let current_mode = DrawingMode::from_code(self.current_mode);
        let strokes: Vec<Stroke> = self
            .strokes
            .into_iter()
            .map(|record| {
                let mode = DrawingMode::from_code(record.mode);
                Stroke {
                    path: StrokePath::from_svg(&record.path),
                    pen: record.pen.unwrap_or_default().into_pen(mode.default_pen()),
                    brush: record.brush.into(),
                    mode,
                    timestamp: record.timestamp,
                }
            })
            .collect();

        let mut selected_strokes = Vec::new();
        if with_state {
            selected_strokes = self
                .selected_strokes
                .into_iter()
                .filter(|index| *index < strokes.len())
                .collect();
            selected_strokes.sort_unstable();
            selected_strokes.dedup();
        }

        Drawing {
            strokes,
            selected_strokes,
            current_mode,
            current_pen: self
                .current_pen
                .unwrap_or_default()
                .into_pen(current_mode.default_pen()),
            current_brush: self.current_brush.into(),
            capture: None,
        }
    }
}
