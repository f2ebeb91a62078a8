//! The visualization-shape protocol every indicator may emit alongside its scalar series:
//! boxes, lines, markers, arrows and fills, each with a declared deduplication key so replaying
//! the same logical shape across a historical evaluation keeps only its latest occurrence.

use market_instrument::Price;
use serde::{Deserialize, Serialize};

/// A box spanning two times and two prices (order blocks, SMC premium/discount zones).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    pub time1: i64,
    pub time2: i64,
    pub price1: Price,
    pub price2: Price,
    pub label: String,
    pub color: String,
}

/// A line segment between two (time, price) points (forecast legs, trend lines).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineShape {
    pub time1: i64,
    pub time2: i64,
    pub price1: Price,
    pub price2: Price,
    pub color: String,
}

/// A single-point marker (touch/signal annotations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerShape {
    pub time: i64,
    pub price: Price,
    pub marker_shape: String,
    pub text: String,
    pub color: String,
}

/// A directional annotation at one bar (BOS/CHoCH labels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowShape {
    pub time: i64,
    pub direction: String,
    pub text: String,
    pub color: String,
}

/// A filled region, unique per instance (at most one outstanding fill per indicator instance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillShape {
    pub time1: i64,
    pub time2: i64,
    pub price1: Price,
    pub price2: Price,
    pub color: String,
}

/// Tagged union over every shape discriminator an indicator can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shapeType", rename_all = "lowercase")]
pub enum Shape {
    Box(BoxShape),
    Line(LineShape),
    Marker(MarkerShape),
    Arrow(ArrowShape),
    Fill(FillShape),
}

/// The deduplication key declared for each shape discriminator (spec §4.5): a box is unique by
/// `(time1, price1, price2)`, a line by `(time1, time2, price1, price2)`, a marker by
/// `(time, price, shape, text)`, an arrow by `(time, direction, text)`, a fill is unique per
/// instance (one logical key, last write wins).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ShapeDedupKey {
    Box(i64, Price, Price),
    Line(i64, i64, Price, Price),
    Marker(i64, Price, String, String),
    Arrow(i64, String, String),
    Fill,
}

impl Shape {
    pub fn dedup_key(&self) -> ShapeDedupKey {
        match self {
            Shape::Box(b) => ShapeDedupKey::Box(b.time1, b.price1, b.price2),
            Shape::Line(l) => ShapeDedupKey::Line(l.time1, l.time2, l.price1, l.price2),
            Shape::Marker(m) => {
                ShapeDedupKey::Marker(m.time, m.price, m.marker_shape.clone(), m.text.clone())
            }
            Shape::Arrow(a) => ShapeDedupKey::Arrow(a.time, a.direction.clone(), a.text.clone()),
            Shape::Fill(_) => ShapeDedupKey::Fill,
        }
    }
}

/// Deduplicates a sequence of shapes accumulated across a historical replay: later occurrences
/// of the same [`ShapeDedupKey`] overwrite earlier ones (a zone's latest known extent wins),
/// insertion order of first appearance is otherwise preserved.
pub fn dedup_shapes(shapes: Vec<Shape>) -> Vec<Shape> {
    let mut ordered = indexmap::IndexMap::new();
    for shape in shapes {
        ordered.insert(shape.dedup_key(), shape);
    }
    ordered.into_values().collect()
}
