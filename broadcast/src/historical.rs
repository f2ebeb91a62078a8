//! The historical-query request/response shape (spec §6): one request per indicator instance
//! replay, answered either with a standard time-series payload or, for shape-producing
//! indicators, a grouped shapes payload plus a summary count.

use indicators::{HistoricalPoint, SeriesVisual, Shape, ShapeDedupKey};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalRequest {
    pub provider: String,
    pub symbol: String,
    pub interval: String,
    pub count: usize,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesPoint {
    pub time: i64,
    pub values: HashMap<String, Decimal>,
}

/// The response for a standard (non-shape) indicator: one point per candle, plus the same
/// values transposed into per-key arrays for clients that prefer columnar access.
#[derive(Debug, Clone, Serialize)]
pub struct StandardHistoricalResponse {
    pub metadata: Vec<SeriesVisual>,
    pub data: Vec<SeriesPoint>,
    pub series: HashMap<String, Vec<Decimal>>,
}

/// The response for a shape-producing indicator (order blocks, smart-money-concepts zones,
/// echo-forecast projections): shapes grouped by their dedup discriminator, plus a count.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeHistoricalResponse {
    pub metadata: Vec<SeriesVisual>,
    #[serde(rename = "supportsShapes")]
    pub supports_shapes: bool,
    pub shapes: HashMap<String, Vec<Shape>>,
    #[serde(rename = "shapesSummary")]
    pub shapes_summary: usize,
}

pub fn standard_response(metadata: &'static [SeriesVisual], points: &[HistoricalPoint]) -> StandardHistoricalResponse {
    let data: Vec<SeriesPoint> =
        points.iter().map(|point| SeriesPoint { time: point.time, values: point.values.clone().into_iter().collect() }).collect();

    let mut series: HashMap<String, Vec<Decimal>> = HashMap::new();
    for point in points {
        for (key, value) in &point.values {
            series.entry(key.clone()).or_default().push(*value);
        }
    }

    StandardHistoricalResponse { metadata: metadata.to_vec(), data, series }
}

/// Groups `shapes` by their [`ShapeDedupKey`] discriminator and deduplicates within each group
/// (last occurrence wins — spec §8 property 6), producing the grouped response shape.
pub fn shape_response(metadata: &'static [SeriesVisual], shapes: Vec<Shape>) -> ShapeHistoricalResponse {
    let deduped = indicators::dedup_shapes(shapes);
    let mut grouped: HashMap<String, Vec<Shape>> = HashMap::new();
    for shape in deduped {
        let group = match shape.dedup_key() {
            ShapeDedupKey::Box(_) => "boxes",
            ShapeDedupKey::Line(_) => "lines",
            ShapeDedupKey::Marker(_) => "markers",
            ShapeDedupKey::Arrow(_) => "arrows",
            ShapeDedupKey::Fill => "fills",
        };
        grouped.entry(group.to_string()).or_default().push(shape);
    }
    let shapes_summary = grouped.values().map(Vec::len).sum();

    ShapeHistoricalResponse { metadata: metadata.to_vec(), supports_shapes: true, shapes: grouped, shapes_summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use rust_decimal_macros::dec;

    #[test]
    fn standard_response_transposes_values_into_series() {
        let mut values_a = IndexMap::new();
        values_a.insert("sma".to_string(), dec!(20));
        let mut values_b = IndexMap::new();
        values_b.insert("sma".to_string(), dec!(30));

        let points = vec![
            HistoricalPoint { time: 1, values: values_a },
            HistoricalPoint { time: 2, values: values_b },
        ];

        let response = standard_response(&[], &points);
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.series.get("sma"), Some(&vec![dec!(20), dec!(30)]));
    }
}
