//! Shared fixtures for the crate's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tessella_geom::Point2f;

use crate::error::TessellaError;
use crate::fetch::{FetchError, FileSource, TileResponse};
use crate::layout::shaping::{GlyphMetrics, GlyphMetricsProvider};
use crate::observer::TileObserver;
use crate::style::{
    FillStyle, LayerStyle, LineStyle, StyleContext, StyleLayer, SymbolStyle,
};
use crate::style::Color;
use crate::tile_data::{
    DecodeError, GeometryTileData, GeometryType, MemoryTileData, MemoryTileFeature,
    MemoryTileLayer, PropertyValue, TileDecoder, DEFAULT_TILE_EXTENT,
};
use crate::tile_id::OverscaledTileId;

/// Fixed-metrics font covering printable ASCII, plus one known icon.
pub struct TestGlyphs;

impl GlyphMetricsProvider for TestGlyphs {
    fn glyph_metrics(&self, c: char) -> Option<GlyphMetrics> {
        if !(' '..='\u{7e}').contains(&c) {
            return None;
        }

        Some(GlyphMetrics {
            width: 10.0,
            height: 14.0,
            left: 1.0,
            top: 12.0,
            advance: 12.0,
        })
    }

    fn icon_size(&self, name: &str) -> Option<(f32, f32)> {
        (name == "marker").then_some((16.0, 16.0))
    }
}

/// Payload magic the [`TestDecoder`] accepts.
pub fn vector_tile_bytes() -> Bytes {
    Bytes::from_static(b"VTILE")
}

/// Decoder returning a fixed in-memory tile for the magic payload and a
/// decode error for anything else.
pub struct TestDecoder {
    data: Arc<MemoryTileData>,
}

impl Default for TestDecoder {
    fn default() -> Self {
        Self {
            data: Arc::new(fixture_tile_data()),
        }
    }
}

impl TestDecoder {
    /// Decoder serving arbitrary prepared data.
    pub fn with_data(data: MemoryTileData) -> Self {
        Self {
            data: Arc::new(data),
        }
    }
}

impl TileDecoder for TestDecoder {
    fn decode(&self, data: &Bytes) -> Result<Arc<dyn GeometryTileData>, DecodeError> {
        if data.as_ref() == b"VTILE" {
            Ok(self.data.clone())
        } else {
            Err(DecodeError::Malformed("bad magic".into()))
        }
    }
}

/// A tile with a land polygon, one road and two labelled places.
pub fn fixture_tile_data() -> MemoryTileData {
    MemoryTileData::new()
        .with_layer(MemoryTileLayer {
            name: "land".into(),
            extent: DEFAULT_TILE_EXTENT,
            features: vec![MemoryTileFeature {
                id: Some(1),
                geometry_type: GeometryType::Polygon,
                properties: HashMap::new(),
                geometries: vec![vec![
                    Point2f::new(0.0, 0.0),
                    Point2f::new(4096.0, 0.0),
                    Point2f::new(4096.0, 4096.0),
                    Point2f::new(0.0, 4096.0),
                ]],
            }],
        })
        .with_layer(MemoryTileLayer {
            name: "roads".into(),
            extent: DEFAULT_TILE_EXTENT,
            features: vec![MemoryTileFeature {
                id: Some(2),
                geometry_type: GeometryType::LineString,
                properties: HashMap::new(),
                geometries: vec![vec![
                    Point2f::new(100.0, 2000.0),
                    Point2f::new(4000.0, 2100.0),
                ]],
            }],
        })
        .with_layer(place_layer(&[
            ("First", Point2f::new(1000.0, 1000.0)),
            ("Second", Point2f::new(3000.0, 3000.0)),
        ]))
}

fn place_layer(points: &[(&str, Point2f)]) -> MemoryTileLayer {
    MemoryTileLayer {
        name: "place".into(),
        extent: DEFAULT_TILE_EXTENT,
        features: points
            .iter()
            .enumerate()
            .map(|(i, (name, point))| MemoryTileFeature {
                id: Some(i as u64),
                geometry_type: GeometryType::Point,
                properties: [(
                    "name".to_string(),
                    PropertyValue::String((*name).to_string()),
                )]
                .into_iter()
                .collect(),
                geometries: vec![vec![*point]],
            })
            .collect(),
    }
}

/// Tile data with a single `place` point layer.
pub fn symbol_layer_with_points(points: &[(&str, Point2f)]) -> MemoryTileData {
    MemoryTileData::new().with_layer(place_layer(points))
}

/// Style with a fill, a line and a symbol layer over the fixture tile.
pub fn test_style() -> StyleContext {
    StyleContext::new(vec![
        StyleLayer {
            name: "land".into(),
            source_layer: "land".into(),
            min_zoom: 0,
            max_zoom: 22,
            style: LayerStyle::Fill(FillStyle {
                color: Color::GRAY,
                pattern: None,
            }),
        },
        StyleLayer {
            name: "roads".into(),
            source_layer: "roads".into(),
            min_zoom: 0,
            max_zoom: 22,
            style: LayerStyle::Line(LineStyle {
                color: Color::BLACK,
                width: 8.0,
            }),
        },
        StyleLayer {
            name: "labels".into(),
            source_layer: "place".into(),
            min_zoom: 4,
            max_zoom: 22,
            style: LayerStyle::Symbol(SymbolStyle {
                text_field: Some("name".into()),
                ..SymbolStyle::default()
            }),
        },
    ])
}

/// File source serving the magic payload for every tile, counting loads.
#[derive(Default)]
pub struct TestFileSource {
    loads: AtomicUsize,
}

impl TestFileSource {
    /// Number of `load` calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FileSource for TestFileSource {
    async fn load(&self, _id: &OverscaledTileId) -> Result<TileResponse, FetchError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(TileResponse::new(vector_tile_bytes()))
    }
}

/// File source failing every request.
pub struct FailingFileSource;

#[async_trait::async_trait]
impl FileSource for FailingFileSource {
    async fn load(&self, _id: &OverscaledTileId) -> Result<TileResponse, FetchError> {
        Err(FetchError::Network)
    }
}

/// Observer recording every notification it receives.
#[derive(Default)]
pub struct RecordingObserver {
    /// Ids reported via `on_tile_changed`.
    pub changed: Mutex<Vec<OverscaledTileId>>,
    /// Ids and errors reported via `on_tile_error`.
    pub errors: Mutex<Vec<(OverscaledTileId, String)>>,
}

impl TileObserver for RecordingObserver {
    fn on_tile_changed(&self, id: OverscaledTileId) {
        self.changed.lock().push(id);
    }

    fn on_tile_error(&self, id: OverscaledTileId, error: &TessellaError) {
        self.errors.lock().push((id, error.to_string()));
    }
}
