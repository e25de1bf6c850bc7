//! Read-only views over decoded tile geometry.
//!
//! The wire format of tiles is not this crate's concern. A [`TileDecoder`]
//! implementation (vector-tile protobuf, geojson, anything else) turns raw
//! bytes into a [`GeometryTileData`] value, and everything downstream of the
//! decoder works through these traits. Once constructed, tile data is never
//! mutated and is shared between layout passes as `Arc<dyn GeometryTileData>`.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tessella_geom::Point2f;
use thiserror::Error;

/// Tile units spanned by one tile side in the usual vector-tile encoding.
pub const DEFAULT_TILE_EXTENT: u32 = 4096;

/// Error decoding tile bytes into geometry.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The payload is not valid for the decoder's format.
    #[error("malformed tile data: {0}")]
    Malformed(String),
}

/// Turns raw tile bytes into decoded tile data.
pub trait TileDecoder: Send + Sync {
    /// Decode the payload of one tile.
    fn decode(&self, data: &Bytes) -> Result<Arc<dyn GeometryTileData>, DecodeError>;
}

/// Kind of geometry a feature carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    /// One or more standalone points.
    Point,
    /// One or more open contours.
    LineString,
    /// One or more closed rings.
    Polygon,
}

/// Value of a single feature property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// String value.
    String(String),
    /// 32-bit float value.
    Float(f32),
    /// 64-bit float value.
    Double(f64),
    /// Signed integer value.
    Int(i64),
    /// Unsigned integer value.
    Uint(u64),
    /// Boolean value.
    Bool(bool),
    /// Missing or unrepresentable value.
    Null,
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::String(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Uint(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Null => write!(f, "<NONE>"),
        }
    }
}

impl PropertyValue {
    /// Compares the value with its string representation.
    pub fn eq_str(&self, str_value: &str) -> bool {
        match self {
            PropertyValue::String(s) => s == str_value,
            PropertyValue::Float(v) => str_value.parse::<f32>() == Ok(*v),
            PropertyValue::Double(v) => str_value.parse::<f64>() == Ok(*v),
            PropertyValue::Int(v) => str_value.parse::<i64>() == Ok(*v),
            PropertyValue::Uint(v) => str_value.parse::<u64>() == Ok(*v),
            PropertyValue::Bool(v) => str_value.parse::<bool>() == Ok(*v),
            PropertyValue::Null => false,
        }
    }
}

/// One feature of a tile layer.
pub trait GeometryTileFeature: Send + Sync {
    /// Feature id, if the source format assigns one.
    fn id(&self) -> Option<u64>;
    /// Kind of geometry carried by this feature.
    fn geometry_type(&self) -> GeometryType;
    /// Feature properties.
    fn properties(&self) -> &HashMap<String, PropertyValue>;
    /// Geometry as rings of tile-local points in `[0, extent)` units.
    fn geometries(&self) -> &[Vec<Point2f>];
}

/// One named layer of a tile.
pub trait GeometryTileLayer: Send + Sync {
    /// Name of the layer.
    fn name(&self) -> &str;
    /// Tile units spanned by one tile side.
    fn extent(&self) -> u32;
    /// Number of features in the layer.
    fn feature_count(&self) -> usize;
    /// Feature by index.
    fn feature(&self, index: usize) -> Option<&dyn GeometryTileFeature>;
}

/// Decoded data of one tile.
pub trait GeometryTileData: Send + Sync {
    /// Names of all layers in the tile.
    fn layer_names(&self) -> Vec<&str>;
    /// Layer by name.
    fn layer(&self, name: &str) -> Option<&dyn GeometryTileLayer>;
}

/// Feature stored in memory.
#[derive(Debug, Clone)]
pub struct MemoryTileFeature {
    /// Feature id.
    pub id: Option<u64>,
    /// Kind of geometry.
    pub geometry_type: GeometryType,
    /// Feature properties.
    pub properties: HashMap<String, PropertyValue>,
    /// Geometry rings.
    pub geometries: Vec<Vec<Point2f>>,
}

impl GeometryTileFeature for MemoryTileFeature {
    fn id(&self) -> Option<u64> {
        self.id
    }

    fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    fn properties(&self) -> &HashMap<String, PropertyValue> {
        &self.properties
    }

    fn geometries(&self) -> &[Vec<Point2f>] {
        &self.geometries
    }
}

/// Layer stored in memory.
#[derive(Debug, Clone)]
pub struct MemoryTileLayer {
    /// Name of the layer.
    pub name: String,
    /// Tile extent.
    pub extent: u32,
    /// Features in layout order.
    pub features: Vec<MemoryTileFeature>,
}

impl GeometryTileLayer for MemoryTileLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn extent(&self) -> u32 {
        self.extent
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn feature(&self, index: usize) -> Option<&dyn GeometryTileFeature> {
        self.features
            .get(index)
            .map(|f| f as &dyn GeometryTileFeature)
    }
}

/// Tile data stored in memory. Used by tests and embedders that produce
/// geometry programmatically instead of decoding a wire format.
#[derive(Debug, Clone, Default)]
pub struct MemoryTileData {
    layers: Vec<MemoryTileLayer>,
}

impl MemoryTileData {
    /// Creates empty tile data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer. Layers keep their insertion order.
    pub fn with_layer(mut self, layer: MemoryTileLayer) -> Self {
        self.layers.push(layer);
        self
    }
}

impl GeometryTileData for MemoryTileData {
    fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }

    fn layer(&self, name: &str) -> Option<&dyn GeometryTileLayer> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .map(|l| l as &dyn GeometryTileLayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_value_eq_str() {
        assert!(PropertyValue::String("main st".into()).eq_str("main st"));
        assert!(PropertyValue::Int(-3).eq_str("-3"));
        assert!(PropertyValue::Bool(true).eq_str("true"));
        assert!(!PropertyValue::Null.eq_str(""));
    }

    #[test]
    fn memory_tile_layer_lookup() {
        let data = MemoryTileData::new().with_layer(MemoryTileLayer {
            name: "roads".into(),
            extent: DEFAULT_TILE_EXTENT,
            features: vec![MemoryTileFeature {
                id: Some(1),
                geometry_type: GeometryType::LineString,
                properties: HashMap::new(),
                geometries: vec![vec![Point2f::new(0.0, 0.0), Point2f::new(10.0, 0.0)]],
            }],
        });

        assert_eq!(data.layer_names(), vec!["roads"]);
        let layer = data.layer("roads").unwrap();
        assert_eq!(layer.feature_count(), 1);
        assert!(layer.feature(1).is_none());
        assert_eq!(
            layer.feature(0).unwrap().geometry_type(),
            GeometryType::LineString
        );
        assert!(data.layer("water").is_none());
    }
}
