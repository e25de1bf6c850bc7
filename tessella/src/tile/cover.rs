//! Computes which tiles a viewport needs.

use serde::{Deserialize, Serialize};
use tessella_geom::{Point2d, Rect, Size};

use crate::tile_id::{CanonicalTileId, OverscaledTileId, UnwrappedTileId};

/// Half of the web mercator world span in meters.
pub const MERCATOR_HALF_WORLD: f64 = 20037508.342787;

/// Resolution of zoom 0 in meters per pixel for 256px tiles.
pub const TOP_RESOLUTION: f64 = 156543.03392800014;

/// Camera state the tile set is computed from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    /// Center of the view in EPSG:3857 meters.
    pub center: Point2d,
    /// Continuous zoom level.
    pub zoom: f64,
    /// Size of the view in pixels.
    pub size: Size,
}

impl Viewport {
    /// Creates a viewport.
    pub fn new(center: Point2d, zoom: f64, size: Size) -> Self {
        Self { center, zoom, size }
    }

    /// Meters per pixel at the viewport's zoom.
    pub fn resolution(&self) -> f64 {
        TOP_RESOLUTION / 2f64.powf(self.zoom)
    }

    /// Bounds of the view in EPSG:3857 meters.
    pub fn bbox(&self) -> Rect {
        let resolution = self.resolution();
        Rect::new(
            self.center.x - self.size.half_width() * resolution,
            self.center.y - self.size.half_height() * resolution,
            self.center.x + self.size.half_width() * resolution,
            self.center.y + self.size.half_height() * resolution,
        )
    }
}

/// Zoom clamping of a tile source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    /// Smallest zoom tiles are requested at.
    pub min_zoom: u8,
    /// Largest zoom tiles are requested at.
    pub max_zoom: u8,
    /// Largest zoom the source has data for; deeper requests overscale.
    pub source_max_zoom: u8,
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 22,
            source_max_zoom: 22,
        }
    }
}

/// The set of tiles required to fill a viewport, all at one zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct TileCover {
    /// Zoom level the tiles are displayed at.
    pub overscaled_z: u8,
    /// Required tiles, with wrap offsets for views crossing the
    /// antimeridian.
    pub tiles: Vec<UnwrappedTileId>,
}

impl TileCover {
    /// Requested ids of the covered tiles, ignoring wrap duplicates.
    pub fn overscaled_ids(&self) -> Vec<OverscaledTileId> {
        let mut ids: Vec<OverscaledTileId> = self
            .tiles
            .iter()
            .map(|t| OverscaledTileId::new(self.overscaled_z, t.canonical))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Computes the minimal-but-complete tile set for the viewport.
///
/// The display zoom is the integer part of the viewport zoom clamped to the
/// source's zoom range. When it exceeds `source_max_zoom`, canonical tiles
/// stay at `source_max_zoom` and are reused overscaled.
pub fn tile_cover(viewport: &Viewport, zoom_range: &ZoomRange) -> TileCover {
    let overscaled_z = (viewport.zoom.floor().clamp(0.0, 255.0) as u8)
        .clamp(zoom_range.min_zoom, zoom_range.max_zoom);
    let canonical_z = overscaled_z.min(zoom_range.source_max_zoom);

    let tiles_across = 1i64 << canonical_z;
    let world_span = MERCATOR_HALF_WORLD * 2.0;
    let tile_span = world_span / tiles_across as f64;

    let bbox = viewport.bbox();
    if viewport.size.is_zero() {
        return TileCover {
            overscaled_z,
            tiles: Vec::new(),
        };
    }

    let x_min = first_index((bbox.x_min() + MERCATOR_HALF_WORLD) / tile_span);
    let x_max = last_index((bbox.x_max() + MERCATOR_HALF_WORLD) / tile_span);

    // Y does not wrap: clamp to the pyramid.
    let y_min = first_index((MERCATOR_HALF_WORLD - bbox.y_max()) / tile_span).max(0);
    let y_max = last_index((MERCATOR_HALF_WORLD - bbox.y_min()) / tile_span).min(tiles_across - 1);

    let mut tiles = Vec::new();
    for x in x_min..=x_max {
        let wrap = x.div_euclid(tiles_across);
        let canonical_x = x.rem_euclid(tiles_across);
        for y in y_min..=y_max {
            tiles.push(UnwrappedTileId::new(
                wrap as i32,
                CanonicalTileId::new(canonical_z, canonical_x as u32, y as u32),
            ));
        }
    }

    TileCover {
        overscaled_z,
        tiles,
    }
}

const EDGE_TOLERANCE: f64 = 1e-9;

// Index of the first covered tile: a bound landing on a tile edge (within
// float tolerance) starts at that edge's tile.
fn first_index(edge: f64) -> i64 {
    let rounded = edge.round();
    if (edge - rounded).abs() < EDGE_TOLERANCE {
        rounded as i64
    } else {
        edge.floor() as i64
    }
}

// Index of the last covered tile: a bound landing exactly on a tile edge
// does not pull the next tile in.
fn last_index(edge: f64) -> i64 {
    let rounded = edge.round();
    if (edge - rounded).abs() < EDGE_TOLERANCE {
        rounded as i64 - 1
    } else {
        edge.floor() as i64
    }
}
