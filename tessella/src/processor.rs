//! Background decode and layout of fetched tile payloads.
//!
//! The processor is the only place where tile CPU work runs: it decodes the
//! payload and builds one bucket per visible style layer, all inside
//! `spawn_blocking` so the foreground thread never stalls. Failures come
//! back as values; a worker can not take the map down.

use std::sync::Arc;

use bytes::Bytes;

use crate::bucket::{Bucket, BucketMap, FillBucket, LineBucket, RasterBucket};
use crate::error::TessellaError;
use crate::layout::shaping::GlyphMetricsProvider;
use crate::layout::SymbolLayout;
use crate::style::{LayerStyle, StyleContext};
use crate::tile_data::{GeometryTileData, GeometryTileLayer, GeometryType, TileDecoder};
use crate::tile_id::OverscaledTileId;

/// Decodes payloads and lays out buckets on worker threads.
pub struct TileProcessor {
    decoder: Arc<dyn TileDecoder>,
    style: Arc<StyleContext>,
    glyphs: Arc<dyn GlyphMetricsProvider>,
}

impl TileProcessor {
    /// Creates a processor.
    pub fn new(
        decoder: Arc<dyn TileDecoder>,
        style: Arc<StyleContext>,
        glyphs: Arc<dyn GlyphMetricsProvider>,
    ) -> Self {
        Self {
            decoder,
            style,
            glyphs,
        }
    }

    /// Style the processor lays tiles out against.
    pub fn style(&self) -> &StyleContext {
        &self.style
    }

    /// Decodes and lays out one tile payload off-thread.
    pub async fn process(
        &self,
        id: OverscaledTileId,
        data: Bytes,
    ) -> Result<BucketMap, TessellaError> {
        let decoder = self.decoder.clone();
        let style = self.style.clone();
        let glyphs = self.glyphs.clone();

        tokio::task::spawn_blocking(move || {
            let tile_data = decoder.decode(&data)?;
            Ok(build_buckets(&*tile_data, &data, &style, &*glyphs, id))
        })
        .await
        .map_err(|_| TessellaError::Generic("tile worker terminated unexpectedly".into()))?
    }
}

/// Builds the bucket of every style layer visible at the tile's zoom.
///
/// Runs synchronously; [`TileProcessor::process`] is the off-thread entry.
pub fn build_buckets(
    tile_data: &dyn GeometryTileData,
    raw_data: &Bytes,
    style: &StyleContext,
    glyphs: &dyn GlyphMetricsProvider,
    id: OverscaledTileId,
) -> BucketMap {
    let mut buckets = BucketMap::new();

    for style_layer in style.layers() {
        if !style_layer.is_visible_at(id.overscaled_z) {
            continue;
        }

        if let LayerStyle::Raster(_) = &style_layer.style {
            buckets.insert(
                style_layer.name.clone(),
                Bucket::Raster(RasterBucket {
                    data: raw_data.clone(),
                }),
            );
            continue;
        }

        let Some(source_layer) = tile_data.layer(&style_layer.source_layer) else {
            log::trace!(
                "Tile {id} has no layer {} for style layer {}",
                style_layer.source_layer,
                style_layer.name
            );
            continue;
        };

        let bucket = match &style_layer.style {
            LayerStyle::Fill(fill) => Bucket::Fill(FillBucket::build(
                geometries_of(source_layer, GeometryType::Polygon),
                fill,
            )),
            LayerStyle::Line(line) => Bucket::Line(LineBucket::build(
                geometries_of(source_layer, GeometryType::LineString),
                line,
            )),
            LayerStyle::Symbol(symbol) => {
                let overscaling = id.overscale_factor() as f32;
                Bucket::Symbol(
                    SymbolLayout::new(source_layer, symbol, glyphs, overscaling).build(),
                )
            }
            LayerStyle::Raster(_) => unreachable!("handled above"),
        };

        buckets.insert(style_layer.name.clone(), bucket);
    }

    buckets
}

fn geometries_of<'a>(
    layer: &'a dyn GeometryTileLayer,
    geometry_type: GeometryType,
) -> impl Iterator<Item = &'a [Vec<tessella_geom::Point2f>]> + 'a {
    (0..layer.feature_count())
        .filter_map(move |i| layer.feature(i))
        .filter(move |f| f.geometry_type() == geometry_type)
        .map(|f| f.geometries())
}
