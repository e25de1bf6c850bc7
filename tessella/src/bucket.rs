//! Per-layer, per-tile containers of render-ready data.
//!
//! A [`Bucket`] is what tile parsing leaves behind for the renderer: CPU-side
//! vertex/index buffers for fills and lines, placed symbol quads for labels,
//! raw payload for raster layers. The set of layer kinds is closed, so
//! buckets are a tagged enum dispatched by pattern match instead of a
//! virtual hierarchy.

use std::collections::HashMap;

use bytes::Bytes;
use lyon::lyon_tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, FillVertexConstructor, LineJoin,
    StrokeOptions, StrokeTessellator, StrokeVertex, StrokeVertexConstructor, VertexBuffers,
};
use lyon::math::point;
use lyon::path::Path;
use tessella_geom::Point2f;

use crate::style::{Color, FillStyle, LineStyle};

/// Map of style-layer name to the bucket built for it.
pub type BucketMap = HashMap<String, Bucket>;

/// Single vertex of tessellated tile geometry.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileVertex {
    /// Position in tile units.
    pub position: [f32; 2],
    /// RGBA color.
    pub color: [u8; 4],
}

/// One placed glyph or icon rectangle, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolQuad {
    /// Anchor position in tile units.
    pub anchor: [f32; 2],
    /// Offset of the top-left corner from the anchor, in pixels.
    pub tl: [f32; 2],
    /// Offset of the bottom-right corner from the anchor, in pixels.
    pub br: [f32; 2],
    /// Glyph the quad renders; `None` for icon quads.
    pub glyph: Option<char>,
    /// Smallest zoom-scale the quad is shown at.
    pub min_scale: f32,
    /// Largest zoom-scale the quad is shown at.
    pub max_scale: f32,
}

/// One accepted symbol placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSymbol {
    /// Anchor position in tile units.
    pub anchor: [f32; 2],
    /// Line angle at the anchor, radians.
    pub angle: f32,
    /// Scale at which the placement became collision-free.
    pub placement_scale: f32,
    /// Zoom-scale interval over which the placement remains valid.
    pub placement_range: (f32, f32),
    /// Index of the source feature within its tile layer.
    pub feature_index: u32,
    /// Label text, empty when the symbol is icon-only.
    pub text: String,
}

/// Tessellated polygon fills of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillBucket {
    /// Vertex buffer.
    pub vertices: Vec<TileVertex>,
    /// Index buffer, triangle list.
    pub indices: Vec<u32>,
}

/// Tessellated line strokes of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineBucket {
    /// Vertex buffer.
    pub vertices: Vec<TileVertex>,
    /// Index buffer, triangle list.
    pub indices: Vec<u32>,
}

/// Placed symbols of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolBucket {
    /// Accepted placements in priority order.
    pub placed: Vec<PlacedSymbol>,
    /// Glyph quads of all placed text.
    pub text_quads: Vec<SymbolQuad>,
    /// Icon quads of all placed icons.
    pub icon_quads: Vec<SymbolQuad>,
}

/// Undecoded raster payload of one layer.
///
/// Image decoding is a renderer concern; the bucket only carries the bytes
/// to the upload site.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterBucket {
    /// Raw image bytes as fetched.
    pub data: Bytes,
}

/// Render-ready data of one style layer in one tile.
#[derive(Debug, Clone, PartialEq)]
pub enum Bucket {
    /// Polygon fill data.
    Fill(FillBucket),
    /// Line stroke data.
    Line(LineBucket),
    /// Label/icon data.
    Symbol(SymbolBucket),
    /// Raster image data.
    Raster(RasterBucket),
}

impl Bucket {
    /// True if the bucket contains nothing to draw.
    pub fn is_empty(&self) -> bool {
        match self {
            Bucket::Fill(b) => b.indices.is_empty(),
            Bucket::Line(b) => b.indices.is_empty(),
            Bucket::Symbol(b) => b.placed.is_empty(),
            Bucket::Raster(b) => b.data.is_empty(),
        }
    }
}

struct VertexCtor {
    color: [u8; 4],
}

impl FillVertexConstructor<TileVertex> for VertexCtor {
    fn new_vertex(&mut self, vertex: FillVertex) -> TileVertex {
        TileVertex {
            position: vertex.position().to_array(),
            color: self.color,
        }
    }
}

impl StrokeVertexConstructor<TileVertex> for VertexCtor {
    fn new_vertex(&mut self, vertex: StrokeVertex) -> TileVertex {
        TileVertex {
            position: vertex.position().to_array(),
            color: self.color,
        }
    }
}

impl FillBucket {
    /// Tessellates polygon features into a fill bucket.
    ///
    /// Every item of `features` is the ring set of one feature: the first
    /// ring is the outer contour, the rest are holes. Features that fail to
    /// tessellate are skipped.
    pub fn build<'a>(
        features: impl Iterator<Item = &'a [Vec<Point2f>]>,
        style: &FillStyle,
    ) -> Self {
        let mut buffers: VertexBuffers<TileVertex, u32> = VertexBuffers::new();
        let mut tessellator = FillTessellator::new();

        for rings in features {
            let Some(path) = build_path(rings, true) else {
                continue;
            };

            let result = tessellator.tessellate_path(
                &path,
                &FillOptions::default(),
                &mut BuffersBuilder::new(
                    &mut buffers,
                    VertexCtor {
                        color: style.color.to_u8_array(),
                    },
                ),
            );

            if let Err(err) = result {
                log::warn!("Skipping a polygon that failed to tessellate: {err:?}");
            }
        }

        Self {
            vertices: buffers.vertices,
            indices: buffers.indices,
        }
    }
}

impl LineBucket {
    /// Tessellates line features into a stroke bucket.
    pub fn build<'a>(
        features: impl Iterator<Item = &'a [Vec<Point2f>]>,
        style: &LineStyle,
    ) -> Self {
        let mut buffers: VertexBuffers<TileVertex, u32> = VertexBuffers::new();
        let mut tessellator = StrokeTessellator::new();
        let options = StrokeOptions::default()
            .with_line_width(style.width)
            .with_line_join(LineJoin::Round);

        for contours in features {
            let Some(path) = build_path(contours, false) else {
                continue;
            };

            let result = tessellator.tessellate_path(
                &path,
                &options,
                &mut BuffersBuilder::new(
                    &mut buffers,
                    VertexCtor {
                        color: style.color.to_u8_array(),
                    },
                ),
            );

            if let Err(err) = result {
                log::warn!("Skipping a line that failed to tessellate: {err:?}");
            }
        }

        Self {
            vertices: buffers.vertices,
            indices: buffers.indices,
        }
    }
}

fn build_path(rings: &[Vec<Point2f>], close: bool) -> Option<Path> {
    let mut builder = Path::builder();
    let mut has_contours = false;

    for ring in rings {
        if ring.len() < 2 || ring.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            continue;
        }

        builder.begin(point(ring[0].x, ring[0].y));
        for p in &ring[1..] {
            builder.line_to(point(p.x, p.y));
        }
        builder.end(close);
        has_contours = true;
    }

    has_contours.then(|| builder.build())
}
