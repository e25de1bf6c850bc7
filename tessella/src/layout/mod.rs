//! Symbol layout engine.
//!
//! For one tile and one symbol style layer, layout turns feature geometry
//! plus evaluated text/icon parameters into the set of placed,
//! collision-free glyph and icon quads the renderer uploads. Placement is
//! greedy and first-come-first-served: features are processed in tile
//! order, and committed symbols constrain everything placed after them.
//!
//! The whole pass is deterministic: identical tile data, style parameters
//! and feature order produce bit-identical buckets.

use tessella_geom::Point2f;

use crate::bucket::{PlacedSymbol, SymbolBucket, SymbolQuad};
use crate::style::{SymbolPlacement, SymbolStyle};
use crate::tile_data::{GeometryTileFeature, GeometryTileLayer, GeometryType};

pub mod anchor;
pub mod collision;
pub mod placement;
pub mod shaping;

use anchor::{get_anchors, get_center_anchor, Anchor, AnchorParams};
use collision::{CollisionBox, CollisionIndex};
use shaping::{shape_icon, shape_text, GlyphMetricsProvider, ShapedIcon, Shaping};

/// Largest zoom-scale a placement search may accept.
///
/// Beyond this scale the tile is so overscaled that its parent pyramid
/// levels take over, so pushing labels further out is pointless.
pub const MAX_PLACEMENT_SCALE: f32 = 8.0;

/// Pixel size of one rendered tile side, used to convert between pixel and
/// tile units.
const TILE_SIZE: f32 = 256.0;

/// Lays out the symbols of one style layer over one tile layer.
pub struct SymbolLayout<'a> {
    layer: &'a dyn GeometryTileLayer,
    style: &'a SymbolStyle,
    glyphs: &'a dyn GlyphMetricsProvider,
    overscaling: f32,
}

impl<'a> SymbolLayout<'a> {
    /// Creates a layout pass.
    ///
    /// `overscaling` is how much the tile is magnified relative to its
    /// canonical zoom (`1` for tiles rendered at their own zoom).
    pub fn new(
        layer: &'a dyn GeometryTileLayer,
        style: &'a SymbolStyle,
        glyphs: &'a dyn GlyphMetricsProvider,
        overscaling: f32,
    ) -> Self {
        Self {
            layer,
            style,
            glyphs,
            overscaling,
        }
    }

    /// Runs the pass and returns the bucket of accepted placements.
    pub fn build(&self) -> SymbolBucket {
        let extent = self.layer.extent() as f32;
        let box_scale = extent / TILE_SIZE;
        let padding = self.style.symbol_padding * box_scale;

        let mut collision = CollisionIndex::new();
        let mut bucket = SymbolBucket::default();

        for feature_index in 0..self.layer.feature_count() {
            let Some(feature) = self.layer.feature(feature_index) else {
                continue;
            };

            let text = self.label_text(feature);
            let shaping = text
                .as_deref()
                .and_then(|t| match shape_text(t, self.glyphs, self.style) {
                    Ok(shaping) => Some(shaping),
                    Err(err) => {
                        // Text that cannot be shaped loses only its text;
                        // icon placement for the feature still proceeds.
                        log::debug!("Dropping text of a label: {err}");
                        None
                    }
                });

            let icon = self
                .style
                .icon_image
                .as_deref()
                .and_then(|name| shape_icon(name, self.glyphs));

            if shaping.is_none() && icon.is_none() {
                continue;
            }

            for anchor in self.feature_anchors(feature, shaping.as_ref(), icon.as_ref(), extent) {
                self.try_place(
                    &anchor,
                    shaping.as_ref(),
                    icon.as_ref(),
                    feature_index as u32,
                    text.as_deref().unwrap_or(""),
                    box_scale,
                    padding,
                    &mut collision,
                    &mut bucket,
                );
            }
        }

        bucket
    }

    fn label_text(&self, feature: &dyn GeometryTileFeature) -> Option<String> {
        let field = self.style.text_field.as_ref()?;
        let value = feature.properties().get(field)?;
        let text = value.to_string();
        (!text.is_empty()).then_some(text)
    }

    fn feature_anchors(
        &self,
        feature: &dyn GeometryTileFeature,
        shaping: Option<&Shaping>,
        icon: Option<&ShapedIcon>,
        extent: f32,
    ) -> Vec<Anchor> {
        let label_length = f32::max(
            shaping.map(|s| s.width()).unwrap_or(0.0),
            icon.map(|i| i.right - i.left).unwrap_or(0.0),
        );

        let params = AnchorParams {
            spacing: self.style.symbol_spacing * extent / TILE_SIZE,
            max_angle: self.style.text_max_angle,
            label_length,
            glyph_size: shaping::BASE_GLYPH_SIZE,
            box_scale: extent / TILE_SIZE,
            overscaling: self.overscaling,
            extent,
            along_line: shaping.is_some()
                && !matches!(self.style.symbol_placement, SymbolPlacement::Point),
        };

        let placement = if feature.geometry_type() == GeometryType::Point {
            SymbolPlacement::Point
        } else {
            self.style.symbol_placement
        };

        let mut anchors = Vec::new();
        for ring in feature.geometries() {
            match placement {
                SymbolPlacement::Point => {
                    anchors.extend(
                        ring.iter()
                            .filter(|p| p.x.is_finite() && p.y.is_finite())
                            .map(|p| Anchor::for_point(*p)),
                    );
                }
                SymbolPlacement::Line => anchors.extend(get_anchors(ring, &params)),
                SymbolPlacement::LineCenter => anchors.extend(get_center_anchor(ring, &params)),
            }
        }

        anchors
    }

    #[allow(clippy::too_many_arguments)]
    fn try_place(
        &self,
        anchor: &Anchor,
        shaping: Option<&Shaping>,
        icon: Option<&ShapedIcon>,
        feature_index: u32,
        text: &str,
        box_scale: f32,
        padding: f32,
        collision: &mut CollisionIndex,
        bucket: &mut SymbolBucket,
    ) {
        let text_box = shaping.map(|s| {
            collision_box(
                anchor,
                s.left,
                s.top,
                s.right,
                s.bottom,
                box_scale,
            )
        });
        let icon_box = icon.map(|i| {
            collision_box(anchor, i.left, i.top, i.right, i.bottom, box_scale)
        });

        let mut tested = Vec::new();
        if let Some(b) = text_box {
            if !self.style.text_allow_overlap {
                tested.push(b);
            }
        }
        if let Some(b) = icon_box {
            if !self.style.icon_allow_overlap {
                tested.push(b);
            }
        }

        let scale = if tested.is_empty() {
            Some(anchor.scale)
        } else {
            collision.placement_scale(&tested, anchor.scale, MAX_PLACEMENT_SCALE, padding)
        };

        let Some(placement_scale) = scale else {
            // Expected, frequent outcome: the anchor loses to an earlier
            // symbol and is dropped silently.
            return;
        };

        let all_boxes: Vec<CollisionBox> =
            text_box.into_iter().chain(icon_box).collect();
        let placement_range = collision.placement_range(&all_boxes, placement_scale);
        collision.insert(&all_boxes, placement_scale);

        let max_scale = placement_range.1;
        if let Some(s) = shaping {
            for glyph in &s.glyphs {
                let tl = [
                    glyph.x + glyph.metrics.left,
                    glyph.y - glyph.metrics.top,
                ];
                bucket.text_quads.push(SymbolQuad {
                    anchor: [anchor.point.x, anchor.point.y],
                    tl,
                    br: [tl[0] + glyph.metrics.width, tl[1] + glyph.metrics.height],
                    glyph: Some(glyph.glyph),
                    min_scale: placement_scale,
                    max_scale,
                });
            }
        }

        if let Some(i) = icon {
            bucket.icon_quads.push(SymbolQuad {
                anchor: [anchor.point.x, anchor.point.y],
                tl: [i.left, i.top],
                br: [i.right, i.bottom],
                glyph: None,
                min_scale: placement_scale,
                max_scale,
            });
        }

        bucket.placed.push(PlacedSymbol {
            anchor: [anchor.point.x, anchor.point.y],
            angle: anchor.angle,
            placement_scale,
            placement_range,
            feature_index,
            text: text.to_string(),
        });
    }
}

fn collision_box(
    anchor: &Anchor,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    box_scale: f32,
) -> CollisionBox {
    CollisionBox {
        anchor: Point2f::new(anchor.point.x, anchor.point.y),
        x1: left * box_scale,
        y1: top * box_scale,
        x2: right * box_scale,
        y2: bottom * box_scale,
        min_scale: anchor.scale,
        max_scale: f32::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{symbol_layer_with_points, TestGlyphs};
    use crate::tile_data::GeometryTileData;

    fn style() -> SymbolStyle {
        SymbolStyle {
            text_field: Some("name".into()),
            ..SymbolStyle::default()
        }
    }

    #[test]
    fn overlapping_labels_place_first_only() {
        let data = symbol_layer_with_points(&[
            ("First", Point2f::new(1000.0, 1000.0)),
            ("Second", Point2f::new(1000.0, 1000.0)),
        ]);
        let layer = data.layer("place").unwrap();

        let style = style();
        let bucket = SymbolLayout::new(layer, &style, &TestGlyphs, 1.0).build();

        assert_eq!(bucket.placed.len(), 1);
        assert_eq!(bucket.placed[0].text, "First");
    }

    #[test]
    fn distant_labels_both_place() {
        let data = symbol_layer_with_points(&[
            ("First", Point2f::new(500.0, 500.0)),
            ("Second", Point2f::new(3000.0, 3000.0)),
        ]);
        let layer = data.layer("place").unwrap();

        let style = style();
        let bucket = SymbolLayout::new(layer, &style, &TestGlyphs, 1.0).build();

        assert_eq!(bucket.placed.len(), 2);
        assert!(!bucket.text_quads.is_empty());
    }

    #[test]
    fn layout_is_deterministic() {
        let data = symbol_layer_with_points(&[
            ("Alpha", Point2f::new(700.0, 700.0)),
            ("Beta", Point2f::new(780.0, 700.0)),
            ("Gamma", Point2f::new(860.0, 700.0)),
            ("Delta", Point2f::new(2000.0, 2000.0)),
        ]);
        let layer = data.layer("place").unwrap();
        let style = style();

        let first = SymbolLayout::new(layer, &style, &TestGlyphs, 1.0).build();
        let second = SymbolLayout::new(layer, &style, &TestGlyphs, 1.0).build();

        assert_eq!(first, second);
    }

    #[test]
    fn unshapeable_text_still_places_icon() {
        // Cyrillic text has no glyphs in the test font.
        let data = symbol_layer_with_points(&[("\u{0416}\u{0416}", Point2f::new(1000.0, 1000.0))]);
        let layer = data.layer("place").unwrap();

        let mut style = style();
        style.icon_image = Some("marker".into());

        let bucket = SymbolLayout::new(layer, &style, &TestGlyphs, 1.0).build();
        assert_eq!(bucket.placed.len(), 1);
        assert!(bucket.text_quads.is_empty());
        assert_eq!(bucket.icon_quads.len(), 1);
    }

    #[test]
    fn feature_without_text_or_icon_is_skipped() {
        let data = symbol_layer_with_points(&[("", Point2f::new(1000.0, 1000.0))]);
        let layer = data.layer("place").unwrap();

        let style = style();
        let bucket = SymbolLayout::new(layer, &style, &TestGlyphs, 1.0).build();
        assert!(bucket.placed.is_empty());
    }

    #[test]
    fn allow_overlap_places_everything() {
        let data = symbol_layer_with_points(&[
            ("First", Point2f::new(1000.0, 1000.0)),
            ("Second", Point2f::new(1002.0, 1000.0)),
        ]);
        let layer = data.layer("place").unwrap();

        let mut style = style();
        style.text_allow_overlap = true;

        let bucket = SymbolLayout::new(layer, &style, &TestGlyphs, 1.0).build();
        assert_eq!(bucket.placed.len(), 2);
    }
}
