//! Evaluated style parameters consumed by tile layout.
//!
//! Style sheets, cascading and expression evaluation happen outside of this
//! crate. What arrives here is the already-evaluated set of numeric, string
//! and color parameters for the zoom level a tile is laid out at.

use serde::{Deserialize, Serialize};

/// Color representation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl Color {
    /// Transparent color: `#00000000`
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// Black color: `#000000FF`
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    /// White color: `#FFFFFFFF`
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    /// Gray color: `#AAAAAAFF`
    pub const GRAY: Color = Color::rgba(170, 170, 170, 255);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Converts the color into u8 array (RGBA).
    pub fn to_u8_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Converts the color into f32 array as used by GPU vertex data.
    pub fn to_f32_array(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

/// A style value cross-fading between two zoom-stop values.
///
/// `t` is the progress of the transition; `from_scale`/`to_scale` are the
/// zoom-derived scales the two values were evaluated at. Used for pattern
/// and texture crossfades tied to zoom changes.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faded<T> {
    /// Value the transition starts from.
    pub from: T,
    /// Value the transition ends at.
    pub to: T,
    /// Scale at which `from` was evaluated.
    pub from_scale: f32,
    /// Scale at which `to` was evaluated.
    pub to_scale: f32,
    /// Transition progress in `[0, 1]`.
    pub t: f32,
}

impl<T: Clone> Faded<T> {
    /// A non-transitioning value.
    pub fn constant(value: T, scale: f32) -> Self {
        Self {
            from: value.clone(),
            to: value,
            from_scale: scale,
            to_scale: scale,
            t: 1.0,
        }
    }
}

/// Evaluated parameters of a fill layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillStyle {
    /// Fill color.
    pub color: Color,
    /// Name of the fill pattern image, cross-fading between zoom stops.
    pub pattern: Option<Faded<String>>,
}

/// Evaluated parameters of a line layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    /// Stroke color.
    pub color: Color,
    /// Stroke width in tile units.
    pub width: f32,
}

/// Evaluated parameters of a raster layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterStyle {
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
}

/// How symbols are distributed over a feature's geometry.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolPlacement {
    /// One symbol per point of the geometry.
    #[default]
    Point,
    /// Symbols repeated along the line at a fixed spacing.
    Line,
    /// One symbol at the middle of the line.
    LineCenter,
}

/// Justification of multi-line text.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextJustify {
    /// Lines are aligned to the left edge of the block.
    Left,
    /// Lines are centered within the block.
    #[default]
    Center,
    /// Lines are aligned to the right edge of the block.
    Right,
}

/// Position of the text block relative to its anchor point.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAnchor {
    /// Block centered on the anchor.
    #[default]
    Center,
    /// Block to the right of the anchor.
    Left,
    /// Block to the left of the anchor.
    Right,
    /// Block below the anchor.
    Top,
    /// Block above the anchor.
    Bottom,
}

/// Evaluated parameters of a symbol (label/icon) layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStyle {
    /// Name of the feature property holding the label text.
    pub text_field: Option<String>,
    /// Font size in pixels.
    pub text_size: f32,
    /// Maximum width of a text line in ems before wrapping.
    pub text_max_width: f32,
    /// Height of a text line in ems.
    pub text_line_height: f32,
    /// Additional spacing between characters in ems.
    pub text_letter_spacing: f32,
    /// Justification of wrapped lines.
    pub text_justify: TextJustify,
    /// Position of the text relative to the anchor.
    pub text_anchor: TextAnchor,
    /// Maximum summary angle (radians) a line label may bend over.
    pub text_max_angle: f32,
    /// Text color.
    pub text_color: Color,
    /// Name of the icon image, if the layer places icons.
    pub icon_image: Option<String>,
    /// Distance between repeated symbols along a line, in pixels.
    pub symbol_spacing: f32,
    /// How symbols are distributed over the geometry.
    pub symbol_placement: SymbolPlacement,
    /// Extra collision-free space around the symbol, in pixels.
    pub symbol_padding: f32,
    /// If set, text is placed ignoring collisions with other symbols.
    pub text_allow_overlap: bool,
    /// If set, icons are placed ignoring collisions with other symbols.
    pub icon_allow_overlap: bool,
}

impl Default for SymbolStyle {
    fn default() -> Self {
        Self {
            text_field: None,
            text_size: 16.0,
            text_max_width: 10.0,
            text_line_height: 1.2,
            text_letter_spacing: 0.0,
            text_justify: TextJustify::default(),
            text_anchor: TextAnchor::default(),
            text_max_angle: std::f32::consts::PI / 4.0,
            text_color: Color::BLACK,
            icon_image: None,
            symbol_spacing: 250.0,
            symbol_placement: SymbolPlacement::default(),
            symbol_padding: 2.0,
            text_allow_overlap: false,
            icon_allow_overlap: false,
        }
    }
}

/// Evaluated style of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerStyle {
    /// Polygon fill layer.
    Fill(FillStyle),
    /// Line layer.
    Line(LineStyle),
    /// Label/icon layer.
    Symbol(SymbolStyle),
    /// Raster image layer.
    Raster(RasterStyle),
}

/// One style layer binding a source tile layer to evaluated parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleLayer {
    /// Unique name of the style layer; buckets are keyed by it.
    pub name: String,
    /// Name of the tile layer supplying the geometry.
    pub source_layer: String,
    /// Minimum zoom the layer is drawn at.
    pub min_zoom: u8,
    /// Maximum zoom the layer is drawn at.
    pub max_zoom: u8,
    /// Evaluated parameters.
    pub style: LayerStyle,
}

impl StyleLayer {
    /// True if the layer is drawn at the given zoom.
    pub fn is_visible_at(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom && zoom <= self.max_zoom
    }
}

/// Evaluated style of the whole map, passed down through layout calls.
///
/// The context is built by the orchestrator and owned by it; layout never
/// reaches for any process-wide style state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleContext {
    layers: Vec<StyleLayer>,
}

impl StyleContext {
    /// Creates a context from layers in their draw order.
    pub fn new(layers: Vec<StyleLayer>) -> Self {
        Self { layers }
    }

    /// Layers in draw order.
    pub fn layers(&self) -> &[StyleLayer] {
        &self.layers
    }

    /// Layer by name.
    pub fn layer(&self, name: &str) -> Option<&StyleLayer> {
        self.layers.iter().find(|l| l.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_zoom_visibility() {
        let layer = StyleLayer {
            name: "labels".into(),
            source_layer: "place".into(),
            min_zoom: 4,
            max_zoom: 14,
            style: LayerStyle::Symbol(SymbolStyle::default()),
        };

        assert!(!layer.is_visible_at(3));
        assert!(layer.is_visible_at(4));
        assert!(layer.is_visible_at(14));
        assert!(!layer.is_visible_at(15));
    }

    #[test]
    fn constant_faded_value_is_finished() {
        let faded = Faded::constant("stripes".to_string(), 2.0);
        assert_eq!(faded.from, faded.to);
        assert_eq!(faded.t, 1.0);
    }
}
