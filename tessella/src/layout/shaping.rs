//! Text and icon shaping.
//!
//! Shaping computes the pixel-space layout of a label's glyphs relative to
//! its anchor: advances, line wrapping, justification and block alignment.
//! Glyph rasterization is not this crate's concern; metrics come from a
//! [`GlyphMetricsProvider`] implemented by the embedder.

use thiserror::Error;

use crate::style::{SymbolStyle, TextAnchor, TextJustify};

/// Font size the provider reports metrics at; all other sizes scale from it.
pub const BASE_GLYPH_SIZE: f32 = 24.0;

/// Metrics of a single glyph at [`BASE_GLYPH_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphMetrics {
    /// Ink width in pixels.
    pub width: f32,
    /// Ink height in pixels.
    pub height: f32,
    /// Horizontal offset of the ink from the pen position.
    pub left: f32,
    /// Vertical offset of the ink top above the baseline.
    pub top: f32,
    /// Pen advance in pixels.
    pub advance: f32,
}

/// Supplies glyph and icon metrics to the layout engine.
pub trait GlyphMetricsProvider: Send + Sync {
    /// Metrics of the glyph rendering `c`, or `None` if no font covers it.
    fn glyph_metrics(&self, c: char) -> Option<GlyphMetrics>;
    /// Pixel size of the named icon image, or `None` if unknown.
    fn icon_size(&self, name: &str) -> Option<(f32, f32)>;
}

/// Error shaping a label.
#[derive(Debug, Clone, Error)]
pub enum ShapingError {
    /// No glyph of the label could be resolved to metrics.
    #[error("no glyphs available for label")]
    NoGlyphs,
}

/// One glyph of a shaped label, positioned relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedGlyph {
    /// The shaped character.
    pub glyph: char,
    /// Pen x offset from the anchor, pixels.
    pub x: f32,
    /// Baseline y offset from the anchor, pixels.
    pub y: f32,
    /// Metrics of the glyph scaled to the requested font size.
    pub metrics: GlyphMetrics,
}

/// Pixel-space layout of a label relative to its anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct Shaping {
    /// Glyphs in draw order.
    pub glyphs: Vec<PositionedGlyph>,
    /// Left edge of the block, pixels from the anchor.
    pub left: f32,
    /// Right edge of the block.
    pub right: f32,
    /// Top edge of the block.
    pub top: f32,
    /// Bottom edge of the block.
    pub bottom: f32,
}

impl Shaping {
    /// Width of the shaped block in pixels.
    pub fn width(&self) -> f32 {
        self.right - self.left
    }
}

/// Pixel-space footprint of an icon relative to its anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedIcon {
    /// Name of the icon image.
    pub image: String,
    /// Left edge, pixels from the anchor.
    pub left: f32,
    /// Right edge.
    pub right: f32,
    /// Top edge.
    pub top: f32,
    /// Bottom edge.
    pub bottom: f32,
}

/// Shapes a label against the style's text parameters.
///
/// Characters without metrics are dropped; if every character is dropped the
/// result is [`ShapingError::NoGlyphs`] and the caller proceeds without text.
pub fn shape_text(
    text: &str,
    provider: &dyn GlyphMetricsProvider,
    style: &SymbolStyle,
) -> Result<Shaping, ShapingError> {
    let font_scale = style.text_size / BASE_GLYPH_SIZE;
    let line_height = style.text_line_height * style.text_size;
    let letter_spacing = style.text_letter_spacing * style.text_size;
    let max_width = style.text_max_width * style.text_size;

    let mut glyphs: Vec<PositionedGlyph> = Vec::new();
    let mut line_starts: Vec<usize> = vec![0];
    let mut x = 0.0;
    let mut y = 0.0;
    let mut last_break: Option<usize> = None;

    for c in text.chars() {
        if c == '\n' {
            x = 0.0;
            y += line_height;
            line_starts.push(glyphs.len());
            last_break = None;
            continue;
        }

        let Some(base) = provider.glyph_metrics(c) else {
            continue;
        };

        let metrics = GlyphMetrics {
            width: base.width * font_scale,
            height: base.height * font_scale,
            left: base.left * font_scale,
            top: base.top * font_scale,
            advance: base.advance * font_scale,
        };

        glyphs.push(PositionedGlyph {
            glyph: c,
            x,
            y,
            metrics,
        });
        x += metrics.advance + letter_spacing;

        if c == ' ' {
            last_break = Some(glyphs.len() - 1);
        }

        if max_width > 0.0 && x > max_width {
            if let Some(break_at) = last_break.take() {
                wrap_line(
                    &mut glyphs,
                    &mut line_starts,
                    break_at,
                    &mut x,
                    &mut y,
                    line_height,
                    letter_spacing,
                );
            }
        }
    }

    // Trailing spaces carry no ink and would skew justification.
    while glyphs.last().is_some_and(|g| g.glyph == ' ') {
        glyphs.pop();
    }
    line_starts.retain(|&start| start < glyphs.len() || start == 0);

    if glyphs.is_empty() {
        return Err(ShapingError::NoGlyphs);
    }

    justify_lines(&mut glyphs, &line_starts, style.text_justify);
    let (left, right, top, bottom) = align_block(&mut glyphs, line_height, style.text_anchor);

    Ok(Shaping {
        glyphs,
        left,
        right,
        top,
        bottom,
    })
}

/// Shapes an icon centered on the anchor.
pub fn shape_icon(
    name: &str,
    provider: &dyn GlyphMetricsProvider,
) -> Option<ShapedIcon> {
    let (width, height) = provider.icon_size(name)?;
    Some(ShapedIcon {
        image: name.to_string(),
        left: -width / 2.0,
        right: width / 2.0,
        top: -height / 2.0,
        bottom: height / 2.0,
    })
}

fn wrap_line(
    glyphs: &mut [PositionedGlyph],
    line_starts: &mut Vec<usize>,
    break_at: usize,
    x: &mut f32,
    y: &mut f32,
    line_height: f32,
    letter_spacing: f32,
) {
    *y += line_height;
    line_starts.push(break_at + 1);

    // Move everything after the breaking space down to the new line.
    let mut new_x = 0.0;
    for glyph in &mut glyphs[break_at + 1..] {
        glyph.x = new_x;
        glyph.y = *y;
        new_x += glyph.metrics.advance + letter_spacing;
    }

    *x = new_x;
}

fn justify_lines(glyphs: &mut [PositionedGlyph], line_starts: &[usize], justify: TextJustify) {
    if matches!(justify, TextJustify::Left) {
        return;
    }

    let widths: Vec<f32> = (0..line_starts.len())
        .map(|i| {
            let start = line_starts[i];
            let end = line_starts.get(i + 1).copied().unwrap_or(glyphs.len());
            line_width(glyphs, start, end)
        })
        .collect();
    let block_width = widths.iter().copied().fold(0.0, f32::max);

    for (i, &start) in line_starts.iter().enumerate() {
        let end = line_starts.get(i + 1).copied().unwrap_or(glyphs.len());
        if start >= end {
            continue;
        }

        let shift = match justify {
            TextJustify::Left => 0.0,
            TextJustify::Center => (block_width - widths[i]) / 2.0,
            TextJustify::Right => block_width - widths[i],
        };

        for glyph in &mut glyphs[start..end] {
            glyph.x += shift;
        }
    }
}

fn line_width(glyphs: &[PositionedGlyph], start: usize, end: usize) -> f32 {
    if start >= end {
        return 0.0;
    }

    glyphs[end - 1].x + glyphs[end - 1].metrics.advance - glyphs[start].x
}

fn align_block(
    glyphs: &mut [PositionedGlyph],
    line_height: f32,
    anchor: TextAnchor,
) -> (f32, f32, f32, f32) {
    let mut min_x = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for glyph in glyphs.iter() {
        min_x = min_x.min(glyph.x + glyph.metrics.left);
        max_x = max_x.max(glyph.x + glyph.metrics.left + glyph.metrics.width);
        min_y = min_y.min(glyph.y - glyph.metrics.top);
        max_y = max_y.max(glyph.y - glyph.metrics.top + line_height);
    }

    let (dx, dy) = match anchor {
        TextAnchor::Center => (-(min_x + max_x) / 2.0, -(min_y + max_y) / 2.0),
        TextAnchor::Left => (-min_x, -(min_y + max_y) / 2.0),
        TextAnchor::Right => (-max_x, -(min_y + max_y) / 2.0),
        TextAnchor::Top => (-(min_x + max_x) / 2.0, -min_y),
        TextAnchor::Bottom => (-(min_x + max_x) / 2.0, -max_y),
    };

    for glyph in glyphs.iter_mut() {
        glyph.x += dx;
        glyph.y += dy;
    }

    (min_x + dx, max_x + dx, min_y + dy, max_y + dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestGlyphs;

    fn style() -> SymbolStyle {
        SymbolStyle {
            text_size: 24.0,
            text_max_width: 0.0,
            ..SymbolStyle::default()
        }
    }

    #[test]
    fn shapes_single_line() {
        let shaping = shape_text("abc", &TestGlyphs, &style()).unwrap();
        assert_eq!(shaping.glyphs.len(), 3);
        // Two full 12px advances plus the last glyph's 10px ink.
        assert!((shaping.width() - 34.0).abs() < 0.5);
        let xs: Vec<f32> = shaping.glyphs.iter().map(|g| g.x).collect();
        assert!(xs.windows(2).all(|w| w[1] - w[0] == 12.0));
    }

    #[test]
    fn wraps_at_spaces_beyond_max_width() {
        let mut style = style();
        // 12px glyphs, 2em max width = 48px: "aaa bbb" must wrap.
        style.text_max_width = 2.0;

        let shaping = shape_text("aaa bbb", &TestGlyphs, &style).unwrap();
        let first_line_y = shaping.glyphs[0].y;
        let last = shaping.glyphs.last().unwrap();
        assert!(last.y > first_line_y);
        assert_eq!(last.glyph, 'b');

        let rows: std::collections::BTreeSet<i32> =
            shaping.glyphs.iter().map(|g| g.y as i32).collect();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn unknown_glyphs_are_dropped() {
        // The test font only covers ASCII; an all-unknown label fails.
        let result = shape_text("\u{0416}\u{0417}", &TestGlyphs, &style());
        assert!(result.is_err());

        let mixed = shape_text("a\u{0416}b", &TestGlyphs, &style()).unwrap();
        assert_eq!(mixed.glyphs.len(), 2);
    }

    #[test]
    fn center_anchor_centers_the_block() {
        let shaping = shape_text("aa", &TestGlyphs, &style()).unwrap();
        assert!((shaping.left + shaping.right).abs() < 0.5);
        assert!((shaping.top + shaping.bottom).abs() < 0.5);
    }

    #[test]
    fn shaping_is_deterministic() {
        let a = shape_text("Main Street", &TestGlyphs, &style()).unwrap();
        let b = shape_text("Main Street", &TestGlyphs, &style()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn icon_is_centered() {
        let icon = shape_icon("marker", &TestGlyphs).unwrap();
        assert_eq!(icon.left, -icon.right);
        assert_eq!(icon.top, -icon.bottom);
        assert!(shape_icon("missing", &TestGlyphs).is_none());
    }
}
