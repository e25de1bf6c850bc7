//! Anchor sampling along feature geometry.
//!
//! Line labels are repeated along their line at a fixed spacing; each
//! candidate position is an [`Anchor`]. Anchors on sharp bends are rejected
//! up front so shaping and collision work never sees them.

use std::collections::VecDeque;

use tessella_geom::Point2f;

/// A candidate point where a symbol may be centered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Position in tile units.
    pub point: Point2f,
    /// Direction of the line at the anchor, radians.
    pub angle: f32,
    /// Smallest zoom-scale at which the anchor may host a symbol.
    pub scale: f32,
    /// Index of the line segment the anchor lies on, `-1` for point features.
    pub segment: i32,
}

impl Anchor {
    /// Anchor of a point feature.
    pub fn for_point(point: Point2f) -> Self {
        Self {
            point,
            angle: 0.0,
            scale: 1.0,
            segment: -1,
        }
    }
}

/// Inputs of line anchor generation.
#[derive(Debug, Clone, Copy)]
pub struct AnchorParams {
    /// Distance between repeated symbols, in tile units.
    pub spacing: f32,
    /// Maximum summary bend angle under a label, radians.
    pub max_angle: f32,
    /// Length of the shaped label in pixels.
    pub label_length: f32,
    /// Height of one glyph in pixels.
    pub glyph_size: f32,
    /// Tile units per pixel at the tile's own zoom.
    pub box_scale: f32,
    /// How much the tile is magnified relative to its canonical zoom.
    pub overscaling: f32,
    /// Tile extent in tile units.
    pub extent: f32,
    /// Whether the label bends with the line and needs the angle check.
    pub along_line: bool,
}

impl AnchorParams {
    fn angle_window(&self) -> f32 {
        if self.along_line {
            // A glyph fits a corner if the bend stays shallow within about
            // half its size to either side.
            3.0 / 5.0 * self.glyph_size * self.box_scale
        } else {
            0.0
        }
    }

    fn label_length_tu(&self) -> f32 {
        self.label_length * self.box_scale
    }
}

/// Anchors along the line at the requested spacing.
pub fn get_anchors(line: &[Point2f], params: &AnchorParams) -> Vec<Anchor> {
    if line.len() < 2 {
        return Vec::new();
    }

    let label_length = params.label_length_tu();
    let angle_window = params.angle_window();

    // Long labels relative to the spacing would overlap their own repeats;
    // widen the spacing to keep a quarter of it free between them.
    let mut spacing = params.spacing;
    if spacing - label_length < spacing / 4.0 {
        spacing = label_length + spacing / 4.0;
    }

    let continued = is_line_continued(line, params.extent);
    let offset = if continued {
        (spacing / 2.0 * params.overscaling) % spacing
    } else {
        // Offsetting by half the label plus a fixed extra keeps anchor
        // positions aligned between a tile and its overscaled copies.
        let fixed_extra = params.glyph_size * 2.0;
        ((label_length / 2.0 + fixed_extra * params.box_scale) * params.overscaling) % spacing
    };

    resample(
        line,
        offset,
        spacing,
        angle_window,
        params.max_angle,
        label_length,
        continued,
        false,
        params.extent,
    )
}

/// The single anchor at the middle of the line, for one-label-per-line
/// placement. `None` if the middle fails the bend check.
pub fn get_center_anchor(line: &[Point2f], params: &AnchorParams) -> Option<Anchor> {
    if line.len() < 2 {
        return None;
    }

    let label_length = params.label_length_tu();
    let angle_window = params.angle_window();
    let center = line_length(line) / 2.0;

    let mut covered = 0.0;
    for i in 0..line.len() - 1 {
        let a = line[i];
        let b = line[i + 1];
        let segment_length = distance(a, b);
        if covered + segment_length <= center || segment_length == 0.0 {
            covered += segment_length;
            continue;
        }

        let t = (center - covered) / segment_length;
        let anchor = Anchor {
            point: Point2f::new(
                lerp(a.x, b.x, t).round(),
                lerp(a.y, b.y, t).round(),
            ),
            angle: (b.y - a.y).atan2(b.x - a.x),
            scale: 1.0,
            segment: i as i32,
        };

        if angle_window == 0.0
            || check_max_angle(line, &anchor, label_length, angle_window, params.max_angle)
        {
            return Some(anchor);
        }

        return None;
    }

    None
}

#[allow(clippy::too_many_arguments)]
fn resample(
    line: &[Point2f],
    offset: f32,
    spacing: f32,
    angle_window: f32,
    max_angle: f32,
    label_length: f32,
    continued: bool,
    place_at_middle: bool,
    extent: f32,
) -> Vec<Anchor> {
    let half_label = label_length / 2.0;
    let total_length = line_length(line);

    let mut anchors = Vec::new();
    let mut traversed = 0.0;
    let mut marked = offset - spacing;

    for i in 0..line.len() - 1 {
        let a = line[i];
        let b = line[i + 1];
        let segment_length = distance(a, b);
        if segment_length == 0.0 || !segment_length.is_finite() {
            continue;
        }

        let angle = (b.y - a.y).atan2(b.x - a.x);

        while marked + spacing < traversed + segment_length {
            marked += spacing;

            let t = (marked - traversed) / segment_length;
            let x = lerp(a.x, b.x, t);
            let y = lerp(a.y, b.y, t);

            // The label must fit between the line ends and the anchor must
            // stay inside the tile.
            if x >= 0.0
                && x < extent
                && y >= 0.0
                && y < extent
                && marked - half_label >= 0.0
                && marked + half_label <= total_length
            {
                let anchor = Anchor {
                    point: Point2f::new(x.round(), y.round()),
                    angle,
                    scale: 1.0,
                    segment: i as i32,
                };

                if angle_window == 0.0
                    || check_max_angle(line, &anchor, label_length, angle_window, max_angle)
                {
                    anchors.push(anchor);
                }
            }
        }

        traversed += segment_length;
    }

    if !place_at_middle && anchors.is_empty() && !continued {
        // No anchor fit at the requested spacing. Short lines get a second
        // chance with a single anchor at their middle.
        anchors = resample(
            line,
            traversed / 2.0,
            spacing,
            angle_window,
            max_angle,
            label_length,
            continued,
            true,
            extent,
        );
    }

    anchors
}

/// True if the summary bend of the line within the label's footprint around
/// the anchor stays below `max_angle`.
pub(crate) fn check_max_angle(
    line: &[Point2f],
    anchor: &Anchor,
    label_length: f32,
    window: f32,
    max_angle: f32,
) -> bool {
    if anchor.segment < 0 {
        return true;
    }

    // Walk backwards to the first segment the label covers.
    let mut index = anchor.segment + 1;
    let mut p = anchor.point;
    let mut anchor_distance = 0.0;
    while anchor_distance > -label_length / 2.0 {
        index -= 1;
        if index < 0 {
            // The label sticks out before the beginning of the line.
            return false;
        }
        anchor_distance -= distance(line[index as usize], p);
        p = line[index as usize];
    }

    anchor_distance += distance(line[index as usize], line[index as usize + 1]);
    index += 1;

    // Walk forward summing up bend angles within a sliding window.
    let mut corners: VecDeque<(f32, f32)> = VecDeque::new();
    let mut window_angle = 0.0;
    while anchor_distance < label_length / 2.0 {
        let i = index as usize;
        if i + 1 >= line.len() {
            // The label sticks out past the end of the line.
            return false;
        }

        let prev = line[i - 1];
        let current = line[i];
        let next = line[i + 1];

        let delta = angle_to(prev, current) - angle_to(current, next);
        let delta = ((delta + 3.0 * std::f32::consts::PI) % (2.0 * std::f32::consts::PI)
            - std::f32::consts::PI)
            .abs();

        corners.push_back((anchor_distance, delta));
        window_angle += delta;

        while let Some(&(corner_distance, corner_angle)) = corners.front() {
            if anchor_distance - corner_distance > window {
                window_angle -= corner_angle;
                corners.pop_front();
            } else {
                break;
            }
        }

        if window_angle > max_angle {
            return false;
        }

        anchor_distance += distance(current, next);
        index += 1;
    }

    true
}

fn is_line_continued(line: &[Point2f], extent: f32) -> bool {
    let first = line[0];
    first.x == 0.0 || first.x == extent || first.y == 0.0 || first.y == extent
}

fn line_length(line: &[Point2f]) -> f32 {
    line.windows(2).map(|w| distance(w[0], w[1])).sum()
}

fn distance(a: Point2f, b: Point2f) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

fn angle_to(a: Point2f, b: Point2f) -> f32 {
    (a.y - b.y).atan2(a.x - b.x)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(spacing: f32, label_length: f32) -> AnchorParams {
        AnchorParams {
            spacing,
            max_angle: std::f32::consts::PI / 4.0,
            label_length,
            glyph_size: 24.0,
            box_scale: 1.0,
            overscaling: 1.0,
            extent: 4096.0,
            along_line: false,
        }
    }

    #[test]
    fn straight_line_anchor_count() {
        let line: Vec<_> = vec![Point2f::new(100.0, 100.0), Point2f::new(3100.0, 100.0)];
        let spacing = 300.0;
        let anchors = get_anchors(&line, &params(spacing, 0.0));

        let expected = (3000.0 / spacing) as isize;
        let count = anchors.len() as isize;
        assert!(
            (count - expected).abs() <= 1,
            "expected about {expected} anchors, got {count}"
        );

        for anchor in &anchors {
            assert_eq!(anchor.point.y, 100.0);
            assert_eq!(anchor.angle, 0.0);
            assert_eq!(anchor.segment, 0);
        }
    }

    #[test]
    fn degenerate_line_produces_no_anchors() {
        assert!(get_anchors(&[], &params(100.0, 0.0)).is_empty());
        assert!(get_anchors(&[Point2f::new(5.0, 5.0)], &params(100.0, 0.0)).is_empty());

        let zero_length = vec![Point2f::new(5.0, 5.0), Point2f::new(5.0, 5.0)];
        assert!(get_anchors(&zero_length, &params(100.0, 0.0)).is_empty());
    }

    #[test]
    fn short_line_falls_back_to_middle_anchor() {
        let line = vec![Point2f::new(1000.0, 1000.0), Point2f::new(1080.0, 1000.0)];
        let anchors = get_anchors(&line, &params(1000.0, 40.0));
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].point, Point2f::new(1040.0, 1000.0));
    }

    #[test]
    fn sharp_bend_rejects_anchor() {
        // A hairpin: the label would have to bend by ~180 degrees.
        let line = vec![
            Point2f::new(1000.0, 1000.0),
            Point2f::new(1100.0, 1000.0),
            Point2f::new(1000.0, 1010.0),
        ];
        let mut p = params(100.0, 80.0);
        p.along_line = true;

        let anchors = get_anchors(&line, &p);
        assert!(anchors.is_empty());
    }

    #[test]
    fn gentle_line_passes_angle_check() {
        let line = vec![
            Point2f::new(500.0, 1000.0),
            Point2f::new(1500.0, 1020.0),
            Point2f::new(2500.0, 1000.0),
        ];
        let mut p = params(400.0, 80.0);
        p.along_line = true;

        assert!(!get_anchors(&line, &p).is_empty());
    }

    #[test]
    fn center_anchor_sits_in_the_middle() {
        let line = vec![Point2f::new(0.0, 500.0), Point2f::new(2000.0, 500.0)];
        let anchor = get_center_anchor(&line, &params(100.0, 50.0)).unwrap();
        assert_eq!(anchor.point, Point2f::new(1000.0, 500.0));
        assert_eq!(anchor.segment, 0);
    }
}
