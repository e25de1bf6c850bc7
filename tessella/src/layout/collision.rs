//! Collision detection between candidate symbol placements.
//!
//! One [`CollisionIndex`] instance lives for a single layout pass over one
//! tile. Boxes are committed in priority order and never change afterwards;
//! the commit order is the only tie-break between equally scored candidates.
//!
//! All box extents are tile units at zoom-scale 1. At scale `s` a box covers
//! `anchor + extent / s`, so growing the scale shrinks every footprint and a
//! placement that is collision-free at some scale stays free above it.

use rstar::{RTree, RTreeObject, AABB};
use tessella_geom::Point2f;

/// Footprint a placed glyph or icon occupies, relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBox {
    /// Anchor position in tile units.
    pub anchor: Point2f,
    /// Left extent from the anchor at scale 1.
    pub x1: f32,
    /// Top extent from the anchor at scale 1.
    pub y1: f32,
    /// Right extent from the anchor at scale 1.
    pub x2: f32,
    /// Bottom extent from the anchor at scale 1.
    pub y2: f32,
    /// Smallest scale the box is displayed at.
    pub min_scale: f32,
    /// Largest scale the box is displayed at.
    pub max_scale: f32,
}

impl CollisionBox {
    fn footprint(&self, scale: f32, padding: f32) -> AABB<[f32; 2]> {
        let scale = scale.max(MIN_ENVELOPE_SCALE);
        AABB::from_corners(
            [
                self.anchor.x + (self.x1 - padding) / scale,
                self.anchor.y + (self.y1 - padding) / scale,
            ],
            [
                self.anchor.x + (self.x2 + padding) / scale,
                self.anchor.y + (self.y2 + padding) / scale,
            ],
        )
    }
}

// Floor for envelope computations so a zero or denormal scale cannot blow
// the broad phase up to the whole tile.
const MIN_ENVELOPE_SCALE: f32 = 0.25;

#[derive(Debug)]
struct CommittedBox {
    bounds: CollisionBox,
    envelope: AABB<[f32; 2]>,
}

impl RTreeObject for CommittedBox {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index of already-committed symbol footprints.
#[derive(Default)]
pub struct CollisionIndex {
    tree: RTree<CommittedBox>,
    committed: usize,
}

impl CollisionIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed boxes.
    pub fn len(&self) -> usize {
        self.committed
    }

    /// True if nothing has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    /// Smallest scale in `[min_placement_scale, max_placement_scale]` at
    /// which every candidate box clears all committed boxes by `padding`
    /// tile units, or `None` if no scale in the range does.
    ///
    /// Committed boxes only ever raise the answer: each blocker demands the
    /// scale at which the pair separates on at least one axis, and the
    /// maximum of those demands wins. Candidates sharing an anchor with a
    /// committed box can never separate and are rejected outright.
    pub fn placement_scale(
        &self,
        boxes: &[CollisionBox],
        min_placement_scale: f32,
        max_placement_scale: f32,
        padding: f32,
    ) -> Option<f32> {
        let mut scale = min_placement_scale;

        for candidate in boxes {
            let query = candidate.footprint(scale.max(candidate.min_scale), padding);

            for blocker in self.tree.locate_in_envelope_intersecting(&query) {
                let other = &blocker.bounds;

                let dx = candidate.anchor.x - other.anchor.x;
                let dy = candidate.anchor.y - other.anchor.y;
                if dx == 0.0 && dy == 0.0 {
                    // Identical anchors never separate; first committed wins.
                    return None;
                }

                let sx = axis_separation_scale(
                    dx,
                    candidate.x1 - padding,
                    candidate.x2 + padding,
                    other.x1,
                    other.x2,
                );
                let sy = axis_separation_scale(
                    dy,
                    candidate.y1 - padding,
                    candidate.y2 + padding,
                    other.y1,
                    other.y2,
                );

                // Separating on either axis is enough.
                let pair_scale = sx.min(sy);

                if pair_scale > scale && pair_scale < other.max_scale {
                    scale = pair_scale;
                    if scale > max_placement_scale {
                        return None;
                    }
                }
            }
        }

        if scale > max_placement_scale {
            None
        } else {
            Some(scale)
        }
    }

    /// Scale interval over which a placement accepted at `placement_scale`
    /// remains valid: bounded below by the collisions that produced the
    /// accepted scale and above by the candidate's own display range.
    pub fn placement_range(
        &self,
        boxes: &[CollisionBox],
        placement_scale: f32,
    ) -> (f32, f32) {
        let max = boxes
            .iter()
            .map(|b| b.max_scale)
            .fold(f32::INFINITY, f32::min);

        (placement_scale, max.max(placement_scale))
    }

    /// Commits the boxes of an accepted placement. Committed boxes are
    /// immutable for the lifetime of the index.
    pub fn insert(&mut self, boxes: &[CollisionBox], placement_scale: f32) {
        for b in boxes {
            let mut bounds = *b;
            bounds.min_scale = bounds.min_scale.max(placement_scale);
            let envelope = bounds.footprint(bounds.min_scale.min(1.0), 0.0);
            self.tree.insert(CommittedBox { bounds, envelope });
            self.committed += 1;
        }
    }
}

/// Scale above which two boxes no longer overlap along one axis.
///
/// `d` is the anchor distance along the axis, `n1..n2` the candidate extents
/// and `o1..o2` the blocker extents at scale 1. Returns `0` when the boxes
/// can never overlap on the axis and `INFINITY` when they always do.
fn axis_separation_scale(d: f32, n1: f32, n2: f32, o1: f32, o2: f32) -> f32 {
    if d == 0.0 {
        return if n2 >= o1 && o2 >= n1 { f32::INFINITY } else { 0.0 };
    }

    // Scales at which the candidate clears the blocker to one or the other
    // side; the relevant side has the positive value.
    let s1 = (o1 - n2) / d;
    let s2 = (o2 - n1) / d;

    s1.max(s2).max(0.0)
}
