//! Identifiers of tiles in the spherical mercator tile pyramid.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Position of a tile in the standard tile pyramid.
///
/// The invariant `x < 2^z && y < 2^z` holds for every constructed value.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalTileId {
    /// Zoom level.
    pub z: u8,
    /// X index.
    pub x: u32,
    /// Y index.
    pub y: u32,
}

impl CanonicalTileId {
    /// Creates a new id.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` is outside the `2^z` grid.
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        assert!(
            z >= 32 || (u64::from(x) < 1u64 << z && u64::from(y) < 1u64 << z),
            "tile index {x}/{y} outside of the zoom {z} grid"
        );
        Self { z, x, y }
    }

    /// Id of the containing tile one zoom level up. `None` for the root tile.
    pub fn parent(&self) -> Option<Self> {
        if self.z == 0 {
            None
        } else {
            Some(Self {
                z: self.z - 1,
                x: self.x >> 1,
                y: self.y >> 1,
            })
        }
    }

    /// Ids of the four tiles this tile splits into one zoom level down.
    pub fn children(&self) -> [Self; 4] {
        let z = self.z + 1;
        let x = self.x << 1;
        let y = self.y << 1;
        [
            Self { z, x, y },
            Self { z, x: x + 1, y },
            Self { z, x, y: y + 1 },
            Self { z, x: x + 1, y: y + 1 },
        ]
    }

    /// The ancestor of this tile at zoom `z`, or the tile itself if `z == self.z`.
    ///
    /// # Panics
    ///
    /// Panics if `z > self.z`.
    pub fn scaled_to(&self, z: u8) -> Self {
        assert!(z <= self.z, "cannot scale {self} up to zoom {z}");
        Self {
            z,
            x: self.x >> (self.z - z),
            y: self.y >> (self.z - z),
        }
    }

    /// True if `self` lies strictly inside `other`'s footprint at a higher zoom.
    pub fn is_child_of(&self, other: &Self) -> bool {
        self.z > other.z && self.scaled_to(other.z) == *other
    }
}

impl Display for CanonicalTileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Canonical tile id plus a world-copy offset used when the map is panned
/// over the antimeridian. Two ids with the same canonical part but different
/// `wrap` values address different screen copies of the same tile data.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnwrappedTileId {
    /// Index of the world copy, `0` for the primary world.
    pub wrap: i32,
    /// Position in the pyramid.
    pub canonical: CanonicalTileId,
}

impl UnwrappedTileId {
    /// Creates a new id.
    pub fn new(wrap: i32, canonical: CanonicalTileId) -> Self {
        Self { wrap, canonical }
    }
}

impl Display for UnwrappedTileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.canonical, self.wrap)
    }
}

/// Identifies a tile requested at a zoom level that may exceed the zoom of
/// its canonical data: the same canonical tile is reused, over-scaled, for
/// every `overscaled_z` above the source maximum.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct OverscaledTileId {
    /// Requested zoom level, `>= canonical.z`.
    pub overscaled_z: u8,
    /// Canonical tile holding the data.
    pub canonical: CanonicalTileId,
}

impl OverscaledTileId {
    /// Creates a new id.
    ///
    /// # Panics
    ///
    /// Panics if `overscaled_z < canonical.z`.
    pub fn new(overscaled_z: u8, canonical: CanonicalTileId) -> Self {
        assert!(
            overscaled_z >= canonical.z,
            "overscaled zoom {overscaled_z} below canonical zoom of {canonical}"
        );
        Self {
            overscaled_z,
            canonical,
        }
    }

    /// Id with no overscaling.
    pub fn from_canonical(canonical: CanonicalTileId) -> Self {
        Self {
            overscaled_z: canonical.z,
            canonical,
        }
    }

    /// True if the requested zoom exceeds the canonical zoom.
    pub fn is_overscaled(&self) -> bool {
        self.overscaled_z != self.canonical.z
    }

    /// How many times the canonical tile is magnified at the requested zoom.
    pub fn overscale_factor(&self) -> u32 {
        1 << (self.overscaled_z - self.canonical.z)
    }

    /// Id of this tile rescaled to the given zoom: an ancestor when scaling
    /// down, the same canonical tile overscaled when scaling up.
    pub fn scaled_to(&self, z: u8) -> Self {
        if z >= self.canonical.z {
            Self {
                overscaled_z: z,
                canonical: self.canonical,
            }
        } else {
            Self {
                overscaled_z: z,
                canonical: self.canonical.scaled_to(z),
            }
        }
    }

    /// True if `self` renders strictly inside `other`'s footprint.
    pub fn is_child_of(&self, other: &Self) -> bool {
        self.overscaled_z > other.overscaled_z && self.scaled_to(other.overscaled_z) == *other
    }

    /// Pairs the id with a world-copy offset.
    pub fn unwrapped(&self, wrap: i32) -> UnwrappedTileId {
        UnwrappedTileId::new(wrap, self.canonical)
    }
}

impl Display for OverscaledTileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_overscaled() {
            write!(f, "{} (=> {})", self.canonical, self.overscaled_z)
        } else {
            self.canonical.fmt(f)
        }
    }
}

impl PartialOrd for OverscaledTileId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OverscaledTileId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.overscaled_z
            .cmp(&other.overscaled_z)
            .then(self.canonical.cmp(&other.canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_bounds_are_checked() {
        let id = CanonicalTileId::new(2, 3, 0);
        assert_eq!(id.to_string(), "2/3/0");

        let result = std::panic::catch_unwind(|| CanonicalTileId::new(2, 4, 0));
        assert!(result.is_err());
    }

    #[test]
    fn parent_and_children_are_inverse() {
        let id = CanonicalTileId::new(5, 17, 11);
        for child in id.children() {
            assert_eq!(child.parent(), Some(id));
            assert!(child.is_child_of(&id));
        }

        assert_eq!(CanonicalTileId::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn scaled_to_returns_ancestor() {
        let id = CanonicalTileId::new(6, 40, 33);
        assert_eq!(id.scaled_to(6), id);
        assert_eq!(id.scaled_to(4), CanonicalTileId::new(4, 10, 8));
        assert_eq!(id.scaled_to(0), CanonicalTileId::new(0, 0, 0));
    }

    #[test]
    fn overscaled_invariant_is_enforced() {
        let canonical = CanonicalTileId::new(14, 100, 200);
        let id = OverscaledTileId::new(16, canonical);
        assert!(id.is_overscaled());
        assert_eq!(id.overscale_factor(), 4);

        let result = std::panic::catch_unwind(|| OverscaledTileId::new(13, canonical));
        assert!(result.is_err());
    }

    #[test]
    fn overscaled_scaled_to_keeps_canonical_above_native_zoom() {
        let id = OverscaledTileId::from_canonical(CanonicalTileId::new(14, 3, 5));
        let overscaled = id.scaled_to(16);
        assert_eq!(overscaled.canonical, id.canonical);
        assert_eq!(overscaled.overscaled_z, 16);

        let parent = id.scaled_to(13);
        assert_eq!(parent.canonical, CanonicalTileId::new(13, 1, 2));
        assert!(id.is_child_of(&parent));
        assert!(overscaled.is_child_of(&id));
    }
}
