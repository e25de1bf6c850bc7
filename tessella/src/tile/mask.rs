//! Stencil masks for overlapping parent/child tiles.
//!
//! When a tile renders together with renderable descendants, the areas the
//! descendants cover must be clipped out of the parent so nothing is drawn
//! twice. A tile's mask is the set of its sub-tiles that it *should* draw,
//! expressed as tile ids relative to the tile itself (`0/0/0` = the whole
//! tile).

use std::collections::{BTreeSet, HashMap};

use crate::tile_id::{CanonicalTileId, OverscaledTileId};

/// Sub-tiles a tile draws, relative to the tile itself.
pub type TileMask = BTreeSet<CanonicalTileId>;

/// Masks deeper than this would clip at sub-pixel sizes; coarser is enough.
const MAX_MASK_DEPTH: u8 = 5;

/// Computes the mask of every renderable tile against the others.
pub fn compute_tile_masks(
    renderables: &[OverscaledTileId],
) -> HashMap<OverscaledTileId, TileMask, ahash::RandomState> {
    let mut sorted: Vec<OverscaledTileId> = renderables.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut masks = HashMap::default();
    for tile in &sorted {
        let descendants: Vec<CanonicalTileId> = sorted
            .iter()
            .filter(|other| {
                other.canonical.z > tile.canonical.z && other.canonical.is_child_of(&tile.canonical)
            })
            .map(|other| relative_id(&other.canonical, &tile.canonical))
            .collect();

        let mut mask = TileMask::new();
        if descendants.is_empty() {
            mask.insert(CanonicalTileId::new(0, 0, 0));
        } else {
            compute_mask(&mut mask, CanonicalTileId::new(0, 0, 0), &descendants);
        }

        masks.insert(*tile, mask);
    }

    masks
}

fn relative_id(id: &CanonicalTileId, root: &CanonicalTileId) -> CanonicalTileId {
    let depth = id.z - root.z;
    CanonicalTileId::new(
        depth,
        id.x - (root.x << depth),
        id.y - (root.y << depth),
    )
}

fn compute_mask(mask: &mut TileMask, rel: CanonicalTileId, descendants: &[CanonicalTileId]) {
    for child in rel.children() {
        if descendants.contains(&child) {
            // A renderable descendant draws this area itself.
            continue;
        }

        let has_deeper = descendants.iter().any(|d| d.is_child_of(&child));
        if has_deeper && child.z < MAX_MASK_DEPTH {
            compute_mask(mask, child, descendants);
        } else {
            mask.insert(child);
        }
    }
}
