//! Hooks notifying the embedding application about tile changes.

use crate::error::TessellaError;
use crate::tile_id::OverscaledTileId;

/// Receives tile lifecycle notifications.
///
/// Both methods are called from the thread that drives the
/// [`TilePyramid`](crate::tile::pyramid::TilePyramid) event pump, never from
/// a worker.
/// The expected reaction to `on_tile_changed` is scheduling a repaint.
pub trait TileObserver: Send + Sync {
    /// A tile finished parsing and its buckets are ready to draw.
    fn on_tile_changed(&self, id: OverscaledTileId);
    /// A tile failed to load or parse.
    fn on_tile_error(&self, id: OverscaledTileId, error: &TessellaError);
}

/// Observer that ignores all notifications.
pub struct DummyObserver;

impl TileObserver for DummyObserver {
    fn on_tile_changed(&self, _id: OverscaledTileId) {}
    fn on_tile_error(&self, _id: OverscaledTileId, _error: &TessellaError) {}
}
