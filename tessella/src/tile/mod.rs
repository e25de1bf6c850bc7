//! Tile lifecycle: state machine, cache and pyramid orchestration.

use tokio::task::JoinHandle;
use web_time::SystemTime;

use crate::bucket::{Bucket, BucketMap};
use crate::error::TessellaError;
use crate::tile_id::OverscaledTileId;

pub mod cache;
pub mod cover;
pub mod mask;
pub mod pyramid;

/// Lifecycle state of a tile.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TileState {
    /// The fetch is in flight.
    Loading,
    /// Raw bytes arrived; decode and layout are in flight.
    Loaded,
    /// Buckets are built and ready to draw.
    Parsed,
    /// The payload could not be decoded; terminal for this payload.
    Invalid,
    /// The fetch failed; retryable by re-requesting the tile.
    Errored,
}

/// One map tile: identity, lifecycle state and the buckets built for it.
///
/// A tile never blocks: it changes state only when the pyramid applies
/// fetch/parse completions on the foreground thread. Results of superseded
/// work are recognized by a generation counter and dropped.
#[derive(Debug)]
pub struct Tile {
    id: OverscaledTileId,
    state: TileState,
    generation: u64,
    modified: Option<SystemTime>,
    expires: Option<SystemTime>,
    buckets: BucketMap,
    error: Option<TessellaError>,
    fetch_handle: Option<JoinHandle<()>>,
}

impl Tile {
    /// Creates a tile in the `Loading` state.
    pub fn new(id: OverscaledTileId) -> Self {
        Self {
            id,
            state: TileState::Loading,
            generation: 0,
            modified: None,
            expires: None,
            buckets: BucketMap::new(),
            error: None,
            fetch_handle: None,
        }
    }

    /// Id of the tile.
    pub fn id(&self) -> OverscaledTileId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Generation of the most recent data. Parse results tagged with an
    /// older generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last modification stamp of the fetched payload.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Expiry stamp of the fetched payload.
    pub fn expires(&self) -> Option<SystemTime> {
        self.expires
    }

    /// Error of the last failed fetch or parse.
    pub fn error(&self) -> Option<&TessellaError> {
        self.error.as_ref()
    }

    pub(crate) fn set_fetch_handle(&mut self, handle: JoinHandle<()>) {
        self.fetch_handle = Some(handle);
    }

    /// Accepts fetched payload stamps and moves to `Loaded`.
    ///
    /// Calling this again while a previous parse is outstanding supersedes
    /// it: the returned generation tags the new parse, and the stale result
    /// is dropped when it comes back. Returns the generation for the parse
    /// dispatch.
    pub fn set_data(
        &mut self,
        modified: Option<SystemTime>,
        expires: Option<SystemTime>,
    ) -> u64 {
        self.generation += 1;
        self.state = TileState::Loaded;
        self.modified = modified;
        self.expires = expires;
        self.error = None;
        self.generation
    }

    /// Accepts a failed fetch and moves to `Errored`.
    pub fn set_fetch_error(&mut self, error: TessellaError) {
        self.generation += 1;
        self.state = TileState::Errored;
        self.error = Some(error);
    }

    /// Applies the outcome of a background parse.
    ///
    /// Returns `false` (and changes nothing) if the result belongs to a
    /// superseded generation.
    pub fn apply_parse_result(
        &mut self,
        generation: u64,
        result: Result<BucketMap, TessellaError>,
    ) -> bool {
        if generation != self.generation {
            log::trace!("Dropping stale parse result for tile {}", self.id);
            return false;
        }

        match result {
            Ok(buckets) => {
                self.buckets = buckets;
                self.state = TileState::Parsed;
                self.error = None;
            }
            Err(error) => {
                self.buckets.clear();
                self.state = TileState::Invalid;
                self.error = Some(error);
            }
        }

        true
    }

    /// Bucket of the given style layer. `None` until the tile is `Parsed`.
    pub fn get_bucket(&self, layer: &str) -> Option<&Bucket> {
        if self.state == TileState::Parsed {
            self.buckets.get(layer)
        } else {
            None
        }
    }

    /// All buckets of the tile. Empty until the tile is `Parsed`.
    pub fn buckets(&self) -> &BucketMap {
        &self.buckets
    }

    /// True if the tile has buckets to draw.
    pub fn is_renderable(&self) -> bool {
        self.state == TileState::Parsed
    }

    /// Aborts the in-flight fetch and invalidates any outstanding parse.
    ///
    /// Safe to call in any state; after it returns, no event produced for
    /// the tile before the call can change it.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
        }

        self.generation += 1;
    }
}

impl Drop for Tile {
    fn drop(&mut self) {
        if let Some(handle) = self.fetch_handle.take() {
            handle.abort();
        }
    }
}
