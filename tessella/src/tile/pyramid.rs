//! The tile set orchestrator.
//!
//! [`TilePyramid`] owns every [`Tile`] in a slotmap arena; the live set and
//! the LRU cache hold arena keys only, so a tile always has exactly one
//! owner and moving it between "live" and "cached" is a bookkeeping change.
//! Background fetch and parse work reports back through a mailbox channel;
//! events carry the arena key and the tile generation, and an event whose
//! key or generation no longer matches is dropped without side effects.
//! That is what makes cancellation safe: destroying a tile (or superseding
//! its data) invalidates all of its outstanding work at once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};
use tokio::sync::mpsc;
use web_time::{Duration, Instant};

use crate::bucket::{Bucket, BucketMap};
use crate::error::TessellaError;
use crate::fetch::{FetchError, FileSource, TileResponse};
use crate::layout::placement::{FrameHistory, Placement, SymbolKey};
use crate::observer::TileObserver;
use crate::processor::TileProcessor;
use crate::tile::cache::{TileCache, DEFAULT_CACHE_SIZE};
use crate::tile::cover::{tile_cover, Viewport, ZoomRange};
use crate::tile::mask::{compute_tile_masks, TileMask};
use crate::tile::{Tile, TileState};
use crate::tile_id::OverscaledTileId;

new_key_type! {
    /// Arena key of a tile. Generational: a destroyed tile's key never
    /// resolves again, even if the slot is reused.
    pub struct TileKey;
}

/// Completion message of background tile work.
#[derive(Debug)]
pub enum TileEvent {
    /// A fetch finished.
    FetchComplete {
        /// Tile the fetch belonged to.
        key: TileKey,
        /// Payload or fetch error.
        result: Result<TileResponse, FetchError>,
    },
    /// A background parse finished.
    ParseComplete {
        /// Tile the parse belonged to.
        key: TileKey,
        /// Data generation the parse was started for.
        generation: u64,
        /// Buckets or parse error.
        result: Result<BucketMap, TessellaError>,
    },
}

/// Configures a [`TilePyramid`].
pub struct TilePyramidBuilder {
    cache_size: usize,
    zoom_range: ZoomRange,
    fade_duration: Duration,
}

impl Default for TilePyramidBuilder {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            zoom_range: ZoomRange::default(),
            fade_duration: Duration::from_millis(300),
        }
    }
}

impl TilePyramidBuilder {
    /// Creates a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retired tiles kept for reuse.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Zoom clamping of the tile source.
    pub fn with_zoom_range(mut self, zoom_range: ZoomRange) -> Self {
        self.zoom_range = zoom_range;
        self
    }

    /// Symbol fade duration.
    pub fn with_fade_duration(mut self, duration: Duration) -> Self {
        self.fade_duration = duration;
        self
    }

    /// Builds the pyramid.
    pub fn build(
        self,
        source: Arc<dyn FileSource>,
        processor: Arc<TileProcessor>,
        observer: Arc<dyn TileObserver>,
    ) -> TilePyramid {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        TilePyramid {
            tiles: SlotMap::with_key(),
            live: HashMap::default(),
            cache: TileCache::new(self.cache_size),
            required: Vec::new(),
            renderable: Vec::new(),
            masks: HashMap::default(),
            source,
            processor,
            observer,
            zoom_range: self.zoom_range,
            placement: Placement::new(self.fade_duration),
            frame_history: FrameHistory::new(Duration::from_secs(1)),
            events_tx,
            events_rx,
        }
    }
}

/// Owns the tile set of one source: decides which tiles a viewport needs,
/// drives their lifecycle and selects what is renderable each frame.
pub struct TilePyramid {
    tiles: SlotMap<TileKey, Tile>,
    live: HashMap<OverscaledTileId, TileKey, ahash::RandomState>,
    cache: TileCache<TileKey>,
    required: Vec<OverscaledTileId>,
    renderable: Vec<OverscaledTileId>,
    masks: HashMap<OverscaledTileId, TileMask, ahash::RandomState>,
    source: Arc<dyn FileSource>,
    processor: Arc<TileProcessor>,
    observer: Arc<dyn TileObserver>,
    zoom_range: ZoomRange,
    placement: Placement,
    frame_history: FrameHistory,
    events_tx: mpsc::UnboundedSender<TileEvent>,
    events_rx: mpsc::UnboundedReceiver<TileEvent>,
}

impl TilePyramid {
    /// Reconciles the tile set with a new viewport.
    ///
    /// Required tiles are promoted from the cache or fetched; live tiles
    /// that are no longer required retire into the cache, which may evict
    /// (and thereby destroy) its oldest entries.
    pub fn update(&mut self, viewport: &Viewport) {
        let cover = tile_cover(viewport, &self.zoom_range);
        let required = cover.overscaled_ids();

        for id in &required {
            if self.live.contains_key(id) {
                continue;
            }

            if let Some(key) = self.cache.pop(id) {
                log::trace!("Tile {id} reused from cache");
                self.live.insert(*id, key);
                continue;
            }

            let key = self.tiles.insert(Tile::new(*id));
            self.live.insert(*id, key);
            self.spawn_fetch(*id, key);
        }

        let required_set: HashSet<OverscaledTileId, ahash::RandomState> =
            required.iter().copied().collect();
        let retired: Vec<(OverscaledTileId, TileKey)> = self
            .live
            .iter()
            .filter(|(id, _)| !required_set.contains(*id))
            .map(|(id, key)| (*id, *key))
            .collect();

        for (id, key) in retired {
            self.live.remove(&id);
            if let Some((evicted_id, evicted_key)) = self.cache.add(id, key) {
                log::trace!("Tile {evicted_id} evicted from cache");
                self.destroy(evicted_key);
            }
        }

        self.required = required;
        self.frame_history.record(Instant::now(), viewport.zoom);
        self.refresh_renderables();
    }

    /// Applies all completion events that have arrived so far. Never blocks;
    /// call once per frame from the thread owning the pyramid.
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }
    }

    /// Waits for the next completion event. `None` only if the pyramid has
    /// been torn down.
    pub async fn next_event(&mut self) -> Option<TileEvent> {
        self.events_rx.recv().await
    }

    /// Applies one completion event.
    pub fn apply_event(&mut self, event: TileEvent) {
        match event {
            TileEvent::FetchComplete { key, result } => self.apply_fetch(key, result),
            TileEvent::ParseComplete {
                key,
                generation,
                result,
            } => self.apply_parse(key, generation, result),
        }
    }

    fn apply_fetch(&mut self, key: TileKey, result: Result<TileResponse, FetchError>) {
        let Some(tile) = self.tiles.get_mut(key) else {
            log::trace!("Dropping fetch result of a destroyed tile");
            return;
        };
        let id = tile.id();

        match result {
            Ok(response) => {
                let generation = tile.set_data(response.modified, response.expires);
                self.spawn_parse(id, key, generation, response.data);
            }
            Err(err) => {
                let error = TessellaError::from(err);
                tile.set_fetch_error(error.clone());
                log::debug!("Failed to load tile {id}: {error}");
                self.observer.on_tile_error(id, &error);
            }
        }
    }

    fn apply_parse(
        &mut self,
        key: TileKey,
        generation: u64,
        result: Result<BucketMap, TessellaError>,
    ) {
        let Some(tile) = self.tiles.get_mut(key) else {
            log::trace!("Dropping parse result of a destroyed tile");
            return;
        };
        let id = tile.id();
        let failed = result.is_err();

        if !tile.apply_parse_result(generation, result) {
            return;
        }

        if failed {
            let error = tile
                .error()
                .cloned()
                .unwrap_or_else(|| TessellaError::Generic("tile parse failed".into()));
            self.observer.on_tile_error(id, &error);
        } else {
            self.refresh_renderables();
            self.observer.on_tile_changed(id);
        }
    }

    fn spawn_fetch(&mut self, id: OverscaledTileId, key: TileKey) {
        log::trace!("Requesting tile {id}");
        let source = self.source.clone();
        let tx = self.events_tx.clone();
        let handle = crate::async_runtime::spawn(async move {
            let result = source.load(&id).await;
            let _ = tx.send(TileEvent::FetchComplete { key, result });
        });

        if let Some(tile) = self.tiles.get_mut(key) {
            tile.set_fetch_handle(handle);
        }
    }

    fn spawn_parse(&self, id: OverscaledTileId, key: TileKey, generation: u64, data: bytes::Bytes) {
        let processor = self.processor.clone();
        let tx = self.events_tx.clone();
        crate::async_runtime::spawn(async move {
            let result = processor.process(id, data).await;
            let _ = tx.send(TileEvent::ParseComplete {
                key,
                generation,
                result,
            });
        });
    }

    fn destroy(&mut self, key: TileKey) {
        // Dropping the tile aborts its fetch; a still-running parse will
        // come back with a dead key and be dropped at the mailbox.
        self.tiles.remove(key);
    }

    /// Tile by id, whether live or cached.
    pub fn get_tile(&self, id: &OverscaledTileId) -> Option<&Tile> {
        self.live
            .get(id)
            .or_else(|| self.cache.get(id))
            .and_then(|key| self.tiles.get(*key))
    }

    /// Tiles selected for drawing, sorted parents before children.
    pub fn renderable_tiles(&self) -> &[OverscaledTileId] {
        &self.renderable
    }

    /// Stencil mask of a renderable tile.
    pub fn mask(&self, id: &OverscaledTileId) -> Option<&TileMask> {
        self.masks.get(id)
    }

    /// Ids the last viewport required, whether ready or not.
    pub fn required_tiles(&self) -> &[OverscaledTileId] {
        &self.required
    }

    /// Number of live tiles.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of cached tiles.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Changes the retired-tile cache capacity.
    pub fn set_cache_size(&mut self, size: usize) {
        for (id, key) in self.cache.set_size(size) {
            log::trace!("Tile {id} evicted by cache resize");
            self.destroy(key);
        }
    }

    /// Drops every tile, live and cached. Used on style or source change.
    pub fn clear(&mut self) {
        self.live.clear();
        self.cache.clear();
        // Dropping the arena aborts every in-flight fetch; late events find
        // dead keys and are dropped at the mailbox.
        self.tiles.clear();
        self.required.clear();
        self.renderable.clear();
        self.masks.clear();
    }

    /// Re-runs cross-tile symbol fade tracking against the current
    /// renderable set.
    pub fn run_placement(&mut self, now: Instant) {
        let mut placed: Vec<SymbolKey> = Vec::new();
        for id in &self.renderable {
            let Some(tile) = self
                .live
                .get(id)
                .or_else(|| self.cache.get(id))
                .and_then(|key| self.tiles.get(*key))
            else {
                continue;
            };

            if tile.state() != TileState::Parsed {
                continue;
            }

            for (layer_name, bucket) in tile.buckets() {
                let Bucket::Symbol(symbols) = bucket else {
                    continue;
                };

                for symbol in &symbols.placed {
                    placed.push(symbol_key(id, layer_name, &symbol.text, symbol.anchor));
                }
            }
        }

        self.placement.run_pass(placed, now);
    }

    /// Current opacity of a placed symbol.
    pub fn symbol_opacity(
        &self,
        id: &OverscaledTileId,
        layer: &str,
        text: &str,
        anchor: [f32; 2],
        now: Instant,
    ) -> f32 {
        self.placement
            .opacity(&symbol_key(id, layer, text, anchor), now)
    }

    /// True while fades are running and the renderer must keep scheduling
    /// frames even without further input.
    pub fn needs_animation(&self, now: Instant, duration: Duration) -> bool {
        self.placement.needs_animation(now, duration)
            || self.frame_history.needs_animation(now, duration)
    }

    fn tile_parsed(&self, id: &OverscaledTileId) -> bool {
        self.get_tile(id)
            .is_some_and(|tile| tile.state() == TileState::Parsed)
    }

    fn refresh_renderables(&mut self) {
        let mut selected = Vec::new();

        for id in &self.required {
            if self.tile_parsed(id) {
                selected.push(*id);
                continue;
            }

            // Prefer resident children: more detail, masked against the
            // parent below.
            let mut all_children = true;
            for child in id.canonical.children() {
                let child_id = OverscaledTileId::from_canonical(child);
                if self.tile_parsed(&child_id) {
                    selected.push(child_id);
                } else {
                    all_children = false;
                }
            }

            if all_children {
                continue;
            }

            // Otherwise the nearest resident ancestor fills the hole. A
            // tile with no resident relative renders nothing until its own
            // fetch completes.
            let mut z = id.canonical.z;
            while z > self.zoom_range.min_zoom {
                z -= 1;
                let ancestor = OverscaledTileId::from_canonical(id.canonical.scaled_to(z));
                if self.tile_parsed(&ancestor) {
                    selected.push(ancestor);
                    break;
                }
            }
        }

        selected.sort();
        selected.dedup();
        self.masks = compute_tile_masks(&selected);
        self.renderable = selected;
    }
}

pub(crate) fn symbol_key(
    id: &OverscaledTileId,
    layer: &str,
    text: &str,
    anchor: [f32; 2],
) -> SymbolKey {
    // Quantized world position, so the same label in tiles of different
    // zoom levels fades as one symbol.
    const WORLD_STEPS: f64 = (1u64 << 22) as f64;
    let extent = f64::from(crate::tile_data::DEFAULT_TILE_EXTENT);
    let world = 1u64 << id.canonical.z;
    let wx = (f64::from(id.canonical.x) + f64::from(anchor[0]) / extent) / world as f64;
    let wy = (f64::from(id.canonical.y) + f64::from(anchor[1]) / extent) / world as f64;

    SymbolKey {
        layer: layer.to_string(),
        text: text.to_string(),
        anchor: ((wx * WORLD_STEPS).round() as i32, (wy * WORLD_STEPS).round() as i32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessella_geom::{Point2d, Size};

    use crate::tests::{
        test_style, FailingFileSource, RecordingObserver, TestDecoder, TestFileSource, TestGlyphs,
    };
    use crate::tile_id::CanonicalTileId;

    struct Harness {
        pyramid: TilePyramid,
        source: Arc<TestFileSource>,
        observer: Arc<RecordingObserver>,
    }

    fn harness() -> Harness {
        let source = Arc::new(TestFileSource::default());
        let observer = Arc::new(RecordingObserver::default());
        let processor = Arc::new(TileProcessor::new(
            Arc::new(TestDecoder::default()),
            Arc::new(test_style()),
            Arc::new(TestGlyphs),
        ));

        let pyramid = TilePyramidBuilder::new()
            .with_cache_size(2)
            .build(source.clone(), processor, observer.clone());

        Harness {
            pyramid,
            source,
            observer,
        }
    }

    fn failing_harness() -> (TilePyramid, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let processor = Arc::new(TileProcessor::new(
            Arc::new(TestDecoder::default()),
            Arc::new(test_style()),
            Arc::new(TestGlyphs),
        ));
        let pyramid = TilePyramidBuilder::new().build(
            Arc::new(FailingFileSource),
            processor,
            observer.clone(),
        );

        (pyramid, observer)
    }

    fn world_viewport() -> Viewport {
        Viewport::new(Point2d::new(0.0, 0.0), 0.0, Size::new(256.0, 256.0))
    }

    fn quad_viewport() -> Viewport {
        Viewport::new(Point2d::new(0.0, 0.0), 1.0, Size::new(256.0, 256.0))
    }

    fn root_id() -> OverscaledTileId {
        OverscaledTileId::from_canonical(CanonicalTileId::new(0, 0, 0))
    }

    async fn settle(pyramid: &mut TilePyramid, events: usize) {
        for _ in 0..events {
            let event = pyramid.next_event().await.expect("event stream closed");
            pyramid.apply_event(event);
        }
    }

    #[tokio::test]
    async fn tile_loads_parses_and_becomes_renderable() {
        let mut h = harness();
        h.pyramid.update(&world_viewport());

        assert_eq!(h.pyramid.live_count(), 1);
        let id = h.pyramid.required_tiles()[0];
        assert_eq!(h.pyramid.get_tile(&id).unwrap().state(), TileState::Loading);
        assert!(h.pyramid.renderable_tiles().is_empty());

        // One fetch completion, one parse completion.
        settle(&mut h.pyramid, 2).await;

        let tile = h.pyramid.get_tile(&id).unwrap();
        assert_eq!(tile.state(), TileState::Parsed);
        assert!(tile.get_bucket("land").is_some());
        assert!(tile.get_bucket("roads").is_some());

        assert_eq!(h.pyramid.renderable_tiles(), &[id]);
        let mask = h.pyramid.mask(&id).unwrap();
        assert!(mask.contains(&CanonicalTileId::new(0, 0, 0)));

        assert_eq!(h.observer.changed.lock().as_slice(), &[id]);
        assert!(h.observer.errors.lock().is_empty());
    }

    #[tokio::test]
    async fn retired_tile_is_reused_from_cache_without_refetch() {
        let mut h = harness();
        h.pyramid.update(&world_viewport());
        settle(&mut h.pyramid, 2).await;

        h.pyramid.update(&quad_viewport());
        assert_eq!(h.pyramid.live_count(), 4);
        assert_eq!(h.pyramid.cached_count(), 1);
        settle(&mut h.pyramid, 8).await;
        assert_eq!(h.source.load_count(), 5);

        h.pyramid.update(&world_viewport());

        // A tile promoted from the cache keeps its parsed state; a refetch
        // would have produced a fresh Loading tile.
        let tile = h.pyramid.get_tile(&root_id()).unwrap();
        assert_eq!(tile.state(), TileState::Parsed);
        assert_eq!(h.pyramid.live_count(), 1);
        // Four retired z1 tiles against a capacity of 2.
        assert_eq!(h.pyramid.cached_count(), 2);

        // Let any stray fetch task run before checking none was spawned.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.source.load_count(), 5, "cached tile must not refetch");
    }

    #[tokio::test]
    async fn parent_substitutes_until_children_arrive() {
        let mut h = harness();
        h.pyramid.update(&world_viewport());
        settle(&mut h.pyramid, 2).await;

        h.pyramid.update(&quad_viewport());

        // No z1 tile is parsed yet; the cached z0 parent fills the view.
        assert_eq!(h.pyramid.renderable_tiles(), &[root_id()]);

        settle(&mut h.pyramid, 8).await;

        let renderable = h.pyramid.renderable_tiles();
        assert_eq!(renderable.len(), 4);
        assert!(renderable.iter().all(|id| id.canonical.z == 1));
        for id in renderable {
            assert!(h
                .pyramid
                .mask(id)
                .unwrap()
                .contains(&CanonicalTileId::new(0, 0, 0)));
        }
    }

    #[tokio::test]
    async fn fetch_error_reaches_observer_and_is_not_renderable() {
        let (mut pyramid, observer) = failing_harness();
        pyramid.update(&world_viewport());
        settle(&mut pyramid, 1).await;

        let id = pyramid.required_tiles()[0];
        assert_eq!(pyramid.get_tile(&id).unwrap().state(), TileState::Errored);
        assert!(pyramid.renderable_tiles().is_empty());

        let errors = observer.errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, id);
    }

    #[tokio::test]
    async fn no_observer_callback_after_tile_destruction() {
        let (mut pyramid, observer) = failing_harness();
        pyramid.update(&world_viewport());

        // Destroy the tile while its fetch may still be in flight.
        pyramid.clear();

        // Whatever the fetch task managed to send before the abort finds a
        // dead key and is dropped.
        while let Ok(Some(event)) = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            pyramid.next_event(),
        )
        .await
        {
            pyramid.apply_event(event);
        }

        assert!(observer.errors.lock().is_empty());
        assert!(observer.changed.lock().is_empty());
    }

    #[tokio::test]
    async fn symbol_fade_animates_after_parse() {
        let mut h = harness();
        let labels_viewport =
            Viewport::new(Point2d::new(0.0, 0.0), 4.2, Size::new(256.0, 256.0));
        h.pyramid.update(&labels_viewport);

        let required = h.pyramid.required_tiles().len();
        settle(&mut h.pyramid, required * 2).await;

        let now = Instant::now();
        h.pyramid.run_placement(now);
        assert!(h.pyramid.needs_animation(
            now + Duration::from_millis(100),
            Duration::from_millis(300)
        ));
        assert!(!h.pyramid.needs_animation(
            now + Duration::from_secs(5),
            Duration::from_millis(300)
        ));
    }
}
