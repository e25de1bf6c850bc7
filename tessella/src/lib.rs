//! Tessella is the tile-lifecycle and symbol-layout core of a vector map
//! renderer. It decides which tiles a viewport needs, fetches and parses
//! them off the foreground thread, lays out collision-free labels and hands
//! render-ready [buckets](bucket::Bucket) to whatever draws them.
//!
//! # Main components
//!
//! Everything revolves around the
//!
//! * [`TilePyramid`], which owns the tile set of one source: given a
//!   [`Viewport`] it computes the required [tile ids](tile_id), promotes
//!   tiles from its LRU [cache](tile::cache::TileCache), starts fetches
//!   through a [`FileSource`](fetch::FileSource) and applies fetch/parse
//!   completions delivered to its mailbox. Each
//! * [`Tile`](tile::Tile) runs a small state machine (`Loading` → `Loaded`
//!   → `Parsed`/`Invalid`) and ends up holding one bucket per style layer,
//!   built by the
//! * [`TileProcessor`](processor::TileProcessor), which decodes payloads
//!   behind a [`TileDecoder`](tile_data::TileDecoder) and runs the
//! * [symbol layout engine](layout), the part that turns feature geometry
//!   plus evaluated [style parameters](style) into placed, collision-free
//!   glyph and icon quads.
//!
//! The pyramid is single-threaded by design: background work communicates
//! exclusively through its event mailbox, so cancelling a tile can never
//! race its own completions. Call
//! [`poll_events`](tile::pyramid::TilePyramid::poll_events) once per frame
//! from the thread that owns the pyramid.
//!
//! # What this crate is not
//!
//! There is no GPU code, no HTTP client, no style-sheet parser and no font
//! rasterizer here. Those are collaborators behind the [`fetch`],
//! [`tile_data`] and [`layout::shaping`] traits.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

pub(crate) mod async_runtime;
pub mod bucket;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod observer;
pub mod processor;
pub mod style;
pub mod tile;
pub mod tile_data;
pub mod tile_id;

#[cfg(test)]
pub(crate) mod tests;

pub use error::TessellaError;
pub use observer::{DummyObserver, TileObserver};
pub use tile::cover::{tile_cover, Viewport, ZoomRange};
pub use tile::pyramid::{TilePyramid, TilePyramidBuilder};
pub use tile_id::{CanonicalTileId, OverscaledTileId, UnwrappedTileId};

// Re-export the geometry primitives crate.
pub use tessella_geom;
