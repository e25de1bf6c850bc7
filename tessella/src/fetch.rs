//! Asynchronous tile byte sources.
//!
//! The actual transport (HTTP client, file system, test fixture) lives
//! outside of this crate; implementations of [`FileSource`] are expected to
//! complete every `load` call exactly once unless the task driving it is
//! aborted first.

use bytes::Bytes;
use thiserror::Error;
use web_time::SystemTime;

use crate::tile_id::OverscaledTileId;

/// Error that can occur when trying to load tile bytes.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Could not reach the remote source.
    #[error("network error")]
    Network,
    /// Tile with the given id does not exist in the source.
    #[error("tile does not exist")]
    NotFound,
    /// Error reading data from the file system.
    #[error("io error: {0}")]
    Io(String),
}

/// Raw payload of one fetched tile together with its cache-control stamps.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// Raw tile bytes.
    pub data: Bytes,
    /// When the resource was last modified, if the source reports it.
    pub modified: Option<SystemTime>,
    /// When the resource expires, if the source reports it.
    pub expires: Option<SystemTime>,
}

impl TileResponse {
    /// Response carrying only a payload, without cache-control stamps.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            modified: None,
            expires: None,
        }
    }
}

/// Loader for raw tile bytes.
#[async_trait::async_trait]
pub trait FileSource: Send + Sync {
    /// Load the payload of the tile with the given id.
    async fn load(&self, id: &OverscaledTileId) -> Result<TileResponse, FetchError>;
}

/// Source of tile URLs for a given tile id.
pub trait UrlSource: (Fn(&OverscaledTileId) -> String) + Send + Sync {}
impl<T: Fn(&OverscaledTileId) -> String + Send + Sync> UrlSource for T {}
