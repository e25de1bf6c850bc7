//! Error types used by the crate.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::tile_data::DecodeError;

/// Tessella error type.
#[derive(Debug, Clone, Error)]
pub enum TessellaError {
    /// Failed to fetch tile data.
    #[error("failed to load tile data: {0}")]
    Fetch(#[from] FetchError),
    /// Error decoding tile data.
    #[error("failed to decode tile data: {0}")]
    Decoding(#[from] DecodeError),
    /// Item not found.
    #[error("item not found")]
    NotFound,
    /// Generic error - details are inside.
    #[error("{0}")]
    Generic(String),
}
