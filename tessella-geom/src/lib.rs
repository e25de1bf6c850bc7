//! Cartesian primitives shared by the `tessella` map engine crates.
//!
//! Points and vectors are re-exported from `nalgebra`; rectangles and sizes
//! are defined here, generic over the numeric type with `f64` as default.

mod rect;
mod size;

pub use nalgebra::{Point2, Vector2};
pub use rect::Rect;
pub use size::Size;

/// 2d point with `f64` coordinates, the default for map-space positions.
pub type Point2d = Point2<f64>;
/// 2d point with `f32` coordinates, used for tile-local geometry.
pub type Point2f = Point2<f32>;
/// 2d vector with `f32` coordinates.
pub type Vector2f = Vector2<f32>;
