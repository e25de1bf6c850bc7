use nalgebra::{Point2, Scalar};
use num_traits::{FromPrimitive, Num};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect<N = f64> {
    x_min: N,
    y_min: N,
    x_max: N,
    y_max: N,
}

impl<N: Num + Copy + PartialOrd + Scalar + FromPrimitive> Rect<N> {
    /// Creates a new rectangle. The caller must give `x_min <= x_max` and
    /// `y_min <= y_max`.
    pub fn new(x_min: N, y_min: N, x_max: N, y_max: N) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Left bound.
    pub fn x_min(&self) -> N {
        self.x_min
    }

    /// Right bound.
    pub fn x_max(&self) -> N {
        self.x_max
    }

    /// Bottom bound.
    pub fn y_min(&self) -> N {
        self.y_min
    }

    /// Top bound.
    pub fn y_max(&self) -> N {
        self.y_max
    }

    /// Width of the rectangle.
    pub fn width(&self) -> N {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> N {
        self.y_max - self.y_min
    }

    /// Center point.
    pub fn center(&self) -> Point2<N> {
        let two = N::from_f64(2.0).expect("const conversion failed");
        Point2::new(
            (self.x_min + self.x_max) / two,
            (self.y_min + self.y_max) / two,
        )
    }

    /// Degenerate rectangle containing a single point.
    pub fn from_point(p: Point2<N>) -> Self {
        Self {
            x_min: p.x,
            y_min: p.y,
            x_max: p.x,
            y_max: p.y,
        }
    }

    /// Bounding rectangle of a set of points. `None` for an empty set.
    pub fn from_points(points: impl IntoIterator<Item = Point2<N>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let mut rect = Self::from_point(iter.next()?);
        for p in iter {
            rect = rect.merge(Self::from_point(p));
        }

        Some(rect)
    }

    /// Minimal rectangle containing both `self` and `other`.
    pub fn merge(&self, other: Self) -> Self {
        Self {
            x_min: if self.x_min < other.x_min {
                self.x_min
            } else {
                other.x_min
            },
            y_min: if self.y_min < other.y_min {
                self.y_min
            } else {
                other.y_min
            },
            x_max: if self.x_max > other.x_max {
                self.x_max
            } else {
                other.x_max
            },
            y_max: if self.y_max > other.y_max {
                self.y_max
            } else {
                other.y_max
            },
        }
    }

    /// Moves each edge outwards by `amount` (inwards for negative values).
    pub fn inflate(&self, amount: N) -> Self {
        Self {
            x_min: self.x_min - amount,
            y_min: self.y_min - amount,
            x_max: self.x_max + amount,
            y_max: self.y_max + amount,
        }
    }

    /// True if the point lies inside or on the boundary.
    pub fn contains(&self, point: Point2<N>) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
    }

    /// True if the rectangles share at least one point.
    pub fn intersects(&self, other: Self) -> bool {
        self.x_min <= other.x_max
            && other.x_min <= self.x_max
            && self.y_min <= other.y_max
            && other.y_min <= self.y_max
    }

    /// Corner points in counter-clockwise order starting from the bottom-left.
    pub fn into_quadrangle(self) -> [Point2<N>; 4] {
        [
            Point2::new(self.x_min, self.y_min),
            Point2::new(self.x_max, self.y_min),
            Point2::new(self.x_max, self.y_max),
            Point2::new(self.x_min, self.y_max),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both() {
        let a: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(2.0, -1.0, 3.0, 0.5);
        let merged = a.merge(b);
        assert_eq!(merged, Rect::new(0.0, -1.0, 3.0, 1.0));
    }

    #[test]
    fn intersects_is_inclusive() {
        let a: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);
        assert!(a.intersects(Rect::new(1.0, 1.0, 2.0, 2.0)));
        assert!(!a.intersects(Rect::new(1.1, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn from_points_bounds() {
        let rect = Rect::from_points([
            Point2::new(1.0, 5.0),
            Point2::new(-2.0, 3.0),
            Point2::new(0.0, 7.0),
        ])
        .unwrap();
        assert_eq!(rect, Rect::new(-2.0, 3.0, 1.0, 7.0));

        assert!(Rect::<f64>::from_points([]).is_none());
    }
}
