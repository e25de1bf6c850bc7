use num_traits::{FromPrimitive, Num, NumCast};
use serde::{Deserialize, Serialize};

/// Width and height pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size<N: Num + PartialOrd + Copy = f64> {
    width: N,
    height: N,
}

impl<N: Num + FromPrimitive + PartialOrd + Copy + NumCast> Size<N> {
    /// Creates a new size value.
    pub fn new(width: N, height: N) -> Self {
        Self { width, height }
    }

    /// Width.
    pub fn width(&self) -> N {
        self.width
    }

    /// Height.
    pub fn height(&self) -> N {
        self.height
    }

    /// Half of the width.
    pub fn half_width(&self) -> N {
        self.width / N::from_f64(2.0).expect("const conversion failed")
    }

    /// Half of the height.
    pub fn half_height(&self) -> N {
        self.height / N::from_f64(2.0).expect("const conversion failed")
    }

    /// True if either dimension is zero.
    pub fn is_zero(&self) -> bool {
        self.width.is_zero() || self.height.is_zero()
    }

    /// Converts the underlying numeric type.
    pub fn cast<T: Num + FromPrimitive + PartialOrd + Copy + NumCast>(&self) -> Size<T> {
        Size {
            width: NumCast::from(self.width).expect("invalid value"),
            height: NumCast::from(self.height).expect("invalid value"),
        }
    }
}
