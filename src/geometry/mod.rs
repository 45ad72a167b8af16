//! Geometry Utilities
//!
//! Integer point types tagged with the coordinate space they live in,
//! canonical corner ordering for quadrilaterals, and the transforms between
//! native image pixels and the display surface.

pub mod transform;

use std::fmt;
use std::marker::PhantomData;

use crate::error::{AnnotateError, Result};

pub use transform::{display_to_pixel, pixel_to_display, DisplayTransform};

/// Marker for coordinates relative to the image's native resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pixel;

/// Marker for coordinates relative to the rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Display;

/// Integer 2-D point in coordinate space `S`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point<S> {
    pub x: i32,
    pub y: i32,
    _space: PhantomData<S>,
}

pub type PixelPoint = Point<Pixel>;
pub type DisplayPoint = Point<Display>;

/// Corners in canonical order: top-left, top-right, bottom-right, bottom-left
pub type PixelQuad = [PixelPoint; 4];
pub type DisplayQuad = [DisplayPoint; 4];

impl<S> Point<S> {
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    /// Shift both axes by the given amounts, saturating at the `i32` range
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    pub const fn to_tuple(self) -> (i32, i32) {
        (self.x, self.y)
    }
}

impl<S> From<(i32, i32)> for Point<S> {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl<S> fmt::Debug for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Width and height in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Fixed padding between the surface edge and the scaled image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    pub x: u32,
    pub y: u32,
}

impl Border {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Reorder four corners into {top-left, top-right, bottom-right, bottom-left}.
///
/// Points are split into a left and right pair by x, then each pair is
/// ordered by y. Both sorts are stable, so ties on x keep their input order.
/// Rotated or near-diagonal quadrilaterals whose left/right split does not
/// match their visual top/bottom can come out misclassified.
pub fn canonicalize_order<S: Copy>(points: &[Point<S>]) -> Result<[Point<S>; 4]> {
    let mut sorted: [Point<S>; 4] = points.try_into().map_err(|_| {
        AnnotateError::InvalidGeometry(format!(
            "a quadrilateral needs exactly 4 points, got {}",
            points.len()
        ))
    })?;
    sorted.sort_by_key(|p| p.x);

    let mut left = [sorted[0], sorted[1]];
    let mut right = [sorted[2], sorted[3]];
    left.sort_by_key(|p| p.y);
    right.sort_by_key(|p| p.y);

    Ok([left[0], right[0], right[1], left[1]])
}

/// Quadrilateral covering a whole image of the given native size
pub fn full_image_quad(native: Size) -> PixelQuad {
    let right = native.width.saturating_sub(1) as i32;
    let bottom = native.height.saturating_sub(1) as i32;
    [
        PixelPoint::new(0, 0),
        PixelPoint::new(right, 0),
        PixelPoint::new(right, bottom),
        PixelPoint::new(0, bottom),
    ]
}
