//! Coordinate transforms between native image pixels and the display surface

use tracing::debug;

use super::{Border, DisplayPoint, DisplayQuad, PixelPoint, PixelQuad, Size};
use crate::error::{AnnotateError, Result};

/// How one image is laid out on the display surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    /// Display length divided by native length, same for both axes
    pub scale_ratio: f64,
    /// Top-left corner of the scaled image within the surface
    pub origin_offset: DisplayPoint,
    /// Size of the whole display surface
    pub surface_bounds: Size,
    /// Size of the image after aspect-preserving scaling
    pub scaled_size: Size,
}

impl DisplayTransform {
    /// Fit an image of `native` size into `surface` minus `border` on every side
    pub fn fit(native: Size, surface: Size, border: Border) -> Result<Self> {
        if native.width == 0 || native.height == 0 {
            return Err(AnnotateError::InvalidGeometry(format!(
                "image has no area: {}x{}",
                native.width, native.height
            )));
        }

        let target_w = surface.width as i64 - 2 * border.x as i64;
        let target_h = surface.height as i64 - 2 * border.y as i64;
        if target_w <= 0 || target_h <= 0 {
            return Err(AnnotateError::InvalidGeometry(format!(
                "surface {}x{} leaves no room inside a {}x{} border",
                surface.width, surface.height, border.x, border.y
            )));
        }

        let scaled_size = fit_keep_aspect(native, Size::new(target_w as u32, target_h as u32));
        if scaled_size.width == 0 {
            return Err(AnnotateError::InvalidGeometry(format!(
                "image {}x{} scales to zero width",
                native.width, native.height
            )));
        }

        let scale_ratio = scaled_size.width as f64 / native.width as f64;
        debug!(
            "Fitted {}x{} into {}x{}: scaled {}x{}, ratio {:.4}",
            native.width,
            native.height,
            surface.width,
            surface.height,
            scaled_size.width,
            scaled_size.height,
            scale_ratio
        );

        Ok(Self {
            scale_ratio,
            origin_offset: DisplayPoint::new(border.x as i32, border.y as i32),
            surface_bounds: surface,
            scaled_size,
        })
    }

    /// Where the scaled image is drawn: (top-left, size)
    pub fn image_rect(&self) -> (DisplayPoint, Size) {
        (self.origin_offset, self.scaled_size)
    }

    pub fn to_display(&self, points: &PixelQuad, handle_radius: i32) -> DisplayQuad {
        pixel_to_display(
            points,
            self.scale_ratio,
            self.origin_offset,
            self.surface_bounds,
            handle_radius,
        )
    }

    pub fn to_pixel(&self, points: &DisplayQuad, handle_radius: i32) -> PixelQuad {
        display_to_pixel(points, self.scale_ratio, self.origin_offset, handle_radius)
    }

    /// Pin a handle position into the region where it stays fully visible
    pub fn clamp_handle(&self, point: DisplayPoint, handle_radius: i32) -> DisplayPoint {
        DisplayPoint::new(
            clamp_axis(point.x as i64, handle_radius, self.surface_bounds.width),
            clamp_axis(point.y as i64, handle_radius, self.surface_bounds.height),
        )
    }
}

/// Largest size with the aspect ratio of `native` that fits inside `target`.
///
/// Integer arithmetic: the computed side is truncated.
pub fn fit_keep_aspect(native: Size, target: Size) -> Size {
    let (nw, nh) = (native.width as u64, native.height as u64);
    let (tw, th) = (target.width as u64, target.height as u64);

    let rw = th * nw / nh;
    if rw <= tw {
        Size::new(rw as u32, target.height)
    } else {
        Size::new(target.width, (tw * nh / nw) as u32)
    }
}

/// Map pixel-space corners to drag-handle positions on the surface.
///
/// Each point is scaled (truncating), shifted by `origin_offset`, then by
/// `-handle_radius` so a handle drawn at the result is centered on the true
/// coordinate. Each axis is finally clamped into
/// `[handle_radius, bound - handle_radius]`; the stored pixel point is not
/// affected by the clamp.
pub fn pixel_to_display(
    points: &PixelQuad,
    scale_ratio: f64,
    origin_offset: DisplayPoint,
    surface_bounds: Size,
    handle_radius: i32,
) -> DisplayQuad {
    points.map(|p| {
        let x = (p.x as f64 * scale_ratio) as i64 + origin_offset.x as i64 - handle_radius as i64;
        let y = (p.y as f64 * scale_ratio) as i64 + origin_offset.y as i64 - handle_radius as i64;
        DisplayPoint::new(
            clamp_axis(x, handle_radius, surface_bounds.width),
            clamp_axis(y, handle_radius, surface_bounds.height),
        )
    })
}

/// Map drag-handle positions back to pixel-space corners.
///
/// Inverse of the unclamped part of [`pixel_to_display`], followed by a
/// fixed +1 pixel correction for the truncation in the forward direction.
pub fn display_to_pixel(
    points: &DisplayQuad,
    scale_ratio: f64,
    origin_offset: DisplayPoint,
    handle_radius: i32,
) -> PixelQuad {
    points.map(|p| {
        let x = (p.x as i64 + handle_radius as i64 - origin_offset.x as i64) as f64 / scale_ratio;
        let y = (p.y as i64 + handle_radius as i64 - origin_offset.y as i64) as f64 / scale_ratio;
        PixelPoint::new(
            saturate((x as i64).saturating_add(1)),
            saturate((y as i64).saturating_add(1)),
        )
    })
}

/// Low bound wins when the surface is narrower than two handle radii
fn clamp_axis(value: i64, handle_radius: i32, bound: u32) -> i32 {
    let low = handle_radius as i64;
    let high = bound as i64 - low;
    if value < low {
        handle_radius
    } else if value > high {
        saturate(high)
    } else {
        saturate(value)
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
