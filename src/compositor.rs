//! Stitch ordered sections into one bitmap
//!
//! Sections are painted top-to-bottom in caller order. Each section contributes
//! only its first `height` rows, which is what keeps the last (short) section
//! from repeating the bottom of the previous viewport.

use crate::{EncodedImage, MergeError};
use image::{imageops, DynamicImage, ImageFormat, RgbaImage};
use log::debug;
use rayon::prelude::*;
use std::io::Cursor;

/// Largest canvas, in pixels, a merge will allocate (the common browser
/// canvas area limit, 16384 x 16384).
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Where one decoded section lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Row on the canvas the section starts at
    pub y: u32,
    /// Rows copied from the top of the source image
    pub rows: u32,
}

/// Canvas extents and per-section placements for one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub placements: Vec<Placement>,
}

/// Compute the canvas for decoded images of `sizes` (width, height).
///
/// Explicit `heights` are honoured only when there is exactly one per image;
/// otherwise each image contributes its natural height.
pub fn layout(sizes: &[(u32, u32)], heights: &[u32]) -> Result<CanvasLayout, MergeError> {
    if sizes.is_empty() {
        return Err(MergeError::NoImages);
    }

    let explicit = heights.len() == sizes.len();
    let width = sizes.iter().map(|(w, _)| *w).max().unwrap_or(0);

    let mut placements = Vec::with_capacity(sizes.len());
    let mut y: u64 = 0;
    for (i, (_, natural)) in sizes.iter().enumerate() {
        let advance = if explicit { heights[i] } else { *natural };
        // Asking for more rows than the source has leaves the remainder transparent.
        let rows = advance.min(*natural);
        placements.push(Placement { y: y.min(u32::MAX as u64) as u32, rows });
        y += advance as u64;
    }

    let area = (width as u64).checked_mul(y);
    if width == 0 || y == 0 || y > u32::MAX as u64 || area.map_or(true, |a| a > MAX_CANVAS_PIXELS) {
        return Err(MergeError::InvalidDimensions {
            width: width as u64,
            height: y,
        });
    }

    Ok(CanvasLayout {
        width,
        height: y as u32,
        placements,
    })
}

/// Merge encoded sections into one PNG.
///
/// Every image must decode; a single failure fails the merge and nothing
/// partial is returned. Decoding runs in parallel, painting is sequential.
pub fn merge(images: &[EncodedImage], heights: &[u32]) -> Result<EncodedImage, MergeError> {
    if images.is_empty() {
        return Err(MergeError::NoImages);
    }

    let decoded = images
        .par_iter()
        .enumerate()
        .map(|(index, img)| {
            image::load_from_memory(img.as_bytes())
                .map(|d| d.to_rgba8())
                .map_err(|e| MergeError::Decode {
                    index,
                    reason: e.to_string(),
                })
        })
        .collect::<Result<Vec<RgbaImage>, MergeError>>()?;

    let sizes: Vec<(u32, u32)> = decoded.iter().map(|img| img.dimensions()).collect();
    let plan = layout(&sizes, heights)?;
    debug!(
        "merging {} sections into {}x{} canvas",
        decoded.len(),
        plan.width,
        plan.height
    );

    let mut canvas = RgbaImage::new(plan.width, plan.height);
    for (src, placement) in decoded.iter().zip(&plan.placements) {
        if placement.rows == 0 {
            continue;
        }
        let slice = imageops::crop_imm(src, 0, 0, src.width(), placement.rows).to_image();
        imageops::replace(&mut canvas, &slice, 0, placement.y as i64);
    }

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| MergeError::Encode(e.to_string()))?;
    Ok(EncodedImage::new(buf))
}
