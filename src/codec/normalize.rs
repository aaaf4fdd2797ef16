//! Deterministic pixel preprocessing applied before encoding
//!
//! Block-compressed targets need RGBA channel order, a present alpha
//! channel and dimensions on the block grid. These steps are keyed on the
//! target format and always applied; they are not quality heuristics.

use crate::{
    codec::{formats::SourceFormat, formats::TargetFormat, DecodedImage},
    error::{Result, ShuttleError},
    protocol::JobStatus,
};

/// Reorder reversed channel layouts (BGRA) into RGBA
pub fn swizzle_to_rgba(mut image: DecodedImage) -> DecodedImage {
    if image.format != SourceFormat::Bgra32 {
        return image;
    }
    for pixel in image.pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    image.format = SourceFormat::Rgba32;
    image
}

/// Expand alpha-less layouts (RGB) into RGBA with opaque alpha
pub fn ensure_alpha(image: DecodedImage) -> DecodedImage {
    if image.format != SourceFormat::Rgb24 {
        return image;
    }
    let mut pixels = Vec::with_capacity(image.pixels.len() / 3 * 4);
    for rgb in image.pixels.chunks_exact(3) {
        pixels.extend_from_slice(rgb);
        pixels.push(0xFF);
    }
    DecodedImage {
        width: image.width,
        height: image.height,
        format: SourceFormat::Rgba32,
        pixels,
    }
}

/// Pad dimensions up to the block grid by replicating edge pixels
pub fn pad_to_block(image: DecodedImage, block_w: u32, block_h: u32) -> DecodedImage {
    let padded_w = image.width.div_ceil(block_w) * block_w;
    let padded_h = image.height.div_ceil(block_h) * block_h;
    if (padded_w == image.width && padded_h == image.height)
        || image.width == 0
        || image.height == 0
    {
        return image;
    }

    let bpp = image.format.bytes_per_pixel();
    let mut pixels = vec![0u8; padded_w as usize * padded_h as usize * bpp];
    for y in 0..padded_h {
        let src_y = y.min(image.height - 1) as usize;
        for x in 0..padded_w {
            let src_x = x.min(image.width - 1) as usize;
            let src = (src_y * image.width as usize + src_x) * bpp;
            let dst = (y as usize * padded_w as usize + x as usize) * bpp;
            pixels[dst..dst + bpp].copy_from_slice(&image.pixels[src..src + bpp]);
        }
    }
    DecodedImage {
        width: padded_w,
        height: padded_h,
        format: image.format,
        pixels,
    }
}

/// Box-filter resample so the larger side lands on `max_side`
pub fn downscale_box(image: &DecodedImage, max_side: u32) -> Result<DecodedImage> {
    if image.width == 0 || image.height == 0 || max_side == 0 {
        return Err(ShuttleError::codec(
            JobStatus::DownscaleFailed,
            format!(
                "cannot resample {}x{} to max side {}",
                image.width, image.height, max_side
            ),
        ));
    }
    if image.width <= max_side && image.height <= max_side {
        return Ok(image.clone());
    }

    let longer = image.width.max(image.height);
    let scale = max_side as f64 / longer as f64;
    let new_w = ((image.width as f64 * scale).round() as u32).clamp(1, max_side);
    let new_h = ((image.height as f64 * scale).round() as u32).clamp(1, max_side);

    let bpp = image.format.bytes_per_pixel();
    let mut pixels = vec![0u8; new_w as usize * new_h as usize * bpp];
    for y in 0..new_h as usize {
        let y0 = y * image.height as usize / new_h as usize;
        let y1 = ((y + 1) * image.height as usize / new_h as usize).max(y0 + 1);
        for x in 0..new_w as usize {
            let x0 = x * image.width as usize / new_w as usize;
            let x1 = ((x + 1) * image.width as usize / new_w as usize).max(x0 + 1);
            let count = ((x1 - x0) * (y1 - y0)) as u64;
            for c in 0..bpp {
                let mut sum = 0u64;
                for sy in y0..y1 {
                    for sx in x0..x1 {
                        sum += image.pixels[(sy * image.width as usize + sx) * bpp + c] as u64;
                    }
                }
                pixels[(y * new_w as usize + x) * bpp + c] = (sum / count) as u8;
            }
        }
    }
    Ok(DecodedImage {
        width: new_w,
        height: new_h,
        format: image.format,
        pixels,
    })
}

/// Full normalization pipeline for one target format
pub fn normalize_for_target(image: DecodedImage, target: TargetFormat) -> DecodedImage {
    let image = swizzle_to_rgba(image);
    let image = ensure_alpha(image);
    match target.block_dims() {
        Some((bw, bh)) => pad_to_block(image, bw, bh),
        None => image,
    }
}
