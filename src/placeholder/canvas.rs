//! Pixel helpers for the placeholder renderers.

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

/// Size of the flat canvas used when there is no input image.
pub const FALLBACK_CANVAS: (u32, u32) = (640, 480);

/// Grey of the flat fallback canvas.
pub const FALLBACK_GREY: u8 = 60;

/// Opacity of the black dimming layer, out of 255.
pub const DIM_ALPHA: u8 = 100;

pub const PROGRESS_BAR_HEIGHT: u32 = 10;

/// Accent colour derived from the prompt.
///
/// Same prompt, same colour; every channel is at least 96 so it stays
/// visible on the dimmed frames.
pub fn accent_color(prompt: &str) -> Rgba<u8> {
    let digest = Sha256::digest(prompt.as_bytes());
    Rgba([
        digest[0].max(96),
        digest[1].max(96),
        digest[2].max(96),
        255,
    ])
}

/// Short hex fingerprint of a prompt for logs and sidecar files.
pub fn prompt_fingerprint(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..6])
}

/// Flat grey canvas.
pub fn flat_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(
        width,
        height,
        Rgba([FALLBACK_GREY, FALLBACK_GREY, FALLBACK_GREY, 255]),
    )
}

/// Vertical grey gradient from 60 at the top towards 100 at the bottom,
/// with a slight blue tint.
pub fn vertical_gradient(width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    for (_, y, pixel) in image.enumerate_pixels_mut() {
        let shade = 60 + (y as u64 * 40 / height.max(1) as u64) as u8;
        *pixel = Rgb([shade, shade, shade.saturating_add(10)]);
    }
    image
}

/// Blend a black layer of `alpha` over the whole frame.
pub fn dim(frame: &mut RgbaImage, alpha: u8) {
    let keep = 255 - alpha as u16;
    for pixel in frame.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = (*channel as u16 * keep / 255) as u8;
        }
    }
}

/// Fill an axis-aligned rectangle, clipped to the frame.
pub fn fill_rect(frame: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x_end = x.saturating_add(w).min(frame.width());
    let y_end = y.saturating_add(h).min(frame.height());
    for py in y..y_end {
        for px in x..x_end {
            frame.put_pixel(px, py, color);
        }
    }
}

/// Progress bar along the bottom edge; `progress` is clamped to `0.0..=1.0`.
pub fn progress_bar(frame: &mut RgbaImage, progress: f32, color: Rgba<u8>) {
    let (width, height) = frame.dimensions();
    let filled = (width as f32 * progress.clamp(0.0, 1.0)) as u32;
    let bar = PROGRESS_BAR_HEIGHT.min(height);
    fill_rect(frame, 0, height - bar, filled, bar, color);
}

/// Circle outline centred at `(cx, cy)`.
pub fn ring(frame: &mut RgbaImage, cx: i64, cy: i64, radius: u32, thickness: u32, color: Rgba<u8>) {
    let outer = radius as i64 + thickness as i64;
    let inner_sq = (radius as i64) * (radius as i64);
    let outer_sq = outer * outer;
    let (width, height) = frame.dimensions();

    for y in (cy - outer).max(0)..(cy + outer + 1).min(height as i64) {
        for x in (cx - outer).max(0)..(cx + outer + 1).min(width as i64) {
            let d = (x - cx) * (x - cx) + (y - cy) * (y - cy);
            if d >= inner_sq && d <= outer_sq {
                frame.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
