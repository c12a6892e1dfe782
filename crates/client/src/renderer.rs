//! Deterministic local stand-in for the generation backend.
//!
//! Produces three variants of the uploaded photo with plain pixel
//! transforms, so the workflow can run offline and in demos:
//!
//! 1. RGB scaled by 1.1 (brighter).
//! 2. 1px blur with a diagonal pink gradient overlay.
//! 3. Centred square crop (90% of the short side), RGB scaled by 1.05.
//!
//! The same input always yields byte-identical PNG output.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{imageops, ImageFormat, RgbaImage};

use brewpost_core::copy::{STYLE_HUMOR, STYLE_LITERARY, STYLE_TRENDY};
use brewpost_core::error::CoreError;
use brewpost_core::generator::{GeneratedImage, ImageGenerator, ImageRequest};
use brewpost_core::upload::to_data_uri;

/// Number of variants rendered per photo.
pub const VARIANT_COUNT: usize = 3;

const BRIGHTEN_FACTOR: f32 = 1.1;
const SHARPEN_FACTOR: f32 = 1.05;
const BLUR_SIGMA: f32 = 1.0;
const CROP_RATIO: f32 = 0.9;

/// Overlay colour at the top-left corner (rgb, alpha).
const OVERLAY_START: ([f32; 3], f32) = ([255.0, 182.0, 193.0], 0.2);
/// Overlay colour at the bottom-right corner (rgb, alpha).
const OVERLAY_END: ([f32; 3], f32) = ([255.0, 192.0, 203.0], 0.1);

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

fn scale_rgb(img: &mut RgbaImage, factor: f32) {
    for px in img.pixels_mut() {
        for c in px.0.iter_mut().take(3) {
            *c = (f32::from(*c) * factor).round().min(255.0) as u8;
        }
    }
}

fn brighten(src: &RgbaImage) -> RgbaImage {
    let mut out = src.clone();
    scale_rgb(&mut out, BRIGHTEN_FACTOR);
    out
}

fn blur_with_overlay(src: &RgbaImage) -> RgbaImage {
    let mut out = imageops::blur(src, BLUR_SIGMA);
    let (w, h) = out.dimensions();
    let (wf, hf) = (w as f32, h as f32);
    let denom = (wf * wf + hf * hf).max(1.0);

    for (x, y, px) in out.enumerate_pixels_mut() {
        // Projection onto the (0,0)->(w,h) diagonal.
        let t = ((x as f32 * wf + y as f32 * hf) / denom).clamp(0.0, 1.0);
        let a = OVERLAY_START.1 + (OVERLAY_END.1 - OVERLAY_START.1) * t;
        let dst_a = f32::from(px.0[3]) / 255.0;

        for i in 0..3 {
            let overlay = OVERLAY_START.0[i] + (OVERLAY_END.0[i] - OVERLAY_START.0[i]) * t;
            let blended = overlay * a + f32::from(px.0[i]) * (1.0 - a);
            px.0[i] = blended.round().clamp(0.0, 255.0) as u8;
        }
        let out_a = a + dst_a * (1.0 - a);
        px.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn crop_and_sharpen(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    let side = ((w.min(h) as f32) * CROP_RATIO).floor().max(1.0) as u32;
    let x = (w - side) / 2;
    let y = (h - side) / 2;
    let mut out = imageops::crop_imm(src, x, y, side, side).to_image();
    scale_rgb(&mut out, SHARPEN_FACTOR);
    out
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, CoreError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| CoreError::Internal(format!("PNG encoding failed: {e}")))?;
    Ok(out.into_inner())
}

/// Render the three variants of `bytes` as PNG `data:` URIs with ids
/// `"1"`, `"2"` and `"3"`.
pub fn render_variants(bytes: &[u8], style_name: &str) -> Result<Vec<GeneratedImage>, CoreError> {
    let src = image::load_from_memory(bytes)
        .map_err(|e| CoreError::Decode(format!("Unable to decode image: {e}")))?
        .to_rgba8();

    let variants = [brighten(&src), blur_with_overlay(&src), crop_and_sharpen(&src)];
    variants
        .iter()
        .enumerate()
        .map(|(i, img)| {
            Ok(GeneratedImage {
                id: (i + 1).to_string(),
                url: to_data_uri("image/png", &encode_png(img)?),
                source_style_name: style_name.to_string(),
            })
        })
        .collect()
}

/// Variant index (0-based) used for a copy style.
pub fn variant_for_style(copy_id: &str) -> usize {
    match copy_id {
        STYLE_TRENDY => 0,
        STYLE_LITERARY => 1,
        STYLE_HUMOR => 2,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// LocalRenderer
// ---------------------------------------------------------------------------

/// [`ImageGenerator`] that renders variants locally instead of calling
/// the backend.  Each copy style maps to one fixed variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRenderer;

impl LocalRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageGenerator for LocalRenderer {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, CoreError> {
        let bytes = Arc::clone(&request.image.bytes);
        let style_name = request.style_name.clone();
        let index = variant_for_style(&request.copy_id);

        let mut variants = tokio::task::spawn_blocking(move || render_variants(&bytes, &style_name))
            .await
            .map_err(|e| CoreError::Internal(format!("Renderer task failed: {e}")))?
            .map_err(|e| CoreError::Generation(e.user_message().to_string()))?;

        tracing::debug!(copy_id = %request.copy_id, variant = index + 1, "Rendered local variant");
        Ok(variants.swap_remove(index))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    #[test]
    fn brighten_scales_and_saturates() {
        let out = brighten(&solid(2, 2, [100, 240, 0, 255]));
        assert_eq!(out.get_pixel(0, 0).0, [110, 255, 0, 255]);
    }

    #[test]
    fn crop_is_centred_square() {
        let out = crop_and_sharpen(&solid(200, 100, [100, 100, 100, 255]));
        assert_eq!(out.dimensions(), (90, 90));
        assert_eq!(out.get_pixel(0, 0).0, [105, 105, 105, 255]);
    }

    #[test]
    fn overlay_tints_towards_pink() {
        let out = blur_with_overlay(&solid(10, 10, [0, 0, 0, 255]));
        let top_left = out.get_pixel(0, 0).0;
        // 20% of (255, 182, 193) over black.
        assert_eq!(&top_left[..3], &[51, 36, 39]);
        assert!(top_left[3] >= 254);
        let bottom_right = out.get_pixel(9, 9).0;
        assert!(bottom_right[0] < top_left[0]);
    }

    #[test]
    fn renders_three_variants_deterministically() {
        let bytes = png_bytes(&solid(40, 30, [10, 120, 200, 255]));
        let a = render_variants(&bytes, "Literary").unwrap();
        let b = render_variants(&bytes, "Literary").unwrap();
        assert_eq!(a.len(), VARIANT_COUNT);
        assert_eq!(a, b);
        let ids: Vec<&str> = a.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(a.iter().all(|v| v.url.starts_with("data:image/png;base64,")));
    }

    #[test]
    fn undecodable_input_is_rejected() {
        assert!(matches!(
            render_variants(b"nope", "x"),
            Err(CoreError::Decode(_))
        ));
    }

    #[test]
    fn styles_map_to_distinct_variants() {
        assert_eq!(variant_for_style(STYLE_TRENDY), 0);
        assert_eq!(variant_for_style(STYLE_LITERARY), 1);
        assert_eq!(variant_for_style(STYLE_HUMOR), 2);
        assert_eq!(variant_for_style("other"), 0);
    }
}
