//! Product photo intake: decode, measure, and flag quality issues.
//!
//! Quality flags are advisory. A low-resolution or oversized photo is
//! still accepted; only undecodable input is refused.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Photos narrower or shorter than this are flagged as low resolution.
pub const MIN_RECOMMENDED_DIMENSION: u32 = 1024;

/// Photos larger than this (10 MiB) are flagged as oversized.
pub const MAX_RECOMMENDED_BYTES: u64 = 10 * 1024 * 1024;

/// Fallback MIME type when none can be inferred.
pub const DEFAULT_MIME: &str = "image/jpeg";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Advisory quality annotations; both flags are independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImageQuality {
    pub low_resolution: bool,
    pub oversized: bool,
}

impl ImageQuality {
    pub fn has_warnings(&self) -> bool {
        self.low_resolution || self.oversized
    }
}

/// A staged product photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedImage {
    pub file_name: String,
    pub mime: String,
    pub preview_data_uri: String,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub quality: ImageQuality,
    /// Original file contents, sent as-is to the generation endpoint.
    #[serde(skip)]
    pub bytes: Arc<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Classify a photo from its dimensions and file size.
pub fn classify(width: u32, height: u32, byte_size: u64) -> ImageQuality {
    ImageQuality {
        low_resolution: width < MIN_RECOMMENDED_DIMENSION || height < MIN_RECOMMENDED_DIMENSION,
        oversized: byte_size > MAX_RECOMMENDED_BYTES,
    }
}

/// Decode only the header of `bytes` and return `(width, height)`.
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32), CoreError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CoreError::Decode(format!("Unable to read image: {e}")))?
        .into_dimensions()
        .map_err(|e| CoreError::Decode(format!("Unable to decode image: {e}")))
}

/// Encode `bytes` as a `data:` URI.
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Best-effort MIME type from a file name's extension.
pub fn mime_from_file_name(file_name: &str) -> &'static str {
    image::ImageFormat::from_path(file_name)
        .map(|f| f.to_mime_type())
        .unwrap_or(DEFAULT_MIME)
}

/// Accept a user-supplied file as the staged product photo.
///
/// The MIME check is permissive (any `image/*`); the real gate is
/// decoding the header.
pub fn inspect_upload(
    file_name: &str,
    mime: &str,
    bytes: Vec<u8>,
) -> Result<UploadedImage, CoreError> {
    if !mime.starts_with("image/") {
        return Err(CoreError::Validation(
            "Please upload an image file".to_string(),
        ));
    }

    let (width, height) = decode_dimensions(&bytes)?;
    let byte_size = bytes.len() as u64;
    let quality = classify(width, height, byte_size);

    if quality.has_warnings() {
        tracing::debug!(
            file_name,
            width,
            height,
            byte_size,
            low_resolution = quality.low_resolution,
            oversized = quality.oversized,
            "Uploaded photo has quality warnings",
        );
    }

    Ok(UploadedImage {
        file_name: file_name.to_string(),
        mime: mime.to_string(),
        preview_data_uri: to_data_uri(mime, &bytes),
        width,
        height,
        byte_size,
        quality,
        bytes: Arc::new(bytes),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("png encoding should succeed");
        out.into_inner()
    }

    // -- Classification --

    #[test]
    fn large_photo_under_size_limit_is_clean() {
        assert_eq!(classify(2000, 2000, 2 * 1024 * 1024), ImageQuality::default());
    }

    #[test]
    fn small_photo_is_low_resolution() {
        let q = classify(500, 500, 80_000);
        assert!(q.low_resolution);
        assert!(!q.oversized);
    }

    #[test]
    fn one_short_side_is_enough_for_low_resolution() {
        assert!(classify(4000, 1023, 1).low_resolution);
        assert!(classify(1023, 4000, 1).low_resolution);
        assert!(!classify(1024, 1024, 1).low_resolution);
    }

    #[test]
    fn twelve_megabyte_file_is_oversized() {
        assert!(classify(2000, 2000, 12 * 1024 * 1024).oversized);
    }

    #[test]
    fn size_limit_is_exclusive() {
        assert!(!classify(2000, 2000, MAX_RECOMMENDED_BYTES).oversized);
        assert!(classify(2000, 2000, MAX_RECOMMENDED_BYTES + 1).oversized);
    }

    #[test]
    fn both_flags_can_be_set() {
        let q = classify(300, 300, 11 * 1024 * 1024);
        assert!(q.low_resolution && q.oversized);
    }

    // -- Inspection --

    #[test]
    fn inspect_reads_dimensions_and_builds_preview() {
        let bytes = png(640, 480);
        let len = bytes.len() as u64;
        let img = inspect_upload("tea.png", "image/png", bytes).unwrap();
        assert_eq!((img.width, img.height), (640, 480));
        assert_eq!(img.byte_size, len);
        assert!(img.quality.low_resolution);
        assert!(img.preview_data_uri.starts_with("data:image/png;base64,"));
        assert_eq!(img.bytes.len() as u64, len);
    }

    #[test]
    fn inspect_accepts_mismatched_image_mime() {
        // Declared as jpeg, actually png: the decoder sniffs the format.
        let img = inspect_upload("tea.jpg", "image/jpeg", png(1024, 1024)).unwrap();
        assert!(!img.quality.low_resolution);
    }

    #[test]
    fn inspect_rejects_non_image_mime() {
        assert_matches!(
            inspect_upload("notes.txt", "text/plain", b"hello".to_vec()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn inspect_rejects_undecodable_bytes() {
        assert_matches!(
            inspect_upload("fake.png", "image/png", b"definitely not a png".to_vec()),
            Err(CoreError::Decode(_))
        );
    }

    #[test]
    fn mime_guess_from_extension() {
        assert_eq!(mime_from_file_name("a.png"), "image/png");
        assert_eq!(mime_from_file_name("a.webp"), "image/webp");
        assert_eq!(mime_from_file_name("no_extension"), DEFAULT_MIME);
    }
}
