//! Validation and MIME detection for submitted images.
//!
//! Payloads are checked by content (magic bytes plus a full decode), never
//! by file name. Accepted images are kept byte-for-byte; nothing is resized
//! or re-encoded.

use image::ImageFormat;
use tracing::{debug, info};

use super::types::ImageData;

/// Validate an uploaded or captured payload and detect its MIME type.
///
/// # Errors
/// - Payload is empty
/// - Format is not recognised
/// - Payload claims a known format but cannot be decoded
pub fn validate_image(bytes: &[u8]) -> Result<ImageData, String> {
    if bytes.is_empty() {
        return Err("No image data was provided.".to_string());
    }

    let format = image::guess_format(bytes).map_err(|e| {
        debug!("Format detection failed: {}", e);
        "This file is not a supported image. Please choose a JPEG, PNG, WebP or GIF.".to_string()
    })?;

    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        format!(
            "Failed to load image: {}. Ensure it's a valid {} file.",
            e,
            format_label(format)
        )
    })?;

    info!(
        "Validated {} image: {}x{}, {} bytes",
        format_label(format),
        img.width(),
        img.height(),
        bytes.len()
    );

    Ok(ImageData::new(format.to_mime_type(), bytes.to_vec()))
}

fn format_label(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("image")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_validate_image_rejects_invalid() {
        let result = validate_image(b"not an image");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("not a supported image"));
    }

    #[test]
    fn test_validate_image_rejects_empty() {
        assert!(validate_image(&[]).is_err());
    }

    #[test]
    fn test_validate_image_rejects_truncated_png() {
        let png = encode(&DynamicImage::new_rgb8(32, 32), ImageFormat::Png);
        let truncated = &png[..png.len() / 2];

        let result = validate_image(truncated);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Failed to load"));
    }

    #[test]
    fn test_validate_image_detects_png() {
        let png = encode(&DynamicImage::new_rgb8(20, 10), ImageFormat::Png);
        let image = validate_image(&png).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.bytes(), png.as_slice());
    }

    #[test]
    fn test_validate_image_detects_jpeg() {
        let jpeg = encode(&DynamicImage::new_rgb8(16, 16), ImageFormat::Jpeg);
        let image = validate_image(&jpeg).unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
        assert!(image.to_data_uri().starts_with("data:image/jpeg;base64,"));
    }
}
