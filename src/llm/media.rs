use std::io::Cursor;

use image::ImageFormat;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Uploaded image is empty")]
    Empty,
    #[error("Cannot identify image file: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to re-encode image as PNG: {0}")]
    Encode(#[source] image::ImageError),
}

/// An uploaded image in a form the model API accepts inline.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub dimensions: Option<(u32, u32)>,
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

fn normalize_mime_type(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

fn model_accepts(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

/// Decodes the upload to make sure it is an image, then keeps the original
/// bytes when the model accepts the format and re-encodes to PNG otherwise.
/// HEIC/HEIF cannot be decoded locally and is forwarded as-is.
pub fn prepare_image(bytes: Vec<u8>) -> Result<PreparedImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let detected = detect_mime_type(&bytes).map(|mime| normalize_mime_type(&mime));
    if matches!(detected.as_deref(), Some("image/heic") | Some("image/heif")) {
        let mime_type = detected.unwrap_or_else(|| "image/heic".to_string());
        return Ok(PreparedImage {
            bytes,
            mime_type,
            dimensions: None,
        });
    }

    let decoded = image::load_from_memory(&bytes).map_err(ImageError::Decode)?;
    let dimensions = Some((decoded.width(), decoded.height()));

    match detected {
        Some(mime_type) if model_accepts(&mime_type) => Ok(PreparedImage {
            bytes,
            mime_type,
            dimensions,
        }),
        _ => {
            let mut encoded = Cursor::new(Vec::new());
            decoded
                .write_to(&mut encoded, ImageFormat::Png)
                .map_err(ImageError::Encode)?;
            Ok(PreparedImage {
                bytes: encoded.into_inner(),
                mime_type: "image/png".to_string(),
                dimensions,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::encode_test_image;

    #[test]
    fn keeps_png_bytes() {
        let png = encode_test_image(ImageFormat::Png);
        let prepared = prepare_image(png.clone()).unwrap();
        assert_eq!(prepared.mime_type, "image/png");
        assert_eq!(prepared.bytes, png);
        assert_eq!(prepared.dimensions, Some((4, 3)));
    }

    #[test]
    fn keeps_jpeg_bytes() {
        let jpeg = encode_test_image(ImageFormat::Jpeg);
        let prepared = prepare_image(jpeg.clone()).unwrap();
        assert_eq!(prepared.mime_type, "image/jpeg");
        assert_eq!(prepared.bytes, jpeg);
    }

    #[test]
    fn reencodes_other_formats_as_png() {
        let bmp = encode_test_image(ImageFormat::Bmp);
        let prepared = prepare_image(bmp).unwrap();
        assert_eq!(prepared.mime_type, "image/png");
        assert_eq!(detect_mime_type(&prepared.bytes).as_deref(), Some("image/png"));
        assert_eq!(prepared.dimensions, Some((4, 3)));
    }

    #[test]
    fn rejects_non_images() {
        assert!(matches!(prepare_image(Vec::new()), Err(ImageError::Empty)));
        assert!(matches!(
            prepare_image(b"definitely not an image".to_vec()),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn detects_heic_brand() {
        let mut data = vec![0u8, 0, 0, 24];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_mime_type(&data).as_deref(), Some("image/heic"));
        let prepared = prepare_image(data).unwrap();
        assert_eq!(prepared.mime_type, "image/heic");
        assert!(prepared.dimensions.is_none());
    }
}
