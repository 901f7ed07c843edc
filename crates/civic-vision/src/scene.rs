//! Decoded upload images.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::error::{VisionError, VisionResult};

/// An uploaded image: the encoded bytes as received plus the decoded pixels.
///
/// Both halves are reference counted so the image can be handed to blocking
/// tasks and detection backends without copying.
#[derive(Clone)]
pub struct SceneImage {
    encoded: Arc<[u8]>,
    pixels: Arc<DynamicImage>,
}

impl SceneImage {
    /// Decode an encoded image (JPEG, PNG, WebP, BMP).
    pub fn decode(encoded: impl Into<Arc<[u8]>>) -> VisionResult<Self> {
        let encoded: Arc<[u8]> = encoded.into();
        if encoded.is_empty() {
            return Err(VisionError::decode("empty upload"));
        }

        let pixels = image::load_from_memory(&encoded)?;
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(VisionError::decode("image has no pixels"));
        }

        debug!(width, height, bytes = encoded.len(), "Decoded upload image");

        Ok(Self {
            encoded,
            pixels: Arc::new(pixels),
        })
    }

    /// Decode on the blocking thread pool.
    pub async fn decode_blocking(encoded: Vec<u8>) -> VisionResult<Self> {
        tokio::task::spawn_blocking(move || Self::decode(encoded))
            .await
            .map_err(|e| VisionError::internal(format!("decode task failed: {}", e)))?
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub(crate) fn pixels_arc(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.pixels)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl std::fmt::Debug for SceneImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneImage")
            .field("bytes", &self.encoded.len())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{ImageBuffer, ImageOutputFormat, Rgb, RgbImage};

    /// Encode an RGB image as PNG bytes.
    pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// A textured test scene.
    pub fn checkerboard(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([200, 190, 180])
            } else {
                Rgb([40, 45, 50])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_decode_png() {
        let bytes = png_bytes(&checkerboard(64, 48));
        let scene = SceneImage::decode(bytes.clone()).unwrap();
        assert_eq!(scene.width(), 64);
        assert_eq!(scene.height(), 48);
        assert_eq!(scene.encoded(), bytes.as_slice());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = SceneImage::decode(b"definitely not an image".to_vec()).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_decode_rejects_empty() {
        let err = SceneImage::decode(Vec::<u8>::new()).unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_decode_blocking() {
        let bytes = png_bytes(&checkerboard(8, 8));
        let scene = SceneImage::decode_blocking(bytes).await.unwrap();
        assert_eq!(scene.width(), 8);
    }
}
