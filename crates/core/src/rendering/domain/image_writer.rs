use std::path::Path;

use image::RgbImage;

/// Persists a composed preview image.
pub trait ImageWriter: Send {
    fn write(&self, path: &Path, image: &RgbImage) -> Result<(), Box<dyn std::error::Error>>;
}
