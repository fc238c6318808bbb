use image::RgbImage;
use ndarray::ArrayView3;

/// One captured image: packed pixel bytes in row-major order.
///
/// Capture devices produce RGB (3 channels). Other channel counts can be
/// represented, but detectors and overlay surfaces reject them.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps an RGB image, taking ownership of its pixel buffer.
    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Sequence number assigned by the capture device.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    /// True when the buffer length matches the dimensions and the frame is
    /// not empty.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }

    /// Copies the pixels into an `RgbImage`. `None` unless the frame is a
    /// well-formed 3-channel buffer.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.channels != 3 || !self.is_well_formed() {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// `(height, width, channels)` view, or `None` for a malformed buffer.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .ok()
    }
}
