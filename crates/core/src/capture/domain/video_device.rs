use crate::orientation::domain::device_orientation::CameraPosition;
use crate::shared::sample_buffer::SampleBuffer;

/// Geometry and rate a device reports once opened.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceFormat {
    pub width: u32,
    pub height: u32,
    /// Nominal frames per second; 0 when the source does not say.
    pub fps: f64,
    pub name: String,
}

/// A source of live video samples.
///
/// Implementations handle the I/O details (device APIs, decoding, pixel
/// conversion) and deliver samples with RGB image buffers.
pub trait VideoDevice: Send {
    /// Acquires the device and returns its format.
    fn open(&mut self) -> Result<DeviceFormat, Box<dyn std::error::Error>>;

    /// Blocking iterator over samples in capture order. Ends when the
    /// source is exhausted or fails.
    fn samples(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<SampleBuffer, Box<dyn std::error::Error>>> + '_>;

    /// Releases the device.
    fn close(&mut self);

    fn position(&self) -> CameraPosition {
        CameraPosition::Back
    }
}

/// Hands out the default video-capturing device, if the system has one.
pub trait VideoDeviceDiscovery {
    fn default_video_device(&self) -> Option<Box<dyn VideoDevice>>;
}

impl<F> VideoDeviceDiscovery for F
where
    F: Fn() -> Option<Box<dyn VideoDevice>>,
{
    fn default_video_device(&self) -> Option<Box<dyn VideoDevice>> {
        self()
    }
}
