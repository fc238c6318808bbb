use crate::orientation::domain::device_orientation::DeviceOrientation;

/// Reports the device's current physical orientation.
///
/// Queried once per frame from the delivery thread, so implementations
/// must be cheap and thread-safe.
pub trait OrientationSource: Send + Sync {
    fn current(&self) -> DeviceOrientation;
}
