use std::sync::atomic::{AtomicU8, Ordering};

use crate::orientation::domain::device_orientation::DeviceOrientation;
use crate::orientation::domain::orientation_source::OrientationSource;

/// An orientation that never changes.
pub struct FixedOrientation(pub DeviceOrientation);

impl OrientationSource for FixedOrientation {
    fn current(&self) -> DeviceOrientation {
        self.0
    }
}

/// Orientation updated from one thread and read from another, e.g. set by
/// a sensor poller while the delivery thread reads it per frame.
pub struct SharedOrientation {
    value: AtomicU8,
}

impl SharedOrientation {
    pub fn new(initial: DeviceOrientation) -> Self {
        Self {
            value: AtomicU8::new(initial.to_u8()),
        }
    }

    pub fn set(&self, orientation: DeviceOrientation) {
        self.value.store(orientation.to_u8(), Ordering::Relaxed);
    }
}

impl OrientationSource for SharedOrientation {
    fn current(&self) -> DeviceOrientation {
        DeviceOrientation::from_u8(self.value.load(Ordering::Relaxed))
    }
}
