pub mod device_orientation;
pub mod exif_orientation;
pub mod orientation_source;
