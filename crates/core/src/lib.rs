//! Live face annotation: capture frames from a camera, hand each one to a
//! face detector, and draw the resulting bounding boxes over a preview.

pub mod capture;
pub mod detection;
pub mod orientation;
pub mod pipeline;
pub mod rendering;
pub mod shared;
