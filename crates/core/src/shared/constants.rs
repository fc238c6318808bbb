pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Directory name used under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "facecam";

/// Label of the thread that receives frames and performs detection.
pub const VIDEO_QUEUE_LABEL: &str = "videoQueue";

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

pub const DEFAULT_VIEW_WIDTH: u32 = 640;
pub const DEFAULT_VIEW_HEIGHT: u32 = 480;

/// Overlay stroke color (RGB) and width in view pixels.
pub const OVERLAY_COLOR: [u8; 3] = [255, 214, 0];
pub const OVERLAY_THICKNESS: u32 = 2;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
