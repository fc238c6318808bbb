pub mod ffmpeg_camera_device;
pub mod image_sequence_device;
