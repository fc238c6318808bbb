pub mod sample_buffer_delegate;
pub mod video_device;
