pub mod image_file_writer;
pub mod image_overlay_surface;
pub mod recording_surface;
