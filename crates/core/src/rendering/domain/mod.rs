pub mod image_writer;
pub mod overlay_surface;
