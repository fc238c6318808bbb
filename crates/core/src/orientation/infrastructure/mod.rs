pub mod shared_orientation;
