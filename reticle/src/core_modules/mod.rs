pub mod blob_detector;
pub mod color;
pub mod devices;
pub mod filter;
pub mod geometry;
pub mod keyboard;
pub mod morphology;
pub mod pid;
pub mod tracker;
pub mod trigger;
