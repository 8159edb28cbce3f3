//! ffmpeg render stages: image composite and audio/video mux.

mod composite;
mod mux;

pub use composite::{composite_command, composite_filter, composite_image, CompositeSettings};
pub use mux::{mux_command, mux_video, MuxSettings};
