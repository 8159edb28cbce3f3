//! # sc-av
//!
//! External tool orchestration for the stillcast pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder that runs an
//!   external process under a hard timeout and reports a [`ToolOutcome`].
//! - **Workspace management** ([`Workspace`]) -- per-job staging directory
//!   with publish-by-rename.
//! - **Probing** ([`probe::FfprobeProber`]) -- audio duration via ffprobe.
//! - **Render actions** ([`actions`]) -- the composite and mux ffmpeg stages.

pub mod actions;
pub mod command;
pub mod probe;
pub mod tools;
pub mod workspace;

#[cfg(all(unix, any(test, feature = "testing")))]
pub mod testing;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutcome, ToolOutput};
pub use probe::{probe_duration, FfprobeProber};
pub use tools::{Tool, ToolInfo, ToolRegistry};
pub use workspace::Workspace;

pub use actions::{composite_image, mux_video, CompositeSettings, MuxSettings};
