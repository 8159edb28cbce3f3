//! Audio probing backed by the `ffprobe` CLI.
//!
//! The probed duration pins the length of the assembled video, so it is
//! returned at full `f64` precision and never rounded.

pub mod ffprobe;

use std::path::Path;
use std::time::Duration;

use crate::tools::ToolRegistry;

pub use self::ffprobe::{parse_duration, FfprobeProber, PROBE_STAGE};

/// Probe the duration of `audio` in seconds using the registry's ffprobe.
pub async fn probe_duration(
    tools: &ToolRegistry,
    audio: &Path,
    timeout: Duration,
) -> sc_core::Result<f64> {
    FfprobeProber::from_registry(tools, timeout)?
        .duration(audio)
        .await
}
