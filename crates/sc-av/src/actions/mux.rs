//! Assemble a still frame and an audio track into an H.264/AAC mp4.

use std::path::Path;
use std::time::Duration;

use sc_core::config::RenderConfig;

use crate::command::{ToolCommand, ToolOutcome};
use crate::tools::{Tool, ToolRegistry};

/// Encoder parameters and budget for the mux stage.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxSettings {
    pub framerate: u32,
    /// x264 preset name.
    pub preset: String,
    /// AAC bitrate in ffmpeg notation, e.g. `192k`.
    pub audio_bitrate: String,
    pub timeout: Duration,
}

impl MuxSettings {
    pub fn from_config(render: &RenderConfig) -> Self {
        Self {
            framerate: render.framerate,
            preset: render.video_preset.clone(),
            audio_bitrate: render.audio_bitrate.clone(),
            timeout: render.mux_timeout(),
        }
    }
}

impl Default for MuxSettings {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// Build the ffmpeg invocation that loops `image` for `duration_secs`
/// under `audio` and writes the mp4 to `output`.
///
/// The duration is passed through verbatim; it is never rounded.
pub fn mux_command(
    ffmpeg: &Path,
    image: &Path,
    audio: &Path,
    duration_secs: f64,
    output: &Path,
    settings: &MuxSettings,
) -> ToolCommand {
    let framerate = settings.framerate.to_string();

    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-hide_banner", "-nostdin", "-y"]);
    cmd.args(["-loop", "1", "-framerate", framerate.as_str(), "-i"]);
    cmd.arg(image);
    cmd.arg("-i");
    cmd.arg(audio);
    cmd.args(["-map", "0:v:0", "-map", "1:a:0"]);
    cmd.args([
        "-c:v", "libx264",
        "-tune", "stillimage",
        "-preset", settings.preset.as_str(),
        "-pix_fmt", "yuv420p",
        "-r", framerate.as_str(),
    ]);
    cmd.args(["-c:a", "aac", "-b:a", settings.audio_bitrate.as_str()]);
    cmd.arg("-t");
    cmd.arg(duration_secs.to_string());
    cmd.args(["-movflags", "+faststart", "-f", "mp4"]);
    cmd.arg(output);
    cmd.timeout(settings.timeout);
    cmd
}

/// Encode the video for `image` + `audio` into `output`.
///
/// Like [`super::composite_image`], `Err` means ffmpeg is missing; the run
/// itself is described by the [`ToolOutcome`].
pub async fn mux_video(
    tools: &ToolRegistry,
    image: &Path,
    audio: &Path,
    duration_secs: f64,
    output: &Path,
    settings: &MuxSettings,
) -> sc_core::Result<ToolOutcome> {
    let ffmpeg = tools.require(Tool::Ffmpeg)?;

    tracing::info!(
        "mux {} + {} -> {} ({duration_secs}s)",
        image.display(),
        audio.display(),
        output.display()
    );

    Ok(
        mux_command(ffmpeg, image, audio, duration_secs, output, settings)
            .run()
            .await,
    )
}
