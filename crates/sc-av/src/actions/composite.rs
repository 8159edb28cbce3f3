//! Normalize an arbitrary-aspect image into a canonical-resolution frame.
//!
//! The source is fitted inside the box and centered over a blurred copy of
//! itself scaled to cover the box, so the frame is filled edge to edge
//! without letterboxing or distortion.

use std::path::Path;
use std::time::Duration;

use sc_core::config::RenderConfig;

use crate::command::{ToolCommand, ToolOutcome};
use crate::tools::{Tool, ToolRegistry};

/// Geometry and budget for the composite stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSettings {
    pub width: u32,
    pub height: u32,
    /// Gaussian blur sigma applied to the background fill.
    pub blur_sigma: f32,
    pub timeout: Duration,
}

impl CompositeSettings {
    pub fn from_config(render: &RenderConfig) -> Self {
        Self {
            width: render.width,
            height: render.height,
            blur_sigma: render.blur_sigma,
            timeout: render.composite_timeout(),
        }
    }
}

impl Default for CompositeSettings {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// Build the `filter_complex` graph for the given settings.
pub fn composite_filter(settings: &CompositeSettings) -> String {
    let (w, h) = (settings.width, settings.height);
    format!(
        "[0:v]split=2[bg][fg];\
         [bg]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},gblur=sigma={sigma}[blurred];\
         [fg]scale={w}:{h}:force_original_aspect_ratio=decrease[front];\
         [blurred][front]overlay=(W-w)/2:(H-h)/2,setsar=1",
        sigma = settings.blur_sigma,
    )
}

/// Build the ffmpeg invocation that renders `input` into a single PNG frame
/// at `output`.
pub fn composite_command(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    settings: &CompositeSettings,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.args(["-hide_banner", "-nostdin", "-y", "-i"]);
    cmd.arg(input);
    cmd.arg("-filter_complex");
    cmd.arg(composite_filter(settings));
    cmd.args(["-frames:v", "1", "-f", "image2", "-c:v", "png"]);
    cmd.arg(output);
    cmd.timeout(settings.timeout);
    cmd
}

/// Render the composite frame for `input` into `output`.
///
/// Returns `Err` only when ffmpeg is not available; tool failures and
/// timeouts are reported through the [`ToolOutcome`].
pub async fn composite_image(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    settings: &CompositeSettings,
) -> sc_core::Result<ToolOutcome> {
    let ffmpeg = tools.require(Tool::Ffmpeg)?;

    tracing::info!(
        "composite {} -> {} ({}x{})",
        input.display(),
        output.display(),
        settings.width,
        settings.height
    );

    Ok(composite_command(ffmpeg, input, output, settings)
        .run()
        .await)
}
