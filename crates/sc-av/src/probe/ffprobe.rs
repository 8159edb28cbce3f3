//! FFprobe-based duration probe.
//!
//! Shells out to `ffprobe -v error -print_format json -show_format
//! -show_streams -select_streams a:0` and reads the container duration,
//! falling back to the first audio stream's duration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::command::{ToolCommand, ToolOutcome};
use crate::tools::{Tool, ToolRegistry};

/// Stage name used when a probe exceeds its budget.
pub const PROBE_STAGE: &str = "probe";

/// A duration prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    /// Create a prober from the registry's ffprobe.
    pub fn from_registry(tools: &ToolRegistry, timeout: Duration) -> sc_core::Result<Self> {
        let ffprobe = tools.require(Tool::Ffprobe)?;
        Ok(Self::new(ffprobe.to_path_buf(), timeout))
    }

    /// Probe the duration of the audio at `path`, in seconds.
    ///
    /// # Errors
    ///
    /// - [`sc_core::Error::Probe`] if ffprobe rejects the file or reports no
    ///   usable duration.
    /// - [`sc_core::Error::TranscodeTimedOut`] if ffprobe exceeds its budget.
    pub async fn duration(&self, path: &Path) -> sc_core::Result<f64> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v", "error",
            "-print_format", "json",
            "-show_format",
            "-show_streams",
            "-select_streams", "a:0",
        ]);
        cmd.arg(path);
        cmd.timeout(self.timeout);

        let output = match cmd.run().await {
            ToolOutcome::Success(output) => output,
            ToolOutcome::TimedOut { after } => {
                return Err(sc_core::Error::timed_out(PROBE_STAGE, after))
            }
            ToolOutcome::Failed { diagnostic } => {
                return Err(sc_core::Error::Probe(format!("ffprobe failed: {diagnostic}")))
            }
        };

        let ff: FfprobeOutput = serde_json::from_str(&output.stdout).map_err(|e| {
            sc_core::Error::Probe(format!("ffprobe JSON parse error: {e}"))
        })?;

        duration_from_output(ff)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn duration_from_output(output: FfprobeOutput) -> sc_core::Result<f64> {
    let audio = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| sc_core::Error::Probe("no audio stream found".into()))?;

    let raw = output
        .format
        .and_then(|f| f.duration)
        .or_else(|| audio.duration.clone())
        .ok_or_else(|| sc_core::Error::Probe("ffprobe reported no duration".into()))?;

    parse_duration(&raw)
}

/// Parse an ffprobe duration string (`"12.340000"`) into seconds.
pub fn parse_duration(raw: &str) -> sc_core::Result<f64> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| sc_core::Error::Probe(format!("invalid duration '{raw}'")))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(sc_core::Error::Probe(format!(
            "duration must be positive, got '{raw}'"
        )));
    }

    Ok(secs)
}
