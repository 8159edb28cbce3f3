//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, storage, upload rules, tools and rendering.
//! Every section defaults sensibly so a completely empty `{}` file is valid.
//! A `Config` is built once at startup and shared immutably.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub tools: ToolsConfig,
    pub render: RenderConfig,
}

impl Config {
    /// Parse a JSON document. Missing sections and fields take defaults.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read `path` if given. Any problem with the file is logged and the
    /// defaults are used, so a server can always start.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.max_upload_bytes == 0 {
            warnings.push("server.max_upload_bytes is 0; every upload will be rejected".into());
        }

        if self.storage.upload_dir == self.storage.output_dir {
            warnings.push(
                "storage.upload_dir and storage.output_dir are the same directory".into(),
            );
        }

        if self.upload.image_extensions.is_empty() {
            warnings.push("upload.image_extensions is empty; no image will be accepted".into());
        }
        if self.upload.audio_extensions.is_empty() {
            warnings.push("upload.audio_extensions is empty; no audio will be accepted".into());
        }

        let render = &self.render;
        if render.width == 0 || render.height == 0 {
            warnings.push(format!(
                "render size {}x{} has a zero dimension",
                render.width, render.height
            ));
        } else if render.width % 2 != 0 || render.height % 2 != 0 {
            warnings.push(format!(
                "render size {}x{} is not divisible by 2; yuv420p output will fail",
                render.width, render.height
            ));
        }

        if render.framerate == 0 {
            warnings.push("render.framerate is 0".into());
        }

        for (name, ms) in [
            ("composite_timeout_ms", render.composite_timeout_ms),
            ("probe_timeout_ms", render.probe_timeout_ms),
            ("mux_timeout_ms", render.mux_timeout_ms),
        ] {
            if ms == 0 {
                warnings.push(format!("render.{name} is 0; the stage will always time out"));
            }
        }

        if render.mux_timeout_ms < render.composite_timeout_ms {
            warnings.push(
                "render.mux_timeout_ms is shorter than render.composite_timeout_ms".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            static_dir: None,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Locations of the two artifact namespaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Raw uploads, kept for diagnostics even when a job fails.
    pub upload_dir: PathBuf,
    /// Derived and published artifacts.
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./data/uploads"),
            output_dir: PathBuf::from("./data/outputs"),
        }
    }
}

/// Extension allow-lists for the two upload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub image_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            image_extensions: ["png", "jpg", "jpeg", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            audio_extensions: vec!["mp3".into()],
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Output geometry, encoder settings and per-stage time budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Gaussian blur strength applied to the background fill.
    pub blur_sigma: f32,
    pub framerate: u32,
    pub video_preset: String,
    pub audio_bitrate: String,
    pub composite_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub mux_timeout_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            blur_sigma: 20.0,
            framerate: 25,
            video_preset: "veryfast".into(),
            audio_bitrate: "192k".into(),
            composite_timeout_ms: 5_000,
            probe_timeout_ms: 10_000,
            mux_timeout_ms: 30_000,
        }
    }
}

impl RenderConfig {
    pub fn composite_timeout(&self) -> Duration {
        Duration::from_millis(self.composite_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn mux_timeout(&self) -> Duration {
        Duration::from_millis(self.mux_timeout_ms)
    }
}
