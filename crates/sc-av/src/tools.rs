//! Locating ffmpeg and ffprobe.
//!
//! Both tools are resolved once at startup into a [`ToolRegistry`]. A path
//! configured in [`ToolsConfig`] wins when it exists; otherwise the tool is
//! looked up on `PATH`. A missing tool is not fatal at discovery time: the
//! stage that needs it fails with [`sc_core::Error::Tool`] instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sc_core::config::ToolsConfig;
use serde::Serialize;

use crate::command::ToolCommand;

/// Budget for a `-version` query.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// The external programs stillcast drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Ffmpeg, Tool::Ffprobe];

    /// Executable name, as searched for on `PATH`.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    fn configured(self, config: &ToolsConfig) -> Option<&Path> {
        match self {
            Tool::Ffmpeg => config.ffmpeg_path.as_deref(),
            Tool::Ffprobe => config.ffprobe_path.as_deref(),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Availability report for one tool, as returned by `GET /api/admin/tools`.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output.
    pub version: Option<String>,
    #[schema(value_type = Option<String>)]
    pub path: Option<PathBuf>,
}

/// Resolved executable paths.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
}

impl ToolRegistry {
    /// Resolve every [`Tool`], preferring existing configured paths.
    pub fn discover(config: &ToolsConfig) -> Self {
        let mut registry = Self::default();
        for tool in Tool::ALL {
            let path = resolve(tool, config);
            match &path {
                Some(p) => tracing::debug!("{tool} resolved to {}", p.display()),
                None => tracing::debug!("{tool} not found"),
            }
            *registry.slot(tool) = path;
        }
        registry
    }

    fn slot(&mut self, tool: Tool) -> &mut Option<PathBuf> {
        match tool {
            Tool::Ffmpeg => &mut self.ffmpeg,
            Tool::Ffprobe => &mut self.ffprobe,
        }
    }

    /// Path of `tool`, if it was found.
    pub fn path(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::Ffmpeg => self.ffmpeg.as_deref(),
            Tool::Ffprobe => self.ffprobe.as_deref(),
        }
    }

    /// Path of `tool`, or [`sc_core::Error::Tool`] if it was not found.
    pub fn require(&self, tool: Tool) -> sc_core::Result<&Path> {
        self.path(tool).ok_or_else(|| {
            sc_core::Error::tool(tool.name(), format!("{tool} not found; is it installed and in PATH?"))
        })
    }

    /// Report availability and version of every tool.
    ///
    /// Each found tool is asked for `-version` under a short budget; a tool
    /// that hangs is reported without a version.
    pub async fn check_all(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(Tool::ALL.len());
        for tool in Tool::ALL {
            let path = self.path(tool);
            let version = match path {
                Some(p) => detect_version(p, VERSION_TIMEOUT).await,
                None => None,
            };
            infos.push(ToolInfo {
                name: tool.name().to_string(),
                available: path.is_some(),
                version,
                path: path.map(Path::to_path_buf),
            });
        }
        infos
    }
}

fn resolve(tool: Tool, config: &ToolsConfig) -> Option<PathBuf> {
    if let Some(configured) = tool.configured(config) {
        if configured.exists() {
            return Some(configured.to_path_buf());
        }
        tracing::warn!(
            "Configured {tool} path {} does not exist; searching PATH",
            configured.display()
        );
    }
    which::which(tool.name()).ok()
}

async fn detect_version(path: &Path, timeout: Duration) -> Option<String> {
    let output = match ToolCommand::new(path.to_path_buf())
        .arg("-version")
        .timeout(timeout)
        .execute()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("{} -version: {e}", path.display());
            return None;
        }
    };
    output.stdout.lines().next().map(str::to_string)
}
