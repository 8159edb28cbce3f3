//! Per-job staging area for derived artifacts.
//!
//! A [`Workspace`] is a hidden temporary directory created *inside* the
//! output namespace. Tools write into it, and a file becomes visible under
//! its artifact path only through [`Workspace::publish`]. Dropping the
//! workspace removes whatever is still staged, so a half-written video from
//! a failed or timed-out stage never appears in the namespace.

use std::path::{Path, PathBuf};

use sc_core::StoredArtifact;
use tempfile::TempDir;

/// Staging directory for one job.
///
/// # Example
///
/// ```no_run
/// use sc_av::Workspace;
/// use sc_core::{ArtifactKind, ArtifactNamer};
/// use std::path::Path;
///
/// let outputs = Path::new("/data/outputs");
/// let workspace = Workspace::new_in(outputs).unwrap();
/// let video = ArtifactNamer::new_artifact(outputs, ArtifactKind::Video);
/// // ... have ffmpeg write to workspace.stage_path(&video) ...
/// workspace.publish(&video).unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a staging directory inside `parent`.
    ///
    /// Staging on the same filesystem as the namespace keeps
    /// [`Workspace::publish`] a link rather than a copy.
    pub fn new_in(parent: &Path) -> sc_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .map_err(|e| sc_core::Error::Internal(format!("failed to create staging dir: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// Path to the temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where a tool should write `artifact` before it is published.
    pub fn stage_path(&self, artifact: &StoredArtifact) -> PathBuf {
        self.temp_dir.path().join(artifact.file_name())
    }

    /// Fail `stage` if its tool exited cleanly without writing `artifact`.
    pub fn expect_staged(&self, artifact: &StoredArtifact, stage: &str) -> sc_core::Result<()> {
        if self.stage_path(artifact).is_file() {
            Ok(())
        } else {
            Err(sc_core::Error::transcode_failed(
                stage,
                format!("tool exited 0 but wrote no {}", artifact.kind),
            ))
        }
    }

    /// Move the staged file for `artifact` to its final path.
    ///
    /// The final path is claimed exclusively: an existing file there is never
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`sc_core::Error::Internal`] if nothing was staged for
    /// `artifact`, or an I/O error if the move fails or the final path is
    /// already taken.
    pub fn publish(&self, artifact: &StoredArtifact) -> sc_core::Result<()> {
        let staged = self.stage_path(artifact);

        if !staged.is_file() {
            return Err(sc_core::Error::Internal(format!(
                "no staged {} to publish",
                artifact.kind
            )));
        }

        // A hard link fails with AlreadyExists instead of overwriting.
        match std::fs::hard_link(&staged, &artifact.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Err(e.into()),
            Err(_) => copy_exclusive(&staged, &artifact.path)?,
        }

        if let Err(e) = std::fs::remove_file(&staged) {
            tracing::warn!("Failed to remove staged {}: {e}", staged.display());
        }

        Ok(())
    }
}

/// Copy into a path that must not exist yet. A partial copy is removed so
/// a truncated file never sits at the final path.
fn copy_exclusive(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut src = std::fs::File::open(from)?;
    let mut dst = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)?;
    let copied = std::io::copy(&mut src, &mut dst).and_then(|_| dst.sync_all());
    if copied.is_err() {
        drop(dst);
        if let Err(e) = std::fs::remove_file(to) {
            tracing::warn!("Failed to remove partial copy {}: {e}", to.display());
        }
    }
    copied
}
