//! The two artifact namespaces: raw uploads and derived outputs.
//!
//! Every file in either namespace is named `<id>.<ext>` with a freshly
//! generated id. Client filenames never reach a path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sc_av::Workspace;
use sc_core::config::StorageConfig;
use sc_core::{ArtifactId, ArtifactKind, ArtifactNamer, Error, Namespace, Result, StoredArtifact};
use tokio::io::AsyncWriteExt;

/// Fresh ids tried before an exclusive create is reported as failed.
const MAX_CREATE_ATTEMPTS: usize = 3;

/// Filesystem layout for uploads and outputs.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            upload_dir: storage.upload_dir.clone(),
            output_dir: storage.output_dir.clone(),
        }
    }

    /// Create both namespace directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    pub fn root(&self, namespace: Namespace) -> &Path {
        match namespace {
            Namespace::Uploads => &self.upload_dir,
            Namespace::Outputs => &self.output_dir,
        }
    }

    /// Allocate a handle for a derived artifact. Nothing is written.
    pub fn allocate(&self, kind: ArtifactKind) -> StoredArtifact {
        ArtifactNamer::new_artifact(self.root(kind.namespace()), kind)
    }

    /// Persist uploaded bytes under a new id.
    ///
    /// The file is created exclusively; on the improbable id collision a
    /// fresh id is drawn instead of overwriting the existing file.
    pub async fn store_upload(
        &self,
        kind: ArtifactKind,
        extension: &str,
        data: &[u8],
    ) -> Result<StoredArtifact> {
        let root = self.root(kind.namespace());

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let artifact = ArtifactNamer::new_upload(root, kind, extension)?;
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&artifact.path)
                .await;

            let mut file = match file {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!("Artifact id collision on {}; retrying", artifact.file_name());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            file.write_all(data).await?;
            file.flush().await?;

            tracing::debug!(
                "stored {kind} {} ({} bytes)",
                artifact.path.display(),
                data.len()
            );
            return Ok(artifact);
        }

        Err(Error::Internal(format!(
            "could not allocate a unique {kind} id after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    /// Open a staging workspace inside the output namespace.
    pub fn workspace(&self) -> Result<Workspace> {
        Workspace::new_in(&self.output_dir)
    }

    /// Resolve a published video by its textual id.
    ///
    /// A malformed id and an id with no published video are both
    /// [`Error::NotFound`]; callers cannot tell them apart.
    pub fn resolve_video(&self, id: &str) -> Result<StoredArtifact> {
        let parsed = ArtifactId::from_str(id).map_err(|_| Error::not_found("video", id))?;
        let artifact = ArtifactNamer::existing(&self.output_dir, ArtifactKind::Video, parsed);

        if !artifact.path.is_file() {
            return Err(Error::not_found("video", id));
        }

        Ok(artifact)
    }
}
