//! End-to-end upload processing.
//!
//! validate -> store inputs -> composite -> probe -> mux -> publish, strictly
//! in order, each step recorded in the job's stage log. Any failure stops
//! the job; nothing is retried.

use std::sync::Arc;
use std::time::Instant;

use sc_av::{CompositeSettings, MuxSettings, ToolRegistry, Workspace};
use sc_core::config::Config;
use sc_core::{ArtifactKind, ArtifactNamer, Result, StoredArtifact};

use crate::job::{ProcessingJob, PublishedVideo, Stage};
use crate::storage::ArtifactStore;
use crate::validate::{InputValidator, UploadPart, ValidatedUpload};

/// Runs uploads through the pipeline. Immutable and cheap to share.
#[derive(Debug, Clone)]
pub struct PipelineController {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    store: ArtifactStore,
    validator: InputValidator,
}

struct StoredInputs {
    image: StoredArtifact,
    audio: StoredArtifact,
}

impl PipelineController {
    pub fn new(config: Arc<Config>, tools: Arc<ToolRegistry>, store: ArtifactStore) -> Self {
        let validator = InputValidator::new(&config.upload);
        Self {
            config,
            tools,
            store,
            validator,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Process one upload to completion.
    ///
    /// The returned job is terminal: either `Published` with a final
    /// artifact, or `Failed` with the stage and error that stopped it.
    pub async fn process(&self, parts: &[UploadPart]) -> ProcessingJob {
        let mut job = ProcessingJob::new();
        tracing::info!(job = %job.id(), "processing upload with {} parts", parts.len());

        let started = Instant::now();
        let Some(upload) = job.complete(Stage::Validate, started, self.validator.validate(parts))
        else {
            return job;
        };

        let display_name = ArtifactNamer::display_name_for(&upload.audio.file_name);

        let started = Instant::now();
        let Some(inputs) = job.complete(Stage::StoreInputs, started, self.store_inputs(&upload).await)
        else {
            return job;
        };

        // Dropped on every return below, taking unpublished files with it.
        let workspace = match self.store.workspace() {
            Ok(ws) => ws,
            Err(e) => {
                let _: Option<()> = job.complete(Stage::Composite, Instant::now(), Err(e));
                return job;
            }
        };

        let started = Instant::now();
        let Some(composite) = job.complete(
            Stage::Composite,
            started,
            self.composite(&workspace, &inputs.image).await,
        ) else {
            return job;
        };

        let started = Instant::now();
        let Some(duration_secs) = job.complete(
            Stage::Probe,
            started,
            sc_av::probe_duration(
                &self.tools,
                &inputs.audio.path,
                self.config.render.probe_timeout(),
            )
            .await,
        ) else {
            return job;
        };

        let video = self.store.allocate(ArtifactKind::Video);

        let started = Instant::now();
        if job
            .complete(
                Stage::Mux,
                started,
                self.mux(&workspace, &composite, &inputs.audio, duration_secs, &video)
                    .await,
            )
            .is_none()
        {
            return job;
        }

        let started = Instant::now();
        if job
            .complete(Stage::Publish, started, workspace.publish(&video))
            .is_none()
        {
            return job;
        }

        tracing::info!(
            job = %job.id(),
            "published {} as \"{display_name}\" ({duration_secs}s)",
            video.file_name()
        );
        job.set_video(PublishedVideo {
            artifact: video,
            display_name,
            duration_secs,
        });
        job
    }

    async fn store_inputs(&self, upload: &ValidatedUpload) -> Result<StoredInputs> {
        let image = self
            .store
            .store_upload(ArtifactKind::RawImage, &upload.image.extension, &upload.image.data)
            .await?;
        let audio = self
            .store
            .store_upload(ArtifactKind::RawAudio, &upload.audio.extension, &upload.audio.data)
            .await?;
        Ok(StoredInputs { image, audio })
    }

    async fn composite(&self, workspace: &Workspace, image: &StoredArtifact) -> Result<StoredArtifact> {
        let composite = self.store.allocate(ArtifactKind::CompositeImage);
        let settings = CompositeSettings::from_config(&self.config.render);

        sc_av::composite_image(&self.tools, &image.path, &workspace.stage_path(&composite), &settings)
            .await?
            .into_result(Stage::Composite.as_str())?;

        workspace.expect_staged(&composite, Stage::Composite.as_str())?;
        workspace.publish(&composite)?;
        Ok(composite)
    }

    async fn mux(
        &self,
        workspace: &Workspace,
        composite: &StoredArtifact,
        audio: &StoredArtifact,
        duration_secs: f64,
        video: &StoredArtifact,
    ) -> Result<()> {
        let settings = MuxSettings::from_config(&self.config.render);

        sc_av::mux_video(
            &self.tools,
            &composite.path,
            &audio.path,
            duration_secs,
            &workspace.stage_path(video),
            &settings,
        )
        .await?
        .into_result(Stage::Mux.as_str())?;

        workspace.expect_staged(video, Stage::Mux.as_str())
    }
}
