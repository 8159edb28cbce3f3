//! # sc-pipeline
//!
//! Orchestration of the upload-to-video pipeline.
//!
//! This crate provides:
//!
//! - **[`InputValidator`]** -- required fields and extension allow-lists,
//!   checked before anything is written.
//! - **[`ArtifactStore`]** -- the upload and output namespaces, exclusive
//!   file creation, and video resolution for downloads.
//! - **[`ProcessingJob`]** -- the per-request state machine and its stage log.
//! - **[`PipelineController`]** -- runs validate, store, composite, probe,
//!   mux and publish in order for one upload.

pub mod controller;
pub mod job;
pub mod storage;
pub mod validate;

// Re-export key types at the crate root.
pub use controller::PipelineController;
pub use job::{JobState, ProcessingJob, PublishedVideo, Stage, StageOutcome, StageResult};
pub use storage::ArtifactStore;
pub use validate::{InputValidator, UploadPart, ValidatedUpload, AUDIO_FIELD, IMAGE_FIELD};
