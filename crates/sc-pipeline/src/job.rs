//! Per-request job state and its append-only stage log.

use std::fmt;
use std::time::{Duration, Instant};

use sc_core::{DisplayName, Error, JobId, Result, StoredArtifact};

/// The six steps of a job, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    StoreInputs,
    Composite,
    Probe,
    Mux,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Validate,
        Stage::StoreInputs,
        Stage::Composite,
        Stage::Probe,
        Stage::Mux,
        Stage::Publish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::StoreInputs => "store_inputs",
            Stage::Composite => "composite",
            Stage::Probe => "probe",
            Stage::Mux => "mux",
            Stage::Publish => "publish",
        }
    }

    /// The state a job enters when this stage succeeds.
    fn reached(self) -> JobState {
        match self {
            Stage::Validate | Stage::StoreInputs => JobState::Validated,
            Stage::Composite => JobState::ImageComposited,
            Stage::Probe => JobState::DurationProbed,
            Stage::Mux => JobState::VideoAssembled,
            Stage::Publish => JobState::Published,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Success,
    TimedOut,
    Failed(String),
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::TimedOut => "timed_out",
            StageOutcome::Failed(_) => "failed",
        }
    }

    fn from_error(err: &Error) -> Self {
        match err {
            Error::TranscodeTimedOut { .. } => StageOutcome::TimedOut,
            Error::TranscodeFailed { diagnostic, .. } => StageOutcome::Failed(diagnostic.clone()),
            other => StageOutcome::Failed(other.to_string()),
        }
    }
}

/// One entry in a job's stage log.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub duration: Duration,
}

/// Where a job is in its lifecycle.
///
/// `Failed` is absorbing; every other state only moves forward.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Received,
    Validated,
    ImageComposited,
    DurationProbed,
    VideoAssembled,
    Published,
    Failed { stage: Stage, reason: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Published | JobState::Failed { .. })
    }
}

/// The outcome a client can act on.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedVideo {
    pub artifact: StoredArtifact,
    pub display_name: DisplayName,
    pub duration_secs: f64,
}

impl PublishedVideo {
    /// Relative link that resolves this video and names the download.
    pub fn download_url(&self) -> String {
        format!(
            "/api/artifacts/{}?name={}",
            self.artifact.id,
            self.display_name.encoded()
        )
    }
}

/// A single upload-to-video run.
#[derive(Debug)]
pub struct ProcessingJob {
    id: JobId,
    state: JobState,
    stages: Vec<StageResult>,
    video: Option<PublishedVideo>,
    error: Option<Error>,
}

impl ProcessingJob {
    pub fn new() -> Self {
        Self {
            id: JobId::new(),
            state: JobState::Received,
            stages: Vec::with_capacity(Stage::ALL.len()),
            video: None,
            error: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    /// The published video. `Some` only in [`JobState::Published`].
    pub fn final_artifact(&self) -> Option<&PublishedVideo> {
        match self.state {
            JobState::Published => self.video.as_ref(),
            _ => None,
        }
    }

    /// The error that failed the job, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// The stage the job accepts next, or `None` once it is terminal.
    pub fn next_stage(&self) -> Option<Stage> {
        if self.state.is_terminal() {
            return None;
        }
        Stage::ALL.get(self.stages.len()).copied()
    }

    /// Record the result of `stage` and advance the state machine.
    ///
    /// Returns the stage's value on success. On failure the job moves to
    /// [`JobState::Failed`] and `None` is returned; the caller must stop.
    /// A stage reported out of order fails the job whatever its result.
    pub fn complete<T>(&mut self, stage: Stage, started: Instant, result: Result<T>) -> Option<T> {
        let duration = started.elapsed();

        let Some(expected) = self.next_stage() else {
            tracing::warn!(job = %self.id, "stage {stage} reported after job finished");
            return None;
        };
        let result = if stage == expected {
            result
        } else {
            Err(Error::Internal(format!(
                "stage {stage} reported out of order, expected {expected}"
            )))
        };

        match result {
            Ok(value) => {
                tracing::info!(
                    job = %self.id,
                    "stage {stage} completed in {}ms",
                    duration.as_millis()
                );
                self.stages.push(StageResult {
                    stage,
                    outcome: StageOutcome::Success,
                    duration,
                });
                self.state = stage.reached();
                Some(value)
            }
            Err(err) => {
                let outcome = StageOutcome::from_error(&err);
                if outcome == StageOutcome::TimedOut {
                    tracing::warn!(job = %self.id, "stage {stage} timed out: {err}");
                } else {
                    tracing::warn!(job = %self.id, "stage {stage} failed: {err}");
                }
                self.stages.push(StageResult {
                    stage,
                    outcome,
                    duration,
                });
                self.state = JobState::Failed {
                    stage,
                    reason: err.to_string(),
                };
                self.error = Some(err);
                None
            }
        }
    }

    /// Attach the published video once the publish stage has succeeded.
    pub(crate) fn set_video(&mut self, video: PublishedVideo) {
        debug_assert_eq!(self.state, JobState::Published);
        self.video = Some(video);
    }

    /// Split the job into its stage log and the published video or error.
    pub fn into_result(self) -> (Vec<StageResult>, Result<PublishedVideo>) {
        let result = match (self.state, self.video, self.error) {
            (JobState::Published, Some(video), _) => Ok(video),
            (_, _, Some(err)) => Err(err),
            (state, _, None) => Err(Error::Internal(format!(
                "job ended in state {state:?} without a result"
            ))),
        };
        (self.stages, result)
    }
}

impl Default for ProcessingJob {
    fn default() -> Self {
        Self::new()
    }
}
