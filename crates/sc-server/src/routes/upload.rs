//! Upload route: one image plus one audio clip in, one published video out.

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use sc_pipeline::{StageOutcome, StageResult, UploadPart};

use crate::context::AppContext;
use crate::error::{AppError, WithRequestId};
use crate::middleware::request_id::RequestId;

/// Response for a successful upload.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub artifact_id: String,
    /// Relative link that downloads the video under its display name.
    pub download_url: String,
    pub display_name: String,
    pub duration_secs: f64,
    pub stages: Vec<StageReport>,
}

/// One entry of the job's stage log.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StageReport {
    pub stage: String,
    /// `success`, `timed_out` or `failed`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub duration_ms: u64,
}

impl From<&StageResult> for StageReport {
    fn from(result: &StageResult) -> Self {
        let diagnostic = match &result.outcome {
            StageOutcome::Failed(diag) => Some(diag.clone()),
            _ => None,
        };
        Self {
            stage: result.stage.as_str().to_string(),
            status: result.outcome.as_str().to_string(),
            diagnostic,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// POST /api/upload
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = inline(Object), content_type = "multipart/form-data",
        description = "`image` (png, jpg, jpeg, webp) and `audio` (mp3) file parts"),
    responses(
        (status = 200, description = "Video published", body = UploadResponse),
        (status = 400, description = "Missing field or disallowed extension"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 422, description = "Audio could not be probed"),
        (status = 500, description = "Transcoding failed"),
        (status = 502, description = "ffmpeg or ffprobe unavailable"),
        (status = 503, description = "A processing stage timed out")
    )
)]
pub async fn upload(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let multipart = multipart
        .map_err(|e| sc_core::Error::Validation(format!("expected a multipart body: {e}")))
        .for_request(&request_id)?;

    let parts = read_parts(multipart).await.for_request(&request_id)?;

    let job = ctx.pipeline.process(&parts).await;
    let (stages, result) = job.into_result();
    let video = result.for_request(&request_id)?;

    Ok(Json(UploadResponse {
        message: "Video created".to_string(),
        artifact_id: video.artifact.id.to_string(),
        download_url: video.download_url(),
        display_name: video.display_name.to_string(),
        duration_secs: video.duration_secs,
        stages: stages.iter().map(StageReport::from).collect(),
    }))
}

/// Collect every file part of the body.
async fn read_parts(mut multipart: Multipart) -> sc_core::Result<Vec<UploadPart>> {
    let mut parts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string).unwrap_or_default();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        tracing::debug!(
            "received part '{name}' ({:?}, {} bytes)",
            file_name,
            data.len()
        );
        parts.push(UploadPart {
            field: name,
            file_name,
            data,
        });
    }

    Ok(parts)
}

fn multipart_error(e: MultipartError) -> sc_core::Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        sc_core::Error::PayloadTooLarge(e.body_text())
    } else {
        sc_core::Error::Validation(format!("failed to read multipart body: {}", e.body_text()))
    }
}
