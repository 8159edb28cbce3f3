//! Read-only view of the upload limits, for clients building the form.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

/// Upload constraints the server enforces.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadLimitsResponse {
    pub max_upload_bytes: usize,
    pub image_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
}

/// GET /api/config/upload
#[utoipa::path(
    get,
    path = "/api/config/upload",
    responses(
        (status = 200, description = "Upload size limit and accepted extensions", body = UploadLimitsResponse)
    )
)]
pub async fn upload_limits(State(ctx): State<AppContext>) -> Json<UploadLimitsResponse> {
    Json(UploadLimitsResponse {
        max_upload_bytes: ctx.config.server.max_upload_bytes,
        image_extensions: ctx.config.upload.image_extensions.clone(),
        audio_extensions: ctx.config.upload.audio_extensions.clone(),
    })
}
