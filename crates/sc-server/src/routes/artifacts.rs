//! Download route for published videos.

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, Response, StatusCode};
use axum::Extension;
use tokio_util::io::ReaderStream;

use sc_core::{encode_display_name, ArtifactNamer};

use crate::context::AppContext;
use crate::error::{AppError, WithRequestId};
use crate::middleware::request_id::RequestId;

/// GET /api/artifacts/{id}
#[utoipa::path(
    get,
    path = "/api/artifacts/{id}",
    params(
        ("id" = String, Path, description = "Artifact id returned by the upload"),
        ("name" = Option<String>, Query, description = "Percent-encoded download name, without extension")
    ),
    responses(
        (status = 200, description = "The mp4 video", content_type = "video/mp4"),
        (status = 404, description = "No published video with this id")
    )
)]
pub async fn download_artifact(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response<Body>, AppError> {
    let video = ctx.store().resolve_video(&id).for_request(&request_id)?;

    // The raw query is decoded exactly once, here.
    let name = ArtifactNamer::decode_display_name(raw_query_param(query.as_deref(), "name"));

    let file = tokio::fs::File::open(&video.path)
        .await
        .map_err(sc_core::Error::from)
        .for_request(&request_id)?;
    let len = file
        .metadata()
        .await
        .map_err(sc_core::Error::from)
        .for_request(&request_id)?
        .len();

    tracing::debug!("serving {} ({len} bytes) as \"{name}.mp4\"", video.file_name());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, video.mime_type())
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition(&name))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| sc_core::Error::Internal(format!("failed to build response: {e}")))
        .for_request(&request_id)
}

/// Find the still-encoded value of `key` in a raw query string.
fn raw_query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == key).then_some(v)
    })
}

/// `attachment` disposition for `<name>.mp4`: an ASCII-only `filename`
/// fallback plus the exact name as an RFC 5987 `filename*`.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}.mp4\"; filename*=UTF-8''{}.mp4",
        encode_display_name(name)
    )
}
