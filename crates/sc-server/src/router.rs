//! Axum router construction.
//!
//! Builds the full application router with all routes under `/api`,
//! middleware layers, and optional static file serving for the upload form.

use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(title = "stillcast", description = "Still image + audio to mp4"),
    paths(
        routes::upload::upload,
        routes::artifacts::download_artifact,
        routes::config::upload_limits,
        routes::health::health_check,
        routes::admin::tools,
    ),
    components(schemas(
        routes::upload::UploadResponse,
        routes::upload::StageReport,
        routes::config::UploadLimitsResponse,
        routes::health::HealthResponse,
        sc_av::ToolInfo,
    ))
)]
pub struct ApiDoc;

/// GET /api/openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = DefaultBodyLimit::max(ctx.config.server.max_upload_bytes);

    let api = Router::new()
        .route("/upload", post(routes::upload::upload).layer(upload_limit))
        .route(
            "/artifacts/{id}",
            get(routes::artifacts::download_artifact),
        )
        .route("/config/upload", get(routes::config::upload_limits))
        .route("/health", get(routes::health::health_check))
        .route("/admin/tools", get(routes::admin::tools))
        .route("/openapi.json", get(openapi_json));

    let mut app = Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for the upload form.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static directory {:?} does not exist; not serving it", dir);
        }
    }

    app
}
