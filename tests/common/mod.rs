//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which points a default config at a temp
//! storage root and a pair of fake tools, then builds the full
//! [`AppContext`]. The [`TestHarness::with_server`] constructors start Axum
//! on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use sc_av::testing::FakeTools;
use sc_core::config::{Config, StorageConfig};
use sc_server::context::AppContext;
use sc_server::router::build_router;
use tempfile::TempDir;

/// Test harness wrapping a fully-constructed [`AppContext`] whose storage
/// lives in a temp directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub tools: FakeTools,
    root: TempDir,
}

impl TestHarness {
    /// Default configuration with fake tools that always succeed.
    pub fn new() -> Self {
        Self::with_tools(FakeTools::working(), Config::default())
    }

    /// Use `tools` and `config`, overriding only storage and tool paths.
    pub fn with_tools(tools: FakeTools, mut config: Config) -> Self {
        let root = tempfile::tempdir().expect("failed to create storage root");
        config.storage = StorageConfig {
            upload_dir: root.path().join("uploads"),
            output_dir: root.path().join("outputs"),
        };
        config.tools = tools.tools_config();

        let registry = tools.registry();
        let ctx = AppContext::new(config, registry).expect("failed to build context");

        Self { ctx, tools, root }
    }

    /// Start an Axum server with default config on a random port.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Start an Axum server with custom tools and config on a random port.
    pub async fn with_server_config(tools: FakeTools, config: Config) -> (Self, SocketAddr) {
        Self::with_tools(tools, config).serve().await
    }

    async fn serve(self) -> (Self, SocketAddr) {
        let app = build_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.root.path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("outputs")
    }

    /// Regular files currently in `dir`, ignoring staging directories.
    pub fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files
    }
}

/// Multipart form carrying an image and an audio part.
pub fn upload_form(image_name: &str, audio_name: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .part(
            "image",
            reqwest::multipart::Part::bytes(b"fake-image-bytes".to_vec()).file_name(image_name.to_string()),
        )
        .part(
            "audio",
            reqwest::multipart::Part::bytes(b"fake-audio-bytes".to_vec()).file_name(audio_name.to_string()),
        )
}

/// POST `form` to the upload endpoint.
pub async fn post_upload(addr: SocketAddr, form: reqwest::multipart::Form) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/upload"))
        .multipart(form)
        .send()
        .await
        .expect("upload request failed")
}
