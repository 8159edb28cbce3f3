mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use sc_av::ToolRegistry;
use sc_core::config::Config;
use sc_pipeline::{
    ArtifactStore, PipelineController, StageOutcome, UploadPart, AUDIO_FIELD, IMAGE_FIELD,
};
use tokio_util::sync::CancellationToken;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting stillcast server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    sc_server::start(config, CancellationToken::new()).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stillcast=trace,sc_server=trace,sc_pipeline=trace,sc_av=debug,sc_core=debug,tower_http=debug".to_string()
        } else {
            "stillcast=info,sc_server=info,sc_pipeline=info,sc_av=info,sc_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Render {
            image,
            audio,
            output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(render(&image, &audio, output.as_deref(), cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("stillcast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn read_part(field: &str, path: &Path) -> Result<UploadPart> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadPart::new(field, file_name, data))
}

async fn render(
    image: &Path,
    audio: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let store = ArtifactStore::new(&config.storage);
    store.ensure_dirs()?;

    let parts = vec![
        read_part(IMAGE_FIELD, image).await?,
        read_part(AUDIO_FIELD, audio).await?,
    ];

    let controller = PipelineController::new(Arc::new(config), Arc::new(tools), store);
    let job = controller.process(&parts).await;

    println!("Job {}", job.id());
    for result in job.stages() {
        print!(
            "  {:<12} {:<9} {:>6} ms",
            result.stage.as_str(),
            result.outcome.as_str(),
            result.duration.as_millis()
        );
        if let StageOutcome::Failed(diagnostic) = &result.outcome {
            print!("  {}", diagnostic.lines().last().unwrap_or_default());
        }
        println!();
    }

    let (_, result) = job.into_result();
    let video = result?;

    println!();
    println!("Display name: {}", video.display_name);
    println!("Duration: {:.3}s", video.duration_secs);
    println!("Video: {}", video.artifact.path.display());

    if let Some(output) = output {
        tokio::fs::copy(&video.artifact.path, output)
            .await
            .with_context(|| format!("Failed to copy video to {}", output.display()))?;
        println!("Copied to {}", output.display());
    }

    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let duration = sc_av::probe_duration(&tools, file, config.render.probe_timeout()).await?;

    if json {
        let value = serde_json::json!({
            "file": file.display().to_string(),
            "duration_secs": duration,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("File: {}", file.display());
        println!("Duration: {duration:.6}s");
    }

    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all().await;
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("Some tools are missing; install ffmpeg and ffprobe to render videos")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Max upload: {} bytes", config.server.max_upload_bytes);
    println!("  Uploads: {}", config.storage.upload_dir.display());
    println!("  Outputs: {}", config.storage.output_dir.display());
    println!(
        "  Render: {}x{} @ {} fps",
        config.render.width, config.render.height, config.render.framerate
    );

    for warning in config.validate() {
        println!("  warning: {warning}");
    }

    Ok(())
}
