use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mic_relay::{
    create_router, transport, AppState, AudioBackendFactory, AudioSource, BackendFactory,
    Capability, CaptureController, CaptureError, CaptureState, Config, IdentifierSlot,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mic-relay", version, about = "Capture microphone audio and relay it over a persistent connection")]
struct Cli {
    /// Config file path (without extension)
    #[arg(long, default_value = "config/mic-relay")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the recording controls over HTTP
    Serve,
    /// Record for a fixed time, relay, and print the session report
    Record {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
    /// Report whether audio capture is available
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let source = cfg.audio_source();
    let capability = AudioBackendFactory::probe(&source);

    match cli.command {
        Command::Probe => {
            println!("{}", serde_json::to_string_pretty(&capability)?);
            Ok(())
        }
        Command::Serve => {
            let controller = build_controller(&cfg, source, capability).await?;
            serve(&cfg, controller).await
        }
        Command::Record { seconds } => {
            let controller = build_controller(&cfg, source, capability).await?;
            record(controller, Duration::from_secs(seconds)).await
        }
    }
}

async fn build_controller(
    cfg: &Config,
    source: AudioSource,
    capability: Capability,
) -> Result<Arc<CaptureController>> {
    if let Capability::Unsupported { reason } = &capability {
        warn!("Audio capture unavailable: {}", reason);
    }

    let identifier = IdentifierSlot::new(cfg.relay.identifier);
    let transport = transport::connect(&cfg.transport, identifier.clone()).await?;

    let backend_config = cfg.backend_config();
    let backend_capability = capability.clone();
    let backends: BackendFactory = Arc::new(move || {
        AudioBackendFactory::create(&source, &backend_capability, backend_config.clone())
    });

    Ok(Arc::new(CaptureController::new(
        cfg.session_config(),
        capability,
        backends,
        transport,
        identifier,
    )))
}

async fn serve(cfg: &Config, controller: Arc<CaptureController>) -> Result<()> {
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Control surface listening on http://{}", addr);

    let app = create_router(AppState::new(Arc::clone(&controller)));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if controller.state() == CaptureState::Recording {
        let report = controller.stop_capture().await?;
        info!(
            "Stopped active session {} on shutdown",
            report.stats.session_id
        );
    }

    Ok(())
}

async fn record(controller: Arc<CaptureController>, duration: Duration) -> Result<()> {
    if let Err(e) = controller.start_capture().await {
        alert(&e);
        return Err(e.into());
    }

    info!("Recording for {}s (Ctrl-C to stop early)", duration.as_secs());

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping"),
    }

    let report = controller.stop_capture().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Acquisition failures are shown to the user, not only logged
fn alert(err: &CaptureError) {
    if err.is_user_facing() {
        eprintln!("Error happened with audio capture: {}", err);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
