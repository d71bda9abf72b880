//! Voice Arm Bridge server
//!
//! Loads configuration, checks the provider API key, and serves the bridge
//! until SIGINT or SIGTERM.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use voice_arm_bridge::{
    capture::CaptureConfig,
    config::{BridgeConfig, LoggingConfig},
    server::BridgeServer,
};

/// Command-line options. Flags override the config file.
#[derive(Debug, Parser)]
#[command(name = "voice-arm-bridge", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "VOICE_ARM_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Use the full demo script (`true`) or per-step confirmations (`false`).
    #[arg(long)]
    demo_mode: Option<bool>,

    /// Serve placeholder frames instead of a real camera.
    #[arg(long)]
    mock_camera: bool,
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    let mut config = match &cli.config {
        Some(path) => match BridgeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => BridgeConfig::default(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(demo_mode) = cli.demo_mode {
        config.session.demo_mode = demo_mode;
    }
    if cli.mock_camera {
        config.camera = CaptureConfig::mock();
    }

    init_logging(&config.logging);
    info!("Voice Arm Bridge v{}", voice_arm_bridge::VERSION);
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to load .env"),
    }

    let api_key = match config.api_key_from_env() {
        Ok(key) => key,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let bridge = match config.build_bridge(&api_key) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        demo_mode = config.session.demo_mode,
        camera = ?config.camera.backend,
        policies = ?bridge.health().policies,
        "Bridge ready"
    );

    if let Err(e) = BridgeServer::new(config.server.clone(), bridge).run().await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
    info!("Done.");
}
