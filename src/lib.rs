//! Voice Arm Bridge Library
//!
//! A thin backend that lets a realtime voice/vision agent operate a single
//! robot arm running a scripted pick-and-place policy.
//!
//! # Architecture
//!
//! ```text
//!            HTTP (server)
//!                 ↓
//!         orchestration (bridge)
//!     ↓         ↓          ↓          ↓
//! capture   provider    journal    gate → policy
//! ```
//!
//! # Design Principles
//!
//! - **One actuation at a time**: every policy run holds the process-wide
//!   [`gate::ConcurrencyGate`]; waiting requests never block the runtime
//! - **Never fail the transport**: every operation answers with a tagged
//!   success or error body the agent can read aloud
//! - **Closed tool surface**: the realtime model only sees the two tools in
//!   [`provider::tool_manifest`]
//! - **Capture is independent**: camera access is not serialized with
//!   policy runs
//!
//! # Example
//!
//! ```no_run
//! use voice_arm_bridge::{config::BridgeConfig, server::BridgeServer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::default();
//! let api_key = config.api_key_from_env()?;
//! let bridge = config.build_bridge(&api_key)?;
//!
//! BridgeServer::new(config.server.clone(), bridge).run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod capture;
pub mod config;
pub mod gate;
pub mod journal;
pub mod metrics;
pub mod policy;
pub mod provider;
pub mod server;

// Re-export commonly used types at crate root
pub use bridge::{Bridge, BridgeComponents, PolicyRequest, PolicyResponse};
pub use capture::{Camera, CaptureConfig, EncodedImage, MockCamera, SharedCamera};
pub use config::BridgeConfig;
pub use gate::ConcurrencyGate;
pub use policy::{InferenceRunner, PolicyKind, PolicyOutcome, PolicyRegistry};
pub use provider::{ProviderClient, SessionOptions};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
