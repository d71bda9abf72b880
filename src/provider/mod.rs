//! Upstream voice and vision model provider.
//!
//! The provider is a remote HTTP service. This module owns the request
//! contracts: the realtime session (with its tool manifest) and the
//! single-image scene analysis call.

mod client;
mod session;

pub use client::{ProviderClient, ProviderConfig, ProviderError};
pub use session::{
    instructions, tool_manifest, RealtimeSessionRequest, SessionOptions, ToolDefinition,
    CAPTURE_SCENE_TOOL,
};
