//! Prometheus metrics for the bridge.
//!
//! Exposed in text format at `GET /metrics`.
//!
//! # Metrics Exposed
//!
//! ## Policy Metrics
//! - `bridge_policy_runs_total{policy,outcome}` - Policy runs by outcome
//! - `bridge_policy_unknown_total` - Requests naming an unregistered policy
//! - `bridge_policy_duration_seconds` - Histogram of gated execution time
//! - `bridge_gate_waiting` - Requests currently queued on the gate
//!
//! ## Camera and Analysis Metrics
//! - `bridge_camera_captures_total` / `bridge_camera_failures_total`
//! - `bridge_analyses_total` / `bridge_analysis_failures_total`
//!
//! ## Session Metrics
//! - `bridge_sessions_total` / `bridge_session_failures_total`

mod collector;

pub use collector::{BridgeMetrics, MetricsError, RunOutcome};
